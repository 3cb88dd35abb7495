//! Agent Factory turns a natural-language request into a validated
//! multi-agent blueprint and generated code.
//!
//! The workflow runs three phase executors (Consultant, Architect, Builder)
//! behind a single [`state_machine::WorkflowStateMachine`], with human
//! checkpoints for the strategy choice and blueprint approval.

pub mod agents;
pub mod blueprint;
pub mod cancel;
pub mod config;
pub mod error;
pub mod executor;
pub mod factory_paths;
pub mod failure;
pub mod human;
pub mod model_router;
pub mod orchestrator;
pub mod phases;
pub mod prompt_format;
pub mod revision;
pub mod state;
pub mod state_machine;
pub mod storage;
pub mod structured_logger;
pub mod validators;

#[cfg(test)]
mod testing;
