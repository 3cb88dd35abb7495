use crate::agents::{GenerationRequest, TaskKind};
use crate::blueprint::BlueprintDraft;
use crate::error::FactoryError;
use crate::phases::PhaseContext;
use crate::prompt_format::PromptBuilder;
use crate::state::WorkflowState;
use crate::state_machine::StateCommand;
use crate::validators::BlueprintViolation;

const ARCHITECT_SYSTEM_PROMPT: &str = r#"You are a software architect for multi-agent systems.
You answer with a single JSON object and nothing else."#;

const BLUEPRINT_FORMAT: &str = r#"{
  "system_name": "ShoppingAssistant",
  "description": "Optional one-line description",
  "flow_type": "sequential | parallel | conditional",
  "agents": [
    {
      "name": "SearchAgent",
      "role": "What this agent is responsible for",
      "tools": ["tool_name"],
      "dependencies": ["NameOfAnotherAgent"]
    }
  ]
}"#;

/// Designs (or revises) the blueprint.
///
/// Output that fails validation is retried up to `architect.schema_retries`
/// times with the violation in the prompt; once exhausted the phase fails
/// with `SchemaViolation`.
pub async fn run_architect_phase(
    state: &WorkflowState,
    ctx: &mut PhaseContext<'_>,
) -> Result<StateCommand, FactoryError> {
    let retries = ctx.config.architect.schema_retries;
    let mut violation: Option<BlueprintViolation> = None;

    for attempt in 0..=retries {
        let prompt = build_architect_prompt(state, violation.as_ref());
        let request = GenerationRequest::new(TaskKind::Architecture, prompt)
            .with_system_prompt(ARCHITECT_SYSTEM_PROMPT);
        let output = ctx.generate_with_retry(&request).await?;

        match BlueprintDraft::Raw(output).validate() {
            Ok(blueprint) => {
                tracing::info!("architect produced blueprint: {}", blueprint.summary());
                return Ok(StateCommand::AcceptBlueprint { blueprint });
            }
            Err(v) => {
                tracing::warn!(
                    "blueprint rejected (attempt {}/{}): {}",
                    attempt + 1,
                    retries + 1,
                    v
                );
                violation = Some(v);
            }
        }
    }

    let detail = violation
        .map(|v| v.to_string())
        .unwrap_or_else(|| "no valid blueprint produced".to_string());
    Err(FactoryError::SchemaViolation { detail })
}

pub fn build_architect_prompt(
    state: &WorkflowState,
    violation: Option<&BlueprintViolation>,
) -> String {
    let revising = state.pending_feedback().is_some();
    let instructions = if revising {
        "Revise the previous blueprint to address the feedback. Keep everything the feedback does not ask to change."
    } else {
        "Design a multi-agent system for the request, following the chosen strategy."
    };

    let mut builder = PromptBuilder::new()
        .phase("designing")
        .instructions(instructions)
        .input("request", state.initial_request());
    if let Some(strategy) = state.chosen_strategy() {
        builder = builder.input("chosen-strategy", strategy);
    }

    if let (Some(feedback), Some(previous)) = (state.pending_feedback(), state.blueprint()) {
        builder = builder
            .document("previous-blueprint", &previous.to_json_pretty())
            .input("feedback", feedback);
    } else if let Some(feedback) = state.pending_feedback() {
        builder = builder.input("feedback", feedback);
    }

    if let Some(violation) = violation {
        builder = builder.document(
            "validation-error",
            &format!(
                "Your previous answer was rejected: {}\nFix this and answer again.",
                violation
            ),
        );
    }

    builder
        .constraint("Agent names must be unique")
        .constraint("Every dependency must name another agent in the same blueprint")
        .constraint("Respond with the JSON object only")
        .output_format(BLUEPRINT_FORMAT)
        .build()
}
