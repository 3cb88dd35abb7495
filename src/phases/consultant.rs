use crate::agents::{GenerationRequest, TaskKind};
use crate::error::FactoryError;
use crate::phases::PhaseContext;
use crate::prompt_format::PromptBuilder;
use crate::state::WorkflowState;
use crate::state_machine::StateCommand;

const CONSULTANT_SYSTEM_PROMPT: &str = r#"You are a senior consultant for multi-agent systems.
You propose implementation strategies; you do not write code.
Be concrete and brief."#;

/// Asks for 2-3 distinct strategies for the initial request.
pub async fn run_consultant_phase(
    state: &WorkflowState,
    ctx: &mut PhaseContext<'_>,
) -> Result<StateCommand, FactoryError> {
    let request = GenerationRequest::new(TaskKind::Consulting, build_consultant_prompt(state))
        .with_system_prompt(CONSULTANT_SYSTEM_PROMPT);

    let output = ctx.generate_with_retry(&request).await?;
    let strategy_options = output.trim();
    if strategy_options.is_empty() {
        return Err(FactoryError::ServiceUnavailable(
            "consultant returned no strategy options".to_string(),
        ));
    }

    tracing::info!("consultant proposed strategies ({} bytes)", strategy_options.len());
    Ok(StateCommand::CompleteConsulting {
        strategy_options: strategy_options.to_string(),
    })
}

pub fn build_consultant_prompt(state: &WorkflowState) -> String {
    PromptBuilder::new()
        .phase("consulting")
        .instructions(
            "Propose 2-3 distinct strategies for building the requested multi-agent system. \
             Number each strategy and describe its agents, how they cooperate, and its main trade-off.",
        )
        .input("request", state.initial_request())
        .constraint("Each strategy must be meaningfully different from the others")
        .constraint("Do not write any code")
        .output_format("1. <strategy name>: <description>\n2. <strategy name>: <description>\n3. <optional third strategy>")
        .build()
}
