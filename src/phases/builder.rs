use crate::agents::{GenerationRequest, TaskKind};
use crate::blueprint::StructuredBlueprint;
use crate::error::FactoryError;
use crate::phases::PhaseContext;
use crate::prompt_format::PromptBuilder;
use crate::state::WorkflowState;
use crate::state_machine::StateCommand;
use crate::validators::{validate_code, CodeCheck, CodeViolation};

const BUILDER_SYSTEM_PROMPT: &str = r#"You are an expert engineer who implements multi-agent systems.
You answer with a single source file and nothing else."#;

/// Generates code for the approved blueprint.
///
/// Code that fails validation is retried up to `builder.validation_retries`
/// times with the validator's reason in the prompt; once exhausted the phase
/// fails with `CodeValidation`.
pub async fn run_builder_phase(
    state: &WorkflowState,
    ctx: &mut PhaseContext<'_>,
) -> Result<StateCommand, FactoryError> {
    let blueprint = state
        .blueprint()
        .ok_or_else(|| FactoryError::invalid_input("cannot build without a blueprint"))?;
    let check = ctx.config.code_check();
    let retries = ctx.config.builder.validation_retries;
    let mut violation: Option<CodeViolation> = None;

    for attempt in 0..=retries {
        let prompt = build_builder_prompt(blueprint, &check, violation.as_ref());
        let request = GenerationRequest::new(TaskKind::CodeGeneration, prompt)
            .with_system_prompt(BUILDER_SYSTEM_PROMPT);
        let output = ctx.generate_with_retry(&request).await?;

        match validate_code(&output, &check) {
            Ok(code) => {
                tracing::info!("builder produced {} bytes of {}", code.len(), check.language);
                return Ok(StateCommand::CompleteBuild { code });
            }
            Err(v) => {
                tracing::warn!(
                    "generated code rejected (attempt {}/{}): {}",
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
        .unwrap_or_else(|| "no valid code produced".to_string());
    Err(FactoryError::CodeValidation { detail })
}

pub fn build_builder_prompt(
    blueprint: &StructuredBlueprint,
    check: &CodeCheck,
    violation: Option<&CodeViolation>,
) -> String {
    let mut builder = PromptBuilder::new()
        .phase("building")
        .instructions(&format!(
            "Implement the multi-agent system described by the blueprint as a single {} module.",
            check.language.display_name()
        ))
        .input("entry-point", &check.entry_point)
        .document("blueprint", &blueprint.to_json_pretty());

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
        .constraint(&format!(
            "Bind `{}` at module top level; it is what gets loaded and invoked with a query",
            check.entry_point
        ))
        .constraint("Implement every agent in the blueprint and honour its dependencies")
        .constraint("Never embed API keys, tokens or passwords; read them from environment variables")
        .constraint("Respond with the source code only")
        .build()
}
