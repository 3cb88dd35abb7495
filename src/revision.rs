//! Revision loop controller.
//!
//! Turns a human approval decision into the outcome the orchestrator commits,
//! applying the iteration cap.

use crate::error::FactoryError;
use serde::{Deserialize, Serialize};

/// What happens when a revision is requested at the cap.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RevisionCapPolicy {
    /// Approve the last valid blueprint and record a warning.
    #[default]
    ForceApprove,
    /// Fail the workflow with `RevisionLimitExceeded`.
    Fail,
}

impl RevisionCapPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionCapPolicy::ForceApprove => "force_approve",
            RevisionCapPolicy::Fail => "fail",
        }
    }
}

impl std::str::FromStr for RevisionCapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "force_approve" => Ok(RevisionCapPolicy::ForceApprove),
            "fail" => Ok(RevisionCapPolicy::Fail),
            other => Err(format!(
                "unknown revision limit policy '{}' (expected force_approve or fail)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevisionConfig {
    /// Revisions allowed before the cap policy applies. Default: 5
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
    #[serde(default)]
    pub on_limit: RevisionCapPolicy,
}

fn default_max_revisions() -> u32 {
    5
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
            on_limit: RevisionCapPolicy::default(),
        }
    }
}

/// A human decision on the current blueprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Revise { feedback: String },
}

/// What the orchestrator should commit for a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionOutcome {
    Approve,
    Revise { feedback: String },
    /// Cap reached under `force_approve`.
    ForceApprove { warning: String },
    /// Cap reached under `fail`.
    LimitExceeded { revisions: u32 },
}

/// Decides the outcome of `decision` given the revisions already made.
///
/// The cap applies when a revise arrives and `revision_count` already equals
/// `max_revisions`; approvals are never capped.
///
/// # Errors
/// Returns `InvalidInput` for empty revision feedback.
pub fn decide(
    decision: ApprovalDecision,
    revision_count: u32,
    config: &RevisionConfig,
) -> Result<RevisionOutcome, FactoryError> {
    let feedback = match decision {
        ApprovalDecision::Approve => return Ok(RevisionOutcome::Approve),
        ApprovalDecision::Revise { feedback } => feedback,
    };
    let feedback = feedback.trim();
    if feedback.is_empty() {
        return Err(FactoryError::invalid_input(
            "revision feedback must not be empty",
        ));
    }

    if revision_count < config.max_revisions {
        return Ok(RevisionOutcome::Revise {
            feedback: feedback.to_string(),
        });
    }

    Ok(match config.on_limit {
        RevisionCapPolicy::ForceApprove => RevisionOutcome::ForceApprove {
            warning: format!(
                "revision limit of {} reached; approved the current blueprint without applying feedback: {}",
                config.max_revisions, feedback
            ),
        },
        RevisionCapPolicy::Fail => RevisionOutcome::LimitExceeded {
            revisions: revision_count,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: u32, on_limit: RevisionCapPolicy) -> RevisionConfig {
        RevisionConfig {
            max_revisions: max,
            on_limit,
        }
    }

    fn revise(feedback: &str) -> ApprovalDecision {
        ApprovalDecision::Revise {
            feedback: feedback.to_string(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = RevisionConfig::default();
        assert_eq!(config.max_revisions, 5);
        assert_eq!(config.on_limit, RevisionCapPolicy::ForceApprove);
    }

    #[test]
    fn test_approve_is_never_capped() {
        let config = config(1, RevisionCapPolicy::Fail);
        assert_eq!(
            decide(ApprovalDecision::Approve, 7, &config).unwrap(),
            RevisionOutcome::Approve
        );
    }

    #[test]
    fn test_revise_below_cap() {
        let config = config(2, RevisionCapPolicy::Fail);
        assert_eq!(
            decide(revise("  more agents "), 1, &config).unwrap(),
            RevisionOutcome::Revise {
                feedback: "more agents".to_string()
            }
        );
    }

    #[test]
    fn test_cap_force_approve() {
        let config = config(2, RevisionCapPolicy::ForceApprove);
        match decide(revise("more agents"), 2, &config).unwrap() {
            RevisionOutcome::ForceApprove { warning } => {
                assert!(warning.contains("revision limit of 2"));
                assert!(warning.contains("more agents"));
            }
            other => panic!("expected forced approval, got {:?}", other),
        }
    }

    #[test]
    fn test_cap_fail() {
        let config = config(2, RevisionCapPolicy::Fail);
        assert_eq!(
            decide(revise("more agents"), 2, &config).unwrap(),
            RevisionOutcome::LimitExceeded { revisions: 2 }
        );
    }

    #[test]
    fn test_empty_feedback() {
        let config = RevisionConfig::default();
        assert!(matches!(
            decide(revise(" \n"), 0, &config),
            Err(FactoryError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "force-approve".parse::<RevisionCapPolicy>(),
            Ok(RevisionCapPolicy::ForceApprove)
        );
        assert_eq!("FAIL".parse::<RevisionCapPolicy>(), Ok(RevisionCapPolicy::Fail));
        assert!("retry".parse::<RevisionCapPolicy>().is_err());

        let config: RevisionConfig = serde_yaml::from_str("on_limit: fail").unwrap();
        assert_eq!(config.on_limit, RevisionCapPolicy::Fail);
        assert_eq!(config.max_revisions, 5);
    }
}
