//! Output validators for the Architect and Builder phases.
//!
//! Validators are pure: they never panic on malformed input and never run
//! generated code. Failures are structured values whose `Display` output is
//! written to be pasted back into a retry prompt.

pub mod blueprint;
pub mod code;
pub mod extract;
mod python;
pub mod secrets;

pub use blueprint::{validate_blueprint, BlueprintViolation};
pub use code::{validate_code, CodeCheck, CodeViolation, TargetLanguage};
pub use extract::{extract_json_object, strip_code_fences};
