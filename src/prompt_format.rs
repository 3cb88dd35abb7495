//! XML-style prompt formatting helpers.
//!
//! Every generation prompt has the same shape: instructions first, then the
//! request inputs, any attached documents, constraints and the expected output
//! format, wrapped in a single `<user-prompt>` root tag.

/// Wraps content in an XML tag with the given name.
///
/// # Example
/// ```
/// use agent_factory::prompt_format::xml_tag;
/// assert_eq!(xml_tag("phase", "consulting"), "<phase>consulting</phase>");
/// ```
pub fn xml_tag(name: &str, content: &str) -> String {
    format!("<{}>{}</{}>", name, content, name)
}

/// Wraps content in an XML tag on its own lines, without escaping.
///
/// Used for blocks that carry literal markup or JSON.
///
/// # Example
/// ```
/// use agent_factory::prompt_format::xml_tag_raw;
/// let output = xml_tag_raw("previous-blueprint", "{\"system_name\": \"Shop\"}");
/// assert!(output.starts_with("<previous-blueprint>\n{"));
/// ```
pub fn xml_tag_raw(name: &str, content: &str) -> String {
    format!("<{}>\n{}\n</{}>", name, content.trim(), name)
}

/// Escapes XML special characters in user-supplied values.
///
/// # Example
/// ```
/// use agent_factory::prompt_format::xml_escape;
/// assert_eq!(xml_escape("a < b & c"), "a &lt; b &amp; c");
/// ```
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Builder for XML-structured prompts.
///
/// Section order is fixed: phase, instructions, inputs, documents,
/// constraints, output-format.
#[derive(Default)]
pub struct PromptBuilder {
    phase: Option<String>,
    instructions: Option<String>,
    inputs: Vec<(String, String)>,
    documents: Vec<(String, String)>,
    constraints: Vec<String>,
    output_format: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the phase name (e.g., "consulting", "building").
    pub fn phase(mut self, phase: &str) -> Self {
        self.phase = Some(phase.to_string());
        self
    }

    pub fn instructions(mut self, instructions: &str) -> Self {
        self.instructions = Some(instructions.to_string());
        self
    }

    /// Adds a user-supplied value; the value is escaped.
    pub fn input(mut self, label: &str, value: &str) -> Self {
        self.inputs.push((label.to_string(), xml_escape(value)));
        self
    }

    /// Adds a raw block such as a JSON document or a validator report.
    pub fn document(mut self, label: &str, content: &str) -> Self {
        self.documents.push((label.to_string(), content.to_string()));
        self
    }

    pub fn constraint(mut self, constraint: &str) -> Self {
        self.constraints.push(constraint.to_string());
        self
    }

    /// Sets the output format section (raw, for literal examples).
    pub fn output_format(mut self, format: &str) -> Self {
        self.output_format = Some(format.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut sections = Vec::new();

        if let Some(phase) = &self.phase {
            sections.push(xml_tag("phase", phase));
        }

        if let Some(instructions) = &self.instructions {
            sections.push(xml_tag_raw("instructions", instructions));
        }

        if !self.inputs.is_empty() {
            let inputs_content: Vec<String> = self
                .inputs
                .iter()
                .map(|(label, value)| xml_tag(label, value))
                .collect();
            sections.push(xml_tag_raw("inputs", &inputs_content.join("\n")));
        }

        for (label, content) in &self.documents {
            sections.push(xml_tag_raw(label, content));
        }

        if !self.constraints.is_empty() {
            let constraints_content = self
                .constraints
                .iter()
                .map(|c| format!("- {}", c))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(xml_tag_raw("constraints", &constraints_content));
        }

        if let Some(output_format) = &self.output_format {
            sections.push(xml_tag_raw("output-format", output_format));
        }

        format!("<user-prompt>\n{}\n</user-prompt>", sections.join("\n"))
    }
}

#[cfg(test)]
#[path = "tests/prompt_format_tests.rs"]
mod tests;
