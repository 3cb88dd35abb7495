//! Removal of incidental formatting around model output.

use regex::Regex;

/// Unwraps an outer fenced code block, or returns the trimmed input.
///
/// The opening fence is the first line starting with ```` ``` ```` (optional
/// language tag) and the closing fence is the last bare ```` ``` ```` line
/// after it, so fences nested inside the block (e.g. in a string literal)
/// stay part of the body. Prose before the opening fence is tolerated only
/// when it closes every quote and bracket it opens; otherwise the fence
/// belongs to the content and nothing is unwrapped.
pub fn strip_code_fences(output: &str) -> String {
    let opening = Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*$")
        .expect("regex to match an opening code fence line");
    let closing = Regex::new(r"^```[ \t]*$").expect("regex to match a closing code fence line");

    let lines: Vec<&str> = output.lines().collect();
    let Some(open) = lines.iter().position(|line| opening.is_match(line)) else {
        return output.trim().to_string();
    };
    let Some(close) = lines.iter().rposition(|line| closing.is_match(line)) else {
        return output.trim().to_string();
    };
    if close <= open || !is_leading_prose(&lines[..open]) {
        return output.trim().to_string();
    }

    lines[open + 1..close].join("\n").trim_matches('\n').to_string()
}

/// True when `lines` cannot be the start of code that the fence continues.
fn is_leading_prose(lines: &[&str]) -> bool {
    let text = lines.join("\n");
    let count = |c: char| text.chars().filter(|&x| x == c).count();
    count('"') % 2 == 0
        && text.matches("'''").count() % 2 == 0
        && count('{') == count('}')
        && count('[') == count(']')
        && count('(') == count(')')
}

/// Extracts the outermost JSON object from model output.
///
/// Fences are stripped first; any prose left around the object is dropped by
/// taking the span from the first `{` to the last `}`.
pub fn extract_json_object(output: &str) -> Option<String> {
    let stripped = strip_code_fences(output);
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end < start {
        return None;
    }
    stripped.get(start..=end).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        let output = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(output), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fence_with_surrounding_prose() {
        let output = "Here is the code:\n\n```python\nroot_agent = 1\n```\n\nLet me know!";
        assert_eq!(strip_code_fences(output), "root_agent = 1");
    }

    #[test]
    fn test_strip_untagged_fence() {
        let output = "```\nprint('hi')\n```";
        assert_eq!(strip_code_fences(output), "print('hi')");
    }

    #[test]
    fn test_no_fence_returns_trimmed_input() {
        assert_eq!(strip_code_fences("  plain text \n"), "plain text");
    }

    #[test]
    fn test_unterminated_fence_is_left_alone() {
        let output = "```json\n{\"a\": 1}";
        assert_eq!(strip_code_fences(output), output);
    }

    #[test]
    fn test_inner_fence_stays_in_body() {
        let output = "```python\nPROMPT = \"\"\"Reply as:\n```json\n{}\n```\n\"\"\"\nroot_agent = PROMPT\n```\n";
        assert_eq!(
            strip_code_fences(output),
            "PROMPT = \"\"\"Reply as:\n```json\n{}\n```\n\"\"\"\nroot_agent = PROMPT"
        );
    }

    #[test]
    fn test_fence_inside_unfenced_code_is_left_alone() {
        let output = "DOC = \"\"\"Example:\n```\nprint(1)\n```\n\"\"\"\nroot_agent = DOC\n";
        assert_eq!(strip_code_fences(output), output.trim());
    }

    #[test]
    fn test_fence_inside_json_value_is_left_alone() {
        let output = "{\"role\": [\n```\n\"x\"\n```\n]}";
        assert_eq!(strip_code_fences(output), output);
    }

    #[test]
    fn test_trailing_prose_after_fence() {
        let output = "Sure:\n```json\n{\"a\": 1}\n```\nTell me if it needs changes.";
        assert_eq!(strip_code_fences(output), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_object_drops_prose() {
        let output = "Sure! The blueprint is {\"system_name\": \"X\"} as requested.";
        assert_eq!(
            extract_json_object(output).as_deref(),
            Some("{\"system_name\": \"X\"}")
        );
    }

    #[test]
    fn test_extract_json_object_missing() {
        assert!(extract_json_object("no braces here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
    }
}
