//! Extracts the `FUNCTION_CALL:` directive from model output.
//!
//! The directive is one line of the form `FUNCTION_CALL: name|value|value|...`.
//! Everything before the marker is the explanation shown to the user;
//! anything after the directive line is discarded. Values are not escaped,
//! so a `|` inside a value splits it into two arguments.

use courier_core::types::Directive;

pub const DIRECTIVE_MARKER: &str = "FUNCTION_CALL:";

/// Model output split into user-facing text and an optional directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub explanation: String,
    pub directive: Option<Directive>,
}

pub fn parse_response(text: &str) -> ParsedResponse {
    let Some((before, after)) = text.split_once(DIRECTIVE_MARKER) else {
        return ParsedResponse {
            explanation: text.trim().to_string(),
            directive: None,
        };
    };

    // The directive ends at the next marker or line break, whichever is first.
    let segment = after.split(DIRECTIVE_MARKER).next().unwrap_or_default();
    let line = segment.trim().lines().next().unwrap_or_default().trim();
    let mut fields = line.split('|').map(str::trim);
    let tool_name = fields.next().unwrap_or_default().to_string();
    let raw_arguments = fields.map(str::to_string).collect();

    ParsedResponse {
        explanation: before.trim().to_string(),
        directive: Some(Directive {
            tool_name,
            raw_arguments,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_has_no_directive() {
        let parsed = parse_response("  You have three unread emails.\n");
        assert_eq!(parsed.explanation, "You have three unread emails.");
        assert!(parsed.directive.is_none());
    }

    #[test]
    fn directive_fields_are_trimmed_and_trailing_lines_dropped() {
        let parsed = parse_response(
            "I'll check that.\n[REASONING TYPE: Analysis]\nFUNCTION_CALL: foo | a |b\nextra text\nFUNCTION_CALL: bar|c",
        );
        assert_eq!(parsed.explanation, "I'll check that.\n[REASONING TYPE: Analysis]");
        let directive = parsed.directive.unwrap();
        assert_eq!(directive.tool_name, "foo");
        assert_eq!(directive.raw_arguments, vec!["a", "b"]);
    }

    #[test]
    fn directive_without_arguments() {
        let parsed = parse_response("FUNCTION_CALL: read-unread");
        assert_eq!(parsed.explanation, "");
        let directive = parsed.directive.unwrap();
        assert_eq!(directive.tool_name, "read-unread");
        assert!(directive.raw_arguments.is_empty());
    }

    #[test]
    fn empty_fields_are_kept_positionally() {
        let parsed = parse_response("FUNCTION_CALL: send-email|a@b.com||body");
        assert_eq!(
            parsed.directive.unwrap().raw_arguments,
            vec!["a@b.com", "", "body"]
        );
    }

    #[test]
    fn pipe_inside_value_splits_it() {
        let parsed = parse_response("FUNCTION_CALL: send-email|a@b.com|Hi|yes | no");
        assert_eq!(
            parsed.directive.unwrap().raw_arguments,
            vec!["a@b.com", "Hi", "yes", "no"]
        );
    }

    #[test]
    fn directive_may_start_on_the_next_line() {
        let parsed = parse_response("Checking.\nFUNCTION_CALL:\n  read-unread|3\nmore");
        let directive = parsed.directive.unwrap();
        assert_eq!(directive.tool_name, "read-unread");
        assert_eq!(directive.raw_arguments, vec!["3"]);
    }

    #[test]
    fn second_marker_on_same_line_ends_the_directive() {
        let parsed = parse_response("FUNCTION_CALL: a|1 FUNCTION_CALL: b|2");
        let directive = parsed.directive.unwrap();
        assert_eq!(directive.tool_name, "a");
        assert_eq!(directive.raw_arguments, vec!["1"]);
    }

    #[test]
    fn unknown_tool_name_still_parses() {
        let parsed = parse_response("Sure.\nFUNCTION_CALL: launch-rockets|now");
        assert_eq!(parsed.directive.unwrap().tool_name, "launch-rockets");
    }
}
