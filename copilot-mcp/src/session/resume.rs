//! Conversation-ID extraction from free-text CLI output.
//!
//! The Copilot CLI does not expose its continuation token through a stable
//! interface, so we scan its output with an ordered list of matchers. The
//! list is a pluggable strategy: new output formats get a new matcher, call
//! sites stay untouched.

use std::sync::LazyLock;

use regex::Regex;

static DEFAULT_MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)conversation[:\s]+([a-zA-Z0-9_-]+)").expect("valid pattern"),
        Regex::new(r"(?i)session[:\s]+([a-zA-Z0-9_-]+)").expect("valid pattern"),
        Regex::new(r"(?i)resume[:\s]+([a-zA-Z0-9_-]+)").expect("valid pattern"),
    ]
});

/// The built-in matcher list, in priority order.
pub fn default_matchers() -> &'static [Regex] {
    &DEFAULT_MATCHERS
}

/// Extract a continuation token using the default matchers. First match wins.
pub fn parse_conversation_id(output: &str) -> Option<String> {
    parse_conversation_id_with(default_matchers(), output)
}

/// Extract a continuation token using a caller-supplied matcher list.
pub fn parse_conversation_id_with(matchers: &[Regex], output: &str) -> Option<String> {
    matchers
        .iter()
        .find_map(|re| re.captures(output))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_conversation_token() {
        let output = "Done.\nconversation: conv_abc-123\n";
        assert_eq!(parse_conversation_id(output).as_deref(), Some("conv_abc-123"));
    }

    #[test]
    fn falls_through_matcher_order() {
        assert_eq!(
            parse_conversation_id("resume: tok99").as_deref(),
            Some("tok99")
        );
        assert_eq!(
            parse_conversation_id("Session: S_456").as_deref(),
            Some("S_456")
        );
    }

    #[test]
    fn earlier_matcher_wins_over_later() {
        let output = "session: second\nconversation: first";
        assert_eq!(parse_conversation_id(output).as_deref(), Some("first"));
    }

    #[test]
    fn absent_token_yields_none() {
        assert!(parse_conversation_id("plain answer text").is_none());
    }

    #[test]
    fn custom_matchers_are_honored() {
        let matchers = vec![Regex::new(r"continue with ([0-9]+)").unwrap()];
        assert_eq!(
            parse_conversation_id_with(&matchers, "continue with 777").as_deref(),
            Some("777")
        );
    }
}
