use regex::Regex;
use std::borrow::Cow;

/// Replacement for every redacted match.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Scrubs configured-sensitive substrings from outgoing text.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    pattern: Option<Regex>,
}

impl Redactor {
    pub fn new(pattern: Option<Regex>) -> Self {
        Self { pattern }
    }

    pub fn disabled() -> Self {
        Self { pattern: None }
    }

    /// Replace every match with [`REDACTED_PLACEHOLDER`].
    ///
    /// Borrows `text` unchanged when there is no pattern or no match.
    pub fn redact<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match &self.pattern {
            Some(re) => re.replace_all(text, regex::NoExpand(REDACTED_PLACEHOLDER)),
            None => Cow::Borrowed(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_redactor_borrows_input() {
        let redactor = Redactor::disabled();
        assert!(matches!(redactor.redact("secret"), Cow::Borrowed("secret")));
    }

    #[test]
    fn test_every_match_is_replaced() {
        let redactor = Redactor::new(Some(Regex::new(r"AKIA[0-9A-Z]{4}").unwrap()));
        let out = redactor.redact("a=AKIA1234 b=AKIAABCD");
        assert_eq!(out, "a=[REDACTED] b=[REDACTED]");
    }

    #[test]
    fn test_no_match_is_unmodified() {
        let redactor = Redactor::new(Some(Regex::new("password").unwrap()));
        let out = redactor.redact("let total = a + b;");
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, "let total = a + b;");
    }

    #[test]
    fn test_whole_match_is_replaced_with_capture_groups() {
        let redactor = Redactor::new(Some(Regex::new(r"(token)=\w+").unwrap()));
        assert_eq!(redactor.redact("token=abc"), REDACTED_PLACEHOLDER);
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let redactor = Redactor::new(Some(Regex::new(r"sk-\w+").unwrap()));
        let once = redactor.redact("key sk-123").into_owned();
        let twice = redactor.redact(&once).into_owned();
        assert_eq!(once, twice);
    }
}
