//! Classification of ngrok diagnostic output
//!
//! In the happy path ngrok writes nothing to stderr, so any output at all is
//! a failure. Known messages map to dedicated errors; rules are checked in
//! order and the first match wins.

use crate::error::TunnelError;

/// Message ngrok prints when another agent session is already running
pub const TOO_MANY_SESSIONS_PATTERN: &str = "is limited to 1 simultaneous ngrok client session";

/// Builds the error for a matched rule from the full output text
pub type ErrorBuilder = fn(&str) -> TunnelError;

/// A substring pattern and the error it maps to
#[derive(Clone)]
pub struct OutputRule {
    pattern: String,
    build: ErrorBuilder,
}

impl OutputRule {
    /// Create a rule
    pub fn new(pattern: impl Into<String>, build: ErrorBuilder) -> Self {
        Self {
            pattern: pattern.into(),
            build,
        }
    }

    /// Substring this rule matches
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn matches(&self, output: &str) -> bool {
        output.contains(&self.pattern)
    }
}

impl std::fmt::Debug for OutputRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputRule")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Ordered set of output rules with an `UnexpectedOutput` fallback
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<OutputRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            rules: vec![OutputRule::new(TOO_MANY_SESSIONS_PATTERN, |_| {
                TunnelError::TooManyConnections
            })],
        }
    }
}

impl Classifier {
    /// Classifier with no rules; everything falls back to `UnexpectedOutput`
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule, checked after the existing ones
    pub fn with_rule(mut self, pattern: impl Into<String>, build: ErrorBuilder) -> Self {
        self.rules.push(OutputRule::new(pattern, build));
        self
    }

    /// Configured rules, in match order
    pub fn rules(&self) -> &[OutputRule] {
        &self.rules
    }

    /// Map captured output to an error.
    ///
    /// Callers must only pass non-empty output.
    pub fn classify(&self, output: &[u8]) -> TunnelError {
        debug_assert!(!output.is_empty(), "classify called with empty output");

        let text = String::from_utf8_lossy(output);
        self.rules
            .iter()
            .find(|rule| rule.matches(&text))
            .map(|rule| (rule.build)(&text))
            .unwrap_or_else(|| TunnelError::UnexpectedOutput(text.trim_end().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_LIMIT_OUTPUT: &[u8] = b"ERROR:  Your account 'someone' is limited to 1 simultaneous ngrok client session.\nERROR:  Active ngrok client sessions in region 'us':\n";

    #[test]
    fn test_too_many_connections() {
        let err = Classifier::default().classify(SESSION_LIMIT_OUTPUT);
        assert!(matches!(err, TunnelError::TooManyConnections));
    }

    #[test]
    fn test_unexpected_output_keeps_text() {
        let err = Classifier::default().classify(b"ERROR: authentication failed\n");
        match err {
            TunnelError::UnexpectedOutput(text) => {
                assert_eq!(text, "ERROR: authentication failed");
            }
            other => panic!("expected UnexpectedOutput, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let err = Classifier::default().classify(&[0xff, 0xfe, b'x']);
        assert!(matches!(err, TunnelError::UnexpectedOutput(text) if text.ends_with('x')));
    }

    #[test]
    fn test_custom_rule() {
        let classifier = Classifier::default().with_rule("authentication failed", |text| {
            TunnelError::UnexpectedOutput(format!("auth: {}", text.trim()))
        });
        assert_eq!(classifier.rules().len(), 2);

        let err = classifier.classify(b"authentication failed");
        assert!(matches!(err, TunnelError::UnexpectedOutput(text) if text.starts_with("auth: ")));
    }

    #[test]
    fn test_first_rule_wins() {
        let classifier = Classifier::empty()
            .with_rule("limited", |_| TunnelError::TooManyConnections)
            .with_rule("limited", |_| TunnelError::AlreadyOpened);
        assert!(matches!(
            classifier.classify(SESSION_LIMIT_OUTPUT),
            TunnelError::TooManyConnections
        ));
    }

    #[test]
    fn test_empty_classifier_falls_back() {
        let err = Classifier::empty().classify(SESSION_LIMIT_OUTPUT);
        assert!(matches!(err, TunnelError::UnexpectedOutput(_)));
    }
}
