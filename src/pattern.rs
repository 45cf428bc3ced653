//! Text patterns used by routes to match request fields.
//!
//! A pattern is either a literal value, a regular expression or the
//! wildcard [`ANY`]. Literals compare for equality, regexes search anywhere
//! in the text, and the wildcard accepts everything.

use std::fmt;

use regex::Regex;

/// Wildcard pattern that matches any text.
pub const ANY: Pattern = Pattern::Any;

/// Matcher for a single text field of a request.
#[derive(Debug, Clone, Default)]
pub enum Pattern {
    /// Matches any text.
    #[default]
    Any,
    /// Matches text exactly equal to the value.
    Literal(String),
    /// Matches text in which the expression finds at least one match.
    Regex(Regex),
}

impl Pattern {
    /// Create a literal pattern.
    ///
    /// # Parameters
    ///
    /// - `value` - Exact text to match
    ///
    /// # Returns
    ///
    /// Returns a new `Pattern::Literal`.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Compile a regex pattern.
    ///
    /// # Parameters
    ///
    /// - `expr` - Regular expression source
    ///
    /// # Returns
    ///
    /// Returns a new `Pattern::Regex`.
    ///
    /// # Errors
    ///
    /// Returns error if the expression is not a valid regex.
    pub fn regex(expr: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(expr)?))
    }

    /// Check if this pattern matches the given text.
    ///
    /// # Parameters
    ///
    /// - `text` - Text to test against
    ///
    /// # Returns
    ///
    /// Returns `true` if the literal equals the text, the regex finds a match
    /// within the text, or the pattern is the wildcard.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Literal(value) => value == text,
            Self::Regex(re) => re.is_match(text),
        }
    }

    /// Whether this is the wildcard pattern.
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Lower-case a literal pattern, leaving regexes and the wildcard as-is.
    ///
    /// Host and method fields are compared case-insensitively, so their
    /// literals are stored lower-cased.
    pub(crate) fn into_lowercase(self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.to_lowercase()),
            other => other,
        }
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Self::literal(value)
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Self::Regex(re)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("ANY"),
            Self::Literal(value) => write!(f, "{value:?}"),
            Self::Regex(re) => write!(f, "re({:?})", re.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test literal patterns require exact equality.
    #[test]
    fn test_literal_pattern() {
        let pattern = Pattern::literal("foo.com");
        assert!(pattern.matches("foo.com"));
        assert!(!pattern.matches("www.foo.com"));
        assert!(!pattern.matches("FOO.COM"));
    }

    /// Test regex patterns use search semantics rather than full match.
    #[test]
    fn test_regex_pattern_searches() {
        let pattern = Pattern::regex("apple").expect("valid regex");
        assert!(pattern.matches("fruit=pineapple"));
        assert!(!pattern.matches("fruit=banana"));

        let anchored = Pattern::regex("^/api/").expect("valid regex");
        assert!(anchored.matches("/api/v1"));
        assert!(!anchored.matches("/v1/api/"));
    }

    /// Test the wildcard accepts anything, including empty text.
    #[test]
    fn test_any_pattern() {
        assert!(ANY.matches(""));
        assert!(ANY.matches("anything at all"));
        assert!(ANY.is_any());
        assert!(!Pattern::literal("x").is_any());
    }

    /// Test lower-casing only touches literals.
    #[test]
    fn test_into_lowercase() {
        let pattern = Pattern::literal("GET").into_lowercase();
        assert!(pattern.matches("get"));

        let re = Pattern::regex("G.T").expect("valid regex").into_lowercase();
        assert!(re.matches("GET"));
        assert!(!re.matches("get"));
    }

    /// Test invalid regex sources are rejected.
    #[test]
    fn test_invalid_regex() {
        assert!(Pattern::regex("(unclosed").is_err());
    }

    /// Test display output used in verification messages.
    #[test]
    fn test_display() {
        assert_eq!(ANY.to_string(), "ANY");
        assert_eq!(Pattern::literal("/a").to_string(), "\"/a\"");
        assert_eq!(Pattern::regex("a.c").expect("valid regex").to_string(), "re(\"a.c\")");
    }
}
