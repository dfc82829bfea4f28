use std::str::FromStr;

/// A request header given on the command line as `"<name>: <value>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    /// Text before the first `": "`.
    pub name: String,
    /// Text after the first `": "`, kept as is.
    pub value: String,
}

impl HeaderEntry {
    /// Create a new header entry.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Returned when a header string is not `"<name>: <value>"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid header '{0}', expected \"<header>: <value>\"")]
pub struct ParseHeaderError(String);

impl FromStr for HeaderEntry {
    type Err = ParseHeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(": ") {
            Some((name, value)) if !name.is_empty() => Ok(Self::new(name, value)),
            _ => Err(ParseHeaderError(s.to_string())),
        }
    }
}
