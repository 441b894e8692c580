//! The recoverable failure value.

use std::fmt;

/// A recoverable failure: a dotted kind such as `existing.entity` plus an
/// ordered list of arguments.
///
/// Handlers return this through `Result` instead of unwinding. The session
/// turns it into `FAIL <cmd> <kind> <args...>` and the connection carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fail {
    /// Failure kind, e.g. `unknown.entity`.
    pub kind: String,
    /// Kind-specific arguments, in wire order.
    pub args: Vec<String>,
}

impl Fail {
    /// Creates a failure with no arguments.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Returns `true` if this failure is of the given kind.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Fail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Fail {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_argument_order() {
        let fail = Fail::new("arity").arg("1-2").args(["3", "extra"]);
        assert_eq!(fail.kind, "arity");
        assert_eq!(fail.args, vec!["1-2", "3", "extra"]);
    }

    #[test]
    fn test_display_joins_with_spaces() {
        let fail = Fail::new("unknown.entity").args(["room", "lobby"]);
        assert_eq!(fail.to_string(), "unknown.entity room lobby");
        assert!(fail.is("unknown.entity"));
        assert!(!fail.is("existing.entity"));
    }
}
