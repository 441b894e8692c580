//! A decoded command line.

use std::fmt;

use crate::{ProtocolError, codec};

/// One protocol line: a command token followed by its arguments.
///
/// Used in both directions. Handlers build outbound lines with the
/// [`Line::new`] / [`Line::arg`] builder and the transport writes
/// [`Line::to_wire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// The command token, e.g. `JOIN`.
    pub command: String,
    /// Arguments, already unescaped.
    pub args: Vec<String>,
}

impl Line {
    /// Creates a line with no arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
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

    /// Decodes a received line (terminator already stripped).
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let (command, args) = codec::parse(raw)?;
        Ok(Self { command, args })
    }

    /// Encodes the line, escaped, without a terminator.
    pub fn to_wire(&self) -> String {
        codec::deparse(&self.command, &self.args)
    }
}

/// Human-readable form for logs: fields joined by single spaces.
impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_wire_form() {
        let line = Line::new("JOIN").arg("lobby").arg("alice");
        assert_eq!(line.to_wire(), "JOIN\tlobby\talice");
        assert_eq!(line.to_string(), "JOIN lobby alice");
    }

    #[test]
    fn test_decode_round_trip_with_escapes() {
        let line = Line::new("FROM").args(["bob", "say", "tab\there"]);
        let decoded = Line::decode(&line.to_wire()).unwrap();
        assert_eq!(decoded, line);
    }
}
