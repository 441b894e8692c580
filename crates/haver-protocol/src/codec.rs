//! Escaping and framing of tab-delimited command lines.
//!
//! A line is a sequence of fields separated by TAB. The first field is the
//! command token, the rest are arguments. Any byte that would break the
//! framing (TAB, newline, carriage return, NUL) is replaced by ESC followed
//! by a letter. ESC itself is escaped too, so a literal ESC in the input can
//! never be mistaken for the start of a sequence.
//!
//! | char   | escaped |
//! |--------|---------|
//! | `\t`   | ESC `t` |
//! | ESC    | ESC `e` |
//! | `\n`   | ESC `n` |
//! | `\r`   | ESC `r` |
//! | `\0`   | ESC `z` |

use crate::ProtocolError;

const ESC: char = '\x1b';
const SEPARATOR: char = '\t';

fn escape_code(c: char) -> Option<char> {
    match c {
        '\t' => Some('t'),
        ESC => Some('e'),
        '\n' => Some('n'),
        '\r' => Some('r'),
        '\0' => Some('z'),
        _ => None,
    }
}

fn unescape_code(c: char) -> Option<char> {
    match c {
        't' => Some('\t'),
        'e' => Some(ESC),
        'n' => Some('\n'),
        'r' => Some('\r'),
        'z' => Some('\0'),
        _ => None,
    }
}

/// Escapes one field.
///
/// Works in a single left-to-right pass over the original string, so
/// escape sequences produced here are never rescanned.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match escape_code(c) {
            Some(code) => {
                out.push(ESC);
                out.push(code);
            }
            None => out.push(c),
        }
    }
    out
}

/// Reverses [`escape`].
///
/// # Errors
/// Returns [`ProtocolError::UnknownEscape`] if ESC is followed by a letter
/// outside the table, or [`ProtocolError::DanglingEscape`] if the field
/// ends with a bare ESC.
pub fn unescape(s: &str) -> Result<String, ProtocolError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != ESC {
            out.push(c);
            continue;
        }
        let code = chars.next().ok_or(ProtocolError::DanglingEscape)?;
        let original =
            unescape_code(code).ok_or(ProtocolError::UnknownEscape(code))?;
        out.push(original);
    }
    Ok(out)
}

/// Joins a command and its arguments into one escaped line (no terminator).
pub fn deparse<S: AsRef<str>>(cmd: &str, args: &[S]) -> String {
    let mut line = escape(cmd);
    for arg in args {
        line.push(SEPARATOR);
        line.push_str(&escape(arg.as_ref()));
    }
    line
}

/// Splits a received line into its command and unescaped arguments.
///
/// The line must already be stripped of its terminator.
///
/// # Errors
/// Returns [`ProtocolError::EmptyLine`] for an empty line, or an escape
/// error from [`unescape`] if any field is malformed.
pub fn parse(line: &str) -> Result<(String, Vec<String>), ProtocolError> {
    if line.is_empty() {
        return Err(ProtocolError::EmptyLine);
    }
    let mut fields = line.split(SEPARATOR).map(unescape);
    // `split` always yields at least one item.
    let cmd = fields.next().unwrap_or_else(|| Ok(String::new()))?;
    let args = fields.collect::<Result<Vec<_>, _>>()?;
    Ok((cmd, args))
}

/// Returns `true` if `token` matches `^[A-Z][A-Z:]*$`.
pub fn is_command_token(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {
            chars.all(|c| c.is_ascii_uppercase() || c == ':')
        }
        _ => false,
    }
}
