//! Parsing of clang/gcc textual diagnostics.
//!
//! Both drivers print one diagnostic per line as
//! `file:line:col: severity: message`, optionally without the column, or with
//! the driver name in place of a location (`clang++: error: ...`). Source
//! excerpts, caret lines, include stacks and summary lines are ignored, even
//! when the echoed source itself contains text like `": error: "`.

use crate::diagnostic::Diagnostic;
use crate::location::SourceLocation;
use crate::severity::Severity;
use std::path::PathBuf;

/// Keywords recognised between the location prefix and the message.
/// `fatal error` must come before `error` so it wins on equal positions.
const KEYWORDS: &[&str] = &["fatal error", "error", "warning", "note", "remark"];

/// Parses the complete stderr text of one compiler run.
///
/// Notes are attached to the preceding non-note diagnostic; a note with
/// nothing before it is kept as a standalone `Note` diagnostic.
pub fn parse_compiler_output(text: &str) -> Vec<Diagnostic> {
    let mut out: Vec<Diagnostic> = Vec::new();
    for line in text.lines() {
        let Some((prefix, severity, message)) = split_line(line) else {
            continue;
        };
        if severity == Severity::Note {
            if let Some(last) = out.last_mut() {
                last.notes.push(message.to_string());
                continue;
            }
        }
        let mut diag = Diagnostic::new(severity, message);
        diag.location = prefix.and_then(parse_location);
        out.push(diag);
    }
    out
}

/// Splits a line into (location prefix, severity, message).
fn split_line(line: &str) -> Option<(Option<&str>, Severity, &str)> {
    let line = line.trim_end();

    // Unprefixed form: "error: linker command failed".
    for &kw in KEYWORDS {
        if let Some(rest) = line.strip_prefix(kw).and_then(|r| r.strip_prefix(": ")) {
            return Some((None, Severity::from_keyword(kw)?, rest));
        }
    }

    let mut best: Option<(usize, &str)> = None;
    for &kw in KEYWORDS {
        let needle = format!(": {kw}: ");
        if let Some(pos) = line.find(&needle) {
            if best.map_or(true, |(b, _)| pos < b) {
                best = Some((pos, kw));
            }
        }
    }
    let (pos, kw) = best?;
    let prefix = &line[..pos];
    if !is_diagnostic_prefix(prefix) {
        return None;
    }
    let message = &line[pos + kw.len() + 4..];
    Some((Some(prefix), Severity::from_keyword(kw)?, message))
}

/// A real diagnostic starts at column 0 with `file:line[:col]` or a driver
/// name. Echoed source and gutter lines fail both tests.
fn is_diagnostic_prefix(prefix: &str) -> bool {
    if prefix.is_empty() || prefix.starts_with(char::is_whitespace) {
        return false;
    }
    parse_location(prefix).is_some() || is_driver_name(prefix)
}

/// `clang++`, `/usr/bin/g++-12`, `cc1plus`, `ld`.
fn is_driver_name(prefix: &str) -> bool {
    prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '+'))
}

/// Parses `file:line[:col]`; a bare driver name yields no location.
fn parse_location(prefix: &str) -> Option<SourceLocation> {
    let mut parts = prefix.rsplitn(3, ':');
    let last = parts.next()?;
    let middle = parts.next()?;
    match (middle.parse::<u32>(), last.parse::<u32>()) {
        (Ok(line), Ok(column)) => Some(SourceLocation {
            file: PathBuf::from(parts.next()?),
            line,
            column: Some(column),
        }),
        (Err(_), Ok(line)) => {
            // "file:line"; re-join in case the file name itself contains a colon.
            let file = match parts.next() {
                Some(head) => format!("{head}:{middle}"),
                None => middle.to_string(),
            };
            Some(SourceLocation {
                file: PathBuf::from(file),
                line,
                column: None,
            })
        }
        _ => None,
    }
}
