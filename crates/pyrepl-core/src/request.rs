//! Source snippet submitted for execution.

use serde::{Deserialize, Serialize};

/// Ordered source lines submitted by a caller.
///
/// Immutable once accepted. Editors send selections verbatim, so the joined
/// source is dedented before it reaches the interpreter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    lines: Vec<String>,
}

impl ExecutionRequest {
    #[must_use]
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// The raw lines as received.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Joined, dedented source ready for the interpreter.
    #[must_use]
    pub fn source(&self) -> String {
        dedent(&self.lines.join("\n"))
    }

    /// True when there is nothing to execute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.trim().is_empty())
    }
}

/// Strip the longest common leading whitespace from every non-blank line.
fn dedent(source: &str) -> String {
    let prefix = source
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(leading_whitespace)
        .reduce(common_prefix)
        .unwrap_or("");
    if prefix.is_empty() {
        return source.to_owned();
    }
    source
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.strip_prefix(prefix).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn leading_whitespace(line: &str) -> &str {
    let end = line.len() - line.trim_start().len();
    &line[..end]
}

fn common_prefix<'a>(a: &'a str, b: &'a str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(left, right)| left == right)
        .count();
    &a[..len]
}
