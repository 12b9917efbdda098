//! Append-only transcript of executed snippets.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};

use chrono::Local;
use regex::Regex;

use pyrepl_core::ExecutionOutcome;

static ANSI_ESCAPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("hard-coded pattern")
});

static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-]+").expect("hard-coded pattern"));

/// Session-scoped transcript file.
///
/// The containing directory and the file are created lazily on the first
/// record. Entries are append-only and never rewritten; a write failure is
/// reported on the server's own log and never reaches the caller.
pub struct TranscriptWriter {
    target_dir: PathBuf,
    base_dir: PathBuf,
    path: PathBuf,
    session_name: Option<String>,
    initialized: Mutex<bool>,
}

impl TranscriptWriter {
    /// One file per server session under `<log_dir>/.pyrepl/`, named by
    /// start time plus the optional sanitized session name.
    #[must_use]
    pub fn new(log_dir: &Path, session_name: Option<&str>) -> Self {
        let target_dir = log_dir.join(".pyrepl");
        let mut filename = Local::now().format("%b%d%Y-%H%M%S").to_string();
        if let Some(name) = session_name {
            filename.push('-');
            filename.push_str(&sanitize_name(name));
        }
        filename.push_str(".md");
        Self {
            path: target_dir.join(filename),
            target_dir,
            base_dir: log_dir.to_owned(),
            session_name: session_name.map(str::to_owned),
            initialized: Mutex::new(false),
        }
    }

    /// Where entries are appended.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one executed snippet and its captured output.
    pub fn record(&self, lines: &[String], outcome: &ExecutionOutcome) {
        let code = lines.join("\n");
        let mut content = strip_ansi_codes(&outcome.output);
        let error = strip_ansi_codes(&outcome.error);
        if !error.is_empty() {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(&error);
        }
        if let Err(err) = self.append_entry(&code, &content) {
            tracing::warn!("failed to write transcript {}: {err}", self.path.display());
        }
    }

    /// Append the marker left behind when the scope is reset.
    pub fn record_reset(&self) {
        if let Err(err) = self.append_entry("# Reset Command Received", "Cleared REPL scope") {
            tracing::warn!("failed to write transcript {}: {err}", self.path.display());
        }
    }

    fn append_entry(&self, code: &str, output: &str) -> std::io::Result<()> {
        let mut initialized = self
            .initialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !*initialized {
            fs::create_dir_all(&self.target_dir)?;
            self.write_header()?;
            *initialized = true;
        }
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        write!(
            file,
            "```python\n{code}\n```\n\n<output>\n{}\n</output>\n\n",
            output.trim()
        )
    }

    fn write_header(&self) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        writeln!(file, "# pyrepl session log: {}", Local::now())?;
        writeln!(file, "# CWD: {}", self.base_dir.display())?;
        if let Some(name) = &self.session_name {
            writeln!(file, "# Session Name: {name}")?;
        }
        writeln!(file)
    }
}

/// Remove ANSI escape codes so the transcript stays readable as plain text.
fn strip_ansi_codes(text: &str) -> String {
    ANSI_ESCAPES.replace_all(text, "").into_owned()
}

fn sanitize_name(name: &str) -> String {
    UNSAFE_NAME_CHARS.replace_all(name, "_").into_owned()
}
