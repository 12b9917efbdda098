//! Startup configuration, read once when the process launches.

use std::env;
use std::path::PathBuf;

/// Listening port when neither the env var nor a flag overrides it.
pub const DEFAULT_PORT: u16 = 5000;

/// Environment variable that overrides the configured port.
pub const PORT_ENV_VAR: &str = "PYREPL_PORT";

/// Modules imported into every fresh namespace before user code runs.
pub const BASELINE_MODULES: &[&str] = &["json", "math", "re"];

/// Immutable server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listening port (loopback only).
    pub port: u16,
    /// Directory receiving the transcript; logging is disabled when unset.
    pub log_dir: Option<PathBuf>,
    /// Optional session name appended to the transcript file name.
    pub log_name: Option<String>,
    /// Extra modules imported after the baseline set.
    pub extra_modules: Vec<String>,
}

impl ServerConfig {
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            port,
            log_dir: None,
            log_name: None,
            extra_modules: Vec::new(),
        }
    }

    /// Resolve the effective port: `PYREPL_PORT` takes precedence over the
    /// flag default.
    #[must_use]
    pub fn resolve_port(flag_port: u16) -> u16 {
        env::var(PORT_ENV_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(flag_port)
    }

    /// Baseline plus extra modules, deduplicated, baseline first.
    #[must_use]
    pub fn modules(&self) -> Vec<String> {
        let mut modules: Vec<String> = BASELINE_MODULES
            .iter()
            .map(|module| (*module).to_owned())
            .collect();
        for module in &self.extra_modules {
            if !modules.iter().any(|known| known == module) {
                modules.push(module.clone());
            }
        }
        modules
    }
}
