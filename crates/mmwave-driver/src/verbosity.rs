use std::str::FromStr;
use tracing::Level;

/// Driver log threshold, passed through on open. Driver events below it are
/// not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl From<Verbosity> for Level {
    fn from(v: Verbosity) -> Self {
        match v {
            Verbosity::Debug => Level::DEBUG,
            Verbosity::Info => Level::INFO,
            Verbosity::Warning => Level::WARN,
            Verbosity::Error => Level::ERROR,
        }
    }
}

impl Verbosity {
    /// Whether an event at `level` passes this threshold.
    pub fn enabled(self, level: Level) -> bool {
        level <= Level::from(self)
    }
}

impl FromStr for Verbosity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Verbosity::Debug),
            "info" => Ok(Verbosity::Info),
            "warn" | "warning" => Ok(Verbosity::Warning),
            "error" => Ok(Verbosity::Error),
            other => anyhow::bail!("unknown verbosity: {}", other),
        }
    }
}
