use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    config::{Config, ConfigStore},
    errors::Result,
};

mod config;
mod context;
mod generate;
mod jira;
mod review;
mod scaffold;

/// Shared state handed to every process: the loaded configuration plus the
/// store backing it on disk
pub struct AppContext {
    pub config: Config,
    pub store: ConfigStore,
}

/// A trait for any runnable process
pub trait Process {
    /// Executes the process, returning its output
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput>;
}

/// The output of a process execution
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessOutput {
    /// Whether the process succeeded
    pub success: bool,
    /// Content to write to stdout
    pub stdout: Option<String>,
    /// Content to write to stderr
    pub stderr: Option<String>,
}

impl ProcessOutput {
    /// A successful output, with no content yet
    pub fn success() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// A failed output, with no content yet
    pub fn fail() -> Self {
        Self {
            success: false,
            ..Default::default()
        }
    }

    /// Sets the stdout content
    pub fn stdout(mut self, content: impl Into<String>) -> Self {
        self.stdout = Some(content.into());
        self
    }

    /// Sets the stderr content
    pub fn stderr(mut self, content: impl Into<String>) -> Self {
        self.stderr = Some(content.into());
        self
    }
}

/// A spinner shown on stderr while waiting on a provider or Jira call
pub(crate) fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message.into());
    bar.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_output_builders() {
        let out = ProcessOutput::success().stdout("hello").stderr("note");
        assert!(out.success);
        assert_eq!(out.stdout.as_deref(), Some("hello"));
        assert_eq!(out.stderr.as_deref(), Some("note"));

        let out = ProcessOutput::fail();
        assert!(!out.success);
        assert_eq!(out.stdout, None);
    }
}
