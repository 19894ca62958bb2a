//! Alert delivery
//!
//! The sweep hands each due notification to an [`AlertSink`]. Delivery is
//! one-way: sinks report nothing back and must not fail the sweep.

use std::process::{Command, Stdio};
use tracing::{info, warn};

/// Title and body shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Presents alerts to the user.
pub trait AlertSink: Send + Sync {
    /// Show an alert. Fire-and-forget.
    fn show(&self, alert: &Alert);
}

/// Writes alerts to the log instead of the desktop.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn show(&self, alert: &Alert) {
        info!(title = %alert.title, body = %alert.body, "alert");
    }
}

/// Launches an external notifier per alert, passing title and body as the
/// last two arguments (`notify-send <title> <body>` by default).
#[derive(Debug, Clone)]
pub struct CommandAlertSink {
    program: String,
    args: Vec<String>,
}

impl Default for CommandAlertSink {
    fn default() -> Self {
        Self::new("notify-send")
    }
}

impl CommandAlertSink {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before the title and body.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, alert: &Alert) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&alert.title)
            .arg(&alert.body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

impl AlertSink for CommandAlertSink {
    fn show(&self, alert: &Alert) {
        match self.command(alert).spawn() {
            Ok(mut child) => {
                // Reap off-thread so the sweep never waits on the notifier.
                std::thread::spawn(move || {
                    if let Err(e) = child.wait() {
                        warn!(error = %e, "alert command did not exit cleanly");
                    }
                });
            }
            Err(e) => warn!(program = %self.program, error = %e, "failed to launch alert command"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_arguments() {
        let sink = CommandAlertSink::new("notify-send").with_args(["--app-name", "duewatch"]);
        let command = sink.command(&Alert::new("Taxes", "Notification from Taxes"));
        let args: Vec<_> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(command.get_program(), "notify-send");
        assert_eq!(
            args,
            vec!["--app-name", "duewatch", "Taxes", "Notification from Taxes"]
        );
    }

    #[test]
    fn test_missing_program_does_not_panic() {
        let sink = CommandAlertSink::new("duewatch-definitely-not-installed");
        sink.show(&Alert::new("t", "b"));
    }

    #[test]
    fn test_log_sink_does_not_panic() {
        LogAlertSink.show(&Alert::new("t", "b"));
    }
}
