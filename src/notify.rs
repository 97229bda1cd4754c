//! Desktop notifications for single-snippet runs.
//!
//! Notifications are best effort. A missing notifier binary or a failed call
//! is logged and otherwise ignored.

use crate::writer::WrittenSnippet;
use std::process::Command;
use tracing::{debug, warn};

const TITLE: &str = "Snippet Generator";

/// A notification message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Title line
    pub title: String,
    /// Body text
    pub message: String,
}

impl Notice {
    /// A snippet was written.
    #[must_use]
    pub fn created(snippet: &WrittenSnippet) -> Self {
        Self {
            title: TITLE.to_string(),
            message: format!(
                "Created '{}' ({}) in {}",
                snippet.name, snippet.keyword, snippet.collection
            ),
        }
    }

    /// The user stopped before anything was written.
    #[must_use]
    pub fn cancelled(reason: &str) -> Self {
        Self {
            title: TITLE.to_string(),
            message: format!("Cancelled: {reason}"),
        }
    }

    /// The run failed.
    #[must_use]
    pub fn failed(error: &str) -> Self {
        Self {
            title: TITLE.to_string(),
            message: format!("Failed: {error}"),
        }
    }
}

/// Shows notifications.
pub trait Notifier {
    /// Shows `notice`. Must not fail the caller.
    fn notify(&self, notice: &Notice);
}

/// Uses `osascript` on macOS and `notify-send` elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, notice: &Notice) {
        let mut command = notify_command(notice);
        match command.output() {
            Ok(output) if output.status.success() => debug!("Notification sent"),
            Ok(output) => warn!(
                "Notification command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => warn!("Could not send notification: {}", e),
        }
    }
}

#[cfg(target_os = "macos")]
fn notify_command(notice: &Notice) -> Command {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape_applescript(&notice.message),
        escape_applescript(&notice.title)
    );
    let mut command = Command::new("osascript");
    command.arg("-e").arg(script);
    command
}

#[cfg(not(target_os = "macos"))]
fn notify_command(notice: &Notice) -> Command {
    let mut command = Command::new("notify-send");
    command.arg(&notice.title).arg(&notice.message);
    command
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn written() -> WrittenSnippet {
        WrittenSnippet {
            path: PathBuf::from("Git/git_log5_A.json"),
            uid: "A".into(),
            collection: "Git".into(),
            name: "Git: Pretty Log".into(),
            keyword: "git_log5".into(),
            replaced: None,
        }
    }

    #[test]
    fn test_notice_messages() {
        assert_eq!(
            Notice::created(&written()).message,
            "Created 'Git: Pretty Log' (git_log5) in Git"
        );
        assert!(Notice::cancelled("duplicate keyword").message.starts_with("Cancelled"));
        assert!(Notice::failed("boom").message.contains("boom"));
    }

    #[test]
    fn test_escape_applescript() {
        assert_eq!(escape_applescript(r#"say "hi" \ bye"#), r#"say \"hi\" \\ bye"#);
    }

    #[test]
    fn test_notify_command_program() {
        let command = notify_command(&Notice::created(&written()));
        let program = command.get_program().to_string_lossy().to_string();

        if cfg!(target_os = "macos") {
            assert_eq!(program, "osascript");
        } else {
            assert_eq!(program, "notify-send");
        }
    }
}
