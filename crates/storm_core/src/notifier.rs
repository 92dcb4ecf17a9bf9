//! Rate-limited build notifications.

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use storm_store::{MessageRole, Notification, ProjectRepository, Severity};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::CoreResult;

/// Records notifications on a project and mirrors the important ones into
/// its chat transcript.
///
/// Anything but [`Severity::Progress`] is dropped when it arrives within
/// `interval` of the previous notification. Error, success and progress
/// notifications are also appended to the session as system messages.
#[derive(Debug)]
pub struct Notifier {
    repo: ProjectRepository,
    project_id: String,
    interval: Duration,
    last_sent: Mutex<Option<Instant>>,
}

impl Notifier {
    pub fn new(repo: ProjectRepository, project_id: impl Into<String>, interval: Duration) -> Self {
        Self {
            repo,
            project_id: project_id.into(),
            interval,
            last_sent: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Decide whether a notification of `severity` goes out now, and if so
    /// restart the throttle window.
    fn admit(&self, severity: Severity) -> bool {
        let mut last_sent = self.last_sent.lock();
        let now = Instant::now();
        if severity != Severity::Progress {
            if let Some(last) = *last_sent {
                if now.duration_since(last) < self.interval {
                    return false;
                }
            }
        }
        *last_sent = Some(now);
        true
    }

    /// Returns `false` when the notification was throttled.
    pub async fn notify(&self, title: &str, message: &str, severity: Severity) -> CoreResult<bool> {
        if !self.admit(severity) {
            debug!(project_id = %self.project_id, title, "Notification throttled");
            return Ok(false);
        }

        let notification = Notification {
            title: title.to_string(),
            message: message.to_string(),
            severity,
            timestamp: Utc::now(),
        };
        self.repo
            .update_project(&self.project_id, move |p| p.add_notification(notification.clone()))
            .await?;
        info!(project_id = %self.project_id, severity = severity.as_str(), "Notification sent: {} - {}", title, message);

        if matches!(severity, Severity::Error | Severity::Success | Severity::Progress) {
            let text = format!("{} **{}**\n\n{}", severity.icon(), title, message);
            self.repo
                .append_message(&self.project_id, MessageRole::System, text, Vec::new())
                .await?;
        }
        Ok(true)
    }
}
