//! Desktop notifications for pulls and pushes
//!
//! Notifications are handed to a background task through a bounded queue.
//! The request that produced one never waits for it and never sees its
//! outcome; delivery failures are logged by the background task.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Action shown for pulls
pub const ACTION_COPY: &str = "复制";
/// Action shown for pushes
pub const ACTION_PASTE: &str = "粘贴";

/// Notification errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The notification sink rejected the notification
    #[error("Notification failed: {0}")]
    Delivery(String),
}

/// A notification ready to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    /// Build a notification for `action` performed by `client`.
    ///
    /// An empty `summary` becomes "<action>内容为空".
    pub fn new(action: &str, client: &str, summary: &str) -> Self {
        let body = if summary.is_empty() {
            format!("{}内容为空", action)
        } else {
            summary.to_string()
        };

        Self {
            title: format!("{}自 {}", action, client),
            body,
        }
    }

    /// A client pulled the local clipboard
    pub fn copy(client: &str, summary: &str) -> Self {
        Self::new(ACTION_COPY, client, summary)
    }

    /// A client pushed into the local clipboard
    pub fn paste(client: &str, summary: &str) -> Self {
        Self::new(ACTION_PASTE, client, summary)
    }
}

/// Notification sink
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show a notification
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Notifier that writes notifications to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        info!(title, body, "notification");
        Ok(())
    }
}

/// Sender half of the notification queue
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: Option<mpsc::Sender<Notification>>,
}

impl NotificationQueue {
    /// Start a background task delivering notifications to `notifier`.
    ///
    /// Must be called from within a tokio runtime. The task ends once every
    /// clone of the queue has been dropped.
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<Notification>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                if let Err(e) = notifier
                    .notify(&notification.title, &notification.body)
                    .await
                {
                    warn!(
                        title = %notification.title,
                        body = %notification.body,
                        "Failed to send notification: {}",
                        e
                    );
                }
            }
            debug!("Notification queue closed");
        });

        (
            Self {
                sender: Some(sender),
            },
            handle,
        )
    }

    /// A queue that discards everything
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Hand a notification to the background task without waiting
    pub fn push(&self, notification: Notification) {
        let Some(sender) = &self.sender else {
            return;
        };

        if let Err(e) = sender.try_send(notification) {
            warn!("Dropping notification: {}", e);
        }
    }
}
