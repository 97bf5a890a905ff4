use crate::NotificationSink;
use async_trait::async_trait;
use notify_rust::{Notification, Timeout};
use tracing::{debug, error};
use tweetwatch_core::{CoreError, NotifyError};

#[derive(Debug, Clone, PartialEq)]
pub struct DesktopArgs {
    pub summary: String,
    pub timeout_ms: Option<u32>,
}

/// Shows matching posts as local desktop notifications.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            app_name: "tweetwatch".to_string(),
        }
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for DesktopNotifier {
    type Args = DesktopArgs;

    fn kind(&self) -> &'static str {
        "desktop"
    }

    async fn notify(&self, message: &str, args: &DesktopArgs) -> Result<(), CoreError> {
        let mut notification = Notification::new();
        notification
            .appname(&self.app_name)
            .summary(&args.summary)
            .body(message);
        if let Some(ms) = args.timeout_ms {
            notification.timeout(Timeout::Milliseconds(ms));
        }

        // the platform backends block, keep them off the runtime threads
        let shown = tokio::task::spawn_blocking(move || notification.show().map(|_| ()))
            .await
            .map_err(|e| NotifyError::DeliveryFailed {
                sink: "desktop".to_string(),
                reason: e.to_string(),
            })?;

        shown.map_err(|e| {
            error!("Desktop notification failed: {}", e);
            CoreError::Notify(NotifyError::DeliveryFailed {
                sink: "desktop".to_string(),
                reason: e.to_string(),
            })
        })?;
        debug!("Desktop notification shown");
        Ok(())
    }
}
