//! Notification sinks for matching posts.
//!
//! A [`NotificationSink`] knows how to deliver a message given its own typed
//! arguments. [`build_sink`] turns a [`NotifierConfig`] into a [`MessageSink`],
//! a sink with its arguments already bound, which is what the poller holds.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use tweetwatch_core::{CoreError, NotifierConfig};

pub mod desktop;
pub mod slack;

pub use desktop::{DesktopArgs, DesktopNotifier};
pub use slack::{SlackArgs, SlackNotifier, SLACK_TOKEN_ENV};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    type Args: Send + Sync;

    fn kind(&self) -> &'static str;

    fn is_noop(&self) -> bool {
        false
    }

    async fn notify(&self, message: &str, args: &Self::Args) -> Result<(), CoreError>;
}

/// A sink with its arguments bound, usable as a trait object.
#[async_trait]
pub trait MessageSink: Send + Sync {
    fn kind(&self) -> &'static str;

    /// No-op sinks let callers skip the delivery step entirely.
    fn is_noop(&self) -> bool {
        false
    }

    async fn deliver(&self, message: &str) -> Result<(), CoreError>;
}

pub struct BoundSink<S: NotificationSink> {
    sink: S,
    args: S::Args,
}

impl<S: NotificationSink> BoundSink<S> {
    pub fn new(sink: S, args: S::Args) -> Self {
        Self { sink, args }
    }

    pub fn args(&self) -> &S::Args {
        &self.args
    }
}

#[async_trait]
impl<S: NotificationSink> MessageSink for BoundSink<S> {
    fn kind(&self) -> &'static str {
        self.sink.kind()
    }

    fn is_noop(&self) -> bool {
        self.sink.is_noop()
    }

    async fn deliver(&self, message: &str) -> Result<(), CoreError> {
        self.sink.notify(message, &self.args).await
    }
}

/// Used when no downstream target is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    type Args = ();

    fn kind(&self) -> &'static str {
        "none"
    }

    fn is_noop(&self) -> bool {
        true
    }

    async fn notify(&self, _message: &str, _args: &()) -> Result<(), CoreError> {
        Ok(())
    }
}

pub fn noop_sink() -> Arc<dyn MessageSink> {
    Arc::new(BoundSink::new(NoopNotifier, ()))
}

/// Builds the sink selected by `config`. Credentials are resolved here, so a
/// missing Slack token fails before any polling starts.
pub fn build_sink(config: &NotifierConfig) -> Result<Arc<dyn MessageSink>, CoreError> {
    let sink: Arc<dyn MessageSink> = match config {
        NotifierConfig::None => noop_sink(),
        NotifierConfig::Slack {
            channel_id,
            attachment,
        } => Arc::new(BoundSink::new(
            SlackNotifier::from_env()?,
            SlackArgs {
                channel_id: channel_id.clone(),
                attachment: attachment.clone(),
            },
        )),
        NotifierConfig::Desktop {
            summary,
            timeout_ms,
        } => Arc::new(BoundSink::new(
            DesktopNotifier::new(),
            DesktopArgs {
                summary: summary.clone(),
                timeout_ms: *timeout_ms,
            },
        )),
    };
    info!("Using {} notifier", sink.kind());
    Ok(sink)
}
