use crate::poll_loop::{PollLoop, PollParams, DEFAULT_INTERVAL};
use crate::state::{new_shared_state, ControllerState, PollStats, SharedState, StatusSnapshot};
use database::KeyValueCache;
use notifier::MessageSink;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tweetwatch_core::{CoreError, ErrorExt, NotifierConfig, SearchConfig, SearchFilter};
use twitter_client::{QueryOptions, SearchTransport};

/// Interval and query options applied to every subscription.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub options: QueryOptions,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            options: QueryOptions::default(),
        }
    }
}

impl From<&SearchConfig> for PollSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            interval: config.interval(),
            options: QueryOptions::from(config),
        }
    }
}

/// Start/stop gate for the poll loop. At most one loop runs at a time; the
/// running flag, cancellation handle and status snapshot all live behind one
/// lock.
pub struct LifecycleController {
    state: SharedState,
    transport: Arc<dyn SearchTransport>,
    cache: Arc<KeyValueCache>,
    settings: PollSettings,
}

impl LifecycleController {
    pub fn new(
        transport: Arc<dyn SearchTransport>,
        cache: Arc<KeyValueCache>,
        settings: PollSettings,
    ) -> Self {
        Self {
            state: new_shared_state(),
            transport,
            cache,
            settings,
        }
    }

    /// Like [`LifecycleController::new`], seeding the snapshot with the search
    /// terms cached by a previous run.
    pub async fn bootstrap(
        transport: Arc<dyn SearchTransport>,
        cache: Arc<KeyValueCache>,
        settings: PollSettings,
    ) -> Self {
        let controller = Self::new(transport, cache, settings);
        match controller.cache.get_search_terms().await {
            Ok(terms) => controller.state.lock().await.cached_search_terms = terms,
            Err(e) => {
                e.log_warn();
            }
        }
        controller
    }

    pub async fn start(
        &self,
        filter: SearchFilter,
        notifier_config: Option<NotifierConfig>,
    ) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        ensure_idle(&state)?;
        filter.validate()?;

        let sink = notifier::build_sink(&notifier_config.unwrap_or_default())?;
        self.launch(&mut state, filter, sink)
    }

    /// Starts polling with an already constructed sink.
    pub async fn start_with_sink(
        &self,
        filter: SearchFilter,
        sink: Arc<dyn MessageSink>,
    ) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        ensure_idle(&state)?;
        filter.validate()?;
        self.launch(&mut state, filter, sink)
    }

    fn launch(
        &self,
        state: &mut ControllerState,
        filter: SearchFilter,
        sink: Arc<dyn MessageSink>,
    ) -> Result<(), CoreError> {
        let generation = state.generation + 1;
        let params = PollParams {
            filter: filter.clone(),
            interval: self.settings.interval,
            options: self.settings.options.clone(),
        };
        let poll_loop = PollLoop::new(
            params,
            Arc::clone(&self.transport),
            Arc::clone(&self.cache),
            sink,
            Arc::clone(&self.state),
            generation,
        )?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop.run(cancel.clone()));

        state.generation = generation;
        state.running = true;
        state.cancel = Some(cancel);
        state.task = Some(task);
        state.filter = Some(filter);
        state.stats = PollStats::default();

        info!("Success: Started polling tweets");
        Ok(())
    }

    /// Cancels the running loop and waits for its in-flight step to finish.
    /// Until the loop has exited the controller stays in the stopping phase and
    /// rejects new starts.
    pub async fn stop(&self) -> Result<(), CoreError> {
        let (task, generation) = {
            let mut state = self.state.lock().await;
            let Some(cancel) = state.cancel.take() else {
                warn!("Stop requested but polling is not running");
                return Err(CoreError::NotRunning);
            };
            cancel.cancel();
            state.running = false;
            state.stopping = true;
            (state.task.take(), state.generation)
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Poll loop ended abnormally: {}", e);
            }
        }

        // a panicked loop never reaches its own cleanup
        self.state.lock().await.finish(generation);

        info!("Success: Stopped polling tweets");
        Ok(())
    }

    pub async fn status(&self) -> StatusSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    pub async fn cached_search_terms(&self) -> Result<Option<Vec<String>>, CoreError> {
        self.cache.get_search_terms().await
    }

    pub async fn cached_cursor(&self) -> Result<Option<String>, CoreError> {
        self.cache.get_cursor().await
    }
}

fn ensure_idle(state: &ControllerState) -> Result<(), CoreError> {
    if !state.is_idle() {
        warn!("Subscription already started or still stopping");
        return Err(CoreError::AlreadyRunning);
    }
    Ok(())
}
