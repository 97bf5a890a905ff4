use crate::state::SharedState;
use chrono::Utc;
use database::KeyValueCache;
use notifier::MessageSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tweetwatch_core::{CoreError, ErrorExt, ErrorReporter, SearchFilter, SearchResult};
use twitter_client::{QueryBuilder, QueryOptions, SearchTransport};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3 * 60);

/// Everything a loop needs to know about its subscription. Fixed for the
/// lifetime of the loop.
#[derive(Debug, Clone)]
pub struct PollParams {
    pub filter: SearchFilter,
    pub interval: Duration,
    pub options: QueryOptions,
}

/// What a single fetch-and-notify step did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub fetched: bool,
    pub cursor_advanced: bool,
    pub delivered: usize,
    pub failed_deliveries: usize,
}

pub struct PollLoop {
    query: QueryBuilder,
    interval: Duration,
    transport: Arc<dyn SearchTransport>,
    cache: Arc<KeyValueCache>,
    sink: Arc<dyn MessageSink>,
    state: SharedState,
    generation: u64,
    reporter: ErrorReporter,
}

impl PollLoop {
    pub fn new(
        params: PollParams,
        transport: Arc<dyn SearchTransport>,
        cache: Arc<KeyValueCache>,
        sink: Arc<dyn MessageSink>,
        state: SharedState,
        generation: u64,
    ) -> Result<Self, CoreError> {
        if params.interval.is_zero() {
            return Err(CoreError::validation("poll interval must be greater than zero"));
        }
        Ok(Self {
            query: QueryBuilder::new(params.filter, params.options)?,
            interval: params.interval,
            transport,
            cache,
            sink,
            state,
            generation,
            reporter: ErrorReporter::new(),
        })
    }

    /// Polls once right away, then on every tick until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "Started polling tweets with params [interval: {:?}, kw: {:?}, users: {:?}]",
            self.interval,
            self.query.filter().keywords,
            self.query.filter().users
        );

        self.poll_once().await;
        self.remember_search_terms().await;

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Ended polling tweets");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }

        self.state.lock().await.finish(self.generation);
    }

    pub async fn poll_once(&self) -> PollOutcome {
        let mut outcome = PollOutcome::default();
        let cursor = self.read_cursor().await;
        let query = self.query.build(cursor.as_deref());

        let result = match self.transport.fetch(&query).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Poll failed, will retry on next tick: {}", e);
                self.reporter.report_error(&e);
                let mut state = self.state.lock().await;
                state.stats.polls += 1;
                state.stats.failed_polls += 1;
                state.stats.last_poll_at = Some(Utc::now());
                return outcome;
            }
        };
        outcome.fetched = true;

        match result.newest_id() {
            Some(newest_id) => match self.cache.set_cursor(newest_id).await {
                Ok(advanced) => outcome.cursor_advanced = advanced,
                Err(e) => self.reporter.report_error(&e),
            },
            None => debug!("Result has no newest id, skip storing newest id"),
        }

        let (delivered, failed) = self.deliver(&result).await;
        outcome.delivered = delivered;
        outcome.failed_deliveries = failed;

        let now = Utc::now();
        let mut state = self.state.lock().await;
        state.stats.polls += 1;
        state.stats.notifications_sent += delivered as u64;
        state.stats.notify_failures += failed as u64;
        state.stats.last_poll_at = Some(now);
        state.stats.last_success_at = Some(now);
        state.last_result = Some(result);

        outcome
    }

    async fn deliver(&self, result: &SearchResult) -> (usize, usize) {
        if self.sink.is_noop() {
            return (0, 0);
        }

        let mut delivered = 0;
        let mut failed = 0;
        for text in result.texts() {
            match self.sink.deliver(text).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    warn!("Failed to notify {} sink: {}", self.sink.kind(), e);
                    e.log_error();
                }
            }
        }
        (delivered, failed)
    }

    // A cursor that cannot be read is treated like no cursor at all.
    async fn read_cursor(&self) -> Option<String> {
        match self.cache.get_cursor().await {
            Ok(cursor) => cursor,
            Err(e) => {
                self.reporter.report_warning(&e);
                None
            }
        }
    }

    async fn remember_search_terms(&self) {
        let keywords = &self.query.filter().keywords;
        if let Err(e) = self.cache.set_search_terms(keywords).await {
            self.reporter.report_error(&e);
        }
        match self.cache.get_search_terms().await {
            Ok(terms) => self.state.lock().await.cached_search_terms = terms,
            Err(e) => self.reporter.report_warning(&e),
        }
    }
}
