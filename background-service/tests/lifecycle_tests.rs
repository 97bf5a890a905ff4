use async_trait::async_trait;
use background_service::{LifecycleController, PollSettings};
use database::KeyValueCache;
use notifier::{BoundSink, MessageSink, NotificationSink};
use std::collections::{BTreeMap, VecDeque};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tweetwatch_core::{
    CoreError, NotifierConfig, NotifyError, Record, SearchApiError, SearchFilter, SearchMeta,
    SearchResult,
};
use tokio::sync::Notify;
use twitter_client::{QueryOptions, SearchQuery, SearchTransport};

const TICK: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(5);

/// Replays canned responses in order, then keeps answering with empty pages.
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<SearchResult, CoreError>>>,
    queries: Mutex<Vec<SearchQuery>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<SearchResult, CoreError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            queries: Mutex::new(Vec::new()),
        })
    }

    fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().unwrap().clone()
    }

    fn fetch_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchTransport for ScriptedTransport {
    async fn fetch(&self, query: &SearchQuery) -> Result<SearchResult, CoreError> {
        self.queries.lock().unwrap().push(query.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SearchResult::default()))
    }
}

/// Records delivered messages and rejects any message containing "fail".
#[derive(Clone, Default)]
struct RecordingSink {
    delivered: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    fn bound(&self) -> Arc<dyn MessageSink> {
        Arc::new(BoundSink::new(self.clone(), ()))
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    type Args = ();

    fn kind(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, message: &str, _args: &()) -> Result<(), CoreError> {
        if message.contains("fail") {
            return Err(NotifyError::DeliveryFailed {
                sink: "recording".to_string(),
                reason: "scripted failure".to_string(),
            }
            .into());
        }
        self.delivered.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Holds its first fetch until released and tracks how many fetches overlap.
#[derive(Default)]
struct GatedTransport {
    gate: Notify,
    gated: AtomicBool,
    entered: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl GatedTransport {
    fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl SearchTransport for GatedTransport {
    async fn fetch(&self, _query: &SearchQuery) -> Result<SearchResult, CoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.entered.fetch_add(1, Ordering::SeqCst);

        let first = !self.gated.swap(true, Ordering::SeqCst);
        if first {
            self.gate.notified().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if first {
            Ok(page(Some("500"), vec![record("500", Some("same tweet"))]))
        } else {
            Ok(SearchResult::default())
        }
    }
}

async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn temp_cache() -> Arc<KeyValueCache> {
    let dir = env::temp_dir().join(format!("test_tweetwatch_{}", uuid::Uuid::new_v4()));
    Arc::new(KeyValueCache::new(dir))
}

fn settings(interval: Duration) -> PollSettings {
    PollSettings {
        interval,
        options: QueryOptions::default(),
    }
}

fn filter() -> SearchFilter {
    SearchFilter::new(vec!["oil".to_string()], vec!["markets".to_string()])
}

fn record(id: &str, text: Option<&str>) -> Record {
    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), id.to_string());
    if let Some(text) = text {
        fields.insert("text".to_string(), text.to_string());
    }
    Record::from(fields)
}

fn page(newest_id: Option<&str>, data: Vec<Record>) -> SearchResult {
    SearchResult {
        meta: SearchMeta {
            newest_id: newest_id.map(str::to_string),
            result_count: data.len() as u32,
            ..Default::default()
        },
        data,
    }
}

async fn wait_for_polls(controller: &LifecycleController, polls: u64) {
    tokio::time::timeout(WAIT, async {
        while controller.status().await.stats.polls < polls {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("poll loop did not reach expected poll count");
}

#[tokio::test]
async fn test_cursor_only_moves_forward() {
    let cache = temp_cache();
    cache.set_cursor("100").await.unwrap();

    let transport = ScriptedTransport::new(vec![
        Ok(page(Some("150"), vec![record("150", Some("oil up"))])),
        Ok(page(Some("120"), vec![record("120", Some("oil down"))])),
    ]);
    let controller = LifecycleController::new(transport.clone(), cache.clone(), settings(TICK));

    controller
        .start_with_sink(filter(), RecordingSink::default().bound())
        .await
        .unwrap();
    wait_for_polls(&controller, 3).await;
    controller.stop().await.unwrap();

    assert_eq!(cache.get_cursor().await.unwrap(), Some("150".to_string()));

    let queries = transport.queries();
    assert_eq!(queries[0].since_id.as_deref(), Some("100"));
    assert_eq!(queries[1].since_id.as_deref(), Some("150"));
    assert_eq!(queries[2].since_id.as_deref(), Some("150"));
    assert_eq!(queries[0].query, "(oil)(from:markets)");
}

#[tokio::test]
async fn test_delivers_texts_in_order_and_skips_empty() {
    let sink = RecordingSink::default();
    let transport = ScriptedTransport::new(vec![Ok(page(
        Some("12"),
        vec![
            record("12", Some("first")),
            record("11", None),
            record("10", Some("")),
            record("9", Some("second")),
        ],
    ))]);
    let controller = LifecycleController::new(transport, temp_cache(), settings(TICK));

    controller.start_with_sink(filter(), sink.bound()).await.unwrap();
    wait_for_polls(&controller, 1).await;
    controller.stop().await.unwrap();

    assert_eq!(sink.delivered(), vec!["first", "second"]);
    let status = controller.status().await;
    assert_eq!(status.stats.notifications_sent, 2);
    assert_eq!(status.last_result.unwrap().data.len(), 4);
}

#[tokio::test]
async fn test_failed_delivery_does_not_stop_remaining_records() {
    let sink = RecordingSink::default();
    let transport = ScriptedTransport::new(vec![Ok(page(
        Some("3"),
        vec![
            record("3", Some("before")),
            record("2", Some("please fail")),
            record("1", Some("after")),
        ],
    ))]);
    let cache = temp_cache();
    let controller = LifecycleController::new(transport, cache.clone(), settings(TICK));

    controller.start_with_sink(filter(), sink.bound()).await.unwrap();
    wait_for_polls(&controller, 1).await;
    controller.stop().await.unwrap();

    assert_eq!(sink.delivered(), vec!["before", "after"]);
    let stats = controller.status().await.stats;
    assert_eq!(stats.notifications_sent, 2);
    assert_eq!(stats.notify_failures, 1);
    assert_eq!(cache.get_cursor().await.unwrap(), Some("3".to_string()));
}

#[tokio::test]
async fn test_fetch_failure_keeps_polling() {
    let sink = RecordingSink::default();
    let transport = ScriptedTransport::new(vec![
        Err(SearchApiError::ServerError { status_code: 503 }.into()),
        Ok(page(Some("7"), vec![record("7", Some("recovered"))])),
    ]);
    let cache = temp_cache();
    let controller = LifecycleController::new(transport.clone(), cache.clone(), settings(TICK));

    controller.start_with_sink(filter(), sink.bound()).await.unwrap();
    wait_for_polls(&controller, 2).await;
    assert!(controller.is_running().await);
    controller.stop().await.unwrap();

    let stats = controller.status().await.stats;
    assert_eq!(stats.failed_polls, 1);
    assert!(stats.last_success_at.is_some());
    assert_eq!(sink.delivered(), vec!["recovered"]);
    assert_eq!(cache.get_cursor().await.unwrap(), Some("7".to_string()));
    assert_eq!(transport.queries()[1].since_id, None);
}

#[tokio::test]
async fn test_noop_sink_still_advances_cursor() {
    let transport = ScriptedTransport::new(vec![Ok(page(
        Some("42"),
        vec![record("42", Some("quiet"))],
    ))]);
    let cache = temp_cache();
    let controller = LifecycleController::new(transport, cache.clone(), settings(TICK));

    controller
        .start(filter(), Some(NotifierConfig::None))
        .await
        .unwrap();
    wait_for_polls(&controller, 1).await;
    controller.stop().await.unwrap();

    assert_eq!(controller.status().await.stats.notifications_sent, 0);
    assert_eq!(cache.get_cursor().await.unwrap(), Some("42".to_string()));
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let transport = ScriptedTransport::new(vec![]);
    let controller = LifecycleController::new(transport, temp_cache(), settings(TICK));

    controller.start(filter(), None).await.unwrap();
    let other = SearchFilter::new(vec!["gold".to_string()], vec![]);
    let err = controller.start(other.clone(), None).await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyRunning));
    assert_eq!(controller.status().await.filter, Some(filter()));

    controller.stop().await.unwrap();
    assert!(!controller.is_running().await);

    controller.start(other.clone(), None).await.unwrap();
    assert_eq!(controller.status().await.filter, Some(other));
    controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_when_idle_is_rejected() {
    let controller =
        LifecycleController::new(ScriptedTransport::new(vec![]), temp_cache(), settings(TICK));
    assert!(matches!(
        controller.stop().await,
        Err(CoreError::NotRunning)
    ));
}

#[tokio::test]
async fn test_no_fetch_after_stop() {
    let transport = ScriptedTransport::new(vec![]);
    let controller = LifecycleController::new(transport.clone(), temp_cache(), settings(TICK));

    controller.start(filter(), None).await.unwrap();
    wait_for_polls(&controller, 2).await;
    controller.stop().await.unwrap();

    let count = transport.fetch_count();
    tokio::time::sleep(TICK * 4).await;
    assert_eq!(transport.fetch_count(), count);
    assert!(!controller.status().await.running);
}

#[tokio::test]
async fn test_first_poll_is_immediate() {
    let transport = ScriptedTransport::new(vec![]);
    let controller = LifecycleController::new(
        transport.clone(),
        temp_cache(),
        settings(Duration::from_secs(3600)),
    );

    controller.start(filter(), None).await.unwrap();
    wait_for_polls(&controller, 1).await;
    controller.stop().await.unwrap();

    assert_eq!(transport.fetch_count(), 1);
}

#[tokio::test]
async fn test_invalid_filter_is_rejected() {
    let transport = ScriptedTransport::new(vec![]);
    let controller = LifecycleController::new(transport.clone(), temp_cache(), settings(TICK));

    let err = controller
        .start(SearchFilter::new(vec![], vec![]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert!(!controller.is_running().await);
    assert_eq!(transport.fetch_count(), 0);
}

#[tokio::test]
async fn test_zero_interval_is_rejected() {
    let controller = LifecycleController::new(
        ScriptedTransport::new(vec![]),
        temp_cache(),
        settings(Duration::ZERO),
    );
    let err = controller.start(filter(), None).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert!(!controller.is_running().await);
}

#[tokio::test]
async fn test_slack_without_token_fails_to_start() {
    if env::var(notifier::SLACK_TOKEN_ENV).is_ok() {
        return;
    }
    let controller =
        LifecycleController::new(ScriptedTransport::new(vec![]), temp_cache(), settings(TICK));

    let err = controller
        .start(
            filter(),
            Some(NotifierConfig::Slack {
                channel_id: "C123".to_string(),
                attachment: None,
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
    assert!(!controller.is_running().await);
}

#[tokio::test]
async fn test_search_terms_are_cached_and_bootstrapped() {
    let cache = temp_cache();
    let controller =
        LifecycleController::new(ScriptedTransport::new(vec![]), cache.clone(), settings(TICK));

    let filter = SearchFilter::from_comma_separated("oil, central bank", vec![]);
    controller.start(filter, None).await.unwrap();
    wait_for_polls(&controller, 2).await;
    controller.stop().await.unwrap();

    let expected = Some(vec!["oil".to_string(), "central bank".to_string()]);
    assert_eq!(controller.cached_search_terms().await.unwrap(), expected);
    assert_eq!(controller.status().await.cached_search_terms, expected);

    let restarted =
        LifecycleController::bootstrap(ScriptedTransport::new(vec![]), cache, settings(TICK))
            .await;
    assert_eq!(restarted.status().await.cached_search_terms, expected);
    assert!(!restarted.is_running().await);
}

#[tokio::test]
async fn test_status_exports_json() {
    let controller =
        LifecycleController::new(ScriptedTransport::new(vec![]), temp_cache(), settings(TICK));
    let json = controller.status().await.export_json().unwrap();
    assert!(json.contains("\"running\": false"));
}

#[tokio::test]
async fn test_concurrent_starts_admit_exactly_one() {
    let controller = Arc::new(LifecycleController::new(
        ScriptedTransport::new(vec![]),
        temp_cache(),
        settings(TICK),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.start(filter(), None).await })
        })
        .collect();

    let mut started = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => started += 1,
            Err(CoreError::AlreadyRunning) => rejected += 1,
            Err(e) => panic!("unexpected start error: {e}"),
        }
    }
    assert_eq!(started, 1);
    assert_eq!(rejected, 7);

    controller.stop().await.unwrap();
    assert!(matches!(controller.stop().await, Err(CoreError::NotRunning)));
}

#[tokio::test]
async fn test_start_during_stop_waits_for_old_loop() {
    let transport = Arc::new(GatedTransport::default());
    let sink = RecordingSink::default();
    let controller = Arc::new(LifecycleController::new(
        transport.clone(),
        temp_cache(),
        settings(TICK),
    ));

    controller.start_with_sink(filter(), sink.bound()).await.unwrap();
    wait_until(|| transport.entered.load(Ordering::SeqCst) >= 1).await;

    let stopper = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.stop().await })
    };
    tokio::time::timeout(WAIT, async {
        while !controller.status().await.stopping {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("controller never entered stopping phase");

    let err = controller
        .start_with_sink(filter(), sink.bound())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AlreadyRunning));

    transport.release();
    stopper.await.unwrap().unwrap();
    let status = controller.status().await;
    assert!(!status.running);
    assert!(!status.stopping);

    controller.start_with_sink(filter(), sink.bound()).await.unwrap();
    wait_for_polls(&controller, 1).await;
    controller.stop().await.unwrap();

    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(sink.delivered(), vec!["same tweet"]);
}
