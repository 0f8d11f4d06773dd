//! Change notifier: turns the database change feed into listener callbacks.
//!
//! Only changes to the configuration collection reach the listener. Every
//! other change is logged at debug and dropped. Raw change documents are
//! decoded into [`ChangeEvent`] here; nothing past this point sees raw JSON.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::ChangeStream;
use crate::error::ChangeFeedError;
use crate::utils::logging::with_pretty_json_debug;

/// Receives storage notifications. Must return quickly; it runs on the
/// notifier task.
pub trait StorageListener: Send + Sync {
    fn on_config_changed(&self);
}

impl<F> StorageListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_config_changed(&self) {
        self()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub db: Option<String>,
    pub coll: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationType {
    Insert,
    Update,
    Replace,
    Delete,
    #[serde(other)]
    Other,
}

/// A decoded change. Events without a namespace or collection never get this far.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub namespace: Namespace,
    pub operation: OperationType,
    pub document_key: Option<Value>,
    pub document: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChange {
    ns: Option<RawNamespace>,
    operation_type: Option<OperationType>,
    document_key: Option<Value>,
    full_document: Option<Value>,
}

#[derive(Deserialize)]
struct RawNamespace {
    db: Option<String>,
    coll: Option<String>,
}

impl ChangeEvent {
    /// Returns `None` for documents that are not change events or that lack
    /// `ns.coll`.
    pub fn decode(raw: &Value) -> Option<Self> {
        let change = RawChange::deserialize(raw).ok()?;
        let ns = change.ns?;
        Some(Self {
            namespace: Namespace {
                db: ns.db,
                coll: ns.coll?,
            },
            operation: change.operation_type.unwrap_or(OperationType::Other),
            document_key: change.document_key,
            document: change.full_document,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The configuration collection changed; the listener was called.
    Configuration,
    /// Some other collection changed; ignored.
    Observed(String),
    /// Malformed or namespace-less event; ignored.
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Unsubscribed,
    Watching,
    /// The change feed ended or the task died. The notifier stays down until
    /// the next start.
    Dropped,
    /// Shut down through [`NotifierHandle::abort`].
    Stopped,
}

impl WatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WatchState::Watching,
            2 => WatchState::Dropped,
            3 => WatchState::Stopped,
            _ => WatchState::Unsubscribed,
        }
    }
}

pub struct ChangeNotifier {
    listener: Arc<dyn StorageListener>,
    config_collection: String,
}

impl ChangeNotifier {
    pub fn new(listener: Arc<dyn StorageListener>, config_collection: impl Into<String>) -> Self {
        Self {
            listener,
            config_collection: config_collection.into(),
        }
    }

    /// Routes one raw change document.
    pub fn dispatch(&self, raw: &Value) -> Dispatch {
        with_pretty_json_debug(raw, |pretty| debug!(change = pretty, "change event received"));

        let Some(event) = ChangeEvent::decode(raw) else {
            debug!("change event has no namespace, dropped");
            return Dispatch::Dropped;
        };

        if event.namespace.coll == self.config_collection {
            info!(
                collection = %event.namespace.coll,
                operation = ?event.operation,
                "configuration changed"
            );
            let listener = &self.listener;
            if catch_unwind(AssertUnwindSafe(|| listener.on_config_changed())).is_err() {
                warn!(
                    collection = %event.namespace.coll,
                    "configuration listener panicked; still watching"
                );
            }
            Dispatch::Configuration
        } else {
            debug!(collection = %event.namespace.coll, operation = ?event.operation, "change ignored");
            Dispatch::Observed(event.namespace.coll)
        }
    }

    /// Runs the notifier on its own task until the feed ends or the handle
    /// is aborted.
    pub fn spawn(self, mut stream: ChangeStream) -> NotifierHandle {
        let state = Arc::new(AtomicU8::new(WatchState::Watching as u8));
        let task_state = state.clone();
        let task = tokio::spawn(async move {
            info!(collection = %self.config_collection, "watching for changes");
            loop {
                match stream.next().await {
                    Some(Ok(raw)) => {
                        self.dispatch(&raw);
                    }
                    Some(Err(ChangeFeedError::Lagged(skipped))) => {
                        warn!(skipped, "change feed lagged, some changes were not observed");
                    }
                    Some(Err(ChangeFeedError::Closed)) | None => {
                        warn!("{}, notifier stopped", ChangeFeedError::Closed);
                        task_state.store(WatchState::Dropped as u8, Ordering::Release);
                        break;
                    }
                }
            }
        });
        NotifierHandle { task, state }
    }
}

pub struct NotifierHandle {
    task: JoinHandle<()>,
    state: Arc<AtomicU8>,
}

impl NotifierHandle {
    pub fn state(&self) -> WatchState {
        match WatchState::from_u8(self.state.load(Ordering::Acquire)) {
            WatchState::Watching if self.task.is_finished() => WatchState::Dropped,
            state => state,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn abort(&self) {
        self.task.abort();
        let _ = self.state.compare_exchange(
            WatchState::Watching as u8,
            WatchState::Stopped as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::feed::ChangeFeed;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting() -> (Arc<AtomicUsize>, ChangeNotifier) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let listener = move || {
            seen.fetch_add(1, Ordering::SeqCst);
        };
        (calls, ChangeNotifier::new(Arc::new(listener), "configs"))
    }

    #[test]
    fn config_changes_reach_the_listener() {
        let (calls, notifier) = counting();
        let raw = json!({
            "operationType": "replace",
            "ns": {"db": "health", "coll": "configs"},
            "documentKey": {"_id": "main"},
            "fullDocument": {"_id": "main", "setting": 1}
        });
        assert_eq!(notifier.dispatch(&raw), Dispatch::Configuration);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn other_collections_are_ignored() {
        let (calls, notifier) = counting();
        let raw = json!({"operationType": "insert", "ns": {"db": "health", "coll": "users"}});
        assert_eq!(notifier.dispatch(&raw), Dispatch::Observed("users".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn events_without_namespace_are_dropped() {
        let (calls, notifier) = counting();
        for raw in [
            json!({"operationType": "insert"}),
            json!({"operationType": "insert", "ns": {"db": "health"}}),
            json!({"ns": null}),
            json!("not a change"),
        ] {
            assert_eq!(notifier.dispatch(&raw), Dispatch::Dropped, "{raw}");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct PanickingListener(Arc<AtomicUsize>);

    impl StorageListener for PanickingListener {
        fn on_config_changed(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
            panic!("listener failure");
        }
    }

    #[test]
    fn panicking_listener_does_not_escape_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier =
            ChangeNotifier::new(Arc::new(PanickingListener(calls.clone())), "configs");
        let raw = json!({"operationType": "insert", "ns": {"coll": "configs"}});
        assert_eq!(notifier.dispatch(&raw), Dispatch::Configuration);
        assert_eq!(notifier.dispatch(&raw), Dispatch::Configuration);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn abort_moves_to_stopped() {
        let feed = ChangeFeed::new("health");
        let (_, notifier) = counting();
        let handle = notifier.spawn(feed.subscribe());
        assert_eq!(handle.state(), WatchState::Watching);

        handle.abort();
        assert_eq!(handle.state(), WatchState::Stopped);
    }

    #[tokio::test]
    async fn closed_feed_moves_to_dropped() {
        let feed = ChangeFeed::new("health");
        let (_, notifier) = counting();
        let handle = notifier.spawn(feed.subscribe());
        drop(feed);

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("notifier task ends once the feed is gone");
        assert_eq!(handle.state(), WatchState::Dropped);
    }

    #[test]
    fn unknown_operations_decode_as_other() {
        let raw = json!({"operationType": "invalidate", "ns": {"coll": "configs"}});
        let event = ChangeEvent::decode(&raw).unwrap();
        assert_eq!(event.operation, OperationType::Other);
        assert_eq!(event.namespace.db, None);
        assert_eq!(event.namespace.coll, "configs");
    }
}
