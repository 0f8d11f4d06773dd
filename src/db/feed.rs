//! In-process change feed.
//!
//! Every successful write issued through a [`Collection`](super::Collection)
//! publishes one change document per affected document:
//!
//! ```json
//! {"operationType": "insert", "ns": {"db": "health", "coll": "configs"},
//!  "documentKey": {"_id": "..."}, "fullDocument": {...}}
//! ```
//!
//! Documents are published raw; consumers decode them at their own boundary.

use futures::stream::StreamExt;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::error::ChangeFeedError;

const FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Insert,
    Replace,
    Delete,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Replace => "replace",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Clone)]
pub(crate) struct ChangeFeed {
    db: String,
    tx: broadcast::Sender<Value>,
}

impl ChangeFeed {
    pub(crate) fn new(db: &str) -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            db: db.to_string(),
            tx,
        }
    }

    pub(crate) fn publish(&self, operation: Operation, coll: &str, id: &str, doc: Option<&Value>) {
        let change = json!({
            "operationType": operation.as_str(),
            "ns": { "db": self.db, "coll": coll },
            "documentKey": { "_id": id },
            "fullDocument": doc,
        });
        // No subscribers is not an error.
        let _ = self.tx.send(change);
    }

    pub(crate) fn subscribe(&self) -> ChangeStream {
        ChangeStream {
            inner: BroadcastStream::new(self.tx.subscribe()),
        }
    }
}

/// A live subscription to the database change feed.
pub struct ChangeStream {
    inner: BroadcastStream<Value>,
}

impl ChangeStream {
    /// Next raw change document. `None` once the feed is closed.
    ///
    /// A slow consumer that falls more than the feed capacity behind receives
    /// [`ChangeFeedError::Lagged`] and then continues with the oldest retained change.
    pub async fn next(&mut self) -> Option<Result<Value, ChangeFeedError>> {
        self.inner.next().await.map(|item| {
            item.map_err(|BroadcastStreamRecvError::Lagged(skipped)| {
                ChangeFeedError::Lagged(skipped)
            })
        })
    }
}
