// ── Document subscriptions ──
//
// Hosts follow the edited topology through a watch channel of
// immutable snapshots published by the session after each step.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Snapshot;

/// A subscription to the session's document.
///
/// Gives both point-in-time access and change notification via
/// `changed()` or by converting to a `Stream`.
#[derive(Debug, Clone)]
pub struct DocumentStream {
    current: Arc<Snapshot>,
    receiver: watch::Receiver<Arc<Snapshot>>,
}

impl DocumentStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Snapshot>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Arc<Snapshot> {
        &self.current
    }

    /// The latest published snapshot.
    pub fn latest(&self) -> Arc<Snapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish. `None` once the session has ended.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> DocumentWatchStream {
        DocumentWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each published snapshot.
pub struct DocumentWatchStream {
    inner: WatchStream<Arc<Snapshot>>,
}

impl Stream for DocumentWatchStream {
    type Item = Arc<Snapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn changed_tracks_the_latest_publish() {
        let (tx, rx) = watch::channel(Arc::new(Snapshot::default()));
        let mut docs = DocumentStream::new(rx);
        assert!(docs.current().devices.is_empty());

        tx.send(Arc::new(Snapshot {
            trace_id: Some(4),
            ..Snapshot::default()
        }))
        .unwrap();
        let got = docs.changed().await.unwrap();
        assert_eq!(got.trace_id, Some(4));
        assert_eq!(docs.current().trace_id, Some(4));

        drop(tx);
        assert!(docs.changed().await.is_none());
    }

    #[tokio::test]
    async fn stream_yields_the_current_value_first() {
        let (_tx, rx) = watch::channel(Arc::new(Snapshot::default()));
        let mut s = DocumentStream::new(rx).into_stream();
        assert!(s.next().await.is_some());
    }

    #[test]
    fn changed_waits_for_a_publish() {
        let (tx, rx) = watch::channel(Arc::new(Snapshot::default()));
        let mut docs = DocumentStream::new(rx);
        let mut next = tokio_test::task::spawn(docs.changed());
        tokio_test::assert_pending!(next.poll());

        tx.send(Arc::new(Snapshot {
            order: Some(1),
            ..Snapshot::default()
        }))
        .unwrap();
        assert!(next.is_woken());
        let got = tokio_test::assert_ready!(next.poll()).unwrap();
        assert_eq!(got.order, Some(1));
    }
}
