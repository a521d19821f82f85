// ── Alert streams ──
//
// The push-side client plus subscription types for consuming the
// reconciled view.

mod client;
mod filter;

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::AlertView;

pub use client::{AlertStreamClient, StreamEvent, Subscription};
pub use filter::AlertFilter;

/// A subscription to the reconciled alert view.
///
/// Provides both point-in-time snapshot access and change notification
/// via [`changed()`](Self::changed) or by converting to a `Stream`.
pub struct AlertViewStream {
    current: AlertView,
    receiver: watch::Receiver<AlertView>,
}

impl AlertViewStream {
    pub(crate) fn new(receiver: watch::Receiver<AlertView>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The view captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &AlertView {
        &self.current
    }

    /// The latest view (may have changed since creation).
    pub fn latest(&self) -> AlertView {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new view.
    /// Returns `None` if the reconciler has been dropped.
    pub async fn changed(&mut self) -> Option<AlertView> {
        self.receiver.changed().await.ok()?;
        let view = self.receiver.borrow_and_update().clone();
        self.current = view.clone();
        Some(view)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> AlertWatchStream {
        AlertWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding the view each time it changes.
pub struct AlertWatchStream {
    inner: WatchStream<AlertView>,
}

impl Stream for AlertWatchStream {
    type Item = AlertView;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
