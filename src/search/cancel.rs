//! Caller-driven cancellation of in-flight searches

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tantivy::collector::{Collector, SegmentCollector};
use tantivy::query::Weight;
use tantivy::{SegmentOrdinal, SegmentReader, TantivyError};

/// Shared flag telling a running search to stop
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// A guard that cancels the signal when dropped, unless disarmed.
    ///
    /// Held by a request future, it fires when the server drops the request
    /// (client disconnect or request timeout).
    pub fn guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            signal: self.clone(),
            armed: true,
        }
    }

    fn check(&self) -> tantivy::Result<()> {
        if self.is_cancelled() {
            Err(TantivyError::InternalError("search cancelled".to_string()))
        } else {
            Ok(())
        }
    }
}

/// See [`CancelSignal::guard`]
#[derive(Debug)]
pub struct CancelOnDrop {
    signal: CancelSignal,
    armed: bool,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.signal.cancel();
        }
    }
}

/// Collector wrapper that abandons the search between segments once the
/// signal is cancelled.
pub struct Cancellable<C> {
    inner: C,
    signal: CancelSignal,
}

impl<C> Cancellable<C> {
    pub fn new(inner: C, signal: CancelSignal) -> Self {
        Self { inner, signal }
    }
}

impl<C: Collector> Collector for Cancellable<C> {
    type Fruit = C::Fruit;
    type Child = C::Child;

    fn for_segment(
        &self,
        segment_local_id: SegmentOrdinal,
        segment: &SegmentReader,
    ) -> tantivy::Result<Self::Child> {
        self.signal.check()?;
        self.inner.for_segment(segment_local_id, segment)
    }

    fn requires_scoring(&self) -> bool {
        self.inner.requires_scoring()
    }

    fn merge_fruits(
        &self,
        segment_fruits: Vec<<Self::Child as SegmentCollector>::Fruit>,
    ) -> tantivy::Result<Self::Fruit> {
        self.signal.check()?;
        self.inner.merge_fruits(segment_fruits)
    }

    fn collect_segment(
        &self,
        weight: &dyn Weight,
        segment_ord: SegmentOrdinal,
        reader: &SegmentReader,
    ) -> tantivy::Result<<Self::Child as SegmentCollector>::Fruit> {
        self.signal.check()?;
        self.inner.collect_segment(weight, segment_ord, reader)
    }
}
