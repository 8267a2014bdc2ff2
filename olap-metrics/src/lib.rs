#![deny(missing_docs)]
//! Metrics for the column storage engine.
//!
//! Readers thread a single [`OlapMetrics`] through every stream of a segment so that the
//! bytes pulled from disk, the chunks decompressed and the time spent decompressing can be
//! attributed per stream kind.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use witchcraft_metrics::{Metric, MetricRegistry, Metrics, MetricsIter};
// re-export exposed metric types
pub use witchcraft_metrics::{Counter, Histogram, MetricId, Timer};

/// Bytes read from the backing file, including chunk heads.
pub const COMPRESSED_BYTES: &str = "olap.stream.compressed_bytes";
/// Bytes produced after decompression.
pub const UNCOMPRESSED_BYTES: &str = "olap.stream.uncompressed_bytes";
/// Number of chunks loaded into a stream's read buffer.
pub const CHUNKS_LOADED: &str = "olap.stream.chunks_loaded";
/// Time spent decompressing chunks.
pub const DECOMPRESS_TIMER: &str = "olap.stream.decompress";

/// A cheaply cloneable metric registry with default tags applied on export.
#[derive(Default, Clone)]
pub struct OlapMetrics {
    registry: Arc<MetricRegistry>,
    default_tags: Arc<DefaultTags>,
}

/// Default tags for metrics used in [`OlapMetrics`].
#[derive(Default)]
pub struct DefaultTags(BTreeMap<Cow<'static, str>, Cow<'static, str>>);

impl<K, V> From<&[(K, V)]> for DefaultTags
where
    K: Clone + Into<Cow<'static, str>>,
    V: Clone + Into<Cow<'static, str>>,
{
    fn from(pairs: &[(K, V)]) -> Self {
        DefaultTags(
            pairs
                .iter()
                .map(|(k, v)| (k.clone().into(), v.clone().into()))
                .collect(),
        )
    }
}

impl OlapMetrics {
    /// Create an empty metric registry with default tags.
    pub fn with_default_tags(default_tags: impl Into<DefaultTags>) -> Self {
        Self {
            registry: Arc::new(MetricRegistry::default()),
            default_tags: Arc::new(default_tags.into()),
        }
    }

    /// Returns the counter with the specified ID, creating a default instance if absent.
    ///
    /// # Panics
    ///
    /// Panics if a metric is registered with the ID that is not a counter.
    pub fn counter<T>(&self, id: T) -> Arc<Counter>
    where
        T: Into<MetricId>,
    {
        self.registry.counter(id)
    }

    /// Returns the histogram with the specified ID, creating a default instance if absent.
    ///
    /// # Panics
    ///
    /// Panics if a metric is registered with the ID that is not a histogram.
    pub fn histogram<T>(&self, id: T) -> Arc<Histogram>
    where
        T: Into<MetricId>,
    {
        self.registry.histogram(id)
    }

    /// Returns the timer with the specified ID, creating a default instance if absent.
    ///
    /// # Panics
    ///
    /// Panics if a metric is registered with the ID that is not a timer.
    pub fn timer<T>(&self, id: T) -> Arc<Timer>
    where
        T: Into<MetricId>,
    {
        self.registry.timer(id)
    }

    /// Counters and timers for one stream kind, e.g. `"DATA"`.
    pub fn stream_metrics(&self, kind: &'static str) -> StreamMetrics {
        StreamMetrics {
            compressed_bytes: self.counter(MetricId::new(COMPRESSED_BYTES).with_tag("kind", kind)),
            uncompressed_bytes: self
                .counter(MetricId::new(UNCOMPRESSED_BYTES).with_tag("kind", kind)),
            chunks_loaded: self.counter(MetricId::new(CHUNKS_LOADED).with_tag("kind", kind)),
            decompress: self.timer(MetricId::new(DECOMPRESS_TIMER).with_tag("kind", kind)),
        }
    }

    /// Returns a snapshot of the metrics in the registry.
    ///
    /// Modifications to the registry after this method is called will not affect the state
    /// of the returned `MetricsSnapshot`.
    pub fn metrics(&self) -> MetricsSnapshot<'_> {
        MetricsSnapshot {
            snapshot: self.registry.metrics(),
            default_tags: &self.default_tags,
        }
    }
}

/// The metric handles a single read stream updates.
#[derive(Clone)]
pub struct StreamMetrics {
    /// See [`COMPRESSED_BYTES`].
    pub compressed_bytes: Arc<Counter>,
    /// See [`UNCOMPRESSED_BYTES`].
    pub uncompressed_bytes: Arc<Counter>,
    /// See [`CHUNKS_LOADED`].
    pub chunks_loaded: Arc<Counter>,
    /// See [`DECOMPRESS_TIMER`].
    pub decompress: Arc<Timer>,
}

/// A snapshot of the metrics in a registry with default tags.
pub struct MetricsSnapshot<'a> {
    snapshot: Metrics,
    default_tags: &'a DefaultTags,
}

impl MetricsSnapshot<'_> {
    /// Create an iterator over the metrics snapshot.
    pub fn iter(&self) -> OlapMetricsIter<'_> {
        OlapMetricsIter {
            iter: self.snapshot.iter(),
            default_tags: self.default_tags,
        }
    }
}

/// Metrics iterator that applies the default tags to each metric in the inner iterator.
pub struct OlapMetricsIter<'a> {
    iter: MetricsIter<'a>,
    default_tags: &'a DefaultTags,
}

impl<'a> Iterator for OlapMetricsIter<'a> {
    type Item = (MetricId, &'a Metric);

    #[inline]
    fn next(&mut self) -> Option<(MetricId, &'a Metric)> {
        self.iter.next().map(|(k, v)| {
            let mut metric_id = k.clone();
            for (tag_key, tag_value) in self.default_tags.0.iter() {
                metric_id = metric_id.with_tag(tag_key.clone(), tag_value.clone())
            }

            (metric_id, v)
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_metrics_share_registry() {
        let metrics = OlapMetrics::with_default_tags([("segment", "0")].as_slice());
        let data = metrics.stream_metrics("DATA");
        data.compressed_bytes.add(42);
        metrics.stream_metrics("DATA").compressed_bytes.inc();

        let counter = metrics.counter(MetricId::new(COMPRESSED_BYTES).with_tag("kind", "DATA"));
        assert_eq!(counter.count(), 43);

        // one counter per quantity plus the decompression timer
        assert_eq!(metrics.metrics().iter().count(), 4);
    }
}
