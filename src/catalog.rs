//! The fragment index a resolver reads from.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::{ArchivedMediaError, Result};
use crate::models::{Fragment, StreamDescription, StreamRef};
use crate::selector::CanonicalInterval;

/// Candidates for an interval, ordered by `(origin timestamp, ingestion sequence)`.
pub type Candidates = Box<dyn Iterator<Item = Fragment> + Send>;

/// Read access to per-stream, append-only fragment logs.
///
/// Implementations must hand out consistent views: a query never observes a
/// half-written fragment, and fragments are never removed or rewritten, so an
/// earlier result remains valid as more data is appended.
pub trait FragmentCatalog: Send + Sync {
    /// Look up a stream's retention and codec information.
    ///
    /// Returns [`ArchivedMediaError::ResourceNotFound`] for unknown streams.
    fn describe_stream(
        &self,
        stream: &StreamRef,
    ) -> impl Future<Output = Result<StreamDescription>> + Send;

    /// Fragments whose timestamp of `interval.origin` lies in the closed interval.
    fn query(
        &self,
        stream: &StreamRef,
        interval: &CanonicalInterval,
    ) -> impl Future<Output = Result<Candidates>> + Send;

    /// Fragments by number, in the order requested.
    ///
    /// Returns [`ArchivedMediaError::ResourceNotFound`] if any number is unknown.
    fn fragments_by_number(
        &self,
        stream: &StreamRef,
        numbers: &[String],
    ) -> impl Future<Output = Result<Vec<Fragment>>> + Send;
}

#[derive(Debug, Clone)]
struct StreamLog {
    description: StreamDescription,
    /// Ingestion order. Replaced copy-on-write so readers keep their snapshot.
    fragments: Arc<Vec<Fragment>>,
}

/// A catalog held entirely in memory, keyed by stream name.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    streams: RwLock<HashMap<String, StreamLog>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream. Names must be unique.
    pub async fn create_stream(&self, description: StreamDescription) -> Result<()> {
        StreamRef::name(description.stream_name.clone()).validate()?;
        let mut streams = self.streams.write().await;
        if streams.contains_key(&description.stream_name) {
            return Err(ArchivedMediaError::invalid_argument(format!(
                "stream {} already exists",
                description.stream_name
            )));
        }
        debug!(
            stream = %description.stream_name,
            retention_hours = description.data_retention_hours,
            "stream created"
        );
        streams.insert(
            description.stream_name.clone(),
            StreamLog {
                description,
                fragments: Arc::new(Vec::new()),
            },
        );
        Ok(())
    }

    /// Append a fragment to the end of a stream's log.
    ///
    /// The ingestion sequence must be greater than every sequence already in
    /// the log.
    pub async fn append(&self, stream_name: &str, fragment: Fragment) -> Result<()> {
        let mut streams = self.streams.write().await;
        let log = streams
            .get_mut(stream_name)
            .ok_or_else(|| ArchivedMediaError::not_found(format!("stream {stream_name} not found")))?;

        if let Some(last) = log.fragments.last() {
            if fragment.ingestion_sequence <= last.ingestion_sequence {
                return Err(ArchivedMediaError::invalid_argument(format!(
                    "ingestion sequence {} does not follow {}",
                    fragment.ingestion_sequence, last.ingestion_sequence
                )));
            }
        }

        Arc::make_mut(&mut log.fragments).push(fragment);
        Ok(())
    }

    /// Number of fragments ingested into a stream, duplicates included.
    pub async fn fragment_count(&self, stream_name: &str) -> Option<usize> {
        let streams = self.streams.read().await;
        streams.get(stream_name).map(|log| log.fragments.len())
    }

    async fn snapshot(&self, stream: &StreamRef) -> Result<StreamLog> {
        let streams = self.streams.read().await;
        let found = match stream {
            StreamRef::Name(name) => streams.get(name),
            StreamRef::Arn(_) => streams.values().find(|log| stream.matches(&log.description)),
        };
        found
            .cloned()
            .ok_or_else(|| ArchivedMediaError::not_found(format!("stream {stream} not found")))
    }
}

impl FragmentCatalog for InMemoryCatalog {
    async fn describe_stream(&self, stream: &StreamRef) -> Result<StreamDescription> {
        Ok(self.snapshot(stream).await?.description)
    }

    async fn query(&self, stream: &StreamRef, interval: &CanonicalInterval) -> Result<Candidates> {
        let log = self.snapshot(stream).await?.fragments;
        let origin = interval.origin;

        let mut matching: Vec<usize> = (0..log.len())
            .filter(|&i| interval.contains_fragment(&log[i]))
            .collect();
        matching.sort_by_key(|&i| log[i].sort_key(origin));

        debug!(%stream, %origin, candidates = matching.len(), "catalog query");
        Ok(Box::new(matching.into_iter().map(move |i| log[i].clone())))
    }

    async fn fragments_by_number(&self, stream: &StreamRef, numbers: &[String]) -> Result<Vec<Fragment>> {
        let log = self.snapshot(stream).await?.fragments;
        let by_number: HashMap<&str, &Fragment> = log
            .iter()
            .map(|f| (f.fragment_number.as_str(), f))
            .collect();

        numbers
            .iter()
            .map(|n| {
                by_number.get(n.as_str()).map(|f| (*f).clone()).ok_or_else(|| {
                    ArchivedMediaError::not_found(format!("fragment {n} not found in stream {stream}"))
                })
            })
            .collect()
    }
}
