#![allow(dead_code)]

use std::sync::Arc;

use archived_media::{
    FixedClock, Fragment, FragmentSelector, FragmentSelectorType, InMemoryCatalog, Resolver,
    StreamDescription, StreamRef, Timestamp, TimestampRange, CODEC_AAC, CODEC_H264,
};
use chrono::DateTime;

pub const STREAM: &str = "front-door";

/// Epoch-relative instant in milliseconds. Offset from zero so fixtures never
/// collide with the epoch bound.
pub fn ms(millis: i64) -> Timestamp {
    DateTime::from_timestamp_millis(1_700_000_000_000 + millis).unwrap()
}

pub fn secs(s: i64) -> Timestamp {
    ms(s * 1000)
}

pub fn stream() -> StreamRef {
    StreamRef::name(STREAM)
}

pub fn description(name: &str, retention_hours: u32, codecs: &[&str]) -> StreamDescription {
    StreamDescription {
        stream_name: name.to_string(),
        stream_arn: format!("arn:aws:kinesisvideo:us-west-2:123456789012:stream/{name}/1"),
        data_retention_hours: retention_hours,
        track_codecs: codecs.iter().map(|c| c.to_string()).collect(),
    }
}

/// A two-second fragment whose producer and server timestamps agree.
pub fn fragment(seq: u64, at_secs: i64) -> Fragment {
    Fragment {
        fragment_number: format!("{}", 91_000_000 + seq),
        producer_timestamp: secs(at_secs),
        server_timestamp: secs(at_secs),
        ingestion_sequence: seq,
        duration_millis: 2000,
        size_bytes: 1000,
    }
}

pub fn selector(origin: FragmentSelectorType, start: Timestamp, end: Timestamp) -> FragmentSelector {
    FragmentSelector::new(origin, TimestampRange::new(start, end))
}

/// Catalog with one H.264 + AAC stream holding `fragments`, in order.
pub async fn catalog_with(fragments: Vec<Fragment>) -> Arc<InMemoryCatalog> {
    catalog_for(description(STREAM, 24, &[CODEC_H264, CODEC_AAC]), fragments).await
}

pub async fn catalog_for(
    description: StreamDescription,
    fragments: Vec<Fragment>,
) -> Arc<InMemoryCatalog> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let name = description.stream_name.clone();
    catalog.create_stream(description).await.unwrap();
    for fragment in fragments {
        catalog.append(&name, fragment).await.unwrap();
    }
    catalog
}

/// Resolver with a fixed clock at `now`.
pub fn resolver(catalog: Arc<InMemoryCatalog>, now: Timestamp) -> Resolver<InMemoryCatalog> {
    Resolver::builder(catalog)
        .page_size(100)
        .clock(FixedClock(now))
        .build()
        .unwrap()
}

pub fn producer_secs(fragments: &[Fragment]) -> Vec<i64> {
    fragments
        .iter()
        .map(|f| (f.producer_timestamp - secs(0)).num_seconds())
        .collect()
}
