//! Quick-start walkthrough for the archived media resolver.
//!
//! Run with:
//!   RUST_LOG=archived_media=debug cargo run --example quickstart
//!
//! Builds an in-memory catalog with a short synthetic recording, then lists,
//! clips and plans sessions over it.

use std::sync::Arc;

use archived_media::{
    ClipFragmentSelector, ClipFragmentSelectorType, ClipTimestampRange, FixedClock, Fragment,
    FragmentSelector, FragmentSelectorType, GetClipRequest, GetHlsStreamingSessionRequest,
    GetImagesRequest, ImageFormat, ImageSelectorType, InMemoryCatalog, ListFragmentsRequest,
    PlaybackMode, Resolver, StreamDescription, StreamRef, TimestampRange, CODEC_AAC, CODEC_H264,
};
use chrono::{Duration, TimeZone, Utc};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> archived_media::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // -----------------------------------------------------------------------
    // 1. Populate a catalog: two minutes of 2-second fragments, with one
    //    producer retry that re-sends an already ingested fragment
    // -----------------------------------------------------------------------
    let recorded_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog
        .create_stream(StreamDescription {
            stream_name: "front-door".into(),
            stream_arn: "arn:aws:kinesisvideo:us-east-1:123456789012:stream/front-door/1".into(),
            data_retention_hours: 24,
            track_codecs: vec![CODEC_H264.into(), CODEC_AAC.into()],
        })
        .await?;

    let mut sequence = 0;
    for i in 0..60 {
        sequence += 1;
        let ts = recorded_at + Duration::seconds(2 * i);
        catalog
            .append(
                "front-door",
                Fragment {
                    fragment_number: format!("9134385233318150{sequence:04}"),
                    producer_timestamp: ts,
                    server_timestamp: ts + Duration::milliseconds(150),
                    ingestion_sequence: sequence,
                    duration_millis: 2000,
                    size_bytes: 480_000,
                },
            )
            .await?;
    }
    // Retry of the fragment recorded at +10s.
    sequence += 1;
    catalog
        .append(
            "front-door",
            Fragment {
                fragment_number: format!("9134385233318150{sequence:04}"),
                producer_timestamp: recorded_at + Duration::seconds(10),
                server_timestamp: recorded_at + Duration::seconds(121),
                ingestion_sequence: sequence,
                duration_millis: 2000,
                size_bytes: 480_000,
            },
        )
        .await?;

    let resolver = Resolver::builder(catalog.clone())
        .page_size(25)
        .clock(FixedClock(recorded_at + Duration::seconds(125)))
        .build()?;
    let stream = StreamRef::name("front-door");

    // -----------------------------------------------------------------------
    // 2. List fragments with pagination
    // -----------------------------------------------------------------------
    let mut request = ListFragmentsRequest::new(
        stream.clone(),
        FragmentSelector::new(
            FragmentSelectorType::ProducerTimestamp,
            TimestampRange::new(recorded_at, recorded_at + Duration::seconds(120)),
        ),
    );
    let mut total = 0;
    loop {
        let page = resolver.list_fragments(&request).await?;
        total += page.fragments.len();
        if let (Some(first), Some(last)) = (page.fragments.first(), page.fragments.last()) {
            println!(
                "  page: {} .. {} ({} fragments)",
                first.producer_timestamp,
                last.producer_timestamp,
                page.fragments.len()
            );
        }

        if !page.has_more() {
            break;
        }
        request.next_token = page.next_token;
    }
    println!(
        "{total} distinct fragments ({} ingested)",
        catalog.fragment_count("front-door").await.unwrap_or(0)
    );
    println!();

    // -----------------------------------------------------------------------
    // 3. Plan a 30-second clip
    // -----------------------------------------------------------------------
    let clip = resolver
        .plan_clip(&GetClipRequest {
            stream: stream.clone(),
            clip_fragment_selector: ClipFragmentSelector {
                selector_type: ClipFragmentSelectorType::ProducerTimestamp,
                timestamp_range: ClipTimestampRange {
                    start: recorded_at + Duration::seconds(30),
                    end: recorded_at + Duration::seconds(60),
                },
            },
        })
        .await?;
    println!(
        "Clip: {} fragments, {} bytes of {} (truncated: {})",
        clip.fragments.len(),
        clip.total_bytes,
        clip.content_type,
        clip.truncated
    );
    println!();

    // -----------------------------------------------------------------------
    // 4. Plan a live HLS session
    // -----------------------------------------------------------------------
    let session = resolver
        .plan_hls_session(&GetHlsStreamingSessionRequest::new(stream.clone()))
        .await?;
    println!(
        "HLS {} session, expires at {}:",
        session.playback_mode, session.expires_at
    );
    for fragment in &session.fragments {
        println!("  {} @ {}", fragment.fragment_number, fragment.server_timestamp);
    }

    let mut on_demand = GetHlsStreamingSessionRequest::new(stream.clone());
    on_demand.playback_mode = PlaybackMode::OnDemand;
    on_demand.fragment_selector = Some(FragmentSelector::new(
        FragmentSelectorType::ServerTimestamp,
        TimestampRange::new(recorded_at, recorded_at + Duration::seconds(20)),
    ));
    let session = resolver.plan_hls_session(&on_demand).await?;
    println!("HLS ON_DEMAND session with {} fragments", session.fragments.len());
    println!();

    // -----------------------------------------------------------------------
    // 5. Sample images, one every 5 seconds past the end of the recording
    // -----------------------------------------------------------------------
    let plan = resolver
        .plan_images(&GetImagesRequest {
            stream,
            image_selector_type: ImageSelectorType::ProducerTimestamp,
            start_timestamp: recorded_at + Duration::seconds(100),
            end_timestamp: recorded_at + Duration::seconds(130),
            sampling_interval_millis: 5000,
            format: ImageFormat::Jpeg,
            max_results: None,
            next_token: None,
        })
        .await?;
    for image in plan.render(|fragment, _| Some(format!("<frame from {}>", fragment.fragment_number))) {
        match image.error {
            Some(err) => println!("  {} -> {}", image.time_stamp, err),
            None => println!(
                "  {} -> {}",
                image.time_stamp,
                image.image_content.unwrap_or_default()
            ),
        }
    }

    Ok(())
}
