mod common;

use archived_media::{
    ArchivedMediaError, GetImagesRequest, ImageError, ImageFormat, ImageSelectorType,
};
use common::*;

fn request(start_ms: i64, end_ms: i64, step: u64) -> GetImagesRequest {
    GetImagesRequest {
        stream: stream(),
        image_selector_type: ImageSelectorType::ProducerTimestamp,
        start_timestamp: ms(start_ms),
        end_timestamp: ms(end_ms),
        sampling_interval_millis: step,
        format: ImageFormat::Png,
        max_results: None,
        next_token: None,
    }
}

#[tokio::test]
async fn samples_map_to_covering_fragments() {
    // Fragments cover [0s, 6s).
    let catalog = catalog_with(vec![fragment(1, 0), fragment(2, 2), fragment(3, 4)]).await;
    let resolver = resolver(catalog, secs(100));

    let plan = resolver.plan_images(&request(0, 10_000, 1000)).await.unwrap();
    assert_eq!(plan.format, ImageFormat::Png);
    assert_eq!(plan.slots.len(), 11);
    assert!(plan.next_token.is_none());

    let seqs: Vec<Option<u64>> = plan
        .slots
        .iter()
        .map(|s| s.fragment.as_ref().map(|f| f.ingestion_sequence))
        .collect();
    assert_eq!(
        seqs,
        vec![
            Some(1),
            Some(1),
            Some(2),
            Some(2),
            Some(3),
            Some(3),
            None,
            None,
            None,
            None,
            None
        ]
    );

    let images = plan.render(|f, _| Some(f.fragment_number.clone()));
    assert_eq!(images.len(), 11);
    assert_eq!(images[0].time_stamp, ms(0));
    assert_eq!(images[10].time_stamp, ms(10_000));
    assert_eq!(images[6].error, Some(ImageError::NoMedia));
    assert!(images[5].image_content.is_some());
}

#[tokio::test]
async fn long_fragment_before_the_range_still_covers() {
    let mut long = fragment(1, 0);
    long.duration_millis = 20_000;
    let resolver = resolver(catalog_with(vec![long]).await, secs(100));

    let plan = resolver.plan_images(&request(15_000, 16_000, 500)).await.unwrap();
    assert_eq!(plan.slots.len(), 3);
    assert!(plan.slots.iter().all(|s| s.fragment.is_some()));
}

#[tokio::test]
async fn image_pages_resume_from_token() {
    let catalog = catalog_with((0..10).map(|i| fragment(i + 1, i as i64 * 2)).collect()).await;
    let resolver = resolver(catalog, secs(100));

    let mut req = request(0, 10_000, 1000);
    req.max_results = Some(4);
    let mut stamps = Vec::new();
    let mut pages = 0;
    loop {
        let plan = resolver.plan_images(&req).await.unwrap();
        pages += 1;
        stamps.extend(plan.slots.iter().map(|s| s.time_stamp));
        match plan.next_token {
            Some(token) => req.next_token = Some(token),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(stamps, (0..=10).map(|s| secs(s)).collect::<Vec<_>>());
}

#[tokio::test]
async fn image_request_validation() {
    let resolver = resolver(catalog_with(vec![fragment(1, 0)]).await, secs(100));

    for step in [199, 20_001] {
        let err = resolver
            .plan_images(&request(0, 10_000, step))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchivedMediaError::InvalidArgument { .. }), "{step}");
    }

    let mut too_many = request(0, 10_000, 1000);
    too_many.max_results = Some(101);
    assert!(resolver.plan_images(&too_many).await.is_err());

    let err = resolver
        .plan_images(&request(10_000, 0, 1000))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchivedMediaError::InvalidSelector { .. }));

    // A token only resumes the request it came from.
    let mut paged = request(0, 10_000, 1000);
    paged.max_results = Some(2);
    let token = resolver.plan_images(&paged).await.unwrap().next_token.unwrap();
    let mut other = request(0, 20_000, 1000);
    other.next_token = Some(token);
    let err = resolver.plan_images(&other).await.unwrap_err();
    assert!(matches!(err, ArchivedMediaError::InvalidArgument { .. }));
}

#[tokio::test]
async fn retried_fragment_is_resolved_the_same_on_every_page() {
    // Original ingested at 30s, its retry at 50s with a longer duration.
    let mut original = fragment(1, 30);
    original.producer_timestamp = secs(25);
    let mut retry = fragment(2, 50);
    retry.producer_timestamp = secs(25);
    retry.duration_millis = 60_000;
    let resolver = resolver(catalog_with(vec![original, retry]).await, secs(1000));

    let mut req = request(0, 200_000, 20_000);
    req.image_selector_type = ImageSelectorType::ServerTimestamp;
    req.max_results = Some(5);

    let mut chosen = Vec::new();
    loop {
        let plan = resolver.plan_images(&req).await.unwrap();
        chosen.extend(
            plan.slots
                .iter()
                .filter_map(|s| s.fragment.as_ref().map(|f| f.ingestion_sequence)),
        );
        match plan.next_token {
            Some(token) => req.next_token = Some(token),
            None => break,
        }
    }

    // Only the first ingestion survives, and it covers no sample.
    assert!(chosen.is_empty(), "{chosen:?}");
}
