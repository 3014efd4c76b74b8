mod common;

use archived_media::{
    ArchivedMediaError, FragmentSelector, FragmentSelectorType, ListFragmentsRequest, StreamRef,
    TimestampRange,
};
use common::*;

#[tokio::test]
async fn closed_interval_keeps_both_boundaries() {
    let catalog = catalog_with(vec![
        fragment(1, 0),
        fragment(2, 2),
        fragment(3, 4),
        fragment(4, 6),
    ])
    .await;
    let resolver = resolver(catalog, secs(100));

    let sel = selector(FragmentSelectorType::ProducerTimestamp, secs(1), secs(4));
    let page = resolver
        .resolve_fragments(&stream(), Some(&sel), None, None)
        .await
        .unwrap();

    assert_eq!(producer_secs(&page.fragments), vec![2, 4]);
    assert!(!page.has_more());
}

#[test]
fn unknown_origin_is_invalid_selector() {
    let err = FragmentSelector::parse("BOGUS", Some(TimestampRange::new(secs(0), secs(1))))
        .unwrap_err();
    assert!(matches!(err, ArchivedMediaError::InvalidSelector { .. }));

    let err = FragmentSelector::from_value(serde_json::json!({
        "FragmentSelectorType": "BOGUS",
        "TimestampRange": {
            "StartTimestamp": "2024-05-01T12:00:00Z",
            "EndTimestamp": "2024-05-01T12:01:00Z"
        }
    }))
    .unwrap_err();
    assert!(matches!(err, ArchivedMediaError::InvalidSelector { .. }));
}

#[tokio::test]
async fn inverted_range_is_invalid_selector() {
    let resolver = resolver(catalog_with(vec![fragment(1, 7)]).await, secs(100));
    let sel = selector(FragmentSelectorType::ServerTimestamp, secs(10), secs(5));

    let err = resolver
        .resolve_fragments(&stream(), Some(&sel), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ArchivedMediaError::InvalidSelector { .. }));
}

#[tokio::test]
async fn missing_selector_and_token() {
    let resolver = resolver(catalog_with(vec![]).await, secs(0));
    let err = resolver
        .resolve_fragments(&stream(), None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ArchivedMediaError::InvalidSelector { .. }));
}

#[tokio::test]
async fn unknown_stream_and_bad_names() {
    let resolver = resolver(catalog_with(vec![]).await, secs(0));
    let sel = selector(FragmentSelectorType::ServerTimestamp, secs(0), secs(1));

    let err = resolver
        .resolve_fragments(&StreamRef::name("back-door"), Some(&sel), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ArchivedMediaError::ResourceNotFound { .. }));

    let err = resolver
        .resolve_fragments(&StreamRef::name("no spaces"), Some(&sel), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ArchivedMediaError::InvalidArgument { .. }));
}

#[tokio::test]
async fn resolves_by_arn() {
    let catalog = catalog_with(vec![fragment(1, 3)]).await;
    let resolver = resolver(catalog, secs(100));
    let arn = StreamRef::arn(description(STREAM, 24, &[]).stream_arn);
    let sel = selector(FragmentSelectorType::ServerTimestamp, secs(0), secs(10));

    let page = resolver
        .resolve_fragments(&arn, Some(&sel), None, None)
        .await
        .unwrap();
    assert_eq!(page.fragments.len(), 1);
}

#[tokio::test]
async fn zero_retention_rejects_archived_listing() {
    let catalog = catalog_for(description(STREAM, 0, &[]), vec![fragment(1, 1)]).await;
    let resolver = resolver(catalog, secs(100));
    let request = ListFragmentsRequest::new(
        stream(),
        selector(FragmentSelectorType::ServerTimestamp, secs(0), secs(10)),
    );

    let err = resolver.list_fragments(&request).await.unwrap_err();
    assert!(matches!(err, ArchivedMediaError::NoDataRetention { .. }));
}

#[tokio::test]
async fn duplicate_producer_timestamps_keep_first_ingestion() {
    let mut retry = fragment(3, 2);
    retry.server_timestamp = secs(9);
    let catalog = catalog_with(vec![fragment(1, 0), fragment(2, 2), retry]).await;
    let resolver = resolver(catalog, secs(100));

    for origin in FragmentSelectorType::ALL {
        let sel = selector(*origin, secs(0), secs(10));
        let page = resolver
            .resolve_fragments(&stream(), Some(&sel), None, None)
            .await
            .unwrap();
        let seqs: Vec<u64> = page.fragments.iter().map(|f| f.ingestion_sequence).collect();
        assert_eq!(seqs, vec![1, 2], "origin {origin}");
    }
}

#[tokio::test]
async fn orders_by_selected_origin() {
    let mut a = fragment(1, 30);
    a.server_timestamp = secs(100);
    let mut b = fragment(2, 10);
    b.server_timestamp = secs(101);
    let catalog = catalog_with(vec![a, b]).await;
    let resolver = resolver(catalog, secs(200));

    let by_producer = resolver
        .resolve_fragments(
            &stream(),
            Some(&selector(FragmentSelectorType::ProducerTimestamp, secs(0), secs(200))),
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(producer_secs(&by_producer.fragments), vec![10, 30]);

    let by_server = resolver
        .resolve_fragments(
            &stream(),
            Some(&selector(FragmentSelectorType::ServerTimestamp, secs(0), secs(200))),
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(producer_secs(&by_server.fragments), vec![30, 10]);
}

#[tokio::test]
async fn token_pages_concatenate_to_the_full_result() {
    let catalog = catalog_with((1..=10).map(|i| fragment(i, i as i64 * 2)).collect()).await;
    let resolver = resolver(catalog, secs(100));
    let sel = selector(FragmentSelectorType::ProducerTimestamp, secs(0), secs(100));

    let whole = resolver
        .resolve_fragments(&stream(), Some(&sel), None, None)
        .await
        .unwrap();

    let mut request = ListFragmentsRequest::new(stream(), sel);
    request.max_results = Some(3);
    let mut pages = Vec::new();
    let mut collected = Vec::new();
    loop {
        let page = resolver.list_fragments(&request).await.unwrap();
        pages.push(page.fragments.len());
        collected.extend(page.fragments);
        match page.next_token {
            Some(token) => {
                // Resuming works with the token alone.
                request.fragment_selector = None;
                request.next_token = Some(token);
            }
            None => break,
        }
    }

    assert_eq!(pages, vec![3, 3, 3, 1]);
    assert_eq!(collected, whole.fragments);
}

#[tokio::test]
async fn token_rejected_for_other_stream_or_selector() {
    let catalog = catalog_with((1..=4).map(|i| fragment(i, i as i64)).collect()).await;
    catalog
        .create_stream(description("back-door", 24, &[]))
        .await
        .unwrap();
    let resolver = resolver(catalog, secs(100));
    let sel = selector(FragmentSelectorType::ProducerTimestamp, secs(0), secs(10));

    let page = resolver
        .resolve_fragments(&stream(), Some(&sel), Some(2), None)
        .await
        .unwrap();
    let token = page.next_token.unwrap();

    let err = resolver
        .resolve_fragments(&StreamRef::name("back-door"), None, None, Some(&token))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchivedMediaError::InvalidArgument { .. }));

    let other = selector(FragmentSelectorType::ProducerTimestamp, secs(0), secs(11));
    let err = resolver
        .resolve_fragments(&stream(), Some(&other), None, Some(&token))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchivedMediaError::InvalidArgument { .. }));

    // The matching selector is accepted alongside its token.
    let next = resolver
        .resolve_fragments(&stream(), Some(&sel), Some(2), Some(&token))
        .await
        .unwrap();
    assert_eq!(producer_secs(&next.fragments), vec![3, 4]);

    for garbage in ["", "not a token!", "AAAA", "e30="] {
        let err = resolver
            .resolve_fragments(&stream(), None, None, Some(garbage))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ArchivedMediaError::InvalidArgument { .. }),
            "{garbage:?}"
        );
    }
}

#[tokio::test]
async fn page_size_limits() {
    let resolver = resolver(catalog_with(vec![]).await, secs(0));
    let sel = selector(FragmentSelectorType::ServerTimestamp, secs(0), secs(1));
    for bad in [0, 1001] {
        let err = resolver
            .resolve_fragments(&stream(), Some(&sel), Some(bad), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchivedMediaError::InvalidArgument { .. }));
    }
}

#[tokio::test]
async fn token_from_an_arn_request_resumes_by_name() {
    let catalog = catalog_with((1..=4).map(|i| fragment(i, i as i64)).collect()).await;
    let resolver = resolver(catalog, secs(100));
    let arn = StreamRef::arn(description(STREAM, 24, &[]).stream_arn);
    let sel = selector(FragmentSelectorType::ProducerTimestamp, secs(0), secs(10));

    let first = resolver
        .resolve_fragments(&arn, Some(&sel), Some(2), None)
        .await
        .unwrap();
    let rest = resolver
        .resolve_fragments(&stream(), None, Some(2), first.next_token.as_deref())
        .await
        .unwrap();

    assert_eq!(producer_secs(&first.fragments), vec![1, 2]);
    assert_eq!(producer_secs(&rest.fragments), vec![3, 4]);
}
