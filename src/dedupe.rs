//! Producer-timestamp deduplication and page cutting.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::models::{Fragment, FragmentSelectorType, SortKey};
use crate::selector::CanonicalInterval;
use crate::token::{Position, TokenState};

/// Reduce candidates to one fragment per producer timestamp, compared at
/// millisecond precision.
///
/// A repeated producer timestamp means the same instant was ingested more than
/// once (producer retry, failover). The earliest ingestion wins, whatever the
/// selector origin. The result is ordered by `(origin timestamp, ingestion
/// sequence)`.
pub fn dedupe(
    candidates: impl IntoIterator<Item = Fragment>,
    origin: FragmentSelectorType,
) -> Vec<Fragment> {
    let mut earliest: HashMap<i64, Fragment> = HashMap::new();
    for fragment in candidates {
        match earliest.entry(fragment.producer_timestamp.timestamp_millis()) {
            Entry::Occupied(mut kept) => {
                if fragment.ingestion_sequence < kept.get().ingestion_sequence {
                    kept.insert(fragment);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(fragment);
            }
        }
    }

    let mut fragments: Vec<Fragment> = earliest.into_values().collect();
    fragments.sort_by_key(|f| f.sort_key(origin));
    fragments
}

/// One page of resolved fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentPage {
    #[serde(rename = "Fragments")]
    pub fragments: Vec<Fragment>,

    /// Pass back to continue. `None` means the selection is exhausted.
    #[serde(rename = "NextToken", default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl FragmentPage {
    /// `true` if `next_token` is `Some`.
    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }
}

/// Cut the page that follows `after` out of a deduplicated, ordered sequence.
///
/// The token is built only once the page content is fixed.
pub(crate) fn paginate(
    deduped: Vec<Fragment>,
    stream_name: &str,
    interval: &CanonicalInterval,
    page_size: usize,
    after: Option<SortKey>,
) -> Result<FragmentPage> {
    let origin = interval.origin;
    let skip = match after {
        Some(key) => deduped.partition_point(|f| f.sort_key(origin) <= key),
        None => 0,
    };

    let mut rest = deduped.into_iter().skip(skip);
    let fragments: Vec<Fragment> = rest.by_ref().take(page_size).collect();
    let more = rest.next().is_some();

    let next_token = match fragments.last() {
        Some(last) if more => Some(
            TokenState::new(
                stream_name,
                *interval,
                Position::After(last.sort_key(origin)),
            )
            .encode()?,
        ),
        _ => None,
    };

    Ok(FragmentPage {
        fragments,
        next_token,
    })
}
