//! Selector validation and normalization.

use chrono::{DurationRound, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::errors::{ArchivedMediaError, Result};
use crate::models::{Fragment, FragmentSelector, FragmentSelectorType, Timestamp, TimestampRange};

/// A validated, closed `[start, end]` interval tagged with the fragment
/// timestamp it applies to. Bounds are at millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalInterval {
    pub origin: FragmentSelectorType,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl CanonicalInterval {
    /// Both ends are inclusive.
    pub fn contains(&self, at: Timestamp) -> bool {
        self.start <= at && at <= self.end
    }

    pub fn contains_fragment(&self, fragment: &Fragment) -> bool {
        self.contains(fragment.timestamp(self.origin))
    }

    /// The selector that normalizes back to this interval.
    pub fn to_selector(&self) -> FragmentSelector {
        FragmentSelector::new(self.origin, TimestampRange::new(self.start, self.end))
    }
}

/// Validate a selector whose range is mandatory and produce its canonical interval.
///
/// Fails with [`ArchivedMediaError::InvalidSelector`] when the range is missing,
/// inverted, or starts before the Unix epoch.
pub fn normalize(selector: &FragmentSelector) -> Result<CanonicalInterval> {
    let range = selector
        .timestamp_range
        .ok_or_else(|| ArchivedMediaError::invalid_selector("TimestampRange is required"))?;
    normalize_range(selector.selector_type, range.start, range.end)
}

pub(crate) fn normalize_range(
    origin: FragmentSelectorType,
    start: Timestamp,
    end: Timestamp,
) -> Result<CanonicalInterval> {
    if start.timestamp_millis() < 0 || end.timestamp_millis() < 0 {
        return Err(ArchivedMediaError::invalid_selector(
            "timestamps must not precede the Unix epoch",
        ));
    }
    if start > end {
        return Err(ArchivedMediaError::invalid_selector(format!(
            "StartTimestamp {start} is after EndTimestamp {end}"
        )));
    }
    Ok(CanonicalInterval {
        origin,
        start: truncate_millis(start)?,
        end: truncate_millis(end)?,
    })
}

fn truncate_millis(ts: Timestamp) -> Result<Timestamp> {
    ts.duration_trunc(TimeDelta::milliseconds(1))
        .map_err(|e| ArchivedMediaError::invalid_selector(format!("timestamp {ts}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn at(secs: i64) -> Timestamp {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn selector(start: i64, end: i64) -> FragmentSelector {
        FragmentSelector::new(
            FragmentSelectorType::ProducerTimestamp,
            TimestampRange::new(at(start), at(end)),
        )
    }

    #[test]
    fn inverted_range_rejected() {
        let err = normalize(&selector(10, 5)).unwrap_err();
        assert!(matches!(err, ArchivedMediaError::InvalidSelector { .. }));
    }

    #[test]
    fn missing_range_rejected() {
        let sel = FragmentSelector {
            selector_type: FragmentSelectorType::ServerTimestamp,
            timestamp_range: None,
        };
        assert!(matches!(
            normalize(&sel),
            Err(ArchivedMediaError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn pre_epoch_rejected() {
        assert!(normalize(&selector(-5, 5)).is_err());
    }

    #[test]
    fn empty_range_is_allowed() {
        let interval = normalize(&selector(7, 7)).unwrap();
        assert!(interval.contains(at(7)));
    }

    #[test]
    fn sub_millisecond_precision_dropped() {
        let start = DateTime::from_timestamp(1, 1_234_567).unwrap();
        let sel = FragmentSelector::new(
            FragmentSelectorType::ServerTimestamp,
            TimestampRange::new(start, at(2)),
        );
        let interval = normalize(&sel).unwrap();
        assert_eq!(interval.start, DateTime::from_timestamp(1, 1_000_000).unwrap());
        assert_eq!(normalize(&interval.to_selector()).unwrap(), interval);
    }

    #[test]
    fn bounds_are_inclusive() {
        let interval = normalize(&selector(1, 4)).unwrap();
        assert!(interval.contains(at(1)));
        assert!(interval.contains(at(4)));
        assert!(!interval.contains(at(5)));
    }
}
