//! Image sampling plans.
//!
//! Frames are extracted by an external renderer. This module decides which
//! instants to sample and which fragment holds each one; results are consumed
//! positionally, one [`Image`] per sample.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::FragmentCatalog;
use crate::errors::{ArchivedMediaError, Result};
use crate::models::{
    Fragment, FragmentSelectorType, Image, ImageError, ImageFormat, ImageSelectorType, StreamRef,
    Timestamp,
};
use crate::resolver::{check_limit, Resolver};
use crate::selector::normalize_range;
use crate::token::{Position, TokenState};

pub const MIN_SAMPLING_INTERVAL_MILLIS: u64 = 200;
pub const MAX_SAMPLING_INTERVAL_MILLIS: u64 = 20_000;
const DEFAULT_IMAGE_RESULTS: usize = 25;
const MAX_IMAGE_RESULTS: usize = 100;
/// How far before the start of the range a covering fragment may start.
const FRAGMENT_LOOKBEHIND_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetImagesRequest {
    #[serde(rename = "Stream")]
    pub stream: StreamRef,

    #[serde(rename = "ImageSelectorType")]
    pub image_selector_type: ImageSelectorType,

    #[serde(rename = "StartTimestamp")]
    pub start_timestamp: Timestamp,

    /// Inclusive.
    #[serde(rename = "EndTimestamp")]
    pub end_timestamp: Timestamp,

    /// 200-20000.
    #[serde(rename = "SamplingInterval")]
    pub sampling_interval_millis: u64,

    #[serde(rename = "Format")]
    pub format: ImageFormat,

    /// 1-100. Defaults to 25.
    #[serde(rename = "MaxResults", default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,

    #[serde(rename = "NextToken", default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// One sampled instant and the fragment to extract it from, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSlot {
    pub time_stamp: Timestamp,
    pub fragment: Option<Fragment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePlan {
    pub format: ImageFormat,
    pub slots: Vec<ImageSlot>,
    pub next_token: Option<String>,
}

impl ImagePlan {
    /// Produce one [`Image`] per slot, in order.
    ///
    /// `extract` is called for slots backed by a fragment and returns the
    /// encoded frame, or `None` if decoding failed. Slots with no fragment
    /// become `NO_MEDIA`; failed extractions become `MEDIA_ERROR`.
    pub fn render<F>(&self, mut extract: F) -> Vec<Image>
    where
        F: FnMut(&Fragment, Timestamp) -> Option<String>,
    {
        self.slots
            .iter()
            .map(|slot| {
                let (error, image_content) = match &slot.fragment {
                    None => (Some(ImageError::NoMedia), None),
                    Some(fragment) => match extract(fragment, slot.time_stamp) {
                        Some(content) => (None, Some(content)),
                        None => (Some(ImageError::MediaError), None),
                    },
                };
                Image {
                    time_stamp: slot.time_stamp,
                    error,
                    image_content,
                }
            })
            .collect()
    }
}

impl<C: FragmentCatalog> Resolver<C> {
    /// Plan one page of image samples.
    pub async fn plan_images(&self, request: &GetImagesRequest) -> Result<ImagePlan> {
        let stream = &request.stream;
        stream.validate()?;

        let step = request.sampling_interval_millis;
        if !(MIN_SAMPLING_INTERVAL_MILLIS..=MAX_SAMPLING_INTERVAL_MILLIS).contains(&step) {
            return Err(ArchivedMediaError::invalid_argument(format!(
                "SamplingInterval must be between {MIN_SAMPLING_INTERVAL_MILLIS} and \
                 {MAX_SAMPLING_INTERVAL_MILLIS} milliseconds, got {step}"
            )));
        }
        let max_results = request
            .max_results
            .map_or(DEFAULT_IMAGE_RESULTS, |n| n as usize);
        check_limit("MaxResults", max_results, MAX_IMAGE_RESULTS)?;

        let origin = FragmentSelectorType::from(request.image_selector_type);
        let interval = normalize_range(origin, request.start_timestamp, request.end_timestamp)?;

        let state = request.next_token.as_deref().map(TokenState::decode).transpose()?;
        let first = match &state {
            Some(state) => match state.position {
                Position::Sample(index) if state.interval == interval => index,
                _ => {
                    return Err(ArchivedMediaError::invalid_argument(
                        "NextToken does not belong to this image request",
                    ))
                }
            },
            None => 0,
        };

        let description = self.archived_description(stream).await?;
        if let Some(state) = &state {
            state.check_stream(&description.stream_name)?;
        }

        let total = (interval.end - interval.start).num_milliseconds() as u64 / step + 1;
        let last = total.min(first.saturating_add(max_results as u64));
        let sample_at = |i: u64| interval.start + TimeDelta::milliseconds((i * step) as i64);

        let mut slots = Vec::new();
        if first < last {
            // Every page starts its window at the same instant so that a
            // retried fragment is deduplicated the same way on each page.
            let window_start = interval
                .start
                .checked_sub_signed(TimeDelta::seconds(FRAGMENT_LOOKBEHIND_SECS))
                .map_or(DateTime::<Utc>::UNIX_EPOCH, |t| t.max(DateTime::<Utc>::UNIX_EPOCH));
            let window = normalize_range(origin, window_start, sample_at(last - 1))?;
            let fragments = self.resolve_interval(stream, &window).await?;

            for i in first..last {
                let at = sample_at(i);
                let started = fragments.partition_point(|f| f.timestamp(origin) <= at);
                let fragment = fragments[..started]
                    .iter()
                    .rev()
                    .find(|f| f.covers(origin, at))
                    .cloned();
                slots.push(ImageSlot {
                    time_stamp: at,
                    fragment,
                });
            }
        }

        let next_token = if last < total {
            Some(
                TokenState::new(&description.stream_name, interval, Position::Sample(last))
                    .encode()?,
            )
        } else {
            None
        };

        debug!(
            %stream,
            samples = slots.len(),
            no_media = slots.iter().filter(|s| s.fragment.is_none()).count(),
            "image samples planned"
        );
        Ok(ImagePlan {
            format: request.format,
            slots,
            next_token,
        })
    }
}
