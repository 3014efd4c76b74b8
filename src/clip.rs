//! Clip export planning.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::FragmentCatalog;
use crate::errors::{ArchivedMediaError, Result};
use crate::media::MediaRequirements;
use crate::models::{ClipFragmentSelector, Fragment, FragmentSelector, StreamRef};
use crate::resolver::Resolver;
use crate::selector::normalize;

/// Most fragments a clip may contain, counted from the start timestamp.
pub const MAX_CLIP_FRAGMENTS: usize = 200;
/// Largest clip payload, in bytes.
pub const MAX_CLIP_BYTES: u64 = 100 * 1024 * 1024;

/// Ceilings on a single clip. Whichever is reached first ends the clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipLimits {
    pub max_fragments: usize,
    pub max_bytes: u64,
}

impl Default for ClipLimits {
    fn default() -> Self {
        Self {
            max_fragments: MAX_CLIP_FRAGMENTS,
            max_bytes: MAX_CLIP_BYTES,
        }
    }
}

impl ClipLimits {
    /// Keep the longest prefix of `fragments` that fits both ceilings.
    ///
    /// Returns the kept fragments, their total size, and whether anything was cut.
    pub fn apply(&self, fragments: Vec<Fragment>) -> (Vec<Fragment>, u64, bool) {
        let available = fragments.len();
        let mut total_bytes = 0u64;
        let mut kept = Vec::with_capacity(available.min(self.max_fragments));

        for fragment in fragments {
            if kept.len() == self.max_fragments {
                break;
            }
            let next = total_bytes.saturating_add(fragment.size_bytes);
            if next > self.max_bytes {
                break;
            }
            total_bytes = next;
            kept.push(fragment);
        }

        let truncated = kept.len() < available;
        (kept, total_bytes, truncated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetClipRequest {
    #[serde(rename = "Stream")]
    pub stream: StreamRef,

    #[serde(rename = "ClipFragmentSelector")]
    pub clip_fragment_selector: ClipFragmentSelector,
}

/// The fragments an assembler should concatenate into one MP4 clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipPlan {
    #[serde(rename = "StreamName")]
    pub stream_name: String,

    /// Always `video/mp4`.
    #[serde(rename = "ContentType")]
    pub content_type: String,

    #[serde(rename = "Fragments")]
    pub fragments: Vec<Fragment>,

    #[serde(rename = "TotalBytes")]
    pub total_bytes: u64,

    /// The selection ran past a ceiling and was cut short.
    #[serde(rename = "Truncated")]
    pub truncated: bool,
}

impl<C: FragmentCatalog> Resolver<C> {
    /// Work out which fragments make up a clip.
    ///
    /// # Errors
    ///
    /// - [`ArchivedMediaError::InvalidSelector`] for an inverted or pre-epoch range.
    /// - [`ArchivedMediaError::NoDataRetention`] if the stream archives nothing.
    /// - [`ArchivedMediaError::UnsupportedStreamMediaType`] if the tracks can't go in an MP4.
    /// - [`ArchivedMediaError::ResourceNotFound`] if the range holds no fragments.
    /// - [`ArchivedMediaError::InvalidArgument`] if the first fragment alone
    ///   exceeds the byte ceiling.
    pub async fn plan_clip(&self, request: &GetClipRequest) -> Result<ClipPlan> {
        let stream = &request.stream;
        stream.validate()?;
        let interval = normalize(&FragmentSelector::from(&request.clip_fragment_selector))?;

        let description = self.archived_description(stream).await?;
        MediaRequirements::MP4_CLIP.check(&description)?;

        let selected = self.resolve_interval(stream, &interval).await?;
        if selected.is_empty() {
            return Err(ArchivedMediaError::not_found(format!(
                "no fragments in stream {stream} between {} and {}",
                interval.start, interval.end
            )));
        }

        let available = selected.len();
        let (fragments, total_bytes, truncated) = self.clip_limits.apply(selected);
        if fragments.is_empty() {
            return Err(ArchivedMediaError::invalid_argument(format!(
                "first fragment exceeds the {} byte clip limit",
                self.clip_limits.max_bytes
            )));
        }

        if truncated {
            info!(
                %stream,
                kept = fragments.len(),
                available,
                total_bytes,
                "clip truncated at limit"
            );
        } else {
            debug!(%stream, fragments = fragments.len(), total_bytes, "clip planned");
        }

        Ok(ClipPlan {
            stream_name: description.stream_name,
            content_type: "video/mp4".to_string(),
            fragments,
            total_bytes,
            truncated,
        })
    }
}
