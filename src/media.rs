//! Codec admission and direct fragment retrieval.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::FragmentCatalog;
use crate::errors::{ArchivedMediaError, Result};
use crate::models::{Fragment, StreamDescription, StreamRef};
use crate::resolver::{check_limit, Resolver};

pub const CODEC_H264: &str = "V_MPEG/ISO/AVC";
pub const CODEC_H265: &str = "V_MPEGH/ISO/HEVC";
pub const CODEC_AAC: &str = "A_AAC";
pub const CODEC_G711: &str = "A_MS/ACM";

const MAX_FRAGMENT_LIST: usize = 1000;

static FRAGMENT_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,128}$").expect("valid fragment number regex"));

/// Codecs an output format can carry: one video track, then at most one
/// audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRequirements {
    pub output: &'static str,
    pub video: &'static [&'static str],
    pub audio: &'static [&'static str],
}

impl MediaRequirements {
    pub const MP4_CLIP: Self = Self {
        output: "MP4 clip",
        video: &[CODEC_H264, CODEC_H265],
        audio: &[CODEC_AAC, CODEC_G711],
    };

    pub const HLS_FRAGMENTED_MP4: Self = Self {
        output: "HLS (fMP4)",
        video: &[CODEC_H264, CODEC_H265],
        audio: &[CODEC_AAC],
    };

    pub const HLS_MPEG_TS: Self = Self {
        output: "HLS (MPEG-TS)",
        video: &[CODEC_H264],
        audio: &[CODEC_AAC],
    };

    pub const DASH: Self = Self {
        output: "MPEG-DASH",
        video: &[CODEC_H264, CODEC_H265],
        audio: &[CODEC_AAC, CODEC_G711],
    };

    /// Fails with [`ArchivedMediaError::UnsupportedStreamMediaType`] when the
    /// stream's tracks don't fit.
    pub fn check(&self, description: &StreamDescription) -> Result<()> {
        let unsupported = |detail: String| ArchivedMediaError::UnsupportedStreamMediaType {
            message: format!(
                "stream {} cannot be served as {}: {detail}",
                description.stream_name, self.output
            ),
        };

        match description.track_codecs.as_slice() {
            [] => Err(unsupported("stream has no tracks".into())),
            [video, ..] if !self.video.contains(&video.as_str()) => Err(unsupported(format!(
                "track 1 codec {video} is not one of {:?}",
                self.video
            ))),
            [_, audio] if !self.audio.contains(&audio.as_str()) => Err(unsupported(format!(
                "track 2 codec {audio} is not one of {:?}",
                self.audio
            ))),
            [_] | [_, _] => Ok(()),
            tracks => Err(unsupported(format!("{} tracks, expected at most 2", tracks.len()))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMediaForFragmentListRequest {
    #[serde(rename = "Stream")]
    pub stream: StreamRef,

    /// 1-1000 fragment numbers.
    #[serde(rename = "Fragments")]
    pub fragments: Vec<String>,
}

impl<C: FragmentCatalog> Resolver<C> {
    /// Look up an explicit list of fragments, in the order given.
    ///
    /// No deduplication happens here: the caller named these fragments.
    pub async fn media_for_fragment_list(
        &self,
        request: &GetMediaForFragmentListRequest,
    ) -> Result<Vec<Fragment>> {
        let stream = &request.stream;
        stream.validate()?;
        check_limit("Fragments", request.fragments.len(), MAX_FRAGMENT_LIST)?;
        if let Some(bad) = request
            .fragments
            .iter()
            .find(|n| !FRAGMENT_NUMBER_PATTERN.is_match(n))
        {
            return Err(ArchivedMediaError::invalid_argument(format!(
                "fragment number {bad:?} must be 1-128 decimal digits"
            )));
        }

        self.archived_description(stream).await?;
        let fragments = self.fragments_by_number(stream, &request.fragments).await?;
        debug!(%stream, fragments = fragments.len(), "fragment list resolved");
        Ok(fragments)
    }
}
