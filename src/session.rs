//! HLS and MPEG-DASH streaming session planning.
//!
//! A plan is the fragment list and playback options a manifest generator needs
//! to build the initial playlist or manifest. Issuing and signing the session
//! URL belongs to the transport layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::FragmentCatalog;
use crate::errors::{ArchivedMediaError, Result};
use crate::media::MediaRequirements;
use crate::models::{
    ContainerFormat, DisplayFragmentNumber, DisplayFragmentTimestamp, Fragment, FragmentSelector,
    FragmentSelectorType, HlsDiscontinuityMode, PlaybackMode, StreamRef, Timestamp,
};
use crate::resolver::{check_limit, Resolver};
use crate::selector::{normalize, normalize_range, CanonicalInterval};

const MIN_EXPIRES_SECS: u32 = 300;
const MAX_EXPIRES_SECS: u32 = 43_200;
const HLS_DEFAULT_EXPIRES_SECS: u32 = 3600;
const DASH_DEFAULT_EXPIRES_SECS: u32 = 300;
const HLS_MAX_FRAGMENT_RESULTS: usize = 1000;
const DASH_MAX_FRAGMENT_RESULTS: usize = 5000;
const LIVE_DEFAULT_FRAGMENT_RESULTS: usize = 5;
const ON_DEMAND_DEFAULT_FRAGMENT_RESULTS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamingProtocol {
    #[serde(rename = "HLS")]
    Hls,
    #[serde(rename = "DASH")]
    Dash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetHlsStreamingSessionRequest {
    #[serde(rename = "Stream")]
    pub stream: StreamRef,

    #[serde(rename = "PlaybackMode", default)]
    pub playback_mode: PlaybackMode,

    /// Required for `ON_DEMAND`. For `LIVE` only the selector type may be set.
    #[serde(rename = "HLSFragmentSelector", default, skip_serializing_if = "Option::is_none")]
    pub fragment_selector: Option<FragmentSelector>,

    #[serde(rename = "ContainerFormat", default)]
    pub container_format: ContainerFormat,

    #[serde(rename = "DiscontinuityMode", default)]
    pub discontinuity_mode: HlsDiscontinuityMode,

    #[serde(rename = "DisplayFragmentTimestamp", default)]
    pub display_fragment_timestamp: DisplayFragmentTimestamp,

    /// Seconds, 300-43200. Defaults to 3600.
    #[serde(rename = "Expires", default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<u32>,

    /// 1-1000. Defaults to 5 for `LIVE`, 1000 for `ON_DEMAND`.
    #[serde(rename = "MaxMediaPlaylistFragmentResults", default, skip_serializing_if = "Option::is_none")]
    pub max_media_playlist_fragment_results: Option<u32>,
}

impl GetHlsStreamingSessionRequest {
    /// A `LIVE` request with every option at its default.
    pub fn new(stream: StreamRef) -> Self {
        Self {
            stream,
            playback_mode: PlaybackMode::default(),
            fragment_selector: None,
            container_format: ContainerFormat::default(),
            discontinuity_mode: HlsDiscontinuityMode::default(),
            display_fragment_timestamp: DisplayFragmentTimestamp::default(),
            expires: None,
            max_media_playlist_fragment_results: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDashStreamingSessionRequest {
    #[serde(rename = "Stream")]
    pub stream: StreamRef,

    #[serde(rename = "PlaybackMode", default)]
    pub playback_mode: PlaybackMode,

    /// Required for `ON_DEMAND` and `LIVE_REPLAY`.
    #[serde(rename = "DASHFragmentSelector", default, skip_serializing_if = "Option::is_none")]
    pub fragment_selector: Option<FragmentSelector>,

    #[serde(rename = "DisplayFragmentTimestamp", default)]
    pub display_fragment_timestamp: DisplayFragmentTimestamp,

    #[serde(rename = "DisplayFragmentNumber", default)]
    pub display_fragment_number: DisplayFragmentNumber,

    /// Seconds, 300-43200. Defaults to 300.
    #[serde(rename = "Expires", default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<u32>,

    /// 1-5000. Defaults to 5 for `LIVE` and `LIVE_REPLAY`, 1000 for `ON_DEMAND`.
    #[serde(rename = "MaxManifestFragmentResults", default, skip_serializing_if = "Option::is_none")]
    pub max_manifest_fragment_results: Option<u32>,
}

impl GetDashStreamingSessionRequest {
    /// A `LIVE` request with every option at its default.
    pub fn new(stream: StreamRef) -> Self {
        Self {
            stream,
            playback_mode: PlaybackMode::default(),
            fragment_selector: None,
            display_fragment_timestamp: DisplayFragmentTimestamp::default(),
            display_fragment_number: DisplayFragmentNumber::default(),
            expires: None,
            max_manifest_fragment_results: None,
        }
    }
}

/// Everything needed to generate the first playlist or manifest of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingSessionPlan {
    pub protocol: StreamingProtocol,
    pub stream_name: String,
    pub playback_mode: PlaybackMode,
    pub origin: FragmentSelectorType,
    /// Always `FRAGMENTED_MP4` for DASH.
    pub container_format: ContainerFormat,
    /// HLS only.
    pub discontinuity_mode: Option<HlsDiscontinuityMode>,
    pub display_fragment_timestamp: DisplayFragmentTimestamp,
    /// DASH only.
    pub display_fragment_number: Option<DisplayFragmentNumber>,
    pub expires: Duration,
    pub expires_at: Timestamp,
    /// Ordered by the origin timestamp.
    pub fragments: Vec<Fragment>,
}

/// The protocol-independent part of a session request.
struct SessionParams<'a> {
    protocol: StreamingProtocol,
    stream: &'a StreamRef,
    mode: PlaybackMode,
    selector: Option<&'a FragmentSelector>,
    expires: Option<u32>,
    default_expires: u32,
    max_results: Option<u32>,
    max_results_limit: usize,
    requirements: MediaRequirements,
}

/// What a session resolved to before protocol-specific options are attached.
struct ResolvedSession {
    stream_name: String,
    origin: FragmentSelectorType,
    expires: Duration,
    expires_at: Timestamp,
    fragments: Vec<Fragment>,
}

impl<C: FragmentCatalog> Resolver<C> {
    /// Plan an HLS session.
    ///
    /// `LIVE_REPLAY` is not available over HLS and is rejected as an invalid
    /// argument.
    pub async fn plan_hls_session(
        &self,
        request: &GetHlsStreamingSessionRequest,
    ) -> Result<StreamingSessionPlan> {
        if request.playback_mode == PlaybackMode::LiveReplay {
            return Err(ArchivedMediaError::invalid_argument(
                "PlaybackMode LIVE_REPLAY is not supported for HLS",
            ));
        }
        let requirements = match request.container_format {
            ContainerFormat::FragmentedMp4 => MediaRequirements::HLS_FRAGMENTED_MP4,
            ContainerFormat::MpegTs => MediaRequirements::HLS_MPEG_TS,
        };

        let resolved = self
            .plan_session(SessionParams {
                protocol: StreamingProtocol::Hls,
                stream: &request.stream,
                mode: request.playback_mode,
                selector: request.fragment_selector.as_ref(),
                expires: request.expires,
                default_expires: HLS_DEFAULT_EXPIRES_SECS,
                max_results: request.max_media_playlist_fragment_results,
                max_results_limit: HLS_MAX_FRAGMENT_RESULTS,
                requirements,
            })
            .await?;

        Ok(StreamingSessionPlan {
            protocol: StreamingProtocol::Hls,
            stream_name: resolved.stream_name,
            playback_mode: request.playback_mode,
            origin: resolved.origin,
            container_format: request.container_format,
            discontinuity_mode: Some(request.discontinuity_mode),
            display_fragment_timestamp: request.display_fragment_timestamp,
            display_fragment_number: None,
            expires: resolved.expires,
            expires_at: resolved.expires_at,
            fragments: resolved.fragments,
        })
    }

    /// Plan an MPEG-DASH session.
    pub async fn plan_dash_session(
        &self,
        request: &GetDashStreamingSessionRequest,
    ) -> Result<StreamingSessionPlan> {
        let resolved = self
            .plan_session(SessionParams {
                protocol: StreamingProtocol::Dash,
                stream: &request.stream,
                mode: request.playback_mode,
                selector: request.fragment_selector.as_ref(),
                expires: request.expires,
                default_expires: DASH_DEFAULT_EXPIRES_SECS,
                max_results: request.max_manifest_fragment_results,
                max_results_limit: DASH_MAX_FRAGMENT_RESULTS,
                requirements: MediaRequirements::DASH,
            })
            .await?;

        Ok(StreamingSessionPlan {
            protocol: StreamingProtocol::Dash,
            stream_name: resolved.stream_name,
            playback_mode: request.playback_mode,
            origin: resolved.origin,
            container_format: ContainerFormat::FragmentedMp4,
            discontinuity_mode: None,
            display_fragment_timestamp: request.display_fragment_timestamp,
            display_fragment_number: Some(request.display_fragment_number),
            expires: resolved.expires,
            expires_at: resolved.expires_at,
            fragments: resolved.fragments,
        })
    }

    async fn plan_session(&self, params: SessionParams<'_>) -> Result<ResolvedSession> {
        let stream = params.stream;
        stream.validate()?;

        let expires_secs = params.expires.unwrap_or(params.default_expires);
        if !(MIN_EXPIRES_SECS..=MAX_EXPIRES_SECS).contains(&expires_secs) {
            return Err(ArchivedMediaError::invalid_argument(format!(
                "Expires must be between {MIN_EXPIRES_SECS} and {MAX_EXPIRES_SECS} seconds, got {expires_secs}"
            )));
        }

        let max_results = match params.max_results {
            Some(n) => n as usize,
            None if params.mode == PlaybackMode::OnDemand => ON_DEMAND_DEFAULT_FRAGMENT_RESULTS,
            None => LIVE_DEFAULT_FRAGMENT_RESULTS,
        };
        check_limit("maximum fragment results", max_results, params.max_results_limit)?;

        let now = self.now();
        let (description, interval) = match params.mode {
            PlaybackMode::Live => {
                if params.selector.is_some_and(|s| s.timestamp_range.is_some()) {
                    return Err(ArchivedMediaError::invalid_argument(
                        "TimestampRange must not be set in LIVE mode",
                    ));
                }
                let origin = params
                    .selector
                    .map_or(FragmentSelectorType::ServerTimestamp, |s| s.selector_type);
                let since = now
                    .checked_sub_signed(self.live_window)
                    .map_or(DateTime::<Utc>::UNIX_EPOCH, |t| t.max(DateTime::<Utc>::UNIX_EPOCH));
                let description = self.describe(stream).await?;
                (description, Some(normalize_range(origin, since, now)?))
            }
            PlaybackMode::OnDemand => {
                let interval = normalize(required_selector(params.selector, params.mode)?)?;
                (self.archived_description(stream).await?, Some(interval))
            }
            PlaybackMode::LiveReplay => {
                let requested = normalize(required_selector(params.selector, params.mode)?)?;
                let description = self.archived_description(stream).await?;
                (description, clamp_to(requested, now)?)
            }
        };
        params.requirements.check(&description)?;

        let mut fragments = match interval {
            Some(interval) => self.resolve_interval(stream, &interval).await?,
            None => Vec::new(),
        };
        if fragments.is_empty() {
            return Err(ArchivedMediaError::not_found(match params.mode {
                PlaybackMode::Live => format!(
                    "no fragments ingested into stream {stream} in the last {} seconds",
                    self.live_window.num_seconds()
                ),
                _ => format!("no fragments in stream {stream} for the requested range"),
            }));
        }

        let available = fragments.len();
        match params.mode {
            // Newest fragments for live playback, oldest otherwise.
            PlaybackMode::Live => {
                let excess = available.saturating_sub(max_results);
                fragments.drain(..excess);
            }
            _ => fragments.truncate(max_results),
        }

        let expires = Duration::from_secs(u64::from(expires_secs));
        let expires_at = now + chrono::Duration::seconds(i64::from(expires_secs));

        if fragments.len() < available {
            debug!(%stream, kept = fragments.len(), available, "session fragment list capped");
        }
        info!(
            %stream,
            protocol = ?params.protocol,
            mode = %params.mode,
            fragments = fragments.len(),
            "streaming session planned"
        );

        Ok(ResolvedSession {
            stream_name: description.stream_name,
            origin: interval.map_or(FragmentSelectorType::ServerTimestamp, |i| i.origin),
            expires,
            expires_at,
            fragments,
        })
    }
}

fn required_selector(
    selector: Option<&FragmentSelector>,
    mode: PlaybackMode,
) -> Result<&FragmentSelector> {
    selector
        .filter(|s| s.timestamp_range.is_some())
        .ok_or_else(|| {
            ArchivedMediaError::invalid_selector(format!(
                "a fragment selector with a TimestampRange is required in {mode} mode"
            ))
        })
}

/// Cut a replay window off at `now`. `None` if it starts in the future.
fn clamp_to(interval: CanonicalInterval, now: Timestamp) -> Result<Option<CanonicalInterval>> {
    if interval.start > now {
        return Ok(None);
    }
    normalize_range(interval.origin, interval.start, interval.end.min(now)).map(Some)
}
