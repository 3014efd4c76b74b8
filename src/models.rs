use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{ArchivedMediaError, Result};

/// Absolute wall-clock instant. Fragments and ranges never carry durations here.
pub type Timestamp = DateTime<Utc>;

/// Declares a closed set of wire values.
///
/// Parsing an unrecognized string fails with the given error constructor;
/// there is no fallback variant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($err:ident) {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant, )+
        }

        impl $name {
            /// Every accepted value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The exact wire spelling.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $wire, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ArchivedMediaError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $( $wire => Ok($name::$variant), )+
                    other => {
                        let allowed: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                        Err(ArchivedMediaError::$err(format!(
                            "{} must be one of [{}], got {:?}",
                            stringify!($name),
                            allowed.join(", "),
                            other
                        )))
                    }
                }
            }
        }
    };
}

wire_enum! {
    /// Which fragment timestamp a range applies against.
    pub enum FragmentSelectorType (invalid_selector) {
        /// Timestamp assigned by the producing device.
        ProducerTimestamp => "PRODUCER_TIMESTAMP",
        /// Timestamp assigned by the service on ingestion.
        ServerTimestamp => "SERVER_TIMESTAMP",
    }
}

wire_enum! {
    /// Origin for clip selectors. Same values as [`FragmentSelectorType`].
    pub enum ClipFragmentSelectorType (invalid_selector) {
        ProducerTimestamp => "PRODUCER_TIMESTAMP",
        ServerTimestamp => "SERVER_TIMESTAMP",
    }
}

wire_enum! {
    pub enum ImageSelectorType (invalid_selector) {
        ProducerTimestamp => "PRODUCER_TIMESTAMP",
        ServerTimestamp => "SERVER_TIMESTAMP",
    }
}

wire_enum! {
    /// Output container for streamed media.
    pub enum ContainerFormat (invalid_argument) {
        FragmentedMp4 => "FRAGMENTED_MP4",
        MpegTs => "MPEG_TS",
    }
}

wire_enum! {
    pub enum PlaybackMode (invalid_argument) {
        /// Newest fragments, continually refreshed.
        Live => "LIVE",
        /// Live-style playback starting from a past instant. DASH only.
        LiveReplay => "LIVE_REPLAY",
        /// A fixed archived window.
        OnDemand => "ON_DEMAND",
    }
}

wire_enum! {
    /// When an HLS playlist marks discontinuities between fragments.
    pub enum HlsDiscontinuityMode (invalid_argument) {
        Always => "ALWAYS",
        Never => "NEVER",
        OnDiscontinuity => "ON_DISCONTINUITY",
    }
}

wire_enum! {
    pub enum DisplayFragmentTimestamp (invalid_argument) {
        Always => "ALWAYS",
        Never => "NEVER",
    }
}

wire_enum! {
    pub enum DisplayFragmentNumber (invalid_argument) {
        Always => "ALWAYS",
        Never => "NEVER",
    }
}

wire_enum! {
    /// Why no image could be produced for a sampled timestamp.
    pub enum ImageError (invalid_argument) {
        /// No fragment covers the timestamp.
        NoMedia => "NO_MEDIA",
        /// A fragment exists but could not be decoded.
        MediaError => "MEDIA_ERROR",
    }
}

wire_enum! {
    pub enum ImageFormat (invalid_argument) {
        Jpeg => "JPEG",
        Png => "PNG",
    }
}

impl Default for ContainerFormat {
    fn default() -> Self {
        Self::FragmentedMp4
    }
}

impl Default for PlaybackMode {
    fn default() -> Self {
        Self::Live
    }
}

impl Default for HlsDiscontinuityMode {
    fn default() -> Self {
        Self::Always
    }
}

impl Default for DisplayFragmentTimestamp {
    fn default() -> Self {
        Self::Never
    }
}

impl Default for DisplayFragmentNumber {
    fn default() -> Self {
        Self::Never
    }
}

impl From<ClipFragmentSelectorType> for FragmentSelectorType {
    fn from(value: ClipFragmentSelectorType) -> Self {
        match value {
            ClipFragmentSelectorType::ProducerTimestamp => Self::ProducerTimestamp,
            ClipFragmentSelectorType::ServerTimestamp => Self::ServerTimestamp,
        }
    }
}

impl From<ImageSelectorType> for FragmentSelectorType {
    fn from(value: ImageSelectorType) -> Self {
        match value {
            ImageSelectorType::ProducerTimestamp => Self::ProducerTimestamp,
            ImageSelectorType::ServerTimestamp => Self::ServerTimestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimestampRange {
    #[serde(rename = "StartTimestamp")]
    pub start: Timestamp,

    #[serde(rename = "EndTimestamp")]
    pub end: Timestamp,
}

impl TimestampRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }
}

/// A range plus the timestamp field it applies to.
///
/// The range is optional on the type because live sessions don't send one;
/// operations that need it reject its absence during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentSelector {
    #[serde(rename = "FragmentSelectorType")]
    pub selector_type: FragmentSelectorType,

    #[serde(rename = "TimestampRange", default, skip_serializing_if = "Option::is_none")]
    pub timestamp_range: Option<TimestampRange>,
}

impl FragmentSelector {
    pub fn new(selector_type: FragmentSelectorType, range: TimestampRange) -> Self {
        Self {
            selector_type,
            timestamp_range: Some(range),
        }
    }

    /// Build a selector from a wire-spelled origin.
    ///
    /// Returns [`ArchivedMediaError::InvalidSelector`] for anything other than
    /// `PRODUCER_TIMESTAMP` or `SERVER_TIMESTAMP`.
    pub fn parse(selector_type: &str, timestamp_range: Option<TimestampRange>) -> Result<Self> {
        Ok(Self {
            selector_type: selector_type.parse()?,
            timestamp_range,
        })
    }

    /// Parse a selector out of a JSON document such as
    /// `{"FragmentSelectorType": "SERVER_TIMESTAMP", "TimestampRange": {...}}`.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| ArchivedMediaError::invalid_selector(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipTimestampRange {
    #[serde(rename = "StartTimestamp")]
    pub start: Timestamp,

    #[serde(rename = "EndTimestamp")]
    pub end: Timestamp,
}

/// Selector for clip export. Unlike [`FragmentSelector`] the range is mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipFragmentSelector {
    #[serde(rename = "FragmentSelectorType")]
    pub selector_type: ClipFragmentSelectorType,

    #[serde(rename = "TimestampRange")]
    pub timestamp_range: ClipTimestampRange,
}

impl From<&ClipFragmentSelector> for FragmentSelector {
    fn from(clip: &ClipFragmentSelector) -> Self {
        Self {
            selector_type: clip.selector_type.into(),
            timestamp_range: Some(TimestampRange {
                start: clip.timestamp_range.start,
                end: clip.timestamp_range.end,
            }),
        }
    }
}

/// One entry of a stream's append-only fragment log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fragment {
    /// Decimal identifier assigned on ingestion.
    #[serde(rename = "FragmentNumber")]
    pub fragment_number: String,

    #[serde(rename = "ProducerTimestamp")]
    pub producer_timestamp: Timestamp,

    #[serde(rename = "ServerTimestamp")]
    pub server_timestamp: Timestamp,

    /// Position in the ingestion log. Unique and increasing per stream.
    #[serde(rename = "IngestionSequence")]
    pub ingestion_sequence: u64,

    #[serde(rename = "FragmentLengthInMilliseconds")]
    pub duration_millis: u64,

    #[serde(rename = "FragmentSizeInBytes")]
    pub size_bytes: u64,
}

impl Fragment {
    /// The timestamp a selector of the given origin compares against.
    pub fn timestamp(&self, origin: FragmentSelectorType) -> Timestamp {
        match origin {
            FragmentSelectorType::ProducerTimestamp => self.producer_timestamp,
            FragmentSelectorType::ServerTimestamp => self.server_timestamp,
        }
    }

    /// Total order used for results and continuation: origin timestamp, then
    /// ingestion order.
    pub fn sort_key(&self, origin: FragmentSelectorType) -> SortKey {
        SortKey {
            timestamp: self.timestamp(origin),
            sequence: self.ingestion_sequence,
        }
    }

    /// Whether `at` falls within `[timestamp, timestamp + duration)`.
    ///
    /// A duration whose end is not representable covers nothing.
    pub fn covers(&self, origin: FragmentSelectorType, at: Timestamp) -> bool {
        let start = self.timestamp(origin);
        let end = i64::try_from(self.duration_millis)
            .ok()
            .and_then(chrono::TimeDelta::try_milliseconds)
            .and_then(|d| start.checked_add_signed(d));
        match end {
            Some(end) => start <= at && at < end,
            None => false,
        }
    }
}

/// Position of a fragment in a resolved sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub timestamp: Timestamp,
    pub sequence: u64,
}

static STREAM_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.\-]{1,256}$").expect("valid stream name regex"));

static STREAM_ARN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^arn:aws:kinesisvideo:[a-z0-9\-]+:[0-9]+:[a-z]+/[a-zA-Z0-9_.\-]+/[0-9]+$")
        .expect("valid stream ARN regex")
});

/// Identifies a stream either by name or by ARN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamRef {
    #[serde(rename = "StreamName")]
    Name(String),
    #[serde(rename = "StreamARN")]
    Arn(String),
}

impl StreamRef {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn arn(arn: impl Into<String>) -> Self {
        Self::Arn(arn.into())
    }

    /// Check the length and character constraints.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Name(name) if !STREAM_NAME_PATTERN.is_match(name) => {
                Err(ArchivedMediaError::invalid_argument(format!(
                    "StreamName {name:?} must be 1-256 characters of [a-zA-Z0-9_.-]"
                )))
            }
            Self::Arn(arn) if arn.len() > 1024 || !STREAM_ARN_PATTERN.is_match(arn) => {
                Err(ArchivedMediaError::invalid_argument(format!(
                    "StreamARN {arn:?} is not a valid stream ARN"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Whether this reference names the described stream.
    pub fn matches(&self, description: &StreamDescription) -> bool {
        match self {
            Self::Name(name) => *name == description.stream_name,
            Self::Arn(arn) => *arn == description.stream_arn,
        }
    }
}

impl fmt::Display for StreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Arn(arn) => f.write_str(arn),
        }
    }
}

/// What the catalog knows about a stream besides its fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescription {
    #[serde(rename = "StreamName")]
    pub stream_name: String,

    #[serde(rename = "StreamARN")]
    pub stream_arn: String,

    /// Zero means nothing is archived.
    #[serde(rename = "DataRetentionInHours")]
    pub data_retention_hours: u32,

    /// Codec IDs of the tracks carried by the stream's fragments, track 1 first.
    #[serde(rename = "TrackCodecs", default)]
    pub track_codecs: Vec<String>,
}

/// A frame extracted at one sampled timestamp, or the reason there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "TimeStamp")]
    pub time_stamp: Timestamp,

    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ImageError>,

    /// Base64-encoded frame, present when `error` is `None`.
    #[serde(rename = "ImageContent", default, skip_serializing_if = "Option::is_none")]
    pub image_content: Option<String>,
}
