//! # Archived media fragment resolver
//!
//! Resolves time-range selectors over append-only video fragment logs into
//! ordered, deduplicated fragment lists, and plans the archived-media
//! operations built on top of them: fragment listings, MP4 clips, HLS and
//! MPEG-DASH sessions, fragment-list retrieval and image sampling.
//!
//! Media bytes never pass through this crate. Every operation returns a plan
//! (which fragments, in which order, with which options) for a muxer,
//! manifest generator or frame extractor to act on.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use archived_media::{
//!     FragmentSelector, FragmentSelectorType, InMemoryCatalog, Resolver, StreamRef,
//!     TimestampRange,
//! };
//! use chrono::{TimeZone, Utc};
//!
//! #[tokio::main]
//! async fn main() -> archived_media::Result<()> {
//!     let resolver = Resolver::builder(Arc::new(InMemoryCatalog::new())).build()?;
//!
//!     let selector = FragmentSelector::new(
//!         FragmentSelectorType::ServerTimestamp,
//!         TimestampRange::new(
//!             Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
//!             Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap(),
//!         ),
//!     );
//!
//!     let page = resolver
//!         .resolve_fragments(&StreamRef::name("front-door"), Some(&selector), None, None)
//!         .await?;
//!     for fragment in &page.fragments {
//!         println!("  {} ({} ms)", fragment.fragment_number, fragment.duration_millis);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Builder pattern
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use archived_media::{ClipLimits, InMemoryCatalog, Resolver};
//!
//! # fn example() -> archived_media::Result<()> {
//! let resolver = Resolver::builder(Arc::new(InMemoryCatalog::new()))
//!     .page_size(500)
//!     .live_window(Duration::from_secs(60))
//!     .clip_limits(ClipLimits { max_fragments: 50, max_bytes: 10 * 1024 * 1024 })
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod catalog;
mod clip;
mod dedupe;
mod errors;
mod images;
mod media;
mod models;
mod resolver;
mod selector;
mod session;
mod token;

pub use catalog::{Candidates, FragmentCatalog, InMemoryCatalog};
pub use clip::{ClipLimits, ClipPlan, GetClipRequest, MAX_CLIP_BYTES, MAX_CLIP_FRAGMENTS};
pub use dedupe::{dedupe, FragmentPage};
pub use errors::{ArchivedMediaError, Result};
pub use images::{
    GetImagesRequest, ImagePlan, ImageSlot, MAX_SAMPLING_INTERVAL_MILLIS,
    MIN_SAMPLING_INTERVAL_MILLIS,
};
pub use media::{
    GetMediaForFragmentListRequest, MediaRequirements, CODEC_AAC, CODEC_G711, CODEC_H264,
    CODEC_H265,
};
pub use models::{
    ClipFragmentSelector, ClipFragmentSelectorType, ClipTimestampRange, ContainerFormat,
    DisplayFragmentNumber, DisplayFragmentTimestamp, Fragment, FragmentSelector,
    FragmentSelectorType, HlsDiscontinuityMode, Image, ImageError, ImageFormat,
    ImageSelectorType, PlaybackMode, SortKey, StreamDescription, StreamRef, Timestamp,
    TimestampRange,
};
pub use resolver::{
    Clock, FixedClock, ListFragmentsRequest, Resolver, ResolverBuilder, SystemClock,
};
pub use selector::{normalize, CanonicalInterval};
pub use session::{
    GetDashStreamingSessionRequest, GetHlsStreamingSessionRequest, StreamingProtocol,
    StreamingSessionPlan,
};
