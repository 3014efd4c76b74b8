use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::FragmentCatalog;
use crate::clip::ClipLimits;
use crate::dedupe::{dedupe, paginate, FragmentPage};
use crate::errors::{ArchivedMediaError, Result};
use crate::models::{Fragment, FragmentSelector, StreamDescription, StreamRef, Timestamp};
use crate::selector::{normalize, CanonicalInterval};
use crate::token::{Position, TokenState};

const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_PAGE_SIZE: usize = 1000;
const DEFAULT_LIVE_WINDOW: Duration = Duration::from_secs(30);
const PAGE_SIZE_ENV: &str = "ARCHIVED_MEDIA_PAGE_SIZE";

/// Source of "now" for live windows and session expiry.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// Builder for constructing a [`Resolver`] with custom configuration.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use archived_media::{InMemoryCatalog, Resolver};
///
/// # fn example() -> archived_media::Result<()> {
/// let resolver = Resolver::builder(Arc::new(InMemoryCatalog::new()))
///     .page_size(250)
///     .live_window(Duration::from_secs(20))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ResolverBuilder<C> {
    catalog: Arc<C>,
    page_size: Option<usize>,
    live_window: Duration,
    clip_limits: ClipLimits,
    clock: Arc<dyn Clock>,
}

impl<C: FragmentCatalog> ResolverBuilder<C> {
    /// Create a new builder over `catalog` with default settings.
    pub fn new(catalog: Arc<C>) -> Self {
        Self {
            catalog,
            page_size: None,
            live_window: DEFAULT_LIVE_WINDOW,
            clip_limits: ClipLimits::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Fragments per page when a request doesn't say (defaults to 100, at most 1000).
    pub fn page_size(mut self, n: usize) -> Self {
        self.page_size = Some(n);
        self
    }

    /// How far back live sessions look for fragments (defaults to 30 seconds).
    pub fn live_window(mut self, d: Duration) -> Self {
        self.live_window = d;
        self
    }

    /// Ceilings applied to clip exports (defaults to 200 fragments / 100 MiB).
    pub fn clip_limits(mut self, limits: ClipLimits) -> Self {
        self.clip_limits = limits;
        self
    }

    /// Replace the wall clock, e.g. with a [`FixedClock`] in tests.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Build the [`Resolver`].
    ///
    /// If no page size was set via [`page_size`](Self::page_size), the builder
    /// reads the `ARCHIVED_MEDIA_PAGE_SIZE` environment variable, falling back
    /// to 100.
    ///
    /// Returns [`ArchivedMediaError::InvalidArgument`] if the page size is not
    /// a number in 1-1000 or the live window is zero.
    pub fn build(self) -> Result<Resolver<C>> {
        let page_size = match self.page_size {
            Some(n) => n,
            None => match std::env::var(PAGE_SIZE_ENV) {
                Ok(raw) => raw.trim().parse().map_err(|_| {
                    ArchivedMediaError::invalid_argument(format!(
                        "{PAGE_SIZE_ENV}={raw:?} is not a page size"
                    ))
                })?,
                Err(_) => DEFAULT_PAGE_SIZE,
            },
        };
        check_limit("page size", page_size, MAX_PAGE_SIZE)?;

        if self.live_window.is_zero() {
            return Err(ArchivedMediaError::invalid_argument("live window must be positive"));
        }
        let live_window = chrono::Duration::from_std(self.live_window)
            .map_err(|e| ArchivedMediaError::invalid_argument(format!("live window: {e}")))?;

        Ok(Resolver {
            catalog: self.catalog,
            page_size,
            live_window,
            clip_limits: self.clip_limits,
            clock: self.clock,
        })
    }
}

/// Resolves fragment selections against a [`FragmentCatalog`].
///
/// Each call works on its own catalog snapshot and keeps no state between
/// calls, so one resolver can serve concurrent requests.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use archived_media::{FragmentSelector, InMemoryCatalog, Resolver, StreamRef};
///
/// # async fn example(selector: FragmentSelector) -> archived_media::Result<()> {
/// let resolver = Resolver::builder(Arc::new(InMemoryCatalog::new())).build()?;
///
/// let page = resolver
///     .resolve_fragments(&StreamRef::name("front-door"), Some(&selector), None, None)
///     .await?;
/// println!("{} fragments", page.fragments.len());
/// # Ok(())
/// # }
/// ```
pub struct Resolver<C> {
    catalog: Arc<C>,
    page_size: usize,
    pub(crate) live_window: chrono::Duration,
    pub(crate) clip_limits: ClipLimits,
    clock: Arc<dyn Clock>,
}

impl<C> fmt::Debug for Resolver<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("page_size", &self.page_size)
            .field("live_window", &self.live_window)
            .field("clip_limits", &self.clip_limits)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Request for a page of fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFragmentsRequest {
    #[serde(rename = "Stream")]
    pub stream: StreamRef,

    /// Required unless `next_token` is set.
    #[serde(rename = "FragmentSelector", default, skip_serializing_if = "Option::is_none")]
    pub fragment_selector: Option<FragmentSelector>,

    /// 1-1000. Defaults to the resolver's page size.
    #[serde(rename = "MaxResults", default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,

    #[serde(rename = "NextToken", default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl ListFragmentsRequest {
    pub fn new(stream: StreamRef, selector: FragmentSelector) -> Self {
        Self {
            stream,
            fragment_selector: Some(selector),
            max_results: None,
            next_token: None,
        }
    }
}

impl<C: FragmentCatalog> Resolver<C> {
    /// Shorthand for [`ResolverBuilder::new`].
    pub fn builder(catalog: Arc<C>) -> ResolverBuilder<C> {
        ResolverBuilder::new(catalog)
    }

    /// The catalog this resolver reads from.
    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    /// Resolve a selector into one page of deduplicated fragments.
    ///
    /// Either `selector` or `next_token` must be given. When resuming, the
    /// token carries the original interval; a selector passed alongside must
    /// normalize to the same interval. `page_size` defaults to the resolver's.
    ///
    /// # Errors
    ///
    /// - [`ArchivedMediaError::InvalidSelector`] for a malformed selector.
    /// - [`ArchivedMediaError::InvalidArgument`] for a bad stream reference,
    ///   page size or token.
    /// - [`ArchivedMediaError::ResourceNotFound`] if the stream doesn't exist.
    /// - [`ArchivedMediaError::NoDataRetention`] if the stream archives nothing.
    pub async fn resolve_fragments(
        &self,
        stream: &StreamRef,
        selector: Option<&FragmentSelector>,
        page_size: Option<usize>,
        next_token: Option<&str>,
    ) -> Result<FragmentPage> {
        stream.validate()?;
        let page_size = page_size.unwrap_or(self.page_size);
        check_limit("MaxResults", page_size, MAX_PAGE_SIZE)?;

        let state = next_token.map(TokenState::decode).transpose()?;
        let (interval, after) = match &state {
            Some(state) => {
                if let Some(selector) = selector {
                    if normalize(selector)? != state.interval {
                        return Err(ArchivedMediaError::invalid_argument(
                            "FragmentSelector does not match the one NextToken was issued for",
                        ));
                    }
                }
                let Position::After(key) = state.position else {
                    return Err(ArchivedMediaError::invalid_argument(
                        "NextToken was not issued for a fragment listing",
                    ));
                };
                (state.interval, Some(key))
            }
            None => {
                let selector = selector.ok_or_else(|| {
                    ArchivedMediaError::invalid_selector("FragmentSelector is required")
                })?;
                (normalize(selector)?, None)
            }
        };

        let description = self.archived_description(stream).await?;
        if let Some(state) = &state {
            state.check_stream(&description.stream_name)?;
        }
        let fragments = self.resolve_interval(stream, &interval).await?;
        let page = paginate(fragments, &description.stream_name, &interval, page_size, after)?;

        debug!(
            %stream,
            origin = %interval.origin,
            returned = page.fragments.len(),
            more = page.has_more(),
            "resolved fragment page"
        );
        Ok(page)
    }

    /// List fragments for a request, one page per call.
    pub async fn list_fragments(&self, request: &ListFragmentsRequest) -> Result<FragmentPage> {
        self.resolve_fragments(
            &request.stream,
            request.fragment_selector.as_ref(),
            request.max_results.map(|n| n as usize),
            request.next_token.as_deref(),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Crate-internal helpers shared by the operation planners
    // -----------------------------------------------------------------------

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Query and deduplicate the full selection for an interval.
    pub(crate) async fn resolve_interval(
        &self,
        stream: &StreamRef,
        interval: &CanonicalInterval,
    ) -> Result<Vec<Fragment>> {
        let candidates = self.catalog.query(stream, interval).await?;
        Ok(dedupe(candidates, interval.origin))
    }

    pub(crate) async fn fragments_by_number(
        &self,
        stream: &StreamRef,
        numbers: &[String],
    ) -> Result<Vec<Fragment>> {
        self.catalog.fragments_by_number(stream, numbers).await
    }

    pub(crate) async fn describe(&self, stream: &StreamRef) -> Result<StreamDescription> {
        self.catalog.describe_stream(stream).await
    }

    /// Describe a stream that is about to be read from its archive.
    pub(crate) async fn archived_description(&self, stream: &StreamRef) -> Result<StreamDescription> {
        let description = self.describe(stream).await?;
        if description.data_retention_hours == 0 {
            warn!(%stream, "archived read against a stream with zero retention");
            return Err(ArchivedMediaError::NoDataRetention {
                message: format!("stream {stream} does not retain data"),
            });
        }
        Ok(description)
    }
}

/// Check `1 <= value <= max`.
pub(crate) fn check_limit(name: &str, value: usize, max: usize) -> Result<()> {
    if value == 0 || value > max {
        return Err(ArchivedMediaError::invalid_argument(format!(
            "{name} must be between 1 and {max}, got {value}"
        )));
    }
    Ok(())
}
