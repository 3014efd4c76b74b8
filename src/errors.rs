use thiserror::Error;

/// All errors that can occur while resolving or planning fragment selections.
///
/// Every variant corresponds to a service error code (see
/// [`error_code`](Self::error_code)). None of them are retried by this crate:
/// they are deterministic functions of the request and the catalog state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchivedMediaError {
    /// The fragment selector is malformed: unknown origin, inverted or
    /// pre-epoch range, or a missing range where the operation needs one.
    #[error("invalid fragment selector: {message}")]
    InvalidSelector { message: String },

    /// Some other request parameter is out of range or inconsistent.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The stream does not exist, or nothing was ingested in the requested window.
    #[error("resource not found: {message}")]
    ResourceNotFound { message: String },

    /// Archived playback was requested against a stream that retains no data.
    #[error("no data retention: {message}")]
    NoDataRetention { message: String },

    /// The stream's track codecs don't fit the requested output.
    #[error("unsupported stream media type: {message}")]
    UnsupportedStreamMediaType { message: String },

    #[error("client limit exceeded: {message}")]
    ClientLimitExceeded { message: String },

    #[error("not authorized: {message}")]
    NotAuthorized { message: String },

    #[error("missing codec private data: {message}")]
    MissingCodecPrivateData { message: String },

    #[error("invalid codec private data: {message}")]
    InvalidCodecPrivateData { message: String },

    #[error("invalid media frame: {message}")]
    InvalidMediaFrame { message: String },

    /// An error code this crate has no dedicated variant for.
    #[error("service error {code}: {message}")]
    Service { code: String, message: String },
}

impl ArchivedMediaError {
    pub(crate) fn invalid_selector(message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            message: message.into(),
        }
    }

    /// Map a service error code and message onto a typed error.
    ///
    /// Unknown codes are kept verbatim in [`ArchivedMediaError::Service`].
    pub fn from_service_error(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "InvalidArgumentException" => Self::InvalidArgument { message },
            "ResourceNotFoundException" => Self::ResourceNotFound { message },
            "NoDataRetentionException" => Self::NoDataRetention { message },
            "UnsupportedStreamMediaTypeException" => Self::UnsupportedStreamMediaType { message },
            "ClientLimitExceededException" => Self::ClientLimitExceeded { message },
            "NotAuthorizedException" => Self::NotAuthorized { message },
            "MissingCodecPrivateDataException" => Self::MissingCodecPrivateData { message },
            "InvalidCodecPrivateDataException" => Self::InvalidCodecPrivateData { message },
            "InvalidMediaFrameException" => Self::InvalidMediaFrame { message },
            other => Self::Service {
                code: other.to_string(),
                message,
            },
        }
    }

    /// The service error code this error is reported under.
    ///
    /// Selector problems share `InvalidArgumentException` with other argument
    /// errors; match on the variant to tell them apart.
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidSelector { .. } | Self::InvalidArgument { .. } => {
                "InvalidArgumentException"
            }
            Self::ResourceNotFound { .. } => "ResourceNotFoundException",
            Self::NoDataRetention { .. } => "NoDataRetentionException",
            Self::UnsupportedStreamMediaType { .. } => "UnsupportedStreamMediaTypeException",
            Self::ClientLimitExceeded { .. } => "ClientLimitExceededException",
            Self::NotAuthorized { .. } => "NotAuthorizedException",
            Self::MissingCodecPrivateData { .. } => "MissingCodecPrivateDataException",
            Self::InvalidCodecPrivateData { .. } => "InvalidCodecPrivateDataException",
            Self::InvalidMediaFrame { .. } => "InvalidMediaFrameException",
            Self::Service { code, .. } => code,
        }
    }

    /// Whether a transport layer may retry the call unchanged.
    ///
    /// Only throttling qualifies. Everything else fails the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ClientLimitExceeded { .. })
    }
}

/// A convenience alias for `Result<T, ArchivedMediaError>`.
pub type Result<T> = std::result::Result<T, ArchivedMediaError>;
