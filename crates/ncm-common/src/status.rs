//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Shared primitives and utilities for the NCM runtime."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Result alias carrying the workspace-wide error taxonomy.
pub type NcmResult<T> = std::result::Result<T, NcmError>;

/// Wire status codes exchanged with worker backends and the event stream.
///
/// The low range mirrors HTTP semantics; the 1xxx range carries job
/// lifecycle states and validation outcomes; 6001 is the distinguished
/// "platform re-authentication required" code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    /// Operation finished successfully.
    Success,
    /// Resource was created.
    Created,
    /// Success with no payload.
    NoContent,
    /// Request validation failed.
    BadRequest,
    /// Caller is not authenticated.
    Unauthorized,
    /// Caller is authenticated but not allowed.
    Forbidden,
    /// Referenced entity does not exist.
    NotFound,
    /// State conflict.
    Conflict,
    /// Payload understood but not processable.
    Unprocessable,
    /// Unexpected server-side failure.
    InternalError,
    /// Downstream service is unavailable.
    ServiceUnavailable,
    /// Work item was skipped.
    Skip,
    /// Job is still in flight.
    Running,
    /// Cooperative cancellation was observed.
    Stop,
    /// Job ran to completion.
    Finished,
    /// Job failed.
    Failed,
    /// A name collided within its scope.
    Duplicated,
    /// A bounded collection is full.
    Full,
    /// A licensed size limit was exceeded.
    LicenseSizeFailed,
    /// The service-platform token expired or is missing.
    ServicePlatformUnauthorized,
}

impl StatusCode {
    /// Numeric wire representation of the code.
    pub fn code(self) -> i64 {
        match self {
            StatusCode::Success => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::Conflict => 409,
            StatusCode::Unprocessable => 422,
            StatusCode::InternalError => 500,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::Skip => 1002,
            StatusCode::Running => 1003,
            StatusCode::Stop => 1004,
            StatusCode::Finished => 1005,
            StatusCode::Failed => 1006,
            StatusCode::Duplicated => 1007,
            StatusCode::Full => 1008,
            StatusCode::LicenseSizeFailed => 1101,
            StatusCode::ServicePlatformUnauthorized => 6001,
        }
    }

    /// Decode a numeric wire code. Unknown codes yield `None`; callers map
    /// those to [`StatusCode::Failed`] with an explanatory message.
    pub fn from_code(code: i64) -> Option<Self> {
        let decoded = match code {
            200 => StatusCode::Success,
            201 => StatusCode::Created,
            204 => StatusCode::NoContent,
            400 => StatusCode::BadRequest,
            401 => StatusCode::Unauthorized,
            403 => StatusCode::Forbidden,
            404 => StatusCode::NotFound,
            409 => StatusCode::Conflict,
            422 => StatusCode::Unprocessable,
            500 => StatusCode::InternalError,
            503 => StatusCode::ServiceUnavailable,
            1002 => StatusCode::Skip,
            1003 => StatusCode::Running,
            1004 => StatusCode::Stop,
            1005 => StatusCode::Finished,
            1006 => StatusCode::Failed,
            1007 => StatusCode::Duplicated,
            1008 => StatusCode::Full,
            1101 => StatusCode::LicenseSizeFailed,
            6001 => StatusCode::ServicePlatformUnauthorized,
            _ => return None,
        };
        Some(decoded)
    }

    /// Whether the code represents a completed run (success flavour).
    pub fn is_success(self) -> bool {
        matches!(self, StatusCode::Success | StatusCode::Finished)
    }
}

/// Error taxonomy shared by the store, the baseline manager, and the job
/// engine. Validation and not-found failures are raised before any shared
/// state is mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NcmError {
    /// Request validation failed (name length, malformed field, reserved id).
    #[error("bad request: {0}")]
    BadRequest(String),
    /// A name collided within its project/track scope.
    #[error("the name ({0}) is duplicated")]
    Duplicated(String),
    /// Project, baseline, device, or user not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// A job `Start` was attempted from a state that forbids it.
    #[error("not executable from state {0}")]
    NotExecutable(String),
    /// Authentication is missing or expired.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The service-platform token expired; the caller must re-login.
    #[error("service platform re-authentication required")]
    ServicePlatformUnauthorized,
    /// A licensed collection size cap was exceeded.
    #[error("the {scope} exceeds the limit: {limit}")]
    LicenseSizeExceeded {
        /// Which collection hit its cap.
        scope: String,
        /// The configured cap.
        limit: usize,
    },
    /// Allocation, persistence, or other unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NcmError {
    /// Map the error onto its wire status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            NcmError::BadRequest(_) => StatusCode::BadRequest,
            NcmError::Duplicated(_) => StatusCode::Duplicated,
            NcmError::NotFound(_) => StatusCode::NotFound,
            NcmError::NotExecutable(_) => StatusCode::BadRequest,
            NcmError::Unauthorized(_) => StatusCode::Unauthorized,
            NcmError::ServicePlatformUnauthorized => StatusCode::ServicePlatformUnauthorized,
            NcmError::LicenseSizeExceeded { .. } => StatusCode::LicenseSizeFailed,
            NcmError::Internal(_) => StatusCode::InternalError,
        }
    }
}
