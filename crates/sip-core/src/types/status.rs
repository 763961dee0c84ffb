//! # SIP Status Codes
//!
//! Response status codes follow the usual three-digit scheme:
//!
//! - `1xx`: Provisional, request received and processing continues
//! - `2xx`: Success
//! - `3xx`: Redirection
//! - `4xx`: Client error
//! - `5xx`: Server error
//! - `6xx`: Global failure
//!
//! Everything at or above 200 is *final*: only final responses complete a
//! transaction. Codes without a dedicated variant are preserved through
//! [`StatusCode::Other`].
//!
//! ## Examples
//!
//! ```rust
//! use rims_sip_core::types::StatusCode;
//!
//! let status = StatusCode::Ringing;
//! assert_eq!(status.as_u16(), 180);
//! assert!(status.is_provisional());
//! assert!(!status.is_final());
//!
//! let status = StatusCode::from_u16(486);
//! assert_eq!(status, StatusCode::BusyHere);
//! assert_eq!(status.to_string(), "486 Busy Here");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A SIP response status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// 100 Trying
    Trying,
    /// 180 Ringing
    Ringing,
    /// 183 Session Progress
    SessionProgress,
    /// 200 OK
    Ok,
    /// 202 Accepted
    Accepted,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 408 Request Timeout
    RequestTimeout,
    /// 415 Unsupported Media Type
    UnsupportedMediaType,
    /// 480 Temporarily Unavailable
    TemporarilyUnavailable,
    /// 486 Busy Here
    BusyHere,
    /// 487 Request Terminated
    RequestTerminated,
    /// 488 Not Acceptable Here
    NotAcceptableHere,
    /// 500 Server Internal Error
    ServerInternalError,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// 603 Decline
    Decline,
    /// Any other status code
    Other(u16),
}

impl StatusCode {
    /// The numeric status code
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Trying => 100,
            StatusCode::Ringing => 180,
            StatusCode::SessionProgress => 183,
            StatusCode::Ok => 200,
            StatusCode::Accepted => 202,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::RequestTimeout => 408,
            StatusCode::UnsupportedMediaType => 415,
            StatusCode::TemporarilyUnavailable => 480,
            StatusCode::BusyHere => 486,
            StatusCode::RequestTerminated => 487,
            StatusCode::NotAcceptableHere => 488,
            StatusCode::ServerInternalError => 500,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::Decline => 603,
            StatusCode::Other(code) => *code,
        }
    }

    /// Map a numeric code to its variant; unknown codes become `Other`
    pub fn from_u16(code: u16) -> Self {
        match code {
            100 => StatusCode::Trying,
            180 => StatusCode::Ringing,
            183 => StatusCode::SessionProgress,
            200 => StatusCode::Ok,
            202 => StatusCode::Accepted,
            400 => StatusCode::BadRequest,
            404 => StatusCode::NotFound,
            408 => StatusCode::RequestTimeout,
            415 => StatusCode::UnsupportedMediaType,
            480 => StatusCode::TemporarilyUnavailable,
            486 => StatusCode::BusyHere,
            487 => StatusCode::RequestTerminated,
            488 => StatusCode::NotAcceptableHere,
            500 => StatusCode::ServerInternalError,
            503 => StatusCode::ServiceUnavailable,
            603 => StatusCode::Decline,
            other => StatusCode::Other(other),
        }
    }

    /// The standard reason phrase for this code
    pub fn reason_phrase(&self) -> &str {
        match self {
            StatusCode::Trying => "Trying",
            StatusCode::Ringing => "Ringing",
            StatusCode::SessionProgress => "Session Progress",
            StatusCode::Ok => "OK",
            StatusCode::Accepted => "Accepted",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::UnsupportedMediaType => "Unsupported Media Type",
            StatusCode::TemporarilyUnavailable => "Temporarily Unavailable",
            StatusCode::BusyHere => "Busy Here",
            StatusCode::RequestTerminated => "Request Terminated",
            StatusCode::NotAcceptableHere => "Not Acceptable Here",
            StatusCode::ServerInternalError => "Server Internal Error",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::Decline => "Decline",
            StatusCode::Other(_) => "Unknown",
        }
    }

    /// `1xx`, does not complete a transaction
    pub fn is_provisional(&self) -> bool {
        (100..200).contains(&self.as_u16())
    }

    /// `>= 200`, completes a transaction
    pub fn is_final(&self) -> bool {
        self.as_u16() >= 200
    }

    /// `2xx`
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    /// `4xx`, `5xx` or `6xx`
    pub fn is_error(&self) -> bool {
        self.as_u16() >= 400
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}
