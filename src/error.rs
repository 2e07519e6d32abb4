//! Error taxonomy shared by every fallible operation in the crate.
//!
//! Server-supplied diagnostic messages are not carried inside the error
//! values; they are stored on the [`Session`](crate::Session) and read back
//! with [`Session::server_error`](crate::Session::server_error), mirroring
//! how the errors map onto HTTP status codes.

use thiserror::Error;

/// Errors returned by session operations.
#[derive(Error, Debug)]
pub enum S3Error {
    /// Invalid or missing caller input.
    #[error("parameter error: {0}")]
    Parameter(String),

    /// PUT was given an empty payload.
    #[error("no data")]
    NoData,

    /// Payload exceeds the 4GiB hashing ceiling.
    #[error("data too big, maximum data size is 4GiB")]
    TooBig,

    /// The generated request URI exceeds the allowed maximum length.
    #[error("generated URI too long")]
    UriTooLong,

    /// The server response XML could not be parsed.
    #[error("could not parse response XML: {0}")]
    ResponseParse(String),

    /// Transport-level failure (connection, TLS, read).
    #[error("error making REST request: {0}")]
    RequestError(String),

    /// Allocation failure reported by a collaborator.
    #[error("out of memory")]
    OutOfMemory,

    /// Internal invariant violation, unreachable in correct builds.
    #[error("impossible condition detected")]
    Impossible,

    /// HTTP 403 while using static credentials.
    #[error("authentication error")]
    Auth,

    /// HTTP 404.
    #[error("object not found")]
    NotFound,

    /// Other HTTP >= 400 while using static credentials.
    #[error("S3 server error")]
    Server,

    /// HTTP >= 400 while operating under an assumed role, or an oversized
    /// credential field in an AssumeRole response.
    #[error("authentication error for assumed role")]
    AuthRole,
}

impl From<quick_xml::Error> for S3Error {
    fn from(err: quick_xml::Error) -> Self {
        S3Error::ResponseParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, S3Error>;
