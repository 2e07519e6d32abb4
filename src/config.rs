//! Session configuration: endpoint, addressing style, protocol versions and
//! tuning knobs.
//!
//! A custom endpoint flips the defaults to what S3-compatible stores (MinIO
//! and friends) expect: list protocol v1 and path-style addressing. The AWS
//! default endpoint keeps list v2 and virtual-hosted addressing. Both can be
//! forced through session options afterwards.

use serde::Serialize;

use crate::buffer::{DEFAULT_BUFFER_CHUNK_SIZE, MIN_BUFFER_CHUNK_SIZE};
use crate::error::{Result, S3Error};
use crate::response::ListVersion;

pub const DEFAULT_S3_DOMAIN: &str = "s3.amazonaws.com";

/// How the bucket name is placed into the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Addressing {
    /// `https://endpoint/bucket/key`
    PathStyle,
    /// `https://bucket.endpoint/key`
    VirtualHost,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    pub region: String,
    /// Custom endpoint domain; `None` means AWS proper.
    pub endpoint: Option<String>,
    pub port: Option<u16>,
    pub use_http: bool,
    pub disable_ssl_verify: bool,
    pub buffer_chunk_size: usize,
    pub list_version: ListVersion,
    pub addressing: Addressing,
}

impl SessionConfig {
    pub fn new(region: impl Into<String>, endpoint: Option<String>) -> Self {
        let custom = endpoint.is_some();
        Self {
            region: region.into(),
            endpoint,
            port: None,
            use_http: false,
            disable_ssl_verify: false,
            buffer_chunk_size: DEFAULT_BUFFER_CHUNK_SIZE,
            list_version: if custom {
                ListVersion::V1
            } else {
                ListVersion::V2
            },
            addressing: if custom {
                Addressing::PathStyle
            } else {
                Addressing::VirtualHost
            },
        }
    }

    pub fn domain(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_S3_DOMAIN)
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_http {
            "http"
        } else {
            "https"
        }
    }

    pub fn set_buffer_chunk_size(&mut self, size: usize) -> Result<()> {
        if size < MIN_BUFFER_CHUNK_SIZE {
            return Err(S3Error::Parameter(format!(
                "buffer chunk size must be at least {} bytes",
                MIN_BUFFER_CHUNK_SIZE
            )));
        }
        self.buffer_chunk_size = size;
        Ok(())
    }

    pub fn set_list_version(&mut self, version: u8) -> Result<()> {
        self.list_version = match version {
            1 => ListVersion::V1,
            2 => ListVersion::V2,
            _ => {
                return Err(S3Error::Parameter(
                    "list version must be 1 or 2".to_string(),
                ))
            }
        };
        Ok(())
    }

    pub fn set_protocol_version(&mut self, version: u8) -> Result<()> {
        self.addressing = match version {
            1 => Addressing::PathStyle,
            2 => Addressing::VirtualHost,
            _ => {
                return Err(S3Error::Parameter(
                    "protocol version must be 1 or 2".to_string(),
                ))
            }
        };
        Ok(())
    }
}

/// Static credentials picked up from the standard AWS environment variables.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl EnvCredentials {
    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_REGION`.
    pub fn load() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| S3Error::Parameter(format!("{} is not set", name)))
        };
        Ok(Self {
            access_key: var("AWS_ACCESS_KEY_ID")?,
            secret_key: var("AWS_SECRET_ACCESS_KEY")?,
            region: var("AWS_REGION")?,
        })
    }
}
