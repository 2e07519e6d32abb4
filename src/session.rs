//! Public session API: one `Session` owns the credentials, configuration,
//! transport and listing arena, and exposes the object and role operations.

use std::collections::BTreeMap;

use crate::config::{EnvCredentials, SessionConfig};
use crate::error::{Result, S3Error};
use crate::list::{ObjectEntry, ObjectList, ObjectStatus};
use crate::role::{RoleCredentials, RoleState};
use crate::signer::uri_encode;
use crate::transport::{HttpTransport, Transport};

/// Runtime options applied after construction.
#[derive(Debug, Clone)]
pub enum SessionOption {
    /// Use plain HTTP instead of HTTPS.
    UseHttp(bool),
    /// Skip TLS certificate verification (self-signed test stores).
    DisableSslVerify(bool),
    /// Growth increment of the response buffer, minimum 1 KiB.
    BufferChunkSize(usize),
    /// Force listing protocol 1 or 2 regardless of endpoint defaults.
    ForceListVersion(u8),
    /// Force path-style (1) or virtual-hosted (2) addressing.
    ForceProtocolVersion(u8),
    /// Non-default port on the endpoint.
    PortNumber(u16),
}

/// A blocking S3 session.
///
/// All operations run synchronously on the calling thread. The session is not
/// internally synchronized; share it behind a mutex or give each thread its
/// own.
pub struct Session {
    pub(crate) config: SessionConfig,
    pub(crate) access_key: String,
    pub(crate) secret_key: String,
    pub(crate) role: Option<RoleState>,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) objects: ObjectList,
    /// Most recent server diagnostic, overwritten per failure, cleared on
    /// success.
    pub(crate) last_error: Option<String>,
}

impl Session {
    /// Creates a session with static credentials against AWS or, with
    /// `endpoint` set, an S3-compatible store.
    pub fn new(
        access_key: &str,
        secret_key: &str,
        region: &str,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        Self::with_transport(
            access_key,
            secret_key,
            region,
            endpoint,
            Box::new(HttpTransport::new()),
        )
    }

    /// Like [`new`](Self::new) but with a caller-supplied transport. This is
    /// the injection seam the integration tests use.
    pub fn with_transport(
        access_key: &str,
        secret_key: &str,
        region: &str,
        endpoint: Option<&str>,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        if access_key.is_empty() {
            return Err(S3Error::Parameter("access key is empty".to_string()));
        }
        if secret_key.is_empty() {
            return Err(S3Error::Parameter("secret key is empty".to_string()));
        }
        if region.is_empty() {
            return Err(S3Error::Parameter("region is empty".to_string()));
        }

        Ok(Self {
            config: SessionConfig::new(region, endpoint.map(str::to_string)),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            role: None,
            transport,
            objects: ObjectList::new(),
            last_error: None,
        })
    }

    /// Builds a session from the standard AWS environment variables.
    pub fn from_env(endpoint: Option<&str>) -> Result<Self> {
        let creds = EnvCredentials::load()?;
        Self::new(&creds.access_key, &creds.secret_key, &creds.region, endpoint)
    }

    pub fn set_option(&mut self, option: SessionOption) -> Result<()> {
        match option {
            SessionOption::UseHttp(enabled) => self.config.use_http = enabled,
            SessionOption::DisableSslVerify(disabled) => {
                self.config.disable_ssl_verify = disabled
            }
            SessionOption::BufferChunkSize(size) => self.config.set_buffer_chunk_size(size)?,
            SessionOption::ForceListVersion(v) => self.config.set_list_version(v)?,
            SessionOption::ForceProtocolVersion(v) => self.config.set_protocol_version(v)?,
            SessionOption::PortNumber(port) => self.config.port = Some(port),
        }
        Ok(())
    }

    /// Uploads an object in one request. Empty payloads are refused, and the
    /// payload hash ceiling caps uploads at 4GiB.
    pub fn put(&mut self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        validate_pair(bucket, key)?;
        if data.is_empty() {
            return Err(S3Error::NoData);
        }
        if data.len() as u64 > u64::from(u32::MAX) {
            return Err(S3Error::TooBig);
        }

        let url = self.build_object_url(bucket, key)?;
        let response = self.perform_s3("PUT", &url, BTreeMap::new(), data)?;
        self.classify(&response)
    }

    /// Downloads an object into memory.
    pub fn get(&mut self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        validate_pair(bucket, key)?;
        let url = self.build_object_url(bucket, key)?;
        let response = self.perform_s3("GET", &url, BTreeMap::new(), b"")?;
        self.classify(&response)?;
        Ok(response.body)
    }

    pub fn delete(&mut self, bucket: &str, key: &str) -> Result<()> {
        validate_pair(bucket, key)?;
        let url = self.build_object_url(bucket, key)?;
        let response = self.perform_s3("DELETE", &url, BTreeMap::new(), b"")?;
        self.classify(&response)
    }

    /// HEAD request returning size and modification time.
    pub fn status(&mut self, bucket: &str, key: &str) -> Result<ObjectStatus> {
        validate_pair(bucket, key)?;
        let url = self.build_object_url(bucket, key)?;
        let response = self.perform_s3("HEAD", &url, BTreeMap::new(), b"")?;
        self.classify(&response)?;
        Ok(crate::request::parse_status_headers(&response))
    }

    /// Lists every key under `prefix`, following truncated pages to the end.
    /// The returned entries borrow the session and are replaced by the next
    /// listing call.
    pub fn list(
        &mut self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<impl Iterator<Item = &ObjectEntry>> {
        validate_bucket(bucket)?;
        self.list_inner(bucket, prefix, None)?;
        Ok(self.objects.iter())
    }

    /// One-level listing: keys under `prefix` up to the next `/`, plus the
    /// common prefixes as size-0 entries.
    pub fn list_dir(
        &mut self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<impl Iterator<Item = &ObjectEntry>> {
        validate_bucket(bucket)?;
        self.list_inner(bucket, prefix, Some("/"))?;
        Ok(self.objects.iter())
    }

    /// Server-side copy. No data flows through the client.
    pub fn copy(
        &mut self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()> {
        validate_pair(source_bucket, source_key)?;
        validate_pair(dest_bucket, dest_key)?;

        let mut headers = BTreeMap::new();
        headers.insert(
            "x-amz-copy-source".to_string(),
            format!("/{}/{}", source_bucket, uri_encode(source_key, false)),
        );
        let url = self.build_object_url(dest_bucket, dest_key)?;
        let response = self.perform_s3("PUT", &url, headers, b"")?;
        self.classify(&response)
    }

    /// Copy then delete. Not atomic: a failed delete leaves both objects.
    pub fn move_object(
        &mut self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()> {
        self.copy(source_bucket, source_key, dest_bucket, dest_key)?;
        self.delete(source_bucket, source_key)
    }

    /// Switches the session to an assumed role and immediately performs the
    /// first assumption. `sts_region` defaults to the session region.
    pub fn init_assume_role(
        &mut self,
        role_name: &str,
        sts_domain: Option<&str>,
        sts_region: Option<&str>,
        duration_secs: Option<u32>,
    ) -> Result<()> {
        if role_name.is_empty() {
            return Err(S3Error::Parameter("role name is empty".to_string()));
        }
        let region = sts_region.unwrap_or(&self.config.region).to_string();
        self.role = Some(RoleState::new(
            role_name,
            sts_domain.map(str::to_string),
            region,
            duration_secs,
        ));
        self.assume_role()
    }

    /// Re-runs the role assumption, refreshing the temporary credentials.
    /// The role ARN is resolved through IAM on the first call and cached.
    pub fn assume_role(&mut self) -> Result<()> {
        let needs_arn = match &self.role {
            Some(role) => role.role_arn.is_none(),
            None => {
                return Err(S3Error::Parameter(
                    "no role configured for this session".to_string(),
                ))
            }
        };
        if needs_arn {
            self.lookup_role_arn()?;
        }
        self.assume_role_inner()
    }

    /// Installs externally obtained temporary credentials (EC2 instance
    /// metadata), bypassing the STS exchange.
    pub fn set_ec2_credentials(
        &mut self,
        access_key: &str,
        secret_key: &str,
        session_token: &str,
    ) -> Result<()> {
        if access_key.is_empty() || secret_key.is_empty() || session_token.is_empty() {
            return Err(S3Error::Parameter(
                "ec2 credentials are incomplete".to_string(),
            ));
        }
        let region = self.config.region.clone();
        let mut role = RoleState::new("ec2-instance", None, region, None);
        role.install(RoleCredentials {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            session_token: session_token.to_string(),
        });
        self.role = Some(role);
        Ok(())
    }

    /// Entries accumulated by the most recent listing. After a mid-listing
    /// failure this still holds the pages fetched before the error.
    pub fn last_listing(&self) -> impl Iterator<Item = &ObjectEntry> {
        self.objects.iter()
    }

    /// The diagnostic message from the most recent failed request, if the
    /// server sent one.
    pub fn server_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

fn validate_bucket(bucket: &str) -> Result<()> {
    if bucket.is_empty() {
        return Err(S3Error::Parameter("bucket is empty".to_string()));
    }
    Ok(())
}

fn validate_pair(bucket: &str, key: &str) -> Result<()> {
    validate_bucket(bucket)?;
    if key.is_empty() {
        return Err(S3Error::Parameter("key is empty".to_string()));
    }
    Ok(())
}
