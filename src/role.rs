//! State for operating under an assumed IAM role.
//!
//! The role ARN is discovered once through IAM `ListRoles` and cached, then
//! STS `AssumeRole` trades the session's static keys for temporary
//! credentials. Both role operations are always signed with the static keys;
//! only object operations use the temporary set.

use serde::Serialize;

/// STS API version sent as the `Version` query parameter.
pub const STS_API_VERSION: &str = "2011-06-15";
/// IAM API version sent as the `Version` query parameter.
pub const IAM_API_VERSION: &str = "2010-05-08";
/// IAM is a global service; its requests are always signed for this region.
pub const IAM_REGION: &str = "us-east-1";
/// Session name reported to STS.
pub const ROLE_SESSION_NAME: &str = env!("CARGO_PKG_NAME");

pub const DEFAULT_STS_DOMAIN: &str = "sts.amazonaws.com";
pub const DEFAULT_IAM_DOMAIN: &str = "iam.amazonaws.com";

/// AssumeRole field caps; a response exceeding them is rejected outright.
pub const MAX_ROLE_ACCESS_KEY_LEN: usize = 128;
pub const MAX_ROLE_SECRET_KEY_LEN: usize = 1024;
pub const MAX_ROLE_SESSION_TOKEN_LEN: usize = 2048;

/// AssumeRole duration bounds in seconds; out-of-range values are not sent.
const MIN_ROLE_DURATION_SECS: u32 = 900;
const MAX_ROLE_DURATION_SECS: u32 = 43200;

/// Temporary credentials returned by STS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
}

/// Everything the session tracks about its assumed role.
#[derive(Debug, Serialize)]
pub struct RoleState {
    pub role_name: String,
    /// Cached after the first successful `ListRoles` lookup.
    pub role_arn: Option<String>,
    #[serde(skip)]
    pub credentials: Option<RoleCredentials>,
    pub duration_secs: Option<u32>,
    pub sts_domain: String,
    pub sts_region: String,
    pub iam_domain: String,
}

impl RoleState {
    pub fn new(
        role_name: impl Into<String>,
        sts_domain: Option<String>,
        sts_region: impl Into<String>,
        duration_secs: Option<u32>,
    ) -> Self {
        Self {
            role_name: role_name.into(),
            role_arn: None,
            credentials: None,
            duration_secs,
            sts_domain: sts_domain.unwrap_or_else(|| DEFAULT_STS_DOMAIN.to_string()),
            sts_region: sts_region.into(),
            iam_domain: DEFAULT_IAM_DOMAIN.to_string(),
        }
    }

    /// The duration to send, or `None` when unset or outside the STS bounds.
    pub fn effective_duration(&self) -> Option<u32> {
        self.duration_secs
            .filter(|d| (MIN_ROLE_DURATION_SECS..=MAX_ROLE_DURATION_SECS).contains(d))
    }

    /// Replaces the temporary credential set wholesale.
    pub fn install(&mut self, credentials: RoleCredentials) {
        self.credentials = Some(credentials);
    }
}
