//! Request execution engine: URL construction, signing, dispatch through the
//! transport, status classification, and the paginated listing and role
//! flows. The public wrappers live in [`session`](crate::session); everything
//! here is crate-internal plumbing on the same `Session` type.

use std::collections::BTreeMap;

use crate::buffer::ResponseBuffer;
use crate::config::Addressing;
use crate::error::{Result, S3Error};
use crate::response::{
    parse_assume_role, parse_error_message, parse_list_page, parse_role_list, ListVersion,
};
use crate::role::{IAM_API_VERSION, IAM_REGION, ROLE_SESSION_NAME, STS_API_VERSION};
use crate::session::Session;
use crate::signer::{uri_encode, SignerV4};
use crate::transport::{ResponseSink, TransportRequest};

/// Longest URI the engine will generate; anything longer is refused rather
/// than truncated.
pub(crate) const MAX_URI_LENGTH: usize = 3072;

/// Collects response headers and accumulates the body through the buffer.
struct BufferSink {
    headers: Vec<(String, String)>,
    body: ResponseBuffer,
}

impl BufferSink {
    fn new(chunk_size: usize) -> Self {
        Self {
            headers: Vec::new(),
            body: ResponseBuffer::new(chunk_size),
        }
    }
}

impl ResponseSink for BufferSink {
    fn on_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn on_body(&mut self, chunk: &[u8]) {
        self.body.write(chunk);
    }
}

/// Raw outcome of one performed request.
pub(crate) struct Performed {
    pub(crate) status: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

impl Performed {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl Session {
    /// Signs and performs one request against an S3 endpoint, using the
    /// assumed-role credentials when present.
    pub(crate) fn perform_s3(
        &mut self,
        method: &str,
        url: &str,
        extra_headers: BTreeMap<String, String>,
        body: &[u8],
    ) -> Result<Performed> {
        let region = self.config.region.clone();
        self.perform_signed(method, url, extra_headers, body, "s3", &region, true)
    }

    /// Signs and performs one request against STS or IAM. Role management is
    /// always signed with the static keys.
    fn perform_role_service(&mut self, url: &str, service: &str, region: &str) -> Result<Performed> {
        self.perform_signed("GET", url, BTreeMap::new(), b"", service, region, false)
    }

    fn perform_signed(
        &mut self,
        method: &str,
        url: &str,
        extra_headers: BTreeMap<String, String>,
        body: &[u8],
        service: &str,
        region: &str,
        use_role_credentials: bool,
    ) -> Result<Performed> {
        let role_credentials = if use_role_credentials {
            self.role.as_ref().and_then(|r| r.credentials.as_ref())
        } else {
            None
        };
        let (access_key, secret_key, token) = match role_credentials {
            Some(c) => (
                c.access_key.as_str(),
                c.secret_key.as_str(),
                Some(c.session_token.as_str()),
            ),
            None => (self.access_key.as_str(), self.secret_key.as_str(), None),
        };

        let signer = SignerV4::new(access_key, secret_key, region, service, token);
        let mut headers = signer.sign(method, url, extra_headers, body);
        if !body.is_empty() {
            // Sized upload: content-length is sent but never signed.
            headers.insert("content-length".to_string(), body.len().to_string());
        }

        tracing::debug!(method, url, service, "performing request");

        let request = TransportRequest {
            method,
            url,
            headers: &headers,
            body,
            disable_ssl_verify: self.config.disable_ssl_verify,
        };
        let mut sink = BufferSink::new(self.config.buffer_chunk_size);
        let status = self.transport.perform(&request, &mut sink)?;

        tracing::debug!(status, body_len = sink.body.len(), "response received");

        Ok(Performed {
            status,
            headers: sink.headers,
            body: sink.body.into_bytes(),
        })
    }

    /// Maps an object-operation status to the error taxonomy and updates the
    /// stored server diagnostic.
    pub(crate) fn classify(&mut self, response: &Performed) -> Result<()> {
        if response.status < 400 {
            self.last_error = None;
            return Ok(());
        }

        self.last_error = parse_error_message(&response.body);
        let role_active = self
            .role
            .as_ref()
            .is_some_and(|r| r.credentials.is_some());

        Err(match response.status {
            404 => S3Error::NotFound,
            403 if role_active => S3Error::AuthRole,
            403 => S3Error::Auth,
            _ if role_active => S3Error::AuthRole,
            _ => S3Error::Server,
        })
    }

    /// Role-management failures all collapse to one error kind; the stored
    /// diagnostic carries the detail.
    fn classify_role(&mut self, response: &Performed) -> Result<()> {
        if response.status < 400 {
            self.last_error = None;
            return Ok(());
        }
        self.last_error = parse_error_message(&response.body);
        Err(S3Error::AuthRole)
    }

    fn authority(&self) -> String {
        match self.config.port {
            Some(port) => format!("{}:{}", self.config.domain(), port),
            None => self.config.domain().to_string(),
        }
    }

    /// URL for an object operation, honoring the addressing style.
    pub(crate) fn build_object_url(&self, bucket: &str, key: &str) -> Result<String> {
        let encoded_key = uri_encode(key, false);
        let url = match self.config.addressing {
            Addressing::PathStyle => format!(
                "{}://{}/{}/{}",
                self.config.scheme(),
                self.authority(),
                bucket,
                encoded_key
            ),
            Addressing::VirtualHost => format!(
                "{}://{}.{}/{}",
                self.config.scheme(),
                bucket,
                self.authority(),
                encoded_key
            ),
        };
        check_uri_length(url)
    }

    /// URL for a bucket-level operation with an already-canonical query.
    fn build_bucket_url(&self, bucket: &str, query: &str) -> Result<String> {
        let q = if query.is_empty() {
            String::new()
        } else {
            format!("?{}", query)
        };
        let url = match self.config.addressing {
            Addressing::PathStyle => format!(
                "{}://{}/{}{}",
                self.config.scheme(),
                self.authority(),
                bucket,
                q
            ),
            Addressing::VirtualHost => format!(
                "{}://{}.{}/{}",
                self.config.scheme(),
                bucket,
                self.authority(),
                q
            ),
        };
        check_uri_length(url)
    }

    /// Runs a full listing, fetching pages until the server stops truncating.
    /// Entries accumulate in `self.objects`; pages fetched before a failure
    /// are kept.
    pub(crate) fn list_inner(
        &mut self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> Result<()> {
        self.objects.reset();
        let version = self.config.list_version;
        let mut continuation: Option<String> = None;

        loop {
            let query = build_list_query(version, prefix, delimiter, continuation.as_deref());
            let url = self.build_bucket_url(bucket, &query)?;
            let response = self.perform_s3("GET", &url, BTreeMap::new(), b"")?;
            self.classify(&response)?;

            match parse_list_page(&response.body, version, &mut self.objects)? {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }
        Ok(())
    }

    /// Resolves the configured role name to an ARN via paginated IAM
    /// `ListRoles`. The ARN is cached on the role state.
    pub(crate) fn lookup_role_arn(&mut self) -> Result<()> {
        let (role_name, iam_domain, scheme) = {
            let role = self.role.as_ref().ok_or(S3Error::Impossible)?;
            (
                role.role_name.clone(),
                role.iam_domain.clone(),
                self.config.scheme(),
            )
        };

        let mut marker: Option<String> = None;
        loop {
            // Alphabetical key order keeps the query canonical as-built.
            let mut query = String::from("Action=ListRoles");
            if let Some(m) = &marker {
                query.push_str("&Marker=");
                query.push_str(&uri_encode(m, true));
            }
            query.push_str("&Version=");
            query.push_str(IAM_API_VERSION);

            let url = check_uri_length(format!("{}://{}/?{}", scheme, iam_domain, query))?;
            let response = self.perform_role_service(&url, "iam", IAM_REGION)?;
            self.classify_role(&response)?;

            let page = parse_role_list(&response.body, &role_name)?;
            if let Some(arn) = page.arn {
                tracing::debug!(role = %role_name, arn = %arn, "resolved role ARN");
                if let Some(role) = self.role.as_mut() {
                    role.role_arn = Some(arn);
                }
                return Ok(());
            }
            match page.marker {
                Some(m) => marker = Some(m),
                None => {
                    self.last_error = Some(format!("role {} not found", role_name));
                    return Err(S3Error::NotFound);
                }
            }
        }
    }

    /// Calls STS `AssumeRole` and installs the temporary credentials.
    /// The previous credential set survives any failure.
    pub(crate) fn assume_role_inner(&mut self) -> Result<()> {
        let (arn, sts_domain, sts_region, duration, scheme) = {
            let role = self.role.as_ref().ok_or(S3Error::Impossible)?;
            let arn = role.role_arn.clone().ok_or(S3Error::Impossible)?;
            (
                arn,
                role.sts_domain.clone(),
                role.sts_region.clone(),
                role.effective_duration(),
                self.config.scheme(),
            )
        };

        let mut query = String::from("Action=AssumeRole");
        if let Some(d) = duration {
            query.push_str("&DurationSeconds=");
            query.push_str(&d.to_string());
        }
        query.push_str("&RoleArn=");
        query.push_str(&uri_encode(&arn, true));
        query.push_str("&RoleSessionName=");
        query.push_str(ROLE_SESSION_NAME);
        query.push_str("&Version=");
        query.push_str(STS_API_VERSION);

        let url = check_uri_length(format!("{}://{}/?{}", scheme, sts_domain, query))?;
        let response = self.perform_role_service(&url, "sts", &sts_region)?;
        self.classify_role(&response)?;

        let credentials = parse_assume_role(&response.body)?;
        self.last_error = None;
        if let Some(role) = self.role.as_mut() {
            role.install(credentials);
        }
        tracing::debug!("assumed role credentials installed");
        Ok(())
    }
}

fn check_uri_length(url: String) -> Result<String> {
    if url.len() > MAX_URI_LENGTH {
        return Err(S3Error::UriTooLong);
    }
    Ok(url)
}

/// Builds the listing query with keys in alphabetical order, so the canonical
/// form equals the transmitted form.
fn build_list_query(
    version: ListVersion,
    prefix: Option<&str>,
    delimiter: Option<&str>,
    continuation: Option<&str>,
) -> String {
    let mut query = String::with_capacity(64);
    let mut push = |key: &str, value: &str| {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(key);
        query.push('=');
        query.push_str(value);
    };

    match version {
        ListVersion::V2 => {
            if let Some(token) = continuation {
                push("continuation-token", &uri_encode(token, true));
            }
            if let Some(d) = delimiter {
                push("delimiter", &uri_encode(d, true));
            }
            push("list-type", "2");
            if let Some(p) = prefix.filter(|p| !p.is_empty()) {
                push("prefix", &uri_encode(p, true));
            }
        }
        ListVersion::V1 => {
            if let Some(d) = delimiter {
                push("delimiter", &uri_encode(d, true));
            }
            if let Some(marker) = continuation {
                push("marker", &uri_encode(marker, true));
            }
            if let Some(p) = prefix.filter(|p| !p.is_empty()) {
                push("prefix", &uri_encode(p, true));
            }
        }
    }
    query
}

/// Parsed status headers from a HEAD response.
pub(crate) fn parse_status_headers(response: &Performed) -> crate::list::ObjectStatus {
    let length = response
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let created = response
        .header("last-modified")
        .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc));
    crate::list::ObjectStatus { length, created }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_v2_ordering() {
        assert_eq!(
            build_list_query(ListVersion::V2, Some("photos/"), Some("/"), Some("tok+1")),
            "continuation-token=tok%2B1&delimiter=%2F&list-type=2&prefix=photos%2F"
        );
        assert_eq!(
            build_list_query(ListVersion::V2, None, None, None),
            "list-type=2"
        );
        // Empty prefix is omitted entirely.
        assert_eq!(
            build_list_query(ListVersion::V2, Some(""), None, None),
            "list-type=2"
        );
    }

    #[test]
    fn list_query_v1_ordering() {
        assert_eq!(
            build_list_query(ListVersion::V1, Some("a b"), Some("/"), Some("last")),
            "delimiter=%2F&marker=last&prefix=a%20b"
        );
        assert_eq!(build_list_query(ListVersion::V1, None, None, None), "");
    }

    #[test]
    fn status_headers_parsed() {
        let response = Performed {
            status: 200,
            headers: vec![
                ("Content-Length".to_string(), "12345".to_string()),
                (
                    "Last-Modified".to_string(),
                    "Wed, 01 Jul 2020 12:30:45 GMT".to_string(),
                ),
            ],
            body: Vec::new(),
        };
        let status = parse_status_headers(&response);
        assert_eq!(status.length, 12345);
        let created = status.created.unwrap();
        assert_eq!(created.to_rfc2822(), "Wed, 1 Jul 2020 12:30:45 +0000");
    }

    #[test]
    fn status_headers_missing() {
        let response = Performed {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
        };
        let status = parse_status_headers(&response);
        assert_eq!(status.length, 0);
        assert!(status.created.is_none());
    }
}
