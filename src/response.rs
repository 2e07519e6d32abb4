//! XML interpreters for the bodies the services send back.
//!
//! Optimized with:
//! - Byte-slice tag matching (no String allocation per tag)
//! - std::mem::take for moving strings instead of cloning
//! - Reused text buffer across events
//!
//! Namespace prefixes are ignored via `local_name()`, so the same code handles
//! AWS proper and S3-compatible stores that omit or rename namespaces.

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, S3Error};
use crate::list::{ObjectEntry, ObjectList};
use crate::role::{
    RoleCredentials, MAX_ROLE_ACCESS_KEY_LEN, MAX_ROLE_SECRET_KEY_LEN, MAX_ROLE_SESSION_TOKEN_LEN,
};

/// Which bucket-listing protocol a page was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ListVersion {
    V1,
    V2,
}

/// Extracts the human-readable `<Message>` from an error body.
///
/// Covers both the flat S3 shape (`Error/Message`) and the nested STS/IAM
/// shape (`ErrorResponse/Error/Message`), since only the element text is
/// wanted. Returns `None` for bodies with no message or unparseable bodies;
/// error reporting must not mask the original failure.
pub fn parse_error_message(xml_data: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(xml_data);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    let mut current_text = String::with_capacity(256);

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                current_text.clear();
                current_text.push_str(&e.unescape().ok()?);
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"Message" && !current_text.is_empty() {
                    return Some(std::mem::take(&mut current_text));
                }
                current_text.clear();
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
    }
}

/// Parses one page of a bucket listing into `list`.
///
/// Keys ending in `/` (zero-byte directory markers) are skipped;
/// `CommonPrefixes` entries are appended with size 0 and no timestamp.
///
/// Returns the continuation for the next page: the verbatim
/// `NextContinuationToken` for v2, or the last object key for a truncated v1
/// page. `None` means the listing is complete.
pub fn parse_list_page(
    xml_data: &[u8],
    version: ListVersion,
    list: &mut ObjectList,
) -> Result<Option<String>> {
    let mut reader = Reader::from_reader(xml_data);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    let mut current_key = String::new();
    let mut current_length: u64 = 0;
    let mut current_created: Option<DateTime<Utc>> = None;
    let mut current_text = String::with_capacity(256);

    let mut in_contents = false;
    let mut in_common_prefixes = false;
    let mut truncated = false;
    let mut continuation_token: Option<String> = None;
    let mut last_key: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"Contents" => {
                    in_contents = true;
                    current_key.clear();
                    current_length = 0;
                    current_created = None;
                }
                b"CommonPrefixes" => {
                    in_common_prefixes = true;
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                current_text.clear();
                current_text.push_str(&e.unescape()?);
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"Key" if in_contents => {
                        current_key = std::mem::take(&mut current_text);
                    }
                    b"Size" if in_contents => {
                        current_length = current_text.parse().unwrap_or(0);
                    }
                    b"LastModified" if in_contents => {
                        current_created = parse_s3_timestamp(&current_text);
                    }
                    b"Contents" => {
                        in_contents = false;
                        // Directory markers still advance the v1 marker but
                        // are not reported as objects.
                        if !current_key.ends_with('/') && !current_key.is_empty() {
                            list.push(ObjectEntry {
                                key: std::mem::take(&mut current_key),
                                length: current_length,
                                created: current_created.take(),
                            });
                            last_key = list.last_key().map(str::to_string);
                        } else if !current_key.is_empty() {
                            last_key = Some(std::mem::take(&mut current_key));
                        }
                    }
                    b"Prefix" if in_common_prefixes => {
                        list.push(ObjectEntry {
                            key: std::mem::take(&mut current_text),
                            length: 0,
                            created: None,
                        });
                    }
                    b"CommonPrefixes" => {
                        in_common_prefixes = false;
                    }
                    b"IsTruncated" => {
                        truncated = current_text == "true";
                    }
                    b"NextContinuationToken" => {
                        continuation_token = Some(std::mem::take(&mut current_text));
                    }
                    _ => {}
                }
                current_text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(S3Error::ResponseParse(e.to_string())),
            _ => {}
        }
    }

    if !truncated {
        return Ok(None);
    }
    Ok(match version {
        ListVersion::V2 => continuation_token,
        ListVersion::V1 => last_key,
    })
}

/// One page of an IAM `ListRoles` response, scanned for a single role name.
#[derive(Debug, Default, PartialEq)]
pub struct RoleListPage {
    /// ARN of the wanted role, if this page contained it.
    pub arn: Option<String>,
    /// Marker for the next page when the listing is truncated.
    pub marker: Option<String>,
}

/// Scans a `ListRoles` page for `wanted_name` and the pagination marker.
pub fn parse_role_list(xml_data: &[u8], wanted_name: &str) -> Result<RoleListPage> {
    let mut reader = Reader::from_reader(xml_data);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    let mut page = RoleListPage::default();
    let mut current_text = String::with_capacity(256);
    let mut member_name = String::new();
    let mut member_arn = String::new();
    let mut truncated = false;
    let mut marker: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"member" {
                    member_name.clear();
                    member_arn.clear();
                }
            }
            Ok(Event::Text(e)) => {
                current_text.clear();
                current_text.push_str(&e.unescape()?);
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"RoleName" => member_name = std::mem::take(&mut current_text),
                    b"Arn" => member_arn = std::mem::take(&mut current_text),
                    b"member" => {
                        if member_name == wanted_name && !member_arn.is_empty() {
                            page.arn = Some(std::mem::take(&mut member_arn));
                        }
                    }
                    b"IsTruncated" => truncated = current_text == "true",
                    b"Marker" => marker = Some(std::mem::take(&mut current_text)),
                    _ => {}
                }
                current_text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(S3Error::ResponseParse(e.to_string())),
            _ => {}
        }
    }

    if truncated {
        page.marker = marker;
    }
    Ok(page)
}

/// Parses an STS `AssumeRole` response into a complete credential set.
///
/// Any missing field is a parse error; an oversized field is an authentication
/// failure. Either way nothing is returned, so the caller's existing
/// credentials stay untouched.
pub fn parse_assume_role(xml_data: &[u8]) -> Result<RoleCredentials> {
    let mut reader = Reader::from_reader(xml_data);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    let mut access_key = String::new();
    let mut secret_key = String::new();
    let mut session_token = String::new();
    let mut current_text = String::with_capacity(256);

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                current_text.clear();
                current_text.push_str(&e.unescape()?);
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"AccessKeyId" => access_key = std::mem::take(&mut current_text),
                    b"SecretAccessKey" => secret_key = std::mem::take(&mut current_text),
                    b"SessionToken" => session_token = std::mem::take(&mut current_text),
                    _ => {}
                }
                current_text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(S3Error::ResponseParse(e.to_string())),
            _ => {}
        }
    }

    if access_key.is_empty() || secret_key.is_empty() || session_token.is_empty() {
        return Err(S3Error::ResponseParse(
            "AssumeRole response missing credential fields".to_string(),
        ));
    }
    if access_key.len() >= MAX_ROLE_ACCESS_KEY_LEN
        || secret_key.len() >= MAX_ROLE_SECRET_KEY_LEN
        || session_token.len() >= MAX_ROLE_SESSION_TOKEN_LEN
    {
        return Err(S3Error::AuthRole);
    }

    Ok(RoleCredentials {
        access_key,
        secret_key,
        session_token,
    })
}

/// S3 `LastModified` timestamps look like `2020-01-01T00:00:00.000Z`.
fn parse_s3_timestamp(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.fZ")
        .ok()
        .map(|dt| dt.and_utc())
}
