//! Role assumption flows driven through a scripted transport.

mod common;

use common::{requests, LogHandle, MockTransport, ScriptedResponse};
use tinys3::{S3Error, Session};

const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/reader";

fn list_roles_page(names_arns: &[(&str, &str)], marker: Option<&str>) -> ScriptedResponse {
    let mut xml = String::from("<ListRolesResponse><ListRolesResult>");
    xml.push_str(&format!(
        "<IsTruncated>{}</IsTruncated>",
        marker.is_some()
    ));
    if let Some(m) = marker {
        xml.push_str(&format!("<Marker>{m}</Marker>"));
    }
    xml.push_str("<Roles>");
    for (name, arn) in names_arns {
        xml.push_str(&format!(
            "<member><RoleName>{name}</RoleName><Arn>{arn}</Arn></member>"
        ));
    }
    xml.push_str("</Roles></ListRolesResult></ListRolesResponse>");
    ScriptedResponse::new(200, xml.as_bytes())
}

fn assume_role_response(access: &str, secret: &str, token: &str) -> ScriptedResponse {
    let xml = format!(
        "<AssumeRoleResponse><AssumeRoleResult><Credentials>\
         <AccessKeyId>{access}</AccessKeyId>\
         <SecretAccessKey>{secret}</SecretAccessKey>\
         <SessionToken>{token}</SessionToken>\
         </Credentials></AssumeRoleResult></AssumeRoleResponse>"
    );
    ScriptedResponse::new(200, xml.as_bytes())
}

fn session_with(responses: Vec<ScriptedResponse>) -> (Session, LogHandle) {
    let transport = MockTransport::new(responses);
    let log = transport.log();
    let session = Session::with_transport(
        "AKIASTATIC",
        "staticsecret",
        "eu-west-1",
        None,
        Box::new(transport),
    )
    .unwrap();
    (session, log)
}

#[test]
fn init_walks_role_pages_then_assumes() {
    let (mut session, log) = session_with(vec![
        list_roles_page(&[("other", "arn:aws:iam::123:role/other")], Some("page2")),
        list_roles_page(&[("reader", ROLE_ARN)], None),
        assume_role_response("ASIATEMP", "tempsecret", "temptoken"),
    ]);
    session
        .init_assume_role("reader", None, None, Some(3600))
        .unwrap();

    let reqs = requests(&log);
    assert_eq!(reqs.len(), 3);

    assert_eq!(
        reqs[0].url,
        "https://iam.amazonaws.com/?Action=ListRoles&Version=2010-05-08"
    );
    assert_eq!(
        reqs[1].url,
        "https://iam.amazonaws.com/?Action=ListRoles&Marker=page2&Version=2010-05-08"
    );
    assert_eq!(
        reqs[2].url,
        "https://sts.amazonaws.com/?Action=AssumeRole&DurationSeconds=3600\
         &RoleArn=arn%3Aaws%3Aiam%3A%3A123456789012%3Arole%2Freader\
         &RoleSessionName=tinys3&Version=2011-06-15"
    );

    // Role management is signed with the static keys; IAM is global,
    // STS follows the session region.
    let iam_auth = reqs[0].headers.get("authorization").unwrap();
    assert!(iam_auth.contains("Credential=AKIASTATIC/"));
    assert!(iam_auth.contains("/us-east-1/iam/aws4_request"));
    let sts_auth = reqs[2].headers.get("authorization").unwrap();
    assert!(sts_auth.contains("Credential=AKIASTATIC/"));
    assert!(sts_auth.contains("/eu-west-1/sts/aws4_request"));
}

#[test]
fn out_of_range_duration_is_not_sent() {
    let (mut session, log) = session_with(vec![
        list_roles_page(&[("reader", ROLE_ARN)], None),
        assume_role_response("ASIATEMP", "tempsecret", "temptoken"),
    ]);
    session
        .init_assume_role("reader", None, None, Some(100))
        .unwrap();
    assert!(!requests(&log)[1].url.contains("DurationSeconds"));
}

#[test]
fn object_ops_use_temporary_credentials() {
    let (mut session, log) = session_with(vec![
        list_roles_page(&[("reader", ROLE_ARN)], None),
        assume_role_response("ASIATEMP", "tempsecret", "temptoken"),
        ScriptedResponse::new(200, b"data"),
    ]);
    session.init_assume_role("reader", None, None, None).unwrap();
    session.get("bucket", "key").unwrap();

    let reqs = requests(&log);
    let get = &reqs[2];
    assert_eq!(get.headers.get("x-amz-security-token").unwrap(), "temptoken");
    let auth = get.headers.get("authorization").unwrap();
    assert!(auth.contains("Credential=ASIATEMP/"));
    assert!(auth.contains("/eu-west-1/s3/aws4_request"));
    assert!(auth.contains(
        "SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-amz-security-token"
    ));
}

#[test]
fn reassume_skips_role_lookup() {
    let (mut session, log) = session_with(vec![
        list_roles_page(&[("reader", ROLE_ARN)], None),
        assume_role_response("ASIA1", "s1", "t1"),
        assume_role_response("ASIA2", "s2", "t2"),
        ScriptedResponse::new(200, b""),
    ]);
    session.init_assume_role("reader", None, None, None).unwrap();
    session.assume_role().unwrap();

    let reqs = requests(&log);
    // One ListRoles, two AssumeRole calls: the ARN was cached.
    assert_eq!(reqs.len(), 3);
    assert!(reqs[2].url.starts_with("https://sts.amazonaws.com/?Action=AssumeRole"));

    session.get("bucket", "key").unwrap();
    let auth = requests(&log)[3].headers.get("authorization").unwrap().clone();
    assert!(auth.contains("Credential=ASIA2/"));
}

#[test]
fn role_not_found_after_all_pages() {
    let (mut session, _) = session_with(vec![
        list_roles_page(&[("other", "arn:other")], Some("p2")),
        list_roles_page(&[("another", "arn:another")], None),
    ]);
    assert!(matches!(
        session.init_assume_role("reader", None, None, None),
        Err(S3Error::NotFound)
    ));
    assert_eq!(session.server_error(), Some("role reader not found"));
}

#[test]
fn role_service_failure_maps_to_auth_role() {
    let denied = br#"<ErrorResponse><Error><Code>AccessDenied</Code><Message>not allowed to assume</Message></Error></ErrorResponse>"#;
    let (mut session, _) = session_with(vec![
        list_roles_page(&[("reader", ROLE_ARN)], None),
        ScriptedResponse::new(403, denied),
    ]);
    assert!(matches!(
        session.init_assume_role("reader", None, None, None),
        Err(S3Error::AuthRole)
    ));
    assert_eq!(session.server_error(), Some("not allowed to assume"));
}

#[test]
fn forbidden_under_role_is_auth_role() {
    let (mut session, _) = session_with(vec![
        list_roles_page(&[("reader", ROLE_ARN)], None),
        assume_role_response("ASIATEMP", "tempsecret", "temptoken"),
        ScriptedResponse::new(403, b""),
        ScriptedResponse::new(500, b""),
    ]);
    session.init_assume_role("reader", None, None, None).unwrap();
    assert!(matches!(
        session.get("bucket", "key"),
        Err(S3Error::AuthRole)
    ));
    assert!(matches!(
        session.get("bucket", "key"),
        Err(S3Error::AuthRole)
    ));
}

#[test]
fn oversized_credentials_keep_previous_set() {
    let huge_token = "t".repeat(4096);
    let (mut session, log) = session_with(vec![
        list_roles_page(&[("reader", ROLE_ARN)], None),
        assume_role_response("ASIA1", "s1", "t1"),
        assume_role_response("ASIA2", "s2", &huge_token),
        ScriptedResponse::new(200, b""),
    ]);
    session.init_assume_role("reader", None, None, None).unwrap();
    assert!(matches!(session.assume_role(), Err(S3Error::AuthRole)));

    // The failed refresh must not have touched the installed credentials.
    session.get("bucket", "key").unwrap();
    let auth = requests(&log)[3].headers.get("authorization").unwrap().clone();
    assert!(auth.contains("Credential=ASIA1/"));
}

#[test]
fn incomplete_credentials_are_a_parse_error() {
    let partial = b"<AssumeRoleResponse><Credentials><AccessKeyId>A</AccessKeyId></Credentials></AssumeRoleResponse>";
    let (mut session, _) = session_with(vec![
        list_roles_page(&[("reader", ROLE_ARN)], None),
        ScriptedResponse::new(200, partial),
    ]);
    assert!(matches!(
        session.init_assume_role("reader", None, None, None),
        Err(S3Error::ResponseParse(_))
    ));
}

#[test]
fn ec2_credentials_bypass_sts() {
    let (mut session, log) = session_with(vec![ScriptedResponse::new(200, b"")]);
    session
        .set_ec2_credentials("ASIAEC2", "ec2secret", "ec2token")
        .unwrap();
    session.get("bucket", "key").unwrap();

    let reqs = requests(&log);
    assert_eq!(reqs.len(), 1);
    assert!(reqs[0].headers.get("authorization").unwrap().contains("Credential=ASIAEC2/"));
    assert_eq!(reqs[0].headers.get("x-amz-security-token").unwrap(), "ec2token");
}
