use crate::constants::{
    AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, X_AMZ_CONTENT_SHA_256, X_AMZ_DATE,
    X_AMZ_SECURITY_TOKEN,
};
use crate::Credential;
use async_trait::async_trait;
use awscurl_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256, EMPTY_STRING_SHA256};
use awscurl_core::time::{format_date, format_iso8601, now, DateTime};
use awscurl_core::{Context, Error, Result, SignRequest, SigningRequest};
use http::request::Parts;
use http::{header, HeaderValue};
use log::debug;
use percent_encoding::utf8_percent_encode;
use std::fmt::Write;

/// RequestSigner that implement AWS SigV4.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
///
/// Only header based signing is supported. The canonical query computed while
/// signing is written back into the request uri, so the request that goes on the
/// wire carries exactly the query that was signed.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    service: String,
    region: String,

    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new builder for AWS V4 signer.
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),

            time: None,
        }
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        body: &[u8],
        credential: Option<&Self::Credential>,
    ) -> Result<()> {
        let Some(cred) = credential else {
            return Ok(());
        };

        let now = self.time.unwrap_or_else(now);
        let mut signed_req = SigningRequest::build(req)?;

        // canonicalize context
        canonicalize_header(&mut signed_req, cred, body, now)?;
        canonicalize_query(&mut signed_req);

        // build canonical request and string to sign.
        let creq = canonical_request_string(&signed_req, &self.service)?;
        debug!("calculated canonical request: {creq}");
        let encoded_req = hex_sha256(creq.as_bytes());

        // Scope: "20220313/<region>/<service>/aws4_request"
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        );
        debug!("calculated scope: {scope}");

        // StringToSign:
        //
        // AWS4-HMAC-SHA256
        // 20220313T072004Z
        // 20220313/<region>/<service>/aws4_request
        // <hashed_canonical_request>
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            format_iso8601(now),
            scope,
            encoded_req
        );
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key =
            generate_signing_key(&cred.secret_access_key, now, &self.region, &self.service);
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let mut authorization = HeaderValue::from_str(&format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            cred.access_key_id,
            scope,
            signed_req.header_name_to_vec_sorted().join(";"),
            signature
        ))
        .map_err(|e| {
            Error::request_invalid("failed to create authorization header").with_source(e)
        })?;
        authorization.set_sensitive(true);

        signed_req
            .headers
            .insert(header::AUTHORIZATION, authorization);

        // Apply to the request.
        signed_req.apply(req)
    }
}

/// Build the canonical request.
///
/// ```text
/// GET
/// /prod/items
/// a=1&b=c%20d
/// host:example.com
/// x-amz-date:20220313T072004Z
///
/// host;x-amz-date
/// e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
/// ```
fn canonical_request_string(ctx: &SigningRequest, service: &str) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    // Insert method
    writeln!(f, "{}", ctx.method)
        .map_err(|e| Error::unexpected("failed to write method").with_source(e))?;
    // Insert encoded path
    writeln!(f, "{}", canonical_uri(ctx, service))
        .map_err(|e| Error::unexpected("failed to write encoded path").with_source(e))?;
    // Insert query, already sorted and encoded.
    writeln!(f, "{}", SigningRequest::query_to_string(ctx.query.clone(), "=", "&"))
        .map_err(|e| Error::unexpected("failed to write query").with_source(e))?;
    // Insert signed headers
    let signed_headers = ctx.header_name_to_vec_sorted();
    for name in signed_headers.iter() {
        let values = ctx
            .headers
            .get_all(*name)
            .iter()
            .map(|v| v.to_str().map(canonical_header_value))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        writeln!(f, "{}:{}", name, values.join(","))
            .map_err(|e| Error::unexpected("failed to write header").with_source(e))?;
    }
    writeln!(f).map_err(|e| Error::unexpected("failed to write newline").with_source(e))?;
    writeln!(f, "{}", signed_headers.join(";"))
        .map_err(|e| Error::unexpected("failed to write signed headers").with_source(e))?;
    let payload_hash = match ctx.headers.get(X_AMZ_CONTENT_SHA_256) {
        Some(v) => v.to_str()?,
        None => EMPTY_STRING_SHA256,
    };
    write!(f, "{payload_hash}")
        .map_err(|e| Error::unexpected("failed to write content sha256").with_source(e))?;

    Ok(f)
}

/// Canonical URI of the request.
///
/// S3 signs the path encoded once. Every other service signs the transmitted
/// path encoded again.
fn canonical_uri(ctx: &SigningRequest, service: &str) -> String {
    if ctx.path.is_empty() {
        return "/".to_string();
    }

    if service == "s3" {
        utf8_percent_encode(&ctx.path_percent_decoded(), &AWS_URI_ENCODE_SET).to_string()
    } else {
        utf8_percent_encode(&ctx.path, &AWS_URI_ENCODE_SET).to_string()
    }
}

/// Collapse runs of spaces in an already trimmed header value.
fn canonical_header_value(v: &str) -> String {
    let mut s = String::with_capacity(v.len());
    let mut last_space = false;
    for c in v.trim().chars() {
        if c == ' ' || c == '\t' {
            if !last_space {
                s.push(' ');
            }
            last_space = true;
        } else {
            s.push(c);
            last_space = false;
        }
    }
    s
}

fn canonicalize_header(
    ctx: &mut SigningRequest,
    cred: &Credential,
    body: &[u8],
    now: DateTime,
) -> Result<()> {
    // Header names and values need to be normalized according to Step 4 of https://docs.aws.amazon.com/general/latest/gr/sigv4-create-canonical-request.html
    for (_, value) in ctx.headers.iter_mut() {
        SigningRequest::header_value_normalize(value)
    }

    // Insert HOST header if not present.
    if ctx.headers.get(header::HOST).is_none() {
        ctx.headers
            .insert(header::HOST, ctx.authority.as_str().parse()?);
    }

    // A date header left over from an earlier signing would break the scope.
    ctx.headers
        .insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(now))?);

    // Insert X_AMZ_CONTENT_SHA_256 header if not present.
    if ctx.headers.get(X_AMZ_CONTENT_SHA_256).is_none() {
        let digest = if body.is_empty() {
            EMPTY_STRING_SHA256.to_string()
        } else {
            hex_sha256(body)
        };
        ctx.headers
            .insert(X_AMZ_CONTENT_SHA_256, HeaderValue::try_from(digest)?);
    }

    // Insert X_AMZ_SECURITY_TOKEN header if security token exists.
    if let Some(token) = &cred.session_token {
        let mut value = HeaderValue::from_str(token)?;
        // Set token value sensitive to valid leaking.
        value.set_sensitive(true);

        ctx.headers.insert(X_AMZ_SECURITY_TOKEN, value);
    }

    Ok(())
}

fn canonicalize_query(ctx: &mut SigningRequest) {
    // Return if query is empty.
    if ctx.query.is_empty() {
        return;
    }

    ctx.query = ctx
        .query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect();

    // Sort by encoded param name, then value.
    ctx.query.sort();
}

fn generate_signing_key(secret: &str, time: DateTime, region: &str, service: &str) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), region.as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), service.as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), "aws4_request".as_bytes())
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use anyhow::Result;
    use aws_credential_types::Credentials;
    use aws_sigv4::http_request::PayloadChecksumKind;
    use aws_sigv4::http_request::PercentEncodingMode;
    use aws_sigv4::http_request::SignableBody;
    use aws_sigv4::http_request::SignableRequest;
    use aws_sigv4::http_request::SigningSettings;
    use aws_sigv4::sign::v4;
    use chrono::TimeZone;
    use chrono::Utc;
    use http::Request;
    use pretty_assertions::assert_eq;

    /// (name, request_builder)
    type TestCase = (&'static str, fn() -> Request<&'static str>);

    fn test_cases() -> Vec<TestCase> {
        vec![
            ("get_request", test_get_request),
            ("get_request_with_query", test_get_request_with_query),
            ("get_request_with_encoded_path", test_get_request_with_encoded_path),
            ("post_request_with_json", test_post_request_with_json),
            ("put_request_with_headers", test_put_request_with_headers),
        ]
    }

    fn test_get_request() -> Request<&'static str> {
        let mut req = Request::new("");
        *req.method_mut() = http::Method::GET;
        *req.uri_mut() = "https://abcdef.execute-api.us-east-1.amazonaws.com/prod/items"
            .parse()
            .expect("url must be valid");

        req
    }

    fn test_get_request_with_query() -> Request<&'static str> {
        let mut req = Request::new("");
        *req.method_mut() = http::Method::GET;
        *req.uri_mut() =
            "https://abcdef.execute-api.us-east-1.amazonaws.com/prod/items?z=last&a=first&m=c%20d"
                .parse()
                .expect("url must be valid");

        req
    }

    fn test_get_request_with_encoded_path() -> Request<&'static str> {
        let mut req = Request::new("");
        *req.method_mut() = http::Method::GET;
        *req.uri_mut() = "https://abcdef.execute-api.us-east-1.amazonaws.com/prod/a%20b"
            .parse()
            .expect("url must be valid");

        req
    }

    fn test_post_request_with_json() -> Request<&'static str> {
        let content = r#"{"name":"awscurl"}"#;
        let mut req = Request::new(content);
        *req.method_mut() = http::Method::POST;
        *req.uri_mut() = "https://abcdef.execute-api.us-east-1.amazonaws.com/prod/items"
            .parse()
            .expect("url must be valid");
        req.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        req.headers_mut()
            .insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        req.headers_mut().insert(
            header::CONTENT_LENGTH,
            HeaderValue::from_str(&content.len().to_string()).expect("must be valid"),
        );

        req
    }

    fn test_put_request_with_headers() -> Request<&'static str> {
        let content = "Hello,World!";
        let mut req = Request::new(content);
        *req.method_mut() = http::Method::PUT;
        *req.uri_mut() = "https://abcdef.execute-api.us-east-1.amazonaws.com/prod/items/1"
            .parse()
            .expect("url must be valid");
        req.headers_mut()
            .insert("x-custom-header", HeaderValue::from_static("custom"));
        req.headers_mut()
            .insert("x-api-key", HeaderValue::from_static("abc123"));

        req
    }

    #[track_caller]
    fn compare_request(name: &str, l: &Request<&str>, r: &Request<&str>) {
        fn format_headers(req: &Request<&str>) -> Vec<String> {
            let mut hs = req
                .headers()
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v.to_str().expect("must be valid")))
                .collect::<Vec<_>>();

            // Insert host if original request doesn't have it.
            let host = format!("host:{}", req.uri().authority().expect("must have authority"));
            if !hs.contains(&host) {
                hs.push(host)
            }

            hs.sort();
            hs
        }

        assert_eq!(
            format_headers(l),
            format_headers(r),
            "{name} header mismatch"
        );

        fn format_query(req: &Request<&str>) -> Vec<String> {
            let query = req.uri().query().unwrap_or_default();
            let mut query = form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| format!("{}={}", &k, &v))
                .collect::<Vec<_>>();
            query.sort();
            query
        }

        assert_eq!(format_query(l), format_query(r), "{name} query mismatch");
    }

    async fn calculate(
        req_fn: fn() -> Request<&'static str>,
        session_token: Option<&str>,
    ) -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut req = req_fn();
        let name = format!(
            "{} {} {:?}",
            req.method(),
            req.uri().path(),
            req.uri().query(),
        );
        let now = now();

        let mut ss = SigningSettings::default();
        ss.percent_encoding_mode = PercentEncodingMode::Double;
        ss.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
        let id = Credentials::new(
            "access_key_id",
            "secret_access_key",
            session_token.map(|v| v.to_string()),
            None,
            "hardcoded-credentials",
        )
        .into();
        let sp = v4::SigningParams::builder()
            .identity(&id)
            .region("us-east-1")
            .name("execute-api")
            .time(SystemTime::from(now))
            .settings(ss)
            .build()
            .expect("signing params must be valid");

        let output = aws_sigv4::http_request::sign(
            SignableRequest::new(
                req.method().as_str(),
                req.uri().to_string(),
                req.headers()
                    .iter()
                    .map(|(k, v)| (k.as_str(), std::str::from_utf8(v.as_bytes()).unwrap())),
                SignableBody::Bytes(req.body().as_bytes()),
            )
            .unwrap(),
            &sp.into(),
        )?;
        let (aws_sig, _) = output.into_parts();
        aws_sig.apply_to_request_http1x(&mut req);
        let expected_req = req;

        let req = req_fn();
        let (mut parts, body) = req.into_parts();

        let cred = Credential {
            access_key_id: "access_key_id".to_string(),
            secret_access_key: "secret_access_key".to_string(),
            session_token: session_token.map(|v| v.to_string()),
            expires_in: None,
        };

        let builder = RequestSigner::new("execute-api", "us-east-1").with_time(now);
        builder
            .sign_request(&Context::new(), &mut parts, body.as_bytes(), Some(&cred))
            .await
            .expect("must apply success");

        let actual_req = Request::from_parts(parts, body);

        compare_request(&name, &expected_req, &actual_req);

        Ok(())
    }

    #[tokio::test]
    async fn test_against_aws_sigv4() -> Result<()> {
        for (name, req) in test_cases() {
            calculate(req, None)
                .await
                .unwrap_or_else(|err| panic!("calculate {name} should pass: {err:?}"));
            calculate(req, Some("security_token"))
                .await
                .unwrap_or_else(|err| panic!("calculate with token {name} should pass: {err:?}"));
        }
        Ok(())
    }

    fn fixed_time() -> DateTime {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    #[test]
    fn test_generate_signing_key() {
        let t = Utc.with_ymd_and_hms(2012, 2, 15, 0, 0, 0).unwrap();
        let key = generate_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            t,
            "us-east-1",
            "iam",
        );

        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_canonical_request_fixture() {
        let (mut parts, _) = Request::get(
            "https://abcdef.execute-api.us-east-1.amazonaws.com/prod/a%20b?b=c%20d&a=1&e=",
        )
        .header("X-Custom", "  spaced    out  value ")
        .header("user-agent", "awscurl/0.1")
        .body(())
        .unwrap()
        .into_parts();

        let mut req = SigningRequest::build(&mut parts).unwrap();
        let cred = Credential {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            ..Default::default()
        };
        canonicalize_header(&mut req, &cred, b"", fixed_time()).unwrap();
        canonicalize_query(&mut req);

        let creq = canonical_request_string(&req, "execute-api").unwrap();
        assert_eq!(
            creq,
            "GET\n\
             /prod/a%2520b\n\
             a=1&b=c%20d&e=\n\
             host:abcdef.execute-api.us-east-1.amazonaws.com\n\
             x-amz-content-sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\n\
             x-amz-date:20150830T123600Z\n\
             x-custom:spaced out value\n\
             \n\
             host;x-amz-content-sha256;x-amz-date;x-custom\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        let creq = canonical_request_string(&req, "s3").unwrap();
        assert!(creq.starts_with("GET\n/prod/a%20b\n"));
    }

    #[tokio::test]
    async fn test_signed_request_carries_canonical_query() {
        let (mut parts, _) = Request::post(
            "https://abcdef.execute-api.us-east-1.amazonaws.com/prod/items?z=1&a=hello%20world",
        )
        .header("content-type", "application/json")
        .body(())
        .unwrap()
        .into_parts();

        let cred = Credential {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: Some("session-token".to_string()),
            expires_in: None,
        };
        let body = br#"{"a":1}"#;

        RequestSigner::new("execute-api", "us-east-1")
            .with_time(fixed_time())
            .sign_request(&Context::new(), &mut parts, body, Some(&cred))
            .await
            .unwrap();

        assert_eq!(
            parts.uri.to_string(),
            "https://abcdef.execute-api.us-east-1.amazonaws.com/prod/items?a=hello%20world&z=1"
        );
        assert_eq!(parts.headers[X_AMZ_DATE], "20150830T123600Z");
        assert_eq!(parts.headers[X_AMZ_SECURITY_TOKEN], "session-token");
        assert_eq!(parts.headers[X_AMZ_CONTENT_SHA_256], hex_sha256(body));

        let authorization = parts.headers[header::AUTHORIZATION].to_str().unwrap();
        assert!(authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/execute-api/aws4_request, \
             SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date;x-amz-security-token, \
             Signature="
        ));
    }

    #[tokio::test]
    async fn test_signing_is_deterministic() {
        async fn sign_once() -> String {
            let (mut parts, _) = Request::get("https://example.com/a?y=2&x=1")
                .header("x-b", "2")
                .header("x-a", "1")
                .header("accept", "application/json")
                .body(())
                .unwrap()
                .into_parts();
            let cred = Credential {
                access_key_id: "AKIDEXAMPLE".to_string(),
                secret_access_key: "secret".to_string(),
                ..Default::default()
            };

            RequestSigner::new("execute-api", "eu-west-1")
                .with_time(fixed_time())
                .sign_request(&Context::new(), &mut parts, b"", Some(&cred))
                .await
                .unwrap();

            parts.headers[header::AUTHORIZATION]
                .to_str()
                .unwrap()
                .to_string()
        }

        let first = sign_once().await;
        for _ in 0..10 {
            assert_eq!(sign_once().await, first);
        }
    }

    #[tokio::test]
    async fn test_without_credential_leaves_request_unsigned() {
        let (mut parts, _) = Request::get("https://example.com/a?b=c%20d")
            .body(())
            .unwrap()
            .into_parts();

        RequestSigner::new("execute-api", "us-east-1")
            .sign_request(&Context::new(), &mut parts, b"", None)
            .await
            .unwrap();

        assert!(parts.headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(parts.uri.to_string(), "https://example.com/a?b=c%20d");
    }

    #[test]
    fn test_canonical_header_value() {
        assert_eq!(canonical_header_value("a   b  c"), "a b c");
        assert_eq!(canonical_header_value(" \tx\t\ty "), "x y");
        assert_eq!(canonical_header_value(""), "");
    }
}
