use crate::error::{Error, Result};
use crate::HeaderEntry;
use awscurl_core::Context;
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Method};
use log::debug;
use url::Url;

/// Where the request body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySpec {
    /// Sent verbatim.
    Literal(String),
    /// Read from a file.
    ///
    /// In text mode carriage returns, newlines and NUL bytes are stripped and
    /// the remaining lines are concatenated. In binary mode the bytes are sent
    /// untouched.
    File { path: String, binary: bool },
}

impl BodySpec {
    /// Interpret the value of `--data`: `@file` names a file, anything else is literal.
    pub fn from_arg(data: &str, binary: bool) -> Self {
        match data.strip_prefix('@') {
            Some(path) => BodySpec::File {
                path: path.to_string(),
                binary,
            },
            None => BodySpec::Literal(data.to_string()),
        }
    }

    async fn load(&self, ctx: &Context) -> Result<Bytes> {
        match self {
            BodySpec::Literal(data) => Ok(Bytes::copy_from_slice(data.as_bytes())),
            BodySpec::File { path, binary } => {
                let mut content = ctx
                    .file_read(path)
                    .await
                    .map_err(|source| Error::DataFile {
                        path: path.clone(),
                        source,
                    })?;
                if !binary {
                    content.retain(|b| !matches!(b, b'\r' | b'\n' | b'\0'));
                }
                Ok(content.into())
            }
        }
    }
}

/// Build the request to sign.
///
/// `Accept` and `Content-Type` default to `application/json`. Caller headers
/// replace headers of the same name, case-insensitively, the last one winning.
/// Without an explicit method the request is a POST when it carries a body
/// and a GET otherwise. `Content-Length` is set from the final body.
pub async fn assemble(
    ctx: &Context,
    method: Option<Method>,
    url: &Url,
    headers: &[HeaderEntry],
    body: Option<&BodySpec>,
) -> Result<http::Request<Bytes>> {
    let method = method.unwrap_or(if body.is_some() {
        Method::POST
    } else {
        Method::GET
    });

    let mut req = http::Request::builder()
        .method(method)
        .uri(url.as_str())
        .body(Bytes::new())
        .map_err(awscurl_core::Error::from)?;

    let map = req.headers_mut();
    map.insert(ACCEPT, HeaderValue::from_static("application/json"));
    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for entry in headers {
        let name = HeaderName::from_bytes(entry.name.as_bytes()).map_err(|e| {
            awscurl_core::Error::request_invalid(format!("invalid header name '{}'", entry.name))
                .with_source(e)
        })?;
        let value = HeaderValue::from_str(&entry.value).map_err(|e| {
            awscurl_core::Error::request_invalid(format!("invalid value for header '{}'", entry.name))
                .with_source(e)
        })?;
        map.insert(name, value);
    }

    if let Some(spec) = body {
        let content = spec.load(ctx).await?;
        debug!("added content body, length = {}", content.len());
        req.headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(content.len()));
        *req.body_mut() = content;
    }

    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use awscurl_file_read_tokio::TokioFileRead;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn url() -> Url {
        Url::parse("https://example.com/prod/items").unwrap()
    }

    fn ctx() -> Context {
        Context::new().with_file_read(TokioFileRead)
    }

    fn data_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content).unwrap();
        f
    }

    #[test]
    fn test_body_spec_from_arg() {
        assert_eq!(
            BodySpec::from_arg("{\"a\":1}", false),
            BodySpec::Literal("{\"a\":1}".to_string())
        );
        assert_eq!(
            BodySpec::from_arg("@body.json", true),
            BodySpec::File {
                path: "body.json".to_string(),
                binary: true
            }
        );
        assert_eq!(BodySpec::from_arg("", false), BodySpec::Literal(String::new()));
    }

    #[tokio::test]
    async fn test_default_headers() {
        let req = assemble(&ctx(), None, &url(), &[], None).await.unwrap();

        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.uri(), "https://example.com/prod/items");
        assert_eq!(req.headers()[ACCEPT], "application/json");
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
        assert!(req.headers().get(CONTENT_LENGTH).is_none());
        assert!(req.body().is_empty());
    }

    #[tokio::test]
    async fn test_header_override_is_case_insensitive() {
        let headers = vec![
            HeaderEntry::new("accept", "text/plain"),
            HeaderEntry::new("X-Trace", "1"),
            HeaderEntry::new("x-trace", "2"),
        ];
        let req = assemble(&ctx(), None, &url(), &headers, None).await.unwrap();

        assert_eq!(req.headers()[ACCEPT], "text/plain");
        assert_eq!(req.headers().get_all(ACCEPT).iter().count(), 1);
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(req.headers()["x-trace"], "2");
    }

    #[tokio::test]
    async fn test_invalid_header_name() {
        let headers = vec![HeaderEntry::new("Bad Name", "1")];
        let err = assemble(&ctx(), None, &url(), &headers, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid header name 'Bad Name'");
    }

    #[tokio::test]
    async fn test_literal_body() {
        let body = BodySpec::from_arg("x", false);
        let req = assemble(&ctx(), None, &url(), &[], Some(&body))
            .await
            .unwrap();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.headers()[CONTENT_LENGTH], "1");
        assert_eq!(req.body().as_ref(), b"x");
    }

    #[tokio::test]
    async fn test_empty_literal_body() {
        let body = BodySpec::from_arg("", false);
        let req = assemble(&ctx(), None, &url(), &[], Some(&body))
            .await
            .unwrap();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.headers()[CONTENT_LENGTH], "0");
    }

    #[tokio::test]
    async fn test_explicit_method_wins() {
        let body = BodySpec::from_arg("x", false);
        let req = assemble(&ctx(), Some(Method::PUT), &url(), &[], Some(&body))
            .await
            .unwrap();
        assert_eq!(req.method(), Method::PUT);

        let req = assemble(&ctx(), Some(Method::DELETE), &url(), &[], None)
            .await
            .unwrap();
        assert_eq!(req.method(), Method::DELETE);
    }

    #[tokio::test]
    async fn test_text_file_body_is_stripped() {
        let f = data_file(b"line1\r\nline2\n");
        let body = BodySpec::from_arg(&format!("@{}", f.path().display()), false);
        let req = assemble(&ctx(), None, &url(), &[], Some(&body))
            .await
            .unwrap();

        assert_eq!(req.body().as_ref(), b"line1line2");
        assert_eq!(req.headers()[CONTENT_LENGTH], "10");
    }

    #[tokio::test]
    async fn test_text_file_body_strips_nul() {
        let f = data_file(b"a\0b\r\nc");
        let body = BodySpec::from_arg(&format!("@{}", f.path().display()), false);
        let req = assemble(&ctx(), None, &url(), &[], Some(&body))
            .await
            .unwrap();

        assert_eq!(req.body().as_ref(), b"abc");
    }

    #[tokio::test]
    async fn test_binary_file_body_is_untouched() {
        let f = data_file(b"line1\r\nline2\n");
        let body = BodySpec::from_arg(&format!("@{}", f.path().display()), true);
        let req = assemble(&ctx(), None, &url(), &[], Some(&body))
            .await
            .unwrap();

        assert_eq!(req.body().as_ref(), b"line1\r\nline2\n");
        assert_eq!(req.headers()[CONTENT_LENGTH], "13");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let body = BodySpec::from_arg("@/definitely/not/here.json", false);
        let err = assemble(&ctx(), None, &url(), &[], Some(&body))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DataFile { .. }));
        assert_eq!(
            err.to_string(),
            "Error opening input file '/definitely/not/here.json'"
        );
    }
}
