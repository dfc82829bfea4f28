use awscurl_core::Error;
use http::StatusCode;
use serde::Deserialize;

/// Get the sts endpoint.
///
/// The returning format may look like `sts.{region}.amazonaws.com`. Regions of
/// the China partition live under `amazonaws.com.cn`, and an empty region
/// falls back to the global endpoint.
///
/// ref: https://docs.aws.amazon.com/general/latest/gr/sts.html
pub fn sts_endpoint(region: &str) -> String {
    if region.is_empty() {
        "sts.amazonaws.com".to_string()
    } else if region.starts_with("cn-") {
        format!("sts.{region}.amazonaws.com.cn")
    } else {
        format!("sts.{region}.amazonaws.com")
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct StsErrorResponse {
    error: StsError,
    request_id: String,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct StsError {
    code: String,
    message: String,
}

/// Turn an STS error response into an [`Error`].
///
/// The message of the STS `<Error>` element becomes the error message. Bodies
/// that can't be parsed are kept as they are, together with the status.
pub(crate) fn parse_sts_error(op: &str, status: StatusCode, body: &str) -> Error {
    match quick_xml::de::from_str::<StsErrorResponse>(body) {
        Ok(resp) if !resp.error.message.is_empty() => {
            let mut err = Error::credential_denied(resp.error.message.trim())
                .with_context(format!("operation: {op}"))
                .with_context(format!("status: {status}"));
            if !resp.error.code.is_empty() {
                err = err.with_context(format!("code: {}", resp.error.code));
            }
            if !resp.request_id.is_empty() {
                err = err.with_context(format!("request_id: {}", resp.request_id));
            }
            err
        }
        _ => Error::credential_denied(format!("{op} failed with status {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("us-east-1", "sts.us-east-1.amazonaws.com"; "commercial region")]
    #[test_case("cn-north-1", "sts.cn-north-1.amazonaws.com.cn"; "china region")]
    #[test_case("", "sts.amazonaws.com"; "global endpoint")]
    fn test_sts_endpoint(region: &str, expected: &str) {
        assert_eq!(sts_endpoint(region), expected);
    }

    #[test]
    fn test_parse_sts_error() {
        let body = r#"<ErrorResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <Error>
    <Type>Sender</Type>
    <Code>AccessDenied</Code>
    <Message>User: arn:aws:iam::123456789012:user/dev is not authorized to perform: sts:AssumeRole on resource: arn:aws:iam::123456789012:role/admin</Message>
  </Error>
  <RequestId>8f3c2a7e-1b2d-4c5e-9f60-7a8b9c0d1e2f</RequestId>
</ErrorResponse>"#;

        let err = parse_sts_error("AssumeRole", StatusCode::FORBIDDEN, body);
        assert_eq!(
            err.to_string(),
            "User: arn:aws:iam::123456789012:user/dev is not authorized to perform: sts:AssumeRole on resource: arn:aws:iam::123456789012:role/admin"
        );
        assert_eq!(err.kind(), awscurl_core::ErrorKind::CredentialDenied);
        assert!(err.context().contains(&"code: AccessDenied".to_string()));
        assert!(err
            .context()
            .contains(&"request_id: 8f3c2a7e-1b2d-4c5e-9f60-7a8b9c0d1e2f".to_string()));
    }

    #[test]
    fn test_parse_sts_error_unparsable() {
        let err = parse_sts_error("AssumeRole", StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(
            err.to_string(),
            "AssumeRole failed with status 502 Bad Gateway: upstream down"
        );
    }
}
