use crate::constants::{AWS_EC2_METADATA_DISABLED, AWS_EC2_METADATA_SERVICE_ENDPOINT};
use crate::Credential;
use async_trait::async_trait;
use awscurl_core::time::parse_rfc3339;
use awscurl_core::{Context, Error, ProvideCredential, Result};
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::Method;
use serde::Deserialize;
use std::time::Duration;

const IMDS_ENDPOINT: &str = "http://169.254.169.254";

/// IMDSv2CredentialProvider loads the credential of the instance profile from
/// the EC2 instance metadata service.
///
/// Every call to the metadata service is bounded by a timeout, one second by
/// default, so that running outside EC2 doesn't stall the request.
#[derive(Debug, Clone)]
pub struct IMDSv2CredentialProvider {
    endpoint: Option<String>,
    timeout: Duration,
}

impl Default for IMDSv2CredentialProvider {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(1),
        }
    }
}

impl IMDSv2CredentialProvider {
    /// Create a new `IMDSv2CredentialProvider` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint for the metadata service.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the timeout for metadata requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, ctx: &Context) -> String {
        // First check configured endpoint, then environment, then default
        self.endpoint
            .clone()
            .or_else(|| ctx.env_var(AWS_EC2_METADATA_SERVICE_ENDPOINT))
            .unwrap_or_else(|| IMDS_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    async fn send(&self, ctx: &Context, req: http::Request<Bytes>, op: &str) -> Result<String> {
        let resp = tokio::time::timeout(self.timeout, ctx.http_send_as_string(req))
            .await
            .map_err(|_| {
                Error::unexpected(format!("IMDS {op} timed out after {:?}", self.timeout))
            })??;

        if resp.status() != http::StatusCode::OK {
            return Err(Error::unexpected(format!(
                "IMDS {op} failed: status={}, body={}",
                resp.status(),
                resp.body()
            )));
        }

        Ok(resp.into_body())
    }

    async fn load_token(&self, ctx: &Context, endpoint: &str) -> Result<String> {
        let req = http::Request::builder()
            .uri(format!("{endpoint}/latest/api/token"))
            .method(Method::PUT)
            .header(CONTENT_LENGTH, "0")
            // 21600s (6h) is recommended by AWS.
            .header("x-aws-ec2-metadata-token-ttl-seconds", "21600")
            .body(Bytes::new())?;

        self.send(ctx, req, "token request").await
    }

    async fn metadata_get(
        &self,
        ctx: &Context,
        url: String,
        token: &str,
        op: &str,
    ) -> Result<String> {
        let req = http::Request::builder()
            .uri(url)
            .method(Method::GET)
            .header("x-aws-ec2-metadata-token", token)
            .body(Bytes::new())?;

        self.send(ctx, req, op).await
    }
}

#[async_trait]
impl ProvideCredential for IMDSv2CredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let disabled = ctx
            .env_var(AWS_EC2_METADATA_DISABLED)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if disabled {
            return Ok(None);
        }

        let endpoint = self.endpoint(ctx);
        let token = self.load_token(ctx, &endpoint).await?;

        // List all credentials that node has.
        let profiles = self
            .metadata_get(
                ctx,
                format!("{endpoint}/latest/meta-data/iam/security-credentials/"),
                &token,
                "list instance profiles",
            )
            .await?;
        let Some(profile_name) = profiles.lines().map(str::trim).find(|v| !v.is_empty()) else {
            return Err(Error::config_invalid("no IAM role attached to EC2 instance"));
        };

        // Get the credentials via role_name.
        let content = self
            .metadata_get(
                ctx,
                format!("{endpoint}/latest/meta-data/iam/security-credentials/{profile_name}"),
                &token,
                "fetch credentials",
            )
            .await?;

        let resp: Ec2MetadataIamSecurityCredentials =
            serde_json::from_str(&content).map_err(|e| {
                Error::unexpected("failed to parse IMDS credentials response")
                    .with_context(format!("profile: {profile_name}"))
                    .with_source(e)
            })?;
        if resp.code != "Success" {
            return Err(Error::credential_invalid(format!(
                "IMDS returned error: [{}] {}",
                resp.code, resp.message
            ))
            .with_context(format!("profile: {profile_name}")));
        }

        Ok(Some(Credential {
            access_key_id: resp.access_key_id,
            secret_access_key: resp.secret_access_key,
            session_token: Some(resp.token),
            expires_in: Some(parse_rfc3339(&resp.expiration)?),
        }))
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Ec2MetadataIamSecurityCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: String,
    expiration: String,

    code: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provide_credential::testing::MockHttpSend;
    use awscurl_core::StaticEnv;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_imds_disabled() {
        let ctx = Context::new().with_env(StaticEnv {
            home_dir: None,
            envs: HashMap::from([(AWS_EC2_METADATA_DISABLED.to_string(), "true".to_string())]),
        });

        let cred = IMDSv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap();
        assert!(cred.is_none());
    }

    #[tokio::test]
    async fn test_imds_credential_flow() {
        let http = MockHttpSend::new([
            (200, "imds-token"),
            (200, "web-role\n"),
            (
                200,
                r#"{
                    "Code": "Success",
                    "LastUpdated": "2024-01-01T00:00:00Z",
                    "Type": "AWS-HMAC",
                    "AccessKeyId": "ASIAIMDS",
                    "SecretAccessKey": "imds_secret",
                    "Token": "imds_token",
                    "Expiration": "2099-01-01T00:00:00Z"
                }"#,
            ),
        ]);
        let ctx = Context::new()
            .with_http_send(http.clone())
            .with_env(StaticEnv::default());

        let cred = IMDSv2CredentialProvider::new()
            .with_endpoint("http://127.0.0.1:1338/")
            .with_timeout(Duration::from_secs(5))
            .provide_credential(&ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cred.access_key_id, "ASIAIMDS");
        assert_eq!(cred.session_token.as_deref(), Some("imds_token"));

        let requests = http.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method(), Method::PUT);
        assert_eq!(
            requests[0].uri().to_string(),
            "http://127.0.0.1:1338/latest/api/token"
        );
        assert_eq!(
            requests[2].uri().to_string(),
            "http://127.0.0.1:1338/latest/meta-data/iam/security-credentials/web-role"
        );
        assert_eq!(requests[2].headers()["x-aws-ec2-metadata-token"], "imds-token");
    }

    #[tokio::test]
    async fn test_imds_token_failure() {
        let http = MockHttpSend::new([(403, "forbidden")]);
        let ctx = Context::new()
            .with_http_send(http)
            .with_env(StaticEnv::default());

        let err = IMDSv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("status=403"));
    }
}
