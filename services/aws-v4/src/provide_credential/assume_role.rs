use crate::credential::Credential;
use crate::provide_credential::utils::{parse_sts_error, sts_endpoint};
use async_trait::async_trait;
use awscurl_core::time::parse_rfc3339;
use awscurl_core::{Context, Error, ProvideCredential, Result, Signer};
use bytes::Bytes;
use log::debug;
use quick_xml::de;
use serde::Deserialize;

/// AssumeRoleCredentialProvider will load credential via assume role.
///
/// The `AssumeRole` call is signed by `sts_signer`, which carries the source
/// credential. The temporary credential it returns replaces the source one.
#[derive(Debug)]
pub struct AssumeRoleCredentialProvider {
    role_arn: String,
    role_session_name: String,
    duration_seconds: u32,

    region: String,
    endpoint: Option<String>,

    sts_signer: Signer<Credential>,
}

impl AssumeRoleCredentialProvider {
    /// Create a new assume role loader.
    pub fn new(role_arn: impl Into<String>, sts_signer: Signer<Credential>) -> Self {
        Self {
            role_arn: role_arn.into(),
            role_session_name: "awscurl".to_string(),
            duration_seconds: 900,
            region: String::new(),
            endpoint: None,
            sts_signer,
        }
    }

    /// Set the role session name.
    pub fn with_role_session_name(mut self, name: impl Into<String>) -> Self {
        self.role_session_name = name.into();
        self
    }

    /// Set the duration in seconds.
    pub fn with_duration_seconds(mut self, seconds: u32) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Set the region whose STS endpoint is called.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Override the STS endpoint, like `http://127.0.0.1:8080`.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    fn url(&self) -> String {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}", sts_endpoint(&self.region)),
        };

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("Action", "AssumeRole")
            .append_pair("Version", "2011-06-15")
            .append_pair("RoleArn", &self.role_arn)
            .append_pair("RoleSessionName", &self.role_session_name)
            .append_pair("DurationSeconds", &self.duration_seconds.to_string())
            .finish();

        format!("{endpoint}/?{query}")
    }
}

#[async_trait]
impl ProvideCredential for AssumeRoleCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let url = self.url();
        debug!("assuming role {} via {url}", self.role_arn);

        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(&url)
            .header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build STS AssumeRole request")
                    .with_context(format!("role_arn: {}", self.role_arn))
                    .with_source(e)
            })?;

        let (mut parts, body) = req.into_parts();
        self.sts_signer.sign(&mut parts, &body).await?;
        let req = http::Request::from_parts(parts, body);

        let resp = ctx.http_send_as_string(req).await?;
        let status = resp.status();
        if status != http::StatusCode::OK {
            return Err(parse_sts_error("AssumeRole", status, resp.body())
                .with_context(format!("role_arn: {}", self.role_arn)));
        }

        let body = resp.into_body();
        let resp: AssumeRoleResponse = de::from_str(&body).map_err(|e| {
            Error::unexpected("failed to parse STS AssumeRole response")
                .with_context(format!("role_arn: {}", self.role_arn))
                .with_source(e)
        })?;
        let resp_cred = resp.result.credentials;
        if resp_cred.access_key_id.is_empty() || resp_cred.secret_access_key.is_empty() {
            return Err(Error::unexpected(
                "STS AssumeRole response carries no credentials",
            ));
        }

        Ok(Some(Credential {
            access_key_id: resp_cred.access_key_id,
            secret_access_key: resp_cred.secret_access_key,
            session_token: Some(resp_cred.session_token.trim().to_string()),
            expires_in: Some(parse_rfc3339(&resp_cred.expiration)?),
        }))
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleResponse {
    #[serde(rename = "AssumeRoleResult")]
    result: AssumeRoleResult,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleResult {
    credentials: AssumeRoleCredentials,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}
