use crate::config::{config_file_path, config_section, credentials_file_path, load_ini};
use crate::constants::AWS_PROFILE;
use crate::Credential;
use async_trait::async_trait;
use awscurl_core::{Context, ProvideCredential, Result};
use ini::Properties;
use log::debug;

/// ProfileCredentialProvider loads AWS credentials from configuration files.
///
/// This provider loads credentials from:
/// - `~/.aws/credentials` (or the path specified by `AWS_SHARED_CREDENTIALS_FILE`)
/// - `~/.aws/config` (or the path specified by `AWS_CONFIG_FILE`)
///
/// The credentials file is checked first. The profile to use is determined by:
/// 1. The profile specified via `with_profile()`
/// 2. The `AWS_PROFILE` environment variable
/// 3. Default to "default"
#[derive(Debug, Default, Clone)]
pub struct ProfileCredentialProvider {
    profile: Option<String>,
}

impl ProfileCredentialProvider {
    /// Create a new ProfileCredentialProvider with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the profile name to use.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    fn profile(&self, ctx: &Context) -> String {
        match &self.profile {
            Some(profile) => profile.clone(),
            None => ctx
                .env_var(AWS_PROFILE)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "default".to_string()),
        }
    }

    async fn load_from_credentials_file(&self, ctx: &Context, profile: &str) -> Option<Credential> {
        let conf = load_ini(ctx, &credentials_file_path(ctx), "credentials").await?;

        match conf.section(Some(profile)) {
            Some(props) => credential_from_props(props),
            None => {
                debug!("profile {profile} not found in credentials file");
                None
            }
        }
    }

    async fn load_from_config_file(&self, ctx: &Context, profile: &str) -> Option<Credential> {
        let conf = load_ini(ctx, &config_file_path(ctx), "config").await?;

        match config_section(&conf, profile) {
            Some(props) => credential_from_props(props),
            None => {
                debug!("profile {profile} not found in config file");
                None
            }
        }
    }
}

fn credential_from_props(props: &Properties) -> Option<Credential> {
    let get = |key: &str| {
        props
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Some(Credential {
        access_key_id: get("aws_access_key_id")?,
        secret_access_key: get("aws_secret_access_key")?,
        session_token: get("aws_session_token"),
        expires_in: None,
    })
}

#[async_trait]
impl ProvideCredential for ProfileCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let profile = self.profile(ctx);
        debug!("loading credential of profile {profile}");

        if let Some(cred) = self.load_from_credentials_file(ctx, &profile).await {
            return Ok(Some(cred));
        }

        Ok(self.load_from_config_file(ctx, &profile).await)
    }
}
