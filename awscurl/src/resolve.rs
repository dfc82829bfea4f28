use crate::error::{Error, Result};
use awscurl_aws_v4::{
    load_profile, resolve_region, AssumeRoleCredentialProvider, Credential,
    DefaultCredentialProvider, ProfileCredentialProvider, RequestSigner,
};
use awscurl_core::{Context, ProvideCredential, Signer};
use log::{debug, warn};

/// Resolves the region and the credential provider of a run.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    sts_endpoint: Option<String>,
}

impl Resolver {
    /// Create a resolver that talks to the regional STS endpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `AssumeRole` to `endpoint` instead, like `http://127.0.0.1:8080`.
    pub fn with_sts_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.sts_endpoint = Some(endpoint.into());
        self
    }

    /// Resolve `profile` into a region and a credential provider.
    ///
    /// Without a profile the default chain is used. A profile that sets both
    /// `source_profile` and `role_arn` loads the credential of the source
    /// profile and exchanges it for the role's temporary credential. Only one
    /// level is followed: a `role_arn` on the source profile is ignored. Any
    /// other profile, including one missing from the config file, is read
    /// directly from the shared files.
    ///
    /// The region is resolved first and is the same with or without role
    /// assumption. A config file that can't be read or parsed is treated as
    /// empty, so it never fails a run on its own.
    pub async fn resolve(
        &self,
        ctx: &Context,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Resolution {
        let profile = profile.filter(|v| !v.is_empty());
        let region = resolve_region(ctx, region, profile).await;
        debug!("profile: {}", profile.unwrap_or_default());
        debug!("region: {region}");

        let Some(name) = profile else {
            return Resolution {
                region,
                role_arn: None,
                provider: Box::new(DefaultCredentialProvider::new()),
            };
        };

        let target = load_profile(ctx, name).await.and_then(|p| {
            p.assume_role_target()
                .map(|(source, role)| (source.to_string(), role.to_string()))
        });

        let Some((source, role_arn)) = target else {
            return Resolution {
                region,
                role_arn: None,
                provider: Box::new(ProfileCredentialProvider::new().with_profile(name)),
            };
        };
        debug!("roleArn: {role_arn}, source profile: {source}");

        let sts_signer = Signer::new(
            ctx.clone(),
            ProfileCredentialProvider::new().with_profile(source),
            RequestSigner::new("sts", &region),
        );
        let mut provider =
            AssumeRoleCredentialProvider::new(role_arn.clone(), sts_signer).with_region(&region);
        if let Some(endpoint) = &self.sts_endpoint {
            provider = provider.with_endpoint(endpoint);
        }

        Resolution {
            region,
            role_arn: Some(role_arn),
            provider: Box::new(provider),
        }
    }
}

/// Outcome of [`Resolver::resolve`].
#[derive(Debug)]
pub struct Resolution {
    /// Region used in the credential scope.
    pub region: String,
    /// Role assumed before signing, if any.
    pub role_arn: Option<String>,
    provider: Box<dyn ProvideCredential<Credential = Credential>>,
}

impl Resolution {
    /// Load the credential to sign with.
    ///
    /// When a role is assumed, any failure is an [`Error::AssumeRole`]. Otherwise
    /// a missing credential is not an error: the request goes out unsigned
    /// and the service rejects it.
    pub async fn credential(&self, ctx: &Context) -> Result<Option<Credential>> {
        let cred = match self.provider.provide_credential(ctx).await {
            Ok(cred) => cred,
            Err(err) if self.role_arn.is_some() => return Err(Error::AssumeRole(err)),
            Err(err) => return Err(err.into()),
        };

        if cred.is_none() {
            warn!("no credential found, the request will be sent unsigned");
        }
        Ok(cred)
    }
}
