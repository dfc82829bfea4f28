use crate::{Context, Result};
use http::request::Parts;
use std::fmt::Debug;

/// SigningCredential is the trait used by signer as the signing key.
pub trait SigningCredential: Clone + Debug + Send + Sync + Unpin + 'static {
    /// Check if the credential is still usable for signing.
    fn is_valid(&self) -> bool;
}

impl<T: SigningCredential> SigningCredential for Option<T> {
    fn is_valid(&self) -> bool {
        let Some(cred) = self else {
            return false;
        };

        cred.is_valid()
    }
}

/// ProvideCredential is the trait used by signer to load the credential from the environment.
///
/// Returning `Ok(None)` means this source has nothing to offer, so that a chain
/// can move on to the next one.
#[async_trait::async_trait]
pub trait ProvideCredential: Debug + Send + Sync + Unpin + 'static {
    /// Credential returned by this provider.
    type Credential: Send + Sync + Unpin + 'static;

    /// Load credential from current env.
    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>>;
}

#[async_trait::async_trait]
impl<T> ProvideCredential for Box<T>
where
    T: ProvideCredential + ?Sized,
{
    type Credential = T::Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        self.as_ref().provide_credential(ctx).await
    }
}

/// SignRequest is the trait used by signer to attach the signature to a request.
#[async_trait::async_trait]
pub trait SignRequest: Debug + Send + Sync + Unpin + 'static {
    /// Credential used by this signer.
    type Credential: Send + Sync + Unpin + 'static;

    /// Sign the request in place.
    ///
    /// `body` is the exact payload that will be transmitted with `req`.
    ///
    /// If `credential` is `None`, implementations should leave the request
    /// unsigned instead of failing: the server will reject it and that
    /// rejection is the error the caller sees.
    async fn sign_request(
        &self,
        ctx: &Context,
        req: &mut Parts,
        body: &[u8],
        credential: Option<&Self::Credential>,
    ) -> Result<()>;
}
