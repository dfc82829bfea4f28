//! Core components for signing awscurl requests.
//!
//! This crate provides the foundational types and traits shared by the awscurl
//! workspace. The service crate (`awscurl-aws-v4`) builds credential providers and
//! the SigV4 signer on top of them, and the binary drives the whole pipeline.
//!
//! ## Overview
//!
//! - **Context**: A container that holds implementations for file reading, HTTP sending and environment access
//! - **Traits**: Abstract interfaces for credential loading ([`ProvideCredential`]) and request signing ([`SignRequest`])
//! - **Signer**: The orchestrator that loads a credential once and signs requests with it
//!
//! ## Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use awscurl_core::{Context, ProvideCredential, Result, SignRequest, Signer, SigningCredential};
//! use http::request::Parts;
//!
//! #[derive(Clone, Debug)]
//! struct MyCredential {
//!     key: String,
//! }
//!
//! impl SigningCredential for MyCredential {
//!     fn is_valid(&self) -> bool {
//!         !self.key.is_empty()
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct MyLoader;
//!
//! #[async_trait]
//! impl ProvideCredential for MyLoader {
//!     type Credential = MyCredential;
//!
//!     async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
//!         Ok(Some(MyCredential {
//!             key: "my-key".to_string(),
//!         }))
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct MyBuilder;
//!
//! #[async_trait]
//! impl SignRequest for MyBuilder {
//!     type Credential = MyCredential;
//!
//!     async fn sign_request(
//!         &self,
//!         _: &Context,
//!         req: &mut Parts,
//!         _body: &[u8],
//!         cred: Option<&Self::Credential>,
//!     ) -> Result<()> {
//!         if let Some(cred) = cred {
//!             req.headers.insert("x-my-key", cred.key.parse()?);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let signer = Signer::new(Context::new(), MyLoader, MyBuilder);
//!
//! let (mut parts, body) = http::Request::builder()
//!     .method("GET")
//!     .uri("https://example.com")
//!     .body(Vec::new())?
//!     .into_parts();
//! signer.sign(&mut parts, &body).await?;
//! # Ok(())
//! # }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod context;
pub use context::Context;
pub use context::Env;
pub use context::FileRead;
pub use context::HttpSend;
pub use context::OsEnv;
pub use context::StaticEnv;

mod error;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;

mod api;
pub use api::{ProvideCredential, SignRequest, SigningCredential};
mod chain;
pub use chain::ProvideCredentialChain;
mod request;
pub use request::SigningRequest;
mod signer;
pub use signer::Signer;
