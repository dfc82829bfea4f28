//! Reqwest-based HTTP transport for awscurl.
//!
//! `ReqwestHttpSend` implements the `HttpSend` trait from `awscurl_core`. It is
//! used for the credential endpoints (STS, container and instance metadata) as
//! well as for the signed request itself.
//!
//! ```no_run
//! use awscurl_core::Context;
//! use awscurl_http_send_reqwest::ReqwestHttpSend;
//!
//! # fn example() -> awscurl_core::Result<()> {
//! let ctx = Context::new().with_http_send(ReqwestHttpSend::try_new(false)?);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use awscurl_core::{Error, HttpSend, Result};
use bytes::Bytes;
use http_body_util::BodyExt;
use reqwest::{redirect, Client, Request};

/// Reqwest-based implementation of the `HttpSend` trait.
#[derive(Debug, Default, Clone)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client that never follows redirects.
    ///
    /// With `accept_invalid_certs` the TLS certificate of the peer is not
    /// verified at all.
    pub fn try_new(accept_invalid_certs: bool) -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| Error::unexpected("failed to build http client").with_source(e))?;

        Ok(Self::new(client))
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let method = req.method().clone();
        let uri = req.uri().to_string();
        log::debug!("sending http request: {method} {uri}");

        let req = Request::try_from(req).map_err(|e| {
            Error::request_invalid("failed to convert http request")
                .with_context(format!("uri: {uri}"))
                .with_source(e)
        })?;
        let resp: http::Response<_> = self
            .client
            .execute(req)
            .await
            .map_err(|e| {
                Error::unexpected(format!("failed to send request to {uri}"))
                    .with_context(format!("method: {method}"))
                    .with_source(e)
            })?
            .into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| Error::unexpected("failed to read response body").with_source(e))?;
        log::debug!("received http response: {} ({} bytes)", parts.status, bs.len());

        Ok(http::Response::from_parts(parts, bs))
    }
}
