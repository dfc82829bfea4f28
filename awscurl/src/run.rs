use crate::assemble::{assemble, BodySpec};
use crate::canonical::canonicalize;
use crate::error::Result;
use crate::resolve::Resolver;
use crate::Args;
use awscurl_aws_v4::RequestSigner;
use awscurl_core::{Context, SignRequest};
use awscurl_http_send_reqwest::ReqwestHttpSend;
use bytes::Bytes;
use log::debug;
use std::io::Write;

/// Awscurl runs one signed request.
///
/// The context is used for config files, the `@file` body and the STS
/// exchange. The signed request itself goes through the same context, or
/// through a client that skips certificate checks when `--insecure` is set.
#[derive(Debug, Clone)]
pub struct Awscurl {
    ctx: Context,
    resolver: Resolver,
}

impl Awscurl {
    /// Create a new runner on top of `ctx`.
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            resolver: Resolver::new(),
        }
    }

    /// Replace the credential resolver.
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Build, sign and send the request described by `args`, then write the
    /// response to `out`.
    pub async fn run(&self, args: &Args, out: &mut impl Write) -> Result<()> {
        debug!("url: {}", args.url);
        debug!(
            "data: <{}>",
            if args.data.is_some() {
                "present"
            } else {
                "not-present"
            }
        );
        for h in &args.headers {
            debug!("header: name={}, value={}", h.name, h.value);
        }

        let url = canonicalize(&args.url)?;
        let body = args
            .data
            .as_deref()
            .map(|data| BodySpec::from_arg(data, args.data_binary));
        let req = assemble(
            &self.ctx,
            args.request.map(Into::into),
            &url,
            &args.headers,
            body.as_ref(),
        )
        .await?;

        let resolution = self
            .resolver
            .resolve(&self.ctx, args.profile.as_deref(), args.region.as_deref())
            .await;
        let cred = resolution.credential(&self.ctx).await?;

        let signer = RequestSigner::new(&args.service, &resolution.region);
        let (mut parts, body) = req.into_parts();
        signer
            .sign_request(&self.ctx, &mut parts, &body, cred.as_ref())
            .await?;
        let req = http::Request::from_parts(parts, body);

        let resp = if args.insecure {
            let ctx = self
                .ctx
                .clone()
                .with_http_send(ReqwestHttpSend::try_new(true)?);
            ctx.http_send(req).await?
        } else {
            self.ctx.http_send(req).await?
        };

        write_response(out, &resp, args.include).map_err(|e| {
            awscurl_core::Error::unexpected("failed to write response").with_source(e)
        })?;
        Ok(())
    }
}

/// Write `response code: <N>`, the headers when `include` is set, then the body.
pub fn write_response(
    out: &mut impl Write,
    resp: &http::Response<Bytes>,
    include: bool,
) -> std::io::Result<()> {
    writeln!(out, "response code: {}", resp.status().as_u16())?;
    if include {
        for (name, value) in resp.headers() {
            writeln!(
                out,
                "{}: {}",
                name,
                String::from_utf8_lossy(value.as_bytes())
            )?;
        }
    }
    out.write_all(resp.body())?;
    out.flush()
}
