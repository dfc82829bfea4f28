// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

/// Context is the outside world of one awscurl run.
///
/// It carries three capabilities:
///
/// - [`FileRead`] for the shared config files and `@file` bodies.
/// - [`HttpSend`] for credential endpoints and the signed request.
/// - [`Env`] for environment variables and the home directory.
///
/// A fresh context has none of them: file reads and sends fail, and the
/// environment is empty. Callers plug in what they need.
///
/// ```
/// use awscurl_core::{Context, OsEnv};
///
/// let ctx = Context::new().with_env(OsEnv);
/// assert!(ctx.env_var("AWSCURL_SURELY_UNSET").is_none());
/// ```
#[derive(Clone, Debug)]
pub struct Context {
    fs: Arc<dyn FileRead>,
    http: Arc<dyn HttpSend>,
    env: Arc<dyn Env>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a context with nothing configured.
    pub fn new() -> Self {
        let unconfigured = Arc::new(Unconfigured);
        Self {
            fs: unconfigured.clone(),
            http: unconfigured.clone(),
            env: unconfigured,
        }
    }

    /// Use `fs` to read files.
    pub fn with_file_read(mut self, fs: impl FileRead) -> Self {
        self.fs = Arc::new(fs);
        self
    }

    /// Use `http` to send requests.
    pub fn with_http_send(mut self, http: impl HttpSend) -> Self {
        self.http = Arc::new(http);
        self
    }

    /// Use `env` for environment lookups.
    pub fn with_env(mut self, env: impl Env) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Read the whole file at `path`.
    #[inline]
    pub async fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        self.fs.file_read(path).await
    }

    /// Send `req` and return the response as received.
    #[inline]
    pub async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        self.http.http_send(req).await
    }

    /// Send `req` and decode the response body as lossy utf-8.
    ///
    /// Credential endpoints answer with JSON or XML, which is read as text.
    pub async fn http_send_as_string(
        &self,
        req: http::Request<Bytes>,
    ) -> Result<http::Response<String>> {
        let (parts, body) = self.http.http_send(req).await?.into_parts();
        let body = String::from_utf8_lossy(&body).into_owned();
        Ok(http::Response::from_parts(parts, body))
    }

    /// Look up environment variable `key`.
    #[inline]
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.env.var(key)
    }

    /// Replace a leading `~` in `path` with the home directory.
    ///
    /// Paths without `~/` (or `~\`) come back unchanged. Returns `None` when
    /// the path needs a home directory and there is none.
    pub fn expand_home_dir(&self, path: &str) -> Option<String> {
        match path.strip_prefix('~') {
            Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => {
                let home = self.env.home_dir()?;
                Some(format!("{}{rest}", home.to_string_lossy()))
            }
            _ => Some(path.to_string()),
        }
    }
}

/// FileRead reads a whole file.
#[async_trait::async_trait]
pub trait FileRead: Debug + Send + Sync + 'static {
    /// Read the whole file at `path`.
    async fn file_read(&self, path: &str) -> Result<Vec<u8>>;
}

/// HttpSend is the HTTP transport.
///
/// Implementations must send the request exactly as given: no header
/// renaming, no URL re-encoding. The signature covers both.
#[async_trait::async_trait]
pub trait HttpSend: Debug + Send + Sync + 'static {
    /// Send `req` and return the response.
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>>;
}

/// Env is the process environment as seen by credential and region lookups.
pub trait Env: Debug + Send + Sync + 'static {
    /// Value of `key`, or `None` when it is unset or not valid utf-8.
    fn var(&self, key: &str) -> Option<String>;

    /// Home directory of the current user, if known.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// OsEnv reads the environment of the running process.
#[derive(Debug, Copy, Clone)]
pub struct OsEnv;

impl Env for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key)?.into_string().ok()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        home::home_dir()
    }
}

/// StaticEnv is a fixed environment, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    /// Home directory reported by [`Env::home_dir`].
    pub home_dir: Option<PathBuf>,
    /// Variables reported by [`Env::var`].
    pub envs: HashMap<String, String>,
}

impl Env for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.envs.get(key).cloned()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir.clone()
    }
}

/// Stands in for every capability a [`Context`] was not given.
#[derive(Debug, Clone, Copy)]
struct Unconfigured;

#[async_trait::async_trait]
impl FileRead for Unconfigured {
    async fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        Err(
            Error::unexpected("no file reader configured").with_context(format!("path: {path}"))
        )
    }
}

#[async_trait::async_trait]
impl HttpSend for Unconfigured {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        Err(Error::unexpected("no HTTP client configured")
            .with_context(format!("uri: {}", req.uri())))
    }
}

impl Env for Unconfigured {
    fn var(&self, _: &str) -> Option<String> {
        None
    }

    fn home_dir(&self) -> Option<PathBuf> {
        None
    }
}
