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

use crate::constants::{
    AWS_CONFIG_FILE, AWS_DEFAULT_REGION, AWS_PROFILE, AWS_REGION, AWS_SHARED_CREDENTIALS_FILE,
};
use awscurl_core::Context;
use ini::Ini;
use log::{debug, warn};

/// Profile is one section of the shared AWS config file.
///
/// Only the keys awscurl acts on are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    /// Name of the profile, without the `profile ` prefix.
    pub name: String,
    /// `source_profile`: profile whose credentials are used to assume `role_arn`.
    pub source_profile: Option<String>,
    /// `role_arn`: role to assume before signing.
    pub role_arn: Option<String>,
    /// `region`: default region for this profile.
    pub region: Option<String>,
}

impl Profile {
    /// Returns the source profile and role to assume when both are configured.
    pub fn assume_role_target(&self) -> Option<(&str, &str)> {
        match (self.source_profile.as_deref(), self.role_arn.as_deref()) {
            (Some(source), Some(role)) if !source.is_empty() && !role.is_empty() => {
                Some((source, role))
            }
            _ => None,
        }
    }
}

/// Look up profile `name` in the shared config file.
///
/// A missing, unreadable or malformed file yields `None`, the same as a
/// missing section.
pub async fn load_profile(ctx: &Context, name: &str) -> Option<Profile> {
    let conf = load_ini(ctx, &config_file_path(ctx), "config").await?;

    let Some(props) = config_section(&conf, name) else {
        debug!("profile {name} not found in config file");
        return None;
    };

    let get = |key: &str| {
        props
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Some(Profile {
        name: name.to_string(),
        source_profile: get("source_profile"),
        role_arn: get("role_arn"),
        region: get("region"),
    })
}

/// Region used when nothing else is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Resolve the signing region.
///
/// An explicit region always wins. With a named profile, the profile's own
/// `region` comes before `AWS_REGION` and `AWS_DEFAULT_REGION`. Without one,
/// the environment comes first and the region of the default profile
/// (`AWS_PROFILE` or `default`) after it. [`DEFAULT_REGION`] is the last resort.
///
/// The config file is only read when the explicit region is absent, and a
/// config file that can't be parsed is skipped.
pub async fn resolve_region(
    ctx: &Context,
    explicit: Option<&str>,
    profile: Option<&str>,
) -> String {
    if let Some(region) = explicit.filter(|v| !v.is_empty()) {
        return region.to_string();
    }

    let from_env = || {
        ctx.env_var(AWS_REGION)
            .filter(|v| !v.is_empty())
            .or_else(|| ctx.env_var(AWS_DEFAULT_REGION).filter(|v| !v.is_empty()))
    };

    let region = match profile {
        Some(name) => match load_profile(ctx, name).await.and_then(|p| p.region) {
            Some(region) => Some(region),
            None => from_env(),
        },
        None => match from_env() {
            Some(region) => Some(region),
            None => {
                let name = ctx
                    .env_var(AWS_PROFILE)
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| "default".to_string());
                load_profile(ctx, &name).await.and_then(|p| p.region)
            }
        },
    };

    region.unwrap_or_else(|| DEFAULT_REGION.to_string())
}

/// Path of the shared config file: `AWS_CONFIG_FILE` or `~/.aws/config`.
pub fn config_file_path(ctx: &Context) -> String {
    ctx.env_var(AWS_CONFIG_FILE)
        .unwrap_or_else(|| "~/.aws/config".to_string())
}

/// Path of the shared credentials file: `AWS_SHARED_CREDENTIALS_FILE` or `~/.aws/credentials`.
pub fn credentials_file_path(ctx: &Context) -> String {
    ctx.env_var(AWS_SHARED_CREDENTIALS_FILE)
        .unwrap_or_else(|| "~/.aws/credentials".to_string())
}

/// Find the section of profile `name` in a config file.
///
/// The config file names sections `[profile name]`, except for `[default]`.
pub(crate) fn config_section<'a>(conf: &'a Ini, name: &str) -> Option<&'a ini::Properties> {
    if name == "default" {
        conf.section(Some("default"))
            .or_else(|| conf.section(Some("profile default")))
    } else {
        conf.section(Some(format!("profile {name}")))
    }
}

/// Read and parse an ini file.
///
/// Files that can't be located or read yield `None`. Content that isn't valid
/// ini is logged and treated the same way.
pub(crate) async fn load_ini(ctx: &Context, path: &str, kind: &str) -> Option<Ini> {
    let Some(expanded) = ctx.expand_home_dir(path) else {
        debug!("failed to expand homedir for {kind} file: {path}");
        return None;
    };

    let content = match ctx.file_read(&expanded).await {
        Ok(content) => content,
        Err(err) => {
            debug!("failed to read {kind} file {expanded}: {err}");
            return None;
        }
    };

    match Ini::load_from_str(&String::from_utf8_lossy(&content)) {
        Ok(conf) => Some(conf),
        Err(err) => {
            warn!("ignoring {kind} file {expanded}: {err}");
            None
        }
    }
}
