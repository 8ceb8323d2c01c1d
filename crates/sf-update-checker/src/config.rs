// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use libsf_update_checker::{Config, CurrentRelease, Error, Platform, Result, Verbosity, Version};
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "sf-update-checker.toml";

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TomlConfig {
    project: Option<String>,
    host: Option<String>,
    user_agent: Option<String>,
    current_version: Option<String>,
    platform: Option<String>,
    build_date: Option<String>,
    verbosity: Option<String>,
}

/// values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub project: Option<String>,
    pub host: Option<String>,
    pub current_version: Option<String>,
    pub platform: Option<String>,
    pub build_date: Option<String>,
}

/// cli configuration wrapper that combines toml file parsing with the library's config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub inner: Config,
    pub verbosity: Verbosity,
}

impl std::ops::Deref for CliConfig {
    type Target = Config;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl CliConfig {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let toml_config = Self::load_toml_config()?;
        Self::resolve(toml_config, overrides)
    }

    fn load_toml_config() -> Result<TomlConfig> {
        let Some(path) = config_path() else {
            return Ok(TomlConfig::default());
        };

        if !path.exists() {
            return Ok(TomlConfig::default());
        }

        log::debug!(target: "config", "loading {}", path.display());

        let content = fs::read_to_string(&path).map_err(|e| {
            Error::config(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            Error::config(format!(
                "failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }

    fn resolve(toml_config: TomlConfig, overrides: &Overrides) -> Result<Self> {
        let project = overrides
            .project
            .clone()
            .or(toml_config.project)
            .map(|p| p.trim().trim_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                Error::config(format!(
                    "no project given; pass --project or set `project` in {CONFIG_FILE_NAME}"
                ))
            })?;

        let verbosity = match toml_config.verbosity.as_deref() {
            Some("quiet") => Verbosity::Quiet,
            Some("verbose") => Verbosity::Verbose,
            _ => Verbosity::Normal,
        };

        let current = current_release(
            overrides
                .current_version
                .as_deref()
                .or(toml_config.current_version.as_deref()),
            overrides
                .platform
                .as_deref()
                .or(toml_config.platform.as_deref()),
            overrides
                .build_date
                .as_deref()
                .or(toml_config.build_date.as_deref()),
        )?;

        let mut inner = Config::new(project).with_current(current);
        if let Some(host) = overrides.host.clone().or(toml_config.host) {
            inner = inner.with_host(host);
        }
        if let Some(user_agent) = toml_config.user_agent {
            inner = inner.with_user_agent(user_agent);
        }

        Ok(Self { inner, verbosity })
    }
}

/// starts from the build's own release and replaces whatever was configured.
fn current_release(
    version: Option<&str>,
    platform: Option<&str>,
    build_date: Option<&str>,
) -> Result<CurrentRelease> {
    let mut current = CurrentRelease::from_build();

    if let Some(version) = version {
        current.version = version.parse::<Version>()?;
    }
    if let Some(platform) = platform {
        current.platform = platform.parse::<Platform>()?;
    }
    if let Some(date) = build_date {
        current.date = DateTime::parse_from_rfc3339(date)
            .map_err(|e| Error::invalid_date(format!("{date}: {e}")))?
            .with_timezone(&Utc);
    }

    Ok(current)
}
