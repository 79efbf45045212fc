//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::report::ReportFormat;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".goatdom/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub service: Service,
    #[serde(default)]
    pub builder: Builder,
    #[serde(default)]
    pub artifact: Artifact,
    #[serde(default)]
    pub report: Report,
}

/// Where the tree-building and scraping backend lives.
///
/// Unset fields stay `None` so a layer that spells out a default value still overrides the
/// layers below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Service {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Service {
    const DEFAULT_BASE_URL: &'static str = "http://localhost:8000/api/v1/scraper";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(Self::DEFAULT_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(Self::DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Parsed base URL.
    pub fn url(&self) -> Result<Url> {
        let base_url = self.base_url();
        Url::parse(base_url).with_context(|| format!("invalid service base_url: {base_url}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Builder {
    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

impl Builder {
    const DEFAULT_DEBOUNCE_MS: u64 = 700;

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.unwrap_or(Self::DEFAULT_DEBOUNCE_MS))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pretty: Option<bool>,
    #[serde(default)]
    include_preview: Option<bool>,
}

impl Artifact {
    pub fn pretty(&self) -> bool {
        self.pretty.unwrap_or(true)
    }

    pub fn include_preview(&self) -> bool {
        self.include_preview.unwrap_or(true)
    }
}

impl Default for Artifact {
    fn default() -> Self {
        Self {
            pretty: Some(true),
            include_preview: Some(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Report {
    #[serde(default)]
    format: Option<ReportFormat>,
}

impl Report {
    pub fn format(&self) -> ReportFormat {
        self.format.unwrap_or_default()
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    service_url: Option<String>,
    debounce_ms: Option<String>,
    api_token: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            service_url: env::var("GOATDOM_SERVICE_URL").ok(),
            debounce_ms: env::var("GOATDOM_DEBOUNCE_MS").ok(),
            api_token: env::var("GOATDOM_API_TOKEN").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(service_url: &str, debounce_ms: &str) -> Self {
        Self {
            service_url: Some(service_url.to_owned()),
            debounce_ms: Some(debounce_ms.to_owned()),
            api_token: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            tracing::debug!(path = %global_path.display(), "loading global config");
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            tracing::debug!(path = %workspace_path.display(), "loading workspace config");
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        let config = apply_env_overrides(merged, env_overrides)?;
        config.service.url()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
            .with_context(|| format!("failed to load config file: {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            service: merge_service(self.service, other.service),
            builder: merge_builder(self.builder, other.builder),
            artifact: merge_artifact(self.artifact, other.artifact),
            report: Report {
                format: other.report.format.or(self.report.format),
            },
        }
    }
}

fn merge_service(base: Service, overlay: Service) -> Service {
    Service {
        base_url: overlay.base_url.or(base.base_url),
        request_timeout_secs: overlay.request_timeout_secs.or(base.request_timeout_secs),
        api_token: overlay.api_token.or(base.api_token),
    }
}

fn merge_builder(base: Builder, overlay: Builder) -> Builder {
    Builder {
        debounce_ms: overlay.debounce_ms.or(base.debounce_ms),
    }
}

fn merge_artifact(mut base: Artifact, overlay: Artifact) -> Artifact {
    if let Some(value) = overlay.pretty {
        base.pretty = Some(value);
    }
    if let Some(value) = overlay.include_preview {
        base.include_preview = Some(value);
    }
    base
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("goatdom/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Result<Config> {
    if let Some(service_url) = env.service_url {
        config.service.base_url = Some(service_url);
    }
    if let Some(debounce_ms) = env.debounce_ms {
        config.builder.debounce_ms = Some(
            debounce_ms
                .trim()
                .parse()
                .with_context(|| format!("GOATDOM_DEBOUNCE_MS is not a number: {debounce_ms}"))?,
        );
    }
    if let Some(token) = env.api_token.filter(|token| !token.is_empty()) {
        config.service.api_token = Some(token);
    }
    Ok(config)
}
