use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;

use crate::config::error::ConfigError;
use crate::fetch::FetchOptions;
use crate::mosaic::ComposeOptions;
use crate::observe::ObserveOptions;
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("tilestitch.toml.example");

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "tilestitch.toml";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// One-line file holding the target page URL
    pub url_file: PathBuf,
    /// Local tile cache directory
    pub cache_dir: PathBuf,
    /// Composed image path
    pub output: PathBuf,
    pub observe: ObserveOptions,
    pub fetch: FetchOptions,
    pub compose: ComposeOptions,
    pub browser: BrowserConfig,
}

/// External browser driver command
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowserConfig {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url_file: PathBuf::from("URL.txt"),
            cache_dir: PathBuf::from("tiles"),
            output: PathBuf::from("mosaic.png"),
            observe: ObserveOptions::default(),
            fetch: FetchOptions::default(),
            compose: ComposeOptions::default(),
            browser: BrowserConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlObserveConfig {
    pub window_secs: Option<f64>,
    pub navigation_timeout_secs: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlFetchConfig {
    pub concurrency: Option<usize>,
    pub request_timeout_secs: Option<f64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlComposeConfig {
    pub max_canvas_pixels: Option<u64>,
    pub background: Option<[u8; 4]>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub url_file: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub observe: Option<TomlObserveConfig>,
    pub fetch: Option<TomlFetchConfig>,
    pub compose: Option<TomlComposeConfig>,
    pub browser: Option<BrowserConfig>,
}

/// Convert a seconds value from the config file, rejecting negatives and NaN
fn seconds(key: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid {key}: {value}"))
}

impl Config {
    /// Load configuration, merging the first config file found over defaults.
    ///
    /// An explicit `path` must exist. Otherwise `./tilestitch.toml` and then
    /// the data directory's `config.toml` are tried; with neither present the
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => [PathBuf::from(LOCAL_CONFIG_FILE), config_path()]
                .into_iter()
                .find(|p| p.exists()),
        };

        match candidate {
            Some(file) => {
                let contents = fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read config {}", file.display()))?;
                let config = Self::from_toml_str(&contents)
                    .with_context(|| format!("Invalid config {}", file.display()))?;
                tracing::debug!(path = %file.display(), "Loaded config");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config file contents on top of the defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let toml_config: TomlConfig = toml::from_str(contents)?;
        let mut config = Config::default();

        if let Some(url_file) = toml_config.url_file {
            config.url_file = url_file;
        }
        if let Some(cache_dir) = toml_config.cache_dir {
            config.cache_dir = cache_dir;
        }
        if let Some(output) = toml_config.output {
            config.output = output;
        }

        // Load observation timing
        if let Some(observe) = toml_config.observe {
            if let Some(window) = observe.window_secs {
                config.observe.window = seconds("observe.window_secs", window)?;
            }
            if let Some(timeout) = observe.navigation_timeout_secs {
                config.observe.navigation_timeout =
                    seconds("observe.navigation_timeout_secs", timeout)?;
            }
        }

        // Load fetch settings
        if let Some(fetch) = toml_config.fetch {
            if let Some(concurrency) = fetch.concurrency {
                anyhow::ensure!(concurrency > 0, "fetch.concurrency must be at least 1");
                config.fetch.concurrency = concurrency;
            }
            if let Some(timeout) = fetch.request_timeout_secs {
                config.fetch.request_timeout = seconds("fetch.request_timeout_secs", timeout)?;
            }
            if let Some(user_agent) = fetch.user_agent {
                config.fetch.user_agent = user_agent;
            }
        }

        // Load compose settings
        if let Some(compose) = toml_config.compose {
            if let Some(max) = compose.max_canvas_pixels {
                config.compose.max_canvas_pixels = max;
            }
            if let Some(background) = compose.background {
                config.compose.background = background;
            }
        }

        if let Some(browser) = toml_config.browser {
            config.browser = browser;
        }

        Ok(config)
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = dir;
        self
    }

    pub fn with_output(mut self, output: PathBuf) -> Self {
        self.output = output;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.observe.window = window;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch.concurrency = concurrency.max(1);
        self
    }
}

/// Read the target page URL from the first line of `path`
pub fn read_target_url(path: &Path) -> Result<Url, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::UrlFile {
        path: path.to_path_buf(),
        source,
    })?;
    let line = contents.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return Err(ConfigError::EmptyUrlFile(path.to_path_buf()));
    }
    parse_target_url(line)
}

pub fn parse_target_url(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|e| ConfigError::InvalidUrl {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Write the bundled example config to `path`
pub fn write_example_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
