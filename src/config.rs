use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Token;
use crate::error::{JenkinsError, Result};
use crate::jenkins::PollPolicy;

const APP_NAME: &str = "jenkins-cli";
const CREDENTIALS_STEM: &str = "jenkins-cli";
const WORKSPACE_STEM: &str = "workspace";
/// Tried in order; the first one present wins, `yaml` is used for new files.
const EXTENSIONS: [&str; 4] = ["yaml", "yml", "toml", "json"];

/// Static basic-auth credentials for one Jenkins server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub token: Token,

    /// Server root, e.g. `https://ci.example.com` or `https://example.com/jenkins`
    #[serde(default)]
    pub base_api: String,
}

impl Credentials {
    /// Checks that every field is present, naming all the missing ones at once.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.username.trim().is_empty() {
            missing.push("username is required");
        }
        if self.token.is_blank() {
            missing.push("token is required");
        }
        if self.base_api.trim().is_empty() {
            missing.push("base_api is required");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(JenkinsError::Config(format!(
                "configuration validation failed: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Timings for the trigger-and-watch workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSettings {
    /// Wait before the first queue lookup
    #[serde(default = "default_queue_initial_delay_secs")]
    pub queue_initial_delay_secs: u64,

    /// Wait between queue lookups
    #[serde(default = "default_queue_retry_delay_secs")]
    pub queue_retry_delay_secs: u64,

    /// Number of queue lookups before the build is reported as still queued
    #[serde(default = "default_queue_attempts")]
    pub queue_attempts: u32,

    /// Wait between workflow description fetches while watching stages
    #[serde(default = "default_stage_interval_secs")]
    pub stage_interval_secs: u64,

    /// Give up watching stages after this long; 0 watches forever
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            queue_initial_delay_secs: default_queue_initial_delay_secs(),
            queue_retry_delay_secs: default_queue_retry_delay_secs(),
            queue_attempts: default_queue_attempts(),
            stage_interval_secs: default_stage_interval_secs(),
            stage_timeout_secs: default_stage_timeout_secs(),
        }
    }
}

impl PollSettings {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            queue_initial_delay: Duration::from_secs(self.queue_initial_delay_secs),
            queue_retry_delay: Duration::from_secs(self.queue_retry_delay_secs),
            queue_attempts: self.queue_attempts,
            stage_interval: Duration::from_secs(self.stage_interval_secs),
            stage_timeout: (self.stage_timeout_secs > 0)
                .then(|| Duration::from_secs(self.stage_timeout_secs)),
        }
    }
}

/// Contents of the credentials file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub credentials: Credentials,

    /// Per-request transport timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub poll: PollSettings,
}

fn default_queue_initial_delay_secs() -> u64 {
    4
}

fn default_queue_retry_delay_secs() -> u64 {
    3
}

fn default_queue_attempts() -> u32 {
    8
}

fn default_stage_interval_secs() -> u64 {
    2
}

fn default_stage_timeout_secs() -> u64 {
    30 * 60
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            timeout_secs: default_timeout_secs(),
            poll: PollSettings::default(),
        }
    }

    /// Loads and validates the credentials file.
    ///
    /// # Errors
    ///
    /// Returns `JenkinsError::Config` if the file is missing or any credential
    /// field is empty, so the user knows to run `init`.
    pub fn load(paths: &ConfigPaths) -> Result<Self> {
        let path = paths.credentials_file();
        if !path.exists() {
            return Err(JenkinsError::Config(format!(
                "config file not found at {}. Please run 'jenkins-cli init' to create configuration",
                path.display()
            )));
        }

        let config: Self = load_document(&path)?;
        config.credentials.validate()?;
        Ok(config)
    }

    pub fn save(&self, paths: &ConfigPaths) -> Result<()> {
        save_document(&paths.credentials_file(), self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Cached view → job hierarchy, refreshed by `sync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub views: Vec<View>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    #[serde(default)]
    pub job: Vec<Job>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub job_param: JobParam,
}

/// Parameter choices cached at sync time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParam {
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub branch: Vec<String>,
}

impl Workspace {
    pub fn load(paths: &ConfigPaths) -> Result<Self> {
        let path = paths.workspace_file();
        if !path.exists() {
            return Err(JenkinsError::Config(format!(
                "workspace file not found at {}. Please run 'jenkins-cli sync' to create workspace configuration",
                path.display()
            )));
        }
        load_document(&path)
    }

    pub fn save(&self, paths: &ConfigPaths) -> Result<()> {
        save_document(&paths.workspace_file(), self)
    }

    pub fn view_names(&self) -> Vec<String> {
        self.views.iter().map(|view| view.name.clone()).collect()
    }

    pub fn job_names(&self, view: &str) -> Vec<String> {
        self.views
            .iter()
            .find(|v| v.name == view)
            .map(|v| v.job.iter().map(|job| job.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn find_job(&self, view: &str, job: &str) -> Option<&Job> {
        self.views
            .iter()
            .find(|v| v.name == view)
            .and_then(|v| v.job.iter().find(|j| j.name == job))
    }
}

/// Location of the credentials and workspace files.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    dir: PathBuf,
}

impl ConfigPaths {
    /// Uses `dir` when given, otherwise `~/.config/jenkins-cli`.
    pub fn resolve(dir: Option<&Path>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::home_dir()
                .ok_or_else(|| JenkinsError::Config("No home directory found".into()))?
                .join(".config")
                .join(APP_NAME),
        };
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `jenkins-cli.{yaml,yml,toml,json}`, whichever exists.
    pub fn credentials_file(&self) -> PathBuf {
        self.discover(CREDENTIALS_STEM)
    }

    pub fn workspace_file(&self) -> PathBuf {
        self.discover(WORKSPACE_STEM)
    }

    fn discover(&self, stem: &str) -> PathBuf {
        let candidates: Vec<PathBuf> = EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{stem}.{ext}")))
            .collect();

        candidates
            .iter()
            .find(|path| path.exists())
            .unwrap_or(&candidates[0])
            .clone()
    }
}

/// Reads a document, choosing the format from the file extension.
fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)?;
    let context = path.display().to_string();

    match extension(path) {
        "toml" => toml::from_str(&contents).map_err(|e| JenkinsError::parse(context, e)),
        "json" => serde_json::from_str(&contents).map_err(|e| JenkinsError::parse(context, e)),
        _ => serde_yaml::from_str(&contents).map_err(|e| JenkinsError::parse(context, e)),
    }
}

fn save_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = match extension(path) {
        "toml" => toml::to_string_pretty(value)
            .map_err(|e| JenkinsError::parse(path.display().to_string(), e))?,
        "json" => serde_json::to_string_pretty(value)
            .map_err(|e| JenkinsError::parse(path.display().to_string(), e))?,
        _ => serde_yaml::to_string(value)?,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    debug!("Wrote {}", path.display());

    Ok(())
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|ext| ext.to_str()).unwrap_or("")
}
