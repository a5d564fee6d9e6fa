//! Client configuration
//!
//! Settings are read from a YAML file and then overridden from the
//! environment. A missing file is not an error; the defaults point at the
//! services of a local undercloud.

use crate::error::Error;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Endpoints and credentials for the remote services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Workflow service base URL (executions are POSTed here)
    pub workflow_url: String,

    /// Orchestration (stack) service base URL, including the project path
    pub orchestration_url: String,

    /// Messaging websocket URL used for workflow results
    pub messaging_url: String,

    /// Object store base URL, used to fetch generated playbook bundles
    pub object_store_url: String,

    /// Auth token sent with every request
    pub auth_token: Option<String>,

    /// Project id, needed by the messaging service
    pub project_id: Option<String>,

    /// Seconds to wait for a workflow result. `None` waits forever.
    pub wait_timeout: Option<u64>,

    /// Directory holding the heat templates
    pub templates_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workflow_url: "http://192.168.24.1:8989/v2".to_string(),
            orchestration_url: "http://192.168.24.1:8004/v1/admin".to_string(),
            messaging_url: "ws://192.168.24.1:9000".to_string(),
            object_store_url: "http://192.168.24.1:8080/v1/AUTH_admin".to_string(),
            auth_token: None,
            project_id: None,
            wait_timeout: None,
            templates_dir: PathBuf::from(crate::constants::TRIPLEO_HEAT_TEMPLATES),
        }
    }
}

impl Settings {
    /// Default config file location (`~/.config/overcloud/config.yaml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("overcloud").join("config.yaml"))
    }

    /// Load settings from `path` (or the default location) and apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let settings = match path {
            Some(p) if p.exists() => Self::from_file(&p)?,
            Some(p) => {
                debug!(path = %p.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        settings.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply overrides from an environment lookup function
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OVERCLOUD_WORKFLOW_URL") {
            self.workflow_url = v;
        }
        if let Some(v) = lookup("OVERCLOUD_ORCHESTRATION_URL") {
            self.orchestration_url = v;
        }
        if let Some(v) = lookup("OVERCLOUD_MESSAGING_URL") {
            self.messaging_url = v;
        }
        if let Some(v) = lookup("OVERCLOUD_OBJECT_STORE_URL") {
            self.object_store_url = v;
        }
        if let Some(v) = lookup("OS_AUTH_TOKEN") {
            self.auth_token = Some(v);
        }
        if let Some(v) = lookup("OS_PROJECT_ID") {
            self.project_id = Some(v);
        }
        if let Some(v) = lookup("OVERCLOUD_WAIT_TIMEOUT") {
            let secs = v.parse::<u64>().map_err(|_| {
                Error::Config(format!("OVERCLOUD_WAIT_TIMEOUT must be seconds, got '{}'", v))
            })?;
            self.wait_timeout = Some(secs);
        }
        Ok(self)
    }

    /// Result wait timeout as a duration
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout.map(Duration::from_secs)
    }
}
