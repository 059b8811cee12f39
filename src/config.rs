use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CANDIDATES: [&str; 4] = ["oelens.toml", "oelens.json", "oelens.yaml", "oelens.yml"];

pub const DEFAULT_JENKINS_HOME: &str = "/binary/build_results/jenkins_home_backup";
pub const DEFAULT_JOB: &str = "starfish-drd4tv-official-h15";
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_STORE_PORT: u16 = 27017;

/// Configuration file structure for `OELens`.
///
/// Every value can be overridden on the command line; the file keeps the
/// settings of a recurring harvest in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub jenkins: JenkinsConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JenkinsConfig {
    /// Jenkins home holding the `jobs/<job>/builds` archive
    #[serde(default = "default_jenkins_home")]
    pub home: PathBuf,

    #[serde(default = "default_job")]
    pub job: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScanConfig {
    /// Number of builds analyzed at the same time
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Skip builds that are already stored
    #[serde(default = "default_skip_existing")]
    pub skip_existing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    pub host: Option<String>,

    #[serde(default = "default_store_port")]
    pub port: u16,

    pub database: Option<String>,

    pub collection: Option<String>,

    pub username: Option<String>,

    pub password: Option<String>,
}

impl Default for JenkinsConfig {
    fn default() -> Self {
        Self {
            home: default_jenkins_home(),
            job: default_job(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            skip_existing: default_skip_existing(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_store_port(),
            database: None,
            collection: None,
            username: None,
            password: None,
        }
    }
}

fn default_jenkins_home() -> PathBuf {
    PathBuf::from(DEFAULT_JENKINS_HOME)
}

fn default_job() -> String {
    DEFAULT_JOB.to_string()
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_skip_existing() -> bool {
    true
}

fn default_store_port() -> u16 {
    DEFAULT_STORE_PORT
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./oelens.toml, ./oelens.json, ./oelens.yaml, ./oelens.yml
    /// 3. `<config dir>/oelens/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let user_config = dirs::config_dir().map(|dir| dir.join("oelens").join("config.toml"));
        match find_candidate(Path::new(".")).or(user_config.filter(|path| path.is_file())) {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

fn find_candidate(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}
