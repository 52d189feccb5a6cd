use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use wirekit::manifest::{MODULES_FILE, SERVICES_FILE};
use wirekit::{Manifest, TreeOptions, TypeName};

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    /// Where the component manifests live.
    #[serde(default)]
    pub components: ComponentsConfig,
    /// Dependency tree behaviour.
    #[serde(default)]
    pub tree: TreeConfig,
}

/// Logging configuration - maps tracing targets to their logging settings.
/// Key "default" is the catch-all for targets without an explicit section.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    /// Rotating log file. Only honoured on the "default" section; empty disables it.
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentsConfig {
    /// Directory holding the manifests. Unset means every registered component is used.
    #[serde(default)]
    pub manifest_dir: Option<String>,
    #[serde(default = "default_services_file")]
    pub services_file: String,
    #[serde(default = "default_modules_file")]
    pub modules_file: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TreeConfig {
    /// Abort startup on the first constructor failure.
    #[serde(default)]
    pub strict_construction: bool,
    /// Contract name → implementation name.
    #[serde(default)]
    pub preferred: BTreeMap<String, String>,
}

fn default_services_file() -> String {
    SERVICES_FILE.to_string()
}

fn default_modules_file() -> String {
    MODULES_FILE.to_string()
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            manifest_dir: None,
            services_file: default_services_file(),
            modules_file: default_modules_file(),
        }
    }
}

impl ComponentsConfig {
    /// Reads the configured manifests, resolving a relative directory against
    /// `base_dir`. `None` when no manifest directory is configured.
    pub fn load_manifest(&self, base_dir: &Path) -> Result<Option<Manifest>> {
        let Some(dir) = self.manifest_dir.as_deref().filter(|d| !d.trim().is_empty()) else {
            return Ok(None);
        };
        let dir = resolve_path(dir, base_dir);
        let manifest = Manifest::read_files(
            dir.join(&self.services_file),
            dir.join(&self.modules_file),
        )
        .with_context(|| format!("Failed to read manifests from {}", dir.display()))?;
        Ok(Some(manifest))
    }
}

impl TreeConfig {
    pub fn to_options(&self) -> TreeOptions {
        TreeOptions {
            strict_construction: self.strict_construction,
            preferred: self
                .preferred
                .iter()
                .map(|(contract, implementation)| {
                    (
                        TypeName::from(contract.as_str()),
                        TypeName::from(implementation.as_str()),
                    )
                })
                .collect(),
        }
    }
}

/// Create a default logging configuration.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: String::new(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: Some(default_logging_config()),
            components: ComponentsConfig::default(),
            tree: TreeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration with layered loading: defaults → YAML file → environment variables.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        Self::extract_layers(Some(config_path.as_ref()))
    }

    /// Load configuration from file, or from defaults and environment variables
    /// when no file is given.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::extract_layers(Some(path.as_ref())),
            None => Self::extract_layers(None),
        }
    }

    fn extract_layers(config_path: Option<&Path>) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // Optional sections stay None unless YAML/ENV provide them.
        let base = AppConfig {
            logging: None,
            components: ComponentsConfig::default(),
            tree: TreeConfig::default(),
        };

        let mut figment = Figment::new().merge(Serialized::defaults(base));
        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }
        // Example: WIREKIT__TREE__STRICT_CONSTRUCTION=true maps to tree.strict_construction
        let mut config: AppConfig = figment
            .merge(Env::prefixed("WIREKIT__").split("__"))
            .extract()
            .with_context(|| "Failed to extract config from figment".to_string())?;

        // Without a file the logging defaults still apply.
        if config_path.is_none() && config.logging.is_none() {
            config.logging = Some(default_logging_config());
        }
        Ok(config)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(dir) = &args.manifest_dir {
            self.components.manifest_dir = Some(dir.clone());
        }
        if args.strict {
            self.tree.strict_construction = true;
        }

        // Set logging level based on verbose flags for "default" section.
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            default_section.console_level = match args.verbose {
                0 => default_section.console_level.clone(), // keep
                1 => "debug".to_string(),
                _ => "trace".to_string(),
            };
        }
    }
}

/// Command line arguments structure.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub manifest_dir: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
    pub strict: bool,
}

/// Directory that relative paths in the configuration are resolved against:
/// the config file's directory, or the working directory without one.
pub fn base_dir(config_path: Option<&Path>) -> PathBuf {
    config_path
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub(crate) fn resolve_path(raw: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(raw);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

#[cfg(test)]
mod tests;
