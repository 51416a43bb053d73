//! Host-supplied settings, optionally read from `offmain.toml`.

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub const CONFIG_FILE: &str = "offmain.toml";

/// How compiled units are delivered to the browser.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum OutputFormat {
    /// Each unit registers itself through a named declaration call.
    #[default]
    Amd,
    /// Native ECMAScript modules; units are shipped as produced.
    Es,
    /// Anything else. Rejected at finalization.
    Other(String),
}

impl OutputFormat {
    /// Whether the delivery context runs workers as modules, so options
    /// such as `type: "module"` may be kept.
    pub fn is_module_native(&self) -> bool {
        matches!(self, OutputFormat::Es)
    }
}

impl From<String> for OutputFormat {
    fn from(value: String) -> Self {
        match value.as_str() {
            "amd" => OutputFormat::Amd,
            "es" | "esm" | "module" => OutputFormat::Es,
            _ => OutputFormat::Other(value),
        }
    }
}

impl From<&str> for OutputFormat {
    fn from(value: &str) -> Self {
        OutputFormat::from(value.to_string())
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Amd => f.write_str("amd"),
            OutputFormat::Es => f.write_str("es"),
            OutputFormat::Other(other) => f.write_str(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub format: OutputFormat,
    /// Replaces the built-in loader bootstrap text verbatim.
    pub loader: Option<String>,
    pub use_eval: bool,
    pub amd_function_name: String,
    pub url_loader_scheme: String,
    pub silence_esm_worker_warning: bool,
    pub banner: Option<String>,
    pub worker_constructors: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: OutputFormat::Amd,
            loader: None,
            use_eval: false,
            amd_function_name: "define".to_string(),
            url_loader_scheme: "omt".to_string(),
            silence_esm_worker_warning: false,
            banner: None,
            worker_constructors: vec!["Worker".to_string(), "SharedWorker".to_string()],
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// `<root>/offmain.toml` when present, defaults otherwise.
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if path.is_file() {
            tracing::debug!("loading configuration from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Prefix marking an import as "give me this unit's address".
    pub fn url_loader_prefix(&self) -> String {
        format!("{}:", self.url_loader_scheme)
    }
}
