use crate::manifest::{validate_resource_name, DEFAULT_MANIFEST_NAME};
use crate::platform::VersionRule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable holding a space separated load order that overrides
/// the configured `libraries`.
pub const NATIVE_LIBS_ENV: &str = "LIBSTAGE_NATIVE_LIBS";

/// Threading runtime, its allocator, the core runtime, then the API bridge.
pub const DEFAULT_LIBRARIES: &[&str] = &["tbb", "tbbmalloc", "openvino", "openvino_c"];

/// Library tried through the system search path before anything is staged.
pub const DEFAULT_PRIMARY: &str = "openvino_c";

pub const DEFAULT_STAGING_PREFIX: &str = "libstage-native";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("library load order must not be empty")]
    EmptyLibraryList,
    #[error("invalid library name '{0}': expected a logical name such as 'tbb', not a file name")]
    InvalidLibraryName(String),
    #[error("invalid {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

/// How a platform filename is matched against staged file names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The staged name must equal the candidate filename.
    #[default]
    Exact,
    /// The staged name must start with the candidate filename; the
    /// lexicographically smallest such name is chosen.
    Prefix,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Prefix => f.write_str("prefix"),
        }
    }
}

impl FromStr for MatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "prefix" => Ok(Self::Prefix),
            other => Err(ConfigError::InvalidValue {
                field: "match_mode",
                value: other.to_owned(),
            }),
        }
    }
}

/// Top-level shape of `libstage.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub loader: LoaderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    #[serde(default = "default_primary")]
    pub primary: String,
    /// Logical names in dependency order.
    #[serde(default = "default_libraries")]
    pub libraries: Vec<String>,
    /// Name of the resource listing inside the bundle.
    #[serde(default = "default_manifest")]
    pub manifest: String,
    #[serde(default = "default_staging_prefix")]
    pub staging_prefix: String,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default = "VersionRule::defaults")]
    pub versioned: Vec<VersionRule>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            libraries: default_libraries(),
            manifest: default_manifest(),
            staging_prefix: default_staging_prefix(),
            match_mode: MatchMode::default(),
            versioned: VersionRule::defaults(),
        }
    }
}

fn default_primary() -> String {
    DEFAULT_PRIMARY.to_owned()
}

fn default_libraries() -> Vec<String> {
    DEFAULT_LIBRARIES.iter().map(|s| (*s).to_owned()).collect()
}

fn default_manifest() -> String {
    DEFAULT_MANIFEST_NAME.to_owned()
}

fn default_staging_prefix() -> String {
    DEFAULT_STAGING_PREFIX.to_owned()
}

/// Split a whitespace separated load order into logical names.
pub fn parse_library_list(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_owned).collect()
}

impl LoaderConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(input)?;
        file.loader.validate()?;
        Ok(file.loader)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(list) = lookup(NATIVE_LIBS_ENV) {
            self.libraries = parse_library_list(&list);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.libraries.is_empty() {
            return Err(ConfigError::EmptyLibraryList);
        }
        for name in self.libraries.iter().chain(std::iter::once(&self.primary)) {
            validate_logical_name(name)?;
        }
        if !validate_resource_name(&self.manifest) {
            return Err(ConfigError::InvalidValue {
                field: "manifest",
                value: self.manifest.clone(),
            });
        }
        if !validate_resource_name(&self.staging_prefix) {
            return Err(ConfigError::InvalidValue {
                field: "staging_prefix",
                value: self.staging_prefix.clone(),
            });
        }
        for rule in &self.versioned {
            if rule.prefix.is_empty() || !validate_resource_name(&rule.version) {
                return Err(ConfigError::InvalidValue {
                    field: "versioned",
                    value: format!("{}={}", rule.prefix, rule.version),
                });
            }
        }
        Ok(())
    }
}

/// Logical names are bare library names. Platform filenames are derived from
/// them, so a name already carrying a platform suffix is rejected.
fn validate_logical_name(name: &str) -> Result<(), ConfigError> {
    let has_platform_suffix = [".dll", ".dylib", ".so"]
        .iter()
        .any(|suffix| name.ends_with(suffix))
        || name.contains(".so.");
    if !validate_resource_name(name) || has_platform_suffix {
        return Err(ConfigError::InvalidLibraryName(name.to_owned()));
    }
    Ok(())
}
