use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating system family, as far as shared library naming is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Windows,
    MacOs,
    /// Linux and every other Unix-like system using `lib<name>.so`.
    Unix,
}

impl PlatformFamily {
    /// Classify an OS identifier string such as `std::env::consts::OS` or a
    /// `uname`-style name. Matching is case-insensitive and substring based;
    /// `darwin` is checked before `win` since it contains it.
    pub fn from_os_name(os: &str) -> Self {
        let os = os.to_ascii_lowercase();
        if os.contains("mac") || os.contains("darwin") {
            Self::MacOs
        } else if os.contains("win") {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    /// Family of the running host.
    pub fn current() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Unix => "unix",
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win" => Ok(Self::Windows),
            "macos" | "mac" | "darwin" => Ok(Self::MacOs),
            "unix" | "linux" => Ok(Self::Unix),
            other => Err(format!(
                "unknown platform '{other}', expected windows, macos or unix"
            )),
        }
    }
}

/// Platform filename for a logical library name.
///
/// The version token is only meaningful for the Unix family, where it is
/// appended as a soname suffix (`libtbb.so.2`); other families ignore it.
pub fn library_filename(name: &str, family: PlatformFamily, version: Option<&str>) -> String {
    match family {
        PlatformFamily::Windows => format!("{name}.dll"),
        PlatformFamily::MacOs => format!("lib{name}.dylib"),
        PlatformFamily::Unix => match version {
            Some(v) => format!("lib{name}.so.{v}"),
            None => format!("lib{name}.so"),
        },
    }
}

/// Logical names starting with `prefix` may ship only as `lib<name>.so.<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionRule {
    pub prefix: String,
    pub version: String,
}

impl VersionRule {
    pub fn new(prefix: &str, version: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            version: version.to_owned(),
        }
    }

    /// Threading runtime libraries (`tbb`, `tbbmalloc`, ...) ship with a `.2` soname.
    ///
    /// This is the only default. Device plugins or other libraries added to
    /// `loader.libraries` that ship only under a versioned soname need their
    /// own `[[loader.versioned]]` entry.
    pub fn defaults() -> Vec<Self> {
        vec![Self::new("tbb", "2")]
    }
}

/// A logical library and the filenames it may be staged under, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibrarySpec {
    pub name: String,
    pub family: PlatformFamily,
    pub candidates: Vec<String>,
}

impl LibrarySpec {
    pub fn derive(name: &str, family: PlatformFamily, rules: &[VersionRule]) -> Self {
        let mut candidates = vec![library_filename(name, family, None)];
        if family == PlatformFamily::Unix {
            if let Some(rule) = rules.iter().find(|r| name.starts_with(r.prefix.as_str())) {
                candidates.push(library_filename(name, family, Some(&rule.version)));
            }
        }
        Self {
            name: name.to_owned(),
            family,
            candidates,
        }
    }

    #[inline]
    pub fn primary_filename(&self) -> &str {
        &self.candidates[0]
    }

    #[inline]
    pub fn versioned_filename(&self) -> Option<&str> {
        self.candidates.get(1).map(String::as_str)
    }
}
