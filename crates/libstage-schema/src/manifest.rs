use serde::Serialize;
use thiserror::Error;

/// Name of the resource listing looked up in a bundle when none is configured.
pub const DEFAULT_MANIFEST_NAME: &str = "resources_list.txt";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("invalid resource name on line {line}: '{entry}', expected [A-Za-z0-9._-]")]
    InvalidEntry { line: usize, entry: String },
    #[error("resource listing is not valid UTF-8: {0}")]
    NotUtf8(String),
}

/// Check a single resource name against the bundle filename charset.
///
/// `.` and `..` are rejected as well: they are made of allowed characters
/// but would name the staging directory or its parent.
pub fn validate_resource_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
}

/// Ordered list of resource names shipped in a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceManifest {
    entries: Vec<String>,
}

impl ResourceManifest {
    /// Parse a newline separated listing. Every entry is validated before the
    /// listing is accepted, so a bad entry anywhere rejects the whole listing.
    pub fn parse(input: &str) -> Result<Self, ManifestError> {
        let mut entries = Vec::new();
        for (idx, raw) in input.lines().enumerate() {
            let entry = raw.strip_suffix('\r').unwrap_or(raw);
            if entry.is_empty() {
                continue;
            }
            if !validate_resource_name(entry) {
                return Err(ManifestError::InvalidEntry {
                    line: idx + 1,
                    entry: entry.to_owned(),
                });
            }
            entries.push(entry.to_owned());
        }
        Ok(Self { entries })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ManifestError> {
        let text =
            std::str::from_utf8(bytes).map_err(|e| ManifestError::NotUtf8(e.to_string()))?;
        Self::parse(text)
    }

    #[inline]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}
