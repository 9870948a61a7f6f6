//! Common types used throughout Archiva.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of storage backend a configuration describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Local filesystem under a base directory.
    #[serde(rename = "LOCAL")]
    Local,
    /// FTP server.
    #[serde(rename = "FTP")]
    Ftp,
    /// SMB/CIFS share.
    #[serde(rename = "SMB")]
    Smb,
}

impl BackendKind {
    /// Wire name as stored in configuration records.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "LOCAL",
            BackendKind::Ftp => "FTP",
            BackendKind::Smb => "SMB",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "LOCAL" => Ok(BackendKind::Local),
            "FTP" => Ok(BackendKind::Ftp),
            "SMB" => Ok(BackendKind::Smb),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown backend kind: {}",
                other
            ))),
        }
    }
}

/// A provider-root-relative path, independent of backend addressing.
///
/// Always forward-slash separated with no leading slash. Each backend
/// variant translates it into its native scheme: native join for local
/// disk, POSIX join for FTP, backslash UNC join for SMB.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativePath {
    components: Vec<String>,
}

impl RelativePath {
    /// The provider root (empty path).
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Create a path from string components.
    ///
    /// # Errors
    /// - Returns error if any component is empty, `..`, or contains a separator
    pub fn from_components(components: Vec<String>) -> crate::Result<Self> {
        for comp in &components {
            if comp.is_empty() {
                return Err(crate::Error::InvalidInput(
                    "Path component cannot be empty".to_string(),
                ));
            }
            if comp == ".." || comp == "." {
                return Err(crate::Error::InvalidInput(
                    "Path component cannot be a dot segment".to_string(),
                ));
            }
            if comp.contains('/') || comp.contains('\\') {
                return Err(crate::Error::InvalidInput(
                    "Path component cannot contain separators".to_string(),
                ));
            }
        }
        Ok(Self { components })
    }

    /// Parse a forward-slash path string. Leading and trailing slashes are
    /// tolerated; `""` and `"/"` parse to the root.
    pub fn parse(path: &str) -> crate::Result<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let components: Vec<String> = trimmed.split('/').map(String::from).collect();
        Self::from_components(components)
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut components = self.components.clone();
            components.pop();
            Some(Self { components })
        }
    }

    /// Get the final component.
    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Join this path with a child component.
    pub fn join(&self, child: &str) -> crate::Result<Self> {
        let mut components = self.components.clone();
        components.push(child.to_string());
        Self::from_components(components)
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Forward-slash string form (empty string for the root).
    pub fn as_str_path(&self) -> String {
        self.components.join("/")
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_path())
    }
}
