//! Value types shared by the monitor and its collaborators

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::Error;

/// Build-unique identifier of one compiled artifact
///
/// Opaque to this crate: the loaded-image extractor produces a GNU build-id
/// (hex) on Linux and the `LC_UUID` on Apple targets, but any stable string
/// works as long as the server records the same value for the build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildIdentity(String);

impl BuildIdentity {
    /// Wrap an identifier, rejecting empty or whitespace-only values
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<account>/<project>` handle naming a project on the server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectHandle {
    account: String,
    project: String,
}

impl ProjectHandle {
    /// Parse a full handle
    ///
    /// Exactly one `/` separating two non-empty segments.
    pub fn parse(full_handle: &str) -> Result<Self, Error> {
        let mut parts = full_handle.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(account), Some(project), None) if !account.is_empty() && !project.is_empty() => {
                Ok(Self {
                    account: account.to_string(),
                    project: project.to_string(),
                })
            }
            _ => Err(Error::malformed_handle(full_handle)),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Re-check the segment invariant
    ///
    /// Services call this before touching the network, since a handle can
    /// reach them through paths other than [`ProjectHandle::parse`].
    pub fn ensure_well_formed(&self) -> Result<(), Error> {
        let valid = |s: &str| !s.is_empty() && !s.contains('/');
        if valid(&self.account) && valid(&self.project) {
            Ok(())
        } else {
            Err(Error::malformed_handle(self.to_string()))
        }
    }
}

impl FromStr for ProjectHandle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.project)
    }
}

/// Latest release the server knows for a project
///
/// Lives for one query only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBuildSummary {
    /// Server-side preview id
    pub id: String,
    /// Human-readable version, if the upload carried one
    pub version: Option<String>,
    /// Identities of every binary already included in this release
    pub known_identities: Vec<BuildIdentity>,
    /// Where a device can install the release from
    pub location: Option<String>,
}

impl RemoteBuildSummary {
    /// Whether the running build is already part of this release
    pub fn includes(&self, identity: &BuildIdentity) -> bool {
        self.known_identities.iter().any(|known| known == identity)
    }
}

/// A newer build the host application can offer to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAvailable {
    /// The preview id
    pub id: String,
    /// The preview version
    pub version: Option<String>,
    /// The URL to open the preview on device
    pub location: Url,
}
