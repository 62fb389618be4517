//! Endpoint addresses
//!
//! An endpoint address names one container runtime backend, usually a unix
//! socket such as `unix:///run/containerd/containerd.sock`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

const UNIX_SCHEME: &str = "unix://";

/// Non-empty address identifying a runtime backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointAddress(String);

impl EndpointAddress {
    /// Validate and wrap an address
    pub fn new(address: impl Into<String>) -> Result<Self, RegistryError> {
        let address = address.into();
        if address.is_empty() {
            return Err(RegistryError::InvalidAddress);
        }
        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem path of a `unix://` address
    pub fn socket_path(&self) -> Option<&str> {
        self.0
            .strip_prefix(UNIX_SCHEME)
            .filter(|path| !path.is_empty())
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EndpointAddress {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EndpointAddress {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EndpointAddress> for String {
    fn from(value: EndpointAddress) -> Self {
        value.0
    }
}

impl AsRef<str> for EndpointAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
