// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource versions and the metadata fetched alongside them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resource version: an ordered map of opaque key/value pairs.
pub type Version = BTreeMap<String, String>;

/// One metadata field reported by a resource alongside a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    pub name: String,
    pub value: String,
}

impl MetadataField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Result of a `get` or `put`: the version plus its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: Version,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataField>,
}

impl VersionInfo {
    pub fn new(version: Version) -> Self {
        Self { version, metadata: Vec::new() }
    }

    pub fn with_metadata(mut self, metadata: Vec<MetadataField>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A version of a named resource, as recorded against a build's inputs
/// and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedResource {
    pub resource: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataField>,
}

impl VersionedResource {
    pub fn new(resource: impl Into<String>, resource_type: impl Into<String>, info: VersionInfo) -> Self {
        Self {
            resource: resource.into(),
            resource_type: resource_type.into(),
            version: info.version,
            metadata: info.metadata,
        }
    }
}

/// Build a [`Version`] from string pairs.
pub fn version<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Version
where
    K: Into<String>,
    V: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
