//! Operating system identifiers and the box images they map to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in system id → Vagrant box mapping
const BUILTIN_SYSTEMS: &[(&str, &str)] = &[
    ("debian11", "debian/bullseye64"),
    ("debian12", "debian/bookworm64"),
    ("ubuntu20_04", "normation/ubuntu-20-04-64"),
    ("ubuntu22_04", "ubuntu/jammy64"),
];

/// Immutable mapping from system id to box image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTable {
    images: BTreeMap<String, String>,
}

impl SystemTable {
    /// The built-in table.
    pub fn builtin() -> Self {
        Self {
            images: BUILTIN_SYSTEMS
                .iter()
                .map(|(id, image)| ((*id).to_string(), (*image).to_string()))
                .collect(),
        }
    }

    /// The built-in table extended (or overridden) by `extra` entries.
    pub fn with_overrides<'a, I>(extra: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut table = Self::builtin();
        for (id, image) in extra {
            log::debug!("System override: {id} -> {image}");
            table.images.insert(id.clone(), image.clone());
        }
        table
    }

    /// Box image for a system id.
    pub fn image(&self, system: &str) -> Option<&str> {
        self.images.get(system).map(String::as_str)
    }

    pub fn contains(&self, system: &str) -> bool {
        self.images.contains_key(system)
    }

    /// All known system ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }
}

impl Default for SystemTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Operating system family, derived from the system id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Linux,
    Windows,
    Solaris,
}

impl OsFamily {
    /// Classify a system id (`win*` → Windows, `solaris*` → Solaris).
    pub fn of(system: &str) -> Self {
        let system = system.to_ascii_lowercase();
        if system.starts_with("win") {
            Self::Windows
        } else if system.starts_with("solaris") {
            Self::Solaris
        } else {
            Self::Linux
        }
    }
}

/// How to react to a system id missing from the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Log a warning and leave the machine without a box
    #[default]
    Warn,
    /// Abort configuration
    Error,
}
