use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::systems::{Strictness, SystemTable};

// ============================================================================
// Settings
// ============================================================================

/// Project settings, read from `rtf.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// State document, relative to the project root
    pub state_file: String,
    /// Generated Vagrantfile, relative to the project root
    pub vagrantfile: String,
    /// Directory holding `<platform>.json` definitions
    pub platforms_dir: String,
    /// Reaction to a system id missing from the systems table
    pub unknown_system: Strictness,
    pub provisioning: ProvisioningSettings,
    /// Extra or overriding system id → box entries
    pub systems: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_file: ".rtfstate".to_string(),
            vagrantfile: "Vagrantfile".to_string(),
            platforms_dir: "platforms".to_string(),
            unknown_system: Strictness::default(),
            provisioning: ProvisioningSettings::default(),
            systems: BTreeMap::new(),
        }
    }
}

/// Options handed to the Ansible provisioner of every machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisioningSettings {
    pub playbook: String,
    pub compatibility_mode: String,
    /// Run the playbook with privilege escalation
    #[serde(rename = "become")]
    pub escalate: bool,
    pub verbose: bool,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            playbook: "playbook.yml".to_string(),
            compatibility_mode: "2.0".to_string(),
            escalate: true,
            verbose: true,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read settings file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// The systems table: built-in entries plus `[systems]` overrides.
    pub fn systems_table(&self) -> SystemTable {
        SystemTable::with_overrides(&self.systems)
    }
}

// ============================================================================
// Tests
// ============================================================================
