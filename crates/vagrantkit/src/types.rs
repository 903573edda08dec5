//! Core types for the Vagrant configuration graph.
//!
//! A [`Config`] mirrors the object a `Vagrantfile` mutates: a list of
//! named machines, each carrying its box, provider options, networks,
//! ssh settings and provisioners.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Root of the configuration graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Machines in definition order
    pub machines: Vec<Machine>,
}

impl Config {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a machine by name.
    ///
    /// Redefining an existing name resets that machine in place, keeping its
    /// position, so declaring the same inventory twice yields the same graph.
    pub fn define(&mut self, name: impl Into<String>) -> &mut Machine {
        let name = name.into();
        let index = match self.machines.iter().position(|m| m.name == name) {
            Some(index) => {
                log::debug!("Redefining machine '{name}'");
                self.machines[index] = Machine::new(name);
                index
            }
            None => {
                self.machines.push(Machine::new(name));
                self.machines.len() - 1
            }
        };
        &mut self.machines[index]
    }

    /// Find a machine by name.
    pub fn machine(&self, name: &str) -> Option<&Machine> {
        self.machines.iter().find(|m| m.name == name)
    }

    /// Names of all defined machines, in definition order.
    pub fn machine_names(&self) -> Vec<&str> {
        self.machines.iter().map(|m| m.name.as_str()).collect()
    }

    /// Check the graph for problems Vagrant would only report at `vagrant up`.
    pub fn validate(&self) -> Result<()> {
        let mut claimed: HashMap<u16, &str> = HashMap::new();

        for machine in &self.machines {
            if machine.name.trim().is_empty() {
                return Err(Error::EmptyMachineName);
            }

            for port in machine.forwarded_ports() {
                if let Some(first) = claimed.insert(port.host, &machine.name) {
                    return Err(Error::PortCollision {
                        port: port.host,
                        first: first.to_string(),
                        second: machine.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// A single `config.vm.define` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    /// Machine name as passed to `config.vm.define`
    pub name: String,
    /// Box reference (`cfg.vm.box`), unset when the system is unknown
    pub box_image: Option<String>,
    /// Guest hostname (`cfg.vm.hostname`)
    pub hostname: Option<String>,
    /// Synced folder overrides
    pub synced_folders: Vec<SyncedFolder>,
    /// VirtualBox provider block
    pub provider: Option<VirtualBox>,
    /// Network interfaces and port forwards, in declaration order
    pub networks: Vec<Network>,
    /// SSH overrides
    pub ssh: SshSettings,
    /// Provisioners, run in declaration order
    pub provisioners: Vec<Provisioner>,
}

impl Machine {
    /// Create a machine with nothing configured.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            box_image: None,
            hostname: None,
            synced_folders: Vec::new(),
            provider: None,
            networks: Vec::new(),
            ssh: SshSettings::default(),
            provisioners: Vec::new(),
        }
    }

    /// Set the box reference.
    pub fn set_box(&mut self, image: Option<impl Into<String>>) -> &mut Self {
        self.box_image = image.map(Into::into);
        self
    }

    /// Set the guest hostname.
    pub fn set_hostname(&mut self, hostname: impl Into<String>) -> &mut Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Add a synced folder entry.
    pub fn synced_folder(&mut self, folder: SyncedFolder) -> &mut Self {
        self.synced_folders.push(folder);
        self
    }

    /// Get the VirtualBox provider block, creating it if needed.
    pub fn virtualbox(&mut self) -> &mut VirtualBox {
        self.provider.get_or_insert_with(VirtualBox::default)
    }

    /// Forward a guest port to a host port.
    pub fn forward_port(&mut self, guest: u16, host: u16) -> &mut Self {
        self.networks
            .push(Network::ForwardedPort(ForwardedPort { guest, host }));
        self
    }

    /// Attach a host-only interface with a static address.
    pub fn private_network(&mut self, ip: Ipv4Addr) -> &mut Self {
        self.networks.push(Network::PrivateNetwork { ip });
        self
    }

    /// Register a provisioner.
    pub fn provision(&mut self, provisioner: Provisioner) -> &mut Self {
        self.provisioners.push(provisioner);
        self
    }

    /// All port forwarding rules of this machine.
    pub fn forwarded_ports(&self) -> impl Iterator<Item = &ForwardedPort> {
        self.networks.iter().filter_map(|n| match n {
            Network::ForwardedPort(port) => Some(port),
            Network::PrivateNetwork { .. } => None,
        })
    }

    /// The private network address, if one is attached.
    pub fn private_ip(&self) -> Option<Ipv4Addr> {
        self.networks.iter().find_map(|n| match n {
            Network::PrivateNetwork { ip } => Some(*ip),
            Network::ForwardedPort(_) => None,
        })
    }

    /// The Ansible provisioner, if one is registered.
    pub fn ansible(&self) -> Option<&AnsibleProvisioner> {
        self.provisioners.iter().find_map(|p| match p {
            Provisioner::Ansible(ansible) => Some(ansible),
        })
    }
}

/// A `cfg.vm.synced_folder` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedFolder {
    /// Path on the host
    pub source: String,
    /// Mount point in the guest
    pub destination: String,
    /// Whether the folder is disabled
    pub disabled: bool,
    /// VirtualBox `SharedFoldersEnableSymlinksCreate` option
    pub symlinks_create: bool,
}

impl SyncedFolder {
    /// The default `shared` → `/vagrant` folder, disabled, without symlink creation.
    pub fn disabled_default() -> Self {
        Self {
            source: "shared".to_string(),
            destination: "/vagrant".to_string(),
            disabled: true,
            symlinks_create: false,
        }
    }
}

/// `cfg.vm.provider :virtualbox` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualBox {
    /// `VBoxManage` customizations, applied in order
    pub customizations: Vec<Customization>,
    /// Display name in VirtualBox
    pub name: Option<String>,
    /// Memory in MB
    pub memory: Option<u32>,
    /// Number of virtual CPUs
    pub cpus: Option<u32>,
}

impl VirtualBox {
    /// Add a `VBoxManage` customization.
    pub fn customize(&mut self, customization: Customization) -> &mut Self {
        self.customizations.push(customization);
        self
    }
}

/// A `vm.customize` entry: a `VBoxManage` subcommand run against the machine id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customization {
    /// `VBoxManage` subcommand, e.g. `modifyvm`
    pub command: String,
    /// Arguments following the machine id
    pub args: Vec<String>,
}

impl Customization {
    /// A `modifyvm` customization.
    pub fn modifyvm<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: "modifyvm".to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Ensure the first network cable is connected.
    pub fn cable_connected() -> Self {
        Self::modifyvm(["--cableconnected1", "on"])
    }
}

/// A `cfg.vm.network` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Network {
    /// `:forwarded_port`
    ForwardedPort(ForwardedPort),
    /// `:private_network` with a static address
    PrivateNetwork {
        /// Static address of the interface
        ip: Ipv4Addr,
    },
}

/// A guest → host port forwarding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedPort {
    /// Port inside the guest
    pub guest: u16,
    /// Port on the host
    pub host: u16,
}

/// `cfg.ssh` overrides. Unset fields keep Vagrant's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshSettings {
    /// Whether Vagrant replaces the insecure key on first boot
    pub insert_key: Option<bool>,
    /// Login user
    pub username: Option<String>,
}

impl SshSettings {
    /// Whether any override is set.
    pub fn is_empty(&self) -> bool {
        self.insert_key.is_none() && self.username.is_none()
    }
}

/// A `cfg.vm.provision` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Provisioner {
    /// Ansible run from the host
    Ansible(AnsibleProvisioner),
}

impl Provisioner {
    /// Provisioner type name as used in `cfg.vm.provision "<type>"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ansible(_) => "ansible",
        }
    }
}

/// Options of the `ansible` provisioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsibleProvisioner {
    /// Playbook path, relative to the Vagrantfile
    pub playbook: String,
    /// Run with privilege escalation (`ansible.become`)
    pub escalate: bool,
    /// `ansible.compatibility_mode`
    pub compatibility_mode: Option<String>,
    /// Variables passed with `--extra-vars`
    pub extra_vars: serde_json::Map<String, serde_json::Value>,
    /// `ansible.verbose`
    pub verbose: bool,
    /// Inventory groups: group name → member machines
    pub groups: Vec<(String, Vec<String>)>,
}

impl AnsibleProvisioner {
    /// Create a provisioner running the given playbook with Vagrant's defaults.
    pub fn new(playbook: impl Into<String>) -> Self {
        Self {
            playbook: playbook.into(),
            escalate: false,
            compatibility_mode: None,
            extra_vars: serde_json::Map::new(),
            verbose: false,
            groups: Vec::new(),
        }
    }

    /// Set an extra variable.
    pub fn with_extra_var(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_vars.insert(key.into(), value);
        self
    }

    /// Add an inventory group.
    pub fn with_group<I, S>(mut self, group: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .push((group.into(), members.into_iter().map(Into::into).collect()));
        self
    }

    /// Members of a group, if declared.
    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(group, _)| group == name)
            .map(|(_, members)| members.as_slice())
    }
}
