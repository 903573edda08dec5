//! Translation of state hosts into Vagrant machine definitions.
//!
//! [`Configurator::configure`] declares every host of one platform on a
//! [`vagrantkit::Config`]: a machine per host, the Ansible provisioning
//! step, then box, VirtualBox, network and ssh settings.

use anyhow::Result;
use std::path::Path;
use vagrantkit::{
    AnsibleProvisioner, Config, Customization, Machine, Provisioner, SyncedFolder,
};

use crate::config::ProvisioningSettings;
use crate::error::Error;
use crate::state::{Datastate, HostSpec};
use crate::systems::{OsFamily, Strictness, SystemTable};

/// Login used on Windows boxes, which don't ship the vagrant user
const WINDOWS_USERNAME: &str = "Administrator";

/// Extra variable carrying the platform record
const DATASTATE_VAR: &str = "datastate";

pub struct Configurator<'a> {
    systems: &'a SystemTable,
    provisioning: &'a ProvisioningSettings,
    strictness: Strictness,
}

impl<'a> Configurator<'a> {
    pub fn new(
        systems: &'a SystemTable,
        provisioning: &'a ProvisioningSettings,
        strictness: Strictness,
    ) -> Self {
        Self {
            systems,
            provisioning,
            strictness,
        }
    }

    /// Load the state file and declare every host of `platform_name`.
    ///
    /// Fails with `MissingStateFile` before touching `config` if the state
    /// file is absent.
    pub fn configure(&self, config: &mut Config, state_path: &Path, platform_name: &str) -> Result<()> {
        let state = Datastate::load(state_path)?;
        self.configure_platform(config, &state, platform_name)
    }

    /// Declare every platform of the state document, in document order.
    pub fn configure_all(&self, config: &mut Config, state: &Datastate) -> Result<()> {
        for name in state.platforms.keys() {
            self.configure_platform(config, state, name)?;
        }
        Ok(())
    }

    /// Declare every host of one platform of an already loaded state.
    ///
    /// The platform is validated as a whole first, so a bad host leaves
    /// `config` untouched.
    pub fn configure_platform(
        &self,
        config: &mut Config,
        state: &Datastate,
        platform_name: &str,
    ) -> Result<()> {
        let platform = state.platform(platform_name)?;
        platform.validate()?;
        for (host_name, host) in platform.hosts.iter() {
            self.check_system(host_name, host)?;
        }

        let datastate = platform.to_value()?;
        for (host_name, host) in platform.hosts.iter() {
            let machine = config.define(host_name);
            machine.synced_folder(SyncedFolder::disabled_default());
            machine.provision(Provisioner::Ansible(self.provisioner(
                host_name,
                host,
                &datastate,
            )));
            self.apply(machine, host_name, host)?;
        }

        log::info!(
            "Configured platform '{}' ({} machine(s))",
            platform_name,
            platform.hosts.len()
        );
        Ok(())
    }

    /// Box, VirtualBox, network and ssh settings of one machine.
    pub fn apply(&self, machine: &mut Machine, host_name: &str, host: &HostSpec) -> Result<()> {
        machine.set_box(self.systems.image(&host.system));

        let vb = machine.virtualbox();
        vb.customize(Customization::cable_connected());
        vb.name = Some(host.long_name.clone());
        vb.memory = Some(host.ram);
        vb.cpus = Some(host.cpu_count());

        if host.is_server() {
            let http = host
                .http_port
                .ok_or_else(|| missing_field(host_name, "http-port"))?;
            let https = host
                .https_port
                .ok_or_else(|| missing_field(host_name, "https-port"))?;
            machine.forward_port(80, http).forward_port(443, https);
        }

        let ip = host.ip.ok_or_else(|| missing_field(host_name, "ip"))?;
        machine
            .private_network(ip)
            .set_hostname(host.short_name.as_str());

        if host.family() == OsFamily::Windows {
            machine.ssh.insert_key = Some(false);
            machine.ssh.username = Some(WINDOWS_USERNAME.to_string());
        }

        Ok(())
    }

    /// The Ansible step of one host.
    fn provisioner(
        &self,
        host_name: &str,
        host: &HostSpec,
        datastate: &serde_json::Value,
    ) -> AnsibleProvisioner {
        let mut ansible = AnsibleProvisioner::new(self.provisioning.playbook.as_str())
            .with_extra_var(DATASTATE_VAR, datastate.clone());
        ansible.escalate = self.provisioning.escalate;
        ansible.compatibility_mode = Some(self.provisioning.compatibility_mode.clone());
        ansible.verbose = self.provisioning.verbose;

        if let Some(setup) = &host.rudder_setup {
            ansible = ansible.with_group(setup.tag(), [host_name]);
        }
        ansible
    }

    fn check_system(&self, host_name: &str, host: &HostSpec) -> Result<()> {
        if self.systems.contains(&host.system) {
            return Ok(());
        }

        match self.strictness {
            Strictness::Warn => {
                log::warn!("Unknown system {} for host '{}'", host.system, host_name);
                Ok(())
            }
            Strictness::Error => Err(Error::UnknownSystem {
                host: host_name.to_string(),
                system: host.system.clone(),
            }
            .into()),
        }
    }
}

fn missing_field(host_name: &str, field: &'static str) -> Error {
    Error::MissingField {
        host: host_name.to_string(),
        field,
    }
}

// ============================================================================
// Tests
// ============================================================================
