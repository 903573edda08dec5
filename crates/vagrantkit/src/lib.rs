//! # vagrantkit
//!
//! Typed Vagrant configuration graph.
//!
//! This crate provides:
//! - A [`Config`] value mirroring what a `Vagrantfile` declares: machines,
//!   boxes, VirtualBox settings, networks, ssh overrides and provisioners
//! - Validation of problems Vagrant would only report at `vagrant up`
//! - Rendering of the graph as a self-contained `Vagrantfile`
//!
//! ## Example
//!
//! ```
//! use vagrantkit::{AnsibleProvisioner, Config, Provisioner, SyncedFolder};
//! use std::net::Ipv4Addr;
//!
//! let mut config = Config::new();
//! let machine = config.define("web");
//! machine
//!     .set_box(Some("debian/bookworm64"))
//!     .synced_folder(SyncedFolder::disabled_default())
//!     .private_network(Ipv4Addr::new(192, 168, 0, 2))
//!     .set_hostname("web")
//!     .provision(Provisioner::Ansible(AnsibleProvisioner::new("playbook.yml")));
//!
//! let vagrantfile = vagrantkit::render(&config, &Default::default()).unwrap();
//! assert!(vagrantfile.contains("config.vm.define \"web\""));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;
pub mod vagrantfile;

pub use error::{Error, Result};
pub use types::{
    AnsibleProvisioner, Config, Customization, ForwardedPort, Machine, Network, Provisioner,
    SshSettings, SyncedFolder, VirtualBox,
};
pub use vagrantfile::WriteOptions;

use std::path::Path;

/// Validate a configuration and render it as Vagrantfile source.
pub fn render(config: &Config, options: &WriteOptions) -> Result<String> {
    config.validate()?;
    Ok(vagrantfile::write_string(config, options))
}

/// Validate a configuration and write it to `path`.
pub fn write(config: &Config, path: &Path, options: &WriteOptions) -> Result<()> {
    config.validate()?;
    vagrantfile::write_file(config, path, options)?;
    log::debug!(
        "Wrote {} machine(s) to {}",
        config.machines.len(),
        path.display()
    );
    Ok(())
}
