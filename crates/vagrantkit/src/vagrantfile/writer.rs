//! Writer for generating Vagrantfile content.
//!
//! Produces a self-contained `Vagrantfile` with one `config.vm.define`
//! block per machine, in definition order.

use super::ruby;
use crate::types::{AnsibleProvisioner, Config, Machine, Network, Provisioner, VirtualBox};
use std::fmt::Write;
use std::path::Path;

/// Options for writing a Vagrantfile.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Comment lines placed after the editor modelines
    pub banner: Vec<String>,
}

/// Write a configuration to a file.
pub fn write_file(config: &Config, path: &Path, options: &WriteOptions) -> std::io::Result<()> {
    let content = write_string(config, options);
    std::fs::write(path, content)
}

/// Write a configuration to a string.
pub fn write_string(config: &Config, options: &WriteOptions) -> String {
    let mut output = String::new();

    writeln!(output, "# -*- mode: ruby -*-").unwrap();
    writeln!(output, "# vi: set ft=ruby :").unwrap();
    for line in &options.banner {
        writeln!(output, "# {line}").unwrap();
    }
    writeln!(output).unwrap();

    writeln!(output, "Vagrant.configure(\"2\") do |config|").unwrap();
    for (i, machine) in config.machines.iter().enumerate() {
        if i > 0 {
            writeln!(output).unwrap();
        }
        write_machine(&mut output, machine);
    }
    writeln!(output, "end").unwrap();

    output
}

/// Write a single `config.vm.define` block.
fn write_machine(output: &mut String, machine: &Machine) {
    writeln!(
        output,
        "  config.vm.define {} do |cfg|",
        ruby::string(&machine.name)
    )
    .unwrap();

    if let Some(image) = &machine.box_image {
        writeln!(output, "    cfg.vm.box = {}", ruby::string(image)).unwrap();
    }

    for folder in &machine.synced_folders {
        writeln!(
            output,
            "    cfg.vm.synced_folder {}, {}, disabled: {}, SharedFoldersEnableSymlinksCreate: {}",
            ruby::string(&folder.source),
            ruby::string(&folder.destination),
            folder.disabled,
            folder.symlinks_create
        )
        .unwrap();
    }

    for provisioner in &machine.provisioners {
        match provisioner {
            Provisioner::Ansible(ansible) => write_ansible(output, provisioner.kind(), ansible),
        }
    }

    if let Some(vb) = &machine.provider {
        write_virtualbox(output, vb);
    }

    for network in &machine.networks {
        match network {
            Network::ForwardedPort(port) => writeln!(
                output,
                "    cfg.vm.network :forwarded_port, guest: {}, host: {}",
                port.guest, port.host
            )
            .unwrap(),
            Network::PrivateNetwork { ip } => writeln!(
                output,
                "    cfg.vm.network :private_network, ip: {}",
                ruby::string(&ip.to_string())
            )
            .unwrap(),
        }
    }

    if let Some(hostname) = &machine.hostname {
        writeln!(output, "    cfg.vm.hostname = {}", ruby::string(hostname)).unwrap();
    }

    if let Some(insert_key) = machine.ssh.insert_key {
        writeln!(output, "    cfg.ssh.insert_key = {insert_key}").unwrap();
    }
    if let Some(username) = &machine.ssh.username {
        writeln!(output, "    cfg.ssh.username = {}", ruby::string(username)).unwrap();
    }

    writeln!(output, "  end").unwrap();
}

/// Write a `cfg.vm.provision "ansible"` block.
fn write_ansible(output: &mut String, kind: &str, ansible: &AnsibleProvisioner) {
    writeln!(output, "    cfg.vm.provision {} do |ansible|", ruby::string(kind)).unwrap();
    writeln!(output, "      ansible.become = {}", ansible.escalate).unwrap();

    if let Some(mode) = &ansible.compatibility_mode {
        writeln!(output, "      ansible.compatibility_mode = {}", ruby::string(mode)).unwrap();
    }

    if !ansible.extra_vars.is_empty() {
        let vars = serde_json::Value::Object(ansible.extra_vars.clone());
        writeln!(output, "      ansible.extra_vars = {}", ruby::value(&vars)).unwrap();
    }

    writeln!(output, "      ansible.verbose = {}", ansible.verbose).unwrap();

    if !ansible.groups.is_empty() {
        let groups: Vec<String> = ansible
            .groups
            .iter()
            .map(|(group, members)| {
                format!("{} => {}", ruby::string(group), ruby::string_array(members))
            })
            .collect();
        writeln!(output, "      ansible.groups = {{ {} }}", groups.join(", ")).unwrap();
    }

    writeln!(output, "      ansible.playbook = {}", ruby::string(&ansible.playbook)).unwrap();
    writeln!(output, "    end").unwrap();
}

/// Write a `cfg.vm.provider :virtualbox` block.
fn write_virtualbox(output: &mut String, vb: &VirtualBox) {
    writeln!(output, "    cfg.vm.provider :virtualbox do |vm|").unwrap();

    for customization in &vb.customizations {
        let mut parts = vec![format!("'{}'", customization.command), ":id".to_string()];
        parts.extend(customization.args.iter().map(|arg| ruby::string(arg)));
        writeln!(output, "      vm.customize [{}]", parts.join(", ")).unwrap();
    }

    if let Some(name) = &vb.name {
        writeln!(output, "      vm.name = {}", ruby::string(name)).unwrap();
    }
    if let Some(memory) = vb.memory {
        writeln!(output, "      vm.memory = {memory}").unwrap();
    }
    if let Some(cpus) = vb.cpus {
        writeln!(output, "      vm.cpus = {cpus}").unwrap();
    }

    writeln!(output, "    end").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Customization, SyncedFolder};
    use serde_json::json;
    use std::net::Ipv4Addr;

    fn sample_config() -> Config {
        let mut config = Config::new();
        let machine = config.define("server1");
        machine
            .set_box(Some("debian/bookworm64"))
            .synced_folder(SyncedFolder::disabled_default());
        let mut ansible = AnsibleProvisioner::new("playbook.yml")
            .with_extra_var("datastate", json!({"hosts": {}}))
            .with_group("rudder-server", ["server1"]);
        ansible.escalate = true;
        ansible.verbose = true;
        ansible.compatibility_mode = Some("2.0".to_string());
        machine.provision(Provisioner::Ansible(ansible));
        let vb = machine.virtualbox();
        vb.customize(Customization::cable_connected());
        vb.name = Some("Server One".to_string());
        vb.memory = Some(1024);
        vb.cpus = Some(1);
        machine
            .forward_port(80, 8080)
            .private_network(Ipv4Addr::new(10, 0, 0, 2))
            .set_hostname("srv1");
        config
    }

    #[test]
    fn test_write_empty_config() {
        let output = write_string(&Config::new(), &WriteOptions::default());
        assert_eq!(
            output,
            "# -*- mode: ruby -*-\n# vi: set ft=ruby :\n\nVagrant.configure(\"2\") do |config|\nend\n"
        );
    }

    #[test]
    fn test_write_full_machine() {
        let output = write_string(&sample_config(), &WriteOptions::default());
        let expected = r#"# -*- mode: ruby -*-
# vi: set ft=ruby :

Vagrant.configure("2") do |config|
  config.vm.define "server1" do |cfg|
    cfg.vm.box = "debian/bookworm64"
    cfg.vm.synced_folder "shared", "/vagrant", disabled: true, SharedFoldersEnableSymlinksCreate: false
    cfg.vm.provision "ansible" do |ansible|
      ansible.become = true
      ansible.compatibility_mode = "2.0"
      ansible.extra_vars = { "datastate" => { "hosts" => {} } }
      ansible.verbose = true
      ansible.groups = { "rudder-server" => ["server1"] }
      ansible.playbook = "playbook.yml"
    end
    cfg.vm.provider :virtualbox do |vm|
      vm.customize ['modifyvm', :id, "--cableconnected1", "on"]
      vm.name = "Server One"
      vm.memory = 1024
      vm.cpus = 1
    end
    cfg.vm.network :forwarded_port, guest: 80, host: 8080
    cfg.vm.network :private_network, ip: "10.0.0.2"
    cfg.vm.hostname = "srv1"
  end
end
"#;
        assert_eq!(output, expected);
    }

    #[test]
    fn test_write_ssh_overrides() {
        let mut config = Config::new();
        let machine = config.define("win");
        machine.ssh.insert_key = Some(false);
        machine.ssh.username = Some("Administrator".to_string());

        let output = write_string(&config, &WriteOptions::default());
        assert!(output.contains("    cfg.ssh.insert_key = false\n"));
        assert!(output.contains("    cfg.ssh.username = \"Administrator\"\n"));
        assert!(!output.contains("cfg.vm.box"));
    }

    #[test]
    fn test_write_banner_and_separation() {
        let mut config = Config::new();
        config.define("a");
        config.define("b");
        let options = WriteOptions {
            banner: vec!["Generated file".to_string()],
        };

        let output = write_string(&config, &options);
        assert!(output.starts_with("# -*- mode: ruby -*-\n# vi: set ft=ruby :\n# Generated file\n\n"));
        assert!(output.contains("  end\n\n  config.vm.define \"b\" do |cfg|\n"));
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Vagrantfile");
        write_file(&sample_config(), &path, &WriteOptions::default()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("config.vm.define \"server1\""));
    }
}
