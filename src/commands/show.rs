//! `rtf show` - print the machines one platform declares

use anyhow::{Context as AnyhowContext, Result};
use vagrantkit::{Config, Machine, Network};

use crate::Context;
use crate::cli::ShowArgs;
use crate::configurator::Configurator;
use crate::ui;

pub fn run(ctx: &Context, args: ShowArgs) -> Result<()> {
    let config = configure(ctx, &args.platform)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?;
        println!("{json}");
        return Ok(());
    }

    ui::header(&format!(
        "Platform {} ({})",
        args.platform,
        ui::count(config.machines.len(), "machine")
    ));
    for machine in &config.machines {
        print_machine(machine, ctx.verbose > 0);
    }

    // Unknown systems were already reported while configuring
    if config.machines.iter().any(|m| m.box_image.is_none()) {
        let systems = ctx.systems();
        let known: Vec<&str> = systems.ids().collect();
        println!();
        ui::dim(&format!("Known systems: {}", known.join(", ")));
    }

    Ok(())
}

/// Declare the machines of one platform of the state file.
fn configure(ctx: &Context, platform: &str) -> Result<Config> {
    let systems = ctx.systems();
    let configurator = Configurator::new(&systems, &ctx.settings.provisioning, ctx.strictness());

    let mut config = Config::new();
    configurator.configure(&mut config, &ctx.state_path(), platform)?;
    Ok(config)
}

fn print_machine(machine: &Machine, details: bool) {
    ui::section(&machine.name);
    ui::kv("box", machine.box_image.as_deref().unwrap_or("-"));
    ui::kv("hostname", machine.hostname.as_deref().unwrap_or("-"));

    if let Some(vb) = &machine.provider {
        if let Some(name) = &vb.name {
            ui::kv("vm name", name);
        }
        if let Some(memory) = vb.memory {
            ui::kv("memory", &format!("{memory} MB"));
        }
        if let Some(cpus) = vb.cpus {
            ui::kv("cpus", &cpus.to_string());
        }
    }

    for network in &machine.networks {
        match network {
            Network::PrivateNetwork { ip } => ui::kv("ip", &ip.to_string()),
            Network::ForwardedPort(port) => {
                ui::kv("forward", &format!("{} -> {}", port.guest, port.host));
            }
        }
    }

    if let Some(username) = &machine.ssh.username {
        ui::kv("ssh user", username);
    }

    if let Some(ansible) = machine.ansible() {
        for (group, members) in &ansible.groups {
            ui::kv("group", &format!("{group} [{}]", members.join(", ")));
        }
        if details {
            ui::kv("playbook", &ansible.playbook);
            let vars: Vec<&str> = ansible.extra_vars.keys().map(String::as_str).collect();
            ui::kv("extra vars", &vars.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::Error;
    use std::fs;
    use std::path::Path;

    const STATE: &str = r#"{
  "lab": {"hosts": {
    "lab_agent": {"system": "centos7", "long-name": "lab_agent", "short-name": "agent", "ip": "192.168.0.2", "ram": 256},
    "lab_server": {"system": "debian12", "long-name": "lab_server", "short-name": "server", "ip": "192.168.0.3", "ram": 2048, "rudder-setup": "server", "http-port": 8080, "https-port": 8081}
  }}
}"#;

    fn context(root: &Path, strict: bool) -> Context {
        Context {
            verbose: 1,
            quiet: false,
            strict,
            root: root.to_path_buf(),
            settings: Settings::default(),
        }
    }

    fn args(platform: &str) -> ShowArgs {
        ShowArgs {
            platform: platform.to_string(),
            json: false,
        }
    }

    #[test]
    fn test_show_lists_platform() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".rtfstate"), STATE).unwrap();
        let ctx = context(dir.path(), false);

        let config = configure(&ctx, "lab").unwrap();
        assert_eq!(config.machine_names(), vec!["lab_agent", "lab_server"]);

        let agent = config.machine("lab_agent").unwrap();
        assert_eq!(agent.box_image, None);
        assert_eq!(agent.hostname.as_deref(), Some("agent"));

        let server = config.machine("lab_server").unwrap();
        assert_eq!(server.box_image.as_deref(), Some("debian/bookworm64"));
        assert_eq!(server.forwarded_ports().count(), 2);
        assert_eq!(server.ansible().unwrap().group("server"), Some(&["lab_server".to_string()][..]));

        run(&ctx, args("lab")).unwrap();
    }

    #[test]
    fn test_show_unknown_platform() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".rtfstate"), STATE).unwrap();

        let err = run(&context(dir.path(), false), args("prod")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnknownPlatform { .. })
        ));
    }

    #[test]
    fn test_show_strict_rejects_unknown_system() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".rtfstate"), STATE).unwrap();

        let err = run(&context(dir.path(), true), args("lab")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnknownSystem { .. })
        ));
    }
}
