//! `rtf platform` - maintain the platforms of the state file

use anyhow::{Context as AnyhowContext, Result};
use dialoguer::Confirm;

use crate::Context;
use crate::commands::vagrantfile;
use crate::platform;
use crate::state::{Datastate, HostSpec, NamedMap};
use crate::ui;

/// Load definitions, merge them into the state and assign network settings.
pub fn add(ctx: &Context, names: &[String]) -> Result<()> {
    let state_path = ctx.state_path();
    let platforms_dir = ctx.platforms_dir();
    let mut state = Datastate::load_or_default(&state_path)?;

    let mut generated: NamedMap<NamedMap<HostSpec>> = NamedMap::new();
    for name in names {
        let hosts = platform::load(&platforms_dir, name)
            .with_context(|| format!("Could not parse the platform '{name}'"))?;
        generated.insert(name.as_str(), hosts);
    }

    let assignments = state.update(&generated)?;
    if !ctx.quiet {
        for assignment in &assignments {
            ui::info(&assignment.to_string());
        }
    }

    // Nothing is written unless the whole Vagrantfile renders
    let content = vagrantfile::render_all(ctx, &state)?;
    state.save(&state_path)?;
    vagrantfile::replace(ctx, &content)?;

    if !ctx.quiet {
        for name in names {
            let hosts = state.platform(name)?.hosts.len();
            ui::success(&format!("Platform '{name}' ready ({})", ui::count(hosts, "host")));
        }
    }
    Ok(())
}

/// Remove a platform from the state and the Vagrantfile.
pub fn remove(ctx: &Context, name: &str, yes: bool) -> Result<()> {
    let state_path = ctx.state_path();
    let mut state = Datastate::load_or_default(&state_path)?;

    if !state.platforms.contains_key(name) {
        ui::warn(&format!("Platform '{name}' is not in the state file"));
        return Ok(());
    }

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove platform '{name}' from the state file?"))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

        if !confirmed {
            ui::info("Cancelled");
            return Ok(());
        }
    }

    state.remove_platform(name);
    let content = vagrantfile::render_all(ctx, &state)?;
    state.save(&state_path)?;
    vagrantfile::replace(ctx, &content)?;

    ui::success(&format!("Removed platform '{name}'"));
    Ok(())
}

/// List platforms with their host count and subnet.
pub fn list(ctx: &Context) -> Result<()> {
    let state = Datastate::load(&ctx.state_path())?;

    ui::header("Platforms");
    if state.platforms.is_empty() {
        ui::dim("No platform in the state file");
        return Ok(());
    }

    for (name, platform) in state.platforms.iter() {
        let subnet = platform
            .subnet
            .map_or_else(|| "no subnet".to_string(), |s| format!("{s}/24"));
        ui::kv(
            name,
            &format!("{}, {subnet}", ui::count(platform.hosts.len(), "host")),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::Error;
    use std::fs;
    use std::net::Ipv4Addr;
    use std::path::Path;

    const DEFINITION: &str = r#"{
  "default": { "system": "debian12" },
  "server": { "rudder-setup": "server" },
  "agent": { "rudder-setup": "agent" }
}"#;

    fn context(root: &Path) -> Context {
        Context {
            verbose: 0,
            quiet: true,
            strict: false,
            root: root.to_path_buf(),
            settings: Settings::default(),
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("platforms")).unwrap();
        fs::write(dir.path().join("platforms/lab.json"), DEFINITION).unwrap();
        fs::write(dir.path().join("platforms/dev.json"), DEFINITION).unwrap();
        dir
    }

    #[test]
    fn test_add_assigns_and_writes() {
        let dir = project();
        let ctx = context(dir.path());

        add(&ctx, &["lab".to_string()]).unwrap();

        let state = Datastate::load(&ctx.state_path()).unwrap();
        let lab = state.platform("lab").unwrap();
        assert_eq!(lab.subnet, Some(Ipv4Addr::new(192, 168, 0, 0)));

        let server = lab.hosts.get("lab_server").unwrap();
        assert_eq!(server.ip, Some(Ipv4Addr::new(192, 168, 0, 2)));
        assert_eq!(server.http_port, Some(8080));
        assert_eq!(server.https_port, Some(8081));

        let agent = lab.hosts.get("lab_agent").unwrap();
        assert_eq!(agent.ip, Some(Ipv4Addr::new(192, 168, 0, 3)));
        assert_eq!(agent.http_port, None);

        let vagrantfile = fs::read_to_string(ctx.vagrantfile_path()).unwrap();
        assert!(vagrantfile.contains("config.vm.define \"lab_server\""));
        assert!(vagrantfile.contains("cfg.vm.network :forwarded_port, guest: 80, host: 8080"));
    }

    #[test]
    fn test_add_second_platform_keeps_first() {
        let dir = project();
        let ctx = context(dir.path());

        add(&ctx, &["lab".to_string()]).unwrap();
        add(&ctx, &["dev".to_string()]).unwrap();
        // Re-adding refreshes without reassigning
        add(&ctx, &["lab".to_string()]).unwrap();

        let state = Datastate::load(&ctx.state_path()).unwrap();
        assert_eq!(state.platforms.keys().collect::<Vec<_>>(), vec!["lab", "dev"]);

        let dev = state.platform("dev").unwrap();
        assert_eq!(dev.subnet, Some(Ipv4Addr::new(192, 168, 1, 0)));
        assert_eq!(dev.hosts.get("dev_server").unwrap().http_port, Some(8082));

        let lab = state.platform("lab").unwrap();
        assert_eq!(lab.hosts.get("lab_server").unwrap().http_port, Some(8080));
    }

    #[test]
    fn test_add_unknown_definition_changes_nothing() {
        let dir = project();
        let ctx = context(dir.path());

        assert!(add(&ctx, &["ghost".to_string()]).is_err());
        assert!(!ctx.state_path().exists());
        assert!(!ctx.vagrantfile_path().exists());
    }

    #[test]
    fn test_add_failing_configuration_leaves_files_untouched() {
        let dir = project();
        let mut ctx = context(dir.path());
        add(&ctx, &["lab".to_string()]).unwrap();
        let state_before = fs::read_to_string(ctx.state_path()).unwrap();
        let vagrantfile_before = fs::read_to_string(ctx.vagrantfile_path()).unwrap();

        fs::write(
            dir.path().join("platforms/win.json"),
            r#"{ "default": { "system": "win10" }, "agent": {} }"#,
        )
        .unwrap();
        ctx.strict = true;

        let err = add(&ctx, &["win".to_string()]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnknownSystem { .. })
        ));
        assert_eq!(fs::read_to_string(ctx.state_path()).unwrap(), state_before);
        assert_eq!(
            fs::read_to_string(ctx.vagrantfile_path()).unwrap(),
            vagrantfile_before
        );
    }

    #[test]
    fn test_remove() {
        let dir = project();
        let ctx = context(dir.path());
        add(&ctx, &["lab".to_string(), "dev".to_string()]).unwrap();

        remove(&ctx, "lab", true).unwrap();

        let state = Datastate::load(&ctx.state_path()).unwrap();
        assert_eq!(state.platforms.keys().collect::<Vec<_>>(), vec!["dev"]);
        let vagrantfile = fs::read_to_string(ctx.vagrantfile_path()).unwrap();
        assert!(!vagrantfile.contains("lab_server"));
        assert!(vagrantfile.contains("dev_server"));

        // Removing again is a no-op
        remove(&ctx, "lab", true).unwrap();
    }

    #[test]
    fn test_list_requires_state_file() {
        let dir = project();
        let ctx = context(dir.path());
        let err = list(&ctx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingStateFile(_))
        ));
    }
}
