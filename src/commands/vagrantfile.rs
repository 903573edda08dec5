//! `rtf vagrantfile` - render the state file as a Vagrantfile

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use std::fs;
use std::io;
use std::path::Path;
use vagrantkit::{Config, WriteOptions};

use crate::Context;
use crate::cli::VagrantfileArgs;
use crate::configurator::Configurator;
use crate::error::Error;
use crate::state::Datastate;
use crate::ui;

pub fn run(ctx: &Context, args: VagrantfileArgs) -> Result<()> {
    let state = Datastate::load(&ctx.state_path())?;
    let config = build(ctx, &state, &args.platforms)?;
    let content = vagrantkit::render(&config, &write_options(ctx))?;

    if args.stdout {
        print!("{content}");
        return Ok(());
    }

    let path = ctx.vagrantfile_path();
    if args.check {
        let current = read_existing(&path)?;
        if print_diff(&current, &content) {
            return Err(Error::OutOfDate(path).into());
        }
        ui::success(&format!("{} is up to date", path.display()));
        return Ok(());
    }

    write(&path, &content)?;
    if !ctx.quiet {
        ui::success(&format!(
            "Wrote {} to {}",
            ui::count(config.machines.len(), "machine"),
            path.display()
        ));
    }
    Ok(())
}

/// Render the Vagrantfile for every platform of `state` without writing it.
pub fn render_all(ctx: &Context, state: &Datastate) -> Result<String> {
    let config = build(ctx, state, &[])?;
    Ok(vagrantkit::render(&config, &write_options(ctx))?)
}

/// Replace the Vagrantfile with already rendered content.
pub fn replace(ctx: &Context, content: &str) -> Result<()> {
    let path = ctx.vagrantfile_path();
    write(&path, content)?;
    log::info!("Regenerated {}", path.display());
    Ok(())
}

/// Declare `platforms` (all when empty) on a fresh configuration.
pub fn build(ctx: &Context, state: &Datastate, platforms: &[String]) -> Result<Config> {
    let systems = ctx.systems();
    let configurator = Configurator::new(&systems, &ctx.settings.provisioning, ctx.strictness());
    let mut config = Config::new();

    if platforms.is_empty() {
        configurator.configure_all(&mut config, state)?;
    } else {
        for name in platforms {
            configurator.configure_platform(&mut config, state, name)?;
        }
    }

    Ok(config)
}

fn write_options(ctx: &Context) -> WriteOptions {
    WriteOptions {
        banner: vec![format!(
            "Generated by rtf from {}, do not edit.",
            ctx.settings.state_file
        )],
    }
}

/// Current Vagrantfile content; a missing file reads as empty.
fn read_existing(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", path.display())),
    }
}

fn write(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Print a line diff; returns whether anything differs.
fn print_diff(current: &str, generated: &str) -> bool {
    let diff = similar::TextDiff::from_lines(current, generated);
    let mut has_changes = false;

    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                has_changes = true;
                print!("    {}", format!("- {change}").red());
            }
            similar::ChangeTag::Insert => {
                has_changes = true;
                print!("    {}", format!("+ {change}").green());
            }
            similar::ChangeTag::Equal => {}
        }
    }

    has_changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::path::PathBuf;

    const STATE: &str = r#"{
  "a": {"hosts": {"a_agent": {"system": "debian12", "long-name": "a_agent", "short-name": "agent", "ip": "192.168.0.2", "ram": 256}}},
  "b": {"hosts": {"b_agent": {"system": "debian11", "long-name": "b_agent", "short-name": "agent", "ip": "192.168.1.2", "ram": 256}}}
}"#;

    fn context(root: PathBuf) -> Context {
        Context {
            verbose: 0,
            quiet: true,
            strict: false,
            root,
            settings: Settings::default(),
        }
    }

    #[test]
    fn test_build_all_or_selected() {
        let ctx = context(PathBuf::from("/unused"));
        let state = Datastate::from_json(Path::new(".rtfstate"), STATE).unwrap();

        let all = build(&ctx, &state, &[]).unwrap();
        assert_eq!(all.machine_names(), vec!["a_agent", "b_agent"]);

        let only_b = build(&ctx, &state, &["b".to_string()]).unwrap();
        assert_eq!(only_b.machine_names(), vec!["b_agent"]);

        assert!(build(&ctx, &state, &["c".to_string()]).is_err());
    }

    #[test]
    fn test_render_all_then_replace() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().to_path_buf());
        let state = Datastate::from_json(Path::new(".rtfstate"), STATE).unwrap();

        let content = render_all(&ctx, &state).unwrap();
        assert!(!dir.path().join("Vagrantfile").exists());
        replace(&ctx, &content).unwrap();

        let content = fs::read_to_string(dir.path().join("Vagrantfile")).unwrap();
        assert!(content.contains("# Generated by rtf from .rtfstate, do not edit.\n"));
        assert!(content.contains("config.vm.define \"a_agent\" do |cfg|"));
        assert!(content.contains("config.vm.define \"b_agent\" do |cfg|"));
        assert!(content.contains("cfg.vm.box = \"debian/bullseye64\""));
    }

    #[test]
    fn test_run_without_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().to_path_buf());
        let args = VagrantfileArgs {
            platforms: Vec::new(),
            stdout: false,
            check: false,
        };

        let err = run(&ctx, args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingStateFile(_))
        ));
        assert!(!dir.path().join("Vagrantfile").exists());
    }

    fn check_args() -> VagrantfileArgs {
        VagrantfileArgs {
            platforms: Vec::new(),
            stdout: false,
            check: true,
        }
    }

    #[test]
    fn test_check_fails_when_out_of_date() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().to_path_buf());
        fs::write(dir.path().join(".rtfstate"), STATE).unwrap();

        // No Vagrantfile yet
        let err = run(&ctx, check_args()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::OutOfDate(_))));
        assert!(!dir.path().join("Vagrantfile").exists());

        let state = Datastate::load(&ctx.state_path()).unwrap();
        replace(&ctx, &render_all(&ctx, &state).unwrap()).unwrap();
        run(&ctx, check_args()).unwrap();
    }

    #[test]
    fn test_check_reports_unreadable_vagrantfile() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().to_path_buf());
        fs::write(dir.path().join(".rtfstate"), STATE).unwrap();
        fs::create_dir(dir.path().join("Vagrantfile")).unwrap();

        let err = run(&ctx, check_args()).unwrap_err();
        assert!(err.downcast_ref::<Error>().is_none());
        assert!(format!("{err:#}").starts_with("Failed to read"));
    }

    #[test]
    fn test_print_diff_detects_changes() {
        assert!(!print_diff("same\n", "same\n"));
        assert!(print_diff("old\n", "new\n"));
    }
}
