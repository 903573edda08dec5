//! Platform definition files (`platforms/<name>.json`).
//!
//! A definition is a JSON object with `//` comments. The mandatory
//! `default` entry is merged under every other entry, and each entry
//! becomes a host named `<platform>_<entry>`.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::state::{HostSpec, NamedMap, Role};
use crate::systems::OsFamily;

const DEFAULT_ENTRY: &str = "default";

/// Path of a platform definition file.
pub fn definition_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

/// Load a platform definition and expand it into state hosts.
pub fn load(dir: &Path, name: &str) -> Result<NamedMap<HostSpec>> {
    let path = definition_path(dir, name);
    if !path.is_file() {
        return Err(Error::PlatformNotFound {
            name: name.to_string(),
            path,
        }
        .into());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read platform file: {}", path.display()))?;
    let raw: Map<String, Value> =
        serde_json::from_str(&strip_comments(&content)).map_err(|source| Error::InvalidJson {
            path: path.clone(),
            source,
        })?;

    let hosts = expand(name, &path, &raw)?;
    log::debug!("Platform '{name}' defines {} host(s)", hosts.len());
    Ok(hosts)
}

/// Turn the raw entries of a definition into hosts.
fn expand(name: &str, path: &Path, raw: &Map<String, Value>) -> Result<NamedMap<HostSpec>> {
    let Some(Value::Object(defaults)) = raw.get(DEFAULT_ENTRY) else {
        return Err(Error::MissingDefaultEntry(path.to_path_buf()).into());
    };

    let mut hosts = NamedMap::new();
    for (entry, data) in raw {
        if entry == DEFAULT_ENTRY {
            continue;
        }

        // First-level override of the defaults
        let mut merged = defaults.clone();
        if let Value::Object(data) = data {
            for (key, value) in data {
                merged.insert(key.clone(), value.clone());
            }
        }

        let role = merged
            .get("rudder-setup")
            .and_then(Value::as_str)
            .map(Role::from_tag);
        let family = merged
            .get("system")
            .and_then(Value::as_str)
            .map_or(OsFamily::Linux, OsFamily::of);

        let long_name = format!("{name}_{entry}");
        let mut host = Map::new();
        host.insert("short-name".to_string(), Value::from(entry.as_str()));
        host.insert("long-name".to_string(), Value::from(long_name.as_str()));
        host.insert("ram".to_string(), Value::from(default_ram(role, family)));
        for (key, value) in merged {
            host.insert(key, value);
        }

        let spec: HostSpec = serde_json::from_value(Value::Object(host))
            .with_context(|| format!("Invalid host '{entry}' in {}", path.display()))?;
        hosts.insert(long_name, spec);
    }

    Ok(hosts)
}

/// Memory in MB given to a host that doesn't set `ram`.
pub fn default_ram(role: Option<Role>, family: OsFamily) -> u32 {
    match (role, family) {
        (Some(Role::Server), _) => 2048,
        (Some(Role::Relay), _) => 512,
        (_, OsFamily::Windows) => 2048,
        (_, OsFamily::Solaris) => 1024,
        (_, OsFamily::Linux) => 256,
    }
}

/// Remove `//` line comments, leaving string literals untouched.
pub fn strip_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                // Drop everything up to, not including, the newline
                while chars.peek().is_some_and(|&next| next != '\n') {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DEFINITION: &str = r#"{
  // shared by every host
  "default": {
    "system": "debian12",
    "rudder-version": "8.1" // trailing comment
  },
  "server": {
    "rudder-setup": "server",
    "url": "http://repo.example.com/rudder"
  },
  "agent": {
    "rudder-setup": "agent",
    "system": "ubuntu22_04",
    "ram": 512
  },
  "win": {
    "rudder-setup": "agent",
    "system": "win_server_2019"
  }
}"#;

    fn write_definition(dir: &Path, name: &str, content: &str) {
        fs::write(definition_path(dir, name), content).unwrap();
    }

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("{} // gone"), "{} ");
        assert_eq!(strip_comments("// all\n{}"), "\n{}");
        assert_eq!(
            strip_comments(r#"{"a": "http://x"} // c"#),
            r#"{"a": "http://x"} "#
        );
        assert_eq!(strip_comments(r#"{"a": "q\"//"}"#), r#"{"a": "q\"//"}"#);
    }

    #[test]
    fn test_default_ram() {
        assert_eq!(default_ram(Some(Role::Server), OsFamily::Linux), 2048);
        assert_eq!(default_ram(Some(Role::Relay), OsFamily::Windows), 512);
        assert_eq!(default_ram(Some(Role::Agent), OsFamily::Windows), 2048);
        assert_eq!(default_ram(None, OsFamily::Solaris), 1024);
        assert_eq!(default_ram(Some(Role::Agent), OsFamily::Linux), 256);
    }

    #[test]
    fn test_load_expands_hosts() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(dir.path(), "demo", DEFINITION);

        let hosts = load(dir.path(), "demo").unwrap();
        assert_eq!(
            hosts.keys().collect::<Vec<_>>(),
            vec!["demo_server", "demo_agent", "demo_win"]
        );

        let server = hosts.get("demo_server").unwrap();
        assert_eq!(server.short_name, "server");
        assert_eq!(server.long_name, "demo_server");
        assert_eq!(server.system, "debian12");
        assert_eq!(server.ram, 2048);
        assert!(server.is_server());
        assert_eq!(server.extra.get("rudder-version"), Some(&json!("8.1")));
        assert_eq!(
            server.extra.get("url"),
            Some(&json!("http://repo.example.com/rudder"))
        );

        let agent = hosts.get("demo_agent").unwrap();
        assert_eq!(agent.system, "ubuntu22_04");
        assert_eq!(agent.ram, 512);

        let win = hosts.get("demo_win").unwrap();
        assert_eq!(win.ram, 2048);
        assert_eq!(win.ip, None);
    }

    #[test]
    fn test_missing_definition() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path(), "ghost").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::PlatformNotFound { name, .. }) if name == "ghost"
        ));
    }

    #[test]
    fn test_missing_default_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(dir.path(), "nodefault", r#"{"a": {"system": "debian12"}}"#);

        let err = load(dir.path(), "nodefault").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingDefaultEntry(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(dir.path(), "broken", "{ \"default\": { ");

        let err = load(dir.path(), "broken").unwrap_err();
        let err = err.downcast_ref::<Error>().unwrap();
        assert!(matches!(err, Error::InvalidJson { .. }));
        assert_eq!(err.exit_code(), 3);
    }
}
