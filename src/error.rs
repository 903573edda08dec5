//! Typed failures of rtf operations.
//!
//! Commands work with `anyhow::Result`; these variants are raised with
//! `anyhow::Error::from` and recovered with `downcast_ref` where the caller
//! needs to tell them apart (exit codes, tests).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The state file does not exist
    #[error("File {} doesn't exist, aborting!", .0.display())]
    MissingStateFile(PathBuf),

    /// The requested platform is not in the state document
    #[error("unknown platform '{name}' (known platforms: {})", known_list(.known))]
    UnknownPlatform { name: String, known: Vec<String> },

    /// A host references a system id missing from the systems table
    #[error("Unknown system {system} for host '{host}'")]
    UnknownSystem { host: String, system: String },

    /// A host lacks a field its role or the configurator requires
    #[error("host '{host}' is missing required field '{field}'")]
    MissingField { host: String, field: &'static str },

    /// A JSON document could not be parsed
    #[error("JSON syntax error in {}: {source}", .path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No platform definition file exists for the name
    #[error("Platform {name} does not exist ({} not found)", .path.display())]
    PlatformNotFound { name: String, path: PathBuf },

    /// A platform definition lacks the `default` entry
    #[error("No 'default' key in the platform json file {}", .0.display())]
    MissingDefaultEntry(PathBuf),

    /// Every 192.168.N.0 subnet is taken
    #[error("no free 192.168.N.0/24 subnet left for platform '{0}'")]
    SubnetsExhausted(String),

    /// Every address of the platform subnet is taken
    #[error("no free address left in subnet {subnet} of platform '{platform}'")]
    AddressesExhausted { platform: String, subnet: String },

    /// Every forwarded port above 8080 is taken
    #[error("no free forwarded port left for host '{0}'")]
    PortsExhausted(String),

    /// The Vagrantfile on disk differs from the state document
    #[error("{} is out of date, run `rtf vagrantfile` to regenerate it", .0.display())]
    OutOfDate(PathBuf),
}

impl Error {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidJson { .. } => 3,
            _ => 1,
        }
    }
}

fn known_list(known: &[String]) -> String {
    if known.is_empty() {
        "none".to_string()
    } else {
        known.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_state_file_message() {
        let err = Error::MissingStateFile(PathBuf::from(".rtfstate"));
        assert_eq!(err.to_string(), "File .rtfstate doesn't exist, aborting!");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_unknown_platform_lists_known() {
        let err = Error::UnknownPlatform {
            name: "nope".to_string(),
            known: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "unknown platform 'nope' (known platforms: a, b)"
        );

        let err = Error::UnknownPlatform {
            name: "nope".to_string(),
            known: Vec::new(),
        };
        assert!(err.to_string().ends_with("(known platforms: none)"));
    }

    #[test]
    fn test_invalid_json_exit_code() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::InvalidJson {
            path: PathBuf::from("platforms/x.json"),
            source,
        };
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().starts_with("JSON syntax error in platforms/x.json"));
    }

    #[test]
    fn test_out_of_date_exit_code() {
        let err = Error::OutOfDate(PathBuf::from("Vagrantfile"));
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().starts_with("Vagrantfile is out of date"));
    }
}
