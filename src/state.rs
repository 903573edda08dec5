use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::Error;
use crate::systems::OsFamily;

/// First port handed out to server web interfaces
const FIRST_FORWARDED_PORT: u16 = 8080;

// ============================================================================
// Ordered Maps
// ============================================================================

/// A string-keyed map that keeps document order and rejects duplicate keys.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> NamedMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace an entry. A replaced entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> Option<V> {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<V> {
        let index = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut V)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<V> Default for NamedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(String, V)> for NamedMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for NamedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for NamedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NamedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for NamedMapVisitor<V> {
            type Value = NamedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with unique string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = NamedMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if map.contains_key(&key) {
                        return Err(serde::de::Error::custom(format!("duplicate key '{key}'")));
                    }
                    map.entries.push((key, value));
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(NamedMapVisitor(PhantomData))
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Function of a host in the Rudder deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Server,
    Relay,
    Agent,
    Other,
}

impl Role {
    /// Classify a `rudder-setup` tag by the role name it contains.
    pub fn from_tag(tag: &str) -> Self {
        if tag.contains("server") {
            Self::Server
        } else if tag.contains("relay") {
            Self::Relay
        } else if tag.contains("agent") {
            Self::Agent
        } else {
            Self::Other
        }
    }
}

/// A `rudder-setup` tag. The raw tag is kept since it names the inventory group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RudderSetup {
    tag: String,
    role: Role,
}

impl RudderSetup {
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let role = Role::from_tag(&tag);
        Self { tag, role }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl From<String> for RudderSetup {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

impl From<RudderSetup> for String {
    fn from(setup: RudderSetup) -> Self {
        setup.tag
    }
}

// ============================================================================
// Document Structures
// ============================================================================

/// A single virtual machine of a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostSpec {
    /// Key into the systems table
    pub system: String,
    /// VirtualBox display name
    pub long_name: String,
    /// Guest hostname
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<Ipv4Addr>,
    /// Memory in MB
    pub ram: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rudder_setup: Option<RudderSetup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_port: Option<u16>,
    /// Keys rtf does not interpret, kept for the playbook
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HostSpec {
    pub fn role(&self) -> Option<Role> {
        self.rudder_setup.as_ref().map(RudderSetup::role)
    }

    pub fn is_server(&self) -> bool {
        self.role() == Some(Role::Server)
    }

    pub fn family(&self) -> OsFamily {
        OsFamily::of(&self.system)
    }

    /// CPU count, 1 when unspecified.
    pub fn cpu_count(&self) -> u32 {
        self.cpus.unwrap_or(1)
    }

    /// Check the fields machine configuration relies on.
    pub fn validate(&self, name: &str) -> std::result::Result<(), Error> {
        let missing = |field| Error::MissingField {
            host: name.to_string(),
            field,
        };

        if self.ip.is_none() {
            return Err(missing("ip"));
        }
        if self.is_server() {
            if self.http_port.is_none() {
                return Err(missing("http-port"));
            }
            if self.https_port.is_none() {
                return Err(missing("https-port"));
            }
        }
        Ok(())
    }
}

/// A named set of hosts deployed together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub hosts: NamedMap<HostSpec>,
    /// Network address of the platform's /24
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<Ipv4Addr>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Platform {
    /// Validate every host, in document order.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        for (name, host) in self.hosts.iter() {
            host.validate(name)?;
        }
        Ok(())
    }

    /// The whole record as JSON, as handed to the playbook.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).context("Failed to serialize platform record")
    }
}

/// Something `Datastate::assign_network` filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Subnet {
        platform: String,
        subnet: Ipv4Addr,
    },
    Ip {
        host: String,
        ip: Ipv4Addr,
    },
    Port {
        host: String,
        field: &'static str,
        port: u16,
    },
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subnet { platform, subnet } => {
                write!(f, "Assign subnet '{subnet}' to the platform '{platform}'")
            }
            Self::Ip { host, ip } => write!(f, "Assign ip '{ip}' to the host '{host}'"),
            Self::Port { host, field, port } => {
                write!(f, "Assign {field} '{port}' to the host '{host}'")
            }
        }
    }
}

/// The `.rtfstate` document: platform name → platform record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datastate {
    pub platforms: NamedMap<Platform>,
}

// ============================================================================
// Datastate Implementation
// ============================================================================

impl Datastate {
    /// Load the state file, failing with `MissingStateFile` if it is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::MissingStateFile(path.to_path_buf()).into());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state = Self::from_json(path, &content)?;

        log::debug!(
            "Loaded {} platform(s) from {}",
            state.platforms.len(),
            path.display()
        );
        Ok(state)
    }

    /// Load the state file, or return an empty state if it doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using empty state");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse a state document; `origin` is only used in error messages.
    pub fn from_json(origin: &Path, content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| {
            Error::InvalidJson {
                path: origin.to_path_buf(),
                source,
            }
            .into()
        })
    }

    /// Save the state to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content =
            serde_json::to_string_pretty(self).context("Failed to serialize state to JSON")?;
        content.push('\n');

        fs::write(path, content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Look up a platform, failing with `UnknownPlatform`.
    pub fn platform(&self, name: &str) -> Result<&Platform> {
        self.platforms.get(name).ok_or_else(|| {
            Error::UnknownPlatform {
                name: name.to_string(),
                known: self.platforms.keys().map(str::to_string).collect(),
            }
            .into()
        })
    }

    /// Remove a platform. Returns whether it existed.
    pub fn remove_platform(&mut self, name: &str) -> bool {
        self.platforms.remove(name).is_some()
    }

    /// Merge freshly generated platforms, then assign missing network settings.
    pub fn update(&mut self, generated: &NamedMap<NamedMap<HostSpec>>) -> Result<Vec<Assignment>> {
        self.merge_platforms(generated)?;
        self.assign_network()
    }

    /// Deep-merge freshly generated host sets into the document.
    ///
    /// Values from `generated` win; keys only present in the current state
    /// (assigned addresses, ports, subnets) are kept.
    pub fn merge_platforms(&mut self, generated: &NamedMap<NamedMap<HostSpec>>) -> Result<()> {
        let mut destination = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        for (name, hosts) in generated.iter() {
            let mut record = Map::new();
            record.insert("hosts".to_string(), serde_json::to_value(hosts)?);
            let mut source = Map::new();
            source.insert(name.to_string(), Value::Object(record));
            deep_merge(&source, &mut destination);
        }

        *self = serde_json::from_value(Value::Object(destination))
            .context("Merged state is not a valid state document")?;
        Ok(())
    }

    /// Give every platform a subnet, every host an ip and every server its ports.
    pub fn assign_network(&mut self) -> Result<Vec<Assignment>> {
        let mut assignments = Vec::new();
        let names: Vec<String> = self.platforms.keys().map(str::to_string).collect();

        for name in &names {
            if let Some(assignment) = self.assign_subnet(name)? {
                assignments.push(assignment);
            }
            assignments.extend(self.assign_ips(name)?);
            assignments.extend(self.assign_ports(name)?);
        }

        Ok(assignments)
    }

    fn assign_subnet(&mut self, name: &str) -> Result<Option<Assignment>> {
        let used: Vec<Ipv4Addr> = self.platforms.values().filter_map(|p| p.subnet).collect();
        let Some(platform) = self.platforms.get_mut(name) else {
            return Ok(None);
        };
        if platform.subnet.is_some() {
            return Ok(None);
        }

        let subnet = (0..=255u8)
            .map(|index| Ipv4Addr::new(192, 168, index, 0))
            .find(|candidate| !used.contains(candidate))
            .ok_or_else(|| Error::SubnetsExhausted(name.to_string()))?;

        log::debug!("Next available subnet: {subnet}");
        platform.subnet = Some(subnet);
        Ok(Some(Assignment::Subnet {
            platform: name.to_string(),
            subnet,
        }))
    }

    fn assign_ips(&mut self, name: &str) -> Result<Vec<Assignment>> {
        let Some(platform) = self.platforms.get_mut(name) else {
            return Ok(Vec::new());
        };
        let Some(subnet) = platform.subnet else {
            return Ok(Vec::new());
        };

        let [a, b, c, _] = subnet.octets();
        // .1 is the host side of the private network
        let mut used: Vec<Ipv4Addr> = vec![Ipv4Addr::new(a, b, c, 1)];
        used.extend(platform.hosts.values().filter_map(|h| h.ip));

        let mut assignments = Vec::new();
        for (host_name, host) in platform.hosts.iter_mut() {
            if host.ip.is_some() {
                continue;
            }
            let ip = (2..=254u8)
                .map(|d| Ipv4Addr::new(a, b, c, d))
                .find(|candidate| !used.contains(candidate))
                .ok_or_else(|| Error::AddressesExhausted {
                    platform: name.to_string(),
                    subnet: subnet.to_string(),
                })?;
            used.push(ip);
            host.ip = Some(ip);
            assignments.push(Assignment::Ip {
                host: host_name.to_string(),
                ip,
            });
        }
        Ok(assignments)
    }

    fn assign_ports(&mut self, name: &str) -> Result<Vec<Assignment>> {
        let mut used = self.used_ports();
        let Some(platform) = self.platforms.get_mut(name) else {
            return Ok(Vec::new());
        };

        let mut assignments = Vec::new();
        for (host_name, host) in platform.hosts.iter_mut() {
            if !host.is_server() {
                continue;
            }
            for (field, slot) in [
                ("http-port", &mut host.http_port),
                ("https-port", &mut host.https_port),
            ] {
                if slot.is_some() {
                    continue;
                }
                let port = (FIRST_FORWARDED_PORT..=u16::MAX)
                    .find(|candidate| !used.contains(candidate))
                    .ok_or_else(|| Error::PortsExhausted(host_name.to_string()))?;
                used.push(port);
                *slot = Some(port);
                assignments.push(Assignment::Port {
                    host: host_name.to_string(),
                    field,
                    port,
                });
            }
        }
        Ok(assignments)
    }

    /// Forwarded ports used by any host of any platform.
    fn used_ports(&self) -> Vec<u16> {
        self.platforms
            .values()
            .flat_map(|p| p.hosts.values())
            .flat_map(|h| [h.http_port, h.https_port])
            .flatten()
            .collect()
    }
}

/// Recursively merge `source` into `destination`, `source` winning on leaves.
fn deep_merge(source: &Map<String, Value>, destination: &mut Map<String, Value>) {
    for (key, value) in source {
        match value {
            Value::Object(child) => {
                let node = destination
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !node.is_object() {
                    *node = Value::Object(Map::new());
                }
                if let Value::Object(node) = node {
                    deep_merge(child, node);
                }
            }
            _ => {
                destination.insert(key.clone(), value.clone());
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
