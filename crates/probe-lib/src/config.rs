//! Target configuration
//!
//! Describes one Mesos cluster target: the vendor flavor, the comma-separated
//! master address list, and the master credentials. The same fields round-trip
//! to the upstream optimization server as an account-value list.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default master port when an address in the list omits one.
pub const DEFAULT_APACHE_MASTER_PORT: &str = "5050";
/// DC/OS routes through the admin gateway, which must not be given a port.
pub const DEFAULT_DCOS_MASTER_PORT: &str = "";

/// Account-value keys exchanged with the upstream server. These literals are
/// part of the external contract and must not change.
pub const KEY_MASTER_IP_PORT: &str = "MasterIPPort";
pub const KEY_USERNAME: &str = "Username";
pub const KEY_PASSWORD: &str = "Password";
pub const KEY_FRAMEWORK_IP: &str = "FrameworkIP";
pub const KEY_FRAMEWORK_PORT: &str = "FrameworkPort";
pub const KEY_FRAMEWORK_USERNAME: &str = "FrameworkUsername";
pub const KEY_FRAMEWORK_PASSWORD: &str = "FrameworkPassword";

/// Mesos master vendor flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MesosVendor {
    #[serde(rename = "Apache Mesos")]
    Apache,
    #[serde(rename = "Mesosphere DCOS")]
    Dcos,
}

impl MesosVendor {
    pub fn default_master_port(&self) -> &'static str {
        match self {
            MesosVendor::Apache => DEFAULT_APACHE_MASTER_PORT,
            MesosVendor::Dcos => DEFAULT_DCOS_MASTER_PORT,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Apache Mesos" => Ok(MesosVendor::Apache),
            "Mesosphere DCOS" => Ok(MesosVendor::Dcos),
            other => Err(Error::Config(format!("unknown mesos vendor '{other}'"))),
        }
    }
}

impl fmt::Display for MesosVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MesosVendor::Apache => write!(f, "Apache Mesos"),
            MesosVendor::Dcos => write!(f, "Mesosphere DCOS"),
        }
    }
}

/// Network address of one master, split out of the configured list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterAddress {
    pub ip: String,
    /// May be empty (DC/OS gateway routing).
    pub port: String,
}

impl MasterAddress {
    /// Stable `ip:port` key used for endpoint maps; a bare `ip` when the
    /// port is empty.
    pub fn key(&self) -> String {
        if self.port.is_empty() {
            self.ip.clone()
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}

/// Configuration for one Mesos target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(rename = "master")]
    pub vendor: MesosVendor,
    /// Comma-separated `host[:port]` list. Doubles as the cluster scope key
    /// for deployments that do not name their cluster.
    #[serde(rename = "master-ipport")]
    pub master_ip_port: String,
    #[serde(default, rename = "master-user")]
    pub username: String,
    #[serde(default, rename = "master-pwd")]
    pub password: String,
}

/// One key/value pair of the upstream account-value exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountValue {
    pub key: String,
    pub value: String,
}

impl TargetConfig {
    /// Load a target configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.as_ref().display())))?;
        let config: TargetConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a target configuration from an upstream account-value list.
    pub fn from_account_values(vendor: MesosVendor, values: &[AccountValue]) -> Result<Self> {
        let mut config = TargetConfig {
            vendor,
            master_ip_port: String::new(),
            username: String::new(),
            password: String::new(),
        };
        for av in values {
            match av.key.as_str() {
                KEY_MASTER_IP_PORT => config.master_ip_port = av.value.clone(),
                KEY_USERNAME => config.username = av.value.clone(),
                KEY_PASSWORD => config.password = av.value.clone(),
                _ => {}
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.master_ip_port.trim().is_empty() {
            return Err(Error::Config(
                "master IP:port list is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Split the configured master list into addresses, filling in the
    /// vendor default port where omitted.
    pub fn master_addresses(&self) -> Vec<MasterAddress> {
        self.master_ip_port
            .split(',')
            .filter_map(|entry| {
                let entry = entry.trim();
                if entry.is_empty() {
                    return None;
                }
                let (ip, port) = match entry.split_once(':') {
                    Some((ip, port)) => (ip.trim(), port.trim()),
                    None => (entry, self.vendor.default_master_port()),
                };
                Some(MasterAddress {
                    ip: ip.to_string(),
                    port: port.to_string(),
                })
            })
            .collect()
    }

    /// The cluster scope key: stable across cycles while configuration is
    /// unchanged.
    pub fn cluster_scope(&self) -> &str {
        &self.master_ip_port
    }

    /// Account values sent to the upstream server. Apache deployments also
    /// carry the framework fields (empty unless configured elsewhere).
    pub fn account_values(&self) -> Vec<AccountValue> {
        let mut values = vec![AccountValue {
            key: KEY_MASTER_IP_PORT.to_string(),
            value: self.master_ip_port.clone(),
        }];
        if !self.username.is_empty() {
            values.push(AccountValue {
                key: KEY_USERNAME.to_string(),
                value: self.username.clone(),
            });
        }
        if !self.password.is_empty() {
            values.push(AccountValue {
                key: KEY_PASSWORD.to_string(),
                value: self.password.clone(),
            });
        }
        if self.vendor == MesosVendor::Apache {
            for key in [
                KEY_FRAMEWORK_IP,
                KEY_FRAMEWORK_PORT,
                KEY_FRAMEWORK_USERNAME,
                KEY_FRAMEWORK_PASSWORD,
            ] {
                values.push(AccountValue {
                    key: key.to_string(),
                    value: String::new(),
                });
            }
        }
        values
    }
}
