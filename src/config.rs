//! Server configuration.
//!
//! The configuration is a YAML document listing server blocks. Each server
//! block names the zones it serves, the addresses it listens on and the
//! plugins making up its processing chain:
//!
//! ```yaml
//! servers:
//!   - zones: ["cluster.local."]
//!     listen: ["udp://127.0.0.1:1053", "tcp://127.0.0.1:1053"]
//!     plugins:
//!       - name: kubernetes
//!         options:
//!           namespaces: ["testns"]
//!       - name: transfer
//!         options:
//!           to: ["*"]
//! ```
//!
//! The order of the plugins in the document doesn't matter. Chains are
//! always ordered by the directive table of the plugin registry.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::base::{Name, TransportKind};
use crate::xfr::XfrConfig;

//------------ Config --------------------------------------------------------

/// A complete server configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub servers: Vec<ServerBlock>,

    #[serde(default)]
    pub xfr: XfrConfig,
}

impl Config {
    /// Parses a configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text)
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Checks the structural rules a configuration must follow.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::Invalid("no server blocks".into()));
        }
        for (idx, server) in self.servers.iter().enumerate() {
            if server.zones.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "server block {idx} has no zones"
                )));
            }
            if server.plugins.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "server block {idx} has no plugins"
                )));
            }
        }
        Ok(())
    }
}

//------------ ServerBlock ---------------------------------------------------

/// The configuration of one processing chain.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerBlock {
    pub zones: Vec<Name>,

    #[serde(default)]
    pub listen: Vec<ListenAddr>,

    #[serde(default)]
    pub plugins: Vec<Directive>,
}

impl ServerBlock {
    pub fn new(zones: Vec<Name>) -> Self {
        ServerBlock {
            zones,
            listen: Vec::new(),
            plugins: Vec::new(),
        }
    }

    pub fn with_listen(mut self, addr: ListenAddr) -> Self {
        self.listen.push(addr);
        self
    }

    pub fn with_plugin(mut self, directive: Directive) -> Self {
        self.plugins.push(directive);
        self
    }
}

//------------ Directive -----------------------------------------------------

/// The configuration of a single plugin.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Directive {
    pub name: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub options: BTreeMap<String, Vec<String>>,
}

impl Directive {
    pub fn new(name: &str) -> Self {
        Directive {
            name: name.into(),
            args: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_option<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .insert(key.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the values of an option if it is present.
    pub fn option(&self, key: &str) -> Option<&[String]> {
        self.options.get(key).map(Vec::as_slice)
    }

    pub fn has_option(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }
}

//------------ ListenAddr ----------------------------------------------------

/// An address a server block listens on, e.g., `udp://127.0.0.1:53`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
#[serde(try_from = "String")]
pub struct ListenAddr {
    pub transport: TransportKind,
    pub addr: SocketAddr,
}

impl ListenAddr {
    pub fn new(transport: TransportKind, addr: SocketAddr) -> Self {
        ListenAddr { transport, addr }
    }
}

impl FromStr for ListenAddr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, addr) = s.split_once("://").unwrap_or(("udp", s));
        let transport = match scheme {
            "udp" | "dns" => TransportKind::Udp,
            "tcp" => TransportKind::Tcp,
            "tls" => TransportKind::Tls,
            "grpc" => TransportKind::Grpc,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "unknown transport in '{s}'"
                )))
            }
        };
        let addr = addr.parse().map_err(|_| {
            ConfigError::Invalid(format!("invalid listen address '{s}'"))
        })?;
        Ok(ListenAddr { transport, addr })
    }
}

impl TryFrom<String> for ListenAddr {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}://{}", self.transport, self.addr)
    }
}

//------------ ConfigSource --------------------------------------------------

/// Something a configuration can be loaded from.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<Config, ConfigError>;
}

impl ConfigSource for Config {
    fn load(&self) -> Result<Config, ConfigError> {
        self.check()?;
        Ok(self.clone())
    }
}

/// A configuration in YAML text.
#[derive(Clone, Debug)]
pub struct YamlText(pub String);

impl ConfigSource for YamlText {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::from_yaml(&self.0)
    }
}

/// A YAML configuration file.
#[derive(Clone, Debug)]
pub struct ConfigFile(pub PathBuf);

impl ConfigSource for ConfigFile {
    fn load(&self) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(&self.0)
            .map_err(|err| ConfigError::Io(self.0.clone(), err))?;
        Config::from_yaml(&text)
    }
}

//============ Error Types ===================================================

//------------ ConfigError ---------------------------------------------------

/// A configuration could not be loaded.
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, io::Error),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Io(path, err) => {
                write!(f, "cannot read {}: {err}", path.display())
            }
            ConfigError::Parse(err) => write!(f, "parse error: {err}"),
            ConfigError::Invalid(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, err) => Some(err),
            _ => None,
        }
    }
}

//============ Testing =======================================================
