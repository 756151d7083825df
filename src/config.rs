use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

use clap::Parser;

/// Registration server the node talks to when none is given on the command
/// line.
pub const DEFAULT_REG_IP: &str = "193.136.138.142";
pub const DEFAULT_REG_UDP: u16 = 59000;

#[derive(Debug, Clone, Copy)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => return Err(format!("unknown log level: {value}")),
        })
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Config {
    /// Transit cache capacity, in object names. Zero disables caching.
    pub cache: usize,

    /// IPv4 address other nodes use to reach this one.
    pub ip: Ipv4Addr,

    /// TCP port this node listens on.
    pub port: u16,

    /// Registration server IPv4 address.
    #[arg(default_value = DEFAULT_REG_IP)]
    pub reg_ip: Ipv4Addr,

    /// Registration server UDP port.
    #[arg(default_value_t = DEFAULT_REG_UDP)]
    pub reg_port: u16,

    /// Log verbosity.
    #[arg(long, default_value = "info")]
    pub log_level: LogLevel,
}

impl Config {
    /// Load the configuration from the command line.
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn listen_addr(&self) -> SocketAddr {
        (self.ip, self.port).into()
    }

    pub fn registry_addr(&self) -> SocketAddr {
        (self.reg_ip, self.reg_port).into()
    }
}
