use clap::ArgMatches;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::modbus::protocol::MAX_READ_QUANTITY;
use crate::utils::error::ModbusError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // Connection settings
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,

    // Request settings
    pub slave_id: u8,
    pub register: u16,
    pub quantity: u16,

    // Raw register value is divided by this before display
    pub scale: f64,

    // Polling settings
    pub interval_ms: u64,
    pub repeat: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            timeout_ms: 2000,
            slave_id: 1,
            register: 0x04,
            quantity: 1,
            scale: 100.0,
            interval_ms: 1000,
            repeat: 1,
        }
    }
}

impl ClientConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModbusError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ModbusError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: ClientConfig = toml::from_str(&content)?;

        info!("⚙️  Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ModbusError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Loads `--config` when given, otherwise the defaults, then applies flag overrides.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ModbusError> {
        let mut config = match matches.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_matches(matches)?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields with any flags present in `matches`, global or subcommand.
    pub fn apply_matches(&mut self, matches: &ArgMatches) -> Result<(), ModbusError> {
        if let Some(host) = get_arg(matches, "host") {
            self.host = host;
        }
        if let Some(port) = get_arg(matches, "port") {
            self.port = parse_flag("port", &port)?;
        }
        if let Some(timeout) = get_arg(matches, "timeout-ms") {
            self.timeout_ms = parse_flag("timeout-ms", &timeout)?;
        }
        if let Some(slave) = get_arg(matches, "slave") {
            self.slave_id = parse_flag("slave", &slave)?;
        }

        if let Some(("read", sub)) = matches.subcommand() {
            if let Some(register) = get_arg(sub, "register") {
                self.register = parse_register(&register)?;
            }
            if let Some(metric) = get_arg(sub, "metric") {
                let metric: crate::devices::Metric = metric.parse()?;
                self.register = metric.register();
            }
            if let Some(count) = get_arg(sub, "count") {
                self.quantity = parse_flag("count", &count)?;
            }
            if let Some(scale) = get_arg(sub, "scale") {
                self.scale = parse_flag("scale", &scale)?;
            }
            if let Some(interval) = get_arg(sub, "interval") {
                self.interval_ms = parse_flag("interval", &interval)?;
            }
            if let Some(repeat) = get_arg(sub, "repeat") {
                self.repeat = parse_flag("repeat", &repeat)?;
            }
        }

        debug!("Effective configuration: {:?}", self);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.host.trim().is_empty() {
            return Err(ModbusError::ConfigError("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ModbusError::ConfigError("port must not be 0".to_string()));
        }
        if self.slave_id == 0 || self.slave_id > 247 {
            return Err(ModbusError::ConfigError(format!(
                "slave id {} outside 1..=247",
                self.slave_id
            )));
        }
        if self.quantity == 0 || self.quantity > MAX_READ_QUANTITY {
            return Err(ModbusError::ConfigError(format!(
                "register count {} outside 1..={}",
                self.quantity, MAX_READ_QUANTITY
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ModbusError::ConfigError("timeout_ms must be positive".to_string()));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ModbusError::ConfigError(format!(
                "scale {} must be a positive number",
                self.scale
            )));
        }
        if self.repeat == 0 {
            return Err(ModbusError::ConfigError("repeat must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn get_arg(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.try_get_one::<String>(id).ok().flatten().cloned()
}

fn parse_flag<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ModbusError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ModbusError::ConfigError(format!("--{} '{}': {}", name, value, e)))
}

/// Accepts decimal or `0x`-prefixed hex register addresses.
pub fn parse_register(value: &str) -> Result<u16, ModbusError> {
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|e| ModbusError::ConfigError(format!("--register '{}': {}", value, e)))
}
