use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::modbus::client::ModbusClientTrait;
use crate::modbus::protocol::ReadHoldingRegisters;
use crate::utils::error::ModbusError;

/// Register value the slave reports for addresses it does not serve.
pub const UNAVAILABLE: u16 = 0xFFFF;

/// Metrics published by the system-monitor slave, each scaled x100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cpu,
    Ram,
    Disk,
}

impl Metric {
    pub fn register(&self) -> u16 {
        match self {
            Metric::Cpu => 0x04,
            Metric::Ram => 0x06,
            Metric::Disk => 0x08,
        }
    }

    pub fn from_register(register: u16) -> Option<Self> {
        match register {
            0x04 => Some(Metric::Cpu),
            0x06 => Some(Metric::Ram),
            0x08 => Some(Metric::Disk),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Cpu => "cpu",
            Metric::Ram => "ram",
            Metric::Disk => "disk",
        };
        f.write_str(name)
    }
}

impl FromStr for Metric {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Metric::Cpu),
            "ram" | "mem" | "memory" => Ok(Metric::Ram),
            "disk" => Ok(Metric::Disk),
            other => Err(ModbusError::InvalidData(format!("unknown metric '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterReading {
    pub slave_id: u8,
    pub timestamp: DateTime<Utc>,
    pub address: u16,
    pub metric: Option<Metric>,
    pub raw: Vec<u16>,
    pub scaled: f64,
}

impl RegisterReading {
    pub fn new(slave_id: u8, address: u16, raw: Vec<u16>, scale: f64) -> Self {
        let scaled = raw.first().map(|&v| v as f64 / scale).unwrap_or_default();
        Self {
            slave_id,
            timestamp: Utc::now(),
            address,
            metric: Metric::from_register(address),
            raw,
            scaled,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.raw.first() == Some(&UNAVAILABLE)
    }
}

#[derive(Debug, Clone)]
pub struct SystemMonitorDevice {
    pub slave_id: u8,
    pub scale: f64,
}

impl SystemMonitorDevice {
    pub fn new(slave_id: u8, scale: f64) -> Self {
        Self { slave_id, scale }
    }

    pub fn read_registers(
        &self,
        client: &dyn ModbusClientTrait,
        address: u16,
        count: u16,
    ) -> Result<RegisterReading, ModbusError> {
        let request = ReadHoldingRegisters::new(self.slave_id, address, count)?;
        let raw = client.read_holding_registers(
            request.slave_id,
            request.start_address,
            request.quantity,
        )?;
        if raw.len() != count as usize {
            return Err(ModbusError::InvalidResponse(format!(
                "asked for {} registers, got {}",
                count,
                raw.len()
            )));
        }

        let reading = RegisterReading::new(self.slave_id, address, raw, self.scale);
        match reading.raw.first() {
            Some(&UNAVAILABLE) => {
                warn!("Slave {} does not serve register 0x{:04x}", self.slave_id, address);
            }
            Some(first) => info!(
                "Slave {} register 0x{:04x} = {} ({:.2})",
                self.slave_id, address, first, reading.scaled
            ),
            None => warn!("Slave {} returned no registers", self.slave_id),
        }
        Ok(reading)
    }

    pub fn read_metric(
        &self,
        client: &dyn ModbusClientTrait,
        metric: Metric,
    ) -> Result<RegisterReading, ModbusError> {
        self.read_registers(client, metric.register(), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClient(Vec<u16>);

    impl ModbusClientTrait for FixedClient {
        fn read_holding_registers(
            &self,
            _slave_id: u8,
            _start_addr: u16,
            _count: u16,
        ) -> Result<Vec<u16>, ModbusError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_read_metric_scales_value() {
        let device = SystemMonitorDevice::new(1, 100.0);
        let reading = device.read_metric(&FixedClient(vec![4550]), Metric::Cpu).unwrap();
        assert_eq!(reading.address, 0x04);
        assert_eq!(reading.metric, Some(Metric::Cpu));
        assert!((reading.scaled - 45.5).abs() < f64::EPSILON);
        assert!(!reading.is_unavailable());
    }

    #[test]
    fn test_unserved_register_is_flagged() {
        let device = SystemMonitorDevice::new(1, 100.0);
        let reading = device
            .read_registers(&FixedClient(vec![UNAVAILABLE]), 0x10, 1)
            .unwrap();
        assert!(reading.is_unavailable());
        assert_eq!(reading.metric, None);
    }

    #[test]
    fn test_zero_count_rejected_before_client_call() {
        struct PanicClient;

        impl ModbusClientTrait for PanicClient {
            fn read_holding_registers(
                &self,
                _slave_id: u8,
                _start_addr: u16,
                _count: u16,
            ) -> Result<Vec<u16>, ModbusError> {
                panic!("request should not reach the client");
            }
        }

        let device = SystemMonitorDevice::new(1, 100.0);
        assert!(matches!(
            device.read_registers(&PanicClient, 0x04, 0),
            Err(ModbusError::InvalidData(_))
        ));
        assert!(device.read_registers(&FixedClient(Vec::new()), 0x04, 0).is_err());
    }

    #[test]
    fn test_empty_reading_is_not_unavailable() {
        let reading = RegisterReading::new(1, 0x04, Vec::new(), 100.0);
        assert!(!reading.is_unavailable());
        assert_eq!(reading.scaled, 0.0);
    }

    #[test]
    fn test_register_count_mismatch() {
        let device = SystemMonitorDevice::new(1, 100.0);
        let result = device.read_registers(&FixedClient(vec![1, 2]), 0x04, 1);
        assert!(matches!(result, Err(ModbusError::InvalidResponse(_))));
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("CPU".parse::<Metric>().unwrap(), Metric::Cpu);
        assert_eq!("memory".parse::<Metric>().unwrap(), Metric::Ram);
        assert_eq!(Metric::Disk.register(), 0x08);
        assert!("gpu".parse::<Metric>().is_err());
    }
}
