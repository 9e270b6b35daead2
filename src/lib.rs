//! Modbus RTU-over-TCP diagnostic client.
//!
//! The core is the CRC-16/MODBUS checksum and the packet framing built on it
//! ([`modbus::crc`]). Around it sit a Read Holding Registers request/response
//! codec, a blocking TCP client, a periodic poller, and the CLI glue used by
//! the `rtu-probe` binary.

pub mod cli;
pub mod config;
pub mod devices;
pub mod modbus;
pub mod output;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::ClientConfig;
pub use devices::{Metric, RegisterReading, SystemMonitorDevice};
pub use modbus::crc::{build_packet, check_packet, crc16_modbus, verify_packet, FrameError};
pub use modbus::{ModbusClientTrait, ModbusTcpClient};
pub use services::{PollStatus, PollSummary, Poller};
pub use output::{ConsoleFormatter, HexFormatter, JsonFormatter, ReadingFormatter};
pub use utils::error::ModbusError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
