pub mod client;
pub mod protocol;
pub mod crc;

pub use client::{ModbusClientTrait, ModbusTcpClient};
pub use protocol::{ExceptionCode, ModbusResponse, ReadHoldingRegisters};
pub use crc::{build_packet, check_packet, crc16_modbus, verify_packet, FrameError};
