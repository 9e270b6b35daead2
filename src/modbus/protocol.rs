use std::fmt;

use super::crc::{build_packet, check_packet, CRC_LEN};
use crate::utils::error::ModbusError;

pub const READ_HOLDING_REGISTERS: u8 = 0x03;
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Largest register count a single 0x03 request may ask for.
pub const MAX_READ_QUANTITY: u16 = 125;

/// slave + function + exception code + CRC
pub const EXCEPTION_RESPONSE_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Other(u8),
}

impl ExceptionCode {
    pub fn code(&self) -> u8 {
        match self {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::ServerDeviceFailure => 0x04,
            ExceptionCode::Other(code) => *code,
        }
    }
}

impl From<u8> for ExceptionCode {
    fn from(code: u8) -> Self {
        match code {
            0x01 => ExceptionCode::IllegalFunction,
            0x02 => ExceptionCode::IllegalDataAddress,
            0x03 => ExceptionCode::IllegalDataValue,
            0x04 => ExceptionCode::ServerDeviceFailure,
            other => ExceptionCode::Other(other),
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExceptionCode::IllegalFunction => "illegal function",
            ExceptionCode::IllegalDataAddress => "illegal data address",
            ExceptionCode::IllegalDataValue => "illegal data value",
            ExceptionCode::ServerDeviceFailure => "server device failure",
            ExceptionCode::Other(_) => "unknown exception",
        };
        write!(f, "{} (0x{:02x})", name, self.code())
    }
}

/// A Read Holding Registers (0x03) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHoldingRegisters {
    pub slave_id: u8,
    pub start_address: u16,
    pub quantity: u16,
}

impl ReadHoldingRegisters {
    pub fn new(slave_id: u8, start_address: u16, quantity: u16) -> Result<Self, ModbusError> {
        if quantity == 0 || quantity > MAX_READ_QUANTITY {
            return Err(ModbusError::InvalidData(format!(
                "register count {} outside 1..={}",
                quantity, MAX_READ_QUANTITY
            )));
        }

        Ok(Self {
            slave_id,
            start_address,
            quantity,
        })
    }

    /// `[slave][0x03][addr_hi][addr_lo][qty_hi][qty_lo]`
    pub fn frame(&self) -> Vec<u8> {
        let mut frame = vec![self.slave_id, READ_HOLDING_REGISTERS];
        frame.extend_from_slice(&self.start_address.to_be_bytes());
        frame.extend_from_slice(&self.quantity.to_be_bytes());
        frame
    }

    pub fn packet(&self) -> Vec<u8> {
        build_packet(&self.frame())
    }

    // slave + function + byte count + data + CRC
    pub fn expected_response_len(&self) -> usize {
        3 + 2 * self.quantity as usize + CRC_LEN
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModbusResponse {
    Registers(Vec<u16>),
    Exception(ExceptionCode),
}

impl ModbusResponse {
    /// Decodes a complete response packet to `request`.
    ///
    /// Every offset is checked against the packet length before it is read.
    pub fn parse(request: &ReadHoldingRegisters, packet: &[u8]) -> Result<Self, ModbusError> {
        if packet.len() < EXCEPTION_RESPONSE_LEN {
            return Err(ModbusError::InvalidResponse(format!(
                "response of {} bytes is too short",
                packet.len()
            )));
        }

        let body = check_packet(packet)?;

        if body[0] != request.slave_id {
            return Err(ModbusError::UnexpectedSlave {
                expected: request.slave_id,
                received: body[0],
            });
        }

        let function = body[1];
        if function == READ_HOLDING_REGISTERS | EXCEPTION_FLAG {
            if body.len() != EXCEPTION_RESPONSE_LEN - CRC_LEN {
                return Err(ModbusError::InvalidResponse(format!(
                    "exception response carries {} bytes",
                    packet.len()
                )));
            }
            return Ok(ModbusResponse::Exception(ExceptionCode::from(body[2])));
        }

        if function != READ_HOLDING_REGISTERS {
            return Err(ModbusError::InvalidResponse(format!(
                "unexpected function code 0x{:02x}",
                function
            )));
        }

        let byte_count = body[2] as usize;
        let expected_count = 2 * request.quantity as usize;
        if byte_count != expected_count {
            return Err(ModbusError::InvalidResponse(format!(
                "byte count {} does not match {} requested registers",
                byte_count, request.quantity
            )));
        }

        let data = &body[3..];
        if data.len() != byte_count {
            return Err(ModbusError::InvalidResponse(format!(
                "byte count {} but {} data bytes received",
                byte_count,
                data.len()
            )));
        }

        let registers = data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        Ok(ModbusResponse::Registers(registers))
    }

    pub fn into_registers(self) -> Result<Vec<u16>, ModbusError> {
        match self {
            ModbusResponse::Registers(values) => Ok(values),
            ModbusResponse::Exception(code) => Err(ModbusError::Exception(code)),
        }
    }
}
