use log::{debug, error, info, warn};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::Duration;

use super::protocol::{
    ModbusResponse, ReadHoldingRegisters, EXCEPTION_FLAG, EXCEPTION_RESPONSE_LEN,
};
use crate::utils::error::ModbusError;

pub trait ModbusClientTrait: Send + Sync {
    fn read_holding_registers(
        &self,
        slave_id: u8,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, ModbusError>;
}

/// RTU framing (with CRC) carried over a plain TCP stream.
///
/// One request and one response per call. The stream is held behind a mutex so
/// concurrent callers cannot interleave their exchanges.
pub struct ModbusTcpClient {
    stream: Mutex<TcpStream>,
    peer: String,
}

impl ModbusTcpClient {
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self, ModbusError> {
        info!("🔌 Connecting to Modbus RTU-over-TCP slave: {}", addr);

        let addrs = addr.to_socket_addrs().map_err(|e| {
            error!("❌ Cannot resolve {}: {}", addr, e);
            ModbusError::ConnectionError(format!("Failed to resolve {}: {}", addr, e))
        })?;

        let mut last_err = None;
        for socket_addr in addrs {
            match TcpStream::connect_timeout(&socket_addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_nodelay(true)?;

                    info!("Connection established with {}", socket_addr);
                    return Ok(Self {
                        stream: Mutex::new(stream),
                        peer: socket_addr.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Connect to {} failed: {}", socket_addr, e);
                    last_err = Some(e);
                }
            }
        }

        let reason = match last_err {
            Some(e) => e.to_string(),
            None => "no addresses resolved".to_string(),
        };
        error!("❌ Failed to connect to {}: {}", addr, reason);
        Err(ModbusError::ConnectionError(format!(
            "Failed to connect to {}: {}",
            addr, reason
        )))
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn exchange(&self, request: &ReadHoldingRegisters) -> Result<Vec<u8>, ModbusError> {
        let packet = request.packet();
        let mut stream = self.stream.lock().map_err(|_| ModbusError::LockError)?;

        debug!("📤 Sending frame: {}", hex::encode(&packet));
        stream
            .write_all(&packet)
            .map_err(|e| map_io("Write failed", e))?;
        stream.flush().map_err(|e| map_io("Flush failed", e))?;

        let response = read_response(&mut *stream, request.expected_response_len())?;
        debug!("📥 Received frame: {}", hex::encode(&response));
        Ok(response)
    }
}

impl ModbusClientTrait for ModbusTcpClient {
    fn read_holding_registers(
        &self,
        slave_id: u8,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        info!(
            "📊 Reading {} registers from slave {} starting at address 0x{:04x}",
            count, slave_id, start_addr
        );

        let request = ReadHoldingRegisters::new(slave_id, start_addr, count)?;
        let response = self.exchange(&request)?;

        ModbusResponse::parse(&request, &response)?.into_registers()
    }
}

fn map_io(context: &str, err: std::io::Error) -> ModbusError {
    match ModbusError::from(err) {
        ModbusError::CommunicationError(msg) => {
            ModbusError::CommunicationError(format!("{}: {}", context, msg))
        }
        other => other,
    }
}

/// Reads one response: either `expected_len` bytes, or a shorter exception reply.
fn read_response<R: Read>(reader: &mut R, expected_len: usize) -> Result<Vec<u8>, ModbusError> {
    let mut response = Vec::with_capacity(expected_len);
    let mut chunk = [0u8; 256];

    loop {
        let target = if response.len() >= 2 && response[1] & EXCEPTION_FLAG != 0 {
            EXCEPTION_RESPONSE_LEN
        } else {
            expected_len
        };

        if response.len() >= target {
            if response.len() > target {
                warn!(
                    "Discarding {} trailing bytes after response",
                    response.len() - target
                );
                response.truncate(target);
            }
            return Ok(response);
        }

        let n = reader.read(&mut chunk).map_err(|e| map_io("Read failed", e))?;
        if n == 0 {
            return Err(ModbusError::InvalidResponse(format!(
                "connection closed after {} of {} bytes",
                response.len(),
                target
            )));
        }
        response.extend_from_slice(&chunk[..n]);
    }
}
