use crate::devices::system_monitor::UNAVAILABLE;
use crate::devices::RegisterReading;
use crate::utils::error::ModbusError;

pub trait ReadingFormatter: Send + Sync {
    fn format_reading(&self, reading: &RegisterReading) -> String;
}

/// Picks a formatter by its `--format` name.
pub fn formatter_for(name: &str) -> Result<Box<dyn ReadingFormatter>, ModbusError> {
    match name {
        "console" => Ok(Box::new(ConsoleFormatter)),
        "json" => Ok(Box::new(JsonFormatter)),
        "hex" => Ok(Box::new(HexFormatter)),
        other => Err(ModbusError::ConfigError(format!("unknown output format '{}'", other))),
    }
}

pub struct ConsoleFormatter;

impl ReadingFormatter for ConsoleFormatter {
    fn format_reading(&self, reading: &RegisterReading) -> String {
        let label = match reading.metric {
            Some(metric) => format!("{} (0x{:04x})", metric, reading.address),
            None => format!("register 0x{:04x}", reading.address),
        };

        let mut output = format!("Slave ID: {}\n", reading.slave_id);
        output.push_str(&format!("Register: {}\n", label));

        let first = match reading.raw.first() {
            Some(&UNAVAILABLE) => {
                output.push_str("Value: unavailable (0xFFFF)\n");
                return output;
            }
            Some(first) => first,
            None => {
                output.push_str("Value: no registers returned\n");
                return output;
            }
        };

        output.push_str(&format!("Metric Value (Scaled): {}\n", first));
        output.push_str(&format!("Real Value: {:.2}%\n", reading.scaled));
        if reading.raw.len() > 1 {
            let rest: Vec<String> = reading.raw[1..].iter().map(|v| v.to_string()).collect();
            output.push_str(&format!("Following registers: {}\n", rest.join(", ")));
        }
        output
    }
}

pub struct JsonFormatter;

impl ReadingFormatter for JsonFormatter {
    fn format_reading(&self, reading: &RegisterReading) -> String {
        let value = if reading.is_unavailable() {
            None
        } else {
            Some(reading.scaled)
        };

        let json_data = serde_json::json!({
            "slave_id": reading.slave_id,
            "timestamp": reading.timestamp.to_rfc3339(),
            "register": reading.address,
            "metric": reading.metric,
            "raw": reading.raw,
            "value": value,
        });

        serde_json::to_string_pretty(&json_data).unwrap_or_default()
    }
}

pub struct HexFormatter;

impl ReadingFormatter for HexFormatter {
    fn format_reading(&self, reading: &RegisterReading) -> String {
        let bytes: Vec<u8> = reading.raw.iter().flat_map(|v| v.to_be_bytes()).collect();
        format!(
            "slave={} register=0x{:04x} data={}",
            reading.slave_id,
            reading.address,
            hex::encode(bytes)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_reading() -> RegisterReading {
        RegisterReading::new(1, 0x04, vec![4550], 100.0)
    }

    #[test]
    fn test_console_format() {
        let output = ConsoleFormatter.format_reading(&cpu_reading());
        assert!(output.contains("Slave ID: 1"));
        assert!(output.contains("cpu (0x0004)"));
        assert!(output.contains("Real Value: 45.50%"));
    }

    #[test]
    fn test_console_format_unavailable() {
        let reading = RegisterReading::new(1, 0x20, vec![0xFFFF], 100.0);
        let output = ConsoleFormatter.format_reading(&reading);
        assert!(output.contains("unavailable"));
        assert!(output.contains("register 0x0020"));
    }

    #[test]
    fn test_console_format_empty_reading() {
        let reading = RegisterReading::new(1, 0x04, Vec::new(), 100.0);
        let output = ConsoleFormatter.format_reading(&reading);
        assert!(output.contains("no registers returned"));
    }

    #[test]
    fn test_json_format() {
        let output = JsonFormatter.format_reading(&cpu_reading());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["metric"], "cpu");
        assert_eq!(value["raw"][0], 4550);
        assert_eq!(value["value"], 45.5);
    }

    #[test]
    fn test_hex_format() {
        let reading = RegisterReading::new(1, 0x04, vec![0x11C6, 0x0001], 100.0);
        assert_eq!(
            HexFormatter.format_reading(&reading),
            "slave=1 register=0x0004 data=11c60001"
        );
    }

    #[test]
    fn test_formatter_lookup() {
        assert!(formatter_for("json").is_ok());
        assert!(formatter_for("xml").is_err());
    }
}
