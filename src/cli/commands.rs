use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use log::info;

use crate::config::ClientConfig;
use crate::devices::SystemMonitorDevice;
use crate::modbus::crc::{build_packet, check_packet, crc16_modbus, FrameError};
use crate::modbus::ModbusTcpClient;
use crate::output::formatter_for;
use crate::services::Poller;

pub fn build_cli() -> Command {
    Command::new("rtu-probe")
        .version(crate::VERSION)
        .about("Modbus RTU-over-TCP diagnostic client")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("TOML configuration file"),
        )
        .arg(Arg::new("host").long("host").global(true).help("Slave host name or IP"))
        .arg(Arg::new("port").long("port").short('p').global(true).help("Slave TCP port"))
        .arg(Arg::new("slave").long("slave").short('s').global(true).help("Slave address (1-247)"))
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .global(true)
                .help("Connect/read/write timeout in milliseconds"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .global(true)
                .value_parser(["console", "json", "hex"])
                .default_value("console")
                .help("Output format for readings"),
        )
        .subcommand(
            Command::new("read")
                .about("Read holding registers from the slave (default)")
                .arg(
                    Arg::new("register")
                        .long("register")
                        .short('r')
                        .help("Start register, decimal or 0x-prefixed"),
                )
                .arg(
                    Arg::new("metric")
                        .long("metric")
                        .short('m')
                        .conflicts_with("register")
                        .help("cpu, ram or disk"),
                )
                .arg(Arg::new("count").long("count").short('n').help("Number of registers"))
                .arg(Arg::new("scale").long("scale").help("Divisor applied to the first register"))
                .arg(
                    Arg::new("interval")
                        .long("interval")
                        .short('i')
                        .help("Milliseconds between the start of consecutive polls"),
                )
                .arg(
                    Arg::new("repeat")
                        .long("repeat")
                        .help("Number of polls to run (default 1)"),
                ),
        )
        .subcommand(
            Command::new("crc")
                .about("Compute the Modbus CRC-16 of a hex frame and print the packet")
                .arg(Arg::new("frame").required(true).num_args(1..).help("Frame bytes in hex")),
        )
        .subcommand(
            Command::new("verify")
                .about("Check the trailing CRC of a hex packet")
                .arg(Arg::new("packet").required(true).num_args(1..).help("Packet bytes in hex")),
        )
        .subcommand(
            Command::new("init-config")
                .about("Write the default configuration file")
                .arg(Arg::new("path").required(true)),
        )
}

/// Runs the selected subcommand. `Ok(false)` means the command ran but the
/// check it performed failed.
pub fn handle_subcommands(matches: &ArgMatches) -> Result<bool> {
    match matches.subcommand() {
        Some(("crc", sub)) => {
            let frame = parse_hex_args(sub, "frame")?;
            let crc = crc16_modbus(&frame);
            println!("CRC: 0x{:04x}", crc);
            println!("Wire bytes (low, high): {:02x} {:02x}", crc & 0xFF, crc >> 8);
            println!("Packet: {}", hex::encode(build_packet(&frame)));
            Ok(true)
        }
        Some(("verify", sub)) => {
            let packet = parse_hex_args(sub, "packet")?;
            match check_packet(&packet) {
                Ok(body) => {
                    println!("✅ Valid packet, {} frame bytes: {}", body.len(), hex::encode(body));
                    Ok(true)
                }
                Err(FrameError::TooShort { len }) => {
                    println!("❌ Invalid packet: {} bytes cannot carry a checksum", len);
                    Ok(false)
                }
                Err(FrameError::ChecksumMismatch { expected, received }) => {
                    println!(
                        "❌ Invalid packet: calculated 0x{:04x}, received 0x{:04x}",
                        expected, received
                    );
                    Ok(false)
                }
            }
        }
        Some(("init-config", sub)) => {
            let path = sub
                .get_one::<String>("path")
                .context("missing configuration path")?;
            ClientConfig::default().save_to_file(path)?;
            println!("📝 Wrote default configuration to {}", path);
            Ok(true)
        }
        // `read` and no subcommand at all
        _ => {
            let config = ClientConfig::from_matches(matches)?;
            poll_slave(&config, matches)
        }
    }
}

fn poll_slave(config: &ClientConfig, matches: &ArgMatches) -> Result<bool> {
    let format = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("console");
    let formatter = formatter_for(format)?;

    let request = crate::modbus::ReadHoldingRegisters::new(
        config.slave_id,
        config.register,
        config.quantity,
    )?;
    info!("📤 Request packet: {}", hex::encode(request.packet()));

    let device = SystemMonitorDevice::new(config.slave_id, config.scale);
    let poller = Poller::new(config.poll_interval(), config.repeat)?;

    // A fresh connection per poll, so a timed-out exchange cannot desync the next one.
    let summary = poller.run(
        || {
            let client = ModbusTcpClient::connect(&config.address(), config.timeout())?;
            device.read_registers(&client, config.register, config.quantity)
        },
        |execution| match &execution.reading {
            Some(reading) => println!("{}", formatter.format_reading(reading)),
            None => println!(
                "❌ Poll {} {:?}: {}",
                execution.sequence,
                execution.status,
                execution.error.as_deref().unwrap_or("unknown error")
            ),
        },
    );

    if summary.completed() == 0 {
        bail!(
            "all {} polls of {} failed, last error: {}",
            summary.executions.len(),
            config.address(),
            summary.last_error().unwrap_or("unknown error")
        );
    }

    if config.repeat > 1 {
        println!(
            "📊 {} polls: {} completed, {} failed",
            summary.executions.len(),
            summary.completed(),
            summary.failed()
        );
    }

    let any_unavailable = summary
        .executions
        .iter()
        .filter_map(|e| e.reading.as_ref())
        .any(|r| r.is_unavailable());
    Ok(summary.failed() == 0 && !any_unavailable)
}

/// Joins all positional values and decodes them as hex, ignoring spaces,
/// `:`/`-` separators and `0x` prefixes.
pub fn parse_hex_args(matches: &ArgMatches, id: &str) -> Result<Vec<u8>> {
    let joined: String = matches
        .get_many::<String>(id)
        .map(|values| values.map(String::as_str).collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    decode_hex(&joined)
}

pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input
        .split(|c: char| c.is_whitespace() || c == ':' || c == '-' || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();

    hex::decode(&cleaned).with_context(|| format!("'{}' is not valid hex", input))
}
