pub mod commands;

pub use commands::{build_cli, decode_hex, handle_subcommands};
