pub mod formatters;

pub use formatters::{formatter_for, ConsoleFormatter, HexFormatter, JsonFormatter, ReadingFormatter};
