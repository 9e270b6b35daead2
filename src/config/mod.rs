pub mod settings;

pub use settings::{parse_register, ClientConfig};
