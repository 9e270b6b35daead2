pub mod system_monitor;

pub use system_monitor::{Metric, RegisterReading, SystemMonitorDevice};
