pub mod poller;

pub use poller::{PollExecution, PollStatus, PollSummary, Poller};
