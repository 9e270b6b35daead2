use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};

use crate::devices::RegisterReading;
use crate::utils::error::ModbusError;

/// Outcome of one poll, named after the master's execution states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollStatus {
    Completed,
    ErrorTimeout,
    ErrorTcp,
    ErrorApp,
}

impl PollStatus {
    pub fn from_error(err: &ModbusError) -> Self {
        match err {
            ModbusError::Timeout => PollStatus::ErrorTimeout,
            ModbusError::ConnectionError(_) | ModbusError::CommunicationError(_) => {
                PollStatus::ErrorTcp
            }
            _ => PollStatus::ErrorApp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PollExecution {
    pub sequence: u32,
    pub started_at: DateTime<Utc>,
    pub status: PollStatus,
    pub reading: Option<RegisterReading>,
    pub error: Option<String>,
}

/// Execution history of one polling run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollSummary {
    pub executions: Vec<PollExecution>,
}

impl PollSummary {
    pub fn completed(&self) -> usize {
        self.executions
            .iter()
            .filter(|e| e.status == PollStatus::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.executions.len() - self.completed()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.executions.iter().rev().find_map(|e| e.error.as_deref())
    }
}

/// Runs a read `repeat` times, starting one every `interval`.
///
/// A failed poll is recorded and polling continues; there is no retry of the
/// failed poll itself.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    interval: Duration,
    repeat: u32,
}

impl Poller {
    pub fn new(interval: Duration, repeat: u32) -> Result<Self, ModbusError> {
        if repeat == 0 {
            return Err(ModbusError::ConfigError("repeat must be at least 1".to_string()));
        }
        Ok(Self { interval, repeat })
    }

    pub fn run<R, S>(&self, mut read: R, mut on_execution: S) -> PollSummary
    where
        R: FnMut() -> Result<RegisterReading, ModbusError>,
        S: FnMut(&PollExecution),
    {
        let mut summary = PollSummary::default();

        for sequence in 1..=self.repeat {
            let started = Instant::now();
            let started_at = Utc::now();

            let execution = match read() {
                Ok(reading) => PollExecution {
                    sequence,
                    started_at,
                    status: PollStatus::Completed,
                    reading: Some(reading),
                    error: None,
                },
                Err(e) => {
                    warn!("Poll {} failed: {}", sequence, e);
                    PollExecution {
                        sequence,
                        started_at,
                        status: PollStatus::from_error(&e),
                        reading: None,
                        error: Some(e.to_string()),
                    }
                }
            };

            info!("Poll {}/{} executed. Status: {:?}", sequence, self.repeat, execution.status);
            on_execution(&execution);
            summary.executions.push(execution);

            if sequence < self.repeat {
                thread::sleep(self.interval.saturating_sub(started.elapsed()));
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(value: u16) -> RegisterReading {
        RegisterReading::new(1, 0x04, vec![value], 100.0)
    }

    #[test]
    fn test_zero_repeat_rejected() {
        assert!(Poller::new(Duration::ZERO, 0).is_err());
    }

    #[test]
    fn test_runs_requested_number_of_polls() {
        let poller = Poller::new(Duration::from_millis(5), 3).unwrap();
        let mut calls = 0u16;
        let mut seen = Vec::new();

        let summary = poller.run(
            || {
                calls += 1;
                Ok(reading(calls * 100))
            },
            |execution| seen.push(execution.sequence),
        );

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(summary.completed(), 3);
        assert_eq!(summary.failed(), 0);
        assert_eq!(summary.executions[2].reading.as_ref().unwrap().raw, vec![300]);
    }

    #[test]
    fn test_failures_are_recorded_and_polling_continues() {
        let poller = Poller::new(Duration::ZERO, 3).unwrap();
        let mut outcomes = vec![
            Err(ModbusError::ConnectionError("refused".to_string())),
            Err(ModbusError::Timeout),
            Ok(reading(4550)),
        ]
        .into_iter();

        let summary = poller.run(|| outcomes.next().unwrap(), |_| {});

        let statuses: Vec<PollStatus> = summary.executions.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![PollStatus::ErrorTcp, PollStatus::ErrorTimeout, PollStatus::Completed]
        );
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.last_error(), Some("Timeout occurred"));
    }

    #[test]
    fn test_interval_spaces_polls() {
        let poller = Poller::new(Duration::from_millis(30), 3).unwrap();
        let started = Instant::now();
        poller.run(|| Ok(reading(1)), |_| {});
        // two gaps between three polls, none after the last
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_crc_failure_is_app_error() {
        let err = ModbusError::CrcError { expected: 1, received: 2 };
        assert_eq!(PollStatus::from_error(&err), PollStatus::ErrorApp);
    }
}
