//! Batch log sinks.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::info;

/// Line-oriented sink for batch output.
pub trait BatchLog {
    fn write_line(&mut self, line: &str);

    fn run_beginning(&mut self, started: DateTime<Utc>) {
        self.write_line(&format!(
            "Run started at {}",
            started.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    fn run_ended(&mut self, ended: DateTime<Utc>) {
        self.write_line(&format!(
            "Run ended at {}",
            ended.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    fn cancel_requested(&mut self) {
        self.write_line("Run cancelled");
    }
}

/// Prints lines to stdout and mirrors them to the `log` facade.
#[derive(Debug, Default)]
pub struct ConsoleBatchLog;

impl BatchLog for ConsoleBatchLog {
    fn write_line(&mut self, line: &str) {
        println!("{}", line);
        info!(target: "batch", "{}", line);
    }
}

/// Collects lines in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryBatchLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryBatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn text(&self) -> String {
        self.lines().join("\n")
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.lines().iter().any(|line| line.contains(fragment))
    }
}

impl BatchLog for MemoryBatchLog {
    fn write_line(&mut self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_log_shares_buffer() {
        let log = MemoryBatchLog::new();
        let mut writer = log.clone();
        writer.write_line("one");
        writer.cancel_requested();
        assert_eq!(log.lines(), vec!["one", "Run cancelled"]);
        assert!(log.contains("cancel"));
    }

    #[test]
    fn test_run_markers() {
        let mut log = MemoryBatchLog::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        log.run_beginning(at);
        log.run_ended(at);
        assert_eq!(
            log.lines(),
            vec![
                "Run started at 2024-03-01 12:30:00",
                "Run ended at 2024-03-01 12:30:00"
            ]
        );
    }
}
