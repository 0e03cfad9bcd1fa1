//! Log sinks for witness computation.
//!
//! Programs may emit log lines while their witness is computed. The engine
//! hands each line to a [`Logger`] in emission order; a logger may be called
//! any number of times per call, including zero. Loggers cannot influence the
//! computation.

use std::sync::Mutex;

/// Receives one human-readable line per call.
pub trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

impl<F> Logger for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Prints every line to stdout. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutLogger;

impl Logger for StdoutLogger {
    fn log(&self, message: &str) {
        println!("{message}");
    }
}

/// Forwards every line to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "zk_provider::witness", "{message}");
    }
}

/// Buffers lines in memory.
#[derive(Debug, Default)]
pub struct CollectingLogger {
    lines: Mutex<Vec<String>>,
}

impl CollectingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines received so far, in order.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Logger for CollectingLogger {
    fn log(&self, message: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(message.to_string());
    }
}
