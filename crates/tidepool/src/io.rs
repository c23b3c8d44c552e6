use std::{
    cell::RefCell,
    io::{self, Write as _},
    rc::Rc,
};

use boa_engine::{Context, JsResult};
use boa_gc::{Finalize, Trace};
use boa_runtime::{ConsoleState, Logger};
use chrono::{DateTime, Utc};

/// Severity class of one captured log entry.
///
/// `Warning` and `Error` are the elevated kinds; results group entries by
/// this split so hosts can render them on separate streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Plain `console.log` / `console.debug` output.
    Message,
    /// `console.info` output.
    Info,
    /// `console.warn` output.
    Warning,
    /// `console.error` output.
    Error,
}

impl LogKind {
    /// True for kinds that route to the elevated output group.
    #[must_use]
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::Warning | Self::Error)
    }
}

/// One captured console emission.
///
/// Entries are flushed into each execution result and never persisted on the
/// context.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LogEntry {
    /// Severity class.
    pub kind: LogKind,
    /// The formatted message text.
    pub text: String,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Creates an entry timestamped now.
    #[must_use]
    pub fn new(kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Shared capture buffer the console logger writes into.
///
/// Shared between the engine-registered logger and the owning context, which
/// drains it after every execution.
pub type LogBuffer = Rc<RefCell<Vec<LogEntry>>>;

/// Console logger that records entries into a shared buffer.
///
/// Installed on an execution surface in place of the default stdout console;
/// the owning context drains the buffer into each `ExecutionResult`.
#[derive(Debug, Trace, Finalize)]
pub struct BufferLogger {
    /// Destination buffer, shared with the owning context.
    #[unsafe_ignore_trace]
    buffer: LogBuffer,
}

impl BufferLogger {
    /// Creates a logger writing into `buffer`.
    #[must_use]
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }

    fn push(&self, kind: LogKind, text: String) {
        self.buffer.borrow_mut().push(LogEntry::new(kind, text));
    }
}

impl Logger for BufferLogger {
    fn log(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        self.push(LogKind::Message, msg);
        Ok(())
    }

    fn info(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        self.push(LogKind::Info, msg);
        Ok(())
    }

    fn warn(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        self.push(LogKind::Warning, msg);
        Ok(())
    }

    fn error(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        self.push(LogKind::Error, msg);
        Ok(())
    }
}

/// Trait for handling log entries drained from an execution result.
///
/// Implement this to capture or redirect console output from executed
/// snippets. `StdLogSink` writes to stdout/stderr, `CollectLogSink` gathers
/// entries for inspection, `NoLogSink` discards everything.
pub trait LogSink {
    /// Called once per drained entry, in capture order.
    fn write(&mut self, entry: LogEntry);
}

/// Default sink: plain kinds to stdout, elevated kinds to stderr.
#[derive(Debug, Default)]
pub struct StdLogSink;

impl LogSink for StdLogSink {
    fn write(&mut self, entry: LogEntry) {
        if entry.kind.is_elevated() {
            let _ = writeln!(io::stderr(), "{}", entry.text);
        } else {
            let _ = writeln!(io::stdout(), "{}", entry.text);
        }
    }
}

/// A sink that collects all entries.
///
/// Useful for testing or capturing console output programmatically.
#[derive(Debug, Default)]
pub struct CollectLogSink(Vec<LogEntry>);

impl CollectLogSink {
    /// Creates a new empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns the collected entries.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.0
    }

    /// Consumes the sink and returns the collected entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<LogEntry> {
        self.0
    }
}

impl LogSink for CollectLogSink {
    fn write(&mut self, entry: LogEntry) {
        self.0.push(entry);
    }
}

/// Sink that ignores all entries.
#[derive(Debug, Default)]
pub struct NoLogSink;

impl LogSink for NoLogSink {
    fn write(&mut self, _entry: LogEntry) {}
}
