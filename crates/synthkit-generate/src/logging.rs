use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to open log file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to install subscriber: {0}")]
    Subscriber(String),
}

/// Writes JSON events with RFC 3339 UTC timestamps to `path`, appending.
///
/// Installs the global subscriber, so it can succeed once per process.
pub fn init_file_logging(path: &Path) -> Result<(), LoggingError> {
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(LogFile::append(path)?);
    install(tracing_subscriber::registry().with(layer))
}

/// Compact stderr output filtered by `filter`, e.g. `synthkit_generate=debug`.
pub fn init_stderr_logging(filter: &str) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_new(filter).map_err(|err| LoggingError::Subscriber(err.to_string()))?;
    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(io::stderr);
    install(tracing_subscriber::registry().with(filter).with(layer))
}

fn install(subscriber: impl SubscriberInitExt) -> Result<(), LoggingError> {
    subscriber
        .try_init()
        .map_err(|err| LoggingError::Subscriber(err.to_string()))
}

/// Log file shared by every event; each event holds the lock while written.
#[derive(Clone)]
struct LogFile(Arc<Mutex<File>>);

impl LogFile {
    fn append(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self(Arc::new(Mutex::new(file))))
    }

    /// A writer that panicked mid-event leaves the file usable.
    fn lock(&self) -> MutexGuard<'_, File> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = EventWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        EventWriter(self.lock())
    }
}

struct EventWriter<'a>(MutexGuard<'a, File>);

impl Write for EventWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}
