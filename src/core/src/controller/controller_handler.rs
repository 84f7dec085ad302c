use log::{debug, error, info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::configuration::Config;
use crate::controller::event_router::{EventRouter, Outcome};
use crate::error_handling::types::*;
use crate::event_taxonomy::{CorrelatorPattern, RawEvent};
use crate::output::build_outputs;

/// Where newline-delimited events are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// `-` is standard input, anything else a file path.
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            InputSource::Stdin
        } else {
            InputSource::File(PathBuf::from(arg))
        }
    }

    pub fn label(&self) -> String {
        match self {
            InputSource::Stdin => "stdin".to_string(),
            InputSource::File(path) => path.display().to_string(),
        }
    }
}

/// Counters for one or more ingested sources.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub unparsable: u64,
    pub sink_failures: u64,
}

impl IngestStats {
    pub fn merge(&mut self, other: IngestStats) {
        self.lines += other.lines;
        self.delivered += other.delivered;
        self.dropped += other.dropped;
        self.unparsable += other.unparsable;
        self.sink_failures += other.sink_failures;
    }
}

/// Owns the router and feeds it from input sources.
///
/// The router sits behind one mutex, so events from concurrent sources are
/// serialized and each is fully dispatched before the next one starts.
pub struct Controller {
    router: Mutex<EventRouter>,
}

impl Controller {
    pub fn new(config: &Config) -> Result<Self, ControllerError> {
        info!("Creating controller");
        let pattern = CorrelatorPattern::new(&config.honeypot.transport_class)
            .map_err(|e| ConfigError::InvalidValue(format!("transport_class: {}", e)))?;
        let sensor = config.sensor();
        info!("Sensor name: {}", sensor);

        let mut router = EventRouter::new(sensor, pattern);
        for (sink, table) in build_outputs(config)? {
            let name = sink.name().to_string();
            if let Err(e) = router.attach(sink, &table) {
                error!("Unable to start output '{}': {}", name, e);
                for failure in router.shutdown() {
                    warn!("Output '{}' failed to stop: {}", failure.sink, failure.error);
                }
                return Err(ControllerError::SinkError(name, e));
            }
            info!("Output '{}' enabled", name);
        }
        if router.sink_count() == 0 {
            warn!("No output enabled, events will be correlated and discarded");
        }
        Ok(Self::from_router(router))
    }

    pub fn from_router(router: EventRouter) -> Self {
        Self {
            router: Mutex::new(router),
        }
    }

    // A panic inside one sink must not wedge every other input.
    fn router(&self) -> MutexGuard<'_, EventRouter> {
        self.router.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn emit(&self, raw: &RawEvent) -> Result<Outcome, RouterError> {
        self.router().emit(raw)
    }

    /// Read `reader` line by line and emit each JSON object.
    ///
    /// Lines that are not JSON objects are counted and skipped. A router
    /// error ends ingestion of this reader.
    pub fn ingest<R: BufRead>(&self, reader: R, origin: &str) -> Result<IngestStats, ControllerError> {
        let mut stats = IngestStats::default();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            stats.lines += 1;
            let raw = match RawEvent::from_json_line(line) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("[{}] Skipping line {}: {}", origin, stats.lines, e);
                    stats.unparsable += 1;
                    continue;
                }
            };
            match self.emit(&raw) {
                Ok(Outcome::Delivered { failures, .. }) => {
                    stats.delivered += 1;
                    stats.sink_failures += failures.len() as u64;
                }
                Ok(Outcome::Dropped(_)) => stats.dropped += 1,
                Err(e) => {
                    error!("[{}] Line {}: {}", origin, stats.lines, e);
                    return Err(e.into());
                }
            }
        }
        info!(
            "[{}] Ingested {} line(s): {} delivered, {} dropped, {} unparsable",
            origin, stats.lines, stats.delivered, stats.dropped, stats.unparsable
        );
        Ok(stats)
    }

    fn ingest_source(&self, source: &InputSource) -> Result<IngestStats, ControllerError> {
        let label = source.label();
        match source {
            InputSource::Stdin => self.ingest(io::stdin().lock(), &label),
            InputSource::File(path) => {
                let file = File::open(path).map_err(|e| {
                    error!("Unable to open input {}: {}", path.display(), e);
                    ControllerError::IoError(e)
                })?;
                self.ingest(BufReader::new(file), &label)
            }
        }
    }

    /// Ingest every source concurrently, one thread each, until all reach
    /// end of input. No sources means standard input.
    pub fn run(&self, sources: &[InputSource]) -> Result<IngestStats, ControllerError> {
        let stdin_only = [InputSource::Stdin];
        let sources = if sources.is_empty() {
            &stdin_only[..]
        } else {
            sources
        };
        info!("Running controller over {} input(s)", sources.len());

        thread::scope(|scope| {
            let handles: Vec<_> = sources
                .iter()
                .map(|source| scope.spawn(move || self.ingest_source(source)))
                .collect();

            let mut total = IngestStats::default();
            let mut first_error = None;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(stats)) => total.merge(stats),
                    Ok(Err(e)) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            match first_error {
                Some(e) => Err(e),
                None => Ok(total),
            }
        })
    }

    /// Stop every output. Reports the first failure after all were stopped.
    pub fn shutdown(self) -> Result<(), ControllerError> {
        info!("Shutting down controller");
        let mut router = self
            .router
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let open = router.sessions().len();
        if open > 0 {
            debug!("{} session(s) still open at shutdown", open);
        }
        match router.shutdown().into_iter().next() {
            Some(failure) => Err(ControllerError::SinkError(failure.sink, failure.error)),
            None => Ok(()),
        }
    }
}
