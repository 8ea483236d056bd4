//! Streaming acquisition loop and CSV profile sink.
//!
//! One worker thread owns the [`Session`] and the output sink for the
//! duration of a recording. The controlling thread holds a
//! [`RecorderHandle`]: it may request cancellation at any time, but the
//! request is only honored between record batches, so a record's samples
//! are never split across a stop boundary. The poll for data blocks up to
//! [`crate::driver::RECEIVE_TIMEOUT`] per iteration, which doubles as the
//! cancellation-check granularity.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::driver::{ProfileRecord, Status, INVALID_RANGE, RECEIVE_TIMEOUT};
use crate::encoder::EncoderConfig;
use crate::error::{AppResult, DaqError};
use crate::response::describe;
use crate::session::Session;

/// Where and how to record.
#[derive(Clone, Debug)]
pub struct RecordingOptions {
    /// Target CSV file. A pre-existing file is removed best-effort; if
    /// removal fails the recording appends to the stale file instead of
    /// aborting.
    pub output: PathBuf,
    /// Free-text second header line.
    pub comment: String,
    /// Bounded wait per data poll.
    pub receive_timeout: Duration,
}

impl RecordingOptions {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            comment: format!(
                "Recorded by laserdaq {} starting {}",
                env!("CARGO_PKG_VERSION"),
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            receive_timeout: RECEIVE_TIMEOUT,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Counters reported when a recording stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordingStats {
    pub records: u64,
    pub samples_written: u64,
    pub samples_skipped: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopState {
    Idle,
    Started,
    Streaming,
    Stopped,
}

/// Append-only CSV sink for physical-unit (X, Y, Z) triples.
///
/// Mid-stream write failures do not abort the recording: the first one is
/// logged, the sink keeps accepting samples, and the failure is reported
/// again at close as a possible-data-loss warning. The scan already
/// happened; informing the operator is the best remaining action.
pub struct ProfileWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    write_failed: bool,
}

impl ProfileWriter {
    /// Removes any stale file at `path` (best-effort) and opens the sink
    /// in append mode with the two-line header. Failure to open at all is
    /// fatal.
    pub fn create(path: &Path, comment: &str) -> AppResult<Self> {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(
                    "Unable to overwrite '{}', appending: {}",
                    path.display(),
                    err
                );
            }
        }
        let open = || -> std::io::Result<File> {
            let mut file = OpenOptions::new().append(true).create(true).open(path)?;
            writeln!(file, "# File format: X Position [mm], Y Position [mm], Z Range [mm]")?;
            writeln!(file, "# {}", comment)?;
            Ok(file)
        };
        let file = open().map_err(|err| {
            error!("Unable to open/write to output file '{}', aborting", path.display());
            DaqError::Io(err)
        })?;
        Ok(Self {
            writer: csv::WriterBuilder::new().has_headers(false).from_writer(file),
            path: path.to_path_buf(),
            write_failed: false,
        })
    }

    /// Appends one sample line and flushes it. Durability is favored over
    /// throughput; sample rates are bounded by physical motion.
    pub fn write_sample(&mut self, x_mm: f64, y_mm: f64, z_mm: f64) {
        let result = self
            .writer
            .write_record([x_mm.to_string(), y_mm.to_string(), z_mm.to_string()])
            .and_then(|()| self.writer.flush().map_err(csv::Error::from));
        if let Err(err) = result {
            if !self.write_failed {
                warn!("Error writing to '{}': {}", self.path.display(), err);
                self.write_failed = true;
            }
        }
    }

    /// Final flush and close. Returns false when any write or the final
    /// flush failed, in which case a data-loss warning has been logged.
    pub fn close(mut self) -> bool {
        let flushed = self.writer.flush().is_ok();
        let clean = flushed && !self.write_failed;
        if !clean {
            warn!(
                "Encountered error writing to '{}', data may have been lost",
                self.path.display()
            );
        }
        clean
    }
}

/// Controller-side handle to a running recording.
pub struct RecorderHandle {
    cancel: Arc<AtomicBool>,
    worker: thread::JoinHandle<(Session, AppResult<RecordingStats>)>,
}

impl RecorderHandle {
    /// Requests cancellation. Honored by the worker at the next safe
    /// boundary (between record batches, never mid-record).
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Blocks until the worker has observed cancellation and closed the
    /// sink, then returns the session for teardown along with the
    /// recording outcome.
    pub fn join(self) -> thread::Result<(Session, AppResult<RecordingStats>)> {
        self.worker.join()
    }
}

/// The acquisition state machine: Idle → Started → Streaming → Stopped.
pub struct Recorder {
    session: Session,
    encoder: EncoderConfig,
    options: RecordingOptions,
    cancel: Arc<AtomicBool>,
    state: LoopState,
    start_ticks: i64,
    last_ticks: i64,
    stats: RecordingStats,
}

impl Recorder {
    pub fn new(session: Session, encoder: EncoderConfig, options: RecordingOptions) -> Self {
        Self {
            session,
            encoder,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
            state: LoopState::Idle,
            start_ticks: 0,
            last_ticks: 0,
            stats: RecordingStats::default(),
        }
    }

    /// The cancellation flag shared with [`RecorderHandle`].
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Uses an externally owned cancellation flag instead of the
    /// recorder's own, so a controller set up before the recorder exists
    /// (a signal handler, say) can request the stop.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Moves the recorder onto a worker thread and returns the controller
    /// handle.
    pub fn spawn(self) -> AppResult<RecorderHandle> {
        let cancel = self.cancel_flag();
        let worker = thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || self.run())?;
        Ok(RecorderHandle { cancel, worker })
    }

    /// Runs the loop to completion on the current thread, returning the
    /// session to the caller for teardown.
    pub fn run(mut self) -> (Session, AppResult<RecordingStats>) {
        let outcome = self.acquire();
        self.state = LoopState::Stopped;
        debug!("Acquisition state: {:?}", self.state);
        (self.session, outcome)
    }

    fn acquire(&mut self) -> AppResult<RecordingStats> {
        let mut sink = ProfileWriter::create(&self.options.output, &self.options.comment)?;

        // The two fatal, never-retried failure points: the device must
        // start and the data channel must come up before any streaming.
        self.session
            .call("Start", |s| s.start())
            .map_err(fatal_init)?;
        self.state = LoopState::Started;
        debug!("Acquisition state: {:?}", self.state);
        self.session
            .call("ConnectData", |s| s.connect_data())
            .map_err(fatal_init)?;

        // Y positions are measured from the encoder reading at the start
        // of this recording.
        self.start_ticks = self
            .session
            .call("GetEncoder", |s| s.encoder_ticks())
            .map_err(fatal_init)?;
        self.last_ticks = self.start_ticks;
        self.state = LoopState::Streaming;
        debug!("Acquisition state: {:?}", self.state);
        info!("Streaming profiles to '{}'", self.options.output.display());

        let timeout = self.options.receive_timeout;
        while !self.cancel.load(Ordering::SeqCst) {
            match self.session.sensor_mut().receive_data(timeout) {
                Ok(batch) => {
                    // A received batch is processed entirely before the
                    // cancellation flag is rechecked.
                    for record in &batch {
                        self.process_record(&mut sink, record);
                    }
                }
                // No new record arrived within the timeout; keep polling.
                Err(Status::TimedOut) => {}
                Err(status) => debug!("{}", describe("ReceiveData", status)),
            }
        }

        debug!("Cancellation observed, closing sink");
        sink.close();
        Ok(self.stats)
    }

    fn process_record(&mut self, sink: &mut ProfileWriter, record: &ProfileRecord) {
        // One encoder reading per record; every sample in the record
        // shares the Y position it yields.
        let ticks = match self.session.call("GetEncoder", |s| s.encoder_ticks()) {
            Ok(ticks) => {
                self.last_ticks = ticks;
                ticks
            }
            Err(err) => {
                warn!("Encoder read failed mid-stream ({}), reusing last reading", err);
                self.last_ticks
            }
        };
        let y = (ticks - self.start_ticks) as f64 * self.encoder.resolution_mm;

        for (index, &raw) in record.ranges.iter().enumerate() {
            if raw == INVALID_RANGE {
                debug!("Invalid reading, skipped.");
                self.stats.samples_skipped += 1;
                continue;
            }
            let x = record.x_offset + record.x_resolution * index as f64;
            let z = record.z_offset + record.z_resolution * f64::from(raw);
            sink.write_sample(x, y, z);
            self.stats.samples_written += 1;
        }
        self.stats.records += 1;
    }
}

fn fatal_init(err: DaqError) -> DaqError {
    match err {
        DaqError::Driver { operation, status } => DaqError::AcquisitionInit { operation, status },
        other => other,
    }
}
