//! Driver backend for frames that were already decoded upstream and arrive
//! as text, one frame per line: a USB bridge that prints `1,150,80,0,0,150`,
//! or a capture file recorded from one.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Level};

use crate::{DriverFactory, RadarDriver, RawFrame, Verbosity};

/// The radar reports at 10 Hz; recorded files are replayed at the same pace.
pub const REPLAY_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on how long the reader thread goes without checking for stop.
/// `stop()` blocks for at most about this long.
pub const POLL_TICK: Duration = Duration::from_millis(50);

const EOF_WAIT: Duration = Duration::from_millis(500);

pub enum FrameSource {
    Serial(BufReader<Box<dyn tokio_serial::SerialPort>>),
    File(BufReader<std::fs::File>),
}

impl FrameSource {
    pub fn serial(dev: &str, baud: u32) -> Result<Self> {
        let port = tokio_serial::new(dev, baud)
            .timeout(POLL_TICK)
            .open()
            .with_context(|| format!("open serial {}", dev))?;
        Ok(Self::Serial(BufReader::new(port)))
    }

    pub fn file(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path).with_context(|| format!("open frame capture {}", path))?;
        Ok(Self::File(BufReader::new(f)))
    }

    pub fn open(path: &str, baud: u32) -> Result<Self> {
        if is_serial_path(path) { Self::serial(path, baud) } else { Self::file(path) }
    }
}

/// How end-of-input is treated: a serial port returning 0 bytes is gone,
/// a capture file may still grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Serial,
    File,
}

pub fn is_serial_path(path: &str) -> bool {
    if path.starts_with("/dev/") {
        return true;
    }
    let upper = path.to_ascii_uppercase();
    match upper.strip_prefix("COM") {
        Some(n) => !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Accepts `1,150,80,0,0,150`, `1 150 80 0 0 150` and `[1, 150, 80, 0, 0, 150]`.
/// The element count is not checked here; the adapter decides what shape it trusts.
pub fn parse_frame_line(s: &str) -> Option<RawFrame> {
    let s = s.trim();
    let s = s.strip_prefix('[').unwrap_or(s);
    let s = s.strip_suffix(']').unwrap_or(s);
    let mut out = Vec::new();
    for tok in s.split(|c: char| c == ',' || c.is_whitespace()) {
        if tok.is_empty() { continue; }
        out.push(tok.parse::<i64>().ok()?);
    }
    if out.is_empty() { None } else { Some(out) }
}

/// State shared between a [`LineDriver`] and its reader thread.
#[derive(Default)]
pub struct Shared {
    latest: Mutex<Option<Vec<RawFrame>>>,
    running: AtomicBool,
}

impl Shared {
    fn set_latest(&self, data: Option<Vec<RawFrame>>) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = data;
    }

    pub fn latest(&self) -> Option<Vec<RawFrame>> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

pub struct LineDriver {
    path: String,
    verbosity: Verbosity,
    source: Option<FrameSource>,
    shared: Arc<Shared>,
    reader: Option<JoinHandle<()>>,
}

impl LineDriver {
    pub fn open(path: &str, baud: u32, verbosity: Verbosity) -> Result<Self> {
        let source = FrameSource::open(path, baud)?;
        if verbosity.enabled(Level::INFO) {
            info!("ld2410: opened {} @ {}", path, baud);
        }
        Ok(Self {
            path: path.to_string(),
            verbosity,
            source: Some(source),
            shared: Arc::new(Shared::default()),
            reader: None,
        })
    }
}

impl RadarDriver for LineDriver {
    fn start(&mut self) -> Result<()> {
        anyhow::ensure!(self.reader.is_none(), "ld2410 {}: already started", self.path);
        let src = self.source.take()
            .with_context(|| format!("ld2410 {}: port already released", self.path))?;

        self.shared.running.store(true, Ordering::Release);
        let shared = self.shared.clone();
        let verbosity = self.verbosity;
        let path = self.path.clone();
        let reader = std::thread::Builder::new()
            .name("ld2410-reader".into())
            .spawn(move || match src {
                FrameSource::Serial(r) => poll_loop(r, SourceKind::Serial, &shared, verbosity, &path),
                FrameSource::File(r) => poll_loop(r, SourceKind::File, &shared, verbosity, &path),
            })
            .context("spawn ld2410 reader")?;
        self.reader = Some(reader);

        if self.verbosity.enabled(Level::INFO) {
            info!("ld2410: polling {}", self.path);
        }
        Ok(())
    }

    /// Returns once the reader thread has exited and the port is closed.
    fn stop(&mut self) -> Result<()> {
        self.shared.running.store(false, Ordering::Release);
        self.source = None;
        if let Some(t) = self.reader.take() {
            t.join().map_err(|_| anyhow::anyhow!("ld2410 {}: reader thread panicked", self.path))?;
            if self.verbosity.enabled(Level::INFO) {
                info!("ld2410: stopped {}", self.path);
            }
        }
        Ok(())
    }

    fn get_data(&self) -> Option<Vec<RawFrame>> {
        self.shared.latest()
    }
}

impl Drop for LineDriver {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(t) = self.reader.take() {
            let _ = t.join();
        }
    }
}

/// Reads frames until stopped, the port goes away, or an I/O error.
/// Clears the latest frame on the way out so a dead source reads as no data.
pub fn poll_loop<R: BufRead>(
    mut reader: R,
    kind: SourceKind,
    shared: &Shared,
    verbosity: Verbosity,
    path: &str,
) {
    let mut buf = Vec::new();
    while shared.running() {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) if buf.is_empty() => match kind {
                SourceKind::Serial => {
                    if verbosity.enabled(Level::WARN) {
                        warn!("ld2410 {}: serial port closed", path);
                    }
                    break;
                }
                // EOF: wait for more lines
                SourceKind::File => nap(shared, EOF_WAIT),
            },
            Ok(_) if !buf.ends_with(b"\n") && kind == SourceKind::File => {
                // partial last line of a growing capture; keep it and wait
                nap(shared, EOF_WAIT);
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                buf.clear();
                let s = line.trim();
                if s.is_empty() || s.starts_with('#') {
                    continue;
                }
                match parse_frame_line(s) {
                    Some(frame) => {
                        if verbosity.enabled(Level::DEBUG) {
                            debug!("ld2410 {}: frame {:?}", path, frame);
                        }
                        shared.set_latest(Some(vec![frame]));
                        if kind == SourceKind::File {
                            nap(shared, REPLAY_INTERVAL);
                        }
                    }
                    None => {
                        if verbosity.enabled(Level::DEBUG) {
                            debug!("ld2410 {}: skipping unparsable line {:?}", path, s);
                        }
                    }
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
            Err(e) => {
                if verbosity.enabled(Level::WARN) {
                    warn!("ld2410 {}: poll loop ended: {}", path, e);
                }
                break;
            }
        }
    }
    shared.set_latest(None);
}

// Sleeps in POLL_TICK steps so a stop request is seen promptly.
fn nap(shared: &Shared, d: Duration) {
    let until = Instant::now() + d;
    while shared.running() {
        let now = Instant::now();
        if now >= until { break; }
        std::thread::sleep((until - now).min(POLL_TICK));
    }
}

/// Opens [`LineDriver`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFactory;

impl DriverFactory for LineFactory {
    fn open(&self, path: &str, baud: u32, verbosity: Verbosity) -> Result<Box<dyn RadarDriver>> {
        Ok(Box::new(LineDriver::open(path, baud, verbosity)?))
    }
}
