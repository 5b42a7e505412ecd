//! In-memory radar. Scripted output, injectable failures, and a record of
//! every open/start/stop so callers can check handle lifecycles.

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{DriverFactory, RadarDriver, RawFrame, Verbosity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Open(u32),
    Start(u32),
    Stop(u32),
}

#[derive(Debug, Clone, Default)]
pub struct SimStats {
    pub opens: u32,
    pub starts: u32,
    pub stops: u32,
    /// Handles opened and not yet stopped or dropped.
    pub live: u32,
    pub max_live: u32,
    pub last_open: Option<(String, u32, Verbosity)>,
    pub events: Vec<SimEvent>,
}

#[derive(Debug, Clone)]
enum Script {
    Fixed(Option<Vec<RawFrame>>),
    Cycle(VecDeque<Option<Vec<RawFrame>>>),
}

#[derive(Debug)]
struct SimState {
    script: Script,
    fail_open: Option<String>,
    fail_start: Option<String>,
    fail_stop: Option<String>,
    stats: SimStats,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            script: Script::Fixed(None),
            fail_open: None,
            fail_start: None,
            fail_stop: None,
            stats: SimStats::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimFactory {
    state: Arc<Mutex<SimState>>,
}

impl SimFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: Option<Vec<RawFrame>>) -> Self {
        let f = Self::new();
        f.set_data(data);
        f
    }

    /// A person walks in, stops at the desk, fidgets, leaves.
    pub fn demo() -> Self {
        let f = Self::new();
        f.set_cycle(vec![
            Some(vec![vec![0, 0, 0, 0, 0, 0]]),
            Some(vec![vec![1, 320, 64, 0, 0, 320]]),
            Some(vec![vec![1, 210, 71, 0, 0, 210]]),
            Some(vec![vec![1, 150, 80, 0, 0, 150]]),
            Some(vec![vec![3, 150, 35, 140, 58, 140]]),
            Some(vec![vec![2, 0, 0, 140, 62, 140]]),
            Some(vec![vec![2, 0, 0, 141, 60, 141]]),
            None,
            Some(vec![vec![1, 260, 52, 0, 0, 260]]),
        ]);
        f
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_data(&self, data: Option<Vec<RawFrame>>) {
        self.lock().script = Script::Fixed(data);
    }

    /// Each `get_data` returns the next entry, wrapping around.
    pub fn set_cycle(&self, frames: Vec<Option<Vec<RawFrame>>>) {
        self.lock().script = Script::Cycle(frames.into());
    }

    pub fn fail_open(&self, msg: Option<&str>) {
        self.lock().fail_open = msg.map(str::to_string);
    }

    pub fn fail_start(&self, msg: Option<&str>) {
        self.lock().fail_start = msg.map(str::to_string);
    }

    pub fn fail_stop(&self, msg: Option<&str>) {
        self.lock().fail_stop = msg.map(str::to_string);
    }

    pub fn stats(&self) -> SimStats {
        self.lock().stats.clone()
    }
}

impl DriverFactory for SimFactory {
    fn open(&self, path: &str, baud: u32, verbosity: Verbosity) -> Result<Box<dyn RadarDriver>> {
        let mut st = self.lock();
        if let Some(msg) = &st.fail_open {
            anyhow::bail!("open {}: {}", path, msg);
        }
        st.stats.opens += 1;
        st.stats.live += 1;
        st.stats.max_live = st.stats.max_live.max(st.stats.live);
        st.stats.last_open = Some((path.to_string(), baud, verbosity));
        let id = st.stats.opens;
        st.stats.events.push(SimEvent::Open(id));
        Ok(Box::new(SimDriver { id, state: self.state.clone(), running: false, live: true }))
    }
}

pub struct SimDriver {
    id: u32,
    state: Arc<Mutex<SimState>>,
    running: bool,
    live: bool,
}

impl SimDriver {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RadarDriver for SimDriver {
    fn start(&mut self) -> Result<()> {
        anyhow::ensure!(self.live, "sim radar {}: port released", self.id);
        anyhow::ensure!(!self.running, "sim radar {}: already started", self.id);
        let mut st = self.lock();
        if let Some(msg) = &st.fail_start {
            anyhow::bail!("start: {}", msg);
        }
        st.stats.starts += 1;
        st.stats.events.push(SimEvent::Start(self.id));
        drop(st);
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if !self.live {
            return Ok(());
        }
        let mut st = self.lock();
        if let Some(msg) = &st.fail_stop {
            anyhow::bail!("stop: {}", msg);
        }
        st.stats.stops += 1;
        st.stats.live -= 1;
        st.stats.events.push(SimEvent::Stop(self.id));
        drop(st);
        self.running = false;
        self.live = false;
        Ok(())
    }

    fn get_data(&self) -> Option<Vec<RawFrame>> {
        if !self.running {
            return None;
        }
        let mut st = self.lock();
        match &mut st.script {
            Script::Fixed(data) => data.clone(),
            Script::Cycle(q) => {
                let next = q.pop_front()?;
                q.push_back(next.clone());
                next
            }
        }
    }
}

impl Drop for SimDriver {
    fn drop(&mut self) {
        if self.live {
            self.lock().stats.live -= 1;
        }
    }
}
