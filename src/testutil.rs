//! Test doubles for the hardware, clock and transport seams.

use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::DataPoint;
use crate::hal::{Clock, HardwareProvider};
use crate::transport::Transport;

/// Records every pin write; inputs and the DHT sample are set by the test.
pub struct FakeHal {
    levels: Mutex<HashMap<u8, bool>>,
    writes: Mutex<Vec<(u8, bool)>>,
    inputs: Mutex<HashMap<u8, bool>>,
    dht: Mutex<Option<(f32, f32)>>,
    fail_reads: AtomicBool,
}

impl Default for FakeHal {
    fn default() -> Self {
        Self {
            levels: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            inputs: Mutex::new(HashMap::new()),
            dht: Mutex::new(Some((24.0, 45.0))),
            fail_reads: AtomicBool::new(false),
        }
    }
}

impl FakeHal {
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.levels.lock().unwrap().get(&pin).copied()
    }

    pub fn snapshot(&self) -> HashMap<u8, bool> {
        self.levels.lock().unwrap().clone()
    }

    pub fn writes_to(&self, pin: u8) -> Vec<bool> {
        self.writes.lock().unwrap().iter().filter(|(p, _)| *p == pin).map(|(_, l)| *l).collect()
    }

    pub fn press(&self, pin: u8, level: bool) {
        self.inputs.lock().unwrap().insert(pin, level);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// `None` makes the next reads fail.
    pub fn set_dht(&self, sample: Option<(f32, f32)>) {
        *self.dht.lock().unwrap() = sample;
    }
}

impl HardwareProvider for FakeHal {
    fn read_gpio(&self, pin: u8) -> Result<bool> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("gpio {} unavailable", pin);
        }
        Ok(self.inputs.lock().unwrap().get(&pin).copied().unwrap_or(false))
    }

    fn write_gpio(&self, pin: u8, level: bool) -> Result<()> {
        self.levels.lock().unwrap().insert(pin, level);
        self.writes.lock().unwrap().push((pin, level));
        Ok(())
    }

    fn read_dht(&self, _pin: u8) -> Result<(f32, f32)> {
        self.dht.lock().unwrap().ok_or_else(|| anyhow!("checksum error"))
    }
}

/// Time only moves when the test advances it or the code under test sleeps.
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration.as_millis() as u64);
    }
}

struct Script {
    fail_module: bool,
    fail_network: bool,
    fail_service: bool,
    fail_get: bool,
    fail_post: bool,
    body: String,
    module_inits: usize,
    service_inits: usize,
    resets: usize,
    gets: usize,
    posts: Vec<DataPoint>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_module: false,
            fail_network: false,
            fail_service: false,
            fail_get: false,
            fail_post: false,
            body: r#"{"led":0,"fan":0,"updateInterval":10}"#.to_string(),
            module_inits: 0,
            service_inits: 0,
            resets: 0,
            gets: 0,
            posts: Vec::new(),
        }
    }
}

/// Transport whose failures are switched by the test. Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    fn with<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        f(&mut self.script.lock().unwrap())
    }

    pub fn fail_module(&self, fail: bool) {
        self.with(|s| s.fail_module = fail);
    }

    pub fn fail_network(&self, fail: bool) {
        self.with(|s| s.fail_network = fail);
    }

    pub fn fail_service(&self, fail: bool) {
        self.with(|s| s.fail_service = fail);
    }

    pub fn fail_get(&self, fail: bool) {
        self.with(|s| s.fail_get = fail);
    }

    pub fn fail_post(&self, fail: bool) {
        self.with(|s| s.fail_post = fail);
    }

    pub fn set_body(&self, body: &str) {
        self.with(|s| s.body = body.to_string());
    }

    pub fn module_inits(&self) -> usize {
        self.with(|s| s.module_inits)
    }

    pub fn service_inits(&self) -> usize {
        self.with(|s| s.service_inits)
    }

    pub fn resets(&self) -> usize {
        self.with(|s| s.resets)
    }

    pub fn gets(&self) -> usize {
        self.with(|s| s.gets)
    }

    pub fn posts(&self) -> Vec<DataPoint> {
        self.with(|s| s.posts.clone())
    }
}

impl Transport for ScriptedTransport {
    fn init_module(&mut self) -> Result<()> {
        self.with(|s| {
            s.module_inits += 1;
            if s.fail_module { bail!("no response to AT") } else { Ok(()) }
        })
    }

    fn init_network(&mut self) -> Result<()> {
        self.with(|s| if s.fail_network { bail!("not registered") } else { Ok(()) })
    }

    fn init_service(&mut self) -> Result<()> {
        self.with(|s| {
            s.service_inits += 1;
            if s.fail_service { bail!("bearer down") } else { Ok(()) }
        })
    }

    fn reset_module(&mut self) {
        self.with(|s| s.resets += 1);
    }

    fn http_get(&mut self, _path: &str, _timeout: Duration) -> Result<String> {
        self.with(|s| {
            s.gets += 1;
            if s.fail_get { bail!("GET timed out") } else { Ok(s.body.clone()) }
        })
    }

    fn http_post(&mut self, _path: &str, point: &DataPoint) -> Result<()> {
        self.with(|s| {
            if s.fail_post {
                bail!("POST timed out");
            }
            s.posts.push(*point);
            Ok(())
        })
    }
}
