use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::sink::{Direction, LogSink};

/// Scripted channel. Replays the response segments to the reader and records
/// everything written. An exhausted buffer behaves like a read timeout.
pub(crate) struct FakeChannel {
    segments: VecDeque<(Duration, Vec<u8>)>,
    response_buf: VecDeque<u8>,
    ready_at: Instant,
    written: Arc<Mutex<Vec<u8>>>,
    on_close: Option<(String, Arc<Mutex<Vec<String>>>)>,
}

impl FakeChannel {
    pub(crate) fn new(response: &str) -> Self {
        Self::paced(&[(Duration::ZERO, response)])
    }

    /// Each segment becomes readable its delay after the previous segment
    /// was read completely.
    pub(crate) fn paced(segments: &[(Duration, &str)]) -> Self {
        Self {
            segments: segments
                .iter()
                .map(|(delay, text)| (*delay, text.as_bytes().to_vec()))
                .collect(),
            response_buf: VecDeque::new(),
            ready_at: Instant::now(),
            written: Arc::new(Mutex::new(Vec::new())),
            on_close: None,
        }
    }

    /// Handle to the bytes written so far.
    pub(crate) fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        self.written.clone()
    }

    /// Push `name` into `closed` when the channel is dropped.
    pub(crate) fn track_close(mut self, name: &str, closed: Arc<Mutex<Vec<String>>>) -> Self {
        self.on_close = Some((name.to_string(), closed));
        self
    }
}

impl Read for FakeChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.response_buf.is_empty() {
            let Some((delay, bytes)) = self.segments.pop_front() else {
                thread::sleep(Duration::from_millis(1));
                return Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out"));
            };
            self.response_buf = bytes.into();
            self.ready_at = Instant::now() + delay;
        }
        if Instant::now() < self.ready_at {
            thread::sleep(Duration::from_millis(1));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out"));
        }
        let c = buf.len().min(self.response_buf.len());
        for (dst, src) in buf.iter_mut().zip(self.response_buf.drain(0..c)) {
            *dst = src;
        }
        Ok(c)
    }
}

impl Write for FakeChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written
            .lock()
            .expect("written buffer poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FakeChannel {
    fn drop(&mut self) {
        if let Some((name, closed)) = self.on_close.take() {
            closed.lock().expect("close list poisoned").push(name);
        }
    }
}

/// Channel whose reads and writes always fail.
pub(crate) struct BrokenChannel;

impl Read for BrokenChannel {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "Broken pipe"))
    }
}

impl Write for BrokenChannel {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "Broken pipe"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink keeping every record in memory.
#[derive(Default)]
pub(crate) struct MemorySink {
    pub(crate) records: Mutex<Vec<(Direction, String, String)>>,
}

impl LogSink for MemorySink {
    fn record(&self, direction: Direction, endpoint: &str, message: &str) {
        self.records.lock().expect("records poisoned").push((
            direction,
            endpoint.to_string(),
            message.to_string(),
        ));
    }
}

/// Config with a short timeout. Reads of an exhausted channel retry until it expires.
pub(crate) fn quick_config() -> crate::SessionConfig {
    crate::SessionConfig {
        timeout: Duration::from_millis(20),
        ..crate::SessionConfig::default()
    }
}

pub(crate) fn written_string(written: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&written.lock().expect("written buffer poisoned")).to_string()
}
