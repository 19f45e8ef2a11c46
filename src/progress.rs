//! Waiting indicator drawn on stderr while a model turn is open.
//!
//! One ticker thread owns the animation. Streamed text goes through
//! [`ProgressIndicator::write_chunk`], which takes the same lock as the
//! ticker, so a frame is never drawn in the middle of a text write. Frames
//! are painted at a saved cursor position and erased before any text lands.

use std::io::{self, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_TICK: Duration = Duration::from_millis(120);
pub const DEFAULT_HEARTBEAT_QUIET: Duration = Duration::from_secs(1);

// Breathing dot in the terminal's own cyan: a long rest, a quick inhale and
// a slower exhale.
const FRAMES: [&str; 14] = [
    "\x1b[2;36m·\x1b[0m",
    "\x1b[2;36m·\x1b[0m",
    "\x1b[2;36m·\x1b[0m",
    "\x1b[2;36m·\x1b[0m",
    "\x1b[2;36m·\x1b[0m",
    "\x1b[36m·\x1b[0m",
    "\x1b[36m•\x1b[0m",
    "\x1b[1;36m●\x1b[0m",
    "\x1b[1;36m•\x1b[0m",
    "\x1b[1;36m•\x1b[0m",
    "\x1b[36m•\x1b[0m",
    "\x1b[36m·\x1b[0m",
    "\x1b[2;36m·\x1b[0m",
    "\x1b[2;36m·\x1b[0m",
];

pub(crate) const SAVE_CURSOR: &str = "\x1b[s\x1b[?25l";
pub(crate) const CLEAR_FRAME: &str = "\x1b[u \x1b[u\x1b[?25h";

/// When drawing resumes after streamed text arrives mid-turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPolicy {
    /// Resume right after every write.
    Immediate,
    /// Resume once no text has been written for the given period.
    AfterQuiet(Duration),
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self::AfterQuiet(DEFAULT_HEARTBEAT_QUIET)
    }
}

type Sink = Box<dyn Write + Send>;

struct State {
    active: bool,
    enabled: bool,
    in_turn: bool,
    last_write: Option<Instant>,
    frame: usize,
    frames_out: Sink,
    text_out: Sink,
}

impl State {
    fn save_cursor(&mut self) {
        self.emit_frame_bytes(SAVE_CURSOR);
    }

    fn clear_frame(&mut self) {
        self.emit_frame_bytes(CLEAR_FRAME);
    }

    fn draw_frame(&mut self) {
        let frame = FRAMES[self.frame % FRAMES.len()];
        self.frame = self.frame.wrapping_add(1);
        self.emit_frame_bytes(&format!("\x1b[u{frame}\x1b[u"));
    }

    fn emit_frame_bytes(&mut self, bytes: &str) {
        let result = self
            .frames_out
            .write_all(bytes.as_bytes())
            .and_then(|()| self.frames_out.flush());
        if let Err(error) = result {
            tracing::trace!(%error, "progress frame write failed");
        }
    }

    fn enable(&mut self) {
        self.save_cursor();
        self.enabled = true;
    }

    fn disable(&mut self) {
        if self.enabled {
            self.clear_frame();
            self.enabled = false;
        }
    }
}

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
    heartbeat: HeartbeatPolicy,
    tick: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        lock_unpoisoned(&self.state)
    }
}

/// Serialized console output with an optional animated waiting indicator.
pub struct ProgressIndicator {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl ProgressIndicator {
    /// Starts the ticker, drawing on stderr and writing text to stdout.
    pub fn start(heartbeat: HeartbeatPolicy) -> io::Result<Self> {
        Self::start_with(
            Box::new(io::stderr()),
            Box::new(io::stdout()),
            heartbeat,
            DEFAULT_TICK,
        )
    }

    /// Starts the ticker on the given sinks.
    pub fn start_with(
        frames_out: Sink,
        text_out: Sink,
        heartbeat: HeartbeatPolicy,
        tick: Duration,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                active: true,
                enabled: false,
                in_turn: false,
                last_write: None,
                frame: 0,
                frames_out,
                text_out,
            }),
            wake: Condvar::new(),
            heartbeat,
            tick,
        });

        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("progress-indicator".to_string())
            .spawn(move || run_ticker(&worker))?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// A gate with no ticker: text is still serialized, nothing is drawn.
    #[must_use]
    pub fn passthrough(text_out: Sink) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                active: false,
                enabled: false,
                in_turn: false,
                last_write: None,
                frame: 0,
                frames_out: Box::new(io::sink()),
                text_out,
            }),
            wake: Condvar::new(),
            heartbeat: HeartbeatPolicy::Immediate,
            tick: DEFAULT_TICK,
        });
        Self {
            shared,
            thread: None,
        }
    }

    #[must_use]
    pub fn is_animated(&self) -> bool {
        self.thread.is_some()
    }

    /// Begins drawing at the current cursor position.
    pub fn turn_started(&self) {
        if !self.is_animated() {
            return;
        }
        let mut state = self.shared.lock();
        state.in_turn = true;
        state.last_write = None;
        state.enable();
        self.shared.wake.notify_one();
    }

    /// Erases any visible frame and stops drawing until the next turn.
    pub fn turn_finished(&self) {
        let mut state = self.shared.lock();
        state.in_turn = false;
        state.disable();
    }

    /// Writes streamed text with drawing suspended around it.
    pub fn write_chunk(&self, text: &str) {
        let mut state = self.shared.lock();
        state.disable();

        let result = state
            .text_out
            .write_all(text.as_bytes())
            .and_then(|()| state.text_out.flush());
        if let Err(error) = result {
            tracing::debug!(%error, "console write failed");
        }

        if state.in_turn && state.active {
            state.last_write = Some(Instant::now());
            if self.shared.heartbeat == HeartbeatPolicy::Immediate {
                state.enable();
                self.shared.wake.notify_one();
            }
        }
    }

    /// Stops the ticker and erases any visible frame. Idempotent.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        {
            let mut state = self.shared.lock();
            state.active = false;
            self.shared.wake.notify_one();
        }
        if thread.join().is_err() {
            tracing::debug!("progress ticker panicked");
        }
    }
}

impl Drop for ProgressIndicator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_ticker(shared: &Shared) {
    let mut state = shared.lock();
    loop {
        if !state.active {
            state.disable();
            return;
        }

        if !state.enabled && state.in_turn {
            if let (HeartbeatPolicy::AfterQuiet(quiet), Some(last_write)) =
                (shared.heartbeat, state.last_write)
            {
                if last_write.elapsed() >= quiet {
                    state.enable();
                }
            }
        }

        if state.enabled {
            state.draw_frame();
        }

        state = match shared.wake.wait_timeout(state, shared.tick) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        };
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&lock_unpoisoned(&self.0)).into_owned()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            lock_unpoisoned(&self.0).extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn passthrough_writes_text_and_never_draws() {
        let text = Capture::default();
        let indicator = ProgressIndicator::passthrough(Box::new(text.clone()));

        indicator.turn_started();
        indicator.write_chunk("hello ");
        indicator.write_chunk("world");
        indicator.turn_finished();

        assert!(!indicator.is_animated());
        assert_eq!(text.text(), "hello world");
    }

    #[test]
    fn write_outside_a_turn_does_not_enable_drawing() {
        let frames = Capture::default();
        let text = Capture::default();
        let mut indicator = ProgressIndicator::start_with(
            Box::new(frames.clone()),
            Box::new(text.clone()),
            HeartbeatPolicy::Immediate,
            Duration::from_millis(5),
        )
        .expect("start");

        indicator.write_chunk("plain");
        thread::sleep(Duration::from_millis(30));
        indicator.stop();

        assert_eq!(text.text(), "plain");
        assert_eq!(frames.text(), "");
    }
}
