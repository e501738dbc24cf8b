//! Joystick input through the Linux joystick interface (`/dev/input/js*`).
//! Any button press on any pad requests a capture, at most once per
//! cooldown.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace, warn};

use crate::event::{CaptureSource, Event};

/// Delay before reopening a missing or disconnected device
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

const JS_EVENT_BUTTON: u8 = 0x01;
const JS_EVENT_INIT: u8 = 0x80;

/// One `struct js_event` as read from a joystick device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsEvent {
    pub time_ms: u32,
    pub value: i16,
    pub kind: u8,
    pub number: u8,
}

impl JsEvent {
    pub const SIZE: usize = 8;

    pub fn parse(buf: [u8; Self::SIZE]) -> Self {
        Self {
            time_ms: u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
            value: i16::from_ne_bytes([buf[4], buf[5]]),
            kind: buf[6],
            number: buf[7],
        }
    }

    /// `(button, pressed)` for button events, synthetic or not
    pub fn button(&self) -> Option<(u8, bool)> {
        (self.kind & !JS_EVENT_INIT == JS_EVENT_BUTTON).then_some((self.number, self.value != 0))
    }

    /// Synthetic event reporting the state at open time
    pub fn is_init(&self) -> bool {
        self.kind & JS_EVENT_INIT != 0
    }
}

/// Turns raw button states into capture requests: fires on a
/// released-to-pressed edge, and only when the cooldown since the last
/// request has passed. The cooldown is shared by every button on every pad.
#[derive(Debug)]
pub struct GamepadDebouncer {
    previous: HashMap<(usize, u8), bool>,
    last_trigger: Option<Instant>,
    cooldown: Duration,
}

impl GamepadDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            previous: HashMap::new(),
            last_trigger: None,
            cooldown,
        }
    }

    pub fn on_button(&mut self, pad: usize, button: u8, pressed: bool, now: Instant) -> bool {
        let was_pressed = self.previous.insert((pad, button), pressed).unwrap_or(false);
        let cooled = self
            .last_trigger
            .map_or(true, |last| now.saturating_duration_since(last) >= self.cooldown);

        if pressed && !was_pressed && cooled {
            self.last_trigger = Some(now);
            return true;
        }
        false
    }

    /// Record state without triggering (device open snapshot)
    pub fn sync(&mut self, pad: usize, button: u8, pressed: bool) {
        self.previous.insert((pad, button), pressed);
    }

    /// Forget a pad's button states after it disconnects
    pub fn forget(&mut self, pad: usize) {
        self.previous.retain(|(p, _), _| *p != pad);
    }
}

#[derive(Debug)]
enum PadInput {
    Event(usize, JsEvent),
    Disconnected(usize),
}

/// Background tasks reading every configured joystick device.
pub struct GamepadListener {
    tasks: Vec<JoinHandle<()>>,
}

impl GamepadListener {
    /// Start one reader per device plus the debouncing task. Devices that
    /// are absent are retried every couple of seconds.
    pub fn spawn(devices: Vec<PathBuf>, cooldown: Duration, events: mpsc::UnboundedSender<Event>) -> Self {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        let mut tasks: Vec<JoinHandle<()>> = devices
            .into_iter()
            .enumerate()
            .map(|(pad, path)| tokio::spawn(read_device(pad, path, input_tx.clone())))
            .collect();
        drop(input_tx);

        tasks.push(tokio::spawn(async move {
            let mut debouncer = GamepadDebouncer::new(cooldown);
            while let Some(input) = input_rx.recv().await {
                match input {
                    PadInput::Event(pad, event) => {
                        let Some((button, pressed)) = event.button() else {
                            continue;
                        };
                        if event.is_init() {
                            debouncer.sync(pad, button, pressed);
                        } else if debouncer.on_button(pad, button, pressed, Instant::now()) {
                            debug!(pad, button, "gamepad capture request");
                            if events.send(Event::CaptureRequested(CaptureSource::Gamepad)).is_err() {
                                return;
                            }
                        }
                    }
                    PadInput::Disconnected(pad) => debouncer.forget(pad),
                }
            }
        }));

        Self { tasks }
    }

    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn read_device(pad: usize, path: PathBuf, tx: mpsc::UnboundedSender<PadInput>) {
    loop {
        match File::open(&path).await {
            Ok(mut file) => {
                info!(pad, path = %path.display(), "gamepad connected");
                let mut buf = [0u8; JsEvent::SIZE];
                loop {
                    if let Err(e) = file.read_exact(&mut buf).await {
                        warn!(pad, "gamepad disconnected: {e}");
                        break;
                    }
                    if tx.send(PadInput::Event(pad, JsEvent::parse(buf))).is_err() {
                        return;
                    }
                }
                if tx.send(PadInput::Disconnected(pad)).is_err() {
                    return;
                }
            }
            Err(e) => trace!(pad, path = %path.display(), "gamepad unavailable: {e}"),
        }
        if tx.is_closed() {
            return;
        }
        sleep(RECONNECT_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(value: i16, kind: u8, number: u8) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&1234u32.to_ne_bytes());
        buf[4..6].copy_from_slice(&value.to_ne_bytes());
        buf[6] = kind;
        buf[7] = number;
        buf
    }

    #[test]
    fn parses_button_and_init_events() {
        let press = JsEvent::parse(raw(1, JS_EVENT_BUTTON, 3));
        assert_eq!(press.time_ms, 1234);
        assert_eq!(press.button(), Some((3, true)));
        assert!(!press.is_init());

        let init = JsEvent::parse(raw(0, JS_EVENT_BUTTON | JS_EVENT_INIT, 1));
        assert_eq!(init.button(), Some((1, false)));
        assert!(init.is_init());

        let axis = JsEvent::parse(raw(-3000, 0x02, 0));
        assert_eq!(axis.button(), None);
    }

    #[test]
    fn fires_only_on_press_edges() {
        let mut debouncer = GamepadDebouncer::new(Duration::ZERO);
        let now = Instant::now();
        assert!(debouncer.on_button(0, 1, true, now));
        // Held: no new edge
        assert!(!debouncer.on_button(0, 1, true, now));
        assert!(!debouncer.on_button(0, 1, false, now));
        assert!(debouncer.on_button(0, 1, true, now));
    }

    #[test]
    fn cooldown_is_shared_across_buttons_and_pads() {
        let mut debouncer = GamepadDebouncer::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(debouncer.on_button(0, 0, true, t0));
        assert!(!debouncer.on_button(1, 5, true, t0 + Duration::from_secs(3)));
        debouncer.on_button(0, 0, false, t0 + Duration::from_secs(4));
        assert!(!debouncer.on_button(0, 0, true, t0 + Duration::from_secs(9)));
        debouncer.on_button(0, 0, false, t0 + Duration::from_secs(9));
        assert!(debouncer.on_button(0, 0, true, t0 + Duration::from_secs(10)));
    }

    #[test]
    fn init_snapshot_does_not_count_as_an_edge() {
        let mut debouncer = GamepadDebouncer::new(Duration::ZERO);
        let now = Instant::now();
        debouncer.sync(0, 2, true);
        assert!(!debouncer.on_button(0, 2, true, now));
        debouncer.forget(0);
        assert!(debouncer.on_button(0, 2, true, now));
    }

    #[tokio::test]
    async fn device_press_requests_a_capture() {
        let path = std::env::temp_dir().join(format!("snapbooth-js-{}", std::process::id()));
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&raw(0, JS_EVENT_BUTTON | JS_EVENT_INIT, 0));
        bytes.extend_from_slice(&raw(1, JS_EVENT_BUTTON, 0));
        bytes.extend_from_slice(&raw(0, JS_EVENT_BUTTON, 0));
        std::fs::write(&path, bytes).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = GamepadListener::spawn(vec![path.clone()], Duration::from_secs(60), tx);
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert!(matches!(event, Some(Event::CaptureRequested(CaptureSource::Gamepad))));

        listener.shutdown();
        std::fs::remove_file(path).ok();
    }
}
