use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::sequence::SequenceStage;

/// What asked for a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    Keyboard,
    Gamepad,
}

/// Application-level events
#[derive(Debug, Clone)]
pub enum Event {
    /// User key press
    Key(KeyEvent),
    /// Animation / render tick
    Tick,
    /// Terminal resize
    Resize(u16, u16),
    /// A capture was requested by a non-keyboard input
    CaptureRequested(CaptureSource),
    /// The capture control was enabled or disabled
    CaptureControl { enabled: bool },
    /// A trigger arrived while a capture was already running
    CaptureRejected,
    /// The choreography moved to a new stage
    Stage(SequenceStage),
    /// Triple capture finished on the server
    PhotosCaptured(Vec<String>),
    /// Single capture finished on the server
    PhotoCaptured(String),
    /// The latest single photo was downloaded for preview
    PhotoFetched {
        filename: String,
        image: Arc<RgbaImage>,
    },
    /// A capture failed; shown once as a blocking alert
    CaptureFailed(String),
}

/// Handles event collection from multiple sources.
///
/// Uses crossterm's async `EventStream` (via `futures::StreamExt`) instead of
/// blocking `event::poll()` / `event::read()`, so no tokio worker thread is
/// ever blocked.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
    stop: Arc<AtomicBool>,
}

impl EventHandler {
    /// Create a new event handler. Spawns background tasks for async input and tick generation.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));

        // Async input task: uses crossterm's EventStream (non-blocking)
        let input_tx = tx.clone();
        let input_stop = stop.clone();
        tokio::spawn(async move {
            let mut reader = EventStream::new();
            loop {
                let maybe_event = reader.next().await;
                if input_stop.load(Ordering::Relaxed) {
                    return;
                }
                let forwarded = match maybe_event {
                    Some(Ok(CrosstermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                        input_tx.send(Event::Key(key))
                    }
                    Some(Ok(CrosstermEvent::Resize(w, h))) => input_tx.send(Event::Resize(w, h)),
                    Some(Ok(_)) => Ok(()),
                    // Stream ended or errored, exit gracefully
                    Some(Err(_)) | None => return,
                };
                if forwarded.is_err() {
                    return;
                }
            }
        });

        // Tick task
        let tick_tx = tx.clone();
        let tick_stop = stop.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_rate);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tick_stop.load(Ordering::Relaxed) {
                    return;
                }
                if tick_tx.send(Event::Tick).is_err() {
                    return;
                }
            }
        });

        Self { rx, tx, stop }
    }

    /// Get a clone of the sender for background tasks
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Signal all background tasks to stop
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
