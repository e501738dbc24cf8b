use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::CaptureClient;
use crate::config::CaptureMode;
use crate::error::BoothResult;
use crate::event::{CaptureSource, Event};
use crate::sequence::Choreographer;

/// Pairs a server capture with its choreography. Only one capture runs at a
/// time; triggers arriving meanwhile are rejected, not queued.
pub struct CaptureSession<C> {
    client: Arc<C>,
    choreographer: Arc<Choreographer>,
    slot: Arc<Semaphore>,
    mode: CaptureMode,
    events: UnboundedSender<Event>,
}

impl<C> Clone for CaptureSession<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            choreographer: Arc::clone(&self.choreographer),
            slot: Arc::clone(&self.slot),
            mode: self.mode,
            events: self.events.clone(),
        }
    }
}

impl<C: CaptureClient> CaptureSession<C> {
    pub fn new(
        client: Arc<C>,
        choreographer: Arc<Choreographer>,
        mode: CaptureMode,
        events: UnboundedSender<Event>,
    ) -> Self {
        Self {
            client,
            choreographer,
            slot: Arc::new(Semaphore::new(1)),
            mode,
            events,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Start a capture in the background. Returns `false` when one is
    /// already running.
    pub fn trigger(&self, source: CaptureSource) -> bool {
        let permit = match Arc::clone(&self.slot).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                info!(?source, "capture already in progress, trigger ignored");
                let _ = self.events.send(Event::CaptureRejected);
                return false;
            }
        };

        info!(?source, mode = ?self.mode, "capture started");
        let _ = self.events.send(Event::CaptureControl { enabled: false });

        let session = self.clone();
        tokio::spawn(async move {
            let outcome = match session.mode {
                CaptureMode::Triple => session.run_triple().await,
                CaptureMode::Single => session.run_single().await,
            };
            if let Err(e) = outcome {
                error!("capture failed: {e}");
                session.choreographer.abort();
                let _ = session.events.send(Event::CaptureFailed(e.to_string()));
            }
            session.choreographer.show_arrows();
            drop(permit);
            let _ = session.events.send(Event::CaptureControl { enabled: true });
        });
        true
    }

    /// Three photos alongside the countdown and flashes, then the score.
    async fn run_triple(&self) -> BoothResult<()> {
        let capture = async {
            let filenames = self.client.capture_triple().await?;
            info!(count = filenames.len(), "photos captured");
            let _ = self.events.send(Event::PhotosCaptured(filenames));
            Ok(())
        };
        alongside(capture, self.choreographer.start_triple_capture()).await?;
        self.choreographer.show_final_score().await
    }

    /// One photo alongside the countdown and fades, then a preview.
    async fn run_single(&self) -> BoothResult<()> {
        let capture = async {
            let filename = self.client.capture_single().await?;
            info!(%filename, "photo captured");
            let _ = self.events.send(Event::PhotoCaptured(filename.clone()));

            match self.client.fetch_photo(&filename).await {
                Ok(image) => {
                    let _ = self.events.send(Event::PhotoFetched {
                        filename,
                        image: Arc::new(image),
                    });
                }
                Err(e) => warn!("preview of {filename} unavailable: {e}"),
            }
            Ok(())
        };
        alongside(capture, self.choreographer.start_single()).await
    }
}

/// Drive a capture and its choreography together. A failed capture cancels
/// the choreography, but a failed choreography still waits for the server so
/// photos it already took are published.
async fn alongside<F, G>(capture: F, choreography: G) -> BoothResult<()>
where
    F: Future<Output = BoothResult<()>>,
    G: Future<Output = BoothResult<()>>,
{
    tokio::pin!(capture);
    tokio::pin!(choreography);
    tokio::select! {
        captured = &mut capture => {
            captured?;
            choreography.await
        }
        shown = &mut choreography => {
            capture.await?;
            shown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoothError, BoothResult};
    use crate::assets::AssetSource;
    use crate::sequence::choreographer::tests::{preloaded, rig, Rig};
    use crate::sequence::SequenceStage;
    use crate::stage::Layer;
    use image::RgbaImage;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::sleep;

    struct MockClient {
        fail: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl MockClient {
        fn new(fail: bool, delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                fail,
                delay: Duration::from_millis(delay_ms),
                calls: AtomicUsize::new(0),
            })
        }

        async fn answer<T>(&self, value: T) -> BoothResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            if self.fail {
                Err(BoothError::Capture("Camera system not initialized".into()))
            } else {
                Ok(value)
            }
        }
    }

    impl CaptureClient for MockClient {
        async fn capture_single(&self) -> BoothResult<String> {
            self.answer("single.jpg".to_string()).await
        }

        async fn capture_triple(&self) -> BoothResult<Vec<String>> {
            self.answer(vec!["1.jpg".into(), "2.jpg".into(), "3.jpg".into()])
                .await
        }

        async fn fetch_photo(&self, _filename: &str) -> BoothResult<RgbaImage> {
            Ok(RgbaImage::new(4, 3))
        }
    }

    fn session(rig: &Rig, client: Arc<MockClient>, mode: CaptureMode) -> CaptureSession<MockClient> {
        CaptureSession::new(client, rig.choreographer.clone(), mode, rig.tx.clone())
    }

    /// Collect events up to and including the control re-enable
    async fn until_enabled(events: &mut UnboundedReceiver<Event>) -> Vec<Event> {
        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            let done = matches!(event, Event::CaptureControl { enabled: true });
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    }

    fn stages(events: &[Event]) -> Vec<SequenceStage> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Stage(stage) => Some(*stage),
                _ => None,
            })
            .collect()
    }

    fn count(events: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    #[tokio::test(start_paused = true)]
    async fn successful_triple_capture_runs_full_choreography() {
        let mut rig = rig(preloaded());
        let session = session(&rig, MockClient::new(false, 2000), CaptureMode::Triple);

        assert!(session.trigger(CaptureSource::Keyboard));
        let events = until_enabled(&mut rig.events).await;

        assert!(matches!(events[0], Event::CaptureControl { enabled: false }));
        assert_eq!(
            stages(&events),
            vec![
                SequenceStage::LoadingAssets,
                SequenceStage::Countdown(3),
                SequenceStage::Countdown(2),
                SequenceStage::Countdown(1),
                SequenceStage::Arrows,
                SequenceStage::Flash(1),
                SequenceStage::Flash(2),
                SequenceStage::Flash(3),
                SequenceStage::ScoreReveal,
                SequenceStage::FadeOut,
            ]
        );
        let photos: Vec<&Vec<String>> = events
            .iter()
            .filter_map(|e| match e {
                Event::PhotosCaptured(names) => Some(names),
                _ => None,
            })
            .collect();
        assert_eq!(photos, vec![&vec!["1.jpg".to_string(), "2.jpg".into(), "3.jpg".into()]]);
        assert_eq!(count(&events, |e| matches!(e, Event::CaptureFailed(_))), 0);

        // Re-enabled exactly once, and nothing follows
        sleep(Duration::from_secs(10)).await;
        assert!(rig.events.try_recv().is_err());
        assert!(!session.is_busy());
        assert!(rig.overlay.ambient_visible());
        assert_eq!(rig.overlay.count_layer(Layer::Score), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_capture_reports_once_and_reenables() {
        let mut rig = rig(preloaded());
        let session = session(&rig, MockClient::new(true, 1500), CaptureMode::Triple);

        assert!(session.trigger(CaptureSource::Gamepad));
        let events = until_enabled(&mut rig.events).await;

        let failures: Vec<&String> = events
            .iter()
            .filter_map(|e| match e {
                Event::CaptureFailed(message) => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec!["Camera system not initialized"]);
        assert_eq!(count(&events, |e| matches!(e, Event::PhotosCaptured(_))), 0);
        assert!(!stages(&events).contains(&SequenceStage::Flash(1)));

        sleep(Duration::from_secs(10)).await;
        assert!(rig.events.try_recv().is_err());
        assert!(!session.is_busy());
        assert_eq!(rig.overlay.surface_count(), 0);
        assert_eq!(rig.effects.tracked_surfaces(), 0);
        assert!(rig.overlay.fade_color().is_transparent());
        assert!(rig.overlay.ambient_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn photos_reach_the_reel_when_assets_are_missing() {
        let mut rig = rig(AssetSource::Directory(PathBuf::from(
            "/nonexistent/snapbooth/overlays",
        )));
        let session = session(&rig, MockClient::new(false, 500), CaptureMode::Triple);

        assert!(session.trigger(CaptureSource::Keyboard));
        let events = until_enabled(&mut rig.events).await;

        let photos = events
            .iter()
            .position(|e| matches!(e, Event::PhotosCaptured(names) if names.len() == 3));
        let failure = events
            .iter()
            .position(|e| matches!(e, Event::CaptureFailed(_)));
        assert!(photos.is_some(), "photos dropped: {events:?}");
        assert!(failure.is_some());
        assert!(photos < failure);
        assert_eq!(count(&events, |e| matches!(e, Event::CaptureFailed(_))), 1);
        assert_eq!(
            count(&events, |e| matches!(e, Event::CaptureControl { enabled: true })),
            1
        );
        assert!(!stages(&events).contains(&SequenceStage::Flash(1)));
        assert!(!session.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn single_photo_survives_missing_assets() {
        let mut rig = rig(AssetSource::Directory(PathBuf::from(
            "/nonexistent/snapbooth/overlays",
        )));
        let session = session(&rig, MockClient::new(false, 500), CaptureMode::Single);

        assert!(session.trigger(CaptureSource::Gamepad));
        let events = until_enabled(&mut rig.events).await;

        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PhotoCaptured(name) if name == "single.jpg")));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PhotoFetched { filename, .. } if filename == "single.jpg")));
        assert_eq!(count(&events, |e| matches!(e, Event::CaptureFailed(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_trigger_while_busy_is_rejected() {
        let mut rig = rig(preloaded());
        let client = MockClient::new(false, 100);
        let session = session(&rig, client.clone(), CaptureMode::Triple);

        assert!(session.trigger(CaptureSource::Keyboard));
        assert!(session.is_busy());
        assert!(!session.trigger(CaptureSource::Gamepad));

        let events = until_enabled(&mut rig.events).await;
        assert_eq!(count(&events, |e| matches!(e, Event::CaptureRejected)), 1);
        assert_eq!(
            count(&events, |e| matches!(e, Event::CaptureControl { enabled: false })),
            1
        );
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        // Free again once the first capture is over
        assert!(session.trigger(CaptureSource::Keyboard));
    }

    #[tokio::test(start_paused = true)]
    async fn single_capture_fetches_a_preview() {
        let mut rig = rig(preloaded());
        let session = session(&rig, MockClient::new(false, 500), CaptureMode::Single);

        assert!(session.trigger(CaptureSource::Keyboard));
        let events = until_enabled(&mut rig.events).await;

        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PhotoCaptured(name) if name == "single.jpg")));
        let preview = events.iter().find_map(|e| match e {
            Event::PhotoFetched { filename, image } => Some((filename.clone(), image.dimensions())),
            _ => None,
        });
        assert_eq!(preview, Some(("single.jpg".to_string(), (4, 3))));
        assert_eq!(count(&events, |e| matches!(e, Event::CaptureFailed(_))), 0);
    }
}
