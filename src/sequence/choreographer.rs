use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info};

use super::{EffectSprites, FadeOptions, ScreenFader, SequenceStage, TravelingEffects};
use crate::animation::{Keyframe, KeyframeAnimation, COUNTDOWN_FADE_IN_GROW, SCORE_FADE_IN_OUT};
use crate::assets::{AssetStore, BoothAssets};
use crate::config::{Config, CountdownConfig, ScoreConfig};
use crate::error::BoothResult;
use crate::event::Event;
use crate::stage::{FadeColor, Layer, OverlayController, VisualSurface};

/// Number of flashes in a triple capture
const TRIPLE_FLASHES: u32 = 3;

/// Pause before every flash but the first
const FLASH_PAUSE: Duration = Duration::from_millis(1000);

/// Fades of the single-photo path
const SINGLE_WHITE: FadeOptions = FadeOptions::millis(300, 300);
const SINGLE_BLACK: FadeOptions = FadeOptions::millis(1500, 300);

/// Final fade once the score is gone
const SCORE_FADE_OUT: FadeOptions = FadeOptions::millis(0, 300);

/// Runs the fixed stage order of a capture. Every stage awaits its own
/// visual completion before the next starts; only a countdown digit and its
/// arrow burst run side by side.
pub struct Choreographer {
    overlay: Arc<OverlayController>,
    fader: ScreenFader,
    effects: Arc<TravelingEffects>,
    assets: Arc<AssetStore>,
    countdown: CountdownConfig,
    score: ScoreConfig,
    rng: Mutex<StdRng>,
    events: UnboundedSender<Event>,
}

impl Choreographer {
    pub fn new(
        overlay: Arc<OverlayController>,
        effects: Arc<TravelingEffects>,
        assets: Arc<AssetStore>,
        config: &Config,
        rng: StdRng,
        events: UnboundedSender<Event>,
    ) -> Self {
        Self {
            fader: ScreenFader::new(Arc::clone(&overlay)),
            overlay,
            effects,
            assets,
            countdown: config.countdown.clone(),
            score: config.score.clone(),
            rng: Mutex::new(rng),
            events,
        }
    }

    fn publish(&self, stage: SequenceStage) {
        debug!(%stage, "sequence stage");
        let _ = self.events.send(Event::Stage(stage));
    }

    /// Countdown with arrows, then three flashes spaced a second apart.
    pub async fn start_triple_capture(&self) -> BoothResult<()> {
        let assets = self.load().await?;
        self.countdown(&assets).await;
        self.hide_arrows();

        for k in 1..=TRIPLE_FLASHES {
            if k > 1 {
                sleep(FLASH_PAUSE).await;
            }
            self.publish(SequenceStage::Flash(k));
            self.fader.flash().await;
        }
        Ok(())
    }

    /// Score reveal followed by a smooth fade back to the stage.
    pub async fn show_final_score(&self) -> BoothResult<()> {
        let assets = self.assets.ensure_loaded().await?;
        self.publish(SequenceStage::ScoreReveal);
        self.show_score(&assets).await;
        self.publish(SequenceStage::FadeOut);
        self.fader.fade(FadeColor::Transparent, SCORE_FADE_OUT).await;
        Ok(())
    }

    /// Countdown, white then black fade, score, and a short hold.
    pub async fn start_single(&self) -> BoothResult<()> {
        let assets = self.load().await?;
        self.countdown(&assets).await;
        self.hide_arrows();

        self.publish(SequenceStage::Flash(1));
        self.fader.fade(FadeColor::WHITE, SINGLE_WHITE).await;
        self.fader.fade(FadeColor::BLACK, SINGLE_BLACK).await;

        self.publish(SequenceStage::ScoreReveal);
        self.show_score(&assets).await;
        sleep(self.score.initial_delay()).await;
        Ok(())
    }

    async fn load(&self) -> BoothResult<Arc<BoothAssets>> {
        self.publish(SequenceStage::LoadingAssets);
        let assets = self.assets.ensure_loaded().await?;
        self.effects.install_sprites(EffectSprites {
            arrows: assets.arrows.clone(),
            impact: assets.impact.clone(),
        });
        Ok(assets)
    }

    async fn countdown(&self, assets: &BoothAssets) {
        for (index, digit) in assets.digits.iter().enumerate().rev() {
            self.publish(SequenceStage::Countdown(index as u32 + 1));
            tokio::join!(self.show_number(digit), self.effects.spawn_sequence());
        }
    }

    async fn show_number(&self, digit: &RgbaImage) {
        let size = self.overlay.size();
        let width = size.width * self.countdown.container_scale;
        self.show_centered(
            Layer::Countdown,
            digit.clone(),
            width,
            COUNTDOWN_FADE_IN_GROW,
            self.countdown.animation(),
        )
        .await;
    }

    async fn show_score(&self, assets: &BoothAssets) {
        let sheet = &assets.score;
        let row = self.score_row();
        let mut canvas = sheet.blank_canvas();
        sheet.draw(&mut canvas, row);
        info!(row, "score revealed");

        let width = self.overlay.size().width * self.score.container_scale;
        self.show_centered(
            Layer::Score,
            canvas,
            width,
            SCORE_FADE_IN_OUT,
            self.score.duration(),
        )
        .await;
    }

    /// One of the configured score variants, uniformly
    fn score_row(&self) -> u32 {
        self.rng.lock().gen_range(0..self.score.rows.max(1))
    }

    /// Attach a centered surface playing `frames` and suspend until the
    /// animation ends, then detach it. Height follows the canvas aspect.
    async fn show_centered(
        &self,
        layer: Layer,
        canvas: RgbaImage,
        width: f32,
        frames: &'static [Keyframe],
        duration: Duration,
    ) {
        let size = self.overlay.size();
        let (w, h) = canvas.dimensions();
        let height = if w == 0 { width } else { width * h as f32 / w as f32 };

        let animation = KeyframeAnimation::new(frames, Instant::now(), duration);
        let surface = VisualSurface::new(layer, canvas, size.width / 2.0, size.height / 2.0, width, height)
            .centered()
            .with_animation(animation);
        let id = self.overlay.attach(surface);

        let end = self.overlay.animation_end(id).unwrap_or_else(|| animation.ends_at());
        sleep_until(end).await;
        self.overlay.detach(id);
    }

    pub fn hide_arrows(&self) {
        self.publish(SequenceStage::Arrows);
        self.overlay.set_ambient_visible(false);
        self.effects.clear_all();
    }

    pub fn show_arrows(&self) {
        self.overlay.set_ambient_visible(true);
    }

    /// Drop every transient surface and clear the fade overlay. Used when a
    /// sequence is abandoned midway.
    pub fn abort(&self) {
        let tracked = self.effects.tracked_surfaces();
        let timers = self.effects.pending_timers();
        self.effects.clear_all();
        let removed = self.overlay.detach_layer(Layer::Countdown) + self.overlay.detach_layer(Layer::Score);
        self.overlay.reset_fade();
        debug!(tracked, timers, removed, "sequence aborted");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::assets::tests::sample_assets;
    use crate::assets::AssetSource;
    use crate::stage::{StageSize, TileSheet};
    use rand::SeedableRng;
    use tokio::sync::mpsc;

    pub(crate) struct Rig {
        pub overlay: Arc<OverlayController>,
        pub effects: Arc<TravelingEffects>,
        pub choreographer: Arc<Choreographer>,
        pub tx: mpsc::UnboundedSender<Event>,
        pub events: mpsc::UnboundedReceiver<Event>,
    }

    pub(crate) fn rig(source: AssetSource) -> Rig {
        let config = Config::default();
        let overlay = Arc::new(OverlayController::new(StageSize::new(120.0, 60.0)));
        let effects = Arc::new(TravelingEffects::new(
            overlay.clone(),
            config.arrows.clone(),
            StdRng::seed_from_u64(1),
        ));
        let assets = Arc::new(AssetStore::new(source, &config));
        let (tx, events) = mpsc::unbounded_channel();
        let choreographer = Arc::new(Choreographer::new(
            overlay.clone(),
            effects.clone(),
            assets,
            &config,
            StdRng::seed_from_u64(2),
            tx.clone(),
        ));
        Rig {
            overlay,
            effects,
            choreographer,
            tx,
            events,
        }
    }

    pub(crate) fn preloaded() -> AssetSource {
        AssetSource::Preloaded(Arc::new(sample_assets(3)))
    }

    pub(crate) fn stages(events: &mut mpsc::UnboundedReceiver<Event>) -> Vec<SequenceStage> {
        let mut stages = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let Event::Stage(stage) = event {
                stages.push(stage);
            }
        }
        stages
    }

    #[tokio::test(start_paused = true)]
    async fn triple_capture_runs_stages_in_order() {
        let mut rig = rig(preloaded());
        let start = Instant::now();
        rig.choreographer.start_triple_capture().await.unwrap();

        // 3 x (digit + arrows) then flash, pause, flash, pause, flash
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(5900), "took {elapsed:?}");
        assert!(elapsed < Duration::from_millis(6000), "took {elapsed:?}");

        assert_eq!(
            stages(&mut rig.events),
            vec![
                SequenceStage::LoadingAssets,
                SequenceStage::Countdown(3),
                SequenceStage::Countdown(2),
                SequenceStage::Countdown(1),
                SequenceStage::Arrows,
                SequenceStage::Flash(1),
                SequenceStage::Flash(2),
                SequenceStage::Flash(3),
            ]
        );
        assert!(!rig.overlay.ambient_visible());
        assert_eq!(rig.overlay.count_layer(Layer::Countdown), 0);
        assert_eq!(rig.effects.tracked_surfaces(), 0);
        assert_eq!(rig.overlay.fade_opacity(), 0.0);
    }

    #[tokio::test]
    async fn score_row_stays_within_configured_variants() {
        let rig = rig(preloaded());
        // A 14 dot sheet split 5 ways leaves 2 dot tiles, so it reports 7 rows
        let sheet = TileSheet::stacked(RgbaImage::new(4, 14), 5).unwrap();
        assert_eq!(sheet.rows(), 7);

        let mut seen = [false; 5];
        for _ in 0..500 {
            let row = rig.choreographer.score_row();
            assert!(row < 5, "row {row} outside the configured variants");
            assert!(sheet.tile_rect(row).is_some());
            seen[row as usize] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
    }

    #[tokio::test(start_paused = true)]
    async fn final_score_shows_and_removes_the_score() {
        let mut rig = rig(preloaded());
        let choreographer = rig.choreographer.clone();
        let reveal = tokio::spawn(async move { choreographer.show_final_score().await });

        sleep(Duration::from_millis(2000)).await;
        assert_eq!(rig.overlay.count_layer(Layer::Score), 1);

        reveal.await.unwrap().unwrap();
        assert_eq!(rig.overlay.count_layer(Layer::Score), 0);
        assert_eq!(rig.overlay.fade_opacity(), 0.0);
        assert_eq!(
            stages(&mut rig.events),
            vec![SequenceStage::ScoreReveal, SequenceStage::FadeOut]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn single_capture_fades_white_then_black() {
        let mut rig = rig(preloaded());
        let start = Instant::now();
        rig.choreographer.start_single().await.unwrap();

        // countdown 3000, white 600, black 1800, score 4000, delay 1000
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(10_400), "took {elapsed:?}");
        assert_eq!(rig.overlay.fade_color(), FadeColor::BLACK);
        assert_eq!(rig.overlay.fade_opacity(), 0.0);
        assert_eq!(
            stages(&mut rig.events).last(),
            Some(&SequenceStage::ScoreReveal)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn load_failure_aborts_before_the_countdown() {
        let dir = std::env::temp_dir().join("snapbooth-no-such-assets");
        let mut rig = rig(AssetSource::Directory(dir));
        assert!(rig.choreographer.start_triple_capture().await.is_err());
        assert_eq!(stages(&mut rig.events), vec![SequenceStage::LoadingAssets]);
        assert_eq!(rig.overlay.surface_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_clears_transient_layers_and_fade() {
        let rig = rig(preloaded());
        let choreographer = rig.choreographer.clone();
        let run = tokio::spawn(async move { choreographer.start_triple_capture().await });

        sleep(Duration::from_millis(950)).await;
        assert_eq!(rig.overlay.count_layer(Layer::Countdown), 1);
        run.abort();
        let _ = run.await;

        rig.choreographer.abort();
        assert_eq!(rig.overlay.count_layer(Layer::Countdown), 0);
        assert_eq!(rig.effects.tracked_surfaces(), 0);
        assert_eq!(rig.overlay.surface_count(), 0);
        assert!(rig.overlay.fade_color().is_transparent());
    }
}
