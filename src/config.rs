use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use serde::Deserialize;
use tracing::info;

// ─── Embedded Default ────────────────────────────────────────────────────
/// Baked into the binary at compile time. The booth never fails to start
/// because of a missing config file; this is always the base layer.
const DEFAULT_CONFIG_TOML: &str = include_str!("../default_config.toml");

// ─── CLI Arguments (override layer) ─────────────────────────────────────
/// snapbooth: photo-booth kiosk front-end for the terminal
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "snapbooth", version, about, long_about = None)]
pub struct CliArgs {
    /// Capture server base URL (overrides config file)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Capture mode (overrides config file)
    #[arg(short, long, value_enum)]
    pub mode: Option<CaptureMode>,

    /// Directory holding the sprite assets (overrides config file)
    #[arg(short, long)]
    pub assets: Option<PathBuf>,

    /// Log level filter (overrides config file)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log file path (defaults to the data directory)
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Path to a custom config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the default config to stdout and exit
    #[arg(long)]
    pub print_default_config: bool,

    /// Target FPS for the render loop (overrides config file)
    #[arg(long)]
    pub fps: Option<u16>,
}

/// Which capture endpoint drives a capture event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// `POST /capture`, single photo followed by a preview
    Single,
    /// `POST /capture_3`, three photos with three flashes
    Triple,
}

// ─── TOML Structs ───────────────────────────────────────────────────────

/// Root configuration, parsed from TOML, then overridden by CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub countdown: CountdownConfig,
    #[serde(default)]
    pub score: ScoreConfig,
    #[serde(default)]
    pub arrows: ArrowsConfig,
    #[serde(default)]
    pub ambient: AmbientConfig,
    #[serde(default)]
    pub reel: ReelConfig,
    #[serde(default)]
    pub appearance: AppearanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub mode: CaptureMode,
    pub key: char,
    pub gamepad_devices: Vec<PathBuf>,
    pub gamepad_cooldown_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub dir: PathBuf,
    pub score_sheet: String,
    pub arrows_sheet: String,
    pub ambient_sheet: String,
    pub impact: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CountdownConfig {
    pub digits: u32,
    /// Digit width as a fraction of the stage width
    pub container_scale: f32,
    pub animation_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub container_scale: f32,
    pub duration_ms: u64,
    pub initial_delay_ms: u64,
    /// Number of score variants stacked vertically in the sheet
    pub rows: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArrowsConfig {
    pub tile_width: u32,
    pub tile_height: u32,
    /// Tiles per row in the traveling arrow sheet
    pub columns: u32,
    pub container_scale: f32,
    pub gap_scale: f32,
    /// Stage row (in dots) where arrows arrive
    pub top_offset: f32,
    /// Rotation per lane, in degrees
    pub rotations: Vec<i32>,
    pub animation_interval_ms: u64,
    pub travel_ms: u64,
    pub spawn_interval_ms: u64,
    pub spawn_probability: f64,
    pub impact_ms: u64,
    pub fade_in_ms: u64,
    pub fade_out_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub columns: u32,
    pub frame_sequence: Vec<u32>,
    pub animation_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReelConfig {
    pub max_photos: usize,
    pub preview_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    pub fps: u16,
}

// ─── Defaults ───────────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        // The embedded TOML is ours, so it always parses
        toml::from_str(DEFAULT_CONFIG_TOML)
            .expect("BUG: embedded default_config.toml is invalid TOML")
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:80".into(),
            timeout_secs: 30,
        }
    }
}

impl Default for CaptureMode {
    fn default() -> Self {
        Self::Triple
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Triple,
            key: 'c',
            gamepad_devices: (0..4)
                .map(|n| PathBuf::from(format!("/dev/input/js{n}")))
                .collect(),
            gamepad_cooldown_ms: 10_000,
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("static/img"),
            score_sheet: "score.png".into(),
            arrows_sheet: "ddr_arrows.png".into(),
            ambient_sheet: "ddr_arrows_base.png".into(),
            impact: "flash.png".into(),
        }
    }
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            digits: 3,
            container_scale: 0.3,
            animation_ms: 970,
        }
    }
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            container_scale: 0.7,
            duration_ms: 4000,
            initial_delay_ms: 1000,
            rows: 5,
        }
    }
}

impl Default for ArrowsConfig {
    fn default() -> Self {
        Self {
            tile_width: 64,
            tile_height: 64,
            columns: 4,
            container_scale: 0.9,
            gap_scale: 0.02,
            top_offset: 1.0,
            rotations: vec![90, 0, 180, 270],
            animation_interval_ms: 200,
            travel_ms: 900,
            spawn_interval_ms: 300,
            spawn_probability: 0.3,
            impact_ms: 200,
            fade_in_ms: 50,
            fade_out_ms: 150,
        }
    }
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            columns: 2,
            frame_sequence: vec![0, 1],
            animation_interval_ms: 200,
        }
    }
}

impl Default for ReelConfig {
    fn default() -> Self {
        Self {
            max_photos: 3,
            preview_secs: 5,
        }
    }
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self { fps: 30 }
    }
}

// ─── Duration helpers ───────────────────────────────────────────────────

impl CountdownConfig {
    pub fn animation(&self) -> Duration {
        Duration::from_millis(self.animation_ms)
    }
}

impl ScoreConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl ArrowsConfig {
    pub fn travel(&self) -> Duration {
        Duration::from_millis(self.travel_ms)
    }

    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms)
    }

    pub fn animation_interval(&self) -> Duration {
        Duration::from_millis(self.animation_interval_ms)
    }

    pub fn impact(&self) -> Duration {
        Duration::from_millis(self.impact_ms)
    }

    pub fn fade_in(&self) -> Duration {
        Duration::from_millis(self.fade_in_ms)
    }

    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms)
    }

    /// Number of spawn ticks in one arrow sequence: `floor(travel / interval)`
    pub fn spawn_ticks(&self) -> u64 {
        if self.spawn_interval_ms == 0 {
            0
        } else {
            self.travel_ms / self.spawn_interval_ms
        }
    }

    /// Rotation in degrees for a lane, 0 when the lane has none configured
    pub fn rotation(&self, lane: usize) -> i32 {
        self.rotations.get(lane).copied().unwrap_or(0)
    }
}

impl AmbientConfig {
    pub fn animation_interval(&self) -> Duration {
        Duration::from_millis(self.animation_interval_ms)
    }
}

impl ReelConfig {
    pub fn preview_hold(&self) -> Duration {
        Duration::from_secs(self.preview_secs)
    }
}

// ─── Path Resolution ────────────────────────────────────────────────────

impl Config {
    /// Standard config file path: ~/.config/snapbooth/config.toml
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("snapbooth")
            .join("config.toml")
    }

    /// Log directory: ~/.local/share/snapbooth/
    pub fn log_dir() -> PathBuf {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("snapbooth");
        std::fs::create_dir_all(&data_dir).ok();
        data_dir
    }

    /// Render tick interval from FPS
    pub fn tick_rate(&self) -> Duration {
        let fps = self.appearance.fps.max(1);
        Duration::from_millis(1000 / fps as u64)
    }

    pub fn gamepad_cooldown(&self) -> Duration {
        Duration::from_millis(self.capture.gamepad_cooldown_ms)
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs.max(1))
    }
}

// ─── Bootloader ─────────────────────────────────────────────────────────

/// The single entry point for configuration. Called exactly once at startup.
///
/// 1. Resolve config file path (CLI override or default)
/// 2. If the config file doesn't exist, create directory tree + write defaults
/// 3. Parse TOML from disk into Config
/// 4. Apply CLI overrides on top
pub fn load(cli: &CliArgs) -> Result<Config> {
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&config_path, DEFAULT_CONFIG_TOML).wrap_err_with(|| {
            format!(
                "Failed to write default config to {}",
                config_path.display()
            )
        })?;
        info!("Created default config at {}", config_path.display());
    }

    let toml_str = std::fs::read_to_string(&config_path)
        .wrap_err_with(|| format!("Failed to read config from {}", config_path.display()))?;

    let mut config = parse(&toml_str).wrap_err_with(|| {
        format!(
            "Failed to parse config at {}.\n\
             Delete the file to regenerate defaults, or run:\n  \
             snapbooth --print-default-config > {:?}",
            config_path.display(),
            config_path
        )
    })?;

    apply_overrides(&mut config, cli);
    Ok(config)
}

/// Parse a TOML document; missing tables and keys fall back to defaults.
pub fn parse(toml_str: &str) -> Result<Config> {
    let config: Config = toml::from_str(toml_str)?;
    if config.ambient.frame_sequence.is_empty() {
        color_eyre::eyre::bail!("ambient.frame_sequence must not be empty");
    }
    Ok(config)
}

fn apply_overrides(config: &mut Config, cli: &CliArgs) {
    if let Some(ref server) = cli.server {
        config.server.base_url = server.clone();
    }
    if let Some(mode) = cli.mode {
        config.capture.mode = mode;
    }
    if let Some(ref dir) = cli.assets {
        config.assets.dir = dir.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(fps) = cli.fps {
        config.appearance.fps = fps;
    }
}

/// Returns the embedded default config TOML string.
pub fn default_config_toml() -> &'static str {
    DEFAULT_CONFIG_TOML
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_match_builtin_values() {
        let config = Config::default();
        assert_eq!(config.capture.mode, CaptureMode::Triple);
        assert_eq!(config.capture.key, 'c');
        assert_eq!(config.countdown.digits, 3);
        assert_eq!(config.arrows.travel_ms, 900);
        assert_eq!(config.arrows.spawn_ticks(), 3);
        assert_eq!(config.arrows.rotations, vec![90, 0, 180, 270]);
        assert_eq!(config.reel.max_photos, 3);
        assert_eq!(config.gamepad_cooldown(), Duration::from_secs(10));
    }

    #[test]
    fn partial_file_falls_back_per_key() {
        let config = parse("[arrows]\ntravel_ms = 1200\n").unwrap();
        assert_eq!(config.arrows.travel_ms, 1200);
        assert_eq!(config.arrows.spawn_interval_ms, 300);
        assert_eq!(config.score.rows, 5);
        assert_eq!(config.arrows.spawn_ticks(), 4);
    }

    #[test]
    fn empty_ambient_sequence_is_rejected() {
        assert!(parse("[ambient]\nframe_sequence = []\n").is_err());
    }

    #[test]
    fn cli_overrides_win() {
        let mut config = Config::default();
        let cli = CliArgs {
            server: Some("http://booth.local:8080".into()),
            mode: Some(CaptureMode::Single),
            fps: Some(10),
            ..Default::default()
        };
        apply_overrides(&mut config, &cli);
        assert_eq!(config.server.base_url, "http://booth.local:8080");
        assert_eq!(config.capture.mode, CaptureMode::Single);
        assert_eq!(config.tick_rate(), Duration::from_millis(100));
    }

    #[test]
    fn zero_spawn_interval_means_no_ticks() {
        let arrows = ArrowsConfig {
            spawn_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(arrows.spawn_ticks(), 0);
    }
}
