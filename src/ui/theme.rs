use ratatui::style::{Color, Modifier, Style};

// ─── Icons ────────────────────────────────────────────────────────────────
pub const ICON_CAMERA: &str = "◉ ";
pub const ICON_LIVE: &str = "● ";
pub const ICON_PHOTO: &str = "▣ ";
pub const ICON_ERROR: &str = " ✗ ";
pub const ICON_OK: &str = " ✓ ";

// ─── Color Palette (terminal-adaptive, transparency-friendly) ──────────

/// Background: always Reset (transparent), respects terminal background
pub const BG: Color = Color::Reset;

/// Primary text color
pub const FG: Color = Color::White;

/// Dimmed text (labels, inactive elements)
pub const FG_DIM: Color = Color::DarkGray;

/// Accent color (active borders, keybinding hints)
pub const ACCENT: Color = Color::Cyan;

/// Border color (inactive)
pub const BORDER: Color = Color::DarkGray;

/// Capture ready / success indicator
pub const SUCCESS: Color = Color::Green;

/// Capture running
pub const WARNING: Color = Color::Yellow;

/// Error color
pub const ERROR: Color = Color::Red;

/// Stage backdrop behind the sprites
pub const STAGE_BG: Color = Color::Rgb(12, 12, 18);

/// Live indicator
pub const LIVE: Color = Color::Red;

/// Resolved styles handed to every widget
#[derive(Debug, Clone)]
pub struct Theme {
    pub fg: Color,
    pub fg_dim: Color,
    pub accent: Color,
    pub border: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub stage_bg: Color,
    pub live: Color,
    pub help_key: Style,
    pub help_desc: Style,
    pub status_bar: Style,
    pub dialog_border: Style,
    pub panel_border: Style,
    pub panel_title: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: FG,
            fg_dim: FG_DIM,
            accent: ACCENT,
            border: BORDER,
            success: SUCCESS,
            warning: WARNING,
            error: ERROR,
            stage_bg: STAGE_BG,
            live: LIVE,
            help_key: Style::default()
                .fg(ACCENT)
                .bg(BG)
                .add_modifier(Modifier::BOLD),
            help_desc: Style::default().fg(FG_DIM).bg(BG),
            status_bar: Style::default().fg(FG).bg(BG),
            dialog_border: Style::default().fg(ERROR).bg(BG),
            panel_border: Style::default().fg(BORDER).bg(BG),
            panel_title: Style::default()
                .fg(ACCENT)
                .bg(BG)
                .add_modifier(Modifier::BOLD),
        }
    }
}

/// Approximate RGB of a terminal color, used when blending the fade overlay
/// over cells that were drawn with named colors.
pub fn approx_rgb(color: Color) -> Option<(u8, u8, u8)> {
    let rgb = match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Black => (0, 0, 0),
        Color::Red => (205, 49, 49),
        Color::Green => (13, 188, 121),
        Color::Yellow => (229, 229, 16),
        Color::Blue => (36, 114, 200),
        Color::Magenta => (188, 63, 188),
        Color::Cyan => (17, 168, 205),
        Color::Gray => (204, 204, 204),
        Color::DarkGray => (118, 118, 118),
        Color::LightRed => (241, 76, 76),
        Color::LightGreen => (35, 209, 139),
        Color::LightYellow => (245, 245, 67),
        Color::LightBlue => (59, 142, 234),
        Color::LightMagenta => (214, 112, 214),
        Color::LightCyan => (41, 184, 219),
        Color::White => (229, 229, 229),
        Color::Reset | Color::Indexed(_) => return None,
    };
    Some(rgb)
}
