//! Half-block compositor: the stage is a grid of dots, two per terminal
//! cell (upper half drawn with `▀` in the foreground color, lower half in
//! the background color). Sprites are scaled nearest-neighbor so pixel art
//! stays crisp.

use image::RgbaImage;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Widget};

use crate::reel::PreviewDisplay;
use crate::stage::{Layer, StageView, SurfaceFrame};
use crate::ui::theme::{self, Theme};

const UPPER_HALF: &str = "▀";

type Rgb = [u8; 3];

/// Off-screen dot buffer the stage is composed into
#[derive(Debug, Clone)]
pub struct DotCanvas {
    width: usize,
    height: usize,
    dots: Vec<Rgb>,
}

impl DotCanvas {
    pub fn new(width: usize, height: usize, background: Rgb) -> Self {
        Self {
            width,
            height,
            dots: vec![background; width * height],
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        (x < self.width && y < self.height).then(|| self.dots[y * self.width + x])
    }

    /// Alpha-blend `rgb` over the dot at `(x, y)`
    pub fn blend(&mut self, x: usize, y: usize, rgb: Rgb, alpha: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let dot = &mut self.dots[y * self.width + x];
        *dot = mix(*dot, rgb, alpha);
    }

    /// Draw `image` scaled to fit the canvas, centered, aspect preserved
    pub fn draw_image_fit(&mut self, image: &RgbaImage) {
        let (iw, ih) = image.dimensions();
        if iw == 0 || ih == 0 || self.width == 0 || self.height == 0 {
            return;
        }
        let scale = (self.width as f32 / iw as f32).min(self.height as f32 / ih as f32);
        let frame = SurfaceFrame {
            canvas: image,
            width: iw as f32 * scale,
            height: ih as f32 * scale,
            left: (self.width as f32 - iw as f32 * scale) / 2.0,
            top: (self.height as f32 - ih as f32 * scale) / 2.0,
            rotation: Default::default(),
            opacity: 1.0,
        };
        self.draw_surface(&frame);
    }

    /// Composite one surface; every covered dot samples the nearest source
    /// pixel after undoing the rotation.
    pub fn draw_surface(&mut self, frame: &SurfaceFrame<'_>) {
        let (cw, ch) = frame.canvas.dimensions();
        if cw == 0 || ch == 0 || frame.width <= 0.0 || frame.height <= 0.0 || frame.opacity <= 0.0 {
            return;
        }

        let x0 = frame.left.floor().max(0.0) as usize;
        let y0 = frame.top.floor().max(0.0) as usize;
        let x1 = ((frame.left + frame.width).ceil().max(0.0) as usize).min(self.width);
        let y1 = ((frame.top + frame.height).ceil().max(0.0) as usize).min(self.height);

        for y in y0..y1 {
            let v = (y as f32 + 0.5 - frame.top) / frame.height;
            if !(0.0..1.0).contains(&v) {
                continue;
            }
            for x in x0..x1 {
                let u = (x as f32 + 0.5 - frame.left) / frame.width;
                if !(0.0..1.0).contains(&u) {
                    continue;
                }
                let (su, sv) = frame.rotation.source_uv(u, v);
                let px = ((su * cw as f32) as u32).min(cw - 1);
                let py = ((sv * ch as f32) as u32).min(ch - 1);
                let pixel = frame.canvas.get_pixel(px, py).0;
                let alpha = pixel[3] as f32 / 255.0 * frame.opacity;
                if alpha > 0.0 {
                    self.blend(x, y, [pixel[0], pixel[1], pixel[2]], alpha);
                }
            }
        }
    }

    /// Write the canvas into `area`, one cell per two vertical dots
    pub fn to_cells(&self, area: Rect, buf: &mut Buffer) {
        for row in 0..area.height {
            for col in 0..area.width {
                let (x, y) = (col as usize, row as usize * 2);
                let (Some(upper), Some(lower)) = (self.get(x, y), self.get(x, y + 1)) else {
                    continue;
                };
                buf[(area.x + col, area.y + row)]
                    .set_symbol(UPPER_HALF)
                    .set_fg(to_color(upper))
                    .set_bg(to_color(lower));
            }
        }
    }
}

pub fn mix(from: Rgb, to: Rgb, t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let channel = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    [
        channel(from[0], to[0]),
        channel(from[1], to[1]),
        channel(from[2], to[2]),
    ]
}

fn to_color([r, g, b]: Rgb) -> Color {
    Color::Rgb(r, g, b)
}

/// The stage panel: preview backdrop, then every visible surface back to
/// front.
pub struct StageWidget<'a> {
    pub view: &'a StageView<'a>,
    pub preview: &'a PreviewDisplay,
    pub theme: &'a Theme,
}

impl Widget for StageWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let background = theme::approx_rgb(self.theme.stage_bg)
            .map(|(r, g, b)| [r, g, b])
            .unwrap_or([0, 0, 0]);
        let mut canvas = DotCanvas::new(area.width as usize, area.height as usize * 2, background);

        if let PreviewDisplay::Photo { image, .. } = self.preview {
            canvas.draw_image_fit(image);
        }
        for surface in self.view.surfaces() {
            if surface.layer == Layer::Ambient && !self.view.ambient_visible {
                continue;
            }
            canvas.draw_surface(&surface.frame_at(self.view.now));
        }
        canvas.to_cells(area, buf);

        let label = match self.preview {
            PreviewDisplay::Live => Span::styled(
                format!(" {}LIVE ", theme::ICON_LIVE),
                Style::default()
                    .fg(self.theme.live)
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            ),
            PreviewDisplay::Photo { filename, .. } => Span::styled(
                format!(" {}{filename} ", theme::ICON_PHOTO),
                Style::default().fg(self.theme.fg).bg(Color::Black),
            ),
        };
        let label_area = Rect::new(
            area.x,
            area.y + area.height.saturating_sub(1),
            area.width,
            area.height.min(1),
        );
        Paragraph::new(Line::from(label)).render(label_area, buf);
    }
}
