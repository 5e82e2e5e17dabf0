// ── Viewport ──

use crate::config::EditorConfig;
use crate::geometry::Point;
use crate::message::Modifiers;

/// Lower and upper bounds for the fitted scale after a snapshot.
pub const FIT_SCALE_MIN: f64 = 0.1;
pub const FIT_SCALE_MAX: f64 = 2.0;

/// Pan, zoom and pointer state. Screen coordinates are canvas pixels;
/// "scaled" coordinates are virtual canvas units.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub scale: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub graph_width: f64,
    pub graph_height: f64,
    pub mouse_x: f64,
    pub mouse_y: f64,
    pub scaled_x: f64,
    pub scaled_y: f64,
    pub pressed_x: f64,
    pub pressed_y: f64,
    pub pressed_scaled_x: f64,
    pub pressed_scaled_y: f64,
    /// Modifier keys held at the last pointer event.
    pub modifiers: Modifiers,
}

impl View {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            scale: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            graph_width: config.graph_width,
            graph_height: config.graph_height,
            mouse_x: 0.0,
            mouse_y: 0.0,
            scaled_x: 0.0,
            scaled_y: 0.0,
            pressed_x: 0.0,
            pressed_y: 0.0,
            pressed_scaled_x: 0.0,
            pressed_scaled_y: 0.0,
            modifiers: Modifiers::default(),
        }
    }

    /// Record the pointer position and its virtual coordinates.
    pub fn pointer(&mut self, x: f64, y: f64) {
        self.mouse_x = x;
        self.mouse_y = y;
        self.update_scaled();
    }

    pub fn update_scaled(&mut self) {
        let p = self.to_virtual(self.mouse_x, self.mouse_y);
        self.scaled_x = p.x;
        self.scaled_y = p.y;
    }

    /// Remember the current pointer as the press origin.
    pub fn press(&mut self) {
        self.pressed_x = self.mouse_x;
        self.pressed_y = self.mouse_y;
        self.pressed_scaled_x = self.scaled_x;
        self.pressed_scaled_y = self.scaled_y;
    }

    pub fn scaled(&self) -> Point {
        Point::new(self.scaled_x, self.scaled_y)
    }

    pub fn to_virtual(&self, x: f64, y: f64) -> Point {
        Point::new((x - self.pan_x) / self.scale, (y - self.pan_y) / self.scale)
    }

    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.scale + self.pan_x, p.y * self.scale + self.pan_y)
    }

    /// Change scale keeping the virtual point under the pointer fixed.
    pub fn zoom_at_pointer(&mut self, scale: f64) {
        let anchor = self.to_virtual(self.mouse_x, self.mouse_y);
        self.scale = scale;
        self.pan_x = self.mouse_x - anchor.x * scale;
        self.pan_y = self.mouse_y - anchor.y * scale;
        self.update_scaled();
    }

    /// Virtual point currently shown at the canvas center.
    pub fn virtual_center(&self) -> Point {
        self.to_virtual(self.graph_width / 2.0, self.graph_height / 2.0)
    }

    /// Pan that puts virtual point `p` at the canvas center at `scale`.
    pub fn pan_for_center(&self, p: Point, scale: f64) -> Point {
        Point::new(
            self.graph_width / 2.0 - p.x * scale,
            self.graph_height / 2.0 - p.y * scale,
        )
    }

    /// Fit an extent `(min_x, min_y, max_x, max_y)` of device centers.
    ///
    /// Leaves room for the palettes and button bar; scale is clamped to
    /// `[0.1, 2.0]`.
    pub fn fit(&mut self, (min_x, min_y, max_x, max_y): (f64, f64, f64, f64)) {
        let diff_x = max_x - min_x;
        let diff_y = max_y - min_y;
        let fit = ((self.graph_width - 200.0) / diff_x).min((self.graph_height - 300.0) / diff_y);
        self.scale = if fit.is_nan() {
            FIT_SCALE_MAX
        } else {
            fit.clamp(FIT_SCALE_MIN, FIT_SCALE_MAX)
        };
        self.pan_x = self.scale * (-min_x - diff_x / 2.0) + self.graph_width / 2.0;
        self.pan_y = self.scale * (-min_y - diff_y / 2.0) + self.graph_height / 2.0;
        self.update_scaled();
    }
}
