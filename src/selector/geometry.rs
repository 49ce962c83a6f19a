/// Letterbox fit and coordinate conversion for the region selector
///
/// The muzzle photo is scaled to fit a fixed display canvas while preserving
/// aspect ratio and centering with letterbox offsets. The scale factors
/// (natural / drawn) are retained so a rectangle dragged in screen space can
/// be converted back to original-image pixels on confirm.

use serde::Serialize;

/// A confirmed selection in original-image pixel space.
///
/// Invariant once confirmed: `x + width <= image width`,
/// `y + height <= image height`, width and height strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectionRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A rectangle in display-canvas coordinates (min corner + absolute size)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    /// Normalize a drag from an anchor to the current pointer position:
    /// min corner plus absolute size, so dragging up-left works too
    pub fn from_drag(anchor: (f32, f32), current: (f32, f32)) -> Self {
        Self {
            x: anchor.0.min(current.0),
            y: anchor.1.min(current.1),
            width: (current.0 - anchor.0).abs(),
            height: (current.1 - anchor.1).abs(),
        }
    }
}

/// How a natural-size image maps onto the fixed display canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasFit {
    /// Source image pixel width
    pub natural_width: u32,
    /// Source image pixel height
    pub natural_height: u32,
    /// Size of the image as drawn on the canvas
    pub drawn_width: f32,
    pub drawn_height: f32,
    /// Letterbox offsets centering the drawn image
    pub offset_x: f32,
    pub offset_y: f32,
    /// Conversion factors back to image pixels: natural / drawn
    pub scale_x: f32,
    pub scale_y: f32,
}

impl CanvasFit {
    /// Fit an image into the canvas, preserving aspect ratio and centering
    pub fn compute(natural_width: u32, natural_height: u32, canvas_width: f32, canvas_height: f32) -> Self {
        let nw = natural_width.max(1) as f32;
        let nh = natural_height.max(1) as f32;
        let scale = (canvas_width / nw).min(canvas_height / nh);

        let drawn_width = nw * scale;
        let drawn_height = nh * scale;

        Self {
            natural_width,
            natural_height,
            drawn_width,
            drawn_height,
            offset_x: (canvas_width - drawn_width) / 2.0,
            offset_y: (canvas_height - drawn_height) / 2.0,
            scale_x: nw / drawn_width,
            scale_y: nh / drawn_height,
        }
    }

    /// Convert a screen-space rectangle back to original-image pixels,
    /// clamped so it never extends outside the image. The result can be
    /// zero-sized; validation is the confirm step's job.
    pub fn to_image_space(&self, rect: ScreenRect) -> SelectionRect {
        let max_w = self.natural_width as f32;
        let max_h = self.natural_height as f32;

        let x0 = ((rect.x - self.offset_x) * self.scale_x).clamp(0.0, max_w);
        let y0 = ((rect.y - self.offset_y) * self.scale_y).clamp(0.0, max_h);
        let x1 = ((rect.x + rect.width - self.offset_x) * self.scale_x).clamp(0.0, max_w);
        let y1 = ((rect.y + rect.height - self.offset_y) * self.scale_y).clamp(0.0, max_h);

        let x = x0.round() as u32;
        let y = y0.round() as u32;
        SelectionRect {
            x,
            y,
            width: (x1.round() as u32).saturating_sub(x),
            height: (y1.round() as u32).saturating_sub(y),
        }
    }
}
