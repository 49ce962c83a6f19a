/// Drag-selection state machine for the region selector modal
///
/// Idle → (pointer down) → Dragging → (pointer up) → Selected, with Reset
/// back to Idle. Confirm converts the frozen rectangle to image pixels and
/// validates it; an empty selection keeps the session (and therefore the
/// modal) open. Cancel is the caller dropping the session — all transient
/// state goes with it and no rectangle is produced.

use crate::capture::ImageBuffer;
use crate::error::SelectionError;
use crate::selector::geometry::{CanvasFit, ScreenRect, SelectionRect};

/// Where the interaction currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorPhase {
    /// No drag in progress and nothing selected
    Idle,
    /// Pointer is down; the rubber-band rectangle follows it
    Dragging,
    /// Pointer released; rectangle frozen until Reset or Confirm
    Selected,
}

/// One modal selection session over a muzzle photo
pub struct SelectorSession {
    image: ImageBuffer,
    fit: CanvasFit,
    phase: SelectorPhase,
    anchor: Option<(f32, f32)>,
    current: Option<ScreenRect>,
}

impl SelectorSession {
    /// Start a session for the given photo on a fixed-size display canvas
    pub fn new(image: ImageBuffer, canvas_width: f32, canvas_height: f32) -> Self {
        let fit = CanvasFit::compute(image.width, image.height, canvas_width, canvas_height);
        Self {
            image,
            fit,
            phase: SelectorPhase::Idle,
            anchor: None,
            current: None,
        }
    }

    pub fn phase(&self) -> SelectorPhase {
        self.phase
    }

    /// The photo this session selects over (the modal renders it)
    pub fn image(&self) -> &ImageBuffer {
        &self.image
    }

    /// Rubber-band rectangle in canvas coordinates, if any
    pub fn screen_rect(&self) -> Option<ScreenRect> {
        self.current
    }

    /// Frozen selection size in image pixels, for the dimensions readout
    pub fn selected_dimensions(&self) -> Option<(u32, u32)> {
        if self.phase != SelectorPhase::Selected {
            return None;
        }
        let rect = self.fit.to_image_space(self.current?);
        Some((rect.width, rect.height))
    }

    /// Pointer down: start a fresh drag, discarding any previous rectangle
    pub fn begin_drag(&mut self, x: f32, y: f32) {
        self.anchor = Some((x, y));
        self.current = Some(ScreenRect::from_drag((x, y), (x, y)));
        self.phase = SelectorPhase::Dragging;
    }

    /// Pointer moved while dragging
    pub fn drag_to(&mut self, x: f32, y: f32) {
        if self.phase != SelectorPhase::Dragging {
            return;
        }
        if let Some(anchor) = self.anchor {
            self.current = Some(ScreenRect::from_drag(anchor, (x, y)));
        }
    }

    /// Pointer up: freeze the rectangle
    pub fn end_drag(&mut self) {
        if self.phase == SelectorPhase::Dragging {
            self.anchor = None;
            self.phase = SelectorPhase::Selected;
        }
    }

    /// Clear the rectangle and return to Idle
    pub fn reset(&mut self) {
        self.anchor = None;
        self.current = None;
        self.phase = SelectorPhase::Idle;
    }

    /// Convert the frozen rectangle to image pixels and validate it.
    /// On failure the session is untouched, so the modal stays open.
    pub fn confirm(&self) -> Result<SelectionRect, SelectionError> {
        let rect = match (self.phase, self.current) {
            (SelectorPhase::Selected, Some(rect)) => rect,
            _ => return Err(SelectionError::NoSelection),
        };

        let selection = self.fit.to_image_space(rect);
        if selection.width == 0 || selection.height == 0 {
            return Err(SelectionError::EmptySelection);
        }
        Ok(selection)
    }
}
