/// UI building blocks
///
/// This module handles:
/// - The selection-rectangle canvas overlay (selector_canvas.rs)
/// - View functions for the wizard, modals, and result panels (panels.rs)

pub mod panels;
pub mod selector_canvas;

/// Fixed display canvas for the region selector modal
pub const SELECTOR_CANVAS_WIDTH: f32 = 640.0;
pub const SELECTOR_CANVAS_HEIGHT: f32 = 480.0;
