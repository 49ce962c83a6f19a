/// Manual region selector
///
/// This module handles:
/// - Letterbox fit and screen→image coordinate conversion (geometry.rs)
/// - The modal drag-selection state machine (session.rs)
///
/// The UI overlay that renders the rubber-band rectangle lives in
/// `ui::selector_canvas`; everything here is pure logic so the coordinate
/// math and state transitions are testable without a window.

pub mod geometry;
pub mod session;

pub use geometry::{CanvasFit, ScreenRect, SelectionRect};
pub use session::{SelectorPhase, SelectorSession};
