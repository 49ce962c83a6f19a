/// Image capture and normalization
///
/// This module handles:
/// - Validating and normalizing user-supplied photos (normalize.rs)
/// - Live webcam capture as a scoped-acquisition session (camera.rs)
///
/// Everything downstream (selector, estimation, pattern flow) consumes the
/// bounded JPEG `ImageBuffer` produced here; nothing else touches raw files.

pub mod camera;
pub mod normalize;

pub use normalize::{ImageBuffer, NormalizeConstraints};
