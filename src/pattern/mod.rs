/// Muzzle pattern enrollment and duplicate detection
///
/// The ridge/groove pattern on a cow's muzzle identifies the animal like a
/// fingerprint. The client's contract is deliberately small: crop the
/// confirmed nose region out of the muzzle photo, send it to the recognition
/// service, and receive a verdict. Matching itself (feature extraction, hash
/// comparison) is entirely server-side.
///
/// A positive duplicate verdict is policy data, not an error: it names the
/// other applicant when known and hard-blocks the animal verification step,
/// enforcing one loan per animal.

use serde::Deserialize;

use crate::backend::RemoteError;
use crate::capture::{ImageBuffer, NormalizeConstraints};
use crate::error::PatternError;
use crate::selector::SelectionRect;

/// A cropped nose region bound to a loan application
#[derive(Debug, Clone)]
pub struct PatternSubmission {
    pub application_id: String,
    pub cropped_image: ImageBuffer,
    pub selection: SelectionRect,
}

impl PatternSubmission {
    /// Crop the confirmed region out of the muzzle photo.
    ///
    /// Requires a bound application id: the flow cannot run standalone
    /// before an application record exists.
    pub fn new(
        application_id: &str,
        muzzle_image: &ImageBuffer,
        selection: SelectionRect,
    ) -> Result<Self, PatternError> {
        if application_id.trim().is_empty() {
            return Err(PatternError::MissingApplicationContext);
        }

        let cropped_image = crop_to_selection(muzzle_image, selection)?;
        Ok(Self {
            application_id: application_id.trim().to_string(),
            cropped_image,
            selection,
        })
    }
}

/// The recognition service's authoritative answer
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatternVerdict {
    pub pattern_hash: String,
    pub confidence: f64,
    #[serde(default)]
    pub features: Vec<String>,
    pub is_duplicate: bool,
    #[serde(default)]
    pub duplicate_applicant_name: Option<String>,
}

impl PatternVerdict {
    /// Whether this verdict blocks the animal step from completing
    pub fn blocks_enrollment(&self) -> bool {
        self.is_duplicate
    }

    /// User-facing duplicate warning, naming the other applicant if known
    pub fn duplicate_notice(&self) -> Option<String> {
        if !self.is_duplicate {
            return None;
        }
        Some(match &self.duplicate_applicant_name {
            Some(name) => format!(
                "This animal's muzzle pattern is already enrolled on an application by {name}."
            ),
            None => {
                "This animal's muzzle pattern is already enrolled on another application."
                    .to_string()
            }
        })
    }
}

/// Seam to the recognition service, faked in tests
pub trait PatternBackend {
    async fn process_pattern(
        &self,
        submission: &PatternSubmission,
    ) -> Result<PatternVerdict, RemoteError>;
}

/// Send the cropped region and surface the verdict. Failures are
/// recoverable: the caller re-opens the selector and resubmits.
pub async fn submit_pattern<B: PatternBackend>(
    backend: &B,
    submission: &PatternSubmission,
) -> Result<PatternVerdict, PatternError> {
    backend
        .process_pattern(submission)
        .await
        .map_err(|e| PatternError::Remote(e.to_string()))
}

/// Crop the selection out of the photo and re-encode through the shared
/// JPEG path. The selection was clamped at confirm time, so it fits.
fn crop_to_selection(
    image: &ImageBuffer,
    selection: SelectionRect,
) -> Result<ImageBuffer, PatternError> {
    let decoded = image.decode().map_err(|e| PatternError::Crop(e.to_string()))?;
    let cropped = decoded
        .crop_imm(selection.x, selection.y, selection.width, selection.height)
        .to_rgb8();

    crate::capture::normalize::normalize_frame(cropped, &NormalizeConstraints::muzzle_photo())
        .map_err(|e| PatternError::Crop(e.to_string()))
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, RgbImage};

    use super::*;

    fn muzzle_photo(width: u32, height: u32) -> ImageBuffer {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 90])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(image::codecs::png::PngEncoder::new(&mut bytes))
            .unwrap();
        ImageBuffer {
            bytes,
            mime: "image/png".to_string(),
            width,
            height,
        }
    }

    fn selection() -> SelectionRect {
        SelectionRect {
            x: 20,
            y: 10,
            width: 120,
            height: 80,
        }
    }

    struct FixedBackend {
        response: Result<PatternVerdict, RemoteError>,
    }

    impl PatternBackend for FixedBackend {
        async fn process_pattern(
            &self,
            _submission: &PatternSubmission,
        ) -> Result<PatternVerdict, RemoteError> {
            self.response.clone()
        }
    }

    fn verdict(is_duplicate: bool) -> PatternVerdict {
        PatternVerdict {
            pattern_hash: "a1b2c3".to_string(),
            confidence: 0.87,
            features: vec!["ridge_map".to_string()],
            is_duplicate,
            duplicate_applicant_name: is_duplicate.then(|| "A. Otieno".to_string()),
        }
    }

    #[test]
    fn submission_requires_a_bound_application() {
        let result = PatternSubmission::new("  ", &muzzle_photo(200, 150), selection());
        assert!(matches!(
            result,
            Err(PatternError::MissingApplicationContext)
        ));
    }

    #[test]
    fn crop_matches_the_selection_dimensions() {
        let submission =
            PatternSubmission::new("APP-007", &muzzle_photo(200, 150), selection()).unwrap();
        assert_eq!(submission.cropped_image.width, 120);
        assert_eq!(submission.cropped_image.height, 80);
        assert_eq!(submission.cropped_image.mime, "image/jpeg");
        assert_eq!(submission.selection, selection());
    }

    #[tokio::test]
    async fn verdict_passes_through_and_duplicate_blocks() {
        let backend = FixedBackend {
            response: Ok(verdict(true)),
        };
        let submission =
            PatternSubmission::new("APP-007", &muzzle_photo(200, 150), selection()).unwrap();
        let verdict = submit_pattern(&backend, &submission).await.unwrap();
        assert!(verdict.blocks_enrollment());
        assert!(verdict.duplicate_notice().unwrap().contains("A. Otieno"));
    }

    #[tokio::test]
    async fn clean_verdict_does_not_block() {
        let backend = FixedBackend {
            response: Ok(verdict(false)),
        };
        let submission =
            PatternSubmission::new("APP-007", &muzzle_photo(200, 150), selection()).unwrap();
        let verdict = submit_pattern(&backend, &submission).await.unwrap();
        assert!(!verdict.blocks_enrollment());
        assert_eq!(verdict.duplicate_notice(), None);
    }

    #[tokio::test]
    async fn service_failure_is_a_recoverable_error_not_a_success() {
        let backend = FixedBackend {
            response: Err(RemoteError::Transport("connection refused".to_string())),
        };
        let submission =
            PatternSubmission::new("APP-007", &muzzle_photo(200, 150), selection()).unwrap();
        let err = submit_pattern(&backend, &submission).await.unwrap_err();
        assert!(matches!(err, PatternError::Remote(_)));
    }
}
