//! On-device object detection.
//!
//! DESIGN
//! ======
//! The platform classifier sits behind [`VisionBackend`]; this module owns
//! only what happens around it: confidence thresholding, mapping scene labels
//! to detection kinds, and keeping every box inside the unit square.
//! [`ReplayBackend`] replays recorded observations so the pipeline runs
//! anywhere, including CI machines with no vision runtime at all.

pub mod detector;
pub mod fixture;

pub use detector::{DEFAULT_CONFIDENCE_THRESHOLD, VisionDetector};
pub use fixture::{FixtureFrame, ReplayBackend};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable naming the runtime the replay backend reports.
pub const RUNTIME_ENV: &str = "CLAWPHONES_VISION_RUNTIME";

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("vision runtime unavailable: {0}")]
    RuntimeUnavailable(String),
    #[error("missing fixture: {}", .0.display())]
    FixtureMissing(PathBuf),
    #[error("failed to read fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode fixture: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    Person,
    Animal,
    Vehicle,
    Package,
    Other,
}

/// Where inference runs. Timing guarantees only hold on [`Runtime::Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    #[default]
    Device,
    Simulator,
}

impl Runtime {
    /// Parse a runtime name; anything other than `simulator` means device.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("simulator") {
            Self::Simulator
        } else {
            Self::Device
        }
    }
}

/// Axis-aligned rectangle in normalized image coordinates, stored as corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl BoundingBox {
    pub const FULL_FRAME: Self = Self { min_x: 0.0, min_y: 0.0, max_x: 1.0, max_y: 1.0 };

    #[must_use]
    pub fn from_origin_size(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { min_x: x, min_y: y, max_x: x + width, max_y: y + height }
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// True when every edge lies within `[0, 1]`.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    /// Clip into the unit square. Inverted edges collapse to zero size.
    #[must_use]
    pub fn clamped(self) -> Self {
        let min_x = unit(self.min_x);
        let min_y = unit(self.min_y);
        Self { min_x, min_y, max_x: unit(self.max_x).max(min_x), max_y: unit(self.max_y).max(min_y) }
    }
}

pub(crate) fn unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub kind: DetectionKind,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// A located object reported by a human or animal detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// A whole-frame scene classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub identifier: String,
    pub confidence: f32,
}

/// The platform inference passes the detector composes.
pub trait VisionBackend: Send + Sync {
    type Image;

    /// # Errors
    ///
    /// Returns a [`VisionError`] if the pass cannot run.
    fn detect_humans(&self, image: &Self::Image) -> Result<Vec<Observation>, VisionError>;

    /// # Errors
    ///
    /// Returns a [`VisionError`] if the pass cannot run.
    fn detect_animals(&self, image: &Self::Image) -> Result<Vec<Observation>, VisionError>;

    /// Scene labels for the whole frame.
    ///
    /// # Errors
    ///
    /// Returns a [`VisionError`] if the pass cannot run.
    fn classify(&self, image: &Self::Image) -> Result<Vec<Label>, VisionError>;

    fn runtime(&self) -> Runtime {
        Runtime::Device
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
