//! Recorded-frame backend.
//!
//! A [`FixtureFrame`] is the JSON capture of what the platform passes reported
//! for one image. [`ReplayBackend`] hands those observations back verbatim, so
//! thresholding and kind mapping can be exercised without a vision runtime.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Label, Observation, RUNTIME_ENV, Runtime, VisionBackend, VisionError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureFrame {
    #[serde(default)]
    pub humans: Vec<Observation>,
    #[serde(default)]
    pub animals: Vec<Observation>,
    #[serde(default)]
    pub labels: Vec<Label>,
    /// When set, every pass on this frame fails with this reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_error: Option<String>,
}

impl FixtureFrame {
    /// Read a frame capture from disk.
    ///
    /// # Errors
    ///
    /// [`VisionError::FixtureMissing`] when `path` does not exist, otherwise
    /// an I/O or decode error.
    pub fn load(path: &Path) -> Result<Self, VisionError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(VisionError::FixtureMissing(path.to_path_buf())),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    fn available(&self) -> Result<(), VisionError> {
        match &self.runtime_error {
            Some(reason) => Err(VisionError::RuntimeUnavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayBackend {
    runtime: Runtime,
}

impl ReplayBackend {
    #[must_use]
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    /// Runtime taken from `CLAWPHONES_VISION_RUNTIME`; unset means device.
    #[must_use]
    pub fn from_env() -> Self {
        let runtime = std::env::var(RUNTIME_ENV).map_or(Runtime::Device, |raw| Runtime::parse(&raw));
        Self::new(runtime)
    }
}

impl VisionBackend for ReplayBackend {
    type Image = FixtureFrame;

    fn detect_humans(&self, image: &FixtureFrame) -> Result<Vec<Observation>, VisionError> {
        image.available()?;
        Ok(image.humans.clone())
    }

    fn detect_animals(&self, image: &FixtureFrame) -> Result<Vec<Observation>, VisionError> {
        image.available()?;
        Ok(image.animals.clone())
    }

    fn classify(&self, image: &FixtureFrame) -> Result<Vec<Label>, VisionError> {
        image.available()?;
        Ok(image.labels.clone())
    }

    fn runtime(&self) -> Runtime {
        self.runtime
    }
}

#[cfg(test)]
#[path = "fixture_test.rs"]
mod tests;
