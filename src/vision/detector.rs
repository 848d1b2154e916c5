//! Threshold and kind-mapping layer over a [`VisionBackend`].
//!
//! DESIGN
//! ======
//! One `detect` call runs three backend passes. Humans and animals keep their
//! own boxes. Scene labels carry no location, so each matching kind becomes a
//! single full-frame detection at the best confidence seen for that kind.
//! A failing pass contributes nothing; the other passes still count.

use std::collections::HashMap;
use std::time::Instant;

use super::{BoundingBox, Detection, DetectionKind, Label, Observation, Runtime, VisionBackend, VisionError, unit};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

const VEHICLE_KEYWORDS: &[&str] = &[
    "car", "truck", "bus", "van", "vehicle", "motorcycle", "bike", "bicycle", "train", "tram", "subway", "taxi",
    "suv", "boat", "ship", "airplane", "aircraft", "helicopter", "scooter",
];

const PACKAGE_KEYWORDS: &[&str] = &[
    "package", "parcel", "box", "cardboard", "crate", "delivery", "shipping", "mail", "envelope", "container",
    "carton",
];

/// Words that contain a vehicle keyword without naming a vehicle.
const VEHICLE_LOOKALIKES: &[&str] = &["cardboard", "carton", "cartoon", "carpet", "scarf", "shipping", "vanilla", "bush"];

/// Words that contain a package keyword without naming a package.
const PACKAGE_LOOKALIKES: &[&str] = &["boxer", "boxing"];

pub struct VisionDetector<B> {
    backend: B,
    confidence_threshold: f32,
}

impl<B: VisionBackend> VisionDetector<B> {
    #[must_use]
    pub fn new(backend: B, confidence_threshold: f32) -> Self {
        Self { backend, confidence_threshold: clamp_threshold(confidence_threshold) }
    }

    #[must_use]
    pub fn with_default_threshold(backend: B) -> Self {
        Self::new(backend, DEFAULT_CONFIDENCE_THRESHOLD)
    }

    #[must_use]
    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn update_confidence_threshold(&mut self, threshold: f32) {
        self.confidence_threshold = clamp_threshold(threshold);
    }

    #[must_use]
    pub fn runtime(&self) -> Runtime {
        self.backend.runtime()
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run the classifier once and discard its output.
    ///
    /// # Errors
    ///
    /// Returns the backend's error when the runtime cannot process `image`.
    pub fn probe(&self, image: &B::Image) -> Result<(), VisionError> {
        self.backend.classify(image).map(|_| ())
    }

    /// Detections at or above the threshold, highest confidence first.
    #[must_use]
    pub fn detect(&self, image: &B::Image) -> Vec<Detection> {
        let started = Instant::now();
        let threshold = self.confidence_threshold;

        let mut detections = Vec::new();
        if let Some(humans) = pass("humans", self.backend.detect_humans(image)) {
            detections.extend(located(humans, DetectionKind::Person, threshold));
        }
        if let Some(animals) = pass("animals", self.backend.detect_animals(image)) {
            detections.extend(located(animals, DetectionKind::Animal, threshold));
        }
        if let Some(labels) = pass("classify", self.backend.classify(image)) {
            detections.extend(scene(&labels, threshold));
        }

        detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        tracing::debug!(
            detections = detections.len(),
            threshold,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "vision frame processed"
        );
        detections
    }
}

fn clamp_threshold(value: f32) -> f32 {
    if value.is_nan() { DEFAULT_CONFIDENCE_THRESHOLD } else { value.clamp(0.0, 1.0) }
}

fn pass<T>(name: &'static str, result: Result<Vec<T>, VisionError>) -> Option<Vec<T>> {
    match result {
        Ok(items) => Some(items),
        Err(e) => {
            tracing::debug!(pass = name, error = %e, "vision pass failed");
            None
        }
    }
}

fn located(observations: Vec<Observation>, kind: DetectionKind, threshold: f32) -> impl Iterator<Item = Detection> {
    observations
        .into_iter()
        .filter(move |o| o.confidence >= threshold)
        .map(move |o| Detection { kind, confidence: unit(o.confidence), bounding_box: o.bounding_box.clamped() })
}

fn scene(labels: &[Label], threshold: f32) -> Vec<Detection> {
    let mut best: HashMap<DetectionKind, f32> = HashMap::new();
    for label in labels.iter().filter(|l| l.confidence >= threshold) {
        let Some(kind) = kind_for_label(&label.identifier) else {
            continue;
        };
        let slot = best.entry(kind).or_insert(label.confidence);
        if label.confidence > *slot {
            *slot = label.confidence;
        }
    }

    best.into_iter()
        .map(|(kind, confidence)| Detection {
            kind,
            confidence: unit(confidence),
            bounding_box: BoundingBox::FULL_FRAME,
        })
        .collect()
}

/// Map a classifier identifier such as `sports_car` or `cardboard box` to a
/// kind. Keywords match anywhere in the label (`minivan`, `sailboat`), after
/// lookalike words are blanked out so `cardboard` never reads as `car`.
pub(crate) fn kind_for_label(identifier: &str) -> Option<DetectionKind> {
    let lower = identifier.to_lowercase();
    if mentions(&lower, VEHICLE_KEYWORDS, VEHICLE_LOOKALIKES) {
        Some(DetectionKind::Vehicle)
    } else if mentions(&lower, PACKAGE_KEYWORDS, PACKAGE_LOOKALIKES) {
        Some(DetectionKind::Package)
    } else {
        None
    }
}

fn mentions(label: &str, keywords: &[&str], lookalikes: &[&str]) -> bool {
    let masked = lookalikes
        .iter()
        .fold(label.to_owned(), |acc, word| acc.replace(word, " "));
    keywords.iter().any(|k| masked.contains(k))
}

#[cfg(test)]
#[path = "detector_test.rs"]
mod tests;
