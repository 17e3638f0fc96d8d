// THEORY:
// The `capability` module is the seam between this crate and the external
// segmentation model. The pipeline never talks to a model runtime directly;
// it talks to a `MaskGenerator` implementation injected at construction
// time, and to a `CapabilityHandle` that records whether one was ever
// attached.
//
// Key architectural principles:
// 1.  **Injected, not ambient**: there is no process-wide model state.
//     Whoever builds the pipeline owns loading the model and hands over a
//     boxed generator. Tests inject fakes the same way production injects
//     a real runtime.
// 2.  **Two states, one direction**: a handle starts `unavailable` with a
//     reason and can transition to `available` exactly once. There is no
//     automatic retry; a failed load stays observable until the caller
//     explicitly attaches a working generator.
// 3.  **Status without inference**: `CapabilityStatus` is queryable at any
//     time, independent of any analysis call, so operators can check model
//     health without running an image through the pipeline.

use image::RgbImage;
use serde::Serialize;

use crate::core_modules::mask::RawMask;
use crate::error::AnalysisError;

/// The external segmentation capability: given an image at the processing
/// resolution, produces candidate masks at that same resolution.
pub trait MaskGenerator: Send + Sync {
    /// Runs segmentation and returns one [`RawMask`] per candidate object.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Inference`] when the loaded model fails on
    /// this specific image.
    fn generate(&self, image: &RgbImage) -> Result<Vec<RawMask>, AnalysisError>;

    /// Device label reported in [`CapabilityStatus`], e.g. "cpu" or
    /// "cuda:0".
    fn device(&self) -> String {
        "cpu".to_string()
    }
}

/// Snapshot of the capability's load state.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityStatus {
    pub loaded: bool,
    pub device: String,
    pub error: Option<String>,
}

/// Owns the optional generator and the reason it is missing.
pub struct CapabilityHandle {
    generator: Option<Box<dyn MaskGenerator>>,
    load_error: Option<String>,
}

impl CapabilityHandle {
    /// A handle with no generator attached, carrying the reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            generator: None,
            load_error: Some(reason.into()),
        }
    }

    /// A handle that starts in the available state.
    pub fn available(generator: Box<dyn MaskGenerator>) -> Self {
        Self {
            generator: Some(generator),
            load_error: None,
        }
    }

    /// Attaches a generator if none is attached yet. The available state is
    /// terminal; a second attach leaves the first generator in place.
    /// Returns the status after the attempt.
    pub fn attach(&mut self, generator: Box<dyn MaskGenerator>) -> CapabilityStatus {
        if self.generator.is_none() {
            self.generator = Some(generator);
            self.load_error = None;
        }
        self.status()
    }

    pub fn generator(&self) -> Option<&dyn MaskGenerator> {
        self.generator.as_deref()
    }

    /// The reason no generator is attached, when in the unavailable state.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn status(&self) -> CapabilityStatus {
        match &self.generator {
            Some(generator) => CapabilityStatus {
                loaded: true,
                device: generator.device(),
                error: None,
            },
            None => CapabilityStatus {
                loaded: false,
                device: "cpu".to_string(),
                error: self.load_error.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopGenerator;

    impl MaskGenerator for NoopGenerator {
        fn generate(&self, _image: &RgbImage) -> Result<Vec<RawMask>, AnalysisError> {
            Ok(Vec::new())
        }

        fn device(&self) -> String {
            "cuda:0".to_string()
        }
    }

    #[test]
    fn unavailable_handle_reports_its_reason() {
        let handle = CapabilityHandle::unavailable("checkpoint missing");
        let status = handle.status();
        assert!(!status.loaded);
        assert_eq!(status.device, "cpu");
        assert_eq!(status.error.as_deref(), Some("checkpoint missing"));
        assert!(handle.generator().is_none());
    }

    #[test]
    fn attach_transitions_to_available() {
        let mut handle = CapabilityHandle::unavailable("not initialized");
        let status = handle.attach(Box::new(NoopGenerator));
        assert!(status.loaded);
        assert_eq!(status.device, "cuda:0");
        assert!(status.error.is_none());
        assert!(handle.generator().is_some());
    }

    #[test]
    fn available_state_is_terminal() {
        struct OtherDevice;

        impl MaskGenerator for OtherDevice {
            fn generate(&self, _image: &RgbImage) -> Result<Vec<RawMask>, AnalysisError> {
                Ok(Vec::new())
            }

            fn device(&self) -> String {
                "mps".to_string()
            }
        }

        let mut handle = CapabilityHandle::available(Box::new(NoopGenerator));
        let status = handle.attach(Box::new(OtherDevice));
        assert!(status.loaded);
        assert_eq!(status.device, "cuda:0");
    }

    #[test]
    fn status_serializes_the_wire_fields() {
        let handle = CapabilityHandle::unavailable("no checkpoint");
        let json = serde_json::to_value(handle.status()).expect("serialize");
        assert_eq!(json["loaded"], false);
        assert_eq!(json["device"], "cpu");
        assert_eq!(json["error"], "no checkpoint");
    }
}
