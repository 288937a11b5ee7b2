//! Face locating, center-crop fallback and heuristic facial regions for the
//! Baby Vision demo page.
//!
//! A [`Session`] holds the page state for two parents. Each upload runs face
//! detection through a [`VisionBackend`], falls back to a centered square crop
//! when no face is found, and estimates eye, nose and mouth regions on the
//! result. Once both parents have features, a [`BabyGenerator`] can be asked
//! for a picture; the bundled [`SimulatedGenerator`] only waits and answers
//! with an explanatory message.
//!
//! # Example
//!
//! ```no_run
//! use babyvision::{FsAssetSource, LibraryLoader, PageConfig, Parent, Session};
//!
//! # async fn run() {
//! let loader = LibraryLoader::builtin();
//! let assets = FsAssetSource::new("public");
//! let mut session = Session::boot(PageConfig::default(), &loader, &assets).await;
//!
//! let photo = std::fs::read("mom.jpg").unwrap();
//! let stage = session.upload(Parent::Mom, &photo);
//! println!("mom: {stage:?}, banner: {:?}", session.error());
//! # }
//! ```

mod asset;
mod codec;
mod config;
mod crop;
mod error;
/// Face detection traits and data types.
pub mod face_detector;
mod features;
mod generation;
mod loader;
mod locate;
#[cfg(feature = "rustface")]
/// Built-in SeetaFace-based face detector.
pub mod rustface_backend;
mod session;
/// The injectable computer-vision capability.
pub mod vision;

/// Classifier bytes, their per-session state, and where they come from.
pub use asset::{fetch_classifier, AssetSource, ClassifierBytes, ClassifierState};
#[cfg(not(target_arch = "wasm32"))]
/// Filesystem asset source.
pub use asset::FsAssetSource;
/// Image decoding and encoding helpers.
pub use codec::{decode_upload, encode_png, parse_data_url, EncodedImage, Upload};
/// Page configuration.
pub use config::{
    DetectorTuning, FeatureParams, PageConfig, DEFAULT_CLASSIFIER_PATH,
    DEFAULT_GENERATION_DELAY_MS,
};
/// Crop regions and face images.
pub use crop::{center_crop, center_square, clamp_bounds, CropRegion, FaceImage, FaceSource};
/// Error type returned by babyvision operations.
pub use error::BabyVisionError;
/// Face detection trait and face bounding-box type.
pub use face_detector::{FaceBounds, FaceDetector};
/// Heuristic facial regions.
pub use features::{extract_features, render, FacialFeatures, FeatureExtraction, Region};
#[cfg(not(target_arch = "wasm32"))]
/// Tokio-backed timer.
pub use generation::TokioTimer;
/// Generation request/response seam and the simulated generator.
pub use generation::{
    BabyGenerator, GenerationRequest, GenerationResponse, ParentInput, SimulatedGenerator, Timer,
    SIMULATED_GENERATION_MESSAGE,
};
/// Single-fire vision library loading.
pub use loader::{BackendSource, BuiltinSource, LibraryLoader, SharedBackend};
/// Face location.
pub use locate::{locate_face, DetectionOutcome};
#[cfg(feature = "rustface")]
/// Built-in detector that parses a SeetaFace model.
pub use rustface_backend::RustfaceDetector;
/// Page state.
pub use session::{
    GenerationState, Parent, ParentSlot, ParentStage, Session, BACKEND_NOT_READY_MESSAGE,
    CLASSIFIER_FAILED_MESSAGE, DETECTION_FAILED_MESSAGE,
};
/// Vision backend trait and built-in implementation.
pub use vision::{contour_area, ImageprocBackend, VisionBackend};
