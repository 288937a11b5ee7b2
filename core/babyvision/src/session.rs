//! Page state: one pipeline per parent, the error banner, and the gated
//! generate action.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::DynamicImage;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::asset::{fetch_classifier, AssetSource, ClassifierState};
use crate::codec::{decode_upload, EncodedImage};
use crate::config::PageConfig;
use crate::crop::{center_crop, FaceImage};
use crate::error::BabyVisionError;
use crate::face_detector::FaceDetector;
use crate::features::{extract_features, FacialFeatures};
use crate::generation::{BabyGenerator, GenerationRequest, GenerationResponse, ParentInput};
use crate::loader::LibraryLoader;
use crate::locate::{locate_face, DetectionOutcome};
use crate::vision::VisionBackend;

pub const CLASSIFIER_FAILED_MESSAGE: &str = "Failed to load face detection model";
pub const BACKEND_NOT_READY_MESSAGE: &str = "Vision library not ready";
pub const DETECTION_FAILED_MESSAGE: &str = "Face detection failed";

/// Whose photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Parent {
    Mom,
    Dad,
}

impl Parent {
    pub const ALL: [Parent; 2] = [Parent::Mom, Parent::Dad];

    pub fn as_str(&self) -> &'static str {
        match self {
            Parent::Mom => "mom",
            Parent::Dad => "dad",
        }
    }

    /// Title-case possessive, as used on the upload cards ("Mom's Photo").
    pub fn possessive(&self) -> &'static str {
        match self {
            Parent::Mom => "Mom's",
            Parent::Dad => "Dad's",
        }
    }
}

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parent {
    type Err = BabyVisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mom" => Ok(Parent::Mom),
            "dad" => Ok(Parent::Dad),
            _ => Err(BabyVisionError::UnknownParent(s.to_string())),
        }
    }
}

/// Progress of one parent's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParentStage {
    #[default]
    Idle,
    Uploaded,
    Detecting,
    FaceFound,
    Fallback,
    FeaturesExtracted,
}

impl ParentStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentStage::Idle => "idle",
            ParentStage::Uploaded => "uploaded",
            ParentStage::Detecting => "detecting",
            ParentStage::FaceFound => "faceFound",
            ParentStage::Fallback => "fallback",
            ParentStage::FeaturesExtracted => "featuresExtracted",
        }
    }
}

/// Everything the page shows for one parent.
#[derive(Debug, Clone, Default)]
pub struct ParentSlot {
    pub stage: ParentStage,
    /// The photo as uploaded.
    pub upload: Option<EncodedImage>,
    /// Detected face or center-crop substitute.
    pub face: Option<FaceImage>,
    pub features: Option<FacialFeatures>,
    /// Face image with the feature overlay.
    pub visualization: Option<EncodedImage>,
}

/// The generate action's state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GenerationState {
    #[default]
    Idle,
    Generating,
    Done {
        message: Option<String>,
        baby_image: Option<EncodedImage>,
    },
}

/// State of the single demo page.
pub struct Session {
    config: PageConfig,
    backend: Option<Arc<dyn VisionBackend>>,
    classifier: ClassifierState,
    /// Built from the loaded classifier once a backend is attached.
    detector: Option<Box<dyn FaceDetector>>,
    error: Option<String>,
    mom: ParentSlot,
    dad: ParentSlot,
    generation: GenerationState,
}

impl Session {
    /// A session with no backend and no classifier yet.
    pub fn new(config: PageConfig) -> Self {
        Self {
            config,
            backend: None,
            classifier: ClassifierState::Pending,
            detector: None,
            error: None,
            mom: ParentSlot::default(),
            dad: ParentSlot::default(),
            generation: GenerationState::Idle,
        }
    }

    /// Wait for the vision library, then fetch the classifier once.
    ///
    /// If the library never becomes ready the session is returned without a
    /// backend; that failure is only logged.
    pub async fn boot(
        config: PageConfig,
        loader: &LibraryLoader,
        assets: &dyn AssetSource,
    ) -> Self {
        let mut session = Self::new(config);
        match loader.ready().await {
            Some(backend) => {
                session.attach_backend(backend);
                let state = fetch_classifier(assets, &session.config.classifier_path).await;
                session.set_classifier(state);
            }
            None => warn!("vision library unavailable, uploads will not be processed"),
        }
        session
    }

    pub fn attach_backend(&mut self, backend: Arc<dyn VisionBackend>) {
        info!("session using vision backend {}", backend.name());
        self.backend = Some(backend);
        self.prepare_detector();
    }

    /// Record the classifier fetch result. Loaded bytes are turned into a
    /// detector right away; bytes the backend cannot use count as a failed
    /// load.
    pub fn set_classifier(&mut self, state: ClassifierState) {
        self.detector = None;
        match state {
            ClassifierState::Failed(reason) => self.classifier_failed(reason),
            state => {
                self.classifier = state;
                self.prepare_detector();
            }
        }
    }

    fn prepare_detector(&mut self) {
        let (Some(backend), Some(bytes)) = (&self.backend, self.classifier.bytes()) else {
            return;
        };
        match backend.load_classifier(bytes, &self.config.detector) {
            Ok(detector) => {
                info!("face detector ready ({} byte classifier)", bytes.len());
                self.detector = Some(detector);
            }
            Err(e) => self.classifier_failed(e.to_string()),
        }
    }

    fn classifier_failed(&mut self, reason: String) {
        error!("face detection disabled for this session: {reason}");
        self.detector = None;
        self.classifier = ClassifierState::Failed(reason);
        self.error = Some(CLASSIFIER_FAILED_MESSAGE.to_string());
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    pub fn backend_ready(&self) -> bool {
        self.backend.is_some()
    }

    pub fn classifier(&self) -> &ClassifierState {
        &self.classifier
    }

    pub fn slot(&self, parent: Parent) -> &ParentSlot {
        match parent {
            Parent::Mom => &self.mom,
            Parent::Dad => &self.dad,
        }
    }

    fn slot_mut(&mut self, parent: Parent) -> &mut ParentSlot {
        match parent {
            Parent::Mom => &mut self.mom,
            Parent::Dad => &mut self.dad,
        }
    }

    fn set_stage(&mut self, parent: Parent, stage: ParentStage) {
        let slot = self.slot_mut(parent);
        debug!("{parent}: {:?} -> {:?}", slot.stage, stage);
        slot.stage = stage;
    }

    /// Process a new photo for `parent`, replacing whatever that parent had.
    ///
    /// Runs detection (or the center-crop fallback) and then feature
    /// extraction on the resulting face image. Problems end up in the error
    /// banner; the returned stage tells how far the pipeline got.
    pub fn upload(&mut self, parent: Parent, input: &[u8]) -> ParentStage {
        *self.slot_mut(parent) = ParentSlot::default();

        let upload = match decode_upload(input) {
            Ok(upload) => upload,
            Err(e) => {
                error!("could not read {parent} photo: {e}");
                self.error = Some(format!("Failed to read {} photo: {e}", parent.possessive()));
                return ParentStage::Idle;
            }
        };
        self.slot_mut(parent).upload = Some(upload.encoded);
        self.set_stage(parent, ParentStage::Uploaded);

        let Some(backend) = self.backend.clone() else {
            self.error = Some(BACKEND_NOT_READY_MESSAGE.to_string());
            return ParentStage::Uploaded;
        };

        self.set_stage(parent, ParentStage::Detecting);
        let outcome = locate_face(backend.as_ref(), self.detector.as_deref(), &upload.image);

        let face = match outcome {
            DetectionOutcome::FaceFound(face) => {
                self.set_stage(parent, ParentStage::FaceFound);
                face
            }
            DetectionOutcome::NoFaceFound => {
                info!("no face detected in {parent} photo, using center crop");
                match self.fallback(parent, &upload.image) {
                    Some(face) => face,
                    None => return ParentStage::Uploaded,
                }
            }
            DetectionOutcome::DetectionError(BabyVisionError::ClassifierUnavailable) => {
                debug!("{parent}: no classifier, skipping detection");
                match self.fallback(parent, &upload.image) {
                    Some(face) => face,
                    None => return ParentStage::Uploaded,
                }
            }
            DetectionOutcome::DetectionError(e) => {
                warn!("face detection failed for {parent} photo: {e}");
                if self.config.surface_detection_errors {
                    self.error = Some(DETECTION_FAILED_MESSAGE.to_string());
                }
                match self.fallback(parent, &upload.image) {
                    Some(face) => face,
                    None => return ParentStage::Uploaded,
                }
            }
        };

        let extraction = extract_features(backend.as_ref(), &face, &self.config.features);
        self.slot_mut(parent).face = Some(face);

        match extraction {
            Ok(extraction) => {
                let slot = self.slot_mut(parent);
                slot.features = Some(extraction.features);
                slot.visualization = Some(extraction.visualization);
                self.set_stage(parent, ParentStage::FeaturesExtracted);
            }
            Err(e) => {
                error!("error extracting {parent} facial features: {e}");
                self.error = Some(format!("Failed to extract facial features: {e}"));
            }
        }

        self.slot(parent).stage
    }

    /// Center crop for `parent`. A failed crop is logged and leaves the slot
    /// without a face; it never reaches the banner.
    fn fallback(&mut self, parent: Parent, image: &DynamicImage) -> Option<FaceImage> {
        match center_crop(image) {
            Ok(face) => {
                self.set_stage(parent, ParentStage::Fallback);
                Some(face)
            }
            Err(e) => {
                error!("center crop failed for {parent} photo: {e}");
                None
            }
        }
    }

    /// Current banner text.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn generation(&self) -> &GenerationState {
        &self.generation
    }

    pub fn is_generating(&self) -> bool {
        self.generation == GenerationState::Generating
    }

    /// Both parents have features and nothing is being generated.
    pub fn can_generate(&self) -> bool {
        !self.is_generating() && Parent::ALL.iter().all(|&p| self.slot(p).features.is_some())
    }

    /// Enter `Generating` and build the request for the generator.
    pub fn begin_generation(&mut self) -> Result<GenerationRequest, BabyVisionError> {
        if self.is_generating() {
            return Err(BabyVisionError::GenerationInProgress);
        }
        let mom = self.parent_input(Parent::Mom)?;
        let dad = self.parent_input(Parent::Dad)?;
        self.generation = GenerationState::Generating;
        debug!("generation started");
        Ok(GenerationRequest { mom, dad })
    }

    fn parent_input(&self, parent: Parent) -> Result<ParentInput, BabyVisionError> {
        let slot = self.slot(parent);
        match (&slot.face, &slot.features) {
            (Some(face), Some(features)) => Ok(ParentInput {
                face: face.clone(),
                features: features.clone(),
            }),
            _ => Err(BabyVisionError::GenerationNotReady),
        }
    }

    /// Leave `Generating` with the generator's answer.
    pub fn complete_generation(&mut self, response: GenerationResponse) {
        if !self.is_generating() {
            warn!("ignoring generation result, no generation in progress");
            return;
        }
        self.generation = GenerationState::Done {
            message: response.message,
            baby_image: response.baby_image,
        };
    }

    /// Leave `Generating` after the generator failed.
    pub fn abort_generation(&mut self, err: &BabyVisionError) {
        error!("generation failed: {err}");
        self.generation = GenerationState::Idle;
        self.error = Some(err.to_string());
    }

    /// Run one generation from start to finish.
    pub async fn generate(&mut self, generator: &dyn BabyGenerator) -> Result<(), BabyVisionError> {
        let request = self.begin_generation()?;
        match generator.generate(request).await {
            Ok(response) => {
                self.complete_generation(response);
                Ok(())
            }
            Err(e) => {
                self.abort_generation(&e);
                Err(e)
            }
        }
    }
}
