use std::time::Duration;

use async_trait::async_trait;
use log::info;

use crate::codec::EncodedImage;
use crate::crop::FaceImage;
use crate::error::BabyVisionError;
use crate::features::FacialFeatures;

/// Message shown after the simulated generation completes.
pub const SIMULATED_GENERATION_MESSAGE: &str = "Faces and extracted facial features would be \
sent to a Python backend for baby face generation. The backend would use advanced image \
processing and machine learning techniques to blend facial features and generate a \
realistic baby face prediction.";

/// One parent's contribution to a generation request.
#[derive(Debug, Clone)]
pub struct ParentInput {
    pub face: FaceImage,
    pub features: FacialFeatures,
}

/// Photo pair plus features, as handed to a generator.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub mom: ParentInput,
    pub dad: ParentInput,
}

/// What a generator returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResponse {
    /// Text to show alongside (or instead of) the picture.
    pub message: Option<String>,
    /// The generated picture, if the generator produced one.
    pub baby_image: Option<EncodedImage>,
}

/// Request/response interface to a baby picture generator.
#[async_trait(?Send)]
pub trait BabyGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, BabyVisionError>;
}

/// Something that can wait.
#[async_trait(?Send)]
pub trait Timer {
    async fn sleep(&self, duration: Duration);
}

/// [`Timer`] on the tokio runtime.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimer;

#[cfg(not(target_arch = "wasm32"))]
#[async_trait(?Send)]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Stand-in generator: waits a fixed delay, then answers with
/// [`SIMULATED_GENERATION_MESSAGE`] and no picture. It never fails and never
/// looks at the request.
#[derive(Debug, Clone)]
pub struct SimulatedGenerator<T> {
    timer: T,
    delay: Duration,
}

impl<T: Timer> SimulatedGenerator<T> {
    pub fn new(timer: T, delay: Duration) -> Self {
        Self { timer, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait(?Send)]
impl<T: Timer> BabyGenerator for SimulatedGenerator<T> {
    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> Result<GenerationResponse, BabyVisionError> {
        self.timer.sleep(self.delay).await;
        info!("simulated generation finished after {:?}", self.delay);
        Ok(GenerationResponse {
            message: Some(SIMULATED_GENERATION_MESSAGE.to_string()),
            baby_image: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::center_crop;
    use futures::executor::block_on;
    use image::{DynamicImage, RgbaImage};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingTimer {
        waits: RefCell<Vec<Duration>>,
    }

    #[async_trait(?Send)]
    impl Timer for RecordingTimer {
        async fn sleep(&self, duration: Duration) {
            self.waits.borrow_mut().push(duration);
        }
    }

    fn parent_input(size: u32) -> ParentInput {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(size, size));
        ParentInput {
            face: center_crop(&image).unwrap(),
            features: FacialFeatures::heuristic(size, size),
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            mom: parent_input(20),
            dad: parent_input(30),
        }
    }

    #[test]
    fn simulated_generator_waits_once_per_request() {
        let generator =
            SimulatedGenerator::new(RecordingTimer::default(), Duration::from_millis(1500));

        let first = block_on(generator.generate(request())).unwrap();
        let second = block_on(generator.generate(request())).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.message.as_deref(), Some(SIMULATED_GENERATION_MESSAGE));
        assert!(first.baby_image.is_none());
        assert_eq!(
            *generator.timer.waits.borrow(),
            vec![Duration::from_millis(1500); 2]
        );
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test(start_paused = true)]
    async fn tokio_timer_honours_delay() {
        let generator = SimulatedGenerator::new(TokioTimer, Duration::from_millis(250));
        let started = tokio::time::Instant::now();
        generator.generate(request()).await.unwrap();
        assert!(started.elapsed() >= generator.delay());
    }
}
