use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use babyvision::{
    AssetSource, BabyGenerator, BabyVisionError, ClassifierBytes, ClassifierState,
    GenerationState, ImageprocBackend, LibraryLoader, PageConfig, Parent, ParentSlot, Session,
    SimulatedGenerator, Timer,
};
use log::{Level, LevelFilter, Metadata, Record};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console, js_name = log)]
    fn console_log(message: &str);
    #[wasm_bindgen(js_namespace = console, js_name = warn)]
    fn console_warn(message: &str);
    #[wasm_bindgen(js_namespace = console, js_name = error)]
    fn console_error(message: &str);
}

/// Forwards `log` records to the browser console.
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}: {}", record.level(), record.target(), record.args());
        match record.level() {
            Level::Error => console_error(&line),
            Level::Warn => console_warn(&line),
            _ => console_log(&line),
        }
    }

    fn flush(&self) {}
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// Change how much of the pipeline ends up in the console.
///
/// @param level - One of "off", "error", "warn", "info", "debug", "trace"
#[wasm_bindgen(js_name = "setLogLevel")]
pub fn set_log_level(level: &str) -> Result<(), JsValue> {
    let filter: LevelFilter = level
        .parse()
        .map_err(|_| make_error("INVALID_OPTIONS", &format!("unknown log level: {level}")))?;
    log::set_max_level(filter);
    Ok(())
}

/// Create a JS `Error` with a `code` property.
fn make_error(code: &str, message: &str) -> JsValue {
    let err = js_sys::Error::new(message);
    let _ = js_sys::Reflect::set(&err, &"code".into(), &JsValue::from_str(code));
    JsValue::from(err)
}

/// Convert a `BabyVisionError` into a JS `Error` with a machine-readable `code` property.
fn to_js_error(e: BabyVisionError) -> JsValue {
    let code = match &e {
        BabyVisionError::DecodeError(_) => "DECODE_ERROR",
        BabyVisionError::EncodeError(_) => "ENCODE_ERROR",
        BabyVisionError::ZeroDimensions => "ZERO_DIMENSIONS",
        BabyVisionError::InvalidDataUrl(_) => "INVALID_DATA_URL",
        BabyVisionError::ClassifierUnavailable => "CLASSIFIER_UNAVAILABLE",
        BabyVisionError::ClassifierLoad(_) => "CLASSIFIER_LOAD",
        BabyVisionError::AssetFetch { .. } => "ASSET_FETCH",
        BabyVisionError::Vision(_) => "VISION_ERROR",
        BabyVisionError::BackendUnavailable => "BACKEND_UNAVAILABLE",
        BabyVisionError::UnknownParent(_) => "UNKNOWN_PARENT",
        BabyVisionError::InvalidConfig(_) => "INVALID_OPTIONS",
        BabyVisionError::GenerationNotReady => "GENERATION_NOT_READY",
        BabyVisionError::GenerationInProgress => "GENERATION_IN_PROGRESS",
    };
    make_error(code, &e.to_string())
}

fn parse_options(options: JsValue) -> Result<PageConfig, JsValue> {
    let config = if options.is_undefined() || options.is_null() {
        PageConfig::default()
    } else {
        serde_wasm_bindgen::from_value(options)
            .map_err(|e| make_error("INVALID_OPTIONS", &format!("invalid options: {e}")))?
    };
    config.validate().map_err(to_js_error)?;
    Ok(config)
}

fn parse_parent(parent: &str) -> Result<Parent, JsValue> {
    parent.parse().map_err(to_js_error)
}

/// Resolves after `duration` using the global `setTimeout`, so it works in
/// browsers and in node.
struct JsTimer;

#[async_trait(?Send)]
impl Timer for JsTimer {
    async fn sleep(&self, duration: Duration) {
        let millis = duration.as_millis().min(i32::MAX as u128) as i32;
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            schedule_on(&js_sys::global(), &resolve, millis);
        });
        let _ = JsFuture::from(promise).await;
    }
}

/// Call `resolve` after `millis` through `host.setTimeout`. A host without a
/// usable `setTimeout` gets `resolve` called at once, and the skipped delay is
/// logged. Returns whether the call was scheduled.
fn schedule_on(host: &JsValue, resolve: &js_sys::Function, millis: i32) -> bool {
    let set_timeout = js_sys::Reflect::get(host, &"setTimeout".into())
        .ok()
        .and_then(|f| f.dyn_into::<js_sys::Function>().ok());
    let scheduled = set_timeout
        .map(|f| f.call2(host, resolve, &JsValue::from(millis)).is_ok())
        .unwrap_or(false);
    if !scheduled {
        log::warn!("setTimeout is unavailable, skipping a {millis} ms delay");
        let _ = resolve.call0(&JsValue::UNDEFINED);
    }
    scheduled
}

/// Fetches page assets over HTTP relative to a base URL.
struct HttpAssetSource {
    base: String,
}

impl HttpAssetSource {
    fn url(&self, path: &str) -> String {
        if self.base.is_empty() {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait(?Send)]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, BabyVisionError> {
        let url = self.url(path);
        let fetch_error = |reason: String| BabyVisionError::AssetFetch {
            path: url.clone(),
            reason,
        };
        let response = gloo_net::http::Request::get(&url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        if !response.ok() {
            return Err(fetch_error(format!("HTTP {}", response.status())));
        }
        response.binary().await.map_err(|e| fetch_error(e.to_string()))
    }
}

/// Build a plain JS object describing one parent card.
fn build_parent_object(slot: &ParentSlot) -> Result<JsValue, JsValue> {
    let obj = js_sys::Object::new();
    js_sys::Reflect::set(&obj, &"stage".into(), &JsValue::from_str(slot.stage.as_str()))?;

    let upload = match &slot.upload {
        Some(upload) => JsValue::from_str(&upload.to_data_url()),
        None => JsValue::NULL,
    };
    js_sys::Reflect::set(&obj, &"upload".into(), &upload)?;

    let (face, source, region) = match &slot.face {
        Some(face) => {
            let region = js_sys::Object::new();
            js_sys::Reflect::set(&region, &"x".into(), &JsValue::from(face.region.x))?;
            js_sys::Reflect::set(&region, &"y".into(), &JsValue::from(face.region.y))?;
            js_sys::Reflect::set(&region, &"width".into(), &JsValue::from(face.region.width))?;
            js_sys::Reflect::set(&region, &"height".into(), &JsValue::from(face.region.height))?;
            let source = match face.source {
                babyvision::FaceSource::Detected => "detected",
                babyvision::FaceSource::Fallback => "fallback",
            };
            (
                JsValue::from_str(&face.encoded.to_data_url()),
                JsValue::from_str(source),
                JsValue::from(region),
            )
        }
        None => (JsValue::NULL, JsValue::NULL, JsValue::NULL),
    };
    js_sys::Reflect::set(&obj, &"face".into(), &face)?;
    js_sys::Reflect::set(&obj, &"faceSource".into(), &source)?;
    js_sys::Reflect::set(&obj, &"faceRegion".into(), &region)?;

    let features = match &slot.features {
        Some(features) => serde_wasm_bindgen::to_value(features)
            .map_err(|e| make_error("ENCODE_ERROR", &e.to_string()))?,
        None => JsValue::NULL,
    };
    js_sys::Reflect::set(&obj, &"features".into(), &features)?;

    let visualization = match &slot.visualization {
        Some(visualization) => JsValue::from_str(&visualization.to_data_url()),
        None => JsValue::NULL,
    };
    js_sys::Reflect::set(&obj, &"visualization".into(), &visualization)?;

    Ok(JsValue::from(obj))
}

/// The Baby Vision page: two parent photo pipelines, an error banner and the
/// generate action.
#[wasm_bindgen]
pub struct BabyVisionPage {
    session: Rc<RefCell<Session>>,
    generator: Rc<dyn BabyGenerator>,
}

impl BabyVisionPage {
    fn from_session(session: Session) -> Self {
        let delay = Duration::from_millis(session.config().generation_delay_ms);
        Self {
            session: Rc::new(RefCell::new(session)),
            generator: Rc::new(SimulatedGenerator::new(JsTimer, delay)),
        }
    }
}

#[wasm_bindgen]
impl BabyVisionPage {
    /// Create a page with the built-in vision library already attached.
    ///
    /// @param options - Optional object with fields: classifierPath,
    ///   generationDelayMs, surfaceDetectionErrors, detector, features
    /// @param classifier - Optional SeetaFace model bytes. Without them every
    ///   upload uses the center crop.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue, classifier: Option<Vec<u8>>) -> Result<BabyVisionPage, JsValue> {
        let config = parse_options(options)?;
        let mut session = Session::new(config);
        session.attach_backend(Arc::new(ImageprocBackend));
        match classifier {
            Some(bytes) if bytes.is_empty() => {
                session.set_classifier(ClassifierState::Failed("classifier is empty".to_string()))
            }
            Some(bytes) => session.set_classifier(ClassifierState::Loaded(ClassifierBytes::from(bytes))),
            None => {}
        }
        Ok(Self::from_session(session))
    }

    /// Load the vision library and fetch the classifier from `classifierPath`.
    ///
    /// @param options - Same fields as the constructor
    /// @param assetBase - Optional URL prefix for `classifierPath`
    pub async fn boot(
        options: JsValue,
        asset_base: Option<String>,
    ) -> Result<BabyVisionPage, JsValue> {
        let config = parse_options(options)?;
        let assets = HttpAssetSource {
            base: asset_base.unwrap_or_default(),
        };
        let session = Session::boot(config, &LibraryLoader::builtin(), &assets).await;
        Ok(Self::from_session(session))
    }

    /// Process a photo for "mom" or "dad" and return the stage reached.
    ///
    /// @param parent - "mom" or "dad"
    /// @param input - Raw image bytes (JPEG, PNG, or WebP), or a data URL's bytes
    pub fn upload(&self, parent: &str, input: Vec<u8>) -> Result<String, JsValue> {
        let parent = parse_parent(parent)?;
        let stage = self.session.borrow_mut().upload(parent, &input);
        Ok(stage.as_str().to_string())
    }

    /// Same as `upload`, for a `data:` URL as produced by `FileReader`.
    #[wasm_bindgen(js_name = "uploadDataUrl")]
    pub fn upload_data_url(&self, parent: &str, url: &str) -> Result<String, JsValue> {
        self.upload(parent, url.as_bytes().to_vec())
    }

    pub fn stage(&self, parent: &str) -> Result<String, JsValue> {
        let parent = parse_parent(parent)?;
        Ok(self.session.borrow().slot(parent).stage.as_str().to_string())
    }

    /// Everything the parent's card shows: stage, upload, face, faceSource,
    /// faceRegion, features and visualization. Images are data URLs.
    pub fn parent(&self, parent: &str) -> Result<JsValue, JsValue> {
        let parent = parse_parent(parent)?;
        build_parent_object(self.session.borrow().slot(parent))
    }

    /// Banner text, if any.
    pub fn error(&self) -> Option<String> {
        self.session.borrow().error().map(str::to_string)
    }

    #[wasm_bindgen(js_name = "dismissError")]
    pub fn dismiss_error(&self) {
        self.session.borrow_mut().dismiss_error();
    }

    #[wasm_bindgen(js_name = "canGenerate")]
    pub fn can_generate(&self) -> bool {
        self.session.borrow().can_generate()
    }

    #[wasm_bindgen(js_name = "isGenerating")]
    pub fn is_generating(&self) -> bool {
        self.session.borrow().is_generating()
    }

    /// Start generating. The returned promise resolves to the message, or
    /// `null` if the generator gave none.
    pub fn generate(&self) -> Result<js_sys::Promise, JsValue> {
        let request = self
            .session
            .borrow_mut()
            .begin_generation()
            .map_err(to_js_error)?;
        let session = self.session.clone();
        let generator = self.generator.clone();

        Ok(future_to_promise(async move {
            match generator.generate(request).await {
                Ok(response) => {
                    let message = response.message.clone();
                    session.borrow_mut().complete_generation(response);
                    Ok(message.map(JsValue::from).unwrap_or(JsValue::NULL))
                }
                Err(e) => {
                    session.borrow_mut().abort_generation(&e);
                    Err(to_js_error(e))
                }
            }
        }))
    }

    #[wasm_bindgen(js_name = "generationMessage")]
    pub fn generation_message(&self) -> Option<String> {
        match self.session.borrow().generation() {
            GenerationState::Done { message, .. } => message.clone(),
            _ => None,
        }
    }

    /// The generated picture as a data URL.
    #[wasm_bindgen(js_name = "babyImage")]
    pub fn baby_image(&self) -> Option<String> {
        match self.session.borrow().generation() {
            GenerationState::Done { baby_image, .. } => {
                baby_image.as_ref().map(|image| image.to_data_url())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    async fn host_without_set_timeout_resolves_immediately() {
        let host = JsValue::from(js_sys::Object::new());
        let mut scheduled = true;
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            scheduled = schedule_on(&host, &resolve, 60_000);
        });
        JsFuture::from(promise).await.unwrap();
        assert!(!scheduled);
    }

    #[wasm_bindgen_test]
    async fn global_set_timeout_is_used() {
        let mut scheduled = false;
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            scheduled = schedule_on(&js_sys::global(), &resolve, 0);
        });
        JsFuture::from(promise).await.unwrap();
        assert!(scheduled);
    }
}
