//! Boundary with the external generative image engine.
//!
//! The engine is a collaborator behind [`GenerationEngine`]. [`GenerationInvoker`] adds the
//! timeout and cancellation contract around it and normalizes whatever comes back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::compile::{CompiledInstruction, InstructionFingerprint};
use crate::foundation::core::AspectRatio;

/// Typed failure reported by (or on behalf of) the engine.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum EngineFailure {
    #[error("engine did not answer in time")]
    Timeout,
    #[error("engine quota exceeded")]
    QuotaExceeded,
    #[error("engine rejected the API key")]
    InvalidKey,
    #[error("engine response contained no image")]
    NoImageReturned,
    #[error("generation cancelled")]
    Cancelled,
    #[error("engine failure: {0}")]
    Other(String),
}

impl EngineFailure {
    /// Message shown to the person waiting for the try-on.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Timeout => "The image service took too long to respond. Please try again.",
            Self::QuotaExceeded => {
                "The image service is busy right now. Please try again in a few minutes."
            }
            Self::InvalidKey => {
                "The image service is not configured correctly. Please contact support."
            }
            Self::NoImageReturned => {
                "No image was generated. Please try again with a clearer photo."
            }
            Self::Cancelled => "The try-on was cancelled.",
            Self::Other(_) => "Image generation failed. Please try again.",
        }
    }
}

/// Cooperative cancellation flag shared between the caller and an in-flight call.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    Person,
    Identity,
    Garment,
}

/// One image sent with the instruction. `index` is the 1-based number the instruction text
/// uses ("Image 1", "Image 2", ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceImage {
    pub index: usize,
    pub role: ImageRole,
    pub mime: &'static str,
    pub bytes: Arc<[u8]>,
}

impl ReferenceImage {
    fn new(index: usize, role: ImageRole, bytes: &[u8]) -> Self {
        Self {
            index,
            role,
            mime: sniff_mime(bytes),
            bytes: Arc::from(bytes),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub instruction: String,
    pub control_json: String,
    pub fingerprint: InstructionFingerprint,
    pub aspect_ratio: AspectRatio,
    pub resolution: &'static str,
    pub images: Vec<ReferenceImage>,
}

impl GenerationRequest {
    /// Number the images the way the compiled text refers to them: person first, then
    /// identity references, then the garment.
    pub fn new(
        instruction: &CompiledInstruction,
        person: &[u8],
        identity: &[Vec<u8>],
        garment: &[u8],
    ) -> Self {
        let mut images = Vec::with_capacity(identity.len() + 2);
        images.push(ReferenceImage::new(1, ImageRole::Person, person));
        for (i, bytes) in identity.iter().enumerate() {
            images.push(ReferenceImage::new(i + 2, ImageRole::Identity, bytes));
        }
        let garment_index = identity.len() + 2;
        images.push(ReferenceImage::new(garment_index, ImageRole::Garment, garment));
        Self {
            instruction: instruction.text(),
            control_json: instruction.control_json.clone(),
            fingerprint: instruction.fingerprint(),
            aspect_ratio: instruction.control.render.aspect_ratio,
            resolution: instruction.control.render.resolution,
            images,
        }
    }

    pub fn image(&self, role: ImageRole) -> Option<&ReferenceImage> {
        self.images.iter().find(|i| i.role == role)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Raw engine response before the invoker checks it.
#[derive(Clone, Debug, Default)]
pub struct EngineOutput {
    pub bytes: Vec<u8>,
}

/// The external generative engine. Implementations should poll `cancel` during long work
/// and return [`EngineFailure::Cancelled`] once it is set.
pub trait GenerationEngine: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancelToken,
    ) -> Result<EngineOutput, EngineFailure>;
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long a cancelled or timed-out worker gets to honor its token before it is detached.
const WORKER_GRACE: Duration = Duration::from_millis(200);

/// Runs one engine call under a deadline and the caller's cancel token.
#[derive(Clone)]
pub struct GenerationInvoker {
    engine: Arc<dyn GenerationEngine>,
    timeout: Duration,
}

impl GenerationInvoker {
    pub fn new(engine: Arc<dyn GenerationEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Call the engine on a worker thread. On timeout or caller cancellation the engine's own
    /// token is tripped and the worker gets a short grace period to exit; its late result is
    /// dropped.
    ///
    /// An engine that ignores its token keeps its worker thread alive until `generate`
    /// returns. Such workers are detached with a warning, so a long-running process calling a
    /// token-deaf engine that keeps timing out accumulates threads.
    #[tracing::instrument(skip(self, request, cancel), fields(fingerprint = %request.fingerprint))]
    pub fn invoke(
        &self,
        request: GenerationRequest,
        cancel: &CancelToken,
    ) -> Result<GeneratedImage, EngineFailure> {
        if cancel.is_cancelled() {
            return Err(EngineFailure::Cancelled);
        }

        let engine_token = CancelToken::new();
        let (tx, rx) = mpsc::channel();
        let worker = {
            let engine = Arc::clone(&self.engine);
            let token = engine_token.clone();
            std::thread::Builder::new()
                .name("vesture-generate".to_string())
                .spawn(move || {
                    let _ = tx.send(engine.generate(&request, &token));
                })
                .map_err(|e| EngineFailure::Other(format!("spawn worker: {e}")))?
        };

        let deadline = Instant::now() + self.timeout;
        let outcome = loop {
            if cancel.is_cancelled() {
                engine_token.cancel();
                break Err(EngineFailure::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                engine_token.cancel();
                break Err(EngineFailure::Timeout);
            }
            match rx.recv_timeout(POLL_INTERVAL.min(deadline - now)) {
                Ok(res) => break res.and_then(accept_output),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    break Err(EngineFailure::Other(
                        "engine worker exited without a result".to_string(),
                    ));
                }
            }
        };

        if engine_token.is_cancelled() {
            release_worker(worker);
        }

        match &outcome {
            Ok(img) => tracing::debug!(
                width = img.width,
                height = img.height,
                "engine returned image"
            ),
            Err(e) => tracing::warn!(error = %e, "generation failed"),
        }
        outcome
    }
}

fn release_worker(worker: std::thread::JoinHandle<()>) {
    let deadline = Instant::now() + WORKER_GRACE;
    while !worker.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    if worker.is_finished() {
        if worker.join().is_err() {
            tracing::warn!("engine worker panicked after cancellation");
        }
    } else {
        tracing::warn!(
            grace_ms = WORKER_GRACE.as_millis() as u64,
            "engine ignored cancellation; worker thread detached"
        );
    }
}

fn accept_output(out: EngineOutput) -> Result<GeneratedImage, EngineFailure> {
    if out.bytes.is_empty() {
        return Err(EngineFailure::NoImageReturned);
    }
    let (width, height) = image::load_from_memory(&out.bytes)
        .map(|img| (img.width(), img.height()))
        .map_err(|_| EngineFailure::NoImageReturned)?;
    Ok(GeneratedImage {
        mime: sniff_mime(&out.bytes),
        bytes: out.bytes,
        width,
        height,
    })
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        Ok(image::ImageFormat::WebP) => "image/webp",
        Ok(image::ImageFormat::Gif) => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Deterministic stand-in engine: returns the person photo unchanged after an optional
/// delay. The delay honors cancellation.
#[derive(Clone, Debug, Default)]
pub struct EchoEngine {
    pub delay: Duration,
}

impl GenerationEngine for EchoEngine {
    fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancelToken,
    ) -> Result<EngineOutput, EngineFailure> {
        let until = Instant::now() + self.delay;
        while Instant::now() < until {
            if cancel.is_cancelled() {
                return Err(EngineFailure::Cancelled);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let person = request
            .image(ImageRole::Person)
            .ok_or(EngineFailure::NoImageReturned)?;
        Ok(EngineOutput {
            bytes: person.bytes.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::compile::{CompileInputs, compile};

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([90, 80, 70, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn request(identity: usize) -> GenerationRequest {
        let ins = compile(&CompileInputs {
            identity_references: identity,
            ..CompileInputs::default()
        });
        let refs = vec![png(2, 2); identity];
        GenerationRequest::new(&ins, &png(4, 6), &refs, &png(3, 3))
    }

    struct Failing(EngineFailure);

    impl GenerationEngine for Failing {
        fn generate(
            &self,
            _request: &GenerationRequest,
            _cancel: &CancelToken,
        ) -> Result<EngineOutput, EngineFailure> {
            Err(self.0.clone())
        }
    }

    struct Garbage;

    impl GenerationEngine for Garbage {
        fn generate(
            &self,
            _request: &GenerationRequest,
            _cancel: &CancelToken,
        ) -> Result<EngineOutput, EngineFailure> {
            Ok(EngineOutput {
                bytes: b"<html>rate limited</html>".to_vec(),
            })
        }
    }

    #[test]
    fn images_are_numbered_person_identity_garment() {
        let req = request(2);
        let roles = req
            .images
            .iter()
            .map(|i| (i.index, i.role))
            .collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![
                (1, ImageRole::Person),
                (2, ImageRole::Identity),
                (3, ImageRole::Identity),
                (4, ImageRole::Garment),
            ]
        );
        assert!(req.images.iter().all(|i| i.mime == "image/png"));
    }

    #[test]
    fn echo_engine_returns_decoded_person_photo() {
        let inv = GenerationInvoker::new(Arc::new(EchoEngine::default()), Duration::from_secs(5));
        let img = inv.invoke(request(0), &CancelToken::new()).unwrap();
        assert_eq!((img.width, img.height), (4, 6));
        assert_eq!(img.mime, "image/png");
    }

    #[test]
    fn slow_engine_times_out() {
        let engine = EchoEngine {
            delay: Duration::from_secs(10),
        };
        let inv = GenerationInvoker::new(Arc::new(engine), Duration::from_millis(50));
        let err = inv.invoke(request(0), &CancelToken::new()).unwrap_err();
        assert_eq!(err, EngineFailure::Timeout);
    }

    struct Watched {
        exited: Arc<AtomicBool>,
    }

    impl GenerationEngine for Watched {
        fn generate(
            &self,
            _request: &GenerationRequest,
            cancel: &CancelToken,
        ) -> Result<EngineOutput, EngineFailure> {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(2));
            }
            self.exited.store(true, Ordering::SeqCst);
            Err(EngineFailure::Cancelled)
        }
    }

    #[test]
    fn timed_out_worker_is_joined_when_it_honors_cancel() {
        let exited = Arc::new(AtomicBool::new(false));
        let engine = Watched {
            exited: Arc::clone(&exited),
        };
        let inv = GenerationInvoker::new(Arc::new(engine), Duration::from_millis(40));
        let err = inv.invoke(request(0), &CancelToken::new()).unwrap_err();
        assert_eq!(err, EngineFailure::Timeout);
        assert!(exited.load(Ordering::SeqCst));
    }

    #[test]
    fn cancelled_before_call_never_reaches_engine() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let inv = GenerationInvoker::new(
            Arc::new(Failing(EngineFailure::QuotaExceeded)),
            Duration::from_secs(1),
        );
        let err = inv.invoke(request(0), &cancel).unwrap_err();
        assert_eq!(err, EngineFailure::Cancelled);
    }

    #[test]
    fn cancel_during_call_stops_waiting() {
        let engine = EchoEngine {
            delay: Duration::from_secs(10),
        };
        let inv = GenerationInvoker::new(Arc::new(engine), Duration::from_secs(30));
        let cancel = CancelToken::new();
        let trip = cancel.clone();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            trip.cancel();
        });
        let err = inv.invoke(request(0), &cancel).unwrap_err();
        t.join().unwrap();
        assert_eq!(err, EngineFailure::Cancelled);
    }

    #[test]
    fn engine_failures_pass_through() {
        for f in [
            EngineFailure::QuotaExceeded,
            EngineFailure::InvalidKey,
            EngineFailure::Other("500".to_string()),
        ] {
            let inv = GenerationInvoker::new(Arc::new(Failing(f.clone())), Duration::from_secs(1));
            assert_eq!(inv.invoke(request(0), &CancelToken::new()).unwrap_err(), f);
        }
    }

    #[test]
    fn undecodable_output_is_no_image() {
        let inv = GenerationInvoker::new(Arc::new(Garbage), Duration::from_secs(1));
        assert_eq!(
            inv.invoke(request(0), &CancelToken::new()).unwrap_err(),
            EngineFailure::NoImageReturned
        );
    }

    #[test]
    fn user_messages_are_distinct() {
        let all = [
            EngineFailure::Timeout,
            EngineFailure::QuotaExceeded,
            EngineFailure::InvalidKey,
            EngineFailure::NoImageReturned,
            EngineFailure::Cancelled,
            EngineFailure::Other(String::new()),
        ];
        let msgs = all
            .iter()
            .map(|f| f.user_message())
            .collect::<std::collections::BTreeSet<_>>();
        assert_eq!(msgs.len(), all.len());
    }
}
