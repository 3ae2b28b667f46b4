//! Face engine: a dedicated OS thread owning the ONNX sessions.
//!
//! Handlers are async; inference is synchronous and CPU-bound and the
//! sessions need `&mut` access. Requests cross over an mpsc channel and the
//! result comes back on a oneshot, so photos are processed one at a time and
//! the sessions never move between threads.

use async_trait::async_trait;
use comanda_core::{decode_image_payload, DecodeError, Embedding, FacePipeline, PipelineError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("face engine thread exited")]
    ChannelClosed,
}

impl EngineError {
    /// True for conditions the user can fix by resubmitting a photo.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::Decode(_) | EngineError::Pipeline(PipelineError::NoFaceDetected)
        )
    }
}

/// Capability handed to the HTTP layer: photo payload in, embedding out.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, payload: &str) -> Result<Embedding, EngineError>;
}

struct EngineRequest {
    payload: String,
    reply: oneshot::Sender<Result<Embedding, EngineError>>,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

#[async_trait]
impl Embedder for EngineHandle {
    async fn embed(&self, payload: &str) -> Result<Embedding, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest {
                payload: payload.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads both ONNX models synchronously so a missing model file fails the
/// daemon at startup, then enters the request loop.
pub fn spawn_engine(
    detector_path: &str,
    encoder_path: &str,
    queue_depth: usize,
) -> Result<EngineHandle, EngineError> {
    let mut pipeline = FacePipeline::load(detector_path, encoder_path)?;
    tracing::info!(
        detector = detector_path,
        encoder = encoder_path,
        "face models loaded"
    );

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue_depth);

    std::thread::Builder::new()
        .name("comanda-engine".into())
        .spawn(move || {
            tracing::info!("face engine thread started");
            while let Some(req) = rx.blocking_recv() {
                let result = decode_image_payload(&req.payload)
                    .map_err(EngineError::from)
                    .and_then(|image| pipeline.embed(&image).map_err(EngineError::from));
                let _ = req.reply.send(result);
            }
            tracing::info!("face engine thread exiting");
        })
        .expect("failed to spawn face engine thread");

    Ok(EngineHandle { tx })
}
