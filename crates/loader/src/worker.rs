use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::LoaderError;
use crate::host::{FrameCache, ImageDecoder};
use crate::queue::{ConcurrentQueue, WorkQueue};
use crate::request::{CacheInsertRequest, DecodedImage, LoadRequest, ReadyNotification, StageOutcome};
use crate::stats::{Counter, PipelineStats};

/// State every worker loop shares with the controller.
#[derive(Clone)]
pub(crate) struct WorkerShared {
    pub shutdown: Arc<AtomicBool>,
    pub idle_wake: Duration,
    pub stats: Arc<PipelineStats>,
}

pub(crate) type DecodedQueue<I> = ConcurrentQueue<StageOutcome<DecodedImage<I>>>;
pub(crate) type ReadyQueue = ConcurrentQueue<StageOutcome<ReadyNotification>>;

pub(crate) fn spawn_decode_worker<D: ImageDecoder>(
    name: &str,
    decoder: Arc<D>,
    input: Arc<WorkQueue<LoadRequest>>,
    output: Arc<DecodedQueue<D::Image>>,
    shared: WorkerShared,
) -> Result<JoinHandle<()>, LoaderError> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run_decode_worker(decoder.as_ref(), &input, &output, &shared))
        .map_err(|source| LoaderError::SpawnWorker {
            name: name.to_string(),
            source,
        })
}

pub(crate) fn spawn_register_worker<F: FrameCache>(
    name: &str,
    frames: Arc<F>,
    input: Arc<WorkQueue<CacheInsertRequest<F::Texture>>>,
    output: Arc<ReadyQueue>,
    shared: WorkerShared,
) -> Result<JoinHandle<()>, LoaderError>
where
    F::Texture: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run_register_worker(frames.as_ref(), &input, &output, &shared))
        .map_err(|source| LoaderError::SpawnWorker {
            name: name.to_string(),
            source,
        })
}

fn run_decode_worker<D: ImageDecoder>(
    decoder: &D,
    input: &WorkQueue<LoadRequest>,
    output: &DecodedQueue<D::Image>,
    shared: &WorkerShared,
) {
    tracing::debug!("decode worker started");
    while let Some(request) = input.pop_or_wait(&shared.shutdown, shared.idle_wake) {
        match decoder.decode(request.image_key()) {
            Ok(image) => {
                tracing::debug!(
                    name = %request.name(),
                    key = %request.image_key(),
                    "decoded sprite sheet image"
                );
                shared.stats.bump(Counter::Decoded);
                output.push(StageOutcome::Ready(DecodedImage { request, image }));
            }
            Err(error) => {
                tracing::error!(
                    name = %request.name(),
                    key = %request.image_key(),
                    %error,
                    "failed to decode sprite sheet image; dropping request"
                );
                shared.stats.bump(Counter::DecodeFailed);
                output.push(StageOutcome::Failed {
                    name: request.into_name(),
                    error,
                });
            }
        }
    }
    tracing::debug!("decode worker stopped");
}

fn run_register_worker<F: FrameCache>(
    frames: &F,
    input: &WorkQueue<CacheInsertRequest<F::Texture>>,
    output: &ReadyQueue,
    shared: &WorkerShared,
) {
    tracing::debug!("register worker started");
    while let Some(CacheInsertRequest { request, texture }) =
        input.pop_or_wait(&shared.shutdown, shared.idle_wake)
    {
        match frames.add_sprite_frames(request.name(), &texture) {
            Ok(()) => {
                tracing::debug!(name = %request.name(), "registered sprite frames");
                shared.stats.bump(Counter::Registered);
                output.push(StageOutcome::Ready(request));
            }
            Err(error) => {
                tracing::error!(
                    name = %request.name(),
                    %error,
                    "failed to register sprite frames; dropping request"
                );
                shared.stats.bump(Counter::RegisterFailed);
                output.push(StageOutcome::Failed {
                    name: request.into_name(),
                    error,
                });
            }
        }
    }
    tracing::debug!("register worker stopped");
}
