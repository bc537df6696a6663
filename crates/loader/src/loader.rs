use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use loaderconfig::{FastPathMode, LoaderConfig};
use serde::Serialize;

use crate::error::LoaderError;
use crate::host::{Drain, FrameCache, HostScheduler, ImageDecoder, TextureCache};
use crate::naming::ResourceNaming;
use crate::queue::{ConcurrentQueue, WorkQueue};
use crate::request::{CacheInsertRequest, CompletionCallback, DecodedImage, LoadRequest, StageOutcome};
use crate::stats::{Counter, PipelineStats, StatsSnapshot};
use crate::worker::{self, DecodedQueue, ReadyQueue, WorkerShared};

/// Result of a single drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Nothing was waiting.
    Idle,
    /// Exactly one item was handled.
    Processed,
}

/// Items currently sitting in each queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Backlog {
    pub load_requests: usize,
    pub decoded: usize,
    pub insert_requests: usize,
    pub ready: usize,
}

/// What was thrown away when the pipeline stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Decoded images that never reached the upload drain.
    pub discarded_decoded: usize,
    /// Cache-insert requests left behind by the register worker. The worker
    /// finishes its queue before it stops and is joined before this is
    /// counted, so a clean shutdown always reports zero.
    pub discarded_insert_requests: usize,
    /// Registered sheets whose callback never ran.
    pub discarded_notifications: usize,
    pub image_load_pending: usize,
    pub cache_insert_pending: usize,
}

impl ShutdownReport {
    pub fn discarded(&self) -> usize {
        self.discarded_decoded + self.discarded_insert_requests + self.discarded_notifications
    }
}

/// Two-stage sprite-sheet loader.
///
/// Decoding and sprite-frame registration run on two dedicated worker threads;
/// texture upload and completion callbacks run on the thread that owns the
/// loader, one item per drain pass. `submit` and both drains take `&mut self`,
/// so all main-thread work is confined to a single owner.
///
/// Each drain is scheduled with the host while its pending counter is
/// non-zero. The counters track outstanding units of work for a stage, not the
/// length of any one queue.
pub struct AtlasLoader<D, T, F, S>
where
    D: ImageDecoder,
    T: TextureCache<Image = D::Image>,
    F: FrameCache<Texture = T::Texture>,
    S: HostScheduler,
{
    naming: ResourceNaming,
    fast_path: FastPathMode,
    drain_interval: Duration,
    decoder: Arc<D>,
    textures: T,
    frames: Arc<F>,
    scheduler: S,
    load_requests: Arc<WorkQueue<LoadRequest>>,
    decoded: Arc<DecodedQueue<D::Image>>,
    insert_requests: Arc<WorkQueue<CacheInsertRequest<T::Texture>>>,
    ready: Arc<ReadyQueue>,
    image_load_pending: usize,
    cache_insert_pending: usize,
    shutdown: Arc<AtomicBool>,
    workers: Vec<(String, JoinHandle<()>)>,
    stats: Arc<PipelineStats>,
}

impl<D, T, F, S> AtlasLoader<D, T, F, S>
where
    D: ImageDecoder,
    T: TextureCache<Image = D::Image>,
    F: FrameCache<Texture = T::Texture>,
    S: HostScheduler,
{
    /// Spawns both workers. No drain is scheduled until work is submitted.
    pub fn start(
        config: &LoaderConfig,
        decoder: D,
        textures: T,
        frames: F,
        scheduler: S,
    ) -> Result<Self, LoaderError> {
        let decoder = Arc::new(decoder);
        let frames = Arc::new(frames);
        let load_requests = Arc::new(WorkQueue::new());
        let decoded = Arc::new(ConcurrentQueue::new());
        let insert_requests = Arc::new(WorkQueue::new());
        let ready = Arc::new(ConcurrentQueue::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(PipelineStats::default());
        let shared = WorkerShared {
            shutdown: Arc::clone(&shutdown),
            idle_wake: config.workers.idle_wake,
            stats: Arc::clone(&stats),
        };

        let decode_name = config.workers.decode_thread.clone();
        let decode_handle = worker::spawn_decode_worker(
            &decode_name,
            Arc::clone(&decoder),
            Arc::clone(&load_requests),
            Arc::clone(&decoded),
            shared.clone(),
        )?;
        let mut workers = vec![(decode_name, decode_handle)];

        let register_name = config.workers.register_thread.clone();
        match worker::spawn_register_worker(
            &register_name,
            Arc::clone(&frames),
            Arc::clone(&insert_requests),
            Arc::clone(&ready),
            shared,
        ) {
            Ok(handle) => workers.push((register_name, handle)),
            Err(err) => {
                shutdown.store(true, Ordering::Release);
                load_requests.wake_all();
                for (_, handle) in workers {
                    let _ = handle.join();
                }
                return Err(err);
            }
        }

        tracing::info!(
            decode_thread = %config.workers.decode_thread,
            register_thread = %config.workers.register_thread,
            fast_path = ?config.fast_path,
            "sprite sheet loader started"
        );

        Ok(Self {
            naming: ResourceNaming::from_config(&config.naming),
            fast_path: config.fast_path,
            drain_interval: config.drain.interval,
            decoder,
            textures,
            frames,
            scheduler,
            load_requests,
            decoded,
            insert_requests,
            ready,
            image_load_pending: 0,
            cache_insert_pending: 0,
            shutdown,
            workers,
            stats,
        })
    }

    /// Queues `name` for loading; `on_complete` runs on a later drain pass
    /// once the sprite frames are registered. Never blocks.
    ///
    /// Fails only when no image key can be derived from `name`, in which case
    /// nothing is queued.
    pub fn submit<C>(&mut self, name: &str, on_complete: C) -> Result<(), LoaderError>
    where
        C: FnOnce(&str) + Send + 'static,
    {
        let image_key = self.naming.image_key(name)?;
        let callback: CompletionCallback = Box::new(on_complete);
        self.stats.bump(Counter::Submitted);

        let cached = match self.fast_path {
            FastPathMode::Disabled => None,
            FastPathMode::Exclusive | FastPathMode::Duplicate => {
                self.textures.texture_for_key(&image_key)
            }
        };

        let Some(texture) = cached else {
            self.enqueue_load(LoadRequest::new(name.to_string(), image_key, callback));
            return Ok(());
        };

        self.stats.bump(Counter::FastPathHit);
        tracing::debug!(name, key = %image_key, mode = ?self.fast_path, "image already cached");
        match self.fast_path {
            FastPathMode::Duplicate => {
                let detached = LoadRequest::detached(name.to_string(), image_key.clone());
                self.enqueue_insert(CacheInsertRequest {
                    request: detached,
                    texture,
                });
                self.enqueue_load(LoadRequest::new(name.to_string(), image_key, callback));
            }
            _ => {
                let request = LoadRequest::new(name.to_string(), image_key, callback);
                self.enqueue_insert(CacheInsertRequest { request, texture });
            }
        }
        Ok(())
    }

    /// Uploads at most one decoded image and forwards it to frame
    /// registration.
    pub fn drain_decoded(&mut self) -> DrainOutcome {
        let Some(outcome) = self.decoded.pop_front() else {
            return DrainOutcome::Idle;
        };

        match outcome {
            StageOutcome::Ready(DecodedImage { request, image }) => {
                match self.textures.add_image(image, request.image_key()) {
                    Ok(texture) => {
                        tracing::debug!(name = %request.name(), key = %request.image_key(), "uploaded texture");
                        self.stats.bump(Counter::Uploaded);
                        self.enqueue_insert(CacheInsertRequest { request, texture });
                    }
                    Err(error) => {
                        tracing::error!(
                            name = %request.name(),
                            %error,
                            "failed to upload texture; dropping request"
                        );
                        self.stats.bump(Counter::UploadFailed);
                    }
                }
            }
            StageOutcome::Failed { name, error } => {
                tracing::warn!(%name, %error, "sprite sheet will not complete");
            }
        }

        self.finish_work(Drain::ImageUpload);
        DrainOutcome::Processed
    }

    /// Runs at most one completion callback. A panicking callback unwinds
    /// into the caller.
    pub fn drain_ready(&mut self) -> DrainOutcome {
        let Some(outcome) = self.ready.pop_front() else {
            return DrainOutcome::Idle;
        };

        match outcome {
            StageOutcome::Ready(request) => {
                tracing::debug!(name = %request.name(), "sprite sheet ready");
                if request.complete() {
                    self.stats.bump(Counter::Completed);
                }
            }
            StageOutcome::Failed { name, error } => {
                tracing::warn!(%name, %error, "sprite sheet will not complete");
            }
        }

        self.finish_work(Drain::Completion);
        DrainOutcome::Processed
    }

    /// Entry point for the host's per-frame callback.
    pub fn poll(&mut self, drain: Drain) -> DrainOutcome {
        match drain {
            Drain::ImageUpload => self.drain_decoded(),
            Drain::Completion => self.drain_ready(),
        }
    }

    pub fn pending(&self, drain: Drain) -> usize {
        match drain {
            Drain::ImageUpload => self.image_load_pending,
            Drain::Completion => self.cache_insert_pending,
        }
    }

    /// True when no submitted work is outstanding.
    pub fn is_idle(&self) -> bool {
        self.image_load_pending == 0 && self.cache_insert_pending == 0
    }

    pub fn backlog(&self) -> Backlog {
        Backlog {
            load_requests: self.load_requests.len(),
            decoded: self.decoded.len(),
            insert_requests: self.insert_requests.len(),
            ready: self.ready.len(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn naming(&self) -> &ResourceNaming {
        &self.naming
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn textures(&self) -> &T {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut T {
        &mut self.textures
    }

    pub fn frames(&self) -> &F {
        &self.frames
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Stops both workers and joins them. Work already queued for a worker is
    /// finished first; anything waiting for a main-thread drain is discarded
    /// and its callback never runs.
    pub fn shutdown(mut self) -> Result<ShutdownReport, LoaderError> {
        self.stop()
    }

    fn enqueue_load(&mut self, request: LoadRequest) {
        tracing::debug!(name = %request.name(), key = %request.image_key(), "queued sprite sheet load");
        self.load_requests.push(request);
        self.begin_work(Drain::ImageUpload);
    }

    fn enqueue_insert(&mut self, request: CacheInsertRequest<T::Texture>) {
        self.insert_requests.push(request);
        self.begin_work(Drain::Completion);
    }

    fn begin_work(&mut self, drain: Drain) {
        let pending = match drain {
            Drain::ImageUpload => &mut self.image_load_pending,
            Drain::Completion => &mut self.cache_insert_pending,
        };
        *pending += 1;
        if *pending == 1 {
            tracing::trace!(%drain, "scheduling drain");
            self.scheduler.schedule(drain, self.drain_interval);
        }
    }

    fn finish_work(&mut self, drain: Drain) {
        let pending = match drain {
            Drain::ImageUpload => &mut self.image_load_pending,
            Drain::Completion => &mut self.cache_insert_pending,
        };
        debug_assert!(*pending > 0, "{drain} drain processed untracked work");
        if *pending == 0 {
            return;
        }
        *pending -= 1;
        if *pending == 0 {
            tracing::trace!(%drain, "unscheduling drain");
            self.scheduler.unschedule(drain);
        }
    }

    fn stop(&mut self) -> Result<ShutdownReport, LoaderError> {
        if self.workers.is_empty() {
            return Ok(ShutdownReport::default());
        }

        tracing::debug!("stopping sprite sheet loader");
        self.shutdown.store(true, Ordering::Release);
        self.load_requests.wake_all();
        self.insert_requests.wake_all();

        let mut result = Ok(());
        for (name, handle) in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!(thread = %name, "worker thread panicked");
                if result.is_ok() {
                    result = Err(LoaderError::WorkerPanicked(name));
                }
            }
        }

        let report = ShutdownReport {
            discarded_decoded: self.decoded.take_all().len(),
            discarded_insert_requests: self.insert_requests.take_all().len(),
            discarded_notifications: self.ready.take_all().len(),
            image_load_pending: self.image_load_pending,
            cache_insert_pending: self.cache_insert_pending,
        };
        if self.image_load_pending > 0 {
            self.scheduler.unschedule(Drain::ImageUpload);
        }
        if self.cache_insert_pending > 0 {
            self.scheduler.unschedule(Drain::Completion);
        }
        self.image_load_pending = 0;
        self.cache_insert_pending = 0;

        if report.discarded() > 0 {
            tracing::warn!(
                decoded = report.discarded_decoded,
                insert_requests = report.discarded_insert_requests,
                notifications = report.discarded_notifications,
                "discarded undrained work on shutdown"
            );
        }
        tracing::info!("sprite sheet loader stopped");
        result.map(|()| report)
    }
}

impl<D, T, F, S> Drop for AtlasLoader<D, T, F, S>
where
    D: ImageDecoder,
    T: TextureCache<Image = D::Image>,
    F: FrameCache<Texture = T::Texture>,
    S: HostScheduler,
{
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
