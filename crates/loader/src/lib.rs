//! Asynchronous sprite-sheet loading for single-threaded render loops.
//!
//! A submitted manifest moves through four queues:
//!
//! ```text
//!   submit ──▶ load_requests ──▶ [decode worker] ──▶ decoded
//!                                                       │ drain_decoded (main thread: texture upload)
//!                                                       ▼
//!   callback ◀── drain_ready ◀── ready ◀── [register worker] ◀── insert_requests
//! ```
//!
//! Decoding and frame registration happen on two named worker threads. Texture
//! upload and the completion callback happen on the thread that owns the
//! [`AtlasLoader`], driven by the host's per-frame [`HostScheduler`]. A drain is
//! scheduled only while its stage has outstanding work.

mod backend;
mod error;
mod host;
mod loader;
mod naming;
mod queue;
mod request;
mod stats;
mod worker;

pub use backend::{ImageFileDecoder, MemoryFrameCache, MemoryTextureCache, TextureHandle};
pub use error::{LoadError, LoaderError};
pub use host::{Drain, FrameCache, HostScheduler, ImageDecoder, TextureCache};
pub use loader::{AtlasLoader, Backlog, DrainOutcome, ShutdownReport};
pub use loaderconfig::{FastPathMode, LoaderConfig};
pub use naming::ResourceNaming;
pub use queue::{ConcurrentQueue, WorkQueue};
pub use request::{CompletionCallback, LoadRequest, ReadyNotification};
pub use scheduler::FrameScheduler;
pub use stats::StatsSnapshot;

/// Loader wired to the bundled file decoder, in-memory caches and a shared
/// [`FrameScheduler`].
pub type FileAtlasLoader = AtlasLoader<
    ImageFileDecoder,
    MemoryTextureCache,
    MemoryFrameCache,
    std::sync::Arc<FrameScheduler<Drain>>,
>;
