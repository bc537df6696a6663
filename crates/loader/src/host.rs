//! Interfaces the pipeline expects from its host environment.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use scheduler::FrameScheduler;
use serde::Serialize;

use crate::error::LoadError;

/// Thread-safe decode-from-file primitive, called on the decode worker.
pub trait ImageDecoder: Send + Sync + 'static {
    type Image: Send + 'static;

    fn decode(&self, key: &str) -> Result<Self::Image, LoadError>;
}

/// Main-thread texture cache. `add_image` uploads a decoded image, registers
/// it under `key` and releases the raw pixels.
pub trait TextureCache {
    type Image;
    type Texture: Clone + Send + 'static;

    fn texture_for_key(&self, key: &str) -> Option<Self::Texture>;

    fn add_image(&mut self, image: Self::Image, key: &str) -> Result<Self::Texture, LoadError>;
}

/// Sprite-frame registry, called on the register worker.
pub trait FrameCache: Send + Sync + 'static {
    type Texture;

    fn add_sprite_frames(&self, manifest: &str, texture: &Self::Texture) -> Result<(), LoadError>;
}

/// Identity of a polled main-thread drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Drain {
    /// Uploads decoded images and forwards them to frame registration.
    ImageUpload,
    /// Runs completion callbacks.
    Completion,
}

impl fmt::Display for Drain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drain::ImageUpload => f.write_str("image-upload"),
            Drain::Completion => f.write_str("completion"),
        }
    }
}

/// Registers recurring per-frame callbacks with the host. While a drain is
/// scheduled the host is expected to call `AtlasLoader::poll` with it roughly
/// once per frame.
pub trait HostScheduler {
    fn schedule(&self, drain: Drain, interval: Duration);

    fn unschedule(&self, drain: Drain);
}

impl HostScheduler for FrameScheduler<Drain> {
    fn schedule(&self, drain: Drain, interval: Duration) {
        FrameScheduler::schedule(self, drain, interval);
    }

    fn unschedule(&self, drain: Drain) {
        FrameScheduler::unschedule(self, &drain);
    }
}

impl<S: HostScheduler + ?Sized> HostScheduler for Arc<S> {
    fn schedule(&self, drain: Drain, interval: Duration) {
        (**self).schedule(drain, interval);
    }

    fn unschedule(&self, drain: Drain) {
        (**self).unschedule(drain);
    }
}
