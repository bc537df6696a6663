use std::fmt;

use crate::error::LoadError;

/// Invoked once on the main thread with the manifest name that was submitted.
pub type CompletionCallback = Box<dyn FnOnce(&str) + Send + 'static>;

/// A submitted manifest travelling through the pipeline. Each stage takes it
/// by value and moves it into the next stage's payload.
pub struct LoadRequest {
    name: String,
    image_key: String,
    on_complete: Option<CompletionCallback>,
}

impl LoadRequest {
    pub(crate) fn new(name: String, image_key: String, on_complete: CompletionCallback) -> Self {
        Self {
            name,
            image_key,
            on_complete: Some(on_complete),
        }
    }

    /// A request that registers frames but notifies nobody.
    pub(crate) fn detached(name: String, image_key: String) -> Self {
        Self {
            name,
            image_key,
            on_complete: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_key(&self) -> &str {
        &self.image_key
    }

    pub fn has_callback(&self) -> bool {
        self.on_complete.is_some()
    }

    pub(crate) fn into_name(self) -> String {
        self.name
    }

    /// Runs the completion callback, if any. Returns whether one ran.
    pub(crate) fn complete(self) -> bool {
        match self.on_complete {
            Some(callback) => {
                callback(&self.name);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("name", &self.name)
            .field("image_key", &self.image_key)
            .field("has_callback", &self.on_complete.is_some())
            .finish()
    }
}

/// Frames are registered and the callback may run.
pub type ReadyNotification = LoadRequest;

/// Raw image produced by the decode worker, waiting for the main-thread upload.
#[derive(Debug)]
pub struct DecodedImage<I> {
    pub request: LoadRequest,
    pub image: I,
}

/// Uploaded texture waiting for sprite-frame registration.
#[derive(Debug)]
pub struct CacheInsertRequest<X> {
    pub request: LoadRequest,
    pub texture: X,
}

/// What a worker hands to the main thread. A failed request still travels to
/// its drain so the pending counter for that stage is released.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Ready(T),
    Failed { name: String, error: LoadError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn complete_passes_submitted_name() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let request = LoadRequest::new(
            "hud.plist".into(),
            "hud.png".into(),
            Box::new(move |name| sink.lock().unwrap().push(name.to_string())),
        );
        assert!(request.has_callback());
        assert!(request.complete());
        assert_eq!(*seen.lock().unwrap(), vec!["hud.plist".to_string()]);
    }

    #[test]
    fn detached_request_completes_silently() {
        let request = LoadRequest::detached("hud.plist".into(), "hud.png".into());
        assert!(!request.has_callback());
        assert!(!request.complete());
    }
}
