/// Failure of a single request at one pipeline stage. Never fatal to a worker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("failed to decode image '{key}': {reason}")]
    Decode { key: String, reason: String },
    #[error("failed to upload texture '{key}': {reason}")]
    Upload { key: String, reason: String },
    #[error("failed to register sprite frames for '{manifest}': {reason}")]
    Register { manifest: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("invalid resource name '{name}': {reason}")]
    InvalidResourceName { name: String, reason: &'static str },
    #[error("failed to spawn worker thread '{name}': {source}")]
    SpawnWorker {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("worker thread '{0}' panicked")]
    WorkerPanicked(String),
}
