use thiserror::Error;

/// Failure kinds surfaced by the gradient engine.
///
/// These travel inside `anyhow::Error`; use `downcast_ref::<GradientError>()`
/// to branch on them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GradientError {
    #[error("canvas is missing or has zero area ({width}x{height})")]
    MissingCanvas { width: u32, height: u32 },
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("surface reports no supported texture formats")]
    SurfaceUnsupported,
    #[error("drawing buffer is not preserved; construct with preserve_drawing_buffer to capture frames")]
    DrawingBufferNotPreserved,
    #[error("nothing has been rendered yet")]
    NothingRendered,
    #[error("gradient controller has been destroyed")]
    Destroyed,
}

/// Import failures for configuration text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration must be an object")]
    NotAnObject,
    #[error("failed to parse configuration at {location}: {message}")]
    Parse { location: String, message: String },
}
