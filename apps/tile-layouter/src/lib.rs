pub mod config;
pub mod engine;
pub mod grid;
pub mod gst_utils;
pub mod layout;
pub mod probe;
pub mod runtime;

// Re-export commonly used types
pub use config::LayoutConfig;
pub use engine::{Layouter, SourceHandle, SourceId, SourceSnapshot, SourceState};
pub use layout::{Resolution, Size, TileGeometry};
pub use probe::ProbeOutcome;
pub use runtime::{CompositorRuntime, MixerRuntime, NegotiationWatch};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Mixer has no output endpoint")]
    MissingOutput,

    #[error("Mixer has no request template: {0}")]
    MissingTemplate(String),

    #[error("Mixer refused slot request: {0}")]
    SlotRequest(String),

    #[error("Failed to link endpoint to slot {slot}: {reason}")]
    Link { slot: String, reason: String },

    #[error("Failed to unlink endpoint from slot {slot}: {reason}")]
    Unlink { slot: String, reason: String },

    #[error("Source not attached to this layouter: {0}")]
    UnknownSource(SourceId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
