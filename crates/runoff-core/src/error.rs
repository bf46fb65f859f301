use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid simulation settings.  Always fatal at construction.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("domain dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension { width: usize, height: usize },
    #[error("tile dimensions must be non-zero, got {width}x{height}")]
    ZeroTileSize { width: usize, height: usize },
    #[error("thread count cannot be 0")]
    ZeroThreads,
    #[error("timestep must be positive and finite, got {0}")]
    InvalidTimestep(f32),
    #[error("output resolution must be at least one step")]
    ZeroOutputResolution,
    #[error("parameter `{name}` must be finite and non-negative, got {value}")]
    InvalidParameter { name: &'static str, value: f32 },
    #[error("domain of {width}x{height} cells exceeds the u32 output index range")]
    DomainTooLarge { width: usize, height: usize },
}

/// Failure while writing or reading the binary output files.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: expected {expected} elevation samples, found {actual}", path.display())]
    ElevationCount {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

impl OutputError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Errors surfaced by [`crate::Simulation`].
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("expected {expected} elevation samples, got {actual}")]
    ElevationLength { expected: usize, actual: usize },
    #[error("heightfield is {actual:?}, domain is {expected:?} (width, height)")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("elevations must be loaded before building the flow graph")]
    ElevationsNotLoaded,
    #[error("flow graph has already been built")]
    FlowGraphAlreadyBuilt,
    #[error("flow graph must be built before stepping")]
    FlowGraphNotBuilt,
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),
    #[error("{count} task(s) panicked during the last phase")]
    TaskPanicked { count: usize },
    #[error("simulation state was lost in a failed step; rebuild the simulation")]
    Poisoned,
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Output(#[from] OutputError),
}
