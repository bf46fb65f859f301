//! Tiled, multi-threaded overland runoff simulation.
//!
//! Rain falls on an elevation grid, is routed one cell downhill per step along
//! a static steepest-descent flow graph using Manning's equation, and drains
//! to groundwater through a constant infiltration rate.  The domain is split
//! into fixed-size tiles that are processed in parallel on a small task pool;
//! dry tiles are skipped entirely.

pub mod active;
pub mod error;
pub mod grid;
pub mod heightfield;
pub mod hydraulic;
pub mod output;
pub mod pool;
pub mod settings;
pub mod simulation;

pub use error::{ConfigError, OutputError, SimError};
pub use heightfield::{HeightField, NODATA};
pub use settings::{SimulationSettings, WriteErrorPolicy};
pub use simulation::Simulation;
