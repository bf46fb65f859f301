//! Fixed-layout binary output.
//!
//! Files are raw `repr(C)` structs in native byte order (little-endian on
//! every supported target); there is no self-describing schema.
//!
//! ```text
//! metadata.bin : MetadataHeader (40 B) | f32 elevation × width·height
//! step_<n>.bin : StepHeader (8 B)      | WaterSample (8 B) × count
//! ```
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bytemuck::{Pod, Zeroable};

use crate::error::OutputError;
use crate::settings::SimulationSettings;

pub const METADATA_FILE: &str = "metadata.bin";

/// File name of the `n`-th water snapshot.
pub fn step_file_name(n: u32) -> String {
    format!("step_{n}.bin")
}

/// One-time run description written before the first step.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MetadataHeader {
    pub width: u64,
    pub height: u64,
    pub offset_x: i32,
    pub offset_y: i32,
    /// Timestep in seconds.
    pub dt: f32,
    /// Always zero; keeps `output_resolution` 8-byte aligned.
    pub reserved: u32,
    /// Steps between snapshots.
    pub output_resolution: u64,
}

impl MetadataHeader {
    pub fn from_settings(settings: &SimulationSettings) -> Self {
        Self {
            width: settings.width as u64,
            height: settings.height as u64,
            offset_x: settings.offset_x,
            offset_y: settings.offset_y,
            dt: settings.dt,
            reserved: 0,
            output_resolution: settings.output_resolution as u64,
        }
    }

    pub fn cell_count(&self) -> usize {
        (self.width * self.height) as usize
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct StepHeader {
    /// Snapshot number, `step / output_resolution`.
    pub step: u32,
    /// Number of samples that follow.
    pub count: u32,
}

/// Water depth of one wet cell.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WaterSample {
    /// Global row-major cell index.
    pub index: u32,
    /// Depth in metres.
    pub level: f32,
}

pub fn write_metadata(path: &Path, header: &MetadataHeader, elevations: &[f32]) -> Result<(), OutputError> {
    debug_assert_eq!(elevations.len(), header.cell_count());
    let io = |e| OutputError::io(path, e);
    let mut w = BufWriter::new(File::create(path).map_err(io)?);
    w.write_all(bytemuck::bytes_of(header)).map_err(io)?;
    w.write_all(bytemuck::cast_slice(elevations)).map_err(io)?;
    w.flush().map_err(io)
}

pub fn read_metadata(path: &Path) -> Result<(MetadataHeader, Vec<f32>), OutputError> {
    let io = |e| OutputError::io(path, e);
    let mut r = BufReader::new(File::open(path).map_err(io)?);
    let mut header = MetadataHeader::zeroed();
    r.read_exact(bytemuck::bytes_of_mut(&mut header)).map_err(io)?;

    let mut bytes = Vec::new();
    r.read_to_end(&mut bytes).map_err(io)?;
    let expected = header.cell_count();
    let actual = bytes.len() / std::mem::size_of::<f32>();
    if actual != expected || bytes.len() % std::mem::size_of::<f32>() != 0 {
        return Err(OutputError::ElevationCount { path: path.to_path_buf(), expected, actual });
    }
    let elevations = bytes.chunks_exact(4).map(bytemuck::pod_read_unaligned::<f32>).collect();
    Ok((header, elevations))
}

pub fn write_step(path: &Path, step: u32, samples: &[WaterSample]) -> Result<(), OutputError> {
    let io = |e| OutputError::io(path, e);
    let header = StepHeader { step, count: samples.len() as u32 };
    let mut w = BufWriter::new(File::create(path).map_err(io)?);
    w.write_all(bytemuck::bytes_of(&header)).map_err(io)?;
    w.write_all(bytemuck::cast_slice(samples)).map_err(io)?;
    w.flush().map_err(io)
}

pub fn read_step(path: &Path) -> Result<(StepHeader, Vec<WaterSample>), OutputError> {
    let io = |e| OutputError::io(path, e);
    let mut r = BufReader::new(File::open(path).map_err(io)?);
    let mut header = StepHeader::zeroed();
    r.read_exact(bytemuck::bytes_of_mut(&mut header)).map_err(io)?;
    let mut samples = vec![WaterSample::zeroed(); header.count as usize];
    r.read_exact(bytemuck::cast_slice_mut(&mut samples)).map_err(io)?;
    Ok((header, samples))
}
