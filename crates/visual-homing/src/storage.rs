//! .pmem snapshot database files and recorded route files.

use std::io::{Read, Write};
use std::path::Path;

use crate::config::{MemoryConfig, RouteConfig};
use crate::memory::PerfectMemory;
use crate::route::Route;
use crate::types::{HomingError, HomingResult, Snapshot};

/// Magic bytes: "PMEM"
const PMEM_MAGIC: u32 = 0x504D454D;

/// Current format version.
const FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
const HEADER_SIZE: usize = 64;

/// Bytes per recorded route point: x, y, and heading as f64.
const ROUTE_POINT_SIZE: usize = 3 * std::mem::size_of::<f64>();

/// Writer for .pmem files.
pub struct MemoryWriter;

/// Reader for .pmem files.
pub struct MemoryReader;

impl MemoryWriter {
    /// Write a perfect memory database to a file.
    pub fn write_to_file(memory: &PerfectMemory, path: &Path) -> HomingResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::File::create(path)?;
        Self::write_to(memory, &mut file)?;
        tracing::info!(
            "Saved {} snapshots to {}",
            memory.len(),
            path.display()
        );
        Ok(())
    }

    /// Write a perfect memory database to any writer.
    pub fn write_to<W: Write>(memory: &PerfectMemory, writer: &mut W) -> HomingResult<()> {
        let (width, height) = memory.dimensions().unwrap_or((0, 0));
        let payload_len = memory.len() as u64 * u64::from(width) * u64::from(height);

        let mut header = [0u8; HEADER_SIZE];
        write_u32(&mut header[0..4], PMEM_MAGIC);
        write_u16(&mut header[4..6], FORMAT_VERSION);
        write_u16(&mut header[6..8], 0); // flags
        write_u64(&mut header[8..16], memory.len() as u64);
        write_u32(&mut header[16..20], width);
        write_u32(&mut header[20..24], height);
        write_u64(&mut header[24..32], payload_len);

        writer.write_all(&header)?;
        for snapshot in memory.snapshots() {
            writer.write_all(snapshot.as_raw())?;
        }

        Ok(())
    }
}

impl MemoryReader {
    /// Read a perfect memory database from a file.
    pub fn read_from_file(path: &Path, config: MemoryConfig) -> HomingResult<PerfectMemory> {
        let mut file = std::fs::File::open(path)?;
        let memory = Self::read_from(&mut file, config)?;
        tracing::info!(
            "Loaded {} snapshots from {}",
            memory.len(),
            path.display()
        );
        Ok(memory)
    }

    /// Read a perfect memory database from any reader.
    pub fn read_from<R: Read>(reader: &mut R, config: MemoryConfig) -> HomingResult<PerfectMemory> {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;

        let magic = read_u32(&header[0..4]);
        if magic != PMEM_MAGIC {
            return Err(HomingError::Storage(format!(
                "Invalid magic: expected 0x{PMEM_MAGIC:08X}, got 0x{magic:08X}"
            )));
        }

        let version = read_u16(&header[4..6]);
        if version != FORMAT_VERSION {
            return Err(HomingError::Storage(format!(
                "Unsupported version: {version}"
            )));
        }

        let count = read_u64(&header[8..16]);
        let width = read_u32(&header[16..20]);
        let height = read_u32(&header[20..24]);
        let payload_len = read_u64(&header[24..32]);

        let snapshot_len = u64::from(width) * u64::from(height);
        if count.checked_mul(snapshot_len) != Some(payload_len) {
            return Err(HomingError::Storage(format!(
                "Payload length {payload_len} does not match {count} snapshots of {width}x{height}"
            )));
        }

        if count > 0 && snapshot_len == 0 {
            return Err(HomingError::Storage(format!(
                "{count} snapshots of empty size {width}x{height}"
            )));
        }

        // Bounded by the bytes actually present, not by the header.
        let mut payload = Vec::new();
        reader.by_ref().take(payload_len).read_to_end(&mut payload)?;
        if payload.len() as u64 != payload_len {
            return Err(HomingError::Storage(format!(
                "Truncated payload: expected {payload_len} bytes, got {}",
                payload.len()
            )));
        }

        let snapshots = if count == 0 {
            Vec::new()
        } else {
            payload
                .chunks_exact(snapshot_len as usize)
                .map(|samples| Snapshot::from_raw(width, height, samples.to_vec()))
                .collect::<HomingResult<Vec<_>>>()?
        };

        PerfectMemory::from_snapshots(config, snapshots)
    }
}

/// Read a recorded route: N x values, then N y values, then N headings, all f64.
///
/// Coordinates are divided by `units_per_metre`; headings are discarded.
pub fn read_route_points<R: Read>(reader: &mut R, units_per_metre: f64) -> HomingResult<Vec<[f32; 2]>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    if bytes.len() % ROUTE_POINT_SIZE != 0 {
        return Err(HomingError::Storage(format!(
            "Route data is {} bytes, not a whole number of {ROUTE_POINT_SIZE}-byte points",
            bytes.len()
        )));
    }

    let num_points = bytes.len() / ROUTE_POINT_SIZE;
    let component = |c: usize, i: usize| {
        let offset = (c * num_points + i) * 8;
        (read_f64(&bytes[offset..offset + 8]) / units_per_metre) as f32
    };

    Ok((0..num_points)
        .map(|i| [component(0, i), component(1, i)])
        .collect())
}

/// Write points in the recorded route layout, with zero headings.
pub fn write_route_points<W: Write>(
    writer: &mut W,
    points: &[[f32; 2]],
    units_per_metre: f64,
) -> HomingResult<()> {
    for c in 0..2 {
        for p in points {
            writer.write_all(&(f64::from(p[c]) * units_per_metre).to_le_bytes())?;
        }
    }
    for _ in points {
        writer.write_all(&0f64.to_le_bytes())?;
    }
    Ok(())
}

/// Load a recorded route file and reduce it to waypoints.
pub fn load_route_file(path: &Path, config: &RouteConfig) -> HomingResult<Route> {
    config.validate()?;

    let mut file = std::fs::File::open(path).map_err(|e| {
        HomingError::Storage(format!("Cannot open route file {}: {e}", path.display()))
    })?;
    let points = read_route_points(&mut file, config.route_units_per_metre)?;
    tracing::debug!("Read {} route points from {}", points.len(), path.display());

    Route::from_points(&points, config.waypoint_spacing)
}

// Little-endian byte helpers
fn write_u16(buf: &mut [u8], val: u16) {
    buf[..2].copy_from_slice(&val.to_le_bytes());
}
fn write_u32(buf: &mut [u8], val: u32) {
    buf[..4].copy_from_slice(&val.to_le_bytes());
}
fn write_u64(buf: &mut [u8], val: u64) {
    buf[..8].copy_from_slice(&val.to_le_bytes());
}
fn read_u16(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}
fn read_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}
fn read_u64(buf: &[u8]) -> u64 {
    u64::from_le_bytes([buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7]])
}
fn read_f64(buf: &[u8]) -> f64 {
    f64::from_bits(read_u64(buf))
}
