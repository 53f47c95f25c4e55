use crate::errors::{ModelError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Writes a per-segment channel-storage snapshot: a u64 segment count
/// followed by one little-endian f64 per segment.
pub fn write_snapshot(path: &Path, values: &[f64]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(&(values.len() as u64).to_le_bytes())?;
    for v in values {
        file.write_all(&v.to_le_bytes())?;
    }
    file.flush()?;
    Ok(())
}

/// Reads a snapshot back, checking that it matches the network size.
pub fn read_snapshot(path: &Path, expected: usize) -> Result<Vec<f64>> {
    let mut file = BufReader::new(File::open(path)?);
    let mut buf = [0u8; 8];
    file.read_exact(&mut buf)?;
    let count = u64::from_le_bytes(buf) as usize;
    if count != expected {
        return Err(ModelError::SnapshotMismatch {
            path: path.to_path_buf(),
            found: count,
            expected,
        });
    }

    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        file.read_exact(&mut buf)?;
        values.push(f64::from_le_bytes(buf));
    }
    Ok(values)
}
