//! Small helpers shared by every on-disk format in spec §6: a fixed magic
//! fingerprint, a zero-filled count that gets patched once the true count is
//! known, and a trailing CRC-64 footer over the body.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use waymark_common::error::{Error, Result};

/// Write a `u32` count placeholder, returning the file offset to patch once
/// the real value is known (mirrors §6: "node_count (u32, zero-filled,
/// patched last)").
pub fn write_count_placeholder(writer: &mut (impl Write + Seek), path: &Path) -> Result<u64> {
    let offset = writer.stream_position().map_err(|e| Error::io(path, e))?;
    writer
        .write_all(&0u32.to_le_bytes())
        .map_err(|e| Error::io(path, e))?;
    Ok(offset)
}

/// Patch a previously reserved `u32` count placeholder in place.
pub fn patch_count(file: &mut File, path: &Path, offset: u64, count: u32) -> Result<()> {
    let restore = file.stream_position().map_err(|e| Error::io(path, e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| Error::io(path, e))?;
    file.write_all(&count.to_le_bytes())
        .map_err(|e| Error::io(path, e))?;
    file.seek(SeekFrom::Start(restore))
        .map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Read and validate a fixed 16-byte magic fingerprint at the start of a
/// file, returning `InputFormat` on mismatch so callers can refuse to load
/// data built against a different fingerprint (spec §4.4 output note).
pub fn read_fingerprint(reader: &mut impl Read, path: &Path, expected: &[u8; 16]) -> Result<()> {
    let mut got = [0u8; 16];
    reader
        .read_exact(&mut got)
        .map_err(|e| Error::io(path, e))?;
    if &got != expected {
        return Err(Error::InputFormat(format!(
            "{}: fingerprint mismatch (got {:02x?}, expected {:02x?})",
            path.display(),
            got,
            expected
        )));
    }
    Ok(())
}
