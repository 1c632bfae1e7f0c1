//! `<base>.osrm.restrictions` file (spec §6): fingerprint, a patched count,
//! then fixed-size turn restriction records addressed by internal node id.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use waymark_common::error::{Error, Result};

use crate::framing::{patch_count, read_fingerprint, write_count_placeholder};

pub const FINGERPRINT: [u8; 16] = *b"WAYMARKRSTv0001\0";
pub const RECORD_SIZE: usize = 13;

pub const FLAG_IS_ONLY: u8 = 0b01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestrictionRecord {
    pub from_node: u32,
    pub via_node: u32,
    pub to_node: u32,
    pub is_only: bool,
}

impl RestrictionRecord {
    fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.from_node.to_le_bytes());
        buf[4..8].copy_from_slice(&self.via_node.to_le_bytes());
        buf[8..12].copy_from_slice(&self.to_node.to_le_bytes());
        buf[12] = if self.is_only { FLAG_IS_ONLY } else { 0 };
    }

    fn read_from(buf: &[u8]) -> Self {
        Self {
            from_node: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            via_node: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            to_node: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            is_only: buf[12] & FLAG_IS_ONLY != 0,
        }
    }
}

pub fn write(path: impl AsRef<Path>, records: impl IntoIterator<Item = RestrictionRecord>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);

    writer
        .write_all(&FINGERPRINT)
        .map_err(|e| Error::io(path, e))?;
    let count_offset = write_count_placeholder(&mut writer, path)?;

    let mut count = 0u32;
    let mut buf = [0u8; RECORD_SIZE];
    for record in records {
        record.write_to(&mut buf);
        writer.write_all(&buf).map_err(|e| Error::io(path, e))?;
        count += 1;
    }

    writer.flush().map_err(|e| Error::io(path, e))?;
    let mut file = writer.into_inner().map_err(|e| {
        Error::io(path, std::io::Error::new(std::io::ErrorKind::Other, e))
    })?;
    patch_count(&mut file, path, count_offset, count)
}

pub fn read(path: impl AsRef<Path>) -> Result<Vec<RestrictionRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);

    read_fingerprint(&mut reader, path, &FINGERPRINT)?;

    let mut count_buf = [0u8; 4];
    reader
        .read_exact(&mut count_buf)
        .map_err(|e| Error::io(path, e))?;
    let count = u32::from_le_bytes(count_buf);

    let mut records = Vec::with_capacity(count as usize);
    let mut buf = [0u8; RECORD_SIZE];
    for _ in 0..count {
        reader.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
        records.push(RestrictionRecord::read_from(&buf));
    }
    Ok(records)
}
