//! Contracted hierarchy file (spec §6): fingerprint, a checksum tying the
//! hierarchy to the node-based graph it was built from, a CSR-style
//! adjacency (`first_edge` per node, flattened edge array), and a trailing
//! bitmap marking which nodes are still "core" (§4.5.6's stopping
//! condition) rather than fully contracted.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use waymark_common::error::{Error, Result};

use crate::framing::read_fingerprint;

pub const FINGERPRINT: [u8; 16] = *b"WAYMARKCHv000001";
pub const EDGE_RECORD_SIZE: usize = 13;

pub const FLAG_FORWARD: u8 = 0b001;
pub const FLAG_BACKWARD: u8 = 0b010;
pub const FLAG_SHORTCUT: u8 = 0b100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChEdgeRecord {
    pub target: u32,
    pub weight: i32,
    pub forward: bool,
    pub backward: bool,
    pub is_shortcut: bool,
    /// The contracted node id for a shortcut, or the original edge-based
    /// edge's data-side-file index for a non-shortcut.
    pub middle_or_original_id: u32,
}

impl ChEdgeRecord {
    fn flags(&self) -> u8 {
        (if self.forward { FLAG_FORWARD } else { 0 })
            | (if self.backward { FLAG_BACKWARD } else { 0 })
            | (if self.is_shortcut { FLAG_SHORTCUT } else { 0 })
    }

    fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.target.to_le_bytes());
        buf[4..8].copy_from_slice(&self.weight.to_le_bytes());
        buf[8] = self.flags();
        buf[9..13].copy_from_slice(&self.middle_or_original_id.to_le_bytes());
    }

    fn read_from(buf: &[u8]) -> Self {
        let flags = buf[8];
        Self {
            target: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            weight: i32::from_le_bytes(buf[4..8].try_into().unwrap()),
            forward: flags & FLAG_FORWARD != 0,
            backward: flags & FLAG_BACKWARD != 0,
            is_shortcut: flags & FLAG_SHORTCUT != 0,
            middle_or_original_id: u32::from_le_bytes(buf[9..13].try_into().unwrap()),
        }
    }
}

pub struct ChFile {
    pub checksum: u64,
    pub first_edge: Vec<u32>,
    pub edges: Vec<ChEdgeRecord>,
    pub is_core: Vec<bool>,
}

pub fn write(
    path: impl AsRef<Path>,
    checksum: u64,
    first_edge: &[u32],
    edges: &[ChEdgeRecord],
    is_core: &[bool],
) -> Result<()> {
    let path = path.as_ref();
    assert_eq!(first_edge.len(), is_core.len(), "first_edge/is_core length mismatch");

    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&FINGERPRINT).map_err(|e| Error::io(path, e))?;
    writer
        .write_all(&checksum.to_le_bytes())
        .map_err(|e| Error::io(path, e))?;
    writer
        .write_all(&(first_edge.len() as u32).to_le_bytes())
        .map_err(|e| Error::io(path, e))?;
    writer
        .write_all(&(edges.len() as u32).to_le_bytes())
        .map_err(|e| Error::io(path, e))?;

    for &offset in first_edge {
        writer
            .write_all(&offset.to_le_bytes())
            .map_err(|e| Error::io(path, e))?;
    }

    let mut buf = [0u8; EDGE_RECORD_SIZE];
    for edge in edges {
        edge.write_to(&mut buf);
        writer.write_all(&buf).map_err(|e| Error::io(path, e))?;
    }

    writer
        .write_all(&pack_bitmap(is_core))
        .map_err(|e| Error::io(path, e))?;

    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

pub fn read(path: impl AsRef<Path>) -> Result<ChFile> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);

    read_fingerprint(&mut reader, path, &FINGERPRINT)?;

    let checksum = read_u64(&mut reader, path)?;
    let node_count = read_u32(&mut reader, path)?;
    let edge_count = read_u32(&mut reader, path)?;

    let mut first_edge = Vec::with_capacity(node_count as usize);
    for _ in 0..node_count {
        first_edge.push(read_u32(&mut reader, path)?);
    }

    let mut edges = Vec::with_capacity(edge_count as usize);
    let mut buf = [0u8; EDGE_RECORD_SIZE];
    for _ in 0..edge_count {
        reader.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
        edges.push(ChEdgeRecord::read_from(&buf));
    }

    let bitmap_bytes = node_count.div_ceil(8) as usize;
    let mut bitmap = vec![0u8; bitmap_bytes];
    reader
        .read_exact(&mut bitmap)
        .map_err(|e| Error::io(path, e))?;
    let is_core = unpack_bitmap(&bitmap, node_count as usize);

    Ok(ChFile {
        checksum,
        first_edge,
        edges,
        is_core,
    })
}

fn read_u32(reader: &mut impl Read, path: &Path) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read, path: &Path) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
    Ok(u64::from_le_bytes(buf))
}

fn pack_bitmap(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

fn unpack_bitmap(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes[i / 8] & (1 << (i % 8)) != 0)
        .collect()
}
