//! `<base>.osrm` node-based graph file (spec §6): fixed 16-byte fingerprint,
//! a patched node count, fixed-size node records, a patched edge count, then
//! fixed-size edge records. No CRC footer on this format (unlike the CH
//! file) — the two counts plus the fingerprint are what §6 specifies.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use waymark_common::error::{Error, Result};

use crate::framing::{patch_count, read_fingerprint, write_count_placeholder};

pub const FINGERPRINT: [u8; 16] = *b"WAYMARKNBGv0001\0";

pub const NODE_RECORD_SIZE: usize = 14;
pub const EDGE_RECORD_SIZE: usize = 26;

/// Direction bit flags for [`EdgeRecord::direction`].
pub const DIR_FORWARD: u16 = 0b01;
pub const DIR_BACKWARD: u16 = 0b10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    pub internal_id: u32,
    pub lon_e5: i32,
    pub lat_e5: i32,
    pub is_barrier: bool,
    pub is_traffic_light: bool,
}

impl NodeRecord {
    fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.internal_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.lon_e5.to_le_bytes());
        buf[8..12].copy_from_slice(&self.lat_e5.to_le_bytes());
        buf[12] = self.is_barrier as u8;
        buf[13] = self.is_traffic_light as u8;
    }

    fn read_from(buf: &[u8]) -> Self {
        Self {
            internal_id: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            lon_e5: i32::from_le_bytes(buf[4..8].try_into().unwrap()),
            lat_e5: i32::from_le_bytes(buf[8..12].try_into().unwrap()),
            is_barrier: buf[12] != 0,
            is_traffic_light: buf[13] != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRecord {
    pub source: u32,
    pub target: u32,
    pub distance_m: i32,
    pub direction: u16,
    pub weight: i32,
    pub name_id: u32,
    pub is_roundabout: bool,
    pub ignore_in_grid: bool,
    pub is_access_restricted: bool,
    pub travel_mode: u8,
}

impl EdgeRecord {
    fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.source.to_le_bytes());
        buf[4..8].copy_from_slice(&self.target.to_le_bytes());
        buf[8..12].copy_from_slice(&self.distance_m.to_le_bytes());
        buf[12..14].copy_from_slice(&self.direction.to_le_bytes());
        buf[14..18].copy_from_slice(&self.weight.to_le_bytes());
        buf[18..22].copy_from_slice(&self.name_id.to_le_bytes());
        buf[22] = self.is_roundabout as u8;
        buf[23] = self.ignore_in_grid as u8;
        buf[24] = self.is_access_restricted as u8;
        buf[25] = self.travel_mode;
    }

    fn read_from(buf: &[u8]) -> Self {
        Self {
            source: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            target: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            distance_m: i32::from_le_bytes(buf[8..12].try_into().unwrap()),
            direction: u16::from_le_bytes(buf[12..14].try_into().unwrap()),
            weight: i32::from_le_bytes(buf[14..18].try_into().unwrap()),
            name_id: u32::from_le_bytes(buf[18..22].try_into().unwrap()),
            is_roundabout: buf[22] != 0,
            ignore_in_grid: buf[23] != 0,
            is_access_restricted: buf[24] != 0,
            travel_mode: buf[25],
        }
    }
}

pub fn write(
    path: impl AsRef<Path>,
    nodes: impl IntoIterator<Item = NodeRecord>,
    edges: impl IntoIterator<Item = EdgeRecord>,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);

    writer
        .write_all(&FINGERPRINT)
        .map_err(|e| Error::io(path, e))?;
    let node_count_offset = write_count_placeholder(&mut writer, path)?;

    let mut node_count = 0u32;
    let mut buf = [0u8; NODE_RECORD_SIZE];
    for node in nodes {
        node.write_to(&mut buf);
        writer.write_all(&buf).map_err(|e| Error::io(path, e))?;
        node_count += 1;
    }

    let edge_count_offset = write_count_placeholder(&mut writer, path)?;
    let mut edge_count = 0u32;
    let mut buf = [0u8; EDGE_RECORD_SIZE];
    for edge in edges {
        edge.write_to(&mut buf);
        writer.write_all(&buf).map_err(|e| Error::io(path, e))?;
        edge_count += 1;
    }

    writer.flush().map_err(|e| Error::io(path, e))?;
    let mut file = writer.into_inner().map_err(|e| {
        Error::io(path, std::io::Error::new(std::io::ErrorKind::Other, e))
    })?;
    patch_count(&mut file, path, node_count_offset, node_count)?;
    patch_count(&mut file, path, edge_count_offset, edge_count)?;
    Ok(())
}

pub struct NbgFile {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

pub fn read(path: impl AsRef<Path>) -> Result<NbgFile> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);

    read_fingerprint(&mut reader, path, &FINGERPRINT)?;

    let node_count = read_u32(&mut reader, path)?;
    let mut nodes = Vec::with_capacity(node_count as usize);
    let mut buf = [0u8; NODE_RECORD_SIZE];
    for _ in 0..node_count {
        reader.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
        nodes.push(NodeRecord::read_from(&buf));
    }

    let edge_count = read_u32(&mut reader, path)?;
    let mut edges = Vec::with_capacity(edge_count as usize);
    let mut buf = [0u8; EDGE_RECORD_SIZE];
    for _ in 0..edge_count {
        reader.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
        edges.push(EdgeRecord::read_from(&buf));
    }

    Ok(NbgFile { nodes, edges })
}

fn read_u32(reader: &mut impl Read, path: &Path) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node(id: u32) -> NodeRecord {
        NodeRecord {
            internal_id: id,
            lon_e5: 123_456,
            lat_e5: -654_321,
            is_barrier: id % 2 == 0,
            is_traffic_light: false,
        }
    }

    fn sample_edge(source: u32, target: u32) -> EdgeRecord {
        EdgeRecord {
            source,
            target,
            distance_m: 42,
            direction: DIR_FORWARD | DIR_BACKWARD,
            weight: 420,
            name_id: 7,
            is_roundabout: false,
            ignore_in_grid: false,
            is_access_restricted: false,
            travel_mode: 1,
        }
    }

    #[test]
    fn roundtrip_nodes_and_edges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.osrm");

        let nodes = vec![sample_node(0), sample_node(1), sample_node(2)];
        let edges = vec![sample_edge(0, 1), sample_edge(1, 2)];

        write(&path, nodes.clone(), edges.clone()).unwrap();
        let loaded = read(&path).unwrap();

        assert_eq!(loaded.nodes, nodes);
        assert_eq!(loaded.edges, edges);
    }

    #[test]
    fn empty_graph_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.osrm");
        write(&path, Vec::new(), Vec::new()).unwrap();
        let loaded = read(&path).unwrap();
        assert!(loaded.nodes.is_empty());
        assert!(loaded.edges.is_empty());
    }

    #[test]
    fn wrong_fingerprint_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.osrm");
        std::fs::write(&path, [0u8; 32]).unwrap();
        let err = read(&path).unwrap_err();
        assert!(matches!(err, Error::InputFormat(_)));
    }
}
