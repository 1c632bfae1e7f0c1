//! `<base>.names` string table (spec §6): a flat array of length-prefixed
//! strings, indexed by the `name_id` stored in the node-based graph's edge
//! records. No fingerprint or CRC footer — it's a dependent side file of
//! `<base>.osrm`, loaded only alongside it.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use waymark_common::error::{Error, Result};

pub struct NamesWriter {
    writer: BufWriter<File>,
    path: std::path::PathBuf,
    count: u32,
}

impl NamesWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&0u32.to_le_bytes())
            .map_err(|e| Error::io(&path, e))?;
        Ok(Self {
            writer,
            path,
            count: 0,
        })
    }

    /// Append a name, returning its `name_id`.
    pub fn push(&mut self, name: &str) -> Result<u32> {
        let id = self.count;
        let bytes = name.as_bytes();
        self.writer
            .write_all(&(bytes.len() as u32).to_le_bytes())
            .map_err(|e| Error::io(&self.path, e))?;
        self.writer
            .write_all(bytes)
            .map_err(|e| Error::io(&self.path, e))?;
        self.count += 1;
        Ok(id)
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().map_err(|e| Error::io(&self.path, e))?;
        let mut file = self.writer.into_inner().map_err(|e| {
            Error::io(&self.path, std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        crate::framing::patch_count(&mut file, &self.path, 0, self.count)
    }
}

pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);

    let mut count_buf = [0u8; 4];
    reader
        .read_exact(&mut count_buf)
        .map_err(|e| Error::io(path, e))?;
    let count = u32::from_le_bytes(count_buf);

    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut len_buf = [0u8; 4];
        reader
            .read_exact(&mut len_buf)
            .map_err(|e| Error::io(path, e))?;
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut bytes = vec![0u8; len];
        reader
            .read_exact(&mut bytes)
            .map_err(|e| Error::io(path, e))?;
        let name = String::from_utf8(bytes)
            .map_err(|e| Error::InputIntegrity(format!("{}: invalid utf-8 name: {e}", path.display())))?;
        names.push(name);
    }
    Ok(names)
}
