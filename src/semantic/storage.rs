//! Binary storage for a vector collection.
//!
//! File format: `<collection>.bin`
//!
//! Header (55 bytes):
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 hash of embedder name)
//! - dimensions: u16 (little-endian)
//! - entry_count: u64 (little-endian)
//! - next_id: u64 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Entries (repeated):
//! - id: u64 (little-endian)
//! - content: u32 length + UTF-8 bytes
//! - metadata: u32 length + JSON object bytes
//! - embedding: [f32; dimensions] (little-endian)

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::highlights::Metadata;
use crate::semantic::index::{VectorEntry, VectorIndex};

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Header size in bytes: version(1) + model_id(32) + dimensions(2) + entry_count(8) + next_id(8) + checksum(4)
const HEADER_SIZE: usize = 55;

/// Bytes covered by the header checksum
const CHECKSUMMED: usize = HEADER_SIZE - 4;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum VectorStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: file uses different embedding model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,
}

/// Storage manager for one collection file.
pub struct VectorStorage {
    path: PathBuf,
}

impl VectorStorage {
    /// Create a new storage manager for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the storage file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the storage file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the vector index from storage.
    ///
    /// Fails with [`VectorStorageError::ModelMismatch`] when the file was
    /// written with a different embedding model.
    pub fn load(&self, expected_model_id: &[u8; 32]) -> Result<VectorIndex, VectorStorageError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        let header = read_header(&mut reader)?;
        if header.version != FORMAT_VERSION {
            return Err(VectorStorageError::VersionMismatch(
                header.version,
                FORMAT_VERSION,
            ));
        }
        if header.model_id != *expected_model_id {
            return Err(VectorStorageError::ModelMismatch);
        }

        let mut index = VectorIndex::new(header.dimensions as usize);

        for _ in 0..header.entry_count {
            let (id, entry) = read_entry(&mut reader, header.dimensions as usize)?;
            index
                .insert_with_id(id, entry)
                .map_err(|e| VectorStorageError::InvalidFormat(format!("entry {id}: {e}")))?;
        }
        index.reserve_ids_until(header.next_id);

        Ok(index)
    }

    /// Save the vector index to storage.
    ///
    /// Uses atomic write: temp file -> fsync -> rename
    pub fn save(&self, index: &VectorIndex, model_id: &[u8; 32]) -> Result<(), VectorStorageError> {
        let temp_path = self.path.with_extension("tmp");

        let result = self.write_to_file(&temp_path, index, model_id);

        if result.is_err() {
            // Clean up temp file on error
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Delete the storage file if it exists.
    pub fn delete(&self) -> Result<(), VectorStorageError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn write_to_file(
        &self,
        path: &Path,
        index: &VectorIndex,
        model_id: &[u8; 32],
    ) -> Result<(), VectorStorageError> {
        let dimensions = u16::try_from(index.dimensions()).map_err(|_| {
            VectorStorageError::InvalidFormat(format!(
                "{} dimensions do not fit the header",
                index.dimensions()
            ))
        })?;

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let header = Header {
            version: FORMAT_VERSION,
            model_id: *model_id,
            dimensions,
            entry_count: index.len() as u64,
            next_id: index.next_id(),
        };
        write_header(&mut writer, &header)?;

        for (id, entry) in index.iter() {
            write_entry(&mut writer, id, entry)?;
        }

        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        file.sync_all()?;

        Ok(())
    }
}

/// File header structure.
#[derive(Debug)]
struct Header {
    version: u8,
    model_id: [u8; 32],
    dimensions: u16,
    entry_count: u64,
    next_id: u64,
}

fn read_header<R: Read>(reader: &mut R) -> Result<Header, VectorStorageError> {
    let mut bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            VectorStorageError::InvalidFormat("file too short for header".to_string())
        }
        _ => e.into(),
    })?;

    let stored_checksum = u32::from_le_bytes(read_array(&bytes[CHECKSUMMED..HEADER_SIZE]));
    if stored_checksum != crc32fast::hash(&bytes[..CHECKSUMMED]) {
        return Err(VectorStorageError::ChecksumMismatch);
    }

    Ok(Header {
        version: bytes[0],
        model_id: read_array(&bytes[1..33]),
        dimensions: u16::from_le_bytes(read_array(&bytes[33..35])),
        entry_count: u64::from_le_bytes(read_array(&bytes[35..43])),
        next_id: u64::from_le_bytes(read_array(&bytes[43..51])),
    })
}

fn write_header<W: Write>(writer: &mut W, header: &Header) -> Result<(), VectorStorageError> {
    let mut bytes = [0u8; HEADER_SIZE];

    bytes[0] = header.version;
    bytes[1..33].copy_from_slice(&header.model_id);
    bytes[33..35].copy_from_slice(&header.dimensions.to_le_bytes());
    bytes[35..43].copy_from_slice(&header.entry_count.to_le_bytes());
    bytes[43..51].copy_from_slice(&header.next_id.to_le_bytes());

    let checksum = crc32fast::hash(&bytes[..CHECKSUMMED]);
    bytes[CHECKSUMMED..HEADER_SIZE].copy_from_slice(&checksum.to_le_bytes());

    writer.write_all(&bytes)?;
    Ok(())
}

fn read_entry<R: Read>(
    reader: &mut R,
    dimensions: usize,
) -> Result<(u64, VectorEntry), VectorStorageError> {
    let id = u64::from_le_bytes(read_fixed(reader)?);

    let content = String::from_utf8(read_blob(reader)?)
        .map_err(|e| VectorStorageError::InvalidFormat(format!("entry {id} content: {e}")))?;

    let metadata: Metadata = serde_json::from_slice(&read_blob(reader)?)
        .map_err(|e| VectorStorageError::InvalidFormat(format!("entry {id} metadata: {e}")))?;

    let mut embedding = Vec::with_capacity(dimensions);
    for _ in 0..dimensions {
        embedding.push(f32::from_le_bytes(read_fixed(reader)?));
    }

    Ok((
        id,
        VectorEntry {
            content,
            metadata,
            embedding,
        },
    ))
}

fn write_entry<W: Write>(writer: &mut W, id: u64, entry: &VectorEntry) -> Result<(), VectorStorageError> {
    let metadata = serde_json::to_vec(&entry.metadata)
        .map_err(|e| VectorStorageError::InvalidFormat(format!("entry {id} metadata: {e}")))?;

    writer.write_all(&id.to_le_bytes())?;
    write_blob(writer, entry.content.as_bytes())?;
    write_blob(writer, &metadata)?;

    for &value in &entry.embedding {
        writer.write_all(&value.to_le_bytes())?;
    }

    Ok(())
}

fn read_blob<R: Read>(reader: &mut R) -> Result<Vec<u8>, VectorStorageError> {
    let len = u32::from_le_bytes(read_fixed(reader)?) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn write_blob<W: Write>(writer: &mut W, data: &[u8]) -> Result<(), VectorStorageError> {
    let len = u32::try_from(data.len())
        .map_err(|_| VectorStorageError::InvalidFormat("field longer than 4 GiB".to_string()))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(data)?;
    Ok(())
}

fn read_fixed<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N], VectorStorageError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Copy a slice whose length is known to be `N`.
fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
