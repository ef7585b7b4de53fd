//! Model file checks
//!
//! A cheap header check run before handing a path to llama.cpp, so a wrong
//! or truncated file fails with a readable message instead of a null model.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Magic bytes at the start of every GGUF file
pub const GGUF_MAGIC: [u8; 4] = *b"GGUF";

/// Errors from model file validation
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read model file: {0}")]
    Io(#[from] io::Error),
    #[error("not a GGUF file (magic {0:?})")]
    InvalidMagic([u8; 4]),
    #[error("unsupported GGUF version {0}")]
    UnsupportedVersion(u32),
}

/// Header fields of a GGUF file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GgufMetadata {
    pub version: u32,
    pub tensor_count: u64,
    pub metadata_kv_count: u64,
}

/// Read and check the GGUF header of `path`.
pub fn validate_gguf(path: &Path) -> Result<GgufMetadata, ModelError> {
    if !path.is_file() {
        return Err(ModelError::NotFound(path.to_path_buf()));
    }

    let mut file = File::open(path)?;
    read_header(&mut file)
}

fn read_header(reader: &mut impl Read) -> Result<GgufMetadata, ModelError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != GGUF_MAGIC {
        return Err(ModelError::InvalidMagic(magic));
    }

    let version = read_u32(reader)?;
    // v1 used 32-bit counts and is no longer loadable by llama.cpp
    if !(2..=3).contains(&version) {
        return Err(ModelError::UnsupportedVersion(version));
    }

    let tensor_count = read_u64(reader)?;
    let metadata_kv_count = read_u64(reader)?;

    Ok(GgufMetadata {
        version,
        tensor_count,
        metadata_kv_count,
    })
}

fn read_u32(reader: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
