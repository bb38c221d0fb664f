//! Persists whole volumes as image files.
//!
//! An image is a fixed 16 byte header followed by the bincode encoded [`VolumeState`]:
//!
//! ```text
//! | magic "SFSV" | version | block count | payload length | payload ... |
//! ```
//!
//! Header fields are big endian `u32`s.

use std::convert::TryFrom;
use std::fs;
use std::io::Write;
use std::path::Path;

use log::{info, warn};
use tempfile::NamedTempFile;
use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::fs::{SFSError, Volume, VolumeState};

const IMAGE_MAGIC: u32 = 0x5346_5356; // SFSV
const IMAGE_VERSION: u32 = 1;

#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Clone, Copy, Debug)]
struct ImageHeader {
    magic: U32<BigEndian>,
    version: U32<BigEndian>,
    /// Duplicated from the payload so a mismatched header is caught before decoding.
    block_count: U32<BigEndian>,
    payload_len: U32<BigEndian>,
}

pub const HEADER_LEN: usize = std::mem::size_of::<ImageHeader>();

fn to_u32(value: usize, what: &str) -> Result<u32, SFSError> {
    u32::try_from(value).map_err(|_| SFSError::CorruptImage(format!("{} {} too large", what, value)))
}

/// Encodes a volume state into image bytes.
pub fn encode(state: &VolumeState) -> Result<Vec<u8>, SFSError> {
    let payload = bincode::serialize(state)?;
    let header = ImageHeader {
        magic: U32::new(IMAGE_MAGIC),
        version: U32::new(IMAGE_VERSION),
        block_count: U32::new(to_u32(state.block_count, "block count")?),
        payload_len: U32::new(to_u32(payload.len(), "payload length")?),
    };

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes image bytes into a volume state. The state is not checked for consistency, see
/// [`Volume::import_state`].
pub fn decode(buf: &[u8]) -> Result<VolumeState, SFSError> {
    let header = ImageHeader::read_from_prefix(buf)
        .ok_or_else(|| SFSError::CorruptImage("truncated header".to_string()))?;

    if header.magic.get() != IMAGE_MAGIC {
        return Err(SFSError::CorruptImage(format!(
            "bad magic {:#010x}",
            header.magic.get()
        )));
    }
    if header.version.get() != IMAGE_VERSION {
        return Err(SFSError::CorruptImage(format!(
            "unsupported version {}",
            header.version.get()
        )));
    }

    let payload = &buf[HEADER_LEN..];
    if payload.len() != header.payload_len.get() as usize {
        return Err(SFSError::CorruptImage(format!(
            "expected {} payload bytes, found {}",
            header.payload_len.get(),
            payload.len()
        )));
    }

    let state: VolumeState = bincode::deserialize(payload)?;
    if state.block_count != header.block_count.get() as usize {
        return Err(SFSError::CorruptImage(format!(
            "header describes {} blocks, payload {}",
            header.block_count.get(),
            state.block_count
        )));
    }
    Ok(state)
}

/// Writes `volume` to `dest`. The image is written to a temporary file next to `dest` and moved
/// over it once complete, so an interrupted save never leaves a partial image behind.
pub fn save<P: AsRef<Path>>(volume: &Volume, dest: P) -> Result<(), SFSError> {
    let dest = dest.as_ref();
    let bytes = encode(&volume.export_state())?;

    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;

    info!("Saved {} byte image to {}.", bytes.len(), dest.display());
    Ok(())
}

/// Reads and validates the image at `src`.
pub fn load<P: AsRef<Path>>(src: P) -> Result<Volume, SFSError> {
    let src = src.as_ref();
    let bytes = fs::read(src)?;
    let volume = decode(&bytes).and_then(Volume::from_state).map_err(|e| {
        warn!("Rejected image {}: {}", src.display(), e);
        e
    })?;
    info!(
        "Loaded {} files from {}.",
        volume.table().live_count(),
        src.display()
    );
    Ok(volume)
}

/// Loads the image at `src` if the file exists, otherwise returns a fresh volume of
/// `block_count` blocks.
pub fn load_or_create<P: AsRef<Path>>(src: P, block_count: usize) -> Result<Volume, SFSError> {
    let src = src.as_ref();
    if src.exists() {
        load(src)
    } else {
        info!("No image at {}, starting empty.", src.display());
        Ok(Volume::new(block_count))
    }
}
