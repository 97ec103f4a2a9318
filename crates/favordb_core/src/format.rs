//! Store file format.
//!
//! ```text
//! header  : magic "FAVR" | format u16 LE | schema_version u64 LE | crc32 u32 LE
//! frame*  : len u32 LE | crc32(len) u32 LE | sha256(payload)[..8] | payload (CBOR)
//! payload : { "seq": u64, "ops": [op*] }
//! ```
//!
//! Each frame is one committed write transaction. A snapshot frame starts
//! with `clear_all` and puts every stored record.

use crate::error::{CoreError, CoreResult};
use crate::types::{PrimaryKey, SchemaVersion, SequenceNumber};
use favordb_codec::Record;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// File magic.
pub const MAGIC: [u8; 4] = *b"FAVR";

/// Current file format revision.
pub const FORMAT_VERSION: u16 = 1;

/// Encoded header size: magic + format + schema version + crc.
pub const HEADER_LEN: usize = 4 + 2 + 8 + 4;

/// Frame prefix size: length + length crc + truncated sha256.
pub const FRAME_PREFIX_LEN: usize = 4 + 4 + CHECKSUM_LEN;

/// Bytes of sha256 kept per frame.
pub const CHECKSUM_LEN: usize = 8;

/// Store file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// File format revision.
    pub format: u16,
    /// Schema version of the stored records.
    pub schema_version: SchemaVersion,
}

impl Header {
    /// Creates a header for the current format.
    #[must_use]
    pub const fn new(schema_version: SchemaVersion) -> Self {
        Self {
            format: FORMAT_VERSION,
            schema_version,
        }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..6].copy_from_slice(&self.format.to_le_bytes());
        buf[6..14].copy_from_slice(&self.schema_version.as_u64().to_le_bytes());
        let crc = compute_crc32(&buf[..14]);
        buf[14..18].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a header from the start of `data`.
    ///
    /// # Errors
    ///
    /// `InvalidFormat` for a short buffer, wrong magic or unknown format
    /// revision; `ChecksumMismatch` if the header crc does not match.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(CoreError::invalid_format(format!(
                "header needs {HEADER_LEN} bytes, file has {}",
                data.len()
            )));
        }
        if data[0..4] != MAGIC {
            return Err(CoreError::invalid_format("bad magic"));
        }

        let expected = read_u32(&data[14..18]);
        let actual = compute_crc32(&data[..14]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        let format = u16::from_le_bytes([data[4], data[5]]);
        if format != FORMAT_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported format revision {format}"
            )));
        }

        let mut version = [0u8; 8];
        version.copy_from_slice(&data[6..14]);
        Ok(Self {
            format,
            schema_version: SchemaVersion::new(u64::from_le_bytes(version)),
        })
    }
}

/// One mutation inside a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Op {
    /// Insert or replace a record.
    Put {
        /// Entity type.
        #[serde(rename = "put")]
        entity_type: String,
        /// Primary key.
        key: PrimaryKey,
        /// Full stored record.
        record: Record,
    },
    /// Remove a record.
    Delete {
        /// Entity type.
        #[serde(rename = "del")]
        entity_type: String,
        /// Primary key.
        key: PrimaryKey,
    },
    /// Remove every record of one type.
    Clear {
        /// Entity type.
        #[serde(rename = "clear")]
        entity_type: String,
    },
    /// Remove every record of every type.
    ClearAll {
        /// Always `true`.
        clear_all: bool,
    },
}

/// Decoded frame payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Commit sequence number.
    pub seq: SequenceNumber,
    /// Mutations in commit order.
    pub ops: Vec<Op>,
}

impl Frame {
    /// Encodes the frame with its length and checksum prefix.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a record cannot be encoded, or
    /// `InvalidOperation` if the payload exceeds `u32::MAX` bytes.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload = favordb_codec::to_cbor(self)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::invalid_operation("frame larger than 4 GiB"))?;

        let mut buf = Vec::with_capacity(FRAME_PREFIX_LEN + payload.len());
        let len = len.to_le_bytes();
        buf.extend_from_slice(&len);
        buf.extend_from_slice(&compute_crc32(&len).to_le_bytes());
        buf.extend_from_slice(&checksum(&payload));
        buf.extend_from_slice(&payload);
        Ok(buf)
    }
}

/// Outcome of scanning one frame.
#[derive(Debug)]
pub enum FrameScan {
    /// A complete frame and the offset just past it.
    Frame(Frame, usize),
    /// No more data.
    End,
    /// The remaining bytes do not hold a complete, valid frame.
    Torn {
        /// Why the tail was rejected.
        reason: String,
    },
}

/// Reads the frame starting at `offset`.
///
/// A frame that is cut short, or whose checksum fails while it runs to the
/// end of the data, is reported as [`FrameScan::Torn`]. A checksum failure
/// with more data after the frame is corruption.
///
/// The length has its own crc, so a damaged length is never mistaken for a
/// frame running past the end. A prefix failing that crc is torn only if
/// nothing but the prefix, or only zero bytes, remain.
///
/// # Errors
///
/// `Corrupted` for a bad frame in the middle of the file or a payload that
/// passes its checksum but does not decode.
pub fn scan_frame(data: &[u8], offset: usize) -> CoreResult<FrameScan> {
    let rest = &data[offset.min(data.len())..];
    if rest.is_empty() {
        return Ok(FrameScan::End);
    }
    if rest.len() < FRAME_PREFIX_LEN {
        return Ok(FrameScan::Torn {
            reason: format!("{} trailing bytes, shorter than a frame prefix", rest.len()),
        });
    }

    if read_u32(&rest[4..8]) != compute_crc32(&rest[0..4]) {
        if rest.len() == FRAME_PREFIX_LEN || rest.iter().all(|&b| b == 0) {
            return Ok(FrameScan::Torn {
                reason: "unreadable frame prefix at end of file".to_string(),
            });
        }
        return Err(CoreError::corrupted(format!(
            "frame length checksum mismatch at offset {offset}"
        )));
    }

    let len = read_u32(&rest[0..4]) as usize;
    let end = FRAME_PREFIX_LEN + len;
    if rest.len() < end {
        return Ok(FrameScan::Torn {
            reason: format!("frame of {len} bytes cut short at {}", rest.len() - FRAME_PREFIX_LEN),
        });
    }

    let payload = &rest[FRAME_PREFIX_LEN..end];
    if checksum(payload) != rest[8..FRAME_PREFIX_LEN] {
        if rest.len() == end {
            return Ok(FrameScan::Torn {
                reason: "checksum mismatch in last frame".to_string(),
            });
        }
        return Err(CoreError::corrupted(format!(
            "checksum mismatch in frame at offset {offset}"
        )));
    }

    let frame: Frame = favordb_codec::from_cbor(payload).map_err(|e| {
        CoreError::corrupted(format!("undecodable frame at offset {offset}: {e}"))
    })?;
    Ok(FrameScan::Frame(frame, offset + end))
}

/// Truncated sha256 of a frame payload.
#[must_use]
pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Computes CRC32 checksum for data.
pub fn compute_crc32(data: &[u8]) -> u32 {
    // IEEE polynomial, reflected
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}
