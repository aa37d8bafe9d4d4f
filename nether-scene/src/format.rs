//! NetherScene container format (`.ncscene` / `.ncsb`)
//!
//! A NetherScene document is either a plain JSON manifest (`.ncscene`) or a
//! self-describing binary container (`.ncsb`):
//!
//! ```text
//! 0x00: magic        [u8; 4] = "NSCN"
//! 0x04: version      u32     (currently 1)
//! 0x08: file_length  u32     (total container size in bytes)
//! 0x0C: scene_length u32     (JSON manifest length in bytes)
//! 0x10: scene_format u32     = 0 (JSON)
//! 0x14: manifest     (scene_length bytes of UTF-8 JSON)
//! var:  body         (everything after the manifest, one flat byte region)
//! ```
//!
//! All integers are little-endian. The body chunk is addressed by buffer
//! views through the reserved buffer id [`BODY_BUFFER_ID`].

use crate::error::{AssetError, Result};

/// Format specification for NetherScene files.
///
/// Single source of truth for the container constants (extensions, magic
/// bytes, version).
#[derive(Debug, Clone, Copy)]
pub struct SceneFormat {
    /// Manifest file extension without dot
    pub extension: &'static str,

    /// Binary container extension without dot
    pub binary_extension: &'static str,

    /// Magic bytes at the start of a binary container (4 bytes)
    pub magic: &'static [u8; 4],

    /// Container format version
    pub version: u32,
}

/// The NetherScene format constants.
pub const NETHER_SCENE_FORMAT: SceneFormat = SceneFormat {
    extension: "ncscene",
    binary_extension: "ncsb",
    magic: b"NSCN",
    version: 1,
};

/// Reserved id of the buffer backed by the container's body chunk.
pub const BODY_BUFFER_ID: &str = "binary_body";

/// Scene payload encoding; only JSON is defined.
pub const SCENE_FORMAT_JSON: u32 = 0;

/// Binary container header (20 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneHeader {
    pub version: u32,
    pub file_length: u32,
    pub scene_length: u32,
    pub scene_format: u32,
}

impl SceneHeader {
    pub const SIZE: usize = 20;

    pub fn new(file_length: u32, scene_length: u32) -> Self {
        Self {
            version: NETHER_SCENE_FORMAT.version,
            file_length,
            scene_length,
            scene_format: SCENE_FORMAT_JSON,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(NETHER_SCENE_FORMAT.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.file_length.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.scene_length.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.scene_format.to_le_bytes());
        bytes
    }

    /// Parse and validate a header.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(AssetError::invalid("binary container shorter than its header"));
        }
        if &bytes[0..4] != NETHER_SCENE_FORMAT.magic {
            return Err(AssetError::invalid(
                "not a NetherScene binary container (bad magic bytes)",
            ));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version > NETHER_SCENE_FORMAT.version {
            return Err(AssetError::invalid(format!(
                "unsupported container version {version} (max supported: {})",
                NETHER_SCENE_FORMAT.version
            )));
        }
        let file_length = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let scene_length = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let scene_format = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        if scene_format != SCENE_FORMAT_JSON {
            return Err(AssetError::invalid(format!(
                "unknown scene payload format {scene_format}"
            )));
        }
        Ok(Self {
            version,
            file_length,
            scene_length,
            scene_format,
        })
    }

    /// Body chunk offset within the container.
    pub fn body_offset(&self) -> usize {
        Self::SIZE + self.scene_length as usize
    }

    /// Body chunk length; zero when the container carries no binary data.
    pub fn body_length(&self) -> usize {
        (self.file_length as usize).saturating_sub(self.body_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = SceneHeader::new(1000, 400);
        let parsed = SceneHeader::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.body_offset(), 420);
        assert_eq!(parsed.body_length(), 580);
    }

    #[test]
    fn test_header_no_body() {
        let header = SceneHeader::new(20 + 50, 50);
        assert_eq!(header.body_length(), 0);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = SceneHeader::new(100, 40).to_bytes();
        bytes[0] = b'X';
        assert!(SceneHeader::parse(&bytes).is_err());
    }

    #[test]
    fn test_unsupported_version() {
        let mut header = SceneHeader::new(100, 40);
        header.version = 99;
        assert!(SceneHeader::parse(&header.to_bytes()).is_err());
    }

    #[test]
    fn test_truncated_header() {
        let bytes = SceneHeader::new(100, 40).to_bytes();
        assert!(SceneHeader::parse(&bytes[..12]).is_err());
    }
}
