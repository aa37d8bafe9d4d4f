//! Byte buffers backing the binary payload.
//!
//! A [`Buffer`] owns one contiguous, growable byte arena. On import it is
//! filled from a data URI, a referenced local file or the binary container's
//! body chunk; on export it grows by appended vertex data. A small overlay
//! mechanism lets one byte range at a time appear in decoded form while the
//! rest of the arena keeps its original encoding, so a compressed asset
//! never has to be decoded into memory all at once.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::dict::{dict_object, Ref};
use crate::document::Document;
use crate::error::{AssetError, Result};
use crate::json::{find_string, member_usize, JsonMap};
use crate::uri::DataUri;

/// Payload interpretation hint carried by the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferKind {
    #[default]
    Binary,
    Text,
}

impl BufferKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            BufferKind::Binary => "arraybuffer",
            BufferKind::Text => "text",
        }
    }

    pub fn from_wire(name: &str) -> BufferKind {
        match name {
            "text" => BufferKind::Text,
            _ => BufferKind::Binary,
        }
    }
}

/// One byte range of the arena overridden by separately-owned decoded data.
///
/// Accessor offsets computed after registration are in decoded coordinates:
/// registering a region immediately shifts the buffer's logical length by
/// `decoded.len() - encoded_length`.
#[derive(Debug)]
struct DecodedRegion {
    offset: usize,
    encoded_length: usize,
    decoded: Vec<u8>,
    id: String,
}

/// A buffer of raw binary data referenced by buffer views.
#[derive(Debug, Default)]
pub struct Buffer {
    pub id: String,
    pub name: Option<String>,
    pub kind: BufferKind,
    data: Vec<u8>,
    is_special: bool,
    regions: Vec<DecodedRegion>,
    current_region: Option<usize>,
}

impl Buffer {
    /// Logical length: the raw arena plus the net size delta of every
    /// registered decoded region.
    pub fn byte_length(&self) -> usize {
        let delta: isize = self
            .regions
            .iter()
            .map(|r| r.decoded.len() as isize - r.encoded_length as isize)
            .sum();
        (self.data.len() as isize + delta) as usize
    }

    /// The raw arena, ignoring any decoded regions.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn raw_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn mark_special(&mut self) {
        self.is_special = true;
    }

    /// True for the document's own embedded body buffer.
    pub fn is_special(&self) -> bool {
        self.is_special
    }

    /// Side-file name used when the document is saved.
    pub fn uri(&self) -> String {
        format!("{}.bin", self.id)
    }

    /// Extend the logical length by `amount` bytes (zero-filled).
    ///
    /// Capacity grows to `max(capacity * 1.5, length + amount)` so that the
    /// export pattern of many small appends stays O(1) amortized.
    pub fn grow(&mut self, amount: usize) {
        if amount == 0 {
            return;
        }
        let new_len = self.data.len() + amount;
        if self.data.capacity() < new_len {
            let target = (self.data.capacity() + self.data.capacity() / 2).max(new_len);
            self.data.reserve_exact(target - self.data.len());
        }
        self.data.resize(new_len, 0);
    }

    /// Append `bytes`, returning the offset they now occupy.
    pub fn append_data(&mut self, bytes: &[u8]) -> usize {
        let offset = self.data.len();
        self.grow(bytes.len());
        self.data[offset..].copy_from_slice(bytes);
        offset
    }

    /// Splice `new_bytes` over the `old_count` bytes at `offset`, keeping
    /// every byte outside the replaced range. Returns `false` when either
    /// count is zero or the range is out of bounds.
    pub fn replace_data(&mut self, offset: usize, old_count: usize, new_bytes: &[u8]) -> bool {
        if old_count == 0 || new_bytes.is_empty() {
            return false;
        }
        let Some(end) = offset.checked_add(old_count) else {
            return false;
        };
        if end > self.data.len() {
            return false;
        }
        self.data.splice(offset..end, new_bytes.iter().copied());
        true
    }

    /// Register `[offset, offset + encoded_length)` as logically replaced by
    /// `decoded`. The logical length shifts immediately; pointer resolution
    /// only redirects once the region is made current.
    pub fn mark_decoded_region(
        &mut self,
        offset: usize,
        encoded_length: usize,
        decoded: Vec<u8>,
        region_id: &str,
    ) -> Result<()> {
        if decoded.is_empty() {
            return Err(AssetError::invalid(format!(
                "decoded data for region \"{region_id}\" must not be empty"
            )));
        }
        let length = self.byte_length();
        if offset > length {
            return Err(AssetError::invalid(format!(
                "region offset {offset} is out of range for buffer \"{}\"",
                self.id
            )));
        }
        if offset + encoded_length > length {
            return Err(AssetError::invalid(format!(
                "region {offset}/{encoded_length} is out of range for buffer \"{}\"",
                self.id
            )));
        }
        self.regions.push(DecodedRegion {
            offset,
            encoded_length,
            decoded,
            id: region_id.to_owned(),
        });
        Ok(())
    }

    /// Select which registered region redirects pointer resolution. Only one
    /// region is current at a time; callers switch regions between meshes.
    pub fn set_current_region(&mut self, region_id: &str) -> Result<()> {
        if let Some(current) = self.current_region {
            if self.regions[current].id == region_id {
                return Ok(());
            }
        }
        match self.regions.iter().position(|r| r.id == region_id) {
            Some(i) => {
                self.current_region = Some(i);
                Ok(())
            }
            None => Err(AssetError::UnknownRegion(region_id.to_owned())),
        }
    }

    /// Resolve a logical offset to the bytes behind it: the current decoded
    /// region when the offset falls inside it, the raw arena otherwise.
    pub fn bytes_from(&self, offset: usize) -> Option<&[u8]> {
        if let Some(current) = self.current_region {
            let region = &self.regions[current];
            if offset >= region.offset && offset < region.offset + region.decoded.len() {
                return Some(&region.decoded[offset - region.offset..]);
            }
        }
        self.data.get(offset..)
    }

    /// Fill the arena from a stream: seek to `base_offset`, then read
    /// exactly `length` bytes (the stream's full size when `length` is 0).
    pub(crate) fn load_from_stream<R: Read + Seek>(
        &mut self,
        stream: &mut R,
        length: u64,
        base_offset: u64,
    ) -> io::Result<()> {
        let length = if length > 0 {
            length
        } else {
            stream.seek(SeekFrom::End(0))?.saturating_sub(base_offset)
        };
        stream.seek(SeekFrom::Start(base_offset))?;
        let mut data = vec![0u8; length as usize];
        stream.read_exact(&mut data)?;
        self.data = data;
        Ok(())
    }

    fn read_fields(&mut self, _this: Ref<Self>, obj: &JsonMap, doc: &mut Document) -> Result<()> {
        let stated = member_usize(obj, "byteLength", 0);
        if let Some(kind) = find_string(obj, "type") {
            self.kind = BufferKind::from_wire(kind);
        }

        let Some(uri) = find_string(obj, "uri") else {
            if stated > 0 {
                return Err(AssetError::invalid(format!(
                    "buffer \"{}\" with non-zero length is missing the \"uri\" attribute",
                    self.id
                )));
            }
            return Ok(());
        };

        if let Some(data_uri) = DataUri::parse(uri) {
            let decoded = data_uri.decode()?;
            let mismatch = if data_uri.base64 {
                stated > 0 && decoded.len() != stated
            } else {
                decoded.len() != stated
            };
            if mismatch {
                return Err(AssetError::invalid(format!(
                    "buffer \"{}\": expected {stated} bytes, but found {}",
                    self.id,
                    decoded.len()
                )));
            }
            tracing::debug!(buffer = %self.id, bytes = decoded.len(), "decoded inline buffer payload");
            self.data = decoded;
        } else if stated > 0 {
            let path = match doc.manifest_dir() {
                Some(dir) => dir.join(uri),
                None => PathBuf::from(uri),
            };
            let mut file = File::open(&path)
                .map_err(|e| AssetError::io("could not open referenced file", &path, e))?;
            self.load_from_stream(&mut file, stated as u64, 0)
                .map_err(|e| AssetError::io("error while reading referenced file", &path, e))?;
            tracing::debug!(buffer = %self.id, bytes = stated, path = %path.display(), "loaded buffer side file");
        }
        Ok(())
    }

    fn write_fields(&self, _doc: &Document) -> JsonMap {
        let mut obj = JsonMap::new();
        obj.insert(
            "byteLength".to_owned(),
            serde_json::Value::from(self.byte_length() as u64),
        );
        obj.insert(
            "type".to_owned(),
            serde_json::Value::from(self.kind.wire_name()),
        );
        obj.insert("uri".to_owned(), serde_json::Value::from(self.uri()));
        obj
    }
}

dict_object!(Buffer, buffers, "buffers");

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(bytes: &[u8]) -> Buffer {
        let mut b = Buffer::default();
        b.append_data(bytes);
        b
    }

    #[test]
    fn test_grow_extends_and_preserves() {
        let mut b = buffer_with(&[1, 2, 3]);
        let before = b.byte_length();
        b.grow(5);
        assert_eq!(b.byte_length(), before + 5);
        assert_eq!(&b.raw_bytes()[..3], &[1, 2, 3]);
        assert_eq!(&b.raw_bytes()[3..], &[0; 5]);
    }

    #[test]
    fn test_append_returns_previous_length() {
        let mut b = Buffer::default();
        assert_eq!(b.append_data(&[9, 9]), 0);
        assert_eq!(b.append_data(&[7]), 2);
        assert_eq!(b.raw_bytes(), &[9, 9, 7]);
    }

    #[test]
    fn test_replace_preserves_tail() {
        // Asymmetric prefix/tail so a wrong trailing-copy length shows up.
        let mut b = buffer_with(&[0, 1, 2, 3, 4, 5, 6, 7]);
        assert!(b.replace_data(2, 3, &[10, 11]));
        assert_eq!(b.raw_bytes(), &[0, 1, 10, 11, 5, 6, 7]);
    }

    #[test]
    fn test_replace_rejects_degenerate_input() {
        let mut b = buffer_with(&[0, 1, 2]);
        assert!(!b.replace_data(0, 0, &[1]));
        assert!(!b.replace_data(0, 1, &[]));
        assert!(!b.replace_data(2, 5, &[1]));
        assert_eq!(b.raw_bytes(), &[0, 1, 2]);
    }

    #[test]
    fn test_region_adjusts_byte_length() {
        let mut b = Buffer::default();
        b.grow(100);
        b.mark_decoded_region(10, 5, vec![0xAB; 8], "r0").unwrap();
        assert_eq!(b.byte_length(), 103);
    }

    #[test]
    fn test_current_region_redirects_resolution() {
        let mut b = Buffer::default();
        b.grow(100);
        b.mark_decoded_region(10, 5, vec![0xAB; 8], "r0").unwrap();

        // Not current yet: raw arena.
        assert_eq!(b.bytes_from(10).unwrap()[0], 0);

        b.set_current_region("r0").unwrap();
        for offset in 10..18 {
            assert_eq!(b.bytes_from(offset).unwrap()[0], 0xAB);
        }
        // One past the decoded span falls back to the raw arena.
        assert_eq!(b.bytes_from(18).unwrap()[0], 0);
    }

    #[test]
    fn test_unknown_region_id() {
        let mut b = Buffer::default();
        b.grow(10);
        b.mark_decoded_region(0, 4, vec![1, 2], "r0").unwrap();
        assert!(matches!(
            b.set_current_region("nope"),
            Err(AssetError::UnknownRegion(_))
        ));
    }

    #[test]
    fn test_region_validation() {
        let mut b = Buffer::default();
        b.grow(10);
        assert!(b.mark_decoded_region(0, 4, Vec::new(), "empty").is_err());
        assert!(b.mark_decoded_region(11, 1, vec![1], "offset").is_err());
        assert!(b.mark_decoded_region(8, 4, vec![1], "length").is_err());
    }
}
