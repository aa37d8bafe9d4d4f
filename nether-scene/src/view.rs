//! Buffer views: immutable windows into a buffer.

use serde_json::Value;

use crate::buffer::Buffer;
use crate::dict::{dict_object, Ref};
use crate::document::Document;
use crate::error::Result;
use crate::json::{find_string, member_usize, JsonMap};

/// Usage hint for the windowed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferViewTarget {
    #[default]
    None,
    ArrayBuffer,
    ElementArrayBuffer,
}

impl BufferViewTarget {
    pub fn code(self) -> u32 {
        match self {
            BufferViewTarget::None => 0,
            BufferViewTarget::ArrayBuffer => 34962,
            BufferViewTarget::ElementArrayBuffer => 34963,
        }
    }

    pub fn from_code(code: u64) -> BufferViewTarget {
        match code {
            34962 => BufferViewTarget::ArrayBuffer,
            34963 => BufferViewTarget::ElementArrayBuffer,
            _ => BufferViewTarget::None,
        }
    }
}

/// A contiguous `[byte_offset, byte_offset + byte_length)` window into one
/// buffer. Immutable once read; the window must fit the buffer at time of
/// use (buffers may still grow during export).
#[derive(Debug, Default)]
pub struct BufferView {
    pub id: String,
    pub name: Option<String>,
    /// A view may legitimately have no buffer (placeholder entries).
    pub buffer: Option<Ref<Buffer>>,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub target: BufferViewTarget,
}

impl BufferView {
    fn read_fields(&mut self, _this: Ref<Self>, obj: &JsonMap, doc: &mut Document) -> Result<()> {
        if let Some(buffer_id) = find_string(obj, "buffer") {
            self.buffer = Some(doc.get::<Buffer>(buffer_id)?);
        }
        self.byte_offset = member_usize(obj, "byteOffset", 0);
        self.byte_length = member_usize(obj, "byteLength", 0);
        if let Some(code) = obj.get("target").and_then(Value::as_u64) {
            self.target = BufferViewTarget::from_code(code);
        }
        Ok(())
    }

    fn write_fields(&self, doc: &Document) -> JsonMap {
        let mut obj = JsonMap::new();
        if let Some(buffer) = self.buffer {
            obj.insert("buffer".to_owned(), Value::from(doc[buffer].id.clone()));
        }
        obj.insert("byteOffset".to_owned(), Value::from(self.byte_offset as u64));
        obj.insert("byteLength".to_owned(), Value::from(self.byte_length as u64));
        if self.target != BufferViewTarget::None {
            obj.insert("target".to_owned(), Value::from(self.target.code()));
        }
        obj
    }
}

dict_object!(BufferView, views, "bufferViews");
