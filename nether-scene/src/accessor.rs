//! Typed, strided views into buffer views.
//!
//! An accessor pins down the element shape (scalar/vector/matrix), the
//! component type and a stride over a buffer view's bytes. Bulk extraction
//! degrades gracefully from one contiguous copy (tightly packed source,
//! matching target size) to a per-element copy; bulk writes pad narrower
//! source elements with zeros. All address resolution funnels through the
//! owning buffer, which transparently applies the current decoded region.

use bytemuck::{Pod, Zeroable};
use serde_json::Value;

use crate::dict::{dict_object, Ref};
use crate::document::Document;
use crate::error::{AssetError, Result};
use crate::json::{find_array, find_string, member_usize, JsonMap};
use crate::view::BufferView;

/// Scalar component type of accessor data. Codes are the wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentType {
    #[default]
    Byte = 5120,
    UnsignedByte = 5121,
    Short = 5122,
    UnsignedShort = 5123,
    UnsignedInt = 5125,
    Float = 5126,
}

impl ComponentType {
    pub fn from_code(code: u64) -> Option<ComponentType> {
        match code {
            5120 => Some(ComponentType::Byte),
            5121 => Some(ComponentType::UnsignedByte),
            5122 => Some(ComponentType::Short),
            5123 => Some(ComponentType::UnsignedShort),
            5125 => Some(ComponentType::UnsignedInt),
            5126 => Some(ComponentType::Float),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Size of one component in bytes.
    pub fn size(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort => 2,
            ComponentType::UnsignedInt | ComponentType::Float => 4,
        }
    }

    fn is_integer(self) -> bool {
        !matches!(self, ComponentType::Float)
    }
}

/// Element shape: how many components make up one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementType {
    #[default]
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    pub fn components(self) -> usize {
        match self {
            ElementType::Scalar => 1,
            ElementType::Vec2 => 2,
            ElementType::Vec3 => 3,
            ElementType::Vec4 => 4,
            ElementType::Mat2 => 4,
            ElementType::Mat3 => 9,
            ElementType::Mat4 => 16,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Scalar => "SCALAR",
            ElementType::Vec2 => "VEC2",
            ElementType::Vec3 => "VEC3",
            ElementType::Vec4 => "VEC4",
            ElementType::Mat2 => "MAT2",
            ElementType::Mat3 => "MAT3",
            ElementType::Mat4 => "MAT4",
        }
    }

    pub fn from_name(name: &str) -> Option<ElementType> {
        match name {
            "SCALAR" => Some(ElementType::Scalar),
            "VEC2" => Some(ElementType::Vec2),
            "VEC3" => Some(ElementType::Vec3),
            "VEC4" => Some(ElementType::Vec4),
            "MAT2" => Some(ElementType::Mat2),
            "MAT3" => Some(ElementType::Mat3),
            "MAT4" => Some(ElementType::Mat4),
            _ => None,
        }
    }
}

/// A typed view into a buffer view.
#[derive(Debug, Default)]
pub struct Accessor {
    pub id: String,
    pub name: Option<String>,
    pub buffer_view: Option<Ref<BufferView>>,
    /// Offset relative to the start of the buffer view, in bytes.
    pub byte_offset: usize,
    /// Stride between elements; 0 means tightly packed.
    pub byte_stride: usize,
    pub component_type: ComponentType,
    pub count: usize,
    pub element_type: ElementType,
    /// Optional per-component bounds metadata.
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl Accessor {
    pub fn num_components(&self) -> usize {
        self.element_type.components()
    }

    pub fn bytes_per_component(&self) -> usize {
        self.component_type.size()
    }

    pub fn element_size(&self) -> usize {
        self.num_components() * self.bytes_per_component()
    }

    /// Effective stride: the declared one, or the element size when tightly
    /// packed.
    pub fn stride(&self) -> usize {
        if self.byte_stride != 0 {
            self.byte_stride
        } else {
            self.element_size()
        }
    }

    /// The bytes behind this accessor, from its first element onward.
    /// `None` when the view or buffer chain is unset.
    pub fn bytes<'a>(&self, doc: &'a Document) -> Option<&'a [u8]> {
        let view = &doc[self.buffer_view?];
        let buffer = &doc[view.buffer?];
        buffer.bytes_from(self.byte_offset + view.byte_offset)
    }

    /// Copy all elements out into owned `T` values.
    ///
    /// Returns `None` when the view/buffer chain is unset or the accessor
    /// does not fit its view. One bulk copy when the source is tightly
    /// packed and `T` matches the element size exactly, a per-element copy
    /// otherwise.
    ///
    /// # Panics
    ///
    /// Panics if `T` is smaller than the accessor's element size.
    pub fn extract_data<T: Pod>(&self, doc: &Document) -> Option<Vec<T>> {
        let view = &doc[self.buffer_view?];
        let data = self.bytes(doc)?;

        let elem_size = self.element_size();
        let stride = self.stride();
        let target_size = std::mem::size_of::<T>();
        assert!(
            elem_size <= target_size,
            "accessor element ({elem_size} bytes) does not fit the target type ({target_size} bytes)"
        );

        if self.count == 0 {
            return Some(Vec::new());
        }
        let span = (self.count - 1) * stride + elem_size;
        if span > data.len() || self.count * stride > view.byte_length {
            return None;
        }

        let mut out = vec![T::zeroed(); self.count];
        let out_bytes = bytemuck::cast_slice_mut::<T, u8>(&mut out);
        if stride == elem_size && target_size == elem_size {
            out_bytes.copy_from_slice(&data[..self.count * elem_size]);
        } else {
            for i in 0..self.count {
                out_bytes[i * target_size..i * target_size + elem_size]
                    .copy_from_slice(&data[i * stride..i * stride + elem_size]);
            }
        }
        Some(out)
    }

    /// Random access into the accessor's elements.
    pub fn indexer<'a>(&self, doc: &'a Document) -> Option<Indexer<'a>> {
        let data = self.bytes(doc)?;
        Some(Indexer {
            data,
            elem_size: self.element_size(),
            stride: self.stride(),
            count: self.count,
        })
    }

    fn read_fields(&mut self, _this: Ref<Self>, obj: &JsonMap, doc: &mut Document) -> Result<()> {
        if let Some(view_id) = find_string(obj, "bufferView") {
            self.buffer_view = Some(doc.get::<BufferView>(view_id)?);
        }
        self.byte_offset = member_usize(obj, "byteOffset", 0);
        self.byte_stride = member_usize(obj, "byteStride", 0);
        self.component_type = obj
            .get("componentType")
            .and_then(Value::as_u64)
            .and_then(ComponentType::from_code)
            .unwrap_or_default();
        self.count = member_usize(obj, "count", 0);
        self.element_type = find_string(obj, "type")
            .and_then(ElementType::from_name)
            .unwrap_or_default();
        self.min = read_bounds(obj, "min");
        self.max = read_bounds(obj, "max");
        Ok(())
    }

    fn write_fields(&self, doc: &Document) -> JsonMap {
        let mut obj = JsonMap::new();
        if let Some(view) = self.buffer_view {
            obj.insert("bufferView".to_owned(), Value::from(doc[view].id.clone()));
        }
        obj.insert("byteOffset".to_owned(), Value::from(self.byte_offset as u64));
        obj.insert("byteStride".to_owned(), Value::from(self.byte_stride as u64));
        obj.insert(
            "componentType".to_owned(),
            Value::from(self.component_type.code()),
        );
        obj.insert("count".to_owned(), Value::from(self.count as u64));
        obj.insert("type".to_owned(), Value::from(self.element_type.name()));
        if !self.min.is_empty() {
            obj.insert(
                "min".to_owned(),
                bounds_value(&self.min, self.component_type),
            );
        }
        if !self.max.is_empty() {
            obj.insert(
                "max".to_owned(),
                bounds_value(&self.max, self.component_type),
            );
        }
        obj
    }
}

dict_object!(Accessor, accessors, "accessors");

fn read_bounds(obj: &JsonMap, key: &str) -> Vec<f64> {
    find_array(obj, key)
        .map(|arr| arr.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

/// Integer component types carry integral bounds on the wire.
fn bounds_value(bounds: &[f64], component_type: ComponentType) -> Value {
    if component_type.is_integer() {
        Value::from(bounds.iter().map(|&v| v as i64).collect::<Vec<_>>())
    } else {
        Value::from(bounds.to_vec())
    }
}

/// Random access over an accessor's raw elements.
pub struct Indexer<'a> {
    data: &'a [u8],
    elem_size: usize,
    stride: usize,
    count: usize,
}

impl Indexer<'_> {
    pub fn count(&self) -> usize {
        self.count
    }

    /// Read the i-th element into a zero-initialized `T`. A `T` smaller than
    /// the element size truncates the element rather than failing.
    pub fn get<T: Pod>(&self, i: usize) -> T {
        assert!(i < self.count, "element index {i} out of range");
        let mut value = T::zeroed();
        let n = self.elem_size.min(std::mem::size_of::<T>());
        let start = i * self.stride;
        bytemuck::bytes_of_mut(&mut value)[..n].copy_from_slice(&self.data[start..start + n]);
        value
    }

    /// The i-th element widened to `u32`; handy for index buffers of any
    /// integer component type.
    pub fn get_u32(&self, i: usize) -> u32 {
        self.get::<u32>(i)
    }
}

impl Document {
    /// Push `count` source elements into the bytes behind an accessor.
    ///
    /// This is the only mutation path into buffer contents. The destination
    /// stride is the accessor's element size; when `src_stride` differs, the
    /// overlapping prefix of each element is copied and any destination tail
    /// is zero-filled.
    pub fn write_accessor(
        &mut self,
        accessor: Ref<Accessor>,
        count: usize,
        src: &[u8],
        src_stride: usize,
    ) -> Result<()> {
        let (view_ref, accessor_offset, dst_stride, accessor_id) = {
            let a = &self[accessor];
            (a.buffer_view, a.byte_offset, a.element_size(), a.id.clone())
        };
        let view_ref = view_ref.ok_or_else(|| {
            AssetError::invalid(format!("accessor \"{accessor_id}\" has no buffer view"))
        })?;
        let (buffer_ref, offset) = {
            let view = &self[view_ref];
            let buffer = view.buffer.ok_or_else(|| {
                AssetError::invalid(format!("buffer view \"{}\" has no buffer", view.id))
            })?;
            (buffer, accessor_offset + view.byte_offset)
        };

        let dst = self[buffer_ref].raw_bytes_mut();
        let end = offset + count * dst_stride;
        if end > dst.len() {
            return Err(AssetError::invalid(format!(
                "accessor \"{accessor_id}\" write of {count} elements exceeds its buffer"
            )));
        }
        copy_strided(count, src, src_stride, &mut dst[offset..end], dst_stride);
        Ok(())
    }
}

/// Strided element copy. Equal strides collapse to one contiguous copy;
/// otherwise the overlapping prefix moves per element and the destination
/// tail is zeroed.
fn copy_strided(count: usize, src: &[u8], src_stride: usize, dst: &mut [u8], dst_stride: usize) {
    if src_stride == dst_stride {
        dst[..count * src_stride].copy_from_slice(&src[..count * src_stride]);
        return;
    }
    let prefix = src_stride.min(dst_stride);
    for i in 0..count {
        let s = &src[i * src_stride..i * src_stride + prefix];
        let d = &mut dst[i * dst_stride..(i + 1) * dst_stride];
        d[..prefix].copy_from_slice(s);
        for byte in &mut d[prefix..] {
            *byte = 0;
        }
    }
}
