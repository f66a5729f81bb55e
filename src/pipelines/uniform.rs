//! Named, typed uniform values packed into WGSL uniform-buffer layout.
//!
//! A [`UniformLayout`] mirrors a WGSL `struct` declared in the shader source:
//! each field has a name, a type and a byte offset computed with the WGSL
//! alignment rules for the `uniform` address space. A [`UniformBlock`] holds
//! the CPU-side bytes for one such struct; values are written by name and
//! copied to the GPU in one go.

use cgmath::{Matrix4, Vector2, Vector3};

/// The closed set of types a uniform can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Float,
    Vec2,
    Vec3,
    Mat4,
}

impl UniformKind {
    /// (alignment, size) in bytes, per WGSL host-shareable layout rules.
    fn align_and_size(self) -> (u64, u64) {
        match self {
            UniformKind::Int | UniformKind::Float => (4, 4),
            UniformKind::Vec2 => (8, 8),
            UniformKind::Vec3 => (16, 12),
            UniformKind::Mat4 => (16, 64),
        }
    }
}

/// A value to upload. Booleans travel as `Int`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn write_to(&self, dst: &mut [u8]) {
        let bytes: &[u8] = match self {
            UniformValue::Int(v) => bytemuck::bytes_of(v),
            UniformValue::Float(v) => bytemuck::bytes_of(v),
            UniformValue::Vec2(v) => bytemuck::bytes_of(v),
            UniformValue::Vec3(v) => bytemuck::bytes_of(v),
            UniformValue::Mat4(v) => bytemuck::bytes_of(v),
        };
        dst[..bytes.len()].copy_from_slice(bytes);
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}
impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        UniformValue::Int(v as i32)
    }
}
impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Int(v as i32)
    }
}
impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}
impl From<Vector2<f32>> for UniformValue {
    fn from(v: Vector2<f32>) -> Self {
        UniformValue::Vec2(v.into())
    }
}
impl From<Vector3<f32>> for UniformValue {
    fn from(v: Vector3<f32>) -> Self {
        UniformValue::Vec3(v.into())
    }
}
impl From<Matrix4<f32>> for UniformValue {
    fn from(v: Matrix4<f32>) -> Self {
        UniformValue::Mat4(v.into())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UniformField {
    pub name: String,
    pub kind: UniformKind,
    pub offset: u64,
}

/// Field table of one WGSL uniform struct.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    end: u64,
    align: u64,
}

impl UniformLayout {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            end: 0,
            align: 16,
        }
    }

    /// Append a field. Its offset is the next properly aligned position.
    pub fn field(mut self, name: &str, kind: UniformKind) -> Self {
        let (align, size) = kind.align_and_size();
        let offset = self.end.next_multiple_of(align);
        self.fields.push(UniformField {
            name: name.to_string(),
            kind,
            offset,
        });
        self.end = offset + size;
        self.align = self.align.max(align);
        self
    }

    pub fn find(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    /// Struct size rounded up to its alignment (at least 16 bytes).
    pub fn size(&self) -> u64 {
        self.end.next_multiple_of(self.align).max(16)
    }
}

impl Default for UniformLayout {
    fn default() -> Self {
        Self::new()
    }
}

/// CPU copy of a uniform struct, written by field name.
#[derive(Clone, Debug)]
pub struct UniformBlock {
    layout: UniformLayout,
    data: Vec<u8>,
    dirty: bool,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let data = vec![0; layout.size() as usize];
        Self {
            layout,
            data,
            dirty: true,
        }
    }

    /// Store `value` under `name`.
    ///
    /// Unknown names and type mismatches are ignored, as a graphics API would
    /// ignore an unresolved uniform location. Returns whether the value was
    /// stored.
    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> bool {
        let value = value.into();
        let Some(field) = self.layout.find(name) else {
            log::debug!("ignoring unknown uniform {name:?}");
            return false;
        };
        if field.kind != value.kind() {
            log::warn!(
                "ignoring uniform {name:?}: expected {:?}, got {:?}",
                field.kind,
                value.kind()
            );
            return false;
        }
        let offset = field.offset as usize;
        value.write_to(&mut self.data[offset..]);
        self.dirty = true;
        true
    }

    /// Read a field back, mostly useful for tests and debugging.
    pub fn get(&self, name: &str) -> Option<UniformValue> {
        let field = self.layout.find(name)?;
        let at = field.offset as usize;
        let slice = &self.data[at..];
        let value = match field.kind {
            UniformKind::Int => UniformValue::Int(bytemuck::pod_read_unaligned(&slice[..4])),
            UniformKind::Float => UniformValue::Float(bytemuck::pod_read_unaligned(&slice[..4])),
            UniformKind::Vec2 => UniformValue::Vec2(bytemuck::pod_read_unaligned(&slice[..8])),
            UniformKind::Vec3 => UniformValue::Vec3(bytemuck::pod_read_unaligned(&slice[..12])),
            UniformKind::Mat4 => UniformValue::Mat4(bytemuck::pod_read_unaligned(&slice[..64])),
        };
        Some(value)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// Returns the bytes if anything changed since the last call.
    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if self.dirty {
            self.dirty = false;
            Some(&self.data)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::SquareMatrix;

    use super::*;

    #[test]
    fn offsets_follow_wgsl_alignment() {
        let layout = UniformLayout::new()
            .field("a", UniformKind::Float)
            .field("b", UniformKind::Vec3)
            .field("c", UniformKind::Vec2)
            .field("d", UniformKind::Mat4)
            .field("e", UniformKind::Int);
        let offsets: Vec<_> = layout.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 16, 32, 48, 112]);
        assert_eq!(layout.size(), 128);
    }

    #[test]
    fn vec3_followed_by_scalar_shares_the_slot() {
        let layout = UniformLayout::new()
            .field("position", UniformKind::Vec3)
            .field("intensity", UniformKind::Float);
        assert_eq!(layout.find("intensity").unwrap().offset, 12);
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn small_structs_are_padded_to_sixteen_bytes() {
        let layout = UniformLayout::new().field("unit", UniformKind::Int);
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn values_are_written_at_their_offset() {
        let mut block = UniformBlock::new(
            UniformLayout::new()
                .field("view", UniformKind::Mat4)
                .field("unit", UniformKind::Int),
        );
        assert!(block.set("unit", 3i32));
        assert!(block.set("view", Matrix4::<f32>::identity()));
        assert_eq!(&block.bytes()[64..68], &3i32.to_ne_bytes());
        assert_eq!(&block.bytes()[0..4], &1.0f32.to_ne_bytes());
        assert_eq!(block.get("unit"), Some(UniformValue::Int(3)));
    }

    #[test]
    fn booleans_are_uploaded_as_ints() {
        let mut block = UniformBlock::new(UniformLayout::new().field("flag", UniformKind::Int));
        assert!(block.set("flag", true));
        assert_eq!(block.get("flag"), Some(UniformValue::Int(1)));
    }

    #[test]
    fn unknown_names_and_mismatched_types_are_ignored() {
        let mut block = UniformBlock::new(UniformLayout::new().field("scale", UniformKind::Float));
        let before = block.bytes().to_vec();
        assert!(!block.set("material.texture_diffuse7", 1i32));
        assert!(!block.set("scale", 2i32));
        assert_eq!(block.bytes(), &before[..]);
    }

    #[test]
    fn dirty_flag_tracks_writes() {
        let mut block = UniformBlock::new(UniformLayout::new().field("t", UniformKind::Float));
        assert!(block.take_dirty().is_some());
        assert!(block.take_dirty().is_none());
        block.set("t", 0.5f32);
        assert!(block.take_dirty().is_some());
    }
}
