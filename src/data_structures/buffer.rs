//! Move-only GPU buffer handles.
//!
//! Every [`GpuBuffer`] owns exactly one `wgpu::Buffer`. The handle is not
//! `Clone`, so a buffer can only change hands by moving the wrapper, and the
//! GPU memory is released once, when the last owner drops it (or earlier via
//! [`GpuBuffer::release`]).
//!
//! The buffer kind is a zero-sized marker so that a vertex buffer can never be
//! bound where an index buffer is expected.

use std::marker::PhantomData;

use wgpu::util::DeviceExt;

/// Marker describing what a buffer is used for on the GPU.
pub trait BufferKind {
    /// Usage flags every buffer of this kind is created with.
    const USAGE: wgpu::BufferUsages;
}

#[derive(Debug)]
pub struct Vertices;
#[derive(Debug)]
pub struct Indices;
#[derive(Debug)]
pub struct Uniforms;

impl BufferKind for Vertices {
    const USAGE: wgpu::BufferUsages = wgpu::BufferUsages::VERTEX;
}
impl BufferKind for Indices {
    const USAGE: wgpu::BufferUsages = wgpu::BufferUsages::INDEX;
}
impl BufferKind for Uniforms {
    const USAGE: wgpu::BufferUsages = wgpu::BufferUsages::UNIFORM;
}

pub type VertexBuffer = GpuBuffer<Vertices>;
pub type IndexBuffer = GpuBuffer<Indices>;
pub type UniformBuffer = GpuBuffer<Uniforms>;

/// Unique owner of a single GPU buffer.
///
/// No bounds checking happens here: callers of [`fill`](Self::fill) guarantee
/// that `offset + data.len()` fits into the allocation.
#[derive(Debug)]
pub struct GpuBuffer<K: BufferKind> {
    buffer: wgpu::Buffer,
    _kind: PhantomData<K>,
}

impl<K: BufferKind> GpuBuffer<K> {
    /// Reserve `size` bytes of storage without uploading anything.
    ///
    /// `usage` is an additional hint on top of the kind's own usage, e.g.
    /// `COPY_SRC` for buffers that are read back in tests.
    pub fn allocate(
        device: &wgpu::Device,
        label: &str,
        size: wgpu::BufferAddress,
        usage: wgpu::BufferUsages,
    ) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: K::USAGE | wgpu::BufferUsages::COPY_DST | usage,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            _kind: PhantomData,
        }
    }

    /// Allocate exactly enough storage for `data` and upload it in one go.
    pub fn allocate_and_fill<T: bytemuck::Pod>(
        device: &wgpu::Device,
        label: &str,
        data: &[T],
        usage: wgpu::BufferUsages,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(data),
            usage: K::USAGE | wgpu::BufferUsages::COPY_DST | usage,
        });
        Self {
            buffer,
            _kind: PhantomData,
        }
    }

    /// Overwrite a sub-range starting at `offset` bytes.
    ///
    /// The write is queued and lands before the next submitted command buffer.
    pub fn fill<T: bytemuck::Pod>(
        &self,
        queue: &wgpu::Queue,
        offset: wgpu::BufferAddress,
        data: &[T],
    ) {
        queue.write_buffer(&self.buffer, offset, bytemuck::cast_slice(data));
    }

    /// Same as [`fill`](Self::fill) for data that is already raw bytes.
    pub fn fill_bytes(&self, queue: &wgpu::Queue, offset: wgpu::BufferAddress, data: &[u8]) {
        queue.write_buffer(&self.buffer, offset, data);
    }

    /// The underlying buffer, e.g. as a copy source.
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn size(&self) -> wgpu::BufferAddress {
        self.buffer.size()
    }

    pub fn slice(&self) -> wgpu::BufferSlice<'_> {
        self.buffer.slice(..)
    }

    pub fn as_entire_binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }

    /// Free the GPU memory now instead of waiting for the drop.
    pub fn release(self) {
        self.buffer.destroy();
    }
}

impl VertexBuffer {
    /// Make this the vertex source for subsequent draws on `pass`.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>, slot: u32) {
        pass.set_vertex_buffer(slot, self.slice());
    }
}

impl IndexBuffer {
    /// Make this the index source for subsequent indexed draws on `pass`.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_index_buffer(self.slice(), wgpu::IndexFormat::Uint32);
    }
}
