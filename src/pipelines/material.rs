//! Per-mesh material binding: texture units plus the `material.*` uniforms.
//!
//! A mesh's textures are assigned to consecutive texture units starting at
//! unit 0. Unit `u` lives at bind group 1, bindings `1 + 2u` (view) and
//! `2 + 2u` (sampler). The uniform struct at binding 0 tells the fragment
//! shader which unit holds which texture, e.g. `material.texture_diffuse1 = 0`.

use std::sync::Arc;

use crate::{
    data_structures::{
        buffer::UniformBuffer,
        texture::{MeshTexture, Texture, TextureKind, create_default_sampler},
    },
    pipelines::uniform::{UniformBlock, UniformKind, UniformLayout},
};

/// Texture units available to a single mesh.
pub const MAX_TEXTURE_UNITS: usize = 4;

/// Value of a `material.*` uniform whose texture is absent.
pub const NO_TEXTURE: i32 = -1;

/// Where one of a mesh's textures ends up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitBinding {
    pub unit: u32,
    pub kind: TextureKind,
    /// `material.<kind><n>`, `None` for kinds without a numbered uniform.
    pub uniform: Option<String>,
}

/// Assign units in order and number each kind independently from 1.
///
/// Textures past [`MAX_TEXTURE_UNITS`] are dropped with a warning.
pub fn assign_units(kinds: impl IntoIterator<Item = TextureKind>) -> Vec<UnitBinding> {
    let mut diffuse_nr = 1;
    let mut specular_nr = 1;
    let mut bindings = Vec::new();
    for (unit, kind) in kinds.into_iter().enumerate() {
        if unit >= MAX_TEXTURE_UNITS {
            log::warn!("mesh uses more than {MAX_TEXTURE_UNITS} textures, {kind:?} is not bound");
            continue;
        }
        let number = match kind {
            TextureKind::Diffuse => {
                diffuse_nr += 1;
                diffuse_nr - 1
            }
            TextureKind::Specular => {
                specular_nr += 1;
                specular_nr - 1
            }
            TextureKind::Normal => 0,
        };
        let uniform = kind
            .uniform_prefix()
            .map(|prefix| format!("material.{prefix}{number}"));
        bindings.push(UnitBinding {
            unit: unit as u32,
            kind,
            uniform,
        });
    }
    bindings
}

/// Everything bound at group 1 for one mesh.
#[derive(Debug)]
pub struct MaterialBinding {
    pub units: Vec<UnitBinding>,
    pub uniforms: UniformBlock,
    #[allow(unused)]
    buffer: UniformBuffer,
    pub bind_group: wgpu::BindGroup,
}

/// Shared layout of group 1 and the fallback bound to unused units.
#[derive(Debug)]
pub struct MaterialLayout {
    pub bind_group_layout: wgpu::BindGroupLayout,
    fallback: Arc<Texture>,
    sampler: wgpu::Sampler,
}

impl MaterialLayout {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        for unit in 0..MAX_TEXTURE_UNITS as u32 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1 + 2 * unit,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + 2 * unit,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &entries,
            label: Some("material_bind_group_layout"),
        });

        let fallback = Arc::new(Texture::create_solid(
            device,
            queue,
            [255, 255, 255, 255],
            "fallback white",
        ));

        Self {
            bind_group_layout,
            fallback,
            sampler: create_default_sampler(device),
        }
    }

    /// Layout of the WGSL `Material` struct in `frag.wgsl`: one int per unit
    /// and numbered kind, diffuse first.
    pub fn uniform_layout() -> UniformLayout {
        [TextureKind::Diffuse, TextureKind::Specular]
            .into_iter()
            .filter_map(TextureKind::uniform_prefix)
            .flat_map(|prefix| (1..=MAX_TEXTURE_UNITS).map(move |n| format!("material.{prefix}{n}")))
            .fold(UniformLayout::new(), |layout, name| {
                layout.field(&name, UniformKind::Int)
            })
    }

    /// Material uniforms with every slot marked as empty.
    pub fn empty_uniforms() -> UniformBlock {
        let layout = Self::uniform_layout();
        let names: Vec<String> = layout.fields().iter().map(|f| f.name.clone()).collect();
        let mut block = UniformBlock::new(layout);
        for name in names {
            block.set(&name, NO_TEXTURE);
        }
        block
    }

    /// Assign `textures` to units and build the bind group that carries them.
    pub fn bind(
        &self,
        device: &wgpu::Device,
        label: &str,
        textures: &[MeshTexture],
    ) -> MaterialBinding {
        let units = assign_units(textures.iter().map(|t| t.kind));

        let mut uniforms = Self::empty_uniforms();
        for binding in &units {
            if let Some(name) = &binding.uniform {
                uniforms.set(name, binding.unit as i32);
            }
        }
        let buffer = UniformBuffer::allocate_and_fill(
            device,
            &format!("{label} Material Buffer"),
            uniforms.bytes(),
            wgpu::BufferUsages::empty(),
        );

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }];
        for unit in 0..MAX_TEXTURE_UNITS {
            let texture: &Texture = textures
                .get(unit)
                .map(|t| t.texture.as_ref())
                .unwrap_or(self.fallback.as_ref());
            let sampler = texture.sampler.as_ref().unwrap_or(&self.sampler);
            entries.push(wgpu::BindGroupEntry {
                binding: 1 + 2 * unit as u32,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + 2 * unit as u32,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.bind_group_layout,
            entries: &entries,
            label: Some(&format!("{label} Material Bind Group")),
        });

        MaterialBinding {
            units,
            uniforms,
            buffer,
            bind_group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::uniform::UniformValue;

    #[test]
    fn no_textures_means_no_bindings() {
        assert!(assign_units([]).is_empty());
    }

    #[test]
    fn kinds_are_numbered_independently() {
        let bindings = assign_units([
            TextureKind::Diffuse,
            TextureKind::Specular,
            TextureKind::Diffuse,
            TextureKind::Normal,
        ]);
        let names: Vec<_> = bindings.iter().map(|b| b.uniform.as_deref()).collect();
        assert_eq!(
            names,
            vec![
                Some("material.texture_diffuse1"),
                Some("material.texture_specular1"),
                Some("material.texture_diffuse2"),
                None,
            ]
        );
        let units: Vec<_> = bindings.iter().map(|b| b.unit).collect();
        assert_eq!(units, vec![0, 1, 2, 3]);
    }

    #[test]
    fn textures_past_the_last_unit_are_dropped() {
        let bindings = assign_units([TextureKind::Diffuse; 6]);
        assert_eq!(bindings.len(), MAX_TEXTURE_UNITS);
        assert_eq!(
            bindings.last().and_then(|b| b.uniform.clone()).as_deref(),
            Some("material.texture_diffuse4")
        );
    }

    #[test]
    fn empty_material_marks_every_slot_absent() {
        let block = MaterialLayout::empty_uniforms();
        assert_eq!(block.bytes().len(), 4 * 2 * MAX_TEXTURE_UNITS);
        for field in block.layout().fields() {
            assert_eq!(block.get(&field.name), Some(UniformValue::Int(NO_TEXTURE)));
        }
    }

    #[test]
    fn every_assignable_uniform_is_in_the_layout() {
        for kind in [TextureKind::Diffuse, TextureKind::Specular] {
            let mut block = MaterialLayout::empty_uniforms();
            for binding in assign_units([kind; MAX_TEXTURE_UNITS]) {
                let name = binding.uniform.unwrap();
                assert!(block.set(&name, binding.unit as i32), "{name}");
                assert_eq!(block.get(&name), Some(UniformValue::Int(binding.unit as i32)));
            }
        }
    }
}
