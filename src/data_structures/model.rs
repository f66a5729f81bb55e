//! Drawable meshes and models.
//!
//! Loading a model is split in two halves. [`ModelData::from_scene`] walks an
//! imported [`SceneGraph`] and produces plain vertex/index lists plus the
//! texture references each mesh needs. [`Model::load`] then resolves those
//! references through a [`TextureCache`] and uploads every mesh to the GPU.

use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use crate::{
    data_structures::{
        buffer::{IndexBuffer, VertexBuffer},
        scene_graph::{ImportedMaterial, ImportedMesh, SceneGraph},
        texture::{MeshTexture, TextureError, TextureKind},
    },
    pipelines::{
        material::{MaterialBinding, MaterialLayout, UnitBinding},
        shader::ShaderProgram,
        uniform::UniformBlock,
    },
    resources::{ImportError, ImportOptions, import_scene, texture::TextureCache},
};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl ModelVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// A texture a mesh asks for, before it is loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureRequest {
    pub kind: TextureKind,
    /// Relative path or `*<index>` as found in the material.
    pub reference: String,
}

/// CPU side of one mesh, ready for upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub textures: Vec<TextureRequest>,
}

impl MeshData {
    /// Interleave the imported attributes and collect the material's textures.
    ///
    /// Missing normals become `+Z`, missing UVs become `(0, 0)`. Textures are
    /// requested slot by slot: diffuse, specular, then height as normal.
    pub fn from_imported(
        mesh: &ImportedMesh,
        materials: &[ImportedMaterial],
    ) -> Result<Self, ImportError> {
        let vertex_count = mesh.positions.len();
        let vertices = mesh
            .positions
            .iter()
            .enumerate()
            .map(|(i, position)| ModelVertex {
                position: *position,
                normal: mesh
                    .normals
                    .as_ref()
                    .and_then(|normals| normals.get(i).copied())
                    .unwrap_or([0.0, 0.0, 1.0]),
                tex_coords: mesh
                    .tex_coords
                    .as_ref()
                    .and_then(|uvs| uvs.get(i).copied())
                    .unwrap_or([0.0, 0.0]),
            })
            .collect();

        let indices: Vec<u32> = mesh.faces.iter().flatten().copied().collect();
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(ImportError::IndexOutOfRange {
                mesh: mesh.name.clone(),
                index,
                vertex_count,
            });
        }

        let material = match mesh.material {
            Some(index) => {
                let material = materials.get(index);
                if material.is_none() {
                    log::warn!("mesh {:?} uses unknown material {index}", mesh.name);
                }
                material
            }
            None => None,
        };
        let textures = material
            .map(|material| {
                [TextureKind::Diffuse, TextureKind::Specular, TextureKind::Normal]
                    .into_iter()
                    .flat_map(|kind| {
                        material.slot(kind).iter().map(move |reference| TextureRequest {
                            kind,
                            reference: reference.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name: mesh.name.clone(),
            vertices,
            indices,
            textures,
        })
    }
}

/// Every mesh of a scene in draw order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
}

impl ModelData {
    /// Flatten the scene depth-first from its root.
    ///
    /// Fails on scenes without a root, on nodes that point at missing meshes
    /// and on out-of-range indices. Meshes without faces are skipped, and a
    /// scene left with nothing to draw is [`ImportError::EmptyScene`].
    pub fn from_scene(scene: &SceneGraph) -> Result<Self, ImportError> {
        if scene.meshes.is_empty() {
            return Err(ImportError::EmptyScene);
        }
        if scene.root().is_none() {
            return Err(ImportError::NoRoot);
        }
        let mut meshes = Vec::new();
        for (_, node) in scene.depth_first() {
            for &index in &node.meshes {
                let mesh = scene
                    .meshes
                    .get(index)
                    .ok_or_else(|| ImportError::DanglingMesh {
                        node: node.name.clone(),
                        mesh: index,
                    })?;
                if mesh.faces.is_empty() {
                    log::warn!("skipping mesh {:?} without faces", mesh.name);
                    continue;
                }
                meshes.push(MeshData::from_imported(mesh, &scene.materials)?);
            }
        }
        if meshes.is_empty() {
            return Err(ImportError::EmptyScene);
        }
        Ok(Self { meshes })
    }
}

/// Draw commands a mesh needs, so drawing can be recorded without a GPU.
pub trait RenderCommands<'a> {
    fn use_program(&mut self, program: &'a ShaderProgram);
    fn bind_material(&mut self, bind_group: &'a wgpu::BindGroup);
    fn bind_vertices(&mut self, buffer: &'a VertexBuffer);
    fn bind_indices(&mut self, buffer: &'a IndexBuffer);
    fn draw_indexed(&mut self, indices: Range<u32>);

    /// Activate `program`, then draw `mesh` with it.
    fn draw_mesh(&mut self, mesh: &'a Mesh, program: &'a ShaderProgram) {
        self.use_program(program);
        self.draw_mesh_with_bound_program(mesh);
    }

    fn draw_mesh_with_bound_program(&mut self, mesh: &'a Mesh) {
        self.bind_material(&mesh.material.bind_group);
        self.bind_vertices(&mesh.vertex_buffer);
        self.bind_indices(&mesh.index_buffer);
        self.draw_indexed(0..mesh.num_elements);
    }

    /// Activate `program` once and draw every mesh in order.
    fn draw_model(&mut self, model: &'a Model, program: &'a ShaderProgram) {
        self.use_program(program);
        for mesh in &model.meshes {
            self.draw_mesh_with_bound_program(mesh);
        }
    }
}

impl<'a> RenderCommands<'a> for wgpu::RenderPass<'a> {
    fn use_program(&mut self, program: &'a ShaderProgram) {
        program.use_program(self);
    }

    fn bind_material(&mut self, bind_group: &'a wgpu::BindGroup) {
        self.set_bind_group(1, bind_group, &[]);
    }

    fn bind_vertices(&mut self, buffer: &'a VertexBuffer) {
        buffer.bind(self, 0);
    }

    fn bind_indices(&mut self, buffer: &'a IndexBuffer) {
        buffer.bind(self);
    }

    fn draw_indexed(&mut self, indices: Range<u32>) {
        wgpu::RenderPass::draw_indexed(self, indices, 0, 0..1);
    }
}

/// A mesh living on the GPU together with its material binding.
#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    vertices: Vec<ModelVertex>,
    indices: Vec<u32>,
    textures: Vec<MeshTexture>,
    vertex_buffer: VertexBuffer,
    index_buffer: IndexBuffer,
    num_elements: u32,
    material: MaterialBinding,
}

impl Mesh {
    /// Upload vertices and indices and bind `textures` to consecutive units.
    pub fn new(
        device: &wgpu::Device,
        material_layout: &MaterialLayout,
        name: impl Into<String>,
        vertices: Vec<ModelVertex>,
        indices: Vec<u32>,
        textures: Vec<MeshTexture>,
    ) -> Self {
        let name = name.into();
        let vertex_buffer = VertexBuffer::allocate_and_fill(
            device,
            &format!("{name:?} Vertex Buffer"),
            &vertices,
            wgpu::BufferUsages::empty(),
        );
        let index_buffer = IndexBuffer::allocate_and_fill(
            device,
            &format!("{name:?} Index Buffer"),
            &indices,
            wgpu::BufferUsages::empty(),
        );
        let material = material_layout.bind(device, &name, &textures);
        Self {
            num_elements: indices.len() as u32,
            name,
            vertices,
            indices,
            textures,
            vertex_buffer,
            index_buffer,
            material,
        }
    }

    pub fn from_data(
        device: &wgpu::Device,
        material_layout: &MaterialLayout,
        data: MeshData,
        textures: Vec<MeshTexture>,
    ) -> Self {
        Self::new(
            device,
            material_layout,
            data.name,
            data.vertices,
            data.indices,
            textures,
        )
    }

    /// Draw with `program`: one indexed draw over all indices.
    pub fn draw<'a>(&'a self, pass: &mut impl RenderCommands<'a>, program: &'a ShaderProgram) {
        pass.draw_mesh(self, program);
    }

    pub fn vertices(&self) -> &[ModelVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &[MeshTexture] {
        &self.textures
    }

    pub fn num_elements(&self) -> u32 {
        self.num_elements
    }

    /// Which unit and uniform each texture was assigned.
    pub fn texture_bindings(&self) -> &[UnitBinding] {
        &self.material.units
    }

    pub fn material_uniforms(&self) -> &UniformBlock {
        &self.material.uniforms
    }
}

#[derive(Debug)]
pub struct Model {
    pub meshes: Vec<Mesh>,
    base_dir: PathBuf,
    texture_errors: Vec<TextureError>,
}

impl Model {
    /// Import the file at `path`, load its textures and upload every mesh.
    ///
    /// Textures that fail to load are logged, left out of their mesh and
    /// kept in [`texture_errors`](Self::texture_errors).
    pub async fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &MaterialLayout,
        path: impl AsRef<Path>,
    ) -> Result<Self, ImportError> {
        let path = path.as_ref();
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let scene = import_scene(path, &ImportOptions::default()).await?;
        let data = ModelData::from_scene(&scene)?;

        let mut cache = TextureCache::new();
        let mut texture_errors = Vec::new();
        let mut meshes = Vec::with_capacity(data.meshes.len());
        for mesh in data.meshes {
            let mut textures = Vec::with_capacity(mesh.textures.len());
            for request in &mesh.textures {
                match cache
                    .load_reference(
                        device,
                        queue,
                        &request.reference,
                        request.kind,
                        &base_dir,
                        &scene.textures,
                    )
                    .await
                {
                    Ok(texture) => textures.push(texture),
                    Err(err) => {
                        log::error!("mesh {:?}: {err}", mesh.name);
                        texture_errors.push(err);
                    }
                }
            }
            meshes.push(Mesh::from_data(device, material_layout, mesh, textures));
        }

        log::info!(
            "loaded {} with {} meshes and {} textures",
            path.display(),
            meshes.len(),
            cache.len()
        );
        Ok(Self {
            meshes,
            base_dir,
            texture_errors,
        })
    }

    pub fn draw<'a>(&'a self, pass: &mut impl RenderCommands<'a>, program: &'a ShaderProgram) {
        pass.draw_model(self, program);
    }

    /// Directory relative texture paths were resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn texture_errors(&self) -> &[TextureError] {
        &self.texture_errors
    }
}

#[cfg(test)]
mod tests {
    use std::mem::{offset_of, size_of};

    use super::*;

    fn triangle() -> ImportedMesh {
        ImportedMesh {
            name: "triangle".into(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            faces: vec![[0, 1, 2]],
            ..Default::default()
        }
    }

    #[test]
    fn vertex_layout_matches_struct() {
        let desc = ModelVertex::desc();
        assert_eq!(desc.array_stride, size_of::<ModelVertex>() as u64);
        assert_eq!(size_of::<ModelVertex>(), 32);
        let offsets: Vec<_> = desc.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(
            offsets,
            vec![
                offset_of!(ModelVertex, position) as u64,
                offset_of!(ModelVertex, normal) as u64,
                offset_of!(ModelVertex, tex_coords) as u64,
            ]
        );
        let locations: Vec<_> = desc.attributes.iter().map(|a| a.shader_location).collect();
        assert_eq!(locations, vec![0, 1, 2]);
    }

    #[test]
    fn single_triangle_gives_sequential_indices() {
        let data = MeshData::from_imported(&triangle(), &[]).unwrap();
        assert_eq!(data.indices, vec![0, 1, 2]);
        assert_eq!(data.vertices.len(), 3);
    }

    #[test]
    fn missing_attributes_get_defaults() {
        let data = MeshData::from_imported(&triangle(), &[]).unwrap();
        assert!(data.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
        assert!(data.vertices.iter().all(|v| v.tex_coords == [0.0, 0.0]));
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let mut mesh = triangle();
        mesh.faces.push([0, 2, 3]);
        let err = MeshData::from_imported(&mesh, &[]).unwrap_err();
        assert!(matches!(
            err,
            ImportError::IndexOutOfRange {
                index: 3,
                vertex_count: 3,
                ..
            }
        ));
    }

    #[test]
    fn mesh_without_material_requests_no_textures() {
        let data = MeshData::from_imported(&triangle(), &[]).unwrap();
        assert!(data.textures.is_empty());

        let mut dangling = triangle();
        dangling.material = Some(4);
        let data = MeshData::from_imported(&dangling, &[]).unwrap();
        assert!(data.textures.is_empty());
    }

    #[test]
    fn textures_are_requested_slot_by_slot() {
        let materials = [ImportedMaterial {
            name: "brick".into(),
            diffuse: vec!["albedo.png".into(), "dirt.png".into()],
            specular: vec!["spec.png".into()],
            height: vec!["*0".into()],
        }];
        let mut mesh = triangle();
        mesh.material = Some(0);
        let data = MeshData::from_imported(&mesh, &materials).unwrap();
        let requested: Vec<_> = data
            .textures
            .iter()
            .map(|t| (t.kind, t.reference.as_str()))
            .collect();
        assert_eq!(
            requested,
            vec![
                (TextureKind::Diffuse, "albedo.png"),
                (TextureKind::Diffuse, "dirt.png"),
                (TextureKind::Specular, "spec.png"),
                (TextureKind::Normal, "*0"),
            ]
        );
    }

    #[test]
    fn scene_is_flattened_depth_first() {
        let mut scene = SceneGraph::new();
        for name in ["first", "second", "third"] {
            scene.meshes.push(ImportedMesh {
                name: name.into(),
                ..triangle()
            });
        }
        let root = scene.add_node("root", vec![]);
        let left = scene.add_node("left", vec![2]);
        let right = scene.add_node("right", vec![0]);
        let leaf = scene.add_node("leaf", vec![1]);
        scene.add_child(root, left);
        scene.add_child(root, right);
        scene.add_child(left, leaf);
        scene.set_root(root);

        let names: Vec<_> = ModelData::from_scene(&scene)
            .unwrap()
            .meshes
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["third", "second", "first"]);
    }

    #[test]
    fn meshes_without_faces_are_not_drawn() {
        let mut scene = SceneGraph::new();
        scene.meshes.push(ImportedMesh {
            name: "points".into(),
            positions: vec![[0.0, 0.0, 0.0]],
            ..Default::default()
        });
        scene.meshes.push(triangle());
        let root = scene.add_node("root", vec![0, 1]);
        scene.set_root(root);
        let data = ModelData::from_scene(&scene).unwrap();
        let names: Vec<_> = data.meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["triangle"]);

        let mut scene = SceneGraph::new();
        scene.meshes.push(ImportedMesh {
            name: "points".into(),
            positions: vec![[0.0, 0.0, 0.0]],
            ..Default::default()
        });
        let root = scene.add_node("root", vec![0]);
        scene.set_root(root);
        assert!(matches!(
            ModelData::from_scene(&scene),
            Err(ImportError::EmptyScene)
        ));
    }

    #[test]
    fn incomplete_scenes_are_errors() {
        let mut scene = SceneGraph::new();
        let root = scene.add_node("root", vec![]);
        scene.set_root(root);
        assert!(matches!(
            ModelData::from_scene(&scene),
            Err(ImportError::EmptyScene)
        ));

        let mut scene = SceneGraph::new();
        scene.meshes.push(triangle());
        scene.add_node("root", vec![0]);
        assert!(matches!(
            ModelData::from_scene(&scene),
            Err(ImportError::NoRoot)
        ));

        let mut scene = SceneGraph::new();
        scene.meshes.push(triangle());
        let root = scene.add_node("root", vec![7]);
        scene.set_root(root);
        assert!(matches!(
            ModelData::from_scene(&scene),
            Err(ImportError::DanglingMesh { mesh: 7, .. })
        ));
    }
}
