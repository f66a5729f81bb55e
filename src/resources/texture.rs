use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::data_structures::{
    scene_graph::EmbeddedTexture,
    texture::{ColorSpace, MeshTexture, Texture, TextureError, TextureKind, TextureSource},
};

/// Turn a material texture reference into a source.
///
/// `*<index>` names an embedded texture. Anything else is a path relative to
/// `base_dir`; Windows separators are accepted. `data:` URIs are rejected.
pub fn resolve_reference(reference: &str, base_dir: &Path) -> Result<TextureSource, TextureError> {
    if let Some(index) = reference.strip_prefix('*') {
        return index
            .parse()
            .map(TextureSource::Embedded)
            .map_err(|_| TextureError::Unsupported(reference.to_string()));
    }
    if reference.starts_with("data:") || reference.is_empty() {
        return Err(TextureError::Unsupported(reference.to_string()));
    }
    let relative: PathBuf = reference.split(['/', '\\']).collect();
    Ok(TextureSource::File(base_dir.join(relative)))
}

/// Loaded textures, shared between every mesh that references them.
///
/// Entries are keyed by source and colour space, so the same file used as a
/// diffuse and as a specular map is uploaded twice, once per format.
#[derive(Debug, Default)]
pub struct TextureCache {
    textures: HashMap<(TextureSource, ColorSpace), Arc<Texture>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Resolve `reference` and load it as a texture of `kind`.
    pub async fn load_reference(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        reference: &str,
        kind: TextureKind,
        base_dir: &Path,
        embedded: &[EmbeddedTexture],
    ) -> Result<MeshTexture, TextureError> {
        let source = resolve_reference(reference, base_dir)?;
        let texture = self.load(device, queue, &source, kind, embedded).await?;
        Ok(MeshTexture {
            kind,
            source,
            texture,
        })
    }

    /// Return the cached texture for `source` or decode and upload it.
    pub async fn load(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        source: &TextureSource,
        kind: TextureKind,
        embedded: &[EmbeddedTexture],
    ) -> Result<Arc<Texture>, TextureError> {
        let color_space = kind.color_space();
        let key = (source.clone(), color_space);
        if let Some(texture) = self.textures.get(&key) {
            log::debug!("reusing texture {source:?}");
            return Ok(texture.clone());
        }

        let texture = match source {
            TextureSource::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| TextureError::Io {
                        path: path.clone(),
                        source,
                    })?;
                let label = path.display().to_string();
                let extension = path.extension().and_then(|ext| ext.to_str());
                Texture::from_bytes(device, queue, &bytes, &label, extension, color_space)?
            }
            TextureSource::Embedded(index) => {
                let blob = embedded
                    .get(*index)
                    .ok_or(TextureError::MissingEmbedded(*index))?;
                let label = format!("*{index}");
                if blob.is_compressed() {
                    Texture::from_bytes(
                        device,
                        queue,
                        &blob.data,
                        &label,
                        blob.format_hint.as_deref(),
                        color_space,
                    )?
                } else {
                    Texture::from_rgba(
                        device,
                        queue,
                        blob.width,
                        blob.height,
                        &blob.data,
                        &label,
                        color_space,
                    )?
                }
            }
        };

        let texture = Arc::new(texture);
        self.textures.insert(key, texture.clone());
        Ok(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_references_are_embedded() {
        assert_eq!(
            resolve_reference("*3", Path::new("models")).unwrap(),
            TextureSource::Embedded(3)
        );
        assert!(matches!(
            resolve_reference("*x", Path::new("models")),
            Err(TextureError::Unsupported(_))
        ));
    }

    #[test]
    fn plain_names_resolve_against_the_model_directory() {
        assert_eq!(
            resolve_reference("textures\\wall.png", Path::new("assets/models")).unwrap(),
            TextureSource::File(PathBuf::from("assets/models/textures/wall.png"))
        );
        assert_eq!(
            resolve_reference("wall.png", Path::new("")).unwrap(),
            TextureSource::File(PathBuf::from("wall.png"))
        );
    }

    #[test]
    fn data_uris_are_not_supported() {
        assert!(matches!(
            resolve_reference("data:image/png;base64,AAAA", Path::new(".")),
            Err(TextureError::Unsupported(_))
        ));
    }
}
