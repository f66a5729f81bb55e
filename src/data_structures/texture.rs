//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around a WGPU texture with its
//! view and sampler, plus the helpers that turn decoded images into mipmapped
//! GPU textures.

use std::{path::PathBuf, sync::Arc};

use image::{GenericImageView, ImageFormat, RgbaImage, imageops::FilterType};
use thiserror::Error;

/// What a texture means to the material that references it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    /// Filled from the importer's height/bump slot.
    Normal,
}

impl TextureKind {
    /// Prefix of the numbered material uniform (`material.<prefix><n>`).
    ///
    /// Normal maps are bound to a unit but have no numbered uniform.
    pub fn uniform_prefix(self) -> Option<&'static str> {
        match self {
            TextureKind::Diffuse => Some("texture_diffuse"),
            TextureKind::Specular => Some("texture_specular"),
            TextureKind::Normal => None,
        }
    }

    pub fn color_space(self) -> ColorSpace {
        match self {
            TextureKind::Diffuse => ColorSpace::Srgb,
            TextureKind::Specular | TextureKind::Normal => ColorSpace::Linear,
        }
    }
}

/// Colour space a texture is sampled in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Srgb,
    Linear,
}

impl ColorSpace {
    fn format(self) -> wgpu::TextureFormat {
        match self {
            ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

/// Where a texture's pixels come from. Together with the colour space this is
/// the texture cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureSource {
    /// A file on disk, already resolved against the model directory.
    File(PathBuf),
    /// Index into the scene's embedded texture list (`*<index>`).
    Embedded(usize),
}

/// A texture as seen by one mesh: what it means, where it came from and the
/// shared GPU handle.
#[derive(Clone, Debug)]
pub struct MeshTexture {
    pub kind: TextureKind,
    pub source: TextureSource,
    pub texture: Arc<Texture>,
}

/// Failure to produce a single texture. Never fatal for the model as a whole.
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("could not read texture file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode texture {label}")]
    Decode {
        label: String,
        #[source]
        source: image::ImageError,
    },
    #[error("raw texture {label} is {actual} bytes but {width}x{height} RGBA needs {expected}")]
    RawSize {
        label: String,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("embedded texture *{0} does not exist in the scene")]
    MissingEmbedded(usize),
    #[error("texture reference {0:?} is not supported")]
    Unsupported(String),
}

/// A GPU texture with a view and optional sampler.
///
/// Wraps WGPU texture objects along with associated views and samplers.
/// Colour textures are created via [`from_bytes`](Self::from_bytes) or
/// [`from_rgba`](Self::from_rgba) and always carry a full mip chain.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// Create a 1x1 texture of a single colour. Fills the material units a
    /// mesh does not use.
    pub fn create_solid(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [u8; 4],
        label: &str,
    ) -> Texture {
        let image = RgbaImage::from_pixel(1, 1, image::Rgba(rgba));
        Self::from_rgba_image(device, queue, &image, Some(label), ColorSpace::Linear)
    }

    /// Load a texture from compressed image data (PNG, JPEG, ...).
    ///
    /// # Arguments
    ///
    /// * `bytes` represent raw image file data
    /// * `label` is used as a debug name for the GPU resource
    /// * `format` is an optional file extension hint (e.g., "png"). If None or
    ///   unknown, the format is guessed from the data.
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        format: Option<&str>,
        color_space: ColorSpace,
    ) -> Result<Self, TextureError> {
        let img = decode(bytes, label, format)?;
        Ok(Self::from_image(device, queue, &img, Some(label), color_space))
    }

    /// Upload uncompressed, tightly packed RGBA8 pixels.
    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        pixels: &[u8],
        label: &str,
        color_space: ColorSpace,
    ) -> Result<Self, TextureError> {
        let image = raw_rgba_image(width, height, pixels, label)?;
        Ok(Self::from_rgba_image(
            device,
            queue,
            &image,
            Some(label),
            color_space,
        ))
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: Option<&str>,
        color_space: ColorSpace,
    ) -> Self {
        let (width, height) = img.dimensions();
        log::debug!("uploading {:?} ({width}x{height})", label.unwrap_or("texture"));
        Self::from_rgba_image(device, queue, &img.to_rgba8(), label, color_space)
    }

    fn from_rgba_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &RgbaImage,
        label: Option<&str>,
        color_space: ColorSpace,
    ) -> Self {
        let levels = mip_chain(rgba);
        let size = wgpu::Extent3d {
            width: rgba.width(),
            height: rgba.height(),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: color_space.format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (mip_level, level) in levels.iter().enumerate() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: mip_level as u32,
                    origin: wgpu::Origin3d::ZERO,
                },
                level.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * level.width()),
                    rows_per_image: Some(level.height()),
                },
                wgpu::Extent3d {
                    width: level.width(),
                    height: level.height(),
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_default_sampler(device));

        Self {
            texture,
            view,
            sampler,
        }
    }
}

/// Repeat on both axes, linear magnification, linear-mipmap-linear minification.
pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Decode compressed image bytes, optionally using a file extension as hint.
pub fn decode(
    bytes: &[u8],
    label: &str,
    format: Option<&str>,
) -> Result<image::DynamicImage, TextureError> {
    let decoded = match format.and_then(ImageFormat::from_extension) {
        Some(fmt) => image::load_from_memory_with_format(bytes, fmt),
        None => image::load_from_memory(bytes),
    };
    decoded.map_err(|source| TextureError::Decode {
        label: label.to_string(),
        source,
    })
}

/// Validate and wrap tightly packed RGBA8 pixels.
pub fn raw_rgba_image(
    width: u32,
    height: u32,
    pixels: &[u8],
    label: &str,
) -> Result<RgbaImage, TextureError> {
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected || expected == 0 {
        return Err(TextureError::RawSize {
            label: label.to_string(),
            width,
            height,
            expected,
            actual: pixels.len(),
        });
    }
    RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or_else(|| TextureError::RawSize {
        label: label.to_string(),
        width,
        height,
        expected,
        actual: pixels.len(),
    })
}

/// Number of mip levels down to and including 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// The image itself followed by every downsampled level until 1x1.
///
/// wgpu does not generate mipmaps, so the levels are filtered on the CPU.
pub fn mip_chain(base: &RgbaImage) -> Vec<RgbaImage> {
    let count = mip_level_count(base.width(), base.height()) as usize;
    let mut levels = Vec::with_capacity(count);
    levels.push(base.clone());
    while levels.len() < count {
        let Some(previous) = levels.last() else { break };
        let width = (previous.width() / 2).max(1);
        let height = (previous.height() / 2).max(1);
        let next = image::imageops::resize(previous, width, height, FilterType::Triangle);
        levels.push(next);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_count_covers_down_to_one_pixel() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(256, 16), 9);
        assert_eq!(mip_level_count(5, 3), 3);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn mip_chain_halves_each_axis_independently() {
        let base = RgbaImage::from_pixel(8, 2, image::Rgba([10, 20, 30, 255]));
        let dims: Vec<_> = mip_chain(&base).iter().map(|l| l.dimensions()).collect();
        assert_eq!(dims, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
    }

    #[test]
    fn mip_chain_keeps_solid_colours() {
        let base = RgbaImage::from_pixel(4, 4, image::Rgba([200, 100, 50, 255]));
        let last = mip_chain(&base).pop().unwrap();
        assert_eq!(last.get_pixel(0, 0), &image::Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn raw_pixels_must_match_dimensions() {
        assert!(raw_rgba_image(2, 2, &[0; 16], "ok").is_ok());
        let err = raw_rgba_image(2, 2, &[0; 12], "short").unwrap_err();
        assert!(matches!(err, TextureError::RawSize { expected: 16, actual: 12, .. }));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode(b"definitely not a png", "junk", Some("png")).unwrap_err();
        assert!(matches!(err, TextureError::Decode { .. }));
    }

    #[test]
    fn only_colour_maps_are_srgb() {
        assert_eq!(TextureKind::Diffuse.color_space(), ColorSpace::Srgb);
        assert_eq!(TextureKind::Specular.color_space(), ColorSpace::Linear);
        assert_eq!(TextureKind::Normal.uniform_prefix(), None);
    }
}
