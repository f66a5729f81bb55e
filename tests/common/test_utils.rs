use std::path::{Path, PathBuf};

/// A scratch directory under the system temp dir, removed on drop.
pub(crate) struct Fixture {
    dir: PathBuf,
}

impl Fixture {
    pub fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("pbr-demo-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("failed to create fixture dir");
        Self { dir }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `contents` to `file` and return its full path.
    pub fn write(&self, file: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(file);
        std::fs::write(&path, contents).expect("failed to write fixture");
        path
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// A device without a surface. `None` when the machine has no adapter.
#[cfg(feature = "integration-tests")]
pub(crate) async fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = match instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
    {
        Ok(adapter) => adapter,
        Err(e) => {
            eprintln!("skipping, no graphics adapter: {e}");
            return None;
        }
    };
    let required_features = adapter.features() & wgpu::Features::POLYGON_MODE_LINE;
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("test device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        })
        .await
        .expect("failed to open the device");
    Some((device, queue))
}

/// A small PNG with a checker pattern.
pub(crate) fn checker_png() -> Vec<u8> {
    let image = image::RgbaImage::from_fn(4, 4, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([0, 0, 0, 255])
        }
    });
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("failed to encode png");
    bytes.into_inner()
}

/// A glTF scene with one triangle under a nested node. Its material's base
/// colour is a PNG stored in `scene.bin`, which is also returned.
pub(crate) fn gltf_fixture(fixture: &Fixture) -> (PathBuf, Vec<u8>) {
    let png = checker_png();

    let mut bin = Vec::new();
    for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for c in p {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    for i in [0u16, 1, 2] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    // keep the image view four-byte aligned
    bin.extend_from_slice(&[0, 0]);
    let image_offset = bin.len();
    bin.extend_from_slice(&png);
    fixture.write("scene.bin", &bin);

    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [
    {{ "name": "parent", "children": [1] }},
    {{ "name": "child", "mesh": 0 }}
  ],
  "meshes": [{{
    "name": "tri",
    "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }}]
  }}],
  "materials": [{{ "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }} }} }}],
  "textures": [{{ "source": 0 }}],
  "images": [{{ "bufferView": 2, "mimeType": "image/png" }}],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }},
    {{ "buffer": 0, "byteOffset": {image_offset}, "byteLength": {image_len} }}
  ],
  "buffers": [{{ "uri": "scene.bin", "byteLength": {buffer_len} }}]
}}"#,
        image_len = png.len(),
        buffer_len = bin.len(),
    );
    (fixture.write("scene.gltf", json), png)
}
