//! glTF fetching and decoding.
//!
//! Everything here is CPU work so it can run off the render loop. Uploading the result
//! to the GPU is done by [`crate::data_structures::model::ModelNode::from_asset`].

use anyhow::{Context, bail};
use base64::Engine as _;

use crate::resources::{Progress, load_binary, load_binary_with_progress, resolve};

/// A parsed glTF document with all buffers and images resolved.
#[derive(Debug)]
pub struct GltfAsset {
    pub name: String,
    pub document: gltf::Document,
    pub buffers: Vec<Vec<u8>>,
    pub images: Vec<image::RgbaImage>,
}

/// Fetch a `.gltf`/`.glb` file and everything it references.
///
/// `on_progress` reports the download of the document itself.
pub async fn load_gltf(
    source: &str,
    on_progress: impl FnMut(Progress),
) -> anyhow::Result<GltfAsset> {
    let bytes = load_binary_with_progress(source, on_progress)
        .await
        .with_context(|| format!("failed to fetch model {source}"))?;
    let gltf::Gltf { document, mut blob } =
        gltf::Gltf::from_slice(&bytes).with_context(|| format!("failed to parse model {source}"))?;

    // buffers and images are fetched concurrently, images only once all buffers are in
    let buffers = futures::future::try_join_all(document.buffers().map(|buffer| {
        let chunk = match buffer.source() {
            gltf::buffer::Source::Bin => blob.take(),
            gltf::buffer::Source::Uri(_) => None,
        };
        load_buffer(source, buffer, chunk)
    }))
    .await?;
    let images =
        futures::future::try_join_all(document.images().map(|image| load_image(source, image, &buffers)))
            .await?;

    Ok(GltfAsset {
        name: source.to_string(),
        document,
        buffers,
        images,
    })
}

async fn load_buffer(
    source: &str,
    buffer: gltf::Buffer<'_>,
    chunk: Option<Vec<u8>>,
) -> anyhow::Result<Vec<u8>> {
    let data = match buffer.source() {
        gltf::buffer::Source::Bin => {
            chunk.context("glTF buffer refers to a missing binary chunk")?
        }
        gltf::buffer::Source::Uri(uri) => fetch_uri(source, uri)
            .await
            .with_context(|| format!("failed to load buffer {}", buffer.index()))?,
    };
    if data.len() < buffer.length() {
        bail!(
            "buffer {} holds {} bytes but the document declares {}",
            buffer.index(),
            data.len(),
            buffer.length()
        );
    }
    Ok(data)
}

async fn load_image(
    source: &str,
    image: gltf::Image<'_>,
    buffers: &[Vec<u8>],
) -> anyhow::Result<image::RgbaImage> {
    let decoded = match image.source() {
        gltf::image::Source::View { view, mime_type: _ } => {
            let start = view.offset();
            let end = start + view.length();
            let bytes = buffers
                .get(view.buffer().index())
                .and_then(|buffer| buffer.get(start..end))
                .with_context(|| format!("image {} points outside its buffer", image.index()))?;
            image::load_from_memory(bytes)
                .with_context(|| format!("failed to decode image {}", image.index()))?
        }
        gltf::image::Source::Uri { uri, mime_type: _ } => {
            let data = fetch_uri(source, uri)
                .await
                .with_context(|| format!("failed to load image {}", image.index()))?;
            image::load_from_memory(&data)
                .with_context(|| format!("failed to decode image {}", image.index()))?
        }
    };
    Ok(decoded.to_rgba8())
}

/// Resolve a buffer or image URI: embedded `data:` URIs are decoded in place, anything
/// else is fetched relative to the document.
async fn fetch_uri(source: &str, uri: &str) -> anyhow::Result<Vec<u8>> {
    if uri.starts_with("data:") {
        return decode_data_uri(uri);
    }
    load_binary(&resolve(source, uri))
        .await
        .with_context(|| format!("failed to fetch {uri}"))
}

/// Decode a base64 `data:` URI as found in embedded glTF files.
pub fn decode_data_uri(uri: &str) -> anyhow::Result<Vec<u8>> {
    let Some(rest) = uri.strip_prefix("data:") else {
        bail!("not a data URI");
    };
    let (header, payload) = rest.split_once(',').context("data URI without payload")?;
    if !header.ends_with(";base64") {
        bail!("only base64 data URIs are supported, got '{header}'");
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("malformed base64 in data URI")
}
