//! Accessor and texture uploads. Each pass is all-or-nothing: a failure
//! deletes everything the pass created before the error is returned.

use image::{DynamicImage, ImageBuffer, ImageFormat, RgbaImage};

use crate::device::{BufferHandle, Device, TextureDescriptor, TextureHandle};
use crate::error::{ConfigurationError, DecodeError, Error, ResourceError, ResourceKind};
use crate::model::Diagnostic;
use crate::scene::{BufferTarget, Image, PixelFormat, Scene};

/// Handles created by an unfinished upload pass. Dropping the batch without
/// committing it deletes them.
struct Batch<'a, H: Copy> {
    device: &'a dyn Device,
    handles: Vec<Option<H>>,
    release: fn(&dyn Device, H),
}

impl<'a, H: Copy> Batch<'a, H> {
    fn new(device: &'a dyn Device, release: fn(&dyn Device, H)) -> Batch<'a, H> {
        Batch {
            device,
            handles: Vec::new(),
            release,
        }
    }

    fn push(&mut self, handle: Option<H>) {
        self.handles.push(handle);
    }

    fn commit(mut self) -> Vec<Option<H>> {
        std::mem::take(&mut self.handles)
    }
}

impl<H: Copy> Drop for Batch<'_, H> {
    fn drop(&mut self) {
        for handle in self.handles.drain(..).flatten() {
            (self.release)(self.device, handle);
        }
    }
}

/// The buffer role of every accessor. Undeclared roles become index data when
/// a primitive uses the accessor as indices and vertex data otherwise; each
/// such guess is reported as a [`Diagnostic`].
pub(crate) fn buffer_roles(scene: &Scene) -> (Vec<BufferTarget>, Vec<Diagnostic>) {
    let mut used_as_indices = vec![false; scene.accessors.len()];
    for primitive in scene.meshes.iter().flat_map(|mesh| &mesh.primitives) {
        if let Some(flag) = primitive.indices.and_then(|i| used_as_indices.get_mut(i)) {
            *flag = true;
        }
    }

    let mut diagnostics = Vec::new();
    let roles = scene
        .accessors
        .iter()
        .enumerate()
        .map(|(index, accessor)| {
            let Some(view) = accessor.buffer_view.and_then(|v| scene.buffer_views.get(v)) else {
                return BufferTarget::ArrayBuffer;
            };
            if let Some(target) = view.target {
                return target;
            }
            let assumed = if used_as_indices[index] {
                BufferTarget::ElementArrayBuffer
            } else {
                BufferTarget::ArrayBuffer
            };
            let diagnostic = Diagnostic::UndeclaredBufferTarget {
                accessor: index,
                assumed,
            };
            log::warn!("{diagnostic}");
            diagnostics.push(diagnostic);
            assumed
        })
        .collect();
    (roles, diagnostics)
}

/// Uploads every accessor with data into its own buffer. The result is
/// indexed by accessor; accessors without data get `None`.
pub(crate) fn upload_accessors(
    device: &dyn Device,
    scene: &Scene,
    roles: &[BufferTarget],
) -> Result<Vec<Option<BufferHandle>>, Error> {
    let mut batch = Batch::new(device, |device, buffer| device.delete_buffer(buffer));
    for (index, &role) in roles.iter().enumerate() {
        let Some(bytes) = scene.accessor_bytes(index)? else {
            batch.push(None);
            continue;
        };
        let buffer = device
            .create_buffer(role, &bytes)
            .map_err(|source| ResourceError {
                kind: ResourceKind::Buffer,
                index,
                source,
            })?;
        log::trace!("accessor {index}: {} bytes as {role:?}", bytes.len());
        batch.push(Some(buffer));
    }
    Ok(batch.commit())
}

/// Decodes and uploads every texture, indexed like `scene.textures`.
pub(crate) fn upload_textures(
    device: &dyn Device,
    scene: &Scene,
) -> Result<Vec<TextureHandle>, Error> {
    let mut batch = Batch::new(device, |device, texture| device.delete_texture(texture));
    for (index, texture) in scene.textures.iter().enumerate() {
        let image = scene
            .images
            .get(texture.source)
            .ok_or(ConfigurationError::DanglingIndex {
                kind: "image",
                index: texture.source,
            })?;
        let pixels = decode(image).map_err(|(reason, source)| DecodeError {
            texture: index,
            image: texture.source,
            reason,
            source,
        })?;

        let sampler = texture
            .sampler
            .and_then(|sampler| scene.samplers.get(sampler))
            .copied()
            .unwrap_or_default();
        let min_filter = sampler.resolved_min_filter();
        let descriptor = TextureDescriptor {
            width: pixels.width(),
            height: pixels.height(),
            min_filter,
            mag_filter: sampler.resolved_mag_filter(),
            wrap_s: sampler.wrap_s,
            wrap_t: sampler.wrap_t,
            generate_mipmaps: min_filter.uses_mipmaps(),
        };
        let handle = device
            .create_texture(&descriptor, pixels.as_raw())
            .map_err(|source| ResourceError {
                kind: ResourceKind::Texture,
                index,
                source,
            })?;
        log::trace!(
            "texture {index}: {}x{}, mipmaps: {}",
            descriptor.width,
            descriptor.height,
            descriptor.generate_mipmaps
        );
        batch.push(Some(handle));
    }
    Ok(batch.commit().into_iter().flatten().collect())
}

type DecodeFailure = (String, Option<image::ImageError>);

fn decode(image: &Image) -> Result<RgbaImage, DecodeFailure> {
    match image {
        Image::Encoded { bytes, mime_type } => {
            let format = match mime_type.as_deref() {
                Some("image/png") => Some(ImageFormat::Png),
                Some("image/jpeg") => Some(ImageFormat::Jpeg),
                _ => None,
            };
            let decoded = match format {
                Some(format) => image::load_from_memory_with_format(bytes, format),
                None => image::load_from_memory(bytes),
            };
            decoded
                .map(DynamicImage::into_rgba8)
                .map_err(|err| (err.to_string(), Some(err)))
        }
        Image::Pixels {
            width,
            height,
            format,
            data,
        } => pixels_to_rgba(*width, *height, *format, data).ok_or_else(|| {
            (
                format!("{} bytes do not hold {width}x{height} {format:?} pixels", data.len()),
                None,
            )
        }),
        Image::Empty => Err(("image data is not loaded".to_string(), None)),
    }
}

fn pixels_to_rgba(width: u32, height: u32, format: PixelFormat, data: &[u8]) -> Option<RgbaImage> {
    let u16s = || {
        data.chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect::<Vec<_>>()
    };
    let f32s = || {
        data.chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect::<Vec<_>>()
    };
    let image = match format {
        PixelFormat::R8G8B8A8 => return ImageBuffer::from_raw(width, height, data.to_vec()),
        PixelFormat::R8 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(width, height, data.to_vec())?),
        PixelFormat::R8G8 => {
            DynamicImage::ImageLumaA8(ImageBuffer::from_raw(width, height, data.to_vec())?)
        }
        PixelFormat::R8G8B8 => {
            DynamicImage::ImageRgb8(ImageBuffer::from_raw(width, height, data.to_vec())?)
        }
        PixelFormat::R16 => DynamicImage::ImageLuma16(ImageBuffer::from_raw(width, height, u16s())?),
        PixelFormat::R16G16 => {
            DynamicImage::ImageLumaA16(ImageBuffer::from_raw(width, height, u16s())?)
        }
        PixelFormat::R16G16B16 => {
            DynamicImage::ImageRgb16(ImageBuffer::from_raw(width, height, u16s())?)
        }
        PixelFormat::R16G16B16A16 => {
            DynamicImage::ImageRgba16(ImageBuffer::from_raw(width, height, u16s())?)
        }
        PixelFormat::R32G32B32Float => {
            DynamicImage::ImageRgb32F(ImageBuffer::from_raw(width, height, f32s())?)
        }
        PixelFormat::R32G32B32A32Float => {
            DynamicImage::ImageRgba32F(ImageBuffer::from_raw(width, height, f32s())?)
        }
    };
    Some(image.into_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_pixels_expand_to_rgba() {
        let rgba = pixels_to_rgba(2, 1, PixelFormat::R8, &[10, 200]).unwrap();
        assert_eq!(rgba.as_raw(), &vec![10, 10, 10, 255, 200, 200, 200, 255]);
    }

    #[test]
    fn sixteen_bit_pixels_are_narrowed() {
        let data = [u16::MAX, 0, 0]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect::<Vec<_>>();
        let rgba = pixels_to_rgba(1, 1, PixelFormat::R16G16B16, &data).unwrap();
        assert_eq!(rgba.as_raw(), &vec![255, 0, 0, 255]);
    }

    #[test]
    fn short_pixel_data_is_a_decode_failure() {
        let image = Image::Pixels {
            width: 4,
            height: 4,
            format: PixelFormat::R8G8B8A8,
            data: vec![0; 12],
        };
        let (reason, source) = decode(&image).unwrap_err();
        assert!(reason.contains("4x4"));
        assert!(source.is_none());
    }

    #[test]
    fn garbage_is_not_a_png() {
        let image = Image::Encoded {
            bytes: b"definitely not a png".to_vec(),
            mime_type: Some("image/png".to_string()),
        };
        let (_, source) = decode(&image).unwrap_err();
        assert!(source.is_some());
    }
}
