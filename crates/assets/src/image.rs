use crate::AssetError;
use std::path::Path;

/// Layout of one decoded pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    /// Format for a decoded channel count. Only RGB and RGBA are supported.
    pub fn from_channel_count(channels: u8) -> Option<Self> {
        match channels {
            3 => Some(PixelFormat::Rgb8),
            4 => Some(PixelFormat::Rgba8),
            _ => None,
        }
    }

    pub fn channel_count(self) -> u8 {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// A decoded raster image, 8 bits per channel, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    bytes: Vec<u8>,
}

impl PixelImage {
    /// Decode an image file. Fails on unreadable or corrupt files and on any
    /// channel count other than 3 or 4.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let io_err = |source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        };
        let decoded = ::image::ImageReader::open(path)
            .map_err(io_err)?
            .with_guessed_format()
            .map_err(io_err)?
            .decode()
            .map_err(|source| AssetError::Image {
                path: path.to_path_buf(),
                source,
            })?;

        let channels = decoded.color().channel_count();
        let format =
            PixelFormat::from_channel_count(channels).ok_or_else(|| AssetError::UnsupportedChannels {
                path: path.to_path_buf(),
                channels,
            })?;
        let (width, height) = (decoded.width(), decoded.height());
        let bytes = match format {
            PixelFormat::Rgb8 => decoded.into_rgb8().into_raw(),
            PixelFormat::Rgba8 => decoded.into_rgba8().into_raw(),
        };
        tracing::debug!(path = %path.display(), width, height, ?format, "decoded image");

        Ok(Self {
            width,
            height,
            format,
            bytes,
        })
    }

    /// Wrap already-decoded pixels. Returns `None` for empty dimensions or a
    /// byte count that does not match `width × height × channels`.
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, bytes: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * format.channel_count() as usize;
        if width == 0 || height == 0 || bytes.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            format,
            bytes,
        })
    }

    /// A single-colour RGBA image.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width.max(1) * height.max(1)) as usize;
        Self {
            width: width.max(1),
            height: height.max(1),
            format: PixelFormat::Rgba8,
            bytes: rgba.repeat(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channel_count(&self) -> u8 {
        self.format.channel_count()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Pixels expanded to RGBA, for devices without a 3-channel texel format.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgba8 => self.bytes.clone(),
            PixelFormat::Rgb8 => {
                let mut out = Vec::with_capacity(self.bytes.len() / 3 * 4);
                for px in self.bytes.chunks_exact(3) {
                    out.extend_from_slice(px);
                    out.push(u8::MAX);
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{GrayImage, RgbImage, RgbaImage};

    #[test]
    fn channel_count_maps_to_format() {
        assert_eq!(PixelFormat::from_channel_count(3), Some(PixelFormat::Rgb8));
        assert_eq!(PixelFormat::from_channel_count(4), Some(PixelFormat::Rgba8));
        for bad in [0, 1, 2, 5, 255] {
            assert_eq!(PixelFormat::from_channel_count(bad), None);
        }
    }

    #[test]
    fn loads_rgb_and_rgba_png() {
        let dir = tempfile::tempdir().unwrap();

        let rgb_path = dir.path().join("rgb.png");
        RgbImage::from_pixel(3, 2, ::image::Rgb([10, 20, 30]))
            .save(&rgb_path)
            .unwrap();
        let rgb = PixelImage::load(&rgb_path).unwrap();
        assert_eq!((rgb.width(), rgb.height()), (3, 2));
        assert_eq!(rgb.format(), PixelFormat::Rgb8);
        assert_eq!(rgb.bytes().len(), 3 * 2 * 3);
        assert_eq!(&rgb.bytes()[..3], &[10, 20, 30]);

        let rgba_path = dir.path().join("rgba.png");
        RgbaImage::from_pixel(2, 2, ::image::Rgba([1, 2, 3, 4]))
            .save(&rgba_path)
            .unwrap();
        let rgba = PixelImage::load(&rgba_path).unwrap();
        assert_eq!(rgba.format(), PixelFormat::Rgba8);
        assert_eq!(rgba.channel_count(), 4);
        assert_eq!(rgba.bytes().len(), 16);
    }

    #[test]
    fn grayscale_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        GrayImage::new(4, 4).save(&path).unwrap();
        match PixelImage::load(&path) {
            Err(AssetError::UnsupportedChannels { channels, path: p }) => {
                assert_eq!(channels, 1);
                assert_eq!(p, path);
            }
            other => panic!("expected channel error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PixelImage::load("does/not/exist.png").unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
        assert!(err.to_string().contains("does/not/exist.png"));
    }

    #[test]
    fn corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nnot really a png").unwrap();
        let err = PixelImage::load(&path).unwrap_err();
        assert!(matches!(err, AssetError::Image { .. }));
    }

    #[test]
    fn ascii_ppm_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.ppm");
        std::fs::write(&path, "P3\n2 1\n255\n255 0 0  0 0 255\n").unwrap();
        let img = PixelImage::load(&path).unwrap();
        assert_eq!(img.format(), PixelFormat::Rgb8);
        assert_eq!(img.bytes(), &[255, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn rgb_expands_to_opaque_rgba() {
        let img = PixelImage::from_raw(2, 1, PixelFormat::Rgb8, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(img.to_rgba8(), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn from_raw_checks_length() {
        assert!(PixelImage::from_raw(2, 2, PixelFormat::Rgba8, vec![0; 15]).is_none());
        assert!(PixelImage::from_raw(0, 2, PixelFormat::Rgb8, vec![]).is_none());
        assert!(PixelImage::from_raw(1, 1, PixelFormat::Rgb8, vec![0; 3]).is_some());
    }
}
