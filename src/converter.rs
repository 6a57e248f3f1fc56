use std::fs;
use std::path::PathBuf;

use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::debug;

use crate::cli::EncodeOptions;
use crate::error::{ConvertError, ConvertResult};

/// Something that can turn encoded bytes into pixels.
pub trait Decode: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> ConvertResult<DynamicImage>;
}

/// Decoder backed by the `image` crate for one container format.
pub struct ImageCrateDecoder(ImageFormat);

impl Decode for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> ConvertResult<DynamicImage> {
        Ok(image::load_from_memory_with_format(bytes, self.0)?)
    }
}

static JPEG: ImageCrateDecoder = ImageCrateDecoder(ImageFormat::Jpeg);
static PNG: ImageCrateDecoder = ImageCrateDecoder(ImageFormat::Png);
static BMP: ImageCrateDecoder = ImageCrateDecoder(ImageFormat::Bmp);
static GIF: ImageCrateDecoder = ImageCrateDecoder(ImageFormat::Gif);
static TIFF: ImageCrateDecoder = ImageCrateDecoder(ImageFormat::Tiff);
static WEBP: ImageCrateDecoder = ImageCrateDecoder(ImageFormat::WebP);

/// Picks the decoder for a normalized extension. `None` means the format is
/// recognized by the scanner but nothing here can read it (heic, heif, avif).
pub fn decoder_for(ext: &str) -> Option<&'static dyn Decode> {
    let decoder: &'static dyn Decode = match ext {
        "jpg" => &JPEG,
        "png" => &PNG,
        "bmp" => &BMP,
        "gif" => &GIF,
        "tiff" | "tif" => &TIFF,
        "webp" => &WEBP,
        _ => return None,
    };
    Some(decoder)
}

/// One file to convert. Built before dispatch, owned by the worker that runs it.
#[derive(Debug, Clone)]
pub struct ConversionTask {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Normalized source extension, selects the decoder.
    pub ext: String,
    /// Size seen by the scanner.
    pub source_size: u64,
    pub options: EncodeOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converted {
    pub original_size: u64,
    pub converted_size: u64,
}

pub type ConversionResult = ConvertResult<Converted>;

/// Encodes pixels as WebP. Images with an alpha channel keep it.
pub fn encode_webp(img: &DynamicImage, options: &EncodeOptions) -> ConvertResult<Vec<u8>> {
    let mut config = webp::WebPConfig::new()
        .map_err(|_| ConvertError::Encode("libwebp rejected the default config".into()))?;
    config.lossless = i32::from(options.lossless);
    config.method = i32::from(options.method);
    if !options.lossless {
        config.quality = f32::from(options.quality);
    }

    let (width, height) = img.dimensions();
    let encoded = if img.color().has_alpha() {
        let buf = img.to_rgba8();
        webp::Encoder::from_rgba(buf.as_raw(), width, height).encode_advanced(&config)
    } else {
        let buf = img.to_rgb8();
        webp::Encoder::from_rgb(buf.as_raw(), width, height).encode_advanced(&config)
    };
    let memory = encoded.map_err(|e| ConvertError::Encode(format!("{e:?}")))?;

    Ok(memory.to_vec())
}

/// Decodes `task.source`, writes the WebP to `task.destination`.
pub fn convert(task: &ConversionTask) -> ConversionResult {
    let bytes = fs::read(&task.source).map_err(ConvertError::Read)?;
    let decoder = decoder_for(&task.ext).ok_or_else(|| ConvertError::Unsupported(task.ext.clone()))?;
    let img = decoder.decode(&bytes)?;

    let data = encode_webp(&img, &task.options)?;
    if data.is_empty() {
        return Err(ConvertError::EmptyOutput);
    }
    fs::write(&task.destination, &data).map_err(ConvertError::Write)?;

    let (width, height) = img.dimensions();
    debug!(
        src = %task.source.display(),
        dst = %task.destination.display(),
        width,
        height,
        "converted"
    );
    Ok(Converted {
        original_size: bytes.len() as u64,
        converted_size: data.len() as u64,
    })
}
