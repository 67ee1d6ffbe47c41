//! Image payload decoding and tensor preparation.
//!
//! Requests carry the image as base64, optionally wrapped in a data URL
//! (`data:image/png;base64,...`). The decoded image is resized, converted
//! to RGB and normalized into a single-item batch.

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use image::{DynamicImage, imageops::FilterType};

use crate::error::ServiceError;

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Scale pixel values to `[0, 1]`.
    Unit,
    /// Scale to `[0, 1]`, then subtract the ImageNet mean and divide by its std.
    ImageNet,
}

impl Normalization {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unit" | "scale" | "0-1" => Some(Self::Unit),
            "imagenet" => Some(Self::ImageNet),
            _ => None,
        }
    }

    fn apply(self, channel: usize, value: u8) -> f32 {
        let scaled = value as f32 / 255.0;
        match self {
            Self::Unit => scaled,
            Self::ImageNet => (scaled - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[batch, height, width, channels]`
    Nhwc,
    /// `[batch, channels, height, width]`
    Nchw,
}

impl TensorLayout {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "nhwc" | "channels_last" => Some(Self::Nhwc),
            "nchw" | "channels_first" => Some(Self::Nchw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data: Vec<f32>,
    pub shape: [usize; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessConfig {
    pub width: u32,
    pub height: u32,
    pub normalization: Normalization,
    pub layout: TensorLayout,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
            normalization: Normalization::Unit,
            layout: TensorLayout::Nhwc,
        }
    }
}

impl PreprocessConfig {
    /// Shape of the batched tensor handed to the model.
    pub fn tensor_shape(&self) -> [usize; 4] {
        let (h, w) = (self.height as usize, self.width as usize);
        match self.layout {
            TensorLayout::Nhwc => [1, h, w, 3],
            TensorLayout::Nchw => [1, 3, h, w],
        }
    }

    /// Input shape as reported to clients, batch dimension left open.
    pub fn input_shape(&self) -> Vec<Option<usize>> {
        let shape = self.tensor_shape();
        std::iter::once(None)
            .chain(shape[1..].iter().copied().map(Some))
            .collect()
    }

    pub fn to_tensor(&self, image: &DynamicImage) -> ImageTensor {
        let resized = image.resize_exact(self.width, self.height, FilterType::CatmullRom);
        let rgb = resized.to_rgb8();
        let shape = self.tensor_shape();
        let normalization = self.normalization;

        let data = match self.layout {
            TensorLayout::Nhwc => rgb
                .pixels()
                .flat_map(|p| {
                    p.0.into_iter()
                        .enumerate()
                        .map(move |(c, v)| normalization.apply(c, v))
                })
                .collect(),
            TensorLayout::Nchw => {
                let plane = (self.width * self.height) as usize;
                let mut data = vec![0.0; plane * 3];
                for (idx, pixel) in rgb.pixels().enumerate() {
                    for (c, &v) in pixel.0.iter().enumerate() {
                        data[c * plane + idx] = normalization.apply(c, v);
                    }
                }
                data
            }
        };

        ImageTensor { data, shape }
    }

    /// Decode a request payload all the way to a model-ready tensor.
    pub fn prepare(&self, payload: &str) -> Result<ImageTensor, ServiceError> {
        let bytes = decode_payload(payload)?;
        let image = decode_image(&bytes)?;
        Ok(self.to_tensor(&image))
    }
}

/// Strip an optional data URL prefix and base64-decode the remainder.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, ServiceError> {
    let encoded = if payload.starts_with("data:") {
        let (_, data) = payload
            .split_once(',')
            .ok_or_else(|| ServiceError::InvalidImage("missing comma in data url".into()))?;
        data
    } else {
        payload
    };

    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    PAYLOAD_ENGINE
        .decode(compact.as_bytes())
        .map_err(|e| ServiceError::InvalidImage(e.to_string()))
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ServiceError> {
    image::load_from_memory(bytes).map_err(|e| ServiceError::InvalidImage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;

    fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn strips_data_url_prefix() {
        let png = solid_png(2, 2, [10, 20, 30]);
        let payload = format!("data:image/png;base64,{}", BASE64_STANDARD.encode(&png));
        assert_eq!(decode_payload(&payload).unwrap(), png);
    }

    #[test]
    fn accepts_unpadded_and_wrapped_base64() {
        let raw = b"leaf";
        let encoded = BASE64_STANDARD.encode(raw);
        let unpadded = encoded.trim_end_matches('=');
        assert_eq!(decode_payload(unpadded).unwrap(), raw);

        let wrapped = format!("{}\n{}", &encoded[..4], &encoded[4..]);
        assert_eq!(decode_payload(&wrapped).unwrap(), raw);
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = decode_payload("not*base64!").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidImage(_)));
    }

    #[test]
    fn rejects_data_url_without_comma() {
        let err = decode_payload("data:image/png;base64").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidImage(_)));
    }

    #[test]
    fn rejects_bytes_that_are_not_an_image() {
        let err = decode_image(b"plain text").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidImage(_)));
    }

    #[test]
    fn unit_normalization_in_nhwc() {
        let config = PreprocessConfig {
            width: 4,
            height: 3,
            ..PreprocessConfig::default()
        };
        let image = decode_image(&solid_png(8, 8, [255, 0, 51])).unwrap();
        let tensor = config.to_tensor(&image);

        assert_eq!(tensor.shape, [1, 3, 4, 3]);
        assert_eq!(tensor.data.len(), 36);
        assert!((tensor.data[0] - 1.0).abs() < 1e-6);
        assert!(tensor.data[1].abs() < 1e-6);
        assert!((tensor.data[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn imagenet_normalization_in_nchw() {
        let config = PreprocessConfig {
            width: 2,
            height: 2,
            normalization: Normalization::ImageNet,
            layout: TensorLayout::Nchw,
        };
        let image = decode_image(&solid_png(2, 2, [255, 255, 255])).unwrap();
        let tensor = config.to_tensor(&image);

        assert_eq!(tensor.shape, [1, 3, 2, 2]);
        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let blue = (1.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];
        assert!(tensor.data[..4].iter().all(|v| (v - red).abs() < 1e-5));
        assert!(tensor.data[8..].iter().all(|v| (v - blue).abs() < 1e-5));
    }

    #[test]
    fn grayscale_input_is_expanded_to_rgb() {
        let gray = image::GrayImage::from_pixel(3, 3, image::Luma([128]));
        let config = PreprocessConfig {
            width: 3,
            height: 3,
            ..PreprocessConfig::default()
        };
        let tensor = config.to_tensor(&DynamicImage::ImageLuma8(gray));
        assert_eq!(tensor.data.len(), 27);
        assert!(tensor.data.windows(2).all(|w| (w[0] - w[1]).abs() < 1e-6));
    }

    #[test]
    fn reports_open_batch_dimension() {
        let config = PreprocessConfig::default();
        assert_eq!(
            config.input_shape(),
            vec![None, Some(224), Some(224), Some(3)]
        );
    }
}
