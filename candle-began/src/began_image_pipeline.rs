use crate::began_image_io::rgb_to_tensor;

use anyhow::{anyhow, Context};
use candle_core::{Device, Tensor};
use image::{imageops, GrayImage, RgbImage};
use log::warn;
use std::path::Path;

// face rectangle margins taken around the detected box, in pixels
const MARGIN_TOP: i64 = 50;
const MARGIN_BOTTOM: i64 = 10;
const MARGIN_SIDE: i64 = 25;

/// Axis-aligned face bounding box in image coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// External face-detection capability. Implementations return the
/// highest-priority face, `None` when nothing is found; both `None` and
/// `Err` degrade to the uncropped frame downstream.
pub trait FaceDetectorT {
    fn detect(&self, gray: &GrayImage) -> anyhow::Result<Option<FaceBox>>;
}

/// Default detector backend: never finds a face, so every image flows
/// through the full-frame fallback path.
#[derive(Default)]
pub struct NoopFaceDetector;

impl FaceDetectorT for NoopFaceDetector {
    fn detect(&self, _gray: &GrayImage) -> anyhow::Result<Option<FaceBox>> {
        Ok(None)
    }
}

/// Best-effort face-cropping preprocessor
///
/// Loads an image, tries to crop around a detected face and always delivers
/// a (1, scale, scale, 3) f32 tensor in pixel range [0, 255]. Only a failed
/// image load is fatal; detection or cropping failures fall back to the full
/// frame with a warning.
pub struct ImagePreprocessor<F>
where
    F: FaceDetectorT,
{
    scale: usize,
    detector: F,
}

impl<F> ImagePreprocessor<F>
where
    F: FaceDetectorT,
{
    pub fn new(scale: usize, detector: F) -> Self {
        Self { scale, detector }
    }

    pub fn scale(&self) -> usize {
        self.scale
    }

    /// Preprocess one file into a single-sample batch tensor
    pub fn process_file<P: AsRef<Path>>(
        &self,
        path: P,
        device: &Device,
    ) -> anyhow::Result<Tensor> {
        let path = path.as_ref();
        let rgb = image::open(path)
            .with_context(|| format!("loading image {}", path.display()))?
            .to_rgb8();
        self.process_image(&rgb, device)
    }

    /// Preprocess an already-decoded image into a single-sample batch tensor
    pub fn process_image(&self, rgb: &RgbImage, device: &Device) -> anyhow::Result<Tensor> {
        let cropped = match self.face_crop(rgb) {
            Ok(face) => face,
            Err(e) => {
                warn!("face detection and cropping failed ({}); using full frame", e);
                rgb.clone()
            }
        };

        let s = self.scale as u32;
        let resized = imageops::resize(&cropped, s, s, imageops::FilterType::Nearest);
        Ok(rgb_to_tensor(&resized, device)?.unsqueeze(0)?)
    }

    fn face_crop(&self, rgb: &RgbImage) -> anyhow::Result<RgbImage> {
        let gray = imageops::grayscale(rgb);
        let face = self
            .detector
            .detect(&gray)?
            .ok_or_else(|| anyhow!("no face detected"))?;

        let (img_w, img_h) = (rgb.width() as i64, rgb.height() as i64);
        let (x, y) = (face.x as i64, face.y as i64);
        let (w, h) = (face.w as i64, face.h as i64);

        let x0 = (x - MARGIN_SIDE).max(0);
        let y0 = (y - MARGIN_TOP).max(0);
        let x1 = (x + w + MARGIN_SIDE).min(img_w);
        let y1 = (y + h - MARGIN_BOTTOM).min(img_h);

        if x1 <= x0 || y1 <= y0 {
            return Err(anyhow!("face crop region is empty"));
        }

        Ok(imageops::crop_imm(
            rgb,
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        )
        .to_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBoxDetector(FaceBox);

    impl FaceDetectorT for FixedBoxDetector {
        fn detect(&self, _gray: &GrayImage) -> anyhow::Result<Option<FaceBox>> {
            Ok(Some(self.0))
        }
    }

    struct FailingDetector;

    impl FaceDetectorT for FailingDetector {
        fn detect(&self, _gray: &GrayImage) -> anyhow::Result<Option<FaceBox>> {
            Err(anyhow!("detector backend exploded"))
        }
    }

    fn gradient_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 0]))
    }

    #[test]
    fn no_face_still_yields_contract_shape() -> anyhow::Result<()> {
        let pre = ImagePreprocessor::new(16, NoopFaceDetector);
        let img = gradient_image(100, 80);
        let t = pre.process_image(&img, &Device::Cpu)?;
        assert_eq!(t.dims(), &[1, 16, 16, 3]);
        Ok(())
    }

    #[test]
    fn detector_error_degrades_to_full_frame() -> anyhow::Result<()> {
        let pre = ImagePreprocessor::new(8, FailingDetector);
        let img = gradient_image(40, 40);
        let t = pre.process_image(&img, &Device::Cpu)?;
        assert_eq!(t.dims(), &[1, 8, 8, 3]);
        Ok(())
    }

    #[test]
    fn detected_face_is_cropped_with_margins() -> anyhow::Result<()> {
        // face at (60, 70) size 40x50 in a 200x200 frame:
        // crop x in [35, 125), y in [20, 110)
        let face = FaceBox {
            x: 60,
            y: 70,
            w: 40,
            h: 50,
        };
        let pre = ImagePreprocessor::new(8, FixedBoxDetector(face));
        let img = gradient_image(200, 200);
        let cropped = pre.face_crop(&img)?;
        assert_eq!(cropped.dimensions(), (90, 90));
        assert_eq!(cropped.get_pixel(0, 0).0, [35, 20, 0]);
        Ok(())
    }

    #[test]
    fn margins_clamp_at_image_origin() -> anyhow::Result<()> {
        let face = FaceBox {
            x: 5,
            y: 10,
            w: 60,
            h: 80,
        };
        let pre = ImagePreprocessor::new(8, FixedBoxDetector(face));
        let img = gradient_image(120, 120);
        let cropped = pre.face_crop(&img)?;
        // x in [0, 90), y in [0, 80)
        assert_eq!(cropped.dimensions(), (90, 80));
        Ok(())
    }

    #[test]
    fn unreadable_file_is_fatal() {
        let pre = ImagePreprocessor::new(8, NoopFaceDetector);
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("missing.jpg");
        assert!(pre.process_file(&bogus, &Device::Cpu).is_err());
    }

    #[test]
    fn pixel_range_is_preserved() -> anyhow::Result<()> {
        let pre = ImagePreprocessor::new(4, NoopFaceDetector);
        let img = RgbImage::from_pixel(10, 10, image::Rgb([255, 0, 128]));
        let t = pre.process_image(&img, &Device::Cpu)?;
        let values = t.flatten_all()?.to_vec1::<f32>()?;
        assert!(values.iter().all(|v| (0.0..=255.0).contains(v)));
        assert!(values.contains(&255.0));
        Ok(())
    }
}
