use anyhow::{anyhow, bail, Context};
use candle_core::{Device, Tensor};
use image::{GenericImage, RgbImage};
use std::path::Path;

/// Convert one pixel-range image tensor (h x w x 3, values in [0, 255])
/// into an owned RGB image
pub fn tensor_to_rgb(x_hwc: &Tensor) -> anyhow::Result<RgbImage> {
    let dims = x_hwc.dims();
    if dims.len() != 3 || dims[2] != 3 {
        bail!("expected an (h, w, 3) tensor, got {:?}", dims);
    }
    let (height, width) = (dims[0], dims[1]);
    let raw: Vec<u8> = x_hwc
        .flatten_all()?
        .to_vec1::<f32>()?
        .into_iter()
        .map(|v| v.clamp(0.0, 255.0).round() as u8)
        .collect();

    RgbImage::from_raw(width as u32, height as u32, raw)
        .ok_or_else(|| anyhow!("image buffer size mismatch for {}x{}", width, height))
}

/// Split a pixel-range batch (n x h x w x 3) into per-sample images
pub fn batch_to_rgb(x_nhwc: &Tensor) -> anyhow::Result<Vec<RgbImage>> {
    let n = x_nhwc.dim(0)?;
    (0..n).map(|i| tensor_to_rgb(&x_nhwc.get(i)?)).collect()
}

/// Load an RGB image into a pixel-range tensor of shape (h, w, 3)
pub fn rgb_to_tensor(img: &RgbImage, device: &Device) -> anyhow::Result<Tensor> {
    let (width, height) = img.dimensions();
    let data: Vec<f32> = img.as_raw().iter().map(|&v| v as f32).collect();
    Ok(Tensor::from_vec(
        data,
        (height as usize, width as usize, 3),
        device,
    )?)
}

/// Write a batch as a single grid image with `nrow` samples per row
pub fn save_image_grid<P: AsRef<Path>>(
    images: &[RgbImage],
    path: P,
    nrow: usize,
) -> anyhow::Result<()> {
    if images.is_empty() {
        bail!("no images to save");
    }
    let nrow = nrow.min(images.len()).max(1);
    let (w, h) = images[0].dimensions();
    let rows = images.len().div_ceil(nrow);

    let mut grid = RgbImage::new(w * nrow as u32, h * rows as u32);
    for (i, img) in images.iter().enumerate() {
        let (col, row) = (i % nrow, i / nrow);
        grid.copy_from(img, col as u32 * w, row as u32 * h)
            .with_context(|| format!("placing sample {} into the grid", i))?;
    }
    grid.save(path.as_ref())
        .with_context(|| format!("writing {}", path.as_ref().display()))?;
    Ok(())
}

/// Write one image as-is
pub fn save_image<P: AsRef<Path>>(img: &RgbImage, path: P) -> anyhow::Result<()> {
    img.save(path.as_ref())
        .with_context(|| format!("writing {}", path.as_ref().display()))?;
    Ok(())
}

/// Horizontal `left | middle... | right` composite of same-height images
pub fn hconcat(images: &[&RgbImage]) -> anyhow::Result<RgbImage> {
    if images.is_empty() {
        bail!("nothing to concatenate");
    }
    let h = images[0].height();
    if images.iter().any(|img| img.height() != h) {
        bail!("all images in a composite must share one height");
    }
    let total_w: u32 = images.iter().map(|img| img.width()).sum();

    let mut out = RgbImage::new(total_w, h);
    let mut x = 0u32;
    for img in images {
        out.copy_from(*img, x, 0)
            .map_err(|e| anyhow!("composite placement failed: {}", e))?;
        x += img.width();
    }
    Ok(out)
}
