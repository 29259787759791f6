use crate::began_autoencoder::BeganAutoencoder;
use crate::began_data_loader::list_image_paths;
use crate::began_image_io::{hconcat, save_image, tensor_to_rgb};
use crate::began_image_pipeline::{FaceDetectorT, ImagePreprocessor};
use crate::began_interpolate::{sequence_ratios, slerp};
use crate::began_model_traits::{DiscriminatorModuleT, GeneratorModuleT};

use anyhow::{anyhow, bail, Context};
use image::RgbImage;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Number of steps in an interpolation strip
const SEQUENCE_STEPS: usize = 10;

/// Marker error raised when an external interrupt is observed. Per-item
/// failure isolation must re-propagate it instead of skipping.
#[derive(Debug, Clone, Copy)]
pub struct Interrupted;

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "interrupted")
    }
}

impl std::error::Error for Interrupted {}

/// Per-directory outcome: which files made it through and which were
/// skipped, with the reason
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, String)>,
}

impl BatchReport {
    fn record(&mut self, path: &Path, outcome: anyhow::Result<()>) -> anyhow::Result<()> {
        match outcome {
            Ok(()) => self.processed.push(path.to_path_buf()),
            Err(e) if e.is::<Interrupted>() => return Err(e),
            Err(e) => {
                warn!("encoding failed on {}: {:#}", path.display(), e);
                self.skipped.push((path.to_path_buf(), format!("{:#}", e)));
            }
        }
        Ok(())
    }

    pub fn log_summary(&self, what: &str) {
        info!(
            "{}: {} processed, {} skipped",
            what,
            self.processed.len(),
            self.skipped.len()
        );
    }
}

/// End-user inference operations over a trained autoencoding manifold:
/// encode-save and interpolate-encode-save over image directories.
///
/// The model must be surfaced channel-last (NHWC), which is what the
/// preprocessor emits.
pub struct InferencePipeline<'a, G, D, F>
where
    G: GeneratorModuleT,
    D: DiscriminatorModuleT,
    F: FaceDetectorT,
{
    model: &'a BeganAutoencoder<'a, G, D>,
    preprocessor: ImagePreprocessor<F>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl<'a, G, D, F> InferencePipeline<'a, G, D, F>
where
    G: GeneratorModuleT,
    D: DiscriminatorModuleT,
    F: FaceDetectorT,
{
    pub fn new(model: &'a BeganAutoencoder<'a, G, D>, preprocessor: ImagePreprocessor<F>) -> Self {
        Self {
            model,
            preprocessor,
            interrupt: None,
        }
    }

    /// Observe an externally-raised interrupt flag between items
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn check_interrupt(&self) -> anyhow::Result<()> {
        if let Some(flag) = &self.interrupt {
            if flag.load(Ordering::Relaxed) {
                return Err(Interrupted.into());
            }
        }
        Ok(())
    }

    /// Autoencode every image of `data_dir` and write the reconstructions
    /// as `{basename}_encode.jpg` under `out_dir`. Per-item failures are
    /// logged and skipped; the batch continues.
    pub fn encode_save<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        data_dir: P,
        out_dir: Q,
    ) -> anyhow::Result<BatchReport> {
        let paths = list_image_paths(&data_dir)?;
        if paths.is_empty() {
            bail!(
                "no jpg/png images found under {}",
                data_dir.as_ref().display()
            );
        }
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("creating {}", out_dir.display()))?;

        let mut report = BatchReport::default();
        for path in &paths {
            self.check_interrupt()?;
            let outcome = self.encode_one(path, out_dir);
            report.record(path, outcome)?;
        }
        report.log_summary("encode");
        Ok(report)
    }

    fn encode_one(&self, path: &Path, out_dir: &Path) -> anyhow::Result<()> {
        let device = self.model.device().clone();
        let x = self.preprocessor.process_file(path, &device)?;
        let recon = self.model.reconstruct(&x)?;

        let img = tensor_to_rgb(&recon.get(0)?)?;
        let out = out_dir.join(format!("{}_encode.jpg", basename(path)?));
        save_image(&img, &out)?;
        info!("saved {}", out.display());
        Ok(())
    }

    /// Pair the sorted listings of two directories by index, blend each
    /// pair at `ratio` in latent space and write the blend plus a
    /// `source | blend | source` composite. With `sequence`, also write a
    /// ten-step interpolation strip.
    pub fn interpolate_encode_save<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        data_dir1: P,
        data_dir2: Q,
        out_dir: R,
        ratio: f32,
        sequence: bool,
    ) -> anyhow::Result<BatchReport> {
        if !(0.0..=1.0).contains(&ratio) {
            bail!("interpolation ratio must lie in [0, 1], got {}", ratio);
        }
        let paths1 = list_image_paths(&data_dir1)?;
        let paths2 = list_image_paths(&data_dir2)?;
        if paths1.is_empty() {
            bail!(
                "no jpg/png images found under {}",
                data_dir1.as_ref().display()
            );
        }
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("creating {}", out_dir.display()))?;

        let mut report = BatchReport::default();
        for (i, path1) in paths1.iter().enumerate() {
            self.check_interrupt()?;
            let outcome = paths2
                .get(i)
                .ok_or_else(|| {
                    anyhow!(
                        "no positional partner in {} for {}",
                        data_dir2.as_ref().display(),
                        path1.display()
                    )
                })
                .and_then(|path2| self.interpolate_one(path1, path2, out_dir, ratio, sequence));
            report.record(path1, outcome)?;
        }
        report.log_summary("interpolate");
        Ok(report)
    }

    fn interpolate_one(
        &self,
        path1: &Path,
        path2: &Path,
        out_dir: &Path,
        ratio: f32,
        sequence: bool,
    ) -> anyhow::Result<()> {
        let device = self.model.device().clone();
        let x1 = self.preprocessor.process_file(path1, &device)?;
        let x2 = self.preprocessor.process_file(path2, &device)?;

        let z1 = self.model.latent_rows(&self.model.encode(&x1)?)?;
        let z2 = self.model.latent_rows(&self.model.encode(&x2)?)?;

        let blend = self.decode_blend(&z1[0], &z2[0], ratio)?;
        let name = basename(path1)?;
        save_image(&blend, out_dir.join(format!("{}.jpg", name)))?;

        let src1 = tensor_to_rgb(&x1.get(0)?)?;
        let src2 = tensor_to_rgb(&x2.get(0)?)?;
        let composite = hconcat(&[&src1, &blend, &src2])?;
        let out = out_dir.join(format!("{}_interp.jpg", name));
        save_image(&composite, &out)?;
        info!("saved {}", out.display());

        if sequence {
            let mut frames: Vec<RgbImage> = vec![src1];
            for r in sequence_ratios(SEQUENCE_STEPS) {
                frames.push(self.decode_blend(&z1[0], &z2[0], r)?);
            }
            frames.push(src2);
            let refs: Vec<&RgbImage> = frames.iter().collect();
            let strip = hconcat(&refs)?;
            save_image(&strip, out_dir.join(format!("{}_seq.jpg", name)))?;
        }
        Ok(())
    }

    fn decode_blend(
        &self,
        z1: &ndarray::Array1<f32>,
        z2: &ndarray::Array1<f32>,
        ratio: f32,
    ) -> anyhow::Result<RgbImage> {
        let z = slerp(ratio, z1, z2);
        let z_batch = self.model.latent_from_rows(std::slice::from_ref(&z))?;
        let decoded = self.model.decode(&z_batch)?;
        tensor_to_rgb(&decoded.get(0)?)
    }
}

fn basename(path: &Path) -> anyhow::Result<&str> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("unusable file name: {}", path.display()))
}
