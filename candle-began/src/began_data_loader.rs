#![allow(dead_code)]

use anyhow::{bail, Context};
use candle_core::{Device, Tensor};
use image::imageops;
use indicatif::ParallelProgressIterator;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Extension groups recognized for directory datasets; the first non-empty
/// group wins.
pub const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// List the image files of a directory, first non-empty extension group
/// only, sorted by file name.
pub fn list_image_paths<P: AsRef<Path>>(dir: P) -> anyhow::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();

    for ext in IMAGE_EXTENSIONS {
        let mut group: Vec<PathBuf> = entries
            .iter()
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(ext))
            })
            .cloned()
            .collect();
        if !group.is_empty() {
            group.sort();
            return Ok(group);
        }
    }
    Ok(vec![])
}

/// `ImageBatchLoader` for minibatch adversarial training. Batches come out
/// as pixel-range (b x s x s x 3) tensors.
pub trait ImageBatchLoader {
    fn minibatch_images(&self, batch_idx: usize, target_device: &Device) -> anyhow::Result<Tensor>;

    fn num_minibatch(&self) -> usize;

    fn shuffle_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()>;

    /// A deterministic batch of the first `n` samples, for visual
    /// regression tracking across training runs
    fn fixed_batch(&self, n: usize, target_device: &Device) -> anyhow::Result<Tensor>;
}

///
/// In-memory directory dataset. Every image found in the directory is
/// decoded up front (in parallel), resized to `scale` and held as one
/// (s x s x 3) tensor per sample.
///
pub struct FaceDirectoryData {
    samples: Vec<Tensor>,
    chunks: Vec<Vec<usize>>,
    batch_size: usize,
    scale: usize,
}

impl FaceDirectoryData {
    pub fn from_dir<P: AsRef<Path>>(dir: P, scale: usize) -> anyhow::Result<Self> {
        let paths = list_image_paths(&dir)?;
        if paths.is_empty() {
            bail!(
                "no jpg/png images found under {}",
                dir.as_ref().display()
            );
        }

        let samples = paths
            .par_iter()
            .progress_count(paths.len() as u64)
            .map(|p| load_scaled(p, scale))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            samples,
            chunks: vec![],
            batch_size: 0,
            scale,
        })
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn scale(&self) -> usize {
        self.scale
    }
}

fn load_scaled(path: &Path, scale: usize) -> anyhow::Result<Tensor> {
    let rgb = image::open(path)
        .with_context(|| format!("loading image {}", path.display()))?
        .to_rgb8();
    let s = scale as u32;
    let resized = imageops::resize(&rgb, s, s, imageops::FilterType::Nearest);
    crate::began_image_io::rgb_to_tensor(&resized, &Device::Cpu)
}

impl ImageBatchLoader for FaceDirectoryData {
    fn minibatch_images(&self, batch_idx: usize, target_device: &Device) -> anyhow::Result<Tensor> {
        let chunk = self
            .chunks
            .get(batch_idx)
            .with_context(|| format!("minibatch index {} out of range", batch_idx))?;

        let rows: Vec<Tensor> = chunk.iter().map(|&i| self.samples[i].clone()).collect();
        Ok(Tensor::stack(&rows, 0)?.to_device(target_device)?)
    }

    fn num_minibatch(&self) -> usize {
        self.chunks.len()
    }

    /// Reshuffle sample order and cut fixed-size minibatches; a trailing
    /// remainder smaller than `batch_size` is dropped.
    fn shuffle_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()> {
        if batch_size == 0 || batch_size > self.samples.len() {
            bail!(
                "batch size {} incompatible with {} samples",
                batch_size,
                self.samples.len()
            );
        }
        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        order.shuffle(&mut rand::rng());

        self.batch_size = batch_size;
        self.chunks = order
            .chunks_exact(batch_size)
            .map(|c| c.to_vec())
            .collect();
        Ok(())
    }

    fn fixed_batch(&self, n: usize, target_device: &Device) -> anyhow::Result<Tensor> {
        let n = n.min(self.samples.len());
        if n == 0 {
            bail!("dataset is empty");
        }
        let rows: Vec<Tensor> = self.samples[..n].to_vec();
        Ok(Tensor::stack(&rows, 0)?.to_device(target_device)?)
    }
}
