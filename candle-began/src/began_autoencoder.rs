use crate::began_config::{DataFormat, ModelDims};
use crate::began_model_traits::*;

use anyhow::bail;
use candle_core::{Device, Tensor};
use ndarray::Array1;

/// Normalize pixel images from [0, 255] into the model range [-1, 1]
pub fn norm_img(x: &Tensor) -> candle_core::Result<Tensor> {
    x.affine(1.0 / 127.5, -1.0)
}

/// Map model-range images back to clamped pixel values in [0, 255]
pub fn denorm_img(x: &Tensor) -> candle_core::Result<Tensor> {
    x.affine(127.5, 127.5)?.clamp(0f32, 255f32)
}

pub fn nhwc_to_nchw(x: &Tensor) -> candle_core::Result<Tensor> {
    x.permute((0, 3, 1, 2))?.contiguous()
}

pub fn nchw_to_nhwc(x: &Tensor) -> candle_core::Result<Tensor> {
    x.permute((0, 2, 3, 1))?.contiguous()
}

/// The trained autoencoding manifold: a generator and a
/// discriminator-as-encoder sharing one latent space.
///
/// All methods are read-only with respect to model parameters; weights are
/// only mutated by the training loop's optimizer steps. Images cross this
/// boundary in pixel range [0, 255] and in the configured `data_format`;
/// normalization and layout conversion happen inside.
pub struct BeganAutoencoder<'a, G, D>
where
    G: GeneratorModuleT,
    D: DiscriminatorModuleT,
{
    pub generator: &'a G,
    pub discriminator: &'a D,
    dims: ModelDims,
    data_format: DataFormat,
    device: Device,
}

impl<'a, G, D> BeganAutoencoder<'a, G, D>
where
    G: GeneratorModuleT,
    D: DiscriminatorModuleT,
{
    pub fn build(
        generator: &'a G,
        discriminator: &'a D,
        dims: &ModelDims,
        data_format: DataFormat,
        device: &Device,
    ) -> anyhow::Result<Self> {
        if generator.dim_latent() != discriminator.dim_latent() {
            bail!(
                "generator and discriminator disagree on latent dimension ({} vs {})",
                generator.dim_latent(),
                discriminator.dim_latent()
            );
        }
        Ok(Self {
            generator,
            discriminator,
            dims: *dims,
            data_format,
            device: device.clone(),
        })
    }

    pub fn dims(&self) -> &ModelDims {
        &self.dims
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Decode random or recovered latent codes through the generator.
    /// Returns pixel images in the configured layout.
    pub fn generate(&self, z_nk: &Tensor) -> anyhow::Result<Tensor> {
        self.check_latent(z_nk)?;
        let g = self.generator.forward(z_nk)?;
        self.to_output(&denorm_img(&g)?)
    }

    /// Map pixel images into the latent space through the discriminator's
    /// bottleneck.
    pub fn encode(&self, images: &Tensor) -> anyhow::Result<Tensor> {
        let x = self.to_nchw_checked(images)?;
        Ok(self.discriminator.encode(&norm_img(&x)?)?)
    }

    /// Reconstruct pixel images from latent codes through the
    /// discriminator's reconstruction head.
    pub fn decode(&self, z_nk: &Tensor) -> anyhow::Result<Tensor> {
        self.check_latent(z_nk)?;
        let recon = self.discriminator.decode(z_nk)?;
        self.to_output(&denorm_img(&recon)?)
    }

    /// Full autoencoding pass: encode then decode
    pub fn reconstruct(&self, images: &Tensor) -> anyhow::Result<Tensor> {
        let z = self.encode(images)?;
        self.decode(&z)
    }

    /// Latent batch rows as owned vectors, for interpolation math
    pub fn latent_rows(&self, z_nk: &Tensor) -> anyhow::Result<Vec<Array1<f32>>> {
        self.check_latent(z_nk)?;
        Ok(z_nk
            .to_vec2::<f32>()?
            .into_iter()
            .map(Array1::from_vec)
            .collect())
    }

    /// Rebuild a latent batch tensor from per-row vectors
    pub fn latent_from_rows(&self, rows: &[Array1<f32>]) -> anyhow::Result<Tensor> {
        let n = rows.len();
        let k = self.dims.z_num;
        let mut flat = Vec::with_capacity(n * k);
        for row in rows {
            if row.len() != k {
                bail!(
                    "latent vector length mismatch: expected {}, got {}",
                    k,
                    row.len()
                );
            }
            flat.extend(row.iter().copied());
        }
        Ok(Tensor::from_vec(flat, (n, k), &self.device)?)
    }

    fn check_latent(&self, z_nk: &Tensor) -> anyhow::Result<()> {
        let dims = z_nk.dims();
        if dims.len() != 2 || dims[1] != self.dims.z_num {
            bail!(
                "latent batch shape mismatch: expected (n, {}), got {:?}",
                self.dims.z_num,
                dims
            );
        }
        Ok(())
    }

    /// Validate a pixel image batch against the configured resolution and
    /// channel count, returning it in channel-first layout.
    fn to_nchw_checked(&self, images: &Tensor) -> anyhow::Result<Tensor> {
        let s = self.dims.scale;
        let c = self.dims.channels;
        let dims = images.dims();
        if dims.len() != 4 {
            bail!(
                "image batch shape mismatch: expected 4 dimensions, got {:?}",
                dims
            );
        }
        let expected = match self.data_format {
            DataFormat::Nhwc => [dims[0], s, s, c],
            DataFormat::Nchw => [dims[0], c, s, s],
        };
        if dims != expected {
            bail!(
                "image batch shape mismatch: expected {:?} ({:?}), got {:?}",
                expected,
                self.data_format,
                dims
            );
        }
        match self.data_format {
            DataFormat::Nhwc => Ok(nhwc_to_nchw(images)?),
            DataFormat::Nchw => Ok(images.clone()),
        }
    }

    fn to_output(&self, x_nchw: &Tensor) -> anyhow::Result<Tensor> {
        match self.data_format {
            DataFormat::Nhwc => Ok(nchw_to_nhwc(x_nchw)?),
            DataFormat::Nchw => Ok(x_nchw.clone()),
        }
    }
}
