#![allow(dead_code)]

use crate::began_config::ModelDims;
use crate::began_model_traits::*;

use candle_core::{Result, Tensor};
use candle_nn::{conv2d, linear, Activation, Conv2d, Conv2dConfig, Linear, Module, VarBuilder};

/// Side of the spatial bottleneck where the decoder starts and the encoder
/// ends
const BOTTLENECK: usize = 8;

fn conv3x3(c_in: usize, c_out: usize, stride: usize, vb: VarBuilder) -> Result<Conv2d> {
    let cfg = Conv2dConfig {
        padding: 1,
        stride,
        ..Default::default()
    };
    conv2d(c_in, c_out, 3, cfg, vb)
}

/// Decoder trunk shared by the generator and the discriminator's
/// reconstruction head: a dense projection to an 8x8 feature map followed by
/// ELU conv pairs with nearest-neighbour upsampling between them.
struct DecoderCore {
    dims: ModelDims,
    fc: Linear,
    blocks: Vec<(Conv2d, Conv2d)>,
    conv_out: Conv2d,
    act: Activation,
}

impl DecoderCore {
    fn new(dims: &ModelDims, vb: VarBuilder) -> Result<Self> {
        let h = dims.hidden_num;
        let fc = linear(dims.z_num, BOTTLENECK * BOTTLENECK * h, vb.pp("fc"))?;

        let mut blocks = Vec::with_capacity(dims.repeat_num());
        for i in 0..dims.repeat_num() {
            let vb_i = vb.pp(format!("block{}", i));
            blocks.push((
                conv3x3(h, h, 1, vb_i.pp("conv1"))?,
                conv3x3(h, h, 1, vb_i.pp("conv2"))?,
            ));
        }
        let conv_out = conv3x3(h, dims.channels, 1, vb.pp("out"))?;

        Ok(Self {
            dims: *dims,
            fc,
            blocks,
            conv_out,
            act: Activation::Elu(1.0),
        })
    }

    fn forward(&self, z_nk: &Tensor) -> Result<Tensor> {
        let n = z_nk.dim(0)?;
        let h = self.dims.hidden_num;

        let mut x = self
            .fc
            .forward(z_nk)?
            .reshape((n, h, BOTTLENECK, BOTTLENECK))?;

        let last = self.blocks.len() - 1;
        for (i, (conv1, conv2)) in self.blocks.iter().enumerate() {
            x = self.act.forward(&conv1.forward(&x)?)?;
            x = self.act.forward(&conv2.forward(&x)?)?;
            if i < last {
                let (_, _, height, width) = x.dims4()?;
                x = x.upsample_nearest2d(height * 2, width * 2)?;
            }
        }
        self.conv_out.forward(&x)
    }
}

/// Encoder trunk of the discriminator: ELU conv pairs with stride-2
/// downsampling and a widening filter count, closed by a dense projection to
/// the latent dimension.
struct EncoderCore {
    dims: ModelDims,
    conv_in: Conv2d,
    blocks: Vec<(Conv2d, Conv2d, Option<Conv2d>)>,
    fc: Linear,
    act: Activation,
}

impl EncoderCore {
    fn new(dims: &ModelDims, vb: VarBuilder) -> Result<Self> {
        let h = dims.hidden_num;
        let repeat = dims.repeat_num();

        let conv_in = conv3x3(dims.channels, h, 1, vb.pp("in"))?;

        let mut blocks = Vec::with_capacity(repeat);
        for i in 0..repeat {
            let vb_i = vb.pp(format!("block{}", i));
            let c = h * (i + 1);
            let down = if i + 1 < repeat {
                Some(conv3x3(c, h * (i + 2), 2, vb_i.pp("down"))?)
            } else {
                None
            };
            blocks.push((
                conv3x3(c, c, 1, vb_i.pp("conv1"))?,
                conv3x3(c, c, 1, vb_i.pp("conv2"))?,
                down,
            ));
        }

        let flat = h * repeat * BOTTLENECK * BOTTLENECK;
        let fc = linear(flat, dims.z_num, vb.pp("fc"))?;

        Ok(Self {
            dims: *dims,
            conv_in,
            blocks,
            fc,
            act: Activation::Elu(1.0),
        })
    }

    fn forward(&self, x_nchw: &Tensor) -> Result<Tensor> {
        let mut x = self.act.forward(&self.conv_in.forward(x_nchw)?)?;

        for (conv1, conv2, down) in self.blocks.iter() {
            x = self.act.forward(&conv1.forward(&x)?)?;
            x = self.act.forward(&conv2.forward(&x)?)?;
            if let Some(down) = down {
                x = self.act.forward(&down.forward(&x)?)?;
            }
        }
        self.fc.forward(&x.flatten_from(1)?)
    }
}

/// Default convolutional generator
pub struct ConvGenerator {
    core: DecoderCore,
}

impl ConvGenerator {
    pub fn new(dims: &ModelDims, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            core: DecoderCore::new(dims, vb.pp("generator"))?,
        })
    }
}

impl GeneratorModuleT for ConvGenerator {
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor> {
        self.core.forward(z_nk)
    }

    fn dim_latent(&self) -> usize {
        self.core.dims.z_num
    }

    fn dim_image(&self) -> usize {
        self.core.dims.scale
    }
}

/// Default convolutional discriminator/autoencoder. The decoder half mirrors
/// the generator topology with its own weights.
pub struct ConvDiscriminator {
    encoder: EncoderCore,
    decoder: DecoderCore,
}

impl ConvDiscriminator {
    pub fn new(dims: &ModelDims, vb: VarBuilder) -> Result<Self> {
        let vb = vb.pp("discriminator");
        Ok(Self {
            encoder: EncoderCore::new(dims, vb.pp("encoder"))?,
            decoder: DecoderCore::new(dims, vb.pp("decoder"))?,
        })
    }
}

impl DiscriminatorModuleT for ConvDiscriminator {
    fn forward(&self, x_nchw: &Tensor) -> Result<(Tensor, Tensor)> {
        let z_nk = self.encoder.forward(x_nchw)?;
        let recon = self.decoder.forward(&z_nk)?;
        Ok((recon, z_nk))
    }

    fn encode(&self, x_nchw: &Tensor) -> Result<Tensor> {
        self.encoder.forward(x_nchw)
    }

    fn decode(&self, z_nk: &Tensor) -> Result<Tensor> {
        self.decoder.forward(z_nk)
    }

    fn dim_latent(&self) -> usize {
        self.encoder.dims.z_num
    }

    fn dim_image(&self) -> usize {
        self.encoder.dims.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn tiny_dims() -> ModelDims {
        ModelDims {
            scale: 8,
            channels: 3,
            z_num: 4,
            hidden_num: 2,
        }
    }

    #[test]
    fn generator_output_shape() -> anyhow::Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let dims = tiny_dims();

        let generator = ConvGenerator::new(&dims, vb)?;
        let z = Tensor::rand(-1f32, 1f32, (2, dims.z_num), &device)?;
        let x = generator.forward(&z)?;
        assert_eq!(x.dims(), &[2, 3, 8, 8]);
        Ok(())
    }

    #[test]
    fn discriminator_round_trip_shapes() -> anyhow::Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let dims = tiny_dims();

        let disc = ConvDiscriminator::new(&dims, vb)?;
        let x = Tensor::rand(-1f32, 1f32, (2, 3, 8, 8), &device)?;
        let (recon, z) = disc.forward(&x)?;
        assert_eq!(recon.dims(), x.dims());
        assert_eq!(z.dims(), &[2, dims.z_num]);
        Ok(())
    }
}
