use crate::model_setup::*;

use candle_began::began_autoencoder::BeganAutoencoder;
use candle_began::began_config::{DataFormat, ModelDims};
use candle_began::began_image_pipeline::{ImagePreprocessor, NoopFaceDetector};
use candle_began::began_inference::InferencePipeline;

use clap::Args;

#[derive(Args, Debug)]
pub struct InterpolateArgs {
    #[arg(
        required = true,
        help = "First image directory",
        long_help = "Directory of first-parent face photos; paired by\n\
		     sorted position with the second directory."
    )]
    data_dir1: Box<str>,

    #[arg(
        required = true,
        help = "Second image directory",
        long_help = "Directory of second-parent face photos; must hold a\n\
		     file for every position of the first directory."
    )]
    data_dir2: Box<str>,

    #[arg(
        long,
        short,
        default_value = "model",
        help = "Model directory holding the trained checkpoint"
    )]
    model_dir: Box<str>,

    #[arg(
        long,
        short,
        default_value = "interpolate",
        help = "Output directory",
        long_help = "Output directory; per pair this holds\n\
		     - {out}/{basename}.jpg        (the blended face)\n\
		     - {out}/{basename}_interp.jpg (source | blend | source)\n"
    )]
    out: Box<str>,

    #[arg(
        long,
        short,
        default_value_t = 0.5,
        help = "Blend ratio in [0, 1]",
        long_help = "Spherical interpolation ratio; 0 reproduces the first\n\
		     face, 1 the second, 0.5 the balanced blend."
    )]
    ratio: f32,

    #[arg(
        long,
        default_value_t = false,
        help = "Also write a ten-step interpolation strip"
    )]
    sequence: bool,

    #[arg(long, default_value_t = 64, help = "Square input resolution")]
    input_scale_size: usize,

    #[arg(long, default_value_t = 64, help = "Latent dimension")]
    z_num: usize,

    #[arg(long, default_value_t = 128, help = "Base convolution filter count")]
    conv_hidden_num: usize,
}

pub fn interpolate_faces(args: &InterpolateArgs) -> anyhow::Result<()> {
    let dims = ModelDims {
        scale: args.input_scale_size,
        channels: 3,
        z_num: args.z_num,
        hidden_num: args.conv_hidden_num,
    };

    let mut bundle = build_networks(&dims)?;
    restore_or_fresh(&mut bundle, args.model_dir.as_ref(), 0.0, 0.0)?;

    let model = BeganAutoencoder::build(
        &bundle.generator,
        &bundle.discriminator,
        &dims,
        DataFormat::Nhwc,
        &bundle.device,
    )?;

    let preprocessor = ImagePreprocessor::new(dims.scale, NoopFaceDetector);
    let pipeline = InferencePipeline::new(&model, preprocessor);

    pipeline.interpolate_encode_save(
        args.data_dir1.as_ref(),
        args.data_dir2.as_ref(),
        args.out.as_ref(),
        args.ratio,
        args.sequence,
    )?;
    Ok(())
}
