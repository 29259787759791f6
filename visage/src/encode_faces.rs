use crate::model_setup::*;

use candle_began::began_autoencoder::BeganAutoencoder;
use candle_began::began_config::{DataFormat, ModelDims};
use candle_began::began_image_pipeline::{ImagePreprocessor, NoopFaceDetector};
use candle_began::began_inference::InferencePipeline;

use clap::Args;

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[arg(
        required = true,
        help = "Input image directory",
        long_help = "Directory of face photos to autoencode (jpg or png;\n\
		     the first non-empty extension group wins)."
    )]
    data_dir: Box<str>,

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
        default_value = "encode",
        help = "Output directory",
        long_help = "Output directory; reconstructions are written as\n\
		     {out}/{basename}_encode.jpg"
    )]
    out: Box<str>,

    #[arg(long, default_value_t = 64, help = "Square input resolution")]
    input_scale_size: usize,

    #[arg(long, default_value_t = 64, help = "Latent dimension")]
    z_num: usize,

    #[arg(long, default_value_t = 128, help = "Base convolution filter count")]
    conv_hidden_num: usize,
}

pub fn encode_faces(args: &EncodeArgs) -> anyhow::Result<()> {
    let dims = ModelDims {
        scale: args.input_scale_size,
        channels: 3,
        z_num: args.z_num,
        hidden_num: args.conv_hidden_num,
    };

    let mut bundle = build_networks(&dims)?;
    restore_or_fresh(&mut bundle, args.model_dir.as_ref(), 0.0, 0.0)?;

    // inference runs one image at a time, channel-last
    let model = BeganAutoencoder::build(
        &bundle.generator,
        &bundle.discriminator,
        &dims,
        DataFormat::Nhwc,
        &bundle.device,
    )?;

    let preprocessor = ImagePreprocessor::new(dims.scale, NoopFaceDetector);
    let pipeline = InferencePipeline::new(&model, preprocessor);

    pipeline.encode_save(args.data_dir.as_ref(), args.out.as_ref())?;
    Ok(())
}
