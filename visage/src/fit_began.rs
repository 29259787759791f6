use crate::model_setup::*;

use candle_began::began_autoencoder::BeganAutoencoder;
use candle_began::began_config::{DataFormat, ModelDims, TrainSettings};
use candle_began::began_data_loader::FaceDirectoryData;
use candle_began::began_trainer::BeganTrainer;

use clap::{Args, ValueEnum};
use log::info;

#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
enum LayoutArg {
    Nhwc,
    Nchw,
}

impl From<&LayoutArg> for DataFormat {
    fn from(value: &LayoutArg) -> Self {
        match value {
            LayoutArg::Nhwc => DataFormat::Nhwc,
            LayoutArg::Nchw => DataFormat::Nchw,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(
        required = true,
        help = "Training image directory",
        long_help = "Directory of face images (jpg or png).\n\
		     All images are resized to the input scale size."
    )]
    data_dir: Box<str>,

    #[arg(
        long,
        short,
        default_value = "model",
        help = "Model directory",
        long_help = "Directory for checkpoints and sample grids:\n\
		     - {model_dir}/x_fixed.png\n\
		     - {model_dir}/{step}_G.png\n\
		     - {model_dir}/{step}_D_real.png\n\
		     - {model_dir}/generator.safetensors\n"
    )]
    model_dir: Box<str>,

    #[arg(long, default_value_t = 16, help = "Minibatch size")]
    batch_size: usize,

    #[arg(
        long,
        default_value_t = 64,
        help = "Square input resolution",
        long_help = "Square input resolution; must be a power of two >= 8."
    )]
    input_scale_size: usize,

    #[arg(long, default_value_t = 64, help = "Latent dimension")]
    z_num: usize,

    #[arg(long, default_value_t = 128, help = "Base convolution filter count")]
    conv_hidden_num: usize,

    #[arg(
        long,
        default_value_t = 0.5,
        help = "Equilibrium diversity ratio",
        long_help = "Diversity ratio of the boundary equilibrium\n\
		     gamma * d_loss_real = g_loss; lower values favour\n\
		     image quality over diversity."
    )]
    gamma: f64,

    #[arg(long, default_value_t = 0.001, help = "k_t feedback step size")]
    lambda_k: f64,

    #[arg(
        long,
        default_value = "adam",
        help = "Optimizer (only `adam` is supported)"
    )]
    optimizer: Box<str>,

    #[arg(long, default_value_t = 0.5, help = "Adam beta1")]
    beta1: f64,

    #[arg(long, default_value_t = 0.999, help = "Adam beta2")]
    beta2: f64,

    #[arg(long, default_value_t = 8e-5, help = "Generator learning rate")]
    g_lr: f64,

    #[arg(long, default_value_t = 8e-5, help = "Discriminator learning rate")]
    d_lr: f64,

    #[arg(
        long,
        default_value_t = 2e-5,
        help = "Learning-rate floor",
        long_help = "Lower boundary for the halving schedule; rates are\n\
		     halved every lr_update_step steps but never drop\n\
		     below this value."
    )]
    lr_lower_boundary: f64,

    #[arg(long, default_value_t = 50, help = "Steps between log records")]
    log_step: usize,

    #[arg(long, default_value_t = 500_000, help = "Total training steps")]
    max_step: usize,

    #[arg(long, default_value_t = 100_000, help = "Steps between LR halvings")]
    lr_update_step: usize,

    #[arg(long, default_value_t = 300, help = "Seconds between checkpoints")]
    save_sec: u64,

    #[arg(long, default_value_t = 8, help = "Samples per row in saved grids")]
    sample_nrow: usize,

    #[arg(
        long,
        value_enum,
        default_value = "nhwc",
        help = "Image tensor layout on the model surface"
    )]
    data_format: LayoutArg,

    #[arg(long, default_value_t = false, help = "Per-log-step stderr records")]
    verbose: bool,
}

pub fn fit_began(args: &TrainArgs) -> anyhow::Result<()> {
    let settings = TrainSettings {
        batch_size: args.batch_size,
        gamma: args.gamma,
        lambda_k: args.lambda_k,
        optimizer: args.optimizer.to_string(),
        beta1: args.beta1,
        beta2: args.beta2,
        g_lr: args.g_lr,
        d_lr: args.d_lr,
        lr_lower_boundary: args.lr_lower_boundary,
        start_step: 0,
        max_step: args.max_step,
        log_step: args.log_step,
        lr_update_step: args.lr_update_step,
        save_sec: args.save_sec,
        sample_nrow: args.sample_nrow,
        data_format: (&args.data_format).into(),
        show_progress: true,
        verbose: args.verbose,
    };
    // all configuration is checked before any data or model work
    settings.validate()?;

    let dims = ModelDims {
        scale: args.input_scale_size,
        channels: 3,
        z_num: args.z_num,
        hidden_num: args.conv_hidden_num,
    };

    let mut bundle = build_networks(&dims)?;
    let mut state = restore_or_fresh(&mut bundle, args.model_dir.as_ref(), args.g_lr, args.d_lr)?;

    info!(
        "loading training images from {} at {}x{}",
        args.data_dir, dims.scale, dims.scale
    );
    let mut data = FaceDirectoryData::from_dir(args.data_dir.as_ref(), dims.scale)?;
    info!("{} training images", data.num_samples());

    let model = BeganAutoencoder::build(
        &bundle.generator,
        &bundle.discriminator,
        &dims,
        settings.data_format,
        &bundle.device,
    )?;

    let mut trainer = BeganTrainer::build(
        &model,
        &bundle.gen_vars,
        &bundle.disc_vars,
        &settings,
        args.model_dir.as_ref(),
    )?;

    trainer.train(&mut data, &mut state)?;
    info!("training finished at step {}", state.step);
    Ok(())
}
