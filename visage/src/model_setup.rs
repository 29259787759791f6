use candle_began::began_balance::BalanceState;
use candle_began::began_checkpoint::restore_checkpoint;
use candle_began::began_config::ModelDims;
use candle_began::began_networks::{ConvDiscriminator, ConvGenerator};

use candle_began::candle_core::{DType, Device};
use candle_began::candle_nn::{VarBuilder, VarMap};
use log::warn;
use std::path::Path;

/// Generator/discriminator pair with their parameter maps, ready for
/// training or inference
pub struct ModelBundle {
    pub dims: ModelDims,
    pub device: Device,
    pub gen_vars: VarMap,
    pub disc_vars: VarMap,
    pub generator: ConvGenerator,
    pub discriminator: ConvDiscriminator,
}

pub fn build_networks(dims: &ModelDims) -> anyhow::Result<ModelBundle> {
    dims.validate()?;
    let device = Device::Cpu;

    let gen_vars = VarMap::new();
    let disc_vars = VarMap::new();
    let generator = ConvGenerator::new(
        dims,
        VarBuilder::from_varmap(&gen_vars, DType::F32, &device),
    )?;
    let discriminator = ConvDiscriminator::new(
        dims,
        VarBuilder::from_varmap(&disc_vars, DType::F32, &device),
    )?;

    Ok(ModelBundle {
        dims: *dims,
        device,
        gen_vars,
        disc_vars,
        generator,
        discriminator,
    })
}

/// Restore weights and balance state from `model_dir` when a checkpoint is
/// present; otherwise start fresh with the given learning rates.
pub fn restore_or_fresh<P: AsRef<Path>>(
    bundle: &mut ModelBundle,
    model_dir: P,
    g_lr: f64,
    d_lr: f64,
) -> anyhow::Result<BalanceState> {
    match restore_checkpoint(&model_dir, &mut bundle.gen_vars, &mut bundle.disc_vars)? {
        Some(state) => Ok(state),
        None => {
            warn!(
                "no checkpoint under {}; starting from random weights",
                model_dir.as_ref().display()
            );
            Ok(BalanceState::new(g_lr, d_lr))
        }
    }
}
