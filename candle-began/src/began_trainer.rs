use crate::began_autoencoder::{nchw_to_nhwc, nhwc_to_nchw, norm_img};
use crate::began_balance::{BalanceController, BalanceState};
use crate::began_checkpoint::save_checkpoint;
use crate::began_config::TrainSettings;
use crate::began_data_loader::ImageBatchLoader;
use crate::began_image_io::{batch_to_rgb, save_image_grid};
use crate::began_model_traits::{DiscriminatorModuleT, GeneratorModuleT};

use anyhow::bail;
use candle_core::Tensor;
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::began_autoencoder::BeganAutoencoder;

/// Boundary-equilibrium adversarial training loop
///
/// Runs the per-step discriminator/generator updates, the k_t feedback
/// controller, the learning-rate decay schedule, periodic sample grids and
/// time-based checkpointing. Any non-finite loss aborts the run; restarting
/// from the last checkpoint is an operator decision, not ours.
pub struct BeganTrainer<'a, G, D>
where
    G: GeneratorModuleT,
    D: DiscriminatorModuleT,
{
    model: &'a BeganAutoencoder<'a, G, D>,
    generator_vars: &'a VarMap,
    discriminator_vars: &'a VarMap,
    controller: BalanceController,
    settings: &'a TrainSettings,
    model_dir: PathBuf,
}

impl<'a, G, D> BeganTrainer<'a, G, D>
where
    G: GeneratorModuleT,
    D: DiscriminatorModuleT,
{
    pub fn build<P: AsRef<Path>>(
        model: &'a BeganAutoencoder<'a, G, D>,
        generator_vars: &'a VarMap,
        discriminator_vars: &'a VarMap,
        settings: &'a TrainSettings,
        model_dir: P,
    ) -> anyhow::Result<Self> {
        settings.validate()?;
        Ok(Self {
            model,
            generator_vars,
            discriminator_vars,
            controller: BalanceController::new(settings.gamma, settings.lambda_k),
            settings,
            model_dir: model_dir.as_ref().to_path_buf(),
        })
    }

    /// Train from `state.step` up to `max_step`, mutating `state` in place.
    /// Returns the per-step convergence measure trace.
    pub fn train<DataL>(
        &mut self,
        data: &mut DataL,
        state: &mut BalanceState,
    ) -> anyhow::Result<Vec<f64>>
    where
        DataL: ImageBatchLoader,
    {
        let cfg = self.settings;
        if state.step >= cfg.max_step {
            bail!(
                "nothing to train: checkpoint is already at step {} of {}",
                state.step,
                cfg.max_step
            );
        }
        let device = self.model.device().clone();
        let z_num = self.model.dims().z_num;

        std::fs::create_dir_all(&self.model_dir)?;

        let mut g_optimizer = AdamW::new(
            self.generator_vars.all_vars(),
            adam_params(state.g_lr, cfg),
        )?;
        let mut d_optimizer = AdamW::new(
            self.discriminator_vars.all_vars(),
            adam_params(state.d_lr, cfg),
        )?;

        // fixed noise and a fixed real batch for visual regression tracking
        let z_fixed = Tensor::rand(-1f32, 1f32, (cfg.batch_size, z_num), &device)?;
        let x_fixed = data.fixed_batch(cfg.batch_size, &device)?;
        self.save_pixel_batch(&x_fixed, self.model_dir.join("x_fixed.png"))?;

        let mut measure_history: VecDeque<f64> = VecDeque::with_capacity(cfg.lr_update_step);
        let mut measure_trace = Vec::with_capacity(cfg.max_step - state.step);

        data.shuffle_minibatch(cfg.batch_size)?;
        let mut batch_idx = 0usize;

        let pb = ProgressBar::new((cfg.max_step - state.step) as u64);
        if !cfg.show_progress || cfg.verbose {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let mut last_save = Instant::now();

        for step in state.step..cfg.max_step {
            if batch_idx >= data.num_minibatch() {
                data.shuffle_minibatch(cfg.batch_size)?;
                batch_idx = 0;
            }
            let batch = data.minibatch_images(batch_idx, &device)?;
            batch_idx += 1;

            let x = norm_img(&nhwc_to_nchw(&batch)?)?;
            let z = Tensor::rand(-1f32, 1f32, (cfg.batch_size, z_num), &device)?;

            let g = self.model.generator.forward(&z)?;
            let (recon_real, _) = self.model.discriminator.forward(&x)?;
            let (recon_fake, _) = self.model.discriminator.forward(&g)?;

            let d_loss_real = recon_real.sub(&x)?.abs()?.mean_all()?;
            let d_loss_fake = recon_fake.sub(&g)?.abs()?.mean_all()?;
            // the generator objective is the fake reconstruction error,
            // optimized over generator weights only
            let g_loss = &d_loss_fake;
            let d_loss = (&d_loss_real - (&d_loss_fake * state.k_t)?)?;

            d_optimizer.backward_step(&d_loss)?;
            g_optimizer.backward_step(g_loss)?;

            let d_loss_real_val = d_loss_real.to_scalar::<f32>()? as f64;
            let g_loss_val = d_loss_fake.to_scalar::<f32>()? as f64;
            let d_loss_val = d_loss.to_scalar::<f32>()? as f64;
            if !d_loss_real_val.is_finite() || !g_loss_val.is_finite() {
                bail!(
                    "numeric divergence at step {}: d_loss_real = {}, g_loss = {}",
                    step,
                    d_loss_real_val,
                    g_loss_val
                );
            }

            let update = self
                .controller
                .update(state, d_loss_real_val, g_loss_val);
            state.step = step + 1;

            if measure_history.len() == cfg.lr_update_step {
                measure_history.pop_front();
            }
            measure_history.push_back(update.measure);
            measure_trace.push(update.measure);

            if step % cfg.log_step == 0 {
                info!(
                    "[{}/{}] Loss_D: {:.6} Loss_G: {:.6} measure: {:.4} k_t: {:.4}",
                    step, cfg.max_step, d_loss_val, g_loss_val, update.measure, state.k_t
                );
            }

            if step % (cfg.log_step * 10) == 0 {
                self.save_step_samples(step, &z_fixed, &x_fixed)?;
            }

            if step % cfg.lr_update_step == cfg.lr_update_step - 1 {
                self.controller
                    .decay_learning_rates(state, cfg.lr_lower_boundary);
                g_optimizer.set_learning_rate(state.g_lr);
                d_optimizer.set_learning_rate(state.d_lr);
                info!(
                    "learning rates decayed: g_lr {:.2e} d_lr {:.2e}",
                    state.g_lr, state.d_lr
                );
            }

            if last_save.elapsed().as_secs() >= cfg.save_sec {
                save_checkpoint(
                    &self.model_dir,
                    self.generator_vars,
                    self.discriminator_vars,
                    state,
                )?;
                last_save = Instant::now();
            }

            pb.inc(1);
        }
        pb.finish_and_clear();

        save_checkpoint(
            &self.model_dir,
            self.generator_vars,
            self.discriminator_vars,
            state,
        )?;
        Ok(measure_trace)
    }

    /// Decode the fixed noise batch and autoencode the fixed real batch,
    /// persisting sample grids for this step
    fn save_step_samples(
        &self,
        step: usize,
        z_fixed: &Tensor,
        x_fixed: &Tensor,
    ) -> anyhow::Result<()> {
        let x_fake = self.model.generate(z_fixed)?;
        self.save_pixel_batch(&x_fake, self.model_dir.join(format!("{}_G.png", step)))?;

        let ae_real = self.model.reconstruct(x_fixed)?;
        self.save_pixel_batch(&ae_real, self.model_dir.join(format!("{}_D_real.png", step)))?;

        let ae_fake = self.model.reconstruct(&x_fake)?;
        self.save_pixel_batch(&ae_fake, self.model_dir.join(format!("{}_D_fake.png", step)))?;
        Ok(())
    }

    /// Write a pixel-range batch (model surface layout) as a grid image
    fn save_pixel_batch<P: AsRef<Path>>(&self, batch: &Tensor, path: P) -> anyhow::Result<()> {
        use crate::began_config::DataFormat;
        let nhwc = match self.settings.data_format {
            DataFormat::Nhwc => batch.clone(),
            DataFormat::Nchw => nchw_to_nhwc(batch)?,
        };
        let images = batch_to_rgb(&nhwc)?;
        save_image_grid(&images, path.as_ref(), self.settings.sample_nrow)?;
        info!("samples saved: {}", path.as_ref().display());
        Ok(())
    }
}

fn adam_params(lr: f64, cfg: &TrainSettings) -> ParamsAdamW {
    ParamsAdamW {
        lr,
        beta1: cfg.beta1,
        beta2: cfg.beta2,
        weight_decay: 0.0,
        ..Default::default()
    }
}
