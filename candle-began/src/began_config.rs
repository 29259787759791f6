use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Memory layout of image tensors on the public surface of the model.
/// Internally all convolutions run channel-first; channel-last input is
/// converted on the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    /// batch x height x width x channel
    Nhwc,
    /// batch x channel x height x width
    Nchw,
}

/// Inference entry points recognized by the test/inference path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestType {
    Encode,
    Interpolate,
}

impl std::str::FromStr for TestType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "encode" => Ok(Self::Encode),
            "interpolate" => Ok(Self::Interpolate),
            _ => bail!("test type `{}` is not supported for this method", s),
        }
    }
}

/// Static shape of the generator/discriminator pair
///
/// * `scale` - square image resolution (input and output)
/// * `channels` - image channels (3 for RGB faces)
/// * `z_num` - latent dimension
/// * `hidden_num` - base number of convolution filters
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ModelDims {
    pub scale: usize,
    pub channels: usize,
    pub z_num: usize,
    pub hidden_num: usize,
}

impl ModelDims {
    /// Number of up/down-sampling stages between the 8x8 bottleneck and
    /// the full resolution
    pub fn repeat_num(&self) -> usize {
        (self.scale as f64).log2() as usize - 2
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scale < 8 || !self.scale.is_power_of_two() {
            bail!(
                "input scale size must be a power of two >= 8, got {}",
                self.scale
            );
        }
        if self.channels == 0 || self.z_num == 0 || self.hidden_num == 0 {
            bail!("channels, z_num and hidden_num must all be positive");
        }
        Ok(())
    }
}

/// Training schedule and optimization constants
#[derive(Clone, Debug)]
pub struct TrainSettings {
    pub batch_size: usize,

    /// diversity ratio of the equilibrium `gamma * d_loss_real = g_loss`
    pub gamma: f64,
    /// proportional gain of the k_t feedback update
    pub lambda_k: f64,

    pub optimizer: String,
    pub beta1: f64,
    pub beta2: f64,

    pub g_lr: f64,
    pub d_lr: f64,
    pub lr_lower_boundary: f64,

    pub start_step: usize,
    pub max_step: usize,
    pub log_step: usize,
    pub lr_update_step: usize,
    /// seconds between periodic checkpoint writes
    pub save_sec: u64,

    /// images per row in persisted sample grids
    pub sample_nrow: usize,

    pub data_format: DataFormat,

    pub show_progress: bool,
    pub verbose: bool,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            batch_size: 16,
            gamma: 0.5,
            lambda_k: 0.001,
            optimizer: "adam".to_string(),
            beta1: 0.5,
            beta2: 0.999,
            g_lr: 8e-5,
            d_lr: 8e-5,
            lr_lower_boundary: 2e-5,
            start_step: 0,
            max_step: 500_000,
            log_step: 50,
            lr_update_step: 100_000,
            save_sec: 300,
            sample_nrow: 8,
            data_format: DataFormat::Nhwc,
            show_progress: true,
            verbose: false,
        }
    }
}

impl TrainSettings {
    /// Fail fast on unsupported settings, before any model is constructed.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.optimizer != "adam" {
            bail!(
                "the boundary-equilibrium method was only trained with the \
		 `adam` optimizer; `{}` is not supported",
                self.optimizer
            );
        }
        if !(0.0..=1.0).contains(&self.gamma) || self.gamma == 0.0 {
            bail!("gamma must lie in (0, 1], got {}", self.gamma);
        }
        if self.lambda_k <= 0.0 {
            bail!("lambda_k must be positive, got {}", self.lambda_k);
        }
        if self.batch_size == 0 {
            bail!("batch size must be positive");
        }
        if self.log_step == 0 || self.lr_update_step == 0 {
            bail!("log_step and lr_update_step must be positive");
        }
        if self.max_step <= self.start_step {
            bail!(
                "max_step ({}) must exceed start_step ({})",
                self.max_step,
                self.start_step
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        TrainSettings::default().validate().unwrap();
    }

    #[test]
    fn non_adam_optimizer_is_rejected() {
        let settings = TrainSettings {
            optimizer: "sgd".to_string(),
            ..TrainSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn unknown_test_type_is_rejected() {
        assert!("encode".parse::<TestType>().is_ok());
        assert!("interpolate".parse::<TestType>().is_ok());
        assert!("train".parse::<TestType>().is_err());
    }

    #[test]
    fn repeat_num_matches_resolution() {
        let dims = ModelDims {
            scale: 64,
            channels: 3,
            z_num: 64,
            hidden_num: 128,
        };
        dims.validate().unwrap();
        assert_eq!(dims.repeat_num(), 4);
    }

    #[test]
    fn odd_scale_is_rejected() {
        let dims = ModelDims {
            scale: 48,
            channels: 3,
            z_num: 64,
            hidden_num: 128,
        };
        assert!(dims.validate().is_err());
    }
}
