use serde::{Deserialize, Serialize};

/// Mutable training state carried across steps and persisted in checkpoints:
/// the k_t feedback variable, both learning rates and the step counter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceState {
    pub k_t: f64,
    pub g_lr: f64,
    pub d_lr: f64,
    pub step: usize,
}

impl BalanceState {
    pub fn new(g_lr: f64, d_lr: f64) -> Self {
        Self {
            k_t: 0.0,
            g_lr,
            d_lr,
            step: 0,
        }
    }
}

/// Outcome of one k_t update
#[derive(Clone, Copy, Debug)]
pub struct BalanceUpdate {
    pub balance: f64,
    /// convergence proxy `d_loss_real + |balance|`
    pub measure: f64,
}

/// Proportional feedback controller keeping generator and discriminator
/// improving at comparable rates. Drives k_t so that
/// `gamma * d_loss_real ~= g_loss` at equilibrium.
#[derive(Clone, Copy, Debug)]
pub struct BalanceController {
    pub gamma: f64,
    pub lambda_k: f64,
}

impl BalanceController {
    pub fn new(gamma: f64, lambda_k: f64) -> Self {
        Self { gamma, lambda_k }
    }

    /// Apply one update after an optimizer step.
    ///
    /// k_t is clamped to [0, 1]; arbitrarily large `balance` excursions
    /// saturate rather than wrap.
    pub fn update(&self, state: &mut BalanceState, d_loss_real: f64, g_loss: f64) -> BalanceUpdate {
        let balance = self.gamma * d_loss_real - g_loss;
        let measure = d_loss_real + balance.abs();
        state.k_t = (state.k_t + self.lambda_k * balance).clamp(0.0, 1.0);
        BalanceUpdate { balance, measure }
    }

    /// Halve both learning rates, floored at `lr_lower_boundary`.
    pub fn decay_learning_rates(&self, state: &mut BalanceState, lr_lower_boundary: f64) {
        state.g_lr = (state.g_lr * 0.5).max(lr_lower_boundary);
        state.d_lr = (state.d_lr * 0.5).max(lr_lower_boundary);
    }
}
