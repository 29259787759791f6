use crate::began_balance::BalanceState;

use anyhow::Context;
use candle_nn::VarMap;
use log::info;
use std::path::{Path, PathBuf};

const GENERATOR_FILE: &str = "generator.safetensors";
const DISCRIMINATOR_FILE: &str = "discriminator.safetensors";
const STATE_FILE: &str = "train_state.json";

fn paths(model_dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    (
        model_dir.join(GENERATOR_FILE),
        model_dir.join(DISCRIMINATOR_FILE),
        model_dir.join(STATE_FILE),
    )
}

pub fn checkpoint_exists<P: AsRef<Path>>(model_dir: P) -> bool {
    let (g, d, s) = paths(model_dir.as_ref());
    g.is_file() && d.is_file() && s.is_file()
}

/// Write an all-or-nothing snapshot of both parameter sets and the balance
/// state. Weights go to safetensors files, the scalar state to a JSON
/// sidecar.
pub fn save_checkpoint<P: AsRef<Path>>(
    model_dir: P,
    generator_vars: &VarMap,
    discriminator_vars: &VarMap,
    state: &BalanceState,
) -> anyhow::Result<()> {
    let model_dir = model_dir.as_ref();
    std::fs::create_dir_all(model_dir)
        .with_context(|| format!("creating {}", model_dir.display()))?;

    let (g, d, s) = paths(model_dir);
    generator_vars
        .save(&g)
        .with_context(|| format!("writing {}", g.display()))?;
    discriminator_vars
        .save(&d)
        .with_context(|| format!("writing {}", d.display()))?;

    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(&s, json).with_context(|| format!("writing {}", s.display()))?;

    info!("checkpoint saved at step {} in {}", state.step, model_dir.display());
    Ok(())
}

/// Restore the latest snapshot from `model_dir` into already-constructed
/// variable maps. Returns the persisted balance state, or `None` when no
/// checkpoint is present (fresh run).
pub fn restore_checkpoint<P: AsRef<Path>>(
    model_dir: P,
    generator_vars: &mut VarMap,
    discriminator_vars: &mut VarMap,
) -> anyhow::Result<Option<BalanceState>> {
    let model_dir = model_dir.as_ref();
    if !checkpoint_exists(model_dir) {
        return Ok(None);
    }

    let (g, d, s) = paths(model_dir);
    generator_vars
        .load(&g)
        .with_context(|| format!("reading {}", g.display()))?;
    discriminator_vars
        .load(&d)
        .with_context(|| format!("reading {}", d.display()))?;

    let json = std::fs::read_to_string(&s).with_context(|| format!("reading {}", s.display()))?;
    let state: BalanceState = serde_json::from_str(&json)?;

    info!(
        "checkpoint restored from {} (step {}, k_t {:.4})",
        model_dir.display(),
        state.step,
        state.k_t
    );
    Ok(Some(state))
}
