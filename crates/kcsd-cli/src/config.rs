//! TOML configuration deserialisation for estimation jobs.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use kcsd_core::{CrossValidation, KcsdParams};

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub electrodes: ElectrodeConfig,
    #[serde(default)]
    pub model: KcsdParams,
    #[serde(default)]
    pub compute: ComputeConfig,
    /// Cross-validate lambda before estimating; `model.lambda` is used when absent.
    pub cross_validation: Option<CrossValidation>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Electrode positions and potentials: inline arrays or a recording file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ElectrodeConfig {
    Inline {
        positions: Vec<[f64; 3]>,
        potentials: Vec<f64>,
    },
    File {
        /// Plain-text `x y z potential` table, relative to the job file.
        recording_file: PathBuf,
    },
}

/// Compute backend selection.
#[derive(Debug, Deserialize)]
pub struct ComputeConfig {
    /// Compute backend: "cpu" or "serial". Default: "cpu".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Worker threads for the CPU backend; the global pool when unset.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            threads: None,
        }
    }
}

fn default_backend() -> String {
    "cpu".into()
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save the estimated fields as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_fields: bool,
    /// Whether to save a JSON run summary (default: true).
    #[serde(default = "default_true")]
    pub save_summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_fields: true,
            save_summary: true,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

/// Load and parse a TOML job configuration file.
///
/// A relative `recording_file` is resolved against the job file's directory.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read job file {}", path.display()))?;
    let mut config: JobConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid job file {}", path.display()))?;

    if let ElectrodeConfig::File { recording_file } = &mut config.electrodes {
        if recording_file.is_relative() {
            if let Some(dir) = path.parent() {
                *recording_file = dir.join(&*recording_file);
            }
        }
    }
    Ok(config)
}
