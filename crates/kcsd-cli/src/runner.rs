//! Estimation runner: ties together electrodes, model and output files.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use kcsd_compute::{ComputeBackend, CpuBackend, SerialBackend};
use kcsd_core::{Estimate, Kcsd3d, LambdaSelection};
use kcsd_geometry::parsers::recording::read_recording;
use kcsd_geometry::EstimationGrid;

use crate::config::{ComputeConfig, ElectrodeConfig, JobConfig};

/// Results from an estimation run.
pub struct RunOutput {
    pub grid: EstimationGrid,
    pub estimate: Estimate,
    pub summary: RunSummary,
}

/// Machine-readable description of a run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub version: &'static str,
    pub n_electrodes: usize,
    pub n_sources: usize,
    pub source_shape: [usize; 3],
    pub radius: f64,
    pub dist_max: f64,
    pub basis: String,
    pub sigma: f64,
    pub grid_shape: [usize; 3],
    pub lambda: f64,
    pub cross_validation: Option<LambdaSelection>,
}

/// Electrode positions and potentials named by the job.
pub fn load_electrodes(config: &ElectrodeConfig) -> Result<(Vec<[f64; 3]>, Vec<f64>)> {
    match config {
        ElectrodeConfig::Inline {
            positions,
            potentials,
        } => Ok((positions.clone(), potentials.clone())),
        ElectrodeConfig::File { recording_file } => {
            let samples = read_recording(recording_file)
                .with_context(|| format!("Cannot load recording {}", recording_file.display()))?;
            Ok(samples
                .into_iter()
                .map(|s| (s.position, s.potential))
                .unzip())
        }
    }
}

/// Validate a job and resolve the model without any matrix work.
pub fn build_model(job: &JobConfig) -> Result<Kcsd3d> {
    let (positions, potentials) = load_electrodes(&job.electrodes)?;
    Kcsd3d::new(positions, potentials, &job.model).context("Invalid model configuration")
}

/// Run a full estimation from a parsed job configuration.
pub fn run_estimation(job: &JobConfig) -> Result<RunOutput> {
    let model = build_model(job)?;
    println!("{}", model);

    let backend = create_backend(&job.compute)?;
    println!("Backend: {}", backend.device_info().name);

    let assembled = model
        .calculate_matrices_with(backend.as_ref())
        .context("Matrix assembly failed")?;

    let selection = match &job.cross_validation {
        Some(settings) => {
            let selection = assembled
                .choose_lambda_with(settings, backend.as_ref())
                .context("Cross-validation failed")?;
            println!(
                "  Cross-validation: lambda = {:.4e} ({} of {} candidates)",
                selection.lambda,
                selection.index + 1,
                settings.candidates.len()
            );
            Some(selection)
        }
        None => None,
    };
    let lambda = selection.as_ref().map_or(assembled.lambda(), |s| s.lambda);

    let estimate = assembled
        .estimate(lambda)
        .with_context(|| format!("Estimation failed at lambda = {lambda:e}"))?;

    let (nx, ny, nz) = model.grid().shape();
    let summary = RunSummary {
        version: env!("CARGO_PKG_VERSION"),
        n_electrodes: model.electrodes().len(),
        n_sources: model.sources().len(),
        source_shape: model.sources().shape(),
        radius: model.sources().radius(),
        dist_max: model.dist_max(),
        basis: model.basis().to_string(),
        sigma: model.sigma(),
        grid_shape: [nx, ny, nz],
        lambda,
        cross_validation: selection,
    };

    Ok(RunOutput {
        grid: model.grid().clone(),
        estimate,
        summary,
    })
}

/// Write the estimated potential and CSD to a CSV file, one grid point per row.
pub fn write_fields_csv(output: &RunOutput, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::io::BufWriter::new(
        std::fs::File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
    );
    let (nx, ny, nz) = output.grid.shape();
    writeln!(file, "# kCSD 3D estimate")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# Grid: {}x{}x{}", nx, ny, nz)?;
    writeln!(
        file,
        "# basis: {}, sigma: {}, lambda: {:e}",
        output.summary.basis, output.summary.sigma, output.estimate.lambda
    )?;
    writeln!(file, "#")?;
    writeln!(file, "x,y,z,potential,csd")?;

    // Array3 iteration is row-major, matching the flat grid order.
    for ((point, pot), csd) in output
        .grid
        .points()
        .iter()
        .zip(output.estimate.pots.iter())
        .zip(output.estimate.csd.iter())
    {
        writeln!(
            file,
            "{:.6},{:.6},{:.6},{:.6e},{:.6e}",
            point[0], point[1], point[2], pot, csd
        )?;
    }
    file.flush()?;

    println!("Fields written to: {}", path.display());
    Ok(())
}

/// Write the run summary as pretty-printed JSON.
pub fn write_summary_json(summary: &RunSummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;

    println!("Summary written to: {}", path.display());
    Ok(())
}

/// Create a compute backend from the job's `[compute]` table.
///
/// - `"cpu"` (default): Rayon fill, on a dedicated pool when `threads` is set.
/// - `"serial"`: single-threaded reference fill.
fn create_backend(config: &ComputeConfig) -> Result<Box<dyn ComputeBackend>> {
    match config.backend.as_str() {
        "cpu" => match config.threads {
            Some(n) => Ok(Box::new(CpuBackend::with_threads(n)?)),
            None => Ok(Box::new(CpuBackend::new())),
        },
        "serial" => Ok(Box::new(SerialBackend)),
        other => anyhow::bail!(
            "Unknown compute backend '{}'. Valid backends: cpu, serial",
            other
        ),
    }
}
