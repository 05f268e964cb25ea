//! Selection of the regularisation parameter by cross-validation.
//!
//! Electrodes are split into folds. For every fold the kernel system is
//! solved on the remaining (training) electrodes and the held-out potentials
//! are predicted through the cross kernel:
//!
//! $$
//! \hat{\mathbf{v}}_{\text{test}} = K[\text{test}, \text{train}]
//! \,(K[\text{train}, \text{train}] + \lambda I)^{-1}\,\mathbf{v}_{\text{train}}
//! $$
//!
//! The error of a candidate $\lambda$ is the sum of squared residuals over
//! all folds, averaged over repeated partitions. The candidate with the
//! smallest error wins; ties go to the earliest candidate.

use std::sync::{Mutex, PoisonError};

use kcsd_compute::{default_backend, ComputeBackend};
use log::{debug, info};
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::KcsdError;
use crate::solver::direct::solve_regularised;

/// Number of candidates in [`default_lambdas`].
const DEFAULT_LAMBDA_COUNT: i32 = 20;

/// How electrodes are ordered before being cut into contiguous folds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FoldStrategy {
    /// Electrodes keep their input order; every iteration sees the same folds.
    #[default]
    Sequential,
    /// Electrodes are shuffled by a seeded generator before each iteration.
    Shuffled { seed: u64 },
}

/// Cross-validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrossValidation {
    /// Candidate regularisation parameters, in order of preference on ties.
    pub candidates: Vec<f64>,
    /// Number of folds; 1 (or at least the electrode count) means leave-one-out.
    pub n_folds: usize,
    /// Number of repeated partitions to average over.
    pub n_iter: usize,
    pub folds: FoldStrategy,
}

impl Default for CrossValidation {
    fn default() -> Self {
        Self {
            candidates: default_lambdas(),
            n_folds: 1,
            n_iter: 1,
            folds: FoldStrategy::Sequential,
        }
    }
}

/// Result of a regularisation search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LambdaSelection {
    /// The chosen regularisation parameter.
    pub lambda: f64,
    /// Index of the chosen parameter among the candidates.
    pub index: usize,
    /// Mean error of every candidate, in candidate order.
    pub errors: Vec<f64>,
}

/// Candidates $1, 1/2, 1/4, \ldots, 2^{-19}$.
pub fn default_lambdas() -> Vec<f64> {
    (0..DEFAULT_LAMBDA_COUNT).map(|n| 0.5_f64.powi(n)).collect()
}

/// Cut `order` into contiguous folds.
///
/// `n_folds == 1` or `n_folds >= order.len()` gives one fold per electrode.
/// Otherwise the first `len % n_folds` folds hold one extra electrode.
pub fn partition_folds(order: &[usize], n_folds: usize) -> Vec<Vec<usize>> {
    let n = order.len();
    if n_folds <= 1 || n_folds >= n {
        return order.iter().map(|&i| vec![i]).collect();
    }

    let base = n / n_folds;
    let extra = n % n_folds;
    let mut folds = Vec::with_capacity(n_folds);
    let mut start = 0;
    for k in 0..n_folds {
        let size = base + usize::from(k < extra);
        folds.push(order[start..start + size].to_vec());
        start += size;
    }
    folds
}

/// Partitions for every iteration, drawn up front.
pub fn draw_partitions(n_electrodes: usize, settings: &CrossValidation) -> Vec<Vec<Vec<usize>>> {
    let identity: Vec<usize> = (0..n_electrodes).collect();
    match settings.folds {
        FoldStrategy::Sequential => {
            let folds = partition_folds(&identity, settings.n_folds);
            vec![folds; settings.n_iter]
        }
        FoldStrategy::Shuffled { seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..settings.n_iter)
                .map(|_| {
                    let mut order = identity.clone();
                    order.shuffle(&mut rng);
                    partition_folds(&order, settings.n_folds)
                })
                .collect()
        }
    }
}

/// Sum of squared residuals of the held-out electrodes in `test`.
pub fn fold_error(
    k_pot: ArrayView2<'_, f64>,
    potentials: ArrayView1<'_, f64>,
    test: &[usize],
    lambda: f64,
) -> Result<f64, KcsdError> {
    let train: Vec<usize> = (0..potentials.len())
        .filter(|i| !test.contains(i))
        .collect();

    let k_train = k_pot.select(Axis(0), &train).select(Axis(1), &train);
    let v_train = potentials.select(Axis(0), &train);
    let beta = solve_regularised(k_train.view(), lambda, v_train.view())?;

    let k_cross = k_pot.select(Axis(0), test).select(Axis(1), &train);
    let predicted = k_cross.dot(&beta);
    let observed = potentials.select(Axis(0), test);

    Ok((&observed - &predicted).mapv(|r| r * r).sum())
}

/// Total error of one candidate over a single partition.
pub fn cross_validation_error(
    k_pot: ArrayView2<'_, f64>,
    potentials: ArrayView1<'_, f64>,
    folds: &[Vec<usize>],
    lambda: f64,
) -> Result<f64, KcsdError> {
    let mut total = 0.0;
    for test in folds {
        total += fold_error(k_pot, potentials, test, lambda)?;
    }
    Ok(total)
}

/// Pick the candidate with the smallest cross-validation error, scoring
/// candidates on the default backend.
pub fn choose_lambda(
    k_pot: ArrayView2<'_, f64>,
    potentials: ArrayView1<'_, f64>,
    settings: &CrossValidation,
) -> Result<LambdaSelection, KcsdError> {
    choose_lambda_with(k_pot, potentials, settings, &default_backend())
}

/// Pick the candidate with the smallest cross-validation error.
///
/// Each candidate is one row of a `candidates x 1` fill on `backend`. When
/// several candidates fail, the error of the earliest one is returned.
///
/// # Errors
/// Returns [`KcsdError::Configuration`] for empty or negative candidates,
/// zero folds or iterations, fewer than two electrodes, or a kernel whose
/// size does not match the potentials. Solver errors of any fold propagate.
pub fn choose_lambda_with(
    k_pot: ArrayView2<'_, f64>,
    potentials: ArrayView1<'_, f64>,
    settings: &CrossValidation,
    backend: &dyn ComputeBackend,
) -> Result<LambdaSelection, KcsdError> {
    validate(k_pot, potentials, settings)?;

    let partitions = draw_partitions(potentials.len(), settings);
    debug!(
        "Cross-validating {} candidates over {} iteration(s) of {} fold(s)",
        settings.candidates.len(),
        partitions.len(),
        partitions.first().map_or(0, Vec::len)
    );

    let failure: Mutex<Option<(usize, KcsdError)>> = Mutex::new(None);
    let scores = backend.parallel_matrix_fill(settings.candidates.len(), 1, &|i, _| {
        match mean_error(k_pot, potentials, &partitions, settings.candidates[i]) {
            Ok(error) => error,
            Err(err) => {
                let mut slot = failure.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.as_ref().map_or(true, |(first, _)| i < *first) {
                    *slot = Some((i, err));
                }
                f64::NAN
            }
        }
    })?;
    if let Some((_, err)) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
        return Err(err);
    }
    let errors: Vec<f64> = scores.iter().copied().collect();

    let index = first_minimum(&errors);
    let lambda = settings.candidates[index];
    info!(
        "Cross-validation selected lambda = {:.4e} (error {:.4e})",
        lambda, errors[index]
    );

    Ok(LambdaSelection {
        lambda,
        index,
        errors,
    })
}

/// Error of one candidate averaged over every partition.
fn mean_error(
    k_pot: ArrayView2<'_, f64>,
    potentials: ArrayView1<'_, f64>,
    partitions: &[Vec<Vec<usize>>],
    lambda: f64,
) -> Result<f64, KcsdError> {
    let mut total = 0.0_f64;
    for folds in partitions {
        total += cross_validation_error(k_pot, potentials, folds, lambda)?;
    }
    Ok(total / partitions.len() as f64)
}

/// Index of the smallest value; the earliest wins on ties.
pub fn first_minimum(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &value) in values.iter().enumerate().skip(1) {
        if value < values[best] {
            best = i;
        }
    }
    best
}

fn validate(
    k_pot: ArrayView2<'_, f64>,
    potentials: ArrayView1<'_, f64>,
    settings: &CrossValidation,
) -> Result<(), KcsdError> {
    if settings.candidates.is_empty() {
        return Err(KcsdError::Configuration(
            "Cross-validation needs at least one lambda candidate".into(),
        ));
    }
    if let Some(bad) = settings
        .candidates
        .iter()
        .find(|l| !l.is_finite() || **l < 0.0)
    {
        return Err(KcsdError::Configuration(format!(
            "lambda candidates must be finite and non-negative, got {bad}"
        )));
    }
    if settings.n_folds == 0 {
        return Err(KcsdError::Configuration("n_folds must be at least 1".into()));
    }
    if settings.n_iter == 0 {
        return Err(KcsdError::Configuration("n_iter must be at least 1".into()));
    }
    if potentials.len() < 2 {
        return Err(KcsdError::Configuration(format!(
            "Cross-validation needs at least 2 electrodes, got {}",
            potentials.len()
        )));
    }
    if k_pot.dim() != (potentials.len(), potentials.len()) {
        return Err(KcsdError::Configuration(format!(
            "Kernel is {}x{} but {} potentials were given",
            k_pot.nrows(),
            k_pot.ncols(),
            potentials.len()
        )));
    }
    Ok(())
}
