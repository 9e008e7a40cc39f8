//! Generic, model-agnostic RANSAC.
//!
//! Implement [`Estimator`] for a model and call [`ransac`]. The sampler is a
//! seeded `StdRng`, so identical inputs and options give identical results.
//! No consensus is reported as `success == false`, never as a panic.

use rand::seq::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Options for the RANSAC loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacOptions {
    /// Hard cap on iterations.
    pub max_iters: usize,
    /// Inlier residual threshold, in the estimator's residual units.
    pub thresh: f64,
    /// Minimum inlier count for a model to be accepted at all.
    pub min_inliers: usize,
    /// Desired probability of drawing at least one all-inlier sample.
    pub confidence: f64,
    /// Sampler seed.
    pub seed: u64,
    /// Refit each accepted model on its inliers and re-score.
    pub refit_on_inliers: bool,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            thresh: 3.0,
            min_inliers: 4,
            confidence: 0.995,
            seed: 0x5eed_ca11,
            refit_on_inliers: true,
        }
    }
}

/// Output of a RANSAC run. `model` is `Some` iff `success`.
#[derive(Clone, Debug)]
pub struct RansacResult<M> {
    pub success: bool,
    pub model: Option<M>,
    /// Indices of inlier data, ascending.
    pub inliers: Vec<usize>,
    /// Root-mean-square residual over inliers.
    pub inlier_rms: f64,
    /// Iterations actually run.
    pub iters: usize,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            success: false,
            model: None,
            inliers: Vec::new(),
            inlier_rms: f64::INFINITY,
            iters: 0,
        }
    }
}

/// A model that RANSAC can hypothesise from minimal samples.
pub trait Estimator {
    type Datum;
    type Model;

    /// Minimal sample size.
    const MIN_SAMPLES: usize;

    /// Fit from the data at `sample_indices`; `None` if the fit fails.
    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual of `datum` under `model`.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    fn is_degenerate(_data: &[Self::Datum], _sample_indices: &[usize]) -> bool {
        false
    }

    /// Fit on a full inlier set. Default: keep the minimal-sample model.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

fn rms(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::INFINITY;
    }
    let ss: f64 = vals.iter().map(|&v| v * v).sum();
    (ss / vals.len() as f64).sqrt()
}

/// Iteration bound for the current inlier ratio:
/// `log(1 - confidence) / log(1 - w^m)`, clamped to `[iters_so_far, max_iters]`.
fn calculate_iterations(
    confidence: f64,
    inlier_ratio: f64,
    min_samples: usize,
    iters_so_far: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || confidence >= 1.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }

    let denom = (1.0 - inlier_ratio.powi(min_samples as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }

    let n_iter = ((1.0 - confidence).ln() / denom).ceil() as usize;
    n_iter.clamp(iters_so_far, max_iters)
}

fn score<E: Estimator>(
    model: &E::Model,
    data: &[E::Datum],
    thresh: f64,
    inliers: &mut Vec<usize>,
    residuals: &mut Vec<f64>,
) {
    inliers.clear();
    residuals.clear();
    for (i, datum) in data.iter().enumerate() {
        let r = E::residual(model, datum);
        if r <= thresh {
            inliers.push(i);
            residuals.push(r);
        }
    }
}

/// Run RANSAC for estimator `E` over `data`.
///
/// Models are ranked by inlier count, ties broken by lower inlier RMS.
pub fn ransac<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> RansacResult<E::Model> {
    let mut best: RansacResult<E::Model> = RansacResult::default();

    if data.len() < E::MIN_SAMPLES {
        return best;
    }

    let all_indices: Vec<usize> = (0..data.len()).collect();
    let mut sample = vec![0usize; E::MIN_SAMPLES];
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let mut inliers = Vec::with_capacity(data.len());
    let mut residuals = Vec::with_capacity(data.len());
    let mut refined_inliers = Vec::with_capacity(data.len());
    let mut refined_residuals = Vec::with_capacity(data.len());

    let mut dynamic_max_iters = opts.max_iters;
    let mut iters = 0;
    while iters < dynamic_max_iters {
        iters += 1;

        for (slot, &idx) in sample
            .iter_mut()
            .zip(all_indices.choose_multiple(&mut rng, E::MIN_SAMPLES))
        {
            *slot = idx;
        }

        if E::is_degenerate(data, &sample) {
            continue;
        }
        let Some(model) = E::fit(data, &sample) else {
            continue;
        };

        score::<E>(&model, data, opts.thresh, &mut inliers, &mut residuals);
        if inliers.len() < opts.min_inliers.max(E::MIN_SAMPLES) {
            continue;
        }

        let mut candidate = model;
        let mut use_refined = false;
        if opts.refit_on_inliers {
            if let Some(refit) = E::refit(data, &inliers) {
                score::<E>(
                    &refit,
                    data,
                    opts.thresh,
                    &mut refined_inliers,
                    &mut refined_residuals,
                );
                // Keep the refit only when it does not lose support.
                if refined_inliers.len() >= inliers.len() {
                    candidate = refit;
                    use_refined = true;
                }
            }
        }
        let (final_inliers, final_residuals) = if use_refined {
            (&refined_inliers, &refined_residuals)
        } else {
            (&inliers, &residuals)
        };

        let final_rms = rms(final_residuals);
        let better = !best.success
            || final_inliers.len() > best.inliers.len()
            || (final_inliers.len() == best.inliers.len() && final_rms < best.inlier_rms);

        if better {
            best.success = true;
            best.model = Some(candidate);
            best.inliers = final_inliers.clone();
            best.inlier_rms = final_rms;
        }

        let inlier_ratio = best.inliers.len() as f64 / data.len() as f64;
        dynamic_max_iters = calculate_iterations(
            opts.confidence,
            inlier_ratio,
            E::MIN_SAMPLES,
            iters,
            opts.max_iters,
        );
    }

    best.iters = iters;
    best
}
