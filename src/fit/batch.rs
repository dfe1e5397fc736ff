//! Parallel fitting of independent jobs.

use rayon::prelude::*;

use crate::domain::{FitConfig, FitResult, ModelSpec, NormalizedDataset};
use crate::error::FitError;
use crate::fit::fit;

/// One independent fit: a dataset, a model and its configuration.
#[derive(Debug, Clone)]
pub struct FitJob {
    /// Free-form label (e.g. the input file name) carried into reports.
    pub label: String,
    pub data: NormalizedDataset,
    pub model: ModelSpec,
    pub config: FitConfig,
}

/// Fit every job in parallel.
///
/// Returns one `Result` per job in input order; a failing job never aborts the others.
pub fn fit_batch(jobs: &[FitJob]) -> Vec<Result<FitResult, FitError>> {
    jobs.par_iter()
        .map(|job| {
            let out = fit(&job.data, &job.model, &job.config);
            if let Err(err) = &out {
                tracing::warn!(label = %job.label, "fit failed: {err}");
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SweepSpec, generate_sweep};
    use crate::domain::SimmonsParams;

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let model = ModelSpec::Simmons(SimmonsParams {
            barrier_height: 1.0,
            thickness: 1.5,
        });
        let good = generate_sweep(&SweepSpec::new(model, -0.4, 0.4, 41)).unwrap();
        let tiny = NormalizedDataset::from_density(vec![0.1], vec![1.0], None).unwrap();

        let jobs = vec![
            FitJob {
                label: "good".into(),
                data: good.clone(),
                model,
                config: FitConfig::default(),
            },
            FitJob {
                label: "tiny".into(),
                data: tiny,
                model,
                config: FitConfig::default(),
            },
            FitJob {
                label: "good again".into(),
                data: good,
                model,
                config: FitConfig::default(),
            },
        ];
        let results = fit_batch(&jobs);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(FitError::InvalidData(_))));
        let (a, b) = (results[0].as_ref().unwrap(), results[2].as_ref().unwrap());
        assert_eq!(a.model().values(), b.model().values());
    }
}
