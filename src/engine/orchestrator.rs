//! Runs every comparison of a batch with per-item failure isolation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::annotate::{annotate, FeatureLookup};
use super::fitter::ContrastFitter;
use super::persist::ArtifactPersister;
use super::subset::DatasetSubsetter;
use crate::comparison::ComparisonSpec;
use crate::data::BaseDataset;
use crate::error::{BatchError, ErrorKind, Result};
use crate::io::ContrastResult;
use crate::model::ModelSelector;

/// Batch-level options
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Run comparisons on the rayon pool; outcome order still follows the specs
    pub parallel: bool,
    pub selector: ModelSelector,
    /// Adjusted p-value cutoff for plots and significant sets
    pub alpha: f64,
    /// Absolute log2 effect cutoff for plots and significant sets
    pub lfc: f64,
    /// Rows per comparison in the console summary
    pub top_n: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            selector: ModelSelector::default(),
            alpha: 0.05,
            lfc: 1.0,
            top_n: 10,
        }
    }
}

/// Shared flag checked before each comparison starts
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why one comparison produced no result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub comparison_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl FailureRecord {
    pub fn from_error(comparison_id: &str, err: &BatchError) -> Self {
        Self {
            comparison_id: comparison_id.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

pub type ComparisonOutcome = std::result::Result<ContrastResult, FailureRecord>;

/// Every comparison's result or failure, in spec order
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    entries: Vec<(String, ComparisonOutcome)>,
}

impl BatchOutcome {
    pub fn entries(&self) -> &[(String, ComparisonOutcome)] {
        &self.entries
    }

    pub fn get(&self, comparison_id: &str) -> Option<&ComparisonOutcome> {
        self.entries
            .iter()
            .find(|(id, _)| id == comparison_id)
            .map(|(_, outcome)| outcome)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &ContrastResult> {
        self.entries.iter().filter_map(|(_, o)| o.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.entries.iter().filter_map(|(_, o)| o.as_ref().err())
    }

    pub fn n_succeeded(&self) -> usize {
        self.successes().count()
    }

    pub fn n_failed(&self) -> usize {
        self.failures().count()
    }
}

/// Subset, select formula, fit, annotate and persist each comparison
pub struct BatchOrchestrator {
    config: BatchConfig,
    subsetter: DatasetSubsetter,
    fitter: ContrastFitter,
    cancel: CancelToken,
}

impl BatchOrchestrator {
    pub fn new(config: BatchConfig) -> Self {
        Self::with_fitter(config, ContrastFitter::default())
    }

    pub fn with_fitter(config: BatchConfig, fitter: ContrastFitter) -> Self {
        Self {
            config,
            subsetter: DatasetSubsetter,
            fitter,
            cancel: CancelToken::new(),
        }
    }

    /// Share an external cancellation flag
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run all specs; no single failure stops the batch
    pub fn run(
        &self,
        specs: &[ComparisonSpec],
        base: &BaseDataset,
        lookup: &dyn FeatureLookup,
        persister: &dyn ArtifactPersister,
    ) -> BatchOutcome {
        log::info!(
            "Running {} comparisons on {} features x {} samples{}",
            specs.len(),
            base.n_features(),
            base.n_samples(),
            if self.config.parallel { " in parallel" } else { "" }
        );

        let total = specs.len();
        let run_item = |(i, spec): (usize, &ComparisonSpec)| {
            (spec.id.clone(), self.run_item(i + 1, total, spec, base, lookup, persister))
        };
        let entries: Vec<(String, ComparisonOutcome)> = if self.config.parallel {
            specs.par_iter().enumerate().map(run_item).collect()
        } else {
            specs.iter().enumerate().map(run_item).collect()
        };

        let outcome = BatchOutcome { entries };
        log::info!(
            "Batch finished: {} succeeded, {} failed",
            outcome.n_succeeded(),
            outcome.n_failed()
        );
        outcome
    }

    fn run_item(
        &self,
        position: usize,
        total: usize,
        spec: &ComparisonSpec,
        base: &BaseDataset,
        lookup: &dyn FeatureLookup,
        persister: &dyn ArtifactPersister,
    ) -> ComparisonOutcome {
        if self.cancel.is_cancelled() {
            log::info!("[{}/{}] {}: cancelled", position, total, spec.id);
            return Err(FailureRecord::from_error(&spec.id, &BatchError::Cancelled));
        }

        log::info!("[{}/{}] {}", position, total, spec);
        let result = self.compare(spec, base, lookup).and_then(|result| {
            persister.persist(&result)?;
            Ok(result)
        });

        result.map_err(|e| {
            log::warn!("Comparison {} failed ({}): {}", spec.id, e.kind(), e);
            FailureRecord::from_error(&spec.id, &e)
        })
    }

    /// The subset lives only for the duration of this call
    fn compare(&self, spec: &ComparisonSpec, base: &BaseDataset, lookup: &dyn FeatureLookup) -> Result<ContrastResult> {
        let subset = self
            .subsetter
            .subset(base, &spec.hold_constant_factor, &spec.hold_constant_value)?;
        let formula = self.config.selector.select_formula(&spec.varying_factor)?;
        let fitted = self.fitter.fit(&subset, &formula, &spec.level_a, &spec.level_b)?;

        let result = annotate(
            &spec.id,
            &fitted.formula.to_string(),
            spec.contrast(),
            fitted.rows,
            lookup,
        );
        log::debug!("{}: {}", spec.id, result.summary(self.config.alpha));
        Ok(result)
    }
}
