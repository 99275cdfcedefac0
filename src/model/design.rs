//! Design matrix construction and contrast vectors

use ndarray::{Array1, Array2};
use std::collections::HashMap;

use super::ModelFormula;
use crate::data::SampleMetadata;
use crate::error::{BatchError, Result};

/// Treatment-coded design matrix with column bookkeeping
#[derive(Debug, Clone)]
pub struct Design {
    /// Samples x coefficients
    pub matrix: Array2<f64>,
    /// Coefficient names, `Intercept` first, then `<factor>_<level>_vs_<reference>`
    pub coef_names: Vec<String>,
    /// Formula the matrix was built from (blocking may have been dropped)
    pub formula: ModelFormula,
    /// Factor -> (level -> column) for every non-reference level
    pub factor_columns: HashMap<String, HashMap<String, usize>>,
    /// Reference (alphabetically first) level of each factor
    pub reference_levels: HashMap<String, String>,
}

impl Design {
    pub fn n_coefs(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    /// Residual degrees of freedom
    pub fn residual_df(&self) -> usize {
        self.n_samples().saturating_sub(self.n_coefs())
    }

    /// Contrast vector c with c'beta = log(level_a) - log(level_b) on `factor`
    pub fn contrast_vector(&self, factor: &str, level_a: &str, level_b: &str) -> Result<Array1<f64>> {
        let columns = self.factor_columns.get(factor).ok_or_else(|| BatchError::InvalidContrast {
            reason: format!("factor '{}' is not in the model {}", factor, self.formula),
        })?;
        let reference = &self.reference_levels[factor];

        let column_of = |level: &str| -> Result<Option<usize>> {
            if level == reference {
                Ok(None)
            } else {
                columns.get(level).copied().map(Some).ok_or_else(|| BatchError::InvalidContrast {
                    reason: format!("level '{}' of '{}' has no samples in this subset", level, factor),
                })
            }
        };

        let mut c = Array1::zeros(self.n_coefs());
        if let Some(j) = column_of(level_a)? {
            c[j] += 1.0;
        }
        if let Some(j) = column_of(level_b)? {
            c[j] -= 1.0;
        }
        Ok(c)
    }
}

/// Build the design for `formula` over the given samples.
///
/// Blocking terms with a single level add no columns. If the blocked design is
/// rank deficient or leaves no residual degrees of freedom, the blocking terms
/// are dropped and the variable is fitted alone.
pub fn build_design(metadata: &SampleMetadata, formula: &ModelFormula) -> Result<Design> {
    let design = build_treatment_design(metadata, formula)?;
    if is_estimable(&design) {
        return Ok(design);
    }

    if !formula.blocking.is_empty() {
        log::warn!(
            "Design {} is not estimable on {} samples ({} coefficients, rank {}); fitting {} instead",
            formula,
            design.n_samples(),
            design.n_coefs(),
            matrix_rank(&design.matrix),
            formula.without_blocking()
        );
        let reduced = build_treatment_design(metadata, &formula.without_blocking())?;
        if is_estimable(&reduced) {
            return Ok(reduced);
        }
    }

    Err(BatchError::InvalidDesignMatrix {
        reason: format!(
            "the model {} cannot be fit on {} samples: it needs a full-rank design with residual degrees of freedom",
            formula.without_blocking(),
            metadata.n_samples()
        ),
    })
}

fn is_estimable(design: &Design) -> bool {
    design.residual_df() > 0 && matrix_rank(&design.matrix) == design.n_coefs()
}

fn build_treatment_design(metadata: &SampleMetadata, formula: &ModelFormula) -> Result<Design> {
    let n_samples = metadata.n_samples();
    let mut coef_names = vec!["Intercept".to_string()];
    let mut columns: Vec<Vec<f64>> = vec![vec![1.0; n_samples]];
    let mut factor_columns = HashMap::new();
    let mut reference_levels = HashMap::new();

    for term in formula.terms() {
        let values = metadata.factor(term).ok_or_else(|| BatchError::UnknownFactor {
            factor: term.to_string(),
        })?;
        let levels = metadata.levels(term).unwrap_or_default();
        let reference = levels.first().cloned().unwrap_or_default();

        let mut level_columns = HashMap::new();
        for level in levels.iter().skip(1) {
            level_columns.insert(level.clone(), columns.len());
            coef_names.push(format!("{}_{}_vs_{}", term, level, reference));
            columns.push(values.iter().map(|v| if v == level { 1.0 } else { 0.0 }).collect());
        }
        factor_columns.insert(term.to_string(), level_columns);
        reference_levels.insert(term.to_string(), reference);
    }

    let mut matrix = Array2::zeros((n_samples, columns.len()));
    for (j, column) in columns.iter().enumerate() {
        for (i, &v) in column.iter().enumerate() {
            matrix[[i, j]] = v;
        }
    }

    Ok(Design {
        matrix,
        coef_names,
        formula: formula.clone(),
        factor_columns,
        reference_levels,
    })
}

/// Numerical rank via modified Gram-Schmidt with column pivoting
pub fn matrix_rank(matrix: &Array2<f64>) -> usize {
    let ncol = matrix.ncols();
    let mut cols: Vec<Array1<f64>> = (0..ncol).map(|j| matrix.column(j).to_owned()).collect();
    let scale = cols
        .iter()
        .map(|c| c.dot(c).sqrt())
        .fold(0.0f64, f64::max);
    if scale == 0.0 {
        return 0;
    }
    let tol = scale * 1e-10 * matrix.nrows().max(ncol) as f64;

    let mut rank = 0;
    for step in 0..ncol {
        let (best, best_norm) = (step..ncol)
            .map(|j| (j, cols[j].dot(&cols[j]).sqrt()))
            .fold((step, -1.0), |acc, x| if x.1 > acc.1 { x } else { acc });
        if best_norm <= tol {
            break;
        }
        cols.swap(step, best);
        let q = &cols[step] / best_norm;
        for j in (step + 1)..ncol {
            let proj = q.dot(&cols[j]);
            cols[j].scaled_add(-proj, &q);
        }
        cols[step] = q;
        rank += 1;
    }
    rank
}
