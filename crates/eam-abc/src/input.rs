//! ABC input assembly: three congruent arrays.

use eam_core::{Error, Result};
use eam_store::Table;

use crate::summary::SummaryTable;

/// Dense row-major matrix with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Matrix {
    /// Build from column names and row-major data.
    pub fn new(names: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let width = names.len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(Error::Validation(format!(
                "matrix rows must all have {width} entries"
            )));
        }
        Ok(Self { names, rows })
    }

    /// Extract named columns of a table into a matrix, in the given order.
    pub fn from_table(table: &Table, names: &[String]) -> Result<Self> {
        let columns: Vec<Vec<f64>> =
            names.iter().map(|n| table.f64_column(n)).collect::<Result<_>>()?;
        let n_rows = table.n_rows();
        let rows = (0..n_rows)
            .map(|i| columns.iter().map(|c| c[i]).collect())
            .collect();
        Ok(Self { names: names.to_vec(), rows })
    }

    /// Row count.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Column count.
    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    /// Column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Borrow the rows.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// One column by name.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// One column by index.
    pub fn column_at(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[idx]).collect()
    }

    /// Select rows by index (indices may repeat).
    pub fn select_rows(&self, indices: &[usize]) -> Matrix {
        Matrix {
            names: self.names.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

/// Aligned ABC input: `target` (length `S`), `param` (`N×P`), `sumstat` (`N×S`).
///
/// `sumstat` columns are ordered to match `target`; `param` columns name the
/// posterior columns of every downstream result.
#[derive(Debug, Clone)]
pub struct AbcInput {
    /// Observed summaries, one per sumstat column.
    pub target: Vec<f64>,
    /// Simulation parameters, row-aligned with `sumstat`.
    pub param: Matrix,
    /// Simulated summaries, column-aligned with `target`.
    pub sumstat: Matrix,
}

impl AbcInput {
    /// Validate congruence of the three arrays.
    pub fn new(target: Vec<f64>, param: Matrix, sumstat: Matrix) -> Result<Self> {
        if target.len() != sumstat.n_cols() {
            return Err(Error::Validation(format!(
                "target has {} entries but sumstat has {} columns",
                target.len(),
                sumstat.n_cols()
            )));
        }
        if param.n_rows() != sumstat.n_rows() {
            return Err(Error::Validation(format!(
                "param has {} rows but sumstat has {}",
                param.n_rows(),
                sumstat.n_rows()
            )));
        }
        Ok(Self { target, param, sumstat })
    }

    /// Pool size `N`.
    pub fn n_rows(&self) -> usize {
        self.param.n_rows()
    }

    /// Restrict the pool to a subset of rows (target unchanged).
    pub fn select_rows(&self, indices: &[usize]) -> AbcInput {
        AbcInput {
            target: self.target.clone(),
            param: self.param.select_rows(indices),
            sumstat: self.sumstat.select_rows(indices),
        }
    }
}

/// Align simulation parameters, simulated summaries, and target summaries.
///
/// `params` holds one row per simulated dataset with the columns named in
/// `param_names`. `sim_stats` and `target_stats` are applied summary tables;
/// the target must have exactly one row, and the simulated table's value
/// columns are reordered to the target's value-column order (every target
/// column must exist on the simulation side).
pub fn build_abc_input(
    params: &Table,
    param_names: &[String],
    sim_stats: &SummaryTable,
    target_stats: &SummaryTable,
) -> Result<AbcInput> {
    if target_stats.table.n_rows() != 1 {
        return Err(Error::Validation(format!(
            "target summary table must have exactly 1 row, got {}",
            target_stats.table.n_rows()
        )));
    }

    let stat_names = target_stats.value_names();
    if stat_names.is_empty() {
        return Err(Error::EmptyResults("target summary table has no value columns".to_string()));
    }
    let target: Vec<f64> = stat_names
        .iter()
        .map(|n| target_stats.table.f64_column(n).map(|c| c[0]))
        .collect::<Result<_>>()?;

    let sumstat = Matrix::from_table(&sim_stats.table, &stat_names).map_err(|e| {
        Error::Validation(format!("simulated summaries do not cover the target columns: {e}"))
    })?;
    let param = Matrix::from_table(params, param_names)?;

    AbcInput::new(target, param, sumstat)
}
