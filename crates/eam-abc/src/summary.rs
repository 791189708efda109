//! Composable summary-statistic specifications.
//!
//! A [`SummaryStatSpec`] is an ordered list of atoms, each a
//! `(aggregations, by, wider_by)` triple with `wider_by ⊆ by`. Specs are
//! built once and applied to many tables; `spec1 + spec2` concatenates atoms,
//! and applied tables with identical `wider_by` metadata outer-join via
//! [`join_summary_tables`].

use std::collections::HashMap;
use std::fmt;
use std::ops::Add;
use std::sync::Arc;

use eam_core::{Error, Result};
use eam_store::{Column, Table};

use crate::stats;

/// Result of one aggregation over one group.
#[derive(Debug, Clone)]
pub enum AggValue {
    /// One value → one column named after the aggregation.
    Scalar(f64),
    /// Unnamed vector → columns suffixed `_X1`, `_X2`, ….
    Vector(Vec<f64>),
    /// Named vector → columns suffixed with the sanitized element names.
    Named(Vec<(String, f64)>),
}

/// User-supplied aggregation over a group's rows.
#[derive(Clone)]
pub struct UserAgg {
    name: String,
    f: Arc<dyn Fn(&Table) -> Result<AggValue> + Send + Sync>,
}

impl UserAgg {
    /// Wrap a callable under a display name.
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&Table) -> Result<AggValue> + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), f: Arc::new(f) }
    }
}

impl fmt::Debug for UserAgg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAgg").field("name", &self.name).finish()
    }
}

/// Aggregation expression evaluated in a group's row context.
#[derive(Debug, Clone)]
pub enum Agg {
    Mean(String),
    Median(String),
    Sd(String),
    Min(String),
    Max(String),
    Sum(String),
    Count,
    /// Vector-valued: one column per probability, suffixed `_q<prob·100>`.
    Quantiles(String, Vec<f64>),
    User(UserAgg),
}

impl Agg {
    fn evaluate(&self, group: &Table) -> Result<AggValue> {
        match self {
            Agg::Mean(col) => Ok(AggValue::Scalar(stats::mean(&group.f64_column(col)?))),
            Agg::Median(col) => Ok(AggValue::Scalar(stats::median(&group.f64_column(col)?))),
            Agg::Sd(col) => Ok(AggValue::Scalar(stats::sd(&group.f64_column(col)?))),
            Agg::Min(col) => Ok(AggValue::Scalar(
                group.f64_column(col)?.iter().copied().fold(f64::INFINITY, f64::min),
            )),
            Agg::Max(col) => Ok(AggValue::Scalar(
                group.f64_column(col)?.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )),
            Agg::Sum(col) => Ok(AggValue::Scalar(group.f64_column(col)?.iter().sum())),
            Agg::Count => Ok(AggValue::Scalar(group.n_rows() as f64)),
            Agg::Quantiles(col, probs) => {
                let values = group.f64_column(col)?;
                Ok(AggValue::Named(
                    probs
                        .iter()
                        .map(|&p| (format!("q{}", fmt_prob(p)), stats::quantile_linear(&values, p)))
                        .collect(),
                ))
            }
            Agg::User(user) => (user.f)(group),
        }
    }
}

/// A named aggregation: `name` becomes the value column (or prefix).
#[derive(Debug, Clone)]
pub struct NamedAgg {
    pub name: String,
    pub agg: Agg,
}

impl NamedAgg {
    pub fn new(name: impl Into<String>, agg: Agg) -> Self {
        Self { name: name.into(), agg }
    }

    fn expand(&self, value: AggValue) -> Vec<(String, f64)> {
        match value {
            AggValue::Scalar(x) => vec![(self.name.clone(), x)],
            AggValue::Vector(xs) => xs
                .into_iter()
                .enumerate()
                .map(|(i, x)| (format!("{}_X{}", self.name, i + 1), x))
                .collect(),
            AggValue::Named(pairs) => pairs
                .into_iter()
                .map(|(suffix, x)| (format!("{}_{}", self.name, sanitize(&suffix)), x))
                .collect(),
        }
    }
}

/// One `(aggregations, by, wider_by)` triple.
#[derive(Debug, Clone)]
pub struct SpecAtom {
    aggs: Vec<NamedAgg>,
    by: Vec<String>,
    wider_by: Vec<String>,
}

impl SpecAtom {
    /// Build an atom; `wider_by` must be a subset of `by`.
    pub fn new(aggs: Vec<NamedAgg>, by: Vec<String>, wider_by: Vec<String>) -> Result<Self> {
        for key in &wider_by {
            if !by.contains(key) {
                return Err(Error::Validation(format!(
                    "wider_by key '{key}' is not among the by keys {by:?}"
                )));
            }
        }
        if aggs.is_empty() {
            return Err(Error::Validation("atom needs at least one aggregation".to_string()));
        }
        Ok(Self { aggs, by, wider_by })
    }
}

/// Build-once/apply-many specification: an ordered list of atoms.
#[derive(Debug, Clone)]
pub struct SummaryStatSpec {
    atoms: Vec<SpecAtom>,
}

impl SummaryStatSpec {
    /// Single-atom spec.
    pub fn new(atom: SpecAtom) -> Self {
        Self { atoms: vec![atom] }
    }

    /// Atom count.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the spec has no atoms.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Apply every atom to `data` and join the per-atom wide tables on their
    /// shared `wider_by` identifier columns.
    pub fn apply(&self, data: &Table) -> Result<SummaryTable> {
        let mut atoms = self.atoms.iter();
        let first = atoms
            .next()
            .ok_or_else(|| Error::Validation("empty summary spec".to_string()))?;
        let mut acc = apply_atom(first, data)?;
        for atom in atoms {
            let next = apply_atom(atom, data)?;
            acc = join_summary_tables(&acc, &next)?;
        }
        Ok(acc)
    }
}

impl Add for SummaryStatSpec {
    type Output = SummaryStatSpec;

    /// Spec ⊕ spec: concatenate atoms.
    fn add(mut self, mut rhs: SummaryStatSpec) -> SummaryStatSpec {
        self.atoms.append(&mut rhs.atoms);
        self
    }
}

/// Explicit spelling of `spec1 + spec2`.
pub fn compose(lhs: SummaryStatSpec, rhs: SummaryStatSpec) -> SummaryStatSpec {
    lhs + rhs
}

/// An applied summary spec: a wide table plus the `wider_by` metadata the
/// pivot ran with.
#[derive(Debug, Clone)]
pub struct SummaryTable {
    /// Identifier columns (`wider_by`) followed by value columns.
    pub table: Table,
    /// Identifier keys; joining requires both sides to agree.
    pub wider_by: Vec<String>,
}

impl SummaryTable {
    /// Names of the non-identifier (value) columns.
    pub fn value_names(&self) -> Vec<String> {
        self.table
            .names()
            .iter()
            .filter(|n| !self.wider_by.contains(*n))
            .cloned()
            .collect()
    }
}

/// Apply one atom: group, aggregate, pivot wider.
fn apply_atom(atom: &SpecAtom, data: &Table) -> Result<SummaryTable> {
    let groups = data.group_by(&atom.by)?;
    if groups.is_empty() {
        return Err(Error::EmptyResults("summary spec applied to an empty table".to_string()));
    }

    let spread: Vec<String> =
        atom.by.iter().filter(|k| !atom.wider_by.contains(*k)).cloned().collect();

    // Identifier tuples in first-appearance order, keyed by display string.
    let mut id_order: Vec<usize> = Vec::new(); // representative row per id tuple
    let mut id_slot: HashMap<String, usize> = HashMap::new();
    // Wide value column order and cells.
    let mut col_order: Vec<String> = Vec::new();
    let mut cells: HashMap<(usize, String), f64> = HashMap::new();

    for (rep_row, rows) in &groups {
        let group = data.take(rows);

        let id_key = row_key(data, &atom.wider_by, *rep_row)?;
        let slot = match id_slot.get(&id_key) {
            Some(&s) => s,
            None => {
                id_slot.insert(id_key, id_order.len());
                id_order.push(*rep_row);
                id_order.len() - 1
            }
        };

        let suffix = spread_suffix(data, &spread, *rep_row)?;
        for named in &atom.aggs {
            let value = named.agg.evaluate(&group)?;
            for (base, x) in named.expand(value) {
                let col = format!("{base}{suffix}");
                if !col_order.contains(&col) {
                    col_order.push(col.clone());
                }
                cells.insert((slot, col), x);
            }
        }
    }

    // Identifier columns keep their source types.
    let mut table = data.select(&atom.wider_by)?.take(&id_order);
    for col in &col_order {
        let values: Vec<f64> = (0..id_order.len())
            .map(|slot| cells.get(&(slot, col.clone())).copied().unwrap_or(f64::NAN))
            .collect();
        table.push_column(col.clone(), Column::Float64(values))?;
    }

    Ok(SummaryTable { table, wider_by: atom.wider_by.clone() })
}

/// Outer-join two applied tables on their shared `wider_by` columns.
///
/// # Errors
/// [`Error::WiderByMismatch`] when the metadata differs.
pub fn join_summary_tables(left: &SummaryTable, right: &SummaryTable) -> Result<SummaryTable> {
    if left.wider_by != right.wider_by {
        return Err(Error::WiderByMismatch {
            left: left.wider_by.clone(),
            right: right.wider_by.clone(),
        });
    }
    let keys = &left.wider_by;

    let mut right_index: HashMap<String, usize> = HashMap::new();
    for row in 0..right.table.n_rows() {
        right_index.insert(row_key(&right.table, keys, row)?, row);
    }
    let mut matched_right: Vec<Option<usize>> = Vec::with_capacity(left.table.n_rows());
    let mut seen_right: Vec<bool> = vec![false; right.table.n_rows()];
    for row in 0..left.table.n_rows() {
        let m = right_index.get(&row_key(&left.table, keys, row)?).copied();
        if let Some(r) = m {
            seen_right[r] = true;
        }
        matched_right.push(m);
    }
    let right_only: Vec<usize> =
        (0..right.table.n_rows()).filter(|&r| !seen_right[r]).collect();

    // Identifier columns: left rows then unmatched right rows, types preserved.
    let left_ids = left.table.select(keys)?;
    let right_ids = right.table.select(keys)?.take(&right_only);
    let mut out = Table::concat_rows(&[left_ids, right_ids])?;

    let n_left = left.table.n_rows();
    let n_out = n_left + right_only.len();

    for name in left.value_names() {
        let src = left.table.f64_column(&name)?;
        let mut values = Vec::with_capacity(n_out);
        values.extend_from_slice(&src);
        values.extend(std::iter::repeat(f64::NAN).take(right_only.len()));
        out.push_column(name, Column::Float64(values))?;
    }
    for name in right.value_names() {
        let src = right.table.f64_column(&name)?;
        let mut values = Vec::with_capacity(n_out);
        for m in &matched_right {
            values.push(m.map_or(f64::NAN, |r| src[r]));
        }
        for &r in &right_only {
            values.push(src[r]);
        }
        out.push_column(name, Column::Float64(values))?;
    }

    Ok(SummaryTable { table: out, wider_by: keys.clone() })
}

/// Concatenated display key of a row over `keys`.
fn row_key(table: &Table, keys: &[String], row: usize) -> Result<String> {
    let mut parts = Vec::with_capacity(keys.len());
    for key in keys {
        let col = table
            .column(key)
            .ok_or_else(|| Error::Validation(format!("missing key column '{key}'")))?;
        parts.push(col.display_at(row));
    }
    Ok(parts.join("\u{1f}"))
}

/// Pivot suffix for the spread keys: `_<key>_<value>` per key.
fn spread_suffix(table: &Table, spread: &[String], row: usize) -> Result<String> {
    let mut suffix = String::new();
    for key in spread {
        let col = table
            .column(key)
            .ok_or_else(|| Error::Validation(format!("missing spread column '{key}'")))?;
        suffix.push('_');
        suffix.push_str(&sanitize(key));
        suffix.push('_');
        suffix.push_str(&sanitize(&col.display_at(row)));
    }
    Ok(suffix)
}

/// Replace non-alphanumeric characters with `_` for column-name suffixes.
fn sanitize(s: &str) -> String {
    s.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// Percentage label for a quantile probability (`0.25 → "25"`, `0.025 → "2.5"`).
fn fmt_prob(p: f64) -> String {
    let pct = p * 100.0;
    if (pct - pct.round()).abs() < 1e-9 {
        format!("{}", pct.round() as i64)
    } else {
        format!("{pct}")
    }
}
