//! In-memory columnar table.
//!
//! Three column types cover the simulation-row schema: `Int64` for index
//! columns, `Int8` for the two-boundary choice column, `Float64` for
//! response times and parameters. Conversion to and from Arrow
//! [`RecordBatch`] is lossless for these types.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, Float64Array, Int64Array, Int8Array};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Int8Type, Schema};
use arrow::record_batch::RecordBatch;
use eam_core::{Error, Result};

/// A typed column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int64(Vec<i64>),
    Int8(Vec<i8>),
    Float64(Vec<f64>),
}

impl Column {
    /// Row count.
    pub fn len(&self) -> usize {
        match self {
            Column::Int64(v) => v.len(),
            Column::Int8(v) => v.len(),
            Column::Float64(v) => v.len(),
        }
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row`, widened to `f64`.
    pub fn get_f64(&self, row: usize) -> f64 {
        match self {
            Column::Int64(v) => v[row] as f64,
            Column::Int8(v) => v[row] as f64,
            Column::Float64(v) => v[row],
        }
    }

    /// Select rows by index, preserving type.
    pub fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Int64(v) => Column::Int64(indices.iter().map(|&i| v[i]).collect()),
            Column::Int8(v) => Column::Int8(indices.iter().map(|&i| v[i]).collect()),
            Column::Float64(v) => Column::Float64(indices.iter().map(|&i| v[i]).collect()),
        }
    }

    /// Hashable group key for the value at `row` (floats key by bit pattern).
    fn key_at(&self, row: usize) -> KeyPart {
        match self {
            Column::Int64(v) => KeyPart::Int(v[row]),
            Column::Int8(v) => KeyPart::Int(v[row] as i64),
            Column::Float64(v) => KeyPart::Bits(v[row].to_bits()),
        }
    }

    /// Compact display of the value at `row` (used for pivot suffixes).
    pub fn display_at(&self, row: usize) -> String {
        match self {
            Column::Int64(v) => v[row].to_string(),
            Column::Int8(v) => v[row].to_string(),
            Column::Float64(v) => {
                let x = v[row];
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    format!("{}", x as i64)
                } else {
                    format!("{x}")
                }
            }
        }
    }

    fn append(&mut self, other: &Column) -> Result<()> {
        match (self, other) {
            (Column::Int64(a), Column::Int64(b)) => a.extend_from_slice(b),
            (Column::Int8(a), Column::Int8(b)) => a.extend_from_slice(b),
            (Column::Float64(a), Column::Float64(b)) => a.extend_from_slice(b),
            (a, b) => {
                return Err(Error::Validation(format!(
                    "cannot append {} rows to a {} column",
                    type_name(b),
                    type_name(a)
                )))
            }
        }
        Ok(())
    }

    fn to_float(&self) -> Vec<f64> {
        match self {
            Column::Int64(v) => v.iter().map(|&x| x as f64).collect(),
            Column::Int8(v) => v.iter().map(|&x| x as f64).collect(),
            Column::Float64(v) => v.clone(),
        }
    }
}

fn type_name(c: &Column) -> &'static str {
    match c {
        Column::Int64(_) => "Int64",
        Column::Int8(_) => "Int8",
        Column::Float64(_) => "Float64",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeyPart {
    Int(i64),
    Bits(u64),
}

/// Named columns of equal length.
#[derive(Debug, Clone, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, column)` pairs.
    pub fn from_columns(pairs: Vec<(String, Column)>) -> Result<Self> {
        let mut t = Table::new();
        for (name, col) in pairs {
            t.push_column(name, col)?;
        }
        Ok(t)
    }

    /// Append a column; length must match existing columns.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(Error::Validation(format!("duplicate column '{name}'")));
        }
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(Error::Validation(format!(
                "column '{name}' has {} rows, table has {}",
                column.len(),
                self.n_rows()
            )));
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Row count (0 for a table with no columns).
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Column count.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names.iter().position(|n| n == name).map(|i| &self.columns[i])
    }

    /// Column widened to `f64`, or an error naming the missing column.
    pub fn f64_column(&self, name: &str) -> Result<Vec<f64>> {
        self.column(name)
            .map(Column::to_float)
            .ok_or_else(|| Error::Validation(format!("missing column '{name}'")))
    }

    /// Project onto a subset of columns, in the given order.
    pub fn select(&self, names: &[String]) -> Result<Table> {
        let mut out = Table::new();
        for name in names {
            let col = self
                .column(name)
                .ok_or_else(|| Error::Validation(format!("missing column '{name}'")))?;
            out.push_column(name.clone(), col.clone())?;
        }
        Ok(out)
    }

    /// Select rows by index.
    pub fn take(&self, indices: &[usize]) -> Table {
        Table {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
        }
    }

    /// Group rows by the tuple of `by` column values.
    ///
    /// Returns `(key_rows, row_indices)` pairs in first-appearance order;
    /// `key_rows` is the row index of the group's first occurrence, usable
    /// with [`Column::display_at`] to render key values.
    pub fn group_by(&self, by: &[String]) -> Result<Vec<(usize, Vec<usize>)>> {
        let key_cols: Vec<&Column> = by
            .iter()
            .map(|name| {
                self.column(name)
                    .ok_or_else(|| Error::Validation(format!("missing group column '{name}'")))
            })
            .collect::<Result<_>>()?;

        let mut order: Vec<(usize, Vec<usize>)> = Vec::new();
        let mut seen: HashMap<Vec<KeyPart>, usize> = HashMap::new();
        for row in 0..self.n_rows() {
            let key: Vec<KeyPart> = key_cols.iter().map(|c| c.key_at(row)).collect();
            match seen.get(&key) {
                Some(&slot) => order[slot].1.push(row),
                None => {
                    seen.insert(key, order.len());
                    order.push((row, vec![row]));
                }
            }
        }
        Ok(order)
    }

    /// Row-concatenate tables with column union.
    ///
    /// Columns present everywhere keep their type; a column absent from some
    /// input is widened to `Float64` and its missing rows become `NaN`.
    pub fn concat_rows(tables: &[Table]) -> Result<Table> {
        let tables: Vec<&Table> = tables.iter().filter(|t| t.n_cols() > 0).collect();
        if tables.is_empty() {
            return Ok(Table::new());
        }

        // Column union in first-appearance order.
        let mut union: Vec<String> = Vec::new();
        for t in &tables {
            for name in t.names() {
                if !union.contains(name) {
                    union.push(name.clone());
                }
            }
        }

        let mut out = Table::new();
        for name in &union {
            let everywhere = tables.iter().all(|t| t.column(name).is_some());
            if everywhere {
                let mut acc = tables[0].column(name).unwrap().clone();
                for t in &tables[1..] {
                    acc.append(t.column(name).unwrap())?;
                }
                out.push_column(name.clone(), acc)?;
            } else {
                let mut acc: Vec<f64> = Vec::new();
                for t in &tables {
                    match t.column(name) {
                        Some(c) => acc.extend(c.to_float()),
                        None => acc.extend(std::iter::repeat(f64::NAN).take(t.n_rows())),
                    }
                }
                out.push_column(name.clone(), Column::Float64(acc))?;
            }
        }
        Ok(out)
    }

    /// Convert to an Arrow [`RecordBatch`].
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let fields: Vec<Field> = self
            .names
            .iter()
            .zip(&self.columns)
            .map(|(name, col)| {
                let dt = match col {
                    Column::Int64(_) => DataType::Int64,
                    Column::Int8(_) => DataType::Int8,
                    Column::Float64(_) => DataType::Float64,
                };
                Field::new(name, dt, false)
            })
            .collect();
        let arrays: Vec<ArrayRef> = self
            .columns
            .iter()
            .map(|col| match col {
                Column::Int64(v) => Arc::new(Int64Array::from(v.clone())) as ArrayRef,
                Column::Int8(v) => Arc::new(Int8Array::from(v.clone())) as ArrayRef,
                Column::Float64(v) => Arc::new(Float64Array::from(v.clone())) as ArrayRef,
            })
            .collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .map_err(|e| Error::Validation(format!("failed to build RecordBatch: {e}")))
    }

    /// Convert from an Arrow [`RecordBatch`].
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Table> {
        let schema = batch.schema();
        let mut out = Table::new();
        for (i, field) in schema.fields().iter().enumerate() {
            let arr = batch.column(i);
            let col = match field.data_type() {
                DataType::Int64 => {
                    Column::Int64(arr.as_primitive::<Int64Type>().values().to_vec())
                }
                DataType::Int8 => Column::Int8(arr.as_primitive::<Int8Type>().values().to_vec()),
                DataType::Float64 => {
                    Column::Float64(arr.as_primitive::<Float64Type>().values().to_vec())
                }
                other => {
                    return Err(Error::Validation(format!(
                        "column '{}' has unsupported type {other:?}",
                        field.name()
                    )))
                }
            };
            out.push_column(field.name().clone(), col)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns(vec![
            ("cond".into(), Column::Int64(vec![1, 1, 2, 2])),
            ("rt".into(), Column::Float64(vec![0.3, 0.5, 0.4, 0.6])),
            ("choice".into(), Column::Int8(vec![1, -1, 1, 1])),
        ])
        .unwrap()
    }

    #[test]
    fn record_batch_roundtrip_preserves_types() {
        let t = sample();
        let batch = t.to_record_batch().unwrap();
        let back = Table::from_record_batch(&batch).unwrap();
        assert_eq!(back.names(), t.names());
        assert_eq!(back.column("cond"), t.column("cond"));
        assert_eq!(back.column("choice"), t.column("choice"));
        assert_eq!(back.column("rt"), t.column("rt"));
    }

    #[test]
    fn group_by_first_appearance_order() {
        let t = sample();
        let groups = t.group_by(&["cond".to_string()]).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1, vec![0, 1]);
        assert_eq!(groups[1].1, vec![2, 3]);
    }

    #[test]
    fn concat_with_union_fills_nan() {
        let a = Table::from_columns(vec![
            ("x".into(), Column::Float64(vec![1.0])),
            ("y".into(), Column::Float64(vec![2.0])),
        ])
        .unwrap();
        let b = Table::from_columns(vec![("x".into(), Column::Float64(vec![3.0]))]).unwrap();
        let c = Table::concat_rows(&[a, b]).unwrap();
        assert_eq!(c.n_rows(), 2);
        assert_eq!(c.f64_column("x").unwrap(), vec![1.0, 3.0]);
        let y = c.f64_column("y").unwrap();
        assert_eq!(y[0], 2.0);
        assert!(y[1].is_nan());
    }

    #[test]
    fn concat_keeps_int_type_when_present_everywhere() {
        let a = Table::from_columns(vec![("i".into(), Column::Int64(vec![1]))]).unwrap();
        let b = Table::from_columns(vec![("i".into(), Column::Int64(vec![2]))]).unwrap();
        let c = Table::concat_rows(&[a, b]).unwrap();
        assert_eq!(c.column("i"), Some(&Column::Int64(vec![1, 2])));
    }

    #[test]
    fn duplicate_column_rejected() {
        let mut t = Table::new();
        t.push_column("x", Column::Int64(vec![1])).unwrap();
        assert!(t.push_column("x", Column::Int64(vec![2])).is_err());
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut t = Table::new();
        t.push_column("x", Column::Int64(vec![1, 2])).unwrap();
        assert!(t.push_column("y", Column::Int64(vec![1])).is_err());
    }
}
