//! Out-of-core map-by-condition dispatcher.
//!
//! Iterates chunk partitions one at a time, splits each chunk by
//! `condition_idx`, applies a user function per condition, and combines the
//! results. A condition never straddles chunks (conditions are assigned to
//! chunks up-front by the driver), so each invocation of the user function
//! sees all rows of exactly one condition.

use eam_core::Result;
use rayon::prelude::*;

use crate::dataset::{Dataset, CONDITION_IDX};
use crate::table::Table;

/// Dispatch options.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapOptions {
    /// Process chunks on the Rayon pool instead of sequentially.
    pub parallel: bool,
    /// Emit a stderr line per processed chunk.
    pub progress: bool,
}

/// Default reducer: row-concatenate preserving the column union.
pub fn row_concat(tables: Vec<Table>) -> Result<Table> {
    Table::concat_rows(&tables)
}

/// Apply `f` to every condition of every chunk and combine with [`row_concat`].
pub fn map_by_condition<F>(dataset: &Dataset, f: F, options: MapOptions) -> Result<Table>
where
    F: Fn(&Table) -> Result<Table> + Sync,
{
    map_by_condition_with(dataset, f, row_concat, options)
}

/// Apply `f` to every condition of every chunk and combine with `combine`.
///
/// Results arrive at the reducer grouped by chunk order, then condition
/// order within each chunk; callers needing a strict global order sort by
/// `condition_idx` afterwards.
pub fn map_by_condition_with<F, C>(
    dataset: &Dataset,
    f: F,
    combine: C,
    options: MapOptions,
) -> Result<Table>
where
    F: Fn(&Table) -> Result<Table> + Sync,
    C: FnOnce(Vec<Table>) -> Result<Table>,
{
    let chunks = dataset.list_partitions()?;
    let n_chunks = chunks.len();

    let process = |&chunk_idx: &u64| -> Result<Vec<Table>> {
        let chunk = dataset.read_partition(chunk_idx)?;
        let groups = chunk.group_by(&[CONDITION_IDX.to_string()])?;
        let mut out = Vec::with_capacity(groups.len());
        for (_, rows) in groups {
            out.push(f(&chunk.take(&rows))?);
        }
        if options.progress {
            eprintln!("map_by_condition: chunk {chunk_idx} done ({n_chunks} total)");
        }
        Ok(out)
    };

    let per_chunk: Vec<Vec<Table>> = if options.parallel {
        chunks.par_iter().map(process).collect::<Result<_>>()?
    } else {
        chunks.iter().map(process).collect::<Result<_>>()?
    };

    combine(per_chunk.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CHUNK_IDX;
    use crate::table::Column;

    /// Two chunks, two conditions each.
    fn seed_dataset(dir: &std::path::Path) -> Dataset {
        let ds = Dataset::create(dir.join("data")).unwrap();
        for (chunk, conds) in [(1i64, [1i64, 2]), (2, [3, 4])] {
            let mut cond_col = Vec::new();
            let mut rt_col = Vec::new();
            for c in conds {
                // Three rows per condition.
                for j in 0..3 {
                    cond_col.push(c);
                    rt_col.push(c as f64 + 0.1 * j as f64);
                }
            }
            let n = cond_col.len();
            let t = Table::from_columns(vec![
                (CONDITION_IDX.into(), Column::Int64(cond_col)),
                ("rt".into(), Column::Float64(rt_col)),
                (CHUNK_IDX.into(), Column::Int64(vec![chunk; n])),
            ])
            .unwrap();
            ds.write_partition(chunk as u64, &t).unwrap();
        }
        ds
    }

    /// Reduce a condition table to one row: condition index and mean rt.
    fn per_condition_mean(t: &Table) -> Result<Table> {
        let cond = t.f64_column(CONDITION_IDX)?[0] as i64;
        let rts = t.f64_column("rt")?;
        let mean = rts.iter().sum::<f64>() / rts.len() as f64;
        Table::from_columns(vec![
            (CONDITION_IDX.into(), Column::Int64(vec![cond])),
            ("mean_rt".into(), Column::Float64(vec![mean])),
        ])
    }

    #[test]
    fn each_call_sees_one_full_condition() {
        let dir = tempfile::tempdir().unwrap();
        let ds = seed_dataset(dir.path());
        let out = map_by_condition(
            &ds,
            |t| {
                let conds = t.f64_column(CONDITION_IDX).unwrap();
                assert!(conds.windows(2).all(|w| w[0] == w[1]), "mixed conditions");
                assert_eq!(conds.len(), 3, "partial condition");
                per_condition_mean(t)
            },
            MapOptions::default(),
        )
        .unwrap();
        assert_eq!(out.n_rows(), 4);
        // Chunk order then condition order.
        assert_eq!(out.f64_column(CONDITION_IDX).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn parallel_matches_serial() {
        let dir = tempfile::tempdir().unwrap();
        let ds = seed_dataset(dir.path());
        let serial =
            map_by_condition(&ds, per_condition_mean, MapOptions::default()).unwrap();
        let parallel = map_by_condition(
            &ds,
            per_condition_mean,
            MapOptions { parallel: true, progress: false },
        )
        .unwrap();
        assert_eq!(
            serial.f64_column("mean_rt").unwrap(),
            parallel.f64_column("mean_rt").unwrap()
        );
    }

    #[test]
    fn custom_combine_reducer() {
        let dir = tempfile::tempdir().unwrap();
        let ds = seed_dataset(dir.path());
        // Count conditions instead of concatenating rows.
        let out = map_by_condition_with(
            &ds,
            per_condition_mean,
            |tables| {
                Table::from_columns(vec![(
                    "n_conditions".into(),
                    Column::Int64(vec![tables.len() as i64]),
                )])
            },
            MapOptions::default(),
        )
        .unwrap();
        assert_eq!(out.f64_column("n_conditions").unwrap(), vec![4.0]);
    }
}
