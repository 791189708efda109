//! # eam-store
//!
//! Columnar storage for simulation output: an in-memory [`Table`] with
//! typed columns, an on-disk [`Dataset`] partitioned by chunk index
//! (`chunk_idx=<k>/part-0.parquet`), and the out-of-core
//! [`map_by_condition`] dispatcher that streams one chunk at a time.

mod dataset;
mod map;
mod table;

pub use dataset::{Dataset, CHUNK_IDX, CONDITION_IDX};
pub use map::{map_by_condition, map_by_condition_with, row_concat, MapOptions};
pub use table::{Column, Table};
