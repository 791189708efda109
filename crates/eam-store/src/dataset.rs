//! Partitioned on-disk Parquet dataset.
//!
//! Layout: `<root>/chunk_idx=<k>/part-0.parquet`. Each partition is written
//! once by exactly one producer (the driver assigns disjoint chunk indices to
//! workers), so no locking is involved.

use std::fs::File;
use std::path::{Path, PathBuf};

use eam_core::{Error, Result};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::table::Table;

/// Column naming the condition a row belongs to.
pub const CONDITION_IDX: &str = "condition_idx";

/// Partition-key column.
pub const CHUNK_IDX: &str = "chunk_idx";

/// Handle on a partitioned dataset directory.
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    /// Create the dataset directory (parents included).
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Open an existing dataset directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a dataset directory: {}", root.display()),
            )));
        }
        Ok(Self { root })
    }

    /// Dataset root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one partition (`chunk_idx=<k>/part-0.parquet`).
    pub fn write_partition(&self, chunk_idx: u64, table: &Table) -> Result<()> {
        let dir = self.root.join(format!("{CHUNK_IDX}={chunk_idx}"));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("part-0.parquet");

        let batch = table.to_record_batch()?;
        let props = WriterProperties::builder().set_compression(Compression::SNAPPY).build();
        let file = File::create(&path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .map_err(|e| Error::Validation(format!("failed to create Parquet writer: {e}")))?;
        writer
            .write(&batch)
            .map_err(|e| Error::Validation(format!("failed to write Parquet: {e}")))?;
        writer
            .close()
            .map_err(|e| Error::Validation(format!("failed to close Parquet writer: {e}")))?;
        Ok(())
    }

    /// Sorted chunk indices present on disk.
    pub fn list_partitions(&self) -> Result<Vec<u64>> {
        let prefix = format!("{CHUNK_IDX}=");
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(k) = name.strip_prefix(&prefix) {
                let k: u64 = k.parse().map_err(|_| {
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("unparseable partition directory '{name}'"),
                    ))
                })?;
                out.push(k);
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    /// Read one partition into memory.
    pub fn read_partition(&self, chunk_idx: u64) -> Result<Table> {
        let dir = self.root.join(format!("{CHUNK_IDX}={chunk_idx}"));
        if !dir.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("missing partition {}", dir.display()),
            )));
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("partition {} has no parquet files", dir.display()),
            )));
        }

        let mut tables = Vec::with_capacity(files.len());
        for path in files {
            tables.push(read_parquet_table(&path)?);
        }
        Table::concat_rows(&tables)
    }

    /// Read every partition, in chunk order, into a single table.
    pub fn read_all(&self) -> Result<Table> {
        let mut tables = Vec::new();
        for k in self.list_partitions()? {
            tables.push(self.read_partition(k)?);
        }
        Table::concat_rows(&tables)
    }
}

/// Read a single Parquet file into a [`Table`].
fn read_parquet_table(path: &Path) -> Result<Table> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::Validation(format!("failed to read {}: {e}", path.display())))?;
    let reader = builder
        .build()
        .map_err(|e| Error::Validation(format!("failed to build Parquet reader: {e}")))?;

    let mut tables = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| Error::Validation(format!("failed to read Parquet batch: {e}")))?;
        tables.push(Table::from_record_batch(&batch)?);
    }
    Table::concat_rows(&tables)
}
