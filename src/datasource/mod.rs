//! Where scraped records end up.

use std::path::Path;

use clap::ValueEnum;
use serde::Deserialize;

use crate::{error::ScrapeResult, page_scrapers::JobRecord};

mod csv;
mod memory;

pub use self::csv::{CsvRow, CsvTable};
pub use self::memory::MemoryTable;

pub const JOBS_TABLE: &str = "jobs";


/// A named collection of rows of type `T`.
pub trait Table<T>: Send {
    fn name(&self) -> &str;

    fn is_created(&self) -> bool;

    /// Prepares the table for writing. Calling this again once it succeeded does nothing.
    fn create(&mut self) -> ScrapeResult<()>;

    /// Appends one row. Fails if the table was not created.
    fn post_row(&mut self, row: &T) -> ScrapeResult<()>;

    /// Every row written so far that `filter` accepts, in insertion order.
    fn get_rows(&self, filter: &dyn Fn(&T) -> bool) -> ScrapeResult<Vec<T>>;
}


#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceKind {
    /// `jobs.csv` in the output directory
    #[default]
    Csv,
    /// Keep rows in memory only, nothing is written to disk
    Memory
}


impl DatasourceKind {
    pub fn open_jobs_table(self, output_dir: &Path) -> Box<dyn Table<JobRecord>> {
        match self {
            Self::Csv => Box::new(CsvTable::new(JOBS_TABLE, output_dir.join(format!("{JOBS_TABLE}.csv")))),
            Self::Memory => Box::new(MemoryTable::new(JOBS_TABLE))
        }
    }
}
