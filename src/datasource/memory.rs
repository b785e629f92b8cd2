use crate::error::{ScrapeError, ScrapeResult};

use super::Table;


pub struct MemoryTable<T> {
    name: String,
    created: bool,
    rows: Vec<T>
}


impl<T> MemoryTable<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), created: false, rows: Vec::new() }
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }
}


impl<T: Clone + Send> Table<T> for MemoryTable<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_created(&self) -> bool {
        self.created
    }

    fn create(&mut self) -> ScrapeResult<()> {
        self.created = true;
        Ok(())
    }

    fn post_row(&mut self, row: &T) -> ScrapeResult<()> {
        if !self.created {
            return Err(ScrapeError::Persistence {
                table: self.name.clone(),
                source: anyhow::anyhow!("table has not been created")
            });
        }
        self.rows.push(row.clone());
        Ok(())
    }

    fn get_rows(&self, filter: &dyn Fn(&T) -> bool) -> ScrapeResult<Vec<T>> {
        Ok(self.rows.iter().filter(|x| filter(x)).cloned().collect())
    }
}
