use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf
};

use tracing::debug;

use crate::{error::{ScrapeError, ScrapeResult}, page_scrapers::JobRecord};

use super::Table;

const SEPARATOR: char = ',';
/// Joins the items of list fields inside a single cell.
const LIST_SEPARATOR: &str = "|";


/// A type that can be written as one CSV line.
pub trait CsvRow: Clone + Send {
    const HEADERS: &'static [&'static str];

    /// One cell per entry of `HEADERS`.
    fn cells(&self) -> Vec<String>;
}


impl CsvRow for JobRecord {
    const HEADERS: &'static [&'static str] = &[
        "title",
        "subtitle",
        "company",
        "location",
        "tags",
        "requirements",
        "salary",
        "experience",
        "technologies",
        "url"
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.title.clone(),
            self.subtitle.clone(),
            self.company.clone(),
            self.location.clone(),
            self.tags.join(LIST_SEPARATOR),
            self.requirements.join(LIST_SEPARATOR),
            self.salary.clone().unwrap_or_default(),
            self.experience.clone().unwrap_or_default(),
            self.technologies.join(LIST_SEPARATOR),
            self.url.clone()
        ]
    }
}


fn needs_quotes(field: &str) -> bool {
    field.contains(SEPARATOR) || field.contains('"') || field.contains('\n') || field.contains('\r')
}


fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{SEPARATOR}")?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)
}


fn persistence_error(table: &str, source: impl Into<anyhow::Error>) -> ScrapeError {
    ScrapeError::Persistence { table: table.to_string(), source: source.into() }
}


/// Writes rows to a CSV file, one line per row, flushed as each row is posted.
///
/// Creating the table truncates the file and writes the header line. Rows written through this
/// table are also kept in memory so they can be queried back.
pub struct CsvTable<T> {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    rows: Vec<T>
}


impl<T> CsvTable<T> {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), path: path.into(), writer: None, rows: Vec::new() }
    }
}


impl<T: CsvRow> Table<T> for CsvTable<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_created(&self) -> bool {
        self.writer.is_some()
    }

    fn create(&mut self) -> ScrapeResult<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        debug!("Creating table {} at {}", self.name, self.path.display());
        let file = File::create(&self.path).map_err(|e| persistence_error(&self.name, e))?;
        let mut writer = BufWriter::new(file);
        write_row(&mut writer, T::HEADERS)
            .and_then(|_| writer.flush())
            .map_err(|e| persistence_error(&self.name, e))?;
        self.writer = Some(writer);
        Ok(())
    }

    fn post_row(&mut self, row: &T) -> ScrapeResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| persistence_error(&self.name, anyhow::anyhow!("table has not been created")))?;
        write_row(&mut *writer, &row.cells())
            .and_then(|_| writer.flush())
            .map_err(|e| persistence_error(&self.name, e))?;
        self.rows.push(row.clone());
        Ok(())
    }

    fn get_rows(&self, filter: &dyn Fn(&T) -> bool) -> ScrapeResult<Vec<T>> {
        Ok(self.rows.iter().filter(|x| filter(x)).cloned().collect())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> JobRecord {
        JobRecord {
            title: title.to_string(),
            subtitle: "Acme - Medellín".to_string(),
            company: "Acme".to_string(),
            location: "Medellín".to_string(),
            tags: vec!["Remoto".to_string(), "$ 1.000, neto".to_string()],
            requirements: vec![],
            salary: Some("$ 1.000, neto".to_string()),
            experience: None,
            technologies: vec!["Rust".to_string(), "Docker".to_string()],
            url: format!("https://example.com/{title}")
        }
    }

    #[test]
    fn quotes_cells_that_need_it() {
        let mut buf = Vec::new();
        write_row(&mut buf, &["plain", "a,b", "say \"hi\"", "two\nlines"]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "plain,\"a,b\",\"say \"\"hi\"\"\",\"two\nlines\"\n");
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.csv");
        let mut table = CsvTable::new("jobs", &path);

        assert!(table.post_row(&record("a")).is_err());
        table.create().unwrap();
        table.post_row(&record("a")).unwrap();
        // A second create must not truncate what was written
        table.create().unwrap();
        table.post_row(&record("b")).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "title,subtitle,company,location,tags,requirements,salary,experience,technologies,url");
        assert_eq!(
            lines[1],
            "a,Acme - Medellín,Acme,Medellín,\"Remoto|$ 1.000, neto\",,\"$ 1.000, neto\",,Rust|Docker,https://example.com/a"
        );

        let rows = table.get_rows(&|x: &JobRecord| x.title == "b").unwrap();
        assert_eq!(rows, [record("b")]);
    }

    #[test]
    fn create_fails_for_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut table: CsvTable<JobRecord> = CsvTable::new("jobs", dir.path().join("missing").join("jobs.csv"));
        let err = table.create().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Persistence);
        assert!(!table.is_created());
    }
}
