//! Company directory: resolve a company name to its terms URL.
//!
//! The CSV dataset has the columns `Sl No`, `Company Name` and
//! `Terms & Conditions`. Lookup tries an exact case-insensitive name match
//! first, then the first entry whose name contains the query or is
//! contained in it.

use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use termscope_core::FetchError;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("failed to open directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid directory CSV: {0}")]
    Csv(#[from] csv::Error),
}

impl From<DirectoryError> for FetchError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Io { path, .. } => FetchError::NotFound(path),
            DirectoryError::Csv(e) => FetchError::Malformed(e.to_string()),
        }
    }
}

/// A resolved directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyEntry {
    pub name: String,
    pub terms_url: String,
}

#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    /// Entry for a company name; `FetchError::NotFound` when nothing matches.
    async fn resolve(&self, name: &str) -> Result<CompanyEntry, FetchError>;
}

#[derive(Debug, Deserialize)]
struct DirectoryRow {
    #[serde(rename = "Company Name")]
    company_name: String,
    #[serde(rename = "Terms & Conditions", default)]
    terms: String,
}

/// Directory loaded once from the CSV dataset.
#[derive(Debug, Clone, Default)]
pub struct CsvDirectory {
    entries: Vec<CompanyEntry>,
}

impl CsvDirectory {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| DirectoryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DirectoryError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for row in csv_reader.deserialize::<DirectoryRow>() {
            let row = row?;
            if row.company_name.is_empty() || row.terms.is_empty() {
                continue;
            }
            entries.push(CompanyEntry {
                name: row.company_name,
                terms_url: row.terms,
            });
        }

        tracing::debug!(entries = entries.len(), "Loaded company directory");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn lookup(&self, name: &str) -> Option<&CompanyEntry> {
        let query = name.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }

        self.entries
            .iter()
            .find(|e| e.name.to_lowercase() == query)
            .or_else(|| {
                self.entries.iter().find(|e| {
                    let candidate = e.name.to_lowercase();
                    candidate.contains(&query) || query.contains(&candidate)
                })
            })
    }
}

#[async_trait]
impl CompanyDirectory for CsvDirectory {
    async fn resolve(&self, name: &str) -> Result<CompanyEntry, FetchError> {
        self.lookup(name)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("company '{}' is not in the directory", name.trim())))
    }
}
