//! Parser for the processed CSV data files.
//!
//! This module handles the four files produced by the preprocessing step:
//! - ratings_processed.csv: user_id,business_id,rating
//! - business_processed.csv: business_id,name[,city,stars,categories]
//! - reviews_processed.csv: business_id,review_text[,user_id]
//! - user_processed.csv: user_id,name
//!
//! Columns are located through the header row, so extra columns and any
//! column order are accepted. Records are read with the `csv` crate: quoted
//! fields may contain commas, doubled quotes and line breaks (review texts
//! do), and invalid UTF-8 is a parse error rather than being replaced.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use csv::StringRecord;
use std::io::Read;
use std::path::Path;

/// A parsed CSV file: header plus data records
#[derive(Debug)]
pub(crate) struct CsvTable {
    file: String,
    header: Vec<String>,
    rows: Vec<StringRecord>,
}

impl CsvTable {
    /// Read a CSV file; the first record is the header
    pub(crate) fn read(path: &Path) -> Result<Self> {
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let reader = csv::ReaderBuilder::new().from_path(path).map_err(|e| {
            let not_found = matches!(
                e.kind(),
                csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound
            );
            if not_found {
                DataLoadError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                csv_error(&file, e)
            }
        })?;
        Self::from_reader(&file, reader)
    }

    pub(crate) fn parse<C: AsRef<[u8]>>(file: &str, content: C) -> Result<Self> {
        let reader = csv::ReaderBuilder::new().from_reader(content.as_ref());
        Self::from_reader(file, reader)
    }

    fn from_reader<R: Read>(file: &str, mut reader: csv::Reader<R>) -> Result<Self> {
        let header: Vec<String> = reader
            .headers()
            .map_err(|e| csv_error(file, e))?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();
        if header.is_empty() {
            return Err(DataLoadError::ParseError {
                file: file.to_string(),
                record: 1,
                reason: "Missing header".to_string(),
            });
        }

        // rows whose length differs from the header surface as UnequalLengths
        let rows = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| csv_error(file, e))?;

        Ok(Self {
            file: file.to_string(),
            header,
            rows,
        })
    }

    /// Position of a required column
    fn column(&self, name: &str) -> Result<usize> {
        self.optional_column(name)
            .ok_or_else(|| DataLoadError::MissingColumn {
                file: self.file.clone(),
                column: name.to_string(),
            })
    }

    fn optional_column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Data records with their 1-based record number (header = 1)
    fn records(&self) -> impl Iterator<Item = (usize, &StringRecord)> {
        self.rows.iter().enumerate().map(|(idx, row)| (idx + 2, row))
    }

    fn parse_error(&self, record: usize, reason: String) -> DataLoadError {
        DataLoadError::ParseError {
            file: self.file.clone(),
            record,
            reason,
        }
    }
}

/// Map a csv reader error onto the loader's errors, numbering records from 1
fn csv_error(file: &str, err: csv::Error) -> DataLoadError {
    let record = err
        .position()
        .map(|pos| pos.record() as usize + 1)
        .unwrap_or(1);
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => DataLoadError::IoError(e),
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => DataLoadError::FieldCountMismatch {
            file: file.to_string(),
            expected: expected_len as usize,
            found: len as usize,
            record,
        },
        _ => DataLoadError::ParseError {
            file: file.to_string(),
            record,
            reason,
        },
    }
}

/// Parse the ratings file
///
/// Format: user_id,business_id,rating
///
/// Only syntax is checked here; whether a rating may enter the interaction
/// matrix is decided by `InteractionMatrix::build`.
pub fn parse_ratings(path: &Path) -> Result<Vec<RatingRecord>> {
    parse_ratings_table(&CsvTable::read(path)?)
}

fn parse_ratings_table(table: &CsvTable) -> Result<Vec<RatingRecord>> {
    let user_col = table.column("user_id")?;
    let item_col = table.column("business_id")?;
    let rating_col = table.column("rating")?;

    let mut ratings = Vec::with_capacity(table.rows.len());
    for (record, row) in table.records() {
        let raw = row[rating_col].trim();
        let rating = raw
            .parse::<f64>()
            .map_err(|_| table.parse_error(record, format!("Invalid rating '{}'", raw)))?;

        ratings.push(RatingRecord {
            user_id: row[user_col].trim().to_string(),
            item_id: row[item_col].trim().to_string(),
            rating,
        });
    }
    Ok(ratings)
}

/// Parse the business metadata file
///
/// Format: business_id,name[,city,stars,categories]
pub fn parse_businesses(path: &Path) -> Result<Vec<Business>> {
    parse_businesses_table(&CsvTable::read(path)?)
}

fn parse_businesses_table(table: &CsvTable) -> Result<Vec<Business>> {
    let id_col = table.column("business_id")?;
    let name_col = table.column("name")?;
    let city_col = table.optional_column("city");
    let stars_col = table.optional_column("stars");
    let categories_col = table.optional_column("categories");

    let mut businesses = Vec::with_capacity(table.rows.len());
    for (record, row) in table.records() {
        let id = row[id_col].trim();
        if id.is_empty() {
            return Err(table.parse_error(record, "Missing business_id".to_string()));
        }

        let stars = match stars_col.map(|c| row[c].trim()) {
            Some(raw) if !raw.is_empty() => Some(
                raw.parse::<f32>()
                    .map_err(|_| table.parse_error(record, format!("Invalid stars '{}'", raw)))?,
            ),
            _ => None,
        };

        businesses.push(Business {
            id: id.to_string(),
            name: row[name_col].trim().to_string(),
            city: city_col
                .map(|c| row[c].trim().to_string())
                .filter(|city| !city.is_empty()),
            stars,
            categories: categories_col
                .map(|c| parse_categories(&row[c]))
                .unwrap_or_default(),
        });
    }
    Ok(businesses)
}

/// Parse the reviews file
///
/// Format: business_id,review_text[,user_id]
pub fn parse_reviews(path: &Path) -> Result<Vec<Review>> {
    parse_reviews_table(&CsvTable::read(path)?)
}

fn parse_reviews_table(table: &CsvTable) -> Result<Vec<Review>> {
    let item_col = table.column("business_id")?;
    let text_col = table.column("review_text")?;
    let user_col = table.optional_column("user_id");

    let mut reviews = Vec::with_capacity(table.rows.len());
    for (record, row) in table.records() {
        let item_id = row[item_col].trim();
        if item_id.is_empty() {
            return Err(table.parse_error(record, "Missing business_id".to_string()));
        }
        reviews.push(Review {
            item_id: item_id.to_string(),
            user_id: user_col
                .map(|c| row[c].trim().to_string())
                .filter(|id| !id.is_empty()),
            text: row[text_col].to_string(),
        });
    }
    Ok(reviews)
}

/// Parse the users file
///
/// Format: user_id,name
pub fn parse_users(path: &Path) -> Result<Vec<User>> {
    parse_users_table(&CsvTable::read(path)?)
}

fn parse_users_table(table: &CsvTable) -> Result<Vec<User>> {
    let id_col = table.column("user_id")?;
    let name_col = table.column("name")?;

    Ok(table
        .records()
        .map(|(_, row)| User {
            id: row[id_col].trim().to_string(),
            name: row[name_col].trim().to_string(),
        })
        .collect())
}

/// Split a Yelp categories field ("Restaurants, Pizza") into its parts
fn parse_categories(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
