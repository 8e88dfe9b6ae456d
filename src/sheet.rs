//! Reads a semester grade sheet into [`ClassRecord`]s.
//!
//! The sheet layout is positional around the `Subject` header:
//! ```csv
//! Term, Subject, Catalog Nbr, Section, A+, A, A-, ..., F, ..., W
//! 19F,  CS,      101,         001,     5,  10, 15, ..., 2, ..., 3
//! ```
//! Catalog number and section follow `Subject` directly and the 13 grade
//! buckets start three columns after it. The withdrawal column is found by
//! name anywhere in the header.
//!
//! Cells are decoded lossily, so stray Latin-1 bytes in a column the importer
//! does not read never reject the sheet.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use csv::ByteRecord;

use crate::models::{ClassRecord, GradeDistribution, GRADE_BUCKETS};

const SUBJECT_HEADER: &str = "Subject";
const WITHDRAWAL_HEADERS: [&str; 3] = ["W", "Total W", "W Total"];

pub const MISSING_W_WARNING: &str = "could not find W column";

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("could not read grade sheet")]
    Csv(#[from] csv::Error),
    #[error("grade sheet is empty")]
    Empty,
    #[error("grade sheet header has no \"Subject\" column")]
    MissingSubjectColumn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub subject: usize,
    pub withdrawals: Option<usize>,
}

impl SheetLayout {
    pub fn from_header(header: &ByteRecord) -> Result<Self, SheetError> {
        let names: Vec<String> = header
            .iter()
            .map(|cell| {
                String::from_utf8_lossy(cell)
                    .trim_start_matches('\u{feff}')
                    .to_string()
            })
            .collect();

        let subject = names
            .iter()
            .position(|name| name == SUBJECT_HEADER)
            .ok_or(SheetError::MissingSubjectColumn)?;
        let withdrawals = names
            .iter()
            .position(|name| WITHDRAWAL_HEADERS.contains(&name.as_str()));
        Ok(Self {
            subject,
            withdrawals,
        })
    }

    pub fn catalog_number(&self) -> usize {
        self.subject + 1
    }

    pub fn section(&self) -> usize {
        self.subject + 2
    }

    pub fn first_bucket(&self) -> usize {
        self.subject + 3
    }

    pub fn to_record(&self, row: &ByteRecord) -> ClassRecord {
        let cell = |idx: usize| String::from_utf8_lossy(row.get(idx).unwrap_or_default());
        let text = |idx: usize| cell(idx).trim().to_string();
        let number = |idx: usize| parse_count(&cell(idx));

        let mut buckets = [0; GRADE_BUCKETS];
        for (offset, bucket) in buckets.iter_mut().enumerate() {
            *bucket = number(self.first_bucket() + offset);
        }
        let withdrawals = self.withdrawals.map(number).unwrap_or(0);

        ClassRecord {
            subject: text(self.subject),
            catalog_number: text(self.catalog_number()),
            section: text(self.section()),
            grade_distribution: GradeDistribution::new(buckets, withdrawals),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradeSheet {
    pub layout: SheetLayout,
    pub classes: Vec<ClassRecord>,
    pub warnings: Vec<String>,
}

/// Best effort: reads the leading integer of the cell (`7.5` is 7, `12 students`
/// is 12) and anything without one counts as zero.
fn parse_count(cell: &str) -> i32 {
    let cell = cell.trim();
    let end = cell
        .char_indices()
        .find(|&(idx, ch)| !(ch.is_ascii_digit() || (idx == 0 && (ch == '-' || ch == '+'))))
        .map_or(cell.len(), |(idx, _)| idx);
    cell[..end].parse().unwrap_or(0)
}

pub fn read_grade_sheet<R: Read>(reader: R) -> Result<GradeSheet, SheetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut rows = csv_reader.byte_records();

    let header = rows.next().ok_or(SheetError::Empty)??;
    let layout = SheetLayout::from_header(&header)?;

    let mut warnings = Vec::new();
    if layout.withdrawals.is_none() {
        warnings.push(MISSING_W_WARNING.to_string());
    }

    let mut classes = Vec::new();
    for row in rows {
        classes.push(layout.to_record(&row?));
    }

    Ok(GradeSheet {
        layout,
        classes,
        warnings,
    })
}

pub fn open_grade_sheet(path: &Path) -> anyhow::Result<File> {
    File::open(path).with_context(|| format!("could not open file {}", path.display()))
}
