//! Matches grade sheet rows against the catalog and writes the grades.

use std::io::{Read, Write};

use crate::catalog::CatalogRepository;
use crate::models::{ClassRecord, Course, ImportSummary, Section};
use crate::runlog::RunLog;
use crate::sheet::{read_grade_sheet, SheetError};

#[derive(Debug)]
pub enum Resolution {
    Matched(Section),
    CourseNotFound,
    SectionNotFound,
}

/// Finds the section a record belongs to, along with how many of the
/// course's sections could not be fetched on the way.
///
/// Sections are scanned in the course's stored order and the first one
/// whose section number and session name both match wins. Two sections
/// with the same number and session under one course are not detected.
pub async fn resolve_section<R, W>(
    repo: &R,
    record: &ClassRecord,
    session: &str,
    log: &mut RunLog<W>,
) -> (Resolution, usize)
where
    R: CatalogRepository,
    W: Write,
{
    let course = match repo
        .find_course(&record.subject, &record.catalog_number)
        .await
    {
        Ok(Some(course)) => course,
        Ok(None) => {
            log.record(&format!(
                "could not find course {} {}",
                record.subject, record.catalog_number
            ));
            return (Resolution::CourseNotFound, 0);
        }
        Err(err) => {
            log.record(&format!(
                "could not find course {} {}: {err:#}",
                record.subject, record.catalog_number
            ));
            return (Resolution::CourseNotFound, 0);
        }
    };

    let mut fetch_errors = 0;
    let found = scan_sections(repo, &course, record, session, log, &mut fetch_errors).await;
    match found {
        Some(section) => (Resolution::Matched(section), fetch_errors),
        None => {
            log.record(&format!(
                "could not find section {} in session {session}",
                record.label()
            ));
            (Resolution::SectionNotFound, fetch_errors)
        }
    }
}

async fn scan_sections<R, W>(
    repo: &R,
    course: &Course,
    record: &ClassRecord,
    session: &str,
    log: &mut RunLog<W>,
    fetch_errors: &mut usize,
) -> Option<Section>
where
    R: CatalogRepository,
    W: Write,
{
    tracing::debug!(course = %course.id, sections = course.sections.len(), "scanning sections");
    for id in &course.sections {
        let section = match repo.find_section(*id).await {
            Ok(Some(section)) => section,
            Ok(None) => {
                *fetch_errors += 1;
                log.record(&format!(
                    "could not fetch section {id} of {} {}: no such section",
                    course.subject_prefix, course.course_number
                ));
                continue;
            }
            Err(err) => {
                *fetch_errors += 1;
                log.record(&format!(
                    "could not fetch section {id} of {} {}: {err:#}",
                    course.subject_prefix, course.course_number
                ));
                continue;
            }
        };

        if section.section_number == record.section && section.academic_session.name == session {
            return Some(section);
        }
    }
    None
}

/// Overwrites the section's grade distribution with the record's values.
pub async fn write_grades<R, W>(
    repo: &R,
    section: &Section,
    record: &ClassRecord,
    log: &mut RunLog<W>,
) -> bool
where
    R: CatalogRepository,
    W: Write,
{
    match repo
        .update_grade_distribution(section.id, &record.grade_distribution)
        .await
    {
        Ok(()) => {
            tracing::info!(
                withdrawals = record.grade_distribution.withdrawals(),
                "added {} grade distribution",
                record.label()
            );
            true
        }
        Err(err) => {
            log.record(&format!(
                "could not modify {}, section id {}: {err:#}",
                record.label(),
                section.id
            ));
            false
        }
    }
}

/// Imports every record in order. Failures are logged and counted, never
/// returned.
pub async fn import_grades<R, W>(
    repo: &R,
    classes: &[ClassRecord],
    session: &str,
    log: &mut RunLog<W>,
) -> ImportSummary
where
    R: CatalogRepository,
    W: Write,
{
    let mut summary = ImportSummary {
        records: classes.len(),
        ..ImportSummary::default()
    };

    for record in classes {
        let (resolution, fetch_errors) = resolve_section(repo, record, session, log).await;
        summary.fetch_errors += fetch_errors;
        match resolution {
            Resolution::Matched(section) => {
                if write_grades(repo, &section, record, log).await {
                    summary.updated += 1;
                } else {
                    summary.failed_updates += 1;
                }
            }
            Resolution::CourseNotFound => summary.missing_courses += 1,
            Resolution::SectionNotFound => summary.missing_sections += 1,
        }
    }

    summary
}

/// Reads a whole grade sheet and imports it. Only an unreadable sheet is an
/// error; sheet warnings go to the run log ahead of the per-record entries.
pub async fn import_sheet<Rd, R, W>(
    sheet: Rd,
    repo: &R,
    session: &str,
    log: &mut RunLog<W>,
) -> Result<ImportSummary, SheetError>
where
    Rd: Read,
    R: CatalogRepository,
    W: Write,
{
    let sheet = read_grade_sheet(sheet)?;
    for warning in &sheet.warnings {
        log.record(warning);
    }
    tracing::info!(
        rows = sheet.classes.len(),
        layout = ?sheet.layout,
        "parsed grade sheet"
    );

    Ok(import_grades(repo, &sheet.classes, session, log).await)
}
