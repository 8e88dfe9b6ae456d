use std::fmt::Write;
use std::path::Path;

use crate::models::{Course, ImportSummary, Section};

pub fn build_import_summary(
    input: &Path,
    session: &str,
    summary: &ImportSummary,
    log_path: &Path,
) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Imported {} for session {}: {} of {} rows updated.",
        input.display(),
        session,
        summary.updated,
        summary.records
    );

    let problems = [
        ("courses not found", summary.missing_courses),
        ("sections not found", summary.missing_sections),
        ("section lookups failed", summary.fetch_errors),
        ("updates failed", summary.failed_updates),
    ];
    for (label, count) in problems.iter().filter(|(_, count)| *count > 0) {
        let _ = writeln!(output, "- {count} {label}");
    }

    if problems.iter().any(|(_, count)| *count > 0) {
        let _ = writeln!(output, "Details in {}.", log_path.display());
    }

    output
}

fn format_grades(grades: &[i32]) -> String {
    if grades.is_empty() {
        return "no grades".to_string();
    }
    let values: Vec<String> = grades.iter().map(|value| value.to_string()).collect();
    format!("[{}]", values.join(", "))
}

pub fn build_section_listing(
    course: &Course,
    sections: &[Section],
    session: Option<&str>,
) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} {} ({} sections)",
        course.subject_prefix,
        course.course_number,
        course.sections.len()
    );

    let shown: Vec<&Section> = sections
        .iter()
        .filter(|section| session.map_or(true, |name| section.academic_session.name == name))
        .collect();

    if shown.is_empty() {
        let _ = writeln!(output, "No sections for this session.");
        return output;
    }

    for section in shown {
        let _ = writeln!(
            output,
            "- {}.{} {} {}",
            course.course_number,
            section.section_number,
            section.academic_session.name,
            format_grades(&section.grade_distribution)
        );
    }

    output
}
