use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of letter-grade buckets in a grade sheet row.
pub const GRADE_BUCKETS: usize = 13;

/// Grade buckets followed by the withdrawal count.
pub const DISTRIBUTION_LEN: usize = GRADE_BUCKETS + 1;

pub type SectionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GradeDistribution([i32; DISTRIBUTION_LEN]);

impl GradeDistribution {
    pub fn new(buckets: [i32; GRADE_BUCKETS], withdrawals: i32) -> Self {
        let mut values = [0; DISTRIBUTION_LEN];
        values[..GRADE_BUCKETS].copy_from_slice(&buckets);
        values[GRADE_BUCKETS] = withdrawals;
        Self(values)
    }

    pub fn withdrawals(&self) -> i32 {
        self.0[GRADE_BUCKETS]
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<i32> {
        self.as_slice().to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    pub subject: String,
    pub catalog_number: String,
    pub section: String,
    pub grade_distribution: GradeDistribution,
}

impl ClassRecord {
    /// `CS 101.001`, the label used in log lines.
    pub fn label(&self) -> String {
        format!("{} {}.{}", self.subject, self.catalog_number, self.section)
    }
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub subject_prefix: String,
    pub course_number: String,
    pub sections: Vec<SectionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicSession {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub id: SectionId,
    pub section_number: String,
    pub academic_session: AcademicSession,
    pub grade_distribution: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub records: usize,
    pub updated: usize,
    pub missing_courses: usize,
    pub missing_sections: usize,
    pub fetch_errors: usize,
    pub failed_updates: usize,
}
