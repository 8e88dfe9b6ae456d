use anyhow::Context;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::catalog::CatalogRepository;
use crate::models::{AcademicSession, Course, GradeDistribution, Section, SectionId};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed course catalog.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_course(row: &PgRow) -> anyhow::Result<Course> {
    Ok(Course {
        id: row.try_get("id")?,
        subject_prefix: row.try_get("subject_prefix")?,
        course_number: row.try_get("course_number")?,
        sections: row.try_get("sections")?,
    })
}

fn decode_section(row: &PgRow) -> anyhow::Result<Section> {
    let Json(academic_session): Json<AcademicSession> = row
        .try_get("academic_session")
        .context("malformed academic_session document")?;
    Ok(Section {
        id: row.try_get("id")?,
        section_number: row.try_get("section_number")?,
        academic_session,
        grade_distribution: row.try_get("grade_distribution")?,
    })
}

impl CatalogRepository for PgCatalog {
    async fn find_course(
        &self,
        subject_prefix: &str,
        course_number: &str,
    ) -> anyhow::Result<Option<Course>> {
        let row = sqlx::query(
            r#"
            SELECT id, subject_prefix, course_number, sections
            FROM catalog.courses
            WHERE course_number = $1 AND subject_prefix = $2
            LIMIT 1
            "#,
        )
        .bind(course_number)
        .bind(subject_prefix)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_course).transpose()
    }

    async fn find_section(&self, id: SectionId) -> anyhow::Result<Option<Section>> {
        let row = sqlx::query(
            r#"
            SELECT id, section_number, academic_session, grade_distribution
            FROM catalog.sections
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_section).transpose()
    }

    async fn update_grade_distribution(
        &self,
        id: SectionId,
        grades: &GradeDistribution,
    ) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE catalog.sections SET grade_distribution = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(grades.to_vec())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("no section with id {id}");
        }
        Ok(())
    }
}

fn session(
    name: &str,
    start: (i32, u32, u32),
    end: (i32, u32, u32),
) -> anyhow::Result<AcademicSession> {
    let (year, month, day) = start;
    let start_date = NaiveDate::from_ymd_opt(year, month, day).context("invalid date")?;
    let (year, month, day) = end;
    let end_date = NaiveDate::from_ymd_opt(year, month, day).context("invalid date")?;
    Ok(AcademicSession {
        name: name.to_string(),
        start_date: Some(start_date),
        end_date: Some(end_date),
    })
}

/// Small demo catalog: `CS 1337` offered in two sessions with the same
/// section number, and `MATH 2413`.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let fall = session("19F", (2019, 8, 19), (2019, 12, 18))?;
    let spring = session("20S", (2020, 1, 13), (2020, 5, 13))?;

    let sections = vec![
        (
            Uuid::parse_str("5b0c7a52-0d7e-4f5e-9a43-1a3f0c2d9e01")?,
            "001",
            &fall,
        ),
        (
            Uuid::parse_str("5b0c7a52-0d7e-4f5e-9a43-1a3f0c2d9e02")?,
            "002",
            &fall,
        ),
        (
            Uuid::parse_str("5b0c7a52-0d7e-4f5e-9a43-1a3f0c2d9e03")?,
            "001",
            &spring,
        ),
        (
            Uuid::parse_str("8e41d6b0-6c1f-4c39-b5f4-0f9d2a7c3b01")?,
            "501",
            &fall,
        ),
    ];

    for (id, section_number, academic_session) in &sections {
        sqlx::query(
            r#"
            INSERT INTO catalog.sections (id, section_number, academic_session)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET section_number = EXCLUDED.section_number,
                academic_session = EXCLUDED.academic_session
            "#,
        )
        .bind(*id)
        .bind(*section_number)
        .bind(Json((*academic_session).clone()))
        .execute(pool)
        .await?;
    }

    let courses = vec![
        (
            Uuid::parse_str("c4f0b1e2-3a5d-4e6f-8a9b-0c1d2e3f4a01")?,
            "CS",
            "1337",
            vec![sections[0].0, sections[1].0, sections[2].0],
        ),
        (
            Uuid::parse_str("c4f0b1e2-3a5d-4e6f-8a9b-0c1d2e3f4a02")?,
            "MATH",
            "2413",
            vec![sections[3].0],
        ),
    ];

    for (id, subject_prefix, course_number, section_ids) in courses {
        sqlx::query(
            r#"
            INSERT INTO catalog.courses (id, subject_prefix, course_number, sections)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (subject_prefix, course_number) DO UPDATE
            SET sections = EXCLUDED.sections
            "#,
        )
        .bind(id)
        .bind(subject_prefix)
        .bind(course_number)
        .bind(section_ids)
        .execute(pool)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GRADE_BUCKETS;

    // Needs a Postgres at DATABASE_URL: `cargo test -- --ignored`.
    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn seeded_catalog_decodes_into_typed_records(pool: PgPool) -> anyhow::Result<()> {
        seed(&pool).await?;
        let catalog = PgCatalog::new(pool);

        let course = catalog
            .find_course("CS", "1337")
            .await?
            .context("seeded course missing")?;
        assert_eq!(course.subject_prefix, "CS");
        assert_eq!(
            course.sections,
            vec![
                Uuid::parse_str("5b0c7a52-0d7e-4f5e-9a43-1a3f0c2d9e01")?,
                Uuid::parse_str("5b0c7a52-0d7e-4f5e-9a43-1a3f0c2d9e02")?,
                Uuid::parse_str("5b0c7a52-0d7e-4f5e-9a43-1a3f0c2d9e03")?,
            ]
        );
        assert!(catalog.find_course("CS", "101").await?.is_none());

        let spring = catalog
            .find_section(course.sections[2])
            .await?
            .context("seeded section missing")?;
        assert_eq!(spring.section_number, "001");
        assert_eq!(spring.academic_session.name, "20S");
        assert_eq!(spring.academic_session.start_date, NaiveDate::from_ymd_opt(2020, 1, 13));
        assert!(spring.grade_distribution.is_empty());

        let grades = GradeDistribution::new([4; GRADE_BUCKETS], 2);
        catalog.update_grade_distribution(spring.id, &grades).await?;
        let stored = catalog
            .find_section(spring.id)
            .await?
            .context("updated section missing")?;
        assert_eq!(stored.grade_distribution, grades.to_vec());

        assert!(catalog
            .update_grade_distribution(Uuid::new_v4(), &grades)
            .await
            .is_err());
        assert!(catalog.find_section(Uuid::new_v4()).await?.is_none());
        Ok(())
    }
}
