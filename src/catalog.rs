use crate::models::{Course, GradeDistribution, Section, SectionId};

/// Course catalog store used by the importer.
///
/// Lookups return `Ok(None)` when nothing matches; `Err` is reserved for the
/// store itself failing.
#[allow(async_fn_in_trait)]
pub trait CatalogRepository {
    async fn find_course(
        &self,
        subject_prefix: &str,
        course_number: &str,
    ) -> anyhow::Result<Option<Course>>;

    async fn find_section(&self, id: SectionId) -> anyhow::Result<Option<Section>>;

    async fn update_grade_distribution(
        &self,
        id: SectionId,
        grades: &GradeDistribution,
    ) -> anyhow::Result<()>;

    async fn course_sections(&self, course: &Course) -> anyhow::Result<Vec<Section>> {
        let mut sections = Vec::with_capacity(course.sections.len());
        for id in &course.sections {
            if let Some(section) = self.find_section(*id).await? {
                sections.push(section);
            }
        }
        Ok(sections)
    }
}

#[cfg(test)]
pub mod memory {
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    use anyhow::anyhow;
    use uuid::Uuid;

    use super::CatalogRepository;
    use crate::models::{AcademicSession, Course, GradeDistribution, Section, SectionId};

    /// In-memory catalog with hooks for injecting store failures.
    #[derive(Default)]
    pub struct MemoryCatalog {
        courses: Vec<Course>,
        sections: RefCell<HashMap<SectionId, Section>>,
        pub broken_sections: HashSet<SectionId>,
        pub read_only_sections: HashSet<SectionId>,
        pub updates: RefCell<Vec<(SectionId, Vec<i32>)>>,
    }

    impl MemoryCatalog {
        pub fn add_section(&mut self, section_number: &str, session: &str) -> SectionId {
            let id = Uuid::new_v4();
            self.sections.get_mut().insert(
                id,
                Section {
                    id,
                    section_number: section_number.to_string(),
                    academic_session: AcademicSession {
                        name: session.to_string(),
                        start_date: None,
                        end_date: None,
                    },
                    grade_distribution: Vec::new(),
                },
            );
            id
        }

        pub fn add_course(&mut self, subject: &str, number: &str, sections: Vec<SectionId>) {
            self.courses.push(Course {
                id: Uuid::new_v4(),
                subject_prefix: subject.to_string(),
                course_number: number.to_string(),
                sections,
            });
        }

        pub fn grades(&self, id: SectionId) -> Vec<i32> {
            self.sections
                .borrow()
                .get(&id)
                .map(|section| section.grade_distribution.clone())
                .unwrap_or_default()
        }

        pub fn updated_ids(&self) -> Vec<SectionId> {
            self.updates.borrow().iter().map(|(id, _)| *id).collect()
        }
    }

    impl CatalogRepository for MemoryCatalog {
        async fn find_course(
            &self,
            subject_prefix: &str,
            course_number: &str,
        ) -> anyhow::Result<Option<Course>> {
            Ok(self
                .courses
                .iter()
                .find(|course| {
                    course.subject_prefix == subject_prefix
                        && course.course_number == course_number
                })
                .cloned())
        }

        async fn find_section(&self, id: SectionId) -> anyhow::Result<Option<Section>> {
            if self.broken_sections.contains(&id) {
                return Err(anyhow!("connection reset while reading section"));
            }
            Ok(self.sections.borrow().get(&id).cloned())
        }

        async fn update_grade_distribution(
            &self,
            id: SectionId,
            grades: &GradeDistribution,
        ) -> anyhow::Result<()> {
            if self.read_only_sections.contains(&id) {
                return Err(anyhow!("write rejected"));
            }
            let mut sections = self.sections.borrow_mut();
            let section = sections
                .get_mut(&id)
                .ok_or_else(|| anyhow!("no section with id {id}"))?;
            section.grade_distribution = grades.to_vec();
            self.updates.borrow_mut().push((id, grades.to_vec()));
            Ok(())
        }
    }
}
