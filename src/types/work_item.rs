use std::fmt::Display;

/// One (course, lesson) pair read from the work-list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkItem {
    pub course_id: String,
    pub lesson_id: String,
    pub lesson_name: String,
    pub course_name_hint: String,
    pub start_time: String,
}

impl WorkItem {
    /// Only the two identifiers are needed to locate the recordings
    pub fn is_actionable(&self) -> bool {
        !self.course_id.is_empty() && !self.lesson_id.is_empty()
    }
}

impl Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "course {}", self.course_id)?;
        if !self.course_name_hint.is_empty() {
            write!(f, " ({})", self.course_name_hint)?;
        }
        write!(f, " / lesson {}", self.lesson_id)?;
        if !self.lesson_name.is_empty() {
            write!(f, " ({})", self.lesson_name)?;
        }
        if !self.start_time.is_empty() {
            write!(f, " starting {}", self.start_time)?;
        }
        Ok(())
    }
}
