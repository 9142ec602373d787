//! Read (and single-cell write) access to the scored artifacts a grade is built from.
//!
//! Calculations only ever see the [`ScoreSource`] trait. The workspace database backs
//! it in production through [`SqliteSource`].

use crate::error::SourceError;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub id: String,
    pub name: String,
    pub teacher_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub student_id: String,
    pub course_id: String,
    pub enrolled_at: String,
    pub completed_lecture_count: i64,
    pub total_lecture_count: i64,
}

/// One enrolled student, in enrollment order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: String,
    pub display_name: String,
    pub enrolled_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub max_score: i64,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub student_id: String,
    pub assignment_id: String,
    pub submitted_at: String,
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRecord {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub passing_score: i64,
    pub time_limit_seconds: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub student_id: String,
    pub quiz_id: String,
    pub attempt_no: i64,
    pub score: i64,
    pub submitted_at: String,
}

pub trait ScoreSource {
    fn course(&self, course_id: &str) -> Result<Option<CourseRecord>, SourceError>;

    fn enrollment(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, SourceError>;

    /// Enrolled students in enrollment order.
    fn roster(&self, course_id: &str) -> Result<Vec<RosterEntry>, SourceError>;

    /// Assignments in creation order.
    fn assignments(&self, course_id: &str) -> Result<Vec<AssignmentRecord>, SourceError>;

    fn submission(
        &self,
        student_id: &str,
        assignment_id: &str,
    ) -> Result<Option<SubmissionRecord>, SourceError>;

    /// Quizzes in creation order.
    fn quizzes(&self, course_id: &str) -> Result<Vec<QuizRecord>, SourceError>;

    fn attempts(&self, student_id: &str, quiz_id: &str) -> Result<Vec<AttemptRecord>, SourceError>;
}

/// The one write the gradebook performs: a teacher-entered assignment score.
pub trait ScoreStore: ScoreSource {
    fn set_submission_score(
        &self,
        student_id: &str,
        assignment_id: &str,
        score: f64,
        graded_at: &str,
    ) -> Result<(), SourceError>;
}

pub struct SqliteSource<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSource<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ScoreSource for SqliteSource<'_> {
    fn course(&self, course_id: &str) -> Result<Option<CourseRecord>, SourceError> {
        let course = self
            .conn
            .query_row(
                "SELECT id, name, teacher_name FROM courses WHERE id = ?",
                [course_id],
                |r| {
                    Ok(CourseRecord {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        teacher_name: r.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(course)
    }

    fn enrollment(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, SourceError> {
        let enrollment = self
            .conn
            .query_row(
                "SELECT
                   e.enrolled_at,
                   (SELECT COUNT(*) FROM lectures l WHERE l.course_id = e.course_id),
                   (SELECT COUNT(*)
                      FROM lecture_completions lc
                      JOIN lectures l ON l.id = lc.lecture_id
                     WHERE l.course_id = e.course_id AND lc.student_id = e.student_id)
                 FROM enrollments e
                 WHERE e.student_id = ? AND e.course_id = ?",
                (student_id, course_id),
                |r| {
                    Ok(Enrollment {
                        student_id: student_id.to_string(),
                        course_id: course_id.to_string(),
                        enrolled_at: r.get(0)?,
                        total_lecture_count: r.get(1)?,
                        completed_lecture_count: r.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(enrollment)
    }

    fn roster(&self, course_id: &str) -> Result<Vec<RosterEntry>, SourceError> {
        let mut stmt = self.conn.prepare(
            "SELECT e.student_id, s.display_name, e.enrolled_at
             FROM enrollments e
             JOIN students s ON s.id = e.student_id
             WHERE e.course_id = ?
             ORDER BY e.seq, e.rowid",
        )?;
        let rows = stmt
            .query_map([course_id], |r| {
                Ok(RosterEntry {
                    student_id: r.get(0)?,
                    display_name: r.get(1)?,
                    enrolled_at: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn assignments(&self, course_id: &str) -> Result<Vec<AssignmentRecord>, SourceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, course_id, title, max_score, due_date
             FROM assignments
             WHERE course_id = ?
             ORDER BY seq, rowid",
        )?;
        let rows = stmt
            .query_map([course_id], |r| {
                Ok(AssignmentRecord {
                    id: r.get(0)?,
                    course_id: r.get(1)?,
                    title: r.get(2)?,
                    max_score: r.get(3)?,
                    due_date: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(bad) = rows.iter().find(|a| a.max_score <= 0) {
            return Err(SourceError::Malformed {
                table: "assignments",
                id: bad.id.clone(),
                reason: format!("max_score must be positive, found {}", bad.max_score),
            });
        }
        Ok(rows)
    }

    fn submission(
        &self,
        student_id: &str,
        assignment_id: &str,
    ) -> Result<Option<SubmissionRecord>, SourceError> {
        let submission = self
            .conn
            .query_row(
                "SELECT submitted_at, score, feedback
                 FROM submissions
                 WHERE student_id = ? AND assignment_id = ?",
                (student_id, assignment_id),
                |r| {
                    Ok(SubmissionRecord {
                        student_id: student_id.to_string(),
                        assignment_id: assignment_id.to_string(),
                        submitted_at: r.get(0)?,
                        score: r.get(1)?,
                        feedback: r.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(submission)
    }

    fn quizzes(&self, course_id: &str) -> Result<Vec<QuizRecord>, SourceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, course_id, title, passing_score, time_limit_seconds
             FROM quizzes
             WHERE course_id = ?
             ORDER BY seq, rowid",
        )?;
        let rows = stmt
            .query_map([course_id], |r| {
                Ok(QuizRecord {
                    id: r.get(0)?,
                    course_id: r.get(1)?,
                    title: r.get(2)?,
                    passing_score: r.get(3)?,
                    time_limit_seconds: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn attempts(&self, student_id: &str, quiz_id: &str) -> Result<Vec<AttemptRecord>, SourceError> {
        let mut stmt = self.conn.prepare(
            "SELECT attempt_no, score, submitted_at
             FROM quiz_attempts
             WHERE student_id = ? AND quiz_id = ?
             ORDER BY attempt_no",
        )?;
        let rows = stmt
            .query_map((student_id, quiz_id), |r| {
                Ok(AttemptRecord {
                    student_id: student_id.to_string(),
                    quiz_id: quiz_id.to_string(),
                    attempt_no: r.get(0)?,
                    score: r.get(1)?,
                    submitted_at: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl ScoreStore for SqliteSource<'_> {
    fn set_submission_score(
        &self,
        student_id: &str,
        assignment_id: &str,
        score: f64,
        graded_at: &str,
    ) -> Result<(), SourceError> {
        // A teacher may enter a mark for work handed in outside the app; that creates
        // the submission row.
        let submission_id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO submissions(id, assignment_id, student_id, submitted_at, score, graded_at)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(assignment_id, student_id) DO UPDATE SET
               score = excluded.score,
               graded_at = excluded.graded_at",
            (
                &submission_id,
                assignment_id,
                student_id,
                graded_at,
                score,
                graded_at,
            ),
        )?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    //! In-memory source for calculation tests.

    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    pub struct MemorySource {
        pub courses: Vec<CourseRecord>,
        pub enrollments: Vec<Enrollment>,
        pub students: Vec<(String, String)>,
        pub assignments: Vec<AssignmentRecord>,
        pub submissions: RefCell<Vec<SubmissionRecord>>,
        pub quizzes: Vec<QuizRecord>,
        pub attempts: Vec<AttemptRecord>,
        pub offline: bool,
    }

    impl MemorySource {
        pub fn with_course(course_id: &str) -> Self {
            Self {
                courses: vec![CourseRecord {
                    id: course_id.to_string(),
                    name: format!("Course {}", course_id),
                    teacher_name: None,
                }],
                ..Self::default()
            }
        }

        pub fn enroll(&mut self, student_id: &str, course_id: &str, completed: i64, total: i64) {
            self.students
                .push((student_id.to_string(), format!("Student {}", student_id)));
            self.enrollments.push(Enrollment {
                student_id: student_id.to_string(),
                course_id: course_id.to_string(),
                enrolled_at: "2026-01-05T09:00:00+00:00".to_string(),
                completed_lecture_count: completed,
                total_lecture_count: total,
            });
        }

        pub fn add_assignment(&mut self, id: &str, course_id: &str, max_score: i64) {
            self.assignments.push(AssignmentRecord {
                id: id.to_string(),
                course_id: course_id.to_string(),
                title: format!("Assignment {}", id),
                max_score,
                due_date: None,
            });
        }

        pub fn submit(&self, student_id: &str, assignment_id: &str, score: Option<f64>) {
            let mut subs = self.submissions.borrow_mut();
            subs.retain(|s| !(s.student_id == student_id && s.assignment_id == assignment_id));
            subs.push(SubmissionRecord {
                student_id: student_id.to_string(),
                assignment_id: assignment_id.to_string(),
                submitted_at: "2026-02-01T10:00:00+00:00".to_string(),
                score,
                feedback: None,
            });
        }

        pub fn add_quiz(&mut self, id: &str, course_id: &str) {
            self.quizzes.push(QuizRecord {
                id: id.to_string(),
                course_id: course_id.to_string(),
                title: format!("Quiz {}", id),
                passing_score: 60,
                time_limit_seconds: 600,
            });
        }

        pub fn attempt(&mut self, student_id: &str, quiz_id: &str, score: i64) {
            let attempt_no = self
                .attempts
                .iter()
                .filter(|a| a.student_id == student_id && a.quiz_id == quiz_id)
                .count() as i64
                + 1;
            self.attempts.push(AttemptRecord {
                student_id: student_id.to_string(),
                quiz_id: quiz_id.to_string(),
                attempt_no,
                score,
                submitted_at: "2026-02-02T10:00:00+00:00".to_string(),
            });
        }

        fn check(&self) -> Result<(), SourceError> {
            if self.offline {
                return Err(SourceError::Query(rusqlite::Error::InvalidQuery));
            }
            Ok(())
        }
    }

    impl ScoreSource for MemorySource {
        fn course(&self, course_id: &str) -> Result<Option<CourseRecord>, SourceError> {
            self.check()?;
            Ok(self.courses.iter().find(|c| c.id == course_id).cloned())
        }

        fn enrollment(
            &self,
            student_id: &str,
            course_id: &str,
        ) -> Result<Option<Enrollment>, SourceError> {
            self.check()?;
            Ok(self
                .enrollments
                .iter()
                .find(|e| e.student_id == student_id && e.course_id == course_id)
                .cloned())
        }

        fn roster(&self, course_id: &str) -> Result<Vec<RosterEntry>, SourceError> {
            self.check()?;
            Ok(self
                .enrollments
                .iter()
                .filter(|e| e.course_id == course_id)
                .map(|e| RosterEntry {
                    student_id: e.student_id.clone(),
                    display_name: self
                        .students
                        .iter()
                        .find(|(id, _)| *id == e.student_id)
                        .map(|(_, name)| name.clone())
                        .unwrap_or_default(),
                    enrolled_at: e.enrolled_at.clone(),
                })
                .collect())
        }

        fn assignments(&self, course_id: &str) -> Result<Vec<AssignmentRecord>, SourceError> {
            self.check()?;
            Ok(self
                .assignments
                .iter()
                .filter(|a| a.course_id == course_id)
                .cloned()
                .collect())
        }

        fn submission(
            &self,
            student_id: &str,
            assignment_id: &str,
        ) -> Result<Option<SubmissionRecord>, SourceError> {
            self.check()?;
            Ok(self
                .submissions
                .borrow()
                .iter()
                .find(|s| s.student_id == student_id && s.assignment_id == assignment_id)
                .cloned())
        }

        fn quizzes(&self, course_id: &str) -> Result<Vec<QuizRecord>, SourceError> {
            self.check()?;
            Ok(self
                .quizzes
                .iter()
                .filter(|q| q.course_id == course_id)
                .cloned()
                .collect())
        }

        fn attempts(
            &self,
            student_id: &str,
            quiz_id: &str,
        ) -> Result<Vec<AttemptRecord>, SourceError> {
            self.check()?;
            Ok(self
                .attempts
                .iter()
                .filter(|a| a.student_id == student_id && a.quiz_id == quiz_id)
                .cloned()
                .collect())
        }
    }

    impl ScoreStore for MemorySource {
        fn set_submission_score(
            &self,
            student_id: &str,
            assignment_id: &str,
            score: f64,
            graded_at: &str,
        ) -> Result<(), SourceError> {
            self.check()?;
            let mut subs = self.submissions.borrow_mut();
            match subs
                .iter_mut()
                .find(|s| s.student_id == student_id && s.assignment_id == assignment_id)
            {
                Some(existing) => existing.score = Some(score),
                None => subs.push(SubmissionRecord {
                    student_id: student_id.to_string(),
                    assignment_id: assignment_id.to_string(),
                    submitted_at: graded_at.to_string(),
                    score: Some(score),
                    feedback: None,
                }),
            }
            Ok(())
        }
    }
}
