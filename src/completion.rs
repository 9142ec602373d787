//! Course completion policy.
//!
//! A course is certifiable only when it defines at least [`MIN_QUIZZES`] quizzes and
//! [`MIN_ASSIGNMENTS`] assignments, and a student completes it by attempting every one of
//! the first `MIN_QUIZZES` quizzes and submitting every one of the first `MIN_ASSIGNMENTS`
//! assignments. The completion grade is computed on its own scale; see
//! [`calc::completion_grade`].

use crate::calc::{self, LetterGrade};
use crate::error::GradeError;
use crate::source::ScoreSource;
use serde::Serialize;

pub const MIN_QUIZZES: usize = 3;
pub const MIN_ASSIGNMENTS: usize = 2;

pub const REASON_COURSE_NOT_FOUND: &str = "course not found";
pub const REASON_UNDER_PROVISIONED: &str = "course under-provisioned";
pub const REASON_NOT_ENROLLED: &str = "student not enrolled";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<LetterGrade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub quizzes_attempted: usize,
    pub assignments_submitted: usize,
}

impl CompletionResult {
    fn incomplete(reason: impl Into<String>, quizzes: usize, assignments: usize) -> Self {
        Self {
            is_complete: false,
            reason: Some(reason.into()),
            grade: None,
            percentage: None,
            quizzes_attempted: quizzes,
            assignments_submitted: assignments,
        }
    }
}

/// Only [`GradeError::DataUnavailable`] is returned as an error; every other reason a
/// student cannot complete is reported in the result.
pub fn evaluate_completion<S: ScoreSource + ?Sized>(
    source: &S,
    student_id: &str,
    course_id: &str,
) -> Result<CompletionResult, GradeError> {
    if source.course(course_id)?.is_none() {
        return Ok(CompletionResult::incomplete(REASON_COURSE_NOT_FOUND, 0, 0));
    }

    let quizzes = source.quizzes(course_id)?;
    let assignments = source.assignments(course_id)?;
    if quizzes.len() < MIN_QUIZZES || assignments.len() < MIN_ASSIGNMENTS {
        return Ok(CompletionResult::incomplete(REASON_UNDER_PROVISIONED, 0, 0));
    }

    if source.enrollment(student_id, course_id)?.is_none() {
        return Ok(CompletionResult::incomplete(REASON_NOT_ENROLLED, 0, 0));
    }

    let mut quiz_percents: Vec<f64> = Vec::with_capacity(MIN_QUIZZES);
    for q in quizzes.iter().take(MIN_QUIZZES) {
        let best = source
            .attempts(student_id, &q.id)?
            .iter()
            .map(|a| a.score)
            .max();
        if let Some(score) = best {
            quiz_percents.push(score.clamp(0, 100) as f64);
        }
    }

    let mut assignment_percents: Vec<f64> = Vec::with_capacity(MIN_ASSIGNMENTS);
    for a in assignments.iter().take(MIN_ASSIGNMENTS) {
        let Some(submission) = source.submission(student_id, &a.id)? else {
            continue;
        };
        // Submitted but not yet graded still counts as handed in; it contributes 0%.
        let percent = match submission.score {
            Some(s) if a.max_score > 0 => (100.0 * s / (a.max_score as f64)).clamp(0.0, 100.0),
            _ => 0.0,
        };
        assignment_percents.push(percent);
    }

    let quizzes_attempted = quiz_percents.len();
    let assignments_submitted = assignment_percents.len();
    if quizzes_attempted < MIN_QUIZZES || assignments_submitted < MIN_ASSIGNMENTS {
        return Ok(CompletionResult::incomplete(
            format!(
                "{} of {} quizzes attempted, {} of {} assignments submitted",
                quizzes_attempted, MIN_QUIZZES, assignments_submitted, MIN_ASSIGNMENTS
            ),
            quizzes_attempted,
            assignments_submitted,
        ));
    }

    // Thresholds apply to the exact blend; only the reported figure is rounded.
    let blend = completion_blend(&quiz_percents, &assignment_percents);
    Ok(CompletionResult {
        is_complete: true,
        reason: None,
        grade: Some(calc::completion_grade(blend)),
        percentage: Some(calc::round_off_1_decimal(blend)),
        quizzes_attempted,
        assignments_submitted,
    })
}

/// Equal-weight quiz average and assignment average, blended 50/50.
fn completion_blend(quiz_percents: &[f64], assignment_percents: &[f64]) -> f64 {
    let mean = |xs: &[f64]| {
        if xs.is_empty() {
            0.0
        } else {
            xs.iter().sum::<f64>() / (xs.len() as f64)
        }
    };
    0.5 * mean(quiz_percents) + 0.5 * mean(assignment_percents)
}
