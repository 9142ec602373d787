use crate::calc::{self, CourseItems, GradeSummary, StudentScores};
use crate::error::GradeError;
use crate::source::{RosterEntry, ScoreSource, ScoreStore};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentColumn {
    pub assignment_id: String,
    pub index: usize,
    pub title: String,
    pub max_score: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizColumn {
    pub quiz_id: String,
    pub index: usize,
    pub title: String,
    pub passing_score: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradebookRow {
    pub student_id: String,
    pub display_name: String,
    pub enrolled_at: String,
    pub assignment1: Option<f64>,
    pub assignment2: Option<f64>,
    pub quiz1: Option<i64>,
    pub quiz2: Option<i64>,
    pub quiz3: Option<i64>,
    #[serde(flatten)]
    pub summary: GradeSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub student_count: usize,
    pub average_final: Option<f64>,
    pub max_final: Option<i64>,
    pub passing_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gradebook {
    pub course_id: String,
    pub course_name: String,
    pub assignments: Vec<AssignmentColumn>,
    pub quizzes: Vec<QuizColumn>,
    pub rows: Vec<GradebookRow>,
    pub stats: ClassStats,
}

fn build_row<S: ScoreSource + ?Sized>(
    source: &S,
    course_id: &str,
    entry: &RosterEntry,
    items: &CourseItems,
) -> Result<GradebookRow, GradeError> {
    let scores = StudentScores::collect(source, &entry.student_id, items)?;
    // A roster entry without a readable enrollment is shown unscored.
    let summary = match source.enrollment(&entry.student_id, course_id)? {
        Some(enrollment) => calc::summarize(&enrollment, items, &scores),
        None => GradeSummary::not_enrolled(),
    };

    let assignment = |i: usize| scores.assignment_scores.get(i).copied().flatten();
    let quiz = |i: usize| scores.best_quiz_scores.get(i).copied().flatten();
    Ok(GradebookRow {
        student_id: entry.student_id.clone(),
        display_name: entry.display_name.clone(),
        enrolled_at: entry.enrolled_at.clone(),
        assignment1: assignment(0),
        assignment2: assignment(1),
        quiz1: quiz(0),
        quiz2: quiz(1),
        quiz3: quiz(2),
        summary,
    })
}

pub fn class_stats(rows: &[GradebookRow]) -> ClassStats {
    let finals: Vec<i64> = rows.iter().map(|r| r.summary.final_total).collect();
    let average_final = if finals.is_empty() {
        None
    } else {
        Some(calc::round_off_1_decimal(
            finals.iter().sum::<i64>() as f64 / finals.len() as f64,
        ))
    };
    ClassStats {
        student_count: rows.len(),
        average_final,
        max_final: finals.iter().copied().max(),
        passing_count: finals
            .iter()
            .filter(|f| **f >= calc::PASSING_FINAL_TOTAL)
            .count(),
    }
}

/// Rows follow enrollment order so row identity is stable while scores change.
pub fn build_gradebook<S: ScoreSource + ?Sized>(
    source: &S,
    course_id: &str,
) -> Result<Gradebook, GradeError> {
    let Some(course) = source.course(course_id)? else {
        return Err(GradeError::not_found("course", course_id));
    };
    let items = CourseItems::load(source, course_id)?;
    let roster = source.roster(course_id)?;

    let mut rows = Vec::with_capacity(roster.len());
    for entry in &roster {
        rows.push(build_row(source, course_id, entry, &items)?);
    }
    let stats = class_stats(&rows);

    Ok(Gradebook {
        course_id: course.id,
        course_name: course.name,
        assignments: items
            .assignments
            .iter()
            .enumerate()
            .map(|(i, a)| AssignmentColumn {
                assignment_id: a.id.clone(),
                index: i + 1,
                title: a.title.clone(),
                max_score: a.max_score,
            })
            .collect(),
        quizzes: items
            .quizzes
            .iter()
            .enumerate()
            .map(|(i, q)| QuizColumn {
                quiz_id: q.id.clone(),
                index: i + 1,
                title: q.title.clone(),
                passing_score: q.passing_score,
            })
            .collect(),
        rows,
        stats,
    })
}

/// Resolve a 1-based editable assignment column to its id.
pub fn assignment_id_at<S: ScoreSource + ?Sized>(
    source: &S,
    course_id: &str,
    index: usize,
) -> Result<String, GradeError> {
    if source.course(course_id)?.is_none() {
        return Err(GradeError::not_found("course", course_id));
    }
    let items = CourseItems::load(source, course_id)?;
    index
        .checked_sub(1)
        .and_then(|i| items.assignments.get(i))
        .map(|a| a.id.clone())
        .ok_or_else(|| GradeError::not_found("assignment", format!("#{}", index)))
}

/// The gradebook's only write. Out-of-range scores are rejected, never clamped, and
/// nothing is written on rejection.
pub fn update_assignment_score<S: ScoreStore + ?Sized>(
    store: &S,
    course_id: &str,
    student_id: &str,
    assignment_id: &str,
    new_score: f64,
    graded_at: &str,
) -> Result<GradebookRow, GradeError> {
    if store.course(course_id)?.is_none() {
        return Err(GradeError::not_found("course", course_id));
    }
    let items = CourseItems::load(store, course_id)?;
    let Some(assignment) = items.assignments.iter().find(|a| a.id == assignment_id) else {
        return Err(GradeError::not_found("assignment", assignment_id));
    };

    let roster = store.roster(course_id)?;
    let Some(entry) = roster.iter().find(|r| r.student_id == student_id) else {
        return Err(GradeError::not_found("enrollment", student_id));
    };

    if !new_score.is_finite() || new_score < 0.0 || new_score > assignment.max_score as f64 {
        return Err(GradeError::validation(
            format!("score must be between 0 and {}", assignment.max_score),
            Some(json!({
                "score": if new_score.is_finite() { json!(new_score) } else { json!(null) },
                "maxScore": assignment.max_score,
                "assignmentId": assignment.id,
            })),
        ));
    }

    // Store -0.0 as 0.0.
    let new_score = new_score + 0.0;
    store.set_submission_score(student_id, assignment_id, new_score, graded_at)?;
    tracing::debug!(course_id, student_id, assignment_id, new_score, "assignment score updated");

    build_row(store, course_id, entry, &items)
}
