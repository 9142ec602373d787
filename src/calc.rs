use crate::error::GradeError;
use crate::source::{AssignmentRecord, Enrollment, QuizRecord, ScoreSource};
use serde::{Serialize, Serializer};
use std::fmt;

pub const VIDEO_WEIGHT: f64 = 50.0;
pub const ASSIGNMENT_WEIGHT: f64 = 25.0;
pub const QUIZ_WEIGHT: f64 = 25.0;

/// Only the first items of each kind, by creation order, carry marks.
pub const GRADED_ASSIGNMENT_SLOTS: usize = 2;
pub const GRADED_QUIZ_SLOTS: usize = 3;

pub const PASSING_FINAL_TOTAL: i64 = 60;

/// Ordered worst to best, so `Ord` compares grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LetterGrade {
    F,
    D,
    CMinus,
    C,
    CPlus,
    BMinus,
    B,
    BPlus,
    AMinus,
    A,
    APlus,
}

impl LetterGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::AMinus => "A-",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::BMinus => "B-",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::CMinus => "C-",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LetterGrade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Gradebook display scale over the 0..=100 final total. Descending; first match wins.
const GRADEBOOK_GRADE_TABLE: [(i64, LetterGrade); 10] = [
    (97, LetterGrade::APlus),
    (93, LetterGrade::A),
    (90, LetterGrade::AMinus),
    (87, LetterGrade::BPlus),
    (83, LetterGrade::B),
    (80, LetterGrade::BMinus),
    (77, LetterGrade::CPlus),
    (73, LetterGrade::C),
    (70, LetterGrade::CMinus),
    (60, LetterGrade::D),
];

/// Certificate scale over the completion percentage. Deliberately separate from the
/// gradebook scale: it grades only the qualifying quizzes and assignments.
const COMPLETION_GRADE_TABLE: [(f64, LetterGrade); 9] = [
    (90.0, LetterGrade::APlus),
    (85.0, LetterGrade::A),
    (80.0, LetterGrade::AMinus),
    (75.0, LetterGrade::BPlus),
    (70.0, LetterGrade::B),
    (65.0, LetterGrade::BMinus),
    (60.0, LetterGrade::CPlus),
    (55.0, LetterGrade::C),
    (50.0, LetterGrade::CMinus),
];

pub fn gradebook_grade(final_total: i64) -> LetterGrade {
    GRADEBOOK_GRADE_TABLE
        .iter()
        .find(|(min, _)| final_total >= *min)
        .map(|(_, grade)| *grade)
        .unwrap_or(LetterGrade::F)
}

pub fn completion_grade(percentage: f64) -> LetterGrade {
    COMPLETION_GRADE_TABLE
        .iter()
        .find(|(min, _)| percentage >= *min)
        .map(|(_, grade)| *grade)
        .unwrap_or(LetterGrade::F)
}

/// One-decimal rounding used for reported percentages and averages (half up).
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Whole-mark rounding, half away from zero.
fn round_mark(x: f64) -> i64 {
    x.round() as i64
}

/// Quiz attempt percentage: correct answers over questions, rounded to a whole percent.
pub fn attempt_score(correct_count: usize, question_count: usize) -> i64 {
    if question_count == 0 {
        return 0;
    }
    let correct = correct_count.min(question_count);
    round_mark(100.0 * (correct as f64) / (question_count as f64))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSummary {
    pub enrolled: bool,
    pub video_mark: i64,
    pub assignment_total: i64,
    pub quiz_total: i64,
    pub final_total: i64,
    pub letter_grade: LetterGrade,
}

impl GradeSummary {
    /// A student with no enrollment has simply not been scored yet.
    pub fn not_enrolled() -> Self {
        Self {
            enrolled: false,
            video_mark: 0,
            assignment_total: 0,
            quiz_total: 0,
            final_total: 0,
            letter_grade: gradebook_grade(0),
        }
    }
}

/// The graded assignments and quizzes of a course, truncated to their slots.
#[derive(Debug, Clone)]
pub struct CourseItems {
    pub assignments: Vec<AssignmentRecord>,
    pub quizzes: Vec<QuizRecord>,
}

impl CourseItems {
    pub fn load<S: ScoreSource + ?Sized>(source: &S, course_id: &str) -> Result<Self, GradeError> {
        let mut assignments = source.assignments(course_id)?;
        assignments.truncate(GRADED_ASSIGNMENT_SLOTS);
        let mut quizzes = source.quizzes(course_id)?;
        quizzes.truncate(GRADED_QUIZ_SLOTS);
        Ok(Self {
            assignments,
            quizzes,
        })
    }
}

/// Raw per-item scores for one student, aligned with [`CourseItems`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentScores {
    /// Graded submission score; `None` when absent or not yet graded.
    pub assignment_scores: Vec<Option<f64>>,
    /// Best attempt percentage; `None` when never attempted.
    pub best_quiz_scores: Vec<Option<i64>>,
}

impl StudentScores {
    pub fn collect<S: ScoreSource + ?Sized>(
        source: &S,
        student_id: &str,
        items: &CourseItems,
    ) -> Result<Self, GradeError> {
        let mut assignment_scores = Vec::with_capacity(items.assignments.len());
        for a in &items.assignments {
            let score = source
                .submission(student_id, &a.id)?
                .and_then(|s| s.score);
            assignment_scores.push(score);
        }

        let mut best_quiz_scores = Vec::with_capacity(items.quizzes.len());
        for q in &items.quizzes {
            let best = source
                .attempts(student_id, &q.id)?
                .iter()
                .map(|a| a.score)
                .max();
            best_quiz_scores.push(best);
        }

        Ok(Self {
            assignment_scores,
            best_quiz_scores,
        })
    }
}

pub fn video_mark(enrollment: &Enrollment) -> i64 {
    let total = enrollment.total_lecture_count;
    if total <= 0 {
        return 0;
    }
    let completed = enrollment.completed_lecture_count.clamp(0, total);
    round_mark(VIDEO_WEIGHT * (completed as f64) / (total as f64))
}

/// `round(weight * mean(ratios))`, 0 for an empty set.
fn weighted_share(weight: f64, ratios: &[f64]) -> i64 {
    if ratios.is_empty() {
        return 0;
    }
    let sum: f64 = ratios.iter().map(|r| r.clamp(0.0, 1.0)).sum();
    round_mark(weight * sum / (ratios.len() as f64))
}

pub fn summarize(
    enrollment: &Enrollment,
    items: &CourseItems,
    scores: &StudentScores,
) -> GradeSummary {
    let video_mark = video_mark(enrollment);

    let assignment_ratios: Vec<f64> = items
        .assignments
        .iter()
        .zip(&scores.assignment_scores)
        .map(|(a, score)| match score {
            Some(s) if a.max_score > 0 => *s / (a.max_score as f64),
            _ => 0.0,
        })
        .collect();
    let assignment_total = weighted_share(ASSIGNMENT_WEIGHT, &assignment_ratios);

    let quiz_ratios: Vec<f64> = scores
        .best_quiz_scores
        .iter()
        .map(|best| best.map(|s| (s as f64) / 100.0).unwrap_or(0.0))
        .collect();
    let quiz_total = weighted_share(QUIZ_WEIGHT, &quiz_ratios);

    let final_total = video_mark + assignment_total + quiz_total;
    GradeSummary {
        enrolled: true,
        video_mark,
        assignment_total,
        quiz_total,
        final_total,
        letter_grade: gradebook_grade(final_total),
    }
}

pub fn compute_grade_summary<S: ScoreSource + ?Sized>(
    source: &S,
    student_id: &str,
    course_id: &str,
) -> Result<GradeSummary, GradeError> {
    let Some(enrollment) = source.enrollment(student_id, course_id)? else {
        return Ok(GradeSummary::not_enrolled());
    };
    let items = CourseItems::load(source, course_id)?;
    let scores = StudentScores::collect(source, student_id, &items)?;
    Ok(summarize(&enrollment, &items, &scores))
}
