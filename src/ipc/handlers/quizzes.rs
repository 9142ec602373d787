use crate::calc;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup::gradebook_defaults;
use crate::ipc::helpers::{
    db_conn, new_id, now_rfc3339, optional_i64, query_failed, require_enrollment, require_row,
    required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::source::{ScoreSource, SqliteSource};
use rusqlite::OptionalExtension;
use serde_json::json;

const MAX_OPTIONS: usize = 8;

fn handle_quizzes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_row(conn, req, "courses", "course", &course_id) {
        return e;
    }
    let quizzes = match SqliteSource::new(conn).quizzes(&course_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "data_unavailable", e.to_string(), None),
    };

    let mut out = Vec::with_capacity(quizzes.len());
    for q in quizzes {
        let question_count: i64 = match conn.query_row(
            "SELECT COUNT(*) FROM quiz_questions WHERE quiz_id = ?",
            [&q.id],
            |r| r.get(0),
        ) {
            Ok(v) => v,
            Err(e) => return query_failed(req, e),
        };
        let mut v = json!(q);
        v["questionCount"] = json!(question_count);
        out.push(v);
    }
    ok(&req.id, json!({ "quizzes": out }))
}

fn handle_quizzes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let passing_score = match optional_i64(req, "passingScore") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let time_limit_seconds = match optional_i64(req, "timeLimitSeconds") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_row(conn, req, "courses", "course", &course_id) {
        return e;
    }

    let defaults = match gradebook_defaults(conn) {
        Ok(d) => d,
        Err(e) => return query_failed(req, e),
    };
    let passing_score = passing_score.unwrap_or(defaults.quiz_passing_score);
    let time_limit_seconds = time_limit_seconds.unwrap_or(defaults.quiz_time_limit_seconds);
    if !(0..=100).contains(&passing_score) {
        return err(
            &req.id,
            "bad_params",
            "passingScore must be in 0..=100",
            Some(json!({ "field": "passingScore", "value": passing_score })),
        );
    }
    if time_limit_seconds <= 0 {
        return err(
            &req.id,
            "bad_params",
            "timeLimitSeconds must be positive",
            Some(json!({ "field": "timeLimitSeconds", "value": time_limit_seconds })),
        );
    }

    let seq = match db::next_position(conn, "quizzes", "seq", "course_id", &course_id) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let quiz_id = new_id();
    if let Err(e) = conn.execute(
        "INSERT INTO quizzes(id, course_id, title, passing_score, time_limit_seconds, seq, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &quiz_id,
            &course_id,
            &title,
            passing_score,
            time_limit_seconds,
            seq,
            now_rfc3339(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "quizzes" })),
        );
    }
    ok(
        &req.id,
        json!({
            "quizId": quiz_id,
            "passingScore": passing_score,
            "timeLimitSeconds": time_limit_seconds
        }),
    )
}

fn handle_quizzes_add_question(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let prompt = match required_str(req, "prompt") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw_options) = req.params.get("options").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "options must be an array", None);
    };
    let mut options: Vec<String> = Vec::with_capacity(raw_options.len());
    for o in raw_options {
        match o.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => options.push(s.to_string()),
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    "options must be non-empty strings",
                    None,
                )
            }
        }
    }
    if options.len() < 2 || options.len() > MAX_OPTIONS {
        return err(
            &req.id,
            "bad_params",
            format!("a question needs 2..={} options", MAX_OPTIONS),
            Some(json!({ "optionCount": options.len() })),
        );
    }
    let Some(correct_index) = req.params.get("correctIndex").and_then(|v| v.as_u64()) else {
        return err(&req.id, "bad_params", "missing/invalid correctIndex", None);
    };
    if correct_index as usize >= options.len() {
        return err(
            &req.id,
            "bad_params",
            "correctIndex out of range",
            Some(json!({ "correctIndex": correct_index, "optionCount": options.len() })),
        );
    }
    if let Err(e) = require_row(conn, req, "quizzes", "quiz", &quiz_id) {
        return e;
    }

    let options_json = match serde_json::to_string(&options) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    let sort_order =
        match db::next_position(conn, "quiz_questions", "sort_order", "quiz_id", &quiz_id) {
            Ok(v) => v,
            Err(e) => return query_failed(req, e),
        };
    let question_id = new_id();
    if let Err(e) = conn.execute(
        "INSERT INTO quiz_questions(id, quiz_id, prompt, options_json, correct_index, sort_order)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &question_id,
            &quiz_id,
            &prompt,
            &options_json,
            correct_index as i64,
            sort_order,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "quiz_questions" })),
        );
    }
    ok(
        &req.id,
        json!({ "questionId": question_id, "sortOrder": sort_order }),
    )
}

/// `answers[i]` is the chosen option for the i-th question; missing or null answers
/// count as wrong.
fn handle_attempts_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(answers) = req.params.get("answers").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "answers must be an array", None);
    };

    let quiz: Option<(String, i64)> = match conn
        .query_row(
            "SELECT course_id, passing_score FROM quizzes WHERE id = ?",
            [&quiz_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let Some((course_id, passing_score)) = quiz else {
        return err(
            &req.id,
            "not_found",
            "quiz not found",
            Some(json!({ "entity": "quiz", "id": quiz_id })),
        );
    };
    if let Err(e) = require_enrollment(conn, req, &course_id, &student_id) {
        return e;
    }

    let mut stmt = match conn.prepare(
        "SELECT correct_index FROM quiz_questions WHERE quiz_id = ? ORDER BY sort_order, rowid",
    ) {
        Ok(s) => s,
        Err(e) => return query_failed(req, e),
    };
    let key = match stmt
        .query_map([&quiz_id], |r| r.get::<_, i64>(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    if key.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "quiz has no questions",
            Some(json!({ "quizId": quiz_id })),
        );
    }

    let correct_count = key
        .iter()
        .enumerate()
        .filter(|(i, correct)| {
            answers.get(*i).and_then(|a| a.as_i64()) == Some(**correct)
        })
        .count();
    let score = calc::attempt_score(correct_count, key.len());

    let attempt_no: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(attempt_no), 0) + 1 FROM quiz_attempts WHERE quiz_id = ? AND student_id = ?",
        (&quiz_id, &student_id),
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let submitted_at = now_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO quiz_attempts(id, quiz_id, student_id, attempt_no, score, correct_count, question_count, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            new_id(),
            &quiz_id,
            &student_id,
            attempt_no,
            score,
            correct_count as i64,
            key.len() as i64,
            &submitted_at,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "quiz_attempts" })),
        );
    }

    ok(
        &req.id,
        json!({
            "attemptNo": attempt_no,
            "score": score,
            "correctCount": correct_count,
            "questionCount": key.len(),
            "passed": score >= passing_score,
            "submittedAt": submitted_at
        }),
    )
}

fn handle_attempts_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_row(conn, req, "quizzes", "quiz", &quiz_id) {
        return e;
    }
    let attempts = match SqliteSource::new(conn).attempts(&student_id, &quiz_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "data_unavailable", e.to_string(), None),
    };
    let best_score = attempts.iter().map(|a| a.score).max();
    ok(
        &req.id,
        json!({ "attempts": attempts, "bestScore": best_score }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "quizzes.list" => Some(handle_quizzes_list(state, req)),
        "quizzes.create" => Some(handle_quizzes_create(state, req)),
        "quizzes.addQuestion" => Some(handle_quizzes_add_question(state, req)),
        "attempts.submit" => Some(handle_attempts_submit(state, req)),
        "attempts.list" => Some(handle_attempts_list(state, req)),
        _ => None,
    }
}
