use crate::calc::GRADED_ASSIGNMENT_SLOTS;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup::gradebook_defaults;
use crate::ipc::helpers::{
    db_conn, new_id, now_rfc3339, optional_i64, optional_str, query_failed, require_enrollment,
    require_row, required_f64, required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::source::{ScoreSource, SqliteSource};
use rusqlite::OptionalExtension;
use serde_json::json;

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    match SqliteSource::new(conn).assignments(&course_id) {
        Ok(assignments) => ok(&req.id, json!({ "assignments": assignments })),
        Err(e) => err(&req.id, "data_unavailable", e.to_string(), None),
    }
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let due_date = match optional_str(req, "dueDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let max_score = match optional_i64(req, "maxScore") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_row(conn, req, "courses", "course", &course_id) {
        return e;
    }

    let max_score = match max_score {
        Some(v) => v,
        None => match gradebook_defaults(conn) {
            Ok(d) => d.assignment_max_score,
            Err(e) => return query_failed(req, e),
        },
    };
    if max_score <= 0 {
        return err(
            &req.id,
            "bad_params",
            "maxScore must be positive",
            Some(json!({ "field": "maxScore", "value": max_score })),
        );
    }
    if let Some(d) = due_date.as_deref() {
        if chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").is_err() {
            return err(
                &req.id,
                "bad_params",
                "dueDate must be YYYY-MM-DD",
                Some(json!({ "field": "dueDate", "value": d })),
            );
        }
    }

    let existing: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM assignments WHERE course_id = ?",
        [&course_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    if existing >= GRADED_ASSIGNMENT_SLOTS as i64 {
        return err(
            &req.id,
            "limit_reached",
            format!("a course has at most {} assignments", GRADED_ASSIGNMENT_SLOTS),
            Some(json!({ "courseId": course_id, "limit": GRADED_ASSIGNMENT_SLOTS })),
        );
    }

    let seq = match db::next_position(conn, "assignments", "seq", "course_id", &course_id) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let assignment_id = new_id();
    if let Err(e) = conn.execute(
        "INSERT INTO assignments(id, course_id, title, max_score, due_date, seq, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &assignment_id,
            &course_id,
            &title,
            max_score,
            &due_date,
            seq,
            now_rfc3339(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "assignments" })),
        );
    }
    ok(
        &req.id,
        json!({ "assignmentId": assignment_id, "maxScore": max_score }),
    )
}

fn assignment_course(
    conn: &rusqlite::Connection,
    req: &Request,
    assignment_id: &str,
) -> Result<(String, i64), serde_json::Value> {
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT course_id, max_score FROM assignments WHERE id = ?",
            [assignment_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(|e| query_failed(req, e))?;
    row.ok_or_else(|| {
        err(
            &req.id,
            "not_found",
            "assignment not found",
            Some(json!({ "entity": "assignment", "id": assignment_id })),
        )
    })
}

/// Resubmitting replaces the content and clears any earlier grade.
fn handle_submissions_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let content = match optional_str(req, "content") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (course_id, _) = match assignment_course(conn, req, &assignment_id) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_enrollment(conn, req, &course_id, &student_id) {
        return e;
    }

    let submitted_at = now_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO submissions(id, assignment_id, student_id, submitted_at, content, score, feedback, graded_at)
         VALUES(?, ?, ?, ?, ?, NULL, NULL, NULL)
         ON CONFLICT(assignment_id, student_id) DO UPDATE SET
           submitted_at = excluded.submitted_at,
           content = excluded.content,
           score = NULL,
           feedback = NULL,
           graded_at = NULL",
        (new_id(), &assignment_id, &student_id, &submitted_at, &content),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "submissions" })),
        );
    }
    ok(&req.id, json!({ "submittedAt": submitted_at }))
}

fn handle_submissions_grade(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    // `+ 0.0` turns -0.0 into 0.0.
    let score = match required_f64(req, "score") {
        Ok(v) => v + 0.0,
        Err(e) => return e,
    };
    let feedback = match optional_str(req, "feedback") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (_, max_score) = match assignment_course(conn, req, &assignment_id) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if !(0.0..=max_score as f64).contains(&score) {
        return err(
            &req.id,
            "validation_failed",
            format!("score must be between 0 and {}", max_score),
            Some(json!({ "score": score, "maxScore": max_score, "assignmentId": assignment_id })),
        );
    }

    let changed = match conn.execute(
        "UPDATE submissions SET score = ?, feedback = ?, graded_at = ?
         WHERE assignment_id = ? AND student_id = ?",
        (score, &feedback, now_rfc3339(), &assignment_id, &student_id),
    ) {
        Ok(n) => n,
        Err(e) => {
            return err(
                &req.id,
                "db_update_failed",
                e.to_string(),
                Some(json!({ "table": "submissions" })),
            )
        }
    };
    if changed == 0 {
        return err(
            &req.id,
            "not_found",
            "submission not found",
            Some(json!({
                "entity": "submission",
                "assignmentId": assignment_id,
                "studentId": student_id
            })),
        );
    }
    ok(&req.id, json!({ "score": score, "maxScore": max_score }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.list" => Some(handle_assignments_list(state, req)),
        "assignments.create" => Some(handle_assignments_create(state, req)),
        "submissions.submit" => Some(handle_submissions_submit(state, req)),
        "submissions.grade" => Some(handle_submissions_grade(state, req)),
        _ => None,
    }
}
