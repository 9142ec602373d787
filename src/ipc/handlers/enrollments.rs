use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, new_id, now_rfc3339, query_failed, require_row, required_str};
use crate::ipc::types::{AppState, Request};
use crate::source::{ScoreSource, SqliteSource};
use rusqlite::OptionalExtension;
use serde_json::json;

/// Enrolling an already-enrolled student returns the existing enrollment unchanged.
fn handle_enrollments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_row(conn, req, "courses", "course", &course_id) {
        return e;
    }
    if let Err(e) = require_row(conn, req, "students", "student", &student_id) {
        return e;
    }

    let existing: Option<String> = match conn
        .query_row(
            "SELECT enrolled_at FROM enrollments WHERE course_id = ? AND student_id = ?",
            (&course_id, &student_id),
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    if let Some(enrolled_at) = existing {
        return ok(
            &req.id,
            json!({ "enrolledAt": enrolled_at, "created": false }),
        );
    }

    let seq = match db::next_position(conn, "enrollments", "seq", "course_id", &course_id) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let enrolled_at = now_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO enrollments(id, course_id, student_id, enrolled_at, seq)
         VALUES(?, ?, ?, ?, ?)",
        (new_id(), &course_id, &student_id, &enrolled_at, seq),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "enrollments" })),
        );
    }
    ok(&req.id, json!({ "enrolledAt": enrolled_at, "created": true }))
}

fn handle_enrollments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    match SqliteSource::new(conn).roster(&course_id) {
        Ok(enrollments) => ok(&req.id, json!({ "enrollments": enrollments })),
        Err(e) => err(&req.id, "data_unavailable", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.create" => Some(handle_enrollments_create(state, req)),
        "enrollments.list" => Some(handle_enrollments_list(state, req)),
        _ => None,
    }
}
