use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

/// Absent or null is `None`; any other non-string is rejected.
pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_str() {
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => Ok(Some(s.trim().to_string())),
            None => Err(err(
                &req.id,
                "bad_params",
                format!("{} must be a string", key),
                None,
            )),
        },
    }
}

pub fn optional_i64(req: &Request, key: &str) -> Result<Option<i64>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be an integer", key),
                Some(json!({ "field": key, "value": v })),
            )
        }),
    }
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing/invalid {}", key), None))
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn query_failed(req: &Request, e: impl ToString) -> serde_json::Value {
    err(&req.id, "db_query_failed", e.to_string(), None)
}

/// Fails with `not_found` unless `id` exists in `table`.
pub fn require_row(
    conn: &Connection,
    req: &Request,
    table: &str,
    entity: &str,
    id: &str,
) -> Result<(), serde_json::Value> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    let found: Option<i64> = conn
        .query_row(&sql, [id], |r| r.get(0))
        .optional()
        .map_err(|e| query_failed(req, e))?;
    if found.is_none() {
        return Err(err(
            &req.id,
            "not_found",
            format!("{} not found", entity),
            Some(json!({ "entity": entity, "id": id })),
        ));
    }
    Ok(())
}

/// Fails with `not_found` unless the student is enrolled in the course.
pub fn require_enrollment(
    conn: &Connection,
    req: &Request,
    course_id: &str,
    student_id: &str,
) -> Result<(), serde_json::Value> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE course_id = ? AND student_id = ?",
            (course_id, student_id),
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| query_failed(req, e))?;
    if found.is_none() {
        return Err(err(
            &req.id,
            "not_found",
            "enrollment not found",
            Some(json!({ "entity": "enrollment", "courseId": course_id, "studentId": student_id })),
        ));
    }
    Ok(())
}
