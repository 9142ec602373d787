use crate::calc;
use crate::certificate;
use crate::completion;
use crate::ipc::error::{err, grade_err, ok};
use crate::ipc::handlers::setup::certificate_template;
use crate::ipc::helpers::{db_conn, optional_str, query_failed, required_str};
use crate::ipc::types::{AppState, Request};
use crate::source::{ScoreSource, SqliteSource};
use rusqlite::OptionalExtension;
use serde_json::json;

fn handle_grades_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let source = SqliteSource::new(conn);
    match calc::compute_grade_summary(&source, &student_id, &course_id) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => grade_err(&req.id, &e),
    }
}

fn handle_grades_completion(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let source = SqliteSource::new(conn);
    match completion::evaluate_completion(&source, &student_id, &course_id) {
        Ok(result) => ok(&req.id, json!(result)),
        Err(e) => grade_err(&req.id, &e),
    }
}

/// Issues only for a completed course; anything else is `not_complete` with the
/// evaluator's reason.
fn handle_certificates_issue(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let completion_date = match optional_str(req, "completionDate") {
        Ok(None) => chrono::Local::now().date_naive(),
        Ok(Some(s)) => match chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                return err(
                    &req.id,
                    "bad_params",
                    "completionDate must be YYYY-MM-DD",
                    Some(json!({ "field": "completionDate", "value": s })),
                )
            }
        },
        Err(e) => return e,
    };

    let source = SqliteSource::new(conn);
    let result = match completion::evaluate_completion(&source, &student_id, &course_id) {
        Ok(v) => v,
        Err(e) => return grade_err(&req.id, &e),
    };
    let (true, Some(grade)) = (result.is_complete, result.grade) else {
        return err(
            &req.id,
            "not_complete",
            result
                .reason
                .clone()
                .unwrap_or_else(|| "course not complete".to_string()),
            Some(json!(result)),
        );
    };

    let course_name = match source.course(&course_id) {
        Ok(Some(c)) => c.name,
        Ok(None) => {
            return err(
                &req.id,
                "not_found",
                "course not found",
                Some(json!({ "entity": "course", "id": course_id })),
            )
        }
        Err(e) => return err(&req.id, "data_unavailable", e.to_string(), None),
    };
    let student_name: Option<String> = match conn
        .query_row(
            "SELECT display_name FROM students WHERE id = ?",
            [&student_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let Some(student_name) = student_name else {
        return err(
            &req.id,
            "not_found",
            "student not found",
            Some(json!({ "entity": "student", "id": student_id })),
        );
    };
    let template = match certificate_template(conn) {
        Ok(t) => t,
        Err(e) => return query_failed(req, e),
    };

    let doc = certificate::render_certificate(
        &template,
        &student_name,
        &course_name,
        grade,
        completion_date,
    );
    tracing::info!(
        course_id = %course_id,
        student_id = %student_id,
        grade = %grade,
        verification_code = %doc.verification_code,
        "certificate issued"
    );
    ok(
        &req.id,
        json!({ "certificate": doc, "percentage": result.percentage }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.summary" => Some(handle_grades_summary(state, req)),
        "grades.completion" => Some(handle_grades_completion(state, req)),
        "certificates.issue" => Some(handle_certificates_issue(state, req)),
        _ => None,
    }
}
