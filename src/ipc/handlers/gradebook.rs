use crate::gradebook;
use crate::ipc::error::{err, grade_err, ok};
use crate::ipc::helpers::{db_conn, now_rfc3339, optional_i64, optional_str, required_f64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::source::SqliteSource;
use serde_json::json;

fn handle_gradebook_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let source = SqliteSource::new(conn);
    match gradebook::build_gradebook(&source, &course_id) {
        Ok(book) => ok(&req.id, json!(book)),
        Err(e) => grade_err(&req.id, &e),
    }
}

/// The target column is `assignmentId`, or `assignmentIndex` (1 or 2) as shown in the
/// gradebook header.
fn handle_gradebook_update_assignment_score(
    state: &mut AppState,
    req: &Request,
) -> serde_json::Value {
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
    let score = match required_f64(req, "score") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assignment_id = match optional_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assignment_index = match optional_i64(req, "assignmentIndex") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let source = SqliteSource::new(conn);
    let assignment_id = match (assignment_id, assignment_index) {
        (Some(id), _) => id,
        (None, Some(index)) if index >= 1 => {
            match gradebook::assignment_id_at(&source, &course_id, index as usize) {
                Ok(id) => id,
                Err(e) => return grade_err(&req.id, &e),
            }
        }
        (None, Some(index)) => {
            return err(
                &req.id,
                "bad_params",
                "assignmentIndex must be 1 or 2",
                Some(json!({ "field": "assignmentIndex", "value": index })),
            )
        }
        (None, None) => {
            return err(
                &req.id,
                "bad_params",
                "missing assignmentId or assignmentIndex",
                None,
            )
        }
    };

    match gradebook::update_assignment_score(
        &source,
        &course_id,
        &student_id,
        &assignment_id,
        score,
        &now_rfc3339(),
    ) {
        Ok(row) => ok(&req.id, json!({ "row": row })),
        Err(e) => grade_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "gradebook.get" => Some(handle_gradebook_get(state, req)),
        "gradebook.updateAssignmentScore" => {
            Some(handle_gradebook_update_assignment_score(state, req))
        }
        _ => None,
    }
}
