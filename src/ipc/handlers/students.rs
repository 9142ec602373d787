use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, new_id, now_rfc3339, optional_str, query_failed, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, display_name, email, created_at FROM students ORDER BY display_name, rowid",
    ) {
        Ok(s) => s,
        Err(e) => return query_failed(req, e),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "displayName": r.get::<_, String>(1)?,
                "email": r.get::<_, Option<String>>(2)?,
                "createdAt": r.get::<_, String>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let display_name = match required_str(req, "displayName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match optional_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let student_id = new_id();
    if let Err(e) = conn.execute(
        "INSERT INTO students(id, display_name, email, created_at) VALUES(?, ?, ?, ?)",
        (&student_id, &display_name, &email, now_rfc3339()),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }
    ok(&req.id, json!({ "studentId": student_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        _ => None,
    }
}
