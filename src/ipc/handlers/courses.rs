use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, new_id, now_rfc3339, optional_str, query_failed, required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::source::{ScoreSource, SqliteSource};
use serde_json::json;

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };

    // Correlated subqueries keep each count independent of the others.
    let mut stmt = match conn.prepare(
        "SELECT
           c.id,
           c.name,
           c.teacher_name,
           (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id) AS student_count,
           (SELECT COUNT(*) FROM lectures l WHERE l.course_id = c.id) AS lecture_count,
           (SELECT COUNT(*) FROM assignments a WHERE a.course_id = c.id) AS assignment_count,
           (SELECT COUNT(*) FROM quizzes q WHERE q.course_id = c.id) AS quiz_count
         FROM courses c
         ORDER BY c.name, c.rowid",
    ) {
        Ok(s) => s,
        Err(e) => return query_failed(req, e),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "teacherName": r.get::<_, Option<String>>(2)?,
                "studentCount": r.get::<_, i64>(3)?,
                "lectureCount": r.get::<_, i64>(4)?,
                "assignmentCount": r.get::<_, i64>(5)?,
                "quizCount": r.get::<_, i64>(6)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_name = match optional_str(req, "teacherName") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let course_id = new_id();
    if let Err(e) = conn.execute(
        "INSERT INTO courses(id, name, teacher_name, created_at) VALUES(?, ?, ?, ?)",
        (&course_id, &name, &teacher_name, now_rfc3339()),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        );
    }
    tracing::info!(course_id = %course_id, "course created");
    ok(&req.id, json!({ "courseId": course_id }))
}

fn handle_courses_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let source = SqliteSource::new(conn);
    let course = match source.course(&course_id) {
        Ok(Some(c)) => c,
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
    let assignments = match source.assignments(&course_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "data_unavailable", e.to_string(), None),
    };
    let quizzes = match source.quizzes(&course_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "data_unavailable", e.to_string(), None),
    };
    let lecture_count: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM lectures WHERE course_id = ?",
        [&course_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };

    ok(
        &req.id,
        json!({
            "course": course,
            "lectureCount": lecture_count,
            "assignments": assignments,
            "quizzes": quizzes,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.get" => Some(handle_courses_get(state, req)),
        _ => None,
    }
}
