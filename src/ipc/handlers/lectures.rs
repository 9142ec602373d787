use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, new_id, now_rfc3339, optional_str, query_failed, require_enrollment, require_row,
    required_str,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;

/// With `studentId`, each lecture also carries that student's `completed` flag.
fn handle_lectures_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match optional_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_row(conn, req, "courses", "course", &course_id) {
        return e;
    }

    let mut stmt = match conn.prepare(
        "SELECT
           l.id,
           l.title,
           l.sort_order,
           EXISTS(
             SELECT 1 FROM lecture_completions lc
             WHERE lc.lecture_id = l.id AND lc.student_id = ?2
           ) AS completed
         FROM lectures l
         WHERE l.course_id = ?1
         ORDER BY l.sort_order, l.rowid",
    ) {
        Ok(s) => s,
        Err(e) => return query_failed(req, e),
    };
    let with_flag = student_id.is_some();
    let rows = stmt
        .query_map((&course_id, &student_id), |r| {
            let mut v = json!({
                "id": r.get::<_, String>(0)?,
                "title": r.get::<_, String>(1)?,
                "sortOrder": r.get::<_, i64>(2)?,
            });
            if with_flag {
                v["completed"] = json!(r.get::<_, i64>(3)? != 0);
            }
            Ok(v)
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(lectures) => ok(&req.id, json!({ "lectures": lectures })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_lectures_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    if let Err(e) = require_row(conn, req, "courses", "course", &course_id) {
        return e;
    }

    let sort_order = match db::next_position(conn, "lectures", "sort_order", "course_id", &course_id)
    {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let lecture_id = new_id();
    if let Err(e) = conn.execute(
        "INSERT INTO lectures(id, course_id, title, sort_order) VALUES(?, ?, ?, ?)",
        (&lecture_id, &course_id, &title, sort_order),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "lectures" })),
        );
    }
    ok(
        &req.id,
        json!({ "lectureId": lecture_id, "sortOrder": sort_order }),
    )
}

/// Idempotent: marking a lecture twice keeps the first completion time.
fn handle_lectures_mark_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let lecture_id = match required_str(req, "lectureId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let course_id: Option<String> = match conn
        .query_row(
            "SELECT course_id FROM lectures WHERE id = ?",
            [&lecture_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let Some(course_id) = course_id else {
        return err(
            &req.id,
            "not_found",
            "lecture not found",
            Some(json!({ "entity": "lecture", "id": lecture_id })),
        );
    };
    if let Err(e) = require_enrollment(conn, req, &course_id, &student_id) {
        return e;
    }

    let inserted = match conn.execute(
        "INSERT OR IGNORE INTO lecture_completions(lecture_id, student_id, completed_at)
         VALUES(?, ?, ?)",
        (&lecture_id, &student_id, now_rfc3339()),
    ) {
        Ok(n) => n,
        Err(e) => {
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "lecture_completions" })),
            )
        }
    };

    let (completed, total): (i64, i64) = match conn.query_row(
        "SELECT
           (SELECT COUNT(*) FROM lecture_completions lc
              JOIN lectures l ON l.id = lc.lecture_id
              WHERE l.course_id = ?1 AND lc.student_id = ?2),
           (SELECT COUNT(*) FROM lectures WHERE course_id = ?1)",
        (&course_id, &student_id),
        |r| Ok((r.get(0)?, r.get(1)?)),
    ) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };

    ok(
        &req.id,
        json!({
            "newlyCompleted": inserted > 0,
            "completedLectureCount": completed,
            "totalLectureCount": total
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lectures.list" => Some(handle_lectures_list(state, req)),
        "lectures.create" => Some(handle_lectures_create(state, req)),
        "lectures.markComplete" => Some(handle_lectures_mark_complete(state, req)),
        _ => None,
    }
}
