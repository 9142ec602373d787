#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Asserts a failed response and returns its error code.
pub fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

pub fn str_field(v: &serde_json::Value, key: &str) -> String {
    v.get(key)
        .and_then(|x| x.as_str())
        .unwrap_or_else(|| panic!("missing string field {} in {}", key, v))
        .to_string()
}

/// A course with `lectures` lectures, two assignments (max 50 and 100) and three
/// single-question quizzes, plus one enrolled student.
pub struct SeededCourse {
    pub course_id: String,
    pub student_id: String,
    pub lecture_ids: Vec<String>,
    pub assignment_ids: Vec<String>,
    pub quiz_ids: Vec<String>,
}

pub fn seed_course(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    lectures: usize,
) -> SeededCourse {
    let course = request_ok(
        stdin,
        reader,
        "seed-course",
        "courses.create",
        json!({ "name": "Systems Programming", "teacherName": "R. Okafor" }),
    );
    let course_id = str_field(&course, "courseId");
    let student = request_ok(
        stdin,
        reader,
        "seed-student",
        "students.create",
        json!({ "displayName": "Dana Reyes" }),
    );
    let student_id = str_field(&student, "studentId");
    let _ = request_ok(
        stdin,
        reader,
        "seed-enroll",
        "enrollments.create",
        json!({ "courseId": course_id, "studentId": student_id }),
    );

    let mut lecture_ids = Vec::new();
    for i in 0..lectures {
        let l = request_ok(
            stdin,
            reader,
            &format!("seed-lecture-{}", i),
            "lectures.create",
            json!({ "courseId": course_id, "title": format!("Lecture {}", i + 1) }),
        );
        lecture_ids.push(str_field(&l, "lectureId"));
    }

    let mut assignment_ids = Vec::new();
    for (i, max) in [50, 100].iter().enumerate() {
        let a = request_ok(
            stdin,
            reader,
            &format!("seed-assignment-{}", i),
            "assignments.create",
            json!({ "courseId": course_id, "title": format!("Project {}", i + 1), "maxScore": max }),
        );
        assignment_ids.push(str_field(&a, "assignmentId"));
    }

    let mut quiz_ids = Vec::new();
    for i in 0..3 {
        let q = request_ok(
            stdin,
            reader,
            &format!("seed-quiz-{}", i),
            "quizzes.create",
            json!({ "courseId": course_id, "title": format!("Quiz {}", i + 1) }),
        );
        let quiz_id = str_field(&q, "quizId");
        let _ = request_ok(
            stdin,
            reader,
            &format!("seed-question-{}", i),
            "quizzes.addQuestion",
            json!({
                "quizId": quiz_id,
                "prompt": "Which one is right?",
                "options": ["right", "wrong"],
                "correctIndex": 0
            }),
        );
        quiz_ids.push(quiz_id);
    }

    SeededCourse {
        course_id,
        student_id,
        lecture_ids,
        assignment_ids,
        quiz_ids,
    }
}
