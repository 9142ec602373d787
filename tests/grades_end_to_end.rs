mod test_support;

use serde_json::json;
use test_support::{request_err_code, request_ok, seed_course, spawn_sidecar, temp_dir};

#[test]
fn grade_summary_blends_video_assignment_and_quiz_shares() {
    let workspace = temp_dir("gradebook-grades-summary");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let c = seed_course(&mut stdin, &mut reader, 4);

    for (i, lecture_id) in c.lecture_ids.iter().take(3).enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("lec-{}", i),
            "lectures.markComplete",
            json!({ "lectureId": lecture_id, "studentId": c.student_id }),
        );
    }
    for (i, (assignment_id, score)) in c.assignment_ids.iter().zip([40.0, 90.0]).enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("sub-{}", i),
            "submissions.submit",
            json!({ "assignmentId": assignment_id, "studentId": c.student_id, "content": "done" }),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("grade-{}", i),
            "submissions.grade",
            json!({ "assignmentId": assignment_id, "studentId": c.student_id, "score": score }),
        );
    }
    // Quiz 1: wrong then right (best 100). Quiz 2: right. Quiz 3: wrong.
    for (i, (quiz_id, answer)) in [
        (&c.quiz_ids[0], 1),
        (&c.quiz_ids[0], 0),
        (&c.quiz_ids[1], 0),
        (&c.quiz_ids[2], 1),
    ]
    .iter()
    .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("attempt-{}", i),
            "attempts.submit",
            json!({ "quizId": quiz_id, "studentId": c.student_id, "answers": [answer] }),
        );
    }

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "summary",
        "grades.summary",
        json!({ "courseId": c.course_id, "studentId": c.student_id }),
    );
    assert_eq!(summary["enrolled"], json!(true));
    assert_eq!(summary["videoMark"], json!(38));
    assert_eq!(summary["assignmentTotal"], json!(21));
    assert_eq!(summary["quizTotal"], json!(17));
    assert_eq!(summary["finalTotal"], json!(76));
    assert_eq!(summary["letterGrade"], json!("C"));

    let completion = request_ok(
        &mut stdin,
        &mut reader,
        "completion",
        "grades.completion",
        json!({ "courseId": c.course_id, "studentId": c.student_id }),
    );
    assert_eq!(completion["isComplete"], json!(true));
    assert_eq!(completion["percentage"], json!(75.8));
    assert_eq!(completion["grade"], json!("B+"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unenrolled_student_gets_zero_summary() {
    let workspace = temp_dir("gradebook-grades-unenrolled");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let c = seed_course(&mut stdin, &mut reader, 2);

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.summary",
        json!({ "courseId": c.course_id, "studentId": "nobody" }),
    );
    assert_eq!(summary["enrolled"], json!(false));
    assert_eq!(summary["finalTotal"], json!(0));
    assert_eq!(summary["letterGrade"], json!("F"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn completion_reports_under_provisioned_course_and_missing_work() {
    let workspace = temp_dir("gradebook-grades-completion");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let course = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.create",
        json!({ "name": "Half Built" }),
    );
    let thin_course = course["courseId"].as_str().expect("courseId").to_string();
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "displayName": "Lee" }),
    );
    let lee = student["studentId"].as_str().expect("studentId").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "enrollments.create",
        json!({ "courseId": thin_course, "studentId": lee }),
    );
    let thin = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "grades.completion",
        json!({ "courseId": thin_course, "studentId": lee }),
    );
    assert_eq!(thin["isComplete"], json!(false));
    assert_eq!(thin["reason"], json!("course under-provisioned"));

    let c = seed_course(&mut stdin, &mut reader, 1);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attempts.submit",
        json!({ "quizId": c.quiz_ids[0], "studentId": c.student_id, "answers": [0] }),
    );
    let partial = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "grades.completion",
        json!({ "courseId": c.course_id, "studentId": c.student_id }),
    );
    assert_eq!(partial["isComplete"], json!(false));
    assert_eq!(partial["quizzesAttempted"], json!(1));
    assert_eq!(partial["assignmentsSubmitted"], json!(0));
    assert_eq!(
        partial["reason"],
        json!("1 of 3 quizzes attempted, 0 of 2 assignments submitted")
    );

    let missing = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "grades.completion",
        json!({ "courseId": "no-such-course", "studentId": c.student_id }),
    );
    assert_eq!(missing["reason"], json!("course not found"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn certificate_is_issued_only_after_completion() {
    let workspace = temp_dir("gradebook-certificate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let c = seed_course(&mut stdin, &mut reader, 1);

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "2",
        "certificates.issue",
        json!({ "courseId": c.course_id, "studentId": c.student_id }),
    );
    assert_eq!(code, "not_complete");

    for (i, assignment_id) in c.assignment_ids.iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("sub-{}", i),
            "submissions.submit",
            json!({ "assignmentId": assignment_id, "studentId": c.student_id }),
        );
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "grade-0",
        "submissions.grade",
        json!({ "assignmentId": c.assignment_ids[0], "studentId": c.student_id, "score": 50 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "grade-1",
        "submissions.grade",
        json!({ "assignmentId": c.assignment_ids[1], "studentId": c.student_id, "score": 100 }),
    );
    for (i, quiz_id) in c.quiz_ids.iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("attempt-{}", i),
            "attempts.submit",
            json!({ "quizId": quiz_id, "studentId": c.student_id, "answers": [0] }),
        );
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "certificate", "patch": { "issuerName": "Dept. of Computing" } }),
    );

    let issued = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "certificates.issue",
        json!({
            "courseId": c.course_id,
            "studentId": c.student_id,
            "completionDate": "2026-03-05"
        }),
    );
    let cert = &issued["certificate"];
    assert_eq!(cert["grade"], json!("A+"));
    assert_eq!(cert["studentName"], json!("Dana Reyes"));
    assert_eq!(cert["courseName"], json!("Systems Programming"));
    assert_eq!(cert["issuerName"], json!("Dept. of Computing"));
    assert_eq!(cert["completionDate"], json!("2026-03-05"));
    assert_eq!(cert["displayDate"], json!("March 5, 2026"));
    assert_eq!(cert["verificationCode"].as_str().map(str::len), Some(16));
    assert!(cert["text"]
        .as_str()
        .expect("text")
        .contains("Dana Reyes"));
    assert_eq!(issued["percentage"], json!(100.0));

    let bad_date = request_err_code(
        &mut stdin,
        &mut reader,
        "5",
        "certificates.issue",
        json!({
            "courseId": c.course_id,
            "studentId": c.student_id,
            "completionDate": "05/03/2026"
        }),
    );
    assert_eq!(bad_date, "bad_params");

    let _ = std::fs::remove_dir_all(workspace);
}
