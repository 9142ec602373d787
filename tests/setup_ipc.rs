mod test_support;

use serde_json::json;
use test_support::{request_err_code, request_ok, spawn_sidecar, temp_dir};

#[test]
fn setup_defaults_updates_and_validation() {
    let workspace = temp_dir("gradebook-setup");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let no_ws = request_err_code(&mut stdin, &mut reader, "0", "setup.get", json!({}));
    assert_eq!(no_ws, "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let defaults = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(defaults["certificate"]["title"], json!("Certificate of Completion"));
    assert_eq!(defaults["certificate"]["issuerName"], json!("Course Team"));
    assert_eq!(defaults["gradebook"]["defaultAssignmentMaxScore"], json!(100));
    assert_eq!(defaults["gradebook"]["defaultQuizPassingScore"], json!(60));
    assert_eq!(defaults["gradebook"]["defaultQuizTimeLimitSeconds"], json!(600));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "gradebook", "patch": { "defaultAssignmentMaxScore": 20 } }),
    );
    for (i, patch) in [
        json!({ "section": "gradebook", "patch": { "defaultQuizPassingScore": 101 } }),
        json!({ "section": "gradebook", "patch": { "defaultQuizTimeLimitSeconds": 10 } }),
        json!({ "section": "certificate", "patch": { "title": "" } }),
        json!({ "section": "certificate", "patch": { "unknown": "x" } }),
        json!({ "section": "printer", "patch": {} }),
    ]
    .into_iter()
    .enumerate()
    {
        let code = request_err_code(
            &mut stdin,
            &mut reader,
            &format!("bad-{}", i),
            "setup.update",
            patch,
        );
        assert_eq!(code, "bad_params");
    }

    let after = request_ok(&mut stdin, &mut reader, "4", "setup.get", json!({}));
    assert_eq!(after["gradebook"]["defaultAssignmentMaxScore"], json!(20));
    assert_eq!(after["gradebook"]["defaultQuizPassingScore"], json!(60));

    // New assignments pick up the configured default.
    let course = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "courses.create",
        json!({ "name": "Defaults" }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "assignments.create",
        json!({ "courseId": course["courseId"], "title": "Lab" }),
    );
    assert_eq!(created["maxScore"], json!(20));

    let _ = std::fs::remove_dir_all(workspace);
}
