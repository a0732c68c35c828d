mod test_support;

use serde_json::json;
use test_support::{
    create_student, delete_student_externally, error_code, request_err, request_ok,
    select_workspace, spawn_sidecar, temp_dir,
};

fn names(list: &serde_json::Value) -> Vec<String> {
    list["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| s["fullName"].as_str().unwrap_or("").to_string())
        .collect()
}

#[test]
fn students_crud_keeps_cache_sorted_and_persisted() {
    let workspace = temp_dir("attendd-students-crud");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, &workspace);

    let hana = create_student(
        &mut stdin,
        &mut reader,
        "1",
        json!({ "fullName": "  Hana  ", "classId": "C2", "rollNumber": 2, "phone": " " }),
    );
    let _abel = create_student(
        &mut stdin,
        &mut reader,
        "2",
        json!({ "fullName": "Abel", "classId": "C2", "rollNumber": 1, "age": 8 }),
    );
    let _zed = create_student(
        &mut stdin,
        &mut reader,
        "3",
        json!({ "fullName": "Zed", "classId": "C1" }),
    );

    let all = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(names(&all), vec!["Zed", "Abel", "Hana"]);
    assert!(all["students"][2]["phone"].is_null());

    let c2 = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({ "classId": "C2" }));
    assert_eq!(names(&c2), vec!["Abel", "Hana"]);

    let classes = request_ok(&mut stdin, &mut reader, "6", "classes.list", json!({}));
    let c2_count = classes["classes"]
        .as_array()
        .expect("classes")
        .iter()
        .find(|c| c["id"] == json!("C2"))
        .and_then(|c| c["studentCount"].as_u64());
    assert_eq!(c2_count, Some(2));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.update",
        json!({ "studentId": hana, "classId": "C3", "age": 11 }),
    );
    assert_eq!(updated["student"]["classId"], json!("C3"));
    assert_eq!(updated["student"]["fullName"], json!("Hana"));
    assert_eq!(updated["student"]["rollNumber"], json!(2));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "students.delete",
        json!({ "studentId": hana }),
    );
    drop(stdin);
    let _ = child.wait();

    // A fresh process sees what the first one wrote.
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let selected = select_workspace(&mut stdin, &mut reader, &workspace);
    assert_eq!(selected["students"], json!(2));
    let all = request_ok(&mut stdin, &mut reader, "9", "students.list", json!({}));
    assert_eq!(names(&all), vec!["Zed", "Abel"]);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn invalid_student_params_are_rejected() {
    let workspace = temp_dir("attendd-students-invalid");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, &workspace);

    let e = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({ "fullName": "   ", "classId": "C1" }),
    );
    assert_eq!(error_code(&e), "bad_params");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "fullName": "Abel", "classId": "C9" }),
    );
    assert_eq!(error_code(&e), "bad_params");

    // Age outside 0..=120 is refused by the store.
    let e = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "fullName": "Abel", "classId": "C1", "age": 400 }),
    );
    assert_eq!(error_code(&e), "write_failed");
    let all = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(all["students"].as_array().map(|a| a.len()), Some(0));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "students.update",
        json!({ "studentId": "missing", "fullName": "X" }),
    );
    assert_eq!(error_code(&e), "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn rejected_update_resyncs_roster_from_store() {
    let workspace = temp_dir("attendd-students-reconcile");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, &workspace);

    let abel = create_student(
        &mut stdin,
        &mut reader,
        "1",
        json!({ "fullName": "Abel", "classId": "C1" }),
    );
    let _hana = create_student(
        &mut stdin,
        &mut reader,
        "2",
        json!({ "fullName": "Hana", "classId": "C1" }),
    );
    delete_student_externally(&workspace, &abel);

    let e = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "students.update",
        json!({ "studentId": abel, "fullName": "Abel Tesfaye" }),
    );
    assert_eq!(error_code(&e), "write_failed");
    assert_eq!(e["details"]["reconciled"], json!(true));

    let all = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(names(&all), vec!["Hana"]);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn rejected_delete_resyncs_roster_and_attendance() {
    let workspace = temp_dir("attendd-students-delete-reconcile");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, &workspace);

    let abel = create_student(
        &mut stdin,
        &mut reader,
        "1",
        json!({ "fullName": "Abel", "classId": "C1" }),
    );
    let hana = create_student(
        &mut stdin,
        &mut reader,
        "2",
        json!({ "fullName": "Hana", "classId": "C1" }),
    );
    for (i, id) in [&abel, &hana].into_iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("m{}", i),
            "attendance.mark",
            json!({ "studentId": id, "date": "2024-01-07", "status": "P" }),
        );
    }
    delete_student_externally(&workspace, &abel);

    let e = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "students.delete",
        json!({ "studentId": abel }),
    );
    assert_eq!(error_code(&e), "write_failed");
    assert_eq!(e["details"]["reconciled"], json!(true));

    let all = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(names(&all), vec!["Hana"]);
    let got = request_ok(&mut stdin, &mut reader, "5", "attendance.get", json!({}));
    let entries = got["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["studentId"], json!(hana));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
