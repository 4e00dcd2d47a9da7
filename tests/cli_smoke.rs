use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const BUNDLE: &str = r#"{
  "courses": [
    {"id": "CS101", "name": "Programming Methodology"}
  ],
  "students": [
    {"id": "s1", "name": "Bob", "email": "bob@x.com", "course_id": "CS101", "team": "Team X", "section": "Sec 2", "registered": true},
    {"id": "s2", "name": "Ann", "email": "ann@x.com", "course_id": "CS101", "team": "Team Y", "section": "Sec 1", "registered": false},
    {"id": "s3", "name": "Dan", "email": "dan@x.com", "course_id": "MA201", "team": "Team A", "section": "Sec 1", "registered": true}
  ],
  "instructors": [
    {"course_id": "CS101", "email": "ins@x.com", "can_view_student_in_sections": true},
    {"course_id": "MA201", "email": "ta@x.com", "can_view_student_in_sections": false}
  ]
}"#;

fn import_and_index(data_dir: &Path) {
    let file = data_dir.join("bundle.json");
    fs::write(&file, BUNDLE).unwrap();
    cargo_bin_cmd!("stusearch")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("import")
        .arg(&file)
        .assert()
        .success();
    cargo_bin_cmd!("stusearch")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("index")
        .assert()
        .success()
        .stdout(predicate::str::contains("indexed 3 students"));
}

#[test]
fn search_lists_sorted_students() {
    let tmp = TempDir::new().unwrap();
    import_and_index(tmp.path());
    let out = cargo_bin_cmd!("stusearch")
        .arg("--data-dir")
        .arg(tmp.path())
        .args(["search", ""])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let names: Vec<&str> = stdout
        .lines()
        .filter_map(|l| l.split('\t').nth(3))
        .collect();
    assert_eq!(names, ["Ann", "Bob", "Dan"]);
}

#[test]
fn instructor_visibility_applies() {
    let tmp = TempDir::new().unwrap();
    import_and_index(tmp.path());
    cargo_bin_cmd!("stusearch")
        .arg("--data-dir")
        .arg(tmp.path())
        .args(["search", "", "--instructor", "ins@x.com", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ann@x.com").and(predicate::str::contains("dan@x.com").not()));

    cargo_bin_cmd!("stusearch")
        .arg("--data-dir")
        .arg(tmp.path())
        .args(["search", "", "--instructor", "ta@x.com", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn reset_is_refused_by_default() {
    let tmp = TempDir::new().unwrap();
    cargo_bin_cmd!("stusearch")
        .arg("--data-dir")
        .arg(tmp.path())
        .env_remove("STUSEARCH_ALLOW_RESET")
        .arg("reset")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not allowed"));
}
