use crate::cli::*;

#[test]
fn test_validate_consistent_data() {
    let temp_dir = setup_temp_config_and_data_dir().unwrap();
    write_consistent_tables(&temp_dir.path().join("data"));

    let output = killrvideo_bulk(&temp_dir).arg("validate").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("VALIDATION SUCCESSFUL"), "{stdout}");
    assert!(stdout.contains("  comments: 1 rows checked, 0 error(s)\n"), "{stdout}");
    assert!(stdout.contains("  videos: 2 rows checked, 0 error(s)\n"), "{stdout}");
}

#[test]
fn test_validate_ragged_row_fails() {
    let temp_dir = setup_temp_config_and_data_dir().unwrap();
    let data_dir = temp_dir.path().join("data");
    write_consistent_tables(&data_dir);
    // Extra trailing field next to a broken user reference
    write_table(
        &data_dir,
        "comments",
        &[
            r#""videoid","commentid","comment","userid""#,
            &format!(r#""{VIDEO_1}","","fine","{USER_1}""#),
            &format!(r#""{VIDEO_1}","","ragged","U9","extra""#),
        ],
    );

    let output = killrvideo_bulk(&temp_dir).arg("validate").output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("VALIDATION FAILED"), "{stdout}");
    assert!(
        stdout.contains("  comments: 2 rows checked, 1 error(s), 1 malformed row(s)"),
        "{stdout}"
    );
    assert!(stdout.contains("Row 1: userid U9 not in users.userid"), "{stdout}");
}

#[test]
fn test_validate_reports_broken_references() {
    let temp_dir = setup_temp_config_and_data_dir().unwrap();
    let data_dir = temp_dir.path().join("data");
    write_consistent_tables(&data_dir);
    // Unknown video and unknown user in the same row
    write_table(
        &data_dir,
        "comments",
        &[
            r#""videoid","commentid","comment","userid""#,
            r#""V1","","Who uploaded this?","U2""#,
        ],
    );

    let output = killrvideo_bulk(&temp_dir).arg("validate").output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("VALIDATION FAILED"), "{stdout}");
    assert!(stdout.contains("Found 2 error(s) in 1 table(s)"), "{stdout}");
    assert!(stdout.contains("Row 0: videoid V1 not in videos.videoid"));
    assert!(stdout.contains("Row 0: userid U2 not in users.userid"));
}

#[test]
fn test_validate_example_limit_from_env() {
    let temp_dir = setup_temp_config_and_data_dir().unwrap();
    let data_dir = temp_dir.path().join("data");
    write_consistent_tables(&data_dir);
    write_table(
        &data_dir,
        "comments",
        &[
            r#""videoid","commentid","comment","userid""#,
            &format!(r#""V1","","one","{USER_1}""#),
            &format!(r#""V2","","two","{USER_1}""#),
            &format!(r#""V3","","three","{USER_1}""#),
        ],
    );

    let output = killrvideo_bulk(&temp_dir)
        .arg("validate")
        .env("KILLRVIDEO__VALIDATION__MAX_EXAMPLES", "1")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Row 0: videoid V1"), "{stdout}");
    assert!(!stdout.contains("Row 1:"), "{stdout}");
    assert!(stdout.contains("... and 2 more errors"), "{stdout}");
}

#[test]
fn test_validate_missing_referenced_table() {
    let temp_dir = setup_temp_config_and_data_dir().unwrap();
    let data_dir = temp_dir.path().join("data");
    write_table(&data_dir, "comments", &[r#""videoid","userid""#]);

    let output = killrvideo_bulk(&temp_dir)
        .arg("validate")
        .arg(&data_dir)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("users.csv"), "{stderr}");
}
