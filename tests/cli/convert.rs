use crate::cli::*;

#[test]
fn test_convert_then_validate() {
    let temp_dir = setup_temp_config_and_data_dir().unwrap();
    let legacy_dir = temp_dir.path().join("legacy");
    let output_dir = temp_dir.path().join("converted");
    fs::create_dir_all(&legacy_dir).unwrap();

    write_table(
        &legacy_dir,
        "users",
        &["userid,email", &format!("{USER_1},ada@example.com")],
    );
    write_table(
        &legacy_dir,
        "videos",
        &[
            "videoid,name,tags,userid",
            &format!(r#"{VIDEO_1},"Intro, part ""one""","{{""cql"",""intro""}}",{USER_1}"#),
        ],
    );

    let output = killrvideo_bulk(&temp_dir)
        .arg("convert")
        .arg(&legacy_dir)
        .arg(&output_dir)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("users: 1 rows"), "{stdout}");
    assert!(stdout.contains("videos: 1 rows"), "{stdout}");

    let videos = fs::read_to_string(output_dir.join("videos.csv")).unwrap();
    assert_eq!(
        videos,
        format!(
            "\"videoid\",\"name\",\"tags\",\"userid\"\n\
             \"{VIDEO_1}\",\"Intro, part \\\"one\\\"\",\"[\\\"cql\\\",\\\"intro\\\"]\",\"{USER_1}\"\n"
        )
    );

    // The converted files are readable with the default dialect
    killrvideo_bulk(&temp_dir)
        .arg("validate")
        .arg(&output_dir)
        .assert()
        .success();
}
