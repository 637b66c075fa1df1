use assert_cmd::prelude::*; // Add methods on commands
use std::fs;
use std::process::Command; // Run programs
use tempfile::{Builder, TempDir};

use crate::fixtures::*;

mod convert;
mod validate;

const TEST_CONFIG_FILE: &str = "killrvideo-test.toml";

fn setup_temp_config_and_data_dir() -> std::io::Result<TempDir> {
    let temp_dir = Builder::new()
        .prefix("killrvideo-test-dir")
        .rand_bytes(5)
        .tempdir()?;

    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir)?;

    let config_str = format!(
        r#"
[data]
dir = "{}"
output_dir = "{}"

[validation]
max_examples = 5
"#,
        data_dir.display().to_string().escape_default(),
        temp_dir
            .path()
            .join("dsbulk")
            .display()
            .to_string()
            .escape_default(),
    );
    fs::write(temp_dir.path().join(TEST_CONFIG_FILE), config_str)?;

    Ok(temp_dir)
}

fn killrvideo_bulk(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("killrvideo-bulk").expect("killrvideo-bulk bin exists");
    cmd.arg("-c")
        .arg(temp_dir.path().join(TEST_CONFIG_FILE))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_schema_single_table() {
    let temp_dir = setup_temp_config_and_data_dir().unwrap();
    let output = killrvideo_bulk(&temp_dir)
        .args(["schema", "user_preferences"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "user_preferences\n\
         \x20 userid: uuid\n\
         \x20 preference_vector: vector<float,384>\n\
         \x20 tag_preferences: map<text,float>\n\
         \x20 category_preferences: map<text,float>\n\
         \x20 last_updated: timestamp\n"
    );
}

#[test]
fn test_schema_unknown_table() {
    let temp_dir = setup_temp_config_and_data_dir().unwrap();
    let output = killrvideo_bulk(&temp_dir)
        .args(["schema", "playlists"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)
        .unwrap()
        .contains("No schema defined for table \"playlists\""));
}

#[test]
fn test_decode_prints_json_lines() {
    let temp_dir = setup_temp_config_and_data_dir().unwrap();
    write_consistent_tables(&temp_dir.path().join("data"));

    let output = killrvideo_bulk(&temp_dir)
        .args(["decode", "videos"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let rows: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        serde_json::json!({
            "videoid": VIDEO_1,
            "added_date": "2024-03-01T00:00:00.000Z",
            "name": "Intro to CQL",
            "tags": ["cql", "intro"],
            "userid": USER_1,
        })
    );
    assert_eq!(rows[1]["tags"], serde_json::json!([]));
}

#[test]
fn test_decode_infer_from_other_file() {
    let temp_dir = setup_temp_config_and_data_dir().unwrap();
    let file = temp_dir.path().join("stats.csv");
    fs::write(
        &file,
        format!("\"videoid\",\"views\",\"score\",\"note\"\n\"{VIDEO_2}\",\"12\",\"4.5\",\"null\"\n"),
    )
    .unwrap();

    let output = killrvideo_bulk(&temp_dir)
        .args(["decode", "video_playback_stats", "--infer", "--file"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());

    let row: serde_json::Value =
        serde_json::from_str(String::from_utf8(output.stdout).unwrap().trim()).unwrap();
    assert_eq!(
        row,
        serde_json::json!({"videoid": VIDEO_2, "views": 12, "score": 4.5, "note": null})
    );
}
