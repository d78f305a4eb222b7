use std::process::Command;

#[test]
fn missing_config_file_is_reported_on_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let output = Command::new(env!("CARGO_BIN_EXE_stillshot"))
        .arg(&missing)
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"), "stderr: {stderr}");
    assert!(stderr.contains("absent.toml"), "stderr: {stderr}");
}

#[test]
fn invalid_config_is_reported_on_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[capture]\njpeg_quality = 0\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_stillshot"))
        .arg(&path)
        .current_dir(dir.path())
        .env_remove("STILLSHOT_JPEG_QUALITY")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("JPEG quality must be between 1 and 31"), "stderr: {stderr}");
}
