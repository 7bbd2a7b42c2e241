mod common;

use std::fs;
use std::process::Command;
use tempfile::tempdir;
use zipstream::{assemble_archive_to_string, ArchiveOptions, Entry};

// Decodes the base64 output to a file and runs `unzip -t` on it.
// If `unzip` is not present on the system, the test is skipped.

#[test]
fn unzip_compatibility() {
    let check = Command::new("unzip").arg("-v").output();
    if check.is_err() {
        eprintln!("skipping test: `unzip` not found");
        return;
    }

    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("hello.txt"), b"hello from test").unwrap();
    // stored because of the extension
    fs::write(src.join("pixel.png"), vec![0x89u8; 4096]).unwrap();
    // a moderate amount of data to ensure a non-trivial archive
    fs::write(src.join("big.bin"), vec![0u8; 1024 * 1024]).unwrap();

    let entries = vec![
        Entry::new("hello.txt", "hello.txt"),
        Entry::new("img/pixel.png", "pixel.png"),
        Entry::new("big.bin", "big.bin"),
    ];
    let options = ArchiveOptions::default().with_base_dir(&src);
    let text = assemble_archive_to_string(&entries, &options).unwrap();

    let zip_path = dir.path().join("compat.zip");
    fs::write(&zip_path, common::decode_base64(text.as_bytes())).unwrap();

    let output = Command::new("unzip")
        .arg("-t")
        .arg(&zip_path)
        .output()
        .expect("failed to run unzip");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        output.status.success(),
        "unzip reported failure: {} {}",
        stdout,
        stderr
    );
}
