use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docmill_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docmill");
    path
}

fn setup_test_env(strategy: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("contrato.txt"),
        "Contrato de prestação de serviços.\n\nAs partes acordam o objeto descrito neste instrumento.",
    )
    .unwrap();
    fs::write(
        files_dir.join("parecer.txt"),
        "Parecer jurídico sobre o caso.\n\nAnalisados os autos, opina-se pelo deferimento do pedido.",
    )
    .unwrap();
    fs::write(
        files_dir.join("ata.txt"),
        "Ata de reunião ordinária.\n\nPresentes os membros do conselho, deliberou-se o que segue.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/docmill.sqlite"

[scanner]
root = "{root}/files"
file_types = ["txt", "docx"]

[chunking]
chunk_size = 500
overlap = 100
strategy = "{strategy}"
"#,
        root = root.display(),
        strategy = strategy
    );

    let config_path = config_dir.join("docmill.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docmill(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docmill_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docmill binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env("sliding");

    let (stdout, stderr, success) = run_docmill(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env("sliding");

    let (_, _, success1) = run_docmill(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_docmill(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_sync_ingests_new_files() {
    let (_tmp, config_path) = setup_test_env("sliding");

    run_docmill(&config_path, &["init"]);
    let (stdout, stderr, success) = run_docmill(&config_path, &["sync"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files found: 3"));
    assert!(stdout.contains("new: 3"));
    assert!(stdout.contains("failed: 0"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_resync_skips_unchanged_files() {
    let (_tmp, config_path) = setup_test_env("sliding");

    run_docmill(&config_path, &["init"]);
    let (stdout, _, success) = run_docmill(&config_path, &["sync"]);
    assert!(success);
    assert!(stdout.contains("new: 3"));

    let (stdout, stderr, success) = run_docmill(&config_path, &["sync"]);
    assert!(success, "re-sync failed: stderr={}", stderr);
    assert!(stdout.contains("unchanged: 3"));
    assert!(stdout.contains("new: 0"));
    assert!(stdout.contains("updated: 0"));
    // No chunk rows are rewritten for unchanged files.
    assert!(stdout.contains("chunks created: 0"));
}

#[test]
fn test_modified_file_is_updated() {
    let (tmp, config_path) = setup_test_env("sliding");

    run_docmill(&config_path, &["init"]);
    run_docmill(&config_path, &["sync"]);

    fs::write(
        tmp.path().join("files/contrato.txt"),
        "Contrato aditado.\n\nNova redação da cláusula primeira, conforme acordado.",
    )
    .unwrap();

    let (stdout, stderr, success) = run_docmill(&config_path, &["sync"]);
    assert!(success, "sync failed: stderr={}", stderr);
    assert!(stdout.contains("updated: 1"));
    assert!(stdout.contains("unchanged: 2"));
    assert!(stdout.contains("new: 0"));
}

#[test]
fn test_full_flag_reprocesses_everything() {
    let (_tmp, config_path) = setup_test_env("sliding");

    run_docmill(&config_path, &["init"]);
    run_docmill(&config_path, &["sync"]);

    let (stdout, _, success) = run_docmill(&config_path, &["sync", "--full"]);
    assert!(success);
    assert!(stdout.contains("updated: 3"));
    assert!(stdout.contains("unchanged: 0"));
}

#[test]
fn test_empty_file_counts_as_failed() {
    let (tmp, config_path) = setup_test_env("sliding");
    fs::write(tmp.path().join("files/vazio.txt"), "   \n\n  ").unwrap();

    run_docmill(&config_path, &["init"]);
    let (stdout, _, success) = run_docmill(&config_path, &["sync"]);
    // The run continues past the failed file.
    assert!(success);
    assert!(stdout.contains("failed: 1"));
    assert!(stdout.contains("new: 3"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env("sliding");

    run_docmill(&config_path, &["init"]);
    let (stdout, _, success) = run_docmill(&config_path, &["sync", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("would ingest: 3 new, 0 updated"));

    // A real sync afterwards still sees all three as new.
    let (stdout, _, _) = run_docmill(&config_path, &["sync"]);
    assert!(stdout.contains("new: 3"));
    drop(tmp);
}

#[test]
fn test_chapter_strategy_detects_structure() {
    let (tmp, config_path) = setup_test_env("chapter");
    fs::write(
        tmp.path().join("files/estatuto.txt"),
        "CAPÍTULO I\nDo objeto e das definições aplicáveis a este estatuto social.\n\nCAPÍTULO II\nDa administração e da representação da sociedade.",
    )
    .unwrap();

    run_docmill(&config_path, &["init"]);
    let (stdout, stderr, success) = run_docmill(&config_path, &["sync"]);
    assert!(success, "sync failed: stderr={}", stderr);
    // Two CAPÍTULO divisions in estatuto.txt; the other three files carry
    // no structure and fall back to one synthetic chapter each.
    assert!(stdout.contains("chapters detected: 2"));
    assert!(stdout.contains("new: 4"));
    assert!(stdout.contains("failed: 0"));
}

#[test]
fn test_docx_ingests() {
    let (tmp, config_path) = setup_test_env("sliding");
    fs::write(
        tmp.path().join("files/procuracao.docx"),
        minimal_docx(&["PROCURAÇÃO", "Pelo presente instrumento particular de mandato."]),
    )
    .unwrap();

    run_docmill(&config_path, &["init"]);
    let (stdout, stderr, success) = run_docmill(&config_path, &["sync"]);
    assert!(success, "sync failed: stderr={}", stderr);
    assert!(stdout.contains("new: 4"));
    assert!(stdout.contains("failed: 0"));
}

#[test]
fn test_stats_reports_totals() {
    let (_tmp, config_path) = setup_test_env("sliding");

    run_docmill(&config_path, &["init"]);
    run_docmill(&config_path, &["sync"]);

    let (stdout, stderr, success) = run_docmill(&config_path, &["stats"]);
    assert!(success, "stats failed: stderr={}", stderr);
    assert!(stdout.contains("Documents:   3"));
    assert!(stdout.contains("Chunks:"));
    assert!(stdout.contains("txt"));
}
