//! End-to-end tests for the `bharat` binary.
//!
//! Each test gets its own temp directory holding the config, the SQLite
//! database and any input files. Embeddings are disabled so nothing is
//! downloaded; PDF extraction uses only the in-process strategies.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn bharat_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_bharat"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("notes.txt"),
        "The Kaveri flows through Karnataka and Tamil Nadu.",
    )
    .unwrap();
    fs::write(files_dir.join("broken.pdf"), b"definitely not a pdf").unwrap();
    fs::write(files_dir.join("phrase.pdf"), minimal_pdf_with_phrase()).unwrap();
    fs::write(
        files_dir.join("letter.docx"),
        minimal_docx_with_text("office test phrase"),
    )
    .unwrap();
    fs::write(
        files_dir.join("crops.csv"),
        "crop,state\nragi,Karnataka\njute,\"West Bengal\"\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/bharat.sqlite"

[extraction]
pdf_order = ["pdf-extract", "lopdf"]

[embedding]
provider = "disabled"

[server]
bind = "127.0.0.1:0"
"#,
        root.display()
    );
    let config_path = root.join("bharat.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_bharat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = bharat_binary();
    let workdir = config_path.parent().unwrap();
    let output = Command::new(&binary)
        .current_dir(workdir)
        .env_remove("GROQ_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run bharat binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Minimal valid PDF whose single page shows "spec test phrase".
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 44 >> stream\nBT /F1 12 Tf 100 700 Td (spec test phrase) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn minimal_docx_with_text(phrase: &str) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            phrase
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_bharat(&config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized"));
    assert!(tmp.path().join("data").join("bharat.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    assert!(run_bharat(&config, &["init"]).2);
    let (_, stderr, success) = run_bharat(&config, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_bharat(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_capabilities_lists_chains() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_bharat(&config, &["capabilities"]);
    assert!(success, "capabilities failed: {}", stderr);
    assert!(stdout.contains("pdf-extract -> lopdf"));
    assert!(stdout.contains("tesseract"));
}

#[test]
fn test_extract_plain_text() {
    let (tmp, config) = setup_test_env();
    let file = tmp.path().join("files").join("notes.txt");
    let (stdout, stderr, success) = run_bharat(&config, &["extract", file.to_str().unwrap()]);
    assert!(success, "extract failed: {}", stderr);
    assert!(stdout.contains("The Kaveri flows through Karnataka"));
}

#[test]
fn test_extract_office_and_csv() {
    let (tmp, config) = setup_test_env();
    let docx = tmp.path().join("files").join("letter.docx");
    let (stdout, _, success) = run_bharat(&config, &["extract", docx.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("office test phrase"));

    let csv = tmp.path().join("files").join("crops.csv");
    let (stdout, _, success) = run_bharat(&config, &["extract", csv.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("jute | West Bengal"));
}

#[test]
fn test_extract_pdf() {
    let (tmp, config) = setup_test_env();
    let pdf = tmp.path().join("files").join("phrase.pdf");
    let (stdout, stderr, success) = run_bharat(&config, &["extract", pdf.to_str().unwrap()]);
    assert!(success, "extract failed: {}", stderr);
    assert!(stdout.contains("test phrase"), "unexpected output: {}", stdout);
}

#[test]
fn test_extract_failure_prints_sentinel() {
    let (tmp, config) = setup_test_env();
    let pdf = tmp.path().join("files").join("broken.pdf");
    let (stdout, _, success) = run_bharat(&config, &["extract", pdf.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("Failed to extract text"));
}

#[test]
fn test_extract_type_override() {
    let (tmp, config) = setup_test_env();
    let file = tmp.path().join("files").join("notes.txt");
    let (stdout, _, success) = run_bharat(
        &config,
        &["extract", file.to_str().unwrap(), "--type", "pdf"],
    );
    assert!(success);
    assert!(stdout.contains("Failed to extract text"));
}

#[test]
fn test_extract_store_then_ask_without_key() {
    let (tmp, config) = setup_test_env();
    let file = tmp.path().join("files").join("notes.txt");
    let (stdout, stderr, success) =
        run_bharat(&config, &["extract", file.to_str().unwrap(), "--store"]);
    assert!(success, "extract --store failed: {}", stderr);
    let content_id = stdout
        .lines()
        .find_map(|l| l.strip_prefix("content_id: "))
        .expect("content id printed")
        .trim()
        .to_string();

    let (_, stderr, success) = run_bharat(&config, &["ask", &content_id, "Which river?"]);
    assert!(!success);
    assert!(stderr.contains("GROQ_API_KEY"));
}

#[test]
fn test_index_errors_when_embeddings_disabled() {
    let (tmp, config) = setup_test_env();
    let file = tmp.path().join("files").join("notes.txt");
    let (_, stderr, success) = run_bharat(
        &config,
        &["index", "kaveri", "--file", file.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("embeddings unavailable"));
}

#[test]
fn test_search_unavailable_when_disabled() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_bharat(&config, &["search", "river"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("Search unavailable"));
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_bharat(&config, &["search", "  "]);
    assert!(!success);
    assert!(stderr.contains("query must not be empty"));
}

#[test]
fn test_delete_unknown_document() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_bharat(&config, &["delete", "ghost"]);
    assert!(success);
    assert!(stdout.contains("deleted 0 chunks for ghost"));
}

#[test]
fn test_chat_without_key_apologizes() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_bharat(&config, &["chat", "namaste", "--language", "hi"]);
    assert!(success);
    assert!(stdout.contains("Sorry, something went wrong."));
}

#[test]
fn test_fields_from_stored_text() {
    let (tmp, config) = setup_test_env();
    let form = tmp.path().join("files").join("form.txt");
    fs::write(&form, "Applicant Name: Ravi Verma\nState: Bihar\n").unwrap();
    let (stdout, stderr, success) =
        run_bharat(&config, &["extract", form.to_str().unwrap(), "--store"]);
    assert!(success, "extract --store failed: {}", stderr);
    let content_id = stdout
        .lines()
        .find_map(|l| l.strip_prefix("content_id: "))
        .expect("content id printed")
        .trim()
        .to_string();

    let (stdout, stderr, success) = run_bharat(
        &config,
        &[
            "fields",
            &content_id,
            "--field",
            "name=Applicant Name",
            "--field",
            "State",
            "--field",
            "pin=PIN",
        ],
    );
    assert!(success, "fields failed: {}", stderr);
    assert!(stdout.contains("name: Ravi Verma"));
    assert!(stdout.contains("State: Bihar"));
    assert!(stdout.contains("pin: (not found)"));
}
