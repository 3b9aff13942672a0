//! Integration tests for the parkbook CLI binary.
//!
//! These execute the compiled binary directly using `assert_cmd` and treat it
//! as a black box: script files are written as raw JSON the way a user would
//! write them, and assertions look only at exit codes, output, and the files
//! left on disk.

use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn parkbook_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("parkbook"));
    cmd.current_dir(dir.path());
    cmd
}

fn scene(prefix: &str) -> String {
    format!(
        "{prefix} painted in warm daylight colors with one large friendly shape in the \
         center, a wide open sky behind it, soft rounded hills at the bottom, and a few \
         small animals tucked into the corners"
    )
}

fn text_reply(payload: Value) -> Value {
    json!({"kind": "text", "text": payload.to_string()})
}

fn concept(page: u32, chapter: u32) -> Value {
    json!({
        "page_number": page,
        "chapter_number": chapter,
        "subject": format!("Subject {page}"),
        "core_idea": format!("Idea {page}"),
    })
}

fn page(n: u32) -> Value {
    text_reply(json!({
        "page_number": n,
        "text": format!("Look at page {n} glow"),
        "illustration_description": scene(&format!("Subject {n}")),
    }))
}

fn chapters_reply(counts: &[u32]) -> Value {
    let chapters: Vec<Value> = counts
        .iter()
        .enumerate()
        .map(|(i, pages)| {
            json!({
                "chapter_number": i + 1,
                "theme": format!("Theme {}", i + 1),
                "key_elements": ["element"],
                "page_count": pages,
            })
        })
        .collect();
    text_reply(json!({"chapters": chapters}))
}

fn happy_script(topic: &str) -> Vec<Value> {
    let mut replies = vec![
        text_reply(json!({
            "narrative_flow": "From sunrise mist to a sky full of stars",
            "key_themes": ["water", "wildlife"],
        })),
        chapters_reply(&[4, 6]),
        text_reply(json!({"concepts": (1..=4).map(|n| concept(n, 1)).collect::<Vec<_>>()})),
        text_reply(json!({"concepts": (5..=10).map(|n| concept(n, 2)).collect::<Vec<_>>()})),
        text_reply(json!({
            "front_cover": {
                "page_number": 0,
                "text": format!("{topic} National Park"),
                "illustration_description": scene("A bear cub on a sunny trail"),
            },
            "back_cover": {
                "page_number": 11,
                "text": "Come explore with us",
                "illustration_description": scene("The same cub asleep under stars"),
            },
        })),
    ];
    replies.extend((1..=10).map(page));
    replies
}

fn write_script(dir: &TempDir, replies: &[Value]) -> String {
    let path = dir.path().join("script.json");
    std::fs::write(&path, serde_json::to_string(&replies).unwrap()).unwrap();
    path.to_str().unwrap().to_string()
}

fn write_research(dir: &TempDir) -> String {
    let path = dir.path().join("research.txt");
    std::fs::write(&path, "Geysers steam at dawn. Bison wander wide valleys.").unwrap();
    path.to_str().unwrap().to_string()
}

/// Config discovered from the working directory; millisecond retry delays
/// keep exhaustion tests fast.
fn write_fast_retry_config(dir: &TempDir) {
    std::fs::write(
        dir.path().join("parkbook.toml"),
        "[llm]\nretry_base_delay_ms = 1\nretry_max_delay_ms = 4\n",
    )
    .unwrap();
}

fn out_dir(dir: &TempDir) -> PathBuf {
    dir.path().join("books")
}

/// Runs a full scripted generation into `dir` and returns the document path.
fn generate_yellowstone(dir: &TempDir) -> PathBuf {
    let script = write_script(dir, &happy_script("Yellowstone"));
    let research = write_research(dir);
    let out = out_dir(dir);

    parkbook_cmd(dir)
        .args([
            "generate",
            "Yellowstone",
            "--backend",
            "scripted",
            "--script",
            &script,
            "--research-file",
            &research,
            "--out-dir",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Generated \"Yellowstone\""));

    out.join("yellowstone").join("content").join("book.json")
}

#[test]
fn generate_writes_book_and_receipt() {
    let dir = TempDir::new().unwrap();
    let book = generate_yellowstone(&dir);

    assert!(book.exists());
    assert!(
        out_dir(&dir)
            .join("yellowstone")
            .join("receipts")
            .join("latest.json")
            .exists()
    );

    let value: Value =
        serde_json::from_str(&std::fs::read_to_string(&book).unwrap()).unwrap();
    assert_eq!(value["park_name"], "Yellowstone");
    assert_eq!(value["front_cover"]["text"], "Yellowstone National Park");
    assert_eq!(value["pages"].as_array().unwrap().len(), 10);
}

#[test]
fn failed_generation_leaves_no_artifact() {
    let dir = TempDir::new().unwrap();
    // Chapter plan sums to 9 pages on every attempt; the stage exhausts its
    // retries and the run must end with nothing on disk.
    let script = write_script(
        &dir,
        &[
            happy_script("Yellowstone")[0].clone(),
            chapters_reply(&[4, 5]),
            chapters_reply(&[4, 5]),
            chapters_reply(&[4, 5]),
        ],
    );
    let research = write_research(&dir);
    let out = out_dir(&dir);

    parkbook_cmd(&dir)
        .args([
            "generate",
            "Yellowstone",
            "--backend",
            "scripted",
            "--script",
            &script,
            "--research-file",
            &research,
            "--out-dir",
            out.to_str().unwrap(),
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("sum to 9"));

    assert!(!out.exists());
}

#[test]
fn exhausted_timeouts_surface_the_timeout_exit_code() {
    let dir = TempDir::new().unwrap();
    write_fast_retry_config(&dir);
    let script = write_script(
        &dir,
        &[
            json!({"kind": "timeout"}),
            json!({"kind": "timeout"}),
            json!({"kind": "timeout"}),
        ],
    );
    let research = write_research(&dir);
    let out = out_dir(&dir);

    parkbook_cmd(&dir)
        .args([
            "generate",
            "Yellowstone",
            "--backend",
            "scripted",
            "--script",
            &script,
            "--research-file",
            &research,
            "--out-dir",
            out.to_str().unwrap(),
        ])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("failed after 3 attempt(s)"))
        .stderr(predicate::str::contains("timed out"));

    assert!(!out.exists());
}

#[test]
fn persistent_outage_surfaces_the_provider_exit_code() {
    let dir = TempDir::new().unwrap();
    write_fast_retry_config(&dir);
    let script = write_script(
        &dir,
        &[
            json!({"kind": "unavailable"}),
            json!({"kind": "unavailable"}),
            json!({"kind": "unavailable"}),
        ],
    );
    let research = write_research(&dir);
    let out = out_dir(&dir);

    parkbook_cmd(&dir)
        .args([
            "generate",
            "Yellowstone",
            "--backend",
            "scripted",
            "--script",
            &script,
            "--research-file",
            &research,
            "--out-dir",
            out.to_str().unwrap(),
        ])
        .assert()
        .code(70)
        .stderr(predicate::str::contains("backend unavailable"));

    assert!(!out.exists());
}

#[test]
fn unknown_backend_is_rejected() {
    let dir = TempDir::new().unwrap();
    parkbook_cmd(&dir)
        .args(["generate", "Yellowstone", "--backend", "openai"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown provider 'openai'"));
}

#[test]
fn empty_topic_is_rejected() {
    let dir = TempDir::new().unwrap();
    let research = write_research(&dir);
    parkbook_cmd(&dir)
        .args([
            "generate",
            "",
            "--backend",
            "scripted",
            "--research-file",
            &research,
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("topic name is empty"));
}

#[test]
fn missing_research_configuration_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, &happy_script("Yellowstone"));

    parkbook_cmd(&dir)
        .env_remove("PPLX_API_KEY")
        .args([
            "generate",
            "Yellowstone",
            "--backend",
            "scripted",
            "--script",
            &script,
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("PPLX_API_KEY"));
}

#[test]
fn dry_run_stops_before_generation() {
    let dir = TempDir::new().unwrap();
    let research = write_research(&dir);
    let out = out_dir(&dir);

    // No script file: a dry run must not touch the backend at all.
    parkbook_cmd(&dir)
        .args([
            "generate",
            "Yellowstone",
            "--backend",
            "scripted",
            "--research-file",
            &research,
            "--out-dir",
            out.to_str().unwrap(),
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Dry run for \"Yellowstone\""));

    assert!(!out.exists());
}

#[test]
fn check_accepts_a_generated_document() {
    let dir = TempDir::new().unwrap();
    let book = generate_yellowstone(&dir);

    parkbook_cmd(&dir)
        .args(["check", book.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid book for \"Yellowstone\""));
}

#[test]
fn check_reports_constraint_violations() {
    let dir = TempDir::new().unwrap();
    let book = generate_yellowstone(&dir);

    // Push page 1 over the word limit, then re-validate.
    let mut value: Value =
        serde_json::from_str(&std::fs::read_to_string(&book).unwrap()).unwrap();
    value["pages"][0]["text"] =
        json!("one two three four five six seven eight nine ten eleven twelve thirteen");
    std::fs::write(&book, value.to_string()).unwrap();

    parkbook_cmd(&dir)
        .args(["check", book.to_str().unwrap()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("maximum is 12"));
}

#[test]
fn check_rejects_an_unreadable_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.json");
    std::fs::write(&path, "not json").unwrap();

    parkbook_cmd(&dir)
        .args(["check", path.to_str().unwrap()])
        .assert()
        .code(1);
}

#[test]
fn no_subcommand_shows_usage() {
    let dir = TempDir::new().unwrap();
    parkbook_cmd(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}
