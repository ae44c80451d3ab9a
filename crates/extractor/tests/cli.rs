// ABOUTME: Integration tests for the digests-extract CLI binary.
// ABOUTME: Tests JSON output, content formats, custom rule files and argument errors.

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::CommandCargoExt;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

const ARTICLE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Test Page</title><meta property="og:title" content="Story Title"></head>
<body>
<article>
<p>The first paragraph of the article has enough text, and a comma, to be scored.</p>
<p>The second paragraph continues the story with <b>more</b> words for the reader.</p>
</article>
</body>
</html>"#;

fn extract_cmd() -> Command {
    Command::cargo_bin("digests-extract").unwrap()
}

fn write_page(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("page.html");
    fs::write(&path, ARTICLE).unwrap();
    path
}

#[test]
fn prints_json_result() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir);

    extract_cmd()
        .arg("--html")
        .arg(&page)
        .arg("--url")
        .arg("https://example.com/story")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""title": "Story Title""#))
        .stdout(predicate::str::contains(r#""domain": "example.com""#))
        .stdout(predicate::str::contains("The first paragraph"));
}

#[test]
fn text_format_strips_markup() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir);

    extract_cmd()
        .arg("--html")
        .arg(&page)
        .arg("--url")
        .arg("https://example.com/story")
        .arg("--format")
        .arg("text")
        .arg("--compact")
        .assert()
        .success()
        .stdout(predicate::str::contains("<p>").not())
        .stdout(predicate::str::contains("more words for the reader"));
}

#[test]
fn custom_rules_file_is_used() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir);
    let rules = dir.path().join("rules.json");
    fs::write(
        &rules,
        r#"{"rule_sets": [{"domain": "example.com",
            "title": {"selectors": ["title"]},
            "extend": {"first_bold": {"selectors": ["article b"]}}}]}"#,
    )
    .unwrap();

    extract_cmd()
        .arg("--html")
        .arg(&page)
        .arg("--url")
        .arg("https://example.com/story")
        .arg("--rules")
        .arg(&rules)
        .arg("--concurrent")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""title": "Test Page""#))
        .stdout(predicate::str::contains(r#""first_bold": "more""#));
}

#[test]
fn content_only_leaves_title_empty() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir);
    let out = dir.path().join("out.json");

    extract_cmd()
        .arg("--html")
        .arg(&page)
        .arg("--url")
        .arg("https://example.com/story")
        .arg("--content-only")
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["title"], "");
    assert!(json["content"].as_str().unwrap().contains("first paragraph"));
}

#[test]
fn invalid_url_fails() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir);

    extract_cmd()
        .arg("--html")
        .arg(&page)
        .arg("--url")
        .arg("not a url")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid url"));
}

#[test]
fn missing_file_fails() {
    extract_cmd()
        .arg("--html")
        .arg("/nonexistent/page.html")
        .arg("--url")
        .arg("https://example.com")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error reading file"));
}

#[test]
fn malformed_rules_file_fails() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir);
    let rules = dir.path().join("rules.json");
    fs::write(&rules, "{not json").unwrap();

    extract_cmd()
        .arg("--html")
        .arg(&page)
        .arg("--url")
        .arg("https://example.com/story")
        .arg("--rules")
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error loading rules"));
}
