//! End-to-end tests for the vocab CLI
//!
//! Each test runs the compiled binary against its own temporary data
//! directory.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

const LIST: &str = r#"{
  "name": "sat_core_1",
  "description": "test list",
  "words": [
    {"lemma": "alpha", "pos": "noun", "definition": "first", "rank": 1},
    {"lemma": "bravo", "pos": "noun", "definition": "second", "rank": 2},
    {"lemma": "charlie", "pos": "noun", "definition": "third", "rank": 3},
    {"lemma": "delta", "pos": "verb", "definition": "fourth", "rank": 4},
    {"lemma": "echo", "pos": "verb", "definition": "fifth", "rank": 5},
    {"lemma": "foxtrot", "pos": "verb", "definition": "sixth", "rank": 6}
  ]
}"#;

const CONFIG: &str = r#"
[session]
new_words_per_day = 3

[analysis]
weak_min_attempts = 2

[clock]
utc_offset_minutes = 0
"#;

/// Run vocab with the given data directory and stdin; return (success, stdout, stderr)
fn run_vocab(dir: &Path, args: &[&str], input: &str) -> (bool, String, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_vocab"))
        .args(args)
        .env("VOCAB_DIR", dir)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute vocab");

    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait for vocab");

    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

/// Initialized data directory with the test list imported
fn prepared() -> TempDir {
    let temp = TempDir::new().unwrap();
    let (success, _, stderr) = run_vocab(temp.path(), &["init"], "");
    assert!(success, "init failed: {}", stderr);
    std::fs::write(temp.path().join("config.toml"), CONFIG).unwrap();

    let list = temp.path().join("list.json");
    std::fs::write(&list, LIST).unwrap();
    let (success, stdout, stderr) = run_vocab(temp.path(), &["import", list.to_str().unwrap()], "");
    assert!(success, "import failed: {}", stderr);
    assert!(stdout.contains("Words: 6"));
    temp
}

#[test]
fn test_version() {
    let temp = TempDir::new().unwrap();
    let (success, stdout, _) = run_vocab(temp.path(), &["--version"], "");
    assert!(success);
    assert!(stdout.contains("vocab"));
}

#[test]
fn test_status_before_init() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing");
    let (success, stdout, _) = run_vocab(&missing, &["status"], "");
    assert!(success);
    assert!(stdout.contains("NOT INITIALIZED"));
}

#[test]
fn test_init_creates_data_directory() {
    let temp = TempDir::new().unwrap();
    let (success, stdout, _) = run_vocab(temp.path(), &["init"], "");
    assert!(success);
    assert!(stdout.contains("Initialized"));
    assert!(temp.path().join("vocab.sqlite").exists());
    assert!(temp.path().join("config.toml").exists());

    // Second init keeps the existing config
    let (success, stdout, _) = run_vocab(temp.path(), &["init"], "");
    assert!(success);
    assert!(stdout.contains("kept existing"));
}

#[test]
fn test_queue_without_list_fails() {
    let temp = TempDir::new().unwrap();
    run_vocab(temp.path(), &["init"], "");
    let (success, _, stderr) = run_vocab(temp.path(), &["queue", "new"], "");
    assert!(!success);
    assert!(stderr.contains("vocab import"));
}

#[test]
fn test_new_word_queue_by_day_and_start() {
    let temp = prepared();

    let (success, stdout, _) = run_vocab(temp.path(), &["queue", "new", "--day", "1"], "");
    assert!(success);
    assert!(stdout.contains("delta"));
    assert!(stdout.contains("foxtrot"));
    assert!(!stdout.contains("alpha"));

    // Negative start wraps to the end of the list
    let (success, stdout, _) = run_vocab(temp.path(), &["queue", "new", "--start", "-1", "--limit", "2"], "");
    assert!(success);
    let foxtrot = stdout.find("foxtrot").expect("foxtrot listed");
    let alpha = stdout.find("alpha").expect("alpha listed");
    assert!(foxtrot < alpha);
}

#[test]
fn test_study_session_updates_progress() {
    let temp = prepared();

    // Miss alpha once, then get everything right
    let (success, stdout, stderr) = run_vocab(temp.path(), &["study", "new"], "n\ny\ny\ny\n");
    assert!(success, "study failed: {}", stderr);
    assert!(stdout.contains("Session complete"));
    assert!(stdout.contains("Mastered: 3/3"));
    assert!(stdout.contains("Answered: 4"));

    let (_, stdout, _) = run_vocab(temp.path(), &["status"], "");
    assert!(stdout.contains("Streak: 1 days"));
    assert!(stdout.contains("XP: 30"));
    assert!(stdout.contains("Needs review: 0"));
    assert!(stdout.contains("Current zone: Zone 1: Foundation"));

    let (_, stdout, _) = run_vocab(temp.path(), &["adventure", "show"], "");
    assert!(stdout.contains("[x] learn new words"));

    let (_, stdout, _) = run_vocab(temp.path(), &["study", "review"], "");
    assert!(stdout.contains("No words need review"));
}

#[test]
fn test_unfinished_study_keeps_progress_untouched() {
    let temp = prepared();
    let (success, stdout, _) = run_vocab(temp.path(), &["study", "new"], "n\n");
    assert!(success);
    assert!(stdout.contains("left unfinished"));

    let (_, stdout, _) = run_vocab(temp.path(), &["status"], "");
    assert!(stdout.contains("Streak: 0 days"));
    assert!(stdout.contains("Needs review: 1"));

    let (_, stdout, _) = run_vocab(temp.path(), &["queue", "review"], "");
    assert!(stdout.contains("alpha"));
}

#[test]
fn test_weak_words_after_repeated_misses() {
    let temp = prepared();
    let (success, _, _) = run_vocab(temp.path(), &["study", "new"], "n\nn\nn\ny\ny\ny\n");
    assert!(success);

    let (success, stdout, _) = run_vocab(temp.path(), &["weak"], "");
    assert!(success);
    assert!(stdout.contains("alpha (1/2 correct)"));
    assert!(stdout.contains("charlie (1/2 correct)"));
    assert!(!stdout.contains("delta"));
}

#[test]
fn test_distractors_exclude_the_word() {
    let temp = prepared();
    let (success, stdout, _) = run_vocab(temp.path(), &["distractors", "--word", "1", "--limit", "5"], "");
    assert!(success);
    assert!(stdout.contains("Distractors for alpha"));
    for lemma in ["bravo", "charlie", "delta", "echo", "foxtrot"] {
        assert!(stdout.contains(lemma), "missing {}", lemma);
    }
}

#[test]
fn test_adventure_commands() {
    let temp = prepared();

    let (success, stdout, _) = run_vocab(temp.path(), &["adventure", "complete-task", "--day", "0", "--task", "2"], "");
    assert!(success);
    assert!(stdout.contains("Day 1 task 2 marked complete"));

    let (success, _, stderr) = run_vocab(temp.path(), &["adventure", "complete-task", "--day", "0", "--task", "7"], "");
    assert!(!success);
    assert!(stderr.contains("out of range"));

    let (success, stdout, _) = run_vocab(temp.path(), &["adventure", "unlock", "--zone", "2"], "");
    assert!(success);
    assert!(stdout.contains("Zone 3: Island unlocked"));

    let (_, stdout, _) = run_vocab(temp.path(), &["adventure", "show"], "");
    assert!(stdout.contains("[x] fill in the blank"));
    assert!(stdout.contains("🔓 Zone 3: Island"));
    assert!(stdout.contains("🔒 Zone 2: Cloud Realm"));
}

#[test]
fn test_cards_show_context_and_collocations() {
    let temp = TempDir::new().unwrap();
    run_vocab(temp.path(), &["init"], "");
    std::fs::write(temp.path().join("config.toml"), CONFIG).unwrap();

    let list = temp.path().join("list.json");
    std::fs::write(
        &list,
        r#"{"name": "sat_core_1", "words": [{
            "lemma": "abate",
            "definition": "become less intense",
            "rank": 1,
            "contexts": ["By evening the storm began to ______ blank."],
            "collocations": ["abate a nuisance", "the pain abated"]
        }]}"#,
    )
    .unwrap();
    let (success, stdout, _) = run_vocab(temp.path(), &["import", list.to_str().unwrap()], "");
    assert!(success);
    assert!(stdout.contains("Contexts: 1"));
    assert!(stdout.contains("Collocations: 2"));

    let (success, stdout, _) = run_vocab(temp.path(), &["study", "new"], "y\n");
    assert!(success);
    assert!(stdout.contains("By evening the storm began to abate."));
    assert!(stdout.contains("Collocations: abate a nuisance, the pain abated"));
}
