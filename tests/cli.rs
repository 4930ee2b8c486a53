use assert_cmd::Command;
use predicates::prelude::*;

fn em() -> Command {
    let mut cmd = Command::cargo_bin("em").unwrap();
    // Keep the user's settings out of the test runs
    cmd.env_remove("FIREBASE_API_KEY")
        .env_remove("FIREBASE_PROJECT_ID")
        .env_remove("GEMINI_API_KEY")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    em().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("vocab"))
        .stdout(predicate::str::contains("word"));
}

#[test]
fn test_vocab_units_lists_the_catalog() {
    em().args(["vocab", "units"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Global Success › Grade 10"))
        .stdout(predicate::str::contains("Unit 1: Family Life  (24 words)"))
        .stdout(predicate::str::contains("Unit 1: A Long and Healthy Life"));
}

#[test]
fn test_vocab_modules_balances_the_split() {
    em().args(["vocab", "modules", "Unit 1: Family Life", "--size", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("24 words, 5 modules"))
        .stdout(predicate::str::contains("Part 1   5 words"))
        .stdout(predicate::str::contains("Part 5   4 words"))
        .stdout(predicate::str::contains("Part 6").not());
}

#[test]
fn test_vocab_modules_unknown_unit_fails() {
    em().args(["vocab", "modules", "Unit 99", "--size", "5"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unit not found: Unit 99"));
}

#[test]
fn test_vocab_modules_rejects_zero_size() {
    em().args(["vocab", "modules", "Unit 1", "--size", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 1"));
}

#[test]
fn test_unknown_config_key_is_rejected() {
    em().args(["config", "get", "openai-key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
