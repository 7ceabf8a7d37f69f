//! Runs the client against a scripted shell plugin over real pipes.
#![cfg(unix)]

use std::ffi::OsString;
use std::io::Cursor;
use std::process::ExitCode;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

const REPLIES: &str = concat!(
    r#"{"success":true,"message":"Plugin initialized"}<<END>>"#,
    r#"{"message":"hello"}<<END>>"#,
    r#"{"success":true,"message":"hello"}<<END>>"#,
    r#"{"success":true,"message":"Plugin shutdown"}<<END>>"#,
);

fn args(script: &str) -> Vec<OsString> {
    [
        "rise-chat",
        "--plugin",
        "/bin/sh",
        "--quiet",
        "--exit-timeout",
        "2",
        "--",
        "-c",
        script,
    ]
    .into_iter()
    .map(OsString::from)
    .collect()
}

#[test]
fn conversation_runs_end_to_end() {
    let script = format!("printf '%s' '{REPLIES}'; cat > /dev/null");
    let mut stdin = Cursor::new("hello\n");
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let code = rise_chat::run(args(&script), &mut stdin, &mut stdout, &mut stderr);

    assert_eq!(code, ExitCode::SUCCESS);
    let printed = String::from_utf8(stdout).expect("utf-8 output");
    assert_eq!(
        printed,
        "RISE: Plugin initialized\nME: RISE: hello\nME: \nRISE: Plugin shutdown\n"
    );
}

#[test]
fn plugin_that_never_answers_fails_the_run() {
    let mut stdin = Cursor::new("");
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let code = rise_chat::run(args("exit 0"), &mut stdin, &mut stdout, &mut stderr);

    assert_eq!(code, ExitCode::FAILURE);
    let diagnostics = String::from_utf8(stderr).expect("utf-8 diagnostics");
    assert!(diagnostics.contains("rise-chat: plugin channel failed"));
}

#[test]
fn missing_plugin_flag_is_a_usage_error() {
    let mut stdin = Cursor::new("");
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let code = rise_chat::run(
        [OsString::from("rise-chat")],
        &mut stdin,
        &mut stdout,
        &mut stderr,
    );

    assert_eq!(code, ExitCode::from(2));
    assert!(!stderr.is_empty());
}

#[test]
fn binary_requires_a_plugin() {
    let mut command = cargo_bin_cmd!("rise-chat");
    command
        .assert()
        .failure()
        .stderr(contains("--plugin <PATH>"));
}
