use std::{fs, io::Write, path::Path, process::Command};

use indoc::indoc;
use pretty_assertions::assert_eq;
use slotc::sink::Sink;

const HELLO: &str = indoc! {"
    func : void . entry
    {
        var @ x , i32
        mov @ x <- 7
    }
"};

fn slotc(args: &[&Path]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_slotc"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn sink_appends_instead_of_truncating() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.s");

    for chunk in ["first\n", "second\n"] {
        let mut sink = Sink::open(&path).unwrap();
        sink.write_all(chunk.as_bytes()).unwrap();
        sink.flush().unwrap();
    }
    assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
}

#[cfg(unix)]
#[test]
fn sink_creates_files_readable_by_everyone() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.s");
    drop(Sink::open(&path).unwrap());

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o644, 0o644);
}

#[test]
fn compiles_into_an_appended_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("hello.slot");
    let output = dir.path().join("hello.s");
    fs::write(&input, HELLO).unwrap();

    for _ in 0..2 {
        let run = slotc(&[&input, &output]);
        assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    }

    let asm = fs::read_to_string(&output).unwrap();
    assert_eq!(asm.matches("mov DWORD PTR [rbp-4], 7\n").count(), 2);
    assert_eq!(asm.matches("_start:\n").count(), 2);
}

#[test]
fn stdout_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("hello.slot");
    fs::write(&input, HELLO).unwrap();

    let run = slotc(&[&input, Path::new("-")]);
    assert!(run.status.success());
    let asm = String::from_utf8(run.stdout).unwrap();
    assert!(asm.contains("entry:\n    push rbp\n"), "{asm}");
}

#[test]
fn compile_errors_exit_with_failure_and_write_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.slot");
    let output = dir.path().join("bad.s");
    fs::write(&input, "func : void . entry\n{\nmov @ y <- 1\n}\n").unwrap();

    let run = slotc(&[&input, &output]);
    assert_eq!(run.status.code(), Some(1));
    assert!(!output.exists());
    let stderr = String::from_utf8_lossy(&run.stderr);
    assert!(stderr.contains("variable `y` is not declared"), "{stderr}");
}

#[test]
fn missing_arguments_are_a_usage_error() {
    let run = slotc(&[Path::new("only-one.slot")]);
    assert_eq!(run.status.code(), Some(2));
}
