use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::error::Error;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

const HELLO: &str = r#"
.function main params=0 registers=2
.const str "hello"
  LdaConstant [0]
  Star r0
  CallRuntime #Print, r0, 1
  LdaSmi8 40
  Star r1
  LdaSmi8 2
  Add r1
  Return
.end
"#;

#[test]
fn runs_main_and_prints_output_then_result() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let script_path = dir.path().join("hello.bsk");
    fs::write(&script_path, HELLO)?;

    let mut cmd = Command::cargo_bin("brisk")?;
    cmd.args(["run", script_path.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::diff("hello\n42\n"));

    Ok(())
}

#[test]
fn disassembles_every_function() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let script_path = dir.path().join("hello.bsk");
    fs::write(&script_path, HELLO)?;

    let mut cmd = Command::cargo_bin("brisk")?;
    cmd.args(["disasm", script_path.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("; function main"))
        .stdout(predicate::str::contains("#Print, r0, 1"))
        .stdout(predicate::str::contains("Return"));

    Ok(())
}

#[test]
fn illegal_bytecode_fails_with_reason_code() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let script_path = dir.path().join("illegal.bsk");
    fs::write(&script_path, ".function main\n  LdaZero\n  Illegal\n.end\n")?;

    let mut cmd = Command::cargo_bin("brisk")?;
    cmd.args(["run", script_path.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid bytecode (reason code 2)"));

    Ok(())
}

#[test]
fn rejects_runtime_calls_with_the_wrong_result_size() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let script_path = dir.path().join("divmod.bsk");
    fs::write(
        &script_path,
        ".function main registers=2\n  CallRuntime #DivMod, r0, 2\n  Return\n.end\n",
    )?;

    let mut cmd = Command::cargo_bin("brisk")?;
    cmd.args(["run", script_path.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("DivMod returns 2 words"));

    Ok(())
}

#[test]
fn reports_assembly_errors_with_line() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let script_path = dir.path().join("bad.bsk");
    fs::write(&script_path, ".function main\n  Bogus r0\n.end\n")?;

    let mut cmd = Command::cargo_bin("brisk")?;
    cmd.args(["run", script_path.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("assembly error on line 2"));

    Ok(())
}

#[test]
fn writes_trace_json() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let script_path = dir.path().join("hello.bsk");
    let trace_path = dir.path().join("trace.json");
    fs::write(&script_path, HELLO)?;

    let mut cmd = Command::cargo_bin("brisk")?;
    cmd.args([
        "run",
        script_path.to_str().unwrap(),
        "--trace-json",
        trace_path.to_str().unwrap(),
    ]);
    cmd.env_remove("BRISK_LOG").env_remove("RUST_LOG");
    cmd.assert().success().stdout(predicate::str::contains("42"));

    let events: serde_json::Value = serde_json::from_str(&fs::read_to_string(&trace_path)?)?;
    let events = events.as_array().expect("array of events");
    // Entry and exit for each of the eight instructions.
    assert_eq!(events.len(), 16);
    assert_eq!(events[0]["kind"], "entry");
    assert_eq!(events[0]["offset"], 0);
    assert_eq!(events[15]["bytecode"], "Return");

    Ok(())
}

const RECURSE: &str = r#"
.function recurse params=1 registers=1
  StackCheck
  Call r0, r0, 1
  Return
.end
.function main params=0 registers=1
.const fn recurse
  LdaConstant [0]
  Star r0
  Call r0, r0, 1
  Return
.end
"#;

#[test]
fn small_stack_overflows_on_recursion() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let script_path = dir.path().join("recurse.bsk");
    fs::write(&script_path, RECURSE)?;

    let mut cmd = Command::cargo_bin("brisk")?;
    cmd.args(["run", script_path.to_str().unwrap(), "--stack-size", "2048"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("maximum call stack size exceeded"));

    Ok(())
}

#[test]
fn default_flags_overflow_on_recursion() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let script_path = dir.path().join("recurse.bsk");
    fs::write(&script_path, RECURSE)?;

    let mut cmd = Command::cargo_bin("brisk")?;
    cmd.args(["run", script_path.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("maximum call stack size exceeded"));

    let mut cmd = Command::cargo_bin("brisk")?;
    cmd.args(["run", script_path.to_str().unwrap(), "--max-call-depth", "1024"]);
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("maximum call stack size exceeded"));

    Ok(())
}

#[test]
fn rejects_invalid_config() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let script_path = dir.path().join("hello.bsk");
    let config_path = dir.path().join("brisk.toml");
    fs::write(&script_path, HELLO)?;
    fs::write(&config_path, "[target]\nendianness = \"middle\"\n")?;

    let mut cmd = Command::cargo_bin("brisk")?;
    cmd.args([
        "run",
        script_path.to_str().unwrap(),
        "--config",
        config_path.to_str().unwrap(),
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));

    Ok(())
}

#[test]
fn missing_main_is_an_error() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let script_path = dir.path().join("nomain.bsk");
    fs::write(&script_path, ".function helper\n  Return\n.end\n")?;

    let mut cmd = Command::cargo_bin("brisk")?;
    cmd.args(["run", script_path.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No `main` function defined"));

    Ok(())
}
