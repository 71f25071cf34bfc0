use std::path::PathBuf;
use std::process::Command;

// ── helpers ──────────────────────────────────────────────────────────────────

fn parsnip_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_parsnip"))
}

struct TempPy {
    dir: tempfile::TempDir,
    files: Vec<PathBuf>,
}

impl TempPy {
    fn new() -> Self {
        Self {
            dir: tempfile::TempDir::new().unwrap(),
            files: Vec::new(),
        }
    }

    fn file(&mut self, name: &str, content: &str) -> &mut Self {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        self.files.push(path);
        self
    }

    /// Run parsnip on the written files. Returns (stdout, stderr, exit_code).
    fn run(&self, extra: &[&str]) -> (String, String, i32) {
        let mut cmd = Command::new(parsnip_bin());
        cmd.args(&self.files).args(extra);
        let out = cmd.output().expect("failed to run parsnip");
        (
            String::from_utf8_lossy(&out.stdout).into_owned(),
            String::from_utf8_lossy(&out.stderr).into_owned(),
            out.status.code().unwrap_or(-1),
        )
    }

    fn run_no_exit(&self, extra: &[&str]) -> String {
        let mut args = vec!["--no-exit-code"];
        args.extend_from_slice(extra);
        let (stdout, _, _) = self.run(&args);
        stdout
    }
}

// ── exit codes ───────────────────────────────────────────────────────────────

#[test]
fn test_clean_file() {
    let mut t = TempPy::new();
    t.file("clean.py", "x = 1\nprint(x)\n");
    let (out, _, code) = t.run(&[]);
    assert_eq!(code, 0);
    assert!(out.contains("No syntax errors in 1 file(s)"), "got: {out}");
}

#[test]
fn test_exit_code_1_on_errors() {
    let mut t = TempPy::new();
    t.file("bad.py", "1 +\n");
    let (_, _, code) = t.run(&[]);
    assert_eq!(code, 1);
}

#[test]
fn test_no_exit_code_flag() {
    let mut t = TempPy::new();
    t.file("bad.py", "1 +\n");
    let (_, _, code) = t.run(&["--no-exit-code"]);
    assert_eq!(code, 0);
}

#[test]
fn test_unknown_target_exits_2() {
    let mut t = TempPy::new();
    t.file("f.py", "x = 1\n");
    let (_, err, code) = t.run(&["--target", "2.7"]);
    assert_eq!(code, 2);
    assert!(err.contains("error"), "got: {err}");
}

#[test]
fn test_missing_path_exits_2() {
    let out = Command::new(parsnip_bin())
        .arg("/definitely/not/here.py")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
}

// ── text output ──────────────────────────────────────────────────────────────

#[test]
fn test_syntax_error_line() {
    let mut t = TempPy::new();
    t.file("bad.py", "1 +\n");
    let out = t.run_no_exit(&[]);
    assert!(
        out.contains("bad.py:1:3: E901 SyntaxError: invalid syntax"),
        "got: {out}"
    );
}

#[test]
fn test_indentation_error_line() {
    let mut t = TempPy::new();
    t.file("indent.py", " 1\n");
    let out = t.run_no_exit(&[]);
    assert!(
        out.contains("indent.py:1:0: E903 IndentationError: unexpected indent"),
        "got: {out}"
    );
}

#[test]
fn test_unexpected_eof() {
    let mut t = TempPy::new();
    t.file("eof.py", "x = [\n");
    let out = t.run_no_exit(&[]);
    assert!(
        out.contains("eof.py:2:0: E901 SyntaxError: unexpected EOF while parsing"),
        "got: {out}"
    );
}

#[test]
fn test_multiple_errors_after_recovery() {
    let mut t = TempPy::new();
    t.file("many.py", "1 +\nx = 1\n2 +\n");
    let out = t.run_no_exit(&[]);
    assert!(out.contains("many.py:1:3:"), "got: {out}");
    assert!(out.contains("many.py:3:3:"), "got: {out}");
    assert!(out.contains("Found 2 error(s) in 1 of 1 file(s)"), "got: {out}");
}

// ── --target ─────────────────────────────────────────────────────────────────

#[test]
fn test_target_selects_grammar() {
    let mut t = TempPy::new();
    t.file("kw.py", "async = 1\n");
    let (_, _, code) = t.run(&["--target", "3.6"]);
    assert_eq!(code, 0);
    let (_, _, code) = t.run(&["--target", "3.7"]);
    assert_eq!(code, 1);
}

#[test]
fn test_default_target_is_38() {
    let mut t = TempPy::new();
    t.file("walrus.py", "if (n := 10) > 5:\n    pass\n");
    let (_, _, code) = t.run(&[]);
    assert_eq!(code, 0);
    let (_, _, code) = t.run(&["--target", "3.7"]);
    assert_eq!(code, 1);
}

// ── --json ───────────────────────────────────────────────────────────────────

#[test]
fn test_json_output() {
    let mut t = TempPy::new();
    t.file("f.py", "def f(:\n    pass\n");
    let out = t.run_no_exit(&["--json"]);
    let value: serde_json::Value = serde_json::from_str(&out).expect("valid JSON");
    assert_eq!(value["count"], 1);
    assert_eq!(value["target"], "3.8");
    let d = &value["diagnostics"][0];
    assert_eq!(d["line"], 1);
    assert_eq!(d["col"], 6);
    assert_eq!(d["code"], 901);
    assert_eq!(d["message"], "SyntaxError: invalid syntax");
    assert!(d["file"].as_str().unwrap().ends_with("f.py"));
}

#[test]
fn test_json_clean_file() {
    let mut t = TempPy::new();
    t.file("f.py", "x = 1\n");
    let out = t.run_no_exit(&["--json"]);
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["count"], 0);
    assert_eq!(value["diagnostics"], serde_json::json!([]));
}

// ── directories ──────────────────────────────────────────────────────────────

#[test]
fn test_scan_directory() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.py"), "1 +\n").unwrap();
    std::fs::write(dir.path().join("b.py"), "x = (\n").unwrap();
    std::fs::write(dir.path().join("c.py"), "x = 1\n").unwrap();
    std::fs::write(dir.path().join("readme.txt"), "1 +\n").unwrap();

    let out = Command::new(parsnip_bin())
        .arg(dir.path())
        .arg("--no-exit-code")
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Found 2 error(s) in 2 of 3 file(s)"), "got: {stdout}");
}

#[test]
fn test_exclude_flag() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("legacy")).unwrap();
    std::fs::write(dir.path().join("legacy/old.py"), "print 'hi'\n").unwrap();
    std::fs::write(dir.path().join("app.py"), "print('hi')\n").unwrap();

    let out = Command::new(parsnip_bin())
        .arg(dir.path())
        .args(["--exclude", "legacy"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(0));
}
