/// End-to-end tests: drive the `calligraphy` binary on small scripts and check
/// what it prints, writes and exits with.
///
/// Every test runs inside its own temporary directory with
/// `CALLIGRAPHY_CONFIG` pointing at an empty file so that no user config
/// leaks in.  Tests that execute a program need `python3` and `bash` on
/// `PATH` and are skipped without them.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Path to the `calligraphy` binary built by this Cargo workspace.
fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_calligraphy"))
}

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("empty.rc"), "").expect("write config");
        Sandbox { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(&path, text).expect("write script");
        path
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(binary());
        cmd.args(args)
            .current_dir(self.path())
            .env("CALLIGRAPHY_CONFIG", self.path().join("empty.rc"))
            .env_remove("CALLIGRAPHY_PYTHON")
            .env_remove("RUST_LOG")
            .env_remove("NO_COLOR");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("failed to run calligraphy")
    }

    fn run_stdin(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn calligraphy");
        child
            .stdin
            .as_mut()
            .expect("stdin not open")
            .write_all(input.as_bytes())
            .expect("write to stdin");
        child.wait_with_output().expect("wait failed")
    }
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn have(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

// ── Flags ─────────────────────────────────────────────────────────────────────

#[test]
fn version_flag() {
    let out = Sandbox::new().run(&["--version"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn explain_and_intermediate_conflict() {
    let sb = Sandbox::new();
    sb.write("a.script", "ls\n");
    let out = sb.run(&["-e", "-i", "a.script"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("cannot be used with"));
}

#[test]
fn missing_script_is_an_error() {
    let out = Sandbox::new().run(&["nope.script"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("nope.script"));
}

// ── --explain ─────────────────────────────────────────────────────────────────

#[test]
fn explain_lists_classifications() {
    let sb = Sandbox::new();
    sb.write("a.script", "# hi\nx = 5\necho $x\ny = $(date)\n");
    let out = sb.run(&["-e", "a.script"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(
        stdout(&out),
        "COMMENT | # hi\nPYTHON  | x = 5\nSHELL   | echo $x\nMIX     | y = $(date)\n"
    );
}

#[test]
fn explain_can_be_forced_to_color() {
    let sb = Sandbox::new();
    sb.write("a.script", "echo hi\n");
    std::fs::write(sb.path().join("empty.rc"), "color = always\n").unwrap();
    let out = sb.run(&["--explain", "a.script"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("SHELL"));
    assert_ne!(stdout(&out), "SHELL   | echo hi\n");
}

// ── --intermediate ────────────────────────────────────────────────────────────

#[test]
fn intermediate_prints_preamble_and_body() {
    let sb = Sandbox::new();
    sb.write("a.script", "x = 1\nls -la\n");
    let out = sb.run(&["-i", "a.script", "one", "--two"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("sys.argv = ['a.script', 'one', '--two']"));
    assert!(text.contains("def shell("));
    assert!(text.ends_with("\n\nx = 1\nshell(\"bHMgLWxh\", format_dict=locals())\n"));
}

#[test]
fn intermediate_from_stdin() {
    let sb = Sandbox::new();
    let out = sb.run_stdin(&["-i", "-"], "name = $(whoami)\n");
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stdout(&out).contains(
        "name = shell(\"d2hvYW1p\", get_stdout=True, silent=False, format_dict=locals())"
    ));
}

#[test]
fn unterminated_substitution_fails() {
    let sb = Sandbox::new();
    sb.write("a.script", "x = 1\ny = $(echo\n");
    let out = sb.run(&["-i", "a.script"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("line 2: unterminated inline substitution"));
    assert!(stdout(&out).is_empty());
}

// ── source directives ─────────────────────────────────────────────────────────

#[test]
fn source_writes_artifact() {
    let sb = Sandbox::new();
    sb.write("lib/util.script", "def greet():\n    echo hello\n");
    sb.write("main.script", "source lib/util.script as u\nu.greet()\n");
    let out = sb.run(&["-i", "main.script"]);
    assert!(out.status.success(), "{}", stderr(&out));

    let artifact = sb.path().join("lib/.util.py");
    assert!(artifact.is_file());
    let written = std::fs::read_to_string(&artifact).unwrap();
    assert!(written.contains("def source("));
    assert!(!written.contains("sys.argv ="));
    assert!(stdout(&out).contains(".util.py\", \"u\")\nu.greet()\n"));
}

#[test]
fn commented_source_is_still_expanded() {
    let sb = Sandbox::new();
    sb.write("lib/u.script", "def f():\n    echo hi\n");
    sb.write("main.script", "source lib/u.script  # helper\nu.f()\n");
    let out = sb.run(&["-i", "main.script"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(sb.path().join("lib/.u.py").is_file());
    assert!(stdout(&out).contains(".u.py\", \"u\")\nu.f()\n"));
}

#[test]
fn cyclic_source_fails() {
    let sb = Sandbox::new();
    sb.write("a.script", "source b.script\n");
    sb.write("b.script", "source a.script\n");
    let out = sb.run(&["-i", "a.script"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("cyclic import"), "{err}");
    assert!(err.contains("a.script -> "), "{err}");
}

#[test]
fn import_depth_comes_from_config() {
    let sb = Sandbox::new();
    sb.write("a.script", "source b.script\n");
    sb.write("b.script", "source c.script\n");
    sb.write("c.script", "echo deep\n");
    std::fs::write(sb.path().join("empty.rc"), "max_import_depth = 1\n").unwrap();
    let out = sb.run(&["-i", "a.script"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("import depth limit (1) exceeded"));
}

// ── Running ───────────────────────────────────────────────────────────────────

#[test]
fn runs_program_and_forwards_exit_code() {
    if !have("python3") || !have("bash") {
        eprintln!("skipping: python3 or bash not available");
        return;
    }
    let sb = Sandbox::new();
    sb.write(
        "a.script",
        "import sys\nenv.GREETING = 'hi'\necho $GREETING\nwho = ?(echo world)\nprint(who)\nsys.exit(3)\n",
    );
    let out = sb.run(&["a.script"]);
    assert_eq!(out.status.code(), Some(3), "{}", stderr(&out));
    assert_eq!(stdout(&out), "hi\nworld\n");
}

#[test]
fn failing_shell_command_stops_the_program() {
    if !have("python3") || !have("bash") {
        eprintln!("skipping: python3 or bash not available");
        return;
    }
    let sb = Sandbox::new();
    sb.write("a.script", "false\nprint('unreachable')\n");
    let out = sb.run(&["a.script"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(!stdout(&out).contains("unreachable"));
    assert!(stderr(&out).contains("ShellError"));
}
