use std::process::{Command, Stdio};

#[test]
fn zettel_lsp_binary_starts_and_stops() {
    let exe = env!("CARGO_BIN_EXE_zettel-lsp");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start zettel-lsp binary");

    child.kill().expect("failed to stop zettel-lsp binary");
    let _ = child.wait();
}

#[test]
fn zettel_lsp_prints_its_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_zettel-lsp"))
        .arg("--version")
        .output()
        .expect("failed to run zettel-lsp binary");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
