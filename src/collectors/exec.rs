use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// First of `names` found on the search path.
pub fn find_tool(names: &[&str]) -> Option<PathBuf> {
    names.iter().find_map(|n| which::which(n).ok())
}

/// Exit code and stdout of one tool invocation.
#[derive(Debug, Clone)]
pub struct Output {
    pub code:   i32,
    pub stdout: String,
}

/// Run a tool to completion. Only a spawn failure is an error; the exit
/// status is left to the caller.
pub fn run(program: &Path, args: &[&str]) -> Result<Output> {
    debug!("running {} {}", program.display(), args.join(" "));
    let out = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run {}", program.display()))?;
    Ok(Output {
        // Killed by a signal: report as a generic failure
        code:   out.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
    })
}

/// Run a tool and return its stdout, failing on a non-zero exit.
pub fn run_capture(program: &Path, args: &[&str]) -> Result<String> {
    let out = run(program, args)?;
    if out.code != 0 {
        bail!("{} exited with status {}", program.display(), out.code);
    }
    Ok(out.stdout)
}
