//! Deadline-aware process execution.
//!
//! Every manager command runs through [`run`], which polls the child and
//! kills it once the caller's [`Deadline`] passes or is cancelled.

use crate::error::{Error, Result};
use declarative::Deadline;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
    /// Whether the process exited with status zero
    pub success: bool,
}

/// Run `program` with `args`, capturing output.
///
/// A non-zero exit is not an error here; see [`run_checked`].
pub fn run(program: &Path, args: &[&str], deadline: &Deadline) -> Result<CommandOutput> {
    let command_line = display_command(program, args);
    deadline.check().map_err(|source| Error::Interrupted {
        command: command_line.clone(),
        source,
    })?;

    log::debug!("running {command_line}");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::CommandNotFound {
                program: program.display().to_string(),
            },
            _ => Error::Io(e),
        })?;

    // Drain pipes on their own threads so a chatty child never blocks on a full pipe
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if let Err(source) = deadline.check() {
            log::debug!("killing {command_line}: {source}");
            let _ = child.kill();
            let _ = child.wait();
            // readers are left detached: grandchildren may still hold the pipes
            return Err(Error::Interrupted {
                command: command_line,
                source,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(CommandOutput {
        stdout: join_reader(stdout),
        stderr: join_reader(stderr),
        success: status.success(),
    })
}

/// Run a command and turn a non-zero exit into a categorized error.
pub fn run_checked(
    manager: &str,
    program: &Path,
    args: &[&str],
    package: Option<&str>,
    deadline: &Deadline,
) -> Result<String> {
    let output = run(program, args, deadline)?;
    if !output.success {
        return Err(Error::from_output(manager, &output.stderr, package));
    }
    Ok(output.stdout)
}

/// Locate an executable on `PATH`.
pub fn which(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

/// Whether `path` is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn display_command(program: &Path, args: &[&str]) -> String {
    let name = program
        .file_name()
        .map_or_else(|| program.display().to_string(), |n| n.to_string_lossy().into_owned());
    std::iter::once(name.as_str())
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
