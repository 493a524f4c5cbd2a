use crate::shared::template::{CommandTemplate, OptionMap};
use anyhow::Result;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::{Dispatch, debug, error};

// Flags understood by the MIW binary, with the default placeholders wired in.
pub const DEFAULT_MIW_COMMAND: &str = "-fnames $fnames -ofname $ofname -format_name $format_files_repo/$logfile -output_format csv -autosplit -merge_results -memory_factor $memfactor";

pub const DEFAULT_MIW_BINARY: &str = "miw";

// Status reported when the binary could not be started at all.
pub const SPAWN_FAILURE_STATUS: i32 = 127;

/// One configured MIW invocation: install location, binary name and a parsed
/// command template. Holds no mutable state, so a single value can be shared
/// across threads and run any number of times.
#[derive(Debug, Clone)]
pub struct MiwJob {
    miw_loc: PathBuf,
    binary: String,
    template: CommandTemplate,
    log: Dispatch,
}

impl MiwJob {
    /// An empty `miw_command` selects [`DEFAULT_MIW_COMMAND`]. Events from this
    /// job go to `log` regardless of the process-wide subscriber.
    pub fn new(miw_loc: impl Into<PathBuf>, miw_command: &str, log: Dispatch) -> Result<Self> {
        let source = if miw_command.trim().is_empty() {
            DEFAULT_MIW_COMMAND
        } else {
            miw_command
        };
        Ok(Self {
            miw_loc: miw_loc.into(),
            binary: DEFAULT_MIW_BINARY.to_string(),
            template: CommandTemplate::parse(source)?,
            log,
        })
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn template(&self) -> &CommandTemplate {
        &self.template
    }

    pub fn program(&self) -> PathBuf {
        self.miw_loc.join(&self.binary)
    }

    pub fn render(&self, options: &OptionMap) -> Vec<String> {
        self.template.render(options)
    }

    // Printable form of the invocation, quoted so it can be pasted into a shell.
    pub fn command_line(&self, options: &OptionMap) -> String {
        command_line(&self.program(), &self.render(options))
    }

    /// Run the binary to completion and return its exit status. Never fails:
    /// spawn errors report [`SPAWN_FAILURE_STATUS`], and signal deaths report
    /// `128 + signal` on unix. Emits exactly one event per call.
    pub fn run(&self, options: &OptionMap) -> i32 {
        let program = self.program();
        let args = self.render(options);
        let line = command_line(&program, &args);

        let outcome = Command::new(&program).args(&args).status();

        tracing::dispatcher::with_default(&self.log, || match outcome {
            Ok(status) => {
                let code = status_code(status);
                if code == 0 {
                    debug!("Successfully ran MIW job {line}");
                } else {
                    error!(status = code, "Failed MIW job call {line}");
                }
                code
            }
            Err(err) => {
                error!(
                    status = SPAWN_FAILURE_STATUS,
                    error = %spawn_error_text(&err, &program),
                    "Failed MIW job call {line}"
                );
                SPAWN_FAILURE_STATUS
            }
        })
    }
}

fn command_line(program: &Path, args: &[String]) -> String {
    let program = program.to_string_lossy();
    if args.is_empty() {
        return shell_words::quote(&program).into_owned();
    }
    format!("{} {}", shell_words::quote(&program), shell_words::join(args))
}

fn spawn_error_text(err: &io::Error, program: &Path) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => format!("executable not found: {}", program.display()),
        io::ErrorKind::PermissionDenied => {
            format!("executable not permitted: {}", program.display())
        }
        _ => format!("spawning {} failed: {err}", program.display()),
    }
}

#[cfg(unix)]
fn status_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

#[cfg(not(unix))]
fn status_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
