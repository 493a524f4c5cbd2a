use crate::shared::logger::{LogConfig, LogFormat, LogLevel, LogSink};
use crate::shared::miw::DEFAULT_MIW_BINARY;
use crate::shared::template::{OptionMap, placeholder_key};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// CLI root definition. Logging flags are global so they can follow any subcommand.
#[derive(Parser, Debug)]
#[command(name = "miw-runner", version)]
#[command(about = "Run MIW log analysis jobs from command templates")]
pub struct Cli {
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Debug)]
    pub log_level: LogLevel,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
    #[arg(long, global = true, value_enum, default_value_t = LogSink::Stdout)]
    pub log_sink: LogSink,
    #[command(subcommand)]
    pub command: AppCommand,
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level,
            format: self.log_format,
            sink: self.log_sink,
        }
    }
}

// Subcommands map directly to one module each under src/commands/.
#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// Substitute options into the command template and run MIW once
    Job(JobArgs),
    /// Run every job listed in a JSON batch file, one after another
    Batch(BatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Directory holding the MIW binary
    #[arg(long, env = "MIW_LOC")]
    pub miw_loc: PathBuf,
    /// Custom command template; empty selects the built-in MIW flags
    #[arg(long, default_value = "")]
    pub miw_command: String,
    #[arg(long, default_value = DEFAULT_MIW_BINARY)]
    pub binary: String,
    /// Input file; repeat for several, MIW receives them comma-separated
    #[arg(long = "fnames", value_name = "FILE")]
    pub fnames: Vec<String>,
    #[arg(long)]
    pub ofname: Option<String>,
    /// Directory holding compiled log format definitions
    #[arg(long)]
    pub format_files_repo: Option<String>,
    /// Format definition file name inside --format-files-repo
    #[arg(long)]
    pub logfile: Option<String>,
    /// Expected memory use relative to log volume, drives MIW autosplit
    #[arg(long, value_parser = parse_memfactor)]
    pub memfactor: Option<String>,
    /// Extra placeholder value; overrides the typed flags above
    #[arg(long = "opt", value_name = "KEY=VALUE", value_parser = parse_option)]
    pub opts: Vec<(String, String)>,
    /// Print the command instead of running it
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl JobArgs {
    // Build the placeholder mapping: typed flags first, then --opt entries on top.
    pub fn to_options(&self) -> OptionMap {
        let mut options = OptionMap::new();
        if !self.fnames.is_empty() {
            options.insert("fnames".to_string(), self.fnames.join(","));
        }
        let typed = [
            ("ofname", self.ofname.clone()),
            ("format_files_repo", self.format_files_repo.clone()),
            ("logfile", self.logfile.clone()),
            ("memfactor", self.memfactor.clone()),
        ];
        for (name, value) in typed {
            if let Some(value) = value {
                options.insert(name.to_string(), value);
            }
        }
        options.extend(self.opts.iter().cloned());
        options
    }
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// JSON file with `jobs`, optional `defaults`, `miw_loc` and `miw_command`
    pub jobs_file: PathBuf,
    /// Overrides `miw_loc` from the batch file
    #[arg(long, env = "MIW_LOC")]
    pub miw_loc: Option<PathBuf>,
    /// Overrides `miw_command` from the batch file
    #[arg(long)]
    pub miw_command: Option<String>,
    #[arg(long, default_value = DEFAULT_MIW_BINARY)]
    pub binary: String,
    /// Keep running remaining jobs after a failure
    #[arg(long, default_value_t = false)]
    pub keep_going: bool,
    /// Exclusive lock held for the whole batch
    #[arg(long)]
    pub lock_file: Option<PathBuf>,
}

// Parse `KEY=VALUE`; the value may itself contain `=`.
fn parse_option(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = placeholder_key(key.trim());
    if key.is_empty() {
        return Err(format!("empty placeholder name in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

// Accept a positive finite number, but hand MIW the text exactly as typed.
fn parse_memfactor(raw: &str) -> Result<String, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("expected a number, got `{raw}`"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("memory factor must be a positive finite number, got `{raw}`"));
    }
    Ok(raw.to_string())
}
