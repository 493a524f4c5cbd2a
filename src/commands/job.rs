use crate::args::JobArgs;
use crate::shared::miw::MiwJob;
use crate::shared::template::OptionMap;
use anyhow::Result;
use tracing::{Dispatch, debug, warn};

// Public job command entrypoint. Returns the MIW exit status for the process exit code.
pub fn run_job(args: JobArgs, log: Dispatch) -> Result<i32> {
    let job = MiwJob::new(&args.miw_loc, &args.miw_command, log)?.with_binary(&args.binary);
    debug!(template = job.template().source(), "Using MIW command template");
    let options = args.to_options();

    if args.dry_run {
        print!("{}", dry_run_report(&job, &options));
        return Ok(0);
    }

    let unresolved = job.template().unresolved(&options);
    if !unresolved.is_empty() {
        warn!(
            placeholders = ?unresolved,
            "No value given for some placeholders; passing them through as written"
        );
    }

    Ok(job.run(&options))
}

// Command line, then one `unresolved:` line when some placeholders have no value.
fn dry_run_report(job: &MiwJob, options: &OptionMap) -> String {
    let mut report = format!("{}\n", job.command_line(options));
    let unresolved = job.template().unresolved(options);
    if !unresolved.is_empty() {
        let names: Vec<String> = unresolved.iter().map(|name| format!("${name}")).collect();
        report.push_str(&format!("unresolved: {}\n", names.join(" ")));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::miw::tests::Captured;

    fn job(command: &str) -> MiwJob {
        MiwJob::new("/opt/miw", command, Captured::default().dispatch()).unwrap()
    }

    #[test]
    fn dry_run_lists_placeholders_without_values() {
        let options = OptionMap::from([
            ("fnames".to_string(), "a.txt".to_string()),
            ("ofname".to_string(), "out.csv".to_string()),
            ("memfactor".to_string(), "2".to_string()),
        ]);

        let report = dry_run_report(&job(""), &options);

        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2, "{report}");
        assert!(lines[0].starts_with("/opt/miw/miw -fnames a.txt"), "{report}");
        assert_eq!(lines[1], "unresolved: $format_files_repo $logfile");
    }

    #[test]
    fn dry_run_is_one_line_when_everything_resolves() {
        let options = OptionMap::from([("fnames".to_string(), "a.txt".to_string())]);
        let report = dry_run_report(&job("-fnames $fnames"), &options);
        assert_eq!(report, "/opt/miw/miw -fnames a.txt\n");
    }
}
