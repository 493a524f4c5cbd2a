use crate::args::BatchArgs;
use crate::shared::lock::LockGuard;
use crate::shared::miw::MiwJob;
use crate::shared::signal::StopFlag;
use crate::shared::template::{OptionMap, placeholder_key};
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Dispatch, debug, info, warn};

// On-disk batch description. CLI flags win over `miw_loc` / `miw_command` given here.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct BatchFile {
    #[serde(default)]
    pub miw_loc: Option<PathBuf>,
    #[serde(default)]
    pub miw_command: Option<String>,
    #[serde(default)]
    pub defaults: OptionMap,
    pub jobs: Vec<JobSpec>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: OptionMap,
}

impl BatchFile {
    // Job options overlaid on the shared defaults. Keys are compared without a leading `$`,
    // so `$ofname` in a job overrides `ofname` in `defaults`.
    pub fn options_for(&self, spec: &JobSpec) -> OptionMap {
        self.defaults
            .iter()
            .chain(&spec.options)
            .map(|(k, v)| (placeholder_key(k).to_string(), v.clone()))
            .collect()
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub ran: usize,
    pub failed: usize,
    pub skipped: usize,
    pub first_failure: Option<i32>,
}

// Public batch command entrypoint.
pub fn run_batch(args: BatchArgs, log: Dispatch) -> Result<i32> {
    let batch = load_batch_file(&args.jobs_file)?;
    let stop = StopFlag::on_ctrlc()?;
    let _lock = args
        .lock_file
        .as_deref()
        .map(LockGuard::acquire)
        .transpose()?;

    let miw_loc = args
        .miw_loc
        .clone()
        .or_else(|| batch.miw_loc.clone())
        .ok_or_else(|| {
            anyhow!(
                "no MIW location given (use --miw-loc or `miw_loc` in {})",
                args.jobs_file.display()
            )
        })?;
    let miw_command = args
        .miw_command
        .clone()
        .or_else(|| batch.miw_command.clone())
        .unwrap_or_default();

    let job = MiwJob::new(miw_loc, &miw_command, log)?.with_binary(&args.binary);
    debug!(template = job.template().source(), "Using MIW command template");
    let summary = run_jobs(&job, &batch, args.keep_going, &stop);
    info!(
        ran = summary.ran,
        failed = summary.failed,
        skipped = summary.skipped,
        "Batch complete"
    );
    Ok(summary.first_failure.unwrap_or(0))
}

pub(crate) fn load_batch_file(path: &Path) -> Result<BatchFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading batch file failed: {}", path.display()))?;
    let batch: BatchFile = serde_json::from_str(&contents)
        .with_context(|| format!("parsing batch file failed: {}", path.display()))?;
    if batch.jobs.is_empty() {
        bail!("batch file lists no jobs: {}", path.display());
    }
    Ok(batch)
}

// Run jobs in file order. Stops at the first failure unless `keep_going`, and before any job
// once a stop has been requested.
pub(crate) fn run_jobs(
    job: &MiwJob,
    batch: &BatchFile,
    keep_going: bool,
    stop: &StopFlag,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let total = batch.jobs.len();

    for (idx, spec) in batch.jobs.iter().enumerate() {
        let stop_reason = if stop.is_requested() {
            Some("interrupted")
        } else if summary.first_failure.is_some() && !keep_going {
            Some("previous job failed")
        } else {
            None
        };
        if let Some(reason) = stop_reason {
            summary.skipped = total - idx;
            warn!(skipped = summary.skipped, "Stopping batch: {reason}");
            break;
        }

        let label = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("#{}", idx + 1));
        info!("Running MIW job {label} ({}/{total})", idx + 1);

        let status = job.run(&batch.options_for(spec));
        summary.ran += 1;
        if status != 0 {
            summary.failed += 1;
            summary.first_failure.get_or_insert(status);
        }
    }

    summary
}
