// Command implementations split by subcommand for clarity.
pub mod batch;
pub mod job;

pub use batch::run_batch;
pub use job::run_job;
