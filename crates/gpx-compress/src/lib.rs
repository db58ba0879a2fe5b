//! GPX Compress - Command Line Front End
//!
//! Reads a GPX file, runs the byte-budgeted search from `gpx-compress-lib`
//! on a blocking worker and writes `<stem>_compressed.gpx` next to the input.

mod logging;
mod run;
mod settings;

pub use logging::setup_logging;
pub use run::{CliError, RunSummary, run};
pub use settings::{Settings, parse_size};
