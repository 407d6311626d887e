//! Output formatters for duplicate reports and set differences.
//!
//! - [`text`] for terminals
//! - [`json`] for automation and scripting
//!
//! # Example
//!
//! ```no_run
//! use drivededup::error::ExitCode;
//! use drivededup::output::json::JsonOutput;
//! use drivededup::store::{ContentStore, StoreStats};
//!
//! let store = ContentStore::open_in_memory().unwrap();
//! let groups = store.duplicate_groups().unwrap();
//! let output = JsonOutput::new(&groups, &StoreStats::default(), ExitCode::Success);
//! output.write_to(&mut std::io::stdout(), true).unwrap();
//! ```

pub mod json;
pub mod text;

pub use json::{JsonDiff, JsonOutput, JsonOutputError};
