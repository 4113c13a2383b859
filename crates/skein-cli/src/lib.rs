/// skein command-line host
///
/// Loads scripts saved as JSON syntax trees and runs them through the
/// interpreter, with `print` and `readline` wired to the terminal.

pub mod driver;
pub mod error;

pub use driver::{load_consts, load_metadata, load_script, RunOptions, RunOutput, Runner};
pub use error::{CliError, Result};
