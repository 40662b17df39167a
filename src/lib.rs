// Library root
// -----------
// The binary (`main.rs`) wires these modules together into the
// `boxpusher` command.
//
// Module responsibilities:
// - `cli`: flag parsing and ordered validation into a `PublishConfig`.
// - `api`: the `Registry` trait and its blocking HTTP implementation.
// - `publish`: the per-box publish sequence and the batch loop.
// - `ui`: upload progress bar, dry-run summary and confirmations.
// - `error`: the `PublishError` taxonomy.
pub mod api;
pub mod cli;
pub mod error;
pub mod publish;
pub mod ui;

pub use error::PublishError;
