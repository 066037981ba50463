//! Signal scanning: walks a project tree and records marker files,
//! extensions, shebang interpreters and content-rule hits.

mod scanner;
mod signal;

pub use scanner::{ScanConfig, ScanOmission, ScanReport, SignalScanner};
pub use signal::{normalize, parse_shebang, ProjectSignal, SignalKind};
