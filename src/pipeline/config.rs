use crate::scan::ScanConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Budget for one whole run; `None` disables the deadline
    pub timeout: Option<Duration>,
    pub scan: ScanConfig,
    pub strict_render: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            scan: ScanConfig::default(),
            strict_render: false,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_scan_config(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_strict_render(mut self, strict: bool) -> Self {
        self.strict_render = strict;
        self
    }
}
