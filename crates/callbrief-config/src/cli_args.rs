use std::path::PathBuf;

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub call_timeout: Option<u64>,
    pub store_root: Option<PathBuf>,
    pub llm_provider: Option<String>,
    pub max_items: Option<usize>,
    pub concurrency: Option<usize>,
}
