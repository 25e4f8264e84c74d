use std::path::{Path, PathBuf};

use crate::{mode::InputMode, options::Options, sample::SampleSpec};

/// Config
///
/// Configuration info for the run
/// This is generated from the command line arguments and the
/// configuration file
/// Once set it is read only
///
/// options - key/value pairs from the configuration file
/// mode - resolved input mode
/// sample_list - samples from the list file (multi sample modes only)
/// config_path - configuration file path, passed to every analysis child
/// list_path - sample list file path (multi sample modes only)
/// module_directives - environment setup lines from the configuration
/// analysis_cmd - external single sample analysis command
/// merge_cmd - external track merging command
/// threads - maximum number of concurrent sample launches
///
pub struct Config {
    options: Options,
    mode: InputMode,
    sample_list: Vec<SampleSpec>,
    config_path: PathBuf,
    list_path: Option<PathBuf>,
    module_directives: Vec<String>,
    analysis_cmd: String,
    merge_cmd: String,
    threads: usize,
}

impl Config {
    pub fn new(
        options: Options,
        mode: InputMode,
        sample_list: Vec<SampleSpec>,
        config_path: PathBuf,
        list_path: Option<PathBuf>,
        module_directives: Vec<String>,
    ) -> Self {
        Self {
            options,
            mode,
            sample_list,
            config_path,
            list_path,
            module_directives,
            analysis_cmd: String::new(),
            merge_cmd: String::new(),
            threads: 1,
        }
    }

    pub fn set_analysis_cmd(&mut self, cmd: String) {
        self.analysis_cmd = cmd
    }

    pub fn set_merge_cmd(&mut self, cmd: String) {
        self.merge_cmd = cmd
    }

    pub fn set_threads(&mut self, nt: usize) {
        self.threads = nt
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn sample_list(&self) -> &[SampleSpec] {
        &self.sample_list
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn module_directives(&self) -> &[String] {
        &self.module_directives
    }

    pub fn analysis_cmd(&self) -> &str {
        &self.analysis_cmd
    }

    pub fn merge_cmd(&self) -> &str {
        &self.merge_cmd
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn out_dir(&self) -> PathBuf {
        PathBuf::from(self.options.get("outDirectory"))
    }

    /// Per sample output directory; unique per sample so results cannot
    /// collide
    pub fn sample_out_dir(&self, name: &str) -> PathBuf {
        self.out_dir().join(name)
    }

    /// Shared anchors file written by the per sample analysis runs and
    /// read by track merging
    pub fn anchors_path(&self) -> PathBuf {
        self.out_dir().join("anchors.bed")
    }

    pub fn assembly(&self) -> &str {
        self.options.get("assembly")
    }

    /// Track merging runs only on an explicit tracks=y
    pub fn merge_requested(&self) -> bool {
        self.options.get("tracks") == "y"
    }

    /// The file used to enumerate samples: the list file in multi sample
    /// modes, the configuration file itself otherwise
    pub fn list_or_config_path(&self) -> &Path {
        self.list_path.as_deref().unwrap_or(&self.config_path)
    }
}
