use std::{collections::HashMap, env, io::BufRead, path::Path};

use anyhow::Context;
use compress_io::compress::CompressIo;
use regex::{Captures, Regex};

use crate::error::PipelineError;

/// Configuration file keys recognized by the pipeline.  Unknown keys are
/// stored (the analysis commands may use them) but ignored by the driver.
pub const KNOWN_KEYS: &[&str] = &[
    "reference",
    "db",
    "anchor",
    "outDirectory",
    "matrix",
    "references",
    "matrices",
    "tracks",
    "assembly",
    "window",
    "correlationThreshold",
    "pValueThreshold",
    "qValueThreshold",
    "correlationMethod",
    "figures",
    "figureWidth",
    "zoom",
    "colours",
];

/// Options
///
/// Key/value pairs from the configuration file.  Populated once by
/// [load_config_file] and read only afterwards.  Defaults are resolved at
/// read time so an explicitly emptied key behaves like an unset one.
#[derive(Debug)]
pub struct Options {
    values: HashMap<String, String>,
}

impl Options {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Look up a key, falling back to its documented default when the key
    /// is unset or empty (assembly = "hg19", tracks = "n", otherwise "")
    pub fn get(&self, key: &str) -> &str {
        match self.values.get(key) {
            Some(v) if !v.is_empty() => v,
            _ => default_value(key),
        }
    }

    pub(crate) fn set(&mut self, key: &str, val: String) {
        self.values.insert(key.to_owned(), val);
    }

    /// Raw lookup used for variable expansion: only keys actually set in
    /// the file are visible, without defaulting
    fn lookup(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

fn default_value(key: &str) -> &'static str {
    match key {
        "assembly" => "hg19",
        "tracks" => "n",
        _ => "",
    }
}

const VAR_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)";

/// Read the configuration file.
///
/// A line containing "module load" is collected verbatim as an environment
/// setup directive for the launched analysis commands.  Otherwise a line
/// with an '=' sets key=value, splitting on the first '=' only so values
/// may themselves contain '='.  Anything else (comments, blank lines) is
/// ignored.  A key set twice keeps the last value.
///
/// ${NAME} and $NAME in values are expanded from previously set keys,
/// then from the process environment.  Config content is never executed.
pub fn load_config_file(path: &Path) -> anyhow::Result<(Options, Vec<String>)> {
    debug!("Reading configuration from {}", path.display());

    let mut rdr = CompressIo::new()
        .path(path)
        .bufreader()
        .map_err(|source| PipelineError::MissingFile {
            path: path.to_owned(),
            source,
        })?;

    let var_re = Regex::new(VAR_PATTERN)?;
    let mut opts = Options::new();
    let mut modules = Vec::new();
    let mut buf = String::new();
    let mut line = 0;

    loop {
        buf.clear();
        if rdr
            .read_line(&mut buf)
            .with_context(|| format!("Error after reading {} lines from {}", line, path.display()))?
            == 0
        {
            break;
        }
        line += 1;
        let l = buf.trim_end_matches('\n').trim_end_matches('\r');

        if l.contains("module load") {
            trace!("{}:{} environment directive: {}", path.display(), line, l);
            modules.push(l.trim().to_owned());
        } else if let Some((key, val)) = l.split_once('=') {
            let expanded = expand_value(&var_re, val, &opts);
            trace!("{}:{} {}={}", path.display(), line, key, expanded);
            if !KNOWN_KEYS.contains(&key) {
                debug!(
                    "{}:{} key {} not used by the driver (stored for the analysis commands)",
                    path.display(),
                    line,
                    key
                );
            }
            opts.set(key, expanded);
        }
    }

    debug!(
        "Read {} lines from {}: {} option(s) set, {} environment directive(s)",
        line,
        path.display(),
        opts.values.len(),
        modules.len()
    );

    Ok((opts, modules))
}

/// Substitute ${NAME} / $NAME occurrences.  Previously set config keys
/// shadow environment variables of the same name; an unknown name expands
/// to the empty string.
fn expand_value(re: &Regex, raw: &str, opts: &Options) -> String {
    re.replace_all(raw, |c: &Captures| {
        let name = c
            .get(1)
            .or_else(|| c.get(2))
            .map(|m| m.as_str())
            .expect("Variable pattern without a capture");
        opts.lookup(name)
            .map(str::to_owned)
            .or_else(|| env::var(name).ok())
            .unwrap_or_default()
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load(text: &str) -> (Options, Vec<String>) {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(text.as_bytes()).unwrap();
        load_config_file(f.path()).unwrap()
    }

    #[test]
    fn missing_file_is_an_error() {
        let e = load_config_file(Path::new("/no/such/config.txt")).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingFile { .. })
        ));
    }

    #[test]
    fn split_on_first_equals_only() {
        let (o, _) = load("correlationMethod=a=b=c\n");
        assert_eq!(o.get("correlationMethod"), "a=b=c");
    }

    #[test]
    fn last_assignment_wins() {
        let (o, _) = load("anchor=a.bed\nanchor=b.bed\n");
        assert_eq!(o.get("anchor"), "b.bed");
    }

    #[test]
    fn defaults_apply_to_unset_and_empty_keys() {
        let (o, _) = load("assembly=\nanchor=a.bed\n");
        assert_eq!(o.get("assembly"), "hg19");
        assert_eq!(o.get("tracks"), "n");
        assert_eq!(o.get("outDirectory"), "");
    }

    #[test]
    fn module_load_lines_are_collected_not_stored() {
        let (o, m) = load("module load R/4.2\nanchor=a.bed\nsome free text\n");
        assert_eq!(m, vec!["module load R/4.2".to_string()]);
        assert_eq!(o.get("anchor"), "a.bed");
        assert_eq!(o.lookup("module load R/4.2"), None);
    }

    #[test]
    fn config_keys_shadow_environment_in_expansion() {
        env::set_var("CI_DRIVER_TEST_BASE", "/env");
        let (o, _) = load(
            "CI_DRIVER_TEST_BASE=/cfg\noutDirectory=${CI_DRIVER_TEST_BASE}/out\nanchor=$CI_DRIVER_TEST_UNSET_VAR/a.bed\n",
        );
        assert_eq!(o.get("outDirectory"), "/cfg/out");
        // unknown names expand to nothing
        assert_eq!(o.get("anchor"), "/a.bed");
    }

    #[test]
    fn environment_expansion_without_config_key() {
        env::set_var("CI_DRIVER_TEST_HOME", "/home/me");
        let (o, _) = load("db=${CI_DRIVER_TEST_HOME}/db.txt\n");
        assert_eq!(o.get("db"), "/home/me/db.txt");
    }

    #[test]
    fn value_whitespace_is_preserved() {
        let (o, _) = load("colours= red, green \n");
        assert_eq!(o.get("colours"), " red, green ");
    }

    #[test]
    fn round_trip_except_defaulted_keys() {
        let text = "reference=ref.bed\ndb=db.txt\nanchor=a.bed\noutDirectory=/tmp/out\nwindow=500000\n";
        let (o, _) = load(text);
        for (k, v) in [
            ("reference", "ref.bed"),
            ("db", "db.txt"),
            ("anchor", "a.bed"),
            ("outDirectory", "/tmp/out"),
            ("window", "500000"),
        ] {
            assert_eq!(o.get(k), v);
        }
        // keys mutated by defaulting
        assert_eq!(o.get("assembly"), "hg19");
        assert_eq!(o.get("tracks"), "n");
    }

    #[test]
    fn known_key_list_is_complete() {
        assert_eq!(KNOWN_KEYS.len(), 18);
        assert!(KNOWN_KEYS.contains(&"qValueThreshold"));
    }
}
