use std::path::{Path, PathBuf};

use anyhow::Context;
use compress_io::compress::CompressIo;
use utils::{get_next_line, get_next_line_ws};

use crate::{error::PipelineError, mode::InputMode};

/// Input sample
///
/// input - path to the sample's signal matrix or reference file
/// name - sample name, used for the per sample output directory
/// track - 1-based position in the list file
/// n_samples - total number of samples in the run
/// line - source line in the list file, kept for error reports
///
#[derive(Debug)]
pub struct SampleSpec {
    input: PathBuf,
    name: String,
    track: usize,
    n_samples: usize,
    line: usize,
}

impl SampleSpec {
    pub(crate) fn new(input: PathBuf, name: String, line: usize) -> Self {
        Self {
            input,
            name,
            track: 0,
            n_samples: 0,
            line,
        }
    }

    pub(crate) fn set_ordinal(&mut self, track: usize, n_samples: usize) {
        self.track = track;
        self.n_samples = n_samples;
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn track(&self) -> usize {
        self.track
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// A sample missing its path or name cannot be dispatched.  This is not
    /// caught while reading the list; the dispatcher reports it as a per
    /// sample failure so the remaining samples still run.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.input.as_os_str().is_empty()
    }
}

/// Read the sample list for a multi sample run.
///
/// Matrix lists are white space delimited, reference lists tab delimited;
/// the first field is the input path and the second the sample name.
/// Blank lines are skipped; short lines are kept with empty fields so the
/// failure surfaces against the right sample.  Ordinals are assigned in
/// file order, starting from 1.
pub fn read_sample_list_from_file(fname: &Path, mode: InputMode) -> anyhow::Result<Vec<SampleSpec>> {
    debug!("Reading in sample list from {}", fname.display());

    let mut rdr = CompressIo::new()
        .path(fname)
        .bufreader()
        .map_err(|source| PipelineError::MissingFile {
            path: fname.to_owned(),
            source,
        })?;

    let tab_delim = matches!(mode, InputMode::ReferenceList);

    let mut buf = String::new();
    let mut line = 0;
    let mut sample_vec = Vec::new();

    while let Some(fields) = (if tab_delim {
        get_next_line(&mut rdr, &mut buf)
    } else {
        get_next_line_ws(&mut rdr, &mut buf)
    })
    .with_context(|| {
        format!(
            "Error after reading {} lines from {}",
            line,
            fname.display()
        )
    })? {
        line += 1;
        let input = fields.first().copied().unwrap_or("");
        let name = fields.get(1).copied().unwrap_or("");
        // Skip blank lines (tab splitting yields a single empty field)
        if fields.is_empty() || (fields.len() == 1 && input.is_empty()) {
            continue;
        }
        sample_vec.push(SampleSpec::new(PathBuf::from(input), name.to_owned(), line));
    }

    let n = sample_vec.len();
    for (i, s) in sample_vec.iter_mut().enumerate() {
        s.set_ordinal(i + 1, n);
    }

    debug!(
        "Finished reading in {} lines from {}; found {} samples",
        line,
        fname.display(),
        n
    );

    Ok(sample_vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn list(text: &str, mode: InputMode) -> Vec<SampleSpec> {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(text.as_bytes()).unwrap();
        read_sample_list_from_file(f.path(), mode).unwrap()
    }

    #[test]
    fn matrix_list_is_space_delimited_with_ordinals() {
        let v = list("m1.txt A\nm2.txt B\n", InputMode::MatrixList);
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].input(), Path::new("m1.txt"));
        assert_eq!(v[0].name(), "A");
        assert_eq!(v[0].track(), 1);
        assert_eq!(v[0].n_samples(), 2);
        assert_eq!(v[1].input(), Path::new("m2.txt"));
        assert_eq!(v[1].name(), "B");
        assert_eq!(v[1].track(), 2);
        assert_eq!(v[1].n_samples(), 2);
    }

    #[test]
    fn reference_list_is_tab_delimited() {
        let v = list("r1.bed\tT cells\nr2.bed\tB cells\n", InputMode::ReferenceList);
        assert_eq!(v.len(), 2);
        // tab splitting keeps spaces inside fields
        assert_eq!(v[0].name(), "T cells");
        assert_eq!(v[1].input(), Path::new("r2.bed"));
    }

    #[test]
    fn blank_lines_are_skipped_short_lines_kept() {
        let v = list("m1.txt A\n\nm2.txt\n", InputMode::MatrixList);
        assert_eq!(v.len(), 2);
        assert!(v[0].is_complete());
        assert!(!v[1].is_complete());
        assert_eq!(v[1].name(), "");
        assert_eq!(v[1].line(), 3);
        assert_eq!(v[1].track(), 2);
    }

    #[test]
    fn missing_list_file_is_an_error() {
        let e =
            read_sample_list_from_file(Path::new("/no/such/list.txt"), InputMode::MatrixList)
                .unwrap_err();
        assert!(matches!(
            e.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingFile { .. })
        ));
    }
}
