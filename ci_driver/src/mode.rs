use crate::{error::PipelineError, options::Options};

/// InputMode
///
/// Which of the three input layouts the configuration selects.  Resolved
/// exactly once after loading; every later decision (list file parsing,
/// per sample flags) derives from this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    MatrixList,
    ReferenceList,
    SingleSample,
}

impl InputMode {
    /// Select the input mode from the configuration.
    ///
    /// anchor and outDirectory are required whatever the mode.  A multi
    /// sample list key takes priority over the single sample keys, with
    /// matrices ranked above references, so a config author can leave the
    /// single sample keys blank without conflict.  db is only required
    /// when the signal matrices still have to be computed (references or
    /// reference input).
    pub fn resolve(opts: &Options) -> Result<Self, PipelineError> {
        if opts.get("anchor").is_empty() || opts.get("outDirectory").is_empty() {
            return Err(PipelineError::MissingAnchorOrOutDir);
        }

        if !opts.get("matrices").is_empty() {
            Ok(Self::MatrixList)
        } else if !opts.get("references").is_empty() {
            if opts.get("db").is_empty() {
                Err(PipelineError::MissingDb)
            } else {
                Ok(Self::ReferenceList)
            }
        } else if !opts.get("matrix").is_empty()
            || (!opts.get("reference").is_empty() && !opts.get("db").is_empty())
        {
            Ok(Self::SingleSample)
        } else {
            Err(PipelineError::MissingReferenceOrDb)
        }
    }

    /// Config key holding the sample list file path (multi sample modes)
    pub fn list_key(&self) -> Option<&'static str> {
        match self {
            Self::MatrixList => Some("matrices"),
            Self::ReferenceList => Some("references"),
            Self::SingleSample => None,
        }
    }

    /// Flag used to pass a sample's input file to the analysis command
    pub fn input_flag(&self) -> Option<&'static str> {
        match self {
            Self::MatrixList => Some("-matrix"),
            Self::ReferenceList => Some("-ref"),
            Self::SingleSample => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> Options {
        let mut o = Options::new();
        for (k, v) in pairs {
            o.set(k, v.to_string());
        }
        o
    }

    #[test]
    fn anchor_and_out_directory_always_required() {
        for missing in ["anchor", "outDirectory"] {
            let mut pairs = vec![
                ("anchor", "a.bed"),
                ("outDirectory", "/out"),
                ("matrices", "list.txt"),
            ];
            pairs.retain(|(k, _)| *k != missing);
            assert!(matches!(
                InputMode::resolve(&opts(&pairs)),
                Err(PipelineError::MissingAnchorOrOutDir)
            ));
        }
    }

    #[test]
    fn matrices_takes_priority_over_references() {
        let o = opts(&[
            ("anchor", "a.bed"),
            ("outDirectory", "/out"),
            ("matrices", "m_list.txt"),
            ("references", "r_list.txt"),
        ]);
        assert_eq!(InputMode::resolve(&o).unwrap(), InputMode::MatrixList);
    }

    #[test]
    fn matrix_list_does_not_need_db() {
        let o = opts(&[
            ("anchor", "a.bed"),
            ("outDirectory", "/out"),
            ("matrices", "m_list.txt"),
        ]);
        assert_eq!(InputMode::resolve(&o).unwrap(), InputMode::MatrixList);
    }

    #[test]
    fn reference_list_requires_db() {
        let base = [
            ("anchor", "a.bed"),
            ("outDirectory", "/out"),
            ("references", "r_list.txt"),
        ];
        assert!(matches!(
            InputMode::resolve(&opts(&base)),
            Err(PipelineError::MissingDb)
        ));

        let mut with_db = base.to_vec();
        with_db.push(("db", "db.txt"));
        assert_eq!(
            InputMode::resolve(&opts(&with_db)).unwrap(),
            InputMode::ReferenceList
        );
    }

    #[test]
    fn single_sample_needs_matrix_or_reference_with_db() {
        let base = [("anchor", "a.bed"), ("outDirectory", "/out")];
        assert!(matches!(
            InputMode::resolve(&opts(&base)),
            Err(PipelineError::MissingReferenceOrDb)
        ));

        let mut with_matrix = base.to_vec();
        with_matrix.push(("matrix", "m.txt"));
        assert_eq!(
            InputMode::resolve(&opts(&with_matrix)).unwrap(),
            InputMode::SingleSample
        );

        // reference alone is not enough
        let mut with_ref = base.to_vec();
        with_ref.push(("reference", "ref.bed"));
        assert!(matches!(
            InputMode::resolve(&opts(&with_ref)),
            Err(PipelineError::MissingReferenceOrDb)
        ));

        with_ref.push(("db", "db.txt"));
        assert_eq!(
            InputMode::resolve(&opts(&with_ref)).unwrap(),
            InputMode::SingleSample
        );
    }
}
