use std::{num::NonZeroUsize, path::PathBuf};

use clap::{
    crate_description, crate_name, crate_version, value_parser, Arg, ArgAction, Command,
};

use anyhow::Context;

use utils::{init_log, LogLevel};

use crate::{
    config::Config, mode::InputMode, options::load_config_file, sample::read_sample_list_from_file,
};

/// Configuration file keys, printed as part of the help text
const CONFIG_KEY_HELP: &str = "\
Configuration file keys:
  reference, db, anchor, outDirectory, matrix, references, matrices,
  tracks (default \"n\"), assembly (default \"hg19\"), window,
  correlationThreshold, pValueThreshold, qValueThreshold,
  correlationMethod, figures, figureWidth, zoom, colours

Lines of the form key=value set a key.  ${VAR} and $VAR in values are
expanded from earlier keys or the environment.  Lines containing
\"module load\" are applied to the environment of the launched analysis
commands rather than stored.";

/// Set up definition of command options for clap
fn cli_model() -> Command {
    Command::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .after_help(CONFIG_KEY_HELP)
        .arg(
            Arg::new("timestamp")
                .short('X')
                .long("timestamp")
                .value_parser(value_parser!(stderrlog::Timestamp))
                .value_name("GRANULARITY")
                .default_value("none")
                .help("Prepend log entries with a timestamp"),
        )
        .arg(
            Arg::new("loglevel")
                .short('l')
                .long("loglevel")
                .value_name("LOGLEVEL")
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .default_value("warn")
                .help("Set log level"),
        )
        .arg(
            Arg::new("quiet")
                .action(ArgAction::SetTrue)
                .long("quiet")
                .conflicts_with("loglevel")
                .help("Silence all output"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_parser(value_parser!(NonZeroUsize))
                .value_name("INT")
                .help("Set maximum number of concurrent sample launches [default: available cores]"),
        )
        .arg(
            Arg::new("analysis_cmd")
                .short('a')
                .long("analysis-cmd")
                .value_parser(value_parser!(String))
                .value_name("COMMAND")
                .default_value("ci_sample")
                .help("External single sample analysis command"),
        )
        .arg(
            Arg::new("merge_cmd")
                .short('m')
                .long("merge-cmd")
                .value_parser(value_parser!(String))
                .value_name("COMMAND")
                .default_value("ci_merge_tracks")
                .help("External track merging command"),
        )
        .arg(
            Arg::new("config_file")
                .value_parser(value_parser!(PathBuf))
                .value_name("CONFIG_FILE")
                .required(true)
                .help("Pipeline configuration file"),
        )
}

/// Handle command line options.  Set up Config structure
pub fn handle_cli() -> anyhow::Result<Config> {
    // Get matches from command line
    let m = cli_model().get_matches();

    // Setup logging
    init_log(&m);

    debug!("Processing command line options");

    let config_path = m
        .get_one::<PathBuf>("config_file")
        .expect("Missing config file")
        .clone();

    let (options, module_directives) = load_config_file(&config_path)?;

    let mode = InputMode::resolve(&options)?;
    debug!("Input mode resolved as {:?}", mode);

    // Read in sample list for the multi sample modes
    let (list_path, sample_list) = match mode.list_key() {
        Some(key) => {
            let p = PathBuf::from(options.get(key));
            let v = read_sample_list_from_file(&p, mode)
                .with_context(|| "Could not read sample list file")?;
            (Some(p), v)
        }
        None => (None, Vec::new()),
    };

    let nt = m
        .get_one::<NonZeroUsize>("threads")
        .map(|x| usize::from(*x))
        .unwrap_or_else(num_cpus::get);

    let mut cfg = Config::new(
        options,
        mode,
        sample_list,
        config_path,
        list_path,
        module_directives,
    );

    cfg.set_analysis_cmd(
        m.get_one::<String>("analysis_cmd")
            .expect("Missing default analysis command")
            .clone(),
    );
    cfg.set_merge_cmd(
        m.get_one::<String>("merge_cmd")
            .expect("Missing default merge command")
            .clone(),
    );
    cfg.set_threads(nt);

    Ok(cfg)
}
