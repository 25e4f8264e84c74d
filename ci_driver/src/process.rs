use std::{
    fs,
    process::{Command, ExitStatus},
    thread,
};

use anyhow::Context;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::{config::Config, error::PipelineError, mode::InputMode, sample::SampleSpec};

/// Invocation
///
/// Argument set for one external operation (a single sample analysis or
/// the track merge).  Kept separate from [Command] so the derived
/// arguments can be inspected and tested without spawning anything.
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    fn new(program: &str) -> Self {
        Self {
            program: program.to_owned(),
            args: Vec::new(),
        }
    }

    fn arg<S: Into<String>>(mut self, a: S) -> Self {
        self.args.push(a.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Build the [Command].  If the configuration carries module load
    /// directives the command is wrapped in a shell that applies them
    /// first; program and arguments are handed over as positional
    /// parameters so they need no quoting.
    fn command(&self, modules: &[String]) -> Command {
        if modules.is_empty() {
            let mut c = Command::new(&self.program);
            c.args(&self.args);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c")
                .arg(format!("{}; exec \"$0\" \"$@\"", modules.join("; ")))
                .arg(&self.program)
                .args(&self.args);
            c
        }
    }
}

/// Arguments for one sample unit in a multi sample run.  The track and
/// numSamples arguments stop the analysis runs from overwriting each
/// other's track slots.
pub fn sample_invocation(cfg: &Config, s: &SampleSpec) -> Invocation {
    let flag = cfg
        .mode()
        .input_flag()
        .expect("No input flag in single sample mode");
    Invocation::new(cfg.analysis_cmd())
        .arg(cfg.config_path().display().to_string())
        .arg(flag)
        .arg(s.input().display().to_string())
        .arg("-out")
        .arg(cfg.sample_out_dir(s.name()).display().to_string())
        .arg("-sample")
        .arg(s.name())
        .arg("-track")
        .arg(s.track().to_string())
        .arg("-numSamples")
        .arg(s.n_samples().to_string())
}

/// A single sample run gets the configuration file only; the analysis
/// command reads the single sample keys itself and writes directly into
/// outDirectory.
pub fn single_invocation(cfg: &Config) -> Invocation {
    Invocation::new(cfg.analysis_cmd()).arg(cfg.config_path().display().to_string())
}

/// Arguments for the track merge
pub fn merge_invocation(cfg: &Config) -> Invocation {
    Invocation::new(cfg.merge_cmd())
        .arg(cfg.anchors_path().display().to_string())
        .arg(cfg.out_dir().display().to_string())
        .arg(cfg.list_or_config_path().display().to_string())
        .arg(cfg.assembly())
}

/// Run the pipeline: launch one analysis unit per sample, wait for all of
/// them to finish, then merge tracks if requested.  Track merging reads
/// the shared anchors file and the per sample output directories, so it
/// must not start before the join.
pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let failures = match cfg.mode() {
        InputMode::SingleSample => run_single(cfg)?,
        InputMode::MatrixList | InputMode::ReferenceList => dispatch_samples(cfg)?,
    };

    if failures > 0 {
        warn!(
            "{} sample unit(s) failed; their output will be missing or incomplete",
            failures
        );
    }

    if cfg.merge_requested() {
        merge_tracks(cfg)
    } else {
        debug!("Track merging not requested");
        Ok(())
    }
}

fn launch(inv: &Invocation, modules: &[String]) -> anyhow::Result<ExitStatus> {
    let mut child = inv
        .command(modules)
        .spawn()
        .with_context(|| format!("Could not spawn {}", inv.program()))?;
    child
        .wait()
        .with_context(|| format!("Error waiting for {}", inv.program()))
}

fn run_single(cfg: &Config) -> anyhow::Result<usize> {
    let od = cfg.out_dir();
    fs::create_dir_all(&od)
        .with_context(|| format!("Could not create output directory {}", od.display()))?;

    let inv = single_invocation(cfg);
    info!("Launching single sample analysis ({})", inv.program());

    // A failed analysis is local to the sample, even when there is only
    // one; merging still runs best effort over whatever output exists
    Ok(match launch(&inv, cfg.module_directives()) {
        Ok(st) if st.success() => 0,
        Ok(st) => {
            warn!("Analysis command {} exited with {}", inv.program(), st);
            1
        }
        Err(e) => {
            warn!("{:#}", e);
            1
        }
    })
}

/// Launch task: pulls samples from the job channel, spawns the analysis
/// child and waits on it, reporting the outcome per sample
fn launch_task<'a>(
    cfg: &Config,
    ix: usize,
    jobs: Receiver<&'a SampleSpec>,
    results: Sender<(&'a str, anyhow::Result<ExitStatus>)>,
) {
    debug!("Launch task {} starting up", ix);
    for s in jobs.iter() {
        let inv = sample_invocation(cfg, s);
        info!(
            "Sample {} ({}/{}): launching {} {}",
            s.name(),
            s.track(),
            s.n_samples(),
            inv.program(),
            inv.args().join(" ")
        );
        let res = launch(&inv, cfg.module_directives());
        if results.send((s.name(), res)).is_err() {
            break;
        }
    }
    debug!("Launch task {} closing down", ix);
}

/// Dispatch one independent analysis unit per sample.
///
/// Launches are issued through a pool of tasks so issuing one never waits
/// on a different sample's completion; the pool width caps how many child
/// processes run at once on the local machine.  The function returns only
/// once every launched unit has finished (the results channel closes when
/// the last task exits), which is the synchronization point the track
/// merge relies on.  Returns the number of failed samples.
fn dispatch_samples(cfg: &Config) -> anyhow::Result<usize> {
    let samples = cfg.sample_list();
    let nt = cfg.threads().min(samples.len()).max(1);
    debug!(
        "Dispatching {} sample unit(s) across {} launch task(s)",
        samples.len(),
        nt
    );

    let mut failures = 0;
    thread::scope(|sc| {
        // Channel used to hand samples to the launch tasks
        let (snd, rcv) = bounded(nt);
        // Channel by which the tasks report each sample's outcome
        let (res_snd, res_rcv) = bounded(samples.len().max(1));

        for ix in 0..nt {
            let r = rcv.clone();
            let s = res_snd.clone();
            sc.spawn(move || launch_task(cfg, ix + 1, r, s));
        }
        drop(rcv);
        drop(res_snd);

        for s in samples.iter() {
            if !s.is_complete() {
                // Deferred failure from the list builder: report against
                // this sample and keep going
                warn!(
                    "{}",
                    PipelineError::MalformedListEntry {
                        file: cfg.list_or_config_path().to_owned(),
                        line: s.line(),
                    }
                );
                failures += 1;
                continue;
            }
            let od = cfg.sample_out_dir(s.name());
            if let Err(e) = fs::create_dir_all(&od) {
                warn!(
                    "Sample {}: could not create output directory {}: {}",
                    s.name(),
                    od.display(),
                    e
                );
                failures += 1;
                continue;
            }
            snd.send(s).expect("Launch tasks hung up early");
        }
        drop(snd);

        // Wait for all launched units before returning
        for (name, res) in res_rcv.iter() {
            match res {
                Ok(st) if st.success() => debug!("Sample {} completed", name),
                Ok(st) => {
                    warn!("Sample {} failed ({})", name, st);
                    failures += 1
                }
                Err(e) => {
                    warn!("Sample {}: {:#}", name, e);
                    failures += 1
                }
            }
        }
    });

    Ok(failures)
}

/// Merge the per sample tracks.  Unlike sample failures this is fatal:
/// without it the run's combined artifact is missing.
fn merge_tracks(cfg: &Config) -> anyhow::Result<()> {
    let inv = merge_invocation(cfg);
    info!("Merging tracks: {} {}", inv.program(), inv.args().join(" "));
    let st = launch(&inv, cfg.module_directives())?;
    if st.success() {
        Ok(())
    } else {
        Err(anyhow!(
            "Track merging command {} exited with {}",
            inv.program(),
            st
        ))
    }
}
