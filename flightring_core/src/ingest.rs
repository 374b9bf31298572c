//! Turns one finished simulator session into a stored, normalized trial.
//!
//! ```text
//! <session_root>/config.json, airplane1.json, airplane2.json
//!        │ load + remap + combine (nothing written yet)
//!        ▼
//! <trials_root>/.staging/<name>/
//!        session files (copied), then fresh arrays on top:
//!        all_states.npy, all_actions.npy,
//!        airplane1-states.npy, airplane1-actions.npy, ...
//!        │ commit: rename into the next slot, then bump trials.json
//!        ▼
//! <trials_root>/<name>/<name>-<k>/
//! ```
//!
//! The session files are removed only once the trial is committed. Any
//! earlier failure discards the staging directory and leaves both the
//! session and the trial index untouched.

use crate::config::{is_plain_name, DomainConfig, PipelineConfig, SourceDomain};
use crate::error::{FlightError, Result};
use crate::trajectory::{combine_agents, Trajectory, TrajectoryArrays};
use flightring_env::log::load_agent_log;
use flightring_env::{
    npy, EnvError, FsTrialStore, TrialArrays, TrialId, ACTIONS_FILE, STATES_FILE,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Simulator config file inside the session directory.
pub const SIM_CONFIG_FILE: &str = "config.json";

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub trial: TrialId,
    pub dir: PathBuf,
    pub steps: usize,
    pub moved_files: Vec<String>,
}

/// Loads and remaps every agent of a session without touching disk.
pub fn load_session(
    session: &Path,
    agents: &[String],
    domain_config: &DomainConfig,
) -> Result<(Vec<TrajectoryArrays>, TrialArrays)> {
    let mut trajectories = Vec::with_capacity(agents.len());

    for agent in agents {
        let path = session.join(format!("{}.json", agent));
        let log = load_agent_log(&path)?;
        let mapped = Trajectory::from_log(agent.as_str(), &log)?.remap(domain_config)?;
        debug!("{}: {} steps remapped", agent, mapped.len());
        trajectories.push(mapped.into_arrays());
    }

    let combined = combine_agents(&trajectories)?;
    Ok((trajectories, combined))
}

/// Ingests the session in `config.session_root` as the next trial of
/// `participant`.
///
/// Either the trial is committed and the session emptied, or nothing
/// changes: no trial number is consumed and the session files stay put.
pub fn ingest_session(config: &PipelineConfig, participant: &str) -> Result<IngestReport> {
    config.validate()?;
    // hidden directories under the trial root are not enumerated as participants
    if !is_plain_name(participant) || participant.starts_with('.') {
        return Err(FlightError::input(format!(
            "participant name '{}' cannot be used as a directory name",
            participant
        )));
    }
    let session = config.session_root.as_path();

    if is_empty_dir(session)? {
        return Err(FlightError::input(format!(
            "session directory {} is empty; run a simulation before ingesting",
            session.display()
        )));
    }

    let source = SourceDomain::load(&session.join(SIM_CONFIG_FILE))?;
    let domain_config = DomainConfig::new(source, config.destination.clone())?;
    let (trajectories, combined) = load_session(session, &config.agents, &domain_config)?;

    let mut store = FsTrialStore::new(&config.trials_root);
    let staging = store.staging_dir(participant);

    let committed = stage_trial(session, &staging, &trajectories, &combined).and_then(|files| {
        let trial = store.commit_trial(participant, &staging)?;
        Ok((trial, files))
    });
    let (trial, moved_files) = match committed {
        Ok(done) => done,
        Err(e) => {
            discard_staging(&staging);
            return Err(e);
        }
    };

    remove_session_files(session, &moved_files);
    let dir = store.trial_dir(&trial);

    info!(
        "Ingested {} steps as {} ({} session files moved)",
        combined.steps(),
        trial,
        moved_files.len()
    );

    Ok(IngestReport {
        trial,
        dir,
        steps: combined.steps(),
        moved_files,
    })
}

/// Fills a fresh staging directory: session files first, then the arrays
/// computed from them, so stale arrays left in the session are overwritten.
fn stage_trial(
    session: &Path,
    staging: &Path,
    trajectories: &[TrajectoryArrays],
    combined: &TrialArrays,
) -> Result<Vec<String>> {
    if staging.exists() {
        warn!("Discarding leftover staging directory {}", staging.display());
        fs::remove_dir_all(staging).map_err(|e| EnvError::io(staging, e))?;
    }
    fs::create_dir_all(staging).map_err(|e| EnvError::io(staging, e))?;

    let files = copy_session_files(session, staging)?;

    npy::write(&staging.join(STATES_FILE), &combined.states)?;
    npy::write(&staging.join(ACTIONS_FILE), &combined.actions)?;
    for arrays in trajectories {
        arrays.persist(staging)?;
    }

    Ok(files)
}

fn discard_staging(staging: &Path) {
    if staging.exists() {
        if let Err(e) = fs::remove_dir_all(staging) {
            warn!("Could not remove staging directory {}: {}", staging.display(), e);
        }
    }
}

fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(dir).map_err(|e| EnvError::io(dir, e))?;
    Ok(entries.next().is_none())
}

/// Copies every regular file from `from` into `to`, returning the names
/// copied, sorted. Subdirectories are left in place.
fn copy_session_files(from: &Path, to: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(from).map_err(|e| EnvError::io(from, e))? {
        let entry = entry.map_err(|e| EnvError::io(from, e))?;
        let src = entry.path();
        if !src.is_file() {
            warn!("Leaving {} in the session directory", src.display());
            continue;
        }

        fs::copy(&src, to.join(entry.file_name())).map_err(|e| EnvError::io(&src, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }

    names.sort();
    Ok(names)
}

/// Removes the session copies of files that are now stored in the trial.
fn remove_session_files(session: &Path, names: &[String]) {
    for name in names {
        let path = session.join(name);
        if let Err(e) = fs::remove_file(&path) {
            warn!("Trial stored, but could not remove {}: {}", path.display(), e);
        }
    }
}
