use linescope_core::{copy_link, edit_lines, fingerprint_of, Fingerprint, Tweak};
use tracing::{debug, info};

use crate::config::Job;
use crate::files::{read_lines, write_lines};
use crate::stamp::{CacheKey, Stamp};
use crate::{Error, Script};

/// What running a job did to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Edited,
    /// The stamp matched the current content; nothing was written.
    UpToDate,
}

/// The tweaks of a job: the standard transform when enabled, then the script.
pub fn tweaks(use_copy_link: bool, script: &Script) -> Vec<&dyn Tweak> {
    let mut tweaks: Vec<&dyn Tweak> = Vec::with_capacity(2);
    if use_copy_link {
        tweaks.push(&copy_link);
    }
    tweaks.push(script);
    tweaks
}

/// Cache key of `lines` once edited by a script with `fingerprint`.
pub fn cache_key(fingerprint: &Fingerprint, use_copy_link: bool, lines: &[String]) -> String {
    CacheKey::new()
        .fingerprint(fingerprint)
        .flag("copy_link", use_copy_link)
        .lines(lines)
        .finish()
}

/// Edit the job's file, unless its stamp shows the current content is already
/// the result of the same edits. `force` ignores the stamp.
pub fn run_job(job: &Job, force: bool) -> Result<Outcome, Error> {
    let script = Script::load(&job.script)?;
    let fingerprint = fingerprint_of(&[&script])?;
    let mut lines = read_lines(&job.file)?;
    let stamp = job.stamp.as_ref().map(Stamp::new);

    if let Some(stamp) = &stamp {
        let key = cache_key(&fingerprint, job.copy_link, &lines);
        if !force && stamp.matches(&key)? {
            info!(file = %job.file.display(), "up to date");
            return Ok(Outcome::UpToDate);
        }
        debug!(stamp = %stamp.path().display(), "stamp out of date");
    }

    edit_lines(&mut lines, &tweaks(job.copy_link, &script))?;
    write_lines(&job.file, &lines)?;
    info!(file = %job.file.display(), script = %job.script.display(), "edited");

    if let Some(stamp) = &stamp {
        stamp.write(&cache_key(&fingerprint, job.copy_link, &lines))?;
    }
    Ok(Outcome::Edited)
}

/// Run every job in order, stopping at the first failure.
pub fn run_jobs(jobs: &[Job], force: bool) -> Result<Vec<Outcome>, Error> {
    jobs.iter().map(|job| run_job(job, force)).collect()
}
