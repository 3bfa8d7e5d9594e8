//! Landlock confinement and `setrlimit` ceilings applied inside a
//! `pre_exec` hook. Split into two phases because `pre_exec` runs between
//! `fork()` and `exec()`, where only async-signal-safe operations are
//! permitted: phase one (this module's `prepare_*`) runs in the parent and
//! may allocate and touch the filesystem; phase two (`enforce_*`/`apply_*`)
//! runs in the child and only invokes raw syscalls against state prepared
//! in phase one.

#![allow(unsafe_code)]

use crate::profile::{LandlockPathRule, ResourceLimits};

pub(crate) struct PreparedLandlockRules {
    rules: Vec<(landlock::PathFd, bool, bool)>,
}

/// Phase 1 (parent process): open file descriptors for every rule path.
/// Paths that don't exist are silently skipped rather than failing the
/// whole ruleset — a missing `extra_read_paths` entry shouldn't block
/// execution.
pub(crate) fn prepare_landlock_rules(rules: &[LandlockPathRule]) -> PreparedLandlockRules {
    use landlock::PathFd;

    let mut prepared = Vec::with_capacity(rules.len());
    for rule in rules {
        if !rule.read && !rule.write {
            continue;
        }
        if let Ok(fd) = PathFd::new(&rule.path) {
            prepared.push((fd, rule.read, rule.write));
        }
    }
    PreparedLandlockRules { rules: prepared }
}

/// Phase 2 (child process, inside `pre_exec`): build the ruleset and
/// restrict_self. A kernel without Landlock support degrades to
/// `NotEnforced`, which is not treated as fatal — the other sandbox layers
/// (resource limits, network marker) still apply.
pub(crate) fn enforce_landlock_rules(prepared: PreparedLandlockRules) -> Result<(), String> {
    use landlock::{
        ABI, Access, AccessFs, CompatLevel, Compatible, PathBeneath, Ruleset, RulesetAttr, RulesetCreatedAttr,
        RulesetStatus,
    };

    let abi = ABI::V5;
    let mut ruleset = Ruleset::default()
        .set_compatibility(CompatLevel::BestEffort)
        .handle_access(AccessFs::from_all(abi))
        .map_err(|e| format!("failed to create landlock ruleset: {e}"))?
        .create()
        .map_err(|e| format!("failed to create landlock ruleset: {e}"))?;

    for (fd, read, write) in prepared.rules {
        let access = match (read, write) {
            (true, true) => AccessFs::from_all(abi),
            (true, false) => AccessFs::from_read(abi),
            (false, true) => AccessFs::from_write(abi),
            (false, false) => continue,
        };
        let path_beneath = PathBeneath::new(fd, access);
        ruleset = ruleset
            .add_rule(path_beneath)
            .map_err(|e| format!("failed to add landlock rule: {e}"))?;
    }

    let status = ruleset
        .restrict_self()
        .map_err(|e| format!("failed to enforce landlock ruleset: {e}"))?;

    match status.ruleset {
        RulesetStatus::FullyEnforced | RulesetStatus::PartiallyEnforced | RulesetStatus::NotEnforced => {},
    }

    Ok(())
}

/// `setrlimit` ceilings plus a `setpriority` nice adjustment, all
/// async-signal-safe (no heap allocation, `last_os_error` only reads
/// `errno`).
pub(crate) fn apply_resource_limits(limits: &ResourceLimits) -> Result<(), std::io::Error> {
    let nproc = libc::rlimit {
        rlim_cur: limits.max_processes,
        rlim_max: limits.max_processes,
    };
    if unsafe { libc::setrlimit(libc::RLIMIT_NPROC, &raw const nproc) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let address_space = libc::rlimit {
        rlim_cur: limits.max_memory_bytes,
        rlim_max: limits.max_memory_bytes,
    };
    if unsafe { libc::setrlimit(libc::RLIMIT_AS, &raw const address_space) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let nofile = libc::rlimit {
        rlim_cur: limits.max_open_files,
        rlim_max: limits.max_open_files,
    };
    if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &raw const nofile) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let fsize = libc::rlimit {
        rlim_cur: limits.max_file_size,
        rlim_max: limits.max_file_size,
    };
    if unsafe { libc::setrlimit(libc::RLIMIT_FSIZE, &raw const fsize) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    if unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, limits.nice) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(())
}
