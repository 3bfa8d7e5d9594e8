//! Attaches the Linux `pre_exec` hook to a freshly built `Command`. Kept
//! separate from `profile.rs` because `wrap_command` only rewrites
//! program/args, while this needs to mutate the `Command` itself with a
//! closure that runs in the forked child.

use crate::profile::SandboxProfile;

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
pub(crate) fn register_pre_exec(cmd: &mut tokio::process::Command, profile: &SandboxProfile) {
    let prepared = crate::linux::prepare_landlock_rules(&profile.landlock_rules());
    let mut prepared = Some(prepared);
    let limits = profile.resource_limits.clone();

    // SAFETY: `pre_exec` runs between `fork()` and `exec()`, where only
    // async-signal-safe operations are allowed. The closure invokes only
    // Landlock syscalls against pre-opened file descriptors and `setrlimit`/
    // `setpriority` against plain integers; all of it is async-signal-safe.
    // `last_os_error()` reads `errno` without allocating. The `ok_or_else`
    // error path may allocate, which is acceptable since it only runs on a
    // fatal path that aborts the exec anyway.
    unsafe {
        cmd.pre_exec(move || {
            let rules = prepared
                .take()
                .ok_or_else(|| std::io::Error::other("sandbox pre_exec hook ran more than once"))?;
            crate::linux::enforce_landlock_rules(rules)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::PermissionDenied, e))?;
            crate::linux::apply_resource_limits(&limits)?;
            Ok(())
        });
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn register_pre_exec(_cmd: &mut tokio::process::Command, _profile: &SandboxProfile) {}
