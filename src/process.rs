// SPDX-License-Identifier: MPL-2.0

//! Spawning, identifying and terminating the renderer process.
//!
//! Only the process id outlives a `start` invocation, so `stop` has to look
//! the process up again and check that it is still the renderer before
//! acting on it.

use std::{
    env,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tracing::{debug, info};

use crate::error::{Error, Result};

pub type Pid = u32;

/// A live process as seen at lookup time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: Pid,
    /// Executable name without directory or extension. Empty when the OS
    /// would not reveal it.
    pub name: String,
}

/// OS process operations used by the launcher and terminator.
pub trait ProcessController {
    /// Start `program` detached from this process and return its id.
    fn spawn(&self, program: &Path, args: &[OsString]) -> Result<Pid>;

    /// Look up a running process. `None` if it does not exist.
    fn find(&self, pid: Pid) -> Option<ProcessInfo>;

    /// Forcibly terminate a process.
    fn terminate(&self, pid: Pid) -> Result<()>;
}

/// The name a process running `program` reports, e.g. `mpv` for `C:\mpv\mpv.exe`.
#[must_use]
pub fn process_name(program: &Path) -> String {
    program
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Longest process name `/proc/<pid>/comm` reports.
pub const COMM_LEN: usize = 15;

/// Whether a process reporting `found` runs the renderer named `expected`.
///
/// Windows names are case-insensitive; Linux truncates names to [`COMM_LEN`].
#[must_use]
pub fn matches_renderer(found: &str, expected: &str) -> bool {
    names_match(
        found,
        expected,
        cfg!(windows),
        cfg!(target_os = "linux").then_some(COMM_LEN),
    )
}

fn names_match(
    found: &str,
    expected: &str,
    ignore_case: bool,
    truncated_to: Option<usize>,
) -> bool {
    if found.is_empty() {
        return false;
    }

    let same = |a: &[u8], b: &[u8]| {
        if ignore_case {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    };

    let (found, expected) = (found.as_bytes(), expected.as_bytes());
    match truncated_to {
        Some(limit) if expected.len() > limit && found.len() == limit => {
            same(found, &expected[..limit])
        }
        _ => same(found, expected),
    }
}

/// Locate `program` the way a shell would.
///
/// Names containing a directory are checked as given, bare names are
/// searched for on `PATH` (with `PATHEXT` suffixes on Windows).
#[must_use]
pub fn resolve_executable(program: &str) -> Option<PathBuf> {
    let extensions = executable_extensions(env::var_os("PATHEXT").as_deref());
    resolve_in(program, env::var_os("PATH").as_deref(), &extensions)
}

fn executable_extensions(pathext: Option<&OsStr>) -> Vec<String> {
    if !cfg!(windows) {
        return Vec::new();
    }

    pathext
        .and_then(OsStr::to_str)
        .unwrap_or(".COM;.EXE;.BAT;.CMD")
        .split(';')
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

fn resolve_in(program: &str, path_var: Option<&OsStr>, extensions: &[String]) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }

    let candidate = Path::new(program);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return with_extensions(candidate, extensions).find(|p| p.is_file());
    }

    env::split_paths(path_var?)
        .flat_map(|dir| with_extensions(&dir.join(candidate), extensions).collect::<Vec<_>>())
        .find(|p| p.is_file())
}

fn with_extensions<'a>(base: &'a Path, extensions: &'a [String]) -> impl Iterator<Item = PathBuf> + 'a {
    let bare = std::iter::once(base.to_path_buf());
    let suffixed = extensions
        .iter()
        .filter(move |_| base.extension().is_none())
        .map(move |ext| {
            let mut name = base.as_os_str().to_os_string();
            name.push(ext);
            PathBuf::from(name)
        });
    bare.chain(suffixed)
}

/// The real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl ProcessController for SystemProcesses {
    fn spawn(&self, program: &Path, args: &[OsString]) -> Result<Pid> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut command);

        let child = command.spawn().map_err(|source| Error::Spawn {
            program: program.to_path_buf(),
            source,
        })?;

        let pid = child.id();
        info!(pid, program = %program.display(), "spawned renderer");
        Ok(pid)
    }

    fn find(&self, pid: Pid) -> Option<ProcessInfo> {
        let found = os::find(pid);
        debug!(pid, ?found, "process lookup");
        found
    }

    fn terminate(&self, pid: Pid) -> Result<()> {
        os::terminate(pid)?;
        info!(pid, "terminated renderer");
        Ok(())
    }
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    use windows::Win32::System::Threading::{CREATE_NEW_PROCESS_GROUP, DETACHED_PROCESS};

    command.creation_flags((DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP).0);
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(any(windows, unix)))]
fn detach(_command: &mut Command) {}

#[cfg(windows)]
mod os {
    use std::path::Path;

    use windows::{
        Win32::{
            Foundation::{CloseHandle, ERROR_ACCESS_DENIED, HANDLE, STILL_ACTIVE},
            System::Threading::{
                GetExitCodeProcess, OpenProcess, PROCESS_ACCESS_RIGHTS, PROCESS_NAME_WIN32,
                PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_TERMINATE, QueryFullProcessImageNameW,
                TerminateProcess,
            },
        },
        core::PWSTR,
    };

    use super::{Pid, ProcessInfo, process_name};
    use crate::error::{Error, Result};

    struct OwnedHandle(HANDLE);

    impl Drop for OwnedHandle {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }

    fn open(pid: Pid, access: PROCESS_ACCESS_RIGHTS) -> windows::core::Result<OwnedHandle> {
        unsafe { OpenProcess(access, false, pid) }.map(OwnedHandle)
    }

    pub(super) fn find(pid: Pid) -> Option<ProcessInfo> {
        let handle = match open(pid, PROCESS_QUERY_LIMITED_INFORMATION) {
            Ok(handle) => handle,
            // exists, but belongs to someone we may not inspect
            Err(why) if why.code() == ERROR_ACCESS_DENIED.to_hresult() => {
                return Some(ProcessInfo {
                    pid,
                    name: String::new(),
                });
            }
            Err(_) => return None,
        };

        let mut exit_code = 0u32;
        if unsafe { GetExitCodeProcess(handle.0, &mut exit_code) }.is_ok()
            && exit_code != STILL_ACTIVE.0 as u32
        {
            return None;
        }

        let mut buffer = [0u16; 1024];
        let mut len = buffer.len() as u32;
        let name = match unsafe {
            QueryFullProcessImageNameW(
                handle.0,
                PROCESS_NAME_WIN32,
                PWSTR(buffer.as_mut_ptr()),
                &mut len,
            )
        } {
            Ok(()) => process_name(Path::new(&String::from_utf16_lossy(
                &buffer[..len as usize],
            ))),
            Err(_) => String::new(),
        };

        Some(ProcessInfo { pid, name })
    }

    pub(super) fn terminate(pid: Pid) -> Result<()> {
        let handle = open(pid, PROCESS_TERMINATE)
            .map_err(|why| Error::Platform(format!("cannot open process {pid}: {why}")))?;
        unsafe { TerminateProcess(handle.0, 1) }
            .map_err(|why| Error::Platform(format!("cannot terminate process {pid}: {why}")))
    }
}

#[cfg(unix)]
mod os {
    use std::fs;

    use nix::{
        errno::Errno,
        sys::signal::{Signal, kill},
        unistd::Pid as NixPid,
    };

    use super::{Pid, ProcessInfo};
    use crate::error::{Error, Result};

    fn nix_pid(pid: Pid) -> Option<NixPid> {
        // 0 and negative values address process groups, never a single process
        i32::try_from(pid).ok().filter(|raw| *raw > 0).map(NixPid::from_raw)
    }

    /// `/proc/<pid>/stat` state, `Z` for a zombie.
    fn state(pid: Pid) -> Option<char> {
        let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        stat.rsplit_once(')')?.1.trim_start().chars().next()
    }

    pub(super) fn find(pid: Pid) -> Option<ProcessInfo> {
        let target = nix_pid(pid)?;
        match kill(target, None) {
            Ok(()) | Err(Errno::EPERM) => {}
            Err(_) => return None,
        }

        if state(pid) == Some('Z') {
            return None;
        }

        let name = fs::read_to_string(format!("/proc/{pid}/comm"))
            .map(|comm| comm.trim_end().to_string())
            .unwrap_or_default();

        Some(ProcessInfo { pid, name })
    }

    pub(super) fn terminate(pid: Pid) -> Result<()> {
        let target = nix_pid(pid)
            .ok_or_else(|| Error::Platform(format!("{pid} is not a valid process id")))?;
        kill(target, Signal::SIGKILL)
            .map_err(|why| Error::Platform(format!("cannot terminate process {pid}: {why}")))
    }
}

#[cfg(not(any(windows, unix)))]
mod os {
    use super::{Pid, ProcessInfo};
    use crate::error::{Error, Result};

    pub(super) fn find(_pid: Pid) -> Option<ProcessInfo> {
        None
    }

    pub(super) fn terminate(pid: Pid) -> Result<()> {
        Err(Error::Platform(format!(
            "cannot terminate process {pid} on this platform"
        )))
    }
}
