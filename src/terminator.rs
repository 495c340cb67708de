// SPDX-License-Identifier: MPL-2.0

//! Stopping the recorded renderer, and reporting on it.
//!
//! The record only holds a process id, which the OS may since have handed to
//! an unrelated process. Nothing is terminated unless the process behind the
//! id still carries the renderer's name.

use std::path::Path;

use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    process::{
        Pid, ProcessController, ProcessInfo, matches_renderer, process_name, resolve_executable,
    },
    record::RecordStore,
};

/// How a `stop` ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The renderer was terminated and the record removed.
    Stopped(Pid),
    /// The recorded process was already gone; the record was removed.
    AlreadyExited(Pid),
    /// No record, no session.
    NothingToDo,
}

/// What the record says about the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Inactive,
    Active(ProcessInfo),
    /// A record exists but its process is gone, or is something else.
    Stale { pid: Pid, found: Option<String> },
}

/// The name the renderer's process reports, taken from the executable the
/// configured program resolves to, or from the program itself when it does
/// not resolve.
#[must_use]
pub fn renderer_name(renderer: &str) -> String {
    resolve_executable(renderer)
        .map(|program| process_name(&program))
        .unwrap_or_else(|| process_name(Path::new(renderer)))
}

/// The `stop` command.
///
/// A malformed record and a process that is not the renderer are both
/// errors that leave the record in place for the user to inspect.
pub fn stop(
    renderer: &str,
    processes: &impl ProcessController,
    records: &impl RecordStore,
) -> Result<StopOutcome> {
    let Some(pid) = records.read()? else {
        info!("no wallpaper session is recorded");
        return Ok(StopOutcome::NothingToDo);
    };

    let Some(process) = processes.find(pid) else {
        warn!(pid, "recorded renderer is not running, removing the stale record");
        records.clear()?;
        return Ok(StopOutcome::AlreadyExited(pid));
    };

    let expected = renderer_name(renderer);
    if !matches_renderer(&process.name, &expected) {
        return Err(Error::IdentityMismatch {
            pid,
            expected,
            found: process.name,
        });
    }

    if let Err(why) = processes.terminate(pid) {
        // it may have exited between the lookup and the termination
        if processes.find(pid).is_some() {
            return Err(why);
        }
        warn!(pid, "renderer exited before it could be terminated");
        records.clear()?;
        return Ok(StopOutcome::AlreadyExited(pid));
    }

    records.clear()?;
    info!(pid, "wallpaper stopped");
    Ok(StopOutcome::Stopped(pid))
}

/// The `status` command. Never modifies the record.
pub fn status(
    renderer: &str,
    processes: &impl ProcessController,
    records: &impl RecordStore,
) -> Result<SessionStatus> {
    let Some(pid) = records.read()? else {
        return Ok(SessionStatus::Inactive);
    };

    Ok(match processes.find(pid) {
        Some(process) if matches_renderer(&process.name, &renderer_name(renderer)) => {
            SessionStatus::Active(process)
        }
        Some(process) => SessionStatus::Stale {
            pid,
            found: Some(process.name),
        },
        None => SessionStatus::Stale { pid, found: None },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        launcher::{RendererCommand, launch},
        desktop::DesktopHandle,
        process::tests_support::FakeProcesses,
        record::MemoryRecordStore,
    };

    #[test]
    fn renderer_name_from_program() {
        assert_eq!(renderer_name("mpv"), "mpv");
        assert_eq!(renderer_name("C:/Program Files/mpv/mpv.exe"), "mpv");
        assert_eq!(renderer_name("/usr/local/bin/mpv"), "mpv");
    }

    #[test]
    fn nothing_recorded_is_nothing_to_do() {
        let processes = FakeProcesses::default().running(5, "mpv");
        let records = MemoryRecordStore::new();

        assert_eq!(stop("mpv", &processes, &records).unwrap(), StopOutcome::NothingToDo);
        assert!(processes.terminated().is_empty());
        assert!(processes.is_running(5));
    }

    #[test]
    fn stops_the_recorded_renderer() {
        let processes = FakeProcesses::default().running(321, "mpv");
        let records = MemoryRecordStore::with_contents("321");

        assert_eq!(stop("mpv", &processes, &records).unwrap(), StopOutcome::Stopped(321));
        assert_eq!(processes.terminated(), vec![321]);
        assert_eq!(records.contents(), None);
    }

    #[test]
    fn malformed_record_is_kept() {
        let processes = FakeProcesses::default();
        let records = MemoryRecordStore::with_contents("abc");

        let err = stop("mpv", &processes, &records).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
        assert_eq!(records.contents().as_deref(), Some("abc"));
    }

    #[test]
    fn dead_process_clears_the_record() {
        let processes = FakeProcesses::default();
        let records = MemoryRecordStore::with_contents("999");

        assert_eq!(
            stop("mpv", &processes, &records).unwrap(),
            StopOutcome::AlreadyExited(999)
        );
        assert_eq!(records.contents(), None);
        assert!(processes.terminated().is_empty());
    }

    #[test]
    fn reused_pid_is_never_terminated() {
        let processes = FakeProcesses::default().running(444, "explorer");
        let records = MemoryRecordStore::with_contents("444");

        let err = stop("mpv", &processes, &records).unwrap_err();
        match err {
            Error::IdentityMismatch { pid, expected, found } => {
                assert_eq!(pid, 444);
                assert_eq!(expected, "mpv");
                assert_eq!(found, "explorer");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(processes.is_running(444));
        assert!(processes.terminated().is_empty());
        assert_eq!(records.contents().as_deref(), Some("444"));
    }

    #[test]
    fn names_must_match_exactly() {
        let processes = FakeProcesses::default().running(7, "mpvnet");
        let records = MemoryRecordStore::with_contents("7");
        assert!(stop("mpv", &processes, &records).is_err());

        let processes = FakeProcesses::default().running(8, "");
        let records = MemoryRecordStore::with_contents("8");
        assert!(stop("mpv", &processes, &records).is_err());
    }

    #[test]
    fn renderer_name_follows_the_resolved_executable() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("mpv-wrapper.exe");
        std::fs::write(&program, b"").unwrap();
        assert_eq!(renderer_name(program.to_str().unwrap()), "mpv-wrapper");
    }

    #[cfg(windows)]
    #[test]
    fn case_only_differences_still_match_on_windows() {
        let processes = FakeProcesses::default().running(31, "mpv");
        let records = MemoryRecordStore::with_contents("31");

        assert_eq!(
            stop("C:/Tools/MPV.exe", &processes, &records).unwrap(),
            StopOutcome::Stopped(31)
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn truncated_names_still_match_on_linux() {
        let processes = FakeProcesses::default().running(32, "averyveryverylo");
        let records = MemoryRecordStore::with_contents("32");

        assert_eq!(
            stop("averyveryverylongrenderer", &processes, &records).unwrap(),
            StopOutcome::Stopped(32)
        );
        assert_eq!(records.contents(), None);
    }

    #[test]
    fn renderer_exiting_during_stop_counts_as_exited() {
        let processes = FakeProcesses::default()
            .running(41, "mpv")
            .exiting_before_terminate();
        let records = MemoryRecordStore::with_contents("41");

        assert_eq!(
            stop("mpv", &processes, &records).unwrap(),
            StopOutcome::AlreadyExited(41)
        );
        assert_eq!(records.contents(), None);
    }

    #[test]
    fn failed_termination_keeps_the_record() {
        let processes = FakeProcesses::default()
            .running(42, "mpv")
            .refusing_terminate();
        let records = MemoryRecordStore::with_contents("42");

        assert!(matches!(
            stop("mpv", &processes, &records),
            Err(Error::Platform(_))
        ));
        assert!(processes.is_running(42));
        assert_eq!(records.contents().as_deref(), Some("42"));
    }

    #[test]
    fn stop_is_idempotent() {
        let processes = FakeProcesses::default().running(12, "mpv");
        let records = MemoryRecordStore::with_contents("12");

        assert_eq!(stop("mpv", &processes, &records).unwrap(), StopOutcome::Stopped(12));
        assert_eq!(stop("mpv", &processes, &records).unwrap(), StopOutcome::NothingToDo);
    }

    #[test]
    fn launch_then_stop_round_trip() {
        let processes = FakeProcesses::with_next_pid(2024);
        let records = MemoryRecordStore::new();
        let command = RendererCommand {
            program: "C:/mpv/mpv.exe".into(),
            target: DesktopHandle::from_raw(66),
            video: "loop.webm".into(),
            extra_args: Vec::new(),
        };

        let pid = launch(&command, &processes, &records).unwrap();
        assert!(processes.is_running(pid));

        assert_eq!(
            stop("C:/mpv/mpv.exe", &processes, &records).unwrap(),
            StopOutcome::Stopped(pid)
        );
        assert!(!processes.is_running(pid));
        assert_eq!(records.contents(), None);
    }

    #[test]
    fn status_reports_without_changes() {
        let processes = FakeProcesses::default()
            .running(1, "mpv")
            .running(2, "notepad");

        assert_eq!(
            status("mpv", &processes, &MemoryRecordStore::new()).unwrap(),
            SessionStatus::Inactive
        );

        let records = MemoryRecordStore::with_contents("1");
        assert_eq!(
            status("mpv", &processes, &records).unwrap(),
            SessionStatus::Active(ProcessInfo {
                pid: 1,
                name: "mpv".into()
            })
        );

        let records = MemoryRecordStore::with_contents("2");
        assert_eq!(
            status("mpv", &processes, &records).unwrap(),
            SessionStatus::Stale {
                pid: 2,
                found: Some("notepad".into())
            }
        );

        let records = MemoryRecordStore::with_contents("3");
        assert_eq!(
            status("mpv", &processes, &records).unwrap(),
            SessionStatus::Stale { pid: 3, found: None }
        );
        assert_eq!(records.contents().as_deref(), Some("3"));

        let records = MemoryRecordStore::with_contents("x");
        assert!(status("mpv", &processes, &records).is_err());
        assert!(processes.terminated().is_empty());
    }
}
