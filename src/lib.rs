// SPDX-License-Identifier: MPL-2.0

//! Looping video wallpapers driven by an external renderer.
//!
//! `start` finds the surface behind the desktop icons, spawns the renderer
//! bound to it and records the renderer's process id. `stop` reads the
//! record back, checks the process is still the renderer and terminates it.

pub mod desktop;
pub mod error;
pub mod launcher;
pub mod process;
pub mod record;
pub mod terminator;

pub use desktop::{DesktopHandle, WindowInfo, WindowSystem, find_matching_sibling, locate};
pub use error::{Category, Error, Result};
pub use launcher::{RendererCommand, launch, preflight, start, start_with};
pub use process::{Pid, ProcessController, ProcessInfo, SystemProcesses, matches_renderer};
pub use record::{FileRecordStore, MemoryRecordStore, RecordStore};
pub use terminator::{SessionStatus, StopOutcome, status, stop};
