// SPDX-License-Identifier: MPL-2.0

//! Locating the desktop background surface.
//!
//! On Windows the wallpaper is drawn by a `WorkerW` window that sits beside
//! the window hosting the desktop icons (`SHELLDLL_DefView`). The shell only
//! creates that worker after `Progman` receives an undocumented message, and
//! which top-level window ends up hosting the icons is not fixed, so the
//! surface is found by matching over a snapshot of all top-level windows.

use std::{fmt, time::Duration};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

#[cfg(windows)]
mod win32;

#[cfg(windows)]
pub use win32::Win32Desktop;

/// Class of the top-level shell manager window.
pub const SHELL_MANAGER_CLASS: &str = "Progman";
/// Class of the shell's background worker windows.
pub const WORKER_CLASS: &str = "WorkerW";
/// Class of the desktop icon view.
pub const ICON_VIEW_CLASS: &str = "SHELLDLL_DefView";
/// Asks `Progman` to spawn the background worker if it does not exist yet.
pub const SPAWN_WORKER_MESSAGE: u32 = 0x052C;

/// Opaque handle of a window owned by the shell. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DesktopHandle(isize);

impl DesktopHandle {
    #[must_use]
    pub const fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> isize {
        self.0
    }
}

impl fmt::Display for DesktopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One top-level window as captured during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub handle: DesktopHandle,
    pub class_name: String,
    /// Whether the window has a direct `SHELLDLL_DefView` child.
    pub has_icon_view: bool,
}

/// The windowing operations the locator needs.
pub trait WindowSystem {
    /// The top-level window of class [`SHELL_MANAGER_CLASS`].
    fn find_shell_manager(&self) -> Option<DesktopHandle>;

    /// Send [`SPAWN_WORKER_MESSAGE`] to the shell manager, waiting at most
    /// `timeout`. Returns whether the shell acknowledged in time.
    fn request_worker(&self, shell: DesktopHandle, timeout: Duration) -> Result<bool>;

    /// All top-level windows in enumeration (z-)order.
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>>;
}

/// Find the background surface in a window snapshot.
///
/// For every window hosting the icon view, the next `WorkerW` after it in
/// enumeration order is its sibling surface. All windows are visited and the
/// first surface found wins.
#[must_use]
pub fn find_matching_sibling(windows: &[WindowInfo]) -> Option<DesktopHandle> {
    let mut surface = None;

    for (index, window) in windows.iter().enumerate() {
        if !window.has_icon_view {
            continue;
        }

        let sibling = windows[index + 1..]
            .iter()
            .find(|candidate| candidate.class_name == WORKER_CLASS)
            .map(|candidate| candidate.handle);

        debug!(host = %window.handle, ?sibling, "icon view host");

        if surface.is_none() {
            surface = sibling;
        }
    }

    surface
}

/// Locate the desktop background surface.
///
/// # Errors
///
/// [`Error::ShellWindowNotFound`] without a shell manager window,
/// [`Error::SurfaceNotFound`] when no window matches.
pub fn locate(windows: &impl WindowSystem, ack_timeout: Duration) -> Result<DesktopHandle> {
    let shell = windows
        .find_shell_manager()
        .ok_or(Error::ShellWindowNotFound)?;
    debug!(%shell, "found shell manager");

    if !windows.request_worker(shell, ack_timeout)? {
        warn!(
            timeout_ms = ack_timeout.as_millis(),
            "shell did not acknowledge the worker request in time"
        );
    }

    let snapshot = windows.top_level_windows()?;
    let surface = find_matching_sibling(&snapshot).ok_or(Error::SurfaceNotFound)?;
    info!(%surface, windows = snapshot.len(), "found desktop surface");
    Ok(surface)
}

/// The platform's window system, if it has a desktop surface to offer.
///
/// # Errors
///
/// Fails on platforms without a supported shell.
#[cfg(windows)]
pub fn system() -> Result<Win32Desktop> {
    Ok(Win32Desktop)
}

#[cfg(not(windows))]
pub fn system() -> Result<Unsupported> {
    Err(Error::Platform(format!(
        "desktop video wallpapers are not supported on {}",
        std::env::consts::OS
    )))
}

/// Placeholder for platforms without a supported shell.
#[cfg(not(windows))]
#[derive(Debug)]
pub enum Unsupported {}

#[cfg(not(windows))]
impl WindowSystem for Unsupported {
    fn find_shell_manager(&self) -> Option<DesktopHandle> {
        match *self {}
    }

    fn request_worker(&self, _shell: DesktopHandle, _timeout: Duration) -> Result<bool> {
        match *self {}
    }

    fn top_level_windows(&self) -> Result<Vec<WindowInfo>> {
        match *self {}
    }
}
