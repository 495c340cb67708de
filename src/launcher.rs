// SPDX-License-Identifier: MPL-2.0

//! Starting the renderer on the desktop surface.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use tracing::{debug, error, info, warn};
use vidpaper_config::Config;

use crate::{
    desktop::{self, DesktopHandle, WindowSystem},
    error::{Error, Result},
    process::{Pid, ProcessController, resolve_executable},
    record::RecordStore,
};

/// Flags following `--wid`: loop forever, no audio, hardware decode when
/// available, no terminal or window chrome, and fill the surface.
pub const RENDERER_FLAGS: &[&str] = &[
    "--loop=inf",
    "--mute=yes",
    "--hwdec=auto",
    "--no-terminal",
    "--no-border",
    "--panscan=1.0",
];

/// A fully specified renderer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererCommand {
    pub program: PathBuf,
    pub target: DesktopHandle,
    pub video: PathBuf,
    pub extra_args: Vec<String>,
}

impl RendererCommand {
    /// Arguments in order, the video always last.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args = Vec::with_capacity(RENDERER_FLAGS.len() + self.extra_args.len() + 2);
        args.push(OsString::from(format!("--wid={}", self.target)));
        args.extend(RENDERER_FLAGS.iter().map(OsString::from));
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(self.video.clone().into_os_string());
        args
    }
}

/// Check everything that can be checked before touching the desktop.
///
/// Returns the resolved renderer executable.
///
/// # Errors
///
/// [`Error::RendererNotFound`] or [`Error::VideoNotFound`].
pub fn preflight(renderer: &str, video: &Path) -> Result<PathBuf> {
    let program =
        resolve_executable(renderer).ok_or_else(|| Error::RendererNotFound(renderer.into()))?;
    debug!(program = %program.display(), "resolved renderer");

    if !video.is_file() {
        return Err(Error::VideoNotFound(video.to_path_buf()));
    }

    Ok(program)
}

/// Spawn the renderer and record its process id.
///
/// A spawn failure clears any existing record. If the record cannot be
/// written the renderer is terminated again so nothing runs untracked.
pub fn launch(
    command: &RendererCommand,
    processes: &impl ProcessController,
    records: &impl RecordStore,
) -> Result<Pid> {
    match records.read() {
        Ok(Some(previous)) => warn!(
            previous,
            "a wallpaper session is already recorded, it will no longer be tracked"
        ),
        Ok(None) => {}
        Err(why) => debug!(%why, "ignoring unreadable previous record"),
    }

    let pid = match processes.spawn(&command.program, &command.args()) {
        Ok(pid) => pid,
        Err(why) => {
            if let Err(clear) = records.clear() {
                error!(%clear, "failed to remove stale process record");
            }
            return Err(why);
        }
    };

    if let Err(why) = records.write(pid) {
        if let Err(kill) = processes.terminate(pid) {
            error!(pid, %kill, "renderer is running untracked");
        }
        return Err(why);
    }

    info!(pid, record = %records.location().display(), "wallpaper started");
    Ok(pid)
}

/// The `start` command: preflight, locate the surface, launch.
pub fn start(
    config: &Config,
    video: &Path,
    windows: &impl WindowSystem,
    processes: &impl ProcessController,
    records: &impl RecordStore,
) -> Result<Pid> {
    let program = preflight(&config.renderer, video)?;
    start_with(config, program, video, windows, processes, records)
}

/// Locate the surface and launch `program`, already resolved by [`preflight`].
pub fn start_with(
    config: &Config,
    program: PathBuf,
    video: &Path,
    windows: &impl WindowSystem,
    processes: &impl ProcessController,
    records: &impl RecordStore,
) -> Result<Pid> {
    let target = desktop::locate(windows, config.spawn_ack_timeout())?;

    let command = RendererCommand {
        program,
        target,
        video: std::path::absolute(video).unwrap_or_else(|_| video.to_path_buf()),
        extra_args: config.renderer_args.clone(),
    };

    launch(&command, processes, records)
}
