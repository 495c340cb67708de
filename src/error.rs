// SPDX-License-Identifier: MPL-2.0

use std::{io, path::PathBuf};

use crate::process::Pid;

/// Broad classes of failure, each surfaced to the user with exit status 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// The renderer is not installed or not on the search path.
    MissingDependency,
    /// The video file does not exist.
    MissingInput,
    /// The desktop or the OS APIs did not behave as expected.
    Platform,
    /// The record exists but cannot be trusted.
    StateCorruption,
    /// Termination refused to avoid touching an unrelated process.
    SafetyAbort,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("renderer `{0}` was not found on the search path, install it or set `renderer` in the config")]
    RendererNotFound(String),

    #[error("video file {} does not exist or is not a regular file", .0.display())]
    VideoNotFound(PathBuf),

    #[error("the shell's Progman window was not found, this desktop configuration is not supported")]
    ShellWindowNotFound,

    #[error("no desktop background surface was found, this desktop configuration is not supported")]
    SurfaceNotFound,

    #[error("{0}")]
    Platform(String),

    #[error("failed to spawn renderer `{}`", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to access process record {}", .path.display())]
    Record {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("process record {} holds {contents:?}, which is not a process id; inspect and delete it manually", .path.display())]
    MalformedRecord { path: PathBuf, contents: String },

    #[error("process {pid} is `{found}`, not the renderer `{expected}`; refusing to terminate it, remove the record manually if the session is gone")]
    IdentityMismatch {
        pid: Pid,
        expected: String,
        found: String,
    },
}

impl Error {
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Error::RendererNotFound(_) => Category::MissingDependency,
            Error::VideoNotFound(_) => Category::MissingInput,
            Error::ShellWindowNotFound
            | Error::SurfaceNotFound
            | Error::Platform(_)
            | Error::Spawn { .. }
            | Error::Record { .. } => Category::Platform,
            Error::MalformedRecord { .. } => Category::StateCorruption,
            Error::IdentityMismatch { .. } => Category::SafetyAbort,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            Error::RendererNotFound("mpv".into()).category(),
            Category::MissingDependency
        );
        assert_eq!(
            Error::VideoNotFound("a.mp4".into()).category(),
            Category::MissingInput
        );
        assert_eq!(Error::SurfaceNotFound.category(), Category::Platform);
        assert_eq!(
            Error::MalformedRecord {
                path: "r".into(),
                contents: "abc".into()
            }
            .category(),
            Category::StateCorruption
        );
        assert_eq!(
            Error::IdentityMismatch {
                pid: 1,
                expected: "mpv".into(),
                found: "explorer".into()
            }
            .category(),
            Category::SafetyAbort
        );
    }

    #[test]
    fn messages_name_the_problem() {
        let err = Error::MalformedRecord {
            path: "/tmp/vidpaper.pid".into(),
            contents: "abc".into(),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/vidpaper.pid"));
        assert!(message.contains("\"abc\""));
        assert!(message.contains("manually"));
    }
}
