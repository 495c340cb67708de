// SPDX-License-Identifier: MPL-2.0

use std::{ffi::c_void, time::Duration};

use windows::{
    Win32::{
        Foundation::{HWND, LPARAM, WPARAM},
        UI::WindowsAndMessaging::{
            EnumWindows, FindWindowExW, FindWindowW, GetClassNameW, SMTO_NORMAL,
            SendMessageTimeoutW,
        },
    },
    core::{BOOL, HSTRING, PCWSTR},
};

use super::{
    DesktopHandle, ICON_VIEW_CLASS, SHELL_MANAGER_CLASS, SPAWN_WORKER_MESSAGE, WindowInfo,
    WindowSystem,
};
use crate::error::{Error, Result};

/// The Win32 desktop of the current session.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Desktop;

impl From<HWND> for DesktopHandle {
    fn from(hwnd: HWND) -> Self {
        DesktopHandle::from_raw(hwnd.0 as isize)
    }
}

impl DesktopHandle {
    fn hwnd(self) -> HWND {
        HWND(self.raw() as *mut c_void)
    }
}

impl WindowSystem for Win32Desktop {
    fn find_shell_manager(&self) -> Option<DesktopHandle> {
        let class = HSTRING::from(SHELL_MANAGER_CLASS);
        unsafe { FindWindowW(&class, PCWSTR::null()) }
            .ok()
            .filter(|hwnd| !hwnd.is_invalid())
            .map(DesktopHandle::from)
    }

    fn request_worker(&self, shell: DesktopHandle, timeout: Duration) -> Result<bool> {
        let timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        let mut reply = 0usize;
        let sent = unsafe {
            SendMessageTimeoutW(
                shell.hwnd(),
                SPAWN_WORKER_MESSAGE,
                WPARAM(0),
                LPARAM(0),
                SMTO_NORMAL,
                timeout_ms,
                Some(&mut reply as *mut usize),
            )
        };
        Ok(sent.0 != 0)
    }

    fn top_level_windows(&self) -> Result<Vec<WindowInfo>> {
        let mut windows: Vec<WindowInfo> = Vec::new();
        unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut windows as *mut Vec<WindowInfo> as isize),
            )
        }
        .map_err(|why| Error::Platform(format!("window enumeration failed: {why}")))?;
        Ok(windows)
    }
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: `top_level_windows` passes a live `Vec<WindowInfo>` for the
    // duration of the enumeration.
    let windows = unsafe { &mut *(lparam.0 as *mut Vec<WindowInfo>) };

    let icon_view = HSTRING::from(ICON_VIEW_CLASS);
    let has_icon_view =
        unsafe { FindWindowExW(Some(hwnd), None, &icon_view, PCWSTR::null()) }
            .is_ok_and(|child| !child.is_invalid());

    windows.push(WindowInfo {
        handle: hwnd.into(),
        class_name: class_name(hwnd),
        has_icon_view,
    });

    // never stop early, later windows may hold the surface
    true.into()
}

fn class_name(hwnd: HWND) -> String {
    let mut buffer = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buffer) };
    let len = usize::try_from(len).unwrap_or(0);
    String::from_utf16_lossy(&buffer[..len])
}
