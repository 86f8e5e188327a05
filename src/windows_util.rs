// Window-manager helpers used to bring an already running instance forward.
// Only Windows has a real implementation; elsewhere the activator is inert.

/// Opaque top-level window reference (HWND on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(isize);

impl WindowHandle {
    /// Returns `None` for a null handle.
    pub fn from_raw(raw: isize) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn as_raw(self) -> isize {
        self.0
    }
}

/// Minimal window-manager surface needed for activation.
pub trait WindowActivator {
    fn is_minimized(&self, window: WindowHandle) -> bool;
    /// Returns false when the OS refused.
    fn restore(&self, window: WindowHandle) -> bool;
    /// Returns false when the OS refused (e.g. foreground lock, elevated target).
    fn set_foreground(&self, window: WindowHandle) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsWindowActivator;

#[cfg(target_os = "windows")]
impl WindowActivator for OsWindowActivator {
    fn is_minimized(&self, window: WindowHandle) -> bool {
        use windows::Win32::UI::WindowsAndMessaging::IsIconic;
        unsafe { IsIconic(hwnd(window)).as_bool() }
    }

    fn restore(&self, window: WindowHandle) -> bool {
        use windows::Win32::UI::WindowsAndMessaging::{ShowWindow, SW_RESTORE};
        // ShowWindow 的返回值表示"之前是否可见"，不是成功与否
        unsafe {
            let _ = ShowWindow(hwnd(window), SW_RESTORE);
        }
        !self.is_minimized(window)
    }

    fn set_foreground(&self, window: WindowHandle) -> bool {
        use windows::Win32::UI::WindowsAndMessaging::SetForegroundWindow;
        unsafe { SetForegroundWindow(hwnd(window)).as_bool() }
    }
}

#[cfg(target_os = "windows")]
fn hwnd(window: WindowHandle) -> windows::Win32::Foundation::HWND {
    windows::Win32::Foundation::HWND(window.as_raw() as *mut _)
}

#[cfg(not(target_os = "windows"))]
impl WindowActivator for OsWindowActivator {
    fn is_minimized(&self, _window: WindowHandle) -> bool {
        false
    }

    fn restore(&self, _window: WindowHandle) -> bool {
        false
    }

    fn set_foreground(&self, _window: WindowHandle) -> bool {
        false
    }
}
