//! Locating the main window of an already running instance.
//!
//! A peer is another process started from the same executable: same process
//! name, same executable path, different pid. The OS process table is scanned
//! fresh on every lookup; nothing is cached between calls.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use sysinfo::System;

use crate::windows_util::WindowHandle;

/// Identity of the running process, used to recognise peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentProcess {
    pub pid: u32,
    pub name: String,
    pub exe: PathBuf,
}

impl CurrentProcess {
    pub fn new(pid: u32, exe: impl Into<PathBuf>) -> Self {
        let exe = exe.into();
        let name = exe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { pid, name, exe }
    }

    /// `None` when the executable path cannot be resolved.
    pub fn detect() -> Option<Self> {
        match std::env::current_exe() {
            Ok(exe) => Some(Self::new(std::process::id(), exe)),
            Err(e) => {
                warn!("cannot resolve current executable: {e}");
                None
            }
        }
    }
}

/// One row of the process table as seen by the locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerProcess {
    pub pid: u32,
    pub name: String,
    pub exe: Option<PathBuf>,
    pub main_window: Option<WindowHandle>,
}

pub trait PeerLocator {
    fn find_peer_window(&self) -> Option<WindowHandle>;
}

/// Filter `candidates` down to peers of `current` that own a main window.
/// Several matches resolve to the lowest pid, independent of enumeration order.
pub fn select_peer_window(
    current: &CurrentProcess,
    candidates: &[PeerProcess],
) -> Option<WindowHandle> {
    let current_stem = process_stem(&current.name);
    candidates
        .iter()
        .filter(|p| p.pid != current.pid)
        .filter(|p| names_match(process_stem(&p.name), current_stem))
        .filter(|p| {
            p.exe
                .as_deref()
                .is_some_and(|exe| paths_match(exe, &current.exe))
        })
        .filter_map(|p| p.main_window.map(|w| (p.pid, w)))
        .min_by_key(|(pid, _)| *pid)
        .map(|(pid, window)| {
            debug!("peer instance pid={pid} window={:#x}", window.as_raw());
            window
        })
}

// Windows 进程名带 .exe 后缀，Linux 的 comm 不带
fn process_stem(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe") {
        &name[..len - 4]
    } else {
        name
    }
}

#[cfg(target_os = "windows")]
fn names_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(not(target_os = "windows"))]
fn names_match(a: &str, b: &str) -> bool {
    // /proc/<pid>/comm 截断为 15 字节
    const COMM_LEN: usize = 15;
    if a.len() == COMM_LEN || b.len() == COMM_LEN {
        let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
        long.starts_with(short)
    } else {
        a == b
    }
}

#[cfg(target_os = "windows")]
fn paths_match(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

#[cfg(not(target_os = "windows"))]
fn paths_match(a: &Path, b: &Path) -> bool {
    a == b
}

/// [`PeerLocator`] over the live OS process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsPeerLocator;

impl PeerLocator for OsPeerLocator {
    fn find_peer_window(&self) -> Option<WindowHandle> {
        let current = CurrentProcess::detect()?;
        let mut system = System::new();
        system.refresh_processes();

        let windows = main_windows();
        let candidates: Vec<PeerProcess> = system
            .processes()
            .iter()
            .map(|(pid, process)| {
                let pid = pid.as_u32();
                PeerProcess {
                    pid,
                    name: process.name().to_string(),
                    exe: process.exe().map(Path::to_path_buf),
                    main_window: windows.get(&pid).copied(),
                }
            })
            .collect();
        debug!("scanned {} processes for a peer instance", candidates.len());
        select_peer_window(&current, &candidates)
    }
}

/// First visible, unowned top-level window per pid (what .NET-style
/// "main window" lookups return).
#[cfg(target_os = "windows")]
fn main_windows() -> std::collections::HashMap<u32, WindowHandle> {
    use std::collections::HashMap;
    use windows::core::BOOL;
    use windows::Win32::Foundation::{HWND, LPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindow, GetWindowThreadProcessId, IsWindowVisible, GW_OWNER,
    };

    unsafe extern "system" fn collect(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let found = &mut *(lparam.0 as *mut HashMap<u32, WindowHandle>);
        let mut pid = 0u32;
        GetWindowThreadProcessId(hwnd, Some(&mut pid));
        if pid == 0 || found.contains_key(&pid) || !IsWindowVisible(hwnd).as_bool() {
            return BOOL(1);
        }
        let owned = GetWindow(hwnd, GW_OWNER)
            .map(|owner| !owner.is_invalid())
            .unwrap_or(false);
        if !owned {
            if let Some(window) = WindowHandle::from_raw(hwnd.0 as isize) {
                found.insert(pid, window);
            }
        }
        BOOL(1)
    }

    let mut found: HashMap<u32, WindowHandle> = HashMap::new();
    let result = unsafe {
        EnumWindows(
            Some(collect),
            LPARAM(&mut found as *mut HashMap<u32, WindowHandle> as isize),
        )
    };
    if let Err(e) = result {
        warn!("EnumWindows failed: {e}");
    }
    found
}

#[cfg(not(target_os = "windows"))]
fn main_windows() -> std::collections::HashMap<u32, WindowHandle> {
    // 非 Windows 平台没有统一的"主窗口"概念
    std::collections::HashMap::new()
}
