//! Single instance lock.
//! Windows: a named mutex in the session (`Local\`) namespace.
//! Other platforms: an exclusive advisory lock on `<name>-<uid>.lock` in
//! `$XDG_RUNTIME_DIR` (falling back to the temp dir).
//!
//! Either way the OS drops the lock when the owning process dies, so a crashed
//! primary never leaves a stale lock behind.

use std::io;

use log::debug;
use thiserror::Error;

/// Name used when settings do not override it.
pub const DEFAULT_LOCK_NAME: &str = "mRemoteNG_SingleInstanceMutex";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to create named lock `{name}`: {source}")]
    Create {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Exclusive, session-wide lock identified by a name.
pub trait SessionLock {
    /// Non-blocking. `Ok(true)` when this caller now owns the lock, `Ok(false)`
    /// when another owner already exists.
    fn try_acquire(&mut self) -> Result<bool, LockError>;
    /// Release the lock if held. Calling it again is a no-op.
    fn release(&mut self);
    fn is_held(&self) -> bool;
}

/// OS-backed [`SessionLock`].
pub struct NamedLock {
    name: String,
    held: Option<imp::OsLock>,
}

impl NamedLock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            held: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SessionLock for NamedLock {
    fn try_acquire(&mut self) -> Result<bool, LockError> {
        if self.held.is_some() {
            return Ok(true);
        }
        match imp::create(&self.name)? {
            Some(lock) => {
                debug!("acquired single instance lock `{}`", self.name);
                self.held = Some(lock);
                Ok(true)
            }
            None => {
                debug!("single instance lock `{}` is owned elsewhere", self.name);
                Ok(false)
            }
        }
    }

    fn release(&mut self) {
        if self.held.take().is_some() {
            debug!("released single instance lock `{}`", self.name);
        }
    }

    fn is_held(&self) -> bool {
        self.held.is_some()
    }
}

#[cfg(target_os = "windows")]
mod imp {
    use super::LockError;
    use std::io;
    use windows::core::PCWSTR;
    use windows::Win32::{
        Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE},
        System::Threading::CreateMutexW,
    };

    pub(super) struct OsLock(HANDLE);

    impl Drop for OsLock {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }

    /// Bare names go into the per-session namespace; `Local\x` / `Global\x` keep
    /// their namespace. Any other backslash is not valid in a mutex name.
    pub(super) fn mutex_name(name: &str) -> String {
        let (namespace, rest) = ["Local\\", "Global\\"]
            .iter()
            .find_map(|ns| {
                let head = name.get(..ns.len())?;
                head.eq_ignore_ascii_case(ns).then(|| (head, &name[ns.len()..]))
            })
            .unwrap_or(("Local\\", name));
        format!("{namespace}{}", rest.replace('\\', "_"))
    }

    pub(super) fn create(name: &str) -> Result<Option<OsLock>, LockError> {
        let wide: Vec<u16> = mutex_name(name)
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();
        let handle = unsafe { CreateMutexW(None, false, PCWSTR(wide.as_ptr())) }.map_err(|e| {
            LockError::Create {
                name: name.to_string(),
                source: io::Error::from(e),
            }
        })?;
        // CreateMutexW 成功时也可能只是打开了已存在的互斥体
        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            unsafe {
                let _ = CloseHandle(handle);
            }
            return Ok(None);
        }
        Ok(Some(OsLock(handle)))
    }
}

#[cfg(not(target_os = "windows"))]
mod imp {
    use super::LockError;
    use fs2::FileExt;
    use nix::unistd::{getuid, Uid};
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::unix::fs::OpenOptionsExt;
    use std::path::{Path, PathBuf};

    // 文件句柄关闭即释放锁；锁文件本身保留，避免删除时的竞态
    pub(super) struct OsLock(#[allow(dead_code)] File);

    /// `$XDG_RUNTIME_DIR` when set, else the shared temp dir. The file name
    /// carries the uid either way so users never contend for one file.
    pub(super) fn lock_path(name: &str) -> PathBuf {
        let dir = std::env::var_os("XDG_RUNTIME_DIR")
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .filter(|d| d.is_dir())
            .unwrap_or_else(std::env::temp_dir);
        lock_path_in(&dir, name, getuid())
    }

    pub(super) fn lock_path_in(dir: &Path, name: &str, uid: Uid) -> PathBuf {
        let file_name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        dir.join(format!("{file_name}-{uid}.lock"))
    }

    pub(super) fn create(name: &str) -> Result<Option<OsLock>, LockError> {
        let path = lock_path(name);
        let create_err = |source: io::Error| LockError::Create {
            name: name.to_string(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .mode(0o600)
            .open(&path)
            .map_err(create_err)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(OsLock(file))),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(create_err(e)),
        }
    }

    fn is_contended(e: &io::Error) -> bool {
        e.kind() == io::ErrorKind::WouldBlock
            || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
    }
}
