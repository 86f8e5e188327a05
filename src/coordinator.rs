//! Single-instance coordinator.
//!
//! Decides at startup whether this process is the primary instance. A
//! secondary instance hands focus to the primary's main window and must not
//! start its own UI.

use log::{debug, warn};

use crate::peer::{OsPeerLocator, PeerLocator};
use crate::single_instance::{LockError, NamedLock, SessionLock};
use crate::windows_util::{OsWindowActivator, WindowActivator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns the lock; run the application.
    Primary,
    /// Another instance owns the lock; it has been asked to come forward.
    Secondary,
}

pub struct Coordinator<L, P, A> {
    lock: L,
    locator: P,
    activator: A,
}

impl Coordinator<NamedLock, OsPeerLocator, OsWindowActivator> {
    pub fn with_os_defaults(lock_name: impl Into<String>) -> Self {
        Self::new(NamedLock::new(lock_name), OsPeerLocator, OsWindowActivator)
    }
}

impl<L, P, A> Coordinator<L, P, A>
where
    L: SessionLock,
    P: PeerLocator,
    A: WindowActivator,
{
    pub fn new(lock: L, locator: P, activator: A) -> Self {
        Self {
            lock,
            locator,
            activator,
        }
    }

    /// Acquire the lock or, failing that, activate the running instance.
    ///
    /// The lock stays held until [`release`](Self::release) or drop.
    pub fn acquire_or_activate(&mut self) -> Result<Role, LockError> {
        if self.lock.try_acquire()? {
            return Ok(Role::Primary);
        }
        self.activate_peer();
        Ok(Role::Secondary)
    }

    pub fn release(&mut self) {
        self.lock.release();
    }

    pub fn lock(&self) -> &L {
        &self.lock
    }

    #[cfg(test)]
    fn activator(&self) -> &A {
        &self.activator
    }

    // best-effort：找不到窗口或系统拒绝都不算错误
    fn activate_peer(&self) {
        let Some(window) = self.locator.find_peer_window() else {
            debug!("no peer window found; nothing to activate");
            return;
        };
        if self.activator.is_minimized(window) && !self.activator.restore(window) {
            warn!("failed to restore peer window {:#x}", window.as_raw());
        }
        if !self.activator.set_foreground(window) {
            warn!("failed to bring peer window {:#x} to foreground", window.as_raw());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows_util::WindowHandle;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Stand-in for the OS namespace: at most one owner id per name.
    #[derive(Default, Clone)]
    struct FakeNamespace(Rc<RefCell<Option<u32>>>);

    struct FakeLock {
        ns: FakeNamespace,
        id: u32,
        held: bool,
    }

    impl FakeLock {
        fn new(ns: &FakeNamespace, id: u32) -> Self {
            Self {
                ns: ns.clone(),
                id,
                held: false,
            }
        }
    }

    impl SessionLock for FakeLock {
        fn try_acquire(&mut self) -> Result<bool, LockError> {
            let mut owner = self.ns.0.borrow_mut();
            match *owner {
                Some(id) => Ok(id == self.id),
                None => {
                    *owner = Some(self.id);
                    self.held = true;
                    Ok(true)
                }
            }
        }

        fn release(&mut self) {
            if self.held {
                *self.ns.0.borrow_mut() = None;
                self.held = false;
            }
        }

        fn is_held(&self) -> bool {
            self.held
        }
    }

    struct BrokenLock;

    impl SessionLock for BrokenLock {
        fn try_acquire(&mut self) -> Result<bool, LockError> {
            Err(LockError::Create {
                name: "X".into(),
                source: std::io::Error::other("access denied"),
            })
        }
        fn release(&mut self) {}
        fn is_held(&self) -> bool {
            false
        }
    }

    struct ScriptedLocator(Option<WindowHandle>);

    impl PeerLocator for ScriptedLocator {
        fn find_peer_window(&self) -> Option<WindowHandle> {
            self.0
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        IsMinimized(WindowHandle),
        Restore(WindowHandle),
        Foreground(WindowHandle),
    }

    #[derive(Default)]
    struct RecordingActivator {
        minimized: bool,
        refuse: bool,
        calls: RefCell<Vec<Call>>,
    }

    impl WindowActivator for RecordingActivator {
        fn is_minimized(&self, window: WindowHandle) -> bool {
            self.calls.borrow_mut().push(Call::IsMinimized(window));
            self.minimized
        }
        fn restore(&self, window: WindowHandle) -> bool {
            self.calls.borrow_mut().push(Call::Restore(window));
            !self.refuse
        }
        fn set_foreground(&self, window: WindowHandle) -> bool {
            self.calls.borrow_mut().push(Call::Foreground(window));
            !self.refuse
        }
    }

    fn handle(raw: isize) -> WindowHandle {
        WindowHandle::from_raw(raw).unwrap()
    }

    type TestCoordinator = Coordinator<FakeLock, ScriptedLocator, RecordingActivator>;

    fn coordinator(
        ns: &FakeNamespace,
        id: u32,
        window: Option<WindowHandle>,
        activator: RecordingActivator,
    ) -> TestCoordinator {
        Coordinator::new(FakeLock::new(ns, id), ScriptedLocator(window), activator)
    }

    #[test]
    fn first_is_primary_second_is_secondary() {
        let ns = FakeNamespace::default();
        let mut a = coordinator(&ns, 1, None, RecordingActivator::default());
        let mut b = coordinator(&ns, 2, None, RecordingActivator::default());
        assert_eq!(a.acquire_or_activate().unwrap(), Role::Primary);
        assert_eq!(b.acquire_or_activate().unwrap(), Role::Secondary);
        assert!(a.lock().is_held());
        assert!(!b.lock().is_held());
    }

    #[test]
    fn primary_never_touches_windows() {
        let ns = FakeNamespace::default();
        let mut a = coordinator(&ns, 1, Some(handle(9)), RecordingActivator::default());
        assert_eq!(a.acquire_or_activate().unwrap(), Role::Primary);
        assert!(a.activator().calls.borrow().is_empty());
    }

    #[test]
    fn minimized_peer_is_restored_then_foregrounded() {
        let ns = FakeNamespace::default();
        let mut a = coordinator(&ns, 1, None, RecordingActivator::default());
        a.acquire_or_activate().unwrap();

        let activator = RecordingActivator {
            minimized: true,
            ..Default::default()
        };
        let w = handle(0xA0);
        let mut b = coordinator(&ns, 2, Some(w), activator);
        assert_eq!(b.acquire_or_activate().unwrap(), Role::Secondary);
        assert_eq!(
            *b.activator().calls.borrow(),
            vec![Call::IsMinimized(w), Call::Restore(w), Call::Foreground(w)]
        );
    }

    #[test]
    fn visible_peer_is_only_foregrounded() {
        let ns = FakeNamespace::default();
        let mut a = coordinator(&ns, 1, None, RecordingActivator::default());
        a.acquire_or_activate().unwrap();

        let w = handle(0xB0);
        let mut b = coordinator(&ns, 2, Some(w), RecordingActivator::default());
        assert_eq!(b.acquire_or_activate().unwrap(), Role::Secondary);
        assert_eq!(
            *b.activator().calls.borrow(),
            vec![Call::IsMinimized(w), Call::Foreground(w)]
        );
    }

    #[test]
    fn missing_peer_window_is_a_no_op() {
        let ns = FakeNamespace::default();
        let mut a = coordinator(&ns, 1, None, RecordingActivator::default());
        a.acquire_or_activate().unwrap();

        let mut b = coordinator(&ns, 2, None, RecordingActivator::default());
        assert_eq!(b.acquire_or_activate().unwrap(), Role::Secondary);
        assert!(b.activator().calls.borrow().is_empty());
    }

    #[test]
    fn refused_activation_is_still_secondary() {
        let ns = FakeNamespace::default();
        let mut a = coordinator(&ns, 1, None, RecordingActivator::default());
        a.acquire_or_activate().unwrap();

        let activator = RecordingActivator {
            minimized: true,
            refuse: true,
            ..Default::default()
        };
        let w = handle(0xC0);
        let mut b = coordinator(&ns, 2, Some(w), activator);
        assert_eq!(b.acquire_or_activate().unwrap(), Role::Secondary);
        assert_eq!(b.activator().calls.borrow().len(), 3);
    }

    #[test]
    fn release_hands_primary_to_the_next_launch() {
        // A 启动 -> B 被拒 -> A 退出 -> C 成为主实例
        let ns = FakeNamespace::default();
        let mut a = coordinator(&ns, 1, None, RecordingActivator::default());
        assert_eq!(a.acquire_or_activate().unwrap(), Role::Primary);

        let w = handle(0xD0);
        let mut b = coordinator(&ns, 2, Some(w), RecordingActivator::default());
        assert_eq!(b.acquire_or_activate().unwrap(), Role::Secondary);
        assert!(b.activator().calls.borrow().contains(&Call::Foreground(w)));

        a.release();
        a.release();
        let mut c = coordinator(&ns, 3, None, RecordingActivator::default());
        assert_eq!(c.acquire_or_activate().unwrap(), Role::Primary);
    }

    #[test]
    fn lock_failure_is_reported_to_the_caller() {
        let mut broken = Coordinator::new(
            BrokenLock,
            ScriptedLocator(Some(handle(1))),
            RecordingActivator::default(),
        );
        let err = broken.acquire_or_activate().unwrap_err();
        assert!(err.to_string().contains("access denied"));
        assert!(broken.activator().calls.borrow().is_empty());
    }

    #[test]
    fn os_coordinator_round_trip() {
        let name = format!("conn-launcher-coord-{}", std::process::id());
        let mut a = Coordinator::with_os_defaults(name.clone());
        let mut b = Coordinator::with_os_defaults(name.clone());
        assert_eq!(a.acquire_or_activate().unwrap(), Role::Primary);
        assert_eq!(b.acquire_or_activate().unwrap(), Role::Secondary);
        a.release();
        let mut c = Coordinator::with_os_defaults(name);
        assert_eq!(c.acquire_or_activate().unwrap(), Role::Primary);
    }
}
