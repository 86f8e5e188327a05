//! Startup coordination for the connection manager: single-instance lock,
//! peer window activation and the settings that switch it on.

pub mod coordinator;
pub mod peer;
pub mod settings;
pub mod single_instance;
pub mod window_manager;
pub mod windows_util;

pub use coordinator::{Coordinator, Role};
pub use settings::Settings;
pub use single_instance::{LockError, NamedLock, SessionLock, DEFAULT_LOCK_NAME};
pub use windows_util::WindowHandle;
