// src/utils.rs

pub mod powershell;
pub mod registry;
pub mod windows;

#[cfg(windows)]
use ::windows::Win32::Foundation::{CloseHandle, HANDLE};

/// Closes a Win32 handle when dropped.
#[cfg(windows)]
pub struct HandleGuard {
    pub handle: HANDLE,
}

#[cfg(windows)]
impl Drop for HandleGuard {
    fn drop(&mut self) {
        if self.handle.is_invalid() {
            return;
        }
        if let Err(e) = unsafe { CloseHandle(self.handle) } {
            tracing::debug!("CloseHandle failed: {:?}", e);
        }
    }
}
