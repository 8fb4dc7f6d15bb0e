use windows::Win32::Foundation::{CloseHandle, HANDLE};

/// Closes the wrapped handle when dropped.
#[derive(Debug)]
pub(crate) struct OwnedHandle(HANDLE);

impl OwnedHandle {
    /// # Safety
    ///
    /// The handle must be valid and owned by the caller, who gives up ownership.
    pub(crate) const unsafe fn new(handle: HANDLE) -> Self {
        Self(handle)
    }

    pub(crate) const fn get(&self) -> HANDLE {
        self.0
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        // SAFETY: We own the handle and nobody uses it after this.
        if let Err(error) = unsafe { CloseHandle(self.0) } {
            tracing::warn!(%error, "failed to close handle");
        }
    }
}
