//! Host application lifecycle.
//!
//! Android refuses to start a foreground media service while the host app is
//! in the background, so player setup consults a [`LifecycleObserver`] before
//! connecting to the engine.

use crate::{error::Result, platform::PlatformSendSync};

/// Visibility of the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Application is visible and interactive
    Foreground,
    /// Application is running but not visible
    Background,
    /// Application is being suspended by the OS
    Suspended,
}

impl LifecycleState {
    /// `true` when a foreground service may be started.
    pub fn is_foreground(self) -> bool {
        matches!(self, LifecycleState::Foreground)
    }
}

/// Reports the current lifecycle state of the host application.
///
/// # Platform Support
///
/// - **Android**: `ProcessLifecycleOwner` / Activity callbacks
/// - **iOS**: `UIApplication.applicationState`
/// - **Desktop**: always foreground
///
/// # Example
///
/// ```ignore
/// use bridge_traits::lifecycle::LifecycleObserver;
///
/// async fn may_start_service(observer: &dyn LifecycleObserver) -> bool {
///     observer
///         .get_state()
///         .await
///         .map(|state| state.is_foreground())
///         .unwrap_or(true)
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait LifecycleObserver: PlatformSendSync {
    /// Get current lifecycle state
    async fn get_state(&self) -> Result<LifecycleState>;
}
