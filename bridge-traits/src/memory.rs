//! System memory pressure abstraction.

use crate::{error::Result, platform::PlatformSendSync};

/// Memory pressure snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    /// Available memory in bytes.
    pub available_bytes: u64,
    /// Threshold under which the system considers memory low.
    pub threshold_bytes: u64,
    /// Platform verdict.
    pub low_memory: bool,
}

/// Memory monitor trait
///
/// Lets the scheduler decide how aggressively to release idle players when
/// the memory mode is left on automatic.
///
/// # Platform Support
///
/// - **Android**: `ActivityManager.getMemoryInfo`
/// - **iOS**: memory warnings / `os_proc_available_memory`
/// - **Desktop**: `/proc/meminfo`, `GlobalMemoryStatusEx`
pub trait MemoryMonitor: PlatformSendSync {
    /// Current memory information.
    fn memory_info(&self) -> Result<MemoryInfo>;

    /// Whether the system currently reports memory pressure.
    fn is_low_memory(&self) -> Result<bool> {
        self.memory_info().map(|info| info.low_memory)
    }
}
