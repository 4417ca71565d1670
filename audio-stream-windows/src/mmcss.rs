//! Multimedia Class Scheduler registration for the caller's audio thread.

use windows::core::HSTRING;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::Threading::{
    AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW, AvSetMmThreadPriority, AVRT_PRIORITY_HIGH,
};

/// Reverts the thread's MMCSS registration on drop. Not `Send`: it must be
/// dropped on the thread that registered.
pub struct MmcssGuard {
    handle: HANDLE,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Drop for MmcssGuard {
    fn drop(&mut self) {
        if let Err(e) = unsafe { AvRevertMmThreadCharacteristics(self.handle) } {
            log::debug!("AvRevertMmThreadCharacteristics failed: {}", e);
        }
    }
}

/// Register the calling thread under the "Pro Audio" task at high priority.
///
/// `None` when the scheduler service is unavailable; streaming still works at
/// normal priority.
pub fn register_pro_audio_thread() -> Option<MmcssGuard> {
    let mut task_index = 0u32;
    let task = HSTRING::from("Pro Audio");
    let handle = match unsafe { AvSetMmThreadCharacteristicsW(&task, &mut task_index) } {
        Ok(handle) => handle,
        Err(e) => {
            log::warn!("MMCSS registration failed: {}", e);
            return None;
        }
    };
    let _ = unsafe { AvSetMmThreadPriority(handle, AVRT_PRIORITY_HIGH) };
    log::debug!("Audio thread registered with MMCSS (task index {})", task_index);
    Some(MmcssGuard {
        handle,
        _not_send: std::marker::PhantomData,
    })
}
