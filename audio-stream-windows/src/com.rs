//! COM apartment setup and HRESULT translation.

use windows::core::HRESULT;
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};

use audio_stream_core::models::error::EngineError;

/// `HRESULT_FROM_WIN32(ERROR_NOT_FOUND)`, returned when no default endpoint exists.
pub(crate) const E_NOTFOUND: HRESULT = HRESULT(0x8007_0490u32 as i32);

/// Join the multithreaded apartment on the calling thread.
///
/// A thread already initialized as STA by its owner is left alone; the
/// endpoint objects are free-threaded and work from either apartment.
pub(crate) fn ensure_mta() -> Result<(), EngineError> {
    let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
    if hr.is_ok() || hr == RPC_E_CHANGED_MODE {
        Ok(())
    } else {
        Err(EngineError::Os {
            context: "CoInitializeEx".into(),
            code: hr.0,
            message: hr.message().to_string(),
        })
    }
}

/// Map a failed COM call onto the engine error taxonomy.
pub(crate) fn engine_error(context: &str, err: windows::core::Error) -> EngineError {
    let code = err.code();
    if code == AUDCLNT_E_NOT_INITIALIZED {
        EngineError::NotInitialized
    } else if code == AUDCLNT_E_DEVICE_INVALIDATED {
        EngineError::DeviceInvalidated
    } else if code == AUDCLNT_E_UNSUPPORTED_FORMAT {
        EngineError::UnsupportedFormat
    } else if code == AUDCLNT_E_BUFFER_TOO_LARGE {
        EngineError::BufferTooLarge
    } else if code == AUDCLNT_E_OUT_OF_ORDER {
        EngineError::OutOfOrder
    } else if code == AUDCLNT_E_INVALID_SIZE {
        EngineError::InvalidSize
    } else {
        EngineError::Os {
            context: context.to_string(),
            code: code.0,
            message: err.message().to_string(),
        }
    }
}
