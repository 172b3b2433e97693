//! System clipboard for the per-field copy action.

#[cfg(feature = "native")]
use copypasta::{ClipboardContext, ClipboardProvider};

/// Returns false when no clipboard is reachable (headless session, no
/// display server).
#[cfg(feature = "native")]
pub fn copy_to_clipboard(s: &str) -> bool {
    match ClipboardContext::new() {
        Ok(mut ctx) => match ctx.set_contents(s.to_string()) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("clipboard write failed: {e}");
                false
            }
        },
        Err(e) => {
            log::warn!("no clipboard: {e}");
            false
        }
    }
}

#[cfg(not(feature = "native"))]
pub fn copy_to_clipboard(_s: &str) -> bool {
    false
}
