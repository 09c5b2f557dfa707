//! Client runtime: the patcher every streamed document inlines in its head.

/// Source of the client patcher. Defines `window.__spillway`.
pub const RUNTIME_JS: &str = include_str!("runtime.js");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{RUNTIME_GLOBAL, STAGING_ID};

    #[test]
    fn runtime_exposes_protocol_entry_points() {
        assert!(RUNTIME_JS.contains(&format!("global.{RUNTIME_GLOBAL} =")));
        for entry in ["processFragment:", "commit:", "finish:"] {
            assert!(RUNTIME_JS.contains(entry), "missing {entry}");
        }
        assert!(RUNTIME_JS.contains(STAGING_ID));
    }

    #[test]
    fn runtime_cannot_close_its_script_element() {
        assert!(!RUNTIME_JS.contains("</script"));
    }
}
