//! Disable-time monitor — decides when a repeating block has run long enough.

use fastcmd_core::block::BlockDefinition;

/// True once a running block has been running for at least its disable window.
/// A window of 0 never expires.
pub fn is_expired(block: &BlockDefinition, now_tick: u64) -> bool {
    match block.started_at_tick() {
        Some(started) if block.disable_after_ticks > 0 => {
            now_tick.saturating_sub(started) >= block.disable_after_ticks
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastcmd_core::block::BlockKind;

    fn running(disable: u64, started: u64) -> BlockDefinition {
        let mut block =
            BlockDefinition::new("y", "noop", BlockKind::Repeating).with_disable_after(disable);
        block.mark_running(started);
        block
    }

    #[test]
    fn test_window_boundary() {
        let block = running(20, 100);
        assert!(!is_expired(&block, 100));
        assert!(!is_expired(&block, 119));
        assert!(is_expired(&block, 120));
        assert!(is_expired(&block, 500));
    }

    #[test]
    fn test_zero_never_expires() {
        assert!(!is_expired(&running(0, 0), u64::MAX));
    }

    #[test]
    fn test_idle_never_expires() {
        let block =
            BlockDefinition::new("y", "noop", BlockKind::Repeating).with_disable_after(1);
        assert!(!is_expired(&block, 1_000));
    }
}
