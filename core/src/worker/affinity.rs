//! Processor pinning for role threads

/// Pin the current thread to logical processor `hint` (modulo the count)
///
/// Returns whether pinning succeeded. Failure only costs determinism, so it
/// is logged and otherwise ignored.
pub fn pin_to_cpu(hint: usize) -> bool {
    let Some(core_ids) = core_affinity::get_core_ids() else {
        tracing::debug!(hint, "Processor list unavailable, not pinning");
        return false;
    };
    if core_ids.is_empty() {
        return false;
    }

    let core_id = core_ids[hint % core_ids.len()];
    if core_affinity::set_for_current(core_id) {
        tracing::debug!(hint, ?core_id, "Pinned thread");
        true
    } else {
        tracing::debug!(hint, ?core_id, "Failed to pin thread");
        false
    }
}
