// Licensed under the Apache-2.0 license

/// Polls `done` until it returns true or `max_polls` attempts have been made.
///
/// Returns false if the condition never became true. Hardware on this platform has no
/// completion timeout of its own, so every busy-wait in the ROM goes through here.
pub fn poll_until(max_polls: u32, mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..max_polls {
        if done() {
            return true;
        }
        core::hint::spin_loop();
    }
    false
}
