use crate::InitError;

/// Busy-wait until `f` returns false, giving up after `timeout_iterations`
/// passes. Used for the init-mode and start handshakes, which complete within
/// a few peripheral-clock cycles on healthy hardware.
#[inline]
pub(crate) fn checked_wait<F: Fn() -> bool>(
    f: F,
    timeout_iterations: u32,
) -> Result<(), InitError> {
    let mut elapsed = 0;
    while f() {
        elapsed += 1;
        if elapsed >= timeout_iterations {
            return Err(InitError::Timeout);
        }
    }
    Ok(())
}
