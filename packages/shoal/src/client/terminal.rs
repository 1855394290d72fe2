//! Raw-mode guard for the join session.
//!
//! Entering raw mode gives the session keystroke-level input (for typing
//! notifications and draft editing) and turns off local echo, which the
//! session does itself.

/// RAII guard: captures the terminal settings, switches to raw mode, and
/// restores the original settings on drop.
#[cfg(unix)]
pub struct RawModeGuard {
    original: Option<nix::sys::termios::Termios>,
}

#[cfg(unix)]
impl RawModeGuard {
    pub fn enter() -> Self {
        use nix::sys::termios;
        let stdin = std::io::stdin();
        let original = termios::tcgetattr(&stdin).ok();
        if let Some(ref saved) = original {
            let mut raw = saved.clone();
            termios::cfmakeraw(&mut raw);
            let _ = termios::tcsetattr(&stdin, termios::SetArg::TCSANOW, &raw);
        }
        Self { original }
    }
}

#[cfg(unix)]
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Some(ref original) = self.original {
            use nix::sys::termios;
            let stdin = std::io::stdin();
            let _ = termios::tcsetattr(&stdin, termios::SetArg::TCSANOW, original);
        }
    }
}

/// Non-unix fallback: line-buffered input, no raw mode.
#[cfg(not(unix))]
pub struct RawModeGuard;

#[cfg(not(unix))]
impl RawModeGuard {
    pub fn enter() -> Self {
        Self
    }
}
