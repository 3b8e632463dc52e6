//! Local process liveness probing.

/// What a probe could learn about a process id on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The process exists and we are allowed to signal it.
    Alive,
    /// No process with this id exists.
    Dead,
    /// The process may exist but liveness could not be confirmed.
    Unknown,
}

/// Capability to ask "is this local pid still running?".
pub trait LivenessProbe: Send + Sync {
    fn probe(&self, pid: i64) -> Liveness;
}

/// Probe using a zero signal (`kill(pid, 0)`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalProbe;

#[cfg(unix)]
impl LivenessProbe for SignalProbe {
    fn probe(&self, pid: i64) -> Liveness {
        // 0 and negative values address process groups, not a single process.
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return Liveness::Unknown;
        };
        if pid <= 0 {
            return Liveness::Unknown;
        }

        // SAFETY: signal 0 performs the existence and permission checks
        // without delivering anything.
        let result = unsafe { libc::kill(pid, 0) };
        if result == 0 {
            return Liveness::Alive;
        }

        match std::io::Error::last_os_error().raw_os_error() {
            Some(libc::ESRCH) => Liveness::Dead,
            // EPERM: exists, owned by someone we cannot signal.
            _ => Liveness::Unknown,
        }
    }
}

#[cfg(not(unix))]
impl LivenessProbe for SignalProbe {
    fn probe(&self, _pid: i64) -> Liveness {
        Liveness::Unknown
    }
}
