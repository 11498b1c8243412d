//! Final-step handoff: replace the launcher with the bot, or supervise it
//!
//! `exec` keeps the launcher's PID, so the container runtime's signals reach
//! the bot directly. `supervise` is the fallback where `execve` is not
//! available: the bot runs as a child, and termination signals received by
//! the launcher are relayed to it.

use crate::core::config::HandoffMode;
use crate::process::{Invocation, PhaseOutcome, ProcessError};
use std::io::Write;
use tracing::{debug, info, warn};

/// Hand the process over to `invocation` according to `mode`.
///
/// With [`HandoffMode::Exec`] this only returns on failure.
pub async fn hand_off(
    invocation: &Invocation,
    mode: HandoffMode,
) -> Result<PhaseOutcome, ProcessError> {
    match mode {
        HandoffMode::Exec => {
            #[cfg(unix)]
            {
                Err(exec_replace(invocation))
            }
            #[cfg(not(unix))]
            {
                warn!("exec handoff is not supported on this platform, supervising instead");
                supervise(invocation).await
            }
        }
        HandoffMode::Supervise => supervise(invocation).await,
    }
}

/// Replace the current process image with `invocation`.
///
/// Never returns on success. Buffered stdout is flushed first so progress
/// markers are not lost with the old image.
#[cfg(unix)]
pub fn exec_replace(invocation: &Invocation) -> ProcessError {
    use std::os::unix::process::CommandExt;

    info!(command = %invocation.display(), "replacing launcher process");
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    let source = invocation.std_command().exec();

    // If we reach here, exec failed
    ProcessError::Exec {
        program: invocation.program.clone(),
        source,
    }
}

/// Spawn `invocation` as a child, relay signals, and wait for it
pub async fn supervise(invocation: &Invocation) -> Result<PhaseOutcome, ProcessError> {
    let _ = std::io::stdout().flush();

    // Handlers go in before the spawn so no signal can hit the default action
    let mut relay = SignalRelay::install()?;

    let mut command = invocation.tokio_command();
    // Own process group: terminal signals reach the bot once, through the relay
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

    info!(pid = ?child.id(), command = %invocation.display(), "supervising bot process");

    let status = relay.wait(&mut child, &invocation.program).await?;
    let outcome = PhaseOutcome::from_status(status);
    debug!(?outcome, "supervised process exited");
    Ok(outcome)
}

/// Termination and user signals received by the launcher, relayed to the child
#[cfg(unix)]
struct SignalRelay {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
    sighup: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
    sigusr1: tokio::signal::unix::Signal,
    sigusr2: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalRelay {
    fn install() -> Result<Self, ProcessError> {
        use tokio::signal::unix::{signal, SignalKind};

        let listen = |kind| signal(kind).map_err(ProcessError::Signals);
        Ok(Self {
            sigterm: listen(SignalKind::terminate())?,
            sigint: listen(SignalKind::interrupt())?,
            sighup: listen(SignalKind::hangup())?,
            sigquit: listen(SignalKind::quit())?,
            sigusr1: listen(SignalKind::user_defined1())?,
            sigusr2: listen(SignalKind::user_defined2())?,
        })
    }

    /// Wait for the child, forwarding every received signal until it exits
    async fn wait(
        &mut self,
        child: &mut tokio::process::Child,
        program: &str,
    ) -> Result<std::process::ExitStatus, ProcessError> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = child.id();

        loop {
            let forwarded = tokio::select! {
                status = child.wait() => {
                    return status.map_err(|source| ProcessError::Wait {
                        program: program.to_string(),
                        source,
                    });
                }
                _ = self.sigterm.recv() => Signal::SIGTERM,
                _ = self.sigint.recv() => Signal::SIGINT,
                _ = self.sighup.recv() => Signal::SIGHUP,
                _ = self.sigquit.recv() => Signal::SIGQUIT,
                _ = self.sigusr1.recv() => Signal::SIGUSR1,
                _ = self.sigusr2.recv() => Signal::SIGUSR2,
            };

            match pid {
                Some(pid) => {
                    debug!(signal = %forwarded, pid, "forwarding signal to bot");
                    if let Err(e) = kill(Pid::from_raw(pid as i32), forwarded) {
                        warn!(signal = %forwarded, pid, "failed to forward signal: {}", e);
                    }
                }
                None => warn!(signal = %forwarded, "bot already reaped, signal dropped"),
            }
        }
    }
}

#[cfg(not(unix))]
struct SignalRelay;

#[cfg(not(unix))]
impl SignalRelay {
    fn install() -> Result<Self, ProcessError> {
        Ok(Self)
    }

    async fn wait(
        &mut self,
        child: &mut tokio::process::Child,
        program: &str,
    ) -> Result<std::process::ExitStatus, ProcessError> {
        child.wait().await.map_err(|source| ProcessError::Wait {
            program: program.to_string(),
            source,
        })
    }
}
