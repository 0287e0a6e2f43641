//! `sprinklr start`, `sprinklr stop` and `sprinklr watch`.

use anyhow::bail;
use console::Term;
use sprinklr::clock::{Clock, SystemClock};
use sprinklr::input::ZoneSelection;
use sprinklr::{ControllerHandle, SessionEvent, SessionStatus, Snapshot};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::render;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Follow {
    /// Return once the run ends; Ctrl-C stops the run first
    UntilIdle,
    /// Keep following; Ctrl-C just detaches
    Forever,
}

pub async fn start(
    handle: &ControllerHandle,
    zone: u32,
    minutes: &str,
    detach: bool,
) -> anyhow::Result<()> {
    let term = Term::stdout();
    handle.wait_for(Snapshot::is_settled).await?;

    handle.start(ZoneSelection::from_raw(zone), minutes).await?;
    let snapshot = handle.wait_for(|s| !s.busy).await?;
    term.write_line(&render::status_line(&snapshot, SystemClock.now_millis()))?;
    if !snapshot.session.is_active() {
        bail!("{}", snapshot.session.message);
    }
    if detach {
        return Ok(());
    }

    follow(handle, &term, Follow::UntilIdle).await
}

pub async fn stop(handle: &ControllerHandle) -> anyhow::Result<()> {
    handle.wait_for(Snapshot::is_settled).await?;
    handle.stop().await?;

    let snapshot = handle.wait_for(Snapshot::is_settled).await?;
    println!("{}", render::status_line(&snapshot, SystemClock.now_millis()));
    if snapshot.session.status == SessionStatus::Error {
        bail!("{}", snapshot.session.message);
    }
    Ok(())
}

pub async fn watch(handle: &ControllerHandle) -> anyhow::Result<()> {
    let term = Term::stdout();
    let snapshot = handle.wait_for(Snapshot::is_settled).await?;
    term.write_line(&render::status_line(&snapshot, SystemClock.now_millis()))?;

    follow(handle, &term, Follow::Forever).await
}

async fn follow(handle: &ControllerHandle, term: &Term, mode: Follow) -> anyhow::Result<()> {
    let mut events = handle.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                term.clear_line()?;
                info!(component = "cli", event = "cli.interrupted", mode = ?mode);
                if mode == Follow::UntilIdle {
                    if let Err(rejected) = handle.stop().await {
                        term.write_line(&format!("  {rejected}"))?;
                    }
                    let snapshot = handle.wait_for(Snapshot::is_settled).await?;
                    term.write_line(&render::status_line(&snapshot, SystemClock.now_millis()))?;
                }
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Countdown { zone, remaining }) => {
                    let label = handle.snapshot().zone_label(zone);
                    term.clear_line()?;
                    term.write_str(&render::countdown_line(&label, remaining))?;
                }
                Ok(SessionEvent::Changed(session)) => {
                    term.clear_line()?;
                    let snapshot = handle.snapshot();
                    term.write_line(&render::status_line(&snapshot, SystemClock.now_millis()))?;
                    let finished = matches!(session.status, SessionStatus::Idle | SessionStatus::Error);
                    if mode == Follow::UntilIdle && finished {
                        // Let an expiry stop land before the runtime shuts down.
                        let snapshot = handle.wait_for(Snapshot::is_settled).await?;
                        if snapshot.session.status != session.status {
                            term.write_line(&render::status_line(&snapshot, SystemClock.now_millis()))?;
                        }
                        return Ok(());
                    }
                }
                Ok(SessionEvent::ZonesLoaded(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(component = "cli", skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}
