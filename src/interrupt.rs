//! Ctrl-C teardown.
//!
//! [`arm`] starts a watcher thread that owns only a `Weak` handle to the
//! session's [`TableSlot`]. On the first interrupt it takes the table out of
//! the slot, prints a newline and exits the process with status 0. The
//! command loop never runs again after that.
//!
//! A command that is mid-flight holds its own `Arc` to the table. Taking the
//! slot then only drops the slot's reference; the table itself is reclaimed
//! when the process exits.
use std::io::{self, Write};
use std::sync::{Arc, Weak, mpsc};
use std::thread;

use log::{debug, info};

use crate::slot::TableSlot;

/// What [`teardown`] found in the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// The slot held the last reference and the table was dropped.
    Released,
    /// The table was taken out of the slot but a running command still
    /// holds a reference to it.
    InUse,
    /// The slot was gone or already empty.
    Empty,
}

/// Take whatever the slot still holds and drop it if nothing else does.
pub fn teardown<T>(slot: &Weak<TableSlot<T>>) -> TeardownOutcome {
    match slot.upgrade().and_then(|s| s.take()) {
        Some(table) => match Arc::into_inner(table) {
            Some(_) => TeardownOutcome::Released,
            None => TeardownOutcome::InUse,
        },
        None => TeardownOutcome::Empty,
    }
}

/// Install the interrupt handler. Returns once the handler is registered,
/// so a signal arriving afterwards is never handled by the default action.
pub fn arm<T: Send + Sync + 'static>(slot: Weak<TableSlot<T>>) -> io::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (armed_tx, armed_rx) = mpsc::channel::<io::Result<()>>();
    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            let waited = rt.block_on(wait_for_interrupt(armed_tx));
            if waited.is_err() {
                return;
            }
            info!("interrupt received, releasing table");
            match teardown(&slot) {
                TeardownOutcome::InUse => {
                    debug!("table detached on interrupt, still held by a running command")
                }
                outcome => debug!("teardown on interrupt: {:?}", outcome),
            }
            let mut out = io::stdout();
            let _ = writeln!(out);
            let _ = out.flush();
            std::process::exit(0);
        })?;
    armed_rx
        .recv()
        .map_err(|_| io::Error::other("interrupt watcher exited before arming"))?
}

#[cfg(unix)]
async fn wait_for_interrupt(armed: mpsc::Sender<io::Result<()>>) -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sig = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            let kind = e.kind();
            let _ = armed.send(Err(e));
            return Err(io::Error::from(kind));
        }
    };
    let _ = armed.send(Ok(()));
    sig.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_interrupt(armed: mpsc::Sender<io::Result<()>>) -> io::Result<()> {
    let _ = armed.send(Ok(()));
    tokio::signal::ctrl_c().await
}
