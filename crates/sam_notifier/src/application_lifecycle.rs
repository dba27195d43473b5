//! Process-wide shutdown event: the signal handler broadcasts it, and whoever owns the session awaits it to stop
//! tracking before the process exits.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tokio::sync::broadcast;

static APPLICATION_EXIT_SENDER: Lazy<broadcast::Sender<()>> = Lazy::new(|| broadcast::channel(2).0);

/// Notify all listeners that the process should shut down.
pub fn send_exit() -> Result<()> {
    APPLICATION_EXIT_SENDER.send(()).context("Failed to send exit lifecycle event")?;
    Ok(())
}

/// Subscribe to the exit event. Subscribe before installing anything that may send it, so it can't be missed.
pub fn exit_receiver() -> broadcast::Receiver<()> {
    APPLICATION_EXIT_SENDER.subscribe()
}

/// Install handlers for SIGINT and SIGTERM that broadcast the exit event.
pub fn handle_termination_signals() {
    simple_signal::set_handler(&[simple_signal::Signal::Int, simple_signal::Signal::Term], move |_| {
        log::info!("Shutting down sam-notifier...");
        if let Err(e) = send_exit() {
            log::error!("Failed to send application shutdown event: {:?}", e);
            std::process::exit(1);
        }
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_exit_reaches_subscribers() {
        let mut recv = exit_receiver();
        send_exit().unwrap();
        assert_eq!(Ok(()), recv.try_recv());
    }
}
