//! The forever loop around [`Dispatcher::run_pass`].
//!
//! A pass that fails or panics is logged and the loop sleeps as usual; the
//! next pass starts from a fresh load of the feeds and the seen store.
//! Ctrl-C while sleeping ends the loop.

use futures::FutureExt;
use std::any::Any;
use std::error::Error;
use std::panic::AssertUnwindSafe;
use tokio::signal;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatch::Dispatcher;
use crate::http::HttpFetch;
use crate::sink::MessageSink;

/// Run passes every poll interval until interrupted, or once with `--once`.
#[instrument(level = "info", skip_all)]
pub async fn run<H: HttpFetch, S: MessageSink>(dispatcher: &Dispatcher<H, S>) {
    let interval = dispatcher.settings().poll_interval;
    let once = dispatcher.settings().once;
    info!(interval_secs = interval.as_secs(), once, "Poll loop starting");

    let mut pass = 0u64;
    loop {
        pass += 1;
        guarded_pass(pass, dispatcher.run_pass()).await;
        if once {
            info!("Single pass requested; exiting");
            return;
        }

        debug!(pass, sleep_secs = interval.as_secs(), "Sleeping until next pass");
        tokio::select! {
            _ = sleep(interval) => {}
            interrupted = signal::ctrl_c() => match interrupted {
                Ok(()) => {
                    info!(pass, "Interrupted; shutting down");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Cannot listen for Ctrl-C");
                    sleep(interval).await;
                }
            },
        }
    }
}

/// Await one pass, turning both errors and panics into a log line.
async fn guarded_pass<F>(pass: u64, fut: F) -> Option<usize>
where
    F: Future<Output = Result<usize, Box<dyn Error>>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(delivered)) => Some(delivered),
        Ok(Err(e)) => {
            error!(pass, error = %e, "Pass failed; retrying next cycle");
            None
        }
        Err(payload) => {
            error!(pass, panic = %panic_message(payload.as_ref()), "Pass panicked; retrying next cycle");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
