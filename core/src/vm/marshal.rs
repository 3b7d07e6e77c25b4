//! Submitting console calls from other threads.
//!
//! A [`Console`] is single-threaded. Other threads hold a [`ConsoleHandle`]
//! that posts requests into the console's [`Mailbox`]; the owning thread
//! drains it with [`Console::process_mailbox`] and each caller blocks until
//! its reply arrives.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::debug;

use super::Console;

#[derive(Debug)]
struct Request {
    argv: Vec<String>,
    reply: Sender<String>,
}

/// Sending side. Cheap to clone and safe to move across threads.
#[derive(Debug, Clone)]
pub struct ConsoleHandle {
    tx: Sender<Request>,
}

/// Receiving side, kept on the console's thread.
#[derive(Debug)]
pub struct Mailbox {
    rx: Receiver<Request>,
}

impl ConsoleHandle {
    /// Run `argv` as a global call on the console's thread and wait for
    /// the result.
    pub fn execute(&self, argv: &[&str]) -> Result<String> {
        let (reply, result) = channel::bounded(1);
        let request = Request {
            argv: argv.iter().map(|a| (*a).to_owned()).collect(),
            reply,
        };
        self.tx
            .send(request)
            .map_err(|_| anyhow!("console is closed"))?;
        result
            .recv()
            .context("console dropped the request before replying")
    }
}

impl Mailbox {
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Console {
    /// A new submission channel for this console.
    pub fn mailbox() -> (ConsoleHandle, Mailbox) {
        let (tx, rx) = channel::unbounded();
        (ConsoleHandle { tx }, Mailbox { rx })
    }

    /// Execute every request queued so far. Returns how many ran.
    pub fn process_mailbox(&mut self, mailbox: &Mailbox) -> usize {
        let mut handled = 0;
        while let Ok(request) = mailbox.rx.try_recv() {
            self.answer(request);
            handled += 1;
        }
        if handled > 0 {
            debug!(handled, "processed console mailbox");
        }
        handled
    }

    /// Wait up to `timeout` for one request and execute it. `Ok(false)` on
    /// timeout; an error once every handle is gone.
    pub fn process_one(&mut self, mailbox: &Mailbox, timeout: Duration) -> Result<bool> {
        match mailbox.rx.recv_timeout(timeout) {
            Ok(request) => {
                self.answer(request);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("every console handle was dropped")),
        }
    }

    fn answer(&mut self, request: Request) {
        let argv: Vec<&str> = request.argv.iter().map(String::as_str).collect();
        let result = self.execute(&argv);
        // The caller may have given up; nothing to do then.
        let _ = request.reply.send(result);
    }
}
