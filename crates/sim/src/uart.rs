// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::convert::Infallible;
use std::io::{self, Write as _};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Shared {
    bytes: Mutex<Vec<u8>>,
    grew: Condvar,
}

/// Transmit-only UART that records every byte written to it.
///
/// Clones share one buffer, so a test or the CLI can keep a handle while the
/// simulated core owns the writer.
#[derive(Debug, Clone, Default)]
pub struct CaptureUart {
    name: &'static str,
    shared: Arc<Shared>,
    echo_stdout: bool,
}

impl CaptureUart {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            shared: Arc::default(),
            echo_stdout: false,
        }
    }

    /// Also copy every byte to the host's stdout.
    pub fn with_stdout_echo(mut self, echo: bool) -> Self {
        self.echo_stdout = echo;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn contents(&self) -> Vec<u8> {
        match self.shared.bytes.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Waits until the captured output satisfies `done` or `timeout` passes.
    /// Returns whether `done` was satisfied.
    pub fn wait_until<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut(&[u8]) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let Ok(mut guard) = self.shared.bytes.lock() else {
            return false;
        };
        loop {
            if done(&guard) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = match self.shared.grew.wait_timeout(guard, deadline - now) {
                Ok((guard, _)) => guard,
                Err(_) => return false,
            };
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        if let Ok(mut guard) = self.shared.bytes.lock() {
            guard.extend_from_slice(bytes);
            self.shared.grew.notify_all();
        }

        if self.echo_stdout {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(bytes);
            let _ = stdout.flush();
        }
    }
}

impl embedded_io::ErrorType for CaptureUart {
    type Error = Infallible;
}

impl embedded_io::Write for CaptureUart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        tracing::trace!(uart = self.name, len = buf.len(), "uart tx");
        self.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
