// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Host stand-in for the SIO inter-core FIFOs.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use uart_mux_core::Mailbox;

/// One core's end of a pair of single-slot channels.
///
/// Each direction holds one word: `send` blocks until the peer has taken the
/// previous one. A send to a peer that has gone away is logged and dropped.
/// A receive from a peer that has gone away parks the thread, the same as a
/// core waiting on a FIFO nobody will ever write.
#[derive(Debug)]
pub struct FifoMailbox {
    core: &'static str,
    tx: Sender<u32>,
    rx: Receiver<u32>,
}

impl FifoMailbox {
    /// Both ends, for core 0 and core 1 in that order.
    pub fn pair() -> (FifoMailbox, FifoMailbox) {
        let (to_core1, from_core0) = bounded(1);
        let (to_core0, from_core1) = bounded(1);
        (
            FifoMailbox {
                core: "core0",
                tx: to_core1,
                rx: from_core1,
            },
            FifoMailbox {
                core: "core1",
                tx: to_core0,
                rx: from_core0,
            },
        )
    }

    /// Waits at most `timeout` for a word.
    pub fn receive_timeout(&mut self, timeout: Duration) -> Option<u32> {
        match self.rx.recv_timeout(timeout) {
            Ok(word) => {
                tracing::debug!(core = self.core, word = format_args!("{word:#010x}"), "mailbox receive");
                Some(word)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Mailbox for FifoMailbox {
    fn send(&mut self, word: u32) {
        tracing::debug!(core = self.core, word = format_args!("{word:#010x}"), "mailbox send");
        if self.tx.send(word).is_err() {
            tracing::warn!(core = self.core, "mailbox peer gone, word dropped");
        }
    }

    fn try_send(&mut self, word: u32) -> Result<(), u32> {
        match self.tx.try_send(word) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(word)) | Err(TrySendError::Disconnected(word)) => Err(word),
        }
    }

    fn receive(&mut self) -> u32 {
        match self.rx.recv() {
            Ok(word) => {
                tracing::debug!(core = self.core, word = format_args!("{word:#010x}"), "mailbox receive");
                word
            }
            Err(_) => {
                tracing::debug!(core = self.core, "mailbox peer gone, parking");
                loop {
                    std::thread::park();
                }
            }
        }
    }

    fn try_receive(&mut self) -> Option<u32> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_word_crosses_once() {
        let (mut core0, mut core1) = FifoMailbox::pair();
        core0.send(0x1234);
        assert_eq!(core1.receive(), 0x1234);
        assert_eq!(core1.try_receive(), None);
        assert_eq!(core1.receive_timeout(Duration::from_millis(20)), None);
    }

    #[test]
    fn test_single_slot_back_pressure() {
        let (mut core0, mut core1) = FifoMailbox::pair();
        assert_eq!(core0.try_send(1), Ok(()));
        assert_eq!(core0.try_send(2), Err(2));
        assert_eq!(core1.try_receive(), Some(1));
        assert_eq!(core0.try_send(2), Ok(()));
    }

    #[test]
    fn test_directions_are_independent() {
        let (mut core0, mut core1) = FifoMailbox::pair();
        core0.send(10);
        core1.send(20);
        assert_eq!(core0.receive(), 20);
        assert_eq!(core1.receive(), 10);
    }

    #[test]
    fn test_blocking_send_waits_for_peer() {
        let (mut core0, mut core1) = FifoMailbox::pair();
        core0.send(1);
        let sender = thread::spawn(move || {
            core0.send(2);
            core0
        });
        assert_eq!(core1.receive(), 1);
        assert_eq!(core1.receive(), 2);
        sender.join().unwrap();
    }

    #[test]
    fn test_send_to_dropped_peer_is_lost() {
        let (mut core0, core1) = FifoMailbox::pair();
        drop(core1);
        core0.send(7);
        assert_eq!(core0.try_send(8), Err(8));
    }
}
