// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Secondary-core routine: wait for a text reference, write it to the hard UART.

use embedded_io::Write;

use crate::control::RunControl;
use crate::mailbox::Mailbox;
use crate::text::TextRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    AwaitingMessage,
    Transmitting,
}

/// Owns the hard UART and the secondary core's end of the mailbox.
///
/// Never reports anything back to the primary core. Unknown words are
/// dropped, write errors are ignored.
pub struct TransmitWorker<U, M> {
    uart: U,
    mailbox: M,
    state: WorkerState,
    delivered: u32,
    dropped: u32,
}

impl<U: Write, M: Mailbox> TransmitWorker<U, M> {
    pub fn new(uart: U, mailbox: M) -> Self {
        Self {
            uart,
            mailbox,
            state: WorkerState::Idle,
            delivered: 0,
            dropped: 0,
        }
    }

    /// Serves messages until `control` says stop. After the single startup
    /// message this sits in [`Mailbox::receive`] for the rest of the run.
    pub fn run<K: RunControl>(&mut self, mut control: K) -> u32 {
        let start = self.delivered;
        while control.should_continue() {
            self.serve_one();
        }
        self.delivered - start
    }

    /// Blocks for one word and transmits the text it names.
    pub fn serve_one(&mut self) -> Option<TextRef> {
        self.state = WorkerState::AwaitingMessage;
        let word = self.mailbox.receive();
        self.handle(word)
    }

    /// Non-blocking variant of [`Self::serve_one`]; `None` if no word was
    /// waiting or the word named no text.
    pub fn poll(&mut self) -> Option<TextRef> {
        self.state = WorkerState::AwaitingMessage;
        match self.mailbox.try_receive() {
            Some(word) => self.handle(word),
            None => {
                self.state = WorkerState::Idle;
                None
            }
        }
    }

    fn handle(&mut self, word: u32) -> Option<TextRef> {
        let Some(text) = TextRef::from_word(word) else {
            self.dropped += 1;
            self.state = WorkerState::Idle;
            return None;
        };

        self.state = WorkerState::Transmitting;
        let _ = self.uart.write_all(text.text().as_bytes());
        let _ = self.uart.flush();
        self.delivered += 1;
        self.state = WorkerState::Idle;
        Some(text)
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn delivered(&self) -> u32 {
        self.delivered
    }

    /// Words received that did not name a text.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn uart(&self) -> &U {
        &self.uart
    }

    pub fn into_parts(self) -> (U, M) {
        (self.uart, self.mailbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Iterations;
    use crate::text::DEMO_TEXT;

    /// Single-threaded slot: `receive` on an empty slot is a test bug.
    #[derive(Default)]
    struct Slot(Option<u32>);

    impl Mailbox for Slot {
        fn send(&mut self, word: u32) {
            assert!(self.0.is_none(), "slot already full");
            self.0 = Some(word);
        }

        fn try_send(&mut self, word: u32) -> Result<(), u32> {
            match self.0 {
                Some(_) => Err(word),
                None => {
                    self.0 = Some(word);
                    Ok(())
                }
            }
        }

        fn receive(&mut self) -> u32 {
            self.0.take().expect("would block forever")
        }

        fn try_receive(&mut self) -> Option<u32> {
            self.0.take()
        }
    }

    #[test]
    fn test_nothing_written_before_message() {
        let mut worker = TransmitWorker::new(Vec::new(), Slot::default());
        assert_eq!(worker.state(), WorkerState::Idle);
        assert_eq!(worker.poll(), None);
        assert!(worker.uart().is_empty());
        assert_eq!(worker.delivered(), 0);
    }

    #[test]
    fn test_demo_text_written_once() {
        let mut mailbox = Slot::default();
        mailbox.send(TextRef::DEMO.to_word());
        let mut worker = TransmitWorker::new(Vec::new(), mailbox);

        assert_eq!(worker.run(Iterations::new(1)), 1);
        assert_eq!(worker.state(), WorkerState::Idle);
        assert_eq!(worker.uart(), DEMO_TEXT.as_bytes());

        // Nothing else arrives, so a second poll leaves the output alone.
        assert_eq!(worker.poll(), None);
        assert_eq!(worker.uart(), DEMO_TEXT.as_bytes());
    }

    #[test]
    fn test_unknown_word_is_dropped() {
        let mut mailbox = Slot::default();
        mailbox.send(0xdead_beef);
        let mut worker = TransmitWorker::new(Vec::new(), mailbox);

        assert_eq!(worker.serve_one(), None);
        assert_eq!(worker.dropped(), 1);
        assert_eq!(worker.delivered(), 0);
        assert!(worker.uart().is_empty());
    }
}
