// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Primary-core routine: startup handshake, then soft UART to console echo.

use embedded_io::Write;

use crate::board::BANNER;
use crate::control::RunControl;
use crate::mailbox::Mailbox;
use crate::soft_uart::SoftUartRx;
use crate::text::TextRef;

/// Writes the startup banner. Must happen before the echo loop starts so the
/// banner never lands in the middle of echoed data.
pub fn announce<C: Write>(console: &mut C) {
    let _ = console.write_all(BANNER.as_bytes());
    let _ = console.flush();
}

/// Echoes every byte received on the soft UART to the console, unmodified.
///
/// Write failures on the console are dropped silently; there is no flow
/// control to push back with.
pub struct ReceiveLoop<C, R> {
    console: C,
    receiver: R,
    echoed: u64,
}

impl<C: Write, R: SoftUartRx> ReceiveLoop<C, R> {
    pub fn new(console: C, receiver: R) -> Self {
        Self {
            console,
            receiver,
            echoed: 0,
        }
    }

    /// Starts the secondary core and posts its one message.
    ///
    /// `launch` must not wait for the secondary core; the mailbox is what
    /// synchronises the two.
    pub fn hand_off<M, L>(&mut self, mailbox: &mut M, launch: L, text: TextRef)
    where
        M: Mailbox,
        L: FnOnce(),
    {
        launch();
        mailbox.send(text.to_word());
    }

    /// Blocks for one byte and writes it to the console.
    pub fn echo_one(&mut self) -> u8 {
        let byte = self.receiver.receive_byte();
        let _ = self.console.write_all(&[byte]);
        self.echoed += 1;
        byte
    }

    /// Runs the echo loop until `control` says stop. Returns the number of
    /// bytes echoed by this call. On the device `control` is
    /// [`crate::Forever`] and this never returns.
    pub fn run<K: RunControl>(&mut self, mut control: K) -> u64 {
        let start = self.echoed;
        while control.should_continue() {
            self.echo_one();
        }
        self.echoed - start
    }

    pub fn echoed(&self) -> u64 {
        self.echoed
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn into_parts(self) -> (C, R) {
        (self.console, self.receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Iterations;
    use std::collections::VecDeque;

    struct ScriptedRx(VecDeque<u8>);

    impl SoftUartRx for ScriptedRx {
        fn receive_byte(&mut self) -> u8 {
            self.0.pop_front().expect("test receiver ran dry")
        }

        fn try_receive_byte(&mut self) -> Option<u8> {
            self.0.pop_front()
        }
    }

    #[derive(Default)]
    struct RecordingMailbox {
        sent: Vec<u32>,
    }

    impl Mailbox for RecordingMailbox {
        fn send(&mut self, word: u32) {
            self.sent.push(word);
        }

        fn try_send(&mut self, word: u32) -> Result<(), u32> {
            self.sent.push(word);
            Ok(())
        }

        fn receive(&mut self) -> u32 {
            unreachable!("primary core never receives")
        }

        fn try_receive(&mut self) -> Option<u32> {
            None
        }
    }

    fn rx(bytes: &[u8]) -> ScriptedRx {
        ScriptedRx(bytes.iter().copied().collect())
    }

    #[test]
    fn test_banner_precedes_echo() {
        let mut console = Vec::new();
        announce(&mut console);
        let mut echo = ReceiveLoop::new(console, rx(b"AB\n"));

        assert_eq!(echo.run(Iterations::new(3)), 3);

        let (console, _) = echo.into_parts();
        let mut expected = BANNER.as_bytes().to_vec();
        expected.extend_from_slice(b"AB\n");
        assert_eq!(console, expected);
    }

    #[test]
    fn test_echo_is_byte_exact_for_every_value() {
        let all: Vec<u8> = (0..=255).collect();
        let mut echo = ReceiveLoop::new(Vec::new(), rx(&all));
        assert_eq!(echo.run(Iterations::new(256)), 256);
        assert_eq!(echo.console(), &all);
        assert_eq!(echo.echoed(), 256);
    }

    #[test]
    fn test_run_consumes_only_what_it_is_allowed() {
        let mut echo = ReceiveLoop::new(Vec::new(), rx(b"xyz"));
        assert_eq!(echo.run(Iterations::new(2)), 2);
        let (console, mut receiver) = echo.into_parts();
        assert_eq!(console, b"xy");
        assert_eq!(receiver.try_receive_byte(), Some(b'z'));
    }

    #[test]
    fn test_hand_off_launches_before_sending() {
        let mut echo = ReceiveLoop::new(Vec::new(), rx(b""));
        let mut mailbox = RecordingMailbox::default();
        let mut launched = false;

        echo.hand_off(&mut mailbox, || launched = true, TextRef::DEMO);

        assert!(launched);
        assert_eq!(mailbox.sent, vec![TextRef::DEMO.to_word()]);
    }
}
