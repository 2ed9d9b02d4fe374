// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// One core's end of the inter-core mailbox.
///
/// Words are delivered exactly once and in order. The slot between the two
/// ends holds at most one word, so a second `send` blocks until the first has
/// been received. This is a rendezvous point, not a queue.
pub trait Mailbox {
    /// Blocks while the peer has not consumed the previous word.
    fn send(&mut self, word: u32);

    /// Hands the word back if the slot is still full.
    fn try_send(&mut self, word: u32) -> Result<(), u32>;

    /// Blocks until the peer has posted a word.
    fn receive(&mut self) -> u32;

    fn try_receive(&mut self) -> Option<u32>;
}

impl<T: Mailbox + ?Sized> Mailbox for &mut T {
    fn send(&mut self, word: u32) {
        (**self).send(word)
    }

    fn try_send(&mut self, word: u32) -> Result<(), u32> {
        (**self).try_send(word)
    }

    fn receive(&mut self) -> u32 {
        (**self).receive()
    }

    fn try_receive(&mut self) -> Option<u32> {
        (**self).try_receive()
    }
}
