// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// Byte source backed by a PIO state machine running a receive program.
///
/// Implementations own their [`crate::PeripheralBinding`]; nothing else may
/// touch that state machine while the receiver exists.
pub trait SoftUartRx {
    /// Blocks until one frame has been decoded.
    fn receive_byte(&mut self) -> u8;

    /// Returns a byte if one is already waiting in the RX FIFO.
    fn try_receive_byte(&mut self) -> Option<u8>;
}

impl<T: SoftUartRx + ?Sized> SoftUartRx for &mut T {
    fn receive_byte(&mut self) -> u8 {
        (**self).receive_byte()
    }

    fn try_receive_byte(&mut self) -> Option<u8> {
        (**self).try_receive_byte()
    }
}

/// Extracts the received byte from an RX FIFO word.
///
/// Eight bits are shifted right into a 32-bit ISR, so the byte sits in the
/// top eight bits.
pub fn byte_from_rx_word(word: u32) -> u8 {
    (word >> 24) as u8
}
