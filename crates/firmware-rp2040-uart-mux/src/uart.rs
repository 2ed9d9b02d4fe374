// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::convert::Infallible;

use crate::regs::{self, FUNCSEL_UART};

const UARTDR: u32 = 0x000;
const UARTFR: u32 = 0x018;
const UARTIBRD: u32 = 0x024;
const UARTFBRD: u32 = 0x028;
const UARTLCR_H: u32 = 0x02c;
const UARTCR: u32 = 0x030;

const FR_BUSY: u32 = 1 << 3;
const FR_TXFF: u32 = 1 << 5;
const LCR_H_FEN: u32 = 1 << 4;
const LCR_H_WLEN_8: u32 = 0b11 << 5;
const CR_UARTEN: u32 = 1 << 0;
const CR_TXE: u32 = 1 << 8;
const CR_RXE: u32 = 1 << 9;

/// PL011 hard UART, transmit side only. 8N1 with FIFOs enabled.
///
/// Handles are plain base addresses, so one core can set the peripheral up
/// and another can write through its own handle afterwards.
#[derive(Debug, Clone, Copy)]
pub struct HardUart {
    base: u32,
}

impl HardUart {
    /// Programs the baud divisors and routes `tx`/`rx` to the UART.
    /// The block must already be out of reset with clk_peri running.
    pub fn enable(base: u32, peri_clk_hz: u32, baud: u32, tx: u8, rx: u8) -> Self {
        let div = 8 * peri_clk_hz as u64 / baud as u64;
        let (ibrd, fbrd) = match (div >> 7) as u32 {
            0 => (1, 0),
            i if i >= 0xffff => (0xffff, 0),
            i => (i, (((div & 0x7f) + 1) / 2) as u32),
        };

        regs::write(base + UARTCR, 0);
        regs::write(base + UARTIBRD, ibrd);
        regs::write(base + UARTFBRD, fbrd);
        // LCR_H write latches the divisors.
        regs::write(base + UARTLCR_H, LCR_H_WLEN_8 | LCR_H_FEN);
        regs::write(base + UARTCR, CR_UARTEN | CR_TXE | CR_RXE);

        regs::gpio_function(tx, FUNCSEL_UART);
        regs::gpio_function(rx, FUNCSEL_UART);
        Self { base }
    }

    /// Handle to a UART another core already enabled.
    pub const fn attach(base: u32) -> Self {
        Self { base }
    }

    fn write_byte(&mut self, byte: u8) {
        while regs::read(self.base + UARTFR) & FR_TXFF != 0 {
            cortex_m::asm::nop();
        }
        regs::write(self.base + UARTDR, byte as u32);
    }
}

impl embedded_io::ErrorType for HardUart {
    type Error = Infallible;
}

impl embedded_io::Write for HardUart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &byte in buf {
            self.write_byte(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        while regs::read(self.base + UARTFR) & FR_BUSY != 0 {}
        Ok(())
    }
}
