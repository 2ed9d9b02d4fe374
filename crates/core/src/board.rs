// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Build-time wiring of the multiplexer. Nothing in here changes at runtime.

use crate::pool::Chip;
use crate::program::RxProgram;

/// Target chip the firmware is built for.
pub const CHIP: Chip = Chip::Rp2040;

/// Line rate shared by the soft-UART input, the hard UART and the console.
pub const SERIAL_BAUD: u32 = 115_200;

/// Soft-UART input from the host machine.
pub const SOFT_UART_RX_PIN: u8 = 3;

/// Hard UART (UART1) transmit pin.
pub const HARD_UART_TX_PIN: u8 = 4;
/// UART1 receive pin. Claimed with the peripheral, never read.
pub const HARD_UART_RX_PIN: u8 = 5;

/// Console UART (UART0) pins.
pub const CONSOLE_TX_PIN: u8 = 0;
pub const CONSOLE_RX_PIN: u8 = 1;

/// External crystal on the Pico board.
pub const XTAL_FREQ_HZ: u32 = 12_000_000;
/// System clock after `init_clocks_and_plls`; the PIO divider is derived from it.
pub const SYS_CLK_HZ: u32 = 125_000_000;

/// Which receive microprogram is loaded into the state machine.
pub const RX_PROGRAM: RxProgram = RxProgram::Full;

/// Written to the console once, before any echoed byte.
pub const BANNER: &str = "Starting PIO UART RX example\n";

const _: () = assert!(
    SOFT_UART_RX_PIN < CHIP.bank0_gpios(),
    "soft-UART RX pin is not a bank0 GPIO on the target chip"
);
