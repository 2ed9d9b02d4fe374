// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Raspberry Pi Pico firmware.
//!
//! Core 0 prints the banner on UART0, claims a PIO state machine for the
//! soft-UART receiver on GPIO 3, starts core 1 and echoes every received
//! byte back out on UART0. Core 1 waits for one mailbox word and writes the
//! demo text to UART1 (GPIO 4).

#![no_std]
#![no_main]

mod clocks;
mod pio;
mod regs;
mod sio;
mod uart;

use cortex_m_rt::entry;
use panic_halt as _;

use uart_mux_core::board::{
    CHIP, CONSOLE_RX_PIN, CONSOLE_TX_PIN, HARD_UART_RX_PIN, HARD_UART_TX_PIN, RX_PROGRAM,
    SERIAL_BAUD, SOFT_UART_RX_PIN, SYS_CLK_HZ,
};
use uart_mux_core::{announce, Forever, PioPool, ReceiveLoop, TextRef, TransmitWorker};

use crate::pio::PioSoftUart;
use crate::regs::{
    RESET_IO_BANK0, RESET_PADS_BANK0, RESET_PIO0, RESET_PIO1, RESET_UART0, RESET_UART1,
    UART0_BASE, UART1_BASE,
};
use crate::sio::SioMailbox;
use crate::uart::HardUart;

#[link_section = ".boot2"]
#[used]
pub static BOOT2_FIRMWARE: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

const CORE1_STACK_WORDS: usize = 1024;

#[repr(C, align(8))]
struct Core1Stack([usize; CORE1_STACK_WORDS]);

static mut CORE1_STACK: Core1Stack = Core1Stack([0; CORE1_STACK_WORDS]);

extern "C" fn core1_main() -> ! {
    let mut worker = TransmitWorker::new(HardUart::attach(UART1_BASE), SioMailbox::new());
    worker.run(Forever);
    loop {
        cortex_m::asm::wfe();
    }
}

#[entry]
fn main() -> ! {
    clocks::init();
    regs::unreset(
        RESET_IO_BANK0 | RESET_PADS_BANK0 | RESET_UART0 | RESET_UART1 | RESET_PIO0 | RESET_PIO1,
    );

    let mut console = HardUart::enable(
        UART0_BASE,
        SYS_CLK_HZ,
        SERIAL_BAUD,
        CONSOLE_TX_PIN,
        CONSOLE_RX_PIN,
    );
    // Core 1 only attaches to UART1, so it is set up here.
    HardUart::enable(
        UART1_BASE,
        SYS_CLK_HZ,
        SERIAL_BAUD,
        HARD_UART_TX_PIN,
        HARD_UART_RX_PIN,
    );
    announce(&mut console);

    let code = RX_PROGRAM.assemble();
    let mut pool = PioPool::new(CHIP);
    let Ok(binding) = pool.claim_soft_uart(&code, SOFT_UART_RX_PIN, SERIAL_BAUD) else {
        panic!("no PIO resources for the soft UART");
    };
    let receiver = PioSoftUart::start(&binding, &code, RX_PROGRAM, SYS_CLK_HZ);

    let mut echo = ReceiveLoop::new(console, receiver);
    let mut mailbox = SioMailbox::new();
    echo.hand_off(
        &mut mailbox,
        || {
            // SAFETY: the stack is only ever handed to core 1, once.
            unsafe {
                let stack_top = core::ptr::addr_of_mut!(CORE1_STACK.0)
                    .cast::<usize>()
                    .add(CORE1_STACK_WORDS);
                sio::launch_core1(stack_top, core1_main);
            }
        },
        TextRef::DEMO,
    );

    echo.run(Forever);

    pool.release(&binding);
    loop {
        cortex_m::asm::wfe();
    }
}
