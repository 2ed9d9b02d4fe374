// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Inter-core FIFOs and the bootrom's core 1 launch protocol.

use uart_mux_core::Mailbox;

use crate::regs::{
    self, FIFO_ST_RDY, FIFO_ST_VLD, PSM_FRCE_OFF, PSM_PROC1, SCB_VTOR, SIO_FIFO_RD, SIO_FIFO_ST,
    SIO_FIFO_WR,
};

/// This core's end of the SIO FIFO pair. The same registers address the
/// outgoing FIFO on either core, so both ends are the same type.
#[derive(Debug, Default)]
pub struct SioMailbox {
    _private: (),
}

impl SioMailbox {
    pub const fn new() -> Self {
        Self { _private: () }
    }

    fn drain(&mut self) {
        while regs::read(SIO_FIFO_ST) & FIFO_ST_VLD != 0 {
            let _ = regs::read(SIO_FIFO_RD);
        }
    }
}

impl Mailbox for SioMailbox {
    fn send(&mut self, word: u32) {
        while regs::read(SIO_FIFO_ST) & FIFO_ST_RDY == 0 {
            cortex_m::asm::nop();
        }
        regs::write(SIO_FIFO_WR, word);
        cortex_m::asm::sev();
    }

    fn try_send(&mut self, word: u32) -> Result<(), u32> {
        if regs::read(SIO_FIFO_ST) & FIFO_ST_RDY == 0 {
            return Err(word);
        }
        regs::write(SIO_FIFO_WR, word);
        cortex_m::asm::sev();
        Ok(())
    }

    fn receive(&mut self) -> u32 {
        while regs::read(SIO_FIFO_ST) & FIFO_ST_VLD == 0 {
            cortex_m::asm::wfe();
        }
        regs::read(SIO_FIFO_RD)
    }

    fn try_receive(&mut self) -> Option<u32> {
        (regs::read(SIO_FIFO_ST) & FIFO_ST_VLD != 0).then(|| regs::read(SIO_FIFO_RD))
    }
}

/// Resets core 1 and hands the bootrom its vector table, stack and entry
/// point. Returns once core 1 has echoed the whole sequence back; it does
/// not wait for `entry` to run.
///
/// # Safety
/// `stack_top` must be the 8-byte aligned end of memory reserved for core 1
/// alone, and core 1 must not be running anything that needs to survive.
pub unsafe fn launch_core1(stack_top: *mut usize, entry: extern "C" fn() -> !) {
    regs::set_bits(PSM_FRCE_OFF, PSM_PROC1);
    while regs::read(PSM_FRCE_OFF) & PSM_PROC1 == 0 {}
    regs::clear_bits(PSM_FRCE_OFF, PSM_PROC1);

    let vector_table = regs::read(SCB_VTOR);
    let sequence = [
        0,
        0,
        1,
        vector_table,
        stack_top as usize as u32,
        entry as usize as u32,
    ];

    let mut fifo = SioMailbox::new();
    let mut step = 0;
    while step < sequence.len() {
        let cmd = sequence[step];
        if cmd == 0 {
            fifo.drain();
            cortex_m::asm::sev();
        }
        fifo.send(cmd);
        let reply = fifo.receive();
        step = if reply == cmd { step + 1 } else { 0 };
    }
}
