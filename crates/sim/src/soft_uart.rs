// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crossbeam_channel::Receiver;
use uart_mux_core::program::{jmp_to, load_image, FRAMING_ERROR_IRQ, SET_PINDIRS_INPUT};
use uart_mux_core::sm_config::{sm_enable_mask, sm_restart_mask, Fstat};
use uart_mux_core::soft_uart::byte_from_rx_word;
use uart_mux_core::{PeripheralBinding, RxProgram, SmRegisters, SoftUartRx};

use crate::line::{Frame, UartLine};
use crate::pio::{
    sm_reg, PioBlock, CTRL, FSTAT, INSTR_MEM0, IRQ, RXF0, SM_CLKDIV, SM_EXECCTRL, SM_INSTR,
    SM_PINCTRL, SM_SHIFTCTRL,
};

/// Bit periods the receiver is given to finish a frame once the line goes
/// idle, before the wire is asked for more.
const SETTLE_BITS: u64 = 1;

/// Soft UART receiver running the real microprogram on a simulated PIO block.
///
/// Frames arrive over `wire` and are clocked onto the RX pin at the
/// configured baud rate. The state machine is programmed through the same
/// register sequence the firmware uses.
pub struct SimSoftUart {
    pio: PioBlock,
    line: UartLine,
    wire: Option<Receiver<Frame>>,
    binding: PeripheralBinding,
    settled: bool,
    ticks: u64,
    framing_errors: u32,
}

impl SimSoftUart {
    pub fn start(
        binding: PeripheralBinding,
        variant: RxProgram,
        sys_clk_hz: u32,
        wire: Receiver<Frame>,
    ) -> Self {
        let code = variant.assemble();
        let regs = SmRegisters::soft_uart_rx(&binding, &code, variant, sys_clk_hz);
        let sm = binding.state_machine;

        let mut pio = PioBlock::new(binding.gpio_base);
        pio.set_gpio(binding.pin, true);

        for (slot, instr) in load_image(&code, binding.offset) {
            pio.write_reg(INSTR_MEM0 + 4 * slot as u64, instr as u32);
        }

        let ctrl = pio.read_reg(CTRL);
        pio.write_reg(CTRL, ctrl & !sm_enable_mask(sm));

        pio.write_reg(sm_reg(sm, SM_PINCTRL), SmRegisters::pindir_pinctrl(&binding));
        pio.write_reg(sm_reg(sm, SM_INSTR), SET_PINDIRS_INPUT as u32);

        pio.write_reg(sm_reg(sm, SM_CLKDIV), regs.clkdiv);
        pio.write_reg(sm_reg(sm, SM_EXECCTRL), regs.execctrl);
        pio.write_reg(sm_reg(sm, SM_SHIFTCTRL), regs.shiftctrl);
        pio.write_reg(sm_reg(sm, SM_PINCTRL), regs.pinctrl);

        let ctrl = pio.read_reg(CTRL);
        pio.write_reg(CTRL, ctrl | sm_restart_mask(sm));
        pio.write_reg(sm_reg(sm, SM_INSTR), jmp_to(regs.initial_pc) as u32);
        let ctrl = pio.read_reg(CTRL);
        pio.write_reg(CTRL, ctrl | sm_enable_mask(sm));

        tracing::debug!(
            program = variant.name(),
            pio = binding.instance,
            sm,
            offset = binding.offset,
            pin = binding.pin,
            clkdiv = format_args!("{:#010x}", regs.clkdiv),
            "soft UART started"
        );

        Self {
            pio,
            line: UartLine::new(sys_clk_hz, binding.baud),
            wire: Some(wire),
            binding,
            settled: true,
            ticks: 0,
            framing_errors: 0,
        }
    }

    /// Advances line and PIO by one system clock tick.
    fn step(&mut self) {
        self.pio.set_gpio(self.binding.pin, self.line.level());
        self.pio.tick();
        self.line.tick();
        self.ticks += 1;

        let flag = 1 << (FRAMING_ERROR_IRQ + self.binding.state_machine);
        if self.pio.irq & flag != 0 {
            self.framing_errors += 1;
            self.pio.write_reg(IRQ, flag as u32);
            tracing::debug!(tick = self.ticks, "framing error, frame dropped");
        }
    }

    fn settle(&mut self) {
        let sm = self.binding.state_machine;
        for _ in 0..SETTLE_BITS * self.line.ticks_per_bit() {
            if !self.pio.fstat().rx_empty(sm) {
                break;
            }
            self.step();
        }
        self.settled = true;
    }

    /// Puts the next frame on the line, blocking until the wire delivers one.
    /// Returns `false` once the wire has been closed.
    fn feed(&mut self) -> bool {
        let Some(wire) = &self.wire else {
            return false;
        };
        match wire.recv() {
            Ok(frame) => {
                tracing::trace!(?frame, "frame on wire");
                self.line.queue(frame);
                self.settled = false;
                true
            }
            Err(_) => {
                tracing::debug!("wire closed");
                self.wire = None;
                false
            }
        }
    }

    pub fn binding(&self) -> &PeripheralBinding {
        &self.binding
    }

    pub fn framing_errors(&self) -> u32 {
        self.framing_errors
    }

    /// System clock ticks simulated so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn snapshot(&self) -> serde_json::Value {
        self.pio.snapshot()
    }
}

impl SoftUartRx for SimSoftUart {
    /// Blocks like the hardware receiver. Once the wire is closed and every
    /// frame has been decoded, the calling thread parks for good.
    fn receive_byte(&mut self) -> u8 {
        loop {
            if let Some(byte) = self.try_receive_byte() {
                return byte;
            }
            if !self.line.is_idle() {
                self.step();
                continue;
            }
            if !self.settled {
                self.settle();
                continue;
            }
            if !self.feed() {
                tracing::warn!("soft UART starved: wire closed, receiver parked");
                loop {
                    std::thread::park();
                }
            }
        }
    }

    fn try_receive_byte(&mut self) -> Option<u8> {
        let sm = self.binding.state_machine;
        if Fstat::from_bits_retain(self.pio.read_reg(FSTAT)).rx_empty(sm) {
            return None;
        }
        let byte = byte_from_rx_word(self.pio.read_reg(RXF0 + 4 * sm as u64));
        tracing::trace!(byte, "soft UART byte");
        Some(byte)
    }
}
