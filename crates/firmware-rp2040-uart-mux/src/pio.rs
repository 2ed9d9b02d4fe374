// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use uart_mux_core::program::{jmp_to, load_image, RxCode, SET_PINDIRS_INPUT};
use uart_mux_core::sm_config::{sm_enable_mask, sm_restart_mask, Fstat};
use uart_mux_core::soft_uart::byte_from_rx_word;
use uart_mux_core::{PeripheralBinding, RxProgram, SmRegisters, SoftUartRx};

use crate::regs::{
    self, pio_base, pio_sm_reg, FUNCSEL_PIO0, PIO_CTRL, PIO_FSTAT, PIO_INSTR_MEM0, PIO_RXF0,
    SM_CLKDIV, SM_EXECCTRL, SM_INSTR, SM_PINCTRL, SM_SHIFTCTRL,
};

/// Soft UART receiver on a claimed PIO state machine.
pub struct PioSoftUart {
    base: u32,
    sm: u8,
}

impl PioSoftUart {
    /// Loads `code` at the claimed offset, configures the state machine for
    /// `binding` and starts it. The PIO block must already be out of reset.
    pub fn start(binding: &PeripheralBinding, code: &RxCode, variant: RxProgram, sys_clk_hz: u32) -> Self {
        let base = pio_base(binding.instance);
        let sm = binding.state_machine;
        let reg = |r| pio_sm_reg(base, sm, r);
        let sm_regs = SmRegisters::soft_uart_rx(binding, code, variant, sys_clk_hz);

        for (slot, instr) in load_image(code, binding.offset) {
            regs::write(base + PIO_INSTR_MEM0 + 4 * slot as u32, instr as u32);
        }

        regs::write(base + PIO_CTRL, regs::read(base + PIO_CTRL) & !sm_enable_mask(sm));

        regs::gpio_function(binding.pin, FUNCSEL_PIO0 + binding.instance as u32);
        regs::gpio_pull_up(binding.pin);

        regs::write(reg(SM_PINCTRL), SmRegisters::pindir_pinctrl(binding));
        regs::write(reg(SM_INSTR), SET_PINDIRS_INPUT as u32);

        regs::write(reg(SM_CLKDIV), sm_regs.clkdiv);
        regs::write(reg(SM_EXECCTRL), sm_regs.execctrl);
        regs::write(reg(SM_SHIFTCTRL), sm_regs.shiftctrl);
        regs::write(reg(SM_PINCTRL), sm_regs.pinctrl);

        regs::write(base + PIO_CTRL, regs::read(base + PIO_CTRL) | sm_restart_mask(sm));
        regs::write(reg(SM_INSTR), jmp_to(sm_regs.initial_pc) as u32);
        regs::write(base + PIO_CTRL, regs::read(base + PIO_CTRL) | sm_enable_mask(sm));

        Self { base, sm }
    }

    fn rx_empty(&self) -> bool {
        Fstat::from_bits_retain(regs::read(self.base + PIO_FSTAT)).rx_empty(self.sm)
    }
}

impl SoftUartRx for PioSoftUart {
    fn receive_byte(&mut self) -> u8 {
        while self.rx_empty() {
            cortex_m::asm::nop();
        }
        byte_from_rx_word(regs::read(self.base + PIO_RXF0 + 4 * self.sm as u32))
    }

    fn try_receive_byte(&mut self) -> Option<u8> {
        if self.rx_empty() {
            return None;
        }
        Some(byte_from_rx_word(regs::read(self.base + PIO_RXF0 + 4 * self.sm as u32)))
    }
}
