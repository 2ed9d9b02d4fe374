// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register values that configure a PIO state machine as a UART receiver.
//!
//! The firmware writes these with volatile stores, the simulator through its
//! register interface, so both run the exact same configuration.

use bitflags::bitflags;

use crate::pool::PeripheralBinding;
use crate::program::{RxCode, RxProgram, OVERSAMPLING};

// SM_EXECCTRL
const EXECCTRL_JMP_PIN_LSB: u32 = 24;
const EXECCTRL_WRAP_TOP_LSB: u32 = 12;
const EXECCTRL_WRAP_BOTTOM_LSB: u32 = 7;

// SM_SHIFTCTRL
const SHIFTCTRL_FJOIN_RX: u32 = 1 << 31;
const SHIFTCTRL_PUSH_THRESH_LSB: u32 = 20;
const SHIFTCTRL_OUT_SHIFTDIR: u32 = 1 << 19;
const SHIFTCTRL_IN_SHIFTDIR: u32 = 1 << 18;
const SHIFTCTRL_AUTOPUSH: u32 = 1 << 16;

// SM_PINCTRL
const PINCTRL_SET_COUNT_LSB: u32 = 26;
const PINCTRL_IN_BASE_LSB: u32 = 15;
const PINCTRL_SET_BASE_LSB: u32 = 5;

bitflags! {
    /// PIO FSTAT register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Fstat: u32 {
        const TXEMPTY = 0xf << 24;
        const TXFULL = 0xf << 16;
        const RXEMPTY = 0xf << 8;
        const RXFULL = 0xf;
    }
}

impl Fstat {
    pub fn rx_empty(self, sm: u8) -> bool {
        self.bits() & (1 << (8 + sm)) != 0
    }

    pub fn rx_full(self, sm: u8) -> bool {
        self.bits() & (1 << sm) != 0
    }
}

/// CTRL bits that enable state machine `sm`.
pub const fn sm_enable_mask(sm: u8) -> u32 {
    1 << sm
}

/// CTRL bits that restart state machine `sm` and its clock divider.
pub const fn sm_restart_mask(sm: u8) -> u32 {
    (1 << (4 + sm)) | (1 << (8 + sm))
}

/// Whether a receiver sampling `OVERSAMPLING` times per bit can run at
/// `baud` from `sys_clk_hz`, i.e. the divider would not drop below one.
pub fn baud_supported(sys_clk_hz: u32, baud: u32) -> bool {
    baud > 0 && OVERSAMPLING as u64 * baud as u64 <= sys_clk_hz as u64
}

/// 16.8 fixed-point state machine clock divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDivider {
    pub int: u16,
    pub frac: u8,
}

impl ClockDivider {
    /// Divider that ticks the state machine at `target_hz`. The fraction is
    /// truncated, never rounded.
    pub fn for_rate(sys_clk_hz: u32, target_hz: u32) -> Self {
        let scaled = (sys_clk_hz as u64 * 256) / (target_hz as u64).max(1);
        let int = (scaled >> 8).clamp(1, u16::MAX as u64) as u16;
        let frac = if scaled >> 8 == 0 { 0 } else { (scaled & 0xff) as u8 };
        Self { int, frac }
    }

    pub fn bits(self) -> u32 {
        ((self.int as u32) << 16) | ((self.frac as u32) << 8)
    }
}

/// Complete state machine configuration for one soft-UART receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmRegisters {
    pub clkdiv: u32,
    pub execctrl: u32,
    pub shiftctrl: u32,
    pub pinctrl: u32,
    /// Absolute instruction memory address the state machine starts at.
    pub initial_pc: u8,
}

impl SmRegisters {
    pub fn soft_uart_rx(
        binding: &PeripheralBinding,
        code: &RxCode,
        variant: RxProgram,
        sys_clk_hz: u32,
    ) -> Self {
        let pin = binding.relative_pin() as u32;
        let offset = binding.offset as u32;

        let divider =
            ClockDivider::for_rate(sys_clk_hz, OVERSAMPLING.saturating_mul(binding.baud));

        let mut execctrl = ((offset + code.wrap.source as u32) << EXECCTRL_WRAP_TOP_LSB)
            | ((offset + code.wrap.target as u32) << EXECCTRL_WRAP_BOTTOM_LSB);
        if variant.uses_jmp_pin() {
            execctrl |= pin << EXECCTRL_JMP_PIN_LSB;
        }

        let mut shiftctrl = SHIFTCTRL_FJOIN_RX | SHIFTCTRL_OUT_SHIFTDIR | SHIFTCTRL_IN_SHIFTDIR;
        if let Some(threshold) = variant.autopush_threshold() {
            shiftctrl |= SHIFTCTRL_AUTOPUSH | ((threshold as u32 & 0x1f) << SHIFTCTRL_PUSH_THRESH_LSB);
        }

        Self {
            clkdiv: divider.bits(),
            execctrl,
            shiftctrl,
            pinctrl: pin << PINCTRL_IN_BASE_LSB,
            initial_pc: binding.offset,
        }
    }

    /// Temporary PINCTRL value mapping one SET pin onto the RX pin, used while
    /// `SET PINDIRS, 0` executes.
    pub fn pindir_pinctrl(binding: &PeripheralBinding) -> u32 {
        (1 << PINCTRL_SET_COUNT_LSB) | ((binding.relative_pin() as u32) << PINCTRL_SET_BASE_LSB)
    }
}

/// Decoded view of the configuration fields a receiver depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxFields {
    pub jmp_pin: u8,
    pub wrap_top: u8,
    pub wrap_bottom: u8,
    pub in_base: u8,
    pub in_shift_right: bool,
    pub autopush: bool,
    /// 32 when the hardware field reads 0.
    pub push_threshold: u8,
    pub join_rx: bool,
}

impl RxFields {
    pub fn decode(execctrl: u32, shiftctrl: u32, pinctrl: u32) -> Self {
        let thresh = ((shiftctrl >> SHIFTCTRL_PUSH_THRESH_LSB) & 0x1f) as u8;
        Self {
            jmp_pin: ((execctrl >> EXECCTRL_JMP_PIN_LSB) & 0x1f) as u8,
            wrap_top: ((execctrl >> EXECCTRL_WRAP_TOP_LSB) & 0x1f) as u8,
            wrap_bottom: ((execctrl >> EXECCTRL_WRAP_BOTTOM_LSB) & 0x1f) as u8,
            in_base: ((pinctrl >> PINCTRL_IN_BASE_LSB) & 0x1f) as u8,
            in_shift_right: shiftctrl & SHIFTCTRL_IN_SHIFTDIR != 0,
            autopush: shiftctrl & SHIFTCTRL_AUTOPUSH != 0,
            push_threshold: if thresh == 0 { 32 } else { thresh },
            join_rx: shiftctrl & SHIFTCTRL_FJOIN_RX != 0,
        }
    }
}
