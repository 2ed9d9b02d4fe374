// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! RP2040 register map (datasheet section 2.2) and volatile accessors.

pub const RESETS_BASE: u32 = 0x4000_c000;
pub const PSM_BASE: u32 = 0x4001_0000;
pub const CLOCKS_BASE: u32 = 0x4000_8000;
pub const IO_BANK0_BASE: u32 = 0x4001_4000;
pub const PADS_BANK0_BASE: u32 = 0x4001_c000;
pub const XOSC_BASE: u32 = 0x4002_4000;
pub const PLL_SYS_BASE: u32 = 0x4002_8000;
pub const UART0_BASE: u32 = 0x4003_4000;
pub const UART1_BASE: u32 = 0x4003_8000;
pub const PIO0_BASE: u32 = 0x5020_0000;
pub const PIO1_BASE: u32 = 0x5030_0000;
pub const SIO_BASE: u32 = 0xd000_0000;

// Atomic aliases on APB/AHB peripherals (not SIO).
const ALIAS_SET: u32 = 0x2000;
const ALIAS_CLR: u32 = 0x3000;

// RESETS
pub const RESETS_RESET: u32 = RESETS_BASE;
pub const RESETS_RESET_DONE: u32 = RESETS_BASE + 0x08;
pub const RESET_IO_BANK0: u32 = 1 << 5;
pub const RESET_PADS_BANK0: u32 = 1 << 8;
pub const RESET_PIO0: u32 = 1 << 10;
pub const RESET_PIO1: u32 = 1 << 11;
pub const RESET_PLL_SYS: u32 = 1 << 12;
pub const RESET_UART0: u32 = 1 << 22;
pub const RESET_UART1: u32 = 1 << 23;

// PSM
pub const PSM_FRCE_OFF: u32 = PSM_BASE + 0x04;
pub const PSM_PROC1: u32 = 1 << 16;

// IO_BANK0 / PADS_BANK0
pub const FUNCSEL_UART: u32 = 2;
pub const FUNCSEL_PIO0: u32 = 6;
pub const PAD_IE: u32 = 1 << 6;
pub const PAD_PUE: u32 = 1 << 3;
pub const PAD_PDE: u32 = 1 << 2;

pub const fn gpio_ctrl(pin: u8) -> u32 {
    IO_BANK0_BASE + 8 * pin as u32 + 4
}

pub const fn pad_ctrl(pin: u8) -> u32 {
    PADS_BANK0_BASE + 4 + 4 * pin as u32
}

// Cortex-M0+ system control block
pub const SCB_VTOR: u32 = 0xe000_ed08;

// SIO
pub const SIO_FIFO_ST: u32 = SIO_BASE + 0x050;
pub const SIO_FIFO_WR: u32 = SIO_BASE + 0x054;
pub const SIO_FIFO_RD: u32 = SIO_BASE + 0x058;
pub const FIFO_ST_VLD: u32 = 1 << 0;
pub const FIFO_ST_RDY: u32 = 1 << 1;

// PIO
pub const PIO_CTRL: u32 = 0x000;
pub const PIO_FSTAT: u32 = 0x004;
pub const PIO_RXF0: u32 = 0x020;
pub const PIO_INSTR_MEM0: u32 = 0x048;
pub const PIO_SM0_BASE: u32 = 0x0c8;
pub const PIO_SM_STRIDE: u32 = 0x18;
pub const SM_CLKDIV: u32 = 0x00;
pub const SM_EXECCTRL: u32 = 0x04;
pub const SM_SHIFTCTRL: u32 = 0x08;
pub const SM_INSTR: u32 = 0x10;
pub const SM_PINCTRL: u32 = 0x14;

pub const fn pio_base(instance: u8) -> u32 {
    match instance {
        0 => PIO0_BASE,
        _ => PIO1_BASE,
    }
}

pub const fn pio_sm_reg(base: u32, sm: u8, reg: u32) -> u32 {
    base + PIO_SM0_BASE + PIO_SM_STRIDE * sm as u32 + reg
}

#[inline(always)]
pub fn read(addr: u32) -> u32 {
    // SAFETY: every address passed in is a fixed MMIO register on the RP2040.
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

#[inline(always)]
pub fn write(addr: u32, value: u32) {
    // SAFETY: as for `read`.
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

#[inline(always)]
pub fn set_bits(addr: u32, mask: u32) {
    write(addr + ALIAS_SET, mask);
}

#[inline(always)]
pub fn clear_bits(addr: u32, mask: u32) {
    write(addr + ALIAS_CLR, mask);
}

/// Takes the blocks in `mask` out of reset and waits until they are ready.
pub fn unreset(mask: u32) {
    set_bits(RESETS_RESET, mask);
    clear_bits(RESETS_RESET, mask);
    while read(RESETS_RESET_DONE) & mask != mask {}
}

/// Routes `pin` to `funcsel` with its input buffer enabled.
pub fn gpio_function(pin: u8, funcsel: u32) {
    set_bits(pad_ctrl(pin), PAD_IE);
    write(gpio_ctrl(pin), funcsel);
}

pub fn gpio_pull_up(pin: u8) {
    clear_bits(pad_ctrl(pin), PAD_PDE);
    set_bits(pad_ctrl(pin), PAD_PUE);
}
