// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Brings clk_sys to 125 MHz from the 12 MHz crystal through PLL_SYS
//! (VCO 1500 MHz, post dividers 6 and 2), and runs clk_ref from the crystal
//! and clk_peri from clk_sys.

use uart_mux_core::board::{SYS_CLK_HZ, XTAL_FREQ_HZ};

use crate::regs::{self, CLOCKS_BASE, PLL_SYS_BASE, RESET_PLL_SYS, XOSC_BASE};

const XOSC_CTRL: u32 = XOSC_BASE;
const XOSC_STATUS: u32 = XOSC_BASE + 0x04;
const XOSC_STARTUP: u32 = XOSC_BASE + 0x0c;
const XOSC_FREQ_RANGE_1_15MHZ: u32 = 0xaa0;
const XOSC_ENABLE: u32 = 0xfab << 12;
const XOSC_STABLE: u32 = 1 << 31;

const CLK_REF_CTRL: u32 = CLOCKS_BASE + 0x30;
const CLK_REF_DIV: u32 = CLOCKS_BASE + 0x34;
const CLK_REF_SELECTED: u32 = CLOCKS_BASE + 0x38;
const CLK_SYS_CTRL: u32 = CLOCKS_BASE + 0x3c;
const CLK_SYS_DIV: u32 = CLOCKS_BASE + 0x40;
const CLK_SYS_SELECTED: u32 = CLOCKS_BASE + 0x44;
const CLK_PERI_CTRL: u32 = CLOCKS_BASE + 0x48;
const CLK_SYS_RESUS_CTRL: u32 = CLOCKS_BASE + 0x78;

const CLK_REF_SRC_ROSC: u32 = 0;
const CLK_REF_SRC_XOSC: u32 = 2;
const CLK_SYS_SRC_REF: u32 = 0;
const CLK_SYS_SRC_AUX: u32 = 1;
const CLK_PERI_ENABLE: u32 = 1 << 11;
const DIV_ONE: u32 = 1 << 8;

const PLL_CS: u32 = PLL_SYS_BASE;
const PLL_PWR: u32 = PLL_SYS_BASE + 0x04;
const PLL_FBDIV_INT: u32 = PLL_SYS_BASE + 0x08;
const PLL_PRIM: u32 = PLL_SYS_BASE + 0x0c;
const PLL_LOCK: u32 = 1 << 31;
const PLL_PWR_PD: u32 = 1 << 0;
const PLL_PWR_POSTDIVPD: u32 = 1 << 3;
const PLL_PWR_VCOPD: u32 = 1 << 5;

const PLL_REFDIV: u32 = 1;
const PLL_FBDIV: u32 = 125;
const PLL_POSTDIV1: u32 = 6;
const PLL_POSTDIV2: u32 = 2;

const _: () = assert!(
    XTAL_FREQ_HZ / PLL_REFDIV * PLL_FBDIV / (PLL_POSTDIV1 * PLL_POSTDIV2) == SYS_CLK_HZ,
    "PLL_SYS settings do not produce the board's system clock"
);

fn switch_glitchless(ctrl: u32, selected: u32, src: u32) {
    regs::write(ctrl, (regs::read(ctrl) & !0x3) | src);
    while regs::read(selected) != 1 << src {}
}

pub fn init() {
    regs::write(CLK_SYS_RESUS_CTRL, 0);

    regs::write(XOSC_STARTUP, (XTAL_FREQ_HZ / 1000 + 128) / 256);
    regs::write(XOSC_CTRL, XOSC_FREQ_RANGE_1_15MHZ | XOSC_ENABLE);
    while regs::read(XOSC_STATUS) & XOSC_STABLE == 0 {}

    // Both glitchless muxes off the PLL before it is reconfigured.
    switch_glitchless(CLK_SYS_CTRL, CLK_SYS_SELECTED, CLK_SYS_SRC_REF);
    switch_glitchless(CLK_REF_CTRL, CLK_REF_SELECTED, CLK_REF_SRC_ROSC);

    regs::unreset(RESET_PLL_SYS);
    regs::write(PLL_CS, PLL_REFDIV);
    regs::write(PLL_FBDIV_INT, PLL_FBDIV);
    regs::clear_bits(PLL_PWR, PLL_PWR_PD | PLL_PWR_VCOPD);
    while regs::read(PLL_CS) & PLL_LOCK == 0 {}
    regs::write(PLL_PRIM, (PLL_POSTDIV1 << 16) | (PLL_POSTDIV2 << 12));
    regs::clear_bits(PLL_PWR, PLL_PWR_POSTDIVPD);

    regs::write(CLK_REF_DIV, DIV_ONE);
    switch_glitchless(CLK_REF_CTRL, CLK_REF_SELECTED, CLK_REF_SRC_XOSC);

    // AUXSRC 0 is clksrc_pll_sys.
    regs::write(CLK_SYS_CTRL, regs::read(CLK_SYS_CTRL) & !(0x7 << 5));
    regs::write(CLK_SYS_DIV, DIV_ONE);
    switch_glitchless(CLK_SYS_CTRL, CLK_SYS_SELECTED, CLK_SYS_SRC_AUX);

    // AUXSRC 0 is clk_sys.
    regs::write(CLK_PERI_CTRL, CLK_PERI_ENABLE);
}
