// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Cycle-stepped model of one RP2040 PIO block.
//!
//! Covers what a receive program needs: pin and IRQ waits, `IN` from pins in
//! either shift direction, autopush, `JMP PIN`, relative IRQ flags, the RX
//! FIFO join and forced execution through `SM_INSTR`. Side-set is not
//! modelled; all five delay/side-set bits are treated as delay.

use std::collections::VecDeque;

use serde::Serialize;
use uart_mux_core::program::INSTRUCTION_MEMORY_SIZE;
use uart_mux_core::sm_config::{Fstat, RxFields};

pub const CTRL: u64 = 0x000;
pub const FSTAT: u64 = 0x004;
pub const FDEBUG: u64 = 0x008;
pub const FLEVEL: u64 = 0x00c;
pub const TXF0: u64 = 0x010;
pub const RXF0: u64 = 0x020;
pub const IRQ: u64 = 0x030;
pub const IRQ_FORCE: u64 = 0x034;
pub const INPUT_SYNC_BYPASS: u64 = 0x038;
pub const INSTR_MEM0: u64 = 0x048;
pub const SM0_BASE: u64 = 0x0c8;
pub const SM_STRIDE: u64 = 24;

// Offsets inside one state machine's register window.
pub const SM_CLKDIV: u64 = 0;
pub const SM_EXECCTRL: u64 = 4;
pub const SM_SHIFTCTRL: u64 = 8;
pub const SM_ADDR: u64 = 12;
pub const SM_INSTR: u64 = 16;
pub const SM_PINCTRL: u64 = 20;

const STATE_MACHINES: usize = 4;
const FIFO_DEPTH: usize = 4;

/// Address of register `reg` of state machine `sm`.
pub const fn sm_reg(sm: u8, reg: u64) -> u64 {
    SM0_BASE + SM_STRIDE * sm as u64 + reg
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Jmp { cond: u8, target: u8 },
    Wait { polarity: bool, source: u8, index: u8 },
    In { source: u8, count: u8 },
    Out { dest: u8, count: u8 },
    Push { if_full: bool, block: bool },
    Pull { if_empty: bool, block: bool },
    Mov { dest: u8, op: u8, source: u8 },
    Irq { clear: bool, wait: bool, index: u8 },
    Set { dest: u8, data: u8 },
}

fn bit_count(field: u16) -> u8 {
    match field & 0x1f {
        0 => 32,
        n => n as u8,
    }
}

fn decode(instr: u16) -> Op {
    let arg1 = ((instr >> 5) & 0x7) as u8;
    let arg2 = (instr & 0x1f) as u8;
    match instr >> 13 {
        0 => Op::Jmp { cond: arg1, target: arg2 },
        1 => Op::Wait {
            polarity: arg1 & 0b100 != 0,
            source: arg1 & 0b011,
            index: arg2,
        },
        2 => Op::In { source: arg1, count: bit_count(instr) },
        3 => Op::Out { dest: arg1, count: bit_count(instr) },
        4 if instr & 0x80 == 0 => Op::Push {
            if_full: instr & 0x40 != 0,
            block: instr & 0x20 != 0,
        },
        4 => Op::Pull {
            if_empty: instr & 0x40 != 0,
            block: instr & 0x20 != 0,
        },
        5 => Op::Mov {
            dest: arg1,
            op: ((instr >> 3) & 0x3) as u8,
            source: (instr & 0x7) as u8,
        },
        6 => Op::Irq {
            clear: instr & 0x40 != 0,
            wait: instr & 0x20 != 0,
            index: arg2,
        },
        _ => Op::Set { dest: arg1, data: arg2 },
    }
}

/// IRQ flag addressed by an `IRQ`/`WAIT IRQ` index, resolving the relative
/// bit against the state machine number.
fn irq_flag(index: u8, sm: usize) -> u8 {
    if index & 0x10 != 0 {
        (index & 0x4) | ((index as usize + sm) as u8 & 0x3)
    } else {
        index & 0x7
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct StateMachine {
    pub pc: u8,
    pub x: u32,
    pub y: u32,
    pub isr: u32,
    pub osr: u32,
    pub isr_count: u8,
    pub osr_count: u8,

    pub clkdiv_int: u16,
    pub clkdiv_frac: u8,
    clk_counter: u32,
    pub delay_cycles: u8,

    pub exec_ctrl: u32,
    pub shift_ctrl: u32,
    pub pin_ctrl: u32,

    pub enabled: bool,
    pub stalled: bool,
    /// Instruction forced through `SM_INSTR` while the machine was stalled.
    pending_exec: Option<u16>,
    /// Flag an `IRQ wait` is holding for.
    irq_wait: Option<u8>,
}

impl StateMachine {
    fn fields(&self) -> RxFields {
        RxFields::decode(self.exec_ctrl, self.shift_ctrl, self.pin_ctrl)
    }

    fn restart(&mut self) {
        self.isr = 0;
        self.osr = 0;
        self.isr_count = 0;
        self.osr_count = 32;
        self.delay_cycles = 0;
        self.stalled = false;
        self.pending_exec = None;
        self.irq_wait = None;
    }

    fn pull_threshold(&self) -> u8 {
        match (self.shift_ctrl >> 25) & 0x1f {
            0 => 32,
            n => n as u8,
        }
    }

    fn advance_pc(&mut self) {
        let fields = self.fields();
        if self.pc == fields.wrap_top {
            self.pc = fields.wrap_bottom;
        } else {
            self.pc = (self.pc + 1) & 0x1f;
        }
    }
}

/// What one executed instruction did to the program counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Jumped,
    Stalled,
}

#[derive(Debug, Serialize)]
pub struct PioBlock {
    pub instruction_mem: [u16; INSTRUCTION_MEMORY_SIZE],
    pub sm: [StateMachine; STATE_MACHINES],

    pub ctrl: u32,
    pub fdebug: u32,
    pub irq: u8,
    pub input_sync_bypass: u32,

    pub tx_fifo: [VecDeque<u32>; STATE_MACHINES],
    pub rx_fifo: [VecDeque<u32>; STATE_MACHINES],

    /// First GPIO visible to this block.
    pub gpio_base: u8,
    /// Input levels of the 32 GPIOs starting at `gpio_base`.
    pub gpio_in: u32,
    pub pin_out: u32,
    pub pindirs: u32,
}

impl Default for PioBlock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl PioBlock {
    pub fn new(gpio_base: u8) -> Self {
        let mut sm: [StateMachine; STATE_MACHINES] = Default::default();
        for item in &mut sm {
            item.clkdiv_int = 1;
            item.exec_ctrl = 0x0001_f000; // wrap_top=31, wrap_bottom=0
            item.shift_ctrl = 0x000c_0000; // both shift right
            item.osr_count = 32;
        }
        Self {
            instruction_mem: [0; INSTRUCTION_MEMORY_SIZE],
            sm,
            ctrl: 0,
            fdebug: 0,
            irq: 0,
            input_sync_bypass: 0,
            tx_fifo: Default::default(),
            rx_fifo: Default::default(),
            gpio_base,
            gpio_in: 0,
            pin_out: 0,
            pindirs: 0,
        }
    }

    /// Drives the input level of absolute GPIO `gpio`. GPIOs outside the
    /// block's window are ignored.
    pub fn set_gpio(&mut self, gpio: u8, high: bool) {
        let Some(bit) = gpio.checked_sub(self.gpio_base).filter(|b| *b < 32) else {
            return;
        };
        if high {
            self.gpio_in |= 1 << bit;
        } else {
            self.gpio_in &= !(1 << bit);
        }
    }

    fn pin(&self, relative: u8) -> bool {
        self.gpio_in & (1 << (relative & 0x1f)) != 0
    }

    fn rx_capacity(&self, sm: usize) -> usize {
        if self.sm[sm].fields().join_rx {
            2 * FIFO_DEPTH
        } else {
            FIFO_DEPTH
        }
    }

    fn tx_capacity(&self, sm: usize) -> usize {
        if self.sm[sm].shift_ctrl & (1 << 30) != 0 {
            2 * FIFO_DEPTH
        } else if self.sm[sm].fields().join_rx {
            0
        } else {
            FIFO_DEPTH
        }
    }

    pub fn fstat(&self) -> Fstat {
        let mut bits = 0;
        for i in 0..STATE_MACHINES {
            if self.tx_fifo[i].is_empty() {
                bits |= 1 << (24 + i);
            }
            if self.tx_fifo[i].len() >= self.tx_capacity(i) {
                bits |= 1 << (16 + i);
            }
            if self.rx_fifo[i].is_empty() {
                bits |= 1 << (8 + i);
            }
            if self.rx_fifo[i].len() >= self.rx_capacity(i) {
                bits |= 1 << i;
            }
        }
        Fstat::from_bits_retain(bits)
    }

    fn flevel(&self) -> u32 {
        (0..STATE_MACHINES).fold(0, |acc, i| {
            let tx = self.tx_fifo[i].len().min(15) as u32;
            let rx = self.rx_fifo[i].len().min(15) as u32;
            acc | (tx << (8 * i)) | (rx << (8 * i + 4))
        })
    }

    /// Register read. Reading an RX FIFO pops it, so this takes `&mut self`.
    pub fn read_reg(&mut self, addr: u64) -> u32 {
        let offset = addr & 0x1ff;
        match offset {
            CTRL => self.ctrl & 0xf,
            FSTAT => self.fstat().bits(),
            FDEBUG => self.fdebug,
            FLEVEL => self.flevel(),
            0x020..=0x02c => {
                let idx = ((offset - RXF0) / 4) as usize;
                match self.rx_fifo[idx].pop_front() {
                    Some(word) => word,
                    None => {
                        self.fdebug |= 1 << (8 + idx); // RXUNDER
                        0
                    }
                }
            }
            IRQ => self.irq as u32,
            INPUT_SYNC_BYPASS => self.input_sync_bypass,
            0x048..=0x0c4 => self.instruction_mem[((offset - INSTR_MEM0) / 4) as usize] as u32,
            0x0c8..=0x124 => {
                let sm = &self.sm[((offset - SM0_BASE) / SM_STRIDE) as usize];
                match (offset - SM0_BASE) % SM_STRIDE {
                    SM_CLKDIV => ((sm.clkdiv_int as u32) << 16) | ((sm.clkdiv_frac as u32) << 8),
                    SM_EXECCTRL => sm.exec_ctrl,
                    SM_SHIFTCTRL => sm.shift_ctrl,
                    SM_ADDR => sm.pc as u32,
                    SM_INSTR => self.instruction_mem[sm.pc as usize] as u32,
                    _ => sm.pin_ctrl,
                }
            }
            _ => 0,
        }
    }

    pub fn write_reg(&mut self, addr: u64, value: u32) {
        let offset = addr & 0x1ff;
        match offset {
            CTRL => {
                for i in 0..STATE_MACHINES {
                    self.sm[i].enabled = value & (1 << i) != 0;
                    if value & (1 << (4 + i)) != 0 {
                        self.sm[i].restart();
                    }
                    if value & (1 << (8 + i)) != 0 {
                        self.sm[i].clk_counter = 0;
                    }
                }
                // Restart bits are self-clearing.
                self.ctrl = value & 0xf;
            }
            FDEBUG => self.fdebug &= !value,
            0x010..=0x01c => {
                let idx = ((offset - TXF0) / 4) as usize;
                if self.tx_fifo[idx].len() < self.tx_capacity(idx) {
                    self.tx_fifo[idx].push_back(value);
                } else {
                    self.fdebug |= 1 << (16 + idx); // TXOVER
                }
            }
            IRQ => self.irq &= !(value as u8),
            IRQ_FORCE => self.irq |= value as u8,
            INPUT_SYNC_BYPASS => self.input_sync_bypass = value,
            0x048..=0x0c4 => {
                self.instruction_mem[((offset - INSTR_MEM0) / 4) as usize] = value as u16;
            }
            0x0c8..=0x124 => {
                let idx = ((offset - SM0_BASE) / SM_STRIDE) as usize;
                match (offset - SM0_BASE) % SM_STRIDE {
                    SM_CLKDIV => {
                        self.sm[idx].clkdiv_int = (value >> 16) as u16;
                        self.sm[idx].clkdiv_frac = (value >> 8) as u8;
                    }
                    SM_EXECCTRL => self.sm[idx].exec_ctrl = value,
                    SM_SHIFTCTRL => self.sm[idx].shift_ctrl = value,
                    SM_ADDR => {}
                    SM_INSTR => self.force_exec(idx, value as u16),
                    _ => self.sm[idx].pin_ctrl = value,
                }
            }
            _ => {}
        }
    }

    /// Executes `instr` immediately, as a write to `SM_INSTR` does. If it
    /// stalls it is retried on the state machine's following cycles.
    fn force_exec(&mut self, idx: usize, instr: u16) {
        if self.execute(idx, instr, true) == Flow::Stalled {
            self.sm[idx].pending_exec = Some(instr);
        }
    }

    /// Advances every enabled state machine by one system clock cycle.
    pub fn tick(&mut self) {
        for i in 0..STATE_MACHINES {
            if !self.sm[i].enabled || !self.clock_fires(i) {
                continue;
            }
            self.cycle(i);
        }
    }

    fn clock_fires(&mut self, idx: usize) -> bool {
        let sm = &mut self.sm[idx];
        let int = if sm.clkdiv_int == 0 { 65536 } else { sm.clkdiv_int as u32 };
        let period = (int << 8) | sm.clkdiv_frac as u32;
        sm.clk_counter += 256;
        if sm.clk_counter < period {
            return false;
        }
        sm.clk_counter -= period;
        true
    }

    fn cycle(&mut self, idx: usize) {
        if self.sm[idx].delay_cycles > 0 {
            self.sm[idx].delay_cycles -= 1;
            return;
        }

        let (instr, forced) = match self.sm[idx].pending_exec {
            Some(instr) => (instr, true),
            None => (self.instruction_mem[self.sm[idx].pc as usize], false),
        };

        if self.execute(idx, instr, forced) != Flow::Stalled && forced {
            self.sm[idx].pending_exec = None;
        }
    }

    /// Runs one instruction and applies its delay and PC update. Forced
    /// instructions only move the PC by jumping.
    fn execute(&mut self, idx: usize, instr: u16, forced: bool) -> Flow {
        let flow = self.step(idx, decode(instr));
        let sm = &mut self.sm[idx];
        sm.stalled = flow == Flow::Stalled;
        match flow {
            Flow::Stalled => {}
            Flow::Jumped => sm.delay_cycles = ((instr >> 8) & 0x1f) as u8,
            Flow::Next => {
                sm.delay_cycles = ((instr >> 8) & 0x1f) as u8;
                if !forced {
                    sm.advance_pc();
                }
            }
        }
        flow
    }

    fn step(&mut self, idx: usize, op: Op) -> Flow {
        match op {
            Op::Jmp { cond, target } => {
                let sm = &mut self.sm[idx];
                let taken = match cond {
                    0 => true,
                    1 => sm.x == 0,
                    2 => {
                        let taken = sm.x != 0;
                        sm.x = sm.x.wrapping_sub(1);
                        taken
                    }
                    3 => sm.y == 0,
                    4 => {
                        let taken = sm.y != 0;
                        sm.y = sm.y.wrapping_sub(1);
                        taken
                    }
                    5 => sm.x != sm.y,
                    6 => {
                        let jmp_pin = sm.fields().jmp_pin;
                        self.pin(jmp_pin)
                    }
                    _ => sm.osr_count < sm.pull_threshold(),
                };
                if taken {
                    self.sm[idx].pc = target;
                    Flow::Jumped
                } else {
                    Flow::Next
                }
            }
            Op::Wait {
                polarity,
                source,
                index,
            } => {
                let level = match source {
                    0 => self.pin(index),
                    1 => self.pin(self.sm[idx].fields().in_base.wrapping_add(index)),
                    2 => self.irq & (1 << irq_flag(index, idx)) != 0,
                    _ => false,
                };
                if level != polarity {
                    return Flow::Stalled;
                }
                if source == 2 && polarity {
                    self.irq &= !(1 << irq_flag(index, idx));
                }
                Flow::Next
            }
            Op::In { source, count } => {
                let fields = self.sm[idx].fields();
                let will_push = fields.autopush
                    && self.sm[idx].isr_count.saturating_add(count) >= fields.push_threshold;
                if will_push && self.rx_fifo[idx].len() >= self.rx_capacity(idx) {
                    return Flow::Stalled;
                }

                let sm = &mut self.sm[idx];
                let value = match source {
                    0 => self.gpio_in.rotate_right(fields.in_base as u32),
                    1 => sm.x,
                    2 => sm.y,
                    3 => 0,
                    6 => sm.isr,
                    7 => sm.osr,
                    _ => 0,
                };
                let mask = if count == 32 { u32::MAX } else { (1 << count) - 1 };
                let bits = value & mask;
                sm.isr = match (count, fields.in_shift_right) {
                    (32, _) => bits,
                    (_, true) => (sm.isr >> count) | (bits << (32 - count as u32)),
                    (_, false) => (sm.isr << count) | bits,
                };
                sm.isr_count = sm.isr_count.saturating_add(count).min(32);

                if will_push {
                    self.push_isr(idx);
                }
                Flow::Next
            }
            Op::Out { dest, count } => {
                let sm = &mut self.sm[idx];
                let right = sm.shift_ctrl & (1 << 19) != 0;
                let mask = if count == 32 { u32::MAX } else { (1 << count) - 1 };
                let value = if right {
                    sm.osr & mask
                } else {
                    sm.osr.rotate_left(count as u32) & mask
                };
                sm.osr = match (count, right) {
                    (32, _) => 0,
                    (_, true) => sm.osr >> count,
                    (_, false) => sm.osr << count,
                };
                sm.osr_count = sm.osr_count.saturating_add(count).min(32);
                match dest {
                    1 => sm.x = value,
                    2 => sm.y = value,
                    5 => {
                        sm.pc = (value & 0x1f) as u8;
                        return Flow::Jumped;
                    }
                    6 => {
                        sm.isr = value;
                        sm.isr_count = count;
                    }
                    _ => {}
                }
                Flow::Next
            }
            Op::Push { if_full, block } => {
                let sm = &self.sm[idx];
                if if_full && sm.isr_count < sm.fields().push_threshold {
                    return Flow::Next;
                }
                if self.rx_fifo[idx].len() >= self.rx_capacity(idx) {
                    if block {
                        return Flow::Stalled;
                    }
                    self.fdebug |= 1 << idx; // RXSTALL
                    let sm = &mut self.sm[idx];
                    sm.isr = 0;
                    sm.isr_count = 0;
                    return Flow::Next;
                }
                self.push_isr(idx);
                Flow::Next
            }
            Op::Pull { if_empty, block } => {
                let sm = &self.sm[idx];
                if if_empty && sm.osr_count < sm.pull_threshold() {
                    return Flow::Next;
                }
                match self.tx_fifo[idx].pop_front() {
                    Some(word) => {
                        let sm = &mut self.sm[idx];
                        sm.osr = word;
                        sm.osr_count = 0;
                    }
                    None if block => return Flow::Stalled,
                    None => {
                        let sm = &mut self.sm[idx];
                        sm.osr = sm.x;
                        sm.osr_count = 0;
                    }
                }
                Flow::Next
            }
            Op::Mov { dest, op, source } => {
                let sm = &mut self.sm[idx];
                let value = match source {
                    0 => self.gpio_in.rotate_right(sm.fields().in_base as u32),
                    1 => sm.x,
                    2 => sm.y,
                    3 => 0,
                    6 => sm.isr,
                    7 => sm.osr,
                    _ => 0,
                };
                let value = match op {
                    1 => !value,
                    2 => value.reverse_bits(),
                    _ => value,
                };
                match dest {
                    1 => sm.x = value,
                    2 => sm.y = value,
                    5 => {
                        sm.pc = (value & 0x1f) as u8;
                        return Flow::Jumped;
                    }
                    6 => {
                        sm.isr = value;
                        sm.isr_count = 0;
                    }
                    7 => {
                        sm.osr = value;
                        sm.osr_count = 0;
                    }
                    _ => {}
                }
                Flow::Next
            }
            Op::Irq { clear, wait, index } => {
                let flag = irq_flag(index, idx);
                if clear {
                    self.irq &= !(1 << flag);
                    return Flow::Next;
                }
                match self.sm[idx].irq_wait {
                    Some(held) if self.irq & (1 << held) != 0 => Flow::Stalled,
                    Some(_) => {
                        self.sm[idx].irq_wait = None;
                        Flow::Next
                    }
                    None => {
                        self.irq |= 1 << flag;
                        if wait {
                            self.sm[idx].irq_wait = Some(flag);
                            Flow::Stalled
                        } else {
                            Flow::Next
                        }
                    }
                }
            }
            Op::Set { dest, data } => {
                let sm = &mut self.sm[idx];
                match dest {
                    0 | 4 => {
                        let base = (sm.pin_ctrl >> 5) & 0x1f;
                        let count = (sm.pin_ctrl >> 26) & 0x7;
                        let target = if dest == 0 { &mut self.pin_out } else { &mut self.pindirs };
                        for bit in 0..count {
                            let pin = (base + bit) & 0x1f;
                            if data as u32 & (1 << bit) != 0 {
                                *target |= 1 << pin;
                            } else {
                                *target &= !(1 << pin);
                            }
                        }
                    }
                    1 => sm.x = data as u32,
                    2 => sm.y = data as u32,
                    _ => {}
                }
                Flow::Next
            }
        }
    }

    fn push_isr(&mut self, idx: usize) {
        let sm = &mut self.sm[idx];
        self.rx_fifo[idx].push_back(sm.isr);
        sm.isr = 0;
        sm.isr_count = 0;
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enable(pio: &mut PioBlock, sm: u8) {
        pio.write_reg(CTRL, 1 << sm);
    }

    #[test]
    fn test_set_and_jmp() {
        let mut pio = PioBlock::new(0);
        pio.instruction_mem[0] = 0xe02a; // set x, 10
        pio.instruction_mem[1] = 0x0000; // jmp 0
        enable(&mut pio, 0);

        pio.tick();
        assert_eq!(pio.sm[0].x, 10);
        assert_eq!(pio.sm[0].pc, 1);

        pio.tick();
        assert_eq!(pio.sm[0].pc, 0);
    }

    #[test]
    fn test_delay_only_after_completion() {
        let mut pio = PioBlock::new(0);
        pio.instruction_mem[0] = 0x2220; // wait 0 pin 0 [2]
        pio.instruction_mem[1] = 0xe045; // set y, 5
        pio.set_gpio(0, true);
        enable(&mut pio, 0);

        // Stalled: the delay must not start counting yet.
        pio.tick();
        assert!(pio.sm[0].stalled);
        assert_eq!(pio.sm[0].delay_cycles, 0);

        pio.set_gpio(0, false);
        pio.tick();
        assert!(!pio.sm[0].stalled);
        assert_eq!(pio.sm[0].delay_cycles, 2);
        pio.tick();
        pio.tick();
        assert_eq!(pio.sm[0].y, 0);
        pio.tick();
        assert_eq!(pio.sm[0].y, 5);
    }

    #[test]
    fn test_in_pins_shifts_right_from_in_base() {
        let mut pio = PioBlock::new(0);
        pio.instruction_mem[0] = 0x4001; // in pins, 1
        pio.sm[0].exec_ctrl = 0;
        pio.sm[0].pin_ctrl = 3 << 15;
        pio.set_gpio(3, true);
        enable(&mut pio, 0);

        pio.tick();
        assert_eq!(pio.sm[0].isr, 0x8000_0000);
        assert_eq!(pio.sm[0].isr_count, 1);

        pio.set_gpio(3, false);
        pio.tick();
        assert_eq!(pio.sm[0].isr, 0x4000_0000);
    }

    #[test]
    fn test_autopush_at_threshold() {
        let mut pio = PioBlock::new(0);
        pio.instruction_mem[0] = 0x4001; // in pins, 1
        pio.sm[0].exec_ctrl = 0; // wrap 0 -> 0
        pio.sm[0].shift_ctrl = 0x808d_0000;
        pio.set_gpio(0, true);
        enable(&mut pio, 0);

        for _ in 0..7 {
            pio.tick();
        }
        assert!(pio.rx_fifo[0].is_empty());
        pio.tick();
        assert_eq!(pio.rx_fifo[0].front(), Some(&0xff00_0000));
        assert_eq!(pio.sm[0].isr_count, 0);
    }

    #[test]
    fn test_jmp_pin_and_relative_irq() {
        let mut pio = PioBlock::new(0);
        pio.instruction_mem[0] = 0x00c3; // jmp pin 3
        pio.instruction_mem[1] = 0xc014; // irq nowait 4 rel
        pio.sm[1].exec_ctrl = (5 << 24) | (31 << 12);
        pio.write_reg(CTRL, 0b10);

        pio.tick();
        assert_eq!(pio.sm[1].pc, 1);
        pio.tick();
        assert_eq!(pio.irq, 1 << 5);

        pio.write_reg(IRQ, 1 << 5);
        assert_eq!(pio.irq, 0);

        pio.sm[1].pc = 0;
        pio.set_gpio(5, true);
        pio.tick();
        assert_eq!(pio.sm[1].pc, 3);
    }

    #[test]
    fn test_rx_fifo_read_pops_and_updates_fstat() {
        let mut pio = PioBlock::new(0);
        pio.instruction_mem[0] = 0xe03f; // set x, 31
        pio.instruction_mem[1] = 0x4020; // in x, 32
        pio.instruction_mem[2] = 0x8020; // push block
        enable(&mut pio, 0);
        assert!(pio.fstat().rx_empty(0));

        for _ in 0..3 {
            pio.tick();
        }
        assert!(!pio.fstat().rx_empty(0));
        assert_eq!(pio.read_reg(RXF0), 31);
        assert!(pio.fstat().rx_empty(0));

        assert_eq!(pio.read_reg(RXF0), 0);
        assert_ne!(pio.fdebug & (1 << 8), 0);
    }

    #[test]
    fn test_blocking_push_stalls_when_full() {
        let mut pio = PioBlock::new(0);
        pio.instruction_mem[0] = 0x8020; // push block
        pio.sm[0].exec_ctrl = 0;
        enable(&mut pio, 0);

        for _ in 0..4 {
            pio.tick();
        }
        assert!(pio.fstat().rx_full(0));
        pio.tick();
        assert!(pio.sm[0].stalled);

        pio.read_reg(RXF0);
        pio.tick();
        assert!(!pio.sm[0].stalled);
        assert_eq!(pio.rx_fifo[0].len(), 4);
    }

    #[test]
    fn test_joined_rx_fifo_holds_eight() {
        let mut pio = PioBlock::new(0);
        pio.instruction_mem[0] = 0x8020; // push block
        pio.sm[0].exec_ctrl = 0;
        pio.sm[0].shift_ctrl = 0x800c_0000;
        enable(&mut pio, 0);

        for _ in 0..10 {
            pio.tick();
        }
        assert_eq!(pio.rx_fifo[0].len(), 8);
        assert!(pio.fstat().rx_full(0));
    }

    #[test]
    fn test_forced_instructions() {
        let mut pio = PioBlock::new(0);
        pio.sm[2].pin_ctrl = (1 << 26) | (3 << 5);
        pio.write_reg(sm_reg(2, SM_INSTR), 0xe080); // set pindirs, 0
        pio.write_reg(sm_reg(2, SM_INSTR), 0xe081); // set pindirs, 1
        assert_eq!(pio.pindirs, 1 << 3);

        pio.write_reg(sm_reg(2, SM_INSTR), 23); // jmp 23
        assert_eq!(pio.read_reg(sm_reg(2, SM_ADDR)), 23);
        assert!(!pio.sm[2].enabled);
    }

    #[test]
    fn test_clock_divider_slows_execution() {
        let mut pio = PioBlock::new(0);
        pio.instruction_mem[0] = 0xe021; // set x, 1
        pio.write_reg(sm_reg(0, SM_CLKDIV), 0x0002_8000); // 2.5
        enable(&mut pio, 0);

        pio.tick();
        pio.tick();
        assert_eq!(pio.sm[0].x, 0);
        pio.tick();
        assert_eq!(pio.sm[0].x, 1);
    }

    #[test]
    fn test_restart_clears_shift_state() {
        let mut pio = PioBlock::new(0);
        pio.sm[0].isr = 0xabcd;
        pio.sm[0].isr_count = 9;
        pio.sm[0].delay_cycles = 4;
        pio.write_reg(CTRL, 0x111);
        assert_eq!(pio.sm[0].isr, 0);
        assert_eq!(pio.sm[0].isr_count, 0);
        assert_eq!(pio.sm[0].delay_cycles, 0);
        assert!(pio.sm[0].enabled);
        assert_eq!(pio.read_reg(CTRL), 1);
    }

    #[test]
    fn test_gpio_window_follows_base() {
        let mut pio = PioBlock::new(16);
        pio.set_gpio(3, true);
        assert_eq!(pio.gpio_in, 0);
        pio.set_gpio(19, true);
        assert_eq!(pio.gpio_in, 1 << 3);
    }

    #[test]
    fn test_snapshot_contains_state_machines() {
        let pio = PioBlock::new(0);
        let snapshot = pio.snapshot();
        assert_eq!(snapshot["sm"].as_array().map(Vec::len), Some(4));
        assert_eq!(snapshot["gpio_base"], 0);
    }
}
