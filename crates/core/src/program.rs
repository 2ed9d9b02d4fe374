// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! PIO receive microprograms and their placement in instruction memory.

use pio::{Assembler, InSource, JmpCondition, Program, SetDestination, WaitSource};

/// Instruction memory slots per PIO block.
pub const INSTRUCTION_MEMORY_SIZE: usize = 32;

/// Both programs spend eight state machine cycles per bit.
pub const OVERSAMPLING: u32 = 8;

/// IRQ flag raised (relative to the state machine) on a framing error or break.
pub const FRAMING_ERROR_IRQ: u8 = 4;

/// `SET PINDIRS, 0`, executed once to make the RX pin an input.
pub const SET_PINDIRS_INPUT: u16 = 0xe080;

/// Unconditional `JMP addr`, executed through SM_INSTR to set the start address.
pub const fn jmp_to(addr: u8) -> u16 {
    (addr & 0x1f) as u16
}

/// Source text of both programs in pioasm syntax.
pub const UART_RX_PIO: &str = include_str!("uart_rx.pio");

pub type RxCode = Program<INSTRUCTION_MEMORY_SIZE>;

/// Selects the receive microprogram loaded for the soft UART.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxProgram {
    /// Checks the stop bit and drops badly framed bytes.
    #[default]
    Full,
    /// Four instructions, relies on autopush, never checks the stop bit.
    Mini,
}

impl RxProgram {
    pub fn name(self) -> &'static str {
        match self {
            RxProgram::Full => "uart_rx",
            RxProgram::Mini => "uart_rx_mini",
        }
    }

    /// Autopush threshold in bits, if the program relies on autopush.
    pub fn autopush_threshold(self) -> Option<u8> {
        match self {
            RxProgram::Full => None,
            RxProgram::Mini => Some(8),
        }
    }

    /// Whether the program reads the RX pin through the JMP pin mapping.
    pub fn uses_jmp_pin(self) -> bool {
        matches!(self, RxProgram::Full)
    }

    pub fn assemble(self) -> RxCode {
        match self {
            RxProgram::Full => assemble_full(),
            RxProgram::Mini => assemble_mini(),
        }
    }
}

fn assemble_full() -> RxCode {
    let mut a = Assembler::<INSTRUCTION_MEMORY_SIZE>::new();
    let mut start = a.label();
    let mut bitloop = a.label();
    let mut good_stop = a.label();

    a.bind(&mut start);
    a.wait(0, WaitSource::PIN, 0, false);
    a.set_with_delay(SetDestination::X, 7, 10);
    a.bind(&mut bitloop);
    a.r#in(InSource::PINS, 1);
    a.jmp_with_delay(JmpCondition::XDecNonZero, &mut bitloop, 6);
    a.jmp(JmpCondition::PinHigh, &mut good_stop);

    a.irq(false, false, FRAMING_ERROR_IRQ, true);
    a.wait(1, WaitSource::PIN, 0, false);
    a.jmp(JmpCondition::Always, &mut start);

    a.bind(&mut good_stop);
    a.push(false, true);

    a.assemble_program()
}

fn assemble_mini() -> RxCode {
    let mut a = Assembler::<INSTRUCTION_MEMORY_SIZE>::new();
    let mut bitloop = a.label();

    a.wait(0, WaitSource::PIN, 0, false);
    a.set_with_delay(SetDestination::X, 7, 10);
    a.bind(&mut bitloop);
    a.r#in(InSource::PINS, 1);
    a.jmp_with_delay(JmpCondition::XDecNonZero, &mut bitloop, 6);

    a.assemble_program()
}

/// Rebases a JMP target for a program loaded at `offset`. Other instructions
/// pass through untouched.
pub fn relocate(instr: u16, offset: u8) -> u16 {
    if instr >> 13 == 0 {
        let target = (instr + offset as u16) & 0x1f;
        (instr & !0x1f) | target
    } else {
        instr
    }
}

/// Instruction memory image of `code` loaded at `offset`, as
/// `(slot, instruction)` pairs.
pub fn load_image(code: &RxCode, offset: u8) -> impl Iterator<Item = (usize, u16)> + '_ {
    code.code
        .iter()
        .enumerate()
        .map(move |(i, &instr)| (offset as usize + i, relocate(instr, offset)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_ENCODED: [u16; 9] = [
        0x2020, // wait 0 pin 0
        0xea27, // set x, 7 [10]
        0x4001, // in pins, 1
        0x0642, // jmp x-- 2 [6]
        0x00c8, // jmp pin 8
        0xc014, // irq nowait 4 rel
        0x20a0, // wait 1 pin 0
        0x0000, // jmp 0
        0x8020, // push block
    ];

    #[test]
    fn test_full_program_encoding() {
        let program = RxProgram::Full.assemble();
        assert_eq!(program.code.as_slice(), &FULL_ENCODED);
        assert_eq!(program.origin, None);
        assert_eq!(program.wrap.target, 0);
        assert_eq!(program.wrap.source, 8);
    }

    #[test]
    fn test_mini_program_encoding() {
        let program = RxProgram::Mini.assemble();
        assert_eq!(program.code.as_slice(), &FULL_ENCODED[..4]);
        assert_eq!(program.wrap.source, 3);
    }

    #[test]
    fn test_assembler_matches_pioasm_source() {
        let parsed = pio_parser::Parser::<INSTRUCTION_MEMORY_SIZE>::parse_file(UART_RX_PIO)
            .expect("uart_rx.pio parses");

        for variant in [RxProgram::Full, RxProgram::Mini] {
            let reference = parsed
                .get(variant.name())
                .unwrap_or_else(|| panic!("{} missing from uart_rx.pio", variant.name()));
            let assembled = variant.assemble();
            assert_eq!(
                assembled.code.as_slice(),
                reference.program.code.as_slice(),
                "{}",
                variant.name()
            );
            assert_eq!(assembled.wrap.source, reference.program.wrap.source);
            assert_eq!(assembled.wrap.target, reference.program.wrap.target);
        }
    }

    #[test]
    fn test_relocate_only_touches_jumps() {
        assert_eq!(relocate(0x0642, 23), 0x0642 + 23);
        assert_eq!(relocate(0x0000, 23), 23);
        assert_eq!(relocate(0x2020, 23), 0x2020);
        assert_eq!(relocate(0x8020, 23), 0x8020);
    }

    #[test]
    fn test_load_image_places_and_relocates() {
        let program = RxProgram::Full.assemble();
        let image: Vec<_> = load_image(&program, 23).collect();
        assert_eq!(image.len(), 9);
        assert_eq!(image[0], (23, 0x2020));
        assert_eq!(image[3], (26, 0x0642 + 23));
        assert_eq!(image[4], (27, 0x00c8 + 23));
        assert_eq!(image[7], (30, 23));
        assert_eq!(image[8], (31, 0x8020));
    }
}
