// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::time::Duration;

use uart_mux_core::board::BANNER;
use uart_mux_core::text::DEMO_TEXT;
use uart_mux_core::{Iterations, RxProgram};
use uart_mux_sim::{Frame, MuxConfig, MuxMachine};

fn wire_of(frames: &[Frame]) -> crossbeam_channel::Receiver<Frame> {
    let (tx, rx) = crossbeam_channel::unbounded();
    for frame in frames {
        tx.send(*frame).unwrap();
    }
    rx
}

fn bytes(data: &[u8]) -> Vec<Frame> {
    data.iter().copied().map(Frame::from).collect()
}

#[test]
fn test_banner_then_exact_echo() {
    let machine = MuxMachine::new(MuxConfig::default());
    let report = machine
        .run(wire_of(&bytes(b"AB\n")), Iterations::new(3))
        .unwrap();

    let mut expected = BANNER.as_bytes().to_vec();
    expected.extend_from_slice(b"AB\n");
    assert_eq!(report.console, expected);
    assert_eq!(report.echoed, 3);
    assert_eq!(report.framing_errors, 0);
}

#[test]
fn test_hard_uart_gets_demo_text_exactly_once() {
    let machine = MuxMachine::new(MuxConfig::default());
    let report = machine
        .run(wire_of(&bytes(b"x")), Iterations::new(1))
        .unwrap();
    assert_eq!(report.hard_uart, DEMO_TEXT.as_bytes());

    // Core 1 is parked on an empty mailbox; nothing more may appear.
    let grew = machine
        .hard_uart()
        .wait_until(Duration::from_millis(100), |out| out.len() > DEMO_TEXT.len());
    assert!(!grew);
}

#[test]
fn test_hard_uart_output_never_reaches_console() {
    let machine = MuxMachine::new(MuxConfig::default());
    let report = machine
        .run(wire_of(&bytes(b"q")), Iterations::new(1))
        .unwrap();
    let console = String::from_utf8_lossy(&report.console);
    assert!(!console.contains("Hello, world from PIO!"));
}

#[test]
fn test_every_byte_value_survives() {
    let all: Vec<u8> = (0..=255).collect();
    let machine = MuxMachine::new(MuxConfig::default());
    let report = machine
        .run(wire_of(&bytes(&all)), Iterations::new(256))
        .unwrap();
    assert_eq!(&report.console[BANNER.len()..], all.as_slice());
}

#[test]
fn test_echo_with_mini_program() {
    let config = MuxConfig {
        program: RxProgram::Mini,
        ..MuxConfig::default()
    };
    let report = MuxMachine::new(config)
        .run(wire_of(&bytes(b"mini")), Iterations::new(4))
        .unwrap();
    assert_eq!(&report.console[BANNER.len()..], b"mini");
    assert_eq!(report.binding.offset, 28);
    assert_eq!(report.program, "uart_rx_mini");
}

#[test]
fn test_full_program_drops_framing_errors() {
    let frames = [
        Frame::Byte(b'a'),
        Frame::Malformed(b'!'),
        Frame::Byte(b'b'),
        Frame::Malformed(0x00),
        Frame::Byte(b'c'),
    ];
    let report = MuxMachine::new(MuxConfig::default())
        .run(wire_of(&frames), Iterations::new(3))
        .unwrap();
    assert_eq!(&report.console[BANNER.len()..], b"abc");
    assert_eq!(report.framing_errors, 2);
}

#[test]
fn test_slower_baud_rate() {
    let config = MuxConfig {
        baud: 9600,
        sys_clk_hz: 12_000_000,
        ..MuxConfig::default()
    };
    let report = MuxMachine::new(config)
        .run(wire_of(&bytes(b"ok")), Iterations::new(2))
        .unwrap();
    assert_eq!(&report.console[BANNER.len()..], b"ok");
    assert_eq!(report.binding.baud, 9600);
}
