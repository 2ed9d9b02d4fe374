// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Logic-level model of the wire driving the soft UART's RX pin.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One frame put on the wire by the remote transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frame {
    /// 8N1 frame with a valid stop bit.
    Byte(u8),
    /// Frame whose stop bit is held low, followed by one idle bit.
    Malformed(u8),
}

impl From<u8> for Frame {
    fn from(byte: u8) -> Self {
        Frame::Byte(byte)
    }
}

/// Serialises frames into line levels, one bit period at a time.
///
/// Bit periods are measured in system clock ticks. The period is
/// `sys_clk_hz / baud`, accumulated with its remainder so long runs do not
/// drift against the receiver's fractional clock divider.
#[derive(Debug)]
pub struct UartLine {
    sys_clk_hz: u64,
    baud: u64,
    phase: u64,
    current: Option<bool>,
    pending: VecDeque<bool>,
}

impl UartLine {
    pub fn new(sys_clk_hz: u32, baud: u32) -> Self {
        Self {
            sys_clk_hz: sys_clk_hz as u64,
            baud: baud.max(1) as u64,
            phase: 0,
            current: None,
            pending: VecDeque::new(),
        }
    }

    /// System clock ticks in one bit period, rounded up.
    pub fn ticks_per_bit(&self) -> u64 {
        self.sys_clk_hz.div_ceil(self.baud)
    }

    pub fn queue(&mut self, frame: Frame) {
        match frame {
            Frame::Byte(byte) => self.queue_frame(byte, true),
            Frame::Malformed(byte) => {
                self.queue_frame(byte, false);
                self.pending.push_back(true);
            }
        }
    }

    /// Queues start bit, eight data bits LSB first, and a stop bit at the
    /// given level.
    pub fn queue_frame(&mut self, byte: u8, stop_high: bool) {
        self.pending.push_back(false);
        self.pending.extend((0..8).map(|bit| byte & (1 << bit) != 0));
        self.pending.push_back(stop_high);
    }

    /// Current level. The line idles high.
    pub fn level(&self) -> bool {
        self.current.unwrap_or(true)
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }

    /// Advances the line by one system clock tick.
    pub fn tick(&mut self) {
        if self.current.is_none() {
            let Some(next) = self.pending.pop_front() else {
                return;
            };
            self.current = Some(next);
            self.phase = 0;
        }

        self.phase += self.baud;
        if self.phase >= self.sys_clk_hz {
            self.phase -= self.sys_clk_hz;
            self.current = self.pending.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(line: &mut UartLine, bits: usize) -> Vec<bool> {
        let per_bit = line.ticks_per_bit() as usize;
        (0..bits)
            .map(|_| {
                let level = line.level();
                for _ in 0..per_bit {
                    line.tick();
                }
                level
            })
            .collect()
    }

    #[test]
    fn test_idle_line_is_high() {
        let mut line = UartLine::new(800, 100);
        assert!(line.is_idle());
        assert!(line.level());
        line.tick();
        assert!(line.level());
    }

    #[test]
    fn test_frame_is_lsb_first_with_stop_bit() {
        let mut line = UartLine::new(800, 100);
        line.queue(Frame::Byte(0x41));
        line.tick();

        let expected = [
            false, // start
            true, false, false, false, false, false, true, false, // 0x41
            true, // stop
        ];
        assert_eq!(levels(&mut line, 10), expected);
        assert!(line.is_idle());
    }

    #[test]
    fn test_malformed_frame_holds_stop_low_then_idles() {
        let mut line = UartLine::new(800, 100);
        line.queue(Frame::Malformed(0xff));
        line.tick();

        let bits = levels(&mut line, 11);
        assert!(!bits[0]);
        assert!(bits[1..9].iter().all(|b| *b));
        assert!(!bits[9]);
        assert!(bits[10]);
    }

    #[test]
    fn test_fractional_bit_period_does_not_drift() {
        // 7 ticks per 2 bits.
        let mut line = UartLine::new(7, 2);
        line.queue_frame(0x00, true);
        let mut ticks = 0;
        while !line.is_idle() {
            line.tick();
            ticks += 1;
        }
        assert_eq!(ticks, 35);
    }
}
