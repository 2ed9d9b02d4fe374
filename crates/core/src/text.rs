// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Static texts the secondary core can be told to transmit.
//!
//! A mailbox word cannot carry a pointer safely across cores, so it carries a
//! [`TextRef`] instead: a tagged index into a table of `'static` strings.

/// Written once to the hard UART after startup.
pub const DEMO_TEXT: &str =
    "Hello, world from PIO! (Plus 2 UARTs and 2 cores, for complex reasons)\n";

static TEXTS: [&str; 1] = [DEMO_TEXT];

const TAG: u32 = 0x5458_0000;
const TAG_MASK: u32 = 0xffff_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRef(u16);

impl TextRef {
    pub const DEMO: TextRef = TextRef(0);

    pub const fn to_word(self) -> u32 {
        TAG | self.0 as u32
    }

    /// `None` for words that do not name a table entry.
    pub fn from_word(word: u32) -> Option<Self> {
        if word & TAG_MASK != TAG {
            return None;
        }
        let index = (word & !TAG_MASK) as u16;
        ((index as usize) < TEXTS.len()).then_some(TextRef(index))
    }

    pub fn text(self) -> &'static str {
        TEXTS[self.0 as usize]
    }

    pub fn index(self) -> u16 {
        self.0
    }
}
