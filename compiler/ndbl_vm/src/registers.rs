//! Register file.

use ndbl_ast::Qword;
use ndbl_compile::Register;

/// `rax`, `rdx` and `eip`, one qword each.
///
/// `eip` holds the line of the next instruction to execute.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    rax: Qword,
    rdx: Qword,
    eip: Qword,
}

impl Registers {
    pub fn read(&self, register: Register) -> Qword {
        match register {
            Register::Rax => self.rax,
            Register::Rdx => self.rdx,
            Register::Eip => self.eip,
        }
    }

    pub(crate) fn write(&mut self, register: Register, word: Qword) {
        match register {
            Register::Rax => self.rax = word,
            Register::Rdx => self.rdx = word,
            Register::Eip => self.eip = word,
        }
    }

    /// `eip` as a line index.
    pub fn cursor(&self) -> usize {
        usize::try_from(self.eip.bits()).unwrap_or(usize::MAX)
    }

    pub(crate) fn set_cursor(&mut self, line: usize) {
        self.eip = Qword::from_bits(u64::try_from(line).unwrap_or(u64::MAX));
    }

    pub(crate) fn clear(&mut self) {
        *self = Registers::default();
    }
}
