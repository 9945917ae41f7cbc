// =============================================================================
// OP - Bytecode instructions of the type VM
// =============================================================================
//
// Every instruction is one opcode byte followed by a fixed-width operand.
// Widths never vary per instance: the linker rewrites `Call` targets in place.

/// Width of an address operand (`Call`, `Jump`, literal storage offsets).
pub const ADDRESS_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    // keyword types
    Boolean = 0,
    String,
    Number,
    True,
    False,

    // literal types, operand: storage offset
    BigIntLiteral,
    NumberLiteral,
    StringLiteral,

    /// Combines every value pushed since the last `Frame` and closes it.
    Union,

    /// Loads a type variable, operand: frame id + slot index.
    Loads,

    /// Calls a subroutine, operand: address.
    Call,

    /// Declares a type parameter slot in the current routine frame.
    Var,

    Function,

    /// Type must be inferred.
    Unknown,

    /// ( value declared -- ), checks the value against the declared type
    Assign,

    /// Opens a new frame.
    Frame,

    /// Unconditional jump, operand: absolute address.
    Jump,

    Return,
}

impl Op {
    pub const ALL: [Op; 18] = [
        Op::Boolean,
        Op::String,
        Op::Number,
        Op::True,
        Op::False,
        Op::BigIntLiteral,
        Op::NumberLiteral,
        Op::StringLiteral,
        Op::Union,
        Op::Loads,
        Op::Call,
        Op::Var,
        Op::Function,
        Op::Unknown,
        Op::Assign,
        Op::Frame,
        Op::Jump,
        Op::Return,
    ];

    /// Number of operand bytes following the opcode byte.
    pub fn operand_width(self) -> usize {
        match self {
            Op::Call | Op::Jump => ADDRESS_WIDTH,
            Op::BigIntLiteral | Op::NumberLiteral | Op::StringLiteral => ADDRESS_WIDTH,
            Op::Loads => 2 * ADDRESS_WIDTH,
            _ => 0,
        }
    }

    /// Mnemonic used in listings.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Op::Boolean => "BOOLEAN",
            Op::String => "STRING",
            Op::Number => "NUMBER",
            Op::True => "TRUE",
            Op::False => "FALSE",
            Op::BigIntLiteral => "BIGINT_LIT",
            Op::NumberLiteral => "NUMBER_LIT",
            Op::StringLiteral => "STRING_LIT",
            Op::Union => "UNION",
            Op::Loads => "LOADS",
            Op::Call => "CALL",
            Op::Var => "VAR",
            Op::Function => "FUNCTION",
            Op::Unknown => "UNKNOWN",
            Op::Assign => "ASSIGN",
            Op::Frame => "FRAME",
            Op::Jump => "JUMP",
            Op::Return => "RETURN",
        }
    }
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Op::ALL.get(byte as usize).copied().ok_or(byte)
    }
}

impl From<Op> for u8 {
    fn from(op: Op) -> Self {
        op as u8
    }
}

pub fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

pub fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let raw = bytes.get(at..at + 2)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

/// Overwrite four bytes at `at`. The buffer must already hold them.
pub fn write_u32_at(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}
