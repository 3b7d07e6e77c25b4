//! Instruction set.
//!
//! Code is a flat stream of `u32` words: an opcode followed by its operands.
//! Binary operators take their left operand from the top of the stack, so
//! the compiler evaluates the right operand first.

use std::fmt;

/// What an operand word means, for the disassembler and the persisted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Interned identifier, patched at load time.
    Ident,
    /// Absolute instruction index.
    Jump,
    /// Immediate 32-bit integer.
    Int,
    /// Index into the active float table.
    Float,
    /// Byte offset into the active string table.
    Str,
    Char,
    Flag,
    CallKind,
    /// Number of trailing ident operands (`FUNC_DECL` parameters).
    Count,
}

/// Net effect of one instruction on the value stack's nesting depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueEffect {
    Delta(i8),
    /// Opens a call-argument frame.
    OpenFrame,
    /// Collects and closes the innermost call-argument frame.
    CloseFrame,
}

/// Static per-opcode stack contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEffect {
    pub int: i8,
    pub float: i8,
    pub value: ValueEffect,
}

const V0: ValueEffect = ValueEffect::Delta(0);
const VUP: ValueEffect = ValueEffect::Delta(1);
const VDOWN: ValueEffect = ValueEffect::Delta(-1);
const OPEN: ValueEffect = ValueEffect::OpenFrame;
const CLOSE: ValueEffect = ValueEffect::CloseFrame;

macro_rules! opcodes {
    ($($name:ident = $mnemonic:literal [$($operand:ident),*] ($int:expr, $float:expr, $value:expr);)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($name,)*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)*];

            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }

            /// Fixed operand layout. `FUNC_DECL` is followed by `Count` extra idents.
            pub const fn operands(self) -> &'static [Operand] {
                match self {
                    $(Opcode::$name => &[$(Operand::$operand),*],)*
                }
            }

            /// Fall-through effect. Taken `_NP` jumps leave their operand.
            pub const fn stack_effect(self) -> StackEffect {
                match self {
                    $(Opcode::$name => StackEffect { int: $int, float: $float, value: $value },)*
                }
            }
        }
    };
}

opcodes! {
    FuncDecl = "FUNC_DECL" [Ident, Ident, Ident, Flag, Jump, Count] (0, 0, V0);
    CreateObject = "CREATE_OBJECT" [Ident, Jump] (0, 0, CLOSE);
    AddObject = "ADD_OBJECT" [Flag] (0, 0, V0);
    EndObject = "END_OBJECT" [] (0, 0, V0);
    JmpIfFNot = "JMPIFFNOT" [Jump] (0, -1, V0);
    JmpIfNot = "JMPIFNOT" [Jump] (-1, 0, V0);
    JmpIfF = "JMPIFF" [Jump] (0, -1, V0);
    JmpIf = "JMPIF" [Jump] (-1, 0, V0);
    JmpIfNotNp = "JMPIFNOT_NP" [Jump] (-1, 0, V0);
    JmpIfNp = "JMPIF_NP" [Jump] (-1, 0, V0);
    Jmp = "JMP" [Jump] (0, 0, V0);
    Return = "RETURN" [] (0, 0, V0);
    ReturnVoid = "RETURN_VOID" [] (0, 0, V0);
    CmpEq = "CMPEQ" [] (1, -2, V0);
    CmpGr = "CMPGR" [] (1, -2, V0);
    CmpGe = "CMPGE" [] (1, -2, V0);
    CmpLt = "CMPLT" [] (1, -2, V0);
    CmpLe = "CMPLE" [] (1, -2, V0);
    CmpNe = "CMPNE" [] (1, -2, V0);
    Xor = "XOR" [] (-1, 0, V0);
    Mod = "MOD" [] (-1, 0, V0);
    BitAnd = "BITAND" [] (-1, 0, V0);
    BitOr = "BITOR" [] (-1, 0, V0);
    Not = "NOT" [] (0, 0, V0);
    NotF = "NOTF" [] (1, -1, V0);
    OnesComplement = "ONESCOMPLEMENT" [] (0, 0, V0);
    Shr = "SHR" [] (-1, 0, V0);
    Shl = "SHL" [] (-1, 0, V0);
    And = "AND" [] (-1, 0, V0);
    Or = "OR" [] (-1, 0, V0);
    Add = "ADD" [] (0, -1, V0);
    Sub = "SUB" [] (0, -1, V0);
    Mul = "MUL" [] (0, -1, V0);
    Div = "DIV" [] (0, -1, V0);
    Neg = "NEG" [] (0, 0, V0);
    LoadVarUint = "LOADVAR_UINT" [Ident] (1, 0, V0);
    LoadVarFlt = "LOADVAR_FLT" [Ident] (0, 1, V0);
    LoadVarStr = "LOADVAR_STR" [Ident] (0, 0, V0);
    SaveVarUint = "SAVEVAR_UINT" [Ident] (0, 0, V0);
    SaveVarFlt = "SAVEVAR_FLT" [Ident] (0, 0, V0);
    SaveVarStr = "SAVEVAR_STR" [Ident] (0, 0, V0);
    LoadVarArrayUint = "LOADVAR_ARRAY_UINT" [] (1, 0, V0);
    LoadVarArrayFlt = "LOADVAR_ARRAY_FLT" [] (0, 1, V0);
    LoadVarArrayStr = "LOADVAR_ARRAY_STR" [] (0, 0, V0);
    SaveVarArrayUint = "SAVEVAR_ARRAY_UINT" [] (0, 0, V0);
    SaveVarArrayFlt = "SAVEVAR_ARRAY_FLT" [] (0, 0, V0);
    SaveVarArrayStr = "SAVEVAR_ARRAY_STR" [] (0, 0, VDOWN);
    SetCurObject = "SETCUROBJECT" [] (0, 0, V0);
    SetCurObjectNew = "SETCUROBJECT_NEW" [] (0, 0, V0);
    SetCurField = "SETCURFIELD" [Ident] (0, 0, V0);
    SetCurFieldArray = "SETCURFIELD_ARRAY" [] (0, 0, V0);
    LoadFieldUint = "LOADFIELD_UINT" [] (1, 0, V0);
    LoadFieldFlt = "LOADFIELD_FLT" [] (0, 1, V0);
    LoadFieldStr = "LOADFIELD_STR" [] (0, 0, V0);
    SaveFieldUint = "SAVEFIELD_UINT" [] (0, 0, V0);
    SaveFieldFlt = "SAVEFIELD_FLT" [] (0, 0, V0);
    SaveFieldStr = "SAVEFIELD_STR" [] (0, 0, V0);
    StrToUint = "STR_TO_UINT" [] (1, 0, V0);
    StrToFlt = "STR_TO_FLT" [] (0, 1, V0);
    StrToNone = "STR_TO_NONE" [] (0, 0, V0);
    FltToUint = "FLT_TO_UINT" [] (1, -1, V0);
    FltToStr = "FLT_TO_STR" [] (0, -1, V0);
    FltToNone = "FLT_TO_NONE" [] (0, -1, V0);
    UintToFlt = "UINT_TO_FLT" [] (-1, 1, V0);
    UintToStr = "UINT_TO_STR" [] (-1, 0, V0);
    UintToNone = "UINT_TO_NONE" [] (-1, 0, V0);
    LoadImmedUint = "LOADIMMED_UINT" [Int] (1, 0, V0);
    LoadImmedFlt = "LOADIMMED_FLT" [Float] (0, 1, V0);
    LoadImmedStr = "LOADIMMED_STR" [Str] (0, 0, V0);
    LoadImmedIdent = "LOADIMMED_IDENT" [Ident] (0, 0, V0);
    CallFuncResolve = "CALLFUNC_RESOLVE" [Ident, Ident, CallKind] (0, 0, CLOSE);
    CallFunc = "CALLFUNC" [Ident, Ident, CallKind] (0, 0, CLOSE);
    AdvanceStr = "ADVANCE_STR" [] (0, 0, VUP);
    AdvanceStrAppendChar = "ADVANCE_STR_APPENDCHAR" [Char] (0, 0, VUP);
    AdvanceStrComma = "ADVANCE_STR_COMMA" [] (0, 0, VUP);
    AdvanceStrNul = "ADVANCE_STR_NUL" [] (0, 0, VUP);
    RewindStr = "REWIND_STR" [] (0, 0, VDOWN);
    TerminateRewindStr = "TERMINATE_REWIND_STR" [] (0, 0, VDOWN);
    CompareStr = "COMPARE_STR" [] (1, 0, VDOWN);
    Push = "PUSH" [] (0, 0, VUP);
    PushFrame = "PUSH_FRAME" [] (0, 0, OPEN);
    Break = "BREAK" [] (0, 0, V0);
    Invalid = "INVALID" [] (0, 0, V0);
}

impl Opcode {
    #[inline]
    pub fn from_word(word: u32) -> Option<Opcode> {
        Opcode::ALL.get(word as usize).copied()
    }

    #[inline]
    pub const fn word(self) -> u32 {
        self as u32
    }

    /// Effect when a conditional jump is taken.
    pub const fn taken_effect(self) -> StackEffect {
        match self {
            Opcode::JmpIfNotNp | Opcode::JmpIfNp => StackEffect {
                int: 0,
                float: 0,
                value: V0,
            },
            other => other.stack_effect(),
        }
    }

    pub const fn is_conditional_jump(self) -> bool {
        matches!(
            self,
            Opcode::JmpIfFNot
                | Opcode::JmpIfNot
                | Opcode::JmpIfF
                | Opcode::JmpIf
                | Opcode::JmpIfNotNp
                | Opcode::JmpIfNp
        )
    }

    /// Total instruction width in words, reading `FUNC_DECL`'s parameter
    /// count from `code` when needed.
    pub fn width(self, code: &[u32], ip: usize) -> usize {
        let fixed = 1 + self.operands().len();
        if self == Opcode::FuncDecl {
            let argc = code.get(ip + 6).copied().unwrap_or(0) as usize;
            fixed + argc
        } else {
            fixed
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// How a call instruction resolves its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CallType {
    /// Global or `ns::fn` lookup.
    Function = 0,
    /// Lookup in the namespace of the object named by the first argument.
    Method = 1,
    /// Lookup in the parent of the running function's namespace.
    Parent = 2,
}

impl CallType {
    pub fn from_word(word: u32) -> CallType {
        match word {
            1 => CallType::Method,
            2 => CallType::Parent,
            _ => CallType::Function,
        }
    }
}
