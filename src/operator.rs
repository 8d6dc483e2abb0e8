// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Coprocessor operator kinds.
//!
//! The discriminant is the first byte of every handle preimage, so the order
//! here is part of the handle format and must not change.

use serde::{Serialize, Deserialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Operator {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    Rem = 4,
    BitAnd = 5,
    BitOr = 6,
    BitXor = 7,
    Shl = 8,
    Shr = 9,
    Rotl = 10,
    Rotr = 11,
    Eq = 12,
    Ne = 13,
    Ge = 14,
    Gt = 15,
    Le = 16,
    Lt = 17,
    Min = 18,
    Max = 19,
    Neg = 20,
    Not = 21,
    VerifyCiphertext = 22,
    Cast = 23,
    TrivialEncrypt = 24,
    IfThenElse = 25,
    Rand = 26,
    RandBounded = 27,
}

impl Operator {
    pub const COUNT: usize = 28;

    pub fn from_u8(v: u8) -> Option<Self> {
        use Operator::*;
        let op = match v {
            0 => Add,
            1 => Sub,
            2 => Mul,
            3 => Div,
            4 => Rem,
            5 => BitAnd,
            6 => BitOr,
            7 => BitXor,
            8 => Shl,
            9 => Shr,
            10 => Rotl,
            11 => Rotr,
            12 => Eq,
            13 => Ne,
            14 => Ge,
            15 => Gt,
            16 => Le,
            17 => Lt,
            18 => Min,
            19 => Max,
            20 => Neg,
            21 => Not,
            22 => VerifyCiphertext,
            23 => Cast,
            24 => TrivialEncrypt,
            25 => IfThenElse,
            26 => Rand,
            27 => RandBounded,
            _ => return None,
        };
        Some(op)
    }

    pub fn discriminant(self) -> u8 {
        self as u8
    }

    /// Name of the executor function implementing this operator.
    pub fn function_name(self) -> &'static str {
        use Operator::*;
        match self {
            Add => "fheAdd",
            Sub => "fheSub",
            Mul => "fheMul",
            Div => "fheDiv",
            Rem => "fheRem",
            BitAnd => "fheBitAnd",
            BitOr => "fheBitOr",
            BitXor => "fheBitXor",
            Shl => "fheShl",
            Shr => "fheShr",
            Rotl => "fheRotl",
            Rotr => "fheRotr",
            Eq => "fheEq",
            Ne => "fheNe",
            Ge => "fheGe",
            Gt => "fheGt",
            Le => "fheLe",
            Lt => "fheLt",
            Min => "fheMin",
            Max => "fheMax",
            Neg => "fheNeg",
            Not => "fheNot",
            VerifyCiphertext => "verifyCiphertext",
            Cast => "cast",
            TrivialEncrypt => "trivialEncrypt",
            IfThenElse => "fheIfThenElse",
            Rand => "fheRand",
            RandBounded => "fheRandBounded",
        }
    }

    /// Comparisons always produce an `ebool`, whatever the operand width.
    pub fn is_comparison(self) -> bool {
        matches!(self, Operator::Eq | Operator::Ne | Operator::Ge | Operator::Gt | Operator::Le | Operator::Lt)
    }

    /// Nondeterministic operators overwrite their handle on rediscovery.
    pub fn is_random(self) -> bool {
        matches!(self, Operator::Rand | Operator::RandBounded)
    }
}

impl core::fmt::Display for Operator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.function_name())
    }
}
