// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Cleartext semantics of the coprocessor operators.
//!
//! Every function returns a value already reduced into `[0, 2^width)`.
//! Operands are expected to be reduced too, except scalar literals which
//! may exceed the width.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use rand::RngCore;

use crate::error::{KernelError, KernelResult};
use crate::operator::Operator;
use crate::types::cleartext::{mask, modulus, reduce};

fn bool_value(b: bool) -> BigUint {
    if b { BigUint::one() } else { BigUint::zero() }
}

/// Shift amounts are taken modulo the operand width.
fn shift_amount(rhs: &BigUint, width: u32) -> u32 {
    // width <= 2048, so the remainder always fits.
    (rhs % BigUint::from(width)).to_u32().unwrap_or(0)
}

pub fn binary(op: Operator, lhs: &BigUint, rhs: &BigUint, width: u32) -> KernelResult<BigUint> {
    let m = modulus(width);
    let value = match op {
        Operator::Add => (lhs + rhs) % &m,
        Operator::Sub => {
            let lhs = lhs % &m;
            let rhs = rhs % &m;
            (lhs + &m - rhs) % &m
        }
        Operator::Mul => (lhs * rhs) % &m,
        // Unsigned FHE division by an encrypted zero yields all ones.
        Operator::Div => {
            if rhs.is_zero() {
                mask(width)
            } else {
                (lhs / rhs) % &m
            }
        }
        Operator::Rem => {
            if rhs.is_zero() {
                lhs % &m
            } else {
                (lhs % rhs) % &m
            }
        }
        Operator::BitAnd => (lhs & rhs) % &m,
        Operator::BitOr => (lhs | rhs) % &m,
        Operator::BitXor => (lhs ^ rhs) % &m,
        Operator::Shl => (lhs << shift_amount(rhs, width)) % &m,
        Operator::Shr => (lhs >> shift_amount(rhs, width)) % &m,
        Operator::Rotl => {
            let s = shift_amount(rhs, width);
            let x = lhs % &m;
            ((&x << s) | (&x >> (width - s))) % &m
        }
        Operator::Rotr => {
            let s = shift_amount(rhs, width);
            let x = lhs % &m;
            ((&x >> s) | (&x << (width - s))) % &m
        }
        Operator::Eq => bool_value(lhs == rhs),
        Operator::Ne => bool_value(lhs != rhs),
        Operator::Ge => bool_value(lhs >= rhs),
        Operator::Gt => bool_value(lhs > rhs),
        Operator::Le => bool_value(lhs <= rhs),
        Operator::Lt => bool_value(lhs < rhs),
        Operator::Min => std::cmp::min(lhs, rhs) % &m,
        Operator::Max => std::cmp::max(lhs, rhs) % &m,
        other => {
            return Err(KernelError::InvalidOperation(format!("{} is not a binary operator", other)));
        }
    };
    Ok(value)
}

/// Bitwise complement masked to `width`.
pub fn not(value: &BigUint, width: u32) -> BigUint {
    mask(width) ^ reduce(value, width)
}

/// Two's-complement negation: `(~x + 1) mod 2^width`.
pub fn neg(value: &BigUint, width: u32) -> BigUint {
    (not(value, width) + BigUint::one()) % modulus(width)
}

pub fn cast(value: &BigUint, to_width: u32) -> BigUint {
    reduce(value, to_width)
}

/// Uniform value of `bits` random bits.
pub fn random_bits<R: RngCore + ?Sized>(rng: &mut R, bits: u64) -> BigUint {
    if bits == 0 {
        return BigUint::zero();
    }
    let mut bytes = vec![0u8; bits.div_ceil(8) as usize];
    rng.fill_bytes(&mut bytes);
    BigUint::from_bytes_be(&bytes) & (mask(bits as u32))
}

/// Bits drawn for a bounded random value: `ceil(log2(bound))`.
pub fn bounded_bits(bound: &BigUint) -> u64 {
    if bound <= &BigUint::one() {
        return 0;
    }
    let bits = bound.bits();
    let power_of_two = ((bound - BigUint::one()) & bound).is_zero();
    if power_of_two { bits - 1 } else { bits }
}

pub fn select(control: &BigUint, if_true: BigUint, if_false: BigUint) -> BigUint {
    if control.is_one() { if_true } else { if_false }
}
