//! Conversions between `U256` amounts and `num` big-integer types used for
//! exact rational price arithmetic.

use num::{BigInt, BigUint, bigint::Sign};
use primitive_types::U256;

pub trait U256Ext: Sized {
    fn to_big_uint(&self) -> BigUint;
    fn to_big_int(&self) -> BigInt;
}

impl U256Ext for U256 {
    fn to_big_uint(&self) -> BigUint {
        let mut bytes = [0; 32];
        self.to_big_endian(&mut bytes);
        BigUint::from_bytes_be(&bytes)
    }

    fn to_big_int(&self) -> BigInt {
        BigInt::from_biguint(Sign::Plus, self.to_big_uint())
    }
}

pub fn big_uint_to_u256(value: &BigUint) -> Option<U256> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return None;
    }
    Some(U256::from_big_endian(&bytes))
}

pub fn big_int_to_u256(value: &BigInt) -> Option<U256> {
    if value.sign() == Sign::Minus {
        return None;
    }
    big_uint_to_u256(value.magnitude())
}
