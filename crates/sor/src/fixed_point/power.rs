//! Fixed point power function computed as `exp(y * ln(x))`.
//!
//! The decomposition constants and Taylor expansions follow the on-chain
//! exponentiation library the weighted pools use, so that results agree with
//! settlement up to the documented relative error bound. The intermediate
//! arithmetic runs on `BigInt` with 20 (and, near 1, 36) decimals of
//! precision, with all divisions truncating toward zero like the original.

use crate::{conversions::big_int_to_u256, error::Error};
use lazy_static::lazy_static;
use num::{BigInt, One, Zero};
use primitive_types::U256;

lazy_static! {
    static ref ONE_18: BigInt = pow10(18);
    static ref ONE_20: BigInt = pow10(20);
    static ref ONE_36: BigInt = pow10(36);
    static ref MAX_NATURAL_EXPONENT: BigInt = 130 * &*ONE_18;
    static ref MIN_NATURAL_EXPONENT: BigInt = -41 * &*ONE_18;
    static ref LN_36_LOWER_BOUND: BigInt = &*ONE_18 - pow10(17);
    static ref LN_36_UPPER_BOUND: BigInt = &*ONE_18 + pow10(17);
    static ref MILD_EXPONENT_BOUND: BigInt = (BigInt::one() << 254) / &*ONE_20;

    /// e^(2^7) and e^(2^6), too large for 20 decimals so kept unscaled.
    static ref A0: BigInt =
        big("38877084059945950922200000000000000000000000000000000000");
    static ref A1: BigInt = big("6235149080811616882910000000");
    static ref X0: BigInt = big("128000000000000000000");
    static ref X1: BigInt = big("64000000000000000000");

    /// (2^-k .. 2^5 exponents, 20 decimals) with their e^x values.
    static ref DECOMPOSITION_20: Vec<(BigInt, BigInt)> = vec![
        (big("3200000000000000000000"), big("7896296018268069516100000000000000")),
        (big("1600000000000000000000"), big("888611052050787263676000000")),
        (big("800000000000000000000"), big("298095798704172827474000")),
        (big("400000000000000000000"), big("5459815003314423907810")),
        (big("200000000000000000000"), big("738905609893065022723")),
        (big("100000000000000000000"), big("271828182845904523536")),
        (big("50000000000000000000"), big("164872127070012814685")),
        (big("25000000000000000000"), big("128402541668774148407")),
        (big("12500000000000000000"), big("113314845306682631683")),
        (big("6250000000000000000"), big("106449445891785942956")),
    ];
}

fn big(value: &str) -> BigInt {
    value.parse().expect("valid decimal constant")
}

fn pow10(exponent: u32) -> BigInt {
    BigInt::from(10_u8).pow(exponent)
}

/// `x^y` with both arguments and the result as 18-decimal fixed point
/// numbers.
pub fn pow(x: U256, y: U256) -> Result<U256, Error> {
    use crate::conversions::U256Ext as _;

    if y.is_zero() {
        return Ok(U256::exp10(18));
    }
    if x.is_zero() {
        return Ok(U256::zero());
    }

    let x = x.to_big_int();
    let y = y.to_big_int();
    if x >= (BigInt::one() << 255) {
        return Err(Error::XOutOfBounds);
    }
    if y >= *MILD_EXPONENT_BOUND {
        return Err(Error::YOutOfBounds);
    }

    // When the base is close to 1, ln(x) loses precision in 18 decimals; a
    // 36 decimal variant keeps the product accurate.
    let logx_times_y = if *LN_36_LOWER_BOUND < x && x < *LN_36_UPPER_BOUND {
        let ln36 = ln_36(&x);
        (&ln36 / &*ONE_18) * &y + ((&ln36 % &*ONE_18) * &y) / &*ONE_18
    } else {
        ln(&x) * &y
    } / &*ONE_18;

    if logx_times_y < *MIN_NATURAL_EXPONENT || logx_times_y > *MAX_NATURAL_EXPONENT {
        return Err(Error::ProductOutOfBounds);
    }

    big_int_to_u256(&exp(&logx_times_y)?).ok_or(Error::ProductOutOfBounds)
}

/// Natural exponent of an 18-decimal fixed point number.
fn exp(x: &BigInt) -> Result<BigInt, Error> {
    if *x < *MIN_NATURAL_EXPONENT || *x > *MAX_NATURAL_EXPONENT {
        return Err(Error::InvalidExponent);
    }
    if x.sign() == num::bigint::Sign::Minus {
        return Ok((&*ONE_18 * &*ONE_18) / exp(&-x)?);
    }

    let mut x = x.clone();
    let first_an = if x >= *X0 {
        x -= &*X0;
        A0.clone()
    } else if x >= *X1 {
        x -= &*X1;
        A1.clone()
    } else {
        BigInt::one()
    };

    // Move to 20 decimals, strip the remaining powers of two out of the
    // exponent, then evaluate the Taylor series on what is left.
    x *= 100;
    let mut product = ONE_20.clone();
    for (x_n, a_n) in DECOMPOSITION_20.iter().take(8) {
        if x >= *x_n {
            x -= x_n;
            product = (product * a_n) / &*ONE_20;
        }
    }

    let mut series_sum = &*ONE_20 + &x;
    let mut term = x.clone();
    for n in 2..=12 {
        term = ((term * &x) / &*ONE_20) / n;
        series_sum += &term;
    }

    Ok((((product * series_sum) / &*ONE_20) * first_an) / 100)
}

/// Natural logarithm of a positive 18-decimal fixed point number.
fn ln(a: &BigInt) -> BigInt {
    if *a < *ONE_18 {
        return -ln(&((&*ONE_18 * &*ONE_18) / a));
    }

    let mut a = a.clone();
    let mut sum = BigInt::zero();
    if a >= &*A0 * &*ONE_18 {
        a /= &*A0;
        sum += &*X0;
    }
    if a >= &*A1 * &*ONE_18 {
        a /= &*A1;
        sum += &*X1;
    }

    sum *= 100;
    a *= 100;
    for (x_n, a_n) in DECOMPOSITION_20.iter() {
        if a >= *a_n {
            a = (a * &*ONE_20) / a_n;
            sum += x_n;
        }
    }

    // ln(a) = 2 * atanh((a - 1) / (a + 1)), with a now in [1, e^0.0625).
    let z = ((&a - &*ONE_20) * &*ONE_20) / (&a + &*ONE_20);
    let z_squared = (&z * &z) / &*ONE_20;
    let mut num = z.clone();
    let mut series_sum = num.clone();
    for n in [3, 5, 7, 9, 11] {
        num = (num * &z_squared) / &*ONE_20;
        series_sum += &num / n;
    }
    series_sum *= 2;

    (sum + series_sum) / 100
}

/// High precision (36 decimal) logarithm for bases close to 1.
fn ln_36(x: &BigInt) -> BigInt {
    let x = x * &*ONE_18;
    let z = ((&x - &*ONE_36) * &*ONE_36) / (&x + &*ONE_36);
    let z_squared = (&z * &z) / &*ONE_36;
    let mut num = z.clone();
    let mut series_sum = num.clone();
    for n in [3, 5, 7, 9, 11, 13, 15] {
        num = (num * &z_squared) / &*ONE_36;
        series_sum += &num / n;
    }
    series_sum * 2
}
