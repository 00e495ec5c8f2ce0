//! GF(2⁸) arithmetic for Shamir's Secret Sharing.
//!
//! Field: GF(2⁸) with the AES irreducible polynomial x⁸ + x⁴ + x³ + x + 1
//! (0x11B). Log/exp tables are generated at compile time from the
//! generator 0x03, so multiplication and division are two lookups.

/// Multiply by x in the field (the AES `xtime` step).
const fn xtime(a: u8) -> u8 {
    let shifted = (a as u16) << 1;
    if shifted & 0x100 != 0 {
        (shifted ^ 0x11B) as u8
    } else {
        shifted as u8
    }
}

/// Build (log, exp) tables for generator 0x03.
///
/// `exp` is doubled in length so `exp[log_a + log_b]` never needs a
/// modular reduction.
const fn build_tables() -> ([u8; 256], [u8; 510]) {
    let mut log = [0u8; 256];
    let mut exp = [0u8; 510];
    let mut value: u8 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = value;
        log[value as usize] = i as u8;
        // value *= 3, i.e. value*2 ^ value
        value = xtime(value) ^ value;
        i += 1;
    }
    let mut j = 0;
    while j < 255 {
        exp[255 + j] = exp[j];
        j += 1;
    }
    (log, exp)
}

const TABLES: ([u8; 256], [u8; 510]) = build_tables();
const LOG: [u8; 256] = TABLES.0;
const EXP: [u8; 510] = TABLES.1;

/// Addition is XOR in characteristic 2; subtraction is the same operation.
#[inline]
pub fn gf_add(a: u8, b: u8) -> u8 {
    a ^ b
}

#[inline]
pub fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    EXP[LOG[a as usize] as usize + LOG[b as usize] as usize]
}

#[inline]
pub fn gf_div(a: u8, b: u8) -> u8 {
    assert!(b != 0, "division by zero in GF(256)");
    if a == 0 {
        return 0;
    }
    EXP[LOG[a as usize] as usize + 255 - LOG[b as usize] as usize]
}

/// Evaluate a polynomial at `x` by Horner's method.
/// `coefficients[0]` is the constant term.
pub fn poly_eval(coefficients: &[u8], x: u8) -> u8 {
    coefficients
        .iter()
        .rev()
        .fold(0u8, |acc, &c| gf_add(gf_mul(acc, x), c))
}

/// Lagrange interpolation at x = 0.
///
/// `points` are distinct `(x, y)` pairs with x ≠ 0. Returns p(0), the
/// shared secret byte.
pub fn interpolate_at_zero(points: &[(u8, u8)]) -> u8 {
    let mut secret = 0u8;

    for (i, &(xi, yi)) in points.iter().enumerate() {
        let mut num = 1u8;
        let mut den = 1u8;
        for (j, &(xj, _)) in points.iter().enumerate() {
            if i != j {
                // basis numerator picks up (0 - xj) = xj; denominator (xi - xj)
                num = gf_mul(num, xj);
                den = gf_mul(den, gf_add(xi, xj));
            }
        }
        secret = gf_add(secret, gf_mul(yi, gf_div(num, den)));
    }

    secret
}
