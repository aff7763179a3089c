// crates/deltakit-hash/src/prime.rs

//! Miller-Rabin primality testing for hash-table auto-sizing.
//!
//! The differencing algorithms size their tables to the smallest prime at or
//! above a derived target; candidates here are table capacities, so the u64
//! domain is plenty and 100 random witnesses make a false positive
//! astronomically unlikely.

use rand::{rngs::StdRng, Rng as _, SeedableRng};

/// Witness rounds for [`is_prime`].
const WITNESS_ROUNDS: u32 = 100;

/// `base^exp mod modulus` with 128-bit intermediates.
#[must_use]
fn power_mod(base: u64, mut exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let m = u128::from(modulus);
    let mut result: u128 = 1;
    let mut b = u128::from(base) % m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * b % m;
        }
        exp >>= 1;
        b = b * b % m;
    }
    result as u64
}

/// Factor `n` as `d * 2^r` with `d` odd.
#[must_use]
fn factor_pow2(mut n: u64) -> (u64, u32) {
    let mut r = 0;
    while n % 2 == 0 {
        n /= 2;
        r += 1;
    }
    (n, r)
}

/// Returns `true` if witness `a` proves `n` composite.
#[must_use]
fn witness(a: u64, n: u64) -> bool {
    let (d, r) = factor_pow2(n - 1);
    let mut x = power_mod(a, d, n);
    for _ in 0..r {
        let y = power_mod(x, 2, n);
        if y == 1 && x != 1 && x != n - 1 {
            return true;
        }
        x = y;
    }
    x != 1
}

/// Miller-Rabin primality test with [`WITNESS_ROUNDS`] random witnesses.
///
/// Witnesses are drawn from an rng seeded by `n` itself, so the answer for a
/// given input never varies between runs.
#[must_use]
pub fn is_prime(n: u64) -> bool {
    if n < 2 || (n != 2 && n % 2 == 0) {
        return false;
    }
    if n == 2 || n == 3 {
        return true;
    }

    let mut rng = StdRng::seed_from_u64(n ^ 0xdead_beef_cafe_babe);
    for _ in 0..WITNESS_ROUNDS {
        let a = rng.random_range(2..=n - 2);
        if witness(a, n) {
            return false;
        }
    }
    true
}

/// Smallest prime `>= n`, found by walking ascending odd candidates.
#[must_use]
pub fn next_prime(n: u64) -> u64 {
    if n <= 2 {
        return 2;
    }
    let mut c = if n % 2 == 0 { n + 1 } else { n };
    while !is_prime(c) {
        c += 2;
    }
    c
}
