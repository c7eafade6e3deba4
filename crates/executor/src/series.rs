//! Geometric-series helpers for sequential loop sizing
//!
//! A sequential loop with first tranche `a` and ratio `r` between
//! consecutive tranches deposits `a + ar + ar^2 + ...`. The sum bounds the
//! collateral the loop can build; the last term bounds what withdrawal
//! capacity remains before liquidation risk.

use rust_decimal::Decimal;

/// Sum of the first `n` terms: `a * (1 - r^n) / (1 - r)`, or `a * n` when
/// `r == 1`. Zero terms sum to zero.
pub fn series_sum(a: Decimal, r: Decimal, n: u32) -> Decimal {
    if n == 0 {
        return Decimal::ZERO;
    }
    if r == Decimal::ONE {
        return a * Decimal::from(n);
    }
    a * (Decimal::ONE - powi(r, n)) / (Decimal::ONE - r)
}

/// The `n`-th term of the series: `a * r^(n-1)`. Zero for `n == 0`.
pub fn last_term(a: Decimal, r: Decimal, n: u32) -> Decimal {
    if n == 0 {
        return Decimal::ZERO;
    }
    a * powi(r, n - 1)
}

/// Decimal power with a small non-negative integer exponent
fn powi(base: Decimal, exp: u32) -> Decimal {
    let mut acc = Decimal::ONE;
    for _ in 0..exp {
        acc *= base;
    }
    acc
}
