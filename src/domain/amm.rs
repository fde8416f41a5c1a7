//! Constant-product AMM math.
//!
//! All arithmetic runs in 256-bit unsigned integers with checked
//! operations; an overflow fails the calculation instead of wrapping.
//! Every division floors, so rounding never favors the trader or the
//! liquidity provider.
//!
//! Swap pricing (`x * y = k`, 0.3% fee kept by the pool):
//!
//! 1. `amount_in_with_fee = floor(amount_in * 997 / 1000)`
//! 2. `amount_out = floor(reserve_out * amount_in_with_fee / (reserve_in + amount_in_with_fee))`

use alloy::primitives::U256;

use super::error::LedgerError;

/// Fee-adjusted numerator applied to swap inputs (0.3% fee).
pub const FEE_NUMERATOR: u64 = 997;

/// Denominator of the swap fee ratio.
pub const FEE_DENOMINATOR: u64 = 1_000;

fn checked_mul(a: U256, b: U256, ctx: &'static str) -> Result<U256, LedgerError> {
    a.checked_mul(b).ok_or(LedgerError::Overflow(ctx))
}

fn checked_add(a: U256, b: U256, ctx: &'static str) -> Result<U256, LedgerError> {
    a.checked_add(b).ok_or(LedgerError::Overflow(ctx))
}

fn checked_div(a: U256, b: U256) -> Result<U256, LedgerError> {
    a.checked_div(b)
        .ok_or(LedgerError::InsufficientLiquidity("division by an empty reserve"))
}

/// Input amount left after the pool fee is retained, floored.
pub fn amount_in_with_fee(amount_in: U256) -> Result<U256, LedgerError> {
    let scaled = checked_mul(amount_in, U256::from(FEE_NUMERATOR), "fee adjustment")?;
    Ok(scaled / U256::from(FEE_DENOMINATOR))
}

/// Output amount for an exact-input swap against the given reserves.
///
/// # Errors
/// - `Validation` if `amount_in` is zero
/// - `InsufficientLiquidity` if either reserve is zero
/// - `Overflow` if an intermediate product exceeds 256 bits
pub fn get_amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
) -> Result<U256, LedgerError> {
    if amount_in.is_zero() {
        return Err(LedgerError::validation("swap input amount must be positive"));
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(LedgerError::InsufficientLiquidity("pool reserves are empty"));
    }

    let with_fee = amount_in_with_fee(amount_in)?;
    let numerator = checked_mul(reserve_out, with_fee, "swap numerator")?;
    let denominator = checked_add(reserve_in, with_fee, "swap denominator")?;

    checked_div(numerator, denominator)
}

/// Amount of B equivalent to `amount_a` at the current reserve ratio.
///
/// `quote = floor(amount_a * reserve_b / reserve_a)`
pub fn quote(amount_a: U256, reserve_a: U256, reserve_b: U256) -> Result<U256, LedgerError> {
    if amount_a.is_zero() {
        return Err(LedgerError::validation("quote amount must be positive"));
    }
    if reserve_a.is_zero() || reserve_b.is_zero() {
        return Err(LedgerError::InsufficientLiquidity("pool reserves are empty"));
    }
    let numerator = checked_mul(amount_a, reserve_b, "quote numerator")?;
    checked_div(numerator, reserve_a)
}

/// Shares minted for depositing `amount` against `reserve` of a pool
/// with `total_shares` outstanding: `floor(amount * total_shares / reserve)`.
pub fn proportional_shares(
    amount: U256,
    total_shares: U256,
    reserve: U256,
) -> Result<U256, LedgerError> {
    let numerator = checked_mul(amount, total_shares, "share numerator")?;
    checked_div(numerator, reserve)
}

/// Amount of a reserve owed to `shares` out of `total_shares`, floored.
pub fn withdrawal_amount(
    reserve: U256,
    shares: U256,
    total_shares: U256,
) -> Result<U256, LedgerError> {
    let numerator = checked_mul(reserve, shares, "withdrawal numerator")?;
    checked_div(numerator, total_shares)
}

/// Integer square root (floor) via Newton's method.
pub fn isqrt(n: U256) -> U256 {
    if n.is_zero() {
        return U256::ZERO;
    }
    let two = U256::from(2u64);
    let mut x = n;
    let mut y = n / two + n % two;
    while y < x {
        x = y;
        y = (x + n / x) / two;
    }
    x
}

/// Shares minted for the first deposit into a pool that does not hold
/// the reference asset: the floored geometric mean of both deposits.
pub fn geometric_mean_shares(amount_a: U256, amount_b: U256) -> Result<U256, LedgerError> {
    let product = checked_mul(amount_a, amount_b, "initial share product")?;
    Ok(isqrt(product))
}
