//! Full-precision `a × b / d` for the fixed-point accumulator.
//!
//! Deposits are scaled by 10^18 and balances are often 18-decimal token
//! amounts, so the intermediate product routinely exceeds `u128`. The product
//! is formed in 256 bits and divided back down; only a quotient that does not
//! fit in `u128` is reported as overflow.

#[allow(clippy::all)]
mod wide {
    uint::construct_uint! {
        pub struct U256(4);
    }
}

pub use wide::U256;

/// `floor(a × b / d)`, or `None` if `d == 0` or the quotient overflows.
pub fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    let quotient = U256::from(a)
        .checked_mul(U256::from(b))?
        .checked_div(U256::from(d))?;
    if quotient > U256::from(u128::MAX) {
        return None;
    }
    Some(quotient.low_u128())
}
