use std::convert::TryInto;

use cosmwasm_std::{Uint128, Uint256};

use crate::state::MAX_TOTAL_BPS;

/// Computes the floor share of a checkpoint balance owed to an account.
///
/// # Arguments
///
/// * `balance` - The checkpoint's accrued balance for the asset.
/// * `bps` - The account's basis points during the checkpoint.
/// * `total_bps` - The checkpoint's aggregate basis points.
///
/// Active accounts' bps never sum above `total_bps`, so the result never
/// exceeds `balance` and the widened product always converts back down.
pub(crate) fn entitlement(balance: Uint128, bps: u16, total_bps: u16) -> Uint128 {
    if total_bps == 0 {
        return Uint128::zero();
    }
    balance
        .full_mul(Uint128::from(bps))
        .checked_div(Uint256::from(u128::from(total_bps)))
        .unwrap() // total_bps != 0 checked above
        .try_into()
        .unwrap() // bps <= total_bps => result <= balance
}

/// Splits a balance increase into the amount charged to a share and the
/// sub-unit remainder carried to the next allocation.
///
/// The remainder is kept in ten-thousandths of a unit: the charged amount
/// is `(balance_increased_by * total_bps + remainder) / 10000` and the new
/// remainder is what that division left over. Chaining calls therefore
/// allocates exactly `floor(sum * total_bps / 10000)` of any cumulative
/// balance increase, with nothing lost to per-call rounding.
pub(crate) fn allocation_with_remainder(
    balance_increased_by: Uint128,
    total_bps: u16,
    remainder: Uint128,
) -> (Uint128, Uint128) {
    let max = Uint256::from(u128::from(MAX_TOTAL_BPS));
    let numerator =
        balance_increased_by.full_mul(Uint128::from(total_bps)) + Uint256::from(remainder);
    let amount = (numerator / max)
        .try_into()
        // total_bps <= 10000 and remainder < 10000, so the quotient is at
        // most balance_increased_by and fits back into a u128.
        .unwrap();
    let new_remainder = (numerator % max)
        .try_into()
        .unwrap(); // strictly less than 10000
    (amount, new_remainder)
}

/// The amount a plain allocation charges for a balance increase:
/// `floor(balance_increased_by * total_bps / 10000)`.
pub(crate) fn allocation(balance_increased_by: Uint128, total_bps: u16) -> Uint128 {
    allocation_with_remainder(balance_increased_by, total_bps, Uint128::zero()).0
}
