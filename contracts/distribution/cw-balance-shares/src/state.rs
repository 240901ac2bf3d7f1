use std::collections::HashMap;

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Timestamp, Uint128};
use cw_checkpoints::CheckpointMap;
use cw_denom::CheckedDenom;
use cw_storage_plus::Map;

/// Total basis points representing 100% of a balance share.
pub const MAX_TOTAL_BPS: u16 = 10_000;

/// A checkpoint's per-asset balance sum saturates here. Allocating past it
/// rolls the excess into a freshly opened checkpoint with the same total
/// bps.
pub const MAX_BALANCE_SUM: Uint128 = Uint128::new((1u128 << 112) - 1);

/// Balance share metadata, keyed by (client, balance share id).
pub const BALANCE_SHARES: Map<(&Addr, u64), BalanceShare> = Map::new("balance_shares");

/// Balance sum checkpoints, keyed by (client, balance share id, checkpoint
/// index). Indices are dense: every index in `0..=checkpoint_index` has an
/// entry.
pub const BALANCE_SUM_CHECKPOINTS: Map<(&Addr, u64, u64), BalanceSumCheckpoint> =
    Map::new("balance_sum_checkpoints");

/// Account shares, keyed by (client, balance share id, account).
pub const ACCOUNT_SHARES: Map<(&Addr, u64, &Addr), AccountShare> = Map::new("account_shares");

/// Block-time-keyed history of each share's total bps, for historical
/// queries.
pub const TOTAL_BPS_CHECKPOINTS: CheckpointMap<(&Addr, u64), u16> =
    CheckpointMap::new("total_bps__checkpoints", "total_bps__length");

#[cw_serde]
pub struct BalanceShare {
    /// The currently active balance sum checkpoint slot.
    pub checkpoint_index: u64,
}

#[cw_serde]
#[derive(Default)]
pub struct BalanceSum {
    /// Ten-thousandths of a unit not yet charged by proportional
    /// allocation.
    pub remainder: Uint128,
    /// Running total allocated while this checkpoint was active. Never
    /// reduced; withdrawals advance per-account cursors instead.
    pub balance: Uint128,
}

#[cw_serde]
pub struct BalanceSumCheckpoint {
    /// Sum of all active account shares' bps while this checkpoint is
    /// active.
    pub total_bps: u16,
    /// Per-asset balance sums, keyed by denom string.
    pub balance_sums: HashMap<String, BalanceSum>,
}

impl BalanceSumCheckpoint {
    pub fn new(total_bps: u16) -> Self {
        Self {
            total_bps,
            balance_sums: HashMap::new(),
        }
    }
}

#[cw_serde]
pub struct AccountShare {
    /// This account's bps periods in checkpoint order. Only the last may
    /// be open. Never truncated: closed periods remain settleable.
    pub periods: Vec<AccountSharePeriod>,
    /// Addresses the account has approved to process its withdrawals.
    pub withdrawal_approvals: Vec<Addr>,
    /// Whether any address may process withdrawals for this account.
    pub anyone_may_withdraw: bool,
}

impl AccountShare {
    pub fn new() -> Self {
        Self {
            periods: vec![],
            withdrawal_approvals: vec![],
            anyone_may_withdraw: false,
        }
    }

    pub fn open_period(&self) -> Option<&AccountSharePeriod> {
        self.periods.last().filter(|p| p.end_index.is_none())
    }

    pub fn open_period_mut(&mut self) -> Option<&mut AccountSharePeriod> {
        self.periods.last_mut().filter(|p| p.end_index.is_none())
    }

    /// The bps currently accruing for this account. Zero if the account
    /// has been removed.
    pub fn current_bps(&self) -> u16 {
        self.open_period().map(|p| p.bps).unwrap_or_default()
    }

    pub fn current_removable_at(&self) -> Timestamp {
        self.open_period()
            .map(|p| p.removable_at)
            .unwrap_or_else(|| Timestamp::from_seconds(0))
    }
}

#[cw_serde]
pub struct AccountSharePeriod {
    /// This account's share of allocations while the period is active.
    pub bps: u16,
    /// First checkpoint index the period's bps applied to.
    pub start_index: u64,
    /// One past the last checkpoint index covered. `None` while the
    /// period is open.
    pub end_index: Option<u64>,
    pub initialized_at: Timestamp,
    /// Before this time the client cannot decrease the account's bps or
    /// tighten the lock. The account itself is exempt.
    pub removable_at: Timestamp,
    /// Per-asset settlement cursors, keyed by denom string.
    pub cursors: HashMap<String, WithdrawalCursor>,
}

#[cw_serde]
pub struct WithdrawalCursor {
    /// The last checkpoint index settled for the asset.
    pub checkpoint_index: u64,
    /// Amount already paid out at that checkpoint.
    pub withdrawn: Uint128,
}

/// The key a denom is tracked under in per-asset maps.
pub fn asset_key(denom: &CheckedDenom) -> String {
    match denom {
        CheckedDenom::Native(denom) => denom.to_string(),
        CheckedDenom::Cw20(address) => address.to_string(),
    }
}
