use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Timestamp, Uint128};
use cw_denom::UncheckedDenom;

#[cw_serde]
pub struct InstantiateMsg {}

#[cw_serde]
pub enum ExecuteMsg {
    /// Batch create-or-update of account shares: bps and lock times
    /// together. The caller must be the client, or an account making a
    /// non-increasing change to its own entry.
    SetAccountShares {
        /// The client namespace being edited. Defaults to the sender.
        client: Option<String>,
        balance_share_id: u64,
        accounts: Vec<String>,
        bps: Vec<u16>,
        removable_ats: Vec<Timestamp>,
    },
    /// Batch update of bps only. Lock times carry over unchanged.
    SetAccountSharesBps {
        client: Option<String>,
        balance_share_id: u64,
        accounts: Vec<String>,
        bps: Vec<u16>,
    },
    /// Batch update of lock times only. Cannot create account shares.
    SetAccountSharesRemovableAts {
        client: Option<String>,
        balance_share_id: u64,
        accounts: Vec<String>,
        removable_ats: Vec<Timestamp>,
    },
    /// Pays `amount` of `asset` into the share's current checkpoint.
    /// Native amounts must match the attached funds exactly; cw20 amounts
    /// are pulled from the sender via a prior allowance.
    AllocateToBalanceShare {
        /// The client namespace being funded. Defaults to the sender.
        client: Option<String>,
        balance_share_id: u64,
        asset: UncheckedDenom,
        amount: Uint128,
    },
    /// Charges the share's cut of a balance increase, carrying the
    /// sub-unit remainder so repeated small increases allocate exactly
    /// over time. Only callable by the client on its own share.
    AllocateToBalanceShareWithRemainder {
        balance_share_id: u64,
        asset: UncheckedDenom,
        balance_increased_by: Uint128,
    },
    /// Replaces the set of addresses approved to process the sender's
    /// withdrawals under (client, balance_share_id).
    SetWithdrawalApprovals {
        client: String,
        balance_share_id: u64,
        approved: Vec<String>,
        anyone_may_withdraw: bool,
    },
    /// Settles and pays out everything owed to `account` for the given
    /// assets. Callable by the account, an approved address, or anyone if
    /// the account has opted in. Funds always go to the account.
    ProcessWithdrawal {
        client: String,
        balance_share_id: u64,
        account: String,
        assets: Vec<UncheckedDenom>,
    },
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(BalanceShareResponse)]
    BalanceShare {
        client: String,
        balance_share_id: u64,
    },
    #[returns(AccountShareResponse)]
    AccountShare {
        client: String,
        balance_share_id: u64,
        account: String,
    },
    #[returns(ListAccountSharesResponse)]
    ListAccountShares {
        client: String,
        balance_share_id: u64,
        start_after: Option<String>,
        limit: Option<u32>,
    },
    /// The amount `AllocateToBalanceShare` would need to charge for a
    /// balance increase of `balance_increased_by`.
    #[returns(AllocationResponse)]
    BalanceShareAllocation {
        client: String,
        balance_share_id: u64,
        balance_increased_by: Uint128,
    },
    /// Same, pre-adding the remainder stored for `asset`. This is the
    /// amount `AllocateToBalanceShareWithRemainder` would charge.
    #[returns(AllocationResponse)]
    BalanceShareAllocationWithRemainder {
        client: String,
        balance_share_id: u64,
        asset: UncheckedDenom,
        balance_increased_by: Uint128,
    },
    /// What `ProcessWithdrawal` would currently pay `account` for
    /// `asset`.
    #[returns(WithdrawableBalanceResponse)]
    WithdrawableBalance {
        client: String,
        balance_share_id: u64,
        account: String,
        asset: UncheckedDenom,
    },
    /// The share's total bps as of a past block time.
    #[returns(TotalBpsResponse)]
    TotalBpsAtTime {
        client: String,
        balance_share_id: u64,
        timestamp: Timestamp,
    },
}

#[cw_serde]
pub enum MigrateMsg {
    FromCompatible {},
}

#[cw_serde]
pub struct BalanceShareResponse {
    pub checkpoint_index: u64,
    pub total_bps: u16,
}

#[cw_serde]
pub struct AccountShareResponse {
    /// The bps currently accruing. Zero if the account has been removed.
    pub bps: u16,
    /// The active lock, if the account has an open period.
    pub removable_at: Option<Timestamp>,
    /// Number of periods recorded for the account, open or closed.
    pub periods: u64,
    pub withdrawal_approvals: Vec<Addr>,
    pub anyone_may_withdraw: bool,
}

#[cw_serde]
pub struct ListAccountSharesResponse {
    pub shares: Vec<AccountShareListItem>,
}

#[cw_serde]
pub struct AccountShareListItem {
    pub account: Addr,
    pub bps: u16,
    pub removable_at: Option<Timestamp>,
}

#[cw_serde]
pub struct AllocationResponse {
    pub amount: Uint128,
}

#[cw_serde]
pub struct WithdrawableBalanceResponse {
    pub amount: Uint128,
}

#[cw_serde]
pub struct TotalBpsResponse {
    pub total_bps: u16,
}
