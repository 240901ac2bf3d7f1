use cosmwasm_std::{StdError, Timestamp, Uint128};
use cw_checkpoints::CheckpointError;
use cw_denom::DenomError;
use cw_utils::PaymentError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error(transparent)]
    Std(#[from] StdError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Denom(#[from] DenomError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("account and parameter arrays must be the same length")]
    MismatchingArrayLengths {},

    #[error("at least one array item must be provided")]
    MissingArrayItems {},

    #[error("invalid account address ({address})")]
    InvalidAddress { address: String },

    #[error("only the client, or the account itself making a non-increasing change, may edit account shares")]
    UnauthorizedToEditAccountShares {},

    #[error("update changes nothing for account ({account})")]
    AccountShareNoUpdate { account: String },

    #[error("account share is locked until ({removable_at})")]
    AccountShareIsCurrentlyLocked { removable_at: Timestamp },

    #[error("balance sum checkpoint index overflow")]
    BalanceSumCheckpointIndexOverflow {},

    #[error("update would push total bps to ({total_bps}), above the maximum ({max})")]
    UpdateExceedsMaxTotalBps { total_bps: u32, max: u16 },

    #[error("balance share has no active account shares")]
    BalanceShareInactive {},

    #[error("no account share exists for account ({account})")]
    AccountShareDoesNotExist { account: String },

    #[error("sent funds must match the allocation amount. expected ({expected}), got ({got})")]
    InvalidMsgValue { expected: Uint128, got: Uint128 },

    #[error("unauthorized to process withdrawals for this account")]
    UnauthorizedToProcessWithdrawal {},
}
