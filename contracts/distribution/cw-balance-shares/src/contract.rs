use std::collections::HashMap;

#[cfg(not(feature = "library"))]
use cosmwasm_std::entry_point;
use cosmwasm_std::{
    to_binary, Addr, Binary, CosmosMsg, Deps, DepsMut, Env, MessageInfo, Order, Response,
    StdError, StdResult, Storage, Timestamp, Uint128, WasmMsg,
};
use cw2::set_contract_version;
use cw_denom::{CheckedDenom, UncheckedDenom};
use cw_storage_plus::Bound;
use cw_utils::{may_pay, nonpayable};

use crate::error::ContractError;
use crate::math;
use crate::msg::{
    AccountShareListItem, AccountShareResponse, AllocationResponse, BalanceShareResponse,
    ExecuteMsg, InstantiateMsg, ListAccountSharesResponse, MigrateMsg, QueryMsg,
    TotalBpsResponse, WithdrawableBalanceResponse,
};
use crate::state::{
    asset_key, AccountShare, AccountSharePeriod, BalanceShare, BalanceSum, BalanceSumCheckpoint,
    WithdrawalCursor, ACCOUNT_SHARES, BALANCE_SHARES, BALANCE_SUM_CHECKPOINTS, MAX_BALANCE_SUM,
    MAX_TOTAL_BPS, TOTAL_BPS_CHECKPOINTS,
};

pub(crate) const CONTRACT_NAME: &str = "crates.io:cw-balance-shares";
pub(crate) const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_LIMIT: u32 = 30;
const MAX_LIMIT: u32 = 100;

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    _msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    Ok(Response::new())
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        ExecuteMsg::SetAccountShares {
            client,
            balance_share_id,
            accounts,
            bps,
            removable_ats,
        } => execute_set_account_shares(
            deps,
            env,
            info,
            client,
            balance_share_id,
            accounts,
            Some(bps),
            Some(removable_ats),
            "set_account_shares",
        ),
        ExecuteMsg::SetAccountSharesBps {
            client,
            balance_share_id,
            accounts,
            bps,
        } => execute_set_account_shares(
            deps,
            env,
            info,
            client,
            balance_share_id,
            accounts,
            Some(bps),
            None,
            "set_account_shares_bps",
        ),
        ExecuteMsg::SetAccountSharesRemovableAts {
            client,
            balance_share_id,
            accounts,
            removable_ats,
        } => execute_set_account_shares(
            deps,
            env,
            info,
            client,
            balance_share_id,
            accounts,
            None,
            Some(removable_ats),
            "set_account_shares_removable_ats",
        ),
        ExecuteMsg::AllocateToBalanceShare {
            client,
            balance_share_id,
            asset,
            amount,
        } => execute_allocate(deps, env, info, client, balance_share_id, asset, amount),
        ExecuteMsg::AllocateToBalanceShareWithRemainder {
            balance_share_id,
            asset,
            balance_increased_by,
        } => execute_allocate_with_remainder(
            deps,
            env,
            info,
            balance_share_id,
            asset,
            balance_increased_by,
        ),
        ExecuteMsg::SetWithdrawalApprovals {
            client,
            balance_share_id,
            approved,
            anyone_may_withdraw,
        } => execute_set_withdrawal_approvals(
            deps,
            info,
            client,
            balance_share_id,
            approved,
            anyone_may_withdraw,
        ),
        ExecuteMsg::ProcessWithdrawal {
            client,
            balance_share_id,
            account,
            assets,
        } => execute_process_withdrawal(deps, info, client, balance_share_id, account, assets),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn execute_set_account_shares(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    client: Option<String>,
    balance_share_id: u64,
    accounts: Vec<String>,
    bps: Option<Vec<u16>>,
    removable_ats: Option<Vec<Timestamp>>,
    action: &str,
) -> Result<Response, ContractError> {
    let client = resolve_client(deps.as_ref(), &info, client)?;

    if accounts.is_empty() {
        return Err(ContractError::MissingArrayItems {});
    }
    if bps.as_ref().map_or(false, |b| b.len() != accounts.len())
        || removable_ats
            .as_ref()
            .map_or(false, |r| r.len() != accounts.len())
    {
        return Err(ContractError::MismatchingArrayLengths {});
    }

    let mut share = BALANCE_SHARES
        .may_load(deps.storage, (&client, balance_share_id))?
        .unwrap_or(BalanceShare {
            checkpoint_index: 0,
        });
    let mut checkpoint = BALANCE_SUM_CHECKPOINTS
        .may_load(
            deps.storage,
            (&client, balance_share_id, share.checkpoint_index),
        )?
        .unwrap_or_else(|| BalanceSumCheckpoint::new(0));

    let mut total_bps_changed = false;

    for (i, raw) in accounts.iter().enumerate() {
        let account = deps
            .api
            .addr_validate(raw)
            .map_err(|_| ContractError::InvalidAddress {
                address: raw.clone(),
            })?;

        let mut account_share = ACCOUNT_SHARES
            .may_load(deps.storage, (&client, balance_share_id, &account))?
            .unwrap_or_else(AccountShare::new);

        let current_bps = account_share.current_bps();
        let current_removable_at = account_share.current_removable_at();

        let new_bps = bps.as_ref().map_or(current_bps, |b| b[i]);
        let new_removable_at = removable_ats
            .as_ref()
            .map_or(current_removable_at, |r| r[i]);

        // a lock-time-only update has no open period to write to for an
        // account that holds no share
        if bps.is_none() && account_share.open_period().is_none() {
            return Err(ContractError::AccountShareDoesNotExist {
                account: raw.clone(),
            });
        }

        if info.sender != client
            && (info.sender != account
                || new_bps > current_bps
                || new_removable_at > current_removable_at)
        {
            return Err(ContractError::UnauthorizedToEditAccountShares {});
        }

        if new_bps == current_bps && new_removable_at == current_removable_at {
            return Err(ContractError::AccountShareNoUpdate {
                account: raw.clone(),
            });
        }

        // the lock never binds the account itself
        if info.sender != account
            && env.block.time < current_removable_at
            && (new_bps < current_bps || new_removable_at < current_removable_at)
        {
            return Err(ContractError::AccountShareIsCurrentlyLocked {
                removable_at: current_removable_at,
            });
        }

        if new_bps != current_bps {
            // never reprice a checkpoint that has already accrued balance
            if !checkpoint.balance_sums.is_empty() {
                BALANCE_SUM_CHECKPOINTS.save(
                    deps.storage,
                    (&client, balance_share_id, share.checkpoint_index),
                    &checkpoint,
                )?;
                share.checkpoint_index = share
                    .checkpoint_index
                    .checked_add(1)
                    .ok_or(ContractError::BalanceSumCheckpointIndexOverflow {})?;
                checkpoint = BalanceSumCheckpoint::new(checkpoint.total_bps);
            }

            let total_bps =
                u32::from(checkpoint.total_bps) - u32::from(current_bps) + u32::from(new_bps);
            if total_bps > u32::from(MAX_TOTAL_BPS) {
                return Err(ContractError::UpdateExceedsMaxTotalBps {
                    total_bps,
                    max: MAX_TOTAL_BPS,
                });
            }
            checkpoint.total_bps = total_bps as u16;
            total_bps_changed = true;

            if let Some(period) = account_share.open_period_mut() {
                period.end_index = Some(share.checkpoint_index);
            }
            if new_bps > 0 {
                account_share.periods.push(AccountSharePeriod {
                    bps: new_bps,
                    start_index: share.checkpoint_index,
                    end_index: None,
                    initialized_at: env.block.time,
                    removable_at: new_removable_at,
                    cursors: HashMap::new(),
                });
            }
        } else {
            let period = account_share.open_period_mut().ok_or_else(|| {
                ContractError::AccountShareDoesNotExist {
                    account: raw.clone(),
                }
            })?;
            period.removable_at = new_removable_at;
        }

        ACCOUNT_SHARES.save(
            deps.storage,
            (&client, balance_share_id, &account),
            &account_share,
        )?;
    }

    BALANCE_SUM_CHECKPOINTS.save(
        deps.storage,
        (&client, balance_share_id, share.checkpoint_index),
        &checkpoint,
    )?;
    BALANCE_SHARES.save(deps.storage, (&client, balance_share_id), &share)?;
    if total_bps_changed {
        TOTAL_BPS_CHECKPOINTS.push(
            deps.storage,
            (&client, balance_share_id),
            env.block.time.seconds(),
            checkpoint.total_bps,
        )?;
    }

    Ok(Response::new()
        .add_attribute("action", action)
        .add_attribute("client", client)
        .add_attribute("balance_share_id", balance_share_id.to_string())
        .add_attribute("total_bps", checkpoint.total_bps.to_string()))
}

pub fn execute_allocate(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    client: Option<String>,
    balance_share_id: u64,
    asset: UncheckedDenom,
    amount: Uint128,
) -> Result<Response, ContractError> {
    let client = resolve_client(deps.as_ref(), &info, client)?;
    let asset = asset.into_checked(deps.as_ref())?;

    let mut share = BALANCE_SHARES
        .may_load(deps.storage, (&client, balance_share_id))?
        .ok_or(ContractError::BalanceShareInactive {})?;
    let mut checkpoint = BALANCE_SUM_CHECKPOINTS.load(
        deps.storage,
        (&client, balance_share_id, share.checkpoint_index),
    )?;
    if checkpoint.total_bps == 0 {
        return Err(ContractError::BalanceShareInactive {});
    }

    let msgs = collect_asset(&env, &info, &asset, amount)?;

    let key = asset_key(&asset);
    credit_allocation(
        deps.storage,
        &client,
        balance_share_id,
        &mut share,
        &mut checkpoint,
        &key,
        amount,
    )?;

    BALANCE_SUM_CHECKPOINTS.save(
        deps.storage,
        (&client, balance_share_id, share.checkpoint_index),
        &checkpoint,
    )?;
    BALANCE_SHARES.save(deps.storage, (&client, balance_share_id), &share)?;

    Ok(Response::new()
        .add_messages(msgs)
        .add_attribute("action", "allocate_to_balance_share")
        .add_attribute("client", client)
        .add_attribute("balance_share_id", balance_share_id.to_string())
        .add_attribute("asset", key)
        .add_attribute("amount", amount))
}

pub fn execute_allocate_with_remainder(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    balance_share_id: u64,
    asset: UncheckedDenom,
    balance_increased_by: Uint128,
) -> Result<Response, ContractError> {
    // not delegatable: the remainder's timing belongs to the client alone
    let client = info.sender.clone();
    let asset = asset.into_checked(deps.as_ref())?;
    let key = asset_key(&asset);

    let share = BALANCE_SHARES.may_load(deps.storage, (&client, balance_share_id))?;
    let mut share = match share {
        Some(share) => share,
        None => {
            nonpayable(&info)?;
            return Ok(inactive_remainder_response(client, balance_share_id, key));
        }
    };
    let mut checkpoint = BALANCE_SUM_CHECKPOINTS.load(
        deps.storage,
        (&client, balance_share_id, share.checkpoint_index),
    )?;
    if checkpoint.total_bps == 0 {
        nonpayable(&info)?;
        return Ok(inactive_remainder_response(client, balance_share_id, key));
    }

    let remainder = checkpoint
        .balance_sums
        .get(&key)
        .map(|sum| sum.remainder)
        .unwrap_or_default();
    let (amount, new_remainder) =
        math::allocation_with_remainder(balance_increased_by, checkpoint.total_bps, remainder);

    let msgs = collect_asset(&env, &info, &asset, amount)?;

    credit_allocation(
        deps.storage,
        &client,
        balance_share_id,
        &mut share,
        &mut checkpoint,
        &key,
        amount,
    )?;
    checkpoint
        .balance_sums
        .entry(key.clone())
        .or_default()
        .remainder = new_remainder;

    BALANCE_SUM_CHECKPOINTS.save(
        deps.storage,
        (&client, balance_share_id, share.checkpoint_index),
        &checkpoint,
    )?;
    BALANCE_SHARES.save(deps.storage, (&client, balance_share_id), &share)?;

    Ok(Response::new()
        .add_messages(msgs)
        .add_attribute("action", "allocate_to_balance_share_with_remainder")
        .add_attribute("client", client)
        .add_attribute("balance_share_id", balance_share_id.to_string())
        .add_attribute("asset", key)
        .add_attribute("amount", amount)
        .add_attribute("remainder", new_remainder))
}

pub fn execute_set_withdrawal_approvals(
    deps: DepsMut,
    info: MessageInfo,
    client: String,
    balance_share_id: u64,
    approved: Vec<String>,
    anyone_may_withdraw: bool,
) -> Result<Response, ContractError> {
    let client = deps.api.addr_validate(&client)?;
    let account = info.sender;

    let mut account_share = ACCOUNT_SHARES
        .may_load(deps.storage, (&client, balance_share_id, &account))?
        .ok_or_else(|| ContractError::AccountShareDoesNotExist {
            account: account.to_string(),
        })?;

    account_share.withdrawal_approvals = approved
        .into_iter()
        .map(|address| deps.api.addr_validate(&address))
        .collect::<StdResult<_>>()?;
    account_share.anyone_may_withdraw = anyone_may_withdraw;

    ACCOUNT_SHARES.save(
        deps.storage,
        (&client, balance_share_id, &account),
        &account_share,
    )?;

    Ok(Response::new()
        .add_attribute("action", "set_withdrawal_approvals")
        .add_attribute("client", client)
        .add_attribute("account", account)
        .add_attribute("anyone_may_withdraw", anyone_may_withdraw.to_string()))
}

pub fn execute_process_withdrawal(
    deps: DepsMut,
    info: MessageInfo,
    client: String,
    balance_share_id: u64,
    account: String,
    assets: Vec<UncheckedDenom>,
) -> Result<Response, ContractError> {
    let client = deps.api.addr_validate(&client)?;
    let account = deps.api.addr_validate(&account)?;

    if assets.is_empty() {
        return Err(ContractError::MissingArrayItems {});
    }

    let mut account_share = ACCOUNT_SHARES
        .may_load(deps.storage, (&client, balance_share_id, &account))?
        .ok_or_else(|| ContractError::AccountShareDoesNotExist {
            account: account.to_string(),
        })?;

    if info.sender != account
        && !account_share.anyone_may_withdraw
        && !account_share.withdrawal_approvals.contains(&info.sender)
    {
        return Err(ContractError::UnauthorizedToProcessWithdrawal {});
    }

    let share = BALANCE_SHARES.load(deps.storage, (&client, balance_share_id))?;

    let mut response = Response::new()
        .add_attribute("action", "process_withdrawal")
        .add_attribute("client", client.clone())
        .add_attribute("account", account.clone());
    // transfers go out only after all bookkeeping below has settled
    let mut msgs: Vec<CosmosMsg> = vec![];
    for asset in assets {
        let asset = asset.into_checked(deps.as_ref())?;
        let key = asset_key(&asset);
        let owed = settle_asset(
            deps.storage,
            &client,
            balance_share_id,
            &share,
            &mut account_share,
            &key,
        )?;
        if !owed.is_zero() {
            msgs.push(asset.get_transfer_to_message(&account, owed)?);
        }
        response = response.add_attribute(key, owed);
    }

    ACCOUNT_SHARES.save(
        deps.storage,
        (&client, balance_share_id, &account),
        &account_share,
    )?;

    Ok(response.add_messages(msgs))
}

fn resolve_client(deps: Deps, info: &MessageInfo, client: Option<String>) -> StdResult<Addr> {
    match client {
        Some(client) => deps.api.addr_validate(&client),
        None => Ok(info.sender.clone()),
    }
}

/// Validates that the sender has actually provided `amount` of `asset`,
/// returning the messages needed to take custody of it. Native funds must
/// ride along with the call; cw20 funds are pulled via allowance.
fn collect_asset(
    env: &Env,
    info: &MessageInfo,
    asset: &CheckedDenom,
    amount: Uint128,
) -> Result<Vec<CosmosMsg>, ContractError> {
    match asset {
        CheckedDenom::Native(denom) => {
            let paid = may_pay(info, denom)?;
            if paid != amount {
                return Err(ContractError::InvalidMsgValue {
                    expected: amount,
                    got: paid,
                });
            }
            Ok(vec![])
        }
        CheckedDenom::Cw20(address) => {
            nonpayable(info)?;
            if amount.is_zero() {
                return Ok(vec![]);
            }
            Ok(vec![WasmMsg::Execute {
                contract_addr: address.to_string(),
                msg: to_binary(&cw20::Cw20ExecuteMsg::TransferFrom {
                    owner: info.sender.to_string(),
                    recipient: env.contract.address.to_string(),
                    amount,
                })?,
                funds: vec![],
            }
            .into()])
        }
    }
}

/// Adds `amount` to the current checkpoint's balance sum for an asset,
/// rolling the excess into freshly opened checkpoints whenever the sum
/// would pass [`MAX_BALANCE_SUM`]. Rolled checkpoints keep the same total
/// bps, and the asset's remainder moves into the newest checkpoint.
fn credit_allocation(
    storage: &mut dyn Storage,
    client: &Addr,
    balance_share_id: u64,
    share: &mut BalanceShare,
    checkpoint: &mut BalanceSumCheckpoint,
    key: &str,
    amount: Uint128,
) -> Result<(), ContractError> {
    let mut remaining = amount;
    loop {
        let sum = checkpoint.balance_sums.entry(key.to_string()).or_default();
        let credit = remaining.min(MAX_BALANCE_SUM - sum.balance);
        sum.balance += credit;
        remaining -= credit;
        if remaining.is_zero() {
            return Ok(());
        }
        let carried = sum.remainder;
        sum.remainder = Uint128::zero();
        BALANCE_SUM_CHECKPOINTS.save(
            storage,
            (client, balance_share_id, share.checkpoint_index),
            checkpoint,
        )?;
        share.checkpoint_index = share
            .checkpoint_index
            .checked_add(1)
            .ok_or(ContractError::BalanceSumCheckpointIndexOverflow {})?;
        *checkpoint = BalanceSumCheckpoint::new(checkpoint.total_bps);
        checkpoint.balance_sums.insert(
            key.to_string(),
            BalanceSum {
                remainder: carried,
                balance: Uint128::zero(),
            },
        );
    }
}

/// Settles everything owed to an account for one asset, walking each
/// period's checkpoints from its cursor through the last checkpoint the
/// period covers. Cursors advance in place; the caller persists the
/// account share.
fn settle_asset(
    storage: &dyn Storage,
    client: &Addr,
    balance_share_id: u64,
    share: &BalanceShare,
    account_share: &mut AccountShare,
    key: &str,
) -> StdResult<Uint128> {
    let mut owed = Uint128::zero();

    for period in account_share.periods.iter_mut() {
        let bps = period.bps;
        let start_index = period.start_index;
        let last = match period.end_index {
            // closed before covering any checkpoint
            Some(end) if end == start_index => continue,
            Some(end) => end - 1,
            None => share.checkpoint_index,
        };

        let cursor = period
            .cursors
            .entry(key.to_string())
            .or_insert(WithdrawalCursor {
                checkpoint_index: start_index,
                withdrawn: Uint128::zero(),
            });

        for index in cursor.checkpoint_index..=last {
            let checkpoint = match BALANCE_SUM_CHECKPOINTS
                .may_load(storage, (client, balance_share_id, index))?
            {
                Some(checkpoint) => checkpoint,
                None => continue,
            };
            if checkpoint.total_bps == 0 {
                continue;
            }
            let balance = checkpoint
                .balance_sums
                .get(key)
                .map(|sum| sum.balance)
                .unwrap_or_default();
            let entitled = math::entitlement(balance, bps, checkpoint.total_bps);
            let already_withdrawn = if index == cursor.checkpoint_index {
                cursor.withdrawn
            } else {
                Uint128::zero()
            };
            owed += entitled
                .checked_sub(already_withdrawn)
                .map_err(StdError::overflow)?;
            cursor.checkpoint_index = index;
            cursor.withdrawn = entitled;
        }
    }

    Ok(owed)
}

fn inactive_remainder_response(client: Addr, balance_share_id: u64, key: String) -> Response {
    Response::new()
        .add_attribute("action", "allocate_to_balance_share_with_remainder")
        .add_attribute("client", client)
        .add_attribute("balance_share_id", balance_share_id.to_string())
        .add_attribute("asset", key)
        .add_attribute("amount", Uint128::zero())
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::BalanceShare {
            client,
            balance_share_id,
        } => to_binary(&query_balance_share(deps, client, balance_share_id)?),
        QueryMsg::AccountShare {
            client,
            balance_share_id,
            account,
        } => to_binary(&query_account_share(
            deps,
            client,
            balance_share_id,
            account,
        )?),
        QueryMsg::ListAccountShares {
            client,
            balance_share_id,
            start_after,
            limit,
        } => to_binary(&query_list_account_shares(
            deps,
            client,
            balance_share_id,
            start_after,
            limit,
        )?),
        QueryMsg::BalanceShareAllocation {
            client,
            balance_share_id,
            balance_increased_by,
        } => to_binary(&query_allocation(
            deps,
            client,
            balance_share_id,
            balance_increased_by,
        )?),
        QueryMsg::BalanceShareAllocationWithRemainder {
            client,
            balance_share_id,
            asset,
            balance_increased_by,
        } => to_binary(&query_allocation_with_remainder(
            deps,
            client,
            balance_share_id,
            asset,
            balance_increased_by,
        )?),
        QueryMsg::WithdrawableBalance {
            client,
            balance_share_id,
            account,
            asset,
        } => to_binary(&query_withdrawable_balance(
            deps,
            client,
            balance_share_id,
            account,
            asset,
        )?),
        QueryMsg::TotalBpsAtTime {
            client,
            balance_share_id,
            timestamp,
        } => to_binary(&query_total_bps_at_time(
            deps,
            client,
            balance_share_id,
            timestamp,
        )?),
    }
}

pub fn query_balance_share(
    deps: Deps,
    client: String,
    balance_share_id: u64,
) -> StdResult<BalanceShareResponse> {
    let client = deps.api.addr_validate(&client)?;
    let share = BALANCE_SHARES.may_load(deps.storage, (&client, balance_share_id))?;
    match share {
        Some(share) => {
            let checkpoint = BALANCE_SUM_CHECKPOINTS.load(
                deps.storage,
                (&client, balance_share_id, share.checkpoint_index),
            )?;
            Ok(BalanceShareResponse {
                checkpoint_index: share.checkpoint_index,
                total_bps: checkpoint.total_bps,
            })
        }
        None => Ok(BalanceShareResponse {
            checkpoint_index: 0,
            total_bps: 0,
        }),
    }
}

pub fn query_account_share(
    deps: Deps,
    client: String,
    balance_share_id: u64,
    account: String,
) -> StdResult<AccountShareResponse> {
    let client = deps.api.addr_validate(&client)?;
    let account = deps.api.addr_validate(&account)?;
    let account_share = ACCOUNT_SHARES
        .may_load(deps.storage, (&client, balance_share_id, &account))?
        .ok_or_else(|| StdError::not_found("account share"))?;
    Ok(AccountShareResponse {
        bps: account_share.current_bps(),
        removable_at: account_share.open_period().map(|p| p.removable_at),
        periods: account_share.periods.len() as u64,
        withdrawal_approvals: account_share.withdrawal_approvals,
        anyone_may_withdraw: account_share.anyone_may_withdraw,
    })
}

pub fn query_list_account_shares(
    deps: Deps,
    client: String,
    balance_share_id: u64,
    start_after: Option<String>,
    limit: Option<u32>,
) -> StdResult<ListAccountSharesResponse> {
    let client = deps.api.addr_validate(&client)?;
    let start_after = start_after
        .map(|address| deps.api.addr_validate(&address))
        .transpose()?;
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;

    let shares = ACCOUNT_SHARES
        .prefix((&client, balance_share_id))
        .range(
            deps.storage,
            start_after.as_ref().map(Bound::exclusive),
            None,
            Order::Ascending,
        )
        .take(limit)
        .map(|item| -> StdResult<AccountShareListItem> {
            let (account, account_share) = item?;
            Ok(AccountShareListItem {
                account,
                bps: account_share.current_bps(),
                removable_at: account_share.open_period().map(|p| p.removable_at),
            })
        })
        .collect::<StdResult<Vec<_>>>()?;

    Ok(ListAccountSharesResponse { shares })
}

pub fn query_allocation(
    deps: Deps,
    client: String,
    balance_share_id: u64,
    balance_increased_by: Uint128,
) -> StdResult<AllocationResponse> {
    let client = deps.api.addr_validate(&client)?;
    let total_bps = current_total_bps(deps, &client, balance_share_id)?;
    Ok(AllocationResponse {
        amount: math::allocation(balance_increased_by, total_bps),
    })
}

pub fn query_allocation_with_remainder(
    deps: Deps,
    client: String,
    balance_share_id: u64,
    asset: UncheckedDenom,
    balance_increased_by: Uint128,
) -> StdResult<AllocationResponse> {
    let client = deps.api.addr_validate(&client)?;
    let asset = asset
        .into_checked(deps)
        .map_err(|err| StdError::generic_err(err.to_string()))?;
    let key = asset_key(&asset);

    let share = BALANCE_SHARES.may_load(deps.storage, (&client, balance_share_id))?;
    let (total_bps, remainder) = match share {
        Some(share) => {
            let checkpoint = BALANCE_SUM_CHECKPOINTS.load(
                deps.storage,
                (&client, balance_share_id, share.checkpoint_index),
            )?;
            let remainder = checkpoint
                .balance_sums
                .get(&key)
                .map(|sum| sum.remainder)
                .unwrap_or_default();
            (checkpoint.total_bps, remainder)
        }
        None => (0, Uint128::zero()),
    };

    let (amount, _) = math::allocation_with_remainder(balance_increased_by, total_bps, remainder);
    Ok(AllocationResponse { amount })
}

pub fn query_withdrawable_balance(
    deps: Deps,
    client: String,
    balance_share_id: u64,
    account: String,
    asset: UncheckedDenom,
) -> StdResult<WithdrawableBalanceResponse> {
    let client = deps.api.addr_validate(&client)?;
    let account = deps.api.addr_validate(&account)?;
    let asset = asset
        .into_checked(deps)
        .map_err(|err| StdError::generic_err(err.to_string()))?;

    let mut account_share = ACCOUNT_SHARES
        .may_load(deps.storage, (&client, balance_share_id, &account))?
        .ok_or_else(|| StdError::not_found("account share"))?;
    let share = BALANCE_SHARES.load(deps.storage, (&client, balance_share_id))?;

    // settle a scratch copy; queries never persist cursor movement
    let amount = settle_asset(
        deps.storage,
        &client,
        balance_share_id,
        &share,
        &mut account_share,
        &asset_key(&asset),
    )?;
    Ok(WithdrawableBalanceResponse { amount })
}

pub fn query_total_bps_at_time(
    deps: Deps,
    client: String,
    balance_share_id: u64,
    timestamp: Timestamp,
) -> StdResult<TotalBpsResponse> {
    let client = deps.api.addr_validate(&client)?;
    let total_bps = TOTAL_BPS_CHECKPOINTS.upper_lookup_recent(
        deps.storage,
        (&client, balance_share_id),
        timestamp.seconds(),
    )?;
    Ok(TotalBpsResponse { total_bps })
}

fn current_total_bps(deps: Deps, client: &Addr, balance_share_id: u64) -> StdResult<u16> {
    let share = BALANCE_SHARES.may_load(deps.storage, (client, balance_share_id))?;
    match share {
        Some(share) => {
            let checkpoint = BALANCE_SUM_CHECKPOINTS.load(
                deps.storage,
                (client, balance_share_id, share.checkpoint_index),
            )?;
            Ok(checkpoint.total_bps)
        }
        None => Ok(0),
    }
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn migrate(deps: DepsMut, _env: Env, msg: MigrateMsg) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    match msg {
        MigrateMsg::FromCompatible {} => Ok(Response::default()),
    }
}
