//! Balance operations.
//!
//! Every operation takes an open [`StoreTxn`] and applies nothing until the
//! caller commits it. None of them retries; retry policy belongs to the
//! wager engine. Solvency checks happen here and only here.

use parlay_store::{
    ledger, EntryKind, LedgerEntry, StoreTxn, TokenEntry, TokenEntryKind, WalletRecord,
};
use parlay_types::{EntryId, Timestamp, TokenAmount, UsdAmount, UserId, WagerId};

use crate::WalletError;

/// Raise an invariant violation, logging it at error severity.
fn invariant(message: String) -> WalletError {
    tracing::error!(%message, "wallet invariant violated");
    WalletError::InvariantViolation(message)
}

fn overflow(user: &UserId) -> WalletError {
    invariant(format!("balance overflow for {user}"))
}

/// Fetch a wallet, creating it lazily with zero balances.
fn fetch_or_create<T: StoreTxn>(
    txn: &mut T,
    user: &UserId,
    now: Timestamp,
) -> Result<WalletRecord, WalletError> {
    Ok(txn
        .wallet_for_update(user)?
        .unwrap_or_else(|| WalletRecord::new(user.clone(), now)))
}

/// Credit a user's available balance (an external deposit).
///
/// Creates the wallet on first use.
pub fn credit<T: StoreTxn>(
    txn: &mut T,
    user: &UserId,
    amount: UsdAmount,
    now: Timestamp,
) -> Result<WalletRecord, WalletError> {
    if amount.is_zero() {
        return Err(WalletError::InvalidAmount);
    }
    let mut wallet = fetch_or_create(txn, user, now)?;
    wallet.available = wallet
        .available
        .checked_add(amount)
        .ok_or_else(|| overflow(user))?;
    txn.put_wallet(&wallet)?;
    txn.append_entry(&LedgerEntry {
        id: EntryId::generate(),
        user: user.clone(),
        counterparty: None,
        kind: EntryKind::Deposit,
        amount,
        wager: None,
        created_at: now,
    })?;
    Ok(wallet)
}

/// Debit a user's available balance (an external withdrawal).
pub fn debit<T: StoreTxn>(
    txn: &mut T,
    user: &UserId,
    amount: UsdAmount,
    now: Timestamp,
) -> Result<WalletRecord, WalletError> {
    if amount.is_zero() {
        return Err(WalletError::InvalidAmount);
    }
    let mut wallet = fetch_or_create(txn, user, now)?;
    wallet.available = wallet
        .available
        .checked_sub(amount)
        .ok_or(WalletError::InsufficientFunds {
            needed: amount,
            available: wallet.available,
        })?;
    txn.put_wallet(&wallet)?;
    txn.append_entry(&LedgerEntry {
        id: EntryId::generate(),
        user: user.clone(),
        counterparty: None,
        kind: EntryKind::Withdrawal,
        amount,
        wager: None,
        created_at: now,
    })?;
    Ok(wallet)
}

/// Move funds from available into escrow against a wager.
///
/// This is the single authoritative solvency check for wager creation and
/// acceptance: an unknown wallet simply has zero available funds.
pub fn reserve_to_escrow<T: StoreTxn>(
    txn: &mut T,
    user: &UserId,
    amount: UsdAmount,
    wager: &WagerId,
    now: Timestamp,
) -> Result<WalletRecord, WalletError> {
    if amount.is_zero() {
        return Err(WalletError::InvalidAmount);
    }
    let mut wallet = fetch_or_create(txn, user, now)?;
    wallet.available = wallet
        .available
        .checked_sub(amount)
        .ok_or(WalletError::InsufficientFunds {
            needed: amount,
            available: wallet.available,
        })?;
    wallet.escrow = wallet
        .escrow
        .checked_add(amount)
        .ok_or_else(|| overflow(user))?;
    txn.put_wallet(&wallet)?;
    txn.append_entry(&LedgerEntry {
        id: EntryId::generate(),
        user: user.clone(),
        counterparty: None,
        kind: EntryKind::EscrowHold,
        amount,
        wager: Some(wager.clone()),
        created_at: now,
    })?;
    Ok(wallet)
}

/// Return escrowed funds to the same user's available balance
/// (cancellation, or the winner's own stake at settlement).
///
/// Escrow shortfall here is a bug, never a user error: funds cannot leave
/// escrow except through this function or a transfer.
pub fn release_from_escrow<T: StoreTxn>(
    txn: &mut T,
    user: &UserId,
    amount: UsdAmount,
    wager: &WagerId,
    now: Timestamp,
) -> Result<WalletRecord, WalletError> {
    let mut wallet = txn
        .wallet_for_update(user)?
        .ok_or_else(|| invariant(format!("release from missing wallet {user}")))?;
    wallet.escrow = wallet.escrow.checked_sub(amount).ok_or_else(|| {
        invariant(format!(
            "release of {amount} exceeds escrow {} for {user}",
            wallet.escrow
        ))
    })?;
    wallet.available = wallet
        .available
        .checked_add(amount)
        .ok_or_else(|| overflow(user))?;
    txn.put_wallet(&wallet)?;
    txn.append_entry(&LedgerEntry {
        id: EntryId::generate(),
        user: user.clone(),
        counterparty: None,
        kind: EntryKind::EscrowRelease,
        amount,
        wager: Some(wager.clone()),
        created_at: now,
    })?;
    Ok(wallet)
}

/// Pay out escrowed funds from `payer` to `payee`'s available balance
/// (the settlement leg).
///
/// Writes one `escrow_transfer` row on the payer side and one
/// `wager_settlement` row on the payee side. Wallets are fetched and
/// written in ascending user-id order so backends with per-row locks
/// always acquire them in the same global order.
pub fn transfer_from_escrow<T: StoreTxn>(
    txn: &mut T,
    payer: &UserId,
    amount: UsdAmount,
    payee: &UserId,
    wager: &WagerId,
    now: Timestamp,
) -> Result<(), WalletError> {
    if payer == payee {
        return Err(invariant(format!("escrow transfer from {payer} to itself")));
    }

    let mut first_user = payer;
    let mut second_user = payee;
    if second_user < first_user {
        std::mem::swap(&mut first_user, &mut second_user);
    }
    let first = txn
        .wallet_for_update(first_user)?
        .ok_or_else(|| invariant(format!("transfer touches missing wallet {first_user}")))?;
    let second = txn
        .wallet_for_update(second_user)?
        .ok_or_else(|| invariant(format!("transfer touches missing wallet {second_user}")))?;
    let (mut payer_wallet, mut payee_wallet) = if first.user == *payer {
        (first, second)
    } else {
        (second, first)
    };

    payer_wallet.escrow = payer_wallet.escrow.checked_sub(amount).ok_or_else(|| {
        invariant(format!(
            "transfer of {amount} exceeds escrow {} for {payer}",
            payer_wallet.escrow
        ))
    })?;
    payee_wallet.available = payee_wallet
        .available
        .checked_add(amount)
        .ok_or_else(|| overflow(payee))?;

    // Writes in the same fixed order as the reads.
    if payer_wallet.user < payee_wallet.user {
        txn.put_wallet(&payer_wallet)?;
        txn.put_wallet(&payee_wallet)?;
    } else {
        txn.put_wallet(&payee_wallet)?;
        txn.put_wallet(&payer_wallet)?;
    }

    txn.append_entry(&LedgerEntry {
        id: EntryId::generate(),
        user: payer.clone(),
        counterparty: Some(payee.clone()),
        kind: EntryKind::EscrowTransfer,
        amount,
        wager: Some(wager.clone()),
        created_at: now,
    })?;
    txn.append_entry(&LedgerEntry {
        id: EntryId::generate(),
        user: payee.clone(),
        counterparty: Some(payer.clone()),
        kind: EntryKind::WagerSettlement,
        amount,
        wager: Some(wager.clone()),
        created_at: now,
    })?;
    Ok(())
}

/// Credit the token balance (promotions, rewards).
pub fn credit_tokens<T: StoreTxn>(
    txn: &mut T,
    user: &UserId,
    amount: TokenAmount,
    now: Timestamp,
) -> Result<WalletRecord, WalletError> {
    if amount.is_zero() {
        return Err(WalletError::InvalidAmount);
    }
    let mut wallet = fetch_or_create(txn, user, now)?;
    wallet.tokens = wallet
        .tokens
        .checked_add(amount)
        .ok_or_else(|| overflow(user))?;
    txn.put_wallet(&wallet)?;
    txn.append_token_entry(&TokenEntry {
        id: EntryId::generate(),
        user: user.clone(),
        kind: TokenEntryKind::TokenCredit,
        amount,
        wager: None,
        created_at: now,
    })?;
    Ok(wallet)
}

/// Debit the token balance.
pub fn debit_tokens<T: StoreTxn>(
    txn: &mut T,
    user: &UserId,
    amount: TokenAmount,
    now: Timestamp,
) -> Result<WalletRecord, WalletError> {
    if amount.is_zero() {
        return Err(WalletError::InvalidAmount);
    }
    let mut wallet = fetch_or_create(txn, user, now)?;
    wallet.tokens = wallet
        .tokens
        .checked_sub(amount)
        .ok_or(WalletError::InsufficientTokens {
            needed: amount,
            available: wallet.tokens,
        })?;
    txn.put_wallet(&wallet)?;
    txn.append_token_entry(&TokenEntry {
        id: EntryId::generate(),
        user: user.clone(),
        kind: TokenEntryKind::TokenDebit,
        amount,
        wager: None,
        created_at: now,
    })?;
    Ok(wallet)
}

/// Check that replaying a user's ledger reproduces the stored balances.
///
/// A mismatch means a balance was mutated without its ledger row (or the
/// reverse) and is reported as an invariant violation.
pub fn reconcile(
    wallet: &WalletRecord,
    entries: &[LedgerEntry],
    token_entries: &[TokenEntry],
) -> Result<(), WalletError> {
    let replayed = ledger::replay(entries)?;
    if replayed.available != wallet.available || replayed.escrow != wallet.escrow {
        return Err(invariant(format!(
            "ledger replay for {} gives available {} / escrow {}, wallet holds {} / {}",
            wallet.user, replayed.available, replayed.escrow, wallet.available, wallet.escrow
        )));
    }
    let tokens = ledger::replay_tokens(token_entries)?;
    if tokens != wallet.tokens {
        return Err(invariant(format!(
            "token replay for {} gives {}, wallet holds {}",
            wallet.user, tokens, wallet.tokens
        )));
    }
    Ok(())
}
