//! The wager engine.
//!
//! Every transition follows the same discipline: open one store transaction,
//! re-read the wager row inside it, validate the precondition against that
//! fresh read, apply the matching wallet operation(s), write the new wager
//! state, commit. A wager that already moved under a concurrent transition
//! fails `InvalidTransition` on the fresh read; an exact duplicate of an
//! already-applied `accept`/`complete` returns the stored result instead of
//! touching the ledger again.
//!
//! Nothing inside a transaction performs external I/O. Events go out only
//! after commit.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use parlay_store::{EscrowStore, LedgerEntry, StoreTxn, TokenEntry, WagerRecord, WagerStatus};
use parlay_types::{GameId, Timestamp, TokenAmount, UsdAmount, UserId, WagerId};
use parlay_wallet::{service as wallet, WalletError};

use crate::events::{EventBus, WagerEvent, WagerEventKind};
use crate::{EngineConfig, EngineError};

/// A user's balances as reported to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    pub available: UsdAmount,
    pub escrow: UsdAmount,
    pub tokens: TokenAmount,
}

impl BalanceView {
    const ZERO: Self = Self {
        available: UsdAmount::ZERO,
        escrow: UsdAmount::ZERO,
        tokens: TokenAmount::ZERO,
    };

    fn of(wallet: &parlay_store::WalletRecord) -> Self {
        Self {
            available: wallet.available,
            escrow: wallet.escrow,
            tokens: wallet.tokens,
        }
    }
}

/// The wager lifecycle engine over an escrow store.
///
/// Safe to share across request handlers: all methods take `&self`, and
/// correctness under concurrency comes from the store's transaction
/// isolation, not from in-process locks.
pub struct WagerEngine<S: EscrowStore> {
    store: Arc<S>,
    config: EngineConfig,
    authorities: HashSet<String>,
    events: EventBus,
}

impl<S: EscrowStore> WagerEngine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let authorities = config
            .settlement_authorities
            .iter()
            .cloned()
            .collect::<HashSet<_>>();
        let events = EventBus::new(config.event_capacity);
        Self {
            store,
            config,
            authorities,
            events,
        }
    }

    /// Subscribe to post-commit wager events (the notifier boundary).
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WagerEvent> {
        self.events.subscribe()
    }

    // ── Wager transitions ───────────────────────────────────────────────

    /// Create a wager: escrow the initiator's stake and persist the wager
    /// as `pending`, atomically.
    pub async fn create_wager(
        &self,
        initiator: &UserId,
        opponent: &UserId,
        game: &GameId,
        amount: UsdAmount,
    ) -> Result<WagerRecord, EngineError> {
        if initiator == opponent {
            return Err(EngineError::Unauthorized(
                "a wager needs two distinct parties".into(),
            ));
        }
        // One id for all attempts: a conflict retry must not mint a second wager.
        let id = WagerId::generate();
        let record = self
            .with_retry("create_wager", || {
                let now = Timestamp::now();
                let mut txn = self.store.begin()?;
                let wager = WagerRecord::new(
                    id.clone(),
                    initiator.clone(),
                    opponent.clone(),
                    game.clone(),
                    amount,
                    now,
                );
                wallet::reserve_to_escrow(&mut txn, initiator, amount, &id, now)?;
                txn.put_wager(&wager)?;
                txn.commit()?;
                Ok(wager)
            })
            .await?;
        tracing::info!(wager = %record.id, %initiator, %opponent, %amount, "wager created");
        self.publish(WagerEventKind::WagerCreated, record.clone());
        Ok(record)
    }

    /// Accept a pending wager: escrow the opponent's stake and mark the
    /// wager `accepted`, atomically. Idempotent for the designated opponent.
    pub async fn accept_wager(
        &self,
        id: &WagerId,
        caller: &UserId,
    ) -> Result<WagerRecord, EngineError> {
        let (record, applied) = self
            .with_retry("accept_wager", || {
                let now = Timestamp::now();
                let mut txn = self.store.begin()?;
                let mut wager = txn
                    .wager_for_update(id)?
                    .ok_or_else(|| EngineError::WagerNotFound(id.clone()))?;
                if wager.opponent != *caller {
                    return Err(EngineError::Unauthorized(format!(
                        "{caller} is not the designated opponent of wager {id}"
                    )));
                }
                match wager.status {
                    WagerStatus::Pending => {
                        wallet::reserve_to_escrow(&mut txn, caller, wager.amount, id, now)?;
                        wager.status = WagerStatus::Accepted;
                        txn.put_wager(&wager)?;
                        txn.commit()?;
                        Ok((wager, true))
                    }
                    // Duplicate of an applied accept: return the stored row.
                    WagerStatus::Accepted => Ok((wager, false)),
                    status => Err(EngineError::InvalidTransition {
                        wager: id.clone(),
                        status,
                        attempted: "accept",
                    }),
                }
            })
            .await?;
        if applied {
            tracing::info!(wager = %record.id, opponent = %caller, "wager accepted");
            self.publish(WagerEventKind::WagerAccepted, record.clone());
        }
        Ok(record)
    }

    /// Settle an accepted wager: both stakes end up in the winner's
    /// available balance, atomically with the status change. Only
    /// settlement authorities may call this. Idempotent for the same
    /// winner; a conflicting winner is rejected.
    pub async fn complete_wager(
        &self,
        id: &WagerId,
        winner: &UserId,
        caller: &UserId,
    ) -> Result<WagerRecord, EngineError> {
        self.require_authority(caller, "complete a wager")?;
        let (record, applied) = self
            .with_retry("complete_wager", || {
                let now = Timestamp::now();
                let mut txn = self.store.begin()?;
                let mut wager = txn
                    .wager_for_update(id)?
                    .ok_or_else(|| EngineError::WagerNotFound(id.clone()))?;
                let loser = match wager.counterparty(winner) {
                    Some(loser) => loser.clone(),
                    None => {
                        return Err(EngineError::Unauthorized(format!(
                            "winner {winner} is not a party to wager {id}"
                        )))
                    }
                };
                match wager.status {
                    WagerStatus::Accepted => {
                        wallet::transfer_from_escrow(
                            &mut txn,
                            &loser,
                            wager.amount,
                            winner,
                            id,
                            now,
                        )?;
                        wallet::release_from_escrow(&mut txn, winner, wager.amount, id, now)?;
                        wager.status = WagerStatus::Completed;
                        wager.winner = Some(winner.clone());
                        wager.settled_at = Some(now);
                        txn.put_wager(&wager)?;
                        txn.commit()?;
                        Ok((wager, true))
                    }
                    // Retry of the settlement that already went through.
                    WagerStatus::Completed if wager.winner.as_ref() == Some(winner) => {
                        Ok((wager, false))
                    }
                    status => Err(EngineError::InvalidTransition {
                        wager: id.clone(),
                        status,
                        attempted: "complete",
                    }),
                }
            })
            .await?;
        if applied {
            tracing::info!(wager = %record.id, %winner, "wager completed");
            self.publish(WagerEventKind::WagerCompleted, record.clone());
        }
        Ok(record)
    }

    /// Cancel a pending wager: return the initiator's stake and mark the
    /// wager `cancelled`, atomically. Parties and authorities may cancel.
    /// Repeating a cancel fails `InvalidTransition`.
    pub async fn cancel_wager(
        &self,
        id: &WagerId,
        caller: &UserId,
    ) -> Result<WagerRecord, EngineError> {
        let record = self
            .with_retry("cancel_wager", || {
                let now = Timestamp::now();
                let mut txn = self.store.begin()?;
                let mut wager = txn
                    .wager_for_update(id)?
                    .ok_or_else(|| EngineError::WagerNotFound(id.clone()))?;
                if !wager.is_party(caller) && !self.is_authority(caller) {
                    return Err(EngineError::Unauthorized(format!(
                        "{caller} may not cancel wager {id}"
                    )));
                }
                match wager.status {
                    WagerStatus::Pending => {
                        let initiator = wager.initiator.clone();
                        wallet::release_from_escrow(&mut txn, &initiator, wager.amount, id, now)?;
                        wager.status = WagerStatus::Cancelled;
                        txn.put_wager(&wager)?;
                        txn.commit()?;
                        Ok(wager)
                    }
                    status => Err(EngineError::InvalidTransition {
                        wager: id.clone(),
                        status,
                        attempted: "cancel",
                    }),
                }
            })
            .await?;
        tracing::info!(wager = %record.id, by = %caller, "wager cancelled");
        self.publish(WagerEventKind::WagerCancelled, record.clone());
        Ok(record)
    }

    /// Void an accepted wager whose result will never arrive (dispute or
    /// abandoned game): both stakes return to their owners. Authority-only.
    pub async fn void_wager(
        &self,
        id: &WagerId,
        caller: &UserId,
    ) -> Result<WagerRecord, EngineError> {
        self.require_authority(caller, "void a wager")?;
        let record = self
            .with_retry("void_wager", || {
                let now = Timestamp::now();
                let mut txn = self.store.begin()?;
                let mut wager = txn
                    .wager_for_update(id)?
                    .ok_or_else(|| EngineError::WagerNotFound(id.clone()))?;
                match wager.status {
                    WagerStatus::Accepted => {
                        // Fixed release order: ascending user id, matching the
                        // global wallet lock order.
                        let (first, second) = if wager.initiator <= wager.opponent {
                            (wager.initiator.clone(), wager.opponent.clone())
                        } else {
                            (wager.opponent.clone(), wager.initiator.clone())
                        };
                        wallet::release_from_escrow(&mut txn, &first, wager.amount, id, now)?;
                        wallet::release_from_escrow(&mut txn, &second, wager.amount, id, now)?;
                        wager.status = WagerStatus::Cancelled;
                        txn.put_wager(&wager)?;
                        txn.commit()?;
                        Ok(wager)
                    }
                    status => Err(EngineError::InvalidTransition {
                        wager: id.clone(),
                        status,
                        attempted: "void",
                    }),
                }
            })
            .await?;
        tracing::info!(wager = %record.id, by = %caller, "wager voided");
        self.publish(WagerEventKind::WagerCancelled, record.clone());
        Ok(record)
    }

    // ── Funding boundary ────────────────────────────────────────────────

    /// Credit a wallet once an external payment rail has confirmed a
    /// deposit. Creates the wallet on first use.
    pub async fn deposit(
        &self,
        user: &UserId,
        amount: UsdAmount,
    ) -> Result<BalanceView, EngineError> {
        let wallet = self
            .with_retry("deposit", || {
                let now = Timestamp::now();
                let mut txn = self.store.begin()?;
                let wallet = wallet::credit(&mut txn, user, amount, now)?;
                txn.commit()?;
                Ok(wallet)
            })
            .await?;
        tracing::info!(%user, %amount, "deposit applied");
        Ok(BalanceView::of(&wallet))
    }

    /// Debit a wallet for an external withdrawal.
    pub async fn withdraw(
        &self,
        user: &UserId,
        amount: UsdAmount,
    ) -> Result<BalanceView, EngineError> {
        let wallet = self
            .with_retry("withdraw", || {
                let now = Timestamp::now();
                let mut txn = self.store.begin()?;
                let wallet = wallet::debit(&mut txn, user, amount, now)?;
                txn.commit()?;
                Ok(wallet)
            })
            .await?;
        tracing::info!(%user, %amount, "withdrawal applied");
        Ok(BalanceView::of(&wallet))
    }

    /// Grant virtual-currency tokens (promotions, rewards).
    pub async fn grant_tokens(
        &self,
        user: &UserId,
        amount: TokenAmount,
    ) -> Result<BalanceView, EngineError> {
        let wallet = self
            .with_retry("grant_tokens", || {
                let now = Timestamp::now();
                let mut txn = self.store.begin()?;
                let wallet = wallet::credit_tokens(&mut txn, user, amount, now)?;
                txn.commit()?;
                Ok(wallet)
            })
            .await?;
        Ok(BalanceView::of(&wallet))
    }

    /// Spend virtual-currency tokens.
    pub async fn spend_tokens(
        &self,
        user: &UserId,
        amount: TokenAmount,
    ) -> Result<BalanceView, EngineError> {
        let wallet = self
            .with_retry("spend_tokens", || {
                let now = Timestamp::now();
                let mut txn = self.store.begin()?;
                let wallet = wallet::debit_tokens(&mut txn, user, amount, now)?;
                txn.commit()?;
                Ok(wallet)
            })
            .await?;
        Ok(BalanceView::of(&wallet))
    }

    // ── Reads and audit ─────────────────────────────────────────────────

    /// Current balances; zero for users with no wallet yet.
    pub fn wallet_balance(&self, user: &UserId) -> Result<BalanceView, EngineError> {
        Ok(self
            .store
            .wallet(user)?
            .as_ref()
            .map(BalanceView::of)
            .unwrap_or(BalanceView::ZERO))
    }

    pub fn wager(&self, id: &WagerId) -> Result<WagerRecord, EngineError> {
        self.store
            .wager(id)?
            .ok_or_else(|| EngineError::WagerNotFound(id.clone()))
    }

    /// A user's USD ledger in append order, for audit tooling.
    pub fn ledger_for_user(&self, user: &UserId) -> Result<Vec<LedgerEntry>, EngineError> {
        Ok(self.store.entries_for_user(user)?)
    }

    /// Every ledger row a wager produced, across all parties.
    pub fn ledger_for_wager(&self, id: &WagerId) -> Result<Vec<LedgerEntry>, EngineError> {
        Ok(self.store.entries_for_wager(id)?)
    }

    pub fn token_ledger_for_user(&self, user: &UserId) -> Result<Vec<TokenEntry>, EngineError> {
        Ok(self.store.token_entries_for_user(user)?)
    }

    /// Replay a user's ledgers from zero and verify they reproduce the
    /// stored balances exactly.
    pub fn audit_wallet(&self, user: &UserId) -> Result<(), EngineError> {
        let entries = self.store.entries_for_user(user)?;
        let token_entries = self.store.token_entries_for_user(user)?;
        match self.store.wallet(user)? {
            Some(wallet) => Ok(wallet::reconcile(&wallet, &entries, &token_entries)?),
            None if entries.is_empty() && token_entries.is_empty() => Ok(()),
            None => Err(EngineError::Wallet(WalletError::InvariantViolation(
                format!("ledger rows exist for {user} but the wallet row is missing"),
            ))),
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn is_authority(&self, user: &UserId) -> bool {
        self.authorities.contains(user.as_str())
    }

    fn require_authority(&self, caller: &UserId, action: &str) -> Result<(), EngineError> {
        if self.is_authority(caller) {
            Ok(())
        } else {
            Err(EngineError::Unauthorized(format!(
                "{caller} is not a settlement authority and may not {action}"
            )))
        }
    }

    fn publish(&self, kind: WagerEventKind, wager: WagerRecord) {
        self.events.publish(WagerEvent {
            kind,
            wager,
            at: Timestamp::now(),
        });
    }

    /// Run one transition attempt, retrying on transient store conflicts
    /// with bounded exponential backoff. Conflicts are the only thing
    /// retried; user errors and invariant violations surface immediately.
    async fn with_retry<T>(
        &self,
        op: &'static str,
        mut attempt: impl FnMut() -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut tries = 0u32;
        loop {
            match attempt() {
                Err(err) if err.is_conflict() => {
                    tries += 1;
                    if tries >= self.config.max_attempts {
                        tracing::warn!(op, tries, "giving up after repeated conflicts");
                        return Err(err);
                    }
                    let delay =
                        backoff_delay(tries, self.config.retry_base_ms, self.config.retry_cap_ms);
                    tracing::debug!(
                        op,
                        attempt = tries,
                        delay_ms = delay.as_millis() as u64,
                        "store conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

/// Exponential backoff for the `attempt`-th retry (1-based), capped.
fn backoff_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    Duration::from_millis(base_ms.saturating_mul(1u64 << exp).min(cap_ms))
}
