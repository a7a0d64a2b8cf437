//! Nullable store — thread-safe in-memory storage for testing.
//!
//! Unlike a plain HashMap fake, commits use optimistic version checks: every
//! row read with update intent records the version it saw, and commit fails
//! with `Conflict` if any of those rows changed underneath the transaction.
//! This makes the engine's retry path testable without a real database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use parlay_store::{
    EscrowStore, LedgerEntry, StoreError, StoreTxn, TokenEntry, WagerRecord, WalletRecord,
};
use parlay_types::{UserId, WagerId};

struct Versioned<T> {
    version: u64,
    record: T,
}

#[derive(Default)]
struct Inner {
    wallets: HashMap<String, Versioned<WalletRecord>>,
    wagers: HashMap<String, Versioned<WagerRecord>>,
    entries: Vec<LedgerEntry>,
    token_entries: Vec<TokenEntry>,
}

/// An in-memory escrow store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// Commits to fail with `Conflict` before behaving normally again.
    injected_conflicts: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            injected_conflicts: AtomicU32::new(0),
        }
    }

    /// Force the next `n` commits to fail with `Conflict`, regardless of
    /// versions. Lets retry/backoff tests run deterministically.
    pub fn inject_conflicts(&self, n: u32) {
        self.injected_conflicts.store(n, Ordering::SeqCst);
    }

    /// Total USD ledger rows across all users.
    pub fn entry_count(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// An open transaction against a [`MemoryStore`].
///
/// Reads record the version they observed; writes are buffered locally and
/// validated against those versions at commit.
pub struct MemoryTxn<'a> {
    store: &'a MemoryStore,
    wallet_reads: HashMap<String, Option<u64>>,
    wager_reads: HashMap<String, Option<u64>>,
    wallet_writes: HashMap<String, WalletRecord>,
    wager_writes: HashMap<String, WagerRecord>,
    new_entries: Vec<LedgerEntry>,
    new_token_entries: Vec<TokenEntry>,
}

impl StoreTxn for MemoryTxn<'_> {
    fn wallet_for_update(&mut self, user: &UserId) -> Result<Option<WalletRecord>, StoreError> {
        let key = user.as_str().to_string();
        if let Some(written) = self.wallet_writes.get(&key) {
            return Ok(Some(written.clone()));
        }
        let inner = self.store.inner.lock().unwrap();
        let versioned = inner.wallets.get(&key);
        self.wallet_reads
            .entry(key)
            .or_insert_with(|| versioned.map(|v| v.version));
        Ok(versioned.map(|v| v.record.clone()))
    }

    fn put_wallet(&mut self, wallet: &WalletRecord) -> Result<(), StoreError> {
        self.wallet_writes
            .insert(wallet.user.as_str().to_string(), wallet.clone());
        Ok(())
    }

    fn wager_for_update(&mut self, id: &WagerId) -> Result<Option<WagerRecord>, StoreError> {
        let key = id.as_str().to_string();
        if let Some(written) = self.wager_writes.get(&key) {
            return Ok(Some(written.clone()));
        }
        let inner = self.store.inner.lock().unwrap();
        let versioned = inner.wagers.get(&key);
        self.wager_reads
            .entry(key)
            .or_insert_with(|| versioned.map(|v| v.version));
        Ok(versioned.map(|v| v.record.clone()))
    }

    fn put_wager(&mut self, wager: &WagerRecord) -> Result<(), StoreError> {
        self.wager_writes
            .insert(wager.id.as_str().to_string(), wager.clone());
        Ok(())
    }

    fn append_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        self.new_entries.push(entry.clone());
        Ok(())
    }

    fn append_token_entry(&mut self, entry: &TokenEntry) -> Result<(), StoreError> {
        self.new_token_entries.push(entry.clone());
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        let injected = &self.store.injected_conflicts;
        if injected
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Conflict("injected conflict".into()));
        }

        let mut inner = self.store.inner.lock().unwrap();

        for (key, seen) in &self.wallet_reads {
            let current = inner.wallets.get(key).map(|v| v.version);
            if current != *seen {
                return Err(StoreError::Conflict(format!("wallet {key} changed")));
            }
        }
        for (key, seen) in &self.wager_reads {
            let current = inner.wagers.get(key).map(|v| v.version);
            if current != *seen {
                return Err(StoreError::Conflict(format!("wager {key} changed")));
            }
        }

        for (key, record) in self.wallet_writes {
            let version = inner.wallets.get(&key).map(|v| v.version + 1).unwrap_or(1);
            inner.wallets.insert(key, Versioned { version, record });
        }
        for (key, record) in self.wager_writes {
            let version = inner.wagers.get(&key).map(|v| v.version + 1).unwrap_or(1);
            inner.wagers.insert(key, Versioned { version, record });
        }
        inner.entries.extend(self.new_entries);
        inner.token_entries.extend(self.new_token_entries);
        Ok(())
    }
}

impl EscrowStore for MemoryStore {
    type Txn<'a> = MemoryTxn<'a>;

    fn begin(&self) -> Result<Self::Txn<'_>, StoreError> {
        Ok(MemoryTxn {
            store: self,
            wallet_reads: HashMap::new(),
            wager_reads: HashMap::new(),
            wallet_writes: HashMap::new(),
            wager_writes: HashMap::new(),
            new_entries: Vec::new(),
            new_token_entries: Vec::new(),
        })
    }

    fn wallet(&self, user: &UserId) -> Result<Option<WalletRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.wallets.get(user.as_str()).map(|v| v.record.clone()))
    }

    fn wager(&self, id: &WagerId) -> Result<Option<WagerRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.wagers.get(id.as_str()).map(|v| v.record.clone()))
    }

    fn entries_for_user(&self, user: &UserId) -> Result<Vec<LedgerEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.user == *user)
            .cloned()
            .collect())
    }

    fn entries_for_wager(&self, id: &WagerId) -> Result<Vec<LedgerEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.wager.as_ref() == Some(id))
            .cloned()
            .collect())
    }

    fn token_entries_for_user(&self, user: &UserId) -> Result<Vec<TokenEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .token_entries
            .iter()
            .filter(|e| e.user == *user)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlay_types::{Timestamp, UsdAmount};

    fn wallet(user: &str, cents: u64) -> WalletRecord {
        let mut w = WalletRecord::new(UserId::new(user), Timestamp::from_millis(0));
        w.available = UsdAmount::from_cents(cents);
        w
    }

    #[test]
    fn commit_makes_writes_visible() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        txn.put_wallet(&wallet("alice", 100)).unwrap();
        txn.commit().unwrap();

        let read = store.wallet(&UserId::new("alice")).unwrap().unwrap();
        assert_eq!(read.available, UsdAmount::from_cents(100));
    }

    #[test]
    fn dropped_txn_discards_writes() {
        let store = MemoryStore::new();
        {
            let mut txn = store.begin().unwrap();
            txn.put_wallet(&wallet("alice", 100)).unwrap();
            // dropped without commit
        }
        assert!(store.wallet(&UserId::new("alice")).unwrap().is_none());
    }

    #[test]
    fn interleaved_read_write_conflicts() {
        let store = MemoryStore::new();
        let mut setup = store.begin().unwrap();
        setup.put_wallet(&wallet("alice", 100)).unwrap();
        setup.commit().unwrap();

        let mut first = store.begin().unwrap();
        let mut second = store.begin().unwrap();
        let seen_first = first.wallet_for_update(&UserId::new("alice")).unwrap().unwrap();
        let seen_second = second.wallet_for_update(&UserId::new("alice")).unwrap().unwrap();

        let mut w = seen_first;
        w.available = UsdAmount::from_cents(50);
        first.put_wallet(&w).unwrap();
        first.commit().unwrap();

        let mut w = seen_second;
        w.available = UsdAmount::from_cents(80);
        second.put_wallet(&w).unwrap();
        let err = second.commit().unwrap_err();
        assert!(err.is_conflict());

        // The winner's write stands.
        let read = store.wallet(&UserId::new("alice")).unwrap().unwrap();
        assert_eq!(read.available, UsdAmount::from_cents(50));
    }

    #[test]
    fn read_of_absent_row_conflicts_with_concurrent_create() {
        let store = MemoryStore::new();

        let mut first = store.begin().unwrap();
        assert!(first.wallet_for_update(&UserId::new("alice")).unwrap().is_none());

        let mut second = store.begin().unwrap();
        second.put_wallet(&wallet("alice", 10)).unwrap();
        second.commit().unwrap();

        first.put_wallet(&wallet("alice", 20)).unwrap();
        assert!(first.commit().unwrap_err().is_conflict());
    }

    #[test]
    fn injected_conflicts_fail_then_recover() {
        let store = MemoryStore::new();
        store.inject_conflicts(2);

        for _ in 0..2 {
            let mut txn = store.begin().unwrap();
            txn.put_wallet(&wallet("alice", 1)).unwrap();
            assert!(txn.commit().unwrap_err().is_conflict());
        }

        let mut txn = store.begin().unwrap();
        txn.put_wallet(&wallet("alice", 1)).unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn entries_filtered_per_user_in_order() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        for (user, cents) in [("alice", 10), ("bob", 20), ("alice", 30)] {
            txn.append_entry(&LedgerEntry {
                id: parlay_types::EntryId::generate(),
                user: UserId::new(user),
                counterparty: None,
                kind: parlay_store::EntryKind::Deposit,
                amount: UsdAmount::from_cents(cents),
                wager: None,
                created_at: Timestamp::from_millis(0),
            })
            .unwrap();
        }
        txn.commit().unwrap();

        let alice = store.entries_for_user(&UserId::new("alice")).unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].amount, UsdAmount::from_cents(10));
        assert_eq!(alice[1].amount, UsdAmount::from_cents(30));
    }
}
