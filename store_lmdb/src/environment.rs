//! LMDB environment setup and the read side of the store.
//!
//! Database layout:
//! - `wallets`:       user id bytes → bincode `WalletRecord`
//! - `wagers`:        wager id bytes → bincode `WagerRecord`
//! - `ledger`:        global sequence (u64 BE) → bincode `LedgerEntry`
//! - `ledger_user`:   `user ++ 0x00 ++ seq` → [] (per-user index)
//! - `ledger_wager`:  `wager ++ 0x00 ++ seq` → [] (per-wager index)
//! - `token_ledger`:  `user ++ 0x00 ++ seq` → bincode `TokenEntry`
//! - `meta`:          counters (`ledger_seq`, `token_seq`)
//!
//! Composite keys use a NUL separator, which ids never contain, so a prefix
//! range `[id ++ 0x00, id ++ 0x01)` scans exactly one id's rows in sequence
//! order.

use std::ops::Bound;
use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use parlay_store::{EscrowStore, LedgerEntry, StoreError, TokenEntry, WagerRecord, WalletRecord};
use parlay_types::{UserId, WagerId};

use crate::txn::LmdbTxn;
use crate::LmdbError;

/// The LMDB-backed escrow store: one environment, all databases.
pub struct LmdbStore {
    pub(crate) env: Env,
    pub(crate) wallets_db: Database<Bytes, Bytes>,
    pub(crate) wagers_db: Database<Bytes, Bytes>,
    pub(crate) ledger_db: Database<Bytes, Bytes>,
    pub(crate) ledger_user_db: Database<Bytes, Bytes>,
    pub(crate) ledger_wager_db: Database<Bytes, Bytes>,
    pub(crate) token_ledger_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create the store at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, StoreError> {
        // Safety: the environment directory is owned by this process and not
        // concurrently truncated, per the heed contract.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(7)
                .open(path)
                .map_err(LmdbError::from)?
        };

        let mut wtxn = env.write_txn().map_err(LmdbError::from)?;
        let wallets_db = env
            .create_database(&mut wtxn, Some("wallets"))
            .map_err(LmdbError::from)?;
        let wagers_db = env
            .create_database(&mut wtxn, Some("wagers"))
            .map_err(LmdbError::from)?;
        let ledger_db = env
            .create_database(&mut wtxn, Some("ledger"))
            .map_err(LmdbError::from)?;
        let ledger_user_db = env
            .create_database(&mut wtxn, Some("ledger_user"))
            .map_err(LmdbError::from)?;
        let ledger_wager_db = env
            .create_database(&mut wtxn, Some("ledger_wager"))
            .map_err(LmdbError::from)?;
        let token_ledger_db = env
            .create_database(&mut wtxn, Some("token_ledger"))
            .map_err(LmdbError::from)?;
        let meta_db = env
            .create_database(&mut wtxn, Some("meta"))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        Ok(Self {
            env,
            wallets_db,
            wagers_db,
            ledger_db,
            ledger_user_db,
            ledger_wager_db,
            token_ledger_db,
            meta_db,
        })
    }

    /// Total USD ledger rows, for audit summaries.
    pub fn entry_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.ledger_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}

/// Build the composite index key `id_bytes ++ 0x00 ++ seq_be`.
pub(crate) fn index_key(id: &str, seq: u64) -> Vec<u8> {
    let id = id.as_bytes();
    let mut key = Vec::with_capacity(id.len() + 1 + 8);
    key.extend_from_slice(id);
    key.push(0);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Range bounds covering every `index_key(id, _)` for one id.
pub(crate) fn index_bounds(id: &str) -> (Vec<u8>, Vec<u8>) {
    let mut lower = id.as_bytes().to_vec();
    lower.push(0);
    let mut upper = id.as_bytes().to_vec();
    upper.push(1);
    (lower, upper)
}

/// Pull the trailing sequence number back out of a composite index key.
fn seq_of_index_key(key: &[u8]) -> Result<u64, LmdbError> {
    let tail: [u8; 8] = key[key.len().saturating_sub(8)..]
        .try_into()
        .map_err(|_| LmdbError::Heed("index key shorter than a sequence".into()))?;
    Ok(u64::from_be_bytes(tail))
}

impl EscrowStore for LmdbStore {
    type Txn<'a> = LmdbTxn<'a>;

    fn begin(&self) -> Result<Self::Txn<'_>, StoreError> {
        LmdbTxn::new(self)
    }

    fn wallet(&self, user: &UserId) -> Result<Option<WalletRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .wallets_db
            .get(&rtxn, user.as_str().as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn wager(&self, id: &WagerId) -> Result<Option<WagerRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .wagers_db
            .get(&rtxn, id.as_str().as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn entries_for_user(&self, user: &UserId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.entries_via_index(&self.ledger_user_db, user.as_str())
    }

    fn entries_for_wager(&self, id: &WagerId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.entries_via_index(&self.ledger_wager_db, id.as_str())
    }

    fn token_entries_for_user(&self, user: &UserId) -> Result<Vec<TokenEntry>, StoreError> {
        let (lower, upper) = index_bounds(user.as_str());
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bounds = (
            Bound::Included(lower.as_slice()),
            Bound::Excluded(upper.as_slice()),
        );
        let iter = self
            .token_ledger_db
            .range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for row in iter {
            let (_key, val) = row.map_err(LmdbError::from)?;
            results.push(bincode::deserialize(val).map_err(LmdbError::from)?);
        }
        Ok(results)
    }
}

impl LmdbStore {
    /// Scan a composite-key index and fetch the referenced ledger rows in
    /// sequence (append) order.
    fn entries_via_index(
        &self,
        index: &Database<Bytes, Bytes>,
        id: &str,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let (lower, upper) = index_bounds(id);
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bounds = (
            Bound::Included(lower.as_slice()),
            Bound::Excluded(upper.as_slice()),
        );
        let iter = index.range(&rtxn, &bounds).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for row in iter {
            let (key, _val) = row.map_err(LmdbError::from)?;
            let seq = seq_of_index_key(key)?;
            let bytes = self
                .ledger_db
                .get(&rtxn, &seq.to_be_bytes())
                .map_err(LmdbError::from)?
                .ok_or_else(|| {
                    StoreError::Corruption(format!("index points at missing ledger row {seq}"))
                })?;
            results.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(results)
    }
}
