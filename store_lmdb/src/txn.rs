//! The LMDB write transaction.
//!
//! Wraps a heed `RwTxn` — exclusive by construction, so every read inside it
//! is a "for update" read in the sense of the store contract. If the
//! transaction is dropped without [`StoreTxn::commit`], all writes are
//! rolled back (the underlying LMDB transaction is aborted).

use heed::RwTxn;

use parlay_store::{LedgerEntry, StoreError, StoreTxn, TokenEntry, WagerRecord, WalletRecord};
use parlay_types::{UserId, WagerId};

use crate::environment::{index_key, LmdbStore};
use crate::LmdbError;

const LEDGER_SEQ: &[u8] = b"ledger_seq";
const TOKEN_SEQ: &[u8] = b"token_seq";

pub struct LmdbTxn<'a> {
    wtxn: RwTxn<'a>,
    store: &'a LmdbStore,
}

impl<'a> LmdbTxn<'a> {
    pub(crate) fn new(store: &'a LmdbStore) -> Result<Self, StoreError> {
        let wtxn = store.env.write_txn().map_err(LmdbError::from)?;
        Ok(Self { wtxn, store })
    }

    /// Bump and return a meta counter. Sequence numbers order the ledger;
    /// they are allocated inside the transaction so an abort leaves no gap.
    fn next_seq(&mut self, counter: &[u8]) -> Result<u64, StoreError> {
        let current = self
            .store
            .meta_db
            .get(&self.wtxn, counter)
            .map_err(LmdbError::from)?
            .and_then(|b| b.try_into().ok().map(u64::from_be_bytes))
            .unwrap_or(0);
        let next = current + 1;
        self.store
            .meta_db
            .put(&mut self.wtxn, counter, &next.to_be_bytes())
            .map_err(LmdbError::from)?;
        Ok(next)
    }
}

impl StoreTxn for LmdbTxn<'_> {
    fn wallet_for_update(&mut self, user: &UserId) -> Result<Option<WalletRecord>, StoreError> {
        match self
            .store
            .wallets_db
            .get(&self.wtxn, user.as_str().as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn put_wallet(&mut self, wallet: &WalletRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(wallet).map_err(LmdbError::from)?;
        self.store
            .wallets_db
            .put(&mut self.wtxn, wallet.user.as_str().as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn wager_for_update(&mut self, id: &WagerId) -> Result<Option<WagerRecord>, StoreError> {
        match self
            .store
            .wagers_db
            .get(&self.wtxn, id.as_str().as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn put_wager(&mut self, wager: &WagerRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(wager).map_err(LmdbError::from)?;
        self.store
            .wagers_db
            .put(&mut self.wtxn, wager.id.as_str().as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn append_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let seq = self.next_seq(LEDGER_SEQ)?;
        let bytes = bincode::serialize(entry).map_err(LmdbError::from)?;

        self.store
            .ledger_db
            .put(&mut self.wtxn, &seq.to_be_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        self.store
            .ledger_user_db
            .put(
                &mut self.wtxn,
                &index_key(entry.user.as_str(), seq),
                &[],
            )
            .map_err(LmdbError::from)?;
        if let Some(wager) = &entry.wager {
            self.store
                .ledger_wager_db
                .put(&mut self.wtxn, &index_key(wager.as_str(), seq), &[])
                .map_err(LmdbError::from)?;
        }
        Ok(())
    }

    fn append_token_entry(&mut self, entry: &TokenEntry) -> Result<(), StoreError> {
        let seq = self.next_seq(TOKEN_SEQ)?;
        let bytes = bincode::serialize(entry).map_err(LmdbError::from)?;
        self.store
            .token_ledger_db
            .put(
                &mut self.wtxn,
                &index_key(entry.user.as_str(), seq),
                &bytes,
            )
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
