//! In-memory capped fungible ledger.
//!
//! Each asset is registered with a supply cap; supply grows by minting until
//! the cap is reached. Mutations are serialised ledger-wide. Observers are
//! called *before* a change is applied and while no balance lock is held, so
//! an observer may itself read the ledger. An observer must not wait on a
//! stable supply from the thread that is notifying it; that request fails
//! with [`LedgerError::Unavailable`].

use crate::balance::{BalanceChange, BalanceLedger, BalanceObserver, Holding};
use crate::error::LedgerError;
use estate_types::{Address, AssetId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::{self, ThreadId};
use tracing::debug;

#[derive(Debug, Default)]
struct AssetBook {
    cap: u128,
    supply: u128,
    balances: HashMap<Address, u128>,
}

/// Persistable image of one asset's book.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset: AssetId,
    pub cap: u128,
    pub balances: BTreeMap<Address, u128>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Sorted by asset.
    pub assets: Vec<AssetRecord>,
}

pub struct InMemoryLedger {
    books: RwLock<HashMap<AssetId, AssetBook>>,
    /// Held across observer notification and application of one mutation.
    mutation: Mutex<()>,
    /// Thread currently holding `mutation`.
    mutator: Mutex<Option<ThreadId>>,
    observers: RwLock<Vec<Arc<dyn BalanceObserver>>>,
}

/// Holds the ledger-wide mutation lock and marks the owning thread.
struct Serialised<'a> {
    _serial: MutexGuard<'a, ()>,
    mutator: &'a Mutex<Option<ThreadId>>,
}

impl Drop for Serialised<'_> {
    fn drop(&mut self) {
        *self.mutator.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            mutation: Mutex::new(()),
            mutator: Mutex::new(None),
            observers: RwLock::new(Vec::new()),
        }
    }

    fn serialise(&self) -> Serialised<'_> {
        let serial = self.mutation.lock().unwrap_or_else(|e| e.into_inner());
        *self.mutator.lock().unwrap_or_else(|e| e.into_inner()) = Some(thread::current().id());
        Serialised {
            _serial: serial,
            mutator: &self.mutator,
        }
    }

    fn is_mutating_here(&self) -> bool {
        *self.mutator.lock().unwrap_or_else(|e| e.into_inner()) == Some(thread::current().id())
    }

    /// Register an observer that is notified before every balance change.
    pub fn subscribe(&self, observer: Arc<dyn BalanceObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    /// Register a new asset whose supply may grow up to `cap`.
    pub fn register_asset(&self, asset: AssetId, cap: u128) -> Result<(), LedgerError> {
        let mut books = self.books.write().unwrap_or_else(|e| e.into_inner());
        if books.contains_key(&asset) {
            return Err(LedgerError::AssetExists(asset));
        }
        debug!(%asset, cap, "asset registered");
        books.insert(
            asset,
            AssetBook {
                cap,
                ..AssetBook::default()
            },
        );
        Ok(())
    }

    /// Issue `amount` new units of `asset` to `to`.
    pub fn mint(&self, asset: &AssetId, to: &Address, amount: u128) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let _serial = self.serialise();

        let (old, requested) = {
            let books = self.books.read().unwrap_or_else(|e| e.into_inner());
            let book = books
                .get(asset)
                .ok_or_else(|| LedgerError::UnknownAsset(asset.clone()))?;
            let requested = book
                .supply
                .checked_add(amount)
                .ok_or(LedgerError::Overflow)?;
            if requested > book.cap {
                return Err(LedgerError::ExceedsCap {
                    asset: asset.clone(),
                    cap: book.cap,
                    requested,
                });
            }
            (book.balances.get(to).copied().unwrap_or(0), requested)
        };
        let new = old.checked_add(amount).ok_or(LedgerError::Overflow)?;

        self.notify(&[BalanceChange {
            asset: asset.clone(),
            holder: to.clone(),
            old_balance: old,
            new_balance: new,
        }])?;

        let mut books = self.books.write().unwrap_or_else(|e| e.into_inner());
        let book = books
            .get_mut(asset)
            .ok_or_else(|| LedgerError::UnknownAsset(asset.clone()))?;
        book.supply = requested;
        book.balances.insert(to.clone(), new);
        debug!(%asset, %to, amount, supply = requested, "minted");
        Ok(())
    }

    /// Move `amount` units of `asset` from `from` to `to`.
    pub fn transfer(
        &self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let _serial = self.serialise();

        let (from_old, to_old) = {
            let books = self.books.read().unwrap_or_else(|e| e.into_inner());
            let book = books
                .get(asset)
                .ok_or_else(|| LedgerError::UnknownAsset(asset.clone()))?;
            let available = book.balances.get(from).copied().unwrap_or(0);
            if available < amount {
                return Err(LedgerError::InsufficientBalance {
                    holder: from.clone(),
                    needed: amount,
                    available,
                });
            }
            (available, book.balances.get(to).copied().unwrap_or(0))
        };
        if from == to {
            return Ok(());
        }
        let from_new = from_old - amount;
        let to_new = to_old.checked_add(amount).ok_or(LedgerError::Overflow)?;

        self.notify(&[
            BalanceChange {
                asset: asset.clone(),
                holder: from.clone(),
                old_balance: from_old,
                new_balance: from_new,
            },
            BalanceChange {
                asset: asset.clone(),
                holder: to.clone(),
                old_balance: to_old,
                new_balance: to_new,
            },
        ])?;

        let mut books = self.books.write().unwrap_or_else(|e| e.into_inner());
        let book = books
            .get_mut(asset)
            .ok_or_else(|| LedgerError::UnknownAsset(asset.clone()))?;
        if from_new == 0 {
            book.balances.remove(from);
        } else {
            book.balances.insert(from.clone(), from_new);
        }
        book.balances.insert(to.clone(), to_new);
        debug!(%asset, %from, %to, amount, "transferred");
        Ok(())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let books = self.books.read().unwrap_or_else(|e| e.into_inner());
        let mut assets: Vec<_> = books
            .iter()
            .map(|(asset, book)| AssetRecord {
                asset: asset.clone(),
                cap: book.cap,
                balances: book
                    .balances
                    .iter()
                    .filter(|(_, b)| **b > 0)
                    .map(|(a, &b)| (a.clone(), b))
                    .collect(),
            })
            .collect();
        assets.sort_by(|a, b| a.asset.cmp(&b.asset));
        LedgerSnapshot { assets }
    }

    /// Replace every book with `snapshot`. Observers are not notified.
    ///
    /// Fails without changing anything if a restored supply would overflow or
    /// exceed its cap.
    pub fn restore(&self, snapshot: LedgerSnapshot) -> Result<(), LedgerError> {
        let _serial = self.serialise();
        let mut restored = HashMap::with_capacity(snapshot.assets.len());
        for record in snapshot.assets {
            let supply = record
                .balances
                .values()
                .try_fold(0u128, |acc, b| acc.checked_add(*b))
                .ok_or(LedgerError::Overflow)?;
            if supply > record.cap {
                return Err(LedgerError::ExceedsCap {
                    asset: record.asset,
                    cap: record.cap,
                    requested: supply,
                });
            }
            restored.insert(
                record.asset,
                AssetBook {
                    cap: record.cap,
                    supply,
                    balances: record.balances.into_iter().collect(),
                },
            );
        }
        debug!(assets = restored.len(), "ledger restored");
        *self.books.write().unwrap_or_else(|e| e.into_inner()) = restored;
        Ok(())
    }

    fn notify(&self, changes: &[BalanceChange]) -> Result<(), LedgerError> {
        let observers: Vec<_> = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for change in changes {
            for observer in &observers {
                observer.on_balance_change(change)?;
            }
        }
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl BalanceLedger for InMemoryLedger {
    fn balance_of(&self, asset: &AssetId, holder: &Address) -> Result<u128, LedgerError> {
        Ok(self.holding(asset, holder)?.balance)
    }

    fn total_supply(&self, asset: &AssetId) -> Result<u128, LedgerError> {
        let books = self.books.read().unwrap_or_else(|e| e.into_inner());
        books
            .get(asset)
            .map(|b| b.supply)
            .ok_or_else(|| LedgerError::UnknownAsset(asset.clone()))
    }

    fn holding(&self, asset: &AssetId, holder: &Address) -> Result<Holding, LedgerError> {
        let books = self.books.read().unwrap_or_else(|e| e.into_inner());
        let book = books
            .get(asset)
            .ok_or_else(|| LedgerError::UnknownAsset(asset.clone()))?;
        Ok(Holding {
            balance: book.balances.get(holder).copied().unwrap_or(0),
            total_supply: book.supply,
        })
    }

    fn with_stable_supply(
        &self,
        asset: &AssetId,
        f: &mut dyn FnMut(u128),
    ) -> Result<(), LedgerError> {
        if self.is_mutating_here() {
            return Err(LedgerError::Unavailable(
                "balance change in progress on this thread".into(),
            ));
        }
        let _serial = self.serialise();
        f(self.total_supply(asset)?);
        Ok(())
    }
}
