//! Rent distributor: owns every asset's pool and serialises work per pool.
//!
//! Lock order: claims take a pool's mutex before reading the ledger, and the
//! ledger never holds its balance lock while notifying observers. Deposits and
//! settlements both run inside the ledger's mutation lock and take the pool
//! mutex second. Events are emitted after the pool lock is released.

use crate::error::RentError;
use crate::events::RentEvent;
use crate::payout::RentPayout;
use crate::pool::{RentPool, RentPoolSummary};
use crate::snapshot::RentSnapshot;
use estate_ledger::{BalanceChange, BalanceLedger, BalanceObserver, ObserverError};
use estate_types::{Address, AssetId, Clock, Timestamp};
use estate_utils::EventBus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Result of a successful deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositReceipt {
    pub asset: AssetId,
    pub amount: u128,
    /// Supply the deposit was spread over.
    pub total_supply: u128,
    pub cumulative_rent_per_share: u128,
    pub timestamp: Timestamp,
}

pub struct RentDistributor {
    ledger: Arc<dyn BalanceLedger>,
    payout: Arc<dyn RentPayout>,
    clock: Arc<dyn Clock>,
    pools: RwLock<HashMap<AssetId, Arc<Mutex<RentPool>>>>,
    events: EventBus<RentEvent>,
}

fn lock(pool: &Mutex<RentPool>) -> MutexGuard<'_, RentPool> {
    pool.lock().unwrap_or_else(|e| e.into_inner())
}

impl RentDistributor {
    pub fn new(
        ledger: Arc<dyn BalanceLedger>,
        payout: Arc<dyn RentPayout>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            payout,
            clock,
            pools: RwLock::new(HashMap::new()),
            events: EventBus::new(),
        }
    }

    /// Event bus carrying deposit, claim and settlement records.
    pub fn events(&self) -> &EventBus<RentEvent> {
        &self.events
    }

    fn pool(&self, asset: &AssetId) -> Option<Arc<Mutex<RentPool>>> {
        self.pools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(asset)
            .cloned()
    }

    fn pool_or_create(&self, asset: &AssetId, now: Timestamp) -> Arc<Mutex<RentPool>> {
        if let Some(pool) = self.pool(asset) {
            return pool;
        }
        let mut pools = self.pools.write().unwrap_or_else(|e| e.into_inner());
        pools
            .entry(asset.clone())
            .or_insert_with(|| {
                debug!(%asset, "rent pool created");
                Arc::new(Mutex::new(RentPool::new(asset.clone(), now)))
            })
            .clone()
    }

    /// Deposit `amount` of rent against `asset`, spread over its current supply.
    ///
    /// The supply is read and the accumulator advanced while the ledger holds
    /// off balance changes, so a concurrent mint settles either entirely
    /// before or entirely after this deposit.
    pub fn deposit_rent(&self, asset: &AssetId, amount: u128) -> Result<DepositReceipt, RentError> {
        if amount == 0 {
            return Err(RentError::ZeroAmount);
        }

        let now = self.clock.now();
        let mut accrued = None;
        self.ledger.with_stable_supply(asset, &mut |total_supply| {
            accrued = Some(self.accrue_locked(asset, amount, total_supply, now));
        })?;
        let Some(receipt) = accrued else {
            return Err(RentError::EmptyPool(asset.clone()));
        };
        let receipt = receipt?;

        info!(%asset, amount, supply = receipt.total_supply, "rent deposited");
        self.events.emit(&RentEvent::Deposited {
            asset: asset.clone(),
            amount,
            timestamp: now,
        });
        Ok(receipt)
    }

    fn accrue_locked(
        &self,
        asset: &AssetId,
        amount: u128,
        total_supply: u128,
        now: Timestamp,
    ) -> Result<DepositReceipt, RentError> {
        // Avoid creating a pool for an asset that cannot receive rent.
        if total_supply == 0 {
            return Err(RentError::EmptyPool(asset.clone()));
        }
        let pool = self.pool_or_create(asset, now);
        let cumulative = lock(&pool).accrue(amount, total_supply, now)?;
        Ok(DepositReceipt {
            asset: asset.clone(),
            amount,
            total_supply,
            cumulative_rent_per_share: cumulative,
            timestamp: now,
        })
    }

    /// Pay `holder` everything it is owed on `asset`.
    ///
    /// The claim is recorded before the payout runs; if the payout fails the
    /// amount is returned to the holder's unpaid entitlement.
    pub fn claim_rent(&self, asset: &AssetId, holder: &Address) -> Result<u128, RentError> {
        let Some(pool) = self.pool(asset) else {
            self.ledger.balance_of(asset, holder)?;
            return Err(RentError::NothingToClaim {
                asset: asset.clone(),
                holder: holder.clone(),
            });
        };

        let owed = {
            let mut pool = lock(&pool);
            let balance = self.ledger.balance_of(asset, holder)?;
            pool.take_entitlement(holder, balance)?
        };

        if let Err(e) = self.payout.pay(asset, holder, owed) {
            warn!(%asset, %holder, owed, error = %e, "rent payout failed, entitlement restored");
            lock(&pool).restore_entitlement(holder, owed);
            return Err(RentError::Payout(e));
        }

        let now = self.clock.now();
        info!(%asset, %holder, amount = owed, "rent claimed");
        self.events.emit(&RentEvent::Claimed {
            asset: asset.clone(),
            holder: holder.clone(),
            amount: owed,
            timestamp: now,
        });
        Ok(owed)
    }

    /// What `holder` could claim on `asset` right now.
    pub fn unclaimed_rent(&self, asset: &AssetId, holder: &Address) -> Result<u128, RentError> {
        let Some(pool) = self.pool(asset) else {
            self.ledger.balance_of(asset, holder)?;
            return Ok(0);
        };
        let pool = lock(&pool);
        let balance = self.ledger.balance_of(asset, holder)?;
        pool.entitlement(holder, balance)
    }

    /// Settle `holder`'s entitlement at its old balance. Invoked by the ledger
    /// before every balance movement.
    pub fn settle(&self, change: &BalanceChange) -> Result<u128, RentError> {
        let Some(pool) = self.pool(&change.asset) else {
            return Ok(0);
        };
        let settled = lock(&pool).settle(&change.holder, change.old_balance)?;
        if settled > 0 {
            debug!(
                asset = %change.asset,
                holder = %change.holder,
                settled,
                old_balance = change.old_balance,
                new_balance = change.new_balance,
                "entitlement settled before balance change"
            );
            self.events.emit(&RentEvent::Settled {
                asset: change.asset.clone(),
                holder: change.holder.clone(),
                amount: settled,
            });
        }
        Ok(settled)
    }

    pub fn summary(&self, asset: &AssetId) -> Option<RentPoolSummary> {
        let pool = self.pool(asset)?;
        let summary = lock(&pool).summary();
        Some(summary)
    }

    /// Assets that have received at least one deposit, sorted.
    pub fn assets(&self) -> Vec<AssetId> {
        let mut assets: Vec<_> = self
            .pools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        assets.sort();
        assets
    }

    pub fn snapshot(&self) -> RentSnapshot {
        let pools: Vec<_> = self
            .pools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        let mut pools: Vec<RentPool> = pools.iter().map(|p| lock(p).clone()).collect();
        pools.sort_by(|a, b| a.asset.cmp(&b.asset));
        RentSnapshot { pools }
    }

    /// Replace every pool with the contents of `snapshot`.
    pub fn restore(&self, snapshot: RentSnapshot) {
        let restored: HashMap<_, _> = snapshot
            .pools
            .into_iter()
            .map(|p| (p.asset.clone(), Arc::new(Mutex::new(p))))
            .collect();
        info!(pools = restored.len(), "rent pools restored");
        *self.pools.write().unwrap_or_else(|e| e.into_inner()) = restored;
    }
}

impl BalanceObserver for RentDistributor {
    fn on_balance_change(&self, change: &BalanceChange) -> Result<(), ObserverError> {
        self.settle(change)
            .map(|_| ())
            .map_err(|e| ObserverError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PayoutError;
    use crate::payout::CreditPayout;
    use estate_ledger::{InMemoryLedger, LedgerError};
    use estate_nullables::NullClock;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn asset() -> AssetId {
        AssetId::new("villa")
    }

    fn addr(name: &str) -> Address {
        Address::new(name)
    }

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        credits: Arc<CreditPayout>,
        rent: Arc<RentDistributor>,
    }

    fn fixture(holdings: &[(&str, u128)]) -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.register_asset(asset(), 1_000_000).unwrap();
        let credits = Arc::new(CreditPayout::new());
        let rent = Arc::new(RentDistributor::new(
            ledger.clone(),
            credits.clone(),
            Arc::new(NullClock::new(1_000)),
        ));
        ledger.subscribe(rent.clone());
        for (name, amount) in holdings {
            ledger.mint(&asset(), &addr(name), *amount).unwrap();
        }
        Fixture {
            ledger,
            credits,
            rent,
        }
    }

    #[test]
    fn split_deposit_is_claimed_once_each() {
        let f = fixture(&[("alice", 500), ("bob", 500)]);
        f.rent.deposit_rent(&asset(), 100).unwrap();

        assert_eq!(f.rent.unclaimed_rent(&asset(), &addr("alice")).unwrap(), 50);
        assert_eq!(f.rent.unclaimed_rent(&asset(), &addr("bob")).unwrap(), 50);
        assert_eq!(f.rent.claim_rent(&asset(), &addr("alice")).unwrap(), 50);
        assert_eq!(f.rent.claim_rent(&asset(), &addr("bob")).unwrap(), 50);
        assert_eq!(f.credits.credit_of(&addr("alice")), 50);

        let again = f.rent.claim_rent(&asset(), &addr("alice"));
        assert!(matches!(again, Err(RentError::NothingToClaim { .. })));
        assert_eq!(f.rent.unclaimed_rent(&asset(), &addr("alice")).unwrap(), 0);
    }

    #[test]
    fn deposit_into_empty_asset_is_rejected_without_creating_pool() {
        let f = fixture(&[]);
        assert_eq!(
            f.rent.deposit_rent(&asset(), 10),
            Err(RentError::EmptyPool(asset()))
        );
        assert!(f.rent.assets().is_empty());
    }

    #[test]
    fn zero_deposit_is_rejected() {
        let f = fixture(&[("alice", 1)]);
        assert_eq!(f.rent.deposit_rent(&asset(), 0), Err(RentError::ZeroAmount));
    }

    #[test]
    fn ledger_errors_propagate_unmodified() {
        let f = fixture(&[("alice", 1)]);
        let unknown = AssetId::new("nowhere");
        assert_eq!(
            f.rent.deposit_rent(&unknown, 10),
            Err(RentError::Ledger(LedgerError::UnknownAsset(unknown.clone())))
        );
        assert_eq!(
            f.rent.claim_rent(&unknown, &addr("alice")),
            Err(RentError::Ledger(LedgerError::UnknownAsset(unknown)))
        );
    }

    #[test]
    fn buyer_after_deposit_earns_nothing_from_it() {
        let f = fixture(&[("alice", 1_000)]);
        f.rent.deposit_rent(&asset(), 100).unwrap();
        f.ledger
            .transfer(&asset(), &addr("alice"), &addr("bob"), 1_000)
            .unwrap();

        assert_eq!(f.rent.unclaimed_rent(&asset(), &addr("bob")).unwrap(), 0);
        assert_eq!(f.rent.unclaimed_rent(&asset(), &addr("alice")).unwrap(), 100);
        assert!(matches!(
            f.rent.claim_rent(&asset(), &addr("bob")),
            Err(RentError::NothingToClaim { .. })
        ));
        assert_eq!(f.rent.claim_rent(&asset(), &addr("alice")).unwrap(), 100);
    }

    #[test]
    fn seller_keeps_earned_rent_and_buyer_earns_later_deposits() {
        let f = fixture(&[("alice", 600), ("carol", 400)]);
        f.rent.deposit_rent(&asset(), 1_000).unwrap();
        f.ledger
            .transfer(&asset(), &addr("alice"), &addr("bob"), 300)
            .unwrap();
        f.rent.deposit_rent(&asset(), 1_000).unwrap();

        assert_eq!(f.rent.unclaimed_rent(&asset(), &addr("alice")).unwrap(), 600 + 300);
        assert_eq!(f.rent.unclaimed_rent(&asset(), &addr("bob")).unwrap(), 300);
        assert_eq!(f.rent.unclaimed_rent(&asset(), &addr("carol")).unwrap(), 800);
    }

    #[test]
    fn settlement_emits_event() {
        let f = fixture(&[("alice", 10)]);
        let settled = Arc::new(AtomicUsize::new(0));
        let s = settled.clone();
        f.rent.events().subscribe(move |e| {
            if let RentEvent::Settled { amount, .. } = e {
                s.fetch_add(*amount as usize, Ordering::SeqCst);
            }
        });
        f.rent.deposit_rent(&asset(), 50).unwrap();
        f.ledger
            .transfer(&asset(), &addr("alice"), &addr("bob"), 5)
            .unwrap();
        assert_eq!(settled.load(Ordering::SeqCst), 50);
    }

    struct FlakyPayout {
        fail: AtomicBool,
    }

    impl RentPayout for FlakyPayout {
        fn pay(&self, _: &AssetId, _: &Address, _: u128) -> Result<(), PayoutError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(PayoutError::Unavailable("bank offline".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn failed_payout_restores_entitlement() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.register_asset(asset(), 100).unwrap();
        ledger.mint(&asset(), &addr("alice"), 100).unwrap();
        let payout = Arc::new(FlakyPayout {
            fail: AtomicBool::new(true),
        });
        let rent = RentDistributor::new(ledger, payout.clone(), Arc::new(NullClock::new(0)));
        rent.deposit_rent(&asset(), 40).unwrap();

        assert!(matches!(
            rent.claim_rent(&asset(), &addr("alice")),
            Err(RentError::Payout(PayoutError::Unavailable(_)))
        ));
        assert_eq!(rent.unclaimed_rent(&asset(), &addr("alice")).unwrap(), 40);
        assert_eq!(rent.summary(&asset()).unwrap().total_claimed, 0);

        payout.fail.store(false, Ordering::SeqCst);
        assert_eq!(rent.claim_rent(&asset(), &addr("alice")).unwrap(), 40);
    }

    /// Re-enters `claim_rent` from inside the payout.
    struct ReentrantPayout {
        rent: Mutex<Option<Arc<RentDistributor>>>,
        inner_result: Mutex<Option<Result<u128, RentError>>>,
    }

    impl RentPayout for ReentrantPayout {
        fn pay(&self, asset: &AssetId, holder: &Address, _: u128) -> Result<(), PayoutError> {
            let rent = self.rent.lock().unwrap().clone();
            if let Some(rent) = rent {
                let mut slot = self.inner_result.lock().unwrap();
                if slot.is_none() {
                    *slot = Some(rent.claim_rent(asset, holder));
                }
            }
            Ok(())
        }
    }

    #[test]
    fn reentrant_claim_sees_updated_state() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.register_asset(asset(), 100).unwrap();
        ledger.mint(&asset(), &addr("alice"), 100).unwrap();
        let payout = Arc::new(ReentrantPayout {
            rent: Mutex::new(None),
            inner_result: Mutex::new(None),
        });
        let rent = Arc::new(RentDistributor::new(
            ledger,
            payout.clone(),
            Arc::new(NullClock::new(0)),
        ));
        *payout.rent.lock().unwrap() = Some(rent.clone());

        rent.deposit_rent(&asset(), 70).unwrap();
        assert_eq!(rent.claim_rent(&asset(), &addr("alice")).unwrap(), 70);
        let inner = payout.inner_result.lock().unwrap().clone();
        assert!(matches!(inner, Some(Err(RentError::NothingToClaim { .. }))));
        assert_eq!(rent.summary(&asset()).unwrap().total_claimed, 70);
        // Break the Arc cycle.
        *payout.rent.lock().unwrap() = None;
    }

    #[test]
    fn snapshot_and_restore_preserve_entitlements() {
        let f = fixture(&[("alice", 250), ("bob", 750)]);
        f.rent.deposit_rent(&asset(), 400).unwrap();
        f.rent.claim_rent(&asset(), &addr("alice")).unwrap();
        let snapshot = f.rent.snapshot();
        assert_eq!(snapshot.total_deposited(), 400);

        let restored = RentDistributor::new(
            f.ledger.clone(),
            Arc::new(CreditPayout::new()),
            Arc::new(NullClock::new(0)),
        );
        restored.restore(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.unclaimed_rent(&asset(), &addr("bob")).unwrap(), 300);
        assert_eq!(restored.unclaimed_rent(&asset(), &addr("alice")).unwrap(), 0);
    }

    /// Deposits rent from inside a balance notification.
    struct DepositOnChange {
        rent: Mutex<Option<Arc<RentDistributor>>>,
        result: Mutex<Option<Result<DepositReceipt, RentError>>>,
    }

    impl BalanceObserver for DepositOnChange {
        fn on_balance_change(&self, change: &BalanceChange) -> Result<(), ObserverError> {
            let rent = self.rent.lock().unwrap().clone();
            if let Some(rent) = rent {
                *self.result.lock().unwrap() = Some(rent.deposit_rent(&change.asset, 101));
            }
            Ok(())
        }
    }

    #[test]
    fn deposit_during_a_mint_cannot_over_distribute() {
        let f = fixture(&[("alice", 1_000)]);
        let depositor = Arc::new(DepositOnChange {
            rent: Mutex::new(Some(f.rent.clone())),
            result: Mutex::new(None),
        });
        f.ledger.subscribe(depositor.clone());
        f.rent.deposit_rent(&asset(), 100).unwrap();

        f.ledger.mint(&asset(), &addr("bob"), 1_000).unwrap();
        assert!(matches!(
            depositor.result.lock().unwrap().take(),
            Some(Err(RentError::Ledger(LedgerError::Unavailable(_))))
        ));
        *depositor.rent.lock().unwrap() = None;

        let claimed: u128 = ["alice", "bob"]
            .iter()
            .filter_map(|name| f.rent.claim_rent(&asset(), &addr(name)).ok())
            .sum();
        assert_eq!(claimed, 100);
        assert!(claimed <= f.rent.summary(&asset()).unwrap().total_deposited);
    }

    #[test]
    fn concurrent_mints_and_deposits_stay_within_deposits() {
        let f = fixture(&[("alice", 1_000)]);
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..50 {
                    f.ledger
                        .mint(&asset(), &addr(&format!("buyer{i}")), 1_000)
                        .unwrap();
                }
            });
            s.spawn(|| {
                for _ in 0..50 {
                    f.rent.deposit_rent(&asset(), 101).unwrap();
                }
            });
        });

        let mut claimed = f.rent.claim_rent(&asset(), &addr("alice")).unwrap_or(0);
        for i in 0..50 {
            claimed += f
                .rent
                .claim_rent(&asset(), &addr(&format!("buyer{i}")))
                .unwrap_or(0);
        }
        let summary = f.rent.summary(&asset()).unwrap();
        assert_eq!(summary.total_deposited, 50 * 101);
        assert!(claimed <= summary.total_deposited);
        assert_eq!(summary.total_claimed, claimed);
    }

    #[test]
    fn concurrent_claims_by_one_holder_pay_once() {
        let f = fixture(&[("alice", 400), ("bob", 600)]);
        f.rent.deposit_rent(&asset(), 1_000).unwrap();

        let paid: Vec<u128> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| f.rent.claim_rent(&asset(), &addr("alice"))))
                .collect();
            handles
                .into_iter()
                .filter_map(|h| h.join().unwrap().ok())
                .collect()
        });
        assert_eq!(paid, vec![400]);
        assert_eq!(f.credits.credit_of(&addr("alice")), 400);
        assert_eq!(f.rent.summary(&asset()).unwrap().total_claimed, 400);
    }
}
