//! # TierMine Engine
//!
//! Every public operation runs as one [`LedgerStore::transaction`]: records are
//! read, validated and staged, the transfer batch is executed last, and the
//! staged writes commit only if all of that succeeded.
//!
//! ```text
//!   lock ─► now = clock ─► read/validate ─► stage writes ─► transfer batch ─► commit
//!                               │                                │
//!                               └──────── any Err: roll back ◄───┘
//! ```

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tiermine_core::{
    split_fee, AccountId, Amount, Clock, Entity, MineError, Result, TierNonce, Timestamp,
};
use tiermine_storage::{LedgerStore, Record, RecordKey, StoreTxn};

use crate::events::{EventRecord, MineEvent};
use crate::funds::{FundsTransfer, Party, TransferBatch};
use crate::mine::{MineConfig, MineParams, MineUpdate};
use crate::position::Position;
use crate::receipts::{
    ClaimReceipt, CompoundReceipt, DepositReceipt, ReferralPayout, TerminationReceipt,
    TopUpReceipt,
};
use crate::referral::ReferralAccount;
use crate::tier::{TierConfig, TierParams, TierUpdate};
use crate::whitelist::WhitelistGrant;

/// Most events held before the oldest are dropped
pub const JOURNAL_CAPACITY: usize = 1000;

/// How a position is being opened
#[derive(Clone, Copy, Debug)]
enum Entry {
    Standard,
    Referred(AccountId),
    Whitelisted,
}

/// The staking ledger
pub struct TierMine {
    store: Arc<LedgerStore>,
    funds: Arc<dyn FundsTransfer>,
    clock: Arc<dyn Clock>,
    journal: Mutex<VecDeque<EventRecord>>,
}

fn require<T: Record>(txn: &StoreTxn<'_>, key: &RecordKey, entity: Entity) -> Result<T> {
    txn.get::<T>(key)?.ok_or(MineError::NotFound(entity))
}

fn load_mine(txn: &StoreTxn<'_>) -> Result<MineConfig> {
    require(txn, &MineConfig::key(), Entity::Mine)
}

fn load_tier(txn: &StoreTxn<'_>, nonce: TierNonce) -> Result<TierConfig> {
    require(txn, &TierConfig::key(nonce), Entity::Tier(nonce))
}

fn load_position(txn: &StoreTxn<'_>, owner: &AccountId) -> Result<Position> {
    require(txn, &Position::key(owner), Entity::Position(*owner))
}

impl TierMine {
    pub fn new(
        store: Arc<LedgerStore>,
        funds: Arc<dyn FundsTransfer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            funds,
            clock,
            journal: Mutex::new(VecDeque::new()),
        }
    }

    /// Take every journaled event, oldest first
    ///
    /// At most [`JOURNAL_CAPACITY`] events are retained between drains.
    pub fn drain_events(&self) -> Vec<EventRecord> {
        self.journal.lock().drain(..).collect()
    }

    // Called as the last step of a transaction closure; the commit that
    // follows cannot fail, so journal order is commit order.
    fn emit(&self, timestamp: Timestamp, events: impl IntoIterator<Item = MineEvent>) {
        let mut journal = self.journal.lock();
        for event in events {
            tracing::trace!(kind = event.kind(), "event journaled");
            if journal.len() >= JOURNAL_CAPACITY {
                journal.pop_front();
            }
            journal.push_back(EventRecord { event, timestamp });
        }
    }

    fn settle(&self, batch: &TransferBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.funds.execute(batch).map_err(|e| {
            tracing::warn!(error = %e, transfers = batch.len(), "transfer batch rejected");
            MineError::from(e)
        })
    }

    // === Mine and tier administration ===

    /// Create the mine singleton with `admin` as its administrator
    pub fn initialize(&self, admin: AccountId, params: MineParams) -> Result<MineConfig> {
        self.store.transaction(|txn| -> Result<MineConfig> {
            let now = self.clock.now();
            if txn.contains(&MineConfig::key()) {
                return Err(MineError::AlreadyExists(Entity::Mine));
            }

            let mine = MineConfig::new(admin, params)?;
            txn.put(&mine)?;

            tracing::info!(
                admin = %admin,
                dev_fee_bps = mine.dev_fee_bps,
                early_withdrawal_fee_bps = mine.early_withdrawal_fee_bps,
                referral_reward_bps = mine.referral_reward_bps,
                "mine initialized"
            );
            self.emit(
                now,
                [MineEvent::MineInitialized {
                    admin,
                    token_mint: mine.token_mint,
                }],
            );
            Ok(mine)
        })
    }

    pub fn update_mine(&self, signer: AccountId, update: MineUpdate) -> Result<MineConfig> {
        self.store.transaction(|txn| -> Result<MineConfig> {
            let now = self.clock.now();
            let mut mine = load_mine(txn)?;
            mine.ensure_admin(&signer)?;

            mine.apply(&update)?;
            txn.put(&mine)?;

            tracing::info!(is_active = mine.is_active, "mine updated");
            self.emit(now, [MineEvent::MineUpdated { update }]);
            Ok(mine)
        })
    }

    /// Append a tier; returns its nonce
    pub fn add_tier(&self, signer: AccountId, params: TierParams) -> Result<TierNonce> {
        self.store.transaction(|txn| -> Result<TierNonce> {
            let now = self.clock.now();
            let mut mine = load_mine(txn)?;
            mine.ensure_admin(&signer)?;

            let nonce = mine.next_tier_nonce()?;
            if txn.contains(&TierConfig::key(nonce)) {
                return Err(MineError::InvariantViolation(format!(
                    "tier #{} already stored below the nonce counter",
                    nonce
                )));
            }
            let tier = TierConfig::new(nonce, params);
            txn.put(&tier)?;
            txn.put(&mine)?;

            tracing::info!(
                tier = nonce,
                apy_bps = params.apy_bps,
                minimum = params.minimum_token_amount,
                lock_secs = params.lock_duration_secs,
                "tier added"
            );
            self.emit(
                now,
                [MineEvent::TierAdded {
                    nonce,
                    apy_bps: params.apy_bps,
                    minimum_token_amount: params.minimum_token_amount,
                    lock_duration_secs: params.lock_duration_secs,
                }],
            );
            Ok(nonce)
        })
    }

    pub fn update_tier(
        &self,
        signer: AccountId,
        nonce: TierNonce,
        update: TierUpdate,
    ) -> Result<TierConfig> {
        self.store.transaction(|txn| -> Result<TierConfig> {
            let now = self.clock.now();
            let mine = load_mine(txn)?;
            mine.ensure_admin(&signer)?;

            let mut tier = load_tier(txn, nonce)?;
            tier.apply(&update);
            txn.put(&tier)?;

            tracing::info!(tier = nonce, is_active = tier.is_active, "tier updated");
            self.emit(now, [MineEvent::TierUpdated { nonce, update }]);
            Ok(tier)
        })
    }

    /// Create or replace `beneficiary`'s grant to open in `tier` below its minimum
    pub fn whitelist_account(
        &self,
        signer: AccountId,
        beneficiary: AccountId,
        tier: TierNonce,
        expiry: Timestamp,
    ) -> Result<WhitelistGrant> {
        self.store.transaction(|txn| -> Result<WhitelistGrant> {
            let now = self.clock.now();
            let mine = load_mine(txn)?;
            mine.ensure_admin(&signer)?;
            load_tier(txn, tier)?.ensure_active()?;

            let grant = WhitelistGrant::new(beneficiary, tier, expiry);
            txn.put(&grant)?;

            tracing::info!(beneficiary = %beneficiary, tier, expiry, "account whitelisted");
            self.emit(
                now,
                [MineEvent::AccountWhitelisted {
                    beneficiary,
                    tier,
                    expiry,
                }],
            );
            Ok(grant)
        })
    }

    // === Position lifecycle ===

    pub fn initialize_staking(
        &self,
        owner: AccountId,
        tier: TierNonce,
        amount: Amount,
    ) -> Result<DepositReceipt> {
        self.open_position(owner, tier, amount, Entry::Standard)
    }

    /// Open a position and credit `referrer` with the referral bonus
    pub fn initialize_staking_with_referrer(
        &self,
        owner: AccountId,
        tier: TierNonce,
        amount: Amount,
        referrer: AccountId,
    ) -> Result<DepositReceipt> {
        self.open_position(owner, tier, amount, Entry::Referred(referrer))
    }

    /// Open a position through the owner's whitelist grant, bypassing the tier minimum
    pub fn initialize_whitelist(
        &self,
        owner: AccountId,
        tier: TierNonce,
        amount: Amount,
    ) -> Result<DepositReceipt> {
        self.open_position(owner, tier, amount, Entry::Whitelisted)
    }

    fn open_position(
        &self,
        owner: AccountId,
        tier_nonce: TierNonce,
        amount: Amount,
        entry: Entry,
    ) -> Result<DepositReceipt> {
        self.store.transaction(|txn| -> Result<DepositReceipt> {
            let now = self.clock.now();
            let mine = load_mine(txn)?;
            mine.ensure_active()?;
            let mut tier = load_tier(txn, tier_nonce)?;
            tier.ensure_active()?;

            if txn.contains(&Position::key(&owner)) {
                return Err(MineError::AlreadyExists(Entity::Position(owner)));
            }
            if amount == 0 {
                return Err(MineError::InvalidAmount("deposit amount is zero".into()));
            }

            match entry {
                Entry::Standard => tier.ensure_minimum(amount)?,
                Entry::Referred(referrer) => {
                    tier.ensure_minimum(amount)?;
                    if referrer == owner {
                        return Err(MineError::InvalidReferrer(referrer));
                    }
                    if !txn.contains(&Position::key(&referrer)) {
                        return Err(MineError::NotFound(Entity::Position(referrer)));
                    }
                }
                Entry::Whitelisted => {
                    let grant: WhitelistGrant = require(
                        txn,
                        &WhitelistGrant::key(&owner),
                        Entity::WhitelistGrant(owner),
                    )?;
                    grant.validate(tier_nonce, now)?;
                }
            }

            let split = split_fee(amount, mine.dev_fee_bps)?;
            tracing::debug!(amount, dev_fee = split.fee, net = split.net, "deposit split");

            let whitelisted = matches!(entry, Entry::Whitelisted);
            let position = Position::open(owner, &tier, split.net, now, whitelisted)?;
            tier.credit_locked(split.net)?;
            txn.put(&position)?;
            txn.put(&tier)?;

            let mut events = vec![MineEvent::Staked {
                owner,
                tier: tier_nonce,
                amount,
                dev_fee: split.fee,
                net_principal: split.net,
                whitelisted,
            }];

            let referral_bonus = match entry {
                Entry::Referred(referrer) => {
                    let mut account = txn
                        .get::<ReferralAccount>(&ReferralAccount::key(&referrer))?
                        .unwrap_or_else(|| ReferralAccount::new(referrer));
                    let bonus = ReferralAccount::bonus_for(split.net, mine.referral_reward_bps)?;
                    account.credit(bonus)?;
                    txn.put(&account)?;

                    tracing::debug!(referrer = %referrer, bonus, count = account.count, "referral credited");
                    events.push(MineEvent::ReferralCredited {
                        referrer,
                        referee: owner,
                        bonus,
                    });
                    Some((referrer, bonus))
                }
                Entry::Whitelisted => {
                    txn.delete(&WhitelistGrant::key(&owner));
                    None
                }
                Entry::Standard => None,
            };

            let mut batch = TransferBatch::new();
            batch
                .push(Party::Account(owner), Party::Vault, split.net)
                .push(
                    Party::Account(owner),
                    Party::Account(mine.fee_collector),
                    split.fee,
                );
            self.settle(&batch)?;

            tracing::info!(
                owner = %owner,
                tier = tier_nonce,
                amount,
                net_principal = split.net,
                accrued_interest = position.accrued_interest,
                whitelisted,
                "position opened"
            );
            self.emit(now, events);

            Ok(DepositReceipt {
                owner,
                tier: tier_nonce,
                amount,
                dev_fee: split.fee,
                net_principal: split.net,
                accrued_interest: position.accrued_interest,
                referral_bonus,
                lock_timestamp: now,
            })
        })
    }

    /// Settle interest earned so far, add `amount` net of the dev fee, re-project
    pub fn increase_stake(&self, owner: AccountId, amount: Amount) -> Result<TopUpReceipt> {
        self.store.transaction(|txn| -> Result<TopUpReceipt> {
            let now = self.clock.now();
            let mine = load_mine(txn)?;
            let mut position = load_position(txn, &owner)?;
            let mut tier = load_tier(txn, position.tier)?;
            tier.ensure_active()?;

            if amount == 0 {
                return Err(MineError::InvalidAmount("top-up amount is zero".into()));
            }

            let split = split_fee(amount, mine.dev_fee_bps)?;
            let outcome = position.top_up(&tier, split.net, now)?;
            tier.credit_locked(split.net)?;
            txn.put(&position)?;
            txn.put(&tier)?;

            tracing::debug!(
                settled = outcome.settled_interest,
                projected = outcome.projected_interest,
                "top-up settled"
            );

            let mut batch = TransferBatch::new();
            batch
                .push(Party::Account(owner), Party::Vault, split.net)
                .push(
                    Party::Account(owner),
                    Party::Account(mine.fee_collector),
                    split.fee,
                );
            self.settle(&batch)?;

            tracing::info!(
                owner = %owner,
                amount,
                net = split.net,
                total_locked = position.total_locked,
                "stake increased"
            );
            self.emit(
                now,
                [MineEvent::StakeIncreased {
                    owner,
                    amount,
                    settled_interest: outcome.settled_interest,
                    total_locked: position.total_locked,
                }],
            );

            Ok(TopUpReceipt {
                amount,
                dev_fee: split.fee,
                net_amount: split.net,
                settled_interest: outcome.settled_interest,
                total_locked: position.total_locked,
                accrued_interest: position.accrued_interest,
            })
        })
    }

    /// Fold matured interest into principal
    pub fn compound(&self, owner: AccountId) -> Result<CompoundReceipt> {
        self.store.transaction(|txn| -> Result<CompoundReceipt> {
            let now = self.clock.now();
            let mut position = load_position(txn, &owner)?;
            let mut tier = load_tier(txn, position.tier)?;

            let compounded = position.compound(&tier, now)?;
            tier.credit_locked(compounded)?;
            txn.put(&position)?;
            txn.put(&tier)?;

            tracing::info!(
                owner = %owner,
                compounded,
                total_locked = position.total_locked,
                "interest compounded"
            );
            self.emit(
                now,
                [MineEvent::Compounded {
                    owner,
                    compounded,
                    total_locked: position.total_locked,
                }],
            );

            Ok(CompoundReceipt {
                compounded,
                total_locked: position.total_locked,
                accrued_interest: position.accrued_interest,
            })
        })
    }

    /// Pay out accrued interest, penalized before maturity
    pub fn claim_interest(&self, owner: AccountId) -> Result<ClaimReceipt> {
        self.store.transaction(|txn| -> Result<ClaimReceipt> {
            let now = self.clock.now();
            let mine = load_mine(txn)?;
            let mut position = load_position(txn, &owner)?;
            let tier = load_tier(txn, position.tier)?;

            let receipt = position.claim(&tier, &mine, now)?;
            txn.put(&position)?;

            let mut batch = TransferBatch::new();
            batch
                .push(Party::Vault, Party::Account(owner), receipt.amount_out)
                .push(
                    Party::Vault,
                    Party::Account(mine.fee_collector),
                    receipt.dev_fee,
                )
                .push(
                    Party::Vault,
                    Party::Account(mine.penalty_collector),
                    receipt.penalty_fee,
                );
            self.settle(&batch)?;

            tracing::info!(
                owner = %owner,
                interest = receipt.interest,
                amount_out = receipt.amount_out,
                penalty = receipt.penalty_fee,
                early = receipt.early,
                "interest claimed"
            );
            self.emit(
                now,
                [MineEvent::InterestClaimed {
                    owner,
                    interest: receipt.interest,
                    dev_fee: receipt.dev_fee,
                    penalty_fee: receipt.penalty_fee,
                    amount_out: receipt.amount_out,
                }],
            );
            Ok(receipt)
        })
    }

    /// Close `owner`'s position and return its principal net of the dev fee
    ///
    /// Unclaimed interest and the owner's referral earnings are forfeited.
    pub fn terminate_staking(
        &self,
        signer: AccountId,
        owner: AccountId,
    ) -> Result<TerminationReceipt> {
        self.store.transaction(|txn| -> Result<TerminationReceipt> {
            let now = self.clock.now();
            let mine = load_mine(txn)?;
            mine.ensure_admin(&signer)?;
            let position = load_position(txn, &owner)?;
            let mut tier = load_tier(txn, position.tier)?;

            let split = split_fee(position.total_locked, mine.dev_fee_bps)?;
            tier.debit_locked(position.total_locked)?;
            txn.put(&tier)?;
            txn.delete(&Position::key(&owner));

            let referral_key = ReferralAccount::key(&owner);
            let forfeited_referral = txn
                .get::<ReferralAccount>(&referral_key)?
                .map(|account| account.earnings)
                .unwrap_or(0);
            txn.delete(&referral_key);

            let mut batch = TransferBatch::new();
            batch
                .push(Party::Vault, Party::Account(owner), split.net)
                .push(
                    Party::Vault,
                    Party::Account(mine.fee_collector),
                    split.fee,
                );
            self.settle(&batch)?;

            let receipt = TerminationReceipt {
                owner,
                principal: position.total_locked,
                dev_fee: split.fee,
                amount_out: split.net,
                forfeited_interest: position.accrued_interest,
                forfeited_referral,
            };

            tracing::info!(
                owner = %owner,
                principal = receipt.principal,
                amount_out = receipt.amount_out,
                forfeited_interest = receipt.forfeited_interest,
                forfeited_referral,
                "staking terminated"
            );
            self.emit(
                now,
                [MineEvent::StakingTerminated {
                    owner,
                    principal: receipt.principal,
                    dev_fee: receipt.dev_fee,
                    amount_out: receipt.amount_out,
                    forfeited_interest: receipt.forfeited_interest,
                    forfeited_referral,
                }],
            );
            Ok(receipt)
        })
    }

    // === Referral ===

    pub fn withdraw_referral_rewards(&self, referrer: AccountId) -> Result<ReferralPayout> {
        self.store.transaction(|txn| -> Result<ReferralPayout> {
            let now = self.clock.now();
            let mine = load_mine(txn)?;
            let mut account: ReferralAccount = require(
                txn,
                &ReferralAccount::key(&referrer),
                Entity::Referral(referrer),
            )?;

            let earnings = account.take_earnings()?;
            let split = split_fee(earnings, mine.dev_fee_bps)?;
            txn.put(&account)?;

            let mut batch = TransferBatch::new();
            batch
                .push(Party::Vault, Party::Account(referrer), split.net)
                .push(
                    Party::Vault,
                    Party::Account(mine.fee_collector),
                    split.fee,
                );
            self.settle(&batch)?;

            tracing::info!(
                referrer = %referrer,
                earnings,
                amount_out = split.net,
                "referral rewards withdrawn"
            );
            self.emit(
                now,
                [MineEvent::ReferralWithdrawn {
                    referrer,
                    earnings,
                    dev_fee: split.fee,
                    amount_out: split.net,
                }],
            );

            Ok(ReferralPayout {
                earnings,
                dev_fee: split.fee,
                amount_out: split.net,
                count: account.count,
            })
        })
    }

    // === Queries ===

    pub fn mine(&self) -> Result<MineConfig> {
        self.store.view(load_mine)
    }

    pub fn tier(&self, nonce: TierNonce) -> Result<TierConfig> {
        self.store.view(|txn| load_tier(txn, nonce))
    }

    /// Every tier ever added, in nonce order
    pub fn tiers(&self) -> Result<Vec<TierConfig>> {
        self.store.view(|txn| -> Result<Vec<TierConfig>> {
            let mine = load_mine(txn)?;
            (0..mine.current_tier_nonce)
                .map(|nonce| load_tier(txn, nonce))
                .collect()
        })
    }

    pub fn position(&self, owner: &AccountId) -> Result<Position> {
        self.store.view(|txn| load_position(txn, owner))
    }

    pub fn referral(&self, owner: &AccountId) -> Result<ReferralAccount> {
        self.store.view(|txn| {
            require(txn, &ReferralAccount::key(owner), Entity::Referral(*owner))
        })
    }

    pub fn whitelist_grant(&self, beneficiary: &AccountId) -> Result<WhitelistGrant> {
        self.store.view(|txn| {
            require(
                txn,
                &WhitelistGrant::key(beneficiary),
                Entity::WhitelistGrant(*beneficiary),
            )
        })
    }

    pub fn is_matured(&self, owner: &AccountId) -> Result<bool> {
        self.store.view(|txn| -> Result<bool> {
            let position = load_position(txn, owner)?;
            let tier = load_tier(txn, position.tier)?;
            Ok(position.is_matured(&tier, self.clock.now()))
        })
    }

    /// What `claim_interest` would pay right now
    pub fn pending_claim(&self, owner: &AccountId) -> Result<ClaimReceipt> {
        self.store.view(|txn| -> Result<ClaimReceipt> {
            let mine = load_mine(txn)?;
            let position = load_position(txn, owner)?;
            let tier = load_tier(txn, position.tier)?;
            position.claim_breakdown(&tier, &mine, self.clock.now())
        })
    }
}
