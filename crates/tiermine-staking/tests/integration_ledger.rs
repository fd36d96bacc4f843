//! Integration tests for the tiermine staking ledger
//!
//! These drive the `TierMine` engine end to end against an in-memory bank and a
//! manual clock: deposits, top-ups, compounding, claims, referrals, whitelist
//! grants, termination and rollback on failed transfers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tiermine_core::{projected_interest, AccountId, Amount, Bps, Entity, ManualClock, MineError, Timestamp};
use tiermine_staking::{
    FundsTransfer, InMemoryBank, MineParams, MineUpdate, Party, TierMine, TierParams, TierUpdate,
    TransferBatch, TransferError,
};
use tiermine_storage::LedgerStore;

const UNIT: Amount = 1_000_000_000;
const DAY: u64 = 86_400;
const T0: Timestamp = 1_700_000_000;

const ADMIN: AccountId = AccountId::new([0xAA; 32]);
const FEE_COLLECTOR: AccountId = AccountId::new([0xFE; 32]);
const PENALTY_COLLECTOR: AccountId = AccountId::new([0xEE; 32]);

fn user(n: u8) -> AccountId {
    AccountId::new([n; 32])
}

/// Bank that can be switched to reject every batch
struct SwitchableBank {
    inner: InMemoryBank,
    frozen: AtomicBool,
}

impl FundsTransfer for SwitchableBank {
    fn execute(&self, batch: &TransferBatch) -> Result<(), TransferError> {
        if self.frozen.load(Ordering::SeqCst) {
            return Err(TransferError::Rejected("bank frozen".into()));
        }
        self.inner.execute(batch)
    }
}

struct Harness {
    engine: TierMine,
    bank: Arc<SwitchableBank>,
    clock: Arc<ManualClock>,
}

impl Harness {
    /// Mine with the given dev fee, 40% early penalty, 10% referral reward.
    /// Tier 0: 4000% APY, 1 unit minimum, 1 day lock.
    /// Tier 1: 8000% APY, 5 unit minimum, 2 day lock.
    fn new(dev_fee_bps: Bps) -> Self {
        let bank = Arc::new(SwitchableBank {
            inner: InMemoryBank::new(),
            frozen: AtomicBool::new(false),
        });
        let clock = Arc::new(ManualClock::new(T0));
        let engine = TierMine::new(Arc::new(LedgerStore::new()), bank.clone(), clock.clone());

        engine
            .initialize(
                ADMIN,
                MineParams {
                    token_mint: AccountId::new([0x99; 32]),
                    fee_collector: FEE_COLLECTOR,
                    penalty_collector: PENALTY_COLLECTOR,
                    dev_fee_bps,
                    early_withdrawal_fee_bps: 4_000,
                    referral_reward_bps: 1_000,
                },
            )
            .unwrap();
        engine
            .add_tier(
                ADMIN,
                TierParams {
                    apy_bps: 400_000,
                    minimum_token_amount: UNIT,
                    lock_duration_secs: DAY,
                },
            )
            .unwrap();
        engine
            .add_tier(
                ADMIN,
                TierParams {
                    apy_bps: 800_000,
                    minimum_token_amount: 5 * UNIT,
                    lock_duration_secs: 2 * DAY,
                },
            )
            .unwrap();

        Self { engine, bank, clock }
    }

    fn fund(&self, party: Party, amount: Amount) {
        self.bank.inner.credit(party, amount).unwrap();
    }

    fn balance(&self, party: Party) -> Amount {
        self.bank.inner.balance(&party)
    }

    fn freeze(&self, frozen: bool) {
        self.bank.frozen.store(frozen, Ordering::SeqCst);
    }
}

mod deposit_tests {
    use super::*;

    #[test]
    fn test_reference_deposit() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), 10 * UNIT);

        let receipt = h.engine.initialize_staking(user(1), 0, 10 * UNIT).unwrap();

        assert_eq!(receipt.dev_fee, 500_000_000);
        assert_eq!(receipt.net_principal, 9_500_000_000);
        assert_eq!(receipt.accrued_interest, 1_041_095_890);

        let position = h.engine.position(&user(1)).unwrap();
        assert_eq!(position.total_locked, 9_500_000_000);
        assert_eq!(position.accrued_interest, 1_041_095_890);
        assert_eq!(position.lock_timestamp, T0);
        assert!(!position.is_whitelisted);

        assert_eq!(h.engine.tier(0).unwrap().total_locked, 9_500_000_000);
        assert_eq!(h.balance(Party::Vault), 9_500_000_000);
        assert_eq!(h.balance(Party::Account(FEE_COLLECTOR)), 500_000_000);
        assert_eq!(h.balance(Party::Account(user(1))), 0);
    }

    #[test]
    fn test_below_minimum() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), 10 * UNIT);

        assert_eq!(
            h.engine.initialize_staking(user(1), 1, 4 * UNIT),
            Err(MineError::BelowMinimum {
                amount: 4 * UNIT,
                minimum: 5 * UNIT
            })
        );
        assert!(h.engine.position(&user(1)).is_err());
    }

    #[test]
    fn test_insufficient_funds_rolls_back() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), UNIT);

        assert!(matches!(
            h.engine.initialize_staking(user(1), 0, 2 * UNIT),
            Err(MineError::Transfer(_))
        ));
        assert_eq!(
            h.engine.position(&user(1)),
            Err(MineError::NotFound(Entity::Position(user(1))))
        );
        assert_eq!(h.engine.tier(0).unwrap().total_locked, 0);
        assert_eq!(h.balance(Party::Account(user(1))), UNIT);
    }

    #[test]
    fn test_top_up_settles_then_reprojects() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), 20 * UNIT);
        h.engine.initialize_staking(user(1), 0, 10 * UNIT).unwrap();

        h.clock.advance(DAY / 4);
        let receipt = h.engine.increase_stake(user(1), 10 * UNIT).unwrap();

        let settled = projected_interest(9_500_000_000, 400_000, DAY / 4).unwrap();
        let projected = projected_interest(19_000_000_000, 400_000, DAY).unwrap();
        assert_eq!(receipt.settled_interest, settled);
        assert_eq!(receipt.net_amount, 9_500_000_000);

        let position = h.engine.position(&user(1)).unwrap();
        assert_eq!(position.total_locked, 19_000_000_000);
        assert_eq!(position.accrued_interest, settled + projected);
        assert_eq!(position.lock_timestamp, T0 + (DAY / 4) as i64);
        assert_eq!(h.engine.tier(0).unwrap().total_locked, 19_000_000_000);
    }

    #[test]
    fn test_top_up_without_position() {
        let h = Harness::new(500);
        assert_eq!(
            h.engine.increase_stake(user(1), UNIT),
            Err(MineError::NotFound(Entity::Position(user(1))))
        );
    }
}

mod interest_tests {
    use super::*;

    #[test]
    fn test_compound_then_claim_uses_new_principal() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), 10 * UNIT);
        h.engine.initialize_staking(user(1), 0, 10 * UNIT).unwrap();

        assert!(matches!(
            h.engine.compound(user(1)),
            Err(MineError::LockNotMatured { .. })
        ));

        h.clock.advance(DAY);
        let compound = h.engine.compound(user(1)).unwrap();
        assert_eq!(compound.compounded, 1_041_095_890);
        assert_eq!(compound.total_locked, 9_500_000_000 + 1_041_095_890);
        assert_eq!(
            h.engine.tier(0).unwrap().total_locked,
            9_500_000_000 + 1_041_095_890
        );

        let claim = h.engine.claim_interest(user(1)).unwrap();
        assert_eq!(
            claim.interest,
            projected_interest(9_500_000_000 + 1_041_095_890, 400_000, DAY).unwrap()
        );
        // the compound restarted the lock
        assert!(claim.early);
    }

    #[test]
    fn test_early_claim_pays_penalty() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), 10 * UNIT);
        h.engine.initialize_staking(user(1), 0, 10 * UNIT).unwrap();
        h.clock.advance(DAY - 1);

        let claim = h.engine.claim_interest(user(1)).unwrap();

        assert!(claim.early);
        assert!(claim.penalty_fee > 0);
        assert_eq!(claim.interest, 1_041_095_890);
        assert_eq!(claim.dev_fee, 1_041_095_890 * 500 / 10_000);
        assert_eq!(claim.penalty_fee, 1_041_095_890 * 4_000 / 10_000);
        assert_eq!(h.balance(Party::Account(user(1))), claim.amount_out);
        assert_eq!(h.balance(Party::Account(PENALTY_COLLECTOR)), claim.penalty_fee);
        assert_eq!(
            h.balance(Party::Account(FEE_COLLECTOR)),
            500_000_000 + claim.dev_fee
        );
        assert_eq!(h.balance(Party::Vault), 9_500_000_000 - claim.interest);
    }

    #[test]
    fn test_matured_claim_has_no_penalty() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), 10 * UNIT);
        h.engine.initialize_staking(user(1), 0, 10 * UNIT).unwrap();
        h.clock.advance(DAY);

        assert!(h.engine.is_matured(&user(1)).unwrap());
        let claim = h.engine.claim_interest(user(1)).unwrap();

        assert!(!claim.early);
        assert_eq!(claim.penalty_fee, 0);
        assert_eq!(claim.amount_out, claim.interest - claim.dev_fee);

        let position = h.engine.position(&user(1)).unwrap();
        assert_eq!(position.lock_timestamp, T0 + DAY as i64);
        assert_eq!(position.accrued_interest, 1_041_095_890);
        assert!(!h.engine.is_matured(&user(1)).unwrap());
    }

    #[test]
    fn test_tier_update_leaves_open_projection() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), 10 * UNIT);
        h.engine.initialize_staking(user(1), 0, 10 * UNIT).unwrap();

        h.engine
            .update_tier(
                ADMIN,
                0,
                TierUpdate {
                    apy_bps: Some(800_000),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(
            h.engine.position(&user(1)).unwrap().accrued_interest,
            1_041_095_890
        );
        h.clock.advance(DAY);
        let compound = h.engine.compound(user(1)).unwrap();
        assert_eq!(compound.compounded, 1_041_095_890);
        assert_eq!(
            compound.accrued_interest,
            projected_interest(compound.total_locked, 800_000, DAY).unwrap()
        );
    }
}

mod switch_tests {
    use super::*;

    #[test]
    fn test_inactive_mine_blocks_openings_only() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), 20 * UNIT);
        h.fund(Party::Account(user(2)), 20 * UNIT);
        h.engine.initialize_staking(user(1), 0, 10 * UNIT).unwrap();

        h.engine
            .update_mine(
                ADMIN,
                MineUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(
            h.engine.initialize_staking(user(2), 0, 10 * UNIT),
            Err(MineError::InactiveMine)
        );
        assert!(h.engine.increase_stake(user(1), UNIT).is_ok());
        assert!(h.engine.claim_interest(user(1)).is_ok());
    }

    #[test]
    fn test_inactive_tier_blocks_deposits() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), 20 * UNIT);
        h.fund(Party::Account(user(2)), 20 * UNIT);
        h.engine.initialize_staking(user(1), 0, 10 * UNIT).unwrap();

        h.engine
            .update_tier(
                ADMIN,
                0,
                TierUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(
            h.engine.initialize_staking(user(2), 0, 10 * UNIT),
            Err(MineError::InactiveTier(0))
        );
        assert_eq!(
            h.engine.increase_stake(user(1), UNIT),
            Err(MineError::InactiveTier(0))
        );

        h.clock.advance(DAY);
        assert!(h.engine.compound(user(1)).is_ok());
        assert!(h.engine.claim_interest(user(1)).is_ok());
    }

    #[test]
    fn test_admin_operations_reject_others() {
        let h = Harness::new(500);
        let intruder = user(7);
        let unauthorized = Err(MineError::Unauthorized { signer: intruder });

        assert_eq!(
            h.engine.update_mine(intruder, MineUpdate::default()).map(|_| ()),
            unauthorized
        );
        assert_eq!(
            h.engine
                .add_tier(
                    intruder,
                    TierParams {
                        apy_bps: 1,
                        minimum_token_amount: 1,
                        lock_duration_secs: 1,
                    },
                )
                .map(|_| ()),
            unauthorized
        );
        assert_eq!(
            h.engine
                .update_tier(intruder, 0, TierUpdate::default())
                .map(|_| ()),
            unauthorized
        );
        assert_eq!(
            h.engine
                .whitelist_account(intruder, user(1), 0, T0 + 10)
                .map(|_| ()),
            unauthorized
        );
        assert_eq!(
            h.engine.terminate_staking(intruder, user(1)).map(|_| ()),
            unauthorized
        );
        assert_eq!(h.engine.mine().unwrap().current_tier_nonce, 2);
    }

    #[test]
    fn test_invalid_fee_rate_update() {
        let h = Harness::new(500);
        assert_eq!(
            h.engine
                .update_mine(
                    ADMIN,
                    MineUpdate {
                        early_withdrawal_fee_bps: Some(10_001),
                        ..Default::default()
                    },
                )
                .map(|_| ()),
            Err(MineError::InvalidFeeRate(10_001))
        );
        assert_eq!(h.engine.mine().unwrap().early_withdrawal_fee_bps, 4_000);
    }
}

mod referral_tests {
    use super::*;

    #[test]
    fn test_referral_earnings_accumulate_and_withdraw() {
        let h = Harness::new(500);
        let referrer = user(1);
        h.fund(Party::Account(referrer), 10 * UNIT);
        h.fund(Party::Account(user(2)), 10 * UNIT);
        h.fund(Party::Account(user(3)), 3 * UNIT);
        h.engine.initialize_staking(referrer, 0, 10 * UNIT).unwrap();

        let a = h
            .engine
            .initialize_staking_with_referrer(user(2), 0, 10 * UNIT, referrer)
            .unwrap();
        let b = h
            .engine
            .initialize_staking_with_referrer(user(3), 0, 3 * UNIT, referrer)
            .unwrap();

        let expected = a.net_principal * 1_000 / 10_000 + b.net_principal * 1_000 / 10_000;
        assert_eq!(a.referral_bonus, Some((referrer, a.net_principal / 10)));

        let account = h.engine.referral(&referrer).unwrap();
        assert_eq!(account.earnings, expected);
        assert_eq!(account.count, 2);

        let before = h.balance(Party::Account(referrer));
        let payout = h.engine.withdraw_referral_rewards(referrer).unwrap();
        assert_eq!(payout.earnings, expected);
        assert_eq!(payout.dev_fee, expected * 500 / 10_000);
        assert_eq!(payout.count, 2);
        assert_eq!(
            h.balance(Party::Account(referrer)),
            before + payout.amount_out
        );

        let account = h.engine.referral(&referrer).unwrap();
        assert_eq!(account.earnings, 0);
        assert_eq!(account.count, 2);
        assert_eq!(
            h.engine.withdraw_referral_rewards(referrer),
            Err(MineError::NothingToWithdraw)
        );
    }

    #[test]
    fn test_referrer_must_hold_position() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(2)), 10 * UNIT);

        assert_eq!(
            h.engine
                .initialize_staking_with_referrer(user(2), 0, 10 * UNIT, user(1)),
            Err(MineError::NotFound(Entity::Position(user(1))))
        );
    }

    #[test]
    fn test_self_referral_rejected() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), 10 * UNIT);

        assert_eq!(
            h.engine
                .initialize_staking_with_referrer(user(1), 0, 10 * UNIT, user(1)),
            Err(MineError::InvalidReferrer(user(1)))
        );
    }

    #[test]
    fn test_withdraw_without_account() {
        let h = Harness::new(500);
        assert_eq!(
            h.engine.withdraw_referral_rewards(user(4)),
            Err(MineError::NotFound(Entity::Referral(user(4))))
        );
    }
}

mod whitelist_tests {
    use super::*;

    #[test]
    fn test_grant_bypasses_minimum_and_is_consumed() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), UNIT);
        h.engine
            .whitelist_account(ADMIN, user(1), 1, T0 + DAY as i64)
            .unwrap();

        let receipt = h.engine.initialize_whitelist(user(1), 1, UNIT).unwrap();
        assert_eq!(receipt.net_principal, 950_000_000);

        assert!(h.engine.position(&user(1)).unwrap().is_whitelisted);
        assert_eq!(
            h.engine.whitelist_grant(&user(1)),
            Err(MineError::NotFound(Entity::WhitelistGrant(user(1))))
        );
    }

    #[test]
    fn test_expired_grant_is_left_intact() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), UNIT);
        h.engine.whitelist_account(ADMIN, user(1), 1, T0 + 100).unwrap();
        h.clock.advance(101);

        assert_eq!(
            h.engine.initialize_whitelist(user(1), 1, UNIT),
            Err(MineError::GrantExpired { expiry: T0 + 100 })
        );
        assert_eq!(h.engine.whitelist_grant(&user(1)).unwrap().expiry, T0 + 100);
        assert!(h.engine.position(&user(1)).is_err());
    }

    #[test]
    fn test_grant_for_other_tier() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), UNIT);
        h.engine
            .whitelist_account(ADMIN, user(1), 0, T0 + DAY as i64)
            .unwrap();

        assert_eq!(
            h.engine.initialize_whitelist(user(1), 1, UNIT),
            Err(MineError::NotFound(Entity::WhitelistGrant(user(1))))
        );
    }

    #[test]
    fn test_grant_requires_existing_tier() {
        let h = Harness::new(500);
        assert_eq!(
            h.engine
                .whitelist_account(ADMIN, user(1), 9, T0)
                .map(|_| ()),
            Err(MineError::NotFound(Entity::Tier(9)))
        );
    }
}

mod termination_tests {
    use super::*;

    #[test]
    fn test_terminate_removes_position_and_referral() {
        let h = Harness::new(500);
        let referrer = user(1);
        h.fund(Party::Account(referrer), 10 * UNIT);
        h.fund(Party::Account(user(2)), 10 * UNIT);
        h.engine.initialize_staking(referrer, 0, 10 * UNIT).unwrap();
        h.engine
            .initialize_staking_with_referrer(user(2), 0, 10 * UNIT, referrer)
            .unwrap();

        let receipt = h.engine.terminate_staking(ADMIN, referrer).unwrap();

        assert_eq!(receipt.principal, 9_500_000_000);
        assert_eq!(receipt.dev_fee, 475_000_000);
        assert_eq!(receipt.amount_out, 9_025_000_000);
        assert_eq!(receipt.forfeited_interest, 1_041_095_890);
        assert_eq!(receipt.forfeited_referral, 950_000_000);
        assert_eq!(h.balance(Party::Account(referrer)), 9_025_000_000);

        assert_eq!(
            h.engine.position(&referrer),
            Err(MineError::NotFound(Entity::Position(referrer)))
        );
        assert_eq!(
            h.engine.referral(&referrer),
            Err(MineError::NotFound(Entity::Referral(referrer)))
        );
        assert_eq!(h.engine.tier(0).unwrap().total_locked, 9_500_000_000);

        // the owner may open again afterwards
        h.fund(Party::Account(referrer), UNIT);
        assert!(h.engine.initialize_staking(referrer, 0, UNIT).is_ok());
    }

    #[test]
    fn test_terminate_missing_position() {
        let h = Harness::new(500);
        assert_eq!(
            h.engine.terminate_staking(ADMIN, user(3)).map(|_| ()),
            Err(MineError::NotFound(Entity::Position(user(3))))
        );
    }

    #[test]
    fn test_failed_transfer_leaves_position() {
        let h = Harness::new(500);
        h.fund(Party::Account(user(1)), 10 * UNIT);
        h.engine.initialize_staking(user(1), 0, 10 * UNIT).unwrap();
        let before = h.engine.position(&user(1)).unwrap();
        h.engine.drain_events();

        h.freeze(true);
        h.clock.advance(DAY);
        assert!(matches!(
            h.engine.claim_interest(user(1)),
            Err(MineError::Transfer(_))
        ));
        assert!(matches!(
            h.engine.terminate_staking(ADMIN, user(1)),
            Err(MineError::Transfer(_))
        ));

        assert_eq!(h.engine.position(&user(1)).unwrap(), before);
        assert_eq!(h.engine.tier(0).unwrap().total_locked, before.total_locked);
        assert!(h.engine.drain_events().is_empty());

        h.freeze(false);
        assert!(h.engine.claim_interest(user(1)).is_ok());
    }
}

mod concurrency_tests {
    use super::*;

    #[test]
    fn test_two_concurrent_top_ups() {
        let h = Harness::new(0);
        for n in 1..=2 {
            h.fund(Party::Account(user(n)), 2 * UNIT);
            h.engine.initialize_staking(user(n), 0, UNIT).unwrap();
        }
        let before = h.engine.tier(0).unwrap().total_locked;

        std::thread::scope(|s| {
            for n in 1..=2 {
                let engine = &h.engine;
                s.spawn(move || engine.increase_stake(user(n), UNIT).unwrap());
            }
        });

        assert_eq!(h.engine.tier(0).unwrap().total_locked, before + 2 * UNIT);
    }

    #[test]
    fn test_many_concurrent_top_ups() {
        let h = Harness::new(250);
        let users: Vec<AccountId> = (1..=8).map(user).collect();
        for u in &users {
            h.fund(Party::Account(*u), 100 * UNIT);
            h.engine.initialize_staking(*u, 0, UNIT).unwrap();
        }
        let before = h.engine.tier(0).unwrap().total_locked;

        std::thread::scope(|s| {
            for u in &users {
                let engine = &h.engine;
                s.spawn(move || {
                    for _ in 0..25 {
                        engine.increase_stake(*u, UNIT).unwrap();
                    }
                });
            }
        });

        let net = UNIT - UNIT * 250 / 10_000;
        assert_eq!(
            h.engine.tier(0).unwrap().total_locked,
            before + 8 * 25 * net
        );
        let positions: Amount = users
            .iter()
            .map(|u| h.engine.position(u).unwrap().total_locked)
            .sum();
        assert_eq!(h.engine.tier(0).unwrap().total_locked, positions);
    }
}
