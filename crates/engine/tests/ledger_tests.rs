//! CreditLedger Concurrency and Property Tests
//!
//! Validates that balances can never go negative and that no update is lost
//! when debits and credits race on the same user.

use oddjobz_core::{MarketError, UserId};
use oddjobz_engine::CreditLedger;
use oddjobz_storage::MemoryStore;
use proptest::prelude::*;
use rand::Rng;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn user(name: &str) -> UserId {
    UserId::new(name).unwrap()
}

fn setup() -> CreditLedger {
    CreditLedger::new(Arc::new(MemoryStore::new()))
}

// ============================================================================
// Debit Race Tests
// ============================================================================

/// Test: balance 100, two concurrent debit(70) -> exactly one wins, 30 left
#[test]
fn test_two_concurrent_debits_one_wins() {
    for _ in 0..50 {
        let ledger = setup();
        let alice = user("alice");
        ledger.credit(&alice, 100).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = ledger.clone();
                let alice = alice.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.debit(&alice, 70)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let refused = results
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    Err(MarketError::InsufficientCredits {
                        balance: 30,
                        requested: 70
                    })
                )
            })
            .count();

        assert_eq!(wins, 1, "Exactly one debit should succeed");
        assert_eq!(refused, 1, "The loser should see the post-debit balance");
        assert_eq!(ledger.balance(&alice).unwrap(), 30);
    }
}

/// Test: many threads mixing credits and debits -> final balance is the sum
/// of the successful deltas
#[test]
fn test_mixed_concurrent_updates_lose_nothing() {
    let ledger = setup();
    let alice = user("alice");
    ledger.credit(&alice, 500).unwrap();

    let net = Arc::new(AtomicI64::new(500));
    let refusals = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            let alice = alice.clone();
            let net = Arc::clone(&net);
            let refusals = Arc::clone(&refusals);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                barrier.wait();
                for _ in 0..250 {
                    let amount = rng.gen_range(1..=40);
                    if rng.gen_bool(0.4) {
                        ledger.credit(&alice, amount).unwrap();
                        net.fetch_add(amount, Ordering::SeqCst);
                    } else {
                        match ledger.debit(&alice, amount) {
                            Ok(_) => {
                                net.fetch_sub(amount, Ordering::SeqCst);
                            }
                            Err(MarketError::InsufficientCredits { .. }) => {
                                refusals.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let expected = net.load(Ordering::SeqCst);
    assert!(expected >= 0);
    assert_eq!(ledger.balance(&alice).unwrap(), expected as u64);
}

/// Test: transfers in both directions never create or destroy credits
#[test]
fn test_concurrent_transfers_conserve_credits() {
    let ledger = setup();
    let (alice, bob) = (user("alice"), user("bob"));
    ledger.credit(&alice, 300).unwrap();
    ledger.credit(&bob, 300).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [(alice.clone(), bob.clone()), (bob.clone(), alice.clone())]
        .into_iter()
        .map(|(from, to)| {
            let ledger = ledger.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for n in 0..200 {
                    match ledger.transfer(&from, &to, (n % 7) + 1) {
                        Ok(_) | Err(MarketError::InsufficientCredits { .. }) => {}
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let total = ledger.balance(&alice).unwrap() + ledger.balance(&bob).unwrap();
    assert_eq!(total, 600);
}

// ============================================================================
// Property Tests
// ============================================================================

#[derive(Debug, Clone)]
enum LedgerOp {
    Credit(i64),
    Debit(i64),
}

fn ledger_op() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        (1i64..100).prop_map(LedgerOp::Credit),
        (1i64..150).prop_map(LedgerOp::Debit),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Balance tracks a simple model and never goes negative
    #[test]
    fn prop_balance_matches_model(ops in prop::collection::vec(ledger_op(), 1..60)) {
        let ledger = setup();
        let alice = user("alice");
        let mut model: i64 = 0;

        for op in ops {
            match op {
                LedgerOp::Credit(n) => {
                    model += n;
                    prop_assert_eq!(ledger.credit(&alice, n).unwrap(), model as u64);
                }
                LedgerOp::Debit(n) => match ledger.debit(&alice, n) {
                    Ok(after) => {
                        prop_assert!(model >= n);
                        model -= n;
                        prop_assert_eq!(after, model as u64);
                    }
                    Err(MarketError::InsufficientCredits { balance, requested }) => {
                        prop_assert!(model < n);
                        prop_assert_eq!(balance, model as u64);
                        prop_assert_eq!(requested, n as u64);
                    }
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                },
            }
            prop_assert!(model >= 0);
        }
        prop_assert_eq!(ledger.balance(&alice).unwrap(), model as u64);
    }

    /// Every successful movement leaves one history entry whose balance
    /// matches the balance at that point
    #[test]
    fn prop_history_agrees_with_balance(ops in prop::collection::vec(ledger_op(), 1..30)) {
        let ledger = setup();
        let alice = user("alice");
        let mut applied = 0usize;

        for op in ops {
            let result = match op {
                LedgerOp::Credit(n) => ledger.credit(&alice, n),
                LedgerOp::Debit(n) => ledger.debit(&alice, n),
            };
            if result.is_ok() {
                applied += 1;
            }
        }

        let history = ledger.history(&alice, 0, 100).unwrap();
        prop_assert_eq!(history.len(), applied);
        if let Some(latest) = history.first() {
            prop_assert_eq!(latest.balance_after, ledger.balance(&alice).unwrap());
        }
    }
}
