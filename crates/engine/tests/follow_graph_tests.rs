//! FollowGraph Symmetry Tests
//!
//! A ∈ followers(B) ⟺ B ∈ following(A), checked after arbitrary operation
//! sequences and after concurrent toggling.

use oddjobz_core::{MarketError, UserId};
use oddjobz_engine::FollowGraph;
use oddjobz_storage::MemoryStore;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;

const NAMES: [&str; 4] = ["alice", "bob", "carol", "dave"];

fn users() -> Vec<UserId> {
    NAMES.iter().map(|n| UserId::new(*n).unwrap()).collect()
}

fn setup() -> FollowGraph {
    FollowGraph::new(Arc::new(MemoryStore::new()))
}

/// Collect every edge as seen from both sides and compare
fn assert_symmetric(graph: &FollowGraph) -> BTreeSet<(UserId, UserId)> {
    let mut from_followers = BTreeSet::new();
    let mut from_following = BTreeSet::new();
    for user in users() {
        for follower in graph.followers(&user).unwrap() {
            from_followers.insert((follower, user.clone()));
        }
        for followee in graph.following(&user).unwrap() {
            from_following.insert((user.clone(), followee));
        }
    }
    assert_eq!(from_followers, from_following, "follow graph lost symmetry");
    from_followers
}

// ============================================================================
// Property Tests
// ============================================================================

#[derive(Debug, Clone)]
enum EdgeOp {
    Follow(usize, usize),
    Unfollow(usize, usize),
    Toggle(usize, usize),
}

fn edge_op() -> impl Strategy<Value = EdgeOp> {
    let pair = (0..NAMES.len(), 0..NAMES.len());
    prop_oneof![
        pair.clone().prop_map(|(a, b)| EdgeOp::Follow(a, b)),
        pair.clone().prop_map(|(a, b)| EdgeOp::Unfollow(a, b)),
        pair.prop_map(|(a, b)| EdgeOp::Toggle(a, b)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The stored graph equals a set-of-edges model after every step
    #[test]
    fn prop_graph_matches_model(ops in prop::collection::vec(edge_op(), 1..40)) {
        let graph = setup();
        let people = users();
        let mut model: BTreeSet<(UserId, UserId)> = BTreeSet::new();

        for op in ops {
            let (a, b, result) = match op {
                EdgeOp::Follow(a, b) => (a, b, graph.follow(&people[a], &people[b])),
                EdgeOp::Unfollow(a, b) => (a, b, graph.unfollow(&people[a], &people[b])),
                EdgeOp::Toggle(a, b) => (a, b, graph.toggle(&people[a], &people[b]).map(|_| ())),
            };
            if a == b {
                prop_assert!(matches!(result, Err(MarketError::SelfFollow(_))));
                continue;
            }
            prop_assert!(result.is_ok());

            let edge = (people[a].clone(), people[b].clone());
            match op {
                EdgeOp::Follow(..) => {
                    model.insert(edge);
                }
                EdgeOp::Unfollow(..) => {
                    model.remove(&edge);
                }
                EdgeOp::Toggle(..) => {
                    if !model.remove(&edge) {
                        model.insert(edge);
                    }
                }
            }

            prop_assert_eq!(assert_symmetric(&graph), model.clone());
        }
    }

    /// Following twice equals following once; unfollowing twice equals once
    #[test]
    fn prop_follow_idempotent(a in 0..NAMES.len(), b in 0..NAMES.len(), times in 1usize..5) {
        prop_assume!(a != b);
        let graph = setup();
        let people = users();

        for _ in 0..times {
            graph.follow(&people[a], &people[b]).unwrap();
        }
        prop_assert_eq!(graph.counts(&people[b]).unwrap().followers, 1);
        prop_assert_eq!(graph.counts(&people[a]).unwrap().following, 1);

        for _ in 0..times {
            graph.unfollow(&people[a], &people[b]).unwrap();
        }
        prop_assert!(graph.followers(&people[b]).unwrap().is_empty());
        prop_assert!(graph.following(&people[a]).unwrap().is_empty());
    }
}

// ============================================================================
// Concurrency Tests
// ============================================================================

/// Test: threads toggling overlapping edges never break symmetry
#[test]
fn test_concurrent_toggles_keep_symmetry() {
    let graph = setup();
    let people = users();
    let barrier = Arc::new(Barrier::new(people.len()));

    let handles: Vec<_> = (0..people.len())
        .map(|i| {
            let graph = graph.clone();
            let people = people.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..200 {
                    let a = &people[(i + round) % people.len()];
                    let b = &people[(i + round + 1) % people.len()];
                    graph.toggle(a, b).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let edges = assert_symmetric(&graph);
    for (a, b) in edges {
        assert!(graph.is_following(&a, &b).unwrap());
    }
}

/// Test: concurrent follows of one user all land
#[test]
fn test_concurrent_follows_of_one_user() {
    let graph = setup();
    let star = UserId::new("star").unwrap();
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let graph = graph.clone();
            let star = star.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let fan = UserId::new(format!("fan{}", i)).unwrap();
                barrier.wait();
                graph.follow(&fan, &star).unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(graph.followers(&star).unwrap().len(), 16);
    assert_eq!(graph.counts(&star).unwrap().followers, 16);
}
