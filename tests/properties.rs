//! Property tests for the chain primitives.
//!
//! 1. **Hash stability**: a block's hash depends on its frame only, and
//!    any change to the frame changes it.
//! 2. **Canonical encoding**: member order in the source object never
//!    changes the encoded bytes.
//! 3. **Fair start**: the first-player rule is symmetric and depends on
//!    every bit of both seeds.
//! 4. **Signatures**: verify exactly the signed frame under the signing key.
//! 5. **Linkage**: any legal game yields a chain where each block names
//!    the hash of its predecessor.

use kettu::chain::{hash_block, sign_frame, verify_frame, verify_links, Block, Frame, Ledger, SeedReveal};
use kettu::core::canonical::canonical_json;
use kettu::core::rng::derive_first_player;
use kettu::core::{KeyPair, Party};
use kettu::game::Winner;
use proptest::prelude::*;
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Generators
// ─────────────────────────────────────────────────────────────────────────────

fn arb_bytes32() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

fn arb_hex32() -> impl Strategy<Value = String> {
    arb_bytes32().prop_map(hex::encode)
}

fn arb_party() -> impl Strategy<Value = Party> {
    prop_oneof![Just(Party::Host), Just(Party::Guest)]
}

fn arb_winner() -> impl Strategy<Value = Winner> {
    prop_oneof![Just(Winner::Fox), Just(Winner::Rabbit), Just(Winner::Draw)]
}

fn arb_frame() -> impl Strategy<Value = Frame> {
    prop_oneof![
        (
            arb_party(),
            arb_hex32(),
            arb_hex32(),
            proptest::option::of((arb_hex32(), arb_hex32())),
        )
            .prop_map(|(first, commit, random, peer)| {
                Frame::genesis(
                    first,
                    SeedReveal::new(commit, random),
                    peer.map(|(c, r)| SeedReveal::new(c, r)),
                )
            }),
        (any::<u64>(), 0u8..9, arb_party(), arb_hex32())
            .prop_map(|(index, cell, player, prev)| Frame::new_move(index, cell, player, prev)),
        (arb_hex32(), arb_party(), arb_winner())
            .prop_map(|(prev, starter, winner)| Frame::score(prev, starter, winner)),
    ]
}

fn arb_signatures() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[0-9a-f]{128}", 0..3)
}

/// A flat JSON object with distinct keys.
fn arb_object() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map(
        "[a-z_]{1,8}",
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            "[ -~]{0,12}".prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            Just(Value::Null),
        ],
        1..8,
    )
    .prop_map(|map| map.into_iter().collect())
}

/// Cells 0-8 in random order.
fn arb_cell_order() -> impl Strategy<Value = Vec<u8>> {
    Just((0u8..9).collect::<Vec<_>>()).prop_shuffle()
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn prop_hash_ignores_signatures(frame in arb_frame(), a in arb_signatures(), b in arb_signatures()) {
        let left = Block::new(frame.clone(), a);
        let right = Block::new(frame, b);
        prop_assert_eq!(hash_block(&left), hash_block(&right));
    }

    #[test]
    fn prop_move_fields_all_hashed(
        index in any::<u64>(),
        cell in 0u8..9,
        player in arb_party(),
        prev in arb_hex32(),
        other_prev in arb_hex32(),
    ) {
        let base = Frame::new_move(index, cell, player, prev.clone());
        let variants = [
            Frame::new_move(index.wrapping_add(1), cell, player, prev.clone()),
            Frame::new_move(index, (cell + 1) % 9, player, prev.clone()),
            Frame::new_move(index, cell, player.other(), prev.clone()),
        ];
        for variant in &variants {
            prop_assert_ne!(base.hash(), variant.hash());
        }
        if other_prev != prev {
            prop_assert_ne!(base.hash(), Frame::new_move(index, cell, player, other_prev).hash());
        }
    }

    #[test]
    fn prop_score_fields_all_hashed(prev in arb_hex32(), starter in arb_party(), winner in arb_winner()) {
        let base = Frame::score(prev.clone(), starter, winner);
        prop_assert_ne!(base.hash(), Frame::score(prev.clone(), starter.other(), winner).hash());

        let other_winner = match winner {
            Winner::Fox => Winner::Rabbit,
            Winner::Rabbit => Winner::Draw,
            Winner::Draw => Winner::Fox,
        };
        prop_assert_ne!(base.hash(), Frame::score(prev, starter, other_winner).hash());
    }

    #[test]
    fn prop_canonical_ignores_member_order(pairs in arb_object(), seed in any::<u64>()) {
        let forward: Map<String, Value> = pairs.iter().cloned().collect();

        // Deterministic reshuffle of the same members.
        let mut shuffled = pairs.clone();
        let len = shuffled.len();
        for i in 0..len {
            let j = (seed.wrapping_mul(i as u64 + 1) % len as u64) as usize;
            shuffled.swap(i, j);
        }
        let reordered: Map<String, Value> = shuffled.into_iter().collect();

        let nested_a = serde_json::json!({ "outer": Value::Object(forward.clone()), "z": 1 });
        let nested_b = serde_json::json!({ "z": 1, "outer": Value::Object(reordered.clone()) });

        prop_assert_eq!(
            canonical_json(&Value::Object(forward)),
            canonical_json(&Value::Object(reordered))
        );
        prop_assert_eq!(canonical_json(&nested_a), canonical_json(&nested_b));
    }

    #[test]
    fn prop_canonical_is_valid_json(pairs in arb_object()) {
        let value = Value::Object(pairs.into_iter().collect());
        let text = canonical_json(&value);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(parsed, value);
    }

    #[test]
    fn prop_first_player_symmetric(a in arb_bytes32(), b in arb_bytes32()) {
        prop_assert_eq!(derive_first_player(&a, &b), derive_first_player(&b, &a));
    }

    #[test]
    fn prop_first_player_bit_flip(
        a in arb_bytes32(),
        b in arb_bytes32(),
        byte in 0usize..32,
        bit in 0u8..8,
        flip_first in any::<bool>(),
    ) {
        let before = derive_first_player(&a, &b);
        let (mut a2, mut b2) = (a, b);
        if flip_first {
            a2[byte] ^= 1 << bit;
        } else {
            b2[byte] ^= 1 << bit;
        }
        prop_assert_eq!(derive_first_player(&a2, &b2), before.other());
    }

    #[test]
    fn prop_sign_verify(
        secret in arb_bytes32(),
        other_secret in arb_bytes32(),
        frame in arb_frame(),
        other_frame in arb_frame(),
    ) {
        let keys = KeyPair::from_secret(&secret);
        let signature = sign_frame(&frame, &keys);

        prop_assert!(verify_frame(&frame, &signature, &keys.public()));
        if other_frame != frame {
            prop_assert!(!verify_frame(&other_frame, &signature, &keys.public()));
        }
        if other_secret != secret {
            let stranger = KeyPair::from_secret(&other_secret);
            prop_assert!(!verify_frame(&frame, &signature, &stranger.public()));
        }
    }

    #[test]
    fn prop_malformed_signatures_rejected(secret in arb_bytes32(), frame in arb_frame(), junk in "[ -~]{0,140}") {
        let keys = KeyPair::from_secret(&secret);
        let real = sign_frame(&frame, &keys);
        if junk != real {
            prop_assert!(!verify_frame(&frame, &junk, &keys.public()));
        }
    }

    #[test]
    fn prop_legal_games_link(order in arb_cell_order(), seed in arb_bytes32(), first in arb_party()) {
        let keys = KeyPair::from_secret(&seed);
        let genesis = Block::single(
            Frame::genesis(first, SeedReveal::new(hex::encode(seed), hex::encode(seed)), None),
            &keys,
        );
        let mut ledger = Ledger::new(genesis).unwrap();

        let mut played = 0u64;
        for cell in order {
            let (_, status) = ledger.record_local_move(cell, &keys).unwrap();
            played += 1;
            if status.is_over() {
                let frame = ledger.pending_score_frame().unwrap();
                ledger.commit_score(Block::single(frame, &keys)).unwrap();
                break;
            }
        }

        prop_assert!(played >= 5);
        prop_assert_eq!(ledger.next_index(), played);
        prop_assert_eq!(ledger.len() as u64, played + 2);
        prop_assert!(verify_links(ledger.blocks()).is_ok());
        prop_assert!(ledger.round().scored);
    }
}
