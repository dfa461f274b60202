//! Property-based tests over random operation sequences.
//!
//! Every case interleaves ingests, ticks and settings changes on a
//! monotonic clock and checks the globe's bounds after each step.

use std::collections::HashMap;

use beacon_core::types::{GeoKey, MarkerCommand};
use beacon_globe::GlobeState;
use beacon_tests::helpers::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Ingest { spot: u32, suspicious: bool, gap_ms: u64 },
    Tick { gap_ms: u64 },
    SetCapacity(usize),
    SetFadeWindow(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0u32..40, any::<bool>(), 0u64..5_000)
            .prop_map(|(spot, suspicious, gap_ms)| Op::Ingest { spot, suspicious, gap_ms }),
        3 => (0u64..20_000).prop_map(|gap_ms| Op::Tick { gap_ms }),
        1 => (0usize..30).prop_map(Op::SetCapacity),
        1 => (0u64..120).prop_map(Op::SetFadeWindow),
    ]
}

/// Apply `op`, advancing `now`, and return the emitted commands.
fn apply(g: &mut GlobeState, now: &mut u64, op: &Op) -> Vec<MarkerCommand> {
    match *op {
        Op::Ingest { spot: i, suspicious, gap_ms } => {
            *now += gap_ms;
            let (lat, lon) = spot(i);
            let e = beacon_core::types::EventRecord::new(lat, lon, suspicious);
            g.ingest(e, *now).unwrap()
        }
        Op::Tick { gap_ms } => {
            *now += gap_ms;
            g.tick(*now)
        }
        Op::SetCapacity(n) => g.set_capacity(n),
        Op::SetFadeWindow(secs) => g.set_fade_window(secs, *now),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn live_set_never_exceeds_capacity(
        capacity in 1usize..20,
        ops in prop::collection::vec(op(), 1..120),
    ) {
        let mut g = globe(capacity, 30);
        let mut now = 0;
        for op in &ops {
            apply(&mut g, &mut now, op);
            prop_assert!(g.live().len() <= g.capacity());
            prop_assert!(g.check_invariants().is_ok());
        }
    }

    #[test]
    fn hits_never_decrease(ops in prop::collection::vec(op(), 1..120)) {
        let mut g = globe(8, 20);
        let mut now = 0;
        let mut last: HashMap<GeoKey, u64> = HashMap::new();
        for op in &ops {
            apply(&mut g, &mut now, op);
            for m in g.snapshot() {
                let ledger_hits = g.history().get(&m.key).map(|p| p.hits);
                prop_assert_eq!(ledger_hits, Some(m.hits), "live hits mirror the ledger");
                if let Some(prev) = last.get(&m.key) {
                    prop_assert!(m.hits >= *prev);
                }
                last.insert(m.key, m.hits);
            }
        }
    }

    #[test]
    fn every_live_marker_is_within_the_fade_window(
        ops in prop::collection::vec(op(), 1..120),
    ) {
        let mut g = globe(10, 30);
        let mut now = 0;
        for op in &ops {
            apply(&mut g, &mut now, op);
            if matches!(op, Op::Tick { .. } | Op::SetFadeWindow(_)) {
                let window_ms = g.fade_window_secs() * SEC;
                for m in g.snapshot() {
                    prop_assert!(m.age(now) < window_ms);
                    prop_assert!(m.intensity > 0.0 && m.intensity <= 1.0);
                }
            }
        }
    }

    #[test]
    fn evictions_name_markers_that_were_live(
        ops in prop::collection::vec(op(), 1..120),
    ) {
        let mut g = globe(5, 15);
        let mut now = 0;
        for op in &ops {
            let before: Vec<GeoKey> = live_keys(&g);
            let cmds = apply(&mut g, &mut now, op);
            for k in evicted(&cmds) {
                let created_now = cmds.iter().any(|c| {
                    matches!(c, MarkerCommand::Create { key, .. } if *key == k)
                });
                prop_assert!(before.contains(&k) || created_now);
                prop_assert!(!g.live().contains(&k));
            }
        }
    }
}
