//! waysim Headless Simulation Harness
//!
//! Validates navigation and walk behavior end to end on the demo world.
//! Runs entirely in-process, no rendering, no networking.
//!
//! Usage:
//!   cargo run -p waysim-simtest
//!   cargo run -p waysim-simtest -- --verbose

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use waysim_core::components::{DoorStrategy, WalkId};
use waysim_core::events::{WalkOutcome, WayEvent};
use waysim_core::loader::load_session;
use waysim_core::session::Session;
use waysim_logic::error::NavError;
use waysim_logic::floor_graph::{DoorStatus, FloorGraph, SearchOpts};
use waysim_logic::funnel::{string_pull, PortalPoints};
use waysim_logic::geom::{Rect, Vec2};
use waysim_logic::nav_path::NavMetaKind;
use waysim_logic::route::NavOpts;

// ── Demo world (same JSON any front end would load) ─────────────────────
const WORLD_JSON: &str = include_str!("../../../data/demo_world.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: String) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail,
    }
}

fn demo_session() -> Session {
    load_session(WORLD_JSON).expect("demo world loads")
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== waysim Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. World layout invariants
    results.extend(validate_layout(verbose));

    // 2. Floor graph pathfinding on a synthetic mesh
    results.extend(validate_floor_pathfinding(verbose));

    // 3. Funnel string-pull
    results.extend(validate_funnel(verbose));

    // 4. Global routing across instances
    results.extend(validate_routing(verbose));

    // 5. Walk lifecycle under different tick sizes
    results.extend(validate_walk_ticks(verbose));

    // 6. Door strategies
    results.extend(validate_door_strategies(verbose));

    // 7. Decor contacts
    results.extend(validate_decor(verbose));

    // 8. Random walk soak
    results.extend(validate_soak(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

/// Tick a session until the given walk ends (or give up).
fn run_walk(session: &mut Session, walk_id: WalkId, dt: f32) -> (Vec<WayEvent>, Option<WalkOutcome>) {
    let mut all = Vec::new();
    for _ in 0..5000 {
        session.update(dt);
        let events = session.drain_events();
        let done = events.iter().find_map(|e| match e {
            WayEvent::WalkEnded {
                walk_id: id,
                outcome,
                ..
            } if *id == walk_id => Some(*outcome),
            _ => None,
        });
        all.extend(events);
        if done.is_some() {
            return (all, done);
        }
    }
    (all, None)
}

// ── 1. World layout ─────────────────────────────────────────────────────

fn validate_layout(_verbose: bool) -> Vec<TestResult> {
    println!("--- World Layout ---");
    let mut results = Vec::new();

    let session = demo_session();
    let floors = session.floors();
    results.push(check(
        "layout_floor_count",
        floors.len() == 3,
        format!("{} floor meshes", floors.len()),
    ));

    let mut all_ok = true;
    let mut detail = String::new();
    for (i, floor) in floors.iter().enumerate() {
        if let Err(e) = floor.check_invariants() {
            all_ok = false;
            detail = format!("floor {i}: {e}");
        }
    }
    results.push(check(
        "layout_mesh_invariants",
        all_ok,
        if all_ok { "portal/neighbour invariants hold".into() } else { detail },
    ));

    let graph = session.gm_graph();
    // Adjacent instances pair right hull door with the next left hull door.
    let paired = graph.door(0, 2).adjacent == Some((1, 1))
        && graph.door(1, 2).adjacent == Some((2, 1))
        && graph.door(1, 1).adjacent == Some((0, 2));
    results.push(check(
        "layout_hull_pairing",
        paired,
        "boundary hull doors pair up".into(),
    ));

    let sealed = graph.door(0, 1).sealed && graph.door(2, 2).sealed;
    results.push(check(
        "layout_outer_doors_sealed",
        sealed,
        "outward hull doors sealed".into(),
    ));

    let hit = graph.find_room_containing(&Vec2::new(17.0, 5.0));
    results.push(check(
        "layout_room_lookup",
        hit.map(|r| (r.gm_id, r.room_id)) == Some((1, 1)),
        format!("{hit:?}"),
    ));

    results
}

// ── 2. Floor pathfinding ────────────────────────────────────────────────

fn validate_floor_pathfinding(_verbose: bool) -> Vec<TestResult> {
    println!("--- Floor Pathfinding ---");
    let mut results = Vec::new();

    // 4x1 strip of unit quads.
    let vertices: Vec<Vec2> = (0..=4)
        .flat_map(|x| {
            [
                Vec2::new(x as f32, 0.0),
                Vec2::new(x as f32, 1.0),
            ]
        })
        .collect();
    let mut tris = Vec::new();
    for q in 0..4usize {
        let bl = q * 2;
        // (bl, bl+2) bottom edge, (bl+1, bl+3) top edge
        tris.push([bl, bl + 2, bl + 1]);
        tris.push([bl + 2, bl + 3, bl + 1]);
    }
    let n = tris.len();
    let floor = FloorGraph::from_triangles(vertices, &tris, vec![Some(0); n], vec![vec![]; n]);

    let ok = floor.check_invariants().is_ok();
    results.push(check("floor_strip_invariants", ok, format!("{n} triangles")));

    let src = Vec2::new(0.2, 0.5);
    let dst = Vec2::new(3.8, 0.5);
    match floor.find_path(&src, &dst, &SearchOpts::default()) {
        Ok(path) => {
            let straight = src.distance(&dst);
            results.push(check(
                "floor_straight_corridor",
                (path.length() - straight).abs() < 1e-3,
                format!("pulled {:.3} vs straight {straight:.3}", path.length()),
            ));
            results.push(check(
                "floor_edge_nodes_cover_path",
                path.edge_nodes.len() == path.points.len() - 1,
                format!("{} edges", path.edge_nodes.len()),
            ));
        }
        Err(e) => results.push(check("floor_straight_corridor", false, format!("{e}"))),
    }

    let err = floor
        .find_path(&Vec2::new(50.0, 50.0), &dst, &SearchOpts::default())
        .unwrap_err();
    results.push(check(
        "floor_unreachable_src_typed",
        err == NavError::UnreachableSrc,
        format!("{err:?}"),
    ));

    let hit = floor.locate(&Vec2::new(4.4, 0.5), None, true, 1.0);
    results.push(check(
        "floor_centroid_fallback",
        hit.is_some(),
        format!("{hit:?}"),
    ));
    let miss = floor.locate(&Vec2::new(44.0, 0.5), None, true, 1.0);
    results.push(check(
        "floor_fallback_distance_cap",
        miss.is_none(),
        format!("{miss:?}"),
    ));

    results
}

// ── 3. Funnel ───────────────────────────────────────────────────────────

fn validate_funnel(_verbose: bool) -> Vec<TestResult> {
    println!("--- Funnel ---");
    let mut results = Vec::new();

    let portal = |lx: f32, ly: f32, rx: f32, ry: f32| PortalPoints {
        left: Vec2::new(lx, ly),
        right: Vec2::new(rx, ry),
    };

    let wide = vec![
        portal(1.0, 8.0, 1.0, -8.0),
        portal(2.0, 8.0, 2.0, -8.0),
        portal(3.0, 8.0, 3.0, -8.0),
    ];
    let pulled = string_pull(Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0), &wide);
    results.push(check(
        "funnel_wide_corridor_straight",
        pulled.len() == 2,
        format!("{} points", pulled.len()),
    ));

    let corner = vec![
        portal(1.0, 1.0, 1.0, -1.0),
        portal(2.0, 1.0, 2.0, -1.0),
        portal(2.0, 4.0, 2.0, 1.0),
    ];
    let pulled = string_pull(Vec2::new(0.0, 0.0), Vec2::new(2.5, 5.0), &corner);
    results.push(check(
        "funnel_corner_single_turn",
        pulled.len() == 3 && pulled[1].point == Vec2::new(2.0, 1.0),
        format!("{pulled:?}"),
    ));

    results
}

// ── 4. Global routing ───────────────────────────────────────────────────

fn validate_routing(_verbose: bool) -> Vec<TestResult> {
    println!("--- Global Routing ---");
    let mut results = Vec::new();
    let session = demo_session();

    let count_hulls = |path: &waysim_logic::nav_path::GlobalNavPath| {
        path.nav_metas
            .iter()
            .filter(|m| matches!(m.kind, NavMetaKind::AtDoor { hull: true, .. }))
            .count()
    };

    // Across all three instances: exactly one hull crossing per boundary.
    match session.find_path(&Vec2::new(2.0, 5.0), &Vec2::new(27.0, 5.0), &NavOpts::default()) {
        Ok(path) => {
            results.push(check(
                "route_hull_crossings",
                count_hulls(&path) == 2,
                format!("{} hull crossings", count_hulls(&path)),
            ));
            let gms: Vec<usize> = path.gm_room_ids.iter().map(|(_, r)| r.gm_id).collect();
            results.push(check(
                "route_instances_in_order",
                gms.first() == Some(&0) && gms.last() == Some(&2),
                format!("{gms:?}"),
            ));
            let sofars = path.cumulative_lengths();
            results.push(check(
                "route_lengths_monotone",
                sofars.windows(2).all(|w| w[1] >= w[0]),
                format!("total {:.2}", sofars.last().copied().unwrap_or(0.0)),
            ));
        }
        Err(e) => results.push(check("route_hull_crossings", false, format!("{e}"))),
    }

    // Determinism: byte-for-byte identical paths for identical queries.
    let a = session.find_path(&Vec2::new(2.0, 2.0), &Vec2::new(28.0, 8.0), &NavOpts::default());
    let b = session.find_path(&Vec2::new(2.0, 2.0), &Vec2::new(28.0, 8.0), &NavOpts::default());
    results.push(check(
        "route_deterministic",
        a.is_ok() && a == b,
        "same query, same path".into(),
    ));

    let err = session
        .find_path(&Vec2::new(-20.0, -20.0), &Vec2::new(2.0, 2.0), &NavOpts::default())
        .unwrap_err();
    results.push(check(
        "route_unreachable_typed",
        err == NavError::UnreachableSrc,
        format!("{err:?}"),
    ));

    results
}

// ── 5. Walk ticks ───────────────────────────────────────────────────────

fn validate_walk_ticks(verbose: bool) -> Vec<TestResult> {
    println!("--- Walk Ticks ---");
    let mut results = Vec::new();

    // The same walk must complete and fire metas in order regardless of
    // tick size.
    for dt in [1.0 / 60.0, 0.17, 0.53] {
        let mut session = demo_session();
        let walk_id = session
            .walk_npc("ada", Vec2::new(8.0, 8.0), DoorStrategy::Open, &NavOpts::default())
            .expect("walkable")
            .expect("non-trivial walk");
        let (events, outcome) = run_walk(&mut session, walk_id, dt);

        let indices: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                WayEvent::WayMeta { meta, .. } => Some(meta.index),
                _ => None,
            })
            .collect();
        let ordered = indices.windows(2).all(|w| w[0] <= w[1]);
        let arrived = session
            .pose("ada")
            .map(|p| p.point.distance(&Vec2::new(8.0, 8.0)) < 1e-2)
            .unwrap_or(false);

        if verbose {
            println!("  dt={dt:.3}: {} metas, outcome {outcome:?}", indices.len());
        }
        results.push(check(
            &format!("walk_dt_{dt:.3}"),
            outcome == Some(WalkOutcome::Completed) && ordered && arrived,
            format!("{} metas, outcome {outcome:?}", indices.len()),
        ));
    }

    results
}

// ── 6. Door strategies ──────────────────────────────────────────────────

fn validate_door_strategies(_verbose: bool) -> Vec<TestResult> {
    println!("--- Door Strategies ---");
    let mut results = Vec::new();

    // gm 1's inner door starts closed in the demo world.
    let mut session = demo_session();
    session.spawn_npc("carl", "crew", Vec2::new(12.0, 2.0)).unwrap();
    let id = session
        .walk_npc("carl", Vec2::new(18.0, 8.0), DoorStrategy::None, &NavOpts::default())
        .unwrap()
        .unwrap();
    let (events, outcome) = run_walk(&mut session, id, 0.1);
    let requested = events
        .iter()
        .any(|e| matches!(e, WayEvent::DoorOpenRequested { .. }));
    results.push(check(
        "doors_none_blocks_silently",
        outcome
            == Some(WalkOutcome::Blocked {
                gm_id: 1,
                door_id: 0,
            })
            && !requested,
        format!("{outcome:?}, requested={requested}"),
    ));

    let mut session = demo_session();
    session.spawn_npc("carl", "crew", Vec2::new(12.0, 2.0)).unwrap();
    let id = session
        .walk_npc("carl", Vec2::new(18.0, 8.0), DoorStrategy::Open, &NavOpts::default())
        .unwrap()
        .unwrap();
    let (events, outcome) = run_walk(&mut session, id, 0.1);
    let requested = events
        .iter()
        .any(|e| matches!(e, WayEvent::DoorOpenRequested { forced: false, .. }));
    results.push(check(
        "doors_open_requests_and_passes",
        outcome == Some(WalkOutcome::Completed) && requested,
        format!("{outcome:?}, requested={requested}"),
    ));

    // gm 2's inner door is locked behind the "brig" key. Open keeps going
    // and leaves the lock untouched; SafeOpen refuses to pass it.
    let mut session = demo_session();
    session.spawn_npc("carl", "crew", Vec2::new(22.0, 2.0)).unwrap();
    let id = session
        .walk_npc("carl", Vec2::new(28.0, 8.0), DoorStrategy::Open, &NavOpts::default())
        .unwrap()
        .unwrap();
    let (_, outcome) = run_walk(&mut session, id, 0.1);
    let still_locked = session.door_status(2, 0) == DoorStatus::Locked;
    results.push(check(
        "doors_open_continues_through_locked",
        outcome == Some(WalkOutcome::Completed) && still_locked,
        format!("{outcome:?}, still_locked={still_locked}"),
    ));

    let mut session = demo_session();
    session.spawn_npc("carl", "crew", Vec2::new(22.0, 2.0)).unwrap();
    let id = session
        .walk_npc("carl", Vec2::new(28.0, 8.0), DoorStrategy::SafeOpen, &NavOpts::default())
        .unwrap()
        .unwrap();
    let (_, outcome) = run_walk(&mut session, id, 0.1);
    results.push(check(
        "doors_locked_blocks_safe_open_without_key",
        outcome
            == Some(WalkOutcome::Blocked {
                gm_id: 2,
                door_id: 0,
            }),
        format!("{outcome:?}"),
    ));

    // ForceOpen never blocks.
    let mut session = demo_session();
    session.spawn_npc("carl", "crew", Vec2::new(22.0, 2.0)).unwrap();
    let id = session
        .walk_npc("carl", Vec2::new(28.0, 8.0), DoorStrategy::ForceOpen, &NavOpts::default())
        .unwrap()
        .unwrap();
    let (events, outcome) = run_walk(&mut session, id, 0.1);
    let forced = events
        .iter()
        .any(|e| matches!(e, WayEvent::DoorOpenRequested { forced: true, .. }));
    results.push(check(
        "doors_force_open_never_blocks",
        outcome == Some(WalkOutcome::Completed) && forced,
        format!("{outcome:?}, forced={forced}"),
    ));

    // bob carries the brig key and may pass the locked door.
    let mut session = demo_session();
    let id = session
        .walk_npc("bob", Vec2::new(22.0, 2.0), DoorStrategy::Open, &NavOpts::default())
        .unwrap()
        .unwrap();
    let (_, outcome) = run_walk(&mut session, id, 0.1);
    results.push(check(
        "doors_key_holder_passes",
        outcome == Some(WalkOutcome::Completed),
        format!("{outcome:?}"),
    ));

    results
}

// ── 7. Decor contacts ───────────────────────────────────────────────────

fn validate_decor(_verbose: bool) -> Vec<TestResult> {
    println!("--- Decor ---");
    let mut results = Vec::new();

    let mut session = demo_session();
    session.spawn_npc("dot", "crew", Vec2::new(1.5, 6.0)).unwrap();
    session.drain_events();
    let id = session
        .walk_npc("dot", Vec2::new(4.4, 6.0), DoorStrategy::Open, &NavOpts::default())
        .unwrap()
        .unwrap();
    let (events, outcome) = run_walk(&mut session, id, 0.1);

    let phases: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            WayEvent::WayMeta { meta, .. } => match &meta.kind {
                NavMetaKind::DecorCollide { decor_key, phase } if decor_key == "plant-1" => {
                    Some(format!("{phase:?}"))
                }
                _ => None,
            },
            _ => None,
        })
        .collect();
    results.push(check(
        "decor_enter_exit_once",
        outcome == Some(WalkOutcome::Completed) && phases == ["Enter", "Exit"],
        format!("{phases:?}"),
    ));

    let removed = session.remove_decor_group("cargo");
    results.push(check(
        "decor_group_removal",
        removed == 2 && session.decor().get("crate-1").is_none(),
        format!("removed {removed}"),
    ));

    results
}

// ── 8. Random walk soak ─────────────────────────────────────────────────

fn validate_soak(verbose: bool) -> Vec<TestResult> {
    println!("--- Soak ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(0x57A_B1E);

    let mut session = demo_session();
    let world_bounds = Rect::new(0.0, 0.0, 30.0, 10.0).outset(0.1);

    // Random point inside some room of some instance.
    let random_point = |rng: &mut StdRng| {
        let gm = rng.gen_range(0..3) as f32;
        let room = rng.gen_range(0..2) as f32;
        let x = gm * 10.0 + room * 4.5 + 1.0 + rng.gen_range(0.5..3.0);
        let y = 1.0 + rng.gen_range(0.5..7.0);
        Vec2::new(x, y)
    };

    let keys: Vec<String> = (0..6).map(|i| format!("npc-{i}")).collect();
    for key in &keys {
        let p = random_point(&mut rng);
        session.spawn_npc(key, "crew", p).unwrap();
    }
    session.drain_events();

    let mut started = 0usize;
    let mut ended = 0usize;
    let mut out_of_bounds = 0usize;
    for key in &keys {
        let dst = random_point(&mut rng);
        if session
            .walk_npc(key, dst, DoorStrategy::ForceOpen, &NavOpts::default())
            .unwrap_or(None)
            .is_some()
        {
            started += 1;
        }
    }

    for _ in 0..600 {
        session.update(0.1);
        let events = session.drain_events();
        for event in events {
            if let WayEvent::WalkEnded { npc, .. } = event {
                ended += 1;
                let dst = random_point(&mut rng);
                if session
                    .walk_npc(&npc, dst, DoorStrategy::ForceOpen, &NavOpts::default())
                    .unwrap_or(None)
                    .is_some()
                {
                    started += 1;
                }
            }
        }
        for key in &keys {
            let p = session.pose(key).unwrap().point;
            if !world_bounds.contains(&p) || !p.x.is_finite() || !p.y.is_finite() {
                out_of_bounds += 1;
            }
        }
    }

    if verbose {
        println!("  soak: {started} walks started, {ended} ended");
    }
    results.push(check(
        "soak_walks_cycle",
        started >= ended && ended > 0,
        format!("{started} started, {ended} ended"),
    ));
    results.push(check(
        "soak_npcs_stay_on_world",
        out_of_bounds == 0,
        format!("{out_of_bounds} out-of-bounds samples"),
    ));

    results
}
