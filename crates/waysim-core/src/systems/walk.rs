//! Walk system - advances walking NPCs along their paths.
//!
//! Runs once per tick. Each NPC's walk advances by `speed * dt`, resolving
//! door checks as it approaches them, firing nav metas whose path distance
//! it passes (in order), and smoothing heading toward the current segment.
//! Mutations are collected first and applied after the query ends.

use hecs::{Entity, World};

use waysim_logic::constants::DOOR_APPROACH_DIST;
use waysim_logic::floor_graph::{DoorId, DoorStatus};
use waysim_logic::geom::{angle_delta, Vec2};
use waysim_logic::nav_path::{GmRoomId, NavMeta, NavMetaKind};

use crate::components::{DoorStrategy, Inventory, Mobility, NpcTag, Pose, Walk, WalkQueue};
use crate::doors::DoorMap;
use crate::events::{EventQueue, WalkOutcome, WayEvent};

struct DoorRequest {
    gm_id: usize,
    door_id: DoorId,
    forced: bool,
    /// Whether the open may pass a lock (key held, or forced).
    authorized: bool,
}

struct StepPlan {
    entity: Entity,
    npc: String,
    walk_id: u64,
    new_travelled: f32,
    fired: Vec<NavMeta>,
    next_meta: usize,
    door_cursor: usize,
    point: Vec2,
    angle: f32,
    gm_room: Option<GmRoomId>,
    requests: Vec<DoorRequest>,
    ended: Option<WalkOutcome>,
}

/// Advance every unpaused walk by one tick. Door opens are queued on the
/// `DoorMap` and land when the session applies pending state at tick end.
pub fn walk_system(world: &mut World, dt: f32, doors: &mut DoorMap, events: &mut EventQueue) {
    let mut plans: Vec<StepPlan> = Vec::new();

    for (entity, (tag, walk, pose, mobility, inventory)) in world
        .query::<(&NpcTag, &Walk, &Pose, &Mobility, Option<&Inventory>)>()
        .iter()
    {
        if walk.paused || walk.force_paused {
            continue;
        }
        let empty_keys = std::collections::HashSet::new();
        let keys = inventory.map(|i| &i.keys).unwrap_or(&empty_keys);

        let mut t = (walk.travelled + mobility.speed * dt).min(walk.total);
        let mut requests: Vec<DoorRequest> = Vec::new();
        let mut ended: Option<WalkOutcome> = None;
        let mut cursor = walk.door_cursor;

        // Door checks, in path order. A blocked check clamps travel at the
        // approach threshold; a waiting SafeOpen clamps but does not end.
        while cursor < walk.door_checks.len() {
            let check = walk.door_checks[cursor];
            let threshold = (check.at - DOOR_APPROACH_DIST).max(0.0);
            if t < threshold {
                break;
            }
            if doors.status(check.gm_id, check.door_id) == DoorStatus::Open {
                cursor += 1;
                continue;
            }
            let hold = threshold.max(walk.travelled.min(walk.total));
            match walk.door_strategy {
                DoorStrategy::None => {
                    t = t.min(hold);
                    ended = Some(WalkOutcome::Blocked {
                        gm_id: check.gm_id,
                        door_id: check.door_id,
                    });
                }
                DoorStrategy::Open => {
                    // Requests the door and keeps going even when a lock it
                    // cannot pass leaves the door shut.
                    requests.push(DoorRequest {
                        gm_id: check.gm_id,
                        door_id: check.door_id,
                        forced: false,
                        authorized: doors.can_open(check.gm_id, check.door_id, keys, false),
                    });
                    cursor += 1;
                    continue;
                }
                DoorStrategy::SafeOpen => {
                    if doors.can_open(check.gm_id, check.door_id, keys, false) {
                        // Wait at the threshold; the door opens at tick end
                        // and the next tick passes the check.
                        requests.push(DoorRequest {
                            gm_id: check.gm_id,
                            door_id: check.door_id,
                            forced: false,
                            authorized: true,
                        });
                        t = t.min(hold);
                    } else {
                        t = t.min(hold);
                        ended = Some(WalkOutcome::Blocked {
                            gm_id: check.gm_id,
                            door_id: check.door_id,
                        });
                    }
                }
                DoorStrategy::ForceOpen => {
                    requests.push(DoorRequest {
                        gm_id: check.gm_id,
                        door_id: check.door_id,
                        forced: true,
                        authorized: true,
                    });
                    cursor += 1;
                    continue;
                }
            }
            break;
        }

        if ended.is_none() && t >= walk.total {
            ended = Some(WalkOutcome::Completed);
        }

        // Fire every meta whose length the walk has now passed.
        let mut next_meta = walk.next_meta;
        let mut fired: Vec<NavMeta> = Vec::new();
        let mut gm_room = pose.gm_room;
        while next_meta < walk.metas.len() && walk.metas[next_meta].length <= t + 1e-5 {
            let meta = walk.metas[next_meta].meta.clone();
            if let NavMetaKind::EnterRoom { gm_room: room } = meta.kind {
                gm_room = Some(room);
            }
            fired.push(meta);
            next_meta += 1;
        }

        let (point, _) = walk.sample(t);
        let angle = match walk.heading_at(t) {
            Some(desired) => {
                let delta = angle_delta(pose.angle, desired);
                let max_turn = mobility.turn_rate * dt;
                pose.angle + delta.clamp(-max_turn, max_turn)
            }
            None => pose.angle,
        };

        plans.push(StepPlan {
            entity,
            npc: tag.key.clone(),
            walk_id: walk.id,
            new_travelled: t,
            fired,
            next_meta,
            door_cursor: cursor,
            point,
            angle,
            gm_room,
            requests,
            ended,
        });
    }

    for plan in plans {
        if let Ok(mut pose) = world.get::<&mut Pose>(plan.entity) {
            pose.point = plan.point;
            pose.angle = plan.angle;
            pose.gm_room = plan.gm_room;
        }
        for meta in plan.fired {
            events.push(WayEvent::WayMeta {
                npc: plan.npc.clone(),
                walk_id: plan.walk_id,
                meta,
            });
        }
        for request in &plan.requests {
            doors.request_open(request.gm_id, request.door_id, request.authorized);
            events.push(WayEvent::DoorOpenRequested {
                npc: plan.npc.clone(),
                gm_id: request.gm_id,
                door_id: request.door_id,
                forced: request.forced,
            });
        }

        match plan.ended {
            Some(outcome) => {
                log::debug!(
                    "walk {} of {:?} ended: {:?}",
                    plan.walk_id,
                    plan.npc,
                    outcome
                );
                let _ = world.remove_one::<Walk>(plan.entity);
                if outcome != WalkOutcome::Completed {
                    let _ = world.remove_one::<WalkQueue>(plan.entity);
                }
                events.push(WayEvent::WalkEnded {
                    npc: plan.npc,
                    walk_id: plan.walk_id,
                    outcome,
                });
            }
            None => {
                if let Ok(mut walk) = world.get::<&mut Walk>(plan.entity) {
                    walk.travelled = plan.new_travelled;
                    walk.next_meta = plan.next_meta;
                    walk.door_cursor = plan.door_cursor;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waysim_logic::nav_path::{CollidePhase, GlobalNavPath};

    /// 100-unit straight path with collide metas at lengths 40 and 60.
    fn hundred_unit_path() -> GlobalNavPath {
        GlobalNavPath {
            points: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(40.0, 0.0),
                Vec2::new(60.0, 0.0),
                Vec2::new(100.0, 0.0),
            ],
            edge_nodes: vec![vec![], vec![], vec![]],
            nav_metas: vec![
                NavMeta {
                    index: 1,
                    kind: NavMetaKind::DecorCollide {
                        decor_key: "bench".into(),
                        phase: CollidePhase::Enter,
                    },
                },
                NavMeta {
                    index: 2,
                    kind: NavMetaKind::DecorCollide {
                        decor_key: "bench".into(),
                        phase: CollidePhase::Exit,
                    },
                },
            ],
            gm_room_ids: vec![],
        }
    }

    #[test]
    fn metas_fire_once_each_under_variable_ticks() {
        let mut world = World::new();
        let entity = world.spawn((
            NpcTag {
                key: "ada".into(),
                class_key: "crew".into(),
            },
            Pose {
                point: Vec2::ZERO,
                angle: 0.0,
                gm_room: None,
            },
            Mobility {
                speed: 1.0,
                radius: 0.5,
                turn_rate: 100.0,
            },
            Walk::new(1, hundred_unit_path(), DoorStrategy::Open),
        ));
        let mut doors = DoorMap::default();
        let mut events = EventQueue::default();

        // Distance per tick: 17, then 53 (crossing both 40 and 60), then 4,
        // then enough to finish.
        let mut fired: Vec<CollidePhase> = Vec::new();
        for dt in [17.0, 53.0, 4.0, 40.0] {
            walk_system(&mut world, dt, &mut doors, &mut events);
            for event in events.drain() {
                if let WayEvent::WayMeta { meta, .. } = event {
                    if let NavMetaKind::DecorCollide { phase, .. } = meta.kind {
                        fired.push(phase);
                    }
                }
            }
        }

        // Batched into one coarse tick, but each fired exactly once and in
        // trigger order.
        assert_eq!(fired, vec![CollidePhase::Enter, CollidePhase::Exit]);
        assert!(world.get::<&Walk>(entity).is_err(), "walk completed");
    }
}
