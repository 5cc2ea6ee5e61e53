//! Collision system - contact transitions for walking NPCs.
//!
//! Runs after the walk system each tick. For every NPC with an active walk
//! it compares the current decor and NPC contact sets against the walk's
//! previous sets and emits enter/exit transitions as `WayMeta` events. The
//! first tick of a walk reports pre-existing overlaps as `StartInside`
//! instead of `Enter`. Decor is tested against the tick's radius-expanded
//! swept segment, so a coarse tick cannot step over a small item.

use std::collections::HashSet;

use hecs::{Entity, World};

use waysim_logic::decor::DecorGrid;
use waysim_logic::geom::{Circle, Vec2};
use waysim_logic::nav_path::{CollidePhase, NavMeta, NavMetaKind};

use crate::components::{Mobility, NpcTag, Pose, Walk};
use crate::events::{EventQueue, WayEvent};

struct ContactPlan {
    entity: Entity,
    npc: String,
    walk_id: u64,
    meta_index: usize,
    decor_now: HashSet<String>,
    npc_now: HashSet<String>,
    started: bool,
}

/// Detect contact transitions for every walking NPC.
pub fn collision_system(world: &mut World, decor: &DecorGrid, events: &mut EventQueue) {
    // Snapshot every NPC body once; walkers test against this.
    let bodies: Vec<(Entity, String, Vec2, f32)> = world
        .query::<(&NpcTag, &Pose, &Mobility)>()
        .iter()
        .map(|(e, (tag, pose, mobility))| (e, tag.key.clone(), pose.point, mobility.radius))
        .collect();

    let mut plans: Vec<ContactPlan> = Vec::new();
    for (entity, (tag, walk, pose, mobility)) in world
        .query::<(&NpcTag, &Walk, &Pose, &Mobility)>()
        .iter()
    {
        let body = Circle::new(pose.point, mobility.radius);

        // Where the walk stood when contacts were last diffed.
        let (swept_from, _) = walk.sample(walk.prev_travelled);
        let decor_now: HashSet<String> = decor
            .query_swept(&swept_from, &pose.point, mobility.radius)
            .iter()
            .map(|d| d.key.clone())
            .collect();

        let npc_now: HashSet<String> = bodies
            .iter()
            .filter(|(other, _, point, radius)| {
                *other != entity
                    && body.intersects_circle(&Circle::new(*point, *radius))
            })
            .map(|(_, key, _, _)| key.clone())
            .collect();

        // Meta index of the segment the walk currently occupies.
        let (_, seg) = walk.sample(walk.travelled);

        plans.push(ContactPlan {
            entity,
            npc: tag.key.clone(),
            walk_id: walk.id,
            meta_index: seg,
            decor_now,
            npc_now,
            started: walk.started,
        });
    }

    for plan in plans {
        let Ok(mut walk) = world.get::<&mut Walk>(plan.entity) else {
            continue;
        };

        let enter_phase = if plan.started {
            CollidePhase::Enter
        } else {
            CollidePhase::StartInside
        };

        let mut push = |kind: NavMetaKind| {
            events.push(WayEvent::WayMeta {
                npc: plan.npc.clone(),
                walk_id: plan.walk_id,
                meta: NavMeta {
                    index: plan.meta_index,
                    kind,
                },
            });
        };

        // Deterministic event order within a tick: sorted keys.
        let mut entered: Vec<&String> = plan.decor_now.difference(&walk.decor_contacts).collect();
        entered.sort();
        for key in entered {
            push(NavMetaKind::DecorCollide {
                decor_key: key.clone(),
                phase: enter_phase,
            });
        }
        let mut exited: Vec<&String> = walk.decor_contacts.difference(&plan.decor_now).collect();
        exited.sort();
        for key in exited {
            push(NavMetaKind::DecorCollide {
                decor_key: key.clone(),
                phase: CollidePhase::Exit,
            });
        }

        let mut entered: Vec<&String> = plan.npc_now.difference(&walk.npc_contacts).collect();
        entered.sort();
        for key in entered {
            push(NavMetaKind::NpcsCollide {
                other_key: key.clone(),
                phase: enter_phase,
            });
        }
        let mut exited: Vec<&String> = walk.npc_contacts.difference(&plan.npc_now).collect();
        exited.sort();
        for key in exited {
            push(NavMetaKind::NpcsCollide {
                other_key: key.clone(),
                phase: CollidePhase::Exit,
            });
        }

        walk.decor_contacts = plan.decor_now;
        walk.npc_contacts = plan.npc_now;
        walk.prev_travelled = walk.travelled;
        walk.started = true;
    }
}
