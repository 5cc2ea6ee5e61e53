//! Simulation session - main entry point for running the NPC walk sim.
//!
//! A `Session` owns the ECS world, the built navigation data, door and
//! decor state, and the event queue. Callers mutate it through typed
//! operations (spawn, walk, door changes) and advance it with `update(dt)`;
//! each tick runs the walk and collision systems, starts queued walks, and
//! applies pending door state.

use std::collections::HashMap;

use hecs::{Entity, World};

use waysim_logic::constants::PATH_JOIN_EPSILON;
use waysim_logic::decor::{Decor, DecorGrid};
use waysim_logic::error::NavError;
use waysim_logic::floor_graph::{DoorId, DoorStatus, FloorGraph};
use waysim_logic::geom::Vec2;
use waysim_logic::gm_graph::GmGraph;
use waysim_logic::nav_path::GlobalNavPath;
use waysim_logic::route::{global_nav_path, NavOpts};

use crate::actions::NpcAction;
use crate::components::{
    DoorStrategy, Inventory, Mobility, NpcClass, NpcTag, Pose, Walk, WalkId, WalkQueue,
};
use crate::doors::{DoorMap, DoorState};
use crate::error::NpcError;
use crate::events::{EventQueue, WalkOutcome, WayEvent};
use crate::systems::{collision_system, walk_system};

/// One running simulation.
pub struct Session {
    pub world: World,
    gm_graph: GmGraph,
    floors: Vec<FloorGraph>,
    decor: DecorGrid,
    doors: DoorMap,
    events: EventQueue,
    npcs: HashMap<String, Entity>,
    classes: HashMap<String, NpcClass>,
    sim_time: f64,
    next_walk_id: WalkId,
}

impl Session {
    pub fn new(gm_graph: GmGraph, floors: Vec<FloorGraph>) -> Self {
        Self {
            world: World::new(),
            gm_graph,
            floors,
            decor: DecorGrid::default(),
            doors: DoorMap::default(),
            events: EventQueue::default(),
            npcs: HashMap::new(),
            classes: HashMap::new(),
            sim_time: 0.0,
            next_walk_id: 1,
        }
    }

    pub fn gm_graph(&self) -> &GmGraph {
        &self.gm_graph
    }

    pub fn floors(&self) -> &[FloorGraph] {
        &self.floors
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Take every event queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<WayEvent> {
        self.events.drain()
    }

    // ── Classes and NPCs ────────────────────────────────────────────────

    pub fn register_class(&mut self, class: NpcClass) {
        self.classes.insert(class.key.clone(), class);
    }

    pub fn npc_entity(&self, key: &str) -> Result<Entity, NpcError> {
        self.npcs
            .get(key)
            .copied()
            .ok_or_else(|| NpcError::UnknownNpc(key.to_string()))
    }

    pub fn npc_count(&self) -> usize {
        self.npcs.len()
    }

    pub fn pose(&self, key: &str) -> Result<Pose, NpcError> {
        let entity = self.npc_entity(key)?;
        self.world
            .get::<&Pose>(entity)
            .map(|p| *p)
            .map_err(|_| NpcError::UnknownNpc(key.to_string()))
    }

    pub fn spawn_npc(&mut self, key: &str, class_key: &str, point: Vec2) -> Result<Entity, NpcError> {
        if self.npcs.contains_key(key) {
            return Err(NpcError::DuplicateNpc(key.to_string()));
        }
        let class = self
            .classes
            .get(class_key)
            .ok_or_else(|| NpcError::UnknownClass(class_key.to_string()))?;

        let entity = self.world.spawn((
            NpcTag {
                key: key.to_string(),
                class_key: class_key.to_string(),
            },
            Pose {
                point,
                angle: 0.0,
                gm_room: self.gm_graph.find_room_containing(&point),
            },
            Mobility {
                speed: class.speed,
                radius: class.radius,
                turn_rate: class.turn_rate,
            },
            Inventory::default(),
        ));
        self.npcs.insert(key.to_string(), entity);
        log::debug!("spawned NPC {key:?} (class {class_key:?}) at {point:?}");
        self.events.push(WayEvent::NpcSpawned {
            npc: key.to_string(),
        });
        Ok(entity)
    }

    /// Despawn an NPC, cancelling any walk in progress.
    pub fn remove_npc(&mut self, key: &str) -> Result<(), NpcError> {
        let entity = self.npc_entity(key)?;
        self.cancel_walk(key)?;
        let _ = self.world.despawn(entity);
        self.npcs.remove(key);
        self.events.push(WayEvent::NpcRemoved {
            npc: key.to_string(),
        });
        Ok(())
    }

    /// Grant a door key to an NPC.
    pub fn give_key(&mut self, npc: &str, door_key: &str) -> Result<(), NpcError> {
        let entity = self.npc_entity(npc)?;
        if let Ok(mut inventory) = self.world.get::<&mut Inventory>(entity) {
            inventory.keys.insert(door_key.to_string());
        }
        Ok(())
    }

    /// Take a door key back from an NPC. Revoking a key it never held is a
    /// no-op.
    pub fn revoke_key(&mut self, npc: &str, door_key: &str) -> Result<(), NpcError> {
        let entity = self.npc_entity(npc)?;
        if let Ok(mut inventory) = self.world.get::<&mut Inventory>(entity) {
            inventory.keys.remove(door_key);
        }
        Ok(())
    }

    // ── Doors ───────────────────────────────────────────────────────────

    pub fn set_door_state(&mut self, gm_id: usize, door_id: DoorId, state: DoorState) {
        self.doors.set_state(gm_id, door_id, state);
    }

    pub fn door_status(&self, gm_id: usize, door_id: DoorId) -> DoorStatus {
        self.doors.status(gm_id, door_id)
    }

    pub fn set_door_locked(&mut self, gm_id: usize, door_id: DoorId, locked: bool) {
        self.doors.set_locked(gm_id, door_id, locked);
    }

    /// Queue a door open/close for the end of the current tick. Host
    /// requests pass locks; unlock separately when that matters.
    pub fn request_door(&mut self, gm_id: usize, door_id: DoorId, open: bool) {
        if open {
            self.doors.request_open(gm_id, door_id, true);
        } else {
            self.doors.request_close(gm_id, door_id);
        }
    }

    // ── Decor ───────────────────────────────────────────────────────────

    pub fn decor(&self) -> &DecorGrid {
        &self.decor
    }

    pub fn add_decor(&mut self, decor: Decor) {
        let key = decor.key.clone();
        self.decor.add(decor);
        self.events.push(WayEvent::DecorAdded { key });
    }

    pub fn remove_decor(&mut self, key: &str) -> bool {
        let removed = self.decor.remove(key).is_some();
        if removed {
            self.events.push(WayEvent::DecorRemoved {
                key: key.to_string(),
            });
        }
        removed
    }

    pub fn remove_decor_group(&mut self, group: &str) -> usize {
        let keys = self.decor.remove_group(group);
        for key in &keys {
            self.events.push(WayEvent::DecorRemoved { key: key.clone() });
        }
        keys.len()
    }

    // ── Navigation and walks ────────────────────────────────────────────

    /// Pathfind between two world points with current door state applied.
    pub fn find_path(
        &self,
        src: &Vec2,
        dst: &Vec2,
        opts: &NavOpts,
    ) -> Result<GlobalNavPath, NavError> {
        let doors = &self.doors;
        let status = |gm_id: usize, door_id: DoorId| doors.status(gm_id, door_id);
        global_nav_path(&self.gm_graph, &self.floors, src, dst, opts, Some(&status))
    }

    /// Start a walk along a precomputed path, replacing any walk in
    /// progress (the old walk ends as `Cancelled`). An empty or zero-length
    /// path is a no-op and returns `Ok(None)` without touching the current
    /// walk.
    pub fn walk_npc_path(
        &mut self,
        key: &str,
        path: GlobalNavPath,
        door_strategy: DoorStrategy,
    ) -> Result<Option<WalkId>, NpcError> {
        let entity = self.npc_entity(key)?;
        if path.is_empty() || path.length() <= PATH_JOIN_EPSILON {
            return Ok(None);
        }

        self.end_current_walk(entity, key, WalkOutcome::Cancelled);

        let walk_id = self.next_walk_id;
        self.next_walk_id += 1;
        let walk = Walk::new(walk_id, path, door_strategy);
        log::debug!(
            "walk {walk_id} for {key:?}: {:.1} units, {} vertices",
            walk.total,
            walk.path.points.len()
        );
        let _ = self.world.insert_one(entity, walk);
        self.events.push(WayEvent::WalkStarted {
            npc: key.to_string(),
            walk_id,
        });
        Ok(Some(walk_id))
    }

    /// Pathfind from the NPC's current position and start the walk.
    pub fn walk_npc(
        &mut self,
        key: &str,
        dst: Vec2,
        door_strategy: DoorStrategy,
        opts: &NavOpts,
    ) -> Result<Option<WalkId>, NpcError> {
        let entity = self.npc_entity(key)?;
        let src = self
            .world
            .get::<&Pose>(entity)
            .map(|p| p.point)
            .map_err(|_| NpcError::UnknownNpc(key.to_string()))?;

        let path = self.find_path(&src, &dst, opts)?;
        self.walk_npc_path(key, path, door_strategy)
    }

    /// Queue a destination behind the current walk. Runs only if the walk
    /// in front of it completes.
    pub fn queue_walk(
        &mut self,
        key: &str,
        dst: Vec2,
        door_strategy: DoorStrategy,
    ) -> Result<(), NpcError> {
        let entity = self.npc_entity(key)?;
        if let Ok(mut queue) = self.world.get::<&mut WalkQueue>(entity) {
            queue.pending.push_back((dst, door_strategy));
            return Ok(());
        }
        let mut queue = WalkQueue::default();
        queue.pending.push_back((dst, door_strategy));
        let _ = self.world.insert_one(entity, queue);
        Ok(())
    }

    /// Cancel the current walk and clear the queue. Idempotent: cancelling
    /// an NPC with no walk succeeds and emits nothing.
    pub fn cancel_walk(&mut self, key: &str) -> Result<(), NpcError> {
        let entity = self.npc_entity(key)?;
        self.end_current_walk(entity, key, WalkOutcome::Cancelled);
        let _ = self.world.remove_one::<WalkQueue>(entity);
        Ok(())
    }

    pub fn pause_walk(&mut self, key: &str) -> Result<(), NpcError> {
        self.set_paused(key, true)
    }

    pub fn resume_walk(&mut self, key: &str) -> Result<(), NpcError> {
        self.set_paused(key, false)
    }

    /// Pause or resume every walk at once, without touching per-NPC pause
    /// flags.
    pub fn set_all_paused(&mut self, paused: bool) {
        for (_, walk) in self.world.query_mut::<&mut Walk>() {
            walk.force_paused = paused;
        }
    }

    fn set_paused(&mut self, key: &str, paused: bool) -> Result<(), NpcError> {
        let entity = self.npc_entity(key)?;
        if let Ok(mut walk) = self.world.get::<&mut Walk>(entity) {
            walk.paused = paused;
        }
        Ok(())
    }

    fn end_current_walk(&mut self, entity: Entity, key: &str, outcome: WalkOutcome) {
        if let Ok(walk) = self.world.remove_one::<Walk>(entity) {
            self.events.push(WayEvent::WalkEnded {
                npc: key.to_string(),
                walk_id: walk.id,
                outcome,
            });
        }
    }

    /// Run a JSON action request against an NPC. Returns the started walk
    /// id for `walk`, `None` for everything else.
    pub fn do_action(&mut self, key: &str, raw: &str) -> Result<Option<WalkId>, NpcError> {
        let action = NpcAction::parse(raw)?;
        match action {
            NpcAction::Walk { dst, door_strategy } => {
                self.walk_npc(key, dst, door_strategy, &NavOpts::default())
            }
            NpcAction::QueueWalk { dst, door_strategy } => {
                self.queue_walk(key, dst, door_strategy)?;
                Ok(None)
            }
            NpcAction::Stop => {
                self.cancel_walk(key)?;
                Ok(None)
            }
            NpcAction::Pause => {
                self.pause_walk(key)?;
                Ok(None)
            }
            NpcAction::Resume => {
                self.resume_walk(key)?;
                Ok(None)
            }
            NpcAction::LookAt { point } => {
                let entity = self.npc_entity(key)?;
                if let Ok(mut pose) = self.world.get::<&mut Pose>(entity) {
                    let dir = point - pose.point;
                    if dir.length() > f32::EPSILON {
                        pose.angle = dir.angle();
                    }
                }
                Ok(None)
            }
            NpcAction::SetSpeed { speed } => {
                let entity = self.npc_entity(key)?;
                if let Ok(mut mobility) = self.world.get::<&mut Mobility>(entity) {
                    mobility.speed = speed.max(0.0);
                }
                Ok(None)
            }
            NpcAction::GrantKey { key: door_key } => {
                self.give_key(key, &door_key)?;
                Ok(None)
            }
            NpcAction::RevokeKey { key: door_key } => {
                self.revoke_key(key, &door_key)?;
                Ok(None)
            }
            NpcAction::Remove => {
                self.remove_npc(key)?;
                Ok(None)
            }
        }
    }

    // ── Tick ────────────────────────────────────────────────────────────

    /// Advance the simulation by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        self.sim_time += dt as f64;

        walk_system(&mut self.world, dt, &mut self.doors, &mut self.events);
        collision_system(&mut self.world, &self.decor, &mut self.events);
        self.start_queued_walks();

        for (gm_id, door_id, open) in self.doors.apply_pending() {
            self.events.push(WayEvent::DoorChanged {
                gm_id,
                door_id,
                open,
            });
        }
    }

    /// Pop the next queued destination for every NPC whose walk completed.
    fn start_queued_walks(&mut self) {
        let mut ready: Vec<(String, Vec2, DoorStrategy)> = Vec::new();
        let mut emptied: Vec<Entity> = Vec::new();
        for (entity, (tag, queue, walk)) in self
            .world
            .query::<(&NpcTag, &mut WalkQueue, Option<&Walk>)>()
            .iter()
        {
            if walk.is_some() {
                continue;
            }
            if let Some((dst, strategy)) = queue.pending.pop_front() {
                ready.push((tag.key.clone(), dst, strategy));
            }
            if queue.pending.is_empty() {
                emptied.push(entity);
            }
        }
        for entity in emptied {
            let _ = self.world.remove_one::<WalkQueue>(entity);
        }
        for (key, dst, strategy) in ready {
            if let Err(e) = self.walk_npc(&key, dst, strategy, &NavOpts::default()) {
                log::warn!("queued walk for {key:?} failed: {e}");
            }
        }
    }
}
