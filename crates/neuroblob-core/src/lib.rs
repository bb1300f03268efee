//! Core NeuroBlob simulation state and stepping logic.
//!
//! The world is a bounded rectangle holding circular agents, food and poison
//! items, and four rectangular boundary walls. Each tick runs fixed stages:
//! every agent senses through a fan of rays, feeds the result to its
//! recurrent controller, then moves, eats, and pays metabolic costs; finally
//! overlaps are resolved and dead agents are swept out with obituaries so the
//! evolutionary layer can track lineages. [`GenerationManager`] drives whole
//! generations, inheriting the best controller seen so far into a freshly
//! populated world whenever the population dies out or a tick budget expires.

use neuroblob_index::{BucketGrid, CellSet};
use ordered_float::OrderedFloat;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap, new_key_type};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use neuroblob_brain::{BlobTopology, BrainError, NeuroBlob};
pub use neuroblob_index::{Aabb, IndexError};

new_key_type! {
    /// Stable handle to a world object. Handles are never reused within one
    /// world, even across generation resets.
    pub struct EntityId;
}

/// Secondary storage keyed by world objects.
pub type EntityMap<T> = SecondaryMap<EntityId, T>;

/// Scalars emitted per vision ray: proximity plus three color channels.
pub const RAY_CHANNELS: usize = 4;
/// Trailing perception inputs describing the agent's own condition.
pub const STATUS_INPUTS: usize = 2;
/// Controller outputs: turn, velocity, eat intent.
pub const BRAIN_OUTPUTS: usize = 3;

const FULL_TURN: f32 = std::f32::consts::TAU;
const HALF_TURN: f32 = std::f32::consts::PI;

/// Wraps an angle into `(-PI, PI]`. Non-finite input collapses to 0.
#[must_use]
pub fn wrap_signed_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(FULL_TURN);
    if wrapped > HALF_TURN {
        wrapped - FULL_TURN
    } else {
        wrapped
    }
}

/// Wraps an angle into `[0, TAU)`. Non-finite input collapses to 0.
#[must_use]
pub fn wrap_unsigned_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    angle.rem_euclid(FULL_TURN)
}

/// Clamps to `[0, 1]`, treating NaN as 0.
#[must_use]
pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Planar vector in world coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle` radians.
    #[must_use]
    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[must_use]
    pub fn distance_sq(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Distance along `direction` from `origin` to the first intersection with
/// the circle at `center`, or `None` when the ray cannot hit within
/// `max_range`. A ray starting inside the circle reports the exit distance.
/// A zero-length direction never hits.
#[must_use]
pub fn ray_circle(
    origin: Vec2,
    direction: Vec2,
    center: Vec2,
    radius: f32,
    max_range: f32,
) -> Option<f32> {
    if direction.x == 0.0 && direction.y == 0.0 {
        return None;
    }
    let to_center = Vec2::new(center.x - origin.x, center.y - origin.y);
    let center_sq = to_center.dot(to_center);
    let reach = max_range + radius;
    if center_sq > reach * reach {
        return None;
    }
    let radius_sq = radius * radius;
    let along = to_center.dot(direction);
    if along < 0.0 && center_sq > radius_sq {
        return None;
    }
    let off_sq = center_sq - along * along;
    if off_sq > radius_sq {
        return None;
    }
    let half_chord = (radius_sq - off_sq).sqrt();
    let near = along - half_chord;
    if near >= 0.0 {
        return Some(near);
    }
    let far = along + half_chord;
    (far >= 0.0).then_some(far)
}

/// Distance along `direction` from `origin` to the nearest crossed edge of
/// the axis-aligned rectangle at `center`, or `None` when every edge is
/// missed. Edges parallel to the ray are skipped by the sign test, which
/// also makes a zero-length direction a miss.
#[must_use]
pub fn ray_rect(
    origin: Vec2,
    direction: Vec2,
    center: Vec2,
    half_w: f32,
    half_h: f32,
) -> Option<f32> {
    let dx = center.x - origin.x;
    let dy = center.y - origin.y;
    let mut nearest: Option<f32> = None;
    for edge in [dx - half_w, dx + half_w] {
        if edge * direction.x > 0.0 {
            let t = edge / direction.x;
            let y_cross = t * direction.y;
            if (dy - half_h - y_cross) * (dy + half_h - y_cross) <= 0.0 {
                nearest = Some(nearest.map_or(t, |best| best.min(t)));
            }
        }
    }
    for edge in [dy - half_h, dy + half_h] {
        if edge * direction.y > 0.0 {
            let t = edge / direction.y;
            let x_cross = t * direction.x;
            if (dx - half_w - x_cross) * (dx + half_w - x_cross) <= 0.0 {
                nearest = Some(nearest.map_or(t, |best| best.min(t)));
            }
        }
    }
    nearest
}

/// What a world object is, which decides how every stage treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Agent,
    Food,
    Poison,
    Wall,
}

impl ObjectKind {
    /// Whether a bite can consume this object.
    #[must_use]
    pub const fn is_edible(self) -> bool {
        matches!(self, Self::Food | Self::Poison)
    }
}

/// Collision and perception footprint of a world object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    Rect { half_w: f32, half_h: f32 },
}

impl Shape {
    /// Radius of the smallest circle covering the shape.
    #[must_use]
    pub fn bounding_radius(self) -> f32 {
        match self {
            Self::Circle { radius } => radius,
            Self::Rect { half_w, half_h } => (half_w * half_w + half_h * half_h).sqrt(),
        }
    }

    /// World-space bounding box of the shape placed at `position`.
    #[must_use]
    pub fn aabb(self, position: Vec2) -> Aabb {
        match self {
            Self::Circle { radius } => Aabb::around(position.x, position.y, radius, radius),
            Self::Rect { half_w, half_h } => {
                Aabb::around(position.x, position.y, half_w, half_h)
            }
        }
    }
}

/// Dense per-object state shared by every kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectData {
    pub position: Vec2,
    pub shape: Shape,
    /// Display color, also what vision rays report on a hit.
    pub color: [f32; 3],
    pub kind: ObjectKind,
    /// Kept in `[0, 1]`; an agent dies when it reaches 0.
    pub health: f32,
    /// Kept in `[0, 1]`; spent before health starts draining.
    pub energy: f32,
}

/// Agent-only state living next to the shared object record.
#[derive(Debug, Clone)]
pub struct AgentRuntime {
    /// Facing angle in `[0, TAU)`.
    pub heading: f32,
    /// Ticks survived so far.
    pub age: u64,
    /// Net consumption score: food +1, poison -1.
    pub score: i64,
    /// Perception vector from the most recent sense stage.
    pub vision: Vec<f32>,
    /// Controller outputs from the most recent think stage.
    pub outputs: [f32; BRAIN_OUTPUTS],
    pub brain: NeuroBlob,
}

/// Monotonic tick counter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Errors raised while building a world.
#[derive(Debug, Error)]
pub enum WorldError {
    /// A configuration field failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Tunable parameters for a simulation run. [`SimulationConfig::default`]
/// matches the canonical world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// World width in world units.
    pub world_width: f32,
    /// World height in world units.
    pub world_height: f32,
    /// Bucket-grid columns for the spatial index.
    pub grid_cols: u32,
    /// Bucket-grid rows for the spatial index.
    pub grid_rows: u32,
    /// Food items kept alive in the world.
    pub food_count: usize,
    /// Poison items kept alive in the world.
    pub poison_count: usize,
    /// Agents spawned per generation.
    pub agent_count: usize,
    /// Body radius of an agent.
    pub agent_radius: f32,
    /// Body radius of a food item.
    pub food_radius: f32,
    /// Body radius of a poison item.
    pub poison_radius: f32,
    /// Thickness of the boundary walls.
    pub wall_thickness: f32,
    /// Vision rays per agent; at least two so the fan has distinct ends.
    pub vision_rays: usize,
    /// Reach of each vision ray.
    pub vision_range: f32,
    /// Angular width of the vision fan, centered on the heading.
    pub vision_angle: f32,
    /// Recurrent controller passes per think stage.
    pub think_steps: usize,
    /// Eat output above this value triggers a bite.
    pub consume_threshold: f32,
    /// Energy drained every tick regardless of activity.
    pub passive_cost: f32,
    /// Energy drained per tick scales with this times velocity squared.
    pub movement_cost_factor: f32,
    /// Energy drained by every bite attempt, successful or not.
    pub biting_cost: f32,
    /// Health regained per tick, paid for from energy one for one.
    pub regen_rate: f32,
    /// Energy granted by eating food.
    pub food_energy: f32,
    /// Health granted by eating food.
    pub food_health: f32,
    /// Energy granted by eating poison.
    pub poison_energy: f32,
    /// Health granted by eating poison; negative hurts.
    pub poison_health: f32,
    /// Fraction of the turn output applied to the heading each tick.
    pub turn_damping: f32,
    /// Per-weight probability of perturbation when a controller mutates.
    pub mutation_rate: f32,
    /// Magnitude bound of a single weight perturbation.
    pub mutation_scale: f32,
    /// Enables reward-modulated Hebbian updates during agent ticks.
    pub learning_enabled: bool,
    /// Learning rate for Hebbian updates.
    pub learning_rate: f32,
    /// Weight decay factor applied every `decay_interval` ticks of age.
    pub decay_factor: f32,
    /// Agent age interval between weight decays.
    pub decay_interval: u64,
    /// Whether recurrent neurons may feed back onto themselves.
    pub self_connections: bool,
    /// Ticks a generation may run before it is rolled over.
    pub generation_tick_budget: u64,
    /// Fixed seed for reproducible runs; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    /// Agent body color.
    pub agent_color: [f32; 3],
    /// Food body color.
    pub food_color: [f32; 3],
    /// Poison body color.
    pub poison_color: [f32; 3],
    /// Wall color, what rays report when they reach the boundary.
    pub wall_color: [f32; 3],
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            world_width: 800.0,
            world_height: 600.0,
            grid_cols: 8,
            grid_rows: 6,
            food_count: 50,
            poison_count: 50,
            agent_count: 10,
            agent_radius: 6.0,
            food_radius: 3.0,
            poison_radius: 3.0,
            wall_thickness: 12.0,
            vision_rays: 11,
            vision_range: 100.0,
            vision_angle: FULL_TURN / 3.0,
            think_steps: 1,
            consume_threshold: 0.0,
            passive_cost: 1.0e-4,
            movement_cost_factor: 1.0e-3,
            biting_cost: 5.0e-3,
            regen_rate: 1.0e-4,
            food_energy: 0.2,
            food_health: 0.0,
            poison_energy: 0.0,
            poison_health: -0.1,
            turn_damping: 0.1,
            mutation_rate: 0.1,
            mutation_scale: 0.01,
            learning_enabled: false,
            learning_rate: 1.0e-5,
            decay_factor: 0.999,
            decay_interval: 100,
            self_connections: true,
            generation_tick_budget: 10_000,
            rng_seed: None,
            agent_color: [0.0, 100.0 / 255.0, 1.0],
            food_color: [0.0, 1.0, 0.0],
            poison_color: [128.0 / 255.0, 0.0, 128.0 / 255.0],
            wall_color: [0.5, 0.5, 0.5],
        }
    }
}

impl SimulationConfig {
    /// Rejects geometry and rate combinations the simulation cannot run.
    pub fn validate(&self) -> Result<(), WorldError> {
        if !(self.world_width.is_finite() && self.world_height.is_finite())
            || self.world_width <= 0.0
            || self.world_height <= 0.0
        {
            return Err(WorldError::InvalidConfig(
                "world extent must be positive and finite",
            ));
        }
        if self.grid_cols == 0 || self.grid_rows == 0 {
            return Err(WorldError::InvalidConfig(
                "spatial grid needs at least one column and one row",
            ));
        }
        if self.agent_radius <= 0.0 || self.food_radius <= 0.0 || self.poison_radius <= 0.0 {
            return Err(WorldError::InvalidConfig("body radii must be positive"));
        }
        if self.wall_thickness <= 0.0 {
            return Err(WorldError::InvalidConfig("wall thickness must be positive"));
        }
        let widest = self.agent_radius.max(self.food_radius).max(self.poison_radius);
        if self.world_width <= widest * 2.0 || self.world_height <= widest * 2.0 {
            return Err(WorldError::InvalidConfig(
                "world must be wider than its largest occupant",
            ));
        }
        if self.vision_rays < 2 {
            return Err(WorldError::InvalidConfig("vision needs at least two rays"));
        }
        if !self.vision_range.is_finite() || self.vision_range <= 0.0 {
            return Err(WorldError::InvalidConfig(
                "vision range must be positive and finite",
            ));
        }
        if !self.vision_angle.is_finite()
            || self.vision_angle <= 0.0
            || self.vision_angle > FULL_TURN
        {
            return Err(WorldError::InvalidConfig(
                "vision angle must fall in (0, TAU]",
            ));
        }
        if self.think_steps == 0 {
            return Err(WorldError::InvalidConfig(
                "controller needs at least one think step",
            ));
        }
        for cost in [
            self.passive_cost,
            self.movement_cost_factor,
            self.biting_cost,
            self.regen_rate,
        ] {
            if !cost.is_finite() || cost < 0.0 {
                return Err(WorldError::InvalidConfig(
                    "metabolic rates must be non-negative and finite",
                ));
            }
        }
        if !self.turn_damping.is_finite() {
            return Err(WorldError::InvalidConfig("turn damping must be finite"));
        }
        if !self.mutation_rate.is_finite()
            || self.mutation_rate < 0.0
            || !self.mutation_scale.is_finite()
            || self.mutation_scale < 0.0
        {
            return Err(WorldError::InvalidConfig(
                "mutation parameters must be non-negative and finite",
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(WorldError::InvalidConfig(
                "learning rate must be non-negative and finite",
            ));
        }
        if !self.decay_factor.is_finite() || self.decay_factor <= 0.0 {
            return Err(WorldError::InvalidConfig("decay factor must be positive"));
        }
        if self.decay_interval == 0 {
            return Err(WorldError::InvalidConfig(
                "decay interval must be at least one tick",
            ));
        }
        if self.generation_tick_budget == 0 {
            return Err(WorldError::InvalidConfig(
                "generation tick budget must be at least one tick",
            ));
        }
        Ok(())
    }

    /// RNG for the run: fixed seed when configured, entropy otherwise.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    /// Width of the perception vector fed to the controller.
    #[must_use]
    pub const fn vision_inputs(&self) -> usize {
        self.vision_rays * RAY_CHANNELS + STATUS_INPUTS
    }

    /// Controller layout implied by the vision settings.
    #[must_use]
    pub const fn brain_topology(&self) -> BlobTopology {
        let n_input = self.vision_inputs();
        let mut topology =
            BlobTopology::new(n_input, 2 * (n_input + BRAIN_OUTPUTS), BRAIN_OUTPUTS);
        topology.self_connections = self.self_connections;
        topology
    }
}

/// Death notice emitted before the world forgets an agent.
#[derive(Debug, Clone)]
pub struct Obituary {
    pub id: EntityId,
    pub score: i64,
    pub age: u64,
    /// Final controller, so lineages survive their carrier.
    pub brain: NeuroBlob,
}

/// What one call to [`World::step`] did.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: Tick,
    pub live_agents: usize,
    pub food_eaten: u32,
    pub poison_eaten: u32,
    pub obituaries: Vec<Obituary>,
}

/// Immutable copy of one object for render and stats consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: EntityId,
    pub kind: ObjectKind,
    pub position: Vec2,
    pub shape: Shape,
    pub color: [f32; 3],
    pub health: f32,
    pub energy: f32,
}

/// Immutable copy of one agent's runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: EntityId,
    pub heading: f32,
    pub age: u64,
    pub score: i64,
    pub vision: Vec<f32>,
    pub outputs: [f32; BRAIN_OUTPUTS],
}

/// Full world state at one tick, detached from the live world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: Tick,
    pub objects: Vec<ObjectSnapshot>,
    pub agents: Vec<AgentSnapshot>,
}

/// Per-kind id lists in spawn order, the iteration order of every stage.
#[derive(Debug, Clone, Default)]
struct KindRosters {
    agents: Vec<EntityId>,
    food: Vec<EntityId>,
    poison: Vec<EntityId>,
    walls: Vec<EntityId>,
}

impl KindRosters {
    fn of(&self, kind: ObjectKind) -> &Vec<EntityId> {
        match kind {
            ObjectKind::Agent => &self.agents,
            ObjectKind::Food => &self.food,
            ObjectKind::Poison => &self.poison,
            ObjectKind::Wall => &self.walls,
        }
    }

    fn of_mut(&mut self, kind: ObjectKind) -> &mut Vec<EntityId> {
        match kind {
            ObjectKind::Agent => &mut self.agents,
            ObjectKind::Food => &mut self.food,
            ObjectKind::Poison => &mut self.poison,
            ObjectKind::Wall => &mut self.walls,
        }
    }

    fn clear(&mut self) {
        self.agents.clear();
        self.food.clear();
        self.poison.clear();
        self.walls.clear();
    }
}

/// The bounded world and every object in it.
pub struct World {
    config: SimulationConfig,
    tick: Tick,
    rng: SmallRng,
    objects: SlotMap<EntityId, ObjectData>,
    runtime: EntityMap<AgentRuntime>,
    registered_cells: EntityMap<CellSet>,
    grid: BucketGrid<EntityId>,
    rosters: KindRosters,
    pending_deaths: Vec<EntityId>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("objects", &self.objects.len())
            .field("agents", &self.rosters.agents.len())
            .finish()
    }
}

impl World {
    /// Builds a world and spawns the configured walls, items, and agents.
    pub fn new(config: SimulationConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let rng = config.seeded_rng();
        let grid = BucketGrid::new(
            config.grid_cols,
            config.grid_rows,
            config.world_width,
            config.world_height,
        )?;
        let mut world = Self {
            config,
            tick: Tick::zero(),
            rng,
            objects: SlotMap::with_key(),
            runtime: SecondaryMap::new(),
            registered_cells: SecondaryMap::new(),
            grid,
            rosters: KindRosters::default(),
            pending_deaths: Vec::new(),
        };
        world.populate();
        Ok(world)
    }

    /// Discards every object and spawns a fresh population. The RNG stream
    /// continues uninterrupted and old ids stay invalid forever.
    pub fn reset(&mut self) {
        self.objects.clear();
        self.runtime.clear();
        self.registered_cells.clear();
        self.grid.clear();
        self.rosters.clear();
        self.pending_deaths.clear();
        self.tick = Tick::zero();
        self.populate();
    }

    fn populate(&mut self) {
        self.spawn_walls();
        for _ in 0..self.config.food_count {
            let position = self.random_interior_position(self.config.food_radius);
            self.spawn_food(position);
        }
        for _ in 0..self.config.poison_count {
            let position = self.random_interior_position(self.config.poison_radius);
            self.spawn_poison(position);
        }
        for _ in 0..self.config.agent_count {
            let position = self.random_interior_position(self.config.agent_radius);
            self.spawn_agent(position);
        }
    }

    /// Walls straddle the world edges so their inner faces sit exactly on
    /// the boundary. Order: left, right, top, bottom.
    fn spawn_walls(&mut self) {
        let t = self.config.wall_thickness;
        let w = self.config.world_width;
        let h = self.config.world_height;
        let walls = [
            (Vec2::new(-t * 0.5, h * 0.5), t * 0.5, h * 0.5 + t),
            (Vec2::new(w + t * 0.5, h * 0.5), t * 0.5, h * 0.5 + t),
            (Vec2::new(w * 0.5, -t * 0.5), w * 0.5 + t, t * 0.5),
            (Vec2::new(w * 0.5, h + t * 0.5), w * 0.5 + t, t * 0.5),
        ];
        for (position, half_w, half_h) in walls {
            self.insert_object(ObjectData {
                position,
                shape: Shape::Rect { half_w, half_h },
                color: self.config.wall_color,
                kind: ObjectKind::Wall,
                health: 1.0,
                energy: 1.0,
            });
        }
    }

    fn random_interior_position(&mut self, margin: f32) -> Vec2 {
        let x = self
            .rng
            .random_range(margin..self.config.world_width - margin);
        let y = self
            .rng
            .random_range(margin..self.config.world_height - margin);
        Vec2::new(x, y)
    }

    /// Spawns a food item at `position`.
    pub fn spawn_food(&mut self, position: Vec2) -> EntityId {
        let data = ObjectData {
            position,
            shape: Shape::Circle {
                radius: self.config.food_radius,
            },
            color: self.config.food_color,
            kind: ObjectKind::Food,
            health: 1.0,
            energy: 1.0,
        };
        self.insert_object(data)
    }

    /// Spawns a poison item at `position`.
    pub fn spawn_poison(&mut self, position: Vec2) -> EntityId {
        let data = ObjectData {
            position,
            shape: Shape::Circle {
                radius: self.config.poison_radius,
            },
            color: self.config.poison_color,
            kind: ObjectKind::Poison,
            health: 1.0,
            energy: 1.0,
        };
        self.insert_object(data)
    }

    /// Spawns an agent at `position` with a random heading and a random
    /// controller drawn from the world RNG.
    pub fn spawn_agent(&mut self, position: Vec2) -> EntityId {
        let data = ObjectData {
            position,
            shape: Shape::Circle {
                radius: self.config.agent_radius,
            },
            color: self.config.agent_color,
            kind: ObjectKind::Agent,
            health: 1.0,
            energy: 1.0,
        };
        let id = self.insert_object(data);
        let heading = self.rng.random_range(0.0..FULL_TURN);
        let brain = NeuroBlob::random(self.config.brain_topology(), &mut self.rng);
        self.runtime.insert(
            id,
            AgentRuntime {
                heading,
                age: 0,
                score: 0,
                vision: vec![0.0; self.config.vision_inputs()],
                outputs: [0.0; BRAIN_OUTPUTS],
                brain,
            },
        );
        id
    }

    fn insert_object(&mut self, data: ObjectData) -> EntityId {
        let kind = data.kind;
        let aabb = data.shape.aabb(data.position);
        let id = self.objects.insert(data);
        let cells = self.grid.cells_for(&aabb);
        self.grid.insert(id, &cells);
        self.registered_cells.insert(id, cells);
        self.rosters.of_mut(kind).push(id);
        id
    }

    /// Removes an object and every trace of it, returning its final state.
    pub fn remove_object(&mut self, id: EntityId) -> Option<ObjectData> {
        let data = self.objects.remove(id)?;
        if let Some(cells) = self.registered_cells.remove(id) {
            self.grid.remove(id, &cells);
        }
        self.runtime.remove(id);
        let roster = self.rosters.of_mut(data.kind);
        if let Some(index) = roster.iter().position(|&entry| entry == id) {
            roster.remove(index);
        }
        Some(data)
    }

    /// Re-registers an object's grid cells after a position change.
    fn relocate(&mut self, id: EntityId) {
        let Some(data) = self.objects.get(id) else {
            return;
        };
        let aabb = data.shape.aabb(data.position);
        if let Some(cells) = self.registered_cells.get_mut(id) {
            let old = std::mem::take(cells);
            *cells = self.grid.relocate(id, &old, &aabb);
        }
    }

    /// Ids of every object whose bounding circle touches the disk at
    /// `center` with `radius`, ascending. Grid buckets narrow the scan and
    /// an exact center-distance test removes the false positives.
    #[must_use]
    pub fn objects_in_area(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        let mut found = self.grid.candidates_in_disk((center.x, center.y), radius);
        found.retain(|&candidate| {
            self.objects.get(candidate).is_some_and(|data| {
                let reach = radius + data.shape.bounding_radius();
                data.position.distance_sq(center) <= reach * reach
            })
        });
        found
    }

    /// Advances the world one tick and reports what happened.
    pub fn step(&mut self) -> TickReport {
        let next_tick = self.tick.next();
        self.stage_sense();
        self.stage_think();
        let (food_eaten, poison_eaten) = self.stage_act();
        self.stage_collide();
        let obituaries = self.stage_death_sweep();
        self.tick = next_tick;
        TickReport {
            tick: self.tick,
            live_agents: self.rosters.agents.len(),
            food_eaten,
            poison_eaten,
            obituaries,
        }
    }

    /// Computes every agent's perception in parallel, then writes the
    /// vectors back in roster order. Perception only reads world state, so
    /// the tick stays deterministic whatever the thread schedule.
    fn stage_sense(&mut self) {
        if self.rosters.agents.is_empty() {
            return;
        }
        let agent_ids = self.rosters.agents.clone();
        let world = &*self;
        let vision: Vec<Vec<f32>> = agent_ids
            .par_iter()
            .map(|&id| world.perceive(id))
            .collect();
        for (&id, inputs) in agent_ids.iter().zip(vision) {
            if let Some(runtime) = self.runtime.get_mut(id) {
                runtime.vision = inputs;
            }
        }
    }

    /// Casts the vision fan for one agent. Each ray keeps the closest hit as
    /// `1 - distance / range` plus the hit object's color; ties go to the
    /// earlier candidate, and candidates arrive in ascending id order. Wall
    /// rectangles are only tested near the boundary since rays cannot reach
    /// them from the interior. The last two slots report energy and health
    /// deficits.
    fn perceive(&self, id: EntityId) -> Vec<f32> {
        let width = self.config.vision_inputs();
        let Some(data) = self.objects.get(id) else {
            return vec![0.0; width];
        };
        let Some(runtime) = self.runtime.get(id) else {
            return vec![0.0; width];
        };
        let origin = data.position;
        let range = self.config.vision_range;
        let neighbors = self.objects_in_area(origin, range);
        let near_edge = origin.x < range
            || origin.y < range
            || origin.x > self.config.world_width - range
            || origin.y > self.config.world_height - range;

        let rays = self.config.vision_rays;
        let first_ray = runtime.heading - self.config.vision_angle * 0.5;
        let ray_step = self.config.vision_angle / (rays - 1) as f32;
        let mut inputs = Vec::with_capacity(width);
        for ray in 0..rays {
            let direction = Vec2::from_angle(first_ray + ray_step * ray as f32);
            let mut proximity = 0.0_f32;
            let mut color = [0.0_f32; 3];
            for &neighbor in &neighbors {
                if neighbor == id {
                    continue;
                }
                let Some(target) = self.objects.get(neighbor) else {
                    continue;
                };
                let hit = match target.shape {
                    Shape::Circle { radius } => {
                        ray_circle(origin, direction, target.position, radius, range)
                    }
                    Shape::Rect { half_w, half_h } if near_edge => {
                        ray_rect(origin, direction, target.position, half_w, half_h)
                    }
                    Shape::Rect { .. } => None,
                };
                let Some(distance) = hit else {
                    continue;
                };
                if distance > range {
                    continue;
                }
                let closeness = 1.0 - distance / range;
                if closeness > proximity {
                    proximity = closeness;
                    color = target.color;
                }
            }
            inputs.push(proximity);
            inputs.extend_from_slice(&color);
        }
        inputs.push(1.0 - data.energy);
        inputs.push(1.0 - data.health);
        inputs
    }

    /// Runs every controller on its freshly sensed perception.
    fn stage_think(&mut self) {
        let steps = self.config.think_steps;
        for &id in &self.rosters.agents {
            let Some(runtime) = self.runtime.get_mut(id) else {
                continue;
            };
            match runtime.brain.step(&runtime.vision, steps) {
                Ok(outputs) => runtime.outputs.copy_from_slice(outputs),
                Err(err) => {
                    warn!(agent = ?id, error = %err, "controller rejected perception, keeping previous outputs");
                }
            }
        }
    }

    /// Applies outputs agent by agent in roster order. Consumption takes
    /// effect immediately, so an item eaten early in the pass is gone for
    /// every later agent.
    fn stage_act(&mut self) -> (u32, u32) {
        let agent_ids = self.rosters.agents.clone();
        let mut food_eaten = 0;
        let mut poison_eaten = 0;
        for id in agent_ids {
            match self.act_agent(id) {
                Some(ObjectKind::Food) => food_eaten += 1,
                Some(ObjectKind::Poison) => poison_eaten += 1,
                _ => {}
            }
        }
        (food_eaten, poison_eaten)
    }

    fn act_agent(&mut self, id: EntityId) -> Option<ObjectKind> {
        let runtime = self.runtime.get(id)?;
        let [turn, velocity, eat] = runtime.outputs;
        let heading = wrap_unsigned_angle(runtime.heading + turn * self.config.turn_damping);

        let data = self.objects.get(id)?;
        let radius = data.shape.bounding_radius();
        let prev_health = data.health;
        let prev_energy = data.energy;
        let direction = Vec2::from_angle(heading);
        let x = (data.position.x + direction.x * velocity)
            .clamp(radius, self.config.world_width - radius);
        let y = (data.position.y + direction.y * velocity)
            .clamp(radius, self.config.world_height - radius);

        if let Some(data) = self.objects.get_mut(id) {
            data.position = Vec2::new(x, y);
        }
        if let Some(runtime) = self.runtime.get_mut(id) {
            runtime.heading = heading;
            runtime.age += 1;
        }
        self.relocate(id);

        let mut consumed = None;
        if eat > self.config.consume_threshold {
            self.apply_energy_cost(id, self.config.biting_cost);
            consumed = self.try_consume(id, heading);
        }

        let movement_cost = self.config.movement_cost_factor * velocity * velocity;
        self.apply_energy_cost(id, self.config.passive_cost + movement_cost);
        self.regenerate_health(id);

        if self.config.learning_enabled {
            self.learn_agent(id, prev_health, prev_energy);
        }

        if let Some(data) = self.objects.get(id)
            && data.health <= 0.0
        {
            self.pending_deaths.push(id);
        }
        consumed
    }

    /// Eats the nearest edible object within biting reach and inside the
    /// vision cone, if any. Ties on distance break toward the lower id.
    /// The consumed item respawns at a fresh interior position so item
    /// counts hold steady.
    fn try_consume(&mut self, id: EntityId, heading: f32) -> Option<ObjectKind> {
        let (origin, reach) = {
            let data = self.objects.get(id)?;
            (data.position, data.shape.bounding_radius())
        };
        let half_cone = self.config.vision_angle * 0.5;
        let mut best: Option<(OrderedFloat<f32>, EntityId)> = None;
        for candidate in self.objects_in_area(origin, reach) {
            if candidate == id {
                continue;
            }
            let Some(target) = self.objects.get(candidate) else {
                continue;
            };
            if !target.kind.is_edible() {
                continue;
            }
            let dx = target.position.x - origin.x;
            let dy = target.position.y - origin.y;
            let bearing = wrap_signed_angle(dy.atan2(dx) - heading);
            if bearing.abs() > half_cone {
                continue;
            }
            let dist_sq = OrderedFloat(dx * dx + dy * dy);
            if best.is_none_or(|(nearest, _)| dist_sq < nearest) {
                best = Some((dist_sq, candidate));
            }
        }
        let (_, target_id) = best?;
        let (kind, energy_gain, health_gain) = match self.objects.get(target_id)?.kind {
            ObjectKind::Food => (
                ObjectKind::Food,
                self.config.food_energy,
                self.config.food_health,
            ),
            ObjectKind::Poison => (
                ObjectKind::Poison,
                self.config.poison_energy,
                self.config.poison_health,
            ),
            _ => return None,
        };
        self.remove_object(target_id);
        if let Some(data) = self.objects.get_mut(id) {
            data.energy = clamp01(data.energy + energy_gain);
            data.health = clamp01(data.health + health_gain);
        }
        if let Some(runtime) = self.runtime.get_mut(id) {
            runtime.score += if kind == ObjectKind::Food { 1 } else { -1 };
        }
        let radius = match kind {
            ObjectKind::Food => self.config.food_radius,
            _ => self.config.poison_radius,
        };
        let position = self.random_interior_position(radius);
        match kind {
            ObjectKind::Food => self.spawn_food(position),
            _ => self.spawn_poison(position),
        };
        Some(kind)
    }

    /// Drains energy first; whatever energy cannot cover comes out of
    /// health instead.
    fn apply_energy_cost(&mut self, id: EntityId, cost: f32) {
        if let Some(data) = self.objects.get_mut(id) {
            if data.energy >= cost {
                data.energy -= cost;
            } else {
                let deficit = cost - data.energy;
                data.energy = 0.0;
                data.health = (data.health - deficit).max(0.0);
            }
        }
    }

    /// Converts energy into health at the regen rate, capped by both the
    /// missing health and the energy on hand.
    fn regenerate_health(&mut self, id: EntityId) {
        let rate = self.config.regen_rate;
        if let Some(data) = self.objects.get_mut(id) {
            if data.health < 1.0 {
                let heal = rate.min(1.0 - data.health).min(data.energy);
                data.health = clamp01(data.health + heal);
                data.energy -= heal;
            }
        }
    }

    /// Reward is the tick's condition delta, weighting health three to one
    /// over energy, with a large negative pulse on the tick health runs out.
    fn learn_agent(&mut self, id: EntityId, prev_health: f32, prev_energy: f32) {
        let Some(data) = self.objects.get(id) else {
            return;
        };
        let mut reward = 3.0 * (data.health - prev_health) + (data.energy - prev_energy);
        if data.health <= 0.0 && prev_health > 0.0 {
            reward -= 10.0;
        }
        let learning_rate = self.config.learning_rate;
        let decay_factor = self.config.decay_factor;
        let decay_interval = self.config.decay_interval;
        if let Some(runtime) = self.runtime.get_mut(id) {
            runtime.brain.learn(reward, learning_rate);
            if runtime.age.is_multiple_of(decay_interval) {
                runtime.brain.decay(decay_factor);
            }
        }
    }

    /// Resolves overlaps around every agent. Agents are the only movers, so
    /// they drive the pair scan; neighbors come back in ascending id order.
    fn stage_collide(&mut self) {
        let agent_ids = self.rosters.agents.clone();
        for id in agent_ids {
            let Some(data) = self.objects.get(id) else {
                continue;
            };
            let center = data.position;
            let radius = data.shape.bounding_radius();
            for neighbor in self.objects_in_area(center, radius) {
                if neighbor != id {
                    self.resolve_pair(id, neighbor);
                }
            }
        }
    }

    /// Separates one overlapping pair. Circles push each other apart half
    /// the overlap each; a circle overlapping a rectangle is pushed out
    /// alone since walls never move. Exactly coincident centers are left
    /// alone rather than dividing by zero.
    fn resolve_pair(&mut self, a: EntityId, b: EntityId) {
        let Some(first) = self.objects.get(a) else {
            return;
        };
        let Some(second) = self.objects.get(b) else {
            return;
        };
        let (pos_a, shape_a) = (first.position, first.shape);
        let (pos_b, shape_b) = (second.position, second.shape);
        match (shape_a, shape_b) {
            (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
                let dx = pos_a.x - pos_b.x;
                let dy = pos_a.y - pos_b.y;
                let distance = (dx * dx + dy * dy).sqrt();
                let min_distance = ra + rb;
                if distance >= min_distance || distance <= 0.0 {
                    return;
                }
                let push = (min_distance - distance) * 0.5;
                let nx = dx / distance;
                let ny = dy / distance;
                if let Some(data) = self.objects.get_mut(a) {
                    data.position.x += nx * push;
                    data.position.y += ny * push;
                }
                if let Some(data) = self.objects.get_mut(b) {
                    data.position.x -= nx * push;
                    data.position.y -= ny * push;
                }
                self.relocate(a);
                self.relocate(b);
            }
            (Shape::Circle { radius }, Shape::Rect { half_w, half_h }) => {
                let closest_x = pos_a.x.clamp(pos_b.x - half_w, pos_b.x + half_w);
                let closest_y = pos_a.y.clamp(pos_b.y - half_h, pos_b.y + half_h);
                let dx = pos_a.x - closest_x;
                let dy = pos_a.y - closest_y;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance >= radius || distance <= 0.0 {
                    return;
                }
                let push = radius - distance;
                if let Some(data) = self.objects.get_mut(a) {
                    data.position.x += dx / distance * push;
                    data.position.y += dy / distance * push;
                }
                self.relocate(a);
            }
            (Shape::Rect { .. }, _) => {}
        }
    }

    /// Removes every agent queued for death this tick, once each, in queue
    /// order, and returns their obituaries.
    fn stage_death_sweep(&mut self) -> Vec<Obituary> {
        if self.pending_deaths.is_empty() {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let mut obituaries = Vec::new();
        for id in std::mem::take(&mut self.pending_deaths) {
            if !seen.insert(id) {
                continue;
            }
            let Some(runtime) = self.runtime.remove(id) else {
                continue;
            };
            obituaries.push(Obituary {
                id,
                score: runtime.score,
                age: runtime.age,
                brain: runtime.brain,
            });
            self.remove_object(id);
        }
        obituaries
    }

    /// Mutates every live controller in place using the world RNG.
    pub fn mutate_agents(&mut self, rate: f32, scale: f32) {
        for &id in &self.rosters.agents {
            if let Some(runtime) = self.runtime.get_mut(id) {
                runtime.brain.mutate(&mut self.rng, rate, scale);
            }
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    #[must_use]
    pub fn live_agents(&self) -> usize {
        self.rosters.agents.len()
    }

    /// Agent ids in spawn order.
    #[must_use]
    pub fn agent_ids(&self) -> &[EntityId] {
        &self.rosters.agents
    }

    /// Ids of every live object of `kind`, in spawn order.
    #[must_use]
    pub fn ids_of(&self, kind: ObjectKind) -> &[EntityId] {
        self.rosters.of(kind)
    }

    #[must_use]
    pub fn object(&self, id: EntityId) -> Option<&ObjectData> {
        self.objects.get(id)
    }

    /// Mutable object access. Position edits bypass the spatial index until
    /// the object's next relocation.
    pub fn object_mut(&mut self, id: EntityId) -> Option<&mut ObjectData> {
        self.objects.get_mut(id)
    }

    #[must_use]
    pub fn agent_runtime(&self, id: EntityId) -> Option<&AgentRuntime> {
        self.runtime.get(id)
    }

    pub fn agent_runtime_mut(&mut self, id: EntityId) -> Option<&mut AgentRuntime> {
        self.runtime.get_mut(id)
    }

    /// Detached copy of the world for render and stats consumers. Objects
    /// are listed walls first, then food, poison, and agents, each group in
    /// spawn order.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut objects = Vec::with_capacity(self.objects.len());
        for kind in [
            ObjectKind::Wall,
            ObjectKind::Food,
            ObjectKind::Poison,
            ObjectKind::Agent,
        ] {
            for &id in self.rosters.of(kind) {
                if let Some(data) = self.objects.get(id) {
                    objects.push(ObjectSnapshot {
                        id,
                        kind: data.kind,
                        position: data.position,
                        shape: data.shape,
                        color: data.color,
                        health: data.health,
                        energy: data.energy,
                    });
                }
            }
        }
        let mut agents = Vec::with_capacity(self.rosters.agents.len());
        for &id in &self.rosters.agents {
            if let Some(runtime) = self.runtime.get(id) {
                agents.push(AgentSnapshot {
                    id,
                    heading: runtime.heading,
                    age: runtime.age,
                    score: runtime.score,
                    vision: runtime.vision.clone(),
                    outputs: runtime.outputs,
                });
            }
        }
        WorldSnapshot {
            tick: self.tick,
            objects,
            agents,
        }
    }
}

/// One generation's outcome in the fitness time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitnessSample {
    pub generation: u64,
    /// Ticks the generation survived before rolling over.
    pub ticks: u64,
    pub best_score: i64,
}

/// Drives a world through generations, tracking the best controller seen
/// and seeding each new population from it.
#[derive(Debug)]
pub struct GenerationManager {
    config: SimulationConfig,
    world: World,
    generation: u64,
    ticks_in_generation: u64,
    best_id: Option<EntityId>,
    best_score: Option<i64>,
    best_brain: Option<NeuroBlob>,
    fitness: Vec<FitnessSample>,
}

impl GenerationManager {
    /// Builds the first generation with random controllers.
    pub fn new(config: SimulationConfig) -> Result<Self, WorldError> {
        let world = World::new(config.clone())?;
        Ok(Self {
            config,
            world,
            generation: 1,
            ticks_in_generation: 0,
            best_id: None,
            best_score: None,
            best_brain: None,
            fitness: Vec::new(),
        })
    }

    /// Steps the world once, refreshes best-agent tracking, and rolls the
    /// generation when the population is extinct or the tick budget is
    /// spent.
    pub fn advance(&mut self) -> TickReport {
        let report = self.world.step();
        self.ticks_in_generation += 1;
        self.observe(&report);
        let extinct = report.live_agents == 0;
        if extinct || self.ticks_in_generation >= self.config.generation_tick_budget {
            self.roll_generation(extinct);
        }
        report
    }

    /// Updates the best-agent pointer. Obituaries are checked first so a
    /// dying record holder's controller is captured before it is lost; live
    /// agents then compete on strict score improvement.
    fn observe(&mut self, report: &TickReport) {
        for obituary in &report.obituaries {
            let improved = self.best_score.is_none_or(|best| obituary.score > best);
            if improved {
                self.best_score = Some(obituary.score);
                self.best_id = None;
                self.best_brain = Some(obituary.brain.clone());
            } else if self.best_id == Some(obituary.id) {
                self.best_id = None;
                self.best_brain = Some(obituary.brain.clone());
            }
        }
        for &id in self.world.agent_ids() {
            let Some(runtime) = self.world.agent_runtime(id) else {
                continue;
            };
            if self.best_score.is_none_or(|best| runtime.score > best) {
                self.best_score = Some(runtime.score);
                self.best_id = Some(id);
                self.best_brain = None;
            }
        }
    }

    fn roll_generation(&mut self, extinct: bool) {
        let inherited = self.best_controller();
        let best_score = self.best_score.unwrap_or(0);
        self.fitness.push(FitnessSample {
            generation: self.generation,
            ticks: self.ticks_in_generation,
            best_score,
        });
        info!(
            generation = self.generation,
            ticks = self.ticks_in_generation,
            best_score,
            cause = if extinct { "extinction" } else { "tick budget" },
            "generation rolled"
        );
        self.generation += 1;
        self.ticks_in_generation = 0;
        self.best_id = None;
        self.best_score = None;
        self.best_brain = None;
        self.world.reset();
        if let Some(brain) = inherited {
            self.install_population(&brain, true);
        }
    }

    /// Best controller available right now: the live record holder if it is
    /// still alive, else the one captured at its death, else the first live
    /// agent (after a roll that is the unmutated heir).
    #[must_use]
    pub fn best_controller(&self) -> Option<NeuroBlob> {
        if let Some(id) = self.best_id
            && let Some(runtime) = self.world.agent_runtime(id)
        {
            return Some(runtime.brain.clone());
        }
        if self.best_brain.is_some() {
            return self.best_brain.clone();
        }
        let first = *self.world.agent_ids().first()?;
        self.world
            .agent_runtime(first)
            .map(|runtime| runtime.brain.clone())
    }

    /// Clones `brain` into every live agent. With `mutate_clones` set, every
    /// copy after the first is perturbed, keeping one faithful heir.
    fn install_population(&mut self, brain: &NeuroBlob, mutate_clones: bool) {
        let ids = self.world.agent_ids().to_vec();
        for (index, id) in ids.into_iter().enumerate() {
            let mut clone = brain.clone();
            if mutate_clones && index > 0 {
                clone.mutate(
                    self.world.rng(),
                    self.config.mutation_rate,
                    self.config.mutation_scale,
                );
            }
            if let Some(runtime) = self.world.agent_runtime_mut(id) {
                runtime.brain = clone;
            }
        }
    }

    /// Loads a controller from disk and seeds the current population with
    /// it, as if it were the inherited best. A failure keeps the random
    /// population and logs the cause.
    pub fn preload_controller(&mut self, path: impl AsRef<std::path::Path>) {
        let path = path.as_ref();
        match NeuroBlob::load(self.config.brain_topology(), path) {
            Ok(brain) => {
                info!(path = %path.display(), "preloaded controller into the population");
                self.install_population(&brain, true);
                self.best_brain = Some(brain);
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "controller preload failed, keeping random population"
                );
            }
        }
    }

    /// Replaces every live controller with an exact copy of `brain` and
    /// remembers it as the inherited best.
    pub fn install_controller(&mut self, brain: NeuroBlob) {
        self.install_population(&brain, false);
        self.best_brain = Some(brain);
    }

    /// Perturbs every live controller with the configured mutation rates.
    pub fn mutate_population(&mut self) {
        self.world
            .mutate_agents(self.config.mutation_rate, self.config.mutation_scale);
    }

    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Generation currently running, starting at 1.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn ticks_in_generation(&self) -> u64 {
        self.ticks_in_generation
    }

    #[must_use]
    pub const fn best_score(&self) -> Option<i64> {
        self.best_score
    }

    /// One sample per completed generation, oldest first.
    #[must_use]
    pub fn fitness_series(&self) -> &[FitnessSample] {
        &self.fitness
    }
}

/// Runtime control surface mirrored by the CLI.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Persist the best controller to the given path.
    SaveController(PathBuf),
    /// Replace every live controller from the given path.
    LoadController(PathBuf),
    /// Perturb every live controller once.
    MutatePopulation,
}

/// Applies one control command between ticks. Persistence failures are
/// logged and leave the simulation running.
pub fn apply_control_command(manager: &mut GenerationManager, command: ControlCommand) {
    match command {
        ControlCommand::SaveController(path) => match manager.best_controller() {
            Some(brain) => match brain.save(&path) {
                Ok(()) => info!(path = %path.display(), "saved best controller"),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "controller save failed");
                }
            },
            None => warn!("no live controller to save"),
        },
        ControlCommand::LoadController(path) => {
            match NeuroBlob::load(manager.config().brain_topology(), &path) {
                Ok(brain) => {
                    manager.install_controller(brain);
                    info!(path = %path.display(), "installed controller into live population");
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "controller load failed, population unchanged"
                    );
                }
            }
        }
        ControlCommand::MutatePopulation => {
            manager.mutate_population();
            debug!("mutated every live controller");
        }
    }
}
