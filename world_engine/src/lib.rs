//! # World Engine
//!
//! A world model for life simulations. Characters are graphs of places,
//! things, and portals whose every fact lives in the `timeline` crate, so the
//! whole world can be read at any branch and tick. Rules attach to those
//! graphs through rulebooks and fire once per turn.
//!
//! ## Core Components
//!
//! - **engine**: the clock, turn advancement, and access to everything else
//! - **graph**: character graphs, their nodes, portals, avatars, and senses
//! - **rule**: rules, rulebooks, and the per-rulebook activation mapping
//! - **facade**: copy-on-write views that never write back to the world
//! - **store**: in-memory and file-backed persistence
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use world_engine::{CharacterView, Engine, EngineConfig, RulebookOverrides};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! let mut world = engine.new_character("world", RulebookOverrides::new())?;
//! world.add_place("square")?;
//! world.add_thing("cart", "square", None)?;
//! world.set_node_stat("cart", "load", json!(3))?;
//!
//! engine.next_turn()?;
//! engine.character_mut("world")?.del_node("cart")?;
//!
//! engine.set_tick(0);
//! assert!(engine.character("world")?.has_thing("cart")?);
//! # Ok::<(), world_engine::WorldError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod function;
pub mod graph;
pub mod keys;
pub mod rule;
pub mod store;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use facade::*;
pub use function::*;
pub use graph::*;
pub use keys::*;
pub use rule::*;
pub use store::*;

pub use timeline::{BranchId, Record, Tick, Time};
