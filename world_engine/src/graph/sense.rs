//! Senses: how one character perceives another.
//!
//! A sense binding maps a sense name to a registered sense function and is
//! versioned like any other record. Sensing hands the function a fresh facade
//! of the observed character, so whatever the function changes stays in the
//! returned facade.

use serde_json::Value;
use tracing::debug;

use super::{Character, CharacterMut};
use crate::error::{WorldError, WorldResult};
use crate::facade::Facade;
use crate::keys::WorldEntity;

impl<'e> Character<'e> {
    /// Names of the senses bound right now.
    pub fn senses(&self) -> WorldResult<Vec<String>> {
        self.engine.stat_keys(&self.senses_entity())
    }

    /// Name of the function bound to `sense`.
    pub fn sense_function(&self, sense: &str) -> WorldResult<String> {
        match self.engine.read_stat(&self.senses_entity(), sense)? {
            Some(Value::String(function)) => Ok(function),
            Some(other) => Err(WorldError::Corruption(format!(
                "sense {sense} of {} is bound to {other}",
                self.name
            ))),
            None => Err(WorldError::not_found(format!("sense {sense} of {}", self.name))),
        }
    }

    /// Perceive `observed` through `sense`.
    pub fn sense(&self, sense: &str, observed: &str) -> WorldResult<Facade<'e>> {
        let function = self
            .engine
            .senses()
            .resolve(&self.sense_function(sense)?)?;
        let observed = self.engine.character(observed)?;
        function(self.engine, &self.name, Facade::new(observed))
    }

    fn senses_entity(&self) -> WorldEntity {
        WorldEntity::Senses(self.name.clone())
    }
}

impl CharacterMut<'_> {
    /// Bind `sense` to a registered sense function from now on.
    pub fn set_sense(&mut self, sense: &str, function: &str) -> WorldResult<()> {
        self.engine.senses().resolve(function)?;
        let entity = self.view().senses_entity();
        self.engine
            .write(entity, sense, Value::String(function.to_string()))?;
        debug!(character = %self.name, sense, function, "bound sense");
        Ok(())
    }

    pub fn del_sense(&mut self, sense: &str) -> WorldResult<()> {
        self.view().sense_function(sense)?;
        let entity = self.view().senses_entity();
        self.engine.write(entity, sense, Value::Null)
    }
}
