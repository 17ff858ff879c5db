//! A rule and its trigger / prereq / action evaluation protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::Engine;
use crate::error::WorldResult;
use crate::keys::Subject;

/// Named bundle of trigger, prereq, and action function names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    name: String,
    triggers: Vec<String>,
    prereqs: Vec<String>,
    actions: Vec<String>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triggers: Vec::new(),
            prereqs: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Builder: append a trigger.
    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.triggers.push(trigger.into());
        self
    }

    /// Builder: append a prereq.
    pub fn with_prereq(mut self, prereq: impl Into<String>) -> Self {
        self.prereqs.push(prereq.into());
        self
    }

    /// Builder: append an action.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    pub fn prereqs(&self) -> &[String] {
        &self.prereqs
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn push_trigger(&mut self, trigger: impl Into<String>) {
        self.triggers.push(trigger.into());
    }

    pub fn push_prereq(&mut self, prereq: impl Into<String>) {
        self.prereqs.push(prereq.into());
    }

    pub fn push_action(&mut self, action: impl Into<String>) {
        self.actions.push(action.into());
    }

    /// Remove every occurrence of `trigger`. Returns whether any was removed.
    pub fn remove_trigger(&mut self, trigger: &str) -> bool {
        remove_all(&mut self.triggers, trigger)
    }

    pub fn remove_prereq(&mut self, prereq: &str) -> bool {
        remove_all(&mut self.prereqs, prereq)
    }

    pub fn remove_action(&mut self, action: &str) -> bool {
        remove_all(&mut self.actions, action)
    }

    /// The same function lists under another name.
    pub fn duplicate(&self, new_name: impl Into<String>) -> Rule {
        Rule {
            name: new_name.into(),
            ..self.clone()
        }
    }

    /// Evaluate the rule against `subject` at the engine's current time.
    ///
    /// Triggers are OR-ed and prereqs AND-ed, both short-circuiting. Actions
    /// run only if both pass; their return values are collected in order, so
    /// an empty result means the rule did not fire. The engine's time is put
    /// back after every single call, including failing ones.
    pub fn invoke(&self, engine: &mut Engine, subject: &Subject) -> WorldResult<Vec<Value>> {
        let mut engine = engine.preserve_time();

        let mut triggered = false;
        for name in &self.triggers {
            let trigger = engine.triggers().resolve(name)?;
            triggered = engine.call(|engine| trigger(engine, subject))?;
            if triggered {
                break;
            }
        }
        if !triggered {
            return Ok(Vec::new());
        }

        for name in &self.prereqs {
            let prereq = engine.prereqs().resolve(name)?;
            if !engine.call(|engine| prereq(engine, subject))? {
                return Ok(Vec::new());
            }
        }

        let mut results = Vec::with_capacity(self.actions.len());
        for name in &self.actions {
            let action = engine.actions().resolve(name)?;
            results.push(engine.call(|engine| action(engine, subject))?);
        }
        Ok(results)
    }
}

fn remove_all(list: &mut Vec<String>, name: &str) -> bool {
    let before = list.len();
    list.retain(|entry| entry != name);
    list.len() != before
}
