//! The turn loop.
//!
//! Each turn advances the tick, then walks characters, their six rulebook
//! bindings, the active rules of each bound rulebook, and finally the subjects
//! those rules apply to, invoking each rule once per subject.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use timeline::Time;

use super::Engine;
use crate::config::RuleErrorPolicy;
use crate::error::{WorldError, WorldResult};
use crate::keys::{BookType, Subject};
use crate::rule::RuleFollower;

/// A rule that fired for one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleFiring {
    pub rule: String,
    pub subject: Subject,
    /// Return values of the rule's actions, in order.
    pub results: Vec<Value>,
}

/// A rule whose evaluation failed and was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSkip {
    pub rule: String,
    pub subject: Subject,
    pub error: WorldError,
}

/// What happened during one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub time: Time,
    pub fired: Vec<RuleFiring>,
    pub skipped: Vec<RuleSkip>,
}

impl TurnReport {
    fn new(time: Time) -> Self {
        Self {
            time,
            fired: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// How many times `rule` fired.
    pub fn fire_count(&self, rule: &str) -> usize {
        self.fired.iter().filter(|firing| firing.rule == rule).count()
    }
}

impl Engine {
    /// Advance one tick and follow every active rule.
    ///
    /// Only the tip of a branch can advance; a rewound engine must fork first.
    pub fn next_turn(&mut self) -> WorldResult<TurnReport> {
        let tip = self.branches.tip(&self.time.branch)?;
        if self.time.tick < tip {
            return Err(WorldError::Corruption(format!(
                "cannot advance from {}, the branch tip is {tip}",
                self.time
            )));
        }
        self.time.tick += 1;
        self.branches.advance_tip(&self.time)?;
        info!(time = %self.time, "turn started");

        let report = self.follow_rules()?;
        info!(
            time = %self.time,
            fired = report.fired.len(),
            skipped = report.skipped.len(),
            "turn finished"
        );
        Ok(report)
    }

    /// Follow every active rule at the current time without advancing it.
    ///
    /// Rules may delete characters and rules as they go. A character deleted
    /// mid-turn follows nothing more this turn, and a rule deleted before its
    /// turn comes is passed over.
    pub fn follow_rules(&mut self) -> WorldResult<TurnReport> {
        let mut report = TurnReport::new(self.time.clone());
        for character in self.character_names()? {
            'books: for book in BookType::ALL {
                if !self.has_character(&character)? {
                    debug!(%character, "character deleted during the turn");
                    break;
                }
                let (rules, subjects) = {
                    let follower = RuleFollower::new(self, character.as_str(), book);
                    let rules = follower.active_rules()?;
                    if rules.is_empty() {
                        continue;
                    }
                    (rules, follower.subjects()?)
                };
                for name in rules {
                    if !self.has_character(&character)? {
                        debug!(%character, "character deleted during the turn");
                        break 'books;
                    }
                    let rule = match self.rule_store().rule(&name) {
                        Some(rule) => rule.clone(),
                        None => {
                            debug!(rule = %name, "rule deleted during the turn");
                            continue;
                        }
                    };
                    for subject in &subjects {
                        match rule.invoke(self, subject) {
                            Ok(results) if results.is_empty() => {}
                            Ok(results) => {
                                debug!(rule = %name, %subject, "rule fired");
                                report.fired.push(RuleFiring {
                                    rule: name.clone(),
                                    subject: subject.clone(),
                                    results,
                                });
                            }
                            Err(error) => match self.config.on_rule_error {
                                RuleErrorPolicy::Abort => return Err(error),
                                RuleErrorPolicy::Skip => {
                                    warn!(rule = %name, %subject, %error, "rule failed, skipping");
                                    report.skipped.push(RuleSkip {
                                        rule: name.clone(),
                                        subject: subject.clone(),
                                        error,
                                    });
                                }
                            },
                        }
                    }
                }
            }
        }
        Ok(report)
    }
}
