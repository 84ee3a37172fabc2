//! Derived models: subtractive variants of an assembled base model.
//!
//! A [`Derivation`] records removals, initial overrides, and additions
//! against a base [`Model`], then rebuilds a dense, fully re-validated model
//! in one shot. Nothing is mutated until [`Derivation::finish`], which
//! either commits a complete model or fails without side effects.
//!
//! Parameters referenced only by removed rules are pruned automatically;
//! explicitly removing a parameter that a surviving component still
//! references is an error. Molecule types and their handles are carried
//! over unchanged, so patterns built against the base remain valid in the
//! derived model.

use crate::canonical::species_key;
use crate::model::{Model, ModelError, ParameterId, RuleId};
use crate::pattern::{ComplexPattern, PatternContext};
use crate::species::SpeciesGraph;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while finishing a derivation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("parameter `{parameter}` is still referenced by `{component}` and cannot be removed")]
    ParameterInUse { parameter: String, component: String },
    #[error("no initial condition of the base model matches the override pattern `{species}`")]
    UnknownInitial { species: String },
}

/// One queued initial override or addition.
struct InitialEdit {
    pattern: ComplexPattern,
    population: ParameterId,
    /// `true` replaces the matching base initial, `false` appends.
    replace: bool,
}

/// A pending derived model.
pub struct Derivation {
    base: Model,
    name: String,
    removed_rules: HashSet<RuleId>,
    removed_parameters: HashSet<ParameterId>,
    initial_edits: Vec<InitialEdit>,
}

impl Model {
    /// Starts a derivation of this model under a new name.
    pub fn derive(&self, name: impl Into<String>) -> Derivation {
        Derivation {
            base: self.clone(),
            name: name.into(),
            removed_rules: HashSet::new(),
            removed_parameters: HashSet::new(),
            initial_edits: Vec::new(),
        }
    }
}

impl Derivation {
    /// Drops a rule from the derived model. Parameters the rule alone
    /// referenced are pruned at finish.
    pub fn remove_rule(mut self, rule: RuleId) -> Self {
        self.removed_rules.insert(rule);
        self
    }

    /// Drops a parameter. Finishing fails if any surviving rule or initial
    /// still references it.
    pub fn remove_parameter(mut self, parameter: ParameterId) -> Self {
        self.removed_parameters.insert(parameter);
        self
    }

    /// Re-seeds a base initial with a different population parameter.
    ///
    /// The pattern must be concrete and canonically equal to one of the
    /// base model's initials.
    pub fn override_initial(mut self, pattern: ComplexPattern, population: ParameterId) -> Self {
        self.initial_edits.push(InitialEdit {
            pattern,
            population,
            replace: true,
        });
        self
    }

    /// Seeds an additional species in the derived model.
    pub fn add_initial(mut self, pattern: ComplexPattern, population: ParameterId) -> Self {
        self.initial_edits.push(InitialEdit {
            pattern,
            population,
            replace: false,
        });
        self
    }

    /// Validates every queued edit and rebuilds the derived model densely.
    ///
    /// The rebuilt model goes back through the ordinary declaration path,
    /// so all assembly invariants are re-checked; surviving components get
    /// fresh dense handles with parameter references remapped.
    pub fn finish(self) -> Result<Model, ComposeError> {
        let base = &self.base;
        for &rule in &self.removed_rules {
            base.check_rule(rule)?;
        }
        for &param in &self.removed_parameters {
            base.check_parameter(param)?;
        }

        // Resolve initial overrides against base canonical keys.
        let mut populations: Vec<ParameterId> =
            base.initials().map(|(_, i)| i.population).collect();
        let mut appended: Vec<(ComplexPattern, ParameterId)> = Vec::new();
        for (ei, edit) in self.initial_edits.iter().enumerate() {
            if !edit.replace {
                appended.push((edit.pattern.clone(), edit.population));
                continue;
            }
            let component = format!("initial override #{ei}");
            edit.pattern
                .validate(base, &component, PatternContext::Counting)?;
            let graph = SpeciesGraph::from_concrete(&edit.pattern, base)?;
            let key = species_key(&graph);
            let slot = base
                .initials()
                .position(|(_, i)| i.key() == key)
                .ok_or_else(|| ComposeError::UnknownInitial {
                    species: graph.render(base),
                })?;
            populations[slot] = edit.population;
        }

        // Which parameters each surviving component references.
        let survives = |id: RuleId| !self.removed_rules.contains(&id);
        let mut referenced_by: Vec<Option<String>> = vec![None; base.parameters().count()];
        let mut mark = |param: ParameterId, component: &str| {
            let slot = &mut referenced_by[param.index()];
            if slot.is_none() {
                *slot = Some(component.to_string());
            }
        };
        for (_, rule) in base.rules().filter(|(id, _)| survives(*id)) {
            mark(rule.forward, &rule.name);
            if let Some(rev) = rule.reverse {
                mark(rev, &rule.name);
            }
        }
        for (idx, _) in base.initials().enumerate() {
            mark(populations[idx], &format!("initial #{idx}"));
        }
        for (_, pop) in &appended {
            mark(*pop, "added initial");
        }

        for &param in &self.removed_parameters {
            if let Some(component) = &referenced_by[param.index()] {
                return Err(ComposeError::ParameterInUse {
                    parameter: base.parameter(param).name.clone(),
                    component: component.clone(),
                });
            }
        }

        // A parameter is pruned when a removed rule referenced it and no
        // surviving component does.
        let mut orphaned: HashSet<ParameterId> = HashSet::new();
        for (_, rule) in base.rules().filter(|(id, _)| !survives(*id)) {
            for param in std::iter::once(rule.forward).chain(rule.reverse) {
                if referenced_by[param.index()].is_none() {
                    orphaned.insert(param);
                }
            }
        }

        // Dense rebuild through the ordinary declaration path.
        let mut derived = Model::new(self.name.clone());
        for (_, ty) in base.molecule_types() {
            derived.add_molecule_type(ty.clone())?;
        }
        let mut param_map: Vec<Option<ParameterId>> = vec![None; base.parameters().count()];
        for (id, param) in base.parameters() {
            if self.removed_parameters.contains(&id) || orphaned.contains(&id) {
                continue;
            }
            param_map[id.index()] = Some(derived.add_parameter(param.name.clone(), param.value)?);
        }
        let remap = |param: ParameterId| -> ParameterId {
            param_map[param.index()].expect("surviving components reference surviving parameters")
        };

        let mut rule_map: Vec<Option<RuleId>> = vec![None; base.rules().count()];
        for (id, rule) in base.rules().filter(|(id, _)| survives(*id)) {
            let mut rebuilt = rule.clone();
            rebuilt.forward = remap(rule.forward);
            rebuilt.reverse = rule.reverse.map(remap);
            rule_map[id.index()] = Some(derived.add_rule(rebuilt)?);
        }
        for (id, note) in self.base.review_notes() {
            if let Some(new_id) = rule_map[id.index()] {
                derived.review_note(new_id, note.clone())?;
            }
        }

        for (idx, (_, init)) in base.initials().enumerate() {
            derived.add_initial(init.pattern.clone(), remap(populations[idx]))?;
        }
        for (pattern, pop) in appended {
            derived.add_initial(pattern, remap(pop))?;
        }
        for (_, obs) in base.observables() {
            derived.add_observable(obs.name.clone(), obs.patterns.clone())?;
        }
        Ok(derived)
    }
}
