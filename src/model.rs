//! Model vocabulary: molecule types, parameters, rules, initials, observables.
//!
//! A [`Model`] is an immutable-once-declared collection of components with a
//! uniqueness invariant on names across all component kinds and referential
//! integrity between components. Declarations return typed handles
//! ([`MoleculeTypeId`], [`ParameterId`], ...) which are the only way later
//! components may refer to earlier ones; there is no name-based lookup on the
//! hot path.
//!
//! All malformed-model conditions are detected here, at assembly time, and
//! reported as [`ModelError`] naming the offending component. A `Model` that
//! assembled successfully is safe to hand to the network generator.
//!
//! # Citations
//! - Rule-based model structure: Faeder, Blinov & Hlavacek, "Rule-based
//!   modeling of biochemical systems with BioNetGen" (2009)
//! - Component vocabulary: Lopez et al., "Programming biological models in
//!   Python using PySB" (2013)

use crate::canonical::{canonicalize, SpeciesKey};
use crate::pattern::{ComplexPattern, PatternContext};
use crate::rewrite::compile_rule;
use crate::species::SpeciesGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Handle for a declared molecule type.
///
/// # Invariant
/// Valid only for the `Model` that issued it (and models derived from it).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoleculeTypeId(u32);

impl MoleculeTypeId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MoleculeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MoleculeTypeId({})", self.0)
    }
}

/// Handle for a declared rate or population parameter.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterId(u32);

impl ParameterId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Handle for a declared rule.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(u32);

impl RuleId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Handle for a declared observable.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservableId(u32);

impl ObservableId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Handle for a declared initial condition.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitialId(u32);

impl InitialId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Index of an internal state within a site's declared state list.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(u16);

impl StateId {
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(&self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A binding site on a molecule type.
///
/// A site with an empty state list is bond-only; a non-empty list declares
/// the finite set of internal states the site can take (e.g. `u`/`p` for an
/// unphosphorylated/phosphorylated tyrosine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDef {
    pub name: String,
    pub states: Vec<String>,
}

impl SiteDef {
    pub fn bond_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
        }
    }

    pub fn with_states<I, S>(name: impl Into<String>, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            states: states.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this site carries an internal state set.
    #[inline]
    pub fn has_states(&self) -> bool {
        !self.states.is_empty()
    }
}

/// A molecule type: a name plus an ordered set of site definitions.
///
/// Declared once per model and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoleculeType {
    pub name: String,
    pub sites: Vec<SiteDef>,
}

impl MoleculeType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sites: Vec::new(),
        }
    }

    pub fn with_site(mut self, site: SiteDef) -> Self {
        self.sites.push(site);
        self
    }

    /// Looks up a site index by name.
    pub fn site(&self, name: &str) -> Option<usize> {
        self.sites.iter().position(|s| s.name == name)
    }

    /// Looks up a state index by name within the given site.
    pub fn state(&self, site: usize, name: &str) -> Option<StateId> {
        self.sites.get(site).and_then(|s| {
            s.states
                .iter()
                .position(|n| n == name)
                .map(|i| StateId::new(i as u16))
        })
    }
}

/// A named scalar, immutable once bound into an initial or rule rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
}

/// An interaction rule: reactant patterns, product patterns, and rates.
///
/// A present `reverse` rate makes the rule reversible: logically two
/// complementary rules with reactant and product roles swapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub reactants: Vec<ComplexPattern>,
    pub products: Vec<ComplexPattern>,
    pub forward: ParameterId,
    pub reverse: Option<ParameterId>,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        reactants: Vec<ComplexPattern>,
        products: Vec<ComplexPattern>,
        forward: ParameterId,
    ) -> Self {
        Self {
            name: name.into(),
            reactants,
            products,
            forward,
            reverse: None,
        }
    }

    pub fn reversible(mut self, reverse: ParameterId) -> Self {
        self.reverse = Some(reverse);
        self
    }
}

/// An initial condition: a concrete species seeded with a population.
///
/// The concrete graph and its canonical key are resolved at declaration time
/// so duplicate initials collide immediately, not during generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Initial {
    pub pattern: ComplexPattern,
    pub population: ParameterId,
    pub(crate) graph: SpeciesGraph,
    pub(crate) key: SpeciesKey,
}

impl Initial {
    /// Canonical key of the seeded species.
    #[inline]
    pub fn key(&self) -> SpeciesKey {
        self.key
    }

    /// Canonical graph of the seeded species.
    #[inline]
    pub fn graph(&self) -> &SpeciesGraph {
        &self.graph
    }
}

/// A derived quantity: one or more counting patterns with sum semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observable {
    pub name: String,
    pub patterns: Vec<ComplexPattern>,
}

/// Component kinds, used for duplicate-name reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentKind {
    MoleculeType,
    Parameter,
    Rule,
    Observable,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentKind::MoleculeType => "molecule type",
            ComponentKind::Parameter => "parameter",
            ComponentKind::Rule => "rule",
            ComponentKind::Observable => "observable",
        };
        f.write_str(s)
    }
}

/// Errors detected while assembling a model.
///
/// Every variant names the offending component so the error is actionable
/// without source positions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("name `{name}` already declared as a {existing}")]
    DuplicateName { name: String, existing: ComponentKind },
    #[error("handle {handle} does not refer to a declared {kind}")]
    UnknownHandle { kind: ComponentKind, handle: u32 },
    #[error("pattern in `{component}` gives {got} site conditions for molecule type `{molecule}` which declares {expected} sites")]
    SiteCountMismatch {
        component: String,
        molecule: String,
        expected: usize,
        got: usize,
    },
    #[error("pattern in `{component}` uses undeclared state {state} on site `{molecule}.{site}`")]
    UnknownState {
        component: String,
        molecule: String,
        site: String,
        state: u16,
    },
    #[error("pattern in `{component}` sets a state on stateless site `{molecule}.{site}`")]
    StateOnStatelessSite {
        component: String,
        molecule: String,
        site: String,
    },
    #[error("bond label {label} appears {count} time(s) in one pattern of `{component}`; bond labels must appear exactly twice")]
    BondLabelArity {
        component: String,
        label: u32,
        count: usize,
    },
    #[error("rule `{component}` uses a WILD bond condition; WILD is only valid in counting patterns (observables and initials)")]
    WildInRule { component: String },
    #[error("initial condition is not concrete: site `{molecule}.{site}` is not fully specified")]
    NotConcrete { molecule: String, site: String },
    #[error("initial population parameter `{parameter}` is negative ({value})")]
    NegativePopulation { parameter: String, value: f64 },
    #[error("initial condition pattern is not a single connected complex")]
    InitialNotConnected,
    #[error("duplicate initial condition for canonical species `{species}`")]
    DuplicateInitial { species: String },
    #[error("rule `{rule}` mentions site `{molecule}.{site}` on only one side; corresponding molecules must mention the same sites")]
    SiteMentionAsymmetry {
        rule: String,
        molecule: String,
        site: String,
    },
    #[error("rule `{rule}` changes the bond of site `{molecule}.{site}` whose reactant condition is a wildcard; the bond to break or form is ambiguous")]
    AmbiguousBondChange {
        rule: String,
        molecule: String,
        site: String,
    },
    #[error("rule `{rule}` synthesizes molecule `{molecule}` with non-concrete site `{site}`")]
    SynthesisNotConcrete {
        rule: String,
        molecule: String,
        site: String,
    },
}

/// A named, validated collection of model components.
///
/// # Invariants
/// - Component names are unique across all kinds.
/// - Every handle stored inside a component refers to a declared component.
/// - Rules and initials hold only patterns that validated against the
///   declared molecule types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    name: String,
    molecule_types: Vec<MoleculeType>,
    parameters: Vec<Parameter>,
    rules: Vec<Rule>,
    initials: Vec<Initial>,
    observables: Vec<Observable>,
    names: HashMap<String, ComponentKind>,
    review_notes: Vec<(RuleId, String)>,
}

impl Model {
    /// Creates a new, empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            molecule_types: Vec::new(),
            parameters: Vec::new(),
            rules: Vec::new(),
            initials: Vec::new(),
            observables: Vec::new(),
            names: HashMap::new(),
            review_notes: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn claim_name(&mut self, name: &str, kind: ComponentKind) -> Result<(), ModelError> {
        if let Some(&existing) = self.names.get(name) {
            return Err(ModelError::DuplicateName {
                name: name.to_string(),
                existing,
            });
        }
        self.names.insert(name.to_string(), kind);
        Ok(())
    }

    /// Declares a molecule type and returns its handle.
    pub fn add_molecule_type(&mut self, ty: MoleculeType) -> Result<MoleculeTypeId, ModelError> {
        self.claim_name(&ty.name, ComponentKind::MoleculeType)?;
        let id = MoleculeTypeId::new(self.molecule_types.len() as u32);
        self.molecule_types.push(ty);
        Ok(id)
    }

    /// Declares a scalar parameter and returns its handle.
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        value: f64,
    ) -> Result<ParameterId, ModelError> {
        let name = name.into();
        self.claim_name(&name, ComponentKind::Parameter)?;
        let id = ParameterId::new(self.parameters.len() as u32);
        self.parameters.push(Parameter { name, value });
        Ok(id)
    }

    /// Declares a rule, validating its patterns and its rewrite structure.
    ///
    /// Rejects WILD conditions anywhere in the rule, bond-label pairing
    /// violations, undeclared states, and reactant/product sides whose
    /// corresponding molecules mention different sites. Both directions of a
    /// reversible rule are validated independently.
    pub fn add_rule(&mut self, rule: Rule) -> Result<RuleId, ModelError> {
        self.check_parameter(rule.forward)?;
        if let Some(rev) = rule.reverse {
            self.check_parameter(rev)?;
        }
        for pat in rule.reactants.iter().chain(rule.products.iter()) {
            pat.validate(self, &rule.name, PatternContext::Rule)?;
        }
        // Correspondence and bond-change validation; compiled output is
        // rebuilt by the generator, only the checks matter here.
        compile_rule(&rule, self)?;
        self.claim_name(&rule.name, ComponentKind::Rule)?;
        let id = RuleId::new(self.rules.len() as u32);
        self.rules.push(rule);
        Ok(id)
    }

    /// Declares an initial condition and returns its handle.
    ///
    /// The pattern must be a single connected, fully concrete complex; its
    /// canonical form must not collide with an already-declared initial.
    pub fn add_initial(
        &mut self,
        pattern: ComplexPattern,
        population: ParameterId,
    ) -> Result<InitialId, ModelError> {
        self.check_parameter(population)?;
        let value = self.parameter_value(population);
        if value < 0.0 {
            return Err(ModelError::NegativePopulation {
                parameter: self.parameter(population).name.clone(),
                value,
            });
        }
        let component = format!("initial #{}", self.initials.len());
        pattern.validate(self, &component, PatternContext::Counting)?;
        let graph = SpeciesGraph::from_concrete(&pattern, self)?;
        if !graph.is_connected() {
            return Err(ModelError::InitialNotConnected);
        }
        let canon = canonicalize(&graph);
        if self.initials.iter().any(|i| i.key == canon.key) {
            return Err(ModelError::DuplicateInitial {
                species: canon.graph.render(self),
            });
        }
        let id = InitialId::new(self.initials.len() as u32);
        self.initials.push(Initial {
            pattern,
            population,
            graph: canon.graph,
            key: canon.key,
        });
        Ok(id)
    }

    /// Declares an observable over one or more counting patterns.
    pub fn add_observable(
        &mut self,
        name: impl Into<String>,
        patterns: Vec<ComplexPattern>,
    ) -> Result<ObservableId, ModelError> {
        let name = name.into();
        for pat in &patterns {
            pat.validate(self, &name, PatternContext::Counting)?;
        }
        self.claim_name(&name, ComponentKind::Observable)?;
        let id = ObservableId::new(self.observables.len() as u32);
        self.observables.push(Observable { name, patterns });
        Ok(id)
    }

    /// Attaches a domain-review note to a rule.
    ///
    /// Used where corpus variants of a rule disagree on exact-partner versus
    /// wildcard binding; the model records the distinction instead of
    /// silently unifying it.
    pub fn review_note(&mut self, rule: RuleId, note: impl Into<String>) -> Result<(), ModelError> {
        self.check_rule(rule)?;
        self.review_notes.push((rule, note.into()));
        Ok(())
    }

    /// Rules flagged for domain-expert review.
    pub fn review_notes(&self) -> &[(RuleId, String)] {
        &self.review_notes
    }

    // ---- handle validation ------------------------------------------------

    pub(crate) fn check_molecule_type(&self, id: MoleculeTypeId) -> Result<(), ModelError> {
        if id.index() >= self.molecule_types.len() {
            return Err(ModelError::UnknownHandle {
                kind: ComponentKind::MoleculeType,
                handle: id.0,
            });
        }
        Ok(())
    }

    pub(crate) fn check_parameter(&self, id: ParameterId) -> Result<(), ModelError> {
        if id.index() >= self.parameters.len() {
            return Err(ModelError::UnknownHandle {
                kind: ComponentKind::Parameter,
                handle: id.0,
            });
        }
        Ok(())
    }

    pub(crate) fn check_rule(&self, id: RuleId) -> Result<(), ModelError> {
        if id.index() >= self.rules.len() {
            return Err(ModelError::UnknownHandle {
                kind: ComponentKind::Rule,
                handle: id.0,
            });
        }
        Ok(())
    }

    // ---- accessors --------------------------------------------------------

    pub fn molecule_type(&self, id: MoleculeTypeId) -> &MoleculeType {
        &self.molecule_types[id.index()]
    }

    pub fn molecule_types(&self) -> impl Iterator<Item = (MoleculeTypeId, &MoleculeType)> {
        self.molecule_types
            .iter()
            .enumerate()
            .map(|(i, ty)| (MoleculeTypeId::new(i as u32), ty))
    }

    pub fn parameter(&self, id: ParameterId) -> &Parameter {
        &self.parameters[id.index()]
    }

    pub fn parameter_value(&self, id: ParameterId) -> f64 {
        self.parameters[id.index()].value
    }

    pub fn parameters(&self) -> impl Iterator<Item = (ParameterId, &Parameter)> {
        self.parameters
            .iter()
            .enumerate()
            .map(|(i, p)| (ParameterId::new(i as u32), p))
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, r)| (RuleId::new(i as u32), r))
    }

    pub fn initial(&self, id: InitialId) -> &Initial {
        &self.initials[id.index()]
    }

    pub fn initials(&self) -> impl Iterator<Item = (InitialId, &Initial)> {
        self.initials
            .iter()
            .enumerate()
            .map(|(i, init)| (InitialId::new(i as u32), init))
    }

    pub fn observable(&self, id: ObservableId) -> &Observable {
        &self.observables[id.index()]
    }

    pub fn observables(&self) -> impl Iterator<Item = (ObservableId, &Observable)> {
        self.observables
            .iter()
            .enumerate()
            .map(|(i, o)| (ObservableId::new(i as u32), o))
    }

    /// Looks up a declared molecule type by name.
    pub fn molecule_type_by_name(&self, name: &str) -> Option<MoleculeTypeId> {
        self.molecule_types
            .iter()
            .position(|t| t.name == name)
            .map(|i| MoleculeTypeId::new(i as u32))
    }

    /// Looks up a declared rule by name.
    pub fn rule_by_name(&self, name: &str) -> Option<RuleId> {
        self.rules
            .iter()
            .position(|r| r.name == name)
            .map(|i| RuleId::new(i as u32))
    }

    /// Looks up a declared parameter by name.
    pub fn parameter_by_name(&self, name: &str) -> Option<ParameterId> {
        self.parameters
            .iter()
            .position(|p| p.name == name)
            .map(|i| ParameterId::new(i as u32))
    }

    /// Looks up a declared observable by name.
    pub fn observable_by_name(&self, name: &str) -> Option<ObservableId> {
        self.observables
            .iter()
            .position(|o| o.name == name)
            .map(|i| ObservableId::new(i as u32))
    }

    /// Site index by name, for building patterns against this model.
    pub fn site(&self, ty: MoleculeTypeId, name: &str) -> Option<usize> {
        self.molecule_type(ty).site(name)
    }

    /// State index by name within a site, for building patterns.
    pub fn state(&self, ty: MoleculeTypeId, site: usize, name: &str) -> Option<StateId> {
        self.molecule_type(ty).state(site, name)
    }
}
