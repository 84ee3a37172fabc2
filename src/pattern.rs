//! Partially specified molecular graphs used for matching.
//!
//! A [`ComplexPattern`] is a small site graph with per-site conditions rather
//! than concrete values. Wildcards are capability-tagged variants of
//! [`BondCondition`] evaluated uniformly by the matcher, not special-cased
//! branches: `Unspecified` matches anything, `Unbound` requires a free site,
//! `Bond` names an edge variable, `Any` requires some bond, and `Wild`
//! matches bonded-or-not and is legal only in counting contexts.
//!
//! Bond labels are variables scoped to a single pattern declaration; the
//! structural invariant that every label appears exactly twice is enforced
//! here at validation time.
//!
//! # Citations
//! - Site-graph patterns: Danos & Laneve, "Formal molecular biology" (2004)
//! - Pattern wildcards: Baader & Nipkow, "Term Rewriting and All That",
//!   Chapter 4 (1998)

use crate::model::{Model, ModelError, MoleculeTypeId, StateId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A bond variable local to one pattern declaration.
///
/// Carries no identity outside the declaration it appears in.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BondLabel(u32);

impl BondLabel {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BondLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{}", self.0)
    }
}

/// Bond half of a site condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondCondition {
    /// Matches bound or unbound alike; the default for unmentioned sites.
    Unspecified,
    /// The site must carry no bond.
    Unbound,
    /// The site is one endpoint of the named edge variable.
    Bond(BondLabel),
    /// The site must be bound; the partner is unconstrained.
    Any,
    /// Bound-or-unbound, mentioned only to attach a state condition.
    /// Valid in counting patterns (observables, initials) only.
    Wild,
}

/// State half of a site condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateCondition {
    Unspecified,
    Is(StateId),
}

/// Condition pair for one site; bond and state halves are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitePattern {
    pub bond: BondCondition,
    pub state: StateCondition,
}

impl SitePattern {
    pub const UNSPECIFIED: SitePattern = SitePattern {
        bond: BondCondition::Unspecified,
        state: StateCondition::Unspecified,
    };

    /// Whether the site is mentioned at all (either half specified).
    #[inline]
    pub fn is_mentioned(&self) -> bool {
        !matches!(
            self,
            SitePattern {
                bond: BondCondition::Unspecified,
                state: StateCondition::Unspecified,
            }
        )
    }
}

impl Default for SitePattern {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

/// A pattern over one molecule instance of a given type.
///
/// Holds one [`SitePattern`] per declared site of the type; unmentioned
/// sites stay fully unspecified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculePattern {
    pub ty: MoleculeTypeId,
    pub sites: Vec<SitePattern>,
}

impl MoleculePattern {
    /// Creates an all-unspecified pattern over a type with `site_count` sites.
    pub fn new(ty: MoleculeTypeId, site_count: usize) -> Self {
        Self {
            ty,
            sites: vec![SitePattern::UNSPECIFIED; site_count],
        }
    }

    pub fn set_bond(&mut self, site: usize, bond: BondCondition) -> &mut Self {
        self.sites[site].bond = bond;
        self
    }

    pub fn set_state(&mut self, site: usize, state: StateId) -> &mut Self {
        self.sites[site].state = StateCondition::Is(state);
        self
    }

    pub fn with_bond(mut self, site: usize, bond: BondCondition) -> Self {
        self.sites[site].bond = bond;
        self
    }

    pub fn with_state(mut self, site: usize, state: StateId) -> Self {
        self.sites[site].state = StateCondition::Is(state);
        self
    }
}

/// Where a pattern appears, which decides whether `Wild` is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternContext {
    /// Rewritable rule side; `Wild` is a definition error here.
    Rule,
    /// Read-only counting context (observable or initial).
    Counting,
}

/// A multiset of molecule patterns joined into one complex.
///
/// Molecules listed together must embed into the *same* species, whether or
/// not the pattern's own bonds connect them. Bond labels pair sites within
/// this pattern only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComplexPattern {
    pub molecules: Vec<MoleculePattern>,
}

impl ComplexPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(molecule: MoleculePattern) -> Self {
        Self {
            molecules: vec![molecule],
        }
    }

    pub fn with(mut self, molecule: MoleculePattern) -> Self {
        self.molecules.push(molecule);
        self
    }

    /// All bond labels with their site occurrences, in label order.
    pub fn labels(&self) -> BTreeMap<BondLabel, Vec<(usize, usize)>> {
        let mut map: BTreeMap<BondLabel, Vec<(usize, usize)>> = BTreeMap::new();
        for (mi, mol) in self.molecules.iter().enumerate() {
            for (si, site) in mol.sites.iter().enumerate() {
                if let BondCondition::Bond(label) = site.bond {
                    map.entry(label).or_default().push((mi, si));
                }
            }
        }
        map
    }

    /// Endpoint pairs per label, in label order. Only valid after `validate`.
    pub fn bond_pairs(&self) -> Vec<(BondLabel, (usize, usize), (usize, usize))> {
        self.labels()
            .into_iter()
            .map(|(label, ends)| {
                debug_assert_eq!(ends.len(), 2, "validated patterns pair every label");
                (label, ends[0], ends[1])
            })
            .collect()
    }

    /// For a pattern site carrying a bond label, the opposite endpoint of
    /// that label.
    pub(crate) fn partner_of(&self, molecule: usize, site: usize) -> Option<(usize, usize)> {
        let label = match self.molecules[molecule].sites[site].bond {
            BondCondition::Bond(l) => l,
            _ => return None,
        };
        self.labels()
            .get(&label)
            .and_then(|ends| ends.iter().find(|&&e| e != (molecule, site)).copied())
    }

    /// Validates the pattern against a model's declared molecule types.
    ///
    /// Checks site arity, state ranges, stateless-site misuse, bond-label
    /// pairing, and `Wild` placement. `component` names the declaring
    /// component for error reporting.
    pub fn validate(
        &self,
        model: &Model,
        component: &str,
        ctx: PatternContext,
    ) -> Result<(), ModelError> {
        for mol in &self.molecules {
            model.check_molecule_type(mol.ty)?;
            let ty = model.molecule_type(mol.ty);
            if mol.sites.len() != ty.sites.len() {
                return Err(ModelError::SiteCountMismatch {
                    component: component.to_string(),
                    molecule: ty.name.clone(),
                    expected: ty.sites.len(),
                    got: mol.sites.len(),
                });
            }
            for (si, site) in mol.sites.iter().enumerate() {
                if let StateCondition::Is(state) = site.state {
                    let def = &ty.sites[si];
                    if !def.has_states() {
                        return Err(ModelError::StateOnStatelessSite {
                            component: component.to_string(),
                            molecule: ty.name.clone(),
                            site: def.name.clone(),
                        });
                    }
                    if state.index() >= def.states.len() {
                        return Err(ModelError::UnknownState {
                            component: component.to_string(),
                            molecule: ty.name.clone(),
                            site: def.name.clone(),
                            state: state.raw(),
                        });
                    }
                }
                if matches!(site.bond, BondCondition::Wild) && ctx == PatternContext::Rule {
                    return Err(ModelError::WildInRule {
                        component: component.to_string(),
                    });
                }
            }
        }
        for (label, ends) in self.labels() {
            if ends.len() != 2 {
                return Err(ModelError::BondLabelArity {
                    component: component.to_string(),
                    label: label.raw(),
                    count: ends.len(),
                });
            }
        }
        Ok(())
    }
}
