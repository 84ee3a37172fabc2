//! Concrete species graphs: the unit of population tracking.
//!
//! A [`SpeciesGraph`] is a flat arena of molecule instances with the bond
//! table folded into the site slots: a bound site stores its partner
//! endpoint directly, and the symmetry invariant (the partner points back)
//! is maintained by [`SpeciesGraph::bind`]/[`SpeciesGraph::unbind`]. The
//! flat representation keeps cyclic complexes (e.g. cross-linked receptor
//! dimers) free of ownership cycles and makes isomorphism machinery
//! tractable.
//!
//! # Determinism
//! Iteration over molecules and sites is by index. Any function of a
//! species graph that feeds canonicalization must not depend on anything
//! else.

use crate::model::{Model, ModelError, MoleculeTypeId, StateId};
use crate::pattern::{BondCondition, ComplexPattern, StateCondition};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One endpoint of a bond: a site on a molecule instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BondEnd {
    pub molecule: u32,
    pub site: u16,
}

impl BondEnd {
    #[inline]
    pub const fn new(molecule: u32, site: u16) -> Self {
        Self { molecule, site }
    }
}

/// Resolved value of one site: an optional bond partner and an optional
/// internal state (`None` iff the site declares no state set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SiteSlot {
    pub bond: Option<BondEnd>,
    pub state: Option<StateId>,
}

/// A molecule instance within a species graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoleculeInstance {
    pub ty: MoleculeTypeId,
    pub sites: Vec<SiteSlot>,
}

impl MoleculeInstance {
    pub fn new(ty: MoleculeTypeId, site_count: usize) -> Self {
        Self {
            ty,
            sites: vec![SiteSlot::default(); site_count],
        }
    }
}

/// A fully resolved molecular complex.
///
/// # Invariants
/// - Bonds are symmetric: if site `a` stores partner `b`, site `b` stores
///   partner `a`.
/// - Species handed to the network generator are connected; intermediate
///   graphs inside the rule applicator may be disconnected until split.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpeciesGraph {
    molecules: Vec<MoleculeInstance>,
}

impl SpeciesGraph {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn molecule_count(&self) -> usize {
        self.molecules.len()
    }

    #[inline]
    pub fn molecule(&self, idx: usize) -> &MoleculeInstance {
        &self.molecules[idx]
    }

    pub fn molecules(&self) -> impl Iterator<Item = (usize, &MoleculeInstance)> {
        self.molecules.iter().enumerate()
    }

    /// Appends a molecule instance and returns its index.
    pub fn push(&mut self, instance: MoleculeInstance) -> u32 {
        let idx = self.molecules.len() as u32;
        self.molecules.push(instance);
        idx
    }

    #[inline]
    pub fn slot(&self, end: BondEnd) -> &SiteSlot {
        &self.molecules[end.molecule as usize].sites[end.site as usize]
    }

    fn slot_mut(&mut self, end: BondEnd) -> &mut SiteSlot {
        &mut self.molecules[end.molecule as usize].sites[end.site as usize]
    }

    /// Creates a bond between two free sites.
    ///
    /// # Panics
    /// Debug-asserts both sites are free; callers unbind first.
    pub fn bind(&mut self, a: BondEnd, b: BondEnd) {
        debug_assert!(self.slot(a).bond.is_none(), "bind target must be free");
        debug_assert!(self.slot(b).bond.is_none(), "bind target must be free");
        self.slot_mut(a).bond = Some(b);
        self.slot_mut(b).bond = Some(a);
    }

    /// Removes the bond at `end`, clearing both endpoints.
    ///
    /// Returns the former partner, or `None` if the site was free.
    pub fn unbind(&mut self, end: BondEnd) -> Option<BondEnd> {
        let partner = self.slot_mut(end).bond.take()?;
        let back = self.slot_mut(partner).bond.take();
        debug_assert_eq!(back, Some(end), "bond table must be symmetric");
        Some(partner)
    }

    pub fn set_state(&mut self, end: BondEnd, state: StateId) {
        self.slot_mut(end).state = Some(state);
    }

    /// Builds a species graph from a concrete complex pattern.
    ///
    /// A site with no bond condition is taken as unbound, so a seed species
    /// can mention only its states. `Any`/`Wild` conditions and missing
    /// states on stateful sites are a [`ModelError::NotConcrete`].
    pub fn from_concrete(pattern: &ComplexPattern, model: &Model) -> Result<Self, ModelError> {
        let mut graph = SpeciesGraph::new();
        for mol in &pattern.molecules {
            let ty = model.molecule_type(mol.ty);
            let mut inst = MoleculeInstance::new(mol.ty, mol.sites.len());
            for (si, site) in mol.sites.iter().enumerate() {
                let not_concrete = || ModelError::NotConcrete {
                    molecule: ty.name.clone(),
                    site: ty.sites[si].name.clone(),
                };
                match site.bond {
                    BondCondition::Unspecified
                    | BondCondition::Unbound
                    | BondCondition::Bond(_) => {}
                    BondCondition::Any | BondCondition::Wild => {
                        return Err(not_concrete());
                    }
                }
                inst.sites[si].state = match site.state {
                    StateCondition::Is(s) => Some(s),
                    StateCondition::Unspecified => {
                        if ty.sites[si].has_states() {
                            return Err(not_concrete());
                        }
                        None
                    }
                };
            }
            graph.push(inst);
        }
        for (_, a, b) in pattern.bond_pairs() {
            graph.bind(
                BondEnd::new(a.0 as u32, a.1 as u16),
                BondEnd::new(b.0 as u32, b.1 as u16),
            );
        }
        Ok(graph)
    }

    /// Whether all molecules form one bond-connected complex.
    pub fn is_connected(&self) -> bool {
        self.molecule_count() <= 1 || self.component_labels().iter().all(|&c| c == 0)
    }

    /// Per-molecule component index, numbered by first appearance.
    fn component_labels(&self) -> Vec<u32> {
        let n = self.molecules.len();
        let mut label = vec![u32::MAX; n];
        let mut next = 0u32;
        let mut stack = Vec::new();
        for start in 0..n {
            if label[start] != u32::MAX {
                continue;
            }
            label[start] = next;
            stack.push(start);
            while let Some(m) = stack.pop() {
                for slot in &self.molecules[m].sites {
                    if let Some(partner) = slot.bond {
                        let p = partner.molecule as usize;
                        if label[p] == u32::MAX {
                            label[p] = next;
                            stack.push(p);
                        }
                    }
                }
            }
            next += 1;
        }
        label
    }

    /// Splits into connected components, preserving relative molecule order
    /// within each component.
    pub fn components(&self) -> Vec<SpeciesGraph> {
        if self.molecules.is_empty() {
            return Vec::new();
        }
        let labels = self.component_labels();
        let count = labels.iter().copied().max().map_or(0, |m| m as usize + 1);
        if count <= 1 {
            return vec![self.clone()];
        }
        // Old molecule index -> index within its component.
        let mut remap = vec![0u32; self.molecules.len()];
        let mut sizes = vec![0u32; count];
        for (i, &c) in labels.iter().enumerate() {
            remap[i] = sizes[c as usize];
            sizes[c as usize] += 1;
        }
        let mut parts = vec![SpeciesGraph::new(); count];
        for (i, mol) in self.molecules.iter().enumerate() {
            let mut inst = mol.clone();
            for slot in &mut inst.sites {
                if let Some(partner) = &mut slot.bond {
                    partner.molecule = remap[partner.molecule as usize];
                }
            }
            parts[labels[i] as usize].push(inst);
        }
        parts
    }

    /// Renders the graph in surface-like notation, e.g.
    /// `EGFR(l,r!0,Y1068~p).EGFR(l,r!0,Y1068~u)`. Intended for error
    /// messages and test diagnostics.
    pub fn render(&self, model: &Model) -> String {
        let mut bond_ids: Vec<Vec<Option<u32>>> = self
            .molecules
            .iter()
            .map(|m| vec![None; m.sites.len()])
            .collect();
        let mut next_bond = 0u32;
        let mut out = String::new();
        for (mi, mol) in self.molecules.iter().enumerate() {
            if mi > 0 {
                out.push('.');
            }
            let ty = model.molecule_type(mol.ty);
            out.push_str(&ty.name);
            out.push('(');
            for (si, slot) in mol.sites.iter().enumerate() {
                if si > 0 {
                    out.push(',');
                }
                out.push_str(&ty.sites[si].name);
                if let Some(state) = slot.state {
                    let _ = write!(out, "~{}", ty.sites[si].states[state.index()]);
                }
                if let Some(partner) = slot.bond {
                    let id = bond_ids[mi][si].unwrap_or_else(|| {
                        let id = next_bond;
                        next_bond += 1;
                        bond_ids[partner.molecule as usize][partner.site as usize] = Some(id);
                        id
                    });
                    let _ = write!(out, "!{}", id);
                }
            }
            out.push(')');
        }
        out
    }
}
