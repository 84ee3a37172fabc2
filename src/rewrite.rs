//! Rule compilation and application.
//!
//! A [`crate::model::Rule`] is declarative: two pattern lists and rates. The
//! generator needs an executable form, so each direction is compiled once
//! into a [`CompiledDirection`]: a reactant/product molecule correspondence
//! plus a flat list of edits (state writes, bond breaks, deletions,
//! creations, bond forms). Application then clones the matched species into
//! one instance pool, replays the edits through the embedding maps, and
//! splits the pool into connected product species.
//!
//! Context preservation is structural: edits only ever name sites the rule
//! mentions, so everything else in the matched species carries over through
//! the pool clone untouched.
//!
//! # Correspondence
//! Reactant and product molecules are flattened in declaration order and
//! paired positionally per molecule type: the k-th product occurrence of a
//! type continues the k-th reactant occurrence. Surplus product molecules
//! are synthesized (and must be concrete); surplus reactant molecules are
//! deleted with their bonds severed.
//!
//! # Citations
//! - Graph rewriting with interface preservation: Danos & Laneve, "Formal
//!   molecular biology" (2004)
//! - Rule semantics: Blinov et al., "BioNetGen: software for rule-based
//!   modeling" (2004)

use crate::matcher::{pattern_list_automorphisms, Embedding};
use crate::model::{Model, ModelError, ParameterId, Rule, StateId};
use crate::pattern::{BondCondition, ComplexPattern, StateCondition};
use crate::species::{BondEnd, MoleculeInstance, SpeciesGraph};

/// Where a product molecule comes from.
#[derive(Debug, Clone)]
enum MoleculeOrigin {
    /// Continues the reactant molecule at the given flat index.
    Kept { reactant: usize },
    /// Synthesized fresh from a concrete template.
    Created { template: MoleculeInstance },
}

/// One executable direction of a rule.
///
/// Reversible rules compile into two of these with reactant and product
/// roles swapped; each direction matches and applies independently.
#[derive(Debug, Clone)]
pub struct CompiledDirection {
    /// `true` for the reverse direction of a reversible rule.
    pub reverse: bool,
    pub rate: ParameterId,
    /// Patterns the generator matches, one complex per reactant slot.
    pub reactants: Vec<ComplexPattern>,
    /// Automorphism count of the reactant pattern list; divides joint
    /// embedding counts into reaction multiplicities.
    pub symmetry: u64,
    /// Flat reactant index -> (complex, molecule within complex).
    reactant_slots: Vec<(usize, usize)>,
    origins: Vec<MoleculeOrigin>,
    deleted: Vec<usize>,
    state_writes: Vec<(usize, usize, StateId)>,
    breaks: Vec<(usize, usize)>,
    /// Bonds to form, endpoints as (product flat molecule, site).
    forms: Vec<((usize, usize), (usize, usize))>,
}

/// Compiles every direction of a rule, validating its rewrite structure.
///
/// Errors cover corresponded molecules mentioning different sites, bond
/// edits on wildcard-bound sites, and non-concrete synthesized molecules.
pub fn compile_rule(rule: &Rule, model: &Model) -> Result<Vec<CompiledDirection>, ModelError> {
    let mut dirs = vec![compile_direction(
        &rule.name,
        model,
        &rule.reactants,
        &rule.products,
        rule.forward,
        false,
    )?];
    if let Some(rate) = rule.reverse {
        dirs.push(compile_direction(
            &rule.name,
            model,
            &rule.products,
            &rule.reactants,
            rate,
            true,
        )?);
    }
    Ok(dirs)
}

/// Flattens a pattern list into (complex, molecule) slots.
fn flatten(patterns: &[ComplexPattern]) -> Vec<(usize, usize)> {
    let mut slots = Vec::new();
    for (ci, pat) in patterns.iter().enumerate() {
        for mi in 0..pat.molecules.len() {
            slots.push((ci, mi));
        }
    }
    slots
}

fn compile_direction(
    name: &str,
    model: &Model,
    reactants: &[ComplexPattern],
    products: &[ComplexPattern],
    rate: ParameterId,
    reverse: bool,
) -> Result<CompiledDirection, ModelError> {
    let reactant_slots = flatten(reactants);
    let product_slots = flatten(products);
    let mol_at = |slots: &[(usize, usize)], side: &[ComplexPattern], f: usize| {
        let (ci, mi) = slots[f];
        side[ci].molecules[mi].clone()
    };

    // Positional per-type correspondence over the flat lists.
    let mut origins: Vec<Option<MoleculeOrigin>> = vec![None; product_slots.len()];
    let mut consumed = vec![false; reactant_slots.len()];
    for (pf, &(ci, mi)) in product_slots.iter().enumerate() {
        let ty = products[ci].molecules[mi].ty;
        let partner = (0..reactant_slots.len()).find(|&rf| {
            let (rci, rmi) = reactant_slots[rf];
            !consumed[rf] && reactants[rci].molecules[rmi].ty == ty
        });
        if let Some(rf) = partner {
            consumed[rf] = true;
            origins[pf] = Some(MoleculeOrigin::Kept { reactant: rf });
        }
    }
    let deleted: Vec<usize> = (0..reactant_slots.len()).filter(|&rf| !consumed[rf]).collect();

    // Synthesized molecules must be concrete.
    for (pf, origin) in origins.iter_mut().enumerate() {
        if origin.is_some() {
            continue;
        }
        let pat = mol_at(&product_slots, products, pf);
        let ty = model.molecule_type(pat.ty);
        let mut template = MoleculeInstance::new(pat.ty, pat.sites.len());
        for (si, site) in pat.sites.iter().enumerate() {
            let err = || ModelError::SynthesisNotConcrete {
                rule: name.to_string(),
                molecule: ty.name.clone(),
                site: ty.sites[si].name.clone(),
            };
            match site.bond {
                BondCondition::Unbound | BondCondition::Bond(_) => {}
                _ => return Err(err()),
            }
            template.sites[si].state = match site.state {
                StateCondition::Is(s) => Some(s),
                StateCondition::Unspecified if ty.sites[si].has_states() => return Err(err()),
                StateCondition::Unspecified => None,
            };
        }
        *origin = Some(MoleculeOrigin::Created { template });
    }
    let origins: Vec<MoleculeOrigin> = origins
        .into_iter()
        .map(|o| o.expect("every product molecule is kept or created"))
        .collect();

    // Per-site diff over kept pairs.
    let mut state_writes = Vec::new();
    let mut breaks = Vec::new();
    for (pf, origin) in origins.iter().enumerate() {
        let MoleculeOrigin::Kept { reactant: rf } = origin else {
            continue;
        };
        let rpat = mol_at(&reactant_slots, reactants, *rf);
        let ppat = mol_at(&product_slots, products, pf);
        let ty = model.molecule_type(rpat.ty);
        for (si, (rs, ps)) in rpat.sites.iter().zip(&ppat.sites).enumerate() {
            if rs.is_mentioned() != ps.is_mentioned() {
                return Err(ModelError::SiteMentionAsymmetry {
                    rule: name.to_string(),
                    molecule: ty.name.clone(),
                    site: ty.sites[si].name.clone(),
                });
            }
            if let StateCondition::Is(target) = ps.state {
                if rs.state != StateCondition::Is(target) {
                    state_writes.push((*rf, si, target));
                }
            }
            let ambiguous = || ModelError::AmbiguousBondChange {
                rule: name.to_string(),
                molecule: ty.name.clone(),
                site: ty.sites[si].name.clone(),
            };
            match (rs.bond, ps.bond) {
                (BondCondition::Bond(_), BondCondition::Unbound) => breaks.push((*rf, si)),
                // Occupancy unknown on the reactant side: no bond edit is
                // well defined.
                (BondCondition::Any | BondCondition::Unspecified, BondCondition::Unbound)
                | (BondCondition::Any | BondCondition::Unspecified, BondCondition::Bond(_))
                | (BondCondition::Unbound | BondCondition::Bond(_), BondCondition::Any) => {
                    return Err(ambiguous())
                }
                _ => {}
            }
        }
    }

    // Product bonds: formed unless the corresponding reactant bond already
    // connects the same pair of sites.
    let flat_of = |slots: &[(usize, usize)], ci: usize, mi: usize| {
        slots.iter().position(|&s| s == (ci, mi)).unwrap_or(usize::MAX)
    };
    let mut forms = Vec::new();
    for (ci, pat) in products.iter().enumerate() {
        for (_, (am, asite), (bm, bsite)) in pat.bond_pairs() {
            let pa = flat_of(&product_slots, ci, am);
            let pb = flat_of(&product_slots, ci, bm);
            let kept_pair = match (&origins[pa], &origins[pb]) {
                (
                    MoleculeOrigin::Kept { reactant: ra },
                    MoleculeOrigin::Kept { reactant: rb },
                ) => Some((*ra, *rb)),
                _ => None,
            };
            if let Some((ra, rb)) = kept_pair {
                let (rca, rma) = reactant_slots[ra];
                if let Some((pm, ps)) = reactants[rca].partner_of(rma, asite) {
                    let partner_flat = flat_of(&reactant_slots, rca, pm);
                    if partner_flat == rb && ps == bsite {
                        continue; // bond carried over unchanged
                    }
                }
                // Replacing an existing reactant bond frees the site first.
                for &(rf, site) in &[(ra, asite), (rb, bsite)] {
                    let (rci, rmi) = reactant_slots[rf];
                    if matches!(
                        reactants[rci].molecules[rmi].sites[site].bond,
                        BondCondition::Bond(_)
                    ) {
                        breaks.push((rf, site));
                    }
                }
            }
            forms.push(((pa, asite), (pb, bsite)));
        }
    }

    Ok(CompiledDirection {
        reverse,
        rate,
        reactants: reactants.to_vec(),
        symmetry: pattern_list_automorphisms(reactants),
        reactant_slots,
        origins,
        deleted,
        state_writes,
        breaks,
        forms,
    })
}

impl CompiledDirection {
    /// Applies this direction to one joint match.
    ///
    /// `species[i]` is the species matched by reactant slot `i` and
    /// `embeddings[i]` the embedding of that slot's pattern into it. When
    /// two slots matched the same species the caller passes it twice; the
    /// pool clones each slot independently (distinct copies react, the
    /// symmetry divisor accounts for the rest).
    ///
    /// Returns the connected product species, in pool order.
    pub fn apply(&self, species: &[&SpeciesGraph], embeddings: &[Embedding]) -> Vec<SpeciesGraph> {
        debug_assert_eq!(species.len(), self.reactants.len());
        debug_assert_eq!(embeddings.len(), self.reactants.len());

        // Clone every matched species into one pool, bonds re-offset.
        let mut pool = SpeciesGraph::new();
        let mut offsets = Vec::with_capacity(species.len());
        for s in species {
            let offset = pool.molecule_count() as u32;
            offsets.push(offset);
            for (_, mol) in s.molecules() {
                let mut inst = mol.clone();
                for slot in &mut inst.sites {
                    if let Some(p) = &mut slot.bond {
                        p.molecule += offset;
                    }
                }
                pool.push(inst);
            }
        }
        let locate = |rf: usize| -> u32 {
            let (ci, mi) = self.reactant_slots[rf];
            offsets[ci] + embeddings[ci].target(mi)
        };

        for &(rf, si, state) in &self.state_writes {
            pool.set_state(BondEnd::new(locate(rf), si as u16), state);
        }
        for &(rf, si) in &self.breaks {
            pool.unbind(BondEnd::new(locate(rf), si as u16));
        }

        let mut dead = vec![false; pool.molecule_count()];
        for &rf in &self.deleted {
            let idx = locate(rf);
            dead[idx as usize] = true;
            for si in 0..pool.molecule(idx as usize).sites.len() {
                pool.unbind(BondEnd::new(idx, si as u16));
            }
        }

        let mut product_index = vec![0u32; self.origins.len()];
        for (pf, origin) in self.origins.iter().enumerate() {
            product_index[pf] = match origin {
                MoleculeOrigin::Kept { reactant } => locate(*reactant),
                MoleculeOrigin::Created { template } => pool.push(template.clone()),
            };
        }
        for &((pa, sa), (pb, sb)) in &self.forms {
            pool.bind(
                BondEnd::new(product_index[pa], sa as u16),
                BondEnd::new(product_index[pb], sb as u16),
            );
        }

        // Created molecules grew the pool past the deletion mask.
        dead.resize(pool.molecule_count(), false);
        compact(&pool, &dead).components()
    }
}

/// Drops dead molecules, remapping bonds. Dead molecules are fully unbound
/// by the time this runs.
fn compact(pool: &SpeciesGraph, dead: &[bool]) -> SpeciesGraph {
    if !dead.iter().any(|&d| d) {
        return pool.clone();
    }
    let mut remap = vec![u32::MAX; pool.molecule_count()];
    let mut next = 0u32;
    for (i, alive) in dead.iter().map(|d| !d).enumerate() {
        if alive {
            remap[i] = next;
            next += 1;
        }
    }
    let mut out = SpeciesGraph::new();
    for (i, mol) in pool.molecules() {
        if dead[i] {
            continue;
        }
        let mut inst = mol.clone();
        for slot in &mut inst.sites {
            if let Some(p) = &mut slot.bond {
                p.molecule = remap[p.molecule as usize];
            }
        }
        out.push(inst);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::find_embeddings;
    use crate::model::{MoleculeType, MoleculeTypeId, SiteDef};
    use crate::pattern::{BondLabel, MoleculePattern};

    struct Fixture {
        model: Model,
        egf: MoleculeTypeId,
        egfr: MoleculeTypeId,
        k: ParameterId,
    }

    /// EGF(r) and EGFR(l, d, Y1068~u/p), the fragment every rule shape
    /// below is drawn from.
    fn fixture() -> Fixture {
        let mut model = Model::new("test");
        let egf = model
            .add_molecule_type(MoleculeType::new("EGF").with_site(SiteDef::bond_only("r")))
            .unwrap();
        let egfr = model
            .add_molecule_type(
                MoleculeType::new("EGFR")
                    .with_site(SiteDef::bond_only("l"))
                    .with_site(SiteDef::bond_only("d"))
                    .with_site(SiteDef::with_states("Y1068", ["u", "p"])),
            )
            .unwrap();
        let k = model.add_parameter("k", 1.0).unwrap();
        Fixture { model, egf, egfr, k }
    }

    fn unbound(ty: MoleculeTypeId, sites: usize, free: &[usize]) -> MoleculePattern {
        let mut p = MoleculePattern::new(ty, sites);
        for &s in free {
            p.set_bond(s, BondCondition::Unbound);
        }
        p
    }

    /// A free EGFR species with Y1068 unphosphorylated.
    fn free_egfr(f: &Fixture) -> SpeciesGraph {
        let pat = ComplexPattern::single(
            MoleculePattern::new(f.egfr, 3)
                .with_bond(0, BondCondition::Unbound)
                .with_bond(1, BondCondition::Unbound)
                .with_state(2, StateId::new(0)),
        );
        SpeciesGraph::from_concrete(&pat, &f.model).unwrap()
    }

    fn free_egf(f: &Fixture) -> SpeciesGraph {
        let pat = ComplexPattern::single(
            MoleculePattern::new(f.egf, 1).with_bond(0, BondCondition::Unbound),
        );
        SpeciesGraph::from_concrete(&pat, &f.model).unwrap()
    }

    #[test]
    fn binding_rule_joins_two_species() {
        let f = fixture();
        let l = BondLabel::new(1);
        let rule = Rule::new(
            "egf_binds_egfr",
            vec![
                ComplexPattern::single(unbound(f.egf, 1, &[0])),
                ComplexPattern::single(unbound(f.egfr, 3, &[0])),
            ],
            vec![ComplexPattern::new()
                .with(MoleculePattern::new(f.egf, 1).with_bond(0, BondCondition::Bond(l)))
                .with(MoleculePattern::new(f.egfr, 3).with_bond(0, BondCondition::Bond(l)))],
            f.k,
        );
        let dir = &compile_rule(&rule, &f.model).unwrap()[0];
        let (egf, egfr) = (free_egf(&f), free_egfr(&f));
        let e1 = find_embeddings(&dir.reactants[0], &egf);
        let e2 = find_embeddings(&dir.reactants[1], &egfr);
        let products = dir.apply(&[&egf, &egfr], &[e1[0].clone(), e2[0].clone()]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].molecule_count(), 2);
        assert_eq!(
            products[0].render(&f.model),
            "EGF(r!0).EGFR(l!0,d,Y1068~u)"
        );
    }

    #[test]
    fn unbinding_splits_and_preserves_context() {
        let f = fixture();
        let l = BondLabel::new(1);
        // Bound complex with the receptor phosphorylated; unbinding must
        // not touch the state.
        let bound = SpeciesGraph::from_concrete(
            &ComplexPattern::new()
                .with(MoleculePattern::new(f.egf, 1).with_bond(0, BondCondition::Bond(l)))
                .with(
                    MoleculePattern::new(f.egfr, 3)
                        .with_bond(0, BondCondition::Bond(l))
                        .with_bond(1, BondCondition::Unbound)
                        .with_state(2, StateId::new(1)),
                ),
            &f.model,
        )
        .unwrap();
        let rule = Rule::new(
            "egf_unbinds",
            vec![ComplexPattern::new()
                .with(MoleculePattern::new(f.egf, 1).with_bond(0, BondCondition::Bond(l)))
                .with(MoleculePattern::new(f.egfr, 3).with_bond(0, BondCondition::Bond(l)))],
            vec![
                ComplexPattern::single(unbound(f.egf, 1, &[0])),
                ComplexPattern::single(unbound(f.egfr, 3, &[0])),
            ],
            f.k,
        );
        let dir = &compile_rule(&rule, &f.model).unwrap()[0];
        let e = find_embeddings(&dir.reactants[0], &bound);
        assert_eq!(e.len(), 1);
        let products = dir.apply(&[&bound], &[e[0].clone()]);
        assert_eq!(products.len(), 2);
        let rendered: Vec<String> = products.iter().map(|p| p.render(&f.model)).collect();
        assert!(rendered.contains(&"EGF(r)".to_string()));
        assert!(rendered.contains(&"EGFR(l,d,Y1068~p)".to_string()));
    }

    #[test]
    fn state_change_rule_writes_only_the_named_site() {
        let f = fixture();
        let rule = Rule::new(
            "phos",
            vec![ComplexPattern::single(
                MoleculePattern::new(f.egfr, 3)
                    .with_bond(2, BondCondition::Unbound)
                    .with_state(2, StateId::new(0)),
            )],
            vec![ComplexPattern::single(
                MoleculePattern::new(f.egfr, 3)
                    .with_bond(2, BondCondition::Unbound)
                    .with_state(2, StateId::new(1)),
            )],
            f.k,
        );
        let dir = &compile_rule(&rule, &f.model).unwrap()[0];
        let species = free_egfr(&f);
        let e = find_embeddings(&dir.reactants[0], &species);
        let products = dir.apply(&[&species], &[e[0].clone()]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].render(&f.model), "EGFR(l,d,Y1068~p)");
    }

    #[test]
    fn degradation_severs_bonds_of_the_deleted_molecule() {
        let f = fixture();
        let l = BondLabel::new(1);
        let bound = SpeciesGraph::from_concrete(
            &ComplexPattern::new()
                .with(MoleculePattern::new(f.egf, 1).with_bond(0, BondCondition::Bond(l)))
                .with(
                    MoleculePattern::new(f.egfr, 3)
                        .with_bond(0, BondCondition::Bond(l))
                        .with_bond(1, BondCondition::Unbound)
                        .with_state(2, StateId::new(0)),
                ),
            &f.model,
        )
        .unwrap();
        // EGF degraded wherever it sits, bound or not.
        let rule = Rule::new(
            "egf_degraded",
            vec![ComplexPattern::single(MoleculePattern::new(f.egf, 1))],
            vec![],
            f.k,
        );
        let dir = &compile_rule(&rule, &f.model).unwrap()[0];
        let e = find_embeddings(&dir.reactants[0], &bound);
        let products = dir.apply(&[&bound], &[e[0].clone()]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].render(&f.model), "EGFR(l,d,Y1068~u)");
    }

    #[test]
    fn replacement_rule_deletes_and_creates_in_one_step() {
        let f = fixture();
        // EGF consumed, a fresh unliganded receptor produced.
        let rule = Rule::new(
            "egf_replaced",
            vec![ComplexPattern::single(MoleculePattern::new(f.egf, 1))],
            vec![ComplexPattern::single(
                MoleculePattern::new(f.egfr, 3)
                    .with_bond(0, BondCondition::Unbound)
                    .with_bond(1, BondCondition::Unbound)
                    .with_bond(2, BondCondition::Unbound)
                    .with_state(2, StateId::new(0)),
            )],
            f.k,
        );
        let dir = &compile_rule(&rule, &f.model).unwrap()[0];
        let egf = free_egf(&f);
        let e = find_embeddings(&dir.reactants[0], &egf);
        let products = dir.apply(&[&egf], &[e[0].clone()]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].render(&f.model), "EGFR(l,d,Y1068~u)");
    }

    #[test]
    fn synthesis_creates_a_concrete_molecule() {
        let f = fixture();
        let rule = Rule::new(
            "egf_synthesized",
            vec![],
            vec![ComplexPattern::single(unbound(f.egf, 1, &[0]))],
            f.k,
        );
        let dir = &compile_rule(&rule, &f.model).unwrap()[0];
        let products = dir.apply(&[], &[]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].render(&f.model), "EGF(r)");
    }

    #[test]
    fn synthesis_of_partial_molecule_rejected() {
        let f = fixture();
        let rule = Rule::new(
            "bad_synth",
            vec![],
            // Y1068 state left open.
            vec![ComplexPattern::single(unbound(f.egfr, 3, &[0, 1]))],
            f.k,
        );
        let err = compile_rule(&rule, &f.model).unwrap_err();
        assert!(matches!(err, ModelError::SynthesisNotConcrete { .. }));
    }

    #[test]
    fn reversible_rules_compile_both_directions() {
        let mut f = fixture();
        let kr = f.model.add_parameter("kr", 0.1).unwrap();
        let l = BondLabel::new(1);
        let rule = Rule::new(
            "bind",
            vec![
                ComplexPattern::single(unbound(f.egf, 1, &[0])),
                ComplexPattern::single(unbound(f.egfr, 3, &[0])),
            ],
            vec![ComplexPattern::new()
                .with(MoleculePattern::new(f.egf, 1).with_bond(0, BondCondition::Bond(l)))
                .with(MoleculePattern::new(f.egfr, 3).with_bond(0, BondCondition::Bond(l)))],
            f.k,
        )
        .reversible(kr);
        let dirs = compile_rule(&rule, &f.model).unwrap();
        assert_eq!(dirs.len(), 2);
        assert!(!dirs[0].reverse);
        assert!(dirs[1].reverse);
        assert_eq!(dirs[1].rate, kr);
        assert_eq!(dirs[1].reactants.len(), 1);
    }

    #[test]
    fn reversible_rule_round_trips_canonically() {
        let mut f = fixture();
        let kr = f.model.add_parameter("kr", 0.1).unwrap();
        let l = BondLabel::new(1);
        let rule = Rule::new(
            "bind",
            vec![
                ComplexPattern::single(unbound(f.egf, 1, &[0])),
                ComplexPattern::single(unbound(f.egfr, 3, &[0])),
            ],
            vec![ComplexPattern::new()
                .with(MoleculePattern::new(f.egf, 1).with_bond(0, BondCondition::Bond(l)))
                .with(MoleculePattern::new(f.egfr, 3).with_bond(0, BondCondition::Bond(l)))],
            f.k,
        )
        .reversible(kr);
        let dirs = compile_rule(&rule, &f.model).unwrap();
        let (egf, egfr) = (free_egf(&f), free_egfr(&f));

        let fwd = &dirs[0];
        let e1 = find_embeddings(&fwd.reactants[0], &egf);
        let e2 = find_embeddings(&fwd.reactants[1], &egfr);
        let bound = fwd.apply(&[&egf, &egfr], &[e1[0].clone(), e2[0].clone()]);
        assert_eq!(bound.len(), 1);

        let rev = &dirs[1];
        let e3 = find_embeddings(&rev.reactants[0], &bound[0]);
        assert_eq!(e3.len(), 1);
        let split = rev.apply(&[&bound[0]], &[e3[0].clone()]);
        assert_eq!(split.len(), 2);
        let mut keys: Vec<_> = split.iter().map(crate::canonical::species_key).collect();
        let mut original: Vec<_> = [&egf, &egfr]
            .map(crate::canonical::species_key)
            .to_vec();
        keys.sort_unstable();
        original.sort_unstable();
        assert_eq!(keys, original);
    }

    #[test]
    fn ambiguous_bond_change_rejected() {
        let f = fixture();
        // Wildcard-bound site on the reactant, unbound on the product:
        // which bond breaks is undefined.
        let rule = Rule::new(
            "ambiguous",
            vec![ComplexPattern::single(
                MoleculePattern::new(f.egfr, 3).with_bond(0, BondCondition::Any),
            )],
            vec![ComplexPattern::single(unbound(f.egfr, 3, &[0]))],
            f.k,
        );
        let err = compile_rule(&rule, &f.model).unwrap_err();
        assert!(matches!(err, ModelError::AmbiguousBondChange { .. }));
    }

    #[test]
    fn site_mention_asymmetry_rejected() {
        let f = fixture();
        let rule = Rule::new(
            "asymmetric",
            vec![ComplexPattern::single(unbound(f.egfr, 3, &[0]))],
            vec![ComplexPattern::single(MoleculePattern::new(f.egfr, 3))],
            f.k,
        );
        let err = compile_rule(&rule, &f.model).unwrap_err();
        assert!(matches!(err, ModelError::SiteMentionAsymmetry { .. }));
    }

    #[test]
    fn symmetric_reactants_carry_their_symmetry_factor() {
        let f = fixture();
        let l = BondLabel::new(1);
        let rule = Rule::new(
            "dimerize",
            vec![
                ComplexPattern::single(unbound(f.egfr, 3, &[1])),
                ComplexPattern::single(unbound(f.egfr, 3, &[1])),
            ],
            vec![ComplexPattern::new()
                .with(MoleculePattern::new(f.egfr, 3).with_bond(1, BondCondition::Bond(l)))
                .with(MoleculePattern::new(f.egfr, 3).with_bond(1, BondCondition::Bond(l)))],
            f.k,
        );
        let dir = &compile_rule(&rule, &f.model).unwrap()[0];
        assert_eq!(dir.symmetry, 2);
    }
}
