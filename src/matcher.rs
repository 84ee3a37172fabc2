//! Subgraph embedding search.
//!
//! Finds every injective, structure-preserving map from a [`ComplexPattern`]
//! into one species graph. The search is plain backtracking over pattern
//! molecules in index order: candidates are type-filtered and checked
//! against local site conditions, bond labels whose opposite endpoint is
//! already placed force the candidate outright, and a used-set keeps the
//! assignment injective.
//!
//! All bond-condition variants go through one predicate ([`site_admits`]);
//! wildcards are data, not special-cased search branches.
//!
//! # Determinism
//! Candidates are tried in ascending species-molecule index, so the returned
//! embedding list is in lexicographic order of target vectors. Network
//! numbering depends on this.

use crate::pattern::{BondCondition, ComplexPattern, SitePattern, StateCondition};
use crate::species::{BondEnd, SiteSlot, SpeciesGraph};

/// An injective map from pattern molecules to species molecules.
///
/// `targets[i]` is the species molecule matched by pattern molecule `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedding {
    pub targets: Vec<u32>,
}

impl Embedding {
    #[inline]
    pub fn target(&self, pattern_molecule: usize) -> u32 {
        self.targets[pattern_molecule]
    }
}

/// Whether a site condition admits a resolved site slot.
///
/// Bond-label identity is not checked here; the search enforces it through
/// forced assignments when the opposite endpoint is placed.
fn site_admits(cond: &SitePattern, slot: &SiteSlot) -> bool {
    if let StateCondition::Is(state) = cond.state {
        if slot.state != Some(state) {
            return false;
        }
    }
    match cond.bond {
        BondCondition::Unspecified | BondCondition::Wild => true,
        BondCondition::Unbound => slot.bond.is_none(),
        BondCondition::Any | BondCondition::Bond(_) => slot.bond.is_some(),
    }
}

/// All embeddings of `pattern` into `species`, in deterministic order.
pub fn find_embeddings(pattern: &ComplexPattern, species: &SpeciesGraph) -> Vec<Embedding> {
    let n = pattern.molecules.len();
    if n == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut assigned: Vec<u32> = Vec::with_capacity(n);
    let mut used = vec![false; species.molecule_count()];
    extend(pattern, species, &mut assigned, &mut used, &mut out);
    out
}

fn extend(
    pattern: &ComplexPattern,
    species: &SpeciesGraph,
    assigned: &mut Vec<u32>,
    used: &mut [bool],
    out: &mut Vec<Embedding>,
) {
    let depth = assigned.len();
    if depth == pattern.molecules.len() {
        out.push(Embedding {
            targets: assigned.clone(),
        });
        return;
    }
    let mol = &pattern.molecules[depth];

    // A bond label back to an already-placed molecule pins the candidate;
    // a label closing on this molecule itself demands a self-loop.
    let mut forced: Option<u32> = None;
    let mut contradiction = false;
    let mut loops: Vec<(u16, u16)> = Vec::new();
    for (si, site) in mol.sites.iter().enumerate() {
        if !matches!(site.bond, BondCondition::Bond(_)) {
            continue;
        }
        let Some((pm, ps)) = pattern.partner_of(depth, si) else {
            continue;
        };
        if pm == depth {
            loops.push((si as u16, ps as u16));
            continue;
        }
        if pm > depth {
            continue;
        }
        let anchor = BondEnd::new(assigned[pm], ps as u16);
        match species.slot(anchor).bond {
            Some(partner) if partner.site == si as u16 => match forced {
                None => forced = Some(partner.molecule),
                Some(prev) if prev == partner.molecule => {}
                Some(_) => contradiction = true,
            },
            _ => contradiction = true,
        }
    }
    if contradiction {
        return;
    }

    let candidates: Box<dyn Iterator<Item = u32>> = match forced {
        Some(target) => Box::new(std::iter::once(target)),
        None => Box::new(0..species.molecule_count() as u32),
    };
    for target in candidates {
        if used[target as usize] {
            continue;
        }
        let inst = species.molecule(target as usize);
        if inst.ty != mol.ty {
            continue;
        }
        if !mol
            .sites
            .iter()
            .zip(&inst.sites)
            .all(|(cond, slot)| site_admits(cond, slot))
        {
            continue;
        }
        if !loops.iter().all(|&(si, ps)| {
            species.slot(BondEnd::new(target, si)).bond == Some(BondEnd::new(target, ps))
        }) {
            continue;
        }
        used[target as usize] = true;
        assigned.push(target);
        extend(pattern, species, assigned, used, out);
        assigned.pop();
        used[target as usize] = false;
    }
}

/// Counts the automorphisms of one complex pattern: bijections of its
/// molecules onto themselves preserving type, site conditions, and bond
/// structure (bond labels compared structurally, not by name).
pub fn pattern_automorphisms(pattern: &ComplexPattern) -> u64 {
    pattern_isomorphisms(pattern, pattern)
}

/// Counts the automorphisms of a pattern list: block-preserving bijections.
///
/// Patterns in a list share no bond labels, so the group factorizes into
/// per-pattern automorphisms times permutations of isomorphic patterns.
/// This is the symmetry divisor in reaction multiplicities and observable
/// coefficients.
pub fn pattern_list_automorphisms(patterns: &[ComplexPattern]) -> u64 {
    let mut total: u64 = 1;
    for pat in patterns {
        total *= pattern_automorphisms(pat);
    }
    // Group the blocks into isomorphism classes.
    let mut class_of: Vec<Option<usize>> = vec![None; patterns.len()];
    let mut class_sizes: Vec<u64> = Vec::new();
    for i in 0..patterns.len() {
        if class_of[i].is_some() {
            continue;
        }
        let class = class_sizes.len();
        class_of[i] = Some(class);
        let mut size = 1u64;
        for j in i + 1..patterns.len() {
            if class_of[j].is_none() && pattern_isomorphisms(&patterns[i], &patterns[j]) > 0 {
                class_of[j] = Some(class);
                size += 1;
            }
        }
        class_sizes.push(size);
    }
    for size in class_sizes {
        total *= factorial(size);
    }
    total
}

fn factorial(n: u64) -> u64 {
    (2..=n).product::<u64>().max(1)
}

/// Counts condition-preserving molecule bijections from `a` onto `b`.
fn pattern_isomorphisms(a: &ComplexPattern, b: &ComplexPattern) -> u64 {
    if a.molecules.len() != b.molecules.len() {
        return 0;
    }
    let n = a.molecules.len();
    let mut image: Vec<Option<usize>> = vec![None; n];
    let mut used = vec![false; n];
    let mut count = 0u64;
    iso_extend(a, b, 0, &mut image, &mut used, &mut count);
    count
}

fn iso_extend(
    a: &ComplexPattern,
    b: &ComplexPattern,
    depth: usize,
    image: &mut Vec<Option<usize>>,
    used: &mut [bool],
    count: &mut u64,
) {
    if depth == a.molecules.len() {
        *count += 1;
        return;
    }
    let ma = &a.molecules[depth];
    'cand: for target in 0..b.molecules.len() {
        if used[target] {
            continue;
        }
        let mb = &b.molecules[target];
        if ma.ty != mb.ty || ma.sites.len() != mb.sites.len() {
            continue;
        }
        for (si, (sa, sb)) in ma.sites.iter().zip(&mb.sites).enumerate() {
            if sa.state != sb.state {
                continue 'cand;
            }
            match (sa.bond, sb.bond) {
                (BondCondition::Unspecified, BondCondition::Unspecified)
                | (BondCondition::Unbound, BondCondition::Unbound)
                | (BondCondition::Any, BondCondition::Any)
                | (BondCondition::Wild, BondCondition::Wild) => {}
                (BondCondition::Bond(_), BondCondition::Bond(_)) => {
                    // Structural check once both endpoints are placed.
                    let pa = a.partner_of(depth, si);
                    let pb = b.partner_of(target, si);
                    match (pa, pb) {
                        (Some((pam, pas)), Some((pbm, pbs))) => {
                            if pas != pbs {
                                continue 'cand;
                            }
                            if pam == depth {
                                if pbm != target {
                                    continue 'cand;
                                }
                            } else if pam < depth && image[pam] != Some(pbm) {
                                continue 'cand;
                            }
                        }
                        _ => continue 'cand,
                    }
                }
                _ => continue 'cand,
            }
        }
        image[depth] = Some(target);
        used[target] = true;
        iso_extend(a, b, depth + 1, image, used, count);
        used[target] = false;
        image[depth] = None;
    }
}
