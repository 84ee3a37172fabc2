//! Canonical forms and species keys.
//!
//! Species identity is canonical-form equality: two species are the same
//! iff their site graphs are isomorphic under molecule-type, site-state and
//! bond-topology labels. This module computes a deterministic representative
//! of each isomorphism class by WL (Weisfeiler–Lehman) colour refinement
//! followed by a smallest-certificate ordering search, and hashes the
//! certificate into a [`SpeciesKey`] with domain separation and length
//! prefixing so keys are stable across builds.
//!
//! Plain structural hashing of a graph representation is
//! representation-sensitive (internal index renaming changes it); the
//! ordering search is what removes that sensitivity here.
//!
//! # Citations
//! - WL refinement: Weisfeiler & Lehman, "A reduction of a graph to a
//!   canonical form" (1968)
//! - Canonical labeling by refinement + individualization: McKay & Piperno,
//!   "Practical graph isomorphism, II" (2014)
//! - SHA-256: NIST FIPS 180-4 (2015)
//! - Domain separation & length prefixing: Bernstein et al., "How to hash
//!   into elliptic curves" (2009)

use crate::species::{MoleculeInstance, SpeciesGraph};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;

/// A 256-bit canonical species key.
///
/// Equality of keys is equality of species (up to SHA-256 collisions).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesKey(pub [u8; 32]);

impl SpeciesKey {
    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// SHA-256 with domain separation.
    ///
    /// The digest input is `b"RNET:<domain>:v1" || len(data) as u64 LE ||
    /// data`, so distinct domains can never collide on shared payloads.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"RNET:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for SpeciesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SpeciesKey({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Domain tag for molecule colour initialization.
const DOMAIN_WL_INIT: &[u8] = b"WL_INIT";
/// Domain tag for colour refinement rounds.
const DOMAIN_WL_ROUND: &[u8] = b"WL_ROUND";
/// Domain tag for the final species certificate.
const DOMAIN_SPECIES: &[u8] = b"SPECIES_CANON";

/// A species graph relabeled into canonical order, plus its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSpecies {
    pub graph: SpeciesGraph,
    pub key: SpeciesKey,
}

/// Computes the canonical representative of a species graph's isomorphism
/// class.
///
/// The returned graph has its molecules permuted into certificate order, so
/// canonically equal species are byte-identical, and `key` is the hash of
/// the minimal certificate.
pub fn canonicalize(graph: &SpeciesGraph) -> CanonicalSpecies {
    let (bytes, perm) = minimal_certificate(graph);
    let key = SpeciesKey::hash_with_domain(DOMAIN_SPECIES, &bytes);
    CanonicalSpecies {
        graph: apply_ordering(graph, &perm),
        key,
    }
}

/// Canonical key without materializing the reordered graph.
pub fn species_key(graph: &SpeciesGraph) -> SpeciesKey {
    let (bytes, _) = minimal_certificate(graph);
    SpeciesKey::hash_with_domain(DOMAIN_SPECIES, &bytes)
}

/// WL colour refinement over molecule instances.
///
/// A colour is the molecule's local invariant (type id, site states, bound
/// flags; big-endian, so colour order follows type order) followed by a
/// refinement hash. Each round folds the sorted multiset of
/// `(own site, partner site, partner colour)` triples across incident bonds
/// into the hash; refinement stops when the partition stops splitting.
///
/// The readable prefix matters: the ordering search seeds from the minimal
/// colour class, and the prefix makes that class the minimal molecule type
/// rather than an arbitrary hash winner.
fn wl_colors(graph: &SpeciesGraph) -> Vec<Vec<u8>> {
    let n = graph.molecule_count();
    let mut prefixes: Vec<Vec<u8>> = Vec::with_capacity(n);
    for (_, mol) in graph.molecules() {
        let mut prefix = Vec::with_capacity(4 + mol.sites.len() * 3);
        prefix.extend_from_slice(&(mol.ty.index() as u32).to_be_bytes());
        for slot in &mol.sites {
            prefix.extend_from_slice(&slot.state.map_or(u16::MAX, |s| s.raw()).to_be_bytes());
            // Bound sorts below unbound, matching the certificate's bond
            // encoding.
            prefix.push(slot.bond.is_none() as u8);
        }
        prefixes.push(prefix);
    }
    let with_hash = |hashes: &[[u8; 32]]| -> Vec<Vec<u8>> {
        prefixes
            .iter()
            .zip(hashes)
            .map(|(p, h)| {
                let mut color = p.clone();
                color.extend_from_slice(h);
                color
            })
            .collect()
    };

    let mut hashes: Vec<[u8; 32]> = prefixes
        .iter()
        .map(|p| SpeciesKey::hash_with_domain(DOMAIN_WL_INIT, p).0)
        .collect();
    let mut colors = with_hash(&hashes);
    let mut classes = distinct(&colors);
    for _ in 0..n {
        let mut next: Vec<[u8; 32]> = Vec::with_capacity(n);
        for (mi, mol) in graph.molecules() {
            let mut neighbors: Vec<Vec<u8>> = Vec::new();
            for (si, slot) in mol.sites.iter().enumerate() {
                if let Some(partner) = slot.bond {
                    let partner_color = &colors[partner.molecule as usize];
                    let mut entry = Vec::with_capacity(4 + partner_color.len());
                    entry.extend_from_slice(&(si as u16).to_be_bytes());
                    entry.extend_from_slice(&partner.site.to_be_bytes());
                    entry.extend_from_slice(partner_color);
                    neighbors.push(entry);
                }
            }
            neighbors.sort_unstable();
            let mut data = Vec::new();
            data.extend_from_slice(&hashes[mi]);
            for entry in &neighbors {
                data.extend_from_slice(&(entry.len() as u64).to_le_bytes());
                data.extend_from_slice(entry);
            }
            next.push(SpeciesKey::hash_with_domain(DOMAIN_WL_ROUND, &data).0);
        }
        hashes = next;
        let next_colors = with_hash(&hashes);
        let next_classes = distinct(&next_colors);
        colors = next_colors;
        if next_classes == classes {
            break;
        }
        classes = next_classes;
    }
    colors
}

fn distinct(colors: &[Vec<u8>]) -> usize {
    let mut sorted: Vec<&Vec<u8>> = colors.iter().collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

/// Appends one molecule's certificate record given the positions already
/// assigned. Big-endian fields so byte-lexicographic order equals numeric
/// order.
fn push_record(out: &mut Vec<u8>, mol: &MoleculeInstance, position_of: &[u16]) {
    const UNBOUND: u32 = u32::MAX;
    const PENDING: u32 = u32::MAX - 1;
    out.extend_from_slice(&(mol.ty.index() as u32).to_be_bytes());
    for slot in &mol.sites {
        out.extend_from_slice(&slot.state.map_or(u16::MAX, |s| s.raw()).to_be_bytes());
        let bond = match slot.bond {
            None => UNBOUND,
            Some(partner) => {
                let pos = position_of[partner.molecule as usize];
                if pos == u16::MAX {
                    PENDING
                } else {
                    ((pos as u32) << 16) | partner.site as u32
                }
            }
        };
        out.extend_from_slice(&bond.to_be_bytes());
    }
}

/// Smallest-certificate ordering search.
///
/// Candidates at each depth are restricted to the minimal WL colour class
/// among unplaced molecules (an isomorphism-invariant restriction, so the
/// minimum over explored orderings is still canonical), with prefix pruning
/// against the best certificate found so far. Returns the certificate and
/// the ordering as `perm[position] = original index`.
fn minimal_certificate(graph: &SpeciesGraph) -> (Vec<u8>, Vec<u32>) {
    let n = graph.molecule_count();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }
    let colors = wl_colors(graph);
    let mut search = Search {
        graph,
        colors: &colors,
        position_of: vec![u16::MAX; n],
        perm: Vec::with_capacity(n),
        prefix: Vec::new(),
        best: None,
        lt_best: false,
    };
    search.descend();
    let (bytes, perm) = search.best.expect("non-empty graph yields a certificate");
    (bytes, perm)
}

struct Search<'g> {
    graph: &'g SpeciesGraph,
    colors: &'g [Vec<u8>],
    /// `u16::MAX` while unplaced.
    position_of: Vec<u16>,
    perm: Vec<u32>,
    prefix: Vec<u8>,
    best: Option<(Vec<u8>, Vec<u32>)>,
    /// Whether the current prefix is already strictly below the best.
    lt_best: bool,
}

impl Search<'_> {
    fn descend(&mut self) {
        let n = self.graph.molecule_count();
        if self.perm.len() == n {
            let better = match &self.best {
                None => true,
                // Equal certificates from distinct orderings are
                // automorphic images; keep the first.
                Some((best, _)) => self.prefix.as_slice() < best.as_slice(),
            };
            if better {
                self.best = Some((self.prefix.clone(), self.perm.clone()));
            }
            return;
        }

        // Minimal colour class among unplaced molecules.
        let min_color = (0..n)
            .filter(|&i| self.position_of[i] == u16::MAX)
            .map(|i| &self.colors[i])
            .min()
            .expect("unplaced molecule exists");
        let candidates: Vec<usize> = (0..n)
            .filter(|&i| self.position_of[i] == u16::MAX && &self.colors[i] == min_color)
            .collect();

        for cand in candidates {
            let mol = self.graph.molecule(cand);
            let mark = self.prefix.len();
            self.position_of[cand] = self.perm.len() as u16;
            self.perm.push(cand as u32);
            push_record(&mut self.prefix, mol, &self.position_of);

            let saved_lt = self.lt_best;
            let prune = if !self.lt_best {
                if let Some((best, _)) = &self.best {
                    let end = self.prefix.len().min(best.len());
                    match self.prefix[mark..end].cmp(&best[mark..end]) {
                        Ordering::Greater => true,
                        Ordering::Less => {
                            self.lt_best = true;
                            false
                        }
                        Ordering::Equal => false,
                    }
                } else {
                    false
                }
            } else {
                false
            };

            if !prune {
                self.descend();
            }

            self.lt_best = saved_lt;
            self.prefix.truncate(mark);
            self.perm.pop();
            self.position_of[cand] = u16::MAX;
        }
    }
}

/// Rebuilds the graph with molecules in `perm` order and bonds remapped.
fn apply_ordering(graph: &SpeciesGraph, perm: &[u32]) -> SpeciesGraph {
    let mut position_of = vec![0u32; graph.molecule_count()];
    for (pos, &old) in perm.iter().enumerate() {
        position_of[old as usize] = pos as u32;
    }
    let mut out = SpeciesGraph::new();
    for &old in perm {
        let mut inst = graph.molecule(old as usize).clone();
        for slot in &mut inst.sites {
            if let Some(partner) = &mut slot.bond {
                partner.molecule = position_of[partner.molecule as usize];
            }
        }
        out.push(inst);
    }
    out
}
