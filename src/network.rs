//! Fixpoint reaction-network generation.
//!
//! Starting from the seed species of a model's initial conditions, each pass
//! matches every compiled rule direction against ordered species tuples and
//! applies every joint embedding, canonicalizing products and admitting the
//! new ones into the species table. A tuple is processed exactly once: in
//! the pass whose frontier window contains its newest member. Generation
//! reaches a fixpoint when a pass discovers nothing, or stops early at a
//! species cap, pass cap, or wall-clock budget, recorded in
//! [`Termination`].
//!
//! # Determinism
//! Species are numbered by first discovery in a fixed task order (rule
//! declaration order, then lexicographic species tuples, then embedding
//! order). Passes run their tasks on a rayon pool, but workers only read
//! shared state; task outputs are merged sequentially in task order, so the
//! resulting network is identical for any worker count.
//!
//! # Citations
//! - Iterative network expansion: Blinov et al., "BioNetGen: software for
//!   rule-based modeling" (2004)
//! - Statistical factors: Faeder, Blinov & Hlavacek, "Rule-based modeling
//!   of biochemical systems with BioNetGen" (2009)

use crate::canonical::{canonicalize, SpeciesKey};
use crate::matcher::{find_embeddings, Embedding};
use crate::model::{InitialId, Model, ModelError, ParameterId, RuleId};
use crate::rewrite::{compile_rule, CompiledDirection};
use crate::species::SpeciesGraph;
use dashmap::DashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Index of a species in generation (first-discovery) order.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(u32);

impl SpeciesId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpeciesId({})", self.0)
    }
}

/// Bounds on a generation run. Defaults leave every bound open.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_species: Option<usize>,
    pub max_passes: Option<usize>,
    pub time_budget: Option<Duration>,
}

impl GenerationOptions {
    pub fn with_max_species(mut self, cap: usize) -> Self {
        self.max_species = Some(cap);
        self
    }

    pub fn with_max_passes(mut self, cap: usize) -> Self {
        self.max_passes = Some(cap);
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }
}

/// How a generation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Fixpoint: a full pass discovered no new species.
    Complete,
    /// The species cap was hit; the network is a truncation.
    SpeciesCapReached,
    /// The pass cap was hit with work remaining.
    PassLimitReached,
    /// The wall-clock budget ran out; remaining tasks were dropped.
    TimeBudgetExceeded,
}

/// One generated species: its canonical graph, key, and seeding initial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesEntry {
    pub graph: SpeciesGraph,
    pub key: SpeciesKey,
    /// Present iff the species was seeded by an initial condition.
    pub initial: Option<InitialId>,
}

/// One concrete reaction of the generated network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub rule: RuleId,
    /// Which direction of a reversible rule produced this reaction.
    pub reverse: bool,
    pub rate: ParameterId,
    /// Consumed species, ascending; repeats encode stoichiometry.
    pub reactants: Vec<SpeciesId>,
    /// Produced species, ascending; repeats encode stoichiometry.
    pub products: Vec<SpeciesId>,
    /// Statistical factor: joint embeddings over reactant-pattern
    /// automorphisms (1/2 for symmetric dimerization, 2 for
    /// transphosphorylation across a symmetric dimer, and so on).
    pub multiplicity: f64,
}

impl Reaction {
    /// Effective mass-action rate constant: declared rate times the
    /// statistical factor.
    pub fn rate_constant(&self, model: &Model) -> f64 {
        model.parameter_value(self.rate) * self.multiplicity
    }
}

/// A fully enumerated reaction network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionNetwork {
    species: Vec<SpeciesEntry>,
    reactions: Vec<Reaction>,
    termination: Termination,
    passes: usize,
}

impl ReactionNetwork {
    #[inline]
    pub fn species(&self) -> &[SpeciesEntry] {
        &self.species
    }

    #[inline]
    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    #[inline]
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Number of passes executed.
    #[inline]
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn species_by_key(&self, key: SpeciesKey) -> Option<SpeciesId> {
        self.species
            .iter()
            .position(|s| s.key == key)
            .map(|i| SpeciesId::new(i as u32))
    }
}

struct Task {
    dir: usize,
    /// Species index per reactant slot.
    tuple: Vec<u32>,
}

/// Tasks per parallel batch; the wall-clock budget is rechecked between
/// batches so one combinatorial pass cannot overrun it unchecked.
const TASK_CHUNK: usize = 512;

/// One reaction occurrence observed by a worker, products still as keys.
struct Draft {
    dir: usize,
    reactants: Vec<SpeciesId>,
    product_keys: Vec<SpeciesKey>,
}

struct TaskOutput {
    /// Products not yet in the species table, in discovery order.
    candidates: Vec<crate::canonical::CanonicalSpecies>,
    drafts: Vec<Draft>,
}

/// Enumerates the reaction network of a model to fixpoint or bound.
pub fn generate(model: &Model, options: &GenerationOptions) -> Result<ReactionNetwork, ModelError> {
    let start = Instant::now();

    let mut dirs: Vec<(RuleId, CompiledDirection)> = Vec::new();
    for (rid, rule) in model.rules() {
        for dir in compile_rule(rule, model)? {
            dirs.push((rid, dir));
        }
    }

    let mut species: Vec<SpeciesEntry> = Vec::new();
    let known: DashMap<SpeciesKey, SpeciesId> = DashMap::new();
    for (iid, init) in model.initials() {
        let id = SpeciesId::new(species.len() as u32);
        known.insert(init.key(), id);
        species.push(SpeciesEntry {
            graph: init.graph().clone(),
            key: init.key(),
            initial: Some(iid),
        });
    }

    // embeddings[dir][slot][species] -> embedding list, extended as species
    // are discovered.
    let mut embeddings: Vec<Vec<Vec<Vec<Embedding>>>> = dirs
        .iter()
        .map(|(_, d)| vec![Vec::new(); d.reactants.len()])
        .collect();
    let mut counts: HashMap<(usize, Vec<SpeciesId>, Vec<SpeciesId>), u64> = HashMap::new();

    let has_synthesis = dirs.iter().any(|(_, d)| d.reactants.is_empty());
    let mut frontier_start = 0usize;
    let mut pass = 0usize;
    let mut termination = Termination::Complete;

    while frontier_start < species.len() || (pass == 0 && has_synthesis) {
        if let Some(cap) = options.max_passes {
            if pass >= cap {
                termination = Termination::PassLimitReached;
                break;
            }
        }
        if let Some(budget) = options.time_budget {
            if start.elapsed() >= budget {
                termination = Termination::TimeBudgetExceeded;
                break;
            }
        }
        let frontier_end = species.len();

        // Embedding cache rows for the frontier species.
        let new_rows: Vec<Vec<Vec<Vec<Embedding>>>> = (frontier_start..frontier_end)
            .into_par_iter()
            .map(|si| {
                dirs.iter()
                    .map(|(_, d)| {
                        d.reactants
                            .iter()
                            .map(|pat| find_embeddings(pat, &species[si].graph))
                            .collect()
                    })
                    .collect()
            })
            .collect();
        for row in new_rows {
            for (di, per_slot) in row.into_iter().enumerate() {
                for (sl, list) in per_slot.into_iter().enumerate() {
                    embeddings[di][sl].push(list);
                }
            }
        }

        let mut tasks: Vec<Task> = Vec::new();
        for (di, (_, d)) in dirs.iter().enumerate() {
            if d.reactants.is_empty() {
                if pass == 0 {
                    tasks.push(Task {
                        dir: di,
                        tuple: Vec::new(),
                    });
                }
                continue;
            }
            let mut tuple = Vec::with_capacity(d.reactants.len());
            push_tuples(
                di,
                &embeddings[di],
                frontier_start,
                frontier_end,
                &mut tuple,
                false,
                &mut tasks,
            );
        }
        debug!(pass, frontier_start, frontier_end, tasks = tasks.len(), "generation pass");

        // Run and merge in chunks so the wall-clock budget binds within a
        // pass, not only between passes.
        let mut truncated = false;
        let mut over_budget = false;
        for chunk in tasks.chunks(TASK_CHUNK) {
            let outputs: Vec<TaskOutput> = chunk
                .par_iter()
                .map(|task| run_task(task, &dirs, &species, &embeddings, &known))
                .collect();

            // Sequential merge in task order: first discovery numbers species.
            for output in outputs {
                for cand in output.candidates {
                    if known.contains_key(&cand.key) {
                        continue;
                    }
                    if options.max_species.is_some_and(|cap| species.len() >= cap) {
                        truncated = true;
                        continue;
                    }
                    let id = SpeciesId::new(species.len() as u32);
                    known.insert(cand.key, id);
                    species.push(SpeciesEntry {
                        graph: cand.graph,
                        key: cand.key,
                        initial: None,
                    });
                }
                'draft: for draft in output.drafts {
                    let mut reactants = draft.reactants;
                    reactants.sort_unstable();
                    let mut products = Vec::with_capacity(draft.product_keys.len());
                    for key in &draft.product_keys {
                        match known.get(key) {
                            Some(id) => products.push(*id),
                            // Product fell past the species cap; the reaction
                            // is part of the truncated remainder.
                            None => {
                                truncated = true;
                                continue 'draft;
                            }
                        }
                    }
                    products.sort_unstable();
                    *counts.entry((draft.dir, reactants, products)).or_insert(0) += 1;
                }
            }

            if options.time_budget.is_some_and(|b| start.elapsed() >= b) {
                over_budget = true;
                break;
            }
        }

        frontier_start = frontier_end;
        pass += 1;
        if truncated {
            termination = Termination::SpeciesCapReached;
            break;
        }
        if over_budget {
            termination = Termination::TimeBudgetExceeded;
            break;
        }
    }

    let mut keyed: Vec<((usize, Vec<SpeciesId>, Vec<SpeciesId>), u64)> = counts.into_iter().collect();
    keyed.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    let reactions: Vec<Reaction> = keyed
        .into_iter()
        .map(|((di, reactants, products), count)| {
            let (rule, dir) = &dirs[di];
            Reaction {
                rule: *rule,
                reverse: dir.reverse,
                rate: dir.rate,
                reactants,
                products,
                multiplicity: count as f64 / dir.symmetry as f64,
            }
        })
        .collect();

    info!(
        species = species.len(),
        reactions = reactions.len(),
        passes = pass,
        ?termination,
        "network generation finished"
    );
    Ok(ReactionNetwork {
        species,
        reactions,
        termination,
        passes: pass,
    })
}

/// Lexicographic ordered-tuple enumeration, restricted to tuples whose
/// newest member lies in the frontier window and whose every slot has at
/// least one embedding.
fn push_tuples(
    dir: usize,
    slots: &[Vec<Vec<Embedding>>],
    frontier_start: usize,
    total: usize,
    tuple: &mut Vec<u32>,
    has_frontier: bool,
    tasks: &mut Vec<Task>,
) {
    let depth = tuple.len();
    if depth == slots.len() {
        if has_frontier {
            tasks.push(Task {
                dir,
                tuple: tuple.clone(),
            });
        }
        return;
    }
    for s in 0..total {
        if slots[depth][s].is_empty() {
            continue;
        }
        tuple.push(s as u32);
        push_tuples(
            dir,
            slots,
            frontier_start,
            total,
            tuple,
            has_frontier || s >= frontier_start,
            tasks,
        );
        tuple.pop();
    }
}

fn run_task(
    task: &Task,
    dirs: &[(RuleId, CompiledDirection)],
    species: &[SpeciesEntry],
    embeddings: &[Vec<Vec<Vec<Embedding>>>],
    known: &DashMap<SpeciesKey, SpeciesId>,
) -> TaskOutput {
    let dir = &dirs[task.dir].1;
    let graphs: Vec<&SpeciesGraph> = task
        .tuple
        .iter()
        .map(|&s| &species[s as usize].graph)
        .collect();
    let lists: Vec<&Vec<Embedding>> = task
        .tuple
        .iter()
        .enumerate()
        .map(|(sl, &s)| &embeddings[task.dir][sl][s as usize])
        .collect();
    let reactant_ids: Vec<SpeciesId> = task.tuple.iter().map(|&s| SpeciesId::new(s)).collect();

    let mut out = TaskOutput {
        candidates: Vec::new(),
        drafts: Vec::new(),
    };
    for_each_combo(&lists, |combo| {
        let products = dir.apply(&graphs, combo);
        let mut product_keys = Vec::with_capacity(products.len());
        for product in &products {
            let canon = canonicalize(product);
            if !known.contains_key(&canon.key) {
                out.candidates.push(canon.clone());
            }
            product_keys.push(canon.key);
        }
        out.drafts.push(Draft {
            dir: task.dir,
            reactants: reactant_ids.clone(),
            product_keys,
        });
    });
    out
}

/// Calls `f` with every element of the cartesian product of the embedding
/// lists, in odometer order.
fn for_each_combo(lists: &[&Vec<Embedding>], mut f: impl FnMut(&[Embedding])) {
    if lists.iter().any(|l| l.is_empty()) {
        return;
    }
    let k = lists.len();
    let mut idx = vec![0usize; k];
    loop {
        let combo: Vec<Embedding> = idx
            .iter()
            .enumerate()
            .map(|(sl, &j)| lists[sl][j].clone())
            .collect();
        f(&combo);
        let mut d = k;
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            idx[d] += 1;
            if idx[d] < lists[d].len() {
                break;
            }
            idx[d] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MoleculeType, MoleculeTypeId, Rule, SiteDef, StateId};
    use crate::pattern::{BondCondition, BondLabel, ComplexPattern, MoleculePattern};

    fn unbound(ty: MoleculeTypeId, sites: usize, site: usize) -> ComplexPattern {
        ComplexPattern::single(
            MoleculePattern::new(ty, sites).with_bond(site, BondCondition::Unbound),
        )
    }

    /// A(b) + B(a) <-> A(b!0).B(a!0), seeded with free A and B.
    fn ab_model() -> Model {
        let mut m = Model::new("ab");
        let a = m
            .add_molecule_type(MoleculeType::new("A").with_site(SiteDef::bond_only("b")))
            .unwrap();
        let b = m
            .add_molecule_type(MoleculeType::new("B").with_site(SiteDef::bond_only("a")))
            .unwrap();
        let kf = m.add_parameter("kf", 1.0).unwrap();
        let kr = m.add_parameter("kr", 0.1).unwrap();
        let n0 = m.add_parameter("n0", 100.0).unwrap();
        let l = BondLabel::new(1);
        m.add_rule(
            Rule::new(
                "bind",
                vec![unbound(a, 1, 0), unbound(b, 1, 0)],
                vec![ComplexPattern::new()
                    .with(MoleculePattern::new(a, 1).with_bond(0, BondCondition::Bond(l)))
                    .with(MoleculePattern::new(b, 1).with_bond(0, BondCondition::Bond(l)))],
                kf,
            )
            .reversible(kr),
        )
        .unwrap();
        m.add_initial(unbound(a, 1, 0), n0).unwrap();
        m.add_initial(unbound(b, 1, 0), n0).unwrap();
        m
    }

    #[test]
    fn heterodimer_network_closes_with_three_species() {
        let m = ab_model();
        let net = generate(&m, &GenerationOptions::default()).unwrap();
        assert_eq!(net.termination(), Termination::Complete);
        assert_eq!(net.species().len(), 3);
        assert_eq!(net.reactions().len(), 2);
        let renders: Vec<String> = net.species().iter().map(|s| s.graph.render(&m)).collect();
        assert_eq!(renders, vec!["A(b)", "B(a)", "A(b!0).B(a!0)"]);

        let forward = net.reactions().iter().find(|r| !r.reverse).unwrap();
        assert_eq!(forward.reactants, vec![SpeciesId::new(0), SpeciesId::new(1)]);
        assert_eq!(forward.products, vec![SpeciesId::new(2)]);
        assert_eq!(forward.multiplicity, 1.0);
        assert_eq!(forward.rate_constant(&m), 1.0);

        let back = net.reactions().iter().find(|r| r.reverse).unwrap();
        assert_eq!(back.reactants, vec![SpeciesId::new(2)]);
        assert_eq!(back.multiplicity, 1.0);
    }

    #[test]
    fn symmetric_dimerization_gets_the_half_factor() {
        let mut m = Model::new("aa");
        let a = m
            .add_molecule_type(MoleculeType::new("A").with_site(SiteDef::bond_only("d")))
            .unwrap();
        let kf = m.add_parameter("kf", 2.0).unwrap();
        let n0 = m.add_parameter("n0", 50.0).unwrap();
        let l = BondLabel::new(1);
        m.add_rule(Rule::new(
            "dimerize",
            vec![unbound(a, 1, 0), unbound(a, 1, 0)],
            vec![ComplexPattern::new()
                .with(MoleculePattern::new(a, 1).with_bond(0, BondCondition::Bond(l)))
                .with(MoleculePattern::new(a, 1).with_bond(0, BondCondition::Bond(l)))],
            kf,
        ))
        .unwrap();
        m.add_initial(unbound(a, 1, 0), n0).unwrap();

        let net = generate(&m, &GenerationOptions::default()).unwrap();
        assert_eq!(net.species().len(), 2);
        assert_eq!(net.reactions().len(), 1);
        let r = &net.reactions()[0];
        assert_eq!(r.reactants, vec![SpeciesId::new(0), SpeciesId::new(0)]);
        assert_eq!(r.multiplicity, 0.5);
        assert_eq!(r.rate_constant(&m), 1.0);
    }

    /// Receptor fragment: dimerization plus transphosphorylation across the
    /// dimer bond.
    fn receptor_model() -> Model {
        let mut m = Model::new("egfr_fragment");
        let egfr = m
            .add_molecule_type(
                MoleculeType::new("EGFR")
                    .with_site(SiteDef::bond_only("d"))
                    .with_site(SiteDef::with_states("Y1068", ["u", "p"])),
            )
            .unwrap();
        let kd = m.add_parameter("kd", 1.0).unwrap();
        let ku = m.add_parameter("ku", 0.1).unwrap();
        let kp = m.add_parameter("kp", 1.0).unwrap();
        let n0 = m.add_parameter("n0", 100.0).unwrap();
        let l = BondLabel::new(1);
        let free = |_m: &Model| {
            ComplexPattern::single(
                MoleculePattern::new(egfr, 2).with_bond(0, BondCondition::Unbound),
            )
        };
        m.add_rule(
            Rule::new(
                "dimerize",
                vec![free(&m), free(&m)],
                vec![ComplexPattern::new()
                    .with(MoleculePattern::new(egfr, 2).with_bond(0, BondCondition::Bond(l)))
                    .with(MoleculePattern::new(egfr, 2).with_bond(0, BondCondition::Bond(l)))],
                kd,
            )
            .reversible(ku),
        )
        .unwrap();
        m.add_rule(Rule::new(
            "transphos",
            vec![ComplexPattern::new()
                .with(
                    MoleculePattern::new(egfr, 2)
                        .with_bond(0, BondCondition::Bond(l))
                        .with_state(1, StateId::new(0)),
                )
                .with(MoleculePattern::new(egfr, 2).with_bond(0, BondCondition::Bond(l)))],
            vec![ComplexPattern::new()
                .with(
                    MoleculePattern::new(egfr, 2)
                        .with_bond(0, BondCondition::Bond(l))
                        .with_state(1, StateId::new(1)),
                )
                .with(MoleculePattern::new(egfr, 2).with_bond(0, BondCondition::Bond(l)))],
            kp,
        ))
        .unwrap();
        m.add_initial(
            ComplexPattern::single(
                MoleculePattern::new(egfr, 2)
                    .with_bond(0, BondCondition::Unbound)
                    .with_state(1, StateId::new(0)),
            ),
            n0,
        )
        .unwrap();
        m
    }

    #[test]
    fn transphosphorylation_across_a_symmetric_dimer_doubles() {
        let m = receptor_model();
        let net = generate(&m, &GenerationOptions::default()).unwrap();
        assert_eq!(net.termination(), Termination::Complete);
        // u, uu, up, pp, p
        assert_eq!(net.species().len(), 5);

        let uu = net
            .species()
            .iter()
            .position(|s| s.graph.render(&m) == "EGFR(d!0,Y1068~u).EGFR(d!0,Y1068~u)")
            .unwrap();
        let phos_id = m.rule_by_name("transphos").unwrap();
        let from_uu = net
            .reactions()
            .iter()
            .find(|r| r.rule == phos_id && r.reactants == vec![SpeciesId::new(uu as u32)])
            .unwrap();
        // Both receptors can phosphorylate their partner.
        assert_eq!(from_uu.multiplicity, 2.0);

        // The asymmetric dimer supports exactly one u-side application.
        let up = net
            .species()
            .iter()
            .position(|s| {
                let r = s.graph.render(&m);
                r.contains("Y1068~u") && r.contains("Y1068~p")
            })
            .unwrap();
        let from_up = net
            .reactions()
            .iter()
            .find(|r| r.rule == phos_id && r.reactants == vec![SpeciesId::new(up as u32)])
            .unwrap();
        assert_eq!(from_up.multiplicity, 1.0);
    }

    #[test]
    fn generation_is_deterministic() {
        let m = receptor_model();
        let n1 = generate(&m, &GenerationOptions::default()).unwrap();
        let n2 = generate(&m, &GenerationOptions::default()).unwrap();
        let keys1: Vec<SpeciesKey> = n1.species().iter().map(|s| s.key).collect();
        let keys2: Vec<SpeciesKey> = n2.species().iter().map(|s| s.key).collect();
        assert_eq!(keys1, keys2);
        assert_eq!(n1.reactions().len(), n2.reactions().len());
        for (a, b) in n1.reactions().iter().zip(n2.reactions()) {
            assert_eq!((a.rule, a.reverse, &a.reactants, &a.products), (b.rule, b.reverse, &b.reactants, &b.products));
            assert_eq!(a.multiplicity, b.multiplicity);
        }
    }

    /// Unbounded chain growth: A(l) + A(r) binding end to end.
    fn polymer_model() -> Model {
        let mut m = Model::new("polymer");
        let a = m
            .add_molecule_type(
                MoleculeType::new("A")
                    .with_site(SiteDef::bond_only("l"))
                    .with_site(SiteDef::bond_only("r")),
            )
            .unwrap();
        let kf = m.add_parameter("kf", 1.0).unwrap();
        let n0 = m.add_parameter("n0", 1000.0).unwrap();
        let l = BondLabel::new(1);
        m.add_rule(Rule::new(
            "extend",
            vec![
                ComplexPattern::single(
                    MoleculePattern::new(a, 2).with_bond(1, BondCondition::Unbound),
                ),
                ComplexPattern::single(
                    MoleculePattern::new(a, 2).with_bond(0, BondCondition::Unbound),
                ),
            ],
            vec![ComplexPattern::new()
                .with(MoleculePattern::new(a, 2).with_bond(1, BondCondition::Bond(l)))
                .with(MoleculePattern::new(a, 2).with_bond(0, BondCondition::Bond(l)))],
            kf,
        ))
        .unwrap();
        m.add_initial(
            ComplexPattern::single(
                MoleculePattern::new(a, 2)
                    .with_bond(0, BondCondition::Unbound)
                    .with_bond(1, BondCondition::Unbound),
            ),
            n0,
        )
        .unwrap();
        m
    }

    #[test]
    fn species_cap_truncates_unbounded_models() {
        let m = polymer_model();
        let net = generate(&m, &GenerationOptions::default().with_max_species(6)).unwrap();
        assert_eq!(net.termination(), Termination::SpeciesCapReached);
        assert!(net.species().len() <= 6);
    }

    #[test]
    fn exhausted_time_budget_stops_before_new_work() {
        let m = polymer_model();
        let net = generate(
            &m,
            &GenerationOptions::default().with_time_budget(Duration::ZERO),
        )
        .unwrap();
        assert_eq!(net.termination(), Termination::TimeBudgetExceeded);
        assert_eq!(net.passes(), 0);
        // Only the seeded monomer made it in.
        assert_eq!(net.species().len(), 1);
    }

    #[test]
    fn pass_cap_stops_with_work_remaining() {
        let m = polymer_model();
        let net = generate(&m, &GenerationOptions::default().with_max_passes(2)).unwrap();
        assert_eq!(net.termination(), Termination::PassLimitReached);
        assert_eq!(net.passes(), 2);
    }

    #[test]
    fn synthesis_runs_without_seed_species() {
        let mut m = Model::new("source");
        let a = m
            .add_molecule_type(MoleculeType::new("A").with_site(SiteDef::bond_only("b")))
            .unwrap();
        let ks = m.add_parameter("ks", 1.0).unwrap();
        m.add_rule(Rule::new("make_a", vec![], vec![unbound(a, 1, 0)], ks))
            .unwrap();
        let net = generate(&m, &GenerationOptions::default()).unwrap();
        assert_eq!(net.species().len(), 1);
        assert_eq!(net.species()[0].graph.render(&m), "A(b)");
        assert_eq!(net.reactions().len(), 1);
        assert!(net.reactions()[0].reactants.is_empty());
    }

    #[test]
    fn degradation_yields_a_sink_reaction() {
        let mut m = Model::new("sink");
        let a = m
            .add_molecule_type(MoleculeType::new("A").with_site(SiteDef::bond_only("b")))
            .unwrap();
        let kd = m.add_parameter("kd", 1.0).unwrap();
        let n0 = m.add_parameter("n0", 10.0).unwrap();
        m.add_rule(Rule::new(
            "degrade",
            vec![ComplexPattern::single(MoleculePattern::new(a, 1))],
            vec![],
            kd,
        ))
        .unwrap();
        m.add_initial(unbound(a, 1, 0), n0).unwrap();
        let net = generate(&m, &GenerationOptions::default()).unwrap();
        assert_eq!(net.reactions().len(), 1);
        assert!(net.reactions()[0].products.is_empty());
    }
}
