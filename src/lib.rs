//! Rulenet: a rule-based reaction-network generation engine.
//!
//! This crate turns a finite set of interaction rules over site graphs into
//! an explicit reaction network, providing:
//! - Typed model assembly: molecule types, parameters, rules, initial
//!   conditions and observables with handle-based referential integrity.
//! - Subgraph pattern matching with bond and state wildcards.
//! - Graph rewriting that edits only the sites a rule mentions, preserving
//!   all other molecular context.
//! - Fixpoint species enumeration with canonical species identity and
//!   BioNetGen-style statistical factors on reactions.
//! - Observable evaluation and subtractive model derivation.
//!
//! # Determinism
//!
//! Generated networks are reproducible artifacts: species numbering,
//! reaction order and multiplicities are identical across runs and across
//! rayon worker counts. Canonical species keys are stable SHA-256 digests,
//! safe to persist and compare between builds.
//!
//! # References
//!
//! - Danos, Laneve. "Formal molecular biology" (2004) – site graphs and
//!   rule-based rewriting
//! - Blinov, Faeder, Goldstein, Hlavacek. "BioNetGen: software for
//!   rule-based modeling" (2004) – network generation to fixpoint
//! - Faeder, Blinov, Hlavacek. "Rule-based modeling of biochemical systems
//!   with BioNetGen" (2009) – statistical factors and observables
//! - Lopez, Muhlich, Bachman, Sorger. "Programming biological models in
//!   Python using PySB" (2013) – the component vocabulary
//! - McKay, Piperno. "Practical graph isomorphism, II" (2014) – canonical
//!   labeling by refinement and ordering search
//!
//! # Example
//!
//! ```
//! use rulenet::prelude::*;
//!
//! let mut model = Model::new("binding");
//! let a = model
//!     .add_molecule_type(MoleculeType::new("A").with_site(SiteDef::bond_only("b")))
//!     .unwrap();
//! let b = model
//!     .add_molecule_type(MoleculeType::new("B").with_site(SiteDef::bond_only("a")))
//!     .unwrap();
//! let kf = model.add_parameter("kf", 1.0).unwrap();
//! let n0 = model.add_parameter("n0", 100.0).unwrap();
//!
//! let free_a = ComplexPattern::single(
//!     MoleculePattern::new(a, 1).with_bond(0, BondCondition::Unbound),
//! );
//! let free_b = ComplexPattern::single(
//!     MoleculePattern::new(b, 1).with_bond(0, BondCondition::Unbound),
//! );
//! let link = BondLabel::new(1);
//! let bound = ComplexPattern::new()
//!     .with(MoleculePattern::new(a, 1).with_bond(0, BondCondition::Bond(link)))
//!     .with(MoleculePattern::new(b, 1).with_bond(0, BondCondition::Bond(link)));
//!
//! model
//!     .add_rule(Rule::new("bind", vec![free_a.clone(), free_b.clone()], vec![bound], kf))
//!     .unwrap();
//! model.add_initial(free_a, n0).unwrap();
//! model.add_initial(free_b, n0).unwrap();
//!
//! let network = generate(&model, &GenerationOptions::default()).unwrap();
//! assert_eq!(network.species().len(), 3);
//! assert_eq!(network.reactions().len(), 1);
//! ```

pub mod canonical;
pub mod compose;
pub mod matcher;
pub mod model;
pub mod network;
pub mod observe;
pub mod pattern;
pub mod rewrite;
pub mod species;

pub use crate::canonical::{canonicalize, species_key, CanonicalSpecies, SpeciesKey};
pub use crate::compose::{ComposeError, Derivation};
pub use crate::matcher::{find_embeddings, Embedding};
pub use crate::model::{
    InitialId, Model, ModelError, MoleculeType, MoleculeTypeId, ObservableId, ParameterId, Rule,
    RuleId, SiteDef, StateId,
};
pub use crate::network::{
    generate, GenerationOptions, Reaction, ReactionNetwork, SpeciesId, Termination,
};
pub use crate::observe::ObservableEvaluator;
pub use crate::pattern::{
    BondCondition, BondLabel, ComplexPattern, MoleculePattern, SitePattern, StateCondition,
};
pub use crate::species::SpeciesGraph;

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::canonical::{canonicalize, species_key, SpeciesKey};
    pub use crate::compose::{ComposeError, Derivation};
    pub use crate::model::{
        Model, ModelError, MoleculeType, MoleculeTypeId, ObservableId, ParameterId, Rule, RuleId,
        SiteDef, StateId,
    };
    pub use crate::network::{
        generate, GenerationOptions, Reaction, ReactionNetwork, SpeciesId, Termination,
    };
    pub use crate::observe::ObservableEvaluator;
    pub use crate::pattern::{
        BondCondition, BondLabel, ComplexPattern, MoleculePattern, StateCondition,
    };
    pub use crate::species::SpeciesGraph;
}
