//! Zero-suppressed Decision Diagrams.
//!
//! A [`Zdd`] represents a family of sets of variables. Its nodes are eliminated when their high
//! child is `∅` rather than when both children agree, which keeps sparse families small. The
//! operations mirror the BDD ones in [`bdd`][crate::bdd], but a ZDD handle never carries a
//! negation flag: the complement of a family depends on the universe it is taken in.
//!
//! ```rust
//! use extdd::manager::Manager;
//!
//! let mgr = Manager::default();
//! let a = mgr.zdd_single(&[0, 2])?;
//! let b = mgr.zdd_single(&[1])?;
//! let ab = mgr.zdd_union(&a, &b)?;
//!
//! assert_eq!(mgr.zdd_count(&ab)?, 2u32.into());
//! assert!(mgr.zdd_contains(&ab, &[2, 0])?);
//! # Ok::<(), extdd::error::Error>(())
//! ```

use std::fmt::Debug;
use std::path::Path;

use num_bigint::BigUint;

use crate::bdd::{with_support, Bdd};
use crate::bool_op::{And, BinaryOperator, Diff, Or, Xor};
use crate::build;
use crate::count;
use crate::dd::Dd;
use crate::equal;
use crate::error::Result;
use crate::eval;
use crate::file::LevelizedFile;
use crate::manager::Manager;
use crate::policy::ZddPolicy;
use crate::ptr::Label;
use crate::replace;
use crate::sweep::intercut::{intercut, BddToZdd, Change, Complement, Expand};
use crate::sweep::prod2::{prod2, ZddProd2};
use crate::sweep::select;

/// Handle to a reduced ZDD.
#[derive(Clone)]
pub struct Zdd(pub(crate) Dd);

impl Zdd {
    pub fn dd(&self) -> &Dd {
        &self.0
    }

    /// Whether this is the empty family `∅`.
    pub fn is_empty(&self) -> bool {
        self.0.is_false()
    }

    /// Whether this is the family `{∅}`.
    pub fn is_null(&self) -> bool {
        self.0.is_true()
    }

    /// Number of internal nodes.
    pub fn size(&self) -> u64 {
        self.0.nodecount()
    }

    /// The variables that occur in some set, ascending.
    pub fn support(&self) -> Result<Vec<Label>> {
        self.0.labels()
    }
}

impl Debug for Zdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Zdd").field(&self.0).finish()
    }
}

impl From<Dd> for Zdd {
    fn from(dd: Dd) -> Self {
        debug_assert!(!dd.is_negated(), "ZDD handles are never negated");
        Zdd(dd)
    }
}

impl Manager {
    /// The empty family `∅`.
    pub fn zdd_empty(&self) -> Result<Zdd> {
        build::zdd_empty(self.config()).map(Zdd)
    }

    /// The family `{∅}`.
    pub fn zdd_null(&self) -> Result<Zdd> {
        build::zdd_null(self.config()).map(Zdd)
    }

    /// All subsets of `domain ∪ {v}` that contain `v`.
    pub fn zdd_var(&self, v: Label, domain: &[Label]) -> Result<Zdd> {
        build::zdd_ithvar(self.config(), v, domain).map(Zdd)
    }

    /// The family `{vars}`.
    pub fn zdd_single(&self, vars: &[Label]) -> Result<Zdd> {
        build::zdd_singleton(self.config(), vars).map(Zdd)
    }

    /// All subsets of `vars`.
    pub fn zdd_powerset(&self, vars: &[Label]) -> Result<Zdd> {
        build::zdd_powerset(self.config(), vars).map(Zdd)
    }

    /// `op` applied set-wise: a set is in the result iff `op(in f, in g)` holds.
    ///
    /// `op(false, false)` must be `false`.
    pub fn zdd_apply<O: BinaryOperator>(&self, f: &Zdd, g: &Zdd, op: &O) -> Result<Zdd> {
        debug_assert!(!op.eval(false, false), "The operator must map (∅, ∅) to ∅");
        let res = prod2::<ZddProd2, O>(self.config(), &f.0, &g.0, op)?;
        self.reduce::<ZddPolicy>(res).map(Zdd)
    }

    pub fn zdd_union(&self, f: &Zdd, g: &Zdd) -> Result<Zdd> {
        self.zdd_apply(f, g, &Or)
    }

    pub fn zdd_intersect(&self, f: &Zdd, g: &Zdd) -> Result<Zdd> {
        self.zdd_apply(f, g, &And)
    }

    pub fn zdd_diff(&self, f: &Zdd, g: &Zdd) -> Result<Zdd> {
        self.zdd_apply(f, g, &Diff)
    }

    pub fn zdd_symdiff(&self, f: &Zdd, g: &Zdd) -> Result<Zdd> {
        self.zdd_apply(f, g, &Xor)
    }

    /// Whether `f` and `g` are the same family.
    pub fn zdd_equal(&self, f: &Zdd, g: &Zdd) -> Result<bool> {
        equal::is_equal::<ZddProd2>(self.config(), &f.0, &g.0)
    }

    /// Whether every set of `f` is a set of `g`.
    pub fn zdd_is_subset(&self, f: &Zdd, g: &Zdd) -> Result<bool> {
        if f.is_empty() {
            return Ok(true);
        }
        Ok(self.zdd_diff(f, g)?.is_empty())
    }

    /// The sets of variables within `domain` that satisfy `f`.
    ///
    /// The support of `f` is added to `domain`.
    pub fn zdd_from_bdd(&self, f: &Bdd, domain: &[Label]) -> Result<Zdd> {
        let domain = with_support(domain, &f.0)?;
        let res = intercut::<BddToZdd>(self.config(), &f.0, &domain)?;
        self.reduce::<ZddPolicy>(res).map(Zdd)
    }

    /// Toggles the membership of each of `vars` in every set.
    pub fn zdd_change(&self, f: &Zdd, vars: &[Label]) -> Result<Zdd> {
        let res = intercut::<Change>(self.config(), &f.0, vars)?;
        self.reduce::<ZddPolicy>(res).map(Zdd)
    }

    /// All subsets of `universe` that are not in `f`.
    ///
    /// The support of `f` must lie within `universe`.
    pub fn zdd_complement(&self, f: &Zdd, universe: &[Label]) -> Result<Zdd> {
        let res = intercut::<Complement>(self.config(), &f.0, universe)?;
        self.reduce::<ZddPolicy>(res).map(Zdd)
    }

    /// Adds every combination of `vars` to every set of `f`.
    ///
    /// None of `vars` may occur in `f`.
    pub fn zdd_expand(&self, f: &Zdd, vars: &[Label]) -> Result<Zdd> {
        let res = intercut::<Expand>(self.config(), &f.0, vars)?;
        self.reduce::<ZddPolicy>(res).map(Zdd)
    }

    /// The sets of `f` that contain none of `vars`.
    pub fn zdd_offset(&self, f: &Zdd, vars: &[Label]) -> Result<Zdd> {
        let res = select::offset(self.config(), &f.0, vars)?;
        self.reduce::<ZddPolicy>(res).map(Zdd)
    }

    /// The sets of `f` that contain all of `vars`.
    pub fn zdd_onset(&self, f: &Zdd, vars: &[Label]) -> Result<Zdd> {
        let res = select::onset(self.config(), &f.0, vars)?;
        self.reduce::<ZddPolicy>(res).map(Zdd)
    }

    /// Renames every variable `x` to `map(x)`; the map must be strictly increasing.
    pub fn zdd_replace(&self, f: &Zdd, map: impl Fn(Label) -> Label) -> Result<Zdd> {
        replace::replace(self.config(), &f.0, map).map(Zdd)
    }

    /// Number of sets in the family.
    pub fn zdd_count(&self, f: &Zdd) -> Result<BigUint> {
        count::pathcount(self.config(), &f.0)
    }

    /// Whether `vars` is one of the sets.
    pub fn zdd_contains(&self, f: &Zdd, vars: &[Label]) -> Result<bool> {
        eval::contains(&f.0, vars)
    }

    pub fn zdd_persist(&self, f: &Zdd, prefix: impl AsRef<Path>) -> Result<()> {
        f.0.file.persist(prefix)
    }

    pub fn zdd_open(&self, prefix: impl AsRef<Path>) -> Result<Zdd> {
        Ok(Zdd(Dd::new(LevelizedFile::open(prefix, self.config())?)))
    }
}
