//! Binary Decision Diagrams.
//!
//! A [`Bdd`] is a handle to an immutable, reduced node file. Handles are cheap to clone and share
//! their file; negation only flips a flag on the handle. All operations go through the
//! [`Manager`], which streams the operands into a new file:
//!
//! ```text
//! apply / exists / restrict      replace            builders
//!        |                          |                   |
//!   top-down sweep            linear relabel     bottom-up writer
//!        |                          |                   |
//!   unreduced arcs ---> Reduce ---> reduced node file <--
//! ```
//!
//! ## Example
//!
//! ```rust
//! use extdd::manager::Manager;
//!
//! let mgr = Manager::default();
//! let x0 = mgr.mk_var(0)?;
//! let x1 = mgr.mk_var(1)?;
//! let f = mgr.apply_and(&x0, &mgr.apply_not(&x1))?;
//!
//! assert!(mgr.eval(&f, |x| x == 0)?);
//! assert_eq!(mgr.sat_count(&f, 2)?, 1u32.into());
//! # Ok::<(), extdd::error::Error>(())
//! ```

use std::fmt::Debug;
use std::path::Path;

use num_bigint::BigUint;

use crate::bool_op::{And, BinaryOperator, Diff, Imp, Nand, Nor, Or, Xnor, Xor};
use crate::build;
use crate::count;
use crate::dd::Dd;
use crate::equal;
use crate::error::Result;
use crate::eval;
use crate::file::LevelizedFile;
use crate::manager::Manager;
use crate::policy::BddPolicy;
use crate::ptr::Label;
use crate::replace;
use crate::sweep::intercut::{intercut, ZddToBdd};
use crate::sweep::prod2::{prod2, BddProd2};
use crate::sweep::prod3;
use crate::sweep::quantify::quantify;
use crate::sweep::select;
use crate::zdd::Zdd;

/// Handle to a reduced BDD.
#[derive(Clone)]
pub struct Bdd(pub(crate) Dd);

impl Bdd {
    pub fn dd(&self) -> &Dd {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_false()
    }

    pub fn is_one(&self) -> bool {
        self.0.is_true()
    }

    pub fn is_const(&self) -> bool {
        self.0.is_terminal()
    }

    /// Number of internal nodes.
    pub fn size(&self) -> u64 {
        self.0.nodecount()
    }

    /// Number of levels, i.e. of variables the function depends on.
    pub fn varcount(&self) -> u64 {
        self.0.varcount()
    }

    /// The variables the function depends on, ascending.
    pub fn support(&self) -> Result<Vec<Label>> {
        self.0.labels()
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Bdd").field(&self.0).finish()
    }
}

impl From<Dd> for Bdd {
    fn from(dd: Dd) -> Self {
        Bdd(dd)
    }
}

/// `domain` together with the labels of `dd`, ascending and without duplicates.
pub(crate) fn with_support(domain: &[Label], dd: &Dd) -> Result<Vec<Label>> {
    let mut res = domain.to_vec();
    res.extend(dd.labels()?);
    res.sort_unstable();
    res.dedup();
    Ok(res)
}

impl Manager {
    pub fn zero(&self) -> Result<Bdd> {
        build::bdd_terminal(self.config(), false).map(Bdd)
    }

    pub fn one(&self) -> Result<Bdd> {
        build::bdd_terminal(self.config(), true).map(Bdd)
    }

    /// The function `x_v`.
    pub fn mk_var(&self, v: Label) -> Result<Bdd> {
        build::bdd_ithvar(self.config(), v).map(Bdd)
    }

    /// The function `¬x_v`.
    pub fn mk_nvar(&self, v: Label) -> Result<Bdd> {
        build::bdd_nithvar(self.config(), v).map(Bdd)
    }

    /// Conjunction of literals, given as `(variable, polarity)` with ascending variables.
    pub fn cube(&self, literals: &[(Label, bool)]) -> Result<Bdd> {
        build::bdd_cube(self.config(), literals).map(Bdd)
    }

    /// Conjunction of the (positive) variables.
    pub fn mk_and(&self, vars: &[Label]) -> Result<Bdd> {
        build::bdd_and(self.config(), vars).map(Bdd)
    }

    /// Disjunction of the (positive) variables.
    pub fn mk_or(&self, vars: &[Label]) -> Result<Bdd> {
        build::bdd_or(self.config(), vars).map(Bdd)
    }

    /// Negation, in constant time.
    pub fn apply_not(&self, f: &Bdd) -> Bdd {
        Bdd(Dd::with_negation(f.0.file.clone(), !f.0.negate))
    }

    /// `op(f, g)` for any binary operator.
    pub fn apply<O: BinaryOperator>(&self, f: &Bdd, g: &Bdd, op: &O) -> Result<Bdd> {
        let res = prod2::<BddProd2, O>(self.config(), &f.0, &g.0, op)?;
        self.reduce::<BddPolicy>(res).map(Bdd)
    }

    pub fn apply_and(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        self.apply(f, g, &And)
    }

    pub fn apply_or(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        self.apply(f, g, &Or)
    }

    pub fn apply_xor(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        self.apply(f, g, &Xor)
    }

    pub fn apply_nand(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        self.apply(f, g, &Nand)
    }

    pub fn apply_nor(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        self.apply(f, g, &Nor)
    }

    pub fn apply_eq(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        self.apply(f, g, &Xnor)
    }

    pub fn apply_imply(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        self.apply(f, g, &Imp)
    }

    /// `f ∧ ¬g`.
    pub fn apply_diff(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        self.apply(f, g, &Diff)
    }

    /// `if f then g else h`, in a single sweep over all three.
    pub fn apply_ite(&self, f: &Bdd, g: &Bdd, h: &Bdd) -> Result<Bdd> {
        let res = prod3::ite(self.config(), &f.0, &g.0, &h.0)?;
        self.reduce::<BddPolicy>(res).map(Bdd)
    }

    /// Whether `f` and `g` are the same function.
    pub fn is_equal(&self, f: &Bdd, g: &Bdd) -> Result<bool> {
        equal::is_equal::<BddProd2>(self.config(), &f.0, &g.0)
    }

    /// Whether `f → g` is a tautology.
    pub fn is_implies(&self, f: &Bdd, g: &Bdd) -> Result<bool> {
        if f.is_zero() || g.is_one() {
            return Ok(true);
        }
        Ok(self.apply_diff(f, g)?.is_zero())
    }

    pub fn apply_and_many<'a>(&self, fs: impl IntoIterator<Item = &'a Bdd>) -> Result<Bdd> {
        let mut res = self.one()?;
        for f in fs {
            res = self.apply_and(&res, f)?;
            if res.is_zero() {
                break;
            }
        }
        Ok(res)
    }

    pub fn apply_or_many<'a>(&self, fs: impl IntoIterator<Item = &'a Bdd>) -> Result<Bdd> {
        let mut res = self.zero()?;
        for f in fs {
            res = self.apply_or(&res, f)?;
            if res.is_one() {
                break;
            }
        }
        Ok(res)
    }

    /// Quantifies the variables one at a time, bottom-most first.
    fn quantify_all<O: BinaryOperator>(&self, f: &Bdd, vars: &[Label], op: &O) -> Result<Bdd> {
        let mut vars = vars.to_vec();
        vars.sort_unstable_by(|a, b| b.cmp(a));
        vars.dedup();

        let mut res = f.clone();
        for v in vars {
            if res.is_const() {
                break;
            }
            let arcs = quantify(self.config(), &res.0, v, op)?;
            res = Bdd(self.reduce::<BddPolicy>(arcs)?);
        }
        Ok(res)
    }

    /// `∃ v. f`.
    pub fn exists(&self, f: &Bdd, v: Label) -> Result<Bdd> {
        self.quantify_all(f, &[v], &Or)
    }

    /// `∃ vars. f`.
    pub fn exists_many(&self, f: &Bdd, vars: &[Label]) -> Result<Bdd> {
        self.quantify_all(f, vars, &Or)
    }

    /// `∀ v. f`.
    pub fn forall(&self, f: &Bdd, v: Label) -> Result<Bdd> {
        self.quantify_all(f, &[v], &And)
    }

    /// `∀ vars. f`.
    pub fn forall_many(&self, f: &Bdd, vars: &[Label]) -> Result<Bdd> {
        self.quantify_all(f, vars, &And)
    }

    /// Fixes the given variables to the given values.
    pub fn restrict(&self, f: &Bdd, assignment: &[(Label, bool)]) -> Result<Bdd> {
        let res = select::restrict(self.config(), &f.0, assignment)?;
        self.reduce::<BddPolicy>(res).map(Bdd)
    }

    /// Renames every variable `x` to `map(x)`; the map must be strictly increasing.
    pub fn replace(&self, f: &Bdd, map: impl Fn(Label) -> Label) -> Result<Bdd> {
        replace::replace(self.config(), &f.0, map).map(Bdd)
    }

    /// The characteristic function of the family `f` over `domain`: an assignment is satisfying
    /// iff its set variables within `domain` form a set of `f`.
    ///
    /// The support of `f` is added to `domain`.
    pub fn bdd_from_zdd(&self, f: &Zdd, domain: &[Label]) -> Result<Bdd> {
        let domain = with_support(domain, &f.0)?;
        let res = intercut::<ZddToBdd>(self.config(), &f.0, &domain)?;
        self.reduce::<BddPolicy>(res).map(Bdd)
    }

    /// Value of `f` under `assignment`.
    pub fn eval(&self, f: &Bdd, assignment: impl Fn(Label) -> bool) -> Result<bool> {
        eval::eval(&f.0, assignment)
    }

    /// Number of satisfying assignments over `num_vars` variables.
    ///
    /// Fails with [`Error::VarcountTooSmall`][crate::error::Error::VarcountTooSmall] if `f` depends
    /// on more than `num_vars` variables.
    pub fn sat_count(&self, f: &Bdd, num_vars: u64) -> Result<BigUint> {
        count::satcount(self.config(), &f.0, num_vars)
    }

    /// Number of satisfying assignments over the variables `f` depends on.
    pub fn sat_count_support(&self, f: &Bdd) -> Result<BigUint> {
        count::satcount(self.config(), &f.0, f.varcount())
    }

    /// Number of paths to `⊤`.
    pub fn path_count(&self, f: &Bdd) -> Result<BigUint> {
        count::pathcount(self.config(), &f.0)
    }

    /// Stores `f` under the path `prefix`.
    pub fn persist(&self, f: &Bdd, prefix: impl AsRef<Path>) -> Result<()> {
        self.materialize(&f.0)?.file.persist(prefix)
    }

    /// Reopens a BDD stored with [`Manager::persist`].
    pub fn open(&self, prefix: impl AsRef<Path>) -> Result<Bdd> {
        Ok(Bdd(Dd::new(LevelizedFile::open(prefix, self.config())?)))
    }
}
