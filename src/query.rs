//! Read-only lookups against a finished table.
//!
//! A table maps each canonical function to its minimal size and one
//! construction. Answering a query for an arbitrary function means finding
//! its canonical form, then walking the orbit once more to carry the stored
//! operands back into the caller's frame, and recursing on them.

use std::fmt::{self, Display};
use std::io::{self, Write};
use std::path::Path;

use itertools::Itertools;

use crate::canon::{Canonicalizer, OrbitWalk};
use crate::checkpoint::Savepoint;
use crate::error::{Error, InvariantViolation};
use crate::func::{Func, Universe};
use crate::raw;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The value has bits above the universe's truth table.
    OutOfRange(Func),
    /// No record for this canonical function.
    NotInTable(Func),
    /// The stored operands do not combine into the function under any
    /// operator.
    UnknownOp { f: Func, p: Func, q: Func },
    Inconsistent(String),
    Invariant(InvariantViolation),
}

impl From<InvariantViolation> for QueryError {
    fn from(e: InvariantViolation) -> Self {
        Self::Invariant(e)
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(v) => write!(f, "{v} is wider than the table's functions"),
            Self::NotInTable(v) => write!(f, "{v} is not in the table"),
            Self::UnknownOp { f: func, p, q } => {
                write!(f, "no operator gives {func} from {p} and {q}")
            }
            Self::Inconsistent(msg) => write!(f, "inconsistent table: {msg}"),
            Self::Invariant(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    And,
    Or,
    Xor,
}

impl Op {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
        }
    }

    /// Recovers the operator with `f == p op q`, complementing `q` when only
    /// `f == !(p ^ q)` holds.
    fn recover(universe: &Universe, f: Func, p: Func, q: Func) -> Option<(Self, Func)> {
        if f == (p | q) {
            Some((Self::Or, q))
        } else if f == (p & q) {
            Some((Self::And, q))
        } else if f == (p ^ q) {
            Some((Self::Xor, q))
        } else if f == universe.complement(p ^ q) {
            Some((Self::Xor, universe.complement(q)))
        } else {
            None
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A minimal expression for a function, in negation normal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tree {
    Lit {
        var: usize,
        negated: bool,
    },
    Node {
        op: Op,
        f: Func,
        l: Box<Self>,
        r: Box<Self>,
    },
}

impl Tree {
    /// Number of gates.
    pub fn complexity(&self) -> usize {
        match self {
            Self::Lit { .. } => 0,
            Self::Node { l, r, .. } => 1 + l.complexity() + r.complexity(),
        }
    }

    /// Evaluates the expression on every input assignment.
    pub fn eval(&self, universe: &Universe) -> Func {
        match self {
            Self::Lit { var, negated } => {
                let lit = universe.literal(*var);
                if *negated {
                    universe.complement(lit)
                } else {
                    lit
                }
            }
            Self::Node { op, l, r, .. } => {
                let (l, r) = (l.eval(universe), r.eval(universe));
                match op {
                    Op::And => l & r,
                    Op::Or => l | r,
                    Op::Xor => l ^ r,
                }
            }
        }
    }

    fn fmt_child(&self, parent: Op, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node { op, .. } if *op != parent => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lit { var, negated } => {
                let name = char::from(b'a' + *var as u8);
                if *negated {
                    write!(f, "!{name}")
                } else {
                    write!(f, "{name}")
                }
            }
            Self::Node { op, l, r, .. } => {
                l.fmt_child(*op, f)?;
                write!(f, " {op} ")?;
                r.fmt_child(*op, f)
            }
        }
    }
}

/// Everything known about one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub func: Func,
    pub canon: Func,
    pub size: u8,
    pub tree: Tree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Info {
    f: Func,
    p: Func,
    q: Func,
    size: u8,
}

/// Canonical records sorted by function, with their sizes.
#[derive(Debug, Clone)]
pub struct Table {
    canon: Canonicalizer,
    info: Vec<Info>,
}

impl Table {
    pub fn from_savepoint(vars: usize, sp: &Savepoint) -> Result<Self, Error> {
        sp.validate()?;
        let universe = Universe::new(vars)?;
        sp.check_range(&universe)?;
        let canon = Canonicalizer::new(universe)?;
        let sizes = sp
            .by_size
            .iter()
            .enumerate()
            .flat_map(|(size, level)| level.iter().map(move |_| size as u8));
        let mut info: Vec<Info> = sp
            .howto
            .iter()
            .zip(sizes)
            .map(|(r, size)| Info {
                f: r.f,
                p: r.p,
                q: r.q,
                size,
            })
            .collect();
        info.sort_unstable_by_key(|i| i.f);
        if let Some((a, _)) = info.iter().tuple_windows().find(|(a, b)| a.f == b.f) {
            return Err(QueryError::Inconsistent(format!("{} recorded twice", a.f)).into());
        }
        Ok(Self { canon, info })
    }

    pub fn load_raw(vars: usize, path: &Path) -> Result<Self, Error> {
        let sp = raw::load_raw(path)?;
        Self::from_savepoint(vars, &sp)
    }

    pub const fn universe(&self) -> &Universe {
        self.canon.universe()
    }

    pub const fn len(&self) -> usize {
        self.info.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.info.is_empty()
    }

    fn info(&self, canon: Func) -> Result<&Info, QueryError> {
        self.info
            .binary_search_by_key(&canon, |i| i.f)
            .map(|idx| &self.info[idx])
            .map_err(|_| QueryError::NotInTable(canon))
    }

    fn canonical(&self, f: Func) -> Result<Func, QueryError> {
        if !self.universe().contains(f) {
            return Err(QueryError::OutOfRange(f));
        }
        Ok(self.canon.canonical(f)?)
    }

    pub fn min_size(&self, f: Func) -> Result<u8, QueryError> {
        Ok(self.info(self.canonical(f)?)?.size)
    }

    pub fn lookup(&self, f: Func) -> Result<Answer, QueryError> {
        let canon = self.canonical(f)?;
        let size = self.info(canon)?.size;
        Ok(Answer {
            func: f,
            canon,
            size,
            tree: self.find_tree(f)?,
        })
    }

    /// Rebuilds a minimal expression for `f` from the stored records.
    pub fn find_tree(&self, f: Func) -> Result<Tree, QueryError> {
        let u = *self.universe();
        let info = *self.info(self.canonical(f)?)?;
        if info.size == 0 {
            return (0..u.vars())
                .find_map(|var| {
                    let lit = u.literal(var);
                    if f == lit {
                        Some(Tree::Lit { var, negated: false })
                    } else if f == u.complement(lit) {
                        Some(Tree::Lit { var, negated: true })
                    } else {
                        None
                    }
                })
                .ok_or_else(|| QueryError::Inconsistent(format!("{f} recorded as a literal")));
        }

        let mut relocate = Relocate {
            universe: &u,
            info,
        };
        let [_, p, q] = self.canon.walk([f, Func(0), Func(0)], &mut relocate)?;
        let (op, q) = Op::recover(&u, f, p, q).ok_or(QueryError::UnknownOp { f, p, q })?;
        let (p, q) = if op == Op::Xor && !u.top_clear(p) {
            (u.complement(p), u.complement(q))
        } else {
            (p, q)
        };

        for child in [p, q] {
            if self.min_size(child)? >= info.size {
                return Err(QueryError::Inconsistent(format!(
                    "operand {child} of {f} is not smaller than it"
                )));
            }
        }
        Ok(Tree::Node {
            op,
            f,
            l: Box::new(self.find_tree(p)?),
            r: Box::new(self.find_tree(q)?),
        })
    }

    /// Lists every record as `F = P op Q`, grouped by size.
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let u = self.universe();
        let by_size = self
            .info
            .iter()
            .sorted_by_key(|i| (i.size, i.f))
            .group_by(|i| i.size);
        for (size, group) in &by_size {
            let group: Vec<&Info> = group.collect();
            writeln!(w, "# size {size}: {} classes", group.len())?;
            for i in group {
                if i.size == 0 {
                    writeln!(w, "{} = literal (size 0)", i.f)?;
                    continue;
                }
                match Op::recover(u, i.f, i.p, i.q) {
                    Some((op, q)) => {
                        writeln!(w, "{} = {} {op} {} (size {size})", i.f, i.p, q)?;
                    }
                    None => writeln!(w, "{} = {} ? {} (size {size})", i.f, i.p, i.q)?,
                }
            }
        }
        Ok(())
    }
}

/// Carries a record's operands from the canonical frame back to the frame
/// the walk started in.
struct Relocate<'a> {
    universe: &'a Universe,
    info: Info,
}

impl OrbitWalk<3> for Relocate<'_> {
    fn member(&mut self, vals: &mut [Func; 3]) {
        let (fc, mask) = self.universe.fold_output(vals[0]);
        if fc == self.info.f {
            vals[1] = Func(self.info.p.0 ^ mask);
            vals[2] = Func(self.info.q.0 ^ mask);
        }
    }
}
