use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_COUNT: u32 = 1;
pub const MAX_COUNT: u32 = 1000;
pub const MIN_SIDES: u32 = 1;
pub const MAX_SIDES: u32 = 10_000;
pub const MAX_FLAT_VALUE: i64 = 1_000_000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    #[default]
    Plus,
    Minus,
}

impl Sign {
    pub fn apply(self, value: i64) -> i64 {
        match self {
            Sign::Plus => value,
            Sign::Minus => -value,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Sign::Plus => '+',
            Sign::Minus => '-',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropKeepKind {
    Drop,
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Highest,
    Lowest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DropKeep {
    pub kind: DropKeepKind,
    pub direction: Direction,
    pub amount: u32,
}

impl DropKeep {
    pub fn keep_highest(amount: u32) -> Self {
        Self {
            kind: DropKeepKind::Keep,
            direction: Direction::Highest,
            amount,
        }
    }

    pub fn keep_lowest(amount: u32) -> Self {
        Self {
            kind: DropKeepKind::Keep,
            direction: Direction::Lowest,
            amount,
        }
    }

    pub fn drop_highest(amount: u32) -> Self {
        Self {
            kind: DropKeepKind::Drop,
            direction: Direction::Highest,
            amount,
        }
    }

    pub fn drop_lowest(amount: u32) -> Self {
        Self {
            kind: DropKeepKind::Drop,
            direction: Direction::Lowest,
            amount,
        }
    }
}

impl fmt::Display for DropKeep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DropKeepKind::Drop => 'd',
            DropKeepKind::Keep => 'k',
        };
        let direction = match self.direction {
            Direction::Highest => 'h',
            Direction::Lowest => 'l',
        };
        write!(f, "{}{}{}", kind, direction, self.amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplodeCondition {
    Max,
    Greater(u32),
    Less(u32),
    Equal(u32),
}

impl ExplodeCondition {
    pub fn triggers(self, face: u32, sides: u32) -> bool {
        match self {
            ExplodeCondition::Max => face == sides,
            ExplodeCondition::Greater(target) => face > target,
            ExplodeCondition::Less(target) => face < target,
            ExplodeCondition::Equal(target) => face == target,
        }
    }
}

impl fmt::Display for ExplodeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplodeCondition::Max => write!(f, "!"),
            ExplodeCondition::Greater(target) => write!(f, "!>{}", target),
            ExplodeCondition::Less(target) => write!(f, "!<{}", target),
            ExplodeCondition::Equal(target) => write!(f, "!{}", target),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiceTerm {
    pub count: u32,
    pub sides: u32,
    pub drop_keep: Option<DropKeep>,
    pub exploding: Option<ExplodeCondition>,
    pub sign: Sign,
}

impl DiceTerm {
    pub fn new(count: u32, sides: u32) -> Self {
        Self {
            count,
            sides,
            drop_keep: None,
            exploding: None,
            sign: Sign::Plus,
        }
    }

    pub fn with_drop_keep(mut self, drop_keep: DropKeep) -> Self {
        self.drop_keep = Some(drop_keep);
        self
    }

    pub fn with_exploding(mut self, condition: ExplodeCondition) -> Self {
        self.exploding = Some(condition);
        self
    }

    pub fn with_sign(mut self, sign: Sign) -> Self {
        self.sign = sign;
        self
    }

    /// A single d20 without drop/keep, the form advantage rewrites. An
    /// explode modifier carries over to the rewritten pair.
    pub fn is_single_d20(&self) -> bool {
        self.count == 1 && self.sides == 20 && self.drop_keep.is_none()
    }
}

impl fmt::Display for DiceTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        if let Some(drop_keep) = &self.drop_keep {
            write!(f, "{}", drop_keep)?;
        }
        if let Some(exploding) = &self.exploding {
            write!(f, "{}", exploding)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlatModifier {
    pub value: i64,
    pub sign: Sign,
}

impl FlatModifier {
    pub fn new(value: i64, sign: Sign) -> Self {
        Self { value, sign }
    }

    pub fn signed_value(&self) -> i64 {
        self.sign.apply(self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Dice(DiceTerm),
    Flat(FlatModifier),
}

impl Term {
    pub fn sign(&self) -> Sign {
        match self {
            Term::Dice(dice) => dice.sign,
            Term::Flat(flat) => flat.sign,
        }
    }

    fn write_unsigned(&self, f: &mut impl fmt::Write) -> fmt::Result {
        match self {
            Term::Dice(dice) => write!(f, "{}", dice),
            Term::Flat(flat) => write!(f, "{}", flat.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expression {
    terms: Vec<Term>,
}

impl Expression {
    pub fn new(terms: Vec<Term>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn dice_terms(&self) -> impl Iterator<Item = &DiceTerm> {
        self.terms.iter().filter_map(|term| match term {
            Term::Dice(dice) => Some(dice),
            Term::Flat(_) => None,
        })
    }

    pub fn map_dice(&self, mut f: impl FnMut(DiceTerm) -> DiceTerm) -> Self {
        let terms = self
            .terms
            .iter()
            .map(|term| match term {
                Term::Dice(dice) => Term::Dice(f(*dice)),
                Term::Flat(flat) => Term::Flat(*flat),
            })
            .collect();
        Self { terms }
    }

    /// Returns a copy with the first single d20 replaced by `replacement`, or
    /// `None` if there is none.
    pub fn replace_first_single_d20(
        &self,
        replacement: impl FnOnce(DiceTerm) -> DiceTerm,
    ) -> Option<Self> {
        let position = self
            .terms
            .iter()
            .position(|term| matches!(term, Term::Dice(dice) if dice.is_single_d20()))?;
        let mut terms = self.terms.clone();
        if let Term::Dice(dice) = terms[position] {
            terms[position] = Term::Dice(replacement(dice));
        }
        Some(Self { terms })
    }

    pub fn pretty_print(&self, f: &mut impl fmt::Write) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            match (i, term.sign()) {
                (0, Sign::Plus) => {}
                (_, sign) => write!(f, "{}", sign.symbol())?,
            }
            term.write_unsigned(f)?;
        }
        Ok(())
    }
}

/// Canonical notation; parsing the output yields an equal expression.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.pretty_print(f)
    }
}
