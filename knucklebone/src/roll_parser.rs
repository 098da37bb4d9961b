use std::str::FromStr;

use nom::{
    IResult, Parser,
    branch::alt,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, opt},
    sequence::preceded,
};

use crate::{
    error::ParseError,
    rules::dice::{
        DiceTerm, Direction, DropKeep, DropKeepKind, ExplodeCondition, Expression, FlatModifier,
        MAX_COUNT, MAX_FLAT_VALUE, MAX_SIDES, MIN_COUNT, MIN_SIDES, Sign, Term,
    },
};

pub const MAX_EXPRESSION_LEN: usize = 1024;
pub const MAX_TERMS: usize = 100;

/// Keyword rewrites, longest first so `disadvantage` is not eaten by `advantage`.
const KEYWORDS: [(&str, &str); 4] = [
    ("disadvantage", "2d20kl1"),
    ("advantage", "2d20kh1"),
    ("dis", "2d20kl1"),
    ("adv", "2d20kh1"),
];

pub fn normalize(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    KEYWORDS
        .iter()
        .fold(compact, |acc, (keyword, expansion)| acc.replace(keyword, expansion))
}

pub fn parse(raw: &str) -> Result<Expression, ParseError> {
    parse_normalized(&normalize(raw))
}

/// Parses a string that has already been through [`normalize`].
pub fn parse_normalized(normalized: &str) -> Result<Expression, ParseError> {
    if normalized.is_empty() {
        return Err(ParseError::Empty);
    }
    if normalized.len() > MAX_EXPRESSION_LEN {
        return Err(ParseError::TooLong {
            len: normalized.len(),
            max: MAX_EXPRESSION_LEN,
        });
    }

    let tokens = split_signed(normalized);
    if tokens.len() > MAX_TERMS {
        return Err(ParseError::TooLong {
            len: tokens.len(),
            max: MAX_TERMS,
        });
    }

    let terms = tokens
        .into_iter()
        .map(|(sign, token)| parse_term(sign, token))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Expression::new(terms))
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl TryFrom<String> for Expression {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        parse(&s)
    }
}

impl From<Expression> for String {
    fn from(expression: Expression) -> Self {
        expression.to_string()
    }
}

/// Splits on `+`/`-`, each operator becoming the sign of the token after it.
fn split_signed(input: &str) -> Vec<(Sign, &str)> {
    let mut tokens = Vec::new();
    let mut sign = Sign::Plus;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        let next_sign = match c {
            '+' => Sign::Plus,
            '-' => Sign::Minus,
            _ => continue,
        };
        // a leading operator only sets the sign of the first token
        if i > 0 {
            tokens.push((sign, &input[start..i]));
        }
        sign = next_sign;
        start = i + 1;
    }
    tokens.push((sign, &input[start..]));
    tokens
}

fn parse_term(sign: Sign, token: &str) -> Result<Term, ParseError> {
    let invalid = || ParseError::InvalidToken(format!("{}{}", sign.symbol(), token));
    if token.is_empty() {
        return Err(invalid());
    }

    match all_consuming(term_token).parse(token) {
        Ok((_, TermToken::Dice(dice))) => Ok(Term::Dice(dice.validate(token)?.with_sign(sign))),
        Ok((_, TermToken::Flat(digits))) => {
            let value = bounded("flat modifier", digits, 0, MAX_FLAT_VALUE as u64)?;
            Ok(Term::Flat(FlatModifier::new(value as i64, sign)))
        }
        Err(_) => Err(invalid()),
    }
}

fn bounded(what: &'static str, digits: &str, min: u64, max: u64) -> Result<u64, ParseError> {
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    if value < min || value > max {
        return Err(ParseError::OutOfRange {
            what,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

enum TermToken<'a> {
    Dice(DiceToken<'a>),
    Flat(&'a str),
}

struct DiceToken<'a> {
    count: Option<&'a str>,
    sides: &'a str,
    drop_keep: Option<(DropKeepKind, Direction, &'a str)>,
    exploding: Option<(Option<char>, Option<&'a str>)>,
}

impl DiceToken<'_> {
    fn validate(self, token: &str) -> Result<DiceTerm, ParseError> {
        let count = match self.count {
            Some(digits) => bounded("count", digits, MIN_COUNT as u64, MAX_COUNT as u64)? as u32,
            None => 1,
        };
        let sides = bounded("sides", self.sides, MIN_SIDES as u64, MAX_SIDES as u64)? as u32;
        let mut dice = DiceTerm::new(count, sides);

        if let Some((kind, direction, digits)) = self.drop_keep {
            let amount = digits.parse::<u64>().unwrap_or(u64::MAX);
            if amount == 0 || amount >= count as u64 {
                return Err(ParseError::InvalidModifier(format!(
                    "'{}' must keep or drop between 1 and {} of {} dice, got {}",
                    token,
                    count.saturating_sub(1),
                    count,
                    amount
                )));
            }
            dice = dice.with_drop_keep(DropKeep {
                kind,
                direction,
                amount: amount as u32,
            });
        }

        if let Some((comparator, target)) = self.exploding {
            let target = target
                .map(|digits| bounded("explode target", digits, 0, MAX_SIDES as u64))
                .transpose()?
                .map(|t| t as u32);
            let condition = match (comparator, target) {
                (None, None) => ExplodeCondition::Max,
                (None, Some(t)) => ExplodeCondition::Equal(t),
                (Some('>'), Some(t)) => ExplodeCondition::Greater(t),
                (Some(_), Some(t)) => ExplodeCondition::Less(t),
                (Some(c), None) => {
                    return Err(ParseError::InvalidModifier(format!(
                        "'{}' has comparator '{}' with no target",
                        token, c
                    )));
                }
            };
            dice = dice.with_exploding(condition);
        }

        Ok(dice)
    }
}

fn term_token(input: &str) -> IResult<&str, TermToken<'_>> {
    alt((map(dice_token, TermToken::Dice), map(digit1, TermToken::Flat))).parse(input)
}

fn dice_token(input: &str) -> IResult<&str, DiceToken<'_>> {
    map(
        (
            opt(digit1),
            preceded(char('d'), digit1),
            opt(drop_keep),
            opt(exploding),
        ),
        |(count, sides, drop_keep, exploding)| DiceToken {
            count,
            sides,
            drop_keep,
            exploding,
        },
    )
    .parse(input)
}

fn drop_keep(input: &str) -> IResult<&str, (DropKeepKind, Direction, &str)> {
    (
        alt((
            map(char('d'), |_| DropKeepKind::Drop),
            map(char('k'), |_| DropKeepKind::Keep),
        )),
        alt((
            map(char('h'), |_| Direction::Highest),
            map(char('l'), |_| Direction::Lowest),
        )),
        digit1,
    )
        .parse(input)
}

fn exploding(input: &str) -> IResult<&str, (Option<char>, Option<&str>)> {
    preceded(
        char('!'),
        (opt(alt((char('>'), char('<')))), opt(digit1)),
    )
    .parse(input)
}
