use proptest::prelude::*;

use crate::rules::dice::{
    DiceTerm, Direction, DropKeep, DropKeepKind, ExplodeCondition, Expression, FlatModifier, Sign,
    Term,
};

pub(crate) fn sign_strategy() -> impl Strategy<Value = Sign> {
    prop_oneof![Just(Sign::Plus), Just(Sign::Minus)]
}

pub(crate) fn drop_keep_strategy(count: u32) -> BoxedStrategy<Option<DropKeep>> {
    if count <= 1 {
        return Just(None).boxed();
    }

    (1..count, 0u8..5)
        .prop_map(|(amount, mode)| {
            let (kind, direction) = match mode {
                0 => return None,
                1 => (DropKeepKind::Keep, Direction::Highest),
                2 => (DropKeepKind::Keep, Direction::Lowest),
                3 => (DropKeepKind::Drop, Direction::Highest),
                _ => (DropKeepKind::Drop, Direction::Lowest),
            };
            Some(DropKeep {
                kind,
                direction,
                amount,
            })
        })
        .boxed()
}

pub(crate) fn explode_strategy() -> impl Strategy<Value = Option<ExplodeCondition>> {
    prop_oneof![
        3 => Just(None),
        1 => Just(Some(ExplodeCondition::Max)),
        1 => (0u32..=100).prop_map(|t| Some(ExplodeCondition::Greater(t))),
        1 => (0u32..=100).prop_map(|t| Some(ExplodeCondition::Less(t))),
        1 => (0u32..=100).prop_map(|t| Some(ExplodeCondition::Equal(t))),
    ]
}

/// Dice terms without explosions, so totals stay within `[count, count * sides]`
/// before drop/keep.
pub(crate) fn plain_dice_strategy() -> impl Strategy<Value = DiceTerm> {
    (1..=50u32, 1..=100u32).prop_flat_map(|(count, sides)| {
        drop_keep_strategy(count).prop_map(move |drop_keep| DiceTerm {
            drop_keep,
            ..DiceTerm::new(count, sides)
        })
    })
}

pub(crate) fn dice_term_strategy() -> impl Strategy<Value = DiceTerm> {
    (plain_dice_strategy(), explode_strategy(), sign_strategy()).prop_map(
        |(dice, exploding, sign)| DiceTerm {
            exploding,
            sign,
            ..dice
        },
    )
}

pub(crate) fn term_strategy() -> impl Strategy<Value = Term> {
    prop_oneof![
        3 => dice_term_strategy().prop_map(Term::Dice),
        1 => (0i64..=1000, sign_strategy())
            .prop_map(|(value, sign)| Term::Flat(FlatModifier::new(value, sign))),
    ]
}

pub(crate) fn expression_strategy() -> impl Strategy<Value = Expression> {
    prop::collection::vec(term_strategy(), 1..=5).prop_map(Expression::new)
}
