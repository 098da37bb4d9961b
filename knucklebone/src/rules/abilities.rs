use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EvaluationError;

pub const ABILITY_COUNT: usize = 6;
pub const POINT_BUY_START: [i64; ABILITY_COUNT] = [8; ABILITY_COUNT];
pub const STANDARD_ARRAY: [i64; ABILITY_COUNT] = [15, 14, 13, 12, 10, 8];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityMethod {
    FourD6DropLowest,
    ThreeD6,
    TwoD6PlusSix,
    PointBuy,
    StandardArray,
}

impl AbilityMethod {
    /// The expression rolled once per score, or `None` for fixed arrays.
    pub fn expression(self) -> Option<&'static str> {
        match self {
            AbilityMethod::FourD6DropLowest => Some("4d6dl1"),
            AbilityMethod::ThreeD6 => Some("3d6"),
            AbilityMethod::TwoD6PlusSix => Some("2d6+6"),
            AbilityMethod::PointBuy | AbilityMethod::StandardArray => None,
        }
    }

    pub fn fixed_scores(self) -> Option<[i64; ABILITY_COUNT]> {
        match self {
            AbilityMethod::PointBuy => Some(POINT_BUY_START),
            AbilityMethod::StandardArray => Some(STANDARD_ARRAY),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AbilityMethod::PointBuy => "pointbuy",
            AbilityMethod::StandardArray => "standard",
            rolled => rolled.expression().unwrap_or_default(),
        }
    }
}

impl FromStr for AbilityMethod {
    type Err = EvaluationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "4d6dl1" | "4d6kh3" => Ok(AbilityMethod::FourD6DropLowest),
            "3d6" => Ok(AbilityMethod::ThreeD6),
            "2d6+6" => Ok(AbilityMethod::TwoD6PlusSix),
            "pointbuy" => Ok(AbilityMethod::PointBuy),
            "standard" | "standardarray" => Ok(AbilityMethod::StandardArray),
            _ => Err(EvaluationError::UnknownAbilityMethod(s.to_string())),
        }
    }
}

pub fn ability_modifier(score: i64) -> i64 {
    (score - 10).div_euclid(2)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityStatistics {
    pub min: i64,
    pub max: i64,
    pub total: i64,
    pub modifier_sum: i64,
    pub above_average: usize,
    pub below_average: usize,
}

impl AbilityStatistics {
    pub fn from_scores(scores: &[i64; ABILITY_COUNT]) -> Self {
        Self {
            min: scores.iter().copied().min().unwrap_or_default(),
            max: scores.iter().copied().max().unwrap_or_default(),
            total: scores.iter().sum(),
            modifier_sum: scores.iter().map(|&s| ability_modifier(s)).sum(),
            above_average: scores.iter().filter(|&&s| s > 10).count(),
            below_average: scores.iter().filter(|&&s| s < 10).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub method: AbilityMethod,
    pub scores: [i64; ABILITY_COUNT],
    pub statistics: AbilityStatistics,
}

impl AbilityScores {
    pub fn new(method: AbilityMethod, scores: [i64; ABILITY_COUNT]) -> Self {
        Self {
            method,
            scores,
            statistics: AbilityStatistics::from_scores(&scores),
        }
    }
}
