use std::{collections::VecDeque, fmt, sync::Once};

use rand::{RngCore, SeedableRng, rngs::StdRng};

use crate::error::RandomSourceError;

pub trait RandomSource {
    fn next(&mut self, max_inclusive: u32) -> Result<u32, RandomSourceError>;
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next(&mut self, max_inclusive: u32) -> Result<u32, RandomSourceError> {
        (**self).next(max_inclusive)
    }
}

/// Maps a 32-bit draw onto `[1, max_inclusive]` by scaling the fraction
/// `draw / 2^32` rather than taking a modulus.
pub fn scale_to_face(draw: u32, max_inclusive: u32) -> u32 {
    let unit = draw as f64 / (u32::MAX as f64 + 1.0);
    let face = (unit * max_inclusive as f64).floor() as u32 + 1;
    face.min(max_inclusive)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entropy {
    Os,
    /// Seeded from the clock because OS entropy was unavailable. Not
    /// cryptographically unpredictable.
    ClockFallback,
    Seeded(u64),
}

static FALLBACK_WARNING: Once = Once::new();

#[derive(Debug)]
pub struct Roller {
    rng: StdRng,
    entropy: Entropy,
}

impl Roller {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::from_os_result(StdRng::try_from_os_rng())
    }

    fn from_os_result<E: fmt::Display>(os_rng: Result<StdRng, E>) -> Self {
        match os_rng {
            Ok(rng) => Roller {
                rng,
                entropy: Entropy::Os,
            },
            Err(e) => {
                FALLBACK_WARNING.call_once(|| {
                    log::warn!(
                        "OS entropy unavailable ({}), falling back to a clock-seeded generator; \
                         rolls are not cryptographically unpredictable",
                        e
                    );
                });
                Self::clock_seeded()
            }
        }
    }

    fn clock_seeded() -> Self {
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| chrono::Utc::now().timestamp_micros());
        Roller {
            rng: StdRng::seed_from_u64(nanos as u64),
            entropy: Entropy::ClockFallback,
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Roller {
            rng: StdRng::seed_from_u64(seed),
            entropy: Entropy::Seeded(seed),
        }
    }

    pub fn entropy(&self) -> Entropy {
        self.entropy
    }

    pub fn d(&mut self, die_size: u32) -> u32 {
        scale_to_face(self.rng.next_u32(), die_size.max(1))
    }

    #[cfg(test)]
    pub fn test_rng() -> Self {
        Self::from_seed(42)
    }
}

impl RandomSource for Roller {
    fn next(&mut self, max_inclusive: u32) -> Result<u32, RandomSourceError> {
        if max_inclusive == 0 {
            return Err(RandomSourceError::OutOfRange {
                value: 0,
                max: max_inclusive,
            });
        }
        Ok(self.d(max_inclusive))
    }
}

/// Replays preset faces in order, for exact scenarios in tests and demos.
#[derive(Debug, Clone, Default)]
pub struct FixedSequence {
    faces: VecDeque<u32>,
    cycle: bool,
}

impl FixedSequence {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
            cycle: false,
        }
    }

    pub fn cycling(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            cycle: true,
            ..Self::new(faces)
        }
    }

    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl RandomSource for FixedSequence {
    fn next(&mut self, max_inclusive: u32) -> Result<u32, RandomSourceError> {
        let face = self.faces.pop_front().ok_or(RandomSourceError::Exhausted)?;
        if self.cycle {
            self.faces.push_back(face);
        }
        if face == 0 || face > max_inclusive {
            return Err(RandomSourceError::OutOfRange {
                value: face,
                max: max_inclusive,
            });
        }
        Ok(face)
    }
}
