//! Per-encounter deterministic randomness.
//!
//! Each encounter owns a [`DiceRoller`] seeded from a caller-supplied value.
//! The roller counts the 32-bit words it has consumed so a serialized
//! encounter can be restored mid-stream: deserialization re-seeds and
//! fast-forwards by the recorded word count. Two encounters built from the
//! same seed and fed the same action stream roll identical dice.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A seeded PRNG with a replayable stream position.
pub struct DiceRoller {
    seed: u64,
    words: u64,
    rng: StdRng,
}

impl DiceRoller {
    pub fn new(seed: u64) -> Self {
        DiceRoller {
            seed,
            words: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Rebuild a roller at a given stream position.
    pub fn resume(seed: u64, words: u64) -> Self {
        let mut roller = DiceRoller::new(seed);
        for _ in 0..words {
            roller.next_u32();
        }
        roller.words = words;
        roller
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of 32-bit words drawn so far.
    pub fn words_drawn(&self) -> u64 {
        self.words
    }
}

impl RngCore for DiceRoller {
    fn next_u32(&mut self) -> u32 {
        self.words += 1;
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.words += 2;
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.words += (dest.len() as u64 + 3) / 4;
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl Clone for DiceRoller {
    fn clone(&self) -> Self {
        DiceRoller {
            seed: self.seed,
            words: self.words,
            rng: self.rng.clone(),
        }
    }
}

impl fmt::Debug for DiceRoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiceRoller")
            .field("seed", &self.seed)
            .field("words", &self.words)
            .finish()
    }
}

impl PartialEq for DiceRoller {
    fn eq(&self, other: &Self) -> bool {
        self.seed == other.seed && self.words == other.words
    }
}

impl Serialize for DiceRoller {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("DiceRoller", 2)?;
        state.serialize_field("seed", &self.seed)?;
        state.serialize_field("words", &self.words)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for DiceRoller {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RollerVisitor;

        impl<'de> Visitor<'de> for RollerVisitor {
            type Value = DiceRoller;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a DiceRoller with seed and words fields")
            }

            fn visit_map<A>(self, mut map: A) -> Result<DiceRoller, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut seed: Option<u64> = None;
                let mut words: Option<u64> = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "seed" => seed = Some(map.next_value()?),
                        "words" => words = Some(map.next_value()?),
                        _ => {
                            let _: serde::de::IgnoredAny = map.next_value()?;
                        }
                    }
                }
                let seed = seed.ok_or_else(|| de::Error::missing_field("seed"))?;
                let words = words.ok_or_else(|| de::Error::missing_field("words"))?;
                Ok(DiceRoller::resume(seed, words))
            }
        }

        deserializer.deserialize_struct("DiceRoller", &["seed", "words"], RollerVisitor)
    }
}
