// src/mix.rs
//! Mix plan: the cyclic slot pattern that decides which provider serves each position.

use serde::{Deserialize, Serialize};

use crate::provider::{Provider, ProviderRegistry};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MixError {
    #[error("mix plan must contain at least one slot")]
    EmptyPlan,
    #[error("slot {slot} references unregistered {role} provider `{provider}`")]
    UnknownProvider {
        slot: usize,
        role: &'static str,
        provider: Provider,
    },
}

/// One plan entry: the provider asked first and an optional stand-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub primary: Provider,
    #[serde(default)]
    pub fallback: Option<Provider>,
}

impl Slot {
    pub fn new(primary: impl Into<Provider>) -> Self {
        Self {
            primary: primary.into(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<Provider>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

/// Non-empty, ordered, cyclic sequence of slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixPlan {
    slots: Vec<Slot>,
}

impl MixPlan {
    pub fn new(slots: Vec<Slot>) -> Result<Self, MixError> {
        if slots.is_empty() {
            return Err(MixError::EmptyPlan);
        }
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false for a constructed plan.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Slot serving absolute `position`: `plan[position mod len]`.
    pub fn resolve(&self, position: u64) -> &Slot {
        let idx = (position % self.slots.len() as u64) as usize;
        &self.slots[idx]
    }

    /// Reduce a request's starting offset into `[0, len)` before any position arithmetic.
    ///
    /// Resolution only depends on `offset mod len`, so reducing unconditionally
    /// yields the same slots as reducing only when `offset > len`, and keeps
    /// `base + ordinal` far away from `u64::MAX`.
    pub fn base_position(&self, offset: u64) -> u64 {
        offset % self.slots.len() as u64
    }

    /// Every primary and fallback must be callable through `registry`.
    pub fn validate(&self, registry: &ProviderRegistry) -> Result<(), MixError> {
        for (idx, slot) in self.slots.iter().enumerate() {
            if !registry.contains(&slot.primary) {
                return Err(MixError::UnknownProvider {
                    slot: idx,
                    role: "primary",
                    provider: slot.primary.clone(),
                });
            }
            if let Some(fb) = &slot.fallback {
                if !registry.contains(fb) {
                    return Err(MixError::UnknownProvider {
                        slot: idx,
                        role: "fallback",
                        provider: fb.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
