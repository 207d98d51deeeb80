#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that post-processes raw yield totals.
//!
//! Buffs run first, in list order, each mutating the shared totals map. The
//! aggregate efficiency multiplier from technology runs last and scales every
//! currency uniformly.

use mineshaft_core::{BuffEffect, BuffKind, TechNode, TechTrait, UnitKey, YieldTotals};

/// Ordered modifier stack resolved for a single unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModifierPipeline {
    buffs: Vec<BuffKind>,
    efficiency: f32,
}

impl ModifierPipeline {
    /// Builds the pipeline from a unit's buffs and the technology matching its key.
    #[must_use]
    pub fn for_unit(buffs: &[BuffKind], tech: &[TechNode], unit: &UnitKey) -> Self {
        Self {
            buffs: buffs.to_vec(),
            efficiency: efficiency_bonus(tech, unit),
        }
    }

    /// Aggregate efficiency bonus captured for the unit.
    #[must_use]
    pub const fn efficiency(&self) -> f32 {
        self.efficiency
    }

    /// Applies every buff in order, then the efficiency multiplier.
    pub fn apply(&self, totals: &mut YieldTotals) {
        apply_buffs(&self.buffs, totals);
        apply_efficiency(self.efficiency, totals);
    }
}

/// Applies a single buff to the totals map.
pub fn apply_buff(buff: BuffKind, totals: &mut YieldTotals) {
    match buff.effect() {
        BuffEffect::Scale { currency, factor } => {
            if let Some(total) = totals.get_mut(&currency) {
                *total *= factor;
            }
        }
        BuffEffect::Bonus { currency, amount } => {
            *totals.entry(currency).or_insert(0.0) += amount;
        }
    }
}

/// Applies buffs sequentially in the provided order.
pub fn apply_buffs(buffs: &[BuffKind], totals: &mut YieldTotals) {
    for buff in buffs {
        apply_buff(*buff, totals);
    }
}

/// Sum of every `Efficient` technology value granted to `unit`.
#[must_use]
pub fn efficiency_bonus(tech: &[TechNode], unit: &UnitKey) -> f32 {
    tech.iter()
        .filter(|node| node.grants(TechTrait::Efficient, unit))
        .map(|node| node.value)
        .sum()
}

/// Scales every total by `1 + bonus` when the bonus is positive.
pub fn apply_efficiency(bonus: f32, totals: &mut YieldTotals) {
    if bonus <= 0.0 {
        return;
    }

    let multiplier = 1.0 + bonus;
    tracing::trace!(multiplier, currencies = totals.len(), "efficiency applied");
    for total in totals.values_mut() {
        *total *= multiplier;
    }
}
