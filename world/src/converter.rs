//! Two-column converter units.
//!
//! Every row pairs an input cell (column 0) with an output cell (column 1).
//! A row only converts while its output is flagged as a producer.

use mineshaft_core::{
    CellCoord, Currency, Event, GridError, SessionRules, UnitKind, UnitTemplate, Wallet,
    YieldTotals,
};

use crate::{assign_neighbors, checked_cell_count, Cell, GridUnit, RandomSource, Row};

const CONVERTER_COLUMNS: u32 = 2;

/// Output currency for a uniform sample.
fn output_currency(sample: f32) -> Currency {
    if sample < 0.33 {
        Currency::Stone
    } else if sample < 0.67 {
        Currency::Copper
    } else {
        Currency::Gold
    }
}

pub(crate) fn generate<R>(
    template: &UnitTemplate,
    rules: &SessionRules,
    rng: &mut R,
    out_events: &mut Vec<Event>,
) -> Result<GridUnit, GridError>
where
    R: RandomSource + ?Sized,
{
    let mut config = template.config.clone();
    config.columns = CONVERTER_COLUMNS;
    let row_count = config.max_unlock_rows;
    let cell_count = checked_cell_count(row_count, CONVERTER_COLUMNS)?;

    let multiplier = rules.upgrade_base_multiplier;
    let mut rows = Vec::with_capacity(cell_count / CONVERTER_COLUMNS as usize);
    for row in 0..row_count {
        let upgrade_index = UnitKind::Converter.upgrade_index(row) as f32;

        let mut input = Cell::new(CellCoord::new(row, 0));
        input.currency = Currency::Iron;
        input.bank = config.yield_base * (1.0 + upgrade_index * multiplier);
        input.bank_max = input.bank;

        let mut output = Cell::new(CellCoord::new(row, 1));
        output.bank = input.bank * config.yield_multiplier_padding;
        output.bank_max = output.bank;
        output.currency = output_currency(rng.next_unit());

        let cost = UnitKind::Converter.unlock_cost(row, config.unlock_base_cost, multiplier);
        rows.push(Row::new(cost, config.unlock_currency, vec![input, output]));
    }
    assign_neighbors(&mut rows, CONVERTER_COLUMNS);

    let initial_unlocks = config.initial_row_unlocks.min(row_count);
    let mut unit = GridUnit::empty(template, config, rows);
    for _ in 0..initial_unlocks {
        let _ = unit.commit_unlock(0.0, out_events);
    }

    tracing::debug!(
        unit = unit.key.as_str(),
        rows = row_count,
        "generated converter"
    );
    Ok(unit)
}

impl GridUnit {
    /// Flips whether a converter row is producing and recomputes.
    ///
    /// Returns the new producing flag of the row's output cell.
    pub fn toggle_row_producer(
        &mut self,
        row: u32,
        out_events: &mut Vec<Event>,
    ) -> Result<bool, GridError> {
        if self.kind != UnitKind::Converter {
            return Err(GridError::NotAConverter { kind: self.kind });
        }
        let output = self
            .cell_mut(CellCoord::new(row, 1))
            .ok_or(GridError::RowOutOfBounds { row })?;
        output.producer = !output.producer;
        let producing = output.producer;

        tracing::debug!(unit = self.key.as_str(), row, producing, "converter toggled");
        out_events.push(Event::ProducerToggled { row, producing });
        let _ = self.calculate_yield(out_events);
        Ok(producing)
    }

    /// Adds every producing row's conversion to `totals`.
    ///
    /// Input is never consumed beyond what the wallet holds; a partial input
    /// scales the output by the covered fraction.
    pub(crate) fn convert_into(&self, wallet: &dyn Wallet, totals: &mut YieldTotals) {
        for row in self.rows.iter().filter(|row| row.unlocked) {
            let [input, output] = row.cells.as_slice() else {
                continue;
            };
            if !output.producer {
                continue;
            }

            let available = wallet.balance(input.currency).unwrap_or(0.0).max(0.0);
            let mut consumed = input.bank;
            let mut ratio = 1.0;
            if available < consumed {
                ratio = if consumed > 0.0 { available / consumed } else { 0.0 };
                consumed = available;
            }

            *totals.entry(input.currency).or_insert(0.0) -= consumed;
            *totals.entry(output.currency).or_insert(0.0) += output.bank * ratio;
        }
    }
}

#[cfg(test)]
mod tests {
    use mineshaft_core::{UnitConfig, UnitKey, WalletLedger};

    use super::*;
    use crate::{query, ScriptedRandom};

    fn converter() -> GridUnit {
        let template = UnitTemplate {
            key: UnitKey::new("smelter"),
            kind: UnitKind::Converter,
            config: UnitConfig {
                max_unlock_rows: 3,
                initial_row_unlocks: 1,
                unlock_base_cost: 20.0,
                yield_base: 10.0,
                yield_multiplier_padding: 0.5,
                ..UnitConfig::default()
            },
        };
        let mut rng = ScriptedRandom::new(0.0, 0).with_units([0.9, 0.5, 0.1]);
        let mut events = Vec::new();
        GridUnit::setup(&template, &SessionRules::default(), &[], &mut rng, &mut events)
            .expect("setup")
    }

    #[test]
    fn rows_use_the_leading_upgrade_index() {
        let unit = converter();
        assert_eq!(unit.columns(), 2);
        assert_eq!(unit.rows()[0].unlock_cost(), 0.0);
        assert_eq!(unit.rows()[1].unlock_cost(), 60.0);
        assert_eq!(unit.rows()[2].unlock_cost(), 80.0);

        let input = &unit.rows()[1].cells()[0];
        assert_eq!(input.currency(), Currency::Iron);
        assert_eq!(input.bank(), 30.0);
        assert_eq!(unit.rows()[1].cells()[1].bank(), 15.0);
    }

    #[test]
    fn output_currency_follows_the_sample() {
        let unit = converter();
        let outputs: Vec<_> = unit
            .rows()
            .iter()
            .map(|row| row.cells()[1].currency())
            .collect();
        assert_eq!(outputs, vec![Currency::Gold, Currency::Copper, Currency::Stone]);
    }

    #[test]
    fn toggled_rows_convert_input_into_output() {
        let mut unit = converter();
        let mut events = Vec::new();
        assert!(!query::is_row_producing(&unit, 0));

        assert_eq!(unit.toggle_row_producer(0, &mut events), Ok(true));
        assert!(query::is_row_producing(&unit, 0));
        assert_eq!(
            events.first(),
            Some(&Event::ProducerToggled {
                row: 0,
                producing: true,
            })
        );

        let wallet = WalletLedger::new().with(Currency::Iron, 100.0);
        let totals = unit.total_yield(&wallet, &[]);
        assert_eq!(totals.get(&Currency::Iron), Some(&-20.0));
        assert_eq!(totals.get(&Currency::Gold), Some(&10.0));
    }

    #[test]
    fn conversion_never_spends_past_the_wallet() {
        let mut unit = converter();
        let mut events = Vec::new();
        let _ = unit.toggle_row_producer(0, &mut events).expect("toggle");

        let wallet = WalletLedger::new().with(Currency::Iron, 5.0);
        let totals = unit.total_yield(&wallet, &[]);
        assert_eq!(totals.get(&Currency::Iron), Some(&-5.0));
        assert_eq!(totals.get(&Currency::Gold), Some(&2.5));
    }

    #[test]
    fn locked_rows_do_not_convert() {
        let mut unit = converter();
        let mut events = Vec::new();
        let _ = unit.toggle_row_producer(2, &mut events).expect("toggle");

        assert!(!query::is_row_producing(&unit, 2));
        let wallet = WalletLedger::new().with(Currency::Iron, 100.0);
        assert!(unit.total_yield(&wallet, &[]).is_empty());
    }

    #[test]
    fn unaddressable_row_counts_are_rejected() {
        let template = UnitTemplate {
            kind: UnitKind::Converter,
            config: UnitConfig {
                max_unlock_rows: u32::MAX,
                ..UnitConfig::default()
            },
            ..UnitTemplate::default()
        };
        let mut rng = ScriptedRandom::new(0.0, 0);
        let mut events = Vec::new();
        let result =
            GridUnit::setup(&template, &SessionRules::default(), &[], &mut rng, &mut events);
        assert_eq!(
            result.err(),
            Some(GridError::InvalidDimensions {
                rows: u32::MAX,
                columns: 2,
            })
        );
        assert!(events.is_empty());
    }

    #[test]
    fn toggling_outside_the_unit_is_rejected() {
        let mut unit = converter();
        let mut events = Vec::new();
        assert_eq!(
            unit.toggle_row_producer(7, &mut events),
            Err(GridError::RowOutOfBounds { row: 7 })
        );
    }
}
