//! Binary-tree maze generation for mine units.

use std::collections::BTreeSet;

use mineshaft_core::{
    CellCoord, Currency, CurrencyWeight, Event, GridError, Orientation, Rotation, SessionRules,
    TechNode, TechTrait, UnitKind, UnitTemplate, WallMask,
};

use crate::{assign_neighbors, checked_cell_count, Cell, GridUnit, RandomSource, Row};

/// Carved adjacency links stored densely in row-major order.
#[derive(Debug)]
struct Carve {
    columns: u32,
    links: Vec<BTreeSet<CellCoord>>,
}

impl Carve {
    fn new(rows: u32, columns: u32) -> Self {
        let count = rows as usize * columns as usize;
        Self {
            columns,
            links: vec![BTreeSet::new(); count],
        }
    }

    fn index(&self, cell: CellCoord) -> usize {
        (cell.row() as usize) * (self.columns as usize) + cell.column() as usize
    }

    fn link(&mut self, first: CellCoord, second: CellCoord) {
        let first_index = self.index(first);
        let second_index = self.index(second);
        let _ = self.links[first_index].insert(second);
        let _ = self.links[second_index].insert(first);
    }

    fn contains(&self, first: CellCoord, second: CellCoord) -> bool {
        self.links[self.index(first)].contains(&second)
    }

    fn coord(&self, index: usize) -> CellCoord {
        let columns = self.columns as usize;
        CellCoord::new((index / columns) as u32, (index % columns) as u32)
    }

    /// Reflects every row end-for-end, remapping columns on both sides of each link.
    fn mirrored(self) -> Self {
        let columns = self.columns;
        let reflect = |cell: CellCoord| CellCoord::new(cell.row(), columns - 1 - cell.column());
        let mut mirrored = Self {
            columns,
            links: vec![BTreeSet::new(); self.links.len()],
        };
        for (index, cell_links) in self.links.into_iter().enumerate() {
            let target = mirrored.index(reflect(mirrored.coord(index)));
            mirrored.links[target] = cell_links.into_iter().map(reflect).collect();
        }
        mirrored
    }

    fn take(&mut self, cell: CellCoord) -> BTreeSet<CellCoord> {
        let index = self.index(cell);
        std::mem::take(&mut self.links[index])
    }
}

/// Carves a perfect maze from the last row up to row 0.
fn carve<R>(rows: u32, columns: u32, rng: &mut R) -> Carve
where
    R: RandomSource + ?Sized,
{
    let mut carve = Carve::new(rows, columns);
    let last_column = columns - 1;

    for row in (0..rows).rev() {
        for column in 0..columns {
            let cell = CellCoord::new(row, column);
            let east = CellCoord::new(row, column + 1);
            let north = CellCoord::new(row.saturating_sub(1), column);

            if row == 0 {
                if column < last_column {
                    carve.link(cell, east);
                }
            } else if column == 0 {
                carve.link(cell, east);
            } else if column == last_column {
                carve.link(cell, north);
            } else if rng.next_unit() < 0.5 {
                carve.link(cell, east);
            } else {
                carve.link(cell, north);
            }
        }
    }

    carve
}

/// Cumulative currency table normalised to sum to one. Negative weights count as zero.
fn cumulative_weights(weights: &[CurrencyWeight]) -> Vec<(Currency, f32)> {
    let total: f32 = weights.iter().map(|entry| entry.weight.max(0.0)).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut running = 0.0;
    weights
        .iter()
        .map(|entry| {
            running += entry.weight.max(0.0) / total;
            (entry.currency, running)
        })
        .collect()
}

/// First bucket the sample falls under, falling back to Stone.
fn pick_currency(table: &[(Currency, f32)], sample: f32) -> Currency {
    table
        .iter()
        .find(|(_, threshold)| sample < *threshold)
        .or_else(|| table.last())
        .map_or(Currency::Stone, |(currency, _)| *currency)
}

pub(crate) fn generate<R>(
    template: &UnitTemplate,
    rules: &SessionRules,
    tech: &[TechNode],
    rng: &mut R,
    out_events: &mut Vec<Event>,
) -> Result<GridUnit, GridError>
where
    R: RandomSource + ?Sized,
{
    let mut config = template.config.clone();
    let row_count = config.max_unlock_rows;
    let columns = config.columns;
    let _ = checked_cell_count(row_count, columns)?;
    if columns < 2 {
        return Err(GridError::InvalidDimensions {
            rows: row_count,
            columns,
        });
    }

    let mut carve = carve(row_count, columns, rng);

    let mut repo_column = 1 + rng.next_below(columns - 1);
    for column in (1..=repo_column).rev() {
        let cell = CellCoord::new(0, column);
        let west = CellCoord::new(0, column - 1);
        if !carve.contains(cell, west) {
            carve.link(cell, west);
        }
    }

    if rng.next_unit() < 0.5 {
        carve = carve.mirrored();
        repo_column = columns - 1 - repo_column;
    }

    let mut rows = Vec::with_capacity(row_count as usize);
    for row in 0..row_count {
        let cells = (0..columns)
            .map(|column| {
                let coord = CellCoord::new(row, column);
                let mut cell = Cell::new(coord);
                cell.links = carve.take(coord);
                cell
            })
            .collect();
        let cost = UnitKind::Mine.unlock_cost(
            row,
            config.unlock_base_cost,
            rules.upgrade_base_multiplier,
        );
        rows.push(Row::new(cost, config.unlock_currency, cells));
    }
    assign_neighbors(&mut rows, columns);

    let repo = CellCoord::new(0, repo_column);
    if let Some(cell) = rows
        .first_mut()
        .and_then(|row| row.cells.get_mut(repo_column as usize))
    {
        if !cell.wall_variant.is_empty() && cell.wall_variant != WallMask::ALL {
            return Err(GridError::RepoAlreadyWalled {
                cell: repo,
                walls: cell.wall_variant,
            });
        }
        cell.repo = true;
        cell.wall_variant = WallMask::ALL;
    }

    for row in &mut rows {
        for cell in &mut row.cells {
            for orientation in Orientation::ALL {
                if cell
                    .neighbor(orientation)
                    .is_some_and(|neighbor| cell.links.contains(&neighbor))
                {
                    cell.wall_variant = cell.wall_variant.with(orientation);
                }
            }
        }
    }

    if tech
        .iter()
        .any(|node| node.grants(TechTrait::Perfection, &template.key))
    {
        config.pickup_tracks_on_row_unlock = false;
        config.rotate_tracks_on_setup = false;
        config.swap_tracks_on_setup = false;
    }

    let weights = cumulative_weights(&config.producer_weights);
    let mut total_producers = 0;
    for row in &mut rows {
        for cell in &mut row.cells {
            cell.track = cell.wall_variant.track();
            cell.wall_orientation = cell.wall_variant;
            cell.orientation = Orientation::North;
            if cell.repo {
                continue;
            }

            if cell.wall_variant == WallMask::ALL {
                return Err(GridError::ImpossibleCross { cell: cell.coord });
            }

            if config.rotate_tracks_on_setup {
                for _ in 0..rng.next_below(4) {
                    let _ = cell.rotate(Rotation::Clockwise);
                }
            }

            if cell.wall_variant.is_single_side() {
                cell.producer = true;
                cell.bank = rng.range(config.bank_initial_min, config.bank_initial_max);
                cell.bank_max = cell.bank;
                cell.currency = pick_currency(&weights, rng.next_unit());
                total_producers += 1;
            }
        }
    }

    let swap_on_setup = config.swap_tracks_on_setup;
    let initial_unlocks = config.initial_row_unlocks;
    let mut unit = GridUnit::empty(template, config, rows);
    unit.total_producers = total_producers;

    if swap_on_setup {
        for row in 0..row_count {
            let candidates: Vec<CellCoord> = unit.rows[row as usize]
                .cells
                .iter()
                .filter(|cell| !cell.repo)
                .map(Cell::coord)
                .collect();
            let Ok(len) = u32::try_from(candidates.len()) else {
                continue;
            };
            if len < 2 {
                continue;
            }
            let first = rng.next_below(len);
            let mut second = rng.next_below(len - 1);
            if second >= first {
                second += 1;
            }
            unit.exchange(candidates[first as usize], candidates[second as usize]);
        }
    }

    let guilded = tech
        .iter()
        .filter(|node| node.grants(TechTrait::Guilded, &template.key))
        .count();
    let bootstrap = initial_unlocks
        .saturating_add(u32::try_from(guilded).unwrap_or(u32::MAX))
        .min(row_count);
    for _ in 0..bootstrap {
        let _ = unit.commit_unlock(0.0, out_events);
    }

    tracing::debug!(
        unit = unit.key.as_str(),
        rows = row_count,
        columns,
        repo_column,
        producers = total_producers,
        "generated mine"
    );

    Ok(unit)
}

#[cfg(test)]
mod tests {
    use mineshaft_core::UnitConfig;

    use super::*;
    use crate::ScriptedRandom;

    #[test]
    fn oversized_grids_are_rejected_before_carving() {
        let template = UnitTemplate {
            config: UnitConfig {
                max_unlock_rows: u32::MAX,
                columns: 8,
                ..UnitConfig::default()
            },
            ..UnitTemplate::default()
        };
        let mut rng = ScriptedRandom::new(0.2, 0);
        let mut events = Vec::new();
        let result = generate(&template, &SessionRules::default(), &[], &mut rng, &mut events);
        assert_eq!(
            result.err(),
            Some(GridError::InvalidDimensions {
                rows: u32::MAX,
                columns: 8,
            })
        );
        assert!(events.is_empty());
    }

    #[test]
    fn carve_links_every_cell_of_row_zero() {
        let mut rng = ScriptedRandom::new(0.2, 0);
        let carve = carve(3, 5, &mut rng);
        for column in 0..4 {
            assert!(carve.contains(CellCoord::new(0, column), CellCoord::new(0, column + 1)));
        }
    }

    #[test]
    fn carve_sends_last_column_up() {
        let mut rng = ScriptedRandom::new(0.2, 0);
        let carve = carve(3, 5, &mut rng);
        assert!(carve.contains(CellCoord::new(2, 4), CellCoord::new(1, 4)));
        assert!(carve.contains(CellCoord::new(1, 4), CellCoord::new(0, 4)));
        assert!(carve.contains(CellCoord::new(2, 0), CellCoord::new(2, 1)));
    }

    #[test]
    fn carve_yields_a_spanning_tree() {
        let mut rng = ScriptedRandom::new(0.0, 0).with_units([0.1, 0.7, 0.3, 0.9, 0.6, 0.2]);
        let carve = carve(3, 4, &mut rng);
        let edges: usize = carve.links.iter().map(BTreeSet::len).sum::<usize>() / 2;
        assert_eq!(edges, 3 * 4 - 1);
    }

    #[test]
    fn mirroring_reflects_columns() {
        let mut carve = Carve::new(1, 4);
        carve.link(CellCoord::new(0, 0), CellCoord::new(0, 1));
        let mirrored = carve.mirrored();
        assert!(mirrored.contains(CellCoord::new(0, 3), CellCoord::new(0, 2)));
        assert!(!mirrored.contains(CellCoord::new(0, 0), CellCoord::new(0, 1)));
    }

    #[test]
    fn currency_table_respects_order_and_falls_back() {
        let table = cumulative_weights(&[
            CurrencyWeight::new(Currency::Copper, 1.0),
            CurrencyWeight::new(Currency::Gold, 3.0),
        ]);
        assert_eq!(pick_currency(&table, 0.1), Currency::Copper);
        assert_eq!(pick_currency(&table, 0.25), Currency::Gold);
        assert_eq!(pick_currency(&table, 0.99), Currency::Gold);

        let empty = cumulative_weights(&[CurrencyWeight::new(Currency::Gold, 0.0)]);
        assert_eq!(pick_currency(&empty, 0.5), Currency::Stone);

        let negative = cumulative_weights(&[
            CurrencyWeight::new(Currency::Iron, -2.0),
            CurrencyWeight::new(Currency::Copper, 1.0),
        ]);
        assert_eq!(pick_currency(&negative, 0.0), Currency::Copper);
    }
}
