//! Yield network solver.
//!
//! Rebuilds the runtime connectivity between unlocked cells, discovers which
//! producers share a component with a repo, labels every reachable cell with
//! its hop count to the nearest repo and traces one production chain per
//! active producer. All traversals are explicit worklists over dense
//! row-major indices.

use std::collections::VecDeque;

use mineshaft_core::{CellCoord, Event, Orientation, ProductionHop};

use crate::GridUnit;

/// Producers and exits discovered by a single flood fill.
#[derive(Debug, Default)]
struct Component {
    producers: Vec<CellCoord>,
    exits: Vec<CellCoord>,
}

impl GridUnit {
    /// Recomputes yield links, distances, production chains and the active set.
    ///
    /// Returns the number of active producers and emits [`Event::YieldUpdated`].
    pub fn calculate_yield(&mut self, out_events: &mut Vec<Event>) -> u32 {
        for row in self.rows.iter_mut().filter(|row| row.unlocked) {
            for cell in &mut row.cells {
                cell.reset_solve_state();
            }
        }
        self.active_producers.clear();
        self.routes.clear();

        for (cell, side, neighbor) in self.open_edges() {
            if let Some(first) = self.cell_mut(cell) {
                first.yield_links[side.index()] = Some(neighbor);
            }
            if let Some(second) = self.cell_mut(neighbor) {
                second.yield_links[side.opposite().index()] = Some(cell);
            }
        }

        let repos: Vec<CellCoord> = self
            .rows
            .iter()
            .filter(|row| row.unlocked)
            .flat_map(|row| row.cells.iter())
            .filter(|cell| cell.repo)
            .map(|cell| cell.coord)
            .collect();

        let mut visited = vec![false; self.cell_count()];
        for repo in repos {
            let Some(index) = self.cell_index(repo) else {
                continue;
            };
            if visited[index] {
                continue;
            }

            let component = self.flood(repo, &mut visited);
            if component.producers.is_empty() {
                continue;
            }

            self.active_producers
                .extend(component.producers.iter().copied());
            self.label_distances(&component.exits);
            for producer in component.producers {
                self.trace_chain(producer);
            }
        }

        let yield_base = self.config.yield_base;
        let active: Vec<CellCoord> = self.active_producers.iter().copied().collect();
        for coord in active {
            if let Some(cell) = self.cell_mut(coord) {
                cell.current_yield = yield_base.min(cell.bank);
            }
        }

        let active_producers = u32::try_from(self.active_producers.len()).unwrap_or(u32::MAX);
        tracing::debug!(
            unit = self.key.as_str(),
            active_producers,
            unlocked_producers = self.unlocked_producers,
            "yield recalculated"
        );
        out_events.push(Event::YieldUpdated { active_producers });
        active_producers
    }

    /// Edges whose sides are open on both ends, each reported once from its
    /// western or northern cell.
    fn open_edges(&self) -> Vec<(CellCoord, Orientation, CellCoord)> {
        let mut edges = Vec::new();
        for row in self.rows.iter().filter(|row| row.unlocked) {
            for cell in &row.cells {
                for side in [Orientation::East, Orientation::South] {
                    if !cell.wall_orientation.contains(side) {
                        continue;
                    }
                    let Some(neighbor) = cell.neighbor(side).and_then(|n| self.unlocked_cell(n))
                    else {
                        continue;
                    };
                    if neighbor.wall_orientation.contains(side.opposite()) {
                        edges.push((cell.coord, side, neighbor.coord));
                    }
                }
            }
        }
        edges
    }

    /// Breadth-first flood over yield links from `start`.
    fn flood(&self, start: CellCoord, visited: &mut [bool]) -> Component {
        let mut component = Component::default();
        let mut queue = VecDeque::new();
        if let Some(index) = self.cell_index(start) {
            visited[index] = true;
            queue.push_back(start);
        }

        while let Some(coord) = queue.pop_front() {
            let Some(cell) = self.cell(coord) else {
                continue;
            };

            if cell.repo {
                component.exits.push(coord);
            } else if cell.producer && cell.bank > 0.0 {
                component.producers.push(coord);
            }

            for next in cell.yield_links.iter().flatten() {
                let Some(index) = self.cell_index(*next) else {
                    continue;
                };
                if visited[index] {
                    continue;
                }
                visited[index] = true;
                queue.push_back(*next);
            }
        }

        component
    }

    /// Stamps the hop count to the nearest exit on every reachable cell.
    fn label_distances(&mut self, exits: &[CellCoord]) {
        let mut queue = VecDeque::new();
        for &exit in exits {
            if let Some(cell) = self.cell_mut(exit) {
                if cell.distance_to_exit.is_none() {
                    cell.distance_to_exit = Some(0);
                    queue.push_back(exit);
                }
            }
        }

        while let Some(coord) = queue.pop_front() {
            let Some(cell) = self.cell(coord) else {
                continue;
            };
            let Some(distance) = cell.distance_to_exit else {
                continue;
            };
            let links = cell.yield_links;

            for next in links.into_iter().flatten() {
                let Some(neighbor) = self.cell_mut(next) else {
                    continue;
                };
                if neighbor.distance_to_exit.is_some() {
                    continue;
                }
                neighbor.distance_to_exit = Some(distance + 1);
                queue.push_back(next);
            }
        }
    }

    /// Walks from `producer` toward the nearest exit, recording one hop per
    /// non-repo cell.
    ///
    /// Each step takes the first strictly closer neighbor in
    /// [`Orientation::ALL`] order among those sharing the minimal distance.
    fn trace_chain(&mut self, producer: CellCoord) {
        let Some(currency) = self.cell(producer).map(|cell| cell.currency) else {
            return;
        };

        let mut route = Vec::new();
        let mut current = producer;
        let mut entry = None;

        loop {
            let Some(cell) = self.cell(current) else {
                break;
            };
            if cell.repo {
                if let Some(repo) = self.cell_mut(current) {
                    repo.in_productive_chain |= !route.is_empty();
                }
                break;
            }
            let Some(here) = cell.distance_to_exit else {
                break;
            };

            let step = Orientation::ALL
                .into_iter()
                .filter_map(|side| {
                    let next = cell.yield_link(side)?;
                    let distance = self.cell(next)?.distance_to_exit?;
                    Some((side, next, distance))
                })
                .filter(|(_, _, distance)| *distance < here)
                .min_by_key(|(_, _, distance)| *distance);

            let Some((exit, next, _)) = step else {
                break;
            };

            let hop = ProductionHop {
                cell: current,
                entry,
                exit,
                currency,
            };
            if let Some(cell) = self.cell_mut(current) {
                cell.production_chains.push(hop);
                cell.in_productive_chain = true;
            }
            route.push(hop);
            entry = Some(exit.opposite());
            current = next;
        }

        let _ = self.routes.insert(producer, route);
    }
}

#[cfg(test)]
mod tests {
    use mineshaft_core::{
        Currency, CurrencyWeight, SessionRules, UnitConfig, UnitKey, UnitTemplate, WallMask,
    };

    use super::*;
    use crate::ScriptedRandom;

    /// Two fully unlocked rows of eight, repo at column 3, no rotation.
    fn comb() -> GridUnit {
        let template = UnitTemplate {
            key: UnitKey::new("mine"),
            config: UnitConfig {
                columns: 8,
                max_unlock_rows: 2,
                initial_row_unlocks: 2,
                producer_weights: vec![CurrencyWeight::new(Currency::Gold, 1.0)],
                pickup_tracks_on_row_unlock: false,
                rotate_tracks_on_setup: false,
                ..UnitConfig::default()
            },
            ..UnitTemplate::default()
        };
        let mut rng = ScriptedRandom::new(0.9, 0).with_indices([2]);
        let mut events = Vec::new();
        GridUnit::setup(&template, &SessionRules::default(), &[], &mut rng, &mut events)
            .expect("setup")
    }

    #[test]
    fn yield_links_require_both_sides_open() {
        let mut unit = comb();
        let east_of_repo = CellCoord::new(0, 4);
        let cell = unit.cell_mut(east_of_repo).expect("cell");
        cell.wall_orientation = WallMask::from_bits(0b0010);

        let mut events = Vec::new();
        let _ = unit.calculate_yield(&mut events);

        let repo = unit.cell(CellCoord::new(0, 3)).expect("repo");
        assert_eq!(repo.yield_link(Orientation::East), None);
        assert_eq!(
            repo.yield_link(Orientation::West),
            Some(CellCoord::new(0, 2))
        );
    }

    #[test]
    fn distances_count_hops_to_the_nearest_repo() {
        let unit = comb();
        let distance = |row, column| {
            unit.cell(CellCoord::new(row, column))
                .and_then(|cell| cell.distance_to_exit())
        };
        assert_eq!(distance(0, 3), Some(0));
        assert_eq!(distance(0, 0), Some(3));
        assert_eq!(distance(1, 3), Some(1));
        assert_eq!(distance(1, 0), Some(4));
        assert_eq!(distance(1, 7), Some(5));
    }

    #[test]
    fn chains_record_entry_and_exit_sides() {
        let unit = comb();
        let route = unit
            .routes
            .get(&CellCoord::new(1, 0))
            .expect("route for corner producer");
        let sides: Vec<_> = route.iter().map(|hop| (hop.entry, hop.exit)).collect();
        assert_eq!(
            sides,
            vec![
                (None, Orientation::East),
                (Some(Orientation::West), Orientation::North),
                (Some(Orientation::South), Orientation::East),
                (Some(Orientation::West), Orientation::East),
            ]
        );
        assert!(route.iter().all(|hop| hop.currency == Currency::Gold));
    }

    #[test]
    fn chains_are_stamped_on_every_cell_they_cross() {
        let unit = comb();
        let route = unit
            .routes
            .get(&CellCoord::new(1, 0))
            .expect("route for corner producer");
        assert_eq!(route.len(), 4);

        for hop in route {
            let cell = unit.cell(hop.cell).expect("hop cell");
            assert!(cell.production_chains().contains(hop), "{hop:?}");
            assert!(cell.in_productive_chain(), "{hop:?}");
        }

        let repo = unit.cell(CellCoord::new(0, 3)).expect("repo");
        assert!(repo.production_chains().is_empty());
        assert!(repo.in_productive_chain());
    }

    #[test]
    fn depleted_producers_stay_inactive() {
        let mut unit = comb();
        let dry = CellCoord::new(1, 5);
        unit.cell_mut(dry).expect("cell").bank = 0.0;

        let mut events = Vec::new();
        let active = unit.calculate_yield(&mut events);

        assert_eq!(active, 7);
        assert!(!unit.active_producers.contains(&dry));
        assert!(unit.routes.get(&dry).is_none());
        assert_eq!(events, vec![Event::YieldUpdated { active_producers: 7 }]);
    }
}
