//! Player-facing track mutations: rotation, clearing, placement and swaps.

use std::collections::BTreeSet;

use mineshaft_core::{
    CellCoord, Currency, Event, GridError, Orientation, Rotation, TrackKind, WallMask,
};

use crate::{Cell, GridUnit};

impl Cell {
    fn clear_walls(&mut self) {
        self.track = TrackKind::None;
        self.wall_variant = WallMask::NONE;
        self.wall_orientation = WallMask::NONE;
        self.orientation = Orientation::North;
    }

    /// Clears the cell, returning the track it carried if any.
    pub(crate) fn strip_track(&mut self) -> Option<TrackKind> {
        let track = self.track;
        if track == TrackKind::None {
            return None;
        }
        self.clear_walls();
        Some(track)
    }
}

/// Scratch buffer holding the exchangeable properties of a cell.
///
/// Position and raw-grid neighbors stay with the slot.
#[derive(Clone, Debug)]
struct CellProperties {
    currency: Currency,
    bank: f32,
    bank_max: f32,
    track: TrackKind,
    links: BTreeSet<CellCoord>,
    wall_variant: WallMask,
    wall_orientation: WallMask,
    orientation: Orientation,
    producer: bool,
    repo: bool,
}

impl CellProperties {
    fn capture(cell: &Cell) -> Self {
        Self {
            currency: cell.currency,
            bank: cell.bank,
            bank_max: cell.bank_max,
            track: cell.track,
            links: cell.links.clone(),
            wall_variant: cell.wall_variant,
            wall_orientation: cell.wall_orientation,
            orientation: cell.orientation,
            producer: cell.producer,
            repo: cell.repo,
        }
    }

    fn restore(self, cell: &mut Cell) {
        cell.currency = self.currency;
        cell.bank = self.bank;
        cell.bank_max = self.bank_max;
        cell.track = self.track;
        cell.links = self.links;
        cell.wall_variant = self.wall_variant;
        cell.wall_orientation = self.wall_orientation;
        cell.orientation = self.orientation;
        cell.producer = self.producer;
        cell.repo = self.repo;
    }
}

impl GridUnit {
    /// Rotates a cell a quarter turn and recomputes the network.
    ///
    /// The repo never rotates.
    pub fn rotate_cell(
        &mut self,
        cell: CellCoord,
        rotation: Rotation,
        out_events: &mut Vec<Event>,
    ) -> Result<Orientation, GridError> {
        let target = self.checked_cell_mut(cell)?;
        if target.repo {
            return Err(GridError::RepoImmutable { cell });
        }
        let orientation = target.rotate(rotation);
        tracing::debug!(
            row = cell.row(),
            column = cell.column(),
            ?orientation,
            walls = target.wall_orientation.bits(),
            "cell rotated"
        );
        out_events.push(Event::CellRotated { cell, orientation });
        let _ = self.calculate_yield(out_events);
        Ok(orientation)
    }

    /// Strips the track and every wall from a cell.
    pub fn clear_cell_walls(
        &mut self,
        cell: CellCoord,
        out_events: &mut Vec<Event>,
    ) -> Result<(), GridError> {
        let target = self.mutable_track_cell(cell)?;
        target.clear_walls();
        out_events.push(Event::CellWallsCleared { cell });
        let _ = self.calculate_yield(out_events);
        Ok(())
    }

    /// Places a North-facing track piece using its canonical wall mask.
    ///
    /// Returns `Ok(false)` when the cell's row is still locked.
    pub fn place_track(
        &mut self,
        cell: CellCoord,
        track: TrackKind,
        out_events: &mut Vec<Event>,
    ) -> Result<bool, GridError> {
        let unlocked = self.is_row_unlocked(cell.row());
        let target = self.mutable_track_cell(cell)?;
        if !unlocked {
            return Ok(false);
        }
        let walls = track.canonical_walls();
        target.track = track;
        target.wall_variant = walls;
        target.wall_orientation = walls;
        target.orientation = Orientation::North;
        out_events.push(Event::TrackPlaced { cell, track });
        let _ = self.calculate_yield(out_events);
        Ok(true)
    }

    fn mutable_track_cell(&mut self, cell: CellCoord) -> Result<&mut Cell, GridError> {
        let target = self.checked_cell_mut(cell)?;
        if target.repo {
            return Err(GridError::RepoImmutable { cell });
        }
        if target.producer {
            return Err(GridError::ProducerWallsCleared { cell });
        }
        Ok(target)
    }

    /// Exchanges the properties of two distinct cells and recomputes the network.
    pub fn swap_cells(
        &mut self,
        first: CellCoord,
        second: CellCoord,
        out_events: &mut Vec<Event>,
    ) -> Result<(), GridError> {
        if first == second {
            return Err(GridError::InvalidSwap { cell: first });
        }
        for cell in [first, second] {
            if self.checked_cell(cell)?.repo {
                return Err(GridError::RepoImmutable { cell });
            }
        }

        self.exchange(first, second);
        self.recount_unlocked_producers();
        out_events.push(Event::CellsSwapped { first, second });
        let _ = self.calculate_yield(out_events);
        Ok(())
    }

    /// Swaps cell properties through a scratch buffer without recomputing.
    pub(crate) fn exchange(&mut self, first: CellCoord, second: CellCoord) {
        let (Some(a), Some(b)) = (self.cell(first), self.cell(second)) else {
            return;
        };
        let (a, b) = (CellProperties::capture(a), CellProperties::capture(b));
        if let Some(cell) = self.cell_mut(first) {
            b.restore(cell);
        }
        if let Some(cell) = self.cell_mut(second) {
            a.restore(cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use mineshaft_core::{SessionRules, UnitConfig, UnitKey, UnitTemplate};

    use super::*;
    use crate::ScriptedRandom;

    fn mine(rows: u32) -> GridUnit {
        let template = UnitTemplate {
            key: UnitKey::new("mine"),
            config: UnitConfig {
                max_unlock_rows: rows,
                initial_row_unlocks: 1,
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
    fn rotation_round_trips_and_reports_the_new_facing() {
        let mut unit = mine(2);
        let coord = CellCoord::new(0, 5);
        let before = unit.cell(coord).cloned().expect("cell");
        let mut events = Vec::new();

        for _ in 0..4 {
            let _ = unit
                .rotate_cell(coord, Rotation::Clockwise, &mut events)
                .expect("rotate");
        }
        let after = unit.cell(coord).expect("cell");
        assert_eq!(after.wall_orientation(), before.wall_orientation());
        assert_eq!(after.orientation(), before.orientation());
        assert_eq!(after.wall_variant(), before.wall_variant());

        let facing = unit
            .rotate_cell(coord, Rotation::CounterClockwise, &mut events)
            .expect("rotate");
        assert_eq!(facing, Orientation::West);
        assert!(events.contains(&Event::CellRotated {
            cell: coord,
            orientation: Orientation::West,
        }));
    }

    #[test]
    fn rotating_a_link_away_disconnects_the_producer() {
        let mut unit = mine(1);
        let mut events = Vec::new();
        assert!(unit.active_producers().contains(&CellCoord::new(0, 0)));

        let _ = unit
            .rotate_cell(CellCoord::new(0, 1), Rotation::Clockwise, &mut events)
            .expect("rotate");

        assert!(!unit.active_producers().contains(&CellCoord::new(0, 0)));
    }

    #[test]
    fn repo_rejects_every_track_mutation() {
        let mut unit = mine(2);
        let repo = CellCoord::new(0, 3);
        let mut events = Vec::new();

        assert_eq!(
            unit.rotate_cell(repo, Rotation::Clockwise, &mut events),
            Err(GridError::RepoImmutable { cell: repo })
        );
        assert_eq!(
            unit.clear_cell_walls(repo, &mut events),
            Err(GridError::RepoImmutable { cell: repo })
        );
        assert_eq!(
            unit.place_track(repo, TrackKind::Cross, &mut events),
            Err(GridError::RepoImmutable { cell: repo })
        );
        assert!(events.is_empty());
    }

    #[test]
    fn producers_cannot_be_cleared() {
        let mut unit = mine(2);
        let producer = CellCoord::new(0, 0);
        let mut events = Vec::new();
        assert_eq!(
            unit.clear_cell_walls(producer, &mut events),
            Err(GridError::ProducerWallsCleared { cell: producer })
        );
    }

    #[test]
    fn out_of_range_cells_are_rejected() {
        let mut unit = mine(2);
        let outside = CellCoord::new(5, 0);
        let mut events = Vec::new();
        assert_eq!(
            unit.rotate_cell(outside, Rotation::Clockwise, &mut events),
            Err(GridError::CellOutOfBounds { cell: outside })
        );
    }

    #[test]
    fn placing_a_track_restores_a_cleared_passage() {
        let mut unit = mine(1);
        let passage = CellCoord::new(0, 1);
        let mut events = Vec::new();

        unit.clear_cell_walls(passage, &mut events).expect("clear");
        assert!(!unit.active_producers().contains(&CellCoord::new(0, 0)));

        assert_eq!(
            unit.place_track(passage, TrackKind::Straight, &mut events),
            Ok(true)
        );
        let _ = unit
            .rotate_cell(passage, Rotation::Clockwise, &mut events)
            .expect("rotate");

        let placed = unit.cell(passage).expect("cell");
        assert_eq!(placed.track(), TrackKind::Straight);
        assert_eq!(placed.wall_variant(), WallMask::from_bits(5));
        assert_eq!(placed.wall_orientation(), WallMask::from_bits(10));
        assert!(unit.active_producers().contains(&CellCoord::new(0, 0)));
    }

    #[test]
    fn placing_on_a_locked_row_is_ignored() {
        let mut unit = mine(2);
        let locked = CellCoord::new(1, 1);
        let before = unit.cell(locked).cloned().expect("cell");
        let mut events = Vec::new();

        assert_eq!(
            unit.place_track(locked, TrackKind::Curve, &mut events),
            Ok(false)
        );
        assert_eq!(unit.cell(locked), Some(&before));
        assert!(events.is_empty());
    }

    #[test]
    fn swapping_exchanges_properties_but_not_positions() {
        let mut unit = mine(2);
        let producer = CellCoord::new(0, 0);
        let passage = CellCoord::new(0, 1);
        let mut events = Vec::new();

        unit.swap_cells(producer, passage, &mut events)
            .expect("swap");

        let moved = unit.cell(passage).expect("cell");
        assert!(moved.is_producer());
        assert_eq!(moved.coord(), passage);
        assert_eq!(moved.neighbor(Orientation::West), Some(producer));
        assert!(!unit.cell(producer).expect("cell").is_producer());
        assert_eq!(
            events.first(),
            Some(&Event::CellsSwapped {
                first: producer,
                second: passage,
            })
        );
    }

    #[test]
    fn swapping_a_cell_with_itself_is_rejected() {
        let mut unit = mine(2);
        let cell = CellCoord::new(0, 1);
        let mut events = Vec::new();
        assert_eq!(
            unit.swap_cells(cell, cell, &mut events),
            Err(GridError::InvalidSwap { cell })
        );
    }
}
