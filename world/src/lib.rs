#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative grid unit state for Mineshaft.
//!
//! A [`GridUnit`] owns its rows and cells for its whole lifetime. Cells refer
//! to each other exclusively through [`CellCoord`] values resolved by the
//! owning unit, so links, neighbors and yield links never form ownership
//! cycles. Every mutation runs to completion, including the network
//! recomputation it triggers, before the call returns; exclusive `&mut`
//! access is what keeps a second solve from starting while one is running.

mod converter;
mod maze;
mod network;
mod random;
mod tracks;
mod unlock;

use std::collections::{BTreeMap, BTreeSet};

use mineshaft_core::{
    BuffKind, CellCoord, Command, Currency, Event, GridError, Orientation, ProductionHop,
    Rotation, SessionRules, TechNode, TrackKind, UnitConfig, UnitKey, UnitKind, UnitTemplate,
    Wallet, WallMask, YieldTotals,
};
use mineshaft_system_modifiers::ModifierPipeline;

pub use random::RandomSource;
#[cfg(any(test, feature = "test-support"))]
pub use random::ScriptedRandom;

/// Atomic grid position with topology, resource and track state.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    coord: CellCoord,
    currency: Currency,
    bank: f32,
    bank_max: f32,
    track: TrackKind,
    links: BTreeSet<CellCoord>,
    neighbors: [Option<CellCoord>; 4],
    wall_variant: WallMask,
    wall_orientation: WallMask,
    orientation: Orientation,
    producer: bool,
    repo: bool,
    yield_links: [Option<CellCoord>; 4],
    distance_to_exit: Option<u32>,
    production_chains: Vec<ProductionHop>,
    current_yield: f32,
    in_productive_chain: bool,
}

impl Cell {
    pub(crate) fn new(coord: CellCoord) -> Self {
        Self {
            coord,
            currency: Currency::default(),
            bank: 0.0,
            bank_max: 0.0,
            track: TrackKind::None,
            links: BTreeSet::new(),
            neighbors: [None; 4],
            wall_variant: WallMask::NONE,
            wall_orientation: WallMask::NONE,
            orientation: Orientation::North,
            producer: false,
            repo: false,
            yield_links: [None; 4],
            distance_to_exit: None,
            production_chains: Vec::new(),
            current_yield: 0.0,
            in_productive_chain: false,
        }
    }

    /// Position of the cell inside its unit.
    #[must_use]
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Currency the cell produces or consumes.
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Remaining extractable amount.
    #[must_use]
    pub const fn bank(&self) -> f32 {
        self.bank
    }

    /// Bank the cell started with.
    #[must_use]
    pub const fn bank_max(&self) -> f32 {
        self.bank_max
    }

    /// Track shape displayed on the cell.
    #[must_use]
    pub const fn track(&self) -> TrackKind {
        self.track
    }

    /// Cells joined to this one by carved maze edges.
    #[must_use]
    pub fn links(&self) -> &BTreeSet<CellCoord> {
        &self.links
    }

    /// Adjacent cell on the provided side by raw grid position.
    #[must_use]
    pub const fn neighbor(&self, orientation: Orientation) -> Option<CellCoord> {
        self.neighbors[orientation.index()]
    }

    /// Generation-time wall pattern.
    #[must_use]
    pub const fn wall_variant(&self) -> WallMask {
        self.wall_variant
    }

    /// Sides currently open, driven by rotation.
    #[must_use]
    pub const fn wall_orientation(&self) -> WallMask {
        self.wall_orientation
    }

    /// Current facing.
    #[must_use]
    pub const fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Reports whether the cell stores extractable resource.
    #[must_use]
    pub const fn is_producer(&self) -> bool {
        self.producer
    }

    /// Reports whether the cell collects yield.
    #[must_use]
    pub const fn is_repo(&self) -> bool {
        self.repo
    }

    /// Runtime connection on the provided side, if both cells agree it is open.
    #[must_use]
    pub const fn yield_link(&self, orientation: Orientation) -> Option<CellCoord> {
        self.yield_links[orientation.index()]
    }

    /// Hop count to the nearest repo from the last solve.
    #[must_use]
    pub const fn distance_to_exit(&self) -> Option<u32> {
        self.distance_to_exit
    }

    /// Production hops recorded on this cell by the last solve.
    #[must_use]
    pub fn production_chains(&self) -> &[ProductionHop] {
        &self.production_chains
    }

    /// Amount yielded per tick when the cell is an active producer.
    #[must_use]
    pub const fn current_yield(&self) -> f32 {
        self.current_yield
    }

    /// Reports whether any production chain passes through the cell.
    #[must_use]
    pub const fn in_productive_chain(&self) -> bool {
        self.in_productive_chain
    }

    fn rotate(&mut self, rotation: Rotation) -> Orientation {
        let (walls, orientation) = match rotation {
            Rotation::Clockwise => (
                self.wall_orientation.rotated_cw(),
                self.orientation.rotated_cw(),
            ),
            Rotation::CounterClockwise => (
                self.wall_orientation.rotated_ccw(),
                self.orientation.rotated_ccw(),
            ),
        };
        self.wall_orientation = walls;
        self.orientation = orientation;
        orientation
    }

    fn reset_solve_state(&mut self) {
        self.yield_links = [None; 4];
        self.distance_to_exit = None;
        self.production_chains.clear();
        self.current_yield = 0.0;
        self.in_productive_chain = false;
    }
}

/// Ordered sequence of cells sharing an unlock gate.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    unlocked: bool,
    revealed: bool,
    unlock_cost: f32,
    unlock_currency: Currency,
    cells: Vec<Cell>,
}

impl Row {
    pub(crate) fn new(unlock_cost: f32, unlock_currency: Currency, cells: Vec<Cell>) -> Self {
        Self {
            unlocked: false,
            revealed: false,
            unlock_cost,
            unlock_currency,
            cells,
        }
    }

    /// Reports whether the row participates in the yield network.
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Reports whether the row has been shown to the player.
    #[must_use]
    pub const fn is_revealed(&self) -> bool {
        self.revealed
    }

    /// Amount charged to unlock the row.
    #[must_use]
    pub const fn unlock_cost(&self) -> f32 {
        self.unlock_cost
    }

    /// Currency charged to unlock the row.
    #[must_use]
    pub const fn unlock_currency(&self) -> Currency {
        self.unlock_currency
    }

    /// Cells of the row ordered by column.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// Maze-grid production unit owning every row and cell.
#[derive(Clone, Debug)]
pub struct GridUnit {
    key: UnitKey,
    kind: UnitKind,
    config: UnitConfig,
    columns: u32,
    rows: Vec<Row>,
    total_producers: u32,
    unlocked_producers: u32,
    active_producers: BTreeSet<CellCoord>,
    routes: BTreeMap<CellCoord, Vec<ProductionHop>>,
    buffs: Vec<BuffKind>,
}

/// External collaborators consulted while applying commands.
pub struct Session<'a> {
    /// Wallet debited by unlocks and credited by yield ticks.
    pub wallet: &'a mut dyn Wallet,
    /// Active technology entries; only those matching the unit are read.
    pub tech: &'a [TechNode],
}

impl GridUnit {
    /// Builds and bootstraps a unit from its template.
    ///
    /// Runs the generator for the template's kind, then unlocks the initial
    /// rows for free, which also performs the first yield solve.
    pub fn setup<R>(
        template: &UnitTemplate,
        rules: &SessionRules,
        tech: &[TechNode],
        rng: &mut R,
        out_events: &mut Vec<Event>,
    ) -> Result<Self, GridError>
    where
        R: RandomSource + ?Sized,
    {
        match template.kind {
            UnitKind::Mine => maze::generate(template, rules, tech, rng, out_events),
            UnitKind::Converter => converter::generate(template, rules, rng, out_events),
        }
    }

    pub(crate) fn empty(template: &UnitTemplate, config: UnitConfig, rows: Vec<Row>) -> Self {
        Self {
            key: template.key.clone(),
            kind: template.kind,
            columns: config.columns,
            config,
            rows,
            total_producers: 0,
            unlocked_producers: 0,
            active_producers: BTreeSet::new(),
            routes: BTreeMap::new(),
            buffs: Vec::new(),
        }
    }

    /// Identity used to match technology entries.
    #[must_use]
    pub fn key(&self) -> &UnitKey {
        &self.key
    }

    /// Behavioural family of the unit.
    #[must_use]
    pub const fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Tuning knobs the unit was built with.
    #[must_use]
    pub fn config(&self) -> &UnitConfig {
        &self.config
    }

    /// Number of cells per row.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Rows ordered by unlock index.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Producers created during setup.
    #[must_use]
    pub const fn total_producers(&self) -> u32 {
        self.total_producers
    }

    /// Producers living in unlocked rows.
    #[must_use]
    pub const fn unlocked_producers(&self) -> u32 {
        self.unlocked_producers
    }

    /// Producers with a positive bank connected to a repo.
    #[must_use]
    pub fn active_producers(&self) -> &BTreeSet<CellCoord> {
        &self.active_producers
    }

    /// Buffs applied to yield totals, in application order.
    #[must_use]
    pub fn buffs(&self) -> &[BuffKind] {
        &self.buffs
    }

    /// Appends a buff to the ordered buff list.
    pub fn add_buff(&mut self, buff: BuffKind) {
        self.buffs.push(buff);
    }

    /// Removes every buff.
    pub fn clear_buffs(&mut self) {
        self.buffs.clear();
    }

    /// Final per-currency yield after conversions, buffs and efficiency tech.
    #[must_use]
    pub fn total_yield(&self, wallet: &dyn Wallet, tech: &[TechNode]) -> YieldTotals {
        let mut totals = YieldTotals::new();
        if self.kind == UnitKind::Converter {
            self.convert_into(wallet, &mut totals);
        }

        for coord in &self.active_producers {
            if let Some(cell) = self.cell(*coord) {
                *totals.entry(cell.currency).or_insert(0.0) += cell.current_yield;
            }
        }

        ModifierPipeline::for_unit(&self.buffs, tech, &self.key).apply(&mut totals);
        totals
    }

    /// Pays one yield tick into the wallet and drains producer banks.
    ///
    /// Producers that run dry drop out of the network, which triggers a
    /// recomputation.
    pub fn collect_yield(
        &mut self,
        wallet: &mut dyn Wallet,
        tech: &[TechNode],
        out_events: &mut Vec<Event>,
    ) -> YieldTotals {
        let totals = self.total_yield(&*wallet, tech);
        for (currency, amount) in &totals {
            wallet.adjust(*currency, *amount);
        }

        let mut depleted = false;
        if self.kind == UnitKind::Mine {
            let active: Vec<CellCoord> = self.active_producers.iter().copied().collect();
            for coord in active {
                if let Some(cell) = self.cell_mut(coord) {
                    cell.bank = (cell.bank - cell.current_yield).max(0.0);
                    depleted |= cell.bank <= 0.0;
                }
            }
        }

        out_events.push(Event::YieldCollected {
            totals: totals.clone(),
        });

        if depleted {
            tracing::debug!(unit = self.key.as_str(), "producer bank depleted");
            let _ = self.calculate_yield(out_events);
        }
        totals
    }

    pub(crate) fn cell(&self, coord: CellCoord) -> Option<&Cell> {
        let row = usize::try_from(coord.row()).ok()?;
        let column = usize::try_from(coord.column()).ok()?;
        self.rows.get(row)?.cells.get(column)
    }

    pub(crate) fn cell_mut(&mut self, coord: CellCoord) -> Option<&mut Cell> {
        let row = usize::try_from(coord.row()).ok()?;
        let column = usize::try_from(coord.column()).ok()?;
        self.rows.get_mut(row)?.cells.get_mut(column)
    }

    pub(crate) fn checked_cell(&self, coord: CellCoord) -> Result<&Cell, GridError> {
        self.cell(coord)
            .ok_or(GridError::CellOutOfBounds { cell: coord })
    }

    pub(crate) fn checked_cell_mut(&mut self, coord: CellCoord) -> Result<&mut Cell, GridError> {
        self.cell_mut(coord)
            .ok_or(GridError::CellOutOfBounds { cell: coord })
    }

    pub(crate) fn is_row_unlocked(&self, row: u32) -> bool {
        usize::try_from(row)
            .ok()
            .and_then(|index| self.rows.get(index))
            .is_some_and(Row::is_unlocked)
    }

    /// Cell at `coord` when it exists and its row is unlocked.
    pub(crate) fn unlocked_cell(&self, coord: CellCoord) -> Option<&Cell> {
        if !self.is_row_unlocked(coord.row()) {
            return None;
        }
        self.cell(coord)
    }

    pub(crate) fn cell_index(&self, coord: CellCoord) -> Option<usize> {
        let columns = usize::try_from(self.columns).ok()?;
        let row = usize::try_from(coord.row()).ok()?;
        let column = usize::try_from(coord.column()).ok()?;
        if column >= columns {
            return None;
        }
        row.checked_mul(columns)?.checked_add(column)
    }

    pub(crate) fn cell_count(&self) -> usize {
        self.rows.iter().map(|row| row.cells.len()).sum()
    }
}

/// Cell count of a `rows` by `columns` grid, rejecting empty or unaddressable sizes.
pub(crate) fn checked_cell_count(rows: u32, columns: u32) -> Result<usize, GridError> {
    rows.checked_mul(columns)
        .filter(|count| *count > 0)
        .and_then(|count| usize::try_from(count).ok())
        .ok_or(GridError::InvalidDimensions { rows, columns })
}

/// Populates every cell's raw-position neighbors. Out-of-range sides stay empty.
pub(crate) fn assign_neighbors(rows: &mut [Row], columns: u32) {
    let row_count = u32::try_from(rows.len()).unwrap_or(u32::MAX);
    for row in rows.iter_mut() {
        for cell in &mut row.cells {
            for orientation in Orientation::ALL {
                cell.neighbors[orientation.index()] = cell
                    .coord
                    .step(orientation)
                    .filter(|next| next.row() < row_count && next.column() < columns);
            }
        }
    }
}

/// Applies the provided command to the unit, mutating state deterministically.
///
/// Recoverable refusals surface as events or are ignored; only consistency
/// violations are returned as errors.
pub fn apply(
    unit: &mut GridUnit,
    command: Command,
    session: &mut Session<'_>,
    out_events: &mut Vec<Event>,
) -> Result<(), GridError> {
    match command {
        Command::RotateCell { cell, rotation } => {
            let _ = unit.rotate_cell(cell, rotation, out_events)?;
        }
        Command::UnlockRow => {
            let _ = unit.unlock_row(&mut *session.wallet, out_events);
        }
        Command::RevealRows => unit.reveal_rows(out_events),
        Command::ClearCellWalls { cell } => unit.clear_cell_walls(cell, out_events)?,
        Command::PlaceTrack { cell, track } => {
            let _ = unit.place_track(cell, track, out_events)?;
        }
        Command::SwapCells { first, second } => unit.swap_cells(first, second, out_events)?,
        Command::ToggleRowProducer { row } => {
            let _ = unit.toggle_row_producer(row, out_events)?;
        }
        Command::AddBuff { buff } => unit.add_buff(buff),
        Command::ClearBuffs => unit.clear_buffs(),
        Command::CollectYield => {
            let _ = unit.collect_yield(&mut *session.wallet, session.tech, out_events);
        }
        Command::Refresh => {
            let _ = unit.calculate_yield(out_events);
        }
    }
    Ok(())
}

/// Query functions that provide read-only access to grid unit state.
pub mod query {
    use mineshaft_core::{
        CellCoord, Currency, Orientation, ProductionHop, TechNode, TrackKind, UnitKind, Wallet,
        WallMask, YieldTotals,
    };
    use serde::{Deserialize, Serialize};

    use super::{Cell, GridUnit};

    /// Cell at the provided position, or `None` when out of range.
    #[must_use]
    pub fn cell(unit: &GridUnit, row: u32, column: u32) -> Option<&Cell> {
        unit.cell(CellCoord::new(row, column))
    }

    /// Index of the highest contiguous unlocked row, `None` when nothing is unlocked.
    #[must_use]
    pub fn unlock_level(unit: &GridUnit) -> Option<u32> {
        unit.unlock_level()
    }

    /// Reports whether the wallet can pay for the next locked row.
    #[must_use]
    pub fn can_unlock(unit: &GridUnit, wallet: &dyn Wallet) -> bool {
        unit.can_unlock(wallet)
    }

    /// Reports whether every row is unlocked.
    #[must_use]
    pub fn is_fully_unlocked(unit: &GridUnit) -> bool {
        unit.is_fully_unlocked()
    }

    /// Reports whether no row has been revealed yet.
    #[must_use]
    pub fn is_first_reveal(unit: &GridUnit) -> bool {
        unit.rows.iter().all(|row| !row.revealed)
    }

    /// Reports whether any producer currently feeds a repo.
    #[must_use]
    pub fn has_yield(unit: &GridUnit) -> bool {
        !unit.active_producers.is_empty()
    }

    /// Final per-currency yield for one tick, after conversions, buffs and tech.
    #[must_use]
    pub fn total_yield(unit: &GridUnit, wallet: &dyn Wallet, tech: &[TechNode]) -> YieldTotals {
        unit.total_yield(wallet, tech)
    }

    /// Share of unlocked producers that are active, snapping near-complete to 1.
    #[must_use]
    pub fn active_producer_percent(unit: &GridUnit) -> f32 {
        if unit.unlocked_producers == 0 {
            return 0.0;
        }
        let percent = unit.active_producers.len() as f32 / unit.unlocked_producers as f32;
        if percent >= 0.999 {
            1.0
        } else {
            percent
        }
    }

    /// Ordered hops from a producer to its repo, recorded by the last solve.
    #[must_use]
    pub fn production_chain(unit: &GridUnit, producer: CellCoord) -> &[ProductionHop] {
        unit.routes.get(&producer).map_or(&[], Vec::as_slice)
    }

    /// Reports whether a converter row is unlocked and flagged as producing.
    #[must_use]
    pub fn is_row_producing(unit: &GridUnit, row: u32) -> bool {
        if unit.kind != UnitKind::Converter {
            return false;
        }
        usize::try_from(row)
            .ok()
            .and_then(|index| unit.rows.get(index))
            .is_some_and(|row| {
                row.unlocked && row.cells.get(1).is_some_and(|output| output.producer)
            })
    }

    /// Captures the persisted field set of every row and cell.
    #[must_use]
    pub fn snapshot(unit: &GridUnit) -> UnitSnapshot {
        UnitSnapshot {
            kind: unit.kind,
            columns: unit.columns,
            total_producers: unit.total_producers,
            unlocked_producers: unit.unlocked_producers,
            rows: unit
                .rows
                .iter()
                .map(|row| RowSnapshot {
                    unlocked: row.unlocked,
                    revealed: row.revealed,
                    unlock_cost: row.unlock_cost,
                    unlock_currency: row.unlock_currency,
                    cells: row.cells.iter().map(CellSnapshot::from).collect(),
                })
                .collect(),
        }
    }

    /// Serializable image of a unit handed to external save layers.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct UnitSnapshot {
        /// Behavioural family of the unit.
        pub kind: UnitKind,
        /// Number of cells per row.
        pub columns: u32,
        /// Producers created during setup.
        pub total_producers: u32,
        /// Producers living in unlocked rows.
        pub unlocked_producers: u32,
        /// Row states in unlock order.
        pub rows: Vec<RowSnapshot>,
    }

    /// Serializable image of a row.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct RowSnapshot {
        /// Whether the row is unlocked.
        pub unlocked: bool,
        /// Whether the row is revealed.
        pub revealed: bool,
        /// Unlock price.
        pub unlock_cost: f32,
        /// Unlock currency.
        pub unlock_currency: Currency,
        /// Cells ordered by column.
        pub cells: Vec<CellSnapshot>,
    }

    /// Serializable image of a cell.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct CellSnapshot {
        /// Position of the cell.
        pub coord: CellCoord,
        /// Produced currency.
        pub currency: Currency,
        /// Remaining bank.
        pub bank: f32,
        /// Starting bank.
        pub bank_max: f32,
        /// Displayed track shape.
        pub track: TrackKind,
        /// Current facing.
        pub orientation: Orientation,
        /// Generation-time walls.
        pub wall_variant: WallMask,
        /// Currently open walls.
        pub wall_orientation: WallMask,
        /// Whether the cell is a producer.
        pub producer: bool,
        /// Whether the cell is a repo.
        pub repo: bool,
        /// Carved maze links.
        pub links: Vec<CellCoord>,
    }

    impl From<&Cell> for CellSnapshot {
        fn from(cell: &Cell) -> Self {
            Self {
                coord: cell.coord,
                currency: cell.currency,
                bank: cell.bank,
                bank_max: cell.bank_max,
                track: cell.track,
                orientation: cell.orientation,
                wall_variant: cell.wall_variant,
                wall_orientation: cell.wall_orientation,
                producer: cell.producer,
                repo: cell.repo,
                links: cell.links.iter().copied().collect(),
            }
        }
    }
}
