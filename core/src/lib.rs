#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Mineshaft production engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative grid units, and pure systems. Adapters submit [`Command`]
//! values describing desired mutations, the world executes those commands via
//! its `apply` entry point, and then broadcasts [`Event`] values describing
//! what changed. Collaborators that live outside the engine (the wallet, the
//! active technology list, session rules) are expressed here as plain data or
//! narrow traits so the world never reaches into external state directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Aggregated yield keyed by currency, ordered deterministically.
pub type YieldTotals = BTreeMap<Currency, f32>;

/// Resource kinds produced, consumed and stored by grid units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Currency {
    /// Baseline resource and the fallback for every weighted draw.
    #[default]
    Stone,
    /// Secondary resource.
    Copper,
    /// Input resource consumed by converter units.
    Iron,
    /// Premium resource.
    Gold,
}

/// Cardinal facings a cell can take, cycling clockwise North → East → South → West.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Orientation {
    /// Toward decreasing row indices.
    #[default]
    North,
    /// Toward increasing column indices.
    East,
    /// Toward increasing row indices.
    South,
    /// Toward decreasing column indices.
    West,
}

impl Orientation {
    /// Every orientation in clockwise order starting at North.
    ///
    /// This is also the order in which per-side maps are iterated, which makes
    /// it the tie-break order used when tracing production chains.
    pub const ALL: [Orientation; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Next orientation when turning clockwise.
    #[must_use]
    pub const fn rotated_cw(self) -> Self {
        match self {
            Self::North => Self::East,
            Self::East => Self::South,
            Self::South => Self::West,
            Self::West => Self::North,
        }
    }

    /// Next orientation when turning counter-clockwise.
    #[must_use]
    pub const fn rotated_ccw(self) -> Self {
        match self {
            Self::North => Self::West,
            Self::East => Self::North,
            Self::South => Self::East,
            Self::West => Self::South,
        }
    }

    /// Orientation pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// Dense index of the orientation, matching [`Orientation::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    /// Wall mask with only this side set.
    #[must_use]
    pub const fn wall(self) -> WallMask {
        WallMask(1 << self.index())
    }
}

/// Direction of a single-step cell rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    /// Quarter turn clockwise.
    Clockwise,
    /// Quarter turn counter-clockwise.
    CounterClockwise,
}

/// Location of a single grid cell expressed as row and column coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    row: u32,
    column: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Zero-based row index of the cell. Row 0 hosts the repo.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Coordinate one step away in the provided direction.
    ///
    /// Only underflow is rejected here; upper bounds belong to the owning grid.
    #[must_use]
    pub fn step(self, orientation: Orientation) -> Option<CellCoord> {
        match orientation {
            Orientation::North => Some(Self::new(self.row.checked_sub(1)?, self.column)),
            Orientation::East => Some(Self::new(self.row, self.column.checked_add(1)?)),
            Orientation::South => Some(Self::new(self.row.checked_add(1)?, self.column)),
            Orientation::West => Some(Self::new(self.row, self.column.checked_sub(1)?)),
        }
    }
}

/// Four-bit mask with one bit per cell side (North = 1, East = 2, South = 4, West = 8).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WallMask(u8);

impl WallMask {
    /// Every side closed.
    pub const NONE: Self = Self(0);
    /// Every side open.
    pub const ALL: Self = Self(0b1111);

    /// Builds a mask from raw bits, discarding anything above the low nibble.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw bit pattern in the range 0..=15.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Reports whether the provided side is open.
    #[must_use]
    pub const fn contains(self, orientation: Orientation) -> bool {
        self.0 & orientation.wall().0 != 0
    }

    /// Copy of the mask with the provided side opened.
    #[must_use]
    pub const fn with(self, orientation: Orientation) -> Self {
        Self(self.0 | orientation.wall().0)
    }

    /// Number of open sides.
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Reports whether exactly one side is open (a maze dead end).
    #[must_use]
    pub const fn is_single_side(self) -> bool {
        self.count() == 1
    }

    /// Reports whether every side is closed.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Shifts every open side one quarter turn clockwise; West wraps to North.
    #[must_use]
    pub const fn rotated_cw(self) -> Self {
        Self(((self.0 << 1) | (self.0 >> 3)) & Self::ALL.0)
    }

    /// Shifts every open side one quarter turn counter-clockwise; North wraps to West.
    #[must_use]
    pub const fn rotated_ccw(self) -> Self {
        Self(((self.0 >> 1) | ((self.0 & 1) << 3)) & Self::ALL.0)
    }

    /// Track shape drawn for this wall pattern.
    #[must_use]
    pub const fn track(self) -> TrackKind {
        TRACK_BY_VARIANT[self.0 as usize]
    }
}

/// Track shapes a cell can display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    /// No track; dead ends and cleared cells.
    #[default]
    None,
    /// Two adjacent sides.
    Curve,
    /// Two opposite sides.
    Straight,
    /// Three sides.
    T,
    /// All four sides.
    Cross,
}

impl TrackKind {
    /// Canonical wall mask used when a track piece is placed facing North.
    #[must_use]
    pub const fn canonical_walls(self) -> WallMask {
        match self {
            Self::None => WallMask(0),
            Self::Curve => WallMask(3),
            Self::Straight => WallMask(5),
            Self::T => WallMask(7),
            Self::Cross => WallMask(15),
        }
    }
}

const TRACK_BY_VARIANT: [TrackKind; 16] = [
    TrackKind::None,
    TrackKind::None,
    TrackKind::None,
    TrackKind::Curve,
    TrackKind::None,
    TrackKind::Straight,
    TrackKind::Curve,
    TrackKind::T,
    TrackKind::None,
    TrackKind::Curve,
    TrackKind::Straight,
    TrackKind::T,
    TrackKind::Curve,
    TrackKind::T,
    TrackKind::T,
    TrackKind::Cross,
];

/// One hop of a production chain, recorded on the cell it leaves from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductionHop {
    /// Cell the hop is recorded on.
    pub cell: CellCoord,
    /// Side the chain entered through; `None` on the producer itself.
    pub entry: Option<Orientation>,
    /// Side the chain leaves through toward the repo.
    pub exit: Orientation,
    /// Currency carried along the chain, fixed by the originating producer.
    pub currency: Currency,
}

/// Named post-processing effects applied to yield totals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuffKind {
    /// `buff_stone`: doubles an existing Stone total.
    StoneOutput,
    /// `buff_copper`: adds a flat 25 Copper.
    CopperOutput,
    /// `buff_iron`: doubles an existing Iron total.
    IronOutput,
    /// `buff_gold`: adds a flat 5 Gold.
    GoldOutput,
    /// `buff_gold2`: triples an existing Gold total.
    GoldMultiplier,
}

const BUFF_KEYS: [(&str, BuffKind); 5] = [
    ("buff_stone", BuffKind::StoneOutput),
    ("buff_copper", BuffKind::CopperOutput),
    ("buff_iron", BuffKind::IronOutput),
    ("buff_gold", BuffKind::GoldOutput),
    ("buff_gold2", BuffKind::GoldMultiplier),
];

impl BuffKind {
    /// Resolves a buff from its string key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        BUFF_KEYS
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, kind)| *kind)
    }

    /// String key identifying the buff.
    #[must_use]
    pub fn key(self) -> &'static str {
        BUFF_KEYS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map_or("", |(key, _)| key)
    }

    /// Effect the buff has on a totals map.
    #[must_use]
    pub const fn effect(self) -> BuffEffect {
        match self {
            Self::StoneOutput => BuffEffect::Scale {
                currency: Currency::Stone,
                factor: 2.0,
            },
            Self::CopperOutput => BuffEffect::Bonus {
                currency: Currency::Copper,
                amount: 25.0,
            },
            Self::IronOutput => BuffEffect::Scale {
                currency: Currency::Iron,
                factor: 2.0,
            },
            Self::GoldOutput => BuffEffect::Bonus {
                currency: Currency::Gold,
                amount: 5.0,
            },
            Self::GoldMultiplier => BuffEffect::Scale {
                currency: Currency::Gold,
                factor: 3.0,
            },
        }
    }
}

/// Pure transformation a buff performs on one currency total.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BuffEffect {
    /// Multiplies the total when an entry for the currency already exists.
    Scale {
        /// Currency that is scaled.
        currency: Currency,
        /// Multiplier applied to the existing total.
        factor: f32,
    },
    /// Adds a flat amount, creating the entry when absent.
    Bonus {
        /// Currency that receives the bonus.
        currency: Currency,
        /// Amount added to the total.
        amount: f32,
    },
}

/// Identity of a unit type, used to match technology entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey(String);

impl UnitKey {
    /// Creates a new unit key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Textual form of the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Trait kinds carried by technology entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TechTrait {
    /// Adds its value to the unit's aggregate yield multiplier.
    Efficient,
    /// Disables track pickup, rotation and swaps during setup.
    Perfection,
    /// Unlocks one extra row for free during setup.
    Guilded,
}

/// Active technology entry supplied by the session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TechNode {
    /// Trait the entry grants.
    pub kind: TechTrait,
    /// Unit type the entry applies to.
    pub unit: UnitKey,
    /// Numeric strength of the trait.
    pub value: f32,
}

impl TechNode {
    /// Creates a new technology entry.
    #[must_use]
    pub fn new(kind: TechTrait, unit: UnitKey, value: f32) -> Self {
        Self { kind, unit, value }
    }

    /// Reports whether the entry grants `kind` to `unit`.
    #[must_use]
    pub fn grants(&self, kind: TechTrait, unit: &UnitKey) -> bool {
        self.kind == kind && &self.unit == unit
    }
}

/// Behavioural family of a grid unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Maze-carved mine whose producers feed a repo.
    #[default]
    Mine,
    /// Two-column unit converting an input currency into an output currency.
    Converter,
}

impl UnitKind {
    /// Upgrade index used by the row cost formula.
    ///
    /// Mines lag one row behind (`max(0, row - 1)`), converters lead by one
    /// (`row + 1`).
    #[must_use]
    pub const fn upgrade_index(self, row: u32) -> u32 {
        match self {
            Self::Mine => row.saturating_sub(1),
            Self::Converter => row.saturating_add(1),
        }
    }

    /// Unlock cost of `row`, truncated to a whole amount.
    #[must_use]
    pub fn unlock_cost(self, row: u32, base_cost: f32, multiplier: f32) -> f32 {
        let index = self.upgrade_index(row) as f32;
        (base_cost + base_cost * index * multiplier).trunc()
    }
}

/// Relative chance for a producer to yield a currency.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrencyWeight {
    /// Currency the weight applies to.
    pub currency: Currency,
    /// Non-negative relative weight.
    pub weight: f32,
}

impl CurrencyWeight {
    /// Creates a new weight entry.
    #[must_use]
    pub const fn new(currency: Currency, weight: f32) -> Self {
        Self { currency, weight }
    }
}

/// Per-unit tuning knobs read during setup and solving.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// Number of cells per row.
    pub columns: u32,
    /// Number of rows, each gated by an unlock.
    pub max_unlock_rows: u32,
    /// Rows unlocked for free during setup.
    pub initial_row_unlocks: u32,
    /// Currency charged for row unlocks.
    pub unlock_currency: Currency,
    /// Base cost fed to the unlock cost formula.
    pub unlock_base_cost: f32,
    /// Lower bound of a producer's starting bank.
    pub bank_initial_min: f32,
    /// Upper bound of a producer's starting bank.
    pub bank_initial_max: f32,
    /// Maximum amount an active producer yields per tick.
    pub yield_base: f32,
    /// Output-to-input ratio for converter rows.
    pub yield_multiplier_padding: f32,
    /// Ordered weight table used to pick producer currencies.
    pub producer_weights: Vec<CurrencyWeight>,
    /// Clears tracks on freshly unlocked rows and reports them for pickup.
    pub pickup_tracks_on_row_unlock: bool,
    /// Randomly rotates every cell during setup.
    pub rotate_tracks_on_setup: bool,
    /// Randomly swaps two cells per row during setup.
    pub swap_tracks_on_setup: bool,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            columns: 8,
            max_unlock_rows: 2,
            initial_row_unlocks: 1,
            unlock_currency: Currency::Stone,
            unlock_base_cost: 20.0,
            bank_initial_min: 200.0,
            bank_initial_max: 300.0,
            yield_base: 5.0,
            yield_multiplier_padding: 1.0,
            producer_weights: vec![CurrencyWeight::new(Currency::Stone, 1.0)],
            pickup_tracks_on_row_unlock: true,
            rotate_tracks_on_setup: true,
            swap_tracks_on_setup: false,
        }
    }
}

/// Global session rules consumed read-only by grid units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRules {
    /// Scales how quickly row unlock costs grow.
    pub upgrade_base_multiplier: f32,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            upgrade_base_multiplier: 1.0,
        }
    }
}

/// Everything needed to set up a grid unit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitTemplate {
    /// Identity used to match technology entries.
    pub key: UnitKey,
    /// Behavioural family of the unit.
    pub kind: UnitKind,
    /// Tuning knobs for the unit.
    pub config: UnitConfig,
}

/// Balance lookup and adjustment provided by the external wallet.
pub trait Wallet {
    /// Current balance, or `None` when the wallet has no entry for the currency.
    fn balance(&self, currency: Currency) -> Option<f32>;

    /// Adds `delta` (which may be negative) to the balance of `currency`.
    fn adjust(&mut self, currency: Currency, delta: f32);
}

/// In-memory wallet backed by an ordered map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletLedger {
    amounts: BTreeMap<Currency, f32>,
}

impl WalletLedger {
    /// Creates an empty wallet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wallet with `amount` of `currency` deposited.
    #[must_use]
    pub fn with(mut self, currency: Currency, amount: f32) -> Self {
        self.adjust(currency, amount);
        self
    }

    /// Every balance held by the wallet.
    #[must_use]
    pub fn amounts(&self) -> &BTreeMap<Currency, f32> {
        &self.amounts
    }
}

impl Wallet for WalletLedger {
    fn balance(&self, currency: Currency) -> Option<f32> {
        self.amounts.get(&currency).copied()
    }

    fn adjust(&mut self, currency: Currency, delta: f32) {
        *self.amounts.entry(currency).or_insert(0.0) += delta;
    }
}

/// Commands that express all permissible grid unit mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Rotates a single cell by a quarter turn.
    RotateCell {
        /// Cell to rotate.
        cell: CellCoord,
        /// Direction of the turn.
        rotation: Rotation,
    },
    /// Attempts to buy the next locked row.
    UnlockRow,
    /// Marks every unlocked row as revealed.
    RevealRows,
    /// Strips the track and walls from a cell.
    ClearCellWalls {
        /// Cell to clear.
        cell: CellCoord,
    },
    /// Places a track piece facing North on a cell.
    PlaceTrack {
        /// Cell receiving the track.
        cell: CellCoord,
        /// Shape of the track piece.
        track: TrackKind,
    },
    /// Exchanges the properties of two cells while keeping their positions.
    SwapCells {
        /// First cell of the pair.
        first: CellCoord,
        /// Second cell of the pair.
        second: CellCoord,
    },
    /// Flips whether a converter row is producing.
    ToggleRowProducer {
        /// Row to toggle.
        row: u32,
    },
    /// Adds a buff to the unit's ordered buff list.
    AddBuff {
        /// Buff to add.
        buff: BuffKind,
    },
    /// Removes every buff from the unit.
    ClearBuffs,
    /// Runs one yield tick, paying the wallet and draining producer banks.
    CollectYield,
    /// Recomputes the yield network without mutating topology.
    Refresh,
}

/// Events broadcast by a grid unit after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The yield network was recomputed.
    YieldUpdated {
        /// Number of producers connected to a repo with a positive bank.
        active_producers: u32,
    },
    /// A cell finished a rotation.
    CellRotated {
        /// Cell that rotated.
        cell: CellCoord,
        /// Facing after the rotation.
        orientation: Orientation,
    },
    /// A row was unlocked.
    RowUnlocked {
        /// Index of the unlocked row.
        row: u32,
        /// Amount debited from the wallet.
        cost: f32,
        /// Currency debited.
        currency: Currency,
    },
    /// An unlock request was refused without side effects.
    UnlockRejected {
        /// Why the unlock was refused.
        reason: UnlockRejection,
    },
    /// A track was removed from a freshly unlocked cell and handed to inventory.
    TrackPickedUp {
        /// Cell the track was taken from.
        cell: CellCoord,
        /// Shape of the removed track.
        track: TrackKind,
    },
    /// A cell had its track and walls stripped.
    CellWallsCleared {
        /// Cell that was cleared.
        cell: CellCoord,
    },
    /// A track piece was placed on a cell.
    TrackPlaced {
        /// Cell that received the track.
        cell: CellCoord,
        /// Shape of the placed track.
        track: TrackKind,
    },
    /// Two cells exchanged their properties.
    CellsSwapped {
        /// First cell of the pair.
        first: CellCoord,
        /// Second cell of the pair.
        second: CellCoord,
    },
    /// A converter row changed its producing state.
    ProducerToggled {
        /// Row that changed.
        row: u32,
        /// Whether the row is now flagged as producing.
        producing: bool,
    },
    /// An unlocked row became visible.
    RowRevealed {
        /// Row that was revealed.
        row: u32,
    },
    /// A yield tick paid out.
    YieldCollected {
        /// Per-currency amounts credited to the wallet (negative when consumed).
        totals: YieldTotals,
    },
}

/// Reasons an unlock request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum UnlockRejection {
    /// Every row is already unlocked.
    FullyUnlocked,
    /// The wallet cannot cover the row's cost.
    InsufficientFunds {
        /// Currency the row is priced in.
        currency: Currency,
        /// Cost of the row.
        cost: f32,
        /// Balance the wallet reported, zero when it had no entry.
        balance: f32,
    },
}

/// Consistency violations that indicate a generation or caller bug.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    /// A unit was configured with too few rows or columns.
    #[error("grid needs at least 1 row and 2 columns, got {rows}x{columns}")]
    InvalidDimensions {
        /// Configured row count.
        rows: u32,
        /// Configured column count.
        columns: u32,
    },
    /// A mutation addressed a cell outside the grid.
    #[error("cell ({}, {}) lies outside the grid", .cell.row(), .cell.column())]
    CellOutOfBounds {
        /// Offending coordinate.
        cell: CellCoord,
    },
    /// A mutation addressed a row outside the grid.
    #[error("row {row} lies outside the grid")]
    RowOutOfBounds {
        /// Offending row index.
        row: u32,
    },
    /// The repo candidate already carried a partial wall configuration.
    #[error("repo cell ({}, {}) already has walls {}", .cell.row(), .cell.column(), .walls.bits())]
    RepoAlreadyWalled {
        /// Repo candidate.
        cell: CellCoord,
        /// Walls found on the candidate.
        walls: WallMask,
    },
    /// A binary-tree carve produced a cross on a non-repo cell.
    #[error("non-repo cell ({}, {}) was carved into a cross", .cell.row(), .cell.column())]
    ImpossibleCross {
        /// Offending cell.
        cell: CellCoord,
    },
    /// A caller attempted to strip walls from a producer.
    #[error("producer cell ({}, {}) cannot be cleared", .cell.row(), .cell.column())]
    ProducerWallsCleared {
        /// Offending cell.
        cell: CellCoord,
    },
    /// A caller attempted to rotate, clear or re-track the repo.
    #[error("repo cell ({}, {}) is immutable", .cell.row(), .cell.column())]
    RepoImmutable {
        /// Offending cell.
        cell: CellCoord,
    },
    /// A swap addressed the same cell twice.
    #[error("cannot swap cell ({}, {}) with itself", .cell.row(), .cell.column())]
    InvalidSwap {
        /// Cell that was named twice.
        cell: CellCoord,
    },
    /// A converter-only operation was issued against another unit kind.
    #[error("unit kind {kind:?} does not support converter rows")]
    NotAConverter {
        /// Kind of the unit that received the request.
        kind: UnitKind,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn track_lookup_matches_wall_variants() {
        let expected = [
            (0, TrackKind::None),
            (1, TrackKind::None),
            (2, TrackKind::None),
            (4, TrackKind::None),
            (8, TrackKind::None),
            (3, TrackKind::Curve),
            (6, TrackKind::Curve),
            (9, TrackKind::Curve),
            (12, TrackKind::Curve),
            (5, TrackKind::Straight),
            (10, TrackKind::Straight),
            (7, TrackKind::T),
            (11, TrackKind::T),
            (13, TrackKind::T),
            (14, TrackKind::T),
            (15, TrackKind::Cross),
        ];

        for (bits, track) in expected {
            assert_eq!(WallMask::from_bits(bits).track(), track, "variant {bits}");
            assert_eq!(WallMask::from_bits(bits).track(), track, "lookup must be pure");
        }
    }

    #[test]
    fn canonical_walls_map_back_to_their_track() {
        for track in [
            TrackKind::None,
            TrackKind::Curve,
            TrackKind::Straight,
            TrackKind::T,
            TrackKind::Cross,
        ] {
            assert_eq!(track.canonical_walls().track(), track);
        }
    }

    #[test]
    fn wall_rotation_wraps_carry_bits() {
        assert_eq!(WallMask::from_bits(8).rotated_cw(), WallMask::from_bits(1));
        assert_eq!(WallMask::from_bits(1).rotated_ccw(), WallMask::from_bits(8));
        assert_eq!(WallMask::from_bits(3).rotated_cw(), WallMask::from_bits(6));
        assert_eq!(WallMask::from_bits(9).rotated_cw(), WallMask::from_bits(3));
        assert_eq!(WallMask::ALL.rotated_cw(), WallMask::ALL);
    }

    #[test]
    fn wall_rotation_round_trips() {
        for bits in 0..16 {
            let mask = WallMask::from_bits(bits);
            let four_turns = mask.rotated_cw().rotated_cw().rotated_cw().rotated_cw();
            assert_eq!(four_turns, mask);
            assert_eq!(mask.rotated_cw().rotated_ccw(), mask);
            assert_eq!(mask.rotated_cw().count(), mask.count());
        }
    }

    #[test]
    fn orientation_cycles_clockwise() {
        let mut facing = Orientation::North;
        for expected in [
            Orientation::East,
            Orientation::South,
            Orientation::West,
            Orientation::North,
        ] {
            facing = facing.rotated_cw();
            assert_eq!(facing, expected);
        }
        assert_eq!(Orientation::West.rotated_ccw(), Orientation::South);
        assert_eq!(Orientation::North.rotated_ccw(), Orientation::West);
    }

    #[test]
    fn step_rejects_underflow() {
        assert_eq!(CellCoord::new(0, 0).step(Orientation::North), None);
        assert_eq!(CellCoord::new(0, 0).step(Orientation::West), None);
        assert_eq!(
            CellCoord::new(0, 0).step(Orientation::South),
            Some(CellCoord::new(1, 0))
        );
    }

    #[test]
    fn buff_keys_resolve_both_ways() {
        assert_eq!(BuffKind::from_key("buff_gold2"), Some(BuffKind::GoldMultiplier));
        assert_eq!(BuffKind::from_key("buff_unknown"), None);
        assert_eq!(BuffKind::StoneOutput.key(), "buff_stone");
    }

    #[test]
    fn unlock_cost_formulas_differ_by_unit_kind() {
        assert_eq!(UnitKind::Mine.unlock_cost(0, 20.0, 1.5), 20.0);
        assert_eq!(UnitKind::Mine.unlock_cost(1, 20.0, 1.5), 20.0);
        assert_eq!(UnitKind::Mine.unlock_cost(3, 20.0, 1.5), 80.0);
        assert_eq!(UnitKind::Converter.unlock_cost(0, 20.0, 1.5), 50.0);
        assert_eq!(UnitKind::Mine.unlock_cost(2, 15.0, 0.1), 16.0);
    }

    #[test]
    fn wallet_ledger_tracks_missing_entries() {
        let mut wallet = WalletLedger::new().with(Currency::Stone, 10.0);
        assert_eq!(wallet.balance(Currency::Stone), Some(10.0));
        assert_eq!(wallet.balance(Currency::Gold), None);
        wallet.adjust(Currency::Stone, -4.0);
        assert_eq!(wallet.balance(Currency::Stone), Some(6.0));
    }

    #[test]
    fn contract_types_round_trip_through_bincode() {
        assert_round_trip(&CellCoord::new(3, 7));
        assert_round_trip(&WallMask::from_bits(11));
        assert_round_trip(&ProductionHop {
            cell: CellCoord::new(1, 2),
            entry: Some(Orientation::West),
            exit: Orientation::North,
            currency: Currency::Gold,
        });
        assert_round_trip(&UnitTemplate::default());
        assert_round_trip(&TechNode::new(
            TechTrait::Efficient,
            UnitKey::new("mine"),
            0.25,
        ));
    }
}
