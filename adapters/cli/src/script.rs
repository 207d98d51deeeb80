//! Parsing of the textual action script accepted on the command line.

use anyhow::{bail, Context, Result};
use mineshaft_core::{BuffKind, CellCoord, Command, Rotation, TrackKind};

/// Parses a single action such as `rotate:1,2` into a command.
///
/// Returns `Ok(None)` for actions that are recognised but intentionally
/// skipped, such as unknown buff keys.
pub(crate) fn parse_action(action: &str) -> Result<Option<Command>> {
    let (verb, argument) = match action.split_once(':') {
        Some((verb, argument)) => (verb.trim(), Some(argument.trim())),
        None => (action.trim(), None),
    };

    let command = match (verb, argument) {
        ("unlock", None) => Command::UnlockRow,
        ("reveal", None) => Command::RevealRows,
        ("collect", None) => Command::CollectYield,
        ("refresh", None) => Command::Refresh,
        ("clear-buffs", None) => Command::ClearBuffs,
        ("rotate", Some(cell)) => Command::RotateCell {
            cell: parse_cell(cell)?,
            rotation: Rotation::Clockwise,
        },
        ("rotate-ccw", Some(cell)) => Command::RotateCell {
            cell: parse_cell(cell)?,
            rotation: Rotation::CounterClockwise,
        },
        ("clear", Some(cell)) => Command::ClearCellWalls {
            cell: parse_cell(cell)?,
        },
        ("place", Some(argument)) => {
            let (cell, track) = argument
                .rsplit_once(',')
                .with_context(|| format!("`{action}` needs a cell and a track"))?;
            Command::PlaceTrack {
                cell: parse_cell(cell)?,
                track: parse_track(track)?,
            }
        }
        ("swap", Some(argument)) => {
            let (first, second) = argument
                .split_once(';')
                .with_context(|| format!("`{action}` needs two cells separated by `;`"))?;
            Command::SwapCells {
                first: parse_cell(first)?,
                second: parse_cell(second)?,
            }
        }
        ("toggle", Some(row)) => Command::ToggleRowProducer {
            row: row
                .parse()
                .with_context(|| format!("invalid row `{row}` in `{action}`"))?,
        },
        ("buff", Some(key)) => match BuffKind::from_key(key) {
            Some(buff) => Command::AddBuff { buff },
            None => {
                tracing::warn!(key, "ignoring unknown buff");
                return Ok(None);
            }
        },
        _ => bail!("unrecognised action `{action}`"),
    };

    Ok(Some(command))
}

fn parse_cell(value: &str) -> Result<CellCoord> {
    let (row, column) = value
        .split_once(',')
        .with_context(|| format!("cell `{value}` must be written as `row,column`"))?;
    let row = row
        .trim()
        .parse()
        .with_context(|| format!("invalid row in cell `{value}`"))?;
    let column = column
        .trim()
        .parse()
        .with_context(|| format!("invalid column in cell `{value}`"))?;
    Ok(CellCoord::new(row, column))
}

fn parse_track(value: &str) -> Result<TrackKind> {
    let track = match value.trim() {
        "none" => TrackKind::None,
        "curve" => TrackKind::Curve,
        "straight" => TrackKind::Straight,
        "t" => TrackKind::T,
        "cross" => TrackKind::Cross,
        other => bail!("unknown track `{other}`"),
    };
    Ok(track)
}
