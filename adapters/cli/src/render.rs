//! Plain-text rendering of a grid unit.

use std::fmt::Write as _;

use mineshaft_core::{Currency, Wallet, YieldTotals};
use mineshaft_world::{query, Cell, GridUnit};

/// Box-drawing glyph for every open-side mask, indexed by wall bits.
const TRACK_GLYPHS: [char; 16] = [
    ' ', '╵', '╶', '└', '╷', '│', '┌', '├', '╴', '┘', '─', '┴', '┐', '┤', '┬', '┼',
];

const LOCKED: char = '▒';

fn currency_glyph(currency: Currency) -> char {
    match currency {
        Currency::Stone => 's',
        Currency::Copper => 'c',
        Currency::Iron => 'i',
        Currency::Gold => 'g',
    }
}

fn cell_glyph(unit: &GridUnit, cell: &Cell) -> char {
    if cell.is_repo() {
        return 'R';
    }
    if cell.is_producer() {
        let glyph = currency_glyph(cell.currency());
        return if unit.active_producers().contains(&cell.coord()) {
            glyph.to_ascii_uppercase()
        } else {
            glyph
        };
    }
    TRACK_GLYPHS[usize::from(cell.wall_orientation().bits())]
}

/// Draws one line per row. Locked rows are shaded out.
pub(crate) fn grid(unit: &GridUnit) -> String {
    let mut out = String::new();
    for (index, row) in unit.rows().iter().enumerate() {
        let _ = write!(out, "{index:>3} ");
        for cell in row.cells() {
            let glyph = if row.is_unlocked() {
                cell_glyph(unit, cell)
            } else {
                LOCKED
            };
            out.push(glyph);
        }
        if !row.is_unlocked() {
            let _ = write!(
                out,
                "  unlock: {} {:?}",
                row.unlock_cost(),
                row.unlock_currency()
            );
        }
        out.push('\n');
    }
    out
}

/// Summarises unlock progress, yield and the wallet.
pub(crate) fn summary(unit: &GridUnit, totals: &YieldTotals, wallet: &dyn Wallet) -> String {
    let mut out = String::new();
    let level = query::unlock_level(unit).map_or_else(|| "-".to_owned(), |row| row.to_string());
    let _ = writeln!(
        out,
        "unlock level {level}, producers {}/{} active ({:.0}%)",
        unit.active_producers().len(),
        unit.unlocked_producers(),
        query::active_producer_percent(unit) * 100.0
    );
    if !unit.buffs().is_empty() {
        let keys: Vec<&str> = unit.buffs().iter().map(|buff| buff.key()).collect();
        let _ = writeln!(out, "buffs {}", keys.join(", "));
    }
    for (currency, amount) in totals {
        let _ = writeln!(out, "yield {currency:?}: {amount:+.2}");
    }
    for currency in [
        Currency::Stone,
        Currency::Copper,
        Currency::Iron,
        Currency::Gold,
    ] {
        if let Some(balance) = wallet.balance(currency) {
            let _ = writeln!(out, "wallet {currency:?}: {balance:.2}");
        }
    }
    out
}
