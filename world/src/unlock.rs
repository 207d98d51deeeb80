//! Row unlock economy and reveal bookkeeping.

use mineshaft_core::{Event, UnitKind, UnlockRejection, Wallet};

use crate::GridUnit;

impl GridUnit {
    /// Index of the highest contiguous unlocked row, `None` when nothing is unlocked.
    #[must_use]
    pub fn unlock_level(&self) -> Option<u32> {
        self.unlocked_row_count().checked_sub(1)
    }

    fn unlocked_row_count(&self) -> u32 {
        let count = self.rows.iter().take_while(|row| row.unlocked).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Next sequential locked row, if any remain.
    fn next_locked_row(&self) -> Option<u32> {
        let next = self.unlocked_row_count();
        (usize::try_from(next).ok()? < self.rows.len()).then_some(next)
    }

    /// Reports whether the wallet covers the next locked row's cost.
    ///
    /// A wallet without an entry for the row's currency counts as empty.
    #[must_use]
    pub fn can_unlock(&self, wallet: &dyn Wallet) -> bool {
        self.check_unlock(wallet).is_ok()
    }

    fn check_unlock(&self, wallet: &dyn Wallet) -> Result<u32, UnlockRejection> {
        let row = self
            .next_locked_row()
            .ok_or(UnlockRejection::FullyUnlocked)?;
        let state = &self.rows[row as usize];
        let balance = wallet.balance(state.unlock_currency).unwrap_or(0.0);
        if balance < state.unlock_cost {
            return Err(UnlockRejection::InsufficientFunds {
                currency: state.unlock_currency,
                cost: state.unlock_cost,
                balance,
            });
        }
        Ok(row)
    }

    /// Buys the next locked row.
    ///
    /// Returns `false` and emits [`Event::UnlockRejected`] without touching the
    /// wallet when the unit is fully unlocked or the wallet cannot pay.
    pub fn unlock_row(&mut self, wallet: &mut dyn Wallet, out_events: &mut Vec<Event>) -> bool {
        let row = match self.check_unlock(&*wallet) {
            Ok(row) => row,
            Err(reason) => {
                tracing::debug!(unit = self.key.as_str(), ?reason, "unlock rejected");
                out_events.push(Event::UnlockRejected { reason });
                return false;
            }
        };

        let state = &self.rows[row as usize];
        let (cost, currency) = (state.unlock_cost, state.unlock_currency);
        if cost > 0.0 {
            wallet.adjust(currency, -cost);
        }
        self.commit_unlock(cost, out_events).is_some()
    }

    /// Unlocks the next row after payment has been settled, recording `cost`
    /// as the price paid.
    ///
    /// Strips tracks for pickup when configured, counts the row's producers
    /// and recomputes the network.
    pub(crate) fn commit_unlock(&mut self, cost: f32, out_events: &mut Vec<Event>) -> Option<u32> {
        let row = self.next_locked_row()?;
        let pickup = self.config.pickup_tracks_on_row_unlock;
        let state = self.rows.get_mut(row as usize)?;
        state.unlocked = true;
        state.unlock_cost = cost;
        out_events.push(Event::RowUnlocked {
            row,
            cost,
            currency: state.unlock_currency,
        });

        let mut producers = 0;
        for cell in &mut state.cells {
            if cell.producer {
                producers += 1;
                continue;
            }
            if !pickup || cell.repo {
                continue;
            }
            if let Some(track) = cell.strip_track() {
                out_events.push(Event::TrackPickedUp {
                    cell: cell.coord,
                    track,
                });
            }
        }
        self.unlocked_producers += producers;

        tracing::debug!(unit = self.key.as_str(), row, cost, producers, "row unlocked");
        let _ = self.calculate_yield(out_events);
        Some(row)
    }

    /// Reports whether every row is unlocked.
    ///
    /// A fully unlocked mine is expected to have every producer active; a
    /// mismatch is logged as a modeling problem.
    #[must_use]
    pub fn is_fully_unlocked(&self) -> bool {
        let fully_unlocked = self.next_locked_row().is_none();
        if fully_unlocked && self.kind == UnitKind::Mine {
            let active = self.active_producers.len();
            if u32::try_from(active).ok() != Some(self.total_producers) {
                tracing::warn!(
                    unit = self.key.as_str(),
                    active,
                    total = self.total_producers,
                    "fully unlocked mine has inactive producers"
                );
            }
        }
        fully_unlocked
    }

    /// Marks every unlocked row as revealed.
    pub fn reveal_rows(&mut self, out_events: &mut Vec<Event>) {
        for (index, row) in self.rows.iter_mut().enumerate() {
            if !row.unlocked || row.revealed {
                continue;
            }
            row.revealed = true;
            out_events.push(Event::RowRevealed {
                row: u32::try_from(index).unwrap_or(u32::MAX),
            });
        }
    }

    /// Recounts producers living in unlocked rows.
    pub(crate) fn recount_unlocked_producers(&mut self) {
        let count = self
            .rows
            .iter()
            .filter(|row| row.unlocked)
            .flat_map(|row| row.cells.iter())
            .filter(|cell| cell.producer)
            .count();
        self.unlocked_producers = u32::try_from(count).unwrap_or(u32::MAX);
    }
}
