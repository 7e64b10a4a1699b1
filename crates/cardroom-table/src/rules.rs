//! The `GameRules` trait: what a card game plugs into a worker.
//!
//! The worker owns the loop; the game supplies the hooks. Anything a hook
//! returns is published on the table's channel from the worker's own task.

use cardroom_protocol::{Username, WireMessage};
use cardroom_session::Table;

/// Game progression for one table.
///
/// All hooks run on the worker task, one at a time, so `State` needs no
/// internal locking.
pub trait GameRules: Send + Sync + 'static {
    /// Per-table game state, owned by the worker task.
    type State: Send + 'static;

    /// Builds the initial state when the worker starts running.
    fn init(table: &Table) -> Self::State;

    /// A player sat down at the table.
    fn on_player_connected(_state: &mut Self::State, _username: &Username) -> Vec<WireMessage> {
        Vec::new()
    }

    /// A participant left the table while other players remain.
    fn on_player_disconnected(
        _state: &mut Self::State,
        _username: &Username,
    ) -> Vec<WireMessage> {
        Vec::new()
    }

    /// Advances the game by one step. Only called when the worker is
    /// configured with a non-zero step interval.
    ///
    /// # Errors
    /// An `Err` is fatal: the worker logs it and stops itself.
    fn step(_state: &mut Self::State) -> Result<Vec<WireMessage>, String> {
        Ok(Vec::new())
    }
}
