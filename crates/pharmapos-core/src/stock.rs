//! # Stock Transitions
//!
//! The arithmetic behind every ledger entry.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  kind      quantity   delta        after                                │
//! │  ──────    ────────   ─────        ─────                                │
//! │  IN        q ≥ 0      +q           max(0, before + q)                   │
//! │  OUT       q ≥ 0      -q           max(0, before - q)                   │
//! │  ADJUST    any sign   +q           max(0, before + q)                   │
//! │                                                                         │
//! │  `before` is the stored value (unset = 0). The same rule runs once for  │
//! │  the product and once, independently, for the lot when one is given.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::MovementKind;

/// Signed change a movement applies before the zero floor.
///
/// ADJUST is a signed delta: a physical count that found 4 units missing is
/// recorded as `-4`.
pub fn signed_delta(kind: MovementKind, quantity: i64) -> CoreResult<i64> {
    match kind {
        MovementKind::In | MovementKind::Out if quantity < 0 => Err(CoreError::InvalidQuantity {
            kind: kind.to_string(),
            quantity,
        }),
        MovementKind::In => Ok(quantity),
        MovementKind::Out => Ok(-quantity),
        MovementKind::Adjust => Ok(quantity),
    }
}

/// Before/after pair actually written to a product or lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransition {
    pub before: i64,
    pub after: i64,
}

impl StockTransition {
    /// Computes the transition for a stored value.
    pub fn compute(current: Option<i64>, kind: MovementKind, quantity: i64) -> CoreResult<Self> {
        let delta = signed_delta(kind, quantity)?;
        let before = current.unwrap_or(0);
        Ok(StockTransition {
            before,
            after: before.saturating_add(delta).max(0),
        })
    }

    /// Change actually applied after flooring (can be smaller than requested).
    #[inline]
    pub fn applied_delta(&self) -> i64 {
        self.after - self.before
    }

    /// True when the floor swallowed part of the requested decrease.
    #[inline]
    pub fn was_clamped(&self, kind: MovementKind, quantity: i64) -> bool {
        signed_delta(kind, quantity)
            .map(|d| d != self.applied_delta())
            .unwrap_or(false)
    }
}

/// Replays a sequence of movements from an empty shelf.
///
/// The floor applies at every step, exactly as the stored value evolves.
pub fn replay<I>(movements: I) -> CoreResult<i64>
where
    I: IntoIterator<Item = (MovementKind, i64)>,
{
    movements
        .into_iter()
        .try_fold(0i64, |stock, (kind, quantity)| {
            StockTransition::compute(Some(stock), kind, quantity).map(|t| t.after)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_in_and_out() {
        let t = StockTransition::compute(Some(10), MovementKind::In, 5).unwrap();
        assert_eq!((t.before, t.after), (10, 15));

        let t = StockTransition::compute(Some(10), MovementKind::Out, 3).unwrap();
        assert_eq!((t.before, t.after), (10, 7));
    }

    #[test]
    fn test_unset_stock_reads_as_zero() {
        let t = StockTransition::compute(None, MovementKind::In, 4).unwrap();
        assert_eq!((t.before, t.after), (0, 4));
    }

    #[test]
    fn test_out_floors_at_zero() {
        let t = StockTransition::compute(Some(2), MovementKind::Out, 5).unwrap();
        assert_eq!((t.before, t.after), (2, 0));
        assert_eq!(t.applied_delta(), -2);
        assert!(t.was_clamped(MovementKind::Out, 5));
    }

    #[test]
    fn test_adjust_is_signed() {
        let t = StockTransition::compute(Some(10), MovementKind::Adjust, -4).unwrap();
        assert_eq!(t.after, 6);
        let t = StockTransition::compute(Some(10), MovementKind::Adjust, 4).unwrap();
        assert_eq!(t.after, 14);
        let t = StockTransition::compute(Some(3), MovementKind::Adjust, -10).unwrap();
        assert_eq!(t.after, 0);
    }

    #[test]
    fn test_negative_magnitude_rejected() {
        let err = StockTransition::compute(Some(10), MovementKind::Out, -1).unwrap_err();
        assert!(matches!(err, CoreError::InvalidQuantity { quantity: -1, .. }));
        assert!(StockTransition::compute(Some(10), MovementKind::In, -1).is_err());
    }

    #[test]
    fn test_replay_floors_each_step() {
        // -5 on an empty shelf stays at 0, the later +3 is not eaten by it
        let stock = replay([
            (MovementKind::Out, 5),
            (MovementKind::In, 3),
            (MovementKind::Adjust, -1),
        ])
        .unwrap();
        assert_eq!(stock, 2);
    }

    fn movement() -> impl Strategy<Value = (MovementKind, i64)> {
        prop_oneof![
            (0i64..50).prop_map(|q| (MovementKind::In, q)),
            (0i64..50).prop_map(|q| (MovementKind::Out, q)),
            (-50i64..50).prop_map(|q| (MovementKind::Adjust, q)),
        ]
    }

    proptest! {
        #[test]
        fn prop_replay_never_negative(moves in prop::collection::vec(movement(), 0..64)) {
            prop_assert!(replay(moves).unwrap() >= 0);
        }

        #[test]
        fn prop_replay_matches_running_floor(moves in prop::collection::vec(movement(), 0..64)) {
            let mut running = 0i64;
            for (kind, q) in &moves {
                let delta = match kind {
                    MovementKind::Out => -q,
                    _ => *q,
                };
                running = (running + delta).max(0);
            }
            prop_assert_eq!(replay(moves).unwrap(), running);
        }
    }
}
