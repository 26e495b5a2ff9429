use super::Features;
use crate::envs::{
    MountainCarState, Throttle, POSITION_MAX, POSITION_MIN, VELOCITY_MAX, VELOCITY_MIN,
};
use enum_map::Enum;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Configuration of a [`TileCoder`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoderConfig {
    /// Number of offset tilings; also the number of active features.
    pub num_tilings: usize,
    /// Number of tile widths spanning each state dimension.
    pub tiles_per_dim: usize,
}

impl Default for TileCoderConfig {
    fn default() -> Self {
        Self {
            num_tilings: 8,
            tiles_per_dim: 8,
        }
    }
}

/// Grid tile coding of Mountain Car state-action pairs.
///
/// The (position, velocity) rectangle is covered by `num_tilings` grids, each offset from the
/// last by a fraction of a tile. Offsets along dimension `k` of tiling `t` are
/// `(t * (2k + 1) mod num_tilings) / num_tilings` tile widths, the asymmetric displacement
/// recommended by Sutton & Barto (2018), Section 9.5.4.
/// The offset grids need one extra tile per dimension to cover the whole rectangle.
///
/// Each action has its own block of tiles. Exactly `num_tilings` features are 1; the rest are 0.
/// Tile indices are computed directly so there are no hash collisions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoder {
    num_tilings: usize,
    tiles_per_dim: usize,
}

impl TileCoder {
    pub const fn new(config: TileCoderConfig) -> Self {
        Self {
            num_tilings: config.num_tilings,
            tiles_per_dim: config.tiles_per_dim,
        }
    }

    /// Tiles along one dimension of a single tiling.
    const fn width(&self) -> usize {
        self.tiles_per_dim + 1
    }

    /// Number of features belonging to one action.
    const fn action_block_size(&self) -> usize {
        self.num_tilings * self.width() * self.width()
    }

    /// Scale a value from `[low, high]` to `[0, tiles_per_dim]`.
    #[allow(clippy::cast_precision_loss)]
    fn scale(&self, value: f64, low: f64, high: f64) -> f64 {
        ((value - low) / (high - low)).clamp(0.0, 1.0) * self.tiles_per_dim as f64
    }

    /// Indices of the active (non-zero) features, one per tiling.
    pub fn active_indices(
        &self,
        state: &MountainCarState,
        action: Throttle,
    ) -> impl Iterator<Item = usize> {
        let scaled = [
            self.scale(state.position, POSITION_MIN, POSITION_MAX),
            self.scale(state.velocity, VELOCITY_MIN, VELOCITY_MAX),
        ];
        let width = self.width();
        let num_tilings = self.num_tilings;
        let action_offset = action.into_usize() * self.action_block_size();
        (0..num_tilings).map(move |tiling| {
            let mut index = 0;
            for (k, x) in scaled.iter().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let offset = ((tiling * (2 * k + 1)) % num_tilings) as f64 / num_tilings as f64;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let coord = ((x + offset).floor() as usize).min(width - 1);
                index = index * width + coord;
            }
            action_offset + tiling * width * width + index
        })
    }
}

impl Default for TileCoder {
    fn default() -> Self {
        Self::new(TileCoderConfig::default())
    }
}

impl Features<MountainCarState, Throttle> for TileCoder {
    fn dimension(&self) -> usize {
        self.action_block_size() * Throttle::LENGTH
    }

    fn feature(&self, state: &MountainCarState, action: &Throttle) -> Array1<f64> {
        let mut phi = Array1::zeros(self.dimension());
        for i in self.active_indices(state, *action) {
            phi[i] = 1.0;
        }
        phi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn active(coder: &TileCoder, state: MountainCarState, action: Throttle) -> BTreeSet<usize> {
        coder.active_indices(&state, action).collect()
    }

    #[test]
    fn dimension() {
        let coder = TileCoder::default();
        assert_eq!(coder.dimension(), 8 * 9 * 9 * 3);
    }

    #[test]
    fn one_active_feature_per_tiling() {
        let coder = TileCoder::default();
        let corners = [
            MountainCarState::new(POSITION_MIN, VELOCITY_MIN),
            MountainCarState::new(POSITION_MAX, VELOCITY_MAX),
            MountainCarState::new(-0.5, 0.0),
            MountainCarState::new(0.1, -0.03),
        ];
        for state in corners {
            let phi = coder.feature(&state, &Throttle::Forward);
            assert_eq!(phi.len(), coder.dimension());
            assert_eq!(phi.sum(), 8.0);
            assert_eq!(active(&coder, state, Throttle::Forward).len(), 8);
        }
    }

    #[test]
    fn actions_use_disjoint_features() {
        let coder = TileCoder::default();
        let state = MountainCarState::new(-0.3, 0.01);
        let reverse = active(&coder, state, Throttle::Reverse);
        let forward = active(&coder, state, Throttle::Forward);
        assert!(reverse.is_disjoint(&forward));
    }

    #[test]
    fn nearby_states_share_features() {
        let coder = TileCoder::default();
        let a = active(&coder, MountainCarState::new(-0.5, 0.0), Throttle::Neutral);
        let b = active(&coder, MountainCarState::new(-0.501, 0.0001), Throttle::Neutral);
        assert!(a.intersection(&b).count() >= 6);
    }

    #[test]
    fn distant_states_share_no_features() {
        let coder = TileCoder::default();
        let a = active(&coder, MountainCarState::new(POSITION_MIN, 0.0), Throttle::Neutral);
        let b = active(&coder, MountainCarState::new(POSITION_MAX, 0.0), Throttle::Neutral);
        assert!(a.is_disjoint(&b));
    }
}
