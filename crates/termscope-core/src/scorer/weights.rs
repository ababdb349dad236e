//! Aggregation weights for `overall_risk` and their profile shift.

use serde::{Deserialize, Serialize};

use crate::profile::RiskTolerance;
use crate::types::{clamp_score, Subscores, SCORE_MAX};

/// Weights of the four subscores in `overall_risk`. Always sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoringWeights {
    pub data: f64,
    pub termination: f64,
    pub user_rights: f64,
    pub readability: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            data: 0.35,
            termination: 0.25,
            user_rights: 0.25,
            readability: 0.15,
        }
    }
}

impl ScoringWeights {
    /// `clamp(0, 10, w_d·data + w_t·termination + w_r·(10 − rights) + w_read·readability)`
    pub fn combine(&self, s: &Subscores) -> f64 {
        clamp_score(
            self.data * s.data_risk
                + self.termination * s.termination_risk
                + self.user_rights * (SCORE_MAX - s.user_rights_score)
                + self.readability * s.readability_score,
        )
    }

    pub fn sum(&self) -> f64 {
        self.data + self.termination + self.user_rights + self.readability
    }

    /// Shift weight toward data and termination risk for cautious profiles
    /// and away from them for tolerant ones.
    ///
    /// The shift is split evenly: half added to each of data/termination and
    /// half removed from each of rights/readability, so the sum is unchanged.
    /// Its magnitude is limited by `max_shift` and by how far any weight can
    /// move before leaving `[weight_floor, weight_ceiling]`.
    pub fn shifted(
        &self,
        tolerance: RiskTolerance,
        concerns_matched: usize,
        config: &ScoringConfig,
    ) -> ScoringWeights {
        let tolerance_shift = match tolerance {
            RiskTolerance::Low => config.tolerance_shift,
            RiskTolerance::Medium => 0.0,
            RiskTolerance::High => -config.tolerance_shift,
        };
        let requested = (tolerance_shift + config.concern_shift * concerns_matched as f64)
            .clamp(-config.max_shift, config.max_shift);

        let half = requested / 2.0;
        let room = if half >= 0.0 {
            [
                config.weight_ceiling - self.data,
                config.weight_ceiling - self.termination,
                self.user_rights - config.weight_floor,
                self.readability - config.weight_floor,
            ]
        } else {
            [
                self.data - config.weight_floor,
                self.termination - config.weight_floor,
                config.weight_ceiling - self.user_rights,
                config.weight_ceiling - self.readability,
            ]
        };
        let limit = room.iter().copied().fold(f64::INFINITY, f64::min).max(0.0);
        let delta = half.signum() * half.abs().min(limit);

        ScoringWeights {
            data: self.data + delta,
            termination: self.termination + delta,
            user_rights: self.user_rights - delta,
            readability: self.readability - delta,
        }
    }
}

/// Profile-shift parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Shift applied for a low (positive) or high (negative) risk tolerance
    pub tolerance_shift: f64,

    /// Additional shift per profile data concern present in the document
    pub concern_shift: f64,

    pub max_shift: f64,
    pub weight_ceiling: f64,
    pub weight_floor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tolerance_shift: 0.05,
            concern_shift: 0.025,
            max_shift: 0.10,
            weight_ceiling: 0.45,
            weight_floor: 0.05,
        }
    }
}
