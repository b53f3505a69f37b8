use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::extractor::{RunnerProfile, Sex};
use crate::hms::parse_hms;

/// Fixed-shape feature record fed to the point predictor.
///
/// Derived, never user-supplied: `sex_encoded` is 1 for male and 0 for
/// female, `pace_seconds_per_km` is the 5 km time divided by five.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub age: i64,
    pub sex_encoded: u8,
    pub pace_seconds_per_km: f64,
}

impl FeatureRecord {
    /// Derive features from a validated profile. `None` when the 5 km time
    /// does not parse; the caller reports that as a time-format failure.
    pub fn from_profile(profile: &RunnerProfile) -> Option<Self> {
        let total_seconds = parse_hms(&profile.five_km_time)?;
        Some(Self {
            age: profile.age,
            sex_encoded: if profile.sex == Sex::Male { 1 } else { 0 },
            pace_seconds_per_km: f64::from(total_seconds) / 5.0,
        })
    }
}

/// A pre-trained model mapping one feature record to a predicted
/// half-marathon time in seconds. Trained outside this crate.
pub trait PointPredictor: Send + Sync {
    fn name(&self) -> &str;

    fn predict(&self, features: &FeatureRecord) -> Result<f64>;
}

/// Linear regression coefficients, loaded from a JSON file produced by the
/// offline training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub age: f64,
    pub sex_encoded: f64,
    pub pace_seconds_per_km: f64,
}

impl LinearModel {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read model file: {}", path.as_ref().display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse model file: {}", path.as_ref().display()))
    }
}

impl Default for LinearModel {
    /// Coefficients from the offline fit on the public half-marathon
    /// dataset. Used when no model file is configured so the binary runs
    /// out of the box.
    fn default() -> Self {
        Self {
            intercept: 594.0,
            age: 4.1,
            sex_encoded: -212.0,
            pace_seconds_per_km: 20.9,
        }
    }
}

impl PointPredictor for LinearModel {
    fn name(&self) -> &str {
        "linear"
    }

    fn predict(&self, features: &FeatureRecord) -> Result<f64> {
        let prediction = self.intercept
            + self.age * features.age as f64
            + self.sex_encoded * f64::from(features.sex_encoded)
            + self.pace_seconds_per_km * features.pace_seconds_per_km;
        if !prediction.is_finite() || prediction < 0.0 {
            bail!("model produced an unusable prediction: {}", prediction);
        }
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(age: i64, sex: Sex, time: &str) -> RunnerProfile {
        RunnerProfile {
            age,
            sex,
            five_km_time: time.to_string(),
        }
    }

    #[test]
    fn derives_features_from_profile() {
        let features = FeatureRecord::from_profile(&profile(29, Sex::Male, "25:30")).unwrap();
        assert_eq!(
            features,
            FeatureRecord {
                age: 29,
                sex_encoded: 1,
                pace_seconds_per_km: 306.0
            }
        );
    }

    #[test]
    fn female_encodes_as_zero() {
        let features = FeatureRecord::from_profile(&profile(35, Sex::Female, "30:00")).unwrap();
        assert_eq!(features.sex_encoded, 0);
        assert_eq!(features.pace_seconds_per_km, 360.0);
    }

    #[test]
    fn unparseable_time_yields_no_features() {
        assert!(FeatureRecord::from_profile(&profile(29, Sex::Male, "fast")).is_none());
    }

    #[test]
    fn linear_model_is_a_dot_product() {
        let model = LinearModel {
            intercept: 100.0,
            age: 2.0,
            sex_encoded: -50.0,
            pace_seconds_per_km: 20.0,
        };
        let features = FeatureRecord {
            age: 30,
            sex_encoded: 1,
            pace_seconds_per_km: 300.0,
        };
        // 100 + 60 - 50 + 6000
        assert_eq!(model.predict(&features).unwrap(), 6110.0);
    }

    #[test]
    fn negative_prediction_is_an_error() {
        let model = LinearModel {
            intercept: -10_000.0,
            age: 0.0,
            sex_encoded: 0.0,
            pace_seconds_per_km: 0.0,
        };
        let features = FeatureRecord {
            age: 30,
            sex_encoded: 1,
            pace_seconds_per_km: 300.0,
        };
        assert!(model.predict(&features).is_err());
    }

    #[test]
    fn default_model_predicts_a_plausible_half_marathon() {
        let features = FeatureRecord::from_profile(&profile(29, Sex::Male, "25:30")).unwrap();
        let seconds = LinearModel::default().predict(&features).unwrap();
        // A 25:30 5k runner should land somewhere between 1h30 and 2h30.
        assert!(seconds > 5400.0 && seconds < 9000.0, "got {}", seconds);
    }
}
