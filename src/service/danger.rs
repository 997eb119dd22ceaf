use serde::{Deserialize, Serialize};

use crate::service::classifier::Classification;
use crate::types::vitals::FeatureVector;

/// Hard vital limits. A reading crossing any of them is dangerous
/// regardless of model output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DangerThresholds {
    /// Danger when heart rate is strictly above.
    pub max_heart_rate: u32,
    pub max_systolic: u32,
    pub max_diastolic: u32,
    /// Danger when SpO2 is strictly below.
    pub min_spo2: u32,
}

impl Default for DangerThresholds {
    fn default() -> Self {
        Self {
            max_heart_rate: 120,
            max_systolic: 160,
            max_diastolic: 100,
            min_spo2: 92,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerTrigger {
    Tachycardia,
    Hypertrophy,
    HighCholesterol,
    HeartRate,
    Systolic,
    Diastolic,
    OxygenSaturation,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DangerPolicy {
    thresholds: DangerThresholds,
}

impl DangerPolicy {
    pub fn new(thresholds: DangerThresholds) -> Self {
        Self { thresholds }
    }

    /// Every condition that fired, in a fixed order.
    pub fn triggers(&self, verdicts: &Classification, vitals: &FeatureVector) -> Vec<DangerTrigger> {
        let t = &self.thresholds;
        [
            (verdicts.tachycardia.verdict, DangerTrigger::Tachycardia),
            (verdicts.hypertrophy.verdict, DangerTrigger::Hypertrophy),
            (verdicts.high_cholesterol.verdict, DangerTrigger::HighCholesterol),
            (vitals.heart_rate > t.max_heart_rate, DangerTrigger::HeartRate),
            (vitals.systolic > t.max_systolic, DangerTrigger::Systolic),
            (vitals.diastolic > t.max_diastolic, DangerTrigger::Diastolic),
            (vitals.spo2 < t.min_spo2, DangerTrigger::OxygenSaturation),
        ]
        .into_iter()
        .filter_map(|(fired, trigger)| fired.then_some(trigger))
        .collect()
    }

    pub fn is_dangerous(&self, verdicts: &Classification, vitals: &FeatureVector) -> bool {
        !self.triggers(verdicts, vitals).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::classifier::ModelScore;

    fn verdicts(t: bool, h: bool, c: bool) -> Classification {
        let s = |verdict| ModelScore {
            verdict,
            probability: None,
        };
        Classification {
            tachycardia: s(t),
            hypertrophy: s(h),
            high_cholesterol: s(c),
        }
    }

    fn vitals(heart_rate: u32, systolic: u32, diastolic: u32, spo2: u32) -> FeatureVector {
        FeatureVector {
            heart_rate,
            hrv: 30,
            spo2,
            systolic,
            diastolic,
            body_temperature: 36.6,
        }
    }

    const CALM: (u32, u32, u32, u32) = (70, 117, 73, 98);

    fn calm() -> FeatureVector {
        vitals(CALM.0, CALM.1, CALM.2, CALM.3)
    }

    #[test]
    fn calm_reading_is_safe() {
        let policy = DangerPolicy::default();
        assert!(!policy.is_dangerous(&verdicts(false, false, false), &calm()));
    }

    #[test]
    fn any_classifier_verdict_is_dangerous() {
        let policy = DangerPolicy::default();
        for (t, h, c) in [(true, false, false), (false, true, false), (false, false, true)] {
            assert!(policy.is_dangerous(&verdicts(t, h, c), &calm()));
        }
    }

    #[test]
    fn threshold_boundaries() {
        let policy = DangerPolicy::default();
        let none = verdicts(false, false, false);

        assert!(!policy.is_dangerous(&none, &vitals(120, CALM.1, CALM.2, CALM.3)));
        assert!(policy.is_dangerous(&none, &vitals(121, CALM.1, CALM.2, CALM.3)));

        assert!(!policy.is_dangerous(&none, &vitals(CALM.0, 160, CALM.2, CALM.3)));
        assert!(policy.is_dangerous(&none, &vitals(CALM.0, 161, CALM.2, CALM.3)));

        assert!(!policy.is_dangerous(&none, &vitals(CALM.0, CALM.1, 100, CALM.3)));
        assert!(policy.is_dangerous(&none, &vitals(CALM.0, CALM.1, 101, CALM.3)));

        assert!(!policy.is_dangerous(&none, &vitals(CALM.0, CALM.1, CALM.2, 92)));
        assert!(policy.is_dangerous(&none, &vitals(CALM.0, CALM.1, CALM.2, 91)));
    }

    #[test]
    fn triggers_report_every_condition() {
        let policy = DangerPolicy::default();
        let fired = policy.triggers(&verdicts(true, false, true), &vitals(150, 170, 77, 90));
        assert_eq!(
            fired,
            vec![
                DangerTrigger::Tachycardia,
                DangerTrigger::HighCholesterol,
                DangerTrigger::HeartRate,
                DangerTrigger::Systolic,
                DangerTrigger::OxygenSaturation,
            ]
        );
    }

    #[test]
    fn custom_thresholds_apply() {
        let policy = DangerPolicy::new(DangerThresholds {
            max_heart_rate: 100,
            ..DangerThresholds::default()
        });
        assert!(policy.is_dangerous(&verdicts(false, false, false), &vitals(101, 117, 73, 98)));
    }
}
