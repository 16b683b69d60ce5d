use crate::ml::models::{ClassProbability, Prediction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Coarse triage bucket derived from the predicted class label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
    Normal,
    Elevated,
    High,
}

impl RiskLevel {
    /// `Obesity_*` labels are high risk, `Overweight_*` elevated, anything
    /// else (normal or insufficient weight) normal.
    pub fn from_label(label: &str) -> Self {
        if label.contains("Obesity") {
            RiskLevel::High
        } else if label.contains("Overweight") {
            RiskLevel::Elevated
        } else {
            RiskLevel::Normal
        }
    }
}

/// Result of one diagnosis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub label: String,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub probabilities: Vec<ClassProbability>,
}

impl Diagnosis {
    pub fn from_prediction(prediction: Prediction) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            risk_level: RiskLevel::from_label(&prediction.label),
            label: prediction.label,
            confidence: prediction.confidence,
            probabilities: prediction.probabilities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_from_label() {
        assert_eq!(RiskLevel::from_label("Obesity_Type_III"), RiskLevel::High);
        assert_eq!(RiskLevel::from_label("Overweight_Level_I"), RiskLevel::Elevated);
        assert_eq!(RiskLevel::from_label("Normal_Weight"), RiskLevel::Normal);
        assert_eq!(RiskLevel::from_label("Insufficient_Weight"), RiskLevel::Normal);
    }

    #[test]
    fn test_diagnosis_from_prediction() {
        let prediction = Prediction {
            label: "Overweight_Level_II".to_string(),
            index: 1,
            confidence: 0.6,
            probabilities: vec![
                ClassProbability::new("Normal_Weight", 0.4),
                ClassProbability::new("Overweight_Level_II", 0.6),
            ],
        };

        let diagnosis = Diagnosis::from_prediction(prediction);
        assert_eq!(diagnosis.risk_level, RiskLevel::Elevated);
        assert_eq!(diagnosis.label, "Overweight_Level_II");
        assert_eq!(diagnosis.probabilities.len(), 2);
        assert_eq!(RiskLevel::Elevated.to_string(), "elevated");
    }
}
