use serde::{Deserialize, Serialize};
use std::fmt;

/// How far a reading sits from the normal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Danger,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Normal => write!(f, "normal"),
            Severity::Warning => write!(f, "warning"),
            Severity::Danger => write!(f, "danger"),
        }
    }
}

/// Clinical band a glucose level (mg/dL) falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseStatus {
    SevereHypoglycemia,
    Hypoglycemia,
    Normal,
    MildHyperglycemia,
    SevereHyperglycemia,
}

impl GlucoseStatus {
    pub fn classify(level: f64) -> Self {
        if level < 55.0 {
            GlucoseStatus::SevereHypoglycemia
        } else if level < 70.0 {
            GlucoseStatus::Hypoglycemia
        } else if level <= 140.0 {
            GlucoseStatus::Normal
        } else if level <= 180.0 {
            GlucoseStatus::MildHyperglycemia
        } else {
            GlucoseStatus::SevereHyperglycemia
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GlucoseStatus::SevereHypoglycemia => "Peligro (Hipoglucemia Severa)",
            GlucoseStatus::Hypoglycemia => "Riesgo (Hipoglucemia)",
            GlucoseStatus::Normal => "Normal",
            GlucoseStatus::MildHyperglycemia => "Riesgo (Hiperglucemia Leve)",
            GlucoseStatus::SevereHyperglycemia => "Peligro (Hiperglucemia Severa)",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            GlucoseStatus::Normal => Severity::Normal,
            GlucoseStatus::Hypoglycemia | GlucoseStatus::MildHyperglycemia => Severity::Warning,
            GlucoseStatus::SevereHypoglycemia | GlucoseStatus::SevereHyperglycemia => {
                Severity::Danger
            }
        }
    }
}

impl fmt::Display for GlucoseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_band_edges() {
        assert_eq!(GlucoseStatus::classify(54.9), GlucoseStatus::SevereHypoglycemia);
        assert_eq!(GlucoseStatus::classify(55.0), GlucoseStatus::Hypoglycemia);
        assert_eq!(GlucoseStatus::classify(69.9), GlucoseStatus::Hypoglycemia);
        assert_eq!(GlucoseStatus::classify(70.0), GlucoseStatus::Normal);
        assert_eq!(GlucoseStatus::classify(140.0), GlucoseStatus::Normal);
        assert_eq!(GlucoseStatus::classify(140.1), GlucoseStatus::MildHyperglycemia);
        assert_eq!(GlucoseStatus::classify(180.0), GlucoseStatus::MildHyperglycemia);
        assert_eq!(GlucoseStatus::classify(181.0), GlucoseStatus::SevereHyperglycemia);
    }

    #[test]
    fn test_labels_and_severity() {
        let normal = GlucoseStatus::classify(120.0);
        assert_eq!(normal.label(), "Normal");
        assert_eq!(normal.severity(), Severity::Normal);

        let low = GlucoseStatus::classify(40.0);
        assert_eq!(low.label(), "Peligro (Hipoglucemia Severa)");
        assert_eq!(low.severity(), Severity::Danger);

        let high = GlucoseStatus::classify(150.0);
        assert_eq!(format!("{}", high), "Riesgo (Hiperglucemia Leve)");
        assert_eq!(high.severity(), Severity::Warning);
    }

    #[test]
    fn test_severity_json() {
        let json = serde_json::to_string(&Severity::Danger).unwrap();
        assert_eq!(json, "\"danger\"");
    }
}
