use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionStatus {
    #[serde(rename = "No Target")]
    NoTarget,
    #[serde(rename = "Moving Target")]
    MovingTarget,
    #[serde(rename = "Static Target")]
    StaticTarget,
    #[serde(rename = "Moving and Static Targets")]
    MovingAndStaticTargets,
    Unknown,
    Error,
    #[serde(rename = "No Data")]
    NoData,
}

impl DetectionStatus {
    /// Maps the radar's target-state byte. Anything outside 0..=3 is `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::NoTarget,
            1 => Self::MovingTarget,
            2 => Self::StaticTarget,
            3 => Self::MovingAndStaticTargets,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoTarget => "No Target",
            Self::MovingTarget => "Moving Target",
            Self::StaticTarget => "Static Target",
            Self::MovingAndStaticTargets => "Moving and Static Targets",
            Self::Unknown => "Unknown",
            Self::Error => "Error",
            Self::NoData => "No Data",
        }
    }
}

impl std::fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One presence/distance sample. Numeric fields are zero when the radar had
/// nothing to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub detection_status: DetectionStatus,
    pub moving_distance_cm: i64,
    pub moving_energy: i64,
    pub static_distance_cm: i64,
    pub static_energy: i64,
    pub overall_distance_cm: i64,
}

impl Reading {
    pub const FIELDS: [&'static str; 6] = [
        "detection_status",
        "moving_distance_cm",
        "moving_energy",
        "static_distance_cm",
        "static_energy",
        "overall_distance_cm",
    ];

    pub fn zeroed(detection_status: DetectionStatus) -> Self {
        Self {
            detection_status,
            moving_distance_cm: 0,
            moving_energy: 0,
            static_distance_cm: 0,
            static_energy: 0,
            overall_distance_cm: 0,
        }
    }

    pub fn error() -> Self { Self::zeroed(DetectionStatus::Error) }

    pub fn no_data() -> Self { Self::zeroed(DetectionStatus::NoData) }

    /// Builds a reading from a standard-mode frame:
    /// `(type, moving_dist, moving_energy, static_dist, static_energy, overall_dist)`.
    /// Returns None when the frame does not have exactly six elements.
    pub fn from_frame(frame: &[i64]) -> Option<Self> {
        let &[kind, md, me, sd, se, od] = frame else { return None; };
        Some(Self {
            detection_status: DetectionStatus::from_code(kind),
            moving_distance_cm: md,
            moving_energy: me,
            static_distance_cm: sd,
            static_energy: se,
            overall_distance_cm: od,
        })
    }

    /// Named-field mapping handed to the host framework.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("detection_status".into(), Value::from(self.detection_status.as_str()));
        m.insert("moving_distance_cm".into(), Value::from(self.moving_distance_cm));
        m.insert("moving_energy".into(), Value::from(self.moving_energy));
        m.insert("static_distance_cm".into(), Value::from(self.static_distance_cm));
        m.insert("static_energy".into(), Value::from(self.static_energy));
        m.insert("overall_distance_cm".into(), Value::from(self.overall_distance_cm));
        m
    }

    /// Same line the bench script prints for a standard-mode frame.
    pub fn summary(&self) -> String {
        format!(
            "Detection: {}, Moving: {} cm (Energy: {}), Static: {} cm (Energy: {}), Overall: {} cm",
            self.detection_status,
            self.moving_distance_cm,
            self.moving_energy,
            self.static_distance_cm,
            self.static_energy,
            self.overall_distance_cm,
        )
    }
}
