//! Value types shared by the diagnosis lifecycle and the remote service.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

/// Problem area picked on the first step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Engine,
    Brakes,
    Electrical,
    Transmission,
    Tires,
    /// Used when the category step is skipped.
    #[default]
    Other,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 6] = [
        Category::Engine,
        Category::Brakes,
        Category::Electrical,
        Category::Transmission,
        Category::Tires,
        Category::Other,
    ];

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Category::Engine => "Engine",
            Category::Brakes => "Brakes",
            Category::Electrical => "Electrical",
            Category::Transmission => "Transmission",
            Category::Tires => "Tires",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A captured voice note: where the audio lives and how long it is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceRecording {
    pub asset: PathBuf,
    pub duration_secs: u32,
}

/// Reference to a local image file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhotoRef(pub PathBuf);

impl PhotoRef {
    /// File name used for display and multipart uploads.
    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".into())
    }
}

impl From<&str> for PhotoRef {
    fn from(s: &str) -> Self {
        PhotoRef(PathBuf::from(s))
    }
}

/// Vehicle stored on the caller's account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedVehicle {
    pub id: String,
    #[serde(default)]
    pub year: Option<u16>,
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub mileage_km: Option<u32>,
}

impl SavedVehicle {
    /// One-line label such as `2017 Toyota Corolla`.
    pub fn label(&self) -> String {
        match self.year {
            Some(y) => format!("{} {} {}", y, self.make, self.model),
            None => format!("{} {}", self.make, self.model),
        }
    }
}

/// Manually entered vehicle attributes; every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualVehicle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage_km: Option<u32>,
}

impl ManualVehicle {
    /// True when no field has been filled in.
    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.make.is_none() && self.model.is_none() && self.mileage_km.is_none()
    }
}

/// Vehicle context attached to a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VehicleAssociation {
    Saved {
        #[serde(rename = "vehicleId")]
        vehicle_id: String,
    },
    Manual(ManualVehicle),
}

/// Everything the remote service needs for one diagnosis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosisRequest {
    pub category: Category,
    pub description: String,
    pub voice: Option<VoiceRecording>,
    pub photos: Vec<PhotoRef>,
    pub vehicle: Option<VehicleAssociation>,
}

/// Severity reported by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn label(self) -> &'static str {
        match self {
            Urgency::Low => "LOW",
            Urgency::Medium => "MEDIUM",
            Urgency::High => "HIGH",
            Urgency::Critical => "CRITICAL",
        }
    }
}

/// Optional priority tag on a recommended action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedAction {
    pub action: String,
    #[serde(default)]
    pub priority: Option<ActionPriority>,
}

/// Diagnosis payload produced by the service and passed through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub urgency: Urgency,
    /// 0.0..=1.0
    pub confidence: f32,
    pub summary: String,
    #[serde(default)]
    pub possible_causes: Vec<String>,
    #[serde(default)]
    pub recommended_actions: Vec<RecommendedAction>,
    /// Partial-failure message, e.g. one photo could not be analysed.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Stamped locally when the response is decoded.
    #[serde(skip, default = "Local::now")]
    pub received_at: DateTime<Local>,
}

impl DiagnosisResult {
    /// Confidence as a whole percentage, clamped to 0..=100.
    pub fn confidence_pct(&self) -> u8 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_result_decodes_camel_case_payload() {
        let body = r#"{
            "urgency": "high",
            "confidence": 0.82,
            "summary": "Worn front brake pads",
            "possibleCauses": ["Pad wear", "Warped rotor"],
            "recommendedActions": [
                {"action": "Replace pads", "priority": "high"},
                {"action": "Inspect rotors"}
            ]
        }"#;
        let r: DiagnosisResult = serde_json::from_str(body).unwrap();
        assert_eq!(r.urgency, Urgency::High);
        assert_eq!(r.confidence_pct(), 82);
        assert_eq!(r.possible_causes.len(), 2);
        assert_eq!(r.recommended_actions[0].priority, Some(ActionPriority::High));
        assert_eq!(r.recommended_actions[1].priority, None);
        assert_eq!(r.error_message, None);
    }

    #[test]
    fn test_vehicle_association_wire_shape() {
        let saved = VehicleAssociation::Saved {
            vehicle_id: "v-1".into(),
        };
        assert_eq!(
            serde_json::to_value(&saved).unwrap(),
            serde_json::json!({"kind": "saved", "vehicleId": "v-1"})
        );

        let manual = VehicleAssociation::Manual(ManualVehicle {
            year: Some(2015),
            make: Some("Honda".into()),
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&manual).unwrap(),
            serde_json::json!({"kind": "manual", "year": 2015, "make": "Honda"})
        );
    }

    #[test]
    fn test_category_defaults_to_other() {
        assert_eq!(Category::default(), Category::Other);
        assert_eq!(
            serde_json::to_value(Category::Tires).unwrap(),
            serde_json::json!("tires")
        );
    }
}
