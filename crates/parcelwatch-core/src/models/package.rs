use serde::{Deserialize, Serialize};

/// Carrier value meaning "let the server detect it".
pub const AUTO_CARRIER: &str = "auto";

/// A tracked shipment as returned by the API.
///
/// Older API revisions call the carrier `carrier_code` and the label
/// `nickname`; both spellings are accepted.
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub tracking_number: String,
    #[serde(default, alias = "carrier_code")]
    pub carrier: Option<String>,
    #[serde(default, alias = "nickname")]
    pub description: Option<String>,
    /// Status cached by the server from the last successful track
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_location: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Package {
    /// Label if set, otherwise the tracking number.
    pub fn display_name(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(&self.tracking_number)
    }

    pub fn carrier_display(&self) -> String {
        match self.carrier.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c.to_uppercase(),
            _ => "Unknown".to_string(),
        }
    }

    /// "status - location", or just the status, or None if never tracked.
    pub fn status_line(&self) -> Option<String> {
        let status = self.status.as_deref().filter(|s| !s.is_empty())?;
        match self.last_location.as_deref().filter(|l| !l.is_empty()) {
            Some(location) => Some(format!("{} - {}", status, location)),
            None => Some(status.to_string()),
        }
    }
}

/// Body of the add-package request. Absent optional fields are omitted so
/// the server applies its own defaults.
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewPackage {
    pub tracking_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewPackage {
    pub fn new(tracking_number: impl Into<String>) -> Self {
        Self {
            tracking_number: tracking_number.into(),
            ..Self::default()
        }
    }

    pub fn with_carrier(mut self, carrier: Option<&str>) -> Self {
        self.carrier = non_blank(carrier);
        self
    }

    pub fn with_description(mut self, description: Option<&str>) -> Self {
        self.description = non_blank(description);
        self
    }
}

/// Partial update of a package. Only the fields that are set are sent.
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PackageUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
}

impl PackageUpdate {
    pub fn carrier(carrier: &str) -> Self {
        Self {
            carrier: Some(carrier.trim().to_string()),
            ..Self::default()
        }
    }

    pub fn description(description: &str) -> Self {
        Self {
            description: Some(description.to_string()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.carrier.is_none()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_response() {
        let json = r#"{
            "id": 7,
            "tracking_number": "1Z999AA10123456784",
            "carrier": "gls",
            "user_id": 3,
            "description": "Birthday gift",
            "status": "In transit",
            "last_location": "Madrid Hub",
            "created_at": "2024-01-14T14:20:00",
            "updated_at": null
        }"#;
        let pkg: Package = serde_json::from_str(json).unwrap();
        assert_eq!(pkg.id, 7);
        assert_eq!(pkg.carrier.as_deref(), Some("gls"));
        assert_eq!(pkg.display_name(), "Birthday gift");
        assert_eq!(pkg.carrier_display(), "GLS");
        assert_eq!(pkg.status_line().as_deref(), Some("In transit - Madrid Hub"));
        assert_eq!(pkg.updated_at, None);
    }

    #[test]
    fn test_parse_legacy_field_names() {
        let json = r#"{"id": 1, "user_id": 1, "tracking_number": "PQ123", "carrier_code": "correos", "nickname": "Shoes", "status_data": {"state": "x"}}"#;
        let pkg: Package = serde_json::from_str(json).unwrap();
        assert_eq!(pkg.carrier.as_deref(), Some("correos"));
        assert_eq!(pkg.description.as_deref(), Some("Shoes"));
        assert_eq!(pkg.status_line(), None);
    }

    #[test]
    fn test_display_fallbacks() {
        let json = r#"{"id": 2, "tracking_number": "ABC", "description": "  "}"#;
        let pkg: Package = serde_json::from_str(json).unwrap();
        assert_eq!(pkg.display_name(), "ABC");
        assert_eq!(pkg.carrier_display(), "Unknown");
    }

    #[test]
    fn test_new_package_omits_absent_fields() {
        let body = NewPackage::new("ABC123")
            .with_carrier(Some(""))
            .with_description(None);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"tracking_number": "ABC123"})
        );

        let body = NewPackage::new("ABC123")
            .with_carrier(Some("seur"))
            .with_description(Some(" Books "));
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"tracking_number": "ABC123", "carrier": "seur", "description": "Books"})
        );
    }

    #[test]
    fn test_package_update_is_partial() {
        let update = PackageUpdate::carrier("gls");
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"carrier": "gls"})
        );
        assert!(!update.is_empty());
        assert!(PackageUpdate::default().is_empty());
    }
}
