use serde::{Deserialize, Serialize};

/// A shipping provider the service can track.
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carrier {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl Carrier {
    pub fn from_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_uppercase(),
        }
    }
}

/// The carriers endpoint answers either with a bare list or with
/// `{"carriers": [...]}`, and entries are either objects or plain ids.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CarriersResponse {
    List(Vec<CarrierEntry>),
    Wrapped { carriers: Vec<CarrierEntry> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CarrierEntry {
    Object(Carrier),
    Id(String),
}

impl CarriersResponse {
    pub fn into_carriers(self) -> Vec<Carrier> {
        let entries = match self {
            CarriersResponse::List(entries) => entries,
            CarriersResponse::Wrapped { carriers } => carriers,
        };
        entries
            .into_iter()
            .map(|entry| match entry {
                CarrierEntry::Object(c) if c.name.trim().is_empty() => Carrier::from_id(&c.id),
                CarrierEntry::Object(c) => c,
                CarrierEntry::Id(id) => Carrier::from_id(&id),
            })
            .collect()
    }
}
