//! Tool result payloads

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crm::EntityRow;

/// Reading returned by `get_weather`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherInfo {
    pub temperature: i32,
    pub conditions: String,
    pub humidity: i32,
    pub wind_speed: i32,
    pub feels_like: i32,
}

impl WeatherInfo {
    /// Fixed reading served for every location
    pub fn stub() -> Self {
        Self {
            temperature: 20,
            conditions: "sunny".into(),
            humidity: 50,
            wind_speed: 10,
            feels_like: 25,
        }
    }
}

/// One contact row as returned by `get_contacts`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub contactid: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub mobilephone: String,
}

impl ContactInfo {
    /// Map a CRM row; absent attributes become empty strings
    pub fn from_row(row: &EntityRow) -> Self {
        let text = |name: &str| row.get_str(name).unwrap_or_default().to_owned();
        Self {
            contactid: row.id.unwrap_or_else(Uuid::nil),
            firstname: text("firstname"),
            lastname: text("lastname"),
            email: text("emailaddress1"),
            mobilephone: text("mobilephone"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_weather_wire_names() {
        let json = serde_json::to_value(WeatherInfo::stub()).unwrap();
        assert_eq!(
            json,
            json!({ "temperature": 20, "conditions": "sunny", "humidity": 50, "windSpeed": 10, "feelsLike": 25 })
        );
    }

    #[test]
    fn test_partial_row_defaults_to_empty_strings() {
        let row = EntityRow::new("contact", None).with_attribute("firstname", json!("Ada"));
        let contact = ContactInfo::from_row(&row);

        assert_eq!(contact.firstname, "Ada");
        assert_eq!(contact.lastname, "");
        assert_eq!(contact.email, "");
        assert_eq!(contact.mobilephone, "");
        assert!(contact.contactid.is_nil());
    }

    #[test]
    fn test_full_row_maps_every_field() {
        let id = Uuid::new_v4();
        let row = EntityRow::new("contact", Some(id))
            .with_attribute("firstname", json!("Grace"))
            .with_attribute("lastname", json!("Hopper"))
            .with_attribute("emailaddress1", json!("grace@example.com"))
            .with_attribute("mobilephone", json!("555-0100"));

        let json = serde_json::to_value(ContactInfo::from_row(&row)).unwrap();
        assert_eq!(json["contactid"], json!(id.to_string()));
        assert_eq!(json["email"], "grace@example.com");
        assert_eq!(json["mobilephone"], "555-0100");
    }
}
