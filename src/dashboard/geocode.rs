//! Reverse geocoding through OpenStreetMap Nominatim.

use log::debug;
use reqwest::Url;
use serde::Deserialize;

use crate::dashboard::client::ClientError;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Nominatim requires an identifying User-Agent.
const USER_AGENT: &str = concat!("civix-dashboard/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Default, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub hamlet: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReverseResult {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub address: Address,
}

impl ReverseResult {
    /// "place, state, country" from whichever parts are known, or the full
    /// display name when the address has none of them.
    pub fn display_location(&self) -> String {
        let address = &self.address;
        let place = address
            .city
            .as_ref()
            .or(address.town.as_ref())
            .or(address.village.as_ref())
            .or(address.hamlet.as_ref());
        let parts: Vec<&str> = [place, address.state.as_ref(), address.country.as_ref()]
            .into_iter()
            .flatten()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            self.display_name.clone()
        } else {
            parts.join(", ")
        }
    }
}

pub struct Geocoder {
    http: reqwest::Client,
    base: Url,
}

impl Geocoder {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base = Url::parse(base_url).map_err(|_| ClientError::InvalidUrl(base_url.to_string()))?;
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http, base })
    }

    fn reverse_url(&self, lat: f64, lon: f64) -> Result<Url, ClientError> {
        let mut url = self
            .base
            .join("reverse")
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?;
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("lat", &lat.to_string())
            .append_pair("lon", &lon.to_string());
        Ok(url)
    }

    pub async fn reverse(&self, lat: f64, lon: f64) -> Result<ReverseResult, ClientError> {
        let url = self.reverse_url(lat, lon)?;
        debug!("Reverse geocoding {lat}, {lon}");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                code: status.as_u16(),
                message: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }
        Ok(response.json().await?)
    }

    /// A human-readable location for a coordinate.
    pub async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<String, ClientError> {
        Ok(self.reverse(lat, lon).await?.display_location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ReverseResult {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn prefers_city_then_smaller_places() {
        let result = parse(
            r#"{
                "display_name": "10, Downing Street, Westminster, London, England, SW1A 2AA, United Kingdom",
                "address": {"city": "London", "state": "England", "country": "United Kingdom"}
            }"#,
        );
        assert_eq!(result.display_location(), "London, England, United Kingdom");

        let result = parse(r#"{"address": {"village": "Hallstatt", "country": "Austria"}}"#);
        assert_eq!(result.display_location(), "Hallstatt, Austria");
    }

    #[test]
    fn falls_back_to_display_name() {
        let result = parse(r#"{"display_name": "Somewhere at sea", "address": {}}"#);
        assert_eq!(result.display_location(), "Somewhere at sea");

        let result = parse(r#"{"display_name": "Nowhere"}"#);
        assert_eq!(result.display_location(), "Nowhere");
    }

    #[test]
    fn reverse_url_has_coordinates() {
        let geocoder = Geocoder::new(DEFAULT_NOMINATIM_URL).unwrap();
        let url = geocoder.reverse_url(51.5, -0.125).unwrap();
        assert_eq!(
            url.as_str(),
            "https://nominatim.openstreetmap.org/reverse?format=json&lat=51.5&lon=-0.125"
        );
    }
}
