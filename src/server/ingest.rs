//! Location report bodies
//!
//! Devices in the field send slightly different field names, so the body
//! accepts `identity`/`name`/`device` for the key and `latitude`/`lat`,
//! `longitude`/`lon` for coordinates.

use serde::Deserialize;

use crate::access::Credential;
use crate::error::{Error, Result};
use crate::registry::{LocationReport, Position};

/// Body of `POST /location` and `POST /location/stop`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportBody {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub device: Option<String>,

    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,

    #[serde(default)]
    pub heading: Option<f64>,

    #[serde(default)]
    pub groups: Option<Vec<String>>,
}

impl ReportBody {
    /// Parse a JSON body; an empty body is an empty report
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| Error::validation(format!("Invalid request body: {}", e)))
    }

    /// Resolve the identity the request acts on
    ///
    /// A bearer credential pins the identity to its subject; a body naming
    /// anyone else is refused. Without a credential the body decides.
    pub fn resolve_identity(&self, credential: Option<&Credential>) -> Result<String> {
        let named = [&self.identity, &self.name, &self.device]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty());

        match (credential, named) {
            (Some(credential), Some(named)) if named != credential.subject => {
                Err(Error::unauthorized(format!(
                    "Token does not belong to {}",
                    named
                )))
            }
            (Some(credential), _) => Ok(credential.subject.clone()),
            (None, Some(named)) => Ok(named.to_string()),
            (None, None) => Err(Error::validation("Missing identity")),
        }
    }

    /// Build a registry report
    pub fn into_report(self, credential: Option<&Credential>) -> Result<LocationReport> {
        let identity = self.resolve_identity(credential)?;

        Ok(LocationReport {
            identity,
            position: Position {
                latitude: self.latitude.or(self.lat),
                longitude: self.longitude.or(self.lon),
            },
            heading: self.heading,
            groups: self.groups.unwrap_or_default().into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::PermittedGroups;

    fn parse(json: &str) -> ReportBody {
        ReportBody::from_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_full_report() {
        let report = parse(
            r#"{"identity":"alice","latitude":60.1,"longitude":24.9,"heading":180,"groups":["fam"]}"#,
        )
        .into_report(None)
        .unwrap();

        assert_eq!(report.identity, "alice");
        assert_eq!(report.position, Position::new(60.1, 24.9));
        assert_eq!(report.heading, Some(180.0));
        assert!(report.groups.contains("fam"));
    }

    #[test]
    fn test_aliases() {
        let report = parse(r#"{"name":"bob","lat":1.0,"lon":2.0}"#)
            .into_report(None)
            .unwrap();
        assert_eq!(report.identity, "bob");
        assert_eq!(report.position, Position::new(1.0, 2.0));

        let report = parse(r#"{"device":"tracker-7"}"#).into_report(None).unwrap();
        assert_eq!(report.identity, "tracker-7");
    }

    #[test]
    fn test_identity_takes_precedence() {
        let body = parse(r#"{"identity":"a","name":"b","device":"c"}"#);
        assert_eq!(body.resolve_identity(None).unwrap(), "a");

        let body = parse(r#"{"identity":"  ","name":"b"}"#);
        assert_eq!(body.resolve_identity(None).unwrap(), "b");
    }

    #[test]
    fn test_partial_position_accepted() {
        let report = parse(r#"{"identity":"a","latitude":5.0}"#)
            .into_report(None)
            .unwrap();

        assert_eq!(report.position.latitude, Some(5.0));
        assert_eq!(report.position.longitude, None);
        assert!(report.groups.is_empty());
    }

    #[test]
    fn test_missing_identity_rejected() {
        let result = parse(r#"{"latitude":1.0,"longitude":2.0}"#).into_report(None);

        match result {
            Err(Error::Validation(msg)) => assert_eq!(msg, "Missing identity"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_identity_from_credential() {
        let credential = Credential::new("carol", PermittedGroups::Unrestricted);
        let report = ReportBody::default().into_report(Some(&credential)).unwrap();
        assert_eq!(report.identity, "carol");

        // Naming yourself is fine
        let report = parse(r#"{"identity":"carol","lat":1.0}"#)
            .into_report(Some(&credential))
            .unwrap();
        assert_eq!(report.identity, "carol");
    }

    #[test]
    fn test_credential_cannot_act_for_another_identity() {
        let credential = Credential::new("carol", PermittedGroups::Unrestricted);

        let result = parse(r#"{"identity":"dave"}"#).resolve_identity(Some(&credential));
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        let result = parse(r#"{"name":"dave"}"#).into_report(Some(&credential));
        assert!(matches!(result, Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_empty_body_is_empty_report() {
        let body = ReportBody::from_slice(b"").unwrap();
        assert!(body.identity.is_none());
    }

    #[test]
    fn test_malformed_body_rejected() {
        let result = ReportBody::from_slice(b"{not json");
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
