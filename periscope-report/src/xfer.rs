//! Transfer types and header constants shared by probe and collector.

use serde::{Deserialize, Serialize};

/// Header carrying the publishing probe's ID.
pub const PROBE_ID_HEADER: &str = "X-Scope-Probe-ID";

/// Authorization scheme expected by the collector.
pub const AUTH_SCHEME: &str = "Scope-Probe";

/// Collector publish endpoint path.
pub const REPORT_PATH: &str = "/api/report";

/// Collector details endpoint path.
pub const DETAILS_PATH: &str = "/api";

/// Full Authorization header value for a probe token.
pub fn authorization_value(token: &str) -> String {
    format!("{AUTH_SCHEME} token={token}")
}

/// Identity and version of a remote collector process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Details {
    pub id: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_value_format() {
        assert_eq!(authorization_value("abcdefg"), "Scope-Probe token=abcdefg");
    }

    #[test]
    fn details_json_shape() {
        let details = Details {
            id: "foobarbaz".to_string(),
            version: "imalittleteapot".to_string(),
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "foobarbaz", "version": "imalittleteapot"})
        );
    }
}
