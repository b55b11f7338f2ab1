//! Operator-supplied cookies (browser-extension JSON exports) → CDP cookies.
//!
//! Exports carry bookkeeping fields the CDP `CookieParam` schema does not
//! know, and `sameSite` values such as `no_restriction` that it rejects, so
//! every cookie is sanitised before conversion.

use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

const VALID_SAME_SITE: [&str; 3] = ["Strict", "Lax", "None"];
const BOOKKEEPING_FIELDS: [&str; 3] = ["hostOnly", "session", "storeId"];

/// Strip fields incompatible with the CDP cookie schema.
pub fn sanitize(cookie: &Value) -> Value {
    let mut ck = cookie.clone();
    let Some(obj) = ck.as_object_mut() else {
        return ck;
    };

    let same_site_ok = obj
        .get("sameSite")
        .and_then(|v| v.as_str())
        .is_some_and(|s| VALID_SAME_SITE.contains(&s));
    if !same_site_ok {
        obj.remove("sameSite");
    }
    for k in BOOKKEEPING_FIELDS {
        obj.remove(k);
    }

    // Extension exports name the expiry `expirationDate`.
    if !obj.contains_key("expires") {
        if let Some(exp) = obj.remove("expirationDate") {
            obj.insert("expires".to_string(), exp);
        }
    } else {
        obj.remove("expirationDate");
    }
    ck
}

/// Sanitise and convert raw cookies. Entries that still do not fit the CDP
/// schema are skipped with a warning.
pub fn to_cookie_params(raw: &[Value]) -> Vec<CookieParam> {
    let mut out = Vec::with_capacity(raw.len());
    for (idx, v) in raw.iter().enumerate() {
        match serde_json::from_value::<CookieParam>(sanitize(v)) {
            Ok(p) => out.push(p),
            Err(e) => warn!("cookie #{} skipped: {}", idx, e),
        }
    }
    out
}

/// Parse a JSON array of cookies.
pub fn parse_cookie_json(json: &str) -> Result<Vec<Value>> {
    let parsed: Value = serde_json::from_str(json).map_err(|e| anyhow!("Invalid JSON: {}", e))?;
    match parsed {
        Value::Array(items) => Ok(items),
        _ => Err(anyhow!("Invalid JSON: expected an array of cookies")),
    }
}

/// Load a cookie export file and convert it to CDP cookies.
pub fn load_cookie_file(path: &Path) -> Result<Vec<CookieParam>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("cannot read cookie file {}: {}", path.display(), e))?;
    let raw = parse_cookie_json(&contents)?;
    let params = to_cookie_params(&raw);
    info!(
        "loaded {}/{} cookies from {}",
        params.len(),
        raw.len(),
        path.display()
    );
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalid_same_site_and_bookkeeping_fields_are_dropped() {
        let raw = json!({
            "name": "SID", "value": "x", "domain": ".youtube.com", "path": "/",
            "sameSite": "no_restriction", "hostOnly": false, "session": true, "storeId": "0"
        });
        let clean = sanitize(&raw);
        let obj = clean.as_object().unwrap();
        assert!(!obj.contains_key("sameSite"));
        assert!(!obj.contains_key("hostOnly"));
        assert!(!obj.contains_key("session"));
        assert!(!obj.contains_key("storeId"));
        assert_eq!(obj["name"], "SID");
    }

    #[test]
    fn valid_same_site_is_kept() {
        let clean = sanitize(&json!({"name": "a", "value": "b", "sameSite": "Lax"}));
        assert_eq!(clean["sameSite"], "Lax");
    }

    #[test]
    fn expiration_date_is_renamed() {
        let clean = sanitize(&json!({"name": "a", "value": "b", "expirationDate": 1800000000.5}));
        assert_eq!(clean["expires"], 1800000000.5);
        assert!(clean.get("expirationDate").is_none());
    }

    #[test]
    fn converts_exports_to_cookie_params() {
        let raw = vec![
            json!({"name": "SID", "value": "x", "domain": ".youtube.com", "path": "/",
                   "sameSite": "unspecified", "hostOnly": false, "storeId": "0"}),
            json!({"value": "missing name"}),
        ];
        let params = to_cookie_params(&raw);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "SID");
    }

    #[test]
    fn non_array_json_is_rejected() {
        assert!(parse_cookie_json(r#"{"name": "a"}"#).is_err());
        assert!(parse_cookie_json("not json").is_err());
        assert_eq!(parse_cookie_json("[]").unwrap().len(), 0);
    }
}
