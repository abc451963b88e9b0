use std::path::Path;

use miette::{Context, IntoDiagnostic, Result};
use serde::Deserialize;
use tracing::warn;

/// A single session cookie.
///
/// Browser exports carry more attributes (domain, path, expiry),
/// only the ones needed to replay the session are kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// The authenticated capability: the cookies of a logged-in session.
///
/// Established once at startup and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(Vec<Cookie>);

impl Cookies {
    /// Parse a `Cookie` header style string: `k1=v1; k2=v2`.
    ///
    /// Pairs without a `=` are skipped.
    pub fn parse(header: &str) -> Self {
        let cookies = header
            .split(';')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| match pair.split_once('=') {
                Some((name, value)) => Some(Cookie {
                    name: name.trim().to_owned(),
                    value: value.trim().to_owned(),
                }),
                None => {
                    warn!("Ignoring malformed cookie '{pair}'");
                    None
                }
            })
            .collect();

        Self(cookies)
    }

    /// Parse a JSON array of cookie objects, as dumped by browser automation tools
    pub fn from_json(json: &str) -> Result<Self> {
        let cookies: Vec<Cookie> = serde_json::from_str(json)
            .into_diagnostic()
            .wrap_err("Could not parse cookies JSON")?;
        Ok(Self(cookies))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not read cookie file {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Value of the `Cookie` request header, `None` if there is no cookie
    pub fn header_value(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }

        let pairs: Vec<String> = self
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect();
        Some(pairs.join("; "))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn parse_header_string() {
        let cookies = Cookies::parse("_eeos_uid=82022576; _eeos_sid=72017310;broken; x = a=b ;");

        let pairs: Vec<_> = cookies
            .iter()
            .map(|c| (c.name.as_str(), c.value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [("_eeos_uid", "82022576"), ("_eeos_sid", "72017310"), ("x", "a=b")]
        );
        assert_eq!(
            cookies.header_value().as_deref(),
            Some("_eeos_uid=82022576; _eeos_sid=72017310; x=a=b")
        );
    }

    #[test]
    fn empty_jar_has_no_header() {
        assert_eq!(Cookies::parse("  ;  ").header_value(), None);
    }

    #[test]
    fn parse_browser_export() {
        let json = indoc! {r#"
            [
                {
                    "domain": ".eeo.cn",
                    "httpOnly": false,
                    "name": "_eeos_sid",
                    "path": "/",
                    "secure": false,
                    "value": "72017310"
                },
                { "name": "locationArgumentLang", "value": "zh-CN" }
            ]
        "#};
        let cookies = Cookies::from_json(json).unwrap();

        assert_eq!(cookies.len(), 2);
        assert_eq!(
            cookies.header_value().as_deref(),
            Some("_eeos_sid=72017310; locationArgumentLang=zh-CN")
        );
    }

    #[test]
    fn invalid_export_is_an_error() {
        assert!(Cookies::from_json("{\"name\": 1}").is_err());
    }
}
