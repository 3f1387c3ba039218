//! The intercepted-request model.
//!
//! Every outgoing request from a controlled page reaches the strategy
//! engine as a `FetchRequest`: method, URL, destination class, and any
//! headers the page attached.

use url::Url;

/// What kind of resource a request is for, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Top-level or iframe navigation.
    Document,
    Script,
    Style,
    Image,
    Font,
    /// Anything else (fetch/XHR, workers, media, ...).
    Other,
}

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: String,
    pub url: Url,
    pub destination: Destination,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    /// Build a GET request for the given URL and destination.
    pub fn get(url: Url, destination: Destination) -> Self {
        Self { method: "GET".to_string(), url, destination, headers: Vec::new() }
    }

    /// Attach a request header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Host of the request URL, if any.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// URL path of the request.
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_constructor() {
        let url = Url::parse("https://sideout.app/js/roster.js").unwrap();
        let req = FetchRequest::get(url, Destination::Script);
        assert_eq!(req.method, "GET");
        assert_eq!(req.path(), "/js/roster.js");
        assert_eq!(req.host(), Some("sideout.app"));
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_with_header() {
        let url = Url::parse("https://sideout.app/api/games").unwrap();
        let req = FetchRequest::get(url, Destination::Other).with_header("accept", "application/json");
        assert_eq!(req.headers.len(), 1);
    }
}
