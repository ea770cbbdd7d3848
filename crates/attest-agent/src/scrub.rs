//! Scrubbing of HTTP traffic before it reaches the journal
//!
//! Journals are durable and shared; credentials and tokens must not
//! be. Every URL, request payload and response body passes through the
//! agent's scrubber before being recorded or logged.

/// Removes private information from HTTP traffic
///
/// The default methods pass everything through unchanged; override the
/// ones that matter for the service under test.
pub trait HttpScrubber: Send + Sync {
    /// Scrub a request URL
    fn scrub_url(&self, url: &str) -> String {
        url.to_string()
    }

    /// Scrub an outgoing request payload
    fn scrub_request(&self, payload: &str) -> String {
        payload.to_string()
    }

    /// Scrub a received response body
    fn scrub_response(&self, body: &str) -> String {
        body.to_string()
    }
}

/// Scrubber that passes everything through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScrubber;

impl HttpScrubber for NoopScrubber {}

/// Scrubber that masks every occurrence of known secret strings
#[derive(Debug, Clone, Default)]
pub struct SecretScrubber {
    secrets: Vec<String>,
}

impl SecretScrubber {
    const MASK: &'static str = "*****";

    /// Create a scrubber masking the given secrets
    pub fn new(secrets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            secrets: secrets.into_iter().map(Into::into).collect(),
        }
    }

    /// Add another secret to mask
    pub fn add_secret(&mut self, secret: impl Into<String>) {
        self.secrets.push(secret.into());
    }

    fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for secret in &self.secrets {
            if !secret.is_empty() {
                masked = masked.replace(secret.as_str(), Self::MASK);
            }
        }
        masked
    }
}

impl HttpScrubber for SecretScrubber {
    fn scrub_url(&self, url: &str) -> String {
        self.mask(url)
    }

    fn scrub_request(&self, payload: &str) -> String {
        self.mask(payload)
    }

    fn scrub_response(&self, body: &str) -> String {
        self.mask(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_scrubber_passes_through() {
        let scrubber = NoopScrubber;
        assert_eq!(scrubber.scrub_url("http://x/?token=abc"), "http://x/?token=abc");
        assert_eq!(scrubber.scrub_request("{\"pw\":\"abc\"}"), "{\"pw\":\"abc\"}");
    }

    #[test]
    fn test_secret_scrubber_masks_all_occurrences() {
        let scrubber = SecretScrubber::new(["s3cr3t", "tok-99"]);
        assert_eq!(
            scrubber.scrub_url("http://x/?key=s3cr3t&t=tok-99"),
            "http://x/?key=*****&t=*****"
        );
        assert_eq!(
            scrubber.scrub_response("s3cr3t and again s3cr3t"),
            "***** and again *****"
        );
    }

    #[test]
    fn test_empty_secret_is_ignored() {
        let scrubber = SecretScrubber::new([""]);
        assert_eq!(scrubber.scrub_request("payload"), "payload");
    }
}
