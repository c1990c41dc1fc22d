//! HTTP collaborator with a mock-response table.
//!
//! Before any real request, the mock table is consulted in insertion order;
//! the first regex matching the URL wins and its file content is returned
//! verbatim. Misses are logged at host-debug level.

use std::fs;

use regex::Regex;

use crate::output::Printer;

struct MockResponse {
    pattern: String,
    regex: Regex,
    file_path: String,
}

pub struct Requester {
    mocks: Vec<MockResponse>,
    agent: ureq::Agent,
}

impl Default for Requester {
    fn default() -> Self {
        Self::new()
    }
}

impl Requester {
    pub fn new() -> Self {
        Requester {
            mocks: Vec::new(),
            agent: ureq::Agent::new(),
        }
    }

    pub fn add_mocked_response(
        &mut self,
        pattern: &str,
        file_path: &str,
    ) -> Result<(), regex::Error> {
        let regex = Regex::new(pattern)?;
        self.mocks.push(MockResponse {
            pattern: pattern.to_string(),
            regex,
            file_path: file_path.to_string(),
        });
        Ok(())
    }

    /// Fetch the body for a URL, honoring the mock table.
    pub fn request(&self, url: &str, printer: &mut Printer) -> Result<String, String> {
        if let Some(body) = self.resolve_mocked_response(url, printer)? {
            return Ok(body);
        }

        printer.rad_info(&format!("Querying url: {}\n", url));

        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            // Non-2xx still carries a body the script may want.
            Err(ureq::Error::Status(_, response)) => response,
            Err(e) => return Err(format!("Error making HTTP request: {}", e)),
        };
        response
            .into_string()
            .map_err(|e| format!("Error reading HTTP body: {}", e))
    }

    /// Fetch and parse a JSON body. Object key order is preserved so row
    /// order stays deterministic downstream.
    pub fn request_json(
        &self,
        url: &str,
        printer: &mut Printer,
    ) -> Result<serde_json::Value, String> {
        let body = self.request(url, printer)?;
        serde_json::from_str(&body).map_err(|_| {
            let truncated: String = body.chars().take(50).collect();
            format!(
                "Received invalid JSON in response (truncated max 50 chars): [{}]",
                truncated
            )
        })
    }

    fn resolve_mocked_response(
        &self,
        url: &str,
        printer: &mut Printer,
    ) -> Result<Option<String>, String> {
        for mock in &self.mocks {
            if mock.regex.is_match(url) {
                printer.rad_info(&format!(
                    "Mocking response for url (matched \"{}\"): {}\n",
                    mock.pattern, url
                ));
                let data = fs::read_to_string(&mock.file_path)
                    .map_err(|e| format!("Error reading file {}: {}", mock.file_path, e))?;
                return Ok(Some(data));
            }
            printer.rad_debug(&format!(
                "No match for url \"{}\" against regex \"{}\"\n",
                url, mock.pattern
            ));
        }
        Ok(None)
    }
}
