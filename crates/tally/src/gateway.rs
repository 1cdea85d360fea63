//! HTTP/XML gateway client.
//!
//! The ledger system exposes an HTTP endpoint on its configured host/port
//! that answers XML envelope requests. The core sync engine does not use
//! this surface; it serves the outer shell: a cheap connection check and
//! the company-discovery listing that feeds the add-company flow.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;

/// A company as discovered from the ledger system: display name plus the
/// immutable external number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRef {
    pub name: String,
    pub number: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("ledger system unreachable at {0}")]
    Unreachable(String),

    #[error("request to ledger system timed out")]
    Timeout,

    #[error("ledger system answered with HTTP status {0}")]
    Status(u16),

    #[error("could not parse company-list XML: {0}")]
    Parse(String),
}

/// Fixed export envelope requesting the list of companies with their
/// numbers. Kept byte-for-byte stable; the gateway is picky about shape.
const COMPANY_LIST_ENVELOPE: &str = "<ENVELOPE><HEADER><VERSION>1</VERSION>\
<TALLYREQUEST>EXPORT</TALLYREQUEST><TYPE>COLLECTION</TYPE><ID>ListOfCompanies</ID></HEADER>\
<BODY><DESC><STATICVARIABLES><SVEXPORTFORMAT>$$SysName:XML</SVEXPORTFORMAT></STATICVARIABLES>\
<TDL><TDLMESSAGE><COLLECTION Name=\"ListOfCompanies\"><TYPE>Company</TYPE>\
<FETCH>Name,CompanyNumber</FETCH></COLLECTION></TDLMESSAGE></TDL></DESC></BODY></ENVELOPE>";

/// Default request timeout for gateway calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for one ledger-system gateway endpoint.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{host}:{port}"),
            timeout: REQUEST_TIMEOUT,
            http: reqwest::Client::new(),
        }
    }

    /// Base URL this client talks to (e.g. `http://localhost:9000`).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the gateway with a bare GET.
    ///
    /// Returns `false` on any failure; this is a liveness check, not an
    /// error path, so failures are logged and swallowed.
    pub async fn check_connection(&self) -> bool {
        let result = self
            .http
            .get(&self.base_url)
            // A basic liveness probe deserves a shorter leash.
            .timeout(self.timeout / 2)
            .send()
            .await;

        match result {
            Ok(response) => {
                let ok = response.status().is_success();
                tracing::debug!(url = %self.base_url, status = %response.status(), "Connection check");
                ok
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(url = %self.base_url, "Connection check timed out");
                false
            }
            Err(e) => {
                tracing::warn!(url = %self.base_url, error = %e, "Connection check failed");
                false
            }
        }
    }

    /// Fetch the list of companies known to the ledger system.
    pub async fn list_companies(&self) -> Result<Vec<CompanyRef>, GatewayError> {
        tracing::info!(url = %self.base_url, "Fetching company list from ledger system");
        let response = self
            .http
            .post(&self.base_url)
            .header("Content-Type", "application/xml")
            .timeout(self.timeout)
            .body(COMPANY_LIST_ENVELOPE)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Unreachable(self.base_url.clone())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|_| GatewayError::Unreachable(self.base_url.clone()))?;

        let companies = parse_company_list(&body)?;
        tracing::info!(count = companies.len(), "Fetched companies from ledger system");
        Ok(companies)
    }
}

/// Parse the company-list response envelope.
///
/// Entries missing either name or number are skipped with a warning; an
/// unparseable document is an error.
pub fn parse_company_list(xml: &str) -> Result<Vec<CompanyRef>, GatewayError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut companies = Vec::new();
    let mut in_company = false;
    let mut current_tag: Option<Vec<u8>> = None;
    let mut name: Option<String> = None;
    let mut number: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = e.name().as_ref().to_vec();
                if tag == b"COMPANY" {
                    in_company = true;
                    name = None;
                    number = None;
                } else if in_company {
                    current_tag = Some(tag);
                }
            }
            Ok(Event::Text(t)) => {
                if in_company {
                    let text = t
                        .unescape()
                        .map_err(|e| GatewayError::Parse(e.to_string()))?
                        .trim()
                        .to_string();
                    match current_tag.as_deref() {
                        Some(b"NAME") if !text.is_empty() => name = Some(text),
                        Some(b"COMPANYNUMBER") if !text.is_empty() => number = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"COMPANY" {
                    match (name.take(), number.take()) {
                        (Some(name), Some(number)) => companies.push(CompanyRef { name, number }),
                        _ => {
                            tracing::warn!("Skipping company entry with missing name or number");
                        }
                    }
                    in_company = false;
                }
                current_tag = None;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(GatewayError::Parse(e.to_string())),
        }
    }

    Ok(companies)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_company_list() {
        let xml = "<ENVELOPE><BODY><DATA><COLLECTION>\
            <COMPANY><NAME>Acme Ltd</NAME><COMPANYNUMBER>1001</COMPANYNUMBER></COMPANY>\
            <COMPANY><NAME>Other Co</NAME><COMPANYNUMBER>1002</COMPANYNUMBER></COMPANY>\
            </COLLECTION></DATA></BODY></ENVELOPE>";

        let companies = parse_company_list(xml).unwrap();
        assert_eq!(
            companies,
            vec![
                CompanyRef { name: "Acme Ltd".into(), number: "1001".into() },
                CompanyRef { name: "Other Co".into(), number: "1002".into() },
            ]
        );
    }

    #[test]
    fn unescapes_entities_in_names() {
        let xml = "<ENVELOPE><COMPANY><NAME>Smith &amp; Sons</NAME>\
            <COMPANYNUMBER>7</COMPANYNUMBER></COMPANY></ENVELOPE>";
        let companies = parse_company_list(xml).unwrap();
        assert_eq!(companies[0].name, "Smith & Sons");
    }

    #[test]
    fn entries_missing_name_or_number_are_skipped() {
        let xml = "<ENVELOPE>\
            <COMPANY><NAME>No Number Co</NAME></COMPANY>\
            <COMPANY><COMPANYNUMBER>9</COMPANYNUMBER></COMPANY>\
            <COMPANY><NAME>Kept</NAME><COMPANYNUMBER>10</COMPANYNUMBER></COMPANY>\
            </ENVELOPE>";
        let companies = parse_company_list(xml).unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].number, "10");
    }

    #[test]
    fn empty_response_yields_empty_list() {
        let xml = "<ENVELOPE><RESPONSE><STATUS>1</STATUS></RESPONSE></ENVELOPE>";
        assert!(parse_company_list(xml).unwrap().is_empty());
    }

    #[test]
    fn malformed_xml_is_an_error_not_a_panic() {
        let err = parse_company_list("<ENVELOPE><COMPANY></WRONG></ENVELOPE>").unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)));
    }
}
