//! POX autodiscover.
//!
//! For an address `user@domain` the candidates are tried in order:
//!
//! 1. `https://domain/autodiscover/autodiscover.xml`
//! 2. `https://autodiscover.domain/autodiscover/autodiscover.xml`
//!
//! A `settings` answer yields the EWS URL of the best protocol (`EXPR`, then
//! `EXCH`, then `WEB`). A `redirectAddr` answer restarts discovery for the
//! new address, a `redirectUrl` answer is tried next; both count against the
//! hop limit.

use std::collections::VecDeque;

use tracing::debug;
use url::Url;

use crate::remote::{Credentials, TransportError, TransportResult};

use super::client::EwsClient;
use super::xml::{XmlNode, XmlWriter, parse_document};

const REQUEST_NS: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/outlook/requestschema/2006";
const RESPONSE_SCHEMA: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/outlook/responseschema/2006a";

/// Protocol types carrying an EWS URL, most preferred first.
const PROTOCOL_PREFERENCE: &[&str] = &["EXPR", "EXCH", "WEB"];

/// What one autodiscover response asks the client to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The EWS endpoint.
    Settings(Url),
    /// Retry with another address.
    RedirectAddress(String),
    /// Retry against another autodiscover URL.
    RedirectUrl(Url),
}

/// The POX request for `address`.
pub fn request_body(address: &str) -> TransportResult<String> {
    let mut w = XmlWriter::new()?;
    w.start("Autodiscover", &[("xmlns", REQUEST_NS)])?;
    w.start("Request", &[])?;
    w.text_element("EMailAddress", &[], address)?;
    w.text_element("AcceptableResponseSchema", &[], RESPONSE_SCHEMA)?;
    w.end("Request")?;
    w.end("Autodiscover")?;
    w.finish()
}

/// Candidate autodiscover URLs for an address.
pub fn candidate_urls(address: &str) -> TransportResult<Vec<Url>> {
    let domain = address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
        .ok_or_else(|| {
            TransportError::configuration(format!("`{}` is not an email address", address))
        })?;

    [
        format!("https://{}/autodiscover/autodiscover.xml", domain),
        format!("https://autodiscover.{}/autodiscover/autodiscover.xml", domain),
    ]
    .iter()
    .map(|candidate| {
        Url::parse(candidate).map_err(|e| {
            TransportError::configuration(format!("invalid autodiscover URL `{}`", candidate))
                .with_source(e)
        })
    })
    .collect()
}

/// Parses a POX response.
pub fn parse_response(xml: &str) -> TransportResult<Outcome> {
    let root = parse_document(xml)?;
    let response = root
        .child("Response")
        .ok_or_else(|| TransportError::invalid_response("autodiscover response has no `Response`"))?;

    if let Some(error) = response.child("Error") {
        let code = error.text_at(&["ErrorCode"]).unwrap_or("unknown");
        let message = error.text_at(&["Message"]).unwrap_or("autodiscover failed");
        return Err(TransportError::not_found(format!("{} (code {})", message, code)));
    }

    let account = response
        .child("Account")
        .ok_or_else(|| TransportError::invalid_response("autodiscover response has no `Account`"))?;

    match account.text_at(&["Action"]) {
        Some("redirectAddr") => account
            .text_at(&["RedirectAddr"])
            .map(|address| Outcome::RedirectAddress(address.to_string()))
            .ok_or_else(|| TransportError::invalid_response("redirectAddr without an address")),
        Some("redirectUrl") => {
            let url = account
                .text_at(&["RedirectUrl"])
                .ok_or_else(|| TransportError::invalid_response("redirectUrl without a URL"))?;
            parse_url(url).map(Outcome::RedirectUrl)
        }
        _ => ews_url(account).map(Outcome::Settings),
    }
}

fn ews_url(account: &XmlNode) -> TransportResult<Url> {
    let protocols: Vec<&XmlNode> = account.children_named("Protocol").collect();

    PROTOCOL_PREFERENCE
        .iter()
        .find_map(|kind| {
            protocols
                .iter()
                .find(|protocol| protocol.text_at(&["Type"]) == Some(*kind))
                .and_then(|protocol| protocol.text_at(&["EwsUrl"]))
        })
        .ok_or_else(|| TransportError::not_found("no EWS URL in autodiscover settings"))
        .and_then(parse_url)
}

fn parse_url(value: &str) -> TransportResult<Url> {
    Url::parse(value).map_err(|e| {
        TransportError::invalid_response(format!("invalid URL `{}` in autodiscover response", value))
            .with_source(e)
    })
}

/// Locates the EWS endpoint for `address`.
///
/// Every candidate failure is logged; the last one is returned when no
/// candidate answers.
pub async fn discover(
    client: &EwsClient,
    address: &str,
    credentials: &Credentials,
) -> TransportResult<Url> {
    let max_hops = client.config().max_autodiscover_hops;
    let mut current = address.to_string();
    let mut queue: VecDeque<Url> = candidate_urls(&current)?.into();
    let mut hops = 0;
    let mut last_error: Option<TransportError> = None;

    while let Some(candidate) = queue.pop_front() {
        debug!(address = %current, url = %candidate, "Trying autodiscover candidate");

        let body = request_body(&current)?;
        let outcome = client
            .post_xml(&candidate, body, credentials)
            .await
            .and_then(|xml| parse_response(&xml));

        match outcome {
            Ok(Outcome::Settings(endpoint)) => {
                debug!(endpoint = %endpoint, "Autodiscover succeeded");
                return Ok(endpoint);
            }
            Ok(redirect) => {
                hops += 1;
                if hops > max_hops {
                    return Err(TransportError::not_found(format!(
                        "autodiscover for `{}` exceeded {} redirections",
                        address, max_hops
                    )));
                }
                match redirect {
                    Outcome::RedirectAddress(next) => {
                        debug!(from = %current, to = %next, "Autodiscover address redirect");
                        queue = candidate_urls(&next)?.into();
                        current = next;
                    }
                    Outcome::RedirectUrl(url) => {
                        debug!(url = %url, "Autodiscover URL redirect");
                        queue.push_front(url);
                    }
                    Outcome::Settings(_) => {}
                }
            }
            Err(e) => {
                debug!(url = %candidate, error = %e, "Autodiscover candidate failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        TransportError::not_found(format!("no autodiscover endpoint answered for `{}`", address))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(account: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<Autodiscover xmlns="http://schemas.microsoft.com/exchange/autodiscover/responseschema/2006">
  <Response xmlns="http://schemas.microsoft.com/exchange/autodiscover/outlook/responseschema/2006a">
    <User><DisplayName>Owner</DisplayName></User>
    <Account>{}</Account>
  </Response>
</Autodiscover>"#,
            account
        )
    }

    #[test]
    fn request_names_the_address() {
        let body = request_body("owner@example.com").unwrap();
        assert!(body.contains("<EMailAddress>owner@example.com</EMailAddress>"));
        assert!(body.contains(RESPONSE_SCHEMA));
        assert!(body.contains(REQUEST_NS));
    }

    #[test]
    fn candidates_for_domain() {
        let urls = candidate_urls("owner@example.com").unwrap();
        let urls: Vec<&str> = urls.iter().map(Url::as_str).collect();
        assert_eq!(
            urls,
            [
                "https://example.com/autodiscover/autodiscover.xml",
                "https://autodiscover.example.com/autodiscover/autodiscover.xml",
            ]
        );
    }

    #[test]
    fn candidates_need_a_domain() {
        for address in ["owner", "owner@", "owner@ "] {
            let err = candidate_urls(address).unwrap_err();
            assert_eq!(err.classification(), "configuration_error", "{address}");
        }
    }

    #[test]
    fn settings_prefer_expr_over_exch() {
        let xml = response(
            r#"<AccountType>email</AccountType>
<Action>settings</Action>
<Protocol><Type>EXCH</Type><EwsUrl>https://internal.example.com/EWS/Exchange.asmx</EwsUrl></Protocol>
<Protocol><Type>EXPR</Type><EwsUrl>https://mail.example.com/EWS/Exchange.asmx</EwsUrl></Protocol>
<Protocol><Type>WEB</Type></Protocol>"#,
        );
        assert_eq!(
            parse_response(&xml).unwrap(),
            Outcome::Settings(Url::parse("https://mail.example.com/EWS/Exchange.asmx").unwrap())
        );
    }

    #[test]
    fn settings_fall_back_to_exch() {
        let xml = response(
            r#"<Action>settings</Action>
<Protocol><Type>EXCH</Type><EwsUrl>https://internal.example.com/EWS/Exchange.asmx</EwsUrl></Protocol>"#,
        );
        assert_eq!(
            parse_response(&xml).unwrap(),
            Outcome::Settings(
                Url::parse("https://internal.example.com/EWS/Exchange.asmx").unwrap()
            )
        );
    }

    #[test]
    fn settings_without_ews_url() {
        let xml = response(r#"<Action>settings</Action><Protocol><Type>WEB</Type></Protocol>"#);
        assert!(parse_response(&xml).unwrap_err().is_not_found());
    }

    #[test]
    fn redirects() {
        let xml = response(
            r#"<Action>redirectAddr</Action><RedirectAddr>owner@corp.example.com</RedirectAddr>"#,
        );
        assert_eq!(
            parse_response(&xml).unwrap(),
            Outcome::RedirectAddress("owner@corp.example.com".to_string())
        );

        let xml = response(
            r#"<Action>redirectUrl</Action><RedirectUrl>https://autodiscover.corp.example.com/autodiscover/autodiscover.xml</RedirectUrl>"#,
        );
        assert!(matches!(parse_response(&xml).unwrap(), Outcome::RedirectUrl(_)));
    }

    #[test]
    fn error_response_is_not_found() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<Autodiscover xmlns="http://schemas.microsoft.com/exchange/autodiscover/responseschema/2006">
  <Response>
    <Error Time="10:00:00.000" Id="1">
      <ErrorCode>500</ErrorCode>
      <Message>The email address can't be found.</Message>
    </Error>
  </Response>
</Autodiscover>"#;
        let err = parse_response(xml).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.message().contains("can't be found"));
    }

    #[test]
    fn garbage_is_invalid_response() {
        let err = parse_response("<html><body>Sign in</body></html>").unwrap_err();
        assert_eq!(err.classification(), "invalid_response");
    }
}
