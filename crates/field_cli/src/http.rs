//! Blocking HTTP+JSON transport for the `VisitApi` effect.

use std::time::Duration;

use anyhow::{bail, Context};
use field_app::effects::visit_api::{VisitApiOperation, VisitApiResponse, VisitApiResult};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed. cause: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Unexpected response status. status: {status}, body: {body}")]
    StatusError { status: StatusCode, body: String },
    #[error("Unreadable response. cause: {0}")]
    DecodeError(#[from] serde_json::Error),
}

pub struct VisitApiClient {
    client: Client,
    base_url: Url,
}

impl VisitApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url).with_context(|| format!("Invalid API URL. url: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Invalid API URL. url: {}", base_url);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Unable to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
        })
    }

    /// Transport failures become `VisitApiResult::Err`, failures reported by the service are left to the core.
    pub fn perform(&self, operation: &VisitApiOperation) -> VisitApiResult {
        match self.send(operation) {
            Ok(response) => VisitApiResult::Ok {
                response,
            },
            Err(e) => {
                warn!("Visit API call failed. error: {}", e);
                VisitApiResult::Err {
                    error: e.to_string(),
                }
            }
        }
    }

    fn send(&self, operation: &VisitApiOperation) -> Result<VisitApiResponse, TransportError> {
        match operation {
            VisitApiOperation::SubmitVisit(submission) => {
                let request = self
                    .client
                    .post(self.url(&["visits"]))
                    .json(submission);
                self.fetch(request)
                    .map(VisitApiResponse::VisitSubmitted)
            }
            VisitApiOperation::UpdateAppointmentStatus(update) => {
                let request = self
                    .client
                    .put(self.url(&["appointments", update.id.as_str(), "status"]))
                    .json(update);
                self.fetch(request)
                    .map(VisitApiResponse::Acknowledged)
            }
            VisitApiOperation::LookupVisitId {
                appointment_id,
            } => {
                let request = self
                    .client
                    .get(self.url(&["appointments", appointment_id.as_str(), "visit"]));
                self.fetch(request)
                    .map(VisitApiResponse::VisitIdLookup)
            }
            VisitApiOperation::GetVisitReport {
                visit_id,
            } => {
                let request = self
                    .client
                    .get(self.url(&["visits", visit_id.as_str(), "report"]));
                self.fetch(request)
                    .map(VisitApiResponse::VisitReport)
            }
            VisitApiOperation::GetReferenceList {
                kind,
            } => {
                let kind = kind.to_string();
                let request = self
                    .client
                    .get(self.url(&["reference", kind.as_str()]));
                self.fetch(request)
                    .map(VisitApiResponse::ReferenceList)
            }
            VisitApiOperation::SaveStationLayout(layout) => {
                let request = self
                    .client
                    .put(self.url(&["station-maps", layout.map_id.as_str(), "stations"]))
                    .json(layout);
                self.fetch(request)
                    .map(VisitApiResponse::Acknowledged)
            }
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Error statuses are tolerated when the body still carries a response, e.g. `{ success: false, error }`.
    fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TransportError> {
        let response = request.send()?;
        let status = response.status();
        debug!("Visit API response. url: {}, status: {}", response.url(), status);

        let body = response.text()?;
        match serde_json::from_str::<T>(&body) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => Err(TransportError::StatusError {
                status,
                body,
            }),
            Err(e) => Err(TransportError::DecodeError(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    use field_app::{VisitId, VisitSubmission};
    use rstest::rstest;
    use visits::reconcile::{classify_failure, interpret_submit, GatewayError};

    use super::*;

    #[rstest]
    #[case("http://localhost:8080/api", &["visits"], "http://localhost:8080/api/visits")]
    #[case("http://localhost:8080/api/", &["visits"], "http://localhost:8080/api/visits")]
    #[case("http://localhost:8080", &["appointments", "A 1", "visit"], "http://localhost:8080/appointments/A%201/visit")]
    fn url_joins_encoded_segments(#[case] base_url: &str, #[case] segments: &[&str], #[case] expected: &str) {
        // given
        let client = VisitApiClient::new(base_url, Duration::from_secs(1)).unwrap();

        // when
        let url = client.url(segments);

        // then
        assert_eq!(url.as_str(), expected);
    }

    /// Serves a single canned HTTP response, returns the base url.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream
                .write_all(response.as_bytes())
                .unwrap();
        });

        format!("http://{}/api", address)
    }

    fn read_request(stream: &mut TcpStream) {
        let mut received = Vec::new();
        let mut buffer = [0_u8; 1024];
        loop {
            let read = stream.read(&mut buffer).unwrap();
            if read == 0 {
                return;
            }
            received.extend_from_slice(&buffer[..read]);

            let text = String::from_utf8_lossy(&received);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if received.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn submission() -> VisitSubmission {
        serde_json::from_value(serde_json::json!({
            "visit": {
                "customerId": "C1",
                "technicianId": "T1",
                "technicianName": "Tech One",
                "appointmentId": "A1",
                "startTime": "2025-01-01T09:00:00Z",
                "endTime": "2025-01-01T09:30:00Z",
                "durationMs": 1800000,
                "workType": "Myocide",
                "visitId": null,
                "notes": ""
            },
            "stations": []
        }))
        .unwrap()
    }

    /// Mirrors how the core folds a `submitVisit` result.
    fn classify(result: VisitApiResult) -> Result<VisitId, GatewayError> {
        match result {
            VisitApiResult::Ok {
                response: VisitApiResponse::VisitSubmitted(response),
            } => interpret_submit(response, None),
            VisitApiResult::Ok {
                response,
            } => panic!("unexpected response: {:?}", response),
            VisitApiResult::Err {
                error,
            } => Err(classify_failure(error)),
        }
    }

    #[rstest]
    #[case("400 Bad Request", r#"{"success":false,"error":"Service price must be set"}"#, true)]
    #[case("500 Internal Server Error", "Service price not set for this customer", true)]
    #[case("500 Internal Server Error", "database unavailable", false)]
    fn failed_submission_is_classified(
        #[case] status_line: &'static str,
        #[case] body: &'static str,
        #[case] price_not_set: bool,
    ) {
        // given
        let base_url = serve_once(status_line, body);
        let client = VisitApiClient::new(&base_url, Duration::from_secs(5)).unwrap();

        // when
        let result = client.perform(&VisitApiOperation::SubmitVisit(submission()));

        // then
        let error = classify(result).unwrap_err();
        assert_eq!(error.is_precondition(), price_not_set);
        assert!(matches!(error, GatewayError::PriceNotSet(_) | GatewayError::Remote(_)));
    }

    #[test]
    fn accepted_submission_returns_visit_id() {
        // given
        let base_url = serve_once("201 Created", r#"{"success":true,"visitId":"V100"}"#);
        let client = VisitApiClient::new(&base_url, Duration::from_secs(5)).unwrap();

        // when
        let result = client.perform(&VisitApiOperation::SubmitVisit(submission()));

        // then
        assert_eq!(classify(result), Ok(VisitId::new("V100").unwrap()));
    }

    #[test]
    fn rejects_non_base_url() {
        // expect
        assert!(VisitApiClient::new("mailto:someone@example.org", Duration::from_secs(1)).is_err());
    }
}
