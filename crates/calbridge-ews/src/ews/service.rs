//! [`Backend`] and [`ExchangeService`] over HTTP.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::remote::{
    Appointment, AppointmentUpdate, Backend, BoxFuture, CalendarView, ConflictResolution,
    Credentials, DeleteMode, ExchangeService, ItemId, PropertySet, SendCancellations,
    SendInvitations, TransportResult, WellKnownFolder,
};

use super::autodiscover;
use super::client::EwsClient;
use super::config::EwsConfig;
use super::soap;

/// The EWS backend: autodiscover plus SOAP sessions sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct EwsBackend {
    client: Arc<EwsClient>,
}

impl EwsBackend {
    /// Creates a backend with the given configuration.
    pub fn new(config: EwsConfig) -> TransportResult<Self> {
        Ok(Self {
            client: Arc::new(EwsClient::new(config)?),
        })
    }

    pub fn config(&self) -> &EwsConfig {
        self.client.config()
    }
}

impl Backend for EwsBackend {
    fn name(&self) -> &str {
        "ews"
    }

    fn discover<'a>(
        &'a self,
        address: &'a str,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, TransportResult<Url>> {
        Box::pin(autodiscover::discover(&self.client, address, credentials))
    }

    fn connect(
        &self,
        endpoint: &Url,
        credentials: &Credentials,
    ) -> TransportResult<Box<dyn ExchangeService>> {
        debug!(endpoint = %endpoint, "Binding EWS session");
        Ok(Box::new(EwsService {
            client: Arc::clone(&self.client),
            endpoint: endpoint.clone(),
            credentials: credentials.clone(),
        }))
    }
}

/// One authenticated EWS session.
pub struct EwsService {
    client: Arc<EwsClient>,
    endpoint: Url,
    credentials: Credentials,
}

impl EwsService {
    fn server_version(&self) -> &str {
        &self.client.config().server_version
    }

    async fn call(&self, action: &str, envelope: String) -> TransportResult<String> {
        self.client
            .soap(&self.endpoint, action, envelope, &self.credentials)
            .await
    }
}

impl ExchangeService for EwsService {
    fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn find_appointments<'a>(
        &'a self,
        folder: WellKnownFolder,
        view: &'a CalendarView,
    ) -> BoxFuture<'a, TransportResult<Vec<ItemId>>> {
        Box::pin(async move {
            let envelope = soap::find_item_request(self.server_version(), folder, view)?;
            let xml = self.call("FindItem", envelope).await?;
            soap::parse_find_item_response(&xml)
        })
    }

    fn bind_appointment<'a>(
        &'a self,
        id: &'a ItemId,
        properties: PropertySet,
    ) -> BoxFuture<'a, TransportResult<Appointment>> {
        Box::pin(async move {
            let envelope = soap::get_item_request(self.server_version(), id, properties)?;
            let xml = self.call("GetItem", envelope).await?;
            soap::parse_get_item_response(&xml)
        })
    }

    fn update_appointment<'a>(
        &'a self,
        update: &'a AppointmentUpdate,
        conflict: ConflictResolution,
        invitations: SendInvitations,
    ) -> BoxFuture<'a, TransportResult<()>> {
        Box::pin(async move {
            let envelope =
                soap::update_item_request(self.server_version(), update, conflict, invitations)?;
            let xml = self.call("UpdateItem", envelope).await?;
            soap::parse_update_item_response(&xml)
        })
    }

    fn delete_appointment<'a>(
        &'a self,
        id: &'a ItemId,
        mode: DeleteMode,
        cancellations: SendCancellations,
    ) -> BoxFuture<'a, TransportResult<()>> {
        Box::pin(async move {
            let envelope =
                soap::delete_item_request(self.server_version(), id, mode, cancellations)?;
            let xml = self.call("DeleteItem", envelope).await?;
            soap::parse_delete_item_response(&xml)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    use crate::error::ErrorKind;
    use crate::operations::CalendarAdapter;
    use calbridge_core::EventPatch;

    /// Serves `requests` connections, answering each with `404 Not Found`.
    fn not_found_server(requests: usize) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            for stream in listener.incoming().take(requests) {
                let mut stream = stream.unwrap();
                read_request(&mut stream);
                stream
                    .write_all(
                        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    )
                    .unwrap();
            }
        });
        Url::parse(&format!("http://127.0.0.1:{}/EWS/Wrong.asmx", port)).unwrap()
    }

    fn read_request(stream: &mut std::net::TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= head_end + 4 + length {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn wrong_endpoint_is_not_reported_as_missing_event() {
        let endpoint = not_found_server(2);
        let backend = EwsBackend::new(EwsConfig::new()).unwrap();
        let mut adapter = CalendarAdapter::new(Arc::new(backend));
        adapter.create_session("owner@example.com", "secret").unwrap();
        adapter.set_endpoint(endpoint.as_str()).unwrap();

        let err = adapter.delete_event("AAMk-real-id").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeleteFailed);
        assert_eq!(err.cause().classification(), "not_found");

        let err = adapter
            .update_event(&EventPatch::new("AAMk-real-id").with_subject("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpdateFailed);
    }

    #[test]
    fn connect_is_local() {
        let backend = EwsBackend::new(EwsConfig::new()).unwrap();
        let endpoint = Url::parse("https://mail.example.com/EWS/Exchange.asmx").unwrap();
        let service = backend
            .connect(&endpoint, &Credentials::new("owner@example.com", "secret"))
            .unwrap();
        assert_eq!(service.endpoint(), &endpoint);
        assert_eq!(backend.name(), "ews");
    }

    #[tokio::test]
    async fn discover_rejects_non_addresses_before_sending() {
        let backend = EwsBackend::new(EwsConfig::new()).unwrap();
        let credentials = Credentials::new("owner", "secret");
        let err = backend.discover("owner", &credentials).await.unwrap_err();
        assert_eq!(err.classification(), "configuration_error");
    }
}
