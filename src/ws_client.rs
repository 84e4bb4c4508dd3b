//! Authenticated websocket connections to the speech services.

use crate::llm::api::API_KEY_HEADER;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Client-side websocket stream to a speech service.
pub type ServiceSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Append `params` to `base` as a query string.
///
/// # Errors
///
/// Returns a message if `base` is not a valid URL.
pub fn service_url(base: &str, params: &[(&str, &str)]) -> Result<url::Url, String> {
    let mut url = url::Url::parse(base).map_err(|e| format!("invalid url {base}: {e}"))?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

/// Open a websocket to `url`, sending the subscription key header when
/// `api_key` is non-empty.
///
/// # Errors
///
/// Returns a message describing the handshake or header failure.
pub async fn connect(url: &url::Url, api_key: &str) -> Result<ServiceSocket, String> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| format!("request: {e}"))?;
    if !api_key.is_empty() {
        let value = HeaderValue::from_str(api_key).map_err(|e| format!("api key header: {e}"))?;
        request.headers_mut().insert(API_KEY_HEADER, value);
    }
    let (socket, _) = connect_async(request)
        .await
        .map_err(|e| format!("connect: {e}"))?;
    Ok(socket)
}
