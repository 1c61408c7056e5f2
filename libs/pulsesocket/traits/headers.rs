use async_trait::async_trait;
use std::collections::HashMap;

/// HTTP headers to send with the WebSocket handshake
pub type Headers = HashMap<String, String>;

/// Trait for providing handshake headers dynamically
///
/// Called on every connection and reconnection, so short-lived tokens are
/// fetched fresh each time.
///
/// # Example
/// ```ignore
/// struct BearerToken(Arc<TokenStore>);
///
/// #[async_trait::async_trait]
/// impl HeaderProvider for BearerToken {
///     async fn get_headers(&self) -> Headers {
///         let mut headers = HashMap::new();
///         headers.insert("Authorization".into(), format!("Bearer {}", self.0.current()));
///         headers
///     }
/// }
/// ```
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    async fn get_headers(&self) -> Headers;
}

/// Fixed set of headers
pub struct StaticHeaders(pub Headers);

#[async_trait]
impl HeaderProvider for StaticHeaders {
    async fn get_headers(&self) -> Headers {
        self.0.clone()
    }
}
