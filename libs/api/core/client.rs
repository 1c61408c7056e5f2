use crate::core::config::ApiConfig;
use crate::core::response::{ApiResponse, RequestOptions};
use crate::error::{ApiError, Result};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// REST client for the Keytone backend
pub struct ApiClient {
    config: ApiConfig,
    client: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: Option<RequestOptions>,
    ) -> ApiResponse<T> {
        self.request(Method::GET, endpoint, None, options).await
    }

    pub async fn post<T, B>(
        &self,
        endpoint: &str,
        body: &B,
        options: Option<RequestOptions>,
    ) -> ApiResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_with_body(Method::POST, endpoint, body, options)
            .await
    }

    pub async fn put<T, B>(
        &self,
        endpoint: &str,
        body: &B,
        options: Option<RequestOptions>,
    ) -> ApiResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_with_body(Method::PUT, endpoint, body, options)
            .await
    }

    pub async fn patch<T, B>(
        &self,
        endpoint: &str,
        body: &B,
        options: Option<RequestOptions>,
    ) -> ApiResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_with_body(Method::PATCH, endpoint, body, options)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: Option<RequestOptions>,
    ) -> ApiResponse<T> {
        self.request(Method::DELETE, endpoint, None, options).await
    }

    async fn request_with_body<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
        options: Option<RequestOptions>,
    ) -> ApiResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        match serde_json::to_value(body) {
            Ok(body) => self.request(method, endpoint, Some(body), options).await,
            Err(e) => {
                warn!("{} {}: failed to serialize body: {}", method, endpoint, e);
                ApiResponse::failure(ApiError::from(e).to_string())
            }
        }
    }

    /// Send with retries; every failure ends up in the response
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        options: Option<RequestOptions>,
    ) -> ApiResponse<T> {
        let url = self.url(endpoint);
        let options = options.unwrap_or_default();
        let mut policy = self.config.retry_policy();
        if let Some(retries) = options.retries {
            policy.max_retries = retries;
        }

        let mut attempt = 0;
        loop {
            let error = match self.send_once(&method, &url, body.as_ref(), &options).await {
                Ok(data) => return ApiResponse::ok(data),
                Err(e) => e,
            };

            let delay = if error.is_retryable() {
                policy.delay(attempt)
            } else {
                None
            };
            match delay {
                Some(delay) => {
                    warn!(
                        "{} {} failed (attempt {}): {}, retrying in {:?}",
                        method,
                        url,
                        attempt + 1,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    warn!("{} {} failed: {}", method, url, error);
                    return ApiResponse::failure(error.to_string());
                }
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<T> {
        let mut req = self.client.request(method.clone(), url);
        for (name, value) in &options.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = options.timeout {
            req = req.timeout(timeout);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        debug!("{} {}", method, url);
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = error_message(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        decode_body(&text)
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

fn error_message(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Accept either a bare payload or a `{success, data, error}` wrapper
fn decode_body<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(text).map_err(|e| ApiError::DeserializeFailed(e.to_string()))?
    };

    let wrapped = value
        .as_object()
        .is_some_and(|obj| obj.get("success").is_some_and(Value::is_boolean));
    if !wrapped {
        return serde_json::from_value(value).map_err(|e| ApiError::DeserializeFailed(e.to_string()));
    }

    let response: ApiResponse<Value> =
        serde_json::from_value(value).map_err(|e| ApiError::DeserializeFailed(e.to_string()))?;
    if !response.success {
        return Err(ApiError::Rejected(
            response.error.unwrap_or_else(|| "request failed".to_string()),
        ));
    }
    serde_json::from_value(response.data.unwrap_or(Value::Null))
        .map_err(|e| ApiError::DeserializeFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Track {
        id: String,
    }

    #[test]
    fn test_decode_bare_and_wrapped_bodies() {
        let bare: Track = decode_body(r#"{"id":"t1"}"#).unwrap();
        assert_eq!(bare.id, "t1");

        let wrapped: Track = decode_body(r#"{"success":true,"data":{"id":"t2"}}"#).unwrap();
        assert_eq!(wrapped.id, "t2");

        assert!(decode_body::<()>("").is_ok());
    }

    #[test]
    fn test_decode_rejection_is_not_retried() {
        let err = decode_body::<Track>(r#"{"success":false,"error":"quota exceeded"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref msg) if msg == "quota exceeded"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"nope"}"#), Some("nope".into()));
        assert_eq!(error_message(r#"{"message":"gone"}"#), Some("gone".into()));
        assert_eq!(error_message("<html>"), None);
    }

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new(ApiConfig::new("http://localhost:3001/api/")).unwrap();
        assert_eq!(client.url("/sessions"), "http://localhost:3001/api/sessions");
        assert_eq!(client.url("music/1"), "http://localhost:3001/api/music/1");
    }
}
