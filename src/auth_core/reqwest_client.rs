//! [`AuthHttpClient`] over reqwest. On native targets `base_url` must be absolute.

use async_trait::async_trait;

use super::http_client::{AuthHttpClient, HttpClientError, HttpMethod, HttpRequest, HttpResponse};

#[derive(Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client (proxies, timeouts, cookie store).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::DELETE => reqwest::Method::DELETE,
    }
}

#[async_trait(?Send)]
impl AuthHttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        let mut builder = self.client.request(reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        #[cfg(target_arch = "wasm32")]
        if request.credentials == super::http_client::RequestCredentials::Include {
            builder = builder.fetch_credentials_include();
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_core::http_client::fetch_json;
    use crate::auth_core::types::AuthError;

    #[test]
    fn methods_map_one_to_one() {
        for method in [HttpMethod::GET, HttpMethod::POST, HttpMethod::PUT, HttpMethod::DELETE] {
            assert_eq!(reqwest_method(method).as_str(), method.as_str());
        }
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let client = ReqwestHttpClient::with_client(reqwest::Client::new());
        let err = fetch_json(&client, HttpRequest::get("http://127.0.0.1:1/auth/me"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
    }
}
