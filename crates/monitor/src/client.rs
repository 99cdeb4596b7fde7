use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use job_watch_domain::ports::{ConnectivityError, SourceResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<T> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: T,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Minimal JSON-RPC 2.0 client over HTTP POST.
#[derive(Debug)]
pub struct JsonRpcClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Issues one call. A `null` result decodes to `None`.
    pub async fn call<P, R>(&self, method: &str, params: P) -> SourceResult<Option<R>>
    where
        P: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: method.to_string(),
            params,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|err| ConnectivityError::transport(method, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectivityError::transport(
                method,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }

        let body: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|err| ConnectivityError::invalid(method, err.to_string()))?;
        into_result(method, body)
    }
}

fn into_result<R>(method: &str, body: JsonRpcResponse<R>) -> SourceResult<Option<R>> {
    if let Some(error) = body.error {
        return Err(ConnectivityError::Rpc {
            method: method.to_string(),
            code: error.code,
            message: error.message,
        });
    }
    Ok(body.result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_as_json_rpc_2() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "eth_getBlockByNumber".to_string(),
            params: ("0x10", true),
        };
        let value = serde_json::to_value(&request).expect("serializes");
        assert_eq!(
            value,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "eth_getBlockByNumber",
                "params": ["0x10", true],
            })
        );
    }

    #[test]
    fn null_result_is_absent() {
        let body: JsonRpcResponse<String> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).expect("decodes");
        assert_eq!(into_result("eth_getBlockByNumber", body).expect("ok"), None);
    }

    #[test]
    fn error_object_maps_to_rpc_error() {
        let body: JsonRpcResponse<String> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"limit exceeded"}}"#,
        )
        .expect("decodes");
        let err = into_result("eth_blockNumber", body).unwrap_err();
        assert_eq!(
            err,
            ConnectivityError::Rpc {
                method: "eth_blockNumber".to_string(),
                code: -32005,
                message: "limit exceeded".to_string(),
            }
        );
    }
}
