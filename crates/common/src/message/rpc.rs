use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::ErrorObject;

/// EIP-1193 provider and JSON-RPC error codes
pub mod error_codes {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;

    pub const PARSE: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL: i64 = -32603;
}

/// A JSON-RPC call as issued by the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestArguments {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestArguments {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// Plaintext of a sealed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    pub action: RequestArguments,
    pub chain_id: u64,
}

/// Either the call's value or the error the remote signer reflected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcResult {
    Value(Value),
    Error(ErrorObject),
}

/// Session state the remote signer piggybacks on responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    /// Chain id -> RPC url of every chain the wallet can switch to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chains: Option<BTreeMap<u64, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,
}

/// Plaintext of a sealed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub result: RpcResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl RpcResponse {
    pub fn value(value: Value) -> Self {
        Self {
            result: RpcResult::Value(value),
            data: None,
        }
    }

    pub fn error(error: ErrorObject) -> Self {
        Self {
            result: RpcResult::Error(error),
            data: None,
        }
    }

    pub fn with_data(mut self, data: ResponseData) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = RpcRequest {
            action: RequestArguments::new("personal_sign").with_params(json!(["0xdead", "0xabc"])),
            chain_id: 8453,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "action": {"method": "personal_sign", "params": ["0xdead", "0xabc"]},
                "chainId": 8453
            })
        );
    }

    #[test]
    fn test_response_wire_shape() {
        let response = RpcResponse::value(json!(["0xabc"])).with_data(ResponseData {
            chains: Some(BTreeMap::from([(8453, "https://mainnet.base.org".to_string())])),
            capabilities: None,
        });
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "result": {"value": ["0xabc"]},
                "data": {"chains": {"8453": "https://mainnet.base.org"}}
            })
        );

        let recovered: RpcResponse = serde_json::from_value(value).unwrap();
        assert_eq!(recovered, response);
    }

    #[test]
    fn test_error_response() {
        let text = r#"{"result":{"error":{"code":4001,"message":"User denied"}}}"#;
        let response: RpcResponse = serde_json::from_str(text).unwrap();
        match response.result {
            RpcResult::Error(error) => {
                assert_eq!(error.code, Some(error_codes::USER_REJECTED));
                assert_eq!(error.message, "User denied");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
