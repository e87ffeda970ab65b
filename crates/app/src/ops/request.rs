use clap::Args;
use serde_json::Value;

use common::message::RequestArguments;
use common::signer::SignerError;

use crate::state::StateError;

/// Methods answered from local state without a session
const LOCAL_METHODS: &[&str] = &["eth_chainId", "net_version"];

/// Connect, then send one JSON-RPC request to the remote signer
#[derive(Args, Debug, Clone)]
pub struct Request {
    /// JSON-RPC method, e.g. personal_sign
    pub method: String,

    /// Parameters as a JSON value, e.g. '["0x68656c6c6f", "0x..."]'
    #[arg(long)]
    pub params: Option<String>,

    /// Switch to this chain before sending
    #[arg(long)]
    pub chain_id: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("invalid params: {0}")]
    Params(serde_json::Error),
    #[error("could not render result: {0}")]
    Output(serde_json::Error),
    #[error("request failed ({}): {0}", .0.code())]
    Signer(#[from] SignerError),
}

impl Request {
    fn arguments(&self) -> Result<RequestArguments, serde_json::Error> {
        let mut args = RequestArguments::new(self.method.clone());
        if let Some(params) = &self.params {
            args = args.with_params(serde_json::from_str::<Value>(params)?);
        }
        Ok(args)
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Request {
    type Error = RequestError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let args = self.arguments().map_err(RequestError::Params)?;
        let session = ctx.session()?;

        let local = LOCAL_METHODS.contains(&self.method.as_str());
        if !local || self.chain_id.is_some() {
            session.connect().await?;
        }
        if let Some(chain_id) = self.chain_id {
            session.switch_chain(chain_id).await?;
        }

        let result = session.request(args).await?;
        render(&result)
    }
}

fn render(result: &Value) -> Result<String, RequestError> {
    serde_json::to_string_pretty(result).map_err(RequestError::Output)
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::op::{Op, OpContext};

    const MOCK_HASH: &str = "0x1111";

    fn request(params: Option<&str>) -> Request {
        Request {
            method: "personal_sign".to_string(),
            params: params.map(str::to_string),
            chain_id: None,
        }
    }

    #[test]
    fn test_params_parse_as_json() {
        let args = request(Some(r#"["0x68656c6c6f", "0xabc"]"#))
            .arguments()
            .unwrap();
        assert_eq!(args.method, "personal_sign");
        assert_eq!(args.params, Some(json!(["0x68656c6c6f", "0xabc"])));
    }

    #[test]
    fn test_missing_params() {
        assert_eq!(request(None).arguments().unwrap().params, None);
    }

    #[test]
    fn test_malformed_params() {
        assert!(request(Some("[unclosed")).arguments().is_err());
    }

    #[tokio::test]
    async fn test_malformed_params_fail_before_loading_state() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::new(Some(dir.path().join("missing")));

        let error = request(Some("[unclosed")).execute(&ctx).await.unwrap_err();
        assert!(matches!(error, RequestError::Params(_)));
        assert!(error.to_string().starts_with("invalid params"));
    }

    #[test]
    fn test_render_result() {
        let rendered = render(&json!({"hash": MOCK_HASH})).unwrap();
        assert_eq!(rendered, format!("{{\n  \"hash\": \"{}\"\n}}", MOCK_HASH));
    }
}
