use clap::Args;

use common::signer::SignerError;

use crate::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Connect;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("connect failed ({}): {0}", .0.code())]
    Signer(#[from] SignerError),
}

#[async_trait::async_trait]
impl crate::op::Op for Connect {
    type Error = ConnectError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session()?;
        let accounts = session.connect().await?;
        let chain = session.get_chain().await;

        let mut output = format!("Connected on chain {}", chain.id);
        if let Some(rpc_url) = chain.rpc_url {
            output.push_str(&format!(" ({})", rpc_url));
        }
        for account in accounts {
            output.push_str(&format!("\n- {}", account));
        }
        Ok(output)
    }
}
