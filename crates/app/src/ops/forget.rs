use clap::Args;

use common::signer::SignerError;

use crate::state::StateError;

/// Forget the signer kind chosen in an earlier session
#[derive(Args, Debug, Clone)]
pub struct Forget;

#[derive(Debug, thiserror::Error)]
pub enum ForgetError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("forget failed: {0}")]
    Signer(#[from] SignerError),
}

#[async_trait::async_trait]
impl crate::op::Op for Forget {
    type Error = ForgetError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session()?;
        session.disconnect().await?;
        Ok("Cleared persisted signer session state".to_string())
    }
}
