//! Associated token account preparation for Solana swaps

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use std::str::FromStr;
use tracing::{debug, info};

use crate::domain::account::{AccountPreparer, PreparationTicket};
use crate::shared::errors::PreconditionError;

pub const SPL_TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Checks that the recipient owns an ATA for the output mint.
pub struct AssociatedTokenAccountPreparer {
    client: RpcClient,
    token_program: Pubkey,
    commitment: CommitmentConfig,
}

impl AssociatedTokenAccountPreparer {
    pub fn new(rpc_url: String, token_program: &str, commitment: CommitmentConfig) -> Result<Self, PreconditionError> {
        Ok(Self {
            client: RpcClient::new_with_commitment(rpc_url, commitment),
            token_program: parse_pubkey(token_program)?,
            commitment,
        })
    }

    /// Address of `owner`'s token account for `mint`.
    pub fn associated_address(&self, owner: &str, mint: &str) -> Result<Pubkey, PreconditionError> {
        let owner = parse_pubkey(owner)?;
        let mint = parse_pubkey(mint)?;
        Ok(get_associated_token_address_with_program_id(&owner, &mint, &self.token_program))
    }
}

fn parse_pubkey(address: &str) -> Result<Pubkey, PreconditionError> {
    Pubkey::from_str(address).map_err(|e| PreconditionError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl AccountPreparer for AssociatedTokenAccountPreparer {
    async fn is_prepared(&self, owner: &str, token_out: &str) -> Result<bool, PreconditionError> {
        let ata = self.associated_address(owner, token_out)?;
        let account = self
            .client
            .get_account_with_commitment(&ata, self.commitment)
            .await
            .map_err(|e| PreconditionError::Rpc(e.to_string()))?;

        let exists = account.value.is_some();
        debug!("ATA {} for owner {} exists: {}", ata, owner, exists);
        Ok(exists)
    }

    async fn prepare(&self, payer: &str, owner: &str, token_out: &str) -> Result<PreparationTicket, PreconditionError> {
        let payer_key = parse_pubkey(payer)?;
        let owner_key = parse_pubkey(owner)?;
        let mint = parse_pubkey(token_out)?;
        let ata = get_associated_token_address_with_program_id(&owner_key, &mint, &self.token_program);

        let instruction = create_associated_token_account_idempotent(&payer_key, &owner_key, &mint, &self.token_program);
        let payload = bincode::serialize(&instruction).map_err(|e| PreconditionError::Encode(e.to_string()))?;

        info!("📝 ATA {} must be created before swapping into {}", ata, token_out);
        Ok(PreparationTicket {
            account: ata.to_string(),
            payload,
            description: format!("Create associated token account {} for mint {}", ata, token_out),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use solana_sdk::instruction::Instruction;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn preparer(url: String) -> AssociatedTokenAccountPreparer {
        AssociatedTokenAccountPreparer::new(url, SPL_TOKEN_PROGRAM, CommitmentConfig::confirmed()).unwrap()
    }

    #[tokio::test]
    async fn test_prepare_builds_idempotent_create_instruction() {
        let owner = Pubkey::new_unique();
        let preparer = preparer("http://127.0.0.1:1".to_string());

        let ticket = preparer.prepare(&owner.to_string(), &owner.to_string(), USDC).await.unwrap();
        let expected = preparer.associated_address(&owner.to_string(), USDC).unwrap();
        assert_eq!(ticket.account, expected.to_string());

        let instruction: Instruction = bincode::deserialize(&ticket.payload).unwrap();
        assert_eq!(instruction.program_id, spl_associated_token_account::id());
        assert!(instruction.accounts.iter().any(|meta| meta.pubkey == expected));
    }

    #[tokio::test]
    async fn test_invalid_addresses_rejected() {
        let preparer = preparer("http://127.0.0.1:1".to_string());
        let err = preparer.prepare("not-a-key", "not-a-key", USDC).await.unwrap_err();
        assert!(matches!(err, PreconditionError::InvalidAddress { .. }));

        assert!(AssociatedTokenAccountPreparer::new("http://127.0.0.1:1".to_string(), "0xdead", CommitmentConfig::confirmed()).is_err());
    }

    #[tokio::test]
    async fn test_missing_account_reported_unprepared() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "result": { "context": { "slot": 1 }, "value": null },
                "id": 1
            })))
            .mount(&server)
            .await;

        let owner = Pubkey::new_unique().to_string();
        assert!(!preparer(server.uri()).is_prepared(&owner, USDC).await.unwrap());
    }

    #[tokio::test]
    async fn test_rpc_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "error": { "code": -32005, "message": "node is behind" },
                "id": 1
            })))
            .mount(&server)
            .await;

        let owner = Pubkey::new_unique().to_string();
        let err = preparer(server.uri()).is_prepared(&owner, USDC).await.unwrap_err();
        assert!(matches!(err, PreconditionError::Rpc(_)));
    }
}
