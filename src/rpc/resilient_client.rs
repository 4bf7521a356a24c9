use crate::monitoring::metrics;
use crate::rpc::{ChainRpc, HolderBalance, TokenBalanceLeg, TransactionBalances, ui_amount_from_raw};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use solana_client::{
    client_error::{ClientError, ClientErrorKind, Result as ClientResult},
    nonblocking::rpc_client::RpcClient,
    rpc_config::RpcTransactionConfig,
};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};
use solana_transaction_status::{UiTransactionEncoding, UiTransactionTokenBalance};
use std::{future::Future, str::FromStr, sync::Arc, time::{Duration, Instant}};
use tokio::time::{sleep, timeout};
use tracing::warn;

/// Un "wrapper" autour du RpcClient de Solana : délai maximum sur chaque appel,
/// ré-essai automatique des lectures idempotentes en cas d'erreur réseau temporaire.
#[derive(Clone)]
pub struct ResilientRpcClient {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
    max_retries: u8,
    delay_ms: u64,
    request_timeout: Duration,
}

impl ResilientRpcClient {
    pub fn new(
        rpc_url: String,
        commitment: CommitmentConfig,
        max_retries: u8,
        delay_ms: u64,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client: Arc::new(RpcClient::new_with_commitment(rpc_url, commitment)),
            commitment,
            max_retries,
            delay_ms,
            request_timeout,
        }
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    /// Détermine si une erreur du client est temporaire.
    fn is_retryable(error: &ClientError) -> bool {
        matches!(
            error.kind(),
            ClientErrorKind::Reqwest(_) | ClientErrorKind::RpcError(_) | ClientErrorKind::Io(_)
        )
    }

    /// Un seul essai, borné par le délai maximum. Un dépassement de délai est une erreur comme une autre.
    async fn single_attempt<T, Fut>(&self, method: &'static str, call: Fut) -> Result<T>
    where
        Fut: Future<Output = ClientResult<T>>,
    {
        let started = Instant::now();
        let outcome = timeout(self.request_timeout, call).await;
        metrics::RPC_REQUEST_LATENCY
            .with_label_values(&[method])
            .observe(started.elapsed().as_secs_f64());
        match outcome {
            Ok(result) => result.with_context(|| format!("Échec de {method}")),
            Err(_) => Err(anyhow!("{method} : délai de {:?} dépassé", self.request_timeout)),
        }
    }

    async fn with_retry<T, F, Fut>(&self, method: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut attempt: u8 = 0;
        loop {
            let started = Instant::now();
            let outcome = timeout(self.request_timeout, call()).await;
            metrics::RPC_REQUEST_LATENCY
                .with_label_values(&[method])
                .observe(started.elapsed().as_secs_f64());

            match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    if !Self::is_retryable(&e) || attempt >= self.max_retries {
                        return Err(e).with_context(|| format!("Échec final de {method}"));
                    }
                    warn!(method, attempt, error = %e, "[RPC] Erreur temporaire, nouvelle tentative.");
                }
                Err(_) => {
                    if attempt >= self.max_retries {
                        bail!("{method} : délai de {:?} dépassé après {} tentative(s)", self.request_timeout, attempt + 1);
                    }
                    warn!(method, attempt, "[RPC] Délai dépassé, nouvelle tentative.");
                }
            }
            attempt += 1;
            sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }
}

fn parse_pubkey(value: &str, what: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).with_context(|| format!("{what} invalide : {value}"))
}

fn leg_from_ui_balance(balance: &UiTransactionTokenBalance) -> Result<TokenBalanceLeg> {
    let mint = parse_pubkey(&balance.mint, "mint")?;
    let owner: Option<String> = balance.owner.clone().into();
    let owner = owner.as_deref().map(|o| parse_pubkey(o, "owner")).transpose()?;
    let raw_amount: u64 = balance
        .ui_token_amount
        .amount
        .parse()
        .with_context(|| format!("montant brut invalide pour le mint {mint}"))?;
    let decimals = balance.ui_token_amount.decimals;
    // `uiAmount` est nul sur certains nœuds : on le reconstruit depuis le montant brut.
    let ui_amount = balance
        .ui_token_amount
        .ui_amount
        .unwrap_or_else(|| ui_amount_from_raw(raw_amount, decimals));

    Ok(TokenBalanceLeg {
        account_index: balance.account_index,
        mint,
        owner,
        raw_amount,
        decimals,
        ui_amount,
    })
}

fn ui_amount_or_parse(ui_amount: Option<f64>, ui_amount_string: &str) -> Result<f64> {
    match ui_amount {
        Some(value) => Ok(value),
        None => ui_amount_string
            .parse()
            .with_context(|| format!("montant UI invalide : {ui_amount_string}")),
    }
}

#[async_trait]
impl ChainRpc for ResilientRpcClient {
    async fn get_transaction_balances(&self, signature: &Signature) -> Result<TransactionBalances> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };
        let transaction = self
            .single_attempt("getTransaction", self.client.get_transaction_with_config(signature, config))
            .await?;

        let meta = transaction
            .transaction
            .meta
            .ok_or_else(|| anyhow!("Transaction {signature} sans meta"))?;

        let balances: Option<Vec<UiTransactionTokenBalance>> = meta.post_token_balances.into();
        let post_token_balances = balances
            .unwrap_or_default()
            .iter()
            .map(leg_from_ui_balance)
            .collect::<Result<Vec<_>>>()?;

        Ok(TransactionBalances {
            failed: meta.err.is_some(),
            post_token_balances,
        })
    }

    async fn get_account_data(&self, address: &Pubkey) -> Result<Vec<u8>> {
        let client = self.client.as_ref();
        self.with_retry("getAccountInfo", move || client.get_account_data(address))
            .await
            .with_context(|| format!("Compte {address} illisible"))
    }

    async fn get_token_supply(&self, mint: &Pubkey) -> Result<f64> {
        let client = self.client.as_ref();
        let commitment = self.commitment;
        let supply = self
            .with_retry("getTokenSupply", move || client.get_token_supply_with_commitment(mint, commitment))
            .await?
            .value;
        ui_amount_or_parse(supply.ui_amount, &supply.ui_amount_string)
    }

    async fn get_token_largest_accounts(&self, mint: &Pubkey) -> Result<Vec<HolderBalance>> {
        let client = self.client.as_ref();
        let accounts = self
            .with_retry("getTokenLargestAccounts", move || {
                client.get_token_largest_accounts_with_commitment(mint, CommitmentConfig::finalized())
            })
            .await?
            .value;

        accounts
            .into_iter()
            .map(|account| {
                Ok(HolderBalance {
                    address: parse_pubkey(&account.address, "holder")?,
                    ui_amount: ui_amount_or_parse(account.amount.ui_amount, &account.amount.ui_amount_string)?,
                })
            })
            .collect()
    }
}
