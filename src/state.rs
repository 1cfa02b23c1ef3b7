//! Caller-owned desk state
//!
//! Everything a front-end shows lives here, owned by the caller and handed
//! the session explicitly. The session itself stays stateless.

use tracing::{info, warn};

use crate::address::Address;
use crate::block::BlockSummary;
use crate::error::{Result, SessionError};
use crate::network::NetworkSnapshot;
use crate::session::{Balance, LedgerSession};
use crate::transfer::{TransferRequest, TransferResult, TxHash};

#[derive(Debug, Clone, Default)]
pub struct DeskState {
    pub network: Option<NetworkSnapshot>,
    pub accounts: Vec<Address>,
    pub sender: Option<Address>,
    pub recipient: Option<Address>,
    /// Balance of `sender`, from the latest successful query only.
    pub balance: Option<Balance>,
    pub latest_block: Option<BlockSummary>,
    pub last_transfer: Option<TransferResult>,
}

impl DeskState {
    /// Initial population: network, accounts, default pair, sender balance.
    ///
    /// A failed network probe is tolerated and leaves `network` empty; a
    /// failed account listing is not.
    pub async fn load(session: &LedgerSession) -> Result<Self> {
        let mut state = DeskState::default();

        match session.describe_network().await {
            Ok(snapshot) => state.network = Some(snapshot),
            Err(e) => warn!(error = %e, "desk.network_unavailable"),
        }

        state.accounts = session.list_accounts().await?;
        state.sender = state.accounts.first().cloned();
        state.recipient = state.accounts.get(1).cloned();

        if let Some(sender) = state.sender.clone() {
            state.balance = Some(session.get_balance(sender.as_str()).await?);
        }

        info!(
            accounts = state.accounts.len(),
            sender = ?state.sender.as_ref().map(|a| a.to_string()),
            "desk.loaded"
        );
        Ok(state)
    }

    /// Switch sender and fetch its balance. The previous balance is dropped first.
    pub async fn select_sender(&mut self, session: &LedgerSession, account: &str) -> Result<()> {
        let account = Address::parse(account)?;
        self.sender = Some(account.clone());
        self.balance = None;
        self.balance = Some(session.get_balance(account.as_str()).await?);
        Ok(())
    }

    pub fn select_recipient(&mut self, account: &str) -> Result<()> {
        self.recipient = Some(Address::parse(account)?);
        Ok(())
    }

    /// Re-query the sender balance and, if one is shown, the network snapshot.
    pub async fn refresh(&mut self, session: &LedgerSession) -> Result<()> {
        if let Some(sender) = &self.sender {
            self.balance = Some(session.get_balance(sender.as_str()).await?);
        }
        if self.network.is_some() {
            self.network = Some(session.describe_network().await?);
        }
        Ok(())
    }

    /// Submit `amount` from sender to recipient, then refresh.
    ///
    /// The outcome is kept as `last_transfer` regardless of success. The
    /// refresh is only issued after the node answered the submission.
    pub async fn transfer(&mut self, session: &LedgerSession, amount: &str) -> TransferResult {
        let request = TransferRequest::new(
            self.sender.as_ref().map(|a| a.to_string()).unwrap_or_default(),
            self.recipient.as_ref().map(|a| a.to_string()).unwrap_or_default(),
            amount,
        );

        let outcome = session.submit_transfer(&request).await;
        self.last_transfer = Some(outcome.clone());

        let tx_hash: TxHash = outcome?;
        if let Err(e) = self.refresh(session).await {
            // The transfer itself went through; only the follow-up read failed.
            warn!(error = %e, "desk.refresh_after_transfer_failed");
        }
        Ok(tx_hash)
    }

    pub async fn view_latest_block(&mut self, session: &LedgerSession) -> Result<&BlockSummary> {
        let summary = session.fetch_latest_block().await?;
        Ok(self.latest_block.insert(summary))
    }

    pub fn close_block_panel(&mut self) {
        self.latest_block = None;
    }

    /// Status line for the last transfer attempt, if any.
    pub fn status_message(&self) -> Option<String> {
        self.last_transfer.as_ref().map(|outcome| match outcome {
            Ok(hash) => format!("Transaction successful! TX: {}", hash),
            Err(SessionError::Validation(msg)) => format!("Please fix the form: {}", msg),
            Err(e) => e.to_string(),
        })
    }
}
