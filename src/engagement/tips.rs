// Tipping: moving YallPoints from the viewer to another profile.
//
// Not optimistic. Every precondition is checked before the first remote
// call, then three dependent writes run in order:
//
//   1. insert the tip record
//   2. set the sender's balance to (cached balance - amount)
//   3. credit the recipient's lifetime-earned counter
//
// The writes are not atomic. A failure after step 1 leaves a partial
// ledger; it is logged at error level and reported with the failed stage.
// No compensation is attempted.

use tracing::{error, info};

use crate::db::models::{NewTip, TipTransaction};
use crate::error::{EngagementError, TipStage};
use crate::identity::AppContext;

/// Number of wallet entries shown by default.
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

#[derive(Debug, Clone)]
pub struct TipReceipt {
    pub transaction: TipTransaction,
    pub recipient_label: String,
    /// The sender's balance after the debit.
    pub new_balance: u32,
}

pub async fn send_tip(
    ctx: &AppContext,
    recipient_id: &str,
    post_id: Option<&str>,
    amount: u32,
) -> Result<TipReceipt, EngagementError> {
    let sender = ctx.require_viewer()?;
    if amount == 0 {
        return Err(EngagementError::InvalidAmount);
    }

    if sender.balance < amount {
        return Err(EngagementError::InsufficientFunds {
            balance: sender.balance,
            amount,
        });
    }

    let store = ctx.store();
    let recipient = store
        .get_profile(recipient_id)
        .await
        .map_err(|e| EngagementError::read("look up recipient", e))?
        .ok_or_else(|| EngagementError::UnknownRecipient(recipient_id.to_string()))?;

    let tip = NewTip {
        sender_id: sender.id.clone(),
        receiver_id: recipient.id.clone(),
        post_id: post_id.map(str::to_string),
        amount,
        is_profile_tip: post_id.is_none(),
    };
    let transaction = store
        .insert_tip(&tip)
        .await
        .map_err(|e| EngagementError::write("send tip", e))?;

    let new_balance = sender.balance - amount;
    if let Err(e) = store.set_balance(&sender.id, new_balance).await {
        return Err(partial(TipStage::Debit, &transaction, e));
    }
    if let Err(e) = store.increment_earned_points(&recipient.id, amount).await {
        ctx.set_cached_balance(&sender.id, new_balance);
        return Err(partial(TipStage::Credit, &transaction, e));
    }

    ctx.set_cached_balance(&sender.id, new_balance);
    info!(
        tip_id = %transaction.id,
        from = %sender.id,
        to = %recipient.id,
        amount,
        new_balance,
        "Tip sent"
    );

    Ok(TipReceipt {
        transaction,
        recipient_label: recipient.label().to_string(),
        new_balance,
    })
}

fn partial(stage: TipStage, tip: &TipTransaction, err: anyhow::Error) -> EngagementError {
    error!(
        tip_id = %tip.id,
        stage = stage.as_str(),
        error = %err,
        "Tip partially applied, ledger may be inconsistent"
    );
    EngagementError::TipFailed {
        stage,
        message: format!("{err:#}"),
    }
}

/// Which side of a wallet entry the viewer was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone)]
pub struct WalletEntry {
    pub direction: TipDirection,
    pub transaction: TipTransaction,
}

/// The viewer's sent and received tips, newest first.
pub async fn tip_history(ctx: &AppContext, limit: u32) -> Result<Vec<WalletEntry>, EngagementError> {
    let viewer = ctx.require_viewer()?;
    let tips = ctx
        .store()
        .fetch_tips_for_user(&viewer.id, limit)
        .await
        .map_err(|e| EngagementError::read("load wallet", e))?;

    Ok(tips
        .into_iter()
        .map(|transaction| WalletEntry {
            direction: if transaction.sender_id == viewer.id {
                TipDirection::Sent
            } else {
                TipDirection::Received
            },
            transaction,
        })
        .collect())
}
