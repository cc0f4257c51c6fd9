//! Submission handles and inclusion receipts.

use alloy::primitives::{B256, BlockHash, BlockNumber, TxHash, wrap_fixed_bytes};
use serde::{Deserialize, Serialize};

wrap_fixed_bytes! {
    /// An identifier for a submitted bundle.
    ///
    /// This is the user operation hash returned by the bundler. It is known before the operation
    /// lands on chain and stays valid for tracking afterwards.
    ///
    /// Clients should treat this as an opaque value and not attempt to parse it.
    pub struct SubmissionHandle<32>;
}

/// Inclusion status of a submitted bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReceiptStatus {
    /// The bundle has not been included yet.
    Pending,
    /// The bundle was included and executed successfully.
    Included,
    /// The bundle was included but execution reverted.
    Failed {
        /// Revert reason reported by the bundler, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl ReceiptStatus {
    /// Whether the status can no longer change.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The block a bundle was included in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReference {
    /// Block number.
    pub number: BlockNumber,
    /// Block hash.
    pub hash: BlockHash,
}

/// The receipt of a submitted bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// The handle the bundle was submitted under.
    pub handle: SubmissionHandle,
    /// Hash of the transaction that included the bundle.
    pub transaction_hash: Option<TxHash>,
    /// Inclusion status.
    #[serde(flatten)]
    pub status: ReceiptStatus,
    /// The block the bundle was included in.
    pub block: Option<BlockReference>,
}

impl TransactionReceipt {
    /// A receipt for a bundle that is not included yet.
    pub const fn pending(handle: SubmissionHandle) -> Self {
        Self { handle, transaction_hash: None, status: ReceiptStatus::Pending, block: None }
    }

    /// Whether the receipt can no longer change.
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the bundle was included and executed successfully.
    pub const fn is_included(&self) -> bool {
        matches!(self.status, ReceiptStatus::Included)
    }
}

/// Receipt returned by `eth_getUserOperationReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    /// The user operation hash.
    pub user_op_hash: B256,
    /// Whether execution succeeded.
    pub success: bool,
    /// Revert reason, if execution failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The receipt of the bundle transaction.
    pub receipt: InclusionReceipt,
}

/// Transaction receipt fields of a [`UserOperationReceipt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionReceipt {
    /// Transaction hash.
    pub transaction_hash: TxHash,
    /// Block hash.
    pub block_hash: BlockHash,
    /// Block number.
    #[serde(with = "alloy::serde::quantity")]
    pub block_number: BlockNumber,
}

impl UserOperationReceipt {
    /// Converts into a terminal [`TransactionReceipt`].
    pub fn into_receipt(self, handle: SubmissionHandle) -> TransactionReceipt {
        let status = if self.success {
            ReceiptStatus::Included
        } else {
            ReceiptStatus::Failed { reason: self.reason }
        };

        TransactionReceipt {
            handle,
            transaction_hash: Some(self.receipt.transaction_hash),
            status,
            block: Some(BlockReference {
                number: self.receipt.block_number,
                hash: self.receipt.block_hash,
            }),
        }
    }
}
