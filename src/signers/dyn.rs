//! Local key signer.
//!
//! A [`SigningProvider`] backed by a key held in memory, standing in for an embedded wallet.
use super::SigningProvider;
use crate::error::SignerError;
use alloy::{
    dyn_abi::TypedData,
    eips::eip7702::Authorization,
    network::{FullSigner, TxSigner},
    primitives::{Address, Signature},
    signers::{
        k256::ecdsa::SigningKey,
        local::{
            PrivateKeySigner,
            coins_bip39::{English, Mnemonic},
        },
    },
};
use std::{fmt, ops::Deref, str::FromStr, sync::Arc};

/// Abstraction over local signer.
#[derive(Clone)]
pub struct DynSigner(pub Arc<dyn FullSigner<Signature> + Send + Sync>);

impl fmt::Debug for DynSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DynSigner").field(&self.address()).finish()
    }
}

impl DynSigner {
    /// Derives given number of signers from a mnemonic.
    pub fn derive_from_mnemonic(
        mnemonic: Mnemonic<English>,
        num: usize,
    ) -> eyre::Result<Vec<Self>> {
        (0..num)
            .map(|idx| {
                let path = format!("m/44'/60'/0'/0/{idx}");
                let key = mnemonic.derive_key(path.as_str(), None)?;
                let key: &SigningKey = key.as_ref();
                Ok(Self(Arc::new(PrivateKeySigner::from_signing_key(key.clone()))))
            })
            .collect()
    }

    /// Derives the signer at `index` from a mnemonic phrase.
    pub fn from_mnemonic(phrase: &str, index: usize) -> eyre::Result<Self> {
        let mnemonic = Mnemonic::<English>::new_from_phrase(phrase)?;
        Self::derive_from_mnemonic(mnemonic, index + 1)?
            .pop()
            .ok_or_else(|| eyre::eyre!("no key derived at index {index}"))
    }

    /// Load a private key.
    pub fn from_signing_key(key: &str) -> eyre::Result<Self> {
        Ok(Self(Arc::new(PrivateKeySigner::from_str(key)?)))
    }

    /// A signer for a fresh random key.
    pub fn random() -> Self {
        Self(Arc::new(PrivateKeySigner::random()))
    }

    /// Returns the signer's Ethereum Address.
    pub fn address(&self) -> Address {
        TxSigner::address(&self.0)
    }
}

impl Deref for DynSigner {
    type Target = dyn FullSigner<Signature> + Send + Sync;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[async_trait::async_trait]
impl SigningProvider for DynSigner {
    async fn address(&self) -> Result<Address, SignerError> {
        Ok(DynSigner::address(self))
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        Ok(self.0.sign_message(message).await?)
    }

    async fn sign_typed_data(&self, payload: &TypedData) -> Result<Signature, SignerError> {
        let hash = payload
            .eip712_signing_hash()
            .map_err(|err| SignerError::Provider(alloy::signers::Error::other(err)))?;
        Ok(self.0.sign_hash(&hash).await?)
    }

    async fn sign_authorization(
        &self,
        authorization: &Authorization,
    ) -> Result<Signature, SignerError> {
        Ok(self.0.sign_hash(&authorization.signature_hash()).await?)
    }
}
