use crate::e2e::{Environment, OTHER_PRIVATE_KEY, demo_intent};
use alloy::{
    eips::eip7702::Authorization,
    primitives::{Address, U256},
    signers::{SignerSync, local::PrivateKeySigner},
};
use delegator::{
    constants::{DEFAULT_DELEGATE, DEMO_TARGET, SEPOLIA_CHAIN_ID},
    error::{AuthError, ClientError},
    types::{ReceiptStatus, UnsignedAuthorization},
};
use std::time::Duration;

/// The first send carries the authorization; once included, the account is delegated and the
/// next send goes without one.
#[tokio::test(flavor = "multi_thread")]
async fn delegates_on_first_send() -> eyre::Result<()> {
    let env = Environment::setup().await?;

    let receipt = env.client.delegate_and_send(vec![demo_intent()]).await?;
    assert_eq!(receipt.status, ReceiptStatus::Included);
    assert!(receipt.transaction_hash.is_some_and(|hash| !hash.is_zero()));
    assert_eq!(env.chain.delegation(env.eoa()), Some(DEFAULT_DELEGATE));

    let sent = env.bundler.sent();
    let auth = sent[0].eip7702_auth.as_ref().expect("first operation delegates");
    assert_eq!(*auth.chain_id(), U256::from(SEPOLIA_CHAIN_ID));
    assert_eq!(*auth.address(), DEFAULT_DELEGATE);
    assert_eq!(auth.nonce(), 0);
    assert_eq!(auth.recover_authority()?, env.eoa());

    let reads = env.chain.delegation_reads();
    let receipt = env.client.delegate_and_send(vec![demo_intent()]).await?;
    assert!(receipt.is_included());
    assert!(env.bundler.sent()[1].eip7702_auth.is_none());
    // Served from the session cache.
    assert_eq!(env.chain.delegation_reads(), reads);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn skips_authorization_when_already_delegated() -> eyre::Result<()> {
    let env = Environment::setup().await?;
    env.chain.delegate(env.eoa(), DEFAULT_DELEGATE);

    let unsigned = env.client.authorizations().build(SEPOLIA_CHAIN_ID, DEFAULT_DELEGATE).await?;
    assert!(unsigned.is_none());

    env.client.delegate_and_send(vec![demo_intent()]).await?;
    assert!(env.bundler.sent()[0].eip7702_auth.is_none());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn redelegates_account_delegated_elsewhere() -> eyre::Result<()> {
    let env = Environment::setup().await?;
    env.chain.delegate(env.eoa(), Address::repeat_byte(0x42));
    env.chain.set_nonce(env.eoa(), 7);

    let unsigned = env
        .client
        .authorizations()
        .build(SEPOLIA_CHAIN_ID, DEFAULT_DELEGATE)
        .await?
        .expect("delegate differs");
    assert_eq!(unsigned.nonce, 7);
    assert_eq!(unsigned.chain_id, SEPOLIA_CHAIN_ID);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn signed_authorization_recovers_to_identity() -> eyre::Result<()> {
    let env = Environment::setup().await?;
    let builder = env.client.authorizations();

    let unsigned = builder.build(SEPOLIA_CHAIN_ID, DEMO_TARGET).await?.expect("not delegated");
    assert_eq!(unsigned, UnsignedAuthorization::new(SEPOLIA_CHAIN_ID, DEMO_TARGET, 0));

    let signed = builder.sign(unsigned).await?;
    assert_eq!(signed.recover_authority()?, env.eoa());
    assert_eq!(*signed.chain_id(), U256::from(SEPOLIA_CHAIN_ID));
    assert_eq!(*signed.address(), DEMO_TARGET);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn submits_signed_authorization_until_included() -> eyre::Result<()> {
    let env = Environment::setup().await?;
    let builder = env.client.authorizations();
    let unsigned = builder.build(SEPOLIA_CHAIN_ID, DEFAULT_DELEGATE).await?.expect("not delegated");
    let signed = builder.sign(unsigned).await?;

    let handle = env.client.submit(vec![demo_intent()], Some(signed)).await?;
    let receipt = env.client.wait_for_inclusion(handle, Duration::from_secs(5)).await?;
    assert_eq!(receipt.status, ReceiptStatus::Included);
    assert_eq!(receipt.transaction_hash.map(|hash| hash.len()), Some(32));
    assert_eq!(env.chain.delegation(env.eoa()), Some(DEFAULT_DELEGATE));
    assert_eq!(env.chain.nonce_of(env.eoa()), 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_build_for_other_chain() -> eyre::Result<()> {
    let env = Environment::setup().await?;

    let err = env.client.authorizations().build(1, DEFAULT_DELEGATE).await.unwrap_err();
    assert!(matches!(err, ClientError::Auth(AuthError::ChainMismatch { expected, .. }) if expected == SEPOLIA_CHAIN_ID));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_foreign_authorization() -> eyre::Result<()> {
    let env = Environment::setup().await?;

    let other: PrivateKeySigner = OTHER_PRIVATE_KEY.parse()?;
    let auth = UnsignedAuthorization::new(SEPOLIA_CHAIN_ID, DEFAULT_DELEGATE, 0);
    let signature = other.sign_hash_sync(&auth.signature_hash())?;
    let signed = auth.into_signed(signature);

    let err = env.client.submit(vec![demo_intent()], Some(signed)).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Auth(AuthError::AuthorityMismatch { expected, got })
            if expected == env.eoa() && got == other.address()
    ));
    assert!(!err.is_retryable());
    assert!(env.sponsor.requests().is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_authorization_for_other_delegate_or_chain() -> eyre::Result<()> {
    let env = Environment::setup().await?;
    let signer: PrivateKeySigner = crate::e2e::EOA_PRIVATE_KEY.parse()?;

    let sign = |auth: Authorization| -> eyre::Result<_> {
        let signature = signer.sign_hash_sync(&auth.signature_hash())?;
        Ok(auth.into_signed(signature))
    };

    let wrong_delegate = sign(Authorization {
        chain_id: U256::from(SEPOLIA_CHAIN_ID),
        address: Address::repeat_byte(0x42),
        nonce: 0,
    })?;
    let err = env.client.submit(vec![demo_intent()], Some(wrong_delegate)).await.unwrap_err();
    assert!(matches!(err, ClientError::Auth(AuthError::UnexpectedDelegate { .. })));

    let wrong_chain =
        sign(Authorization { chain_id: U256::from(1), address: DEFAULT_DELEGATE, nonce: 0 })?;
    let err = env.client.submit(vec![demo_intent()], Some(wrong_chain)).await.unwrap_err();
    assert!(matches!(err, ClientError::Auth(AuthError::ChainMismatch { .. })));

    assert!(env.bundler.sent().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn never_submits_authorization_twice() -> eyre::Result<()> {
    let env = Environment::setup().await?;
    let builder = env.client.authorizations();

    let unsigned = builder.build(SEPOLIA_CHAIN_ID, DEFAULT_DELEGATE).await?.expect("not delegated");
    let signed = builder.sign(unsigned).await?;

    env.client.submit(vec![demo_intent()], Some(signed.clone())).await?;

    let err = env.client.submit(vec![demo_intent()], Some(signed)).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Auth(AuthError::AlreadySubmitted { nonce: 0, authority }) if authority == env.eoa()
    ));
    assert_eq!(env.bundler.sent().len(), 1);

    Ok(())
}

/// An authorization with a nonce below one already submitted is stale.
#[tokio::test(flavor = "multi_thread")]
async fn rejects_authorization_below_submitted_nonce() -> eyre::Result<()> {
    let env = Environment::setup().await?;
    let builder = env.client.authorizations();

    let first = builder.build(SEPOLIA_CHAIN_ID, DEFAULT_DELEGATE).await?.expect("not delegated");
    let second = builder.build(SEPOLIA_CHAIN_ID, DEFAULT_DELEGATE).await?.expect("not delegated");
    let first = builder.sign(first).await?;
    let second = builder.sign(second).await?;

    env.client.submit(vec![demo_intent()], Some(second)).await?;
    let err = env.client.submit(vec![demo_intent()], Some(first)).await.unwrap_err();
    assert!(matches!(err, ClientError::Auth(AuthError::AlreadySubmitted { nonce: 0, .. })));
    assert_eq!(env.bundler.sent().len(), 1);

    Ok(())
}
