use crate::e2e::{Environment, Wallet, demo_intent};
use alloy::primitives::U256;
use delegator::{
    constants::{DEFAULT_DELEGATE, SEPOLIA_CHAIN_ID},
    error::{ClientError, SignerError},
};

/// A rejected authorization request sends nothing and leaves its nonce for the next attempt.
#[tokio::test(flavor = "multi_thread")]
async fn refused_authorization_keeps_nonce() -> eyre::Result<()> {
    let env = Environment::setup().await?;
    let wallet = Wallet::new(env.signer.clone());
    let client = env.client_with(wallet.clone()).await?;

    wallet.refuse();
    let err = client.delegate_and_send(vec![demo_intent()]).await.unwrap_err();
    assert!(matches!(err, ClientError::Signer(SignerError::Denied(_))));
    assert!(env.sponsor.requests().is_empty());
    assert_eq!(env.bundler.send_attempts(), 0);

    let unsigned =
        client.authorizations().build(SEPOLIA_CHAIN_ID, DEFAULT_DELEGATE).await?.expect("not delegated");
    assert_eq!(unsigned.nonce, 0);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn delegates_after_user_approves() -> eyre::Result<()> {
    let env = Environment::setup().await?;
    let wallet = Wallet::new(env.signer.clone());
    let client = env.client_with(wallet.clone()).await?;

    wallet.refuse();
    client.delegate_and_send(vec![demo_intent()]).await.unwrap_err();

    wallet.approve();
    let receipt = client.delegate_and_send(vec![demo_intent()]).await?;
    assert!(receipt.is_included());

    let sent = env.bundler.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].eip7702_auth.as_ref().map(|auth| auth.nonce()), Some(0));
    assert_eq!(env.chain.delegation(env.eoa()), Some(DEFAULT_DELEGATE));

    Ok(())
}

/// An authorization whose operation was never signed can be submitted again.
#[tokio::test(flavor = "multi_thread")]
async fn refused_operation_signature_releases_authorization() -> eyre::Result<()> {
    let env = Environment::setup().await?;
    let wallet = Wallet::new(env.signer.clone());
    let client = env.client_with(wallet.clone()).await?;

    let builder = client.authorizations();
    let unsigned = builder.build(SEPOLIA_CHAIN_ID, DEFAULT_DELEGATE).await?.expect("not delegated");
    let signed = builder.sign(unsigned).await?;

    wallet.refuse();
    let err = client.submit(vec![demo_intent()], Some(signed.clone())).await.unwrap_err();
    assert!(matches!(err, ClientError::Signer(SignerError::Denied(_))));
    assert_eq!(env.sponsor.requests().len(), 1);
    assert_eq!(env.bundler.send_attempts(), 0);

    wallet.approve();
    client.submit(vec![demo_intent()], Some(signed)).await?;

    let sent = env.bundler.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].nonce, U256::ZERO);
    assert!(sent[0].eip7702_auth.is_some());

    Ok(())
}
