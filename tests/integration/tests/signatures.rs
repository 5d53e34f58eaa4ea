//! Signature engine integration tests.

use sso_crypto::SignatureError;
use sso_protocol_saml::bindings::marshall;
use sso_protocol_saml::signature::{
    sign_document, sign_query_string, verify_document, verify_query_string, SignatureAlgorithm,
    SignatureConfig, XmlSigner,
};
use sso_protocol_saml::types::{digest_algorithms, signature_algorithms};

use crate::common::{
    unsigned_request, KeyPair, IDP_RSA, OTHER_RSA, SP_EC256, SP_EC384, SP_EC521, SP_RSA,
};

fn algorithms() -> [(SignatureAlgorithm, &'static KeyPair); 6] {
    [
        (SignatureAlgorithm::RsaSha256, &SP_RSA),
        (SignatureAlgorithm::RsaSha384, &SP_RSA),
        (SignatureAlgorithm::RsaSha512, &SP_RSA),
        (SignatureAlgorithm::EcdsaSha256, &SP_EC256),
        (SignatureAlgorithm::EcdsaSha384, &SP_EC384),
        (SignatureAlgorithm::EcdsaSha512, &SP_EC521),
    ]
}

/// Splits a signed query into the signed prefix and the decoded signature.
fn split_signed(query: &str) -> anyhow::Result<(String, String)> {
    let (content, signature) = query
        .split_once("&Signature=")
        .ok_or_else(|| anyhow::anyhow!("no Signature in {query}"))?;
    Ok((content.to_string(), urlencoding::decode(signature)?.into_owned()))
}

/// Tests query-string signing and verification for every supported algorithm,
/// and that flipping any single bit of the signed content breaks verification.
#[test]
fn test_query_string_sign_verify_every_algorithm() -> anyhow::Result<()> {
    for (algorithm, key) in algorithms() {
        let mut query = "SAMLRequest=fZJBT8MwDIX%2FSpR7m7RdN4jWSUsQ&RelayState=abc".to_string();
        sign_query_string(&mut query, algorithm.uri(), &key.credential()?)?;

        let (content, signature) = split_signed(&query)?;
        let certificate = key.certificate_der()?;
        assert!(
            verify_query_string(&content, algorithm.uri(), &signature, &certificate)?,
            "{algorithm:?} did not verify"
        );

        for position in 0..content.len() {
            let mut bytes = content.clone().into_bytes();
            bytes[position] ^= 0x01;
            let mutated = String::from_utf8(bytes)?;
            assert!(
                !verify_query_string(&mutated, algorithm.uri(), &signature, &certificate)?,
                "{algorithm:?} verified content with byte {position} flipped"
            );
        }
    }
    Ok(())
}

/// Tests enveloped document signing and verification for every supported
/// algorithm.
#[test]
fn test_document_sign_verify_every_algorithm() -> anyhow::Result<()> {
    for (algorithm, key) in algorithms() {
        let credential = key.credential()?;
        let mut request = unsigned_request("_doc").with_provider_name("Original");
        XmlSigner::new(&credential)
            .with_config(SignatureConfig::with_algorithm(algorithm))
            .sign(&mut request)?;

        let xml = marshall(&request);
        let certificate = key.certificate_der()?;
        assert!(verify_document(&xml, &certificate)?, "{algorithm:?} did not verify");

        let mutated = xml.replace("ProviderName=\"Original\"", "ProviderName=\"Mutated\"");
        assert!(
            !verify_document(&mutated, &certificate)?,
            "{algorithm:?} verified mutated document"
        );
    }
    Ok(())
}

/// Tests that verification uses the registered certificate, never the one
/// embedded in the request.
#[test]
fn test_embedded_certificate_is_not_trusted() -> anyhow::Result<()> {
    let mut request = unsigned_request("_embedded");
    sign_document(
        &mut request,
        signature_algorithms::RSA_SHA256,
        digest_algorithms::SHA256,
        true,
        &OTHER_RSA.credential()?,
    )?;
    let xml = marshall(&request);
    assert!(xml.contains("X509Certificate"));

    assert!(!verify_document(&xml, &SP_RSA.certificate_der()?)?);
    assert!(verify_document(&xml, &OTHER_RSA.certificate_der()?)?);
    Ok(())
}

/// Tests that a query signed by one key does not verify with another.
#[test]
fn test_query_signature_wrong_certificate() -> anyhow::Result<()> {
    let mut query = "SAMLRequest=abc".to_string();
    sign_query_string(&mut query, signature_algorithms::RSA_SHA256, &IDP_RSA.credential()?)?;
    let (content, signature) = split_signed(&query)?;

    assert!(!verify_query_string(
        &content,
        signature_algorithms::RSA_SHA256,
        &signature,
        &SP_RSA.certificate_der()?
    )?);
    Ok(())
}

/// Tests that malformed algorithm and signature input is a verification
/// failure rather than an error, while an unusable certificate is an error.
#[test]
fn test_verification_failure_modes() -> anyhow::Result<()> {
    let certificate = SP_RSA.certificate_der()?;

    assert!(!verify_query_string("SAMLRequest=abc", "urn:example:none", "AAAA", &certificate)?);
    assert!(!verify_query_string(
        "SAMLRequest=abc",
        signature_algorithms::RSA_SHA256,
        "***",
        &certificate
    )?);
    assert!(!verify_query_string(
        "SAMLRequest=abc",
        signature_algorithms::RSA_SHA1,
        "AAAA",
        &certificate
    )?);

    let err = verify_query_string(
        "SAMLRequest=abc",
        signature_algorithms::RSA_SHA256,
        "AAAA",
        b"not a certificate",
    )
    .unwrap_err();
    assert!(err.is_configuration_error());
    Ok(())
}

/// Tests that SHA-1 is never used to sign.
#[test]
fn test_sha1_signing_is_refused() -> anyhow::Result<()> {
    let mut query = "SAMLRequest=abc".to_string();
    let err = sign_query_string(&mut query, signature_algorithms::RSA_SHA1, &SP_RSA.credential()?)
        .unwrap_err();
    assert!(matches!(err, SignatureError::UnsupportedAlgorithm(_)));
    assert_eq!(query, "SAMLRequest=abc");
    Ok(())
}
