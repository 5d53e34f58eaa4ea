//! Request validation integration tests.

use sso_protocol_saml::bindings::{marshall, SIGNATURE};
use sso_protocol_saml::inbound::SsoRedirectParams;
use sso_protocol_saml::signature::{verify_document, SignatureConfig, XmlSigner};
use sso_protocol_saml::types::{status_codes, NameId, Subject};
use sso_protocol_saml::validator::{
    FailureKind, ValidationFailure, ValidationOutcome, ValidationStage,
};

use crate::common::{
    post_form, redirect, signed_redirect, signing_sp_request, unsigned_request, TestEnv, ACS_URL,
    IDP_RSA, OTHER_RSA, SIGNING_ACS_URL, SIGNING_SP_ENTITY_ID, SP_ENTITY_ID, SP_RSA,
};

fn expect_failure(outcome: ValidationOutcome) -> anyhow::Result<ValidationFailure> {
    match outcome {
        ValidationOutcome::Failed(failure) => Ok(failure),
        ValidationOutcome::Validated(request) => {
            anyhow::bail!("request was unexpectedly validated: {request:?}")
        }
    }
}

/// Tests that a plain request from an unsigned SP validates on both bindings.
#[test]
fn test_unsigned_request_validates() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let request = unsigned_request("_plain").is_passive(true);

    let (params, query) = redirect(&request, Some("state-1"))?;
    let outcome = env.validator.handle_redirect(&params, Some(&query));
    let validated = outcome
        .validated()
        .ok_or_else(|| anyhow::anyhow!("redirect request failed: {outcome:?}"))?;
    assert_eq!(validated.service_provider_id, SP_ENTITY_ID);
    assert_eq!(validated.assertion_consumer_url, ACS_URL);
    assert_eq!(validated.request_id, "_plain");
    assert!(validated.is_passive);
    assert_eq!(outcome.relay_state(), Some("state-1"));

    let outcome = env
        .validator
        .handle_post(&post_form(&marshall(&request), None));
    assert!(outcome.is_validated(), "{outcome:?}");
    Ok(())
}

/// Tests that a missing issuer is reported before an invalid ACS URL.
#[test]
fn test_issuer_checked_before_acs() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let request = unsigned_request("_noissuer")
        .with_issuer(None)
        .with_acs_url("https://attacker.example.com/acs");

    let failure = expect_failure(
        env.validator
            .handle_post(&post_form(&marshall(&request), None)),
    )?;
    assert_eq!(failure.status_code, status_codes::REQUESTER);
    assert!(failure.message.contains("Cannot find issuer"));
    assert_eq!(failure.in_response_to, "_noissuer");
    assert_eq!(failure.acs_url_for_error, env.config.error_page_url);
    Ok(())
}

/// Tests that an unregistered ACS URL is rejected for an unsigned SP.
#[test]
fn test_unsigned_acs_mismatch() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let request = unsigned_request("_acs").with_acs_url("https://attacker.example.com/acs");

    let (params, query) = redirect(&request, None)?;
    let failure = expect_failure(env.validator.handle_redirect(&params, Some(&query)))?;
    assert_eq!(failure.status_code, status_codes::REQUESTER);
    assert!(failure.message.contains("Invalid Assertion Consumer"));
    assert_ne!(failure.acs_url_for_error, "https://attacker.example.com/acs");
    Ok(())
}

/// Tests that SAML 1.1 requests get a VersionMismatch status.
#[test]
fn test_version_mismatch() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let request = unsigned_request("_v11").with_version("1.1");

    let failure = expect_failure(
        env.validator
            .handle_post(&post_form(&marshall(&request), None)),
    )?;
    assert_eq!(failure.status_code, status_codes::VERSION_MISMATCH);
    assert_eq!(failure.in_response_to, "_v11");
    assert_eq!(failure.acs_url_for_error, ACS_URL);
    Ok(())
}

/// Tests that an AuthnRequest may not pre-assert a subject confirmation.
#[test]
fn test_subject_confirmation_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let subject = Subject::new(NameId::new("alice@example.com"))
        .with_confirmation("urn:oasis:names:tc:SAML:2.0:cm:bearer");
    let request = unsigned_request("_subject").with_subject(subject);

    let failure = expect_failure(
        env.validator
            .handle_post(&post_form(&marshall(&request), None)),
    )?;
    assert_eq!(failure.status_code, status_codes::REQUESTER);
    assert!(failure.message.contains("Subject confirmation method found"));
    assert_eq!(failure.stage, ValidationStage::VersionChecked);
    Ok(())
}

/// Tests that an attribute consuming index below one is dropped and a
/// positive one is propagated.
#[test]
fn test_attribute_consuming_service_index() -> anyhow::Result<()> {
    let env = TestEnv::new()?;

    for (index, expected) in [(0, None), (5, Some(5))] {
        let request = unsigned_request("_acsi")
            .with_subject(Subject::new(NameId::new("alice@example.com")))
            .with_attribute_consuming_service_index(index);
        let outcome = env
            .validator
            .handle_post(&post_form(&marshall(&request), None));
        let validated = outcome
            .validated()
            .ok_or_else(|| anyhow::anyhow!("index {index} failed: {outcome:?}"))?;
        assert_eq!(validated.attribute_consuming_service_index, expected);
        assert_eq!(validated.subject_hint(), Some("alice@example.com"));
    }
    Ok(())
}

/// Tests a correctly signed Redirect request from the signing SP.
#[test]
fn test_signed_redirect_validates() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let (params, query) = signed_redirect(&signing_sp_request("_signed"), Some("rs"), &SP_RSA)?;

    let outcome = env.validator.handle_redirect(&params, Some(&query));
    let validated = outcome
        .validated()
        .ok_or_else(|| anyhow::anyhow!("signed request failed: {outcome:?}"))?;
    assert_eq!(validated.service_provider_id, SIGNING_SP_ENTITY_ID);
    assert_eq!(validated.assertion_consumer_url, SIGNING_ACS_URL);
    Ok(())
}

/// Tests that a corrupted signature yields an error response without
/// assertions, addressed to the captured ACS URL.
#[test]
fn test_corrupted_signature_error_response() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let (params, query) = signed_redirect(&signing_sp_request("_corrupt"), Some("rs"), &SP_RSA)?;

    let (prefix, signature) = query
        .split_once(&format!("&{SIGNATURE}="))
        .ok_or_else(|| anyhow::anyhow!("query is not signed"))?;
    let (_, other_query) =
        signed_redirect(&signing_sp_request("_corrupt"), Some("rs"), &OTHER_RSA)?;
    let (_, other_signature) = other_query
        .split_once(&format!("&{SIGNATURE}="))
        .ok_or_else(|| anyhow::anyhow!("query is not signed"))?;
    assert_ne!(signature, other_signature);

    let corrupted = format!("{prefix}&{SIGNATURE}={other_signature}");
    let params = SsoRedirectParams {
        signature: SsoRedirectParams::from_query(&corrupted).signature,
        ..params
    };

    let failure = expect_failure(env.validator.handle_redirect(&params, Some(&corrupted)))?;
    assert_eq!(failure.kind, FailureKind::Signature);
    assert_eq!(failure.status_code, status_codes::REQUESTER);
    assert!(failure.message.contains("Signature validation"));
    assert_eq!(failure.in_response_to, "_corrupt");
    assert_eq!(failure.acs_url_for_error, SIGNING_ACS_URL);

    let response = failure.to_response(&env.config.idp_entity_id);
    let xml = marshall(&response);
    assert!(!xml.contains(":Assertion"));
    assert!(xml.contains("InResponseTo=\"_corrupt\""));
    assert!(xml.contains(status_codes::REQUESTER));
    Ok(())
}

/// Tests that an unsigned request from the signing SP fails on both bindings.
#[test]
fn test_missing_signature_fails() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let request = signing_sp_request("_unsigned");

    let (params, query) = redirect(&request, None)?;
    let failure = expect_failure(env.validator.handle_redirect(&params, Some(&query)))?;
    assert_eq!(failure.kind, FailureKind::Signature);

    let failure = expect_failure(
        env.validator
            .handle_post(&post_form(&marshall(&request), None)),
    )?;
    assert_eq!(failure.kind, FailureKind::Signature);
    assert_eq!(failure.stage, ValidationStage::DestinationChecked);
    Ok(())
}

/// Tests a signed POST request and its tampered copy.
#[test]
fn test_signed_post() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let credential = SP_RSA.credential()?;
    let mut request = signing_sp_request("_post").force_authn(true);
    XmlSigner::new(&credential).sign(&mut request)?;
    let xml = marshall(&request);

    let outcome = env.validator.handle_post(&post_form(&xml, None));
    let validated = outcome
        .validated()
        .ok_or_else(|| anyhow::anyhow!("signed POST failed: {outcome:?}"))?;
    assert!(validated.force_authn);

    let tampered = xml.replace(" ForceAuthn=\"true\"", "");
    let failure = expect_failure(env.validator.handle_post(&post_form(&tampered, None)))?;
    assert_eq!(failure.kind, FailureKind::Signature);
    Ok(())
}

/// Tests that an error response signed with the IdP credential verifies.
#[test]
fn test_signed_error_response() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let request = unsigned_request("_signedError").with_version("1.0");
    let failure = expect_failure(
        env.validator
            .handle_post(&post_form(&marshall(&request), None)),
    )?;

    let idp = IDP_RSA.credential()?;
    let response =
        failure.to_signed_response(&env.config.idp_entity_id, &idp, SignatureConfig::default())?;
    let xml = marshall(&response);

    assert!(verify_document(&xml, &IDP_RSA.certificate_der()?)?);
    assert!(xml.contains(status_codes::VERSION_MISMATCH));
    Ok(())
}
