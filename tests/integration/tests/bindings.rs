//! Binding codec integration tests.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use sso_protocol_saml::bindings::{marshall, unmarshall, HttpPostBinding, HttpRedirectBinding};
use sso_protocol_saml::error::DecodeError;
use sso_protocol_saml::types::RequestedAuthnContext;
use sso_protocol_saml::validator::FailureKind;
use sso_protocol_saml::AuthnRequest;

use crate::common::{post_form, unsigned_request, TestEnv};

fn large_request() -> AuthnRequest {
    let context = (0..120).fold(
        RequestedAuthnContext::exact(
            "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport",
        ),
        |context, i| context.with_class_ref(format!("urn:example:ac:classes:level-{i}")),
    );
    unsigned_request("_large").with_authn_context(context)
}

/// Tests that a large request survives the Redirect binding unchanged.
#[test]
fn test_redirect_round_trip_large_document() -> anyhow::Result<()> {
    let xml = marshall(&large_request());
    assert!(xml.len() > 5000, "document is only {} bytes", xml.len());

    let encoded = HttpRedirectBinding::encode(&xml)?;
    let query_value = urlencoding::decode(&encoded)?;
    let decoded = HttpRedirectBinding::decode(&query_value, 1024 * 1024)?;
    assert_eq!(decoded, xml);

    let request = AuthnRequest::from_xml(&decoded)?;
    assert_eq!(request.id, "_large");
    Ok(())
}

/// Tests that the Redirect encoding is raw DEFLATE with no zlib header.
#[test]
fn test_redirect_encoding_is_raw_deflate() -> anyhow::Result<()> {
    let xml = marshall(&unsigned_request("_raw"));
    let encoded = HttpRedirectBinding::encode(&xml)?;

    let compressed = STANDARD.decode(urlencoding::decode(&encoded)?.as_bytes())?;
    let mut inflated = String::new();
    DeflateDecoder::new(compressed.as_slice()).read_to_string(&mut inflated)?;
    assert_eq!(inflated, xml);
    Ok(())
}

/// Tests that a request compressed by another implementation decodes.
#[test]
fn test_redirect_decodes_foreign_deflate() -> anyhow::Result<()> {
    let xml = marshall(&unsigned_request("_foreign"));
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(xml.as_bytes())?;
    let compressed = encoder.finish()?;

    let value = STANDARD.encode(compressed);
    assert_eq!(HttpRedirectBinding::decode(&value, 1024 * 1024)?, xml);
    Ok(())
}

/// Tests that an inflate bomb is stopped at the configured bound.
#[test]
fn test_redirect_rejects_oversized_inflation() -> anyhow::Result<()> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&vec![b' '; 4 * 1024 * 1024])?;
    let value = STANDARD.encode(encoder.finish()?);

    let err = HttpRedirectBinding::decode(&value, 1024 * 1024).unwrap_err();
    assert!(
        matches!(err, DecodeError::TooLarge { limit: 1_048_576 }),
        "unexpected error: {err}"
    );
    Ok(())
}

/// Tests the POST binding round trip and its tolerance of line breaks.
#[test]
fn test_post_round_trip() -> anyhow::Result<()> {
    let xml = marshall(&large_request());
    let encoded = HttpPostBinding::encode(&xml);
    assert!(!encoded.contains('\n'));

    let wrapped: String = encoded
        .as_bytes()
        .chunks(76)
        .map(|line| format!("{}\r\n", String::from_utf8_lossy(line)))
        .collect();
    assert_eq!(HttpPostBinding::decode(&wrapped)?, xml);
    Ok(())
}

/// Tests that a document type declaration is refused before any entity
/// is expanded.
#[test]
fn test_external_entities_are_refused() -> anyhow::Result<()> {
    let xml = r#"<?xml version="1.0"?>
<!DOCTYPE samlp:AuthnRequest [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_x" Version="2.0">
  <saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">&xxe;</saml:Issuer>
</samlp:AuthnRequest>"#;

    assert!(matches!(unmarshall(xml), Err(DecodeError::DtdForbidden)));

    let env = TestEnv::new()?;
    let outcome = env.validator.handle_post(&post_form(xml, Some("rs")));
    let failure = outcome
        .failure()
        .ok_or_else(|| anyhow::anyhow!("DOCTYPE request was accepted"))?;
    assert_eq!(failure.kind, FailureKind::Decode);
    assert_eq!(failure.acs_url_for_error, env.config.error_page_url);
    assert_eq!(failure.relay_state.as_deref(), Some("rs"));
    Ok(())
}
