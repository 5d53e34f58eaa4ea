//! Concurrent validation tests.

use std::sync::Arc;

use sso_protocol_saml::validator::ValidationOutcome;

use crate::common::{
    redirect, signed_redirect, signing_sp_request, unsigned_request, TestEnv, SP_RSA,
};

/// Tests that one validator serves many requests in parallel and every
/// outcome belongs to its own request.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_validation() -> anyhow::Result<()> {
    let env = Arc::new(TestEnv::new()?);

    let mut handles = Vec::new();
    for i in 0..32 {
        let env = Arc::clone(&env);
        handles.push(tokio::task::spawn_blocking(
            move || -> anyhow::Result<(usize, ValidationOutcome)> {
                let id = format!("_parallel{i}");
                let (params, query) = if i % 2 == 0 {
                    redirect(&unsigned_request(&id), Some(&id))?
                } else {
                    signed_redirect(&signing_sp_request(&id), Some(&id), &SP_RSA)?
                };
                Ok((i, env.validator.handle_redirect(&params, Some(&query))))
            },
        ));
    }

    for handle in handles {
        let (i, outcome) = handle.await??;
        let id = format!("_parallel{i}");
        let validated = outcome
            .validated()
            .ok_or_else(|| anyhow::anyhow!("request {i} failed: {outcome:?}"))?;
        assert_eq!(validated.request_id, id);
        assert_eq!(validated.relay_state.as_deref(), Some(id.as_str()));
    }
    Ok(())
}
