//! Apply-auth, block, unblock and terminate handlers

mod common;

use common::*;
use std::sync::Arc;
use tenant_reconciler::clients::{
    ClientError, OffboardingStatus, ServiceResponse, StatusCode, StoreTenantManager,
    TenantManagerError,
};
use tenant_reconciler::dispatch::{ActionType, Dispatcher, HandlerRequest, TaskResult};
use tenant_reconciler::store::StoreError;
use tenant_reconciler::{TenantOperator, TenantStore};

const TENANT: &str = "tenant-1";

fn oidc_properties() -> std::collections::HashMap<String, String> {
    properties(&[
        ("issuer", "https://issuer.example"),
        ("jwks_uri", "https://issuer.example/keys"),
        ("audiences", "kms, console,,"),
        ("client_id", "reconciler"),
    ])
}

mod apply_auth {
    use super::*;

    #[tokio::test]
    async fn test_applies_issuer_and_mapping() {
        let harness = Harness::new();
        harness.seed_tenant(TENANT).await;

        let response = harness
            .deliver(&auth_request(TENANT, Some(oidc_properties())))
            .await;

        assert_eq!(response.result, TaskResult::Done);
        let tenant = harness.store.find_tenant(TENANT).await.unwrap().unwrap();
        assert_eq!(tenant.issuer_url, "https://issuer.example");

        let applied = harness.sessions.applied();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].tenant_id, TENANT);
        assert_eq!(applied[0].jwks_uri.as_deref(), Some("https://issuer.example/keys"));
        assert_eq!(applied[0].audiences, vec!["kms", "console"]);
        assert_eq!(applied[0].properties, properties(&[("client_id", "reconciler")]));
    }

    #[tokio::test]
    async fn test_invalid_auth_payloads_fail() {
        let harness = Harness::new();
        harness.seed_tenant(TENANT).await;

        let cases = [
            auth_request("", Some(oidc_properties())),
            auth_request(TENANT, None),
            auth_request(TENANT, Some(properties(&[("jwks_uri", "x")]))),
            auth_request(TENANT, Some(properties(&[("issuer", "")]))),
            HandlerRequest::new(ActionType::ApplyAuth, b"{".to_vec()),
        ];

        for request in &cases {
            let response = harness.deliver(request).await;
            assert_eq!(response.result, TaskResult::Failed);
            assert_eq!(response.working_state_str(), "invalid task data");
        }
        assert!(harness.sessions.applied().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tenant_fails_without_calling_session_manager() {
        let harness = Harness::new();

        let response = harness
            .deliver(&auth_request("ghost", Some(oidc_properties())))
            .await;

        assert_eq!(response.result, TaskResult::Failed);
        assert!(harness.sessions.applied().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_rolls_back_and_retries() {
        let harness = Harness::new();
        harness.seed_tenant(TENANT).await;
        harness.sessions.respond_with(
            SessionOp::Apply,
            Err(ClientError::unavailable("session manager down")),
        );

        let response = harness
            .deliver(&auth_request(TENANT, Some(oidc_properties())))
            .await;

        assert_eq!(response.result, TaskResult::Processing);
        assert_eq!(response.reconcile_after_seconds, 15);
        let tenant = harness.store.find_tenant(TENANT).await.unwrap().unwrap();
        assert!(tenant.issuer_url.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_rejection_rolls_back_and_fails() {
        let harness = Harness::new();
        harness.seed_tenant(TENANT).await;
        harness.sessions.respond_with(
            SessionOp::Apply,
            Ok(ServiceResponse::rejected("tenant not found")),
        );

        let response = harness
            .deliver(&auth_request(TENANT, Some(oidc_properties())))
            .await;

        assert_eq!(response.result, TaskResult::Failed);
        assert!(response
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("tenant not found")));
        let tenant = harness.store.find_tenant(TENANT).await.unwrap().unwrap();
        assert!(tenant.issuer_url.is_empty());
    }
}

mod block_unblock {
    use super::*;

    #[tokio::test]
    async fn test_block_and_unblock_succeed() {
        let harness = Harness::new();

        let response = harness
            .deliver(&reference_request(ActionType::BlockTenant, TENANT))
            .await;
        assert_eq!(response.result, TaskResult::Done);
        assert_eq!(response.working_state_str(), "tenant blocked");

        let response = harness
            .deliver(&reference_request(ActionType::UnblockTenant, TENANT))
            .await;
        assert_eq!(response.result, TaskResult::Done);

        assert_eq!(
            harness.sessions.calls(),
            vec![
                (SessionOp::Block, TENANT.to_string()),
                (SessionOp::Unblock, TENANT.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let harness = Harness::new();
        for (op, action) in [
            (SessionOp::Block, ActionType::BlockTenant),
            (SessionOp::Unblock, ActionType::UnblockTenant),
        ] {
            harness.sessions.respond_with(
                op,
                Err(ClientError::new(StatusCode::DeadlineExceeded, "slow")),
            );

            let response = harness.deliver(&reference_request(action, TENANT)).await;

            assert_eq!(response.result, TaskResult::Processing);
            assert_eq!(response.reconcile_after_seconds, 15);
        }
    }

    #[tokio::test]
    async fn test_refusal_fails() {
        let harness = Harness::new();
        harness
            .sessions
            .respond_with(SessionOp::Block, Ok(ServiceResponse::rejected("no mapping")));

        let response = harness
            .deliver(&reference_request(ActionType::BlockTenant, TENANT))
            .await;

        assert_eq!(response.result, TaskResult::Failed);
        assert_eq!(response.working_state_str(), "blocking tenant failed");
    }

    #[tokio::test]
    async fn test_malformed_reference_fails_without_calls() {
        let harness = Harness::new();

        let response = harness
            .deliver(&HandlerRequest::new(ActionType::UnblockTenant, b"[]".to_vec()))
            .await;
        assert_eq!(response.result, TaskResult::Failed);

        let response = harness
            .deliver(&reference_request(ActionType::BlockTenant, ""))
            .await;
        assert_eq!(response.result, TaskResult::Failed);

        assert!(harness.sessions.calls().is_empty());
    }
}

mod terminate {
    use super::*;

    fn terminate_request() -> HandlerRequest {
        reference_request(ActionType::TerminateTenant, TENANT)
    }

    #[tokio::test]
    async fn test_processing_offboarding_waits_without_deleting() {
        let harness = Harness::new();
        harness
            .tenant_manager
            .offboarding_status(OffboardingStatus::Processing);

        let response = harness.deliver(&terminate_request()).await;

        assert_eq!(response.result, TaskResult::Processing);
        assert_eq!(response.reconcile_after_seconds, 3);
        assert_eq!(response.working_state_str(), "waiting for offboarding");
        assert!(harness.tenant_manager.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_offboarding_fails_without_deleting() {
        let harness = Harness::new();
        harness
            .tenant_manager
            .offboarding_status(OffboardingStatus::Failed);

        let response = harness.deliver(&terminate_request()).await;

        assert_eq!(response.result, TaskResult::Failed);
        assert!(harness.tenant_manager.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn test_successful_offboarding_deletes_with_tenant_scope() {
        let harness = Harness::new();

        let response = harness.deliver(&terminate_request()).await;

        assert_eq!(response.result, TaskResult::Done);
        assert_eq!(response.working_state_str(), "tenant terminated");
        assert_eq!(harness.sessions.call_count(SessionOp::Remove), 1);
        assert_eq!(
            harness.tenant_manager.offboard_calls(),
            vec![Some(TENANT.to_string())]
        );
        assert_eq!(
            harness.tenant_manager.delete_calls(),
            vec![Some(TENANT.to_string())]
        );
    }

    #[tokio::test]
    async fn test_mapping_removal_errors() {
        let harness = Harness::new();

        harness.sessions.respond_with(
            SessionOp::Remove,
            Err(ClientError::unavailable("connection reset")),
        );
        let response = harness.deliver(&terminate_request()).await;
        assert_eq!(response.result, TaskResult::Processing);
        assert_eq!(response.reconcile_after_seconds, 15);

        harness
            .sessions
            .respond_with(SessionOp::Remove, Err(ClientError::internal("panic in handler")));
        let response = harness.deliver(&terminate_request()).await;
        assert_eq!(response.result, TaskResult::Failed);

        harness.sessions.respond_with(
            SessionOp::Remove,
            Ok(ServiceResponse::rejected("mapping locked")),
        );
        let response = harness.deliver(&terminate_request()).await;
        assert_eq!(response.result, TaskResult::Failed);

        assert!(harness.tenant_manager.offboard_calls().is_empty());
    }

    #[tokio::test]
    async fn test_offboarding_and_delete_errors_are_retried() {
        let harness = Harness::new();

        harness
            .tenant_manager
            .offboard_with(Err(TenantManagerError::Store(StoreError::Uninitialized)));
        let response = harness.deliver(&terminate_request()).await;
        assert_eq!(response.result, TaskResult::Processing);
        assert_eq!(response.reconcile_after_seconds, 15);
        assert_eq!(response.working_state_str(), "waiting for offboarding");

        harness
            .tenant_manager
            .offboarding_status(OffboardingStatus::Success);
        harness
            .tenant_manager
            .delete_with(Err(TenantManagerError::Client(ClientError::unavailable(
                "tenant manager down",
            ))));
        let response = harness.deliver(&terminate_request()).await;
        assert_eq!(response.result, TaskResult::Processing);
        assert_eq!(response.reconcile_after_seconds, 15);
        assert_eq!(response.working_state_str(), "tenant deletion failed");

        harness.tenant_manager.delete_with(Ok(()));
        let response = harness.deliver(&terminate_request()).await;
        assert_eq!(response.result, TaskResult::Done);
    }

    #[tokio::test]
    async fn test_store_tenant_manager_tears_down_provisioned_tenant() {
        let store = FaultyStore::new();
        let operator = Arc::new(
            TenantOperator::builder()
                .store(Arc::new(store.clone()))
                .registry(Arc::new(MockRegistry::new()))
                .session_manager(Arc::new(MockSessionManager::new()))
                .tenant_manager(Arc::new(StoreTenantManager::new(Arc::new(store.clone()))))
                .build()
                .unwrap(),
        );
        let mut dispatcher = Dispatcher::new();
        operator.register_handlers(&mut dispatcher).unwrap();

        let provision = provision_request(TENANT);
        dispatcher.dispatch(&provision).await;
        assert_eq!(dispatcher.dispatch(&provision).await.result, TaskResult::Done);

        let response = dispatcher.dispatch(&terminate_request()).await;

        assert_eq!(response.result, TaskResult::Done);
        assert_eq!(store.inner().schema_count(), 0);
        assert!(store.find_tenant(TENANT).await.unwrap().is_none());
    }
}
