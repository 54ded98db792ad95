use scenehub_adapter_tuya::signing::{self, Signer};
use scenehub_adapter_tuya::{Credentials, RetrySettings, Secret, TuyaCloud, TuyaConfig};
use scenehub_app::ports::SceneCloud;
use scenehub_domain::error::{CloudError, SceneHubError};
use scenehub_domain::id::{DeviceId, RuleId, SpaceId};
use scenehub_domain::scene::{
    Comparator, ConditionExpr, IdempotencyKey, SceneAction, SceneCondition, ScenePayload,
};
use std::time::{Duration, Instant};

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{
    body_json, body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLIENT_ID: &str = "client-123";
const SECRET: &str = "secret-xyz";

fn config(server: &MockServer) -> TuyaConfig {
    TuyaConfig {
        base_url: server.uri(),
        client_id: CLIENT_ID.to_string(),
        client_secret: Secret::new(SECRET),
        rate_limit: RetrySettings {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter: 0.0,
        },
        transient: RetrySettings {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter: 0.0,
        },
        ..TuyaConfig::default()
    }
}

fn cloud(server: &MockServer) -> TuyaCloud {
    TuyaCloud::new(&config(server)).unwrap()
}

fn space() -> SpaceId {
    SpaceId::new("home-1").unwrap()
}

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "result": result,
        "t": 1_700_000_000_000_i64
    }))
}

fn token_response(token: &str) -> ResponseTemplate {
    ok(json!({"access_token": token, "expire_time": 7200, "uid": "u-1"}))
}

fn token_mock(token: &str) -> Mock {
    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .and(query_param("grant_type", "1"))
        .respond_with(token_response(token))
}

fn battery_payload() -> ScenePayload {
    ScenePayload::builder()
        .name("Battery Protect")
        .condition(SceneCondition::new(
            DeviceId::new("inv-1").unwrap(),
            ConditionExpr::Status {
                code: "Bateria".to_string(),
                comparator: Comparator::Le,
                value: json!(20),
            },
        ))
        .action(SceneAction::new(
            DeviceId::new("plug-1").unwrap(),
            "switch_1",
            false,
        ))
        .idempotency_key(IdempotencyKey::new("battery_protect", "low", "inv-1"))
        .build()
        .unwrap()
}

#[tokio::test]
async fn should_list_devices_across_pages() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/thing/space/device"))
        .and(query_param("last_id", "d-2"))
        .respond_with(ok(json!({
            "list": [{"id": "d-3", "name": "Plug", "category": "cz"}],
            "has_more": false
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/thing/space/device"))
        .and(query_param("space_ids", "home-1"))
        .and(query_param("page_size", "20"))
        .and(header("access_token", "tok-1"))
        .respond_with(ok(json!({
            "list": [
                {"id": "d-1", "name": "Inverter", "category": "qt", "isOnline": true},
                {"id": "d-2", "name": "Meter", "category": "zndb"}
            ],
            "has_more": true,
            "last_id": "d-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let devices = cloud(&server).list_devices(&space()).await.unwrap();

    let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["d-1", "d-2", "d-3"]);
    assert_eq!(devices[0].category, "qt");
    assert_eq!(devices[0].online, Some(true));
}

#[tokio::test]
async fn should_resume_after_last_device_when_cursor_missing() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/thing/space/device"))
        .and(query_param_is_missing("last_id"))
        .respond_with(ok(json!({
            "list": [
                {"id": "d-1", "category": "qt"},
                {"id": "d-2", "category": "cz"}
            ],
            "has_more": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/thing/space/device"))
        .and(query_param("last_id", "d-2"))
        .respond_with(ok(json!({
            "list": [{"id": "d-3", "category": "cz"}],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let devices = cloud(&server).list_devices(&space()).await.unwrap();

    let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["d-1", "d-2", "d-3"]);
}

#[tokio::test]
async fn should_accept_plain_device_array() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/thing/space/device"))
        .respond_with(ok(json!([{"id": "d-1", "category": "cz"}])))
        .expect(1)
        .mount(&server)
        .await;

    let devices = cloud(&server).list_devices(&space()).await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "d-1");
}

#[tokio::test]
async fn should_refresh_token_once_after_401() {
    let server = MockServer::start().await;
    token_mock("tok-1").up_to_n_times(1).expect(1).mount(&server).await;
    token_mock("tok-2").expect(1).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/thing/d-1/shadow/properties"))
        .and(header("access_token", "tok-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/thing/d-1/shadow/properties"))
        .and(header("access_token", "tok-2"))
        .respond_with(ok(json!({
            "properties": [{"code": "Bateria", "value": 42, "type": "value"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let shadow = cloud(&server)
        .device_shadow(&DeviceId::new("d-1").unwrap())
        .await
        .unwrap();
    assert_eq!(shadow.numeric("Bateria").unwrap(), 42.0);
}

#[tokio::test]
async fn should_fail_with_auth_error_after_second_401() {
    let server = MockServer::start().await;
    token_mock("tok-1").up_to_n_times(1).mount(&server).await;
    token_mock("tok-2").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/scene/rule"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let err = cloud(&server).list_rules(&space()).await.unwrap_err();
    match err {
        SceneHubError::Cloud(CloudError::Auth {
            operation,
            status,
            attempts,
            ..
        }) => {
            assert_eq!(operation, "GET /v2.0/cloud/scene/rule");
            assert_eq!(status, Some(401));
            assert_eq!(attempts, 2);
        }
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn should_refresh_token_on_invalid_token_envelope() {
    let server = MockServer::start().await;
    token_mock("tok-1").up_to_n_times(1).mount(&server).await;
    token_mock("tok-2").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/scene/rule"))
        .and(header("access_token", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "code": 1010,
            "msg": "token invalid"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/scene/rule"))
        .and(header("access_token", "tok-2"))
        .respond_with(ok(json!({"list": [
            {"id": "r-1", "name": "Battery Protect [sh:battery_protect.low:inv-1]", "status": "enable"}
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let rules = cloud(&server).list_rules(&space()).await.unwrap();
    assert_eq!(rules.len(), 1);
    assert!(rules[0].enabled);
    assert_eq!(
        rules[0].idempotency_key.as_ref().unwrap().as_str(),
        "battery_protect.low:inv-1"
    );
}

#[tokio::test]
async fn should_give_up_after_rate_limit_budget() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/scene/rule"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = cloud(&server).list_rules(&space()).await.unwrap_err();
    assert!(
        matches!(
            err,
            SceneHubError::Cloud(CloudError::RateLimitExceeded { attempts: 3, .. })
        ),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn should_stop_rate_limit_backoff_when_cancelled() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/scene/rule"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    let mut config = config(&server);
    config.rate_limit = RetrySettings {
        max_attempts: 5,
        base_delay_ms: 300,
        max_delay_ms: 300,
        jitter: 0.0,
    };
    let cancel = CancellationToken::new();
    let cloud = TuyaCloud::new(&config)
        .unwrap()
        .with_cancellation(cancel.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let err = cloud.list_rules(&space()).await.unwrap_err();

    assert!(
        matches!(
            err,
            SceneHubError::Cloud(CloudError::Cancelled { attempts: 1, .. })
        ),
        "unexpected error: {err:?}"
    );
    assert!(started.elapsed() < Duration::from_millis(300));
}

#[tokio::test]
async fn should_not_send_once_cancelled() {
    let server = MockServer::start().await;
    token_mock("tok-1").expect(0).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/scene/rule"))
        .respond_with(ok(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = cloud(&server)
        .with_cancellation(cancel)
        .list_rules(&space())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SceneHubError::Cloud(CloudError::Cancelled { attempts: 0, .. })
    ));
}

#[tokio::test]
async fn should_retry_timeouts_with_transient_budget() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/scene/rule"))
        .respond_with(ok(json!([])).set_delay(Duration::from_secs(3)))
        .expect(3)
        .mount(&server)
        .await;
    let mut config = config(&server);
    config.request_timeout_secs = 1;
    config.transient = RetrySettings {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter: 0.0,
    };

    let err = TuyaCloud::new(&config)
        .unwrap()
        .list_rules(&space())
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            SceneHubError::Cloud(CloudError::Network { attempts: 3, .. })
        ),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn should_recover_after_transient_rate_limit() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2.0/cloud/scene/rule/r-1/actions/trigger"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2.0/cloud/scene/rule/r-1/actions/trigger"))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    cloud(&server)
        .trigger_rule(&RuleId::new("r-1").unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn should_surface_vendor_error_without_retrying() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2.0/cloud/scene/rule"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "code": 1106,
            "msg": "permission deny"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = cloud(&server)
        .create_rule(&space(), &battery_payload())
        .await
        .unwrap_err();
    match err {
        SceneHubError::Cloud(CloudError::Api {
            vendor_code,
            attempts,
            message,
            ..
        }) => {
            assert_eq!(vendor_code, Some(1106));
            assert_eq!(attempts, 1);
            assert_eq!(message, "permission deny");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn should_not_retry_server_errors_by_default() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/scene/rule/r-1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = cloud(&server)
        .get_rule(&RuleId::new("r-1").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SceneHubError::Cloud(CloudError::Api { status: 503, .. })
    ));
}

#[tokio::test]
async fn should_retry_server_errors_when_enabled() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/scene/rule/r-1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/scene/rule/r-1"))
        .respond_with(ok(json!({"id": "r-1", "name": "Night Guard", "status": "disable"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.retry_on_server_error = true;
    let rule = TuyaCloud::new(&config)
        .unwrap()
        .get_rule(&RuleId::new("r-1").unwrap())
        .await
        .unwrap();
    assert_eq!(rule.name, "Night Guard");
    assert!(!rule.enabled);
}

#[tokio::test]
async fn should_report_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "code": 1004,
            "msg": "sign invalid"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/thing/space/device"))
        .respond_with(ok(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let err = cloud(&server).list_devices(&space()).await.unwrap_err();
    assert!(
        matches!(err, SceneHubError::Cloud(CloudError::Auth { .. })),
        "unexpected error: {err:?}"
    );
    assert!(err.to_string().contains("sign invalid"));
}

#[tokio::test]
async fn should_create_rule_with_lowered_body() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2.0/cloud/scene/rule"))
        .and(body_partial_json(json!({
            "space_id": "home-1",
            "name": "Battery Protect [sh:battery_protect.low:inv-1]",
            "type": "automation",
            "decision_expr": "and",
            "conditions": [{
                "code": 1,
                "entity_id": "inv-1",
                "entity_type": "device_report",
                "expr": {"status_code": "Bateria", "comparator": "<=", "status_value": 20}
            }]
        })))
        .respond_with(ok(json!("r-9")))
        .expect(1)
        .mount(&server)
        .await;

    let rule_id = cloud(&server)
        .create_rule(&space(), &battery_payload())
        .await
        .unwrap();
    assert_eq!(rule_id.as_str(), "r-9");
}

#[tokio::test]
async fn should_update_rule_in_place() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("PUT"))
        .and(path("/v2.0/cloud/scene/rule/r-9"))
        .and(body_partial_json(json!({"type": "automation"})))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    cloud(&server)
        .update_rule(&space(), &RuleId::new("r-9").unwrap(), &battery_payload())
        .await
        .unwrap();
}

#[tokio::test]
async fn should_set_state_with_joined_ids() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("PUT"))
        .and(path("/v2.0/cloud/scene/rule/state"))
        .and(body_json(json!({"ids": "r-1,r-2", "is_enable": false})))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let ids = vec![RuleId::new("r-2").unwrap(), RuleId::new("r-1").unwrap()];
    cloud(&server).set_rules_state(&ids, false).await.unwrap();
}

#[tokio::test]
async fn should_delete_rules_with_query() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/v2.0/cloud/scene/rule"))
        .and(query_param("ids", "r-1,r-2"))
        .and(query_param("space_id", "home-1"))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let ids = vec![
        RuleId::new("r-1").unwrap(),
        RuleId::new("r-2").unwrap(),
        RuleId::new("r-1").unwrap(),
    ];
    cloud(&server).delete_rules(&space(), &ids).await.unwrap();
}

#[tokio::test]
async fn should_skip_call_for_empty_rule_ids() {
    let server = MockServer::start().await;
    let cloud = cloud(&server);
    cloud.set_rules_state(&[], true).await.unwrap();
    cloud.delete_rules(&space(), &[]).await.unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn should_sign_every_request() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("PUT"))
        .and(path("/v2.0/cloud/scene/rule/state"))
        .respond_with(ok(json!(true)))
        .mount(&server)
        .await;

    cloud(&server)
        .set_rules_state(&[RuleId::new("r-1").unwrap()], true)
        .await
        .unwrap();

    let signer = Signer::new(&Credentials {
        client_id: CLIENT_ID.to_string(),
        client_secret: Secret::new(SECRET),
    })
    .unwrap();
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        let header = |name: &str| {
            request
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        assert_eq!(header("client_id").as_deref(), Some(CLIENT_ID));
        assert_eq!(header("sign_method").as_deref(), Some(signing::SIGN_METHOD));
        let timestamp = header("t").unwrap();
        let nonce = header("nonce").unwrap();
        let token = header("access_token");
        let path_and_query = match request.url.query() {
            Some(query) => format!("{}?{query}", request.url.path()),
            None => request.url.path().to_string(),
        };
        let string_to_sign =
            signing::string_to_sign(request.method.as_str(), &request.body, &path_and_query);
        let expected = signer.sign(token.as_deref(), &timestamp, &nonce, &string_to_sign);
        assert_eq!(header("sign").unwrap(), expected, "bad signature for {path_and_query}");
    }

    assert!(requests[0].headers.get("access_token").is_none());
    assert_eq!(
        requests[1].headers.get("access_token").unwrap().to_str().unwrap(),
        "tok-1"
    );
    assert_ne!(
        requests[0].headers.get("nonce"),
        requests[1].headers.get("nonce")
    );
}

#[tokio::test]
async fn should_restrict_shadow_to_requested_codes() {
    let server = MockServer::start().await;
    token_mock("tok-1").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2.0/cloud/thing/inv-1/shadow/properties"))
        .and(query_param("codes", "Bateria,Producao_Solar_Atual"))
        .respond_with(ok(json!({"properties": [
            {"code": "Bateria", "value": 80, "type": "value"},
            {"code": "Producao_Solar_Atual", "value": 1500, "type": "value"}
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let codes = vec!["Bateria".to_string(), "Producao_Solar_Atual".to_string()];
    let shadow = cloud(&server)
        .shadow(&DeviceId::new("inv-1").unwrap(), &codes)
        .await
        .unwrap();
    assert_eq!(shadow.properties.len(), 2);
}
