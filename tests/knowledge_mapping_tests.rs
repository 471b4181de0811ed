//! End-to-end knowledge mapping against a mocked Dataverse environment

use agentmap::api::dataverse::{dataverse_api_client, DataverseClient};
use agentmap::cmd::knowledge::{self, KnowledgeMapArgs};
use agentmap::cmd::RunContext;
use agentmap::config::{Credentials, RetrySettings, Settings};
use agentmap::mapping::{MappingResults, SourceKind};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ALICE_URL: &str = "https://contoso-my.sharepoint.com/personal/alice/doc";
const HR_URL: &str = "https://contoso.sharepoint.com/sites/HR/Shared Documents";

fn settings(server: &MockServer) -> Settings {
    Settings {
        authority: server.uri(),
        retry: RetrySettings {
            max_attempts: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
        },
        ..Settings::default()
    }
}

fn graph_search_config(items: Value) -> Value {
    Value::String(
        json!({
            "$kind": "IngestionBasedGraphSearchConfiguration",
            "driveItems": items
        })
        .to_string(),
    )
}

async fn mount_collection(server: &MockServer, collection: &str, value: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/data/v9.2/{}", collection)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": value })))
        .mount(server)
        .await;
}

async fn mount_components(server: &MockServer, bot_id: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/botcomponents"))
        .and(query_param("$filter", format!("_parentbotid_value eq {}", bot_id)))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Three bots: one reading Alice's OneDrive by GUID, one reading the HR
/// site by name, and one whose component fetch fails
async fn mount_environment(server: &MockServer) {
    mount_collection(
        server,
        "bots",
        json!([
            {"botid": "bot-1", "name": "Alice Helper", "createdon": "2025-01-01T00:00:00Z", "modifiedon": "2025-02-01T00:00:00Z"},
            {"botid": "bot-2", "name": "HR Assistant"},
            {"botid": "bot-3", "name": "Broken Bot"}
        ]),
    )
    .await;

    mount_collection(
        server,
        "dvtablesearchs",
        json!([
            {
                "dvtablesearchid": "11111111-aaaa-bbbb-cccc-000000000001",
                "name": "Alice OneDrive",
                "knowledgeconfig": graph_search_config(json!([
                    {"displayName": "Alice doc", "webUrl": ALICE_URL}
                ]))
            },
            {
                "dvtablesearchid": "22222222-aaaa-bbbb-cccc-000000000002",
                "name": "HR Policies",
                "knowledgeconfig": graph_search_config(json!([
                    {"displayName": "Policies", "webUrl": HR_URL},
                    {"displayName": "Policies (copy)", "webUrl": HR_URL}
                ]))
            },
            {
                "dvtablesearchid": "33333333-aaaa-bbbb-cccc-000000000003",
                "name": "Broken config",
                "knowledgeconfig": "{\"$kind\": "
            }
        ]),
    )
    .await;

    mount_components(
        server,
        "bot-1",
        ResponseTemplate::new(200).set_body_json(json!({"value": [{
            "botcomponentid": "comp-1",
            "componenttype": 16,
            "name": "Search Alice",
            "data": "kind: SearchAndSummarizeContent\nknowledgeSources: [11111111-aaaa-bbbb-cccc-000000000001]"
        }]})),
    )
    .await;

    mount_components(
        server,
        "bot-2",
        ResponseTemplate::new(200).set_body_json(json!({"value": [{
            "botcomponentid": "comp-2",
            "componenttype": 9,
            "name": "Policy topic",
            "content": {"source": "HR Policies"}
        }]})),
    )
    .await;

    mount_components(
        server,
        "bot-3",
        ResponseTemplate::new(500).set_body_string("internal failure"),
    )
    .await;
}

#[tokio::test]
async fn test_map_bots_categorizes_every_bot() {
    let server = MockServer::start().await;
    mount_environment(&server).await;

    let settings = settings(&server);
    let api = dataverse_api_client(&server.uri(), "tok".into(), &settings).unwrap();
    let dataverse = DataverseClient::new(&api, 0);

    let results = knowledge::map_bots(&dataverse, true).await.unwrap();

    assert_eq!(results.agents_with_onedrive.len(), 1);
    let alice = &results.agents_with_onedrive[0];
    assert_eq!(alice.name, "Alice Helper");
    assert_eq!(alice.created.as_deref(), Some("2025-01-01T00:00:00Z"));
    let onedrive = alice.onedrive_sources.as_ref().unwrap();
    assert_eq!(onedrive.len(), 1);
    assert_eq!(onedrive[0].drive().unwrap().name, "Alice doc");
    assert_eq!(onedrive[0].url(), Some(ALICE_URL));

    assert_eq!(results.agents_with_sharepoint.len(), 1);
    let hr = &results.agents_with_sharepoint[0];
    assert_eq!(hr.name, "HR Assistant");
    let sharepoint = hr.sharepoint_sources.as_ref().unwrap();
    assert_eq!(sharepoint.len(), 1);
    assert_eq!(sharepoint[0].drive().unwrap().name, "Policies (copy)");

    assert!(results.agents_with_other_sources.is_empty());

    assert_eq!(results.agents_without_sources.len(), 1);
    let broken = &results.agents_without_sources[0];
    assert_eq!(broken.name, "Broken Bot");
    assert!(broken.error.as_deref().unwrap().contains("500"));

    // one Alice record plus both HR drive items
    assert_eq!(results.detailed_mappings.len(), 3);
    assert_eq!(results.detailed_mappings[0].source.kind(), SourceKind::OneDrive);
    assert_eq!(
        results.detailed_mappings[1].component_references[0].match_value,
        "HR Policies"
    );
}

#[tokio::test]
async fn test_no_bots_yields_empty_results() {
    let server = MockServer::start().await;
    mount_collection(&server, "bots", json!([])).await;

    let settings = settings(&server);
    let api = dataverse_api_client(&server.uri(), "tok".into(), &settings).unwrap();
    let results = knowledge::map_bots(&DataverseClient::new(&api, 0), false)
        .await
        .unwrap();

    assert_eq!(results, MappingResults::new());
}

#[tokio::test]
async fn test_knowledge_source_failure_aborts() {
    let server = MockServer::start().await;
    mount_collection(&server, "bots", json!([{"botid": "bot-1", "name": "Solo"}])).await;

    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/dvtablesearchs"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": "0x80040220", "message": "Principal user is missing prvReaddvtablesearch privilege"}
        })))
        .mount(&server)
        .await;

    let settings = settings(&server);
    let api = dataverse_api_client(&server.uri(), "tok".into(), &settings).unwrap();
    let err = knowledge::map_bots(&DataverseClient::new(&api, 0), false)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("prvReaddvtablesearch"));
}

#[tokio::test]
async fn test_run_exports_reloadable_results() {
    let server = MockServer::start().await;
    mount_environment(&server).await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "dv-token",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("mapping.json");
    let args = KnowledgeMapArgs {
        output: output.clone(),
        dataverse_url: None,
        no_export: false,
    };
    let ctx = RunContext {
        settings: settings(&server),
        verbose: false,
    };
    let credentials = Credentials {
        client_id: "client".into(),
        client_secret: "secret".into(),
        tenant_id: "tenant-1".into(),
    };

    let results = knowledge::run(&args, &ctx, credentials, &server.uri())
        .await
        .unwrap();

    let reloaded = MappingResults::load(&output).unwrap();
    assert_eq!(reloaded, results);

    let urls: Vec<_> = reloaded.agents_with_onedrive[0]
        .onedrive_sources
        .as_ref()
        .unwrap()
        .iter()
        .filter_map(|s| s.url())
        .collect();
    assert_eq!(urls, vec![ALICE_URL]);

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(raw["detailed_mappings"][0]["type"], "OneDrive");
    assert_eq!(raw["agents_without_sources"][0]["name"], "Broken Bot");
}
