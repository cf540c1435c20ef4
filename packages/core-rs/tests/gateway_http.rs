//! HttpGateway and SessionController against a wiremock analysis service

use std::sync::Arc;
use std::time::Duration;

use codedoc_core::{
    render_entry, ClassType, DiagramKind, ErrorKind, FlowBoard, GatewayConfig, Gateway, HttpGateway,
    Operation, RepoRequest, RepositoryReference, SessionController, Stage, WorkflowOutcome,
    DEFAULT_MAX_DEPTH,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHOP_URL: &str = "https://github.com/acme/shop.git";

fn create_gateway(mock_server: &MockServer) -> HttpGateway {
    let config = GatewayConfig::default()
        .with_base_url(&mock_server.uri())
        .unwrap()
        .with_timeout(Duration::from_secs(5));
    HttpGateway::new(config).unwrap()
}

fn shop_request() -> RepoRequest {
    RepoRequest::public(&RepositoryReference::parse(SHOP_URL).unwrap())
}

async fn mount_submit_and_clone(mock_server: &MockServer) {
    let repo_body = json!({"repo_url": SHOP_URL, "username": null, "password": null});

    Mock::given(method("POST"))
        .and(path("/api/repo/submit-repo"))
        .and(body_json(&repo_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Repository details received"
        })))
        .expect(1)
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/repo/clone"))
        .and(body_json(&repo_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "repo_name": "shop-7f3a",
            "message": "Cloned"
        })))
        .expect(1)
        .mount(mock_server)
        .await;
}

async fn mount_shop(mock_server: &MockServer, endpoints: ResponseTemplate) {
    mount_submit_and_clone(mock_server).await;

    Mock::given(method("GET"))
        .and(path("/api/repo/analyze/shop-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "project_type": "Spring Boot",
            "build_system": "Maven",
            "is_spring_boot": true,
            "is_bootable": true,
            "has_maven": true,
            "has_gradle": false,
            "message": "Spring Boot application detected"
        })))
        .expect(1)
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/repo/endpoints/shop-7f3a"))
        .respond_with(endpoints)
        .expect(1)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_workflow_example_scenario() {
    let mock_server = MockServer::start().await;
    mount_shop(
        &mock_server,
        ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Found 2 endpoints",
            "endpoints": [
                {"controller": "OrderController", "method": "listOrders", "http_method": "GET", "path": "/orders"},
                {"controller": "OrderController", "method": "createOrder", "http_method": "POST", "path": "/orders"}
            ]
        })),
    )
    .await;

    let controller = SessionController::new(Arc::new(create_gateway(&mock_server)));
    let outcome = controller.submit(SHOP_URL).await;

    let WorkflowOutcome::Completed { snapshot, warning } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert!(warning.is_none());
    assert_eq!(snapshot.repo_name(), Some("shop-7f3a"));
    let counts = snapshot.project_info().unwrap().counts();
    assert_eq!(counts.controllers_count, 1);
    assert_eq!(counts.endpoints_count, 2);
    assert_eq!(controller.current().stage, Stage::Idle);
}

#[tokio::test]
async fn test_workflow_endpoint_server_error_is_warning() {
    let mock_server = MockServer::start().await;
    mount_shop(
        &mock_server,
        ResponseTemplate::new(500).set_body_json(json!({"detail": "Parser crashed"})),
    )
    .await;

    let controller = SessionController::new(Arc::new(create_gateway(&mock_server)));
    let outcome = controller.submit(SHOP_URL).await;

    let WorkflowOutcome::Completed { snapshot, warning } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    let warning = warning.unwrap();
    assert_eq!(warning.kind(), ErrorKind::PartialEnrichment);
    assert_eq!(warning.detail(), "Parser crashed");
    assert_eq!(
        snapshot.project_info().unwrap().classification.build_system,
        "Maven"
    );
    assert!(snapshot.endpoints().is_none());
}

#[tokio::test]
async fn test_analyze_body_without_status_fails_workflow() {
    let mock_server = MockServer::start().await;
    mount_submit_and_clone(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/api/repo/analyze/shop-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Analyzer crashed"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/repo/endpoints/shop-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "endpoints": []
        })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let controller = SessionController::new(Arc::new(create_gateway(&mock_server)));
    let outcome = controller.submit(SHOP_URL).await;

    let WorkflowOutcome::Failed(err) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(err.to_string(), "Error analyzing project: Analyzer crashed");
    let state = controller.current();
    assert_eq!(state.stage, Stage::Error);
    assert_eq!(state.snapshot.repo_name(), Some("shop-7f3a"));
    assert!(state.snapshot.project_info().is_none());
}

#[tokio::test]
async fn test_endpoints_body_without_status_is_warning() {
    let mock_server = MockServer::start().await;
    mount_shop(
        &mock_server,
        ResponseTemplate::new(200).set_body_json(json!({"endpoints": []})),
    )
    .await;

    let controller = SessionController::new(Arc::new(create_gateway(&mock_server)));
    let outcome = controller.submit(SHOP_URL).await;

    let WorkflowOutcome::Completed { snapshot, warning } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(warning.unwrap().kind(), ErrorKind::PartialEnrichment);
    assert!(snapshot.endpoints().is_none());
}

#[tokio::test]
async fn test_clone_failure_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/repo/clone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failure",
            "message": "Repository not found or is private"
        })))
        .mount(&mock_server)
        .await;

    let gateway = create_gateway(&mock_server);
    let err = gateway.clone_repository(&shop_request()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(err.operation(), Some(Operation::Clone));
    assert_eq!(err.detail(), "Repository not found or is private");
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let config = GatewayConfig::default()
        .with_base_url("http://127.0.0.1:9")
        .unwrap()
        .with_timeout(Duration::from_secs(2));
    let controller = SessionController::new(Arc::new(HttpGateway::new(config).unwrap()));

    let outcome = controller.submit(SHOP_URL).await;

    let WorkflowOutcome::Failed(err) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.operation(), Some(Operation::Submit));
    let state = controller.current();
    assert_eq!(state.stage, Stage::Error);
    assert!(state.snapshot.repo_name().is_none());
}

#[tokio::test]
async fn test_flows_fetch_and_board() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/repo/flows/shop-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "flows": [{
                "http_method": "GET",
                "endpoint": "/orders",
                "controller": "OrderController",
                "flow": [{
                    "class_name": "OrderController",
                    "class_type": "controller",
                    "method": "listOrders",
                    "parameters": [],
                    "return_type": "List<OrderDto>",
                    "calls": [{
                        "class_name": "OrderService",
                        "class_type": "service",
                        "method": "findAll",
                        "parameters": [],
                        "calls": []
                    }]
                }]
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = create_gateway(&mock_server);
    let mut board = FlowBoard::load(&gateway, "shop-7f3a").await.unwrap();

    assert_eq!(board.len(), 1);
    assert!(!board.is_expanded(0));
    board.toggle_all();
    assert!(board.is_expanded(0));

    let entry = &board.entries()[0];
    assert_eq!(entry.node_count(), 2);
    assert_eq!(entry.flow[0].calls[0].class_type, ClassType::Service);
}

fn deep_chain(depth: usize) -> String {
    let mut text = String::new();
    for level in 0..depth {
        text.push_str(&format!(
            r#"{{"class_name":"Step{level}","class_type":"service","method":"run","parameters":[],"calls":["#
        ));
    }
    text.push_str(r#"{"class_name":"Bottom","class_type":"repository","method":"save","calls":[]}"#);
    text.push_str(&"]}".repeat(depth));
    text
}

#[tokio::test]
async fn test_flows_deep_chain_loads_and_renders_bounded() {
    let mock_server = MockServer::start().await;
    let body = format!(
        r#"{{"status":"success","flows":[{{"http_method":"POST","endpoint":"/orders","controller":"OrderController","flow":[{}]}}]}}"#,
        deep_chain(1_000)
    );

    Mock::given(method("GET"))
        .and(path("/api/repo/flows/shop-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = create_gateway(&mock_server);
    let board = FlowBoard::load(&gateway, "shop-7f3a").await.unwrap();

    let entry = &board.entries()[0];
    assert_eq!(entry.node_count(), 1_001);
    let lines = render_entry(entry, DEFAULT_MAX_DEPTH);
    assert_eq!(lines.len(), DEFAULT_MAX_DEPTH + 3);
    assert!(lines
        .last()
        .unwrap()
        .ends_with(&format!("… 1 more call(s) beyond depth {DEFAULT_MAX_DEPTH}")));
}

#[tokio::test]
async fn test_flows_failure_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/repo/flows/shop-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failure",
            "message": "Flow analysis not available"
        })))
        .mount(&mock_server)
        .await;

    let gateway = create_gateway(&mock_server);
    let err = FlowBoard::load(&gateway, "shop-7f3a").await.unwrap_err();
    assert_eq!(err.to_string(), "Error loading endpoint flow data: Flow analysis not available");
}

#[tokio::test]
async fn test_diagram_routes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/repo/diagrams/entities/shop-7f3a"))
        .and(query_param("diagram_type", "er"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "puml_source": "@startuml\n@enduml",
            "diagram_url": null
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/repo/diagrams/use-cases/shop-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "puml_source": "@startuml\nactor User\n@enduml",
            "diagram_url": "http://plantuml.example/svg/abc"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = create_gateway(&mock_server);

    let er = gateway.diagram("shop-7f3a", DiagramKind::Er).await.unwrap();
    assert!(er.diagram_url.is_none());
    assert_eq!(er.puml_source.as_deref(), Some("@startuml\n@enduml"));

    let use_case = gateway.diagram("shop-7f3a", DiagramKind::UseCase).await.unwrap();
    assert_eq!(use_case.diagram_url.as_deref(), Some("http://plantuml.example/svg/abc"));
}

#[tokio::test]
async fn test_swagger_failure_status_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/repo/swagger/shop-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failure",
            "message": "No Spring Boot project"
        })))
        .mount(&mock_server)
        .await;

    let gateway = create_gateway(&mock_server);
    let err = gateway.swagger("shop-7f3a").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(err.operation(), Some(Operation::Swagger));
    assert_eq!(err.detail(), "No Spring Boot project");
}

#[tokio::test]
async fn test_swagger_and_markdown_passthrough() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/repo/swagger/shop-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "openapi": "3.0.1",
            "paths": {"/orders": {}}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/repo/export/markdown/shop-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Shop API\n"))
        .mount(&mock_server)
        .await;

    let gateway = create_gateway(&mock_server);

    let swagger = gateway.swagger("shop-7f3a").await.unwrap();
    assert_eq!(swagger["openapi"], "3.0.1");

    let markdown = gateway.markdown_export("shop-7f3a").await.unwrap();
    assert_eq!(markdown, "# Shop API\n");

    let link = gateway.features_download_url("shop-7f3a").unwrap();
    assert_eq!(
        link.as_str(),
        format!("{}/api/repo/features/download/shop-7f3a", mock_server.uri())
    );
}
