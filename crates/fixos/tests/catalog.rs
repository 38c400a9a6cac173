use fixos::adapters::{GuideClient, ShopFinder};
use fixos::catalog::{
    Catalog, GET_REPAIR_GUIDE, IDENTIFY_VEHICLE_ISSUE, START_AUDIO_DIAGNOSTIC,
};
use fixos::models::{Message, ToolCall};
use fixos::registry::tools::validate_value;
use fixos::render::resolve;
use serde_json::json;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn unreachable_catalog() -> (MockServer, Catalog) {
    // Every upstream call fails, exercising the degraded paths.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let guide = GuideClient::new(server.uri()).unwrap();
    let shops = ShopFinder::new(server.uri(), server.uri()).unwrap();
    let catalog = Catalog::standard(guide, shops).unwrap();
    (server, catalog)
}

#[tokio::test]
async fn test_every_tool_has_a_component_and_valid_fallback() {
    let (_server, catalog) = unreachable_catalog().await;

    assert_eq!(catalog.tools.definitions().len(), 6);
    assert_eq!(catalog.components.definitions().len(), 6);

    let params = json!({
        "vehicleDescription": "2015 Honda Civic",
        "issueDescription": "grinding when braking",
        "device": "iPhone 13",
        "issue": "Loudspeaker Replacement",
        "issueSummary": "grinding when braking",
        "partName": "brake pads",
        "vehicleInfo": "2015 Honda Civic",
        "issueType": "brake service"
    });

    for definition in catalog.tools.definitions() {
        let component = catalog
            .components
            .find_by_tool_name(definition.name())
            .unwrap_or_else(|| panic!("no component for {}", definition.name()));
        assert_eq!(component.props_schema, definition.output_schema);

        let fallback = definition.fallback(&params);
        if let Err(issues) = validate_value(&definition.output_schema, &fallback) {
            panic!(
                "fallback for {} violates its schema: {issues:?}",
                definition.name()
            );
        }
    }
}

#[tokio::test]
async fn test_invoke_degrades_to_schema_valid_fallback() {
    let (_server, catalog) = unreachable_catalog().await;

    let result = catalog
        .tools
        .invoke(
            GET_REPAIR_GUIDE,
            json!({ "device": "iPhone 13", "issue": "Loudspeaker Replacement" }),
        )
        .await
        .unwrap();

    let definition = catalog.tools.lookup(GET_REPAIR_GUIDE).unwrap();
    assert!(validate_value(&definition.output_schema, &result).is_ok());
    assert_eq!(result["difficulty"], "Moderate");
    // Phone context selects the phone tool list.
    assert!(result["toolsRequired"]
        .as_array()
        .unwrap()
        .iter()
        .any(|tool| tool == "Pentalobe Screwdriver"));
}

#[tokio::test]
async fn test_invoke_uses_upstream_guide_when_available() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/api/2\\.0/suggest/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "guideid": 1001 }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/api/2\\.0/guides/1001$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "iPhone 13 Loudspeaker Replacement",
            "difficulty": "Moderate",
            "time_required": "20-40 minutes",
            "tools": [{ "text": "Pentalobe Screwdriver" }],
            "parts": [{ "text": "Loudspeaker" }],
            "steps": [
                { "orderby": 1, "lines": [{ "text_raw": "Power off your iPhone." }] }
            ]
        })))
        .mount(&server)
        .await;

    let guide = GuideClient::new(server.uri()).unwrap();
    let shops = ShopFinder::new(server.uri(), server.uri()).unwrap();
    let catalog = Catalog::standard(guide, shops).unwrap();

    let result = catalog
        .tools
        .invoke(
            GET_REPAIR_GUIDE,
            json!({ "device": "iPhone 13", "issue": "Loudspeaker Replacement" }),
        )
        .await
        .unwrap();

    assert_eq!(result["title"], "iPhone 13 Loudspeaker Replacement");
    let definition = catalog.tools.lookup(GET_REPAIR_GUIDE).unwrap();
    assert!(validate_value(&definition.output_schema, &result).is_ok());
}

#[tokio::test]
async fn test_thread_renders_and_suppresses_with_standard_policy() {
    let (_server, catalog) = unreachable_catalog().await;

    let issue_result = json!({
        "vehicleName": "2015 Honda Civic",
        "issueDescription": "grinding when braking",
        "status": "warning",
        "confidence": 80
    });

    let thread = vec![
        Message::user().with_text("My 2015 Honda Civic is grinding when braking"),
        Message::assistant().with_tool_request(
            "call-1",
            Ok(ToolCall::new(
                IDENTIFY_VEHICLE_ISSUE,
                json!({
                    "vehicleDescription": "2015 Honda Civic",
                    "issueDescription": "grinding when braking"
                }),
            )),
        ),
        Message::tool().with_tool_response("call-1", Ok(issue_result.clone())),
    ];

    let card = resolve(&thread, 1, &catalog.components, &catalog.policy).unwrap();
    assert_eq!(card.component, "VehicleHero");
    assert_eq!(card.props, issue_result);
    assert!(!card.live);

    // A later audio diagnostic suppresses the issue card and renders
    // live from its defaults while the result is pending.
    let mut thread = thread;
    thread.push(Message::assistant().with_tool_request(
        "call-2",
        Ok(ToolCall::new(START_AUDIO_DIAGNOSTIC, json!({}))),
    ));

    assert!(resolve(&thread, 1, &catalog.components, &catalog.policy).is_none());

    let card = resolve(&thread, 3, &catalog.components, &catalog.policy).unwrap();
    assert_eq!(card.component, "AudioDiagnostic");
    assert!(card.live);
    assert_eq!(card.props, json!({ "isListening": false }));
}
