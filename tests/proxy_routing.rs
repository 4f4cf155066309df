//! End-to-end routing tests against mock upstreams.

use axum::http::StatusCode;
use dev_proxy::http::response::BAD_GATEWAY_BODY;

mod common;
use common::{client, config_for, get_echo, start_proxy, start_upstream};

#[tokio::test]
async fn service_api_goes_to_local_backend_with_identity() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/GUID-ABC")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;
    let client = client();

    let echo = get_echo(&client, &proxy.url("/acme/ms/ai-assistant/v1/chat?x=1")).await;

    assert_eq!(echo.upstream, "backend");
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.target, "/v1/chat?x=1");
    assert_eq!(echo.header("x-firm"), Some("acme"));
    assert_eq!(echo.header("x-firm-guid"), Some("guid-abc"));
    assert_eq!(echo.header("x-engagement"), None);
}

#[tokio::test]
async fn service_api_with_empty_remainder_hits_backend_root() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;

    let echo = get_echo(&client(), &proxy.url("/acme/ms/ai-assistant")).await;
    assert_eq!(echo.upstream, "backend");
    assert_eq!(echo.target, "/");
}

#[tokio::test]
async fn agent_url_serves_frontend_root_and_sets_engagement() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/GUID-ABC")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;
    let client = client();

    let page = get_echo(&client, &proxy.url("/acme/e/eng/eng123/s/aida-agent?foo=bar")).await;
    assert_eq!(page.upstream, "frontend");
    assert_eq!(page.target, "/?foo=bar");
    assert_eq!(page.header("x-firm"), None);

    let api = get_echo(&client, &proxy.url("/acme/ms/ai-assistant/v1/chat")).await;
    assert_eq!(api.upstream, "backend");
    assert_eq!(api.header("x-engagement"), Some("ZW5nMTIz"));
}

#[tokio::test]
async fn latest_agent_url_replaces_engagement() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;
    let client = client();

    get_echo(&client, &proxy.url("/acme/e/eng/first/s/aida-agent")).await;
    get_echo(&client, &proxy.url("/acme/e/eng/second/s/aida-agent")).await;

    let api = get_echo(&client, &proxy.url("/acme/ms/ai-assistant/x")).await;
    // base64("second")
    assert_eq!(api.header("x-engagement"), Some("c2Vjb25k"));
}

#[tokio::test]
async fn static_assets_go_to_frontend_unchanged() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;
    let client = client();

    for path in ["/_next/static/chunk.js?v=2", "/__nextjs_original-stack-frame", "/favicon.ico"] {
        let response = client
            .get(proxy.url(path))
            .header("x-foo", "bar baz")
            .header("accept", "text/javascript")
            .header("cookie", "sid=1; theme=dark")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let echo = common::Echo::parse(&response.text().await.unwrap());

        assert_eq!(echo.upstream, "frontend", "{path}");
        assert_eq!(echo.target, path);
        assert_eq!(echo.header("host"), Some(proxy.addr.to_string().as_str()));
        assert_eq!(echo.header("x-foo"), Some("bar baz"));
        assert_eq!(echo.header("accept"), Some("text/javascript"));
        assert_eq!(echo.header("cookie"), Some("sid=1; theme=dark"));
        assert_eq!(echo.header("x-firm"), None);
    }
    assert_eq!(cloud.lookups(), 0);
}

#[tokio::test]
async fn raw_path_and_query_reach_upstream_untouched() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;

    let echo = common::raw_get(proxy.addr, "/a/b/../c?q=O'Brien").await;
    assert_eq!(echo.upstream, "cloud");
    assert_eq!(echo.target, "/a/b/../c?q=O'Brien");

    let echo = common::raw_get(proxy.addr, "/_next/static/%2e%2e/x.js").await;
    assert_eq!(echo.upstream, "frontend");
    assert_eq!(echo.target, "/_next/static/%2e%2e/x.js");

    let echo = common::raw_get(proxy.addr, "/acme/ms/ai-assistant/./v1/../chat?name=O'Brien").await;
    assert_eq!(echo.upstream, "backend");
    assert_eq!(echo.target, "/./v1/../chat?name=O'Brien");
}

#[tokio::test]
async fn everything_else_passes_through_to_cloud() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;

    let echo = get_echo(&client(), &proxy.url("/acme/api/users?page=2")).await;

    assert_eq!(echo.upstream, "cloud");
    assert_eq!(echo.target, "/acme/api/users?page=2");
    assert_eq!(echo.header("host"), Some(cloud.addr.to_string().as_str()));
    assert_eq!(echo.header("x-firm"), None);
    assert_eq!(echo.header("x-firm-guid"), None);
    assert_eq!(cloud.lookups(), 0);
}

#[tokio::test]
async fn cloud_mode_sends_service_api_to_cloud_with_full_path() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/GUID-ABC")).await;
    let mut config = config_for(&frontend, &backend, &cloud);
    config.routing.local_mode = false;
    let proxy = start_proxy(config).await;

    let echo = get_echo(&client(), &proxy.url("/acme/ms/ai-assistant/v1/chat?x=1")).await;

    assert_eq!(echo.upstream, "cloud");
    assert_eq!(echo.target, "/acme/ms/ai-assistant/v1/chat?x=1");
    assert_eq!(echo.header("x-firm"), Some("acme"));
    assert_eq!(echo.header("x-firm-guid"), Some("guid-abc"));
}

#[tokio::test]
async fn client_supplied_firm_header_is_overwritten() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;

    let response = client()
        .get(proxy.url("/acme/ms/ai-assistant/v1"))
        .header("x-firm", "someone-else")
        .send()
        .await
        .unwrap();
    let echo = common::Echo::parse(&response.text().await.unwrap());

    assert_eq!(echo.header("x-firm"), Some("acme"));
}

#[tokio::test]
async fn request_body_and_method_are_forwarded() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;

    let payload = "x".repeat(256 * 1024);
    let response = client()
        .post(proxy.url("/acme/ms/ai-assistant/v1/upload"))
        .header("content-type", "text/plain")
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let echo = common::Echo::parse(&response.text().await.unwrap());
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.header("content-type"), Some("text/plain"));
    assert_eq!(echo.body.len(), payload.len());
    assert_eq!(echo.body, payload);
}

#[tokio::test]
async fn upstream_status_and_headers_are_relayed() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;

    let response = client().get(proxy.url("/redirect")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/elsewhere");

    let response = client().get(proxy.url("/anything")).send().await.unwrap();
    assert_eq!(response.headers()["x-upstream"], "cloud");
    assert_ne!(response.text().await.unwrap(), BAD_GATEWAY_BODY);
}

#[tokio::test]
async fn request_id_is_generated_and_forwarded() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;

    let response = client().get(proxy.url("/page")).send().await.unwrap();
    let id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    let echo = common::Echo::parse(&response.text().await.unwrap());

    assert!(uuid::Uuid::parse_str(&id).is_ok());
    assert_eq!(echo.header("x-request-id"), Some(id.as_str()));
}

#[tokio::test]
async fn set_cookie_paths_are_widened_when_configured() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let mut config = config_for(&frontend, &backend, &cloud);
    config.cookies.widen_prefix = Some("/acme/".to_string());
    let proxy = start_proxy(config).await;

    let response = client().get(proxy.url("/cookie")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["set-cookie"], "sid=1; Path=/; HttpOnly");
}

#[tokio::test]
async fn set_cookie_is_untouched_by_default() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let proxy = start_proxy(config_for(&frontend, &backend, &cloud)).await;

    let response = client().get(proxy.url("/cookie")).send().await.unwrap();
    assert_eq!(response.headers()["set-cookie"], "sid=1; Path=/acme/e/eng; HttpOnly");
}

#[tokio::test]
async fn cors_preflight_mirrors_origin_when_enabled() {
    let frontend = start_upstream("frontend", None).await;
    let backend = start_upstream("backend", None).await;
    let cloud = start_upstream("cloud", Some("/g")).await;
    let mut config = config_for(&frontend, &backend, &cloud);
    config.cors.enabled = true;
    let proxy = start_proxy(config).await;

    let response = client()
        .request(reqwest::Method::OPTIONS, proxy.url("/acme/ms/ai-assistant/v1"))
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
}
