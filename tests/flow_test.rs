use std::rc::Rc;
use std::time::Duration;

use serde_json::json;
use starberry_auth::auth_core::utilities::parse_query_string;
use starberry_auth::{
    AuthConfig, AuthError, AuthPlugin, Collaborators, GuardOptions, GuardOutcome, HostWindow, HttpMethod,
    HttpResponse, InMemoryHttpClient, InMemoryRouter, InMemorySurface, InMemoryWindow, Navigation,
    RecordingPublisher, StorageArea,
};

struct Harness {
    surface: InMemorySurface,
    http: InMemoryHttpClient,
    router: Rc<InMemoryRouter>,
    host: Rc<InMemoryWindow>,
    events: Rc<RecordingPublisher>,
}

impl Harness {
    fn new() -> Self {
        Self {
            surface: InMemorySurface::new(),
            http: InMemoryHttpClient::new(),
            router: Rc::new(InMemoryRouter::new()),
            host: Rc::new(InMemoryWindow::new("https://app.test")),
            events: Rc::new(RecordingPublisher::new()),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            storage: Rc::new(self.surface.clone()),
            http: Rc::new(self.http.clone()),
            router: self.router.clone(),
            host: self.host.clone(),
            events: self.events.clone(),
        }
    }

    fn stored(&self, key: &str) -> Option<String> {
        self.surface.local_area().and_then(|area| area.get(key))
    }
}

#[tokio::test]
async fn google_popup_login_end_to_end() {
    let harness = Harness::new();
    harness.http.insert_response(
        HttpMethod::POST,
        "https://api.test/auth/google",
        HttpResponse::with_json(200, &json!({ "access_token": "google-session" })),
    );
    let config = AuthConfig::from_json(
        r#"{ "baseUrl": "https://api.test", "providers": { "google": { "clientId": "gid" } } }"#,
    )
    .unwrap();
    let ctx = AuthPlugin::new(config)
        .guard(GuardOptions { include: vec!["orders".into()], ..Default::default() })
        .register(harness.collaborators())
        .unwrap();

    harness.host.set_href("https://app.test/#/orders");
    let outcome = ctx.authorize_step.run(&Navigation::to("/orders")).await.unwrap();
    assert_eq!(outcome, GuardOutcome::Cancel);

    // The provider redirects back once the user consents, echoing the state it was sent.
    let provider = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let opened = harness.host.opened();
        let authorize_url = &opened[0].url;
        let query = authorize_url.split_once('?').map(|(_, q)| q).unwrap_or_default();
        let params = parse_query_string(query);
        assert_eq!(params["client_id"], "gid");
        assert_eq!(params["scope"], "openid profile email");
        assert_eq!(params["display"], "popup");
        let state = params["state"].as_str().unwrap().to_string();
        harness
            .host
            .popup()
            .push_location(format!("https://app.test/?code=auth-code&state={}", state));
    };
    let (response, _) = futures::join!(ctx.service.authenticate("google", None, None), provider);

    assert_eq!(response.unwrap()["access_token"], "google-session");
    assert_eq!(harness.stored("aurelia_token").as_deref(), Some("google-session"));
    assert_eq!(harness.events.topics(), vec!["auth:authenticate"]);
    assert_eq!(harness.host.popup().close_calls(), 1);
    assert_eq!(
        harness.router.last().map(|call| call.1),
        Some("https://app.test/#/orders".to_string())
    );

    let exchange = harness.http.requests_to(HttpMethod::POST, "https://api.test/auth/google");
    let body = exchange[0].body_json().unwrap();
    assert_eq!(body["code"], "auth-code");
    assert_eq!(body["clientId"], "gid");
    assert_eq!(body["redirectUri"], "https://app.test");
}

#[tokio::test]
async fn closing_the_popup_aborts_authentication() {
    let harness = Harness::new();
    let ctx = AuthPlugin::default().register(harness.collaborators()).unwrap();
    harness.host.popup().push_location("https://github.com/login");
    harness.host.popup().close_by_user();

    let err = ctx.service.authenticate("github", None, None).await.unwrap_err();
    assert!(matches!(err, AuthError::PopupProblem));
    assert_eq!(err.descriptor(), json!({ "data": "Problem poll popup" }));
    assert!(harness.http.requests().is_empty());
    assert_eq!(harness.stored("aurelia_token"), None);
}

#[tokio::test]
async fn blocked_popup_is_reported() {
    let harness = Harness::new();
    harness.host.block_popups(true);
    let ctx = AuthPlugin::default().register(harness.collaborators()).unwrap();

    let err = ctx.service.authenticate("linkedin", None, None).await.unwrap_err();
    assert!(matches!(err, AuthError::PopupBlocked));
    assert_eq!(harness.stored("linkedin_state").as_deref(), Some("STATE"));
}
