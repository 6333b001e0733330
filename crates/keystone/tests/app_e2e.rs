//! Application tests driven from configuration.

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE, WWW_AUTHENTICATE};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use keystone::prelude::*;
use keystone::security::{Clock, ManualClock};
use keystone::URL_GENERATOR_SERVICE;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CONFIG: &str = r#"
    [routing]
    base_url = "https://blog.example.com"

    [session]
    cookie_name = "BLOG_SESSION"

    [[security.contexts]]
    name = "admin"
    default = true
    ttl_secs = 100
    idle_timeout_secs = 10
    regeneration_delay_secs = 30

    [[security.contexts.rules]]
    pattern = "^/admin"
    roles = ["admin"]

    [[security.contexts]]
    name = "api"

    [[security.contexts.rules]]
    pattern = "^/api"
    roles = []

    [[security.shields]]
    context = "admin"
    scheme = "form"
    logout_path = "/logout"
    logout_target = "/goodbye"

    [[security.shields]]
    context = "api"
    scheme = "basic"
    realm = "Blog API"

    [security.encoder]
    algorithm = "plaintext"

    [[security.users]]
    username = "ada"
    password = "lovelace"
    roles = ["admin"]

    [[security.users]]
    username = "bob"
    password = "builder"
    roles = ["editor"]
"#;

#[derive(Default)]
struct PostsController {
    container: Mutex<Option<Arc<Container>>>,
}

impl ContainerAware for PostsController {
    fn set_container(&self, container: Arc<Container>) {
        *self.container.lock().unwrap() = Some(container);
    }
}

impl Controller for PostsController {
    fn call<'a>(
        &'a self,
        action: Option<&'a str>,
        _request: Request,
        params: Params,
    ) -> BoxFuture<'a, KeystoneResult<HandlerOutput>> {
        Box::pin(async move {
            match action {
                Some("link") => {
                    let container = self
                        .container
                        .lock()
                        .unwrap()
                        .clone()
                        .ok_or_else(|| KeystoneError::internal("container missing"))?;
                    let urls: Arc<UriGenerator> = container.get_as(URL_GENERATOR_SERVICE)?;
                    Ok(urls.generate_url("post", &params)?.into())
                }
                _ => Ok(HandlerOutput::Empty),
            }
        })
    }

    fn as_container_aware(&self) -> Option<&dyn ContainerAware> {
        Some(self)
    }
}

fn who(request: &Request) -> String {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .map_or("anonymous".to_string(), |u| u.user().username().to_string())
}

fn app(clock: &Arc<ManualClock>) -> App {
    let config = ConfigLoader::new()
        .with_string(CONFIG, "toml")
        .unwrap()
        .load()
        .unwrap();

    let mut builder = App::builder()
        .with_clock(Arc::clone(clock) as Arc<dyn Clock>)
        .with_config(&config)
        .unwrap()
        .controller("Posts", PostsController::default);

    let routes = builder.routes_mut();
    routes
        .add_route(Route::builder("/posts/{id}", "Posts:link").name("post").method("GET"))
        .unwrap();
    routes
        .add_any(
            "/admin/dashboard",
            Callback::closure(|req: Request, _params| async move {
                Ok(format!("dashboard for {}", who(&req)))
            }),
        )
        .unwrap();
    routes
        .add_get(
            "/api/me",
            Callback::closure(|req: Request, _params| async move { Ok(who(&req)) }),
        )
        .unwrap();
    routes
        .add_get("/login", Callback::closure(|_req, _params| async { Ok("login form") }))
        .unwrap();

    builder.build().unwrap()
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(1_700_000_000))
}

fn get(uri: &str, session: Option<&str>) -> Request {
    let mut builder = http::Request::builder().method(Method::GET).uri(uri);
    if let Some(id) = session {
        builder = builder.header(COOKIE, format!("BLOG_SESSION={id}"));
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

fn post_login(body: &str, session: Option<&str>) -> Request {
    let mut builder = http::Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(id) = session {
        builder = builder.header(COOKIE, format!("BLOG_SESSION={id}"));
    }
    builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
}

fn session_id(response: &Response) -> Option<String> {
    let header = response.headers().get(SET_COOKIE)?.to_str().ok()?;
    let (pair, _) = header.split_once(';')?;
    let (name, id) = pair.split_once('=')?;
    assert_eq!(name, "BLOG_SESSION");
    (!id.is_empty()).then(|| id.to_string())
}

fn location(response: &Response) -> &str {
    response.headers().get(LOCATION).unwrap().to_str().unwrap()
}

async fn body(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn chain_has_security_stages_in_order() {
    let app = app(&clock());
    assert_eq!(
        app.middleware_names(),
        vec!["request_id", "error_boundary", "request_logging", "session", "shield", "shield"]
    );
    assert_eq!(app.contexts().default_context().unwrap().name(), "admin");
}

#[tokio::test]
async fn controller_generates_absolute_url() {
    let app = app(&clock());
    let response = app.handle(get("/posts/42", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, "https://blog.example.com/posts/42");
}

#[tokio::test]
async fn form_login_round_trip() {
    let clock = clock();
    let app = app(&clock);

    let response = app.handle(get("/admin/dashboard", None)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login");
    let anonymous = session_id(&response).unwrap();

    let response = app.handle(get("/login", Some(&anonymous))).await;
    assert_eq!(body(response).await, "login form");

    let response = app
        .handle(post_login("_username=ada&_password=lovelace", Some(&anonymous)))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/dashboard");
    let logged_in = session_id(&response).unwrap();
    assert_ne!(logged_in, anonymous);

    let response = app.handle(get("/admin/dashboard", Some(&logged_in))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, "dashboard for ada");

    clock.advance(Duration::from_secs(11));
    let response = app.handle(get("/admin/dashboard", Some(&logged_in))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn leading_slashes_are_guarded_like_the_route_they_reach() {
    let app = app(&clock());

    let response = app.handle(get("//admin/dashboard", None)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login");
    let anonymous = session_id(&response).unwrap();

    let response = app.handle(get("//api/me", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .handle(post_login("_username=ada&_password=lovelace", Some(&anonymous)))
        .await;
    assert_eq!(location(&response), "/admin/dashboard");
    let ada = session_id(&response).unwrap();

    let response = app.handle(get("//admin/dashboard", Some(&ada))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, "dashboard for ada");
}

#[tokio::test]
async fn wrong_role_is_forbidden() {
    let app = app(&clock());
    let response = app
        .handle(post_login("_username=bob&_password=builder", None))
        .await;
    let bob = session_id(&response).unwrap();

    let response = app.handle(get("/admin/dashboard", Some(&bob))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body(response).await.is_empty());
}

#[tokio::test]
async fn logout_redirects_to_target() {
    let app = app(&clock());
    let response = app
        .handle(post_login("_username=ada&_password=lovelace", None))
        .await;
    let ada = session_id(&response).unwrap();

    let response = app.handle(get("/logout", Some(&ada))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/goodbye");

    let response = app.handle(get("/admin/dashboard", Some(&ada))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn basic_shield_challenges_then_accepts_credentials() {
    let app = app(&clock());

    let response = app.handle(get("/api/me", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(WWW_AUTHENTICATE).unwrap(),
        "Basic realm=\"Blog API\""
    );

    // "bob:builder"
    let request = http::Request::builder()
        .uri("/api/me")
        .header(AUTHORIZATION, "Basic Ym9iOmJ1aWxkZXI=")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = app.handle(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, "bob");
}

#[tokio::test]
async fn unmatched_route_is_json_404() {
    let app = app(&clock());
    let response = app.handle(get("/nowhere", None)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_str(&body(response).await).unwrap();
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}
