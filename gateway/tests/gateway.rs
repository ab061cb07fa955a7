//! End-to-end tests driving the gateway router in-process

use axum::body::Body;
use axum::http::{Request, StatusCode};
use handler_gateway::prelude::*;
use tower::ServiceExt;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    name: String,
    age: u32,
    location: String,
}

struct HelloHandler;

#[async_trait]
impl Handler for HelloHandler {
    async fn handle(&self, request: &mut GatewayRequest) -> HandlerResult {
        let users = vec![
            User {
                name: "ali".into(),
                age: 25,
                location: "turkey".into(),
            },
            User {
                name: "saeed".into(),
                age: 30,
                location: "berlin".into(),
            },
        ];
        request.paginator().set_total(2);
        payload(users)
    }
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
    age: u32,
}

impl Validatable for NewUser {
    type Output = User;

    fn validate(self, localizer: &dyn Localizer) -> std::result::Result<User, FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.name.is_empty() {
            errors.insert("name".into(), json!(localizer.translate("Required", None)));
        }
        if self.age < 18 {
            errors.insert("age".into(), json!(localizer.translate("TooYoung", None)));
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(User {
            name: self.name,
            age: self.age,
            location: "unknown".into(),
        })
    }
}

fn catalog() -> MessageCatalog {
    MessageCatalog::new("en")
        .with_message("fa", "SuccessMessage", "عملیات با موفقیت انجام شد")
        .with_message("fa", "ForbiddenError", "دسترسی ممنوع")
        .with_message("en", "TooYoung", "Must be an adult")
        .with_message("en", "UnProcessableError", "Your request could not be processed")
}

fn app() -> Router {
    let gateway = Gateway::new(Controller::default(), catalog());

    let mut test = gateway.group("test");
    test.get(
        "success",
        HandlerChain::new()
            .with(handler_fn(|_| Ok(None)))
            .with(HelloHandler),
    );
    test.get(
        "err",
        HandlerChain::new().with(handler_fn(|_| Err(ErrorModel::forbidden()))),
    );
    test.get(
        "search",
        HandlerChain::new().with(handler_fn(|request| {
            let params = request.bind_filters().clone();
            payload(params)
        })),
    );
    test.post(
        "users",
        HandlerChain::new()
            .with(handler_fn(|request| request.bind::<NewUser>().map(|_| None)))
            .with(handler_fn(|request| payload(request.body::<User>().cloned()))),
    );
    test.put(
        "users/{name}",
        HandlerChain::new().with(handler_fn(|request| {
            payload(request.param("name").map(str::to_owned))
        })),
    );
    test.put(
        "adults/{age}",
        HandlerChain::new().with(handler_fn(|request| {
            let user = request.bind::<NewUser>()?;
            payload(user)
        })),
    );
    test.delete("users/{name}", HandlerChain::new().with(handler_fn(|_| Ok(None))));
    test.get("page", HandlerChain::new().with(handler_fn(|request| {
        request.respond_html(StatusCode::OK, "<h1>hello</h1>");
        Ok(None)
    })));
    test.get("silent", HandlerChain::new());

    let mut secured = test.group("secured");
    secured.middleware(HandlerChain::new().with(handler_fn(|request| {
        match request.header("authorization") {
            Some(_) => Ok(None),
            None => Err(ErrorModel::unauthorized()),
        }
    })));
    secured.get("me", HandlerChain::new().with(handler_fn(|_| payload("me"))));

    gateway.into_router()
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("content-type", "application/json")
        .header("accept-language", "fa")
        .body(Body::empty())
        .unwrap()
}

fn with_body(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_success_chain_returns_envelope() {
    let (status, body) = send(get("/test/success")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["result"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["per_page"], 10);
    assert_eq!(body["version"], "v1");
    assert_eq!(body["message"], "عملیات با موفقیت انجام شد");
}

#[tokio::test]
async fn test_error_handler_returns_forbidden() {
    let (status, body) = send(get("/test/err")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["type"], "forbidden");
    assert_eq!(body["message"], "دسترسی ممنوع");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_filters_are_bound_from_query() {
    let (status, body) = send(get(
        "/test/search?filters%5Ba%5D%5Bk%5D=age&filters%5Ba%5D%5Bo%5D=bt&filters%5Ba%5D%5Bv%5D=18&filters%5Ba%5D%5Bv%5D=30&sorts%5B0%5D%5Bk%5D=name&sorts%5B0%5D%5Bv%5D=desc&page=2&limit=5",
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    let result = &body["data"]["result"];
    assert_eq!(result["filters"][0]["k"], "age");
    assert_eq!(result["filters"][0]["op"], "bt");
    assert_eq!(result["filters"][0]["v"], json!(["18", "30"]));
    assert_eq!(result["sorts"][0]["k"], "name");
    assert_eq!(result["sorts"][0]["v"], "desc");
    assert_eq!(result["page"], 2);
    assert_eq!(result["limit"], 5);
    assert_eq!(body["data"]["per_page"], 5);
}

#[tokio::test]
async fn test_post_binds_and_wraps_result() {
    let (status, body) = send(with_body(
        Method::POST,
        "/test/users",
        r#"{"name":"ali","age":25}"#,
    ))
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Item has been created successfully");
    assert_eq!(body["data"]["result"][0]["name"], "ali");
    assert_eq!(body["data"]["result"][0]["location"], "unknown");
}

#[tokio::test]
async fn test_post_validation_failure() {
    let (status, body) = send(with_body(
        Method::POST,
        "/test/users",
        r#"{"name":"","age":12}"#,
    ))
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["type"], "un_processable");
    assert_eq!(body["errors"]["name"], "Required");
    assert_eq!(body["errors"]["age"], "Must be an adult");
}

#[tokio::test]
async fn test_post_malformed_json() {
    let (status, body) = send(with_body(Method::POST, "/test/users", "{")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!body["error_text"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_parse_failure_keeps_error_text_under_catalog() {
    let (status, body) = send(with_body(
        Method::POST,
        "/test/users",
        r#"{"name":"ali","age":"old"}"#,
    ))
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Your request could not be processed");
    assert!(body["error_text"].as_str().unwrap().contains("invalid type"));
}

#[tokio::test]
async fn test_bind_combines_path_param_and_body() {
    let (status, body) = send(with_body(
        Method::PUT,
        "/test/adults/30",
        r#"{"name":"sara"}"#,
    ))
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["result"][0]["name"], "sara");
    assert_eq!(body["data"]["result"][0]["age"], 30);
}

#[tokio::test]
async fn test_put_is_created_with_path_param() {
    let (status, body) = send(with_body(Method::PUT, "/test/users/reza", "")).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Item has been updated successfully");
    assert_eq!(body["data"]["result"], json!(["reza"]));
}

#[tokio::test]
async fn test_delete_without_result_is_no_content() {
    let response = app()
        .oneshot(with_body(Method::DELETE, "/test/users/reza", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_direct_html_response() {
    let response = app().oneshot(get("/test/page")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/html; charset=utf-8"
    );
}

#[tokio::test]
async fn test_group_middleware_guards_routes() {
    let (status, body) = send(get("/test/secured/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["type"], "unauthorized");

    let request = Request::builder()
        .uri("/test/secured/me")
        .header("authorization", "Bearer token")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["result"], "me");
}

#[tokio::test]
async fn test_empty_chain_is_internal_error() {
    let (status, body) = send(get("/test/silent")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["type"], "unknown");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = app().oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
