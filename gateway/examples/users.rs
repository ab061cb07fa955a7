//! Small user directory served through handler chains
//!
//! ```bash
//! cargo run --example users
//! curl 'localhost:8080/api/users?filters[0][k]=location&filters[0][v]=berlin'
//! curl -X POST localhost:8080/api/users -H 'authorization: x' -d '{"name":"sara","location":"tabriz"}'
//! ```

use std::sync::{Arc, RwLock};

use handler_gateway::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    name: String,
    location: String,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
    location: Option<String>,
}

impl Validatable for NewUser {
    type Output = User;

    fn validate(self, localizer: &dyn Localizer) -> std::result::Result<User, FieldErrors> {
        if self.name.trim().is_empty() {
            let mut errors = FieldErrors::new();
            errors.insert("name".into(), json!(localizer.translate("NameRequired", None)));
            return Err(errors);
        }
        Ok(User {
            name: self.name,
            location: self.location.unwrap_or_default(),
        })
    }
}

type Store = Arc<RwLock<Vec<User>>>;

struct ListUsers(Store);

#[async_trait]
impl Handler for ListUsers {
    async fn handle(&self, request: &mut GatewayRequest) -> HandlerResult {
        let params = request.bind_filters().clone();
        let users = self.0.read().map_err(|e| ErrorModel::internal().with_error(e))?;

        let matching: Vec<User> = users
            .iter()
            .filter(|user| {
                params.filters().iter().all(|filter| {
                    let field = match filter.key.as_str() {
                        "name" => &user.name,
                        "location" => &user.location,
                        _ => return true,
                    };
                    match (filter.comparison(), filter.value()) {
                        (Comparison::PatternMatch, Some(v)) => field.contains(v),
                        (Comparison::NotEquals, Some(v)) => field != v,
                        (_, Some(v)) => field == v,
                        (_, None) => true,
                    }
                })
            })
            .cloned()
            .collect();

        let paginator = request.paginator();
        paginator.set_total(matching.len() as u64);
        let page: Vec<User> = matching
            .into_iter()
            .skip(paginator.offset() as usize)
            .take(paginator.per_page() as usize)
            .collect();

        payload(page)
    }
}

struct CreateUser(Store);

#[async_trait]
impl Handler for CreateUser {
    async fn handle(&self, request: &mut GatewayRequest) -> HandlerResult {
        let user = request.bind::<NewUser>()?;
        self.0
            .write()
            .map_err(|e| ErrorModel::internal().with_error(e))?
            .push(user.clone());
        info!(name = %user.name, "user created");
        payload(user)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_for_service("users")?;
    init_tracing(&config)?;

    let store: Store = Arc::new(RwLock::new(vec![
        User {
            name: "ali".into(),
            location: "turkey".into(),
        },
        User {
            name: "saeed".into(),
            location: "berlin".into(),
        },
    ]));

    let catalog = MessageCatalog::new("en")
        .with_message("en", "NameRequired", "Name is required")
        .with_messages(
            "fa",
            [
                ("SuccessMessage", "عملیات با موفقیت انجام شد"),
                ("CreatedMessage", "آیتم با موفقیت ایجاد شد"),
                ("NameRequired", "نام الزامی است"),
            ],
        );

    let gateway = Gateway::from_config(&config, catalog);
    let mut users = gateway.group("/api/users");
    users.get("", HandlerChain::new().with(ListUsers(store.clone())));
    users.post(
        "",
        HandlerChain::new()
            .with(handler_fn(|request| match request.header("authorization") {
                Some(_) => Ok(None),
                None => Err(ErrorModel::unauthorized()),
            }))
            .with(CreateUser(store)),
    );

    Server::new(config).serve(gateway.into_router()).await
}
