//! User-management API behind the porter pipeline.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example users
//!
//! Try:
//!   curl -H 'Authorization: Bearer secret-token-123' http://localhost:3000/api/users
//!   curl http://localhost:3000/api/users                       # 401
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'Authorization: Bearer secret-token-123' \
//!        -d '{"name":"Carol","email":"carol@example.com","age":41}'
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'Authorization: Bearer secret-token-123' -d 'oops'   # 500

use std::sync::{LazyLock, Mutex, MutexGuard};

use porter::{Config, Method, Pipeline, Request, Response, Router, Server, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct User {
    #[serde(default)]
    id: u32,
    name: String,
    email: String,
    age: u32,
}

static USERS: LazyLock<Mutex<Vec<User>>> = LazyLock::new(|| {
    Mutex::new(vec![
        User { id: 1, name: "Alice".into(), email: "alice@example.com".into(), age: 30 },
        User { id: 2, name: "Bob".into(), email: "bob@example.com".into(), age: 25 },
    ])
});

type Outcome = Result<Response, porter::BoxError>;

#[tokio::main]
async fn main() -> Result<(), porter::Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let app = Router::new()
        .on(Method::GET,    "/api/users",      list_users)
        .on(Method::POST,   "/api/users",      create_user)
        .on(Method::GET,    "/api/users/{id}", get_user)
        .on(Method::PUT,    "/api/users/{id}", update_user)
        .on(Method::DELETE, "/api/users/{id}", delete_user);

    Server::bind(config.addr)
        .serve(Pipeline::new(config.credential, app))
        .await
}

// A poisoned lock is a fault: the pipeline answers 500.
fn users() -> Result<MutexGuard<'static, Vec<User>>, porter::BoxError> {
    USERS.lock().map_err(|e| e.to_string().into())
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Outcome {
    Ok(Response::builder().status(status).json(serde_json::to_vec(value)?))
}

fn id_param(req: &Request) -> Option<u32> {
    req.param("id")?.parse().ok()
}

/// Field errors, or `None` when the user is valid.
fn validate(user: &User) -> Option<Vec<String>> {
    let mut errors = Vec::new();
    if user.name.trim().is_empty() || user.name.len() > 100 {
        errors.push("name is required and must be at most 100 characters".to_owned());
    }
    if !user.email.contains('@') {
        errors.push("email must be a valid address".to_owned());
    }
    if !(1..=120).contains(&user.age) {
        errors.push("age must be between 1 and 120".to_owned());
    }
    (!errors.is_empty()).then_some(errors)
}

// GET /api/users
async fn list_users(_req: Request) -> Outcome {
    let users = users()?.clone();
    json(StatusCode::OK, &users)
}

// GET /api/users/{id}
async fn get_user(req: Request) -> Outcome {
    let Some(id) = id_param(&req) else { return Ok(Response::status(StatusCode::NOT_FOUND)) };
    let found = users()?.iter().find(|u| u.id == id).cloned();
    match found {
        Some(user) => json(StatusCode::OK, &user),
        None => Ok(Response::status(StatusCode::NOT_FOUND)),
    }
}

// POST /api/users
//
// Malformed JSON is not caught here: the `?` makes it a fault, and the
// pipeline's containment stage turns it into the fixed 500.
async fn create_user(mut req: Request) -> Outcome {
    let mut user: User = serde_json::from_slice(&req.bytes().await?)?;
    if let Some(errors) = validate(&user) {
        return json(StatusCode::BAD_REQUEST, &errors);
    }

    let created = {
        let mut users = users()?;
        if users.iter().any(|u| u.email == user.email) {
            return json(StatusCode::BAD_REQUEST, &"Email already exists.");
        }
        user.id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        users.push(user.clone());
        user
    };

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", &format!("/api/users/{}", created.id))
        .json(serde_json::to_vec(&created)?))
}

// PUT /api/users/{id}
async fn update_user(mut req: Request) -> Outcome {
    let Some(id) = id_param(&req) else { return Ok(Response::status(StatusCode::NOT_FOUND)) };
    let update: User = serde_json::from_slice(&req.bytes().await?)?;
    if let Some(errors) = validate(&update) {
        return json(StatusCode::BAD_REQUEST, &errors);
    }

    let mut users = users()?;
    let Some(user) = users.iter_mut().find(|u| u.id == id) else {
        return Ok(Response::status(StatusCode::NOT_FOUND));
    };
    user.name = update.name;
    user.email = update.email;
    user.age = update.age;
    Ok(Response::status(StatusCode::NO_CONTENT))
}

// DELETE /api/users/{id}
async fn delete_user(req: Request) -> Outcome {
    let Some(id) = id_param(&req) else { return Ok(Response::status(StatusCode::NOT_FOUND)) };
    let mut users = users()?;
    let before = users.len();
    users.retain(|u| u.id != id);
    if users.len() == before {
        return Ok(Response::status(StatusCode::NOT_FOUND));
    }
    Ok(Response::status(StatusCode::NO_CONTENT))
}
