use anyhow::Context;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use lazy_static::lazy_static;
use regex::Regex;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, RegisterForm},
        password::{hash_password, verify_password},
        repo::{CreateUserError, User},
        session::{current_user_id, establish, push_flash, take_flash, FlashKind},
    },
    error::ApiError,
    pages,
    state::AppState,
};

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{3,20}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

#[instrument(skip(session))]
pub async fn register_page(session: Session) -> Result<Response, ApiError> {
    if current_user_id(&session).await?.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let flashes = take_flash(&session).await?;
    Ok(pages::register(&flashes).into_response())
}

#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect, ApiError> {
    if current_user_id(&session).await?.is_some() {
        return Ok(Redirect::to("/"));
    }

    let username = form.username.trim();
    if !is_valid_username(username) {
        push_flash(
            &session,
            FlashKind::Error,
            "Usernames are 3-20 letters, digits or underscores.",
        )
        .await?;
        return Ok(Redirect::to("/register"));
    }
    if form.password.len() < 8 {
        push_flash(
            &session,
            FlashKind::Error,
            "Password must be at least 8 characters.",
        )
        .await?;
        return Ok(Redirect::to("/register"));
    }

    if User::find_by_username(&state.db, username)
        .await
        .context("look up username")?
        .is_some()
    {
        warn!(username, "registration with taken username");
        push_flash(
            &session,
            FlashKind::Error,
            "Username already exists. Please choose another.",
        )
        .await?;
        return Ok(Redirect::to("/register"));
    }

    let hash = hash_password(&form.password)?;
    match User::create(&state.db, username, &hash).await {
        Ok(user) => {
            info!(user_id = user.id, username, "user registered");
            push_flash(
                &session,
                FlashKind::Success,
                "Account created! You can now log in.",
            )
            .await?;
            Ok(Redirect::to("/login"))
        }
        // Lost a race with a concurrent registration; same outcome as the
        // pre-check.
        Err(CreateUserError::DuplicateUsername) => {
            warn!(username, "registration raced a duplicate username");
            push_flash(
                &session,
                FlashKind::Error,
                "Username already exists. Please choose another.",
            )
            .await?;
            Ok(Redirect::to("/register"))
        }
        Err(CreateUserError::Database(e)) => Err(ApiError::Internal(e.into())),
    }
}

#[instrument(skip(session))]
pub async fn login_page(session: Session) -> Result<Response, ApiError> {
    if current_user_id(&session).await?.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let flashes = take_flash(&session).await?;
    Ok(pages::login(&flashes).into_response())
}

#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, ApiError> {
    if current_user_id(&session).await?.is_some() {
        return Ok(Redirect::to("/"));
    }

    let username = form.username.trim();
    let user = User::find_by_username(&state.db, username)
        .await
        .context("look up username")?;
    let verified = match &user {
        Some(user) => verify_password(&form.password, &user.password_hash).unwrap_or(false),
        None => false,
    };

    match user {
        Some(user) if verified => {
            // Fresh session id on privilege change.
            session.cycle_id().await.context("cycle session id")?;
            establish(&session, user.id).await?;
            info!(user_id = user.id, "user logged in");
            Ok(Redirect::to("/"))
        }
        // One message for bad password and unknown user alike.
        _ => {
            warn!(username, "failed login attempt");
            push_flash(&session, FlashKind::Error, "Invalid username or password.").await?;
            Ok(Redirect::to("/login"))
        }
    }
}

#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Redirect, ApiError> {
    session.flush().await.context("clear session")?;
    Ok(Redirect::to("/login"))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{
            header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
            Request, StatusCode,
        },
        Router,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::is_valid_username;
    use crate::{app::build_app, auth::repo::User, state::AppState};

    fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("build request")
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).expect("build request")
    }

    fn location(response: &axum::response::Response) -> &str {
        response
            .headers()
            .get(LOCATION)
            .expect("redirect has a location")
            .to_str()
            .expect("ascii location")
    }

    fn session_cookie(response: &axum::response::Response) -> String {
        let raw = response
            .headers()
            .get(SET_COOKIE)
            .expect("response sets a cookie")
            .to_str()
            .expect("ascii cookie");
        raw.split(';').next().expect("cookie pair").to_string()
    }

    async fn register_and_login(app: &Router, username: &str, password: &str) -> String {
        let body = format!("username={username}&password={password}");
        let response = app
            .clone()
            .oneshot(post_form("/register", &body, None))
            .await
            .expect("register");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");

        let response = app
            .clone()
            .oneshot(post_form("/login", &body, None))
            .await
            .expect("login");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        session_cookie(&response)
    }

    #[test]
    fn username_pattern() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("Bob_42"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("way_too_long_for_a_username"));
        assert!(!is_valid_username("<script>"));
        assert!(!is_valid_username("a b"));
    }

    #[tokio::test]
    async fn register_login_and_view_main_page() {
        let state = AppState::for_tests(true, None).await;
        let app = build_app(state);

        let cookie = register_and_login(&app, "alice", "password123").await;

        let response = app
            .clone()
            .oneshot(get("/", Some(&cookie)))
            .await
            .expect("main page");
        assert_eq!(response.status(), StatusCode::OK);
        let body = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let html = String::from_utf8(body.to_vec()).expect("utf8 body");
        assert!(html.contains("alice"));
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_the_first_record() {
        let state = AppState::for_tests(true, None).await;
        let app = build_app(state.clone());

        let response = app
            .clone()
            .oneshot(post_form(
                "/register",
                "username=alice&password=password123",
                None,
            ))
            .await
            .expect("first register");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let first = User::find_by_username(&state.db, "alice")
            .await
            .expect("query")
            .expect("user created");

        let response = app
            .clone()
            .oneshot(post_form(
                "/register",
                "username=alice&password=different-password",
                None,
            ))
            .await
            .expect("second register");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/register");

        let stored = User::find_by_username(&state.db, "alice")
            .await
            .expect("query")
            .expect("user still present");
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.password_hash, first.password_hash);
    }

    #[tokio::test]
    async fn bad_password_and_unknown_user_fail_identically() {
        let state = AppState::for_tests(true, None).await;
        let app = build_app(state);

        let response = app
            .clone()
            .oneshot(post_form(
                "/register",
                "username=alice&password=password123",
                None,
            ))
            .await
            .expect("register");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let bad_password = app
            .clone()
            .oneshot(post_form("/login", "username=alice&password=wrong-pass", None))
            .await
            .expect("login");
        let unknown_user = app
            .clone()
            .oneshot(post_form("/login", "username=mallory&password=wrong-pass", None))
            .await
            .expect("login");

        assert_eq!(bad_password.status(), unknown_user.status());
        assert_eq!(location(&bad_password), location(&unknown_user));
        assert_eq!(location(&bad_password), "/login");

        // Neither attempt may establish a session.
        let cookie = session_cookie(&bad_password);
        let response = app
            .clone()
            .oneshot(get("/", Some(&cookie)))
            .await
            .expect("main page");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn logout_locks_out_the_old_cookie() {
        let state = AppState::for_tests(true, None).await;
        let app = build_app(state);

        let cookie = register_and_login(&app, "alice", "password123").await;

        let response = app
            .clone()
            .oneshot(get("/logout", Some(&cookie)))
            .await
            .expect("logout");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");

        let response = app
            .clone()
            .oneshot(get("/", Some(&cookie)))
            .await
            .expect("main page");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn protected_api_redirects_without_a_session() {
        let state = AppState::for_tests(true, Some("test-key".into())).await;
        let app = build_app(state);

        let request = Request::builder()
            .method("POST")
            .uri("/api/gemini")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"prompt":"hello"}"#))
            .expect("build request");
        let response = app.oneshot(request).await.expect("send request");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn login_page_short_circuits_when_authenticated() {
        let state = AppState::for_tests(true, None).await;
        let app = build_app(state);

        let cookie = register_and_login(&app, "alice", "password123").await;

        for uri in ["/login", "/register"] {
            let response = app
                .clone()
                .oneshot(get(uri, Some(&cookie)))
                .await
                .expect("page");
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), "/");
        }
    }

    #[tokio::test]
    async fn unauthenticated_variant_has_no_auth_routes() {
        let state = AppState::for_tests(false, None).await;
        let app = build_app(state);

        let response = app.clone().oneshot(get("/", None)).await.expect("main page");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get("/login", None)).await.expect("login");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
