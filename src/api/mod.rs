//! Web layer - HTML pages, forms and routing
//!
//! This module contains every HTTP endpoint of the blog:
//! - Post listing, detail, create, edit and delete pages
//! - Comment submission
//! - Category and tag archives
//! - Login, logout and registration
//! - Uploaded media under the configured URL prefix

pub mod auth;
pub mod categories;
pub mod comments;
pub mod flash;
pub mod middleware;
pub mod posts;
pub mod render;
pub mod tags;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

pub use flash::{FlashLevel, FlashMessage};
pub use middleware::{ApiError, AppState, RequireUser};

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let upload = &state.config.upload;
    let media_prefix = format!("/{}", upload.url_prefix.trim_matches('/'));
    let body_limit = usize::try_from(upload.max_request_size).unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(posts::index))
        .route("/post/{id}", get(posts::detail).post(comments::add_comment))
        .route("/crear", get(posts::create_form).post(posts::create))
        .route("/editar/{id}", get(posts::edit_form).post(posts::update))
        .route(
            "/post/{id}/eliminar",
            get(posts::confirm_delete).post(posts::delete),
        )
        .route("/perfil", get(posts::profile))
        .route("/categoria/{name}", get(categories::category_posts))
        .route("/tags/{name}", get(tags::tag_posts))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/registro", get(auth::register_form).post(auth::register))
        .nest_service(&media_prefix, ServeDir::new(&upload.path))
        .fallback(middleware::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        // Runs after authentication so error pages know the current user
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{create_test_pool, migrations};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        state: AppState,
        _media: tempfile::TempDir,
    }

    async fn test_app() -> TestApp {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let media = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.upload.path = media.path().to_path_buf();
        config.site.name = "Bitácora de prueba".to_string();

        let state = AppState::build(config, pool).expect("Failed to build state");
        state
            .category_service
            .seed_defaults(&state.config.site.default_categories)
            .await
            .expect("seed categories");

        TestApp {
            router: build_router(state.clone()),
            state,
            _media: media,
        }
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> Response {
            self.router
                .clone()
                .oneshot(request)
                .await
                .expect("request failed")
        }

        async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
            let mut builder = Request::builder().uri(uri);
            if let Some(cookie) = cookie {
                builder = builder.header(header::COOKIE, cookie);
            }
            self.send(builder.body(Body::empty()).expect("request")).await
        }

        async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response {
            let mut builder = Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            if let Some(cookie) = cookie {
                builder = builder.header(header::COOKIE, cookie);
            }
            self.send(builder.body(Body::from(body.to_string())).expect("request"))
                .await
        }

        /// Register an account and return its session cookie
        async fn register(&self, username: &str) -> String {
            let body = format!(
                "username={}&email={}%40example.com&password1=Montana-2024&password2=Montana-2024",
                username, username
            );
            let response = self.post_form("/registro", &body, None).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            session_from(&response).expect("session cookie")
        }
    }

    fn session_from(response: &Response) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("session=") && !v.starts_with("session=;"))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    fn multipart_body(boundary: &str, fields: &[(&str, &str)], files: &[(&str, &str, &str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    boundary, name, value
                )
                .as_bytes(),
            );
        }
        for (name, file_name, content_type, data) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    boundary, name, file_name, content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        body
    }

    async fn create_post(app: &TestApp, cookie: &str, fields: &[(&str, &str)]) -> Response {
        let boundary = "bitacora-test-boundary";
        let body = multipart_body(
            boundary,
            fields,
            &[("gallery", "foto.png", "image/png", &b"\x89PNG fake"[..])],
        );
        app.send(
            Request::builder()
                .method("POST")
                .uri("/crear")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .header(header::COOKIE, cookie)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
    }

    #[tokio::test]
    async fn test_home_page_renders() {
        let app = test_app().await;
        let response = app.get("/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Bitácora de prueba"));
        assert!(html.contains("Noticias"));
    }

    #[tokio::test]
    async fn test_unreadable_flash_cookie_is_cleared() {
        let app = test_app().await;
        let response = app.get("/", Some("flash=%7Bno-es-json")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cleared = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.starts_with("flash=;") && v.ends_with("Max-Age=0"));
        assert!(cleared);

        let response = app.get("/", None).await;
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_anonymous_user_is_sent_to_login() {
        let app = test_app().await;
        let response = app.get("/crear", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?next=%2Fcrear");

        let response = app.post_form("/post/1", "content=hola", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?next=%2Fpost%2F1");
    }

    #[tokio::test]
    async fn test_unknown_pages_render_themed_404() {
        let app = test_app().await;
        for uri in ["/post/999", "/post/abc", "/categoria/Nada", "/tags/nada", "/no-existe"] {
            let response = app.get(uri, None).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
            let html = body_text(response).await;
            assert!(html.contains("Bitácora de prueba"), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_registration_logs_in_and_first_user_is_staff() {
        let app = test_app().await;
        let staff = app.register("lucia").await;
        let reader = app.register("mateo").await;

        let response = app.get("/crear", Some(&staff)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.get("/crear", Some(&reader)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_duplicate_registration_shows_error() {
        let app = test_app().await;
        app.register("lucia").await;
        let response = app
            .post_form(
                "/registro",
                "username=lucia&email=otra%40example.com&password1=Montana-2024&password2=Montana-2024",
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Ya existe un usuario con este nombre."));
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let app = test_app().await;
        app.register("lucia").await;

        let response = app
            .post_form("/login", "username=lucia&password=equivocada", None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_from(&response).is_none());

        let response = app
            .post_form("/login", "username=lucia&password=Montana-2024&next=%2Fperfil", None)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/perfil");
        let cookie = session_from(&response).expect("session cookie");

        assert_eq!(app.get("/perfil", Some(&cookie)).await.status(), StatusCode::OK);

        let response = app.post_form("/logout", "", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(app.get("/perfil", Some(&cookie)).await.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn test_create_post_comment_and_browse() {
        let app = test_app().await;
        let staff = app.register("lucia").await;
        let noticias = app
            .state
            .category_service
            .get_by_name("Noticias")
            .await
            .expect("category");
        let category = noticias.id.to_string();

        let response = create_post(
            &app,
            &staff,
            &[
                ("title", "Primera reseña"),
                ("content", "<p>Un juego <strong>enorme</strong></p>"),
                ("category", category.as_str()),
                ("tags", "indie, co-op"),
                ("published", "on"),
            ],
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let post_url = location(&response).to_string();
        assert!(post_url.starts_with("/post/"));

        // The success message shows up once on the next page
        let flash = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("flash="))
            .and_then(|v| v.split(';').next())
            .expect("flash cookie")
            .to_string();
        let response = app.get(&post_url, Some(&format!("{}; {}", staff, flash))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Publicación creada con éxito."));
        assert!(html.contains("<strong>enorme</strong>"));
        assert!(html.contains("Co-Op"));

        let response = app
            .post_form(&post_url, "content=%C2%A1Muy+bueno%21", Some(&staff))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), post_url);
        let html = body_text(app.get(&post_url, None).await).await;
        assert!(html.contains("¡Muy bueno!"));

        let html = body_text(app.get("/tags/INDIE", None).await).await;
        assert!(html.contains("Primera reseña"));
        let html = body_text(app.get("/categoria/Noticias", None).await).await;
        assert!(html.contains("Primera reseña"));
        // A repeated or out-of-range page still lands on a real page
        for uri in ["/tags/indie?page=1&page=2", "/categoria/Noticias?page=abc&page=9"] {
            let response = app.get(uri, None).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
            assert!(body_text(response).await.contains("Primera reseña"));
        }
        let html = body_text(app.get(&format!("/?categoria={}&q=enorme", category), None).await).await;
        assert!(html.contains("Primera reseña"));
        let html = body_text(app.get("/?q=inexistente", None).await).await;
        assert!(!html.contains("Primera reseña"));
    }

    #[tokio::test]
    async fn test_invalid_post_form_is_shown_again() {
        let app = test_app().await;
        let staff = app.register("lucia").await;
        let response = create_post(
            &app,
            &staff,
            &[("title", "Sin cuerpo"), ("content", "&nbsp;"), ("tags", "x")],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("El contenido no puede estar vacío."));
        assert!(html.contains("Por favor corregí los errores del formulario."));
        assert!(html.contains("Sin cuerpo"));
    }

    #[tokio::test]
    async fn test_only_author_or_staff_can_delete() {
        let app = test_app().await;
        let staff = app.register("lucia").await;
        let reader = app.register("mateo").await;
        let response = create_post(
            &app,
            &staff,
            &[("title", "Borrable"), ("content", "texto"), ("published", "on")],
        )
        .await;
        let post_url = location(&response).to_string();
        let delete_url = format!("{}/eliminar", post_url);

        let response = app.post_form(&delete_url, "", Some(&reader)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        assert_eq!(app.get(&post_url, None).await.status(), StatusCode::OK);

        assert_eq!(app.get(&delete_url, Some(&staff)).await.status(), StatusCode::OK);
        let response = app.post_form(&delete_url, "", Some(&staff)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(app.get(&post_url, None).await.status(), StatusCode::NOT_FOUND);
    }
}
