//! Tests for the theme engine

use super::*;
use std::fs;
use tempfile::TempDir;
use tera::Context as TeraContext;

fn standard_vars() -> StandardTemplateVars {
    StandardTemplateVars::new("Bitácora", "es", "/")
}

fn base_context() -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("messages", &Vec::<String>::new());
    context
}

#[test]
fn test_embedded_theme_has_every_page() {
    let engine = ThemeEngine::embedded("/media").expect("embedded theme");
    for page in [
        "base.html",
        "index.html",
        "post_detail.html",
        "post_form.html",
        "post_confirm_delete.html",
        "profile.html",
        "category_posts.html",
        "tag_posts.html",
        "login.html",
        "register.html",
        "error.html",
    ] {
        assert!(engine.has_template(page), "missing template {}", page);
    }
    assert_eq!(engine.current_theme(), DEFAULT_THEME);
}

#[test]
fn test_directory_theme_overrides_by_name() {
    let temp_dir = TempDir::new().expect("tempdir");
    let theme_path = temp_dir.path().join("oscuro");
    fs::create_dir_all(&theme_path).expect("create theme dir");
    fs::write(
        theme_path.join("error.html"),
        "<p class=\"custom\">{{ error_title }} / {{ site_name }}</p>",
    )
    .expect("write template");

    let config = ThemeConfig {
        active: "oscuro".to_string(),
        path: temp_dir.path().to_path_buf(),
    };
    let engine = ThemeEngine::new(&config, "/media").expect("theme");
    assert_eq!(engine.current_theme(), "oscuro");

    let mut context = base_context();
    context.insert("error_title", "No encontrado");
    let html = engine
        .render_with_standard_vars("error.html", &context, &standard_vars())
        .expect("render");
    assert_eq!(html, "<p class=\"custom\">No encontrado / Bitácora</p>");

    // Pages the theme does not provide still come from the embedded theme
    assert!(engine.has_template("login.html"));
}

#[test]
fn test_missing_theme_directory_falls_back_to_embedded() {
    let temp_dir = TempDir::new().expect("tempdir");
    let config = ThemeConfig {
        active: "inexistente".to_string(),
        path: temp_dir.path().to_path_buf(),
    };
    let engine = ThemeEngine::new(&config, "/media").expect("theme");
    assert_eq!(engine.current_theme(), DEFAULT_THEME);
}

#[test]
fn test_media_filter() {
    let temp_dir = TempDir::new().expect("tempdir");
    let theme_path = temp_dir.path().join("t");
    fs::create_dir_all(&theme_path).expect("create theme dir");
    fs::write(
        theme_path.join("img.html"),
        "{{ image | media | safe }}|{{ missing | default(value=\"\") | media }}",
    )
    .expect("write template");

    let config = ThemeConfig {
        active: "t".to_string(),
        path: temp_dir.path().to_path_buf(),
    };
    let engine = ThemeEngine::new(&config, "/uploads/").expect("theme");
    let mut context = TeraContext::new();
    context.insert("image", "posts/a.png");
    let html = engine.render("img.html", &context).expect("render");
    assert_eq!(html, "/uploads/posts/a.png|");
}

#[test]
fn test_simple_error_page_escapes() {
    let html = simple_error_page("Error", "<script>alert(1)</script>");
    assert!(html.contains("&lt;script&gt;"));
    assert!(!html.contains("<script>alert"));
}

#[test]
fn test_current_user_from_user() {
    let mut user = User::new("ana".into(), "ana@example.com".into(), "h".into(), true);
    user.id = 4;
    let vars = standard_vars().with_user(Some(&user));
    let current = vars.current_user.expect("user");
    assert_eq!(current.id, 4);
    assert!(current.is_staff);
}
