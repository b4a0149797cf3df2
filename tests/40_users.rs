mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{TestServer, ROLE_COORDINADOR, ROLE_DECANO, ROLE_USUARIO};

fn logins(body: &Value) -> Vec<String> {
    body["data"]["data"]
        .as_array()
        .map(|users| {
            users
                .iter()
                .filter_map(|u| u["usuario"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn admin_creates_users_with_defaults() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;

    let (status, body) = server
        .post_json(
            "/usuarios",
            &admin,
            &json!({ "usuario": "nuevo@ug.edu.ec", "rolId": ROLE_COORDINADOR, "facultadCod": "ing", "carreraCod": "SIS" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["activo"], true);
    assert_eq!(body["data"]["facultadCod"], "ING");
    assert_eq!(body["data"]["rolNombre"], "coordinador");
    assert_eq!(body["data"]["carreraNombre"], "Ingeniería en Sistemas");
    Ok(())
}

#[tokio::test]
async fn duplicate_and_dangling_references_do_not_mutate() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;

    let (status, body) = server
        .post_json(
            "/usuarios",
            &admin,
            &json!({ "usuario": common::ADMIN, "rolId": ROLE_USUARIO, "facultadCod": "ING" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = server
        .post_json(
            "/usuarios",
            &admin,
            &json!({ "usuario": "otro@ug.edu.ec", "rolId": 99, "facultadCod": "ING" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["rolId"].is_string());

    let (status, body) = server
        .post_json(
            "/usuarios",
            &admin,
            &json!({ "usuario": "otro@ug.edu.ec", "rolId": ROLE_USUARIO, "facultadCod": "XYZ" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["facultadCod"].is_string());

    let (_, body) = server.get("/usuarios", &admin).await?;
    assert_eq!(body["data"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn create_validates_required_fields_and_email_shape() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;

    let (status, body) = server
        .post_json("/usuarios", &admin, &json!({ "rolId": ROLE_USUARIO, "facultadCod": "ING" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["usuario"].is_string());

    let (status, _) = server
        .post_json(
            "/usuarios",
            &admin,
            &json!({ "usuario": "sin-arroba", "rolId": ROLE_USUARIO, "facultadCod": "ING" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn only_admin_manages_users() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, decano) = server.user("decano@ug.edu.ec", ROLE_DECANO, "ING").await?;
    let (_, coord) = server.user("coord@ug.edu.ec", ROLE_COORDINADOR, "ING").await?;

    let payload = json!({ "usuario": "x@ug.edu.ec", "rolId": ROLE_USUARIO, "facultadCod": "ING" });
    let (status, body) = server.post_json("/usuarios", &decano, &payload).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INSUFFICIENT_ROLE");

    let (status, _) = server.get("/usuarios", &coord).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn decano_sees_only_own_faculty() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, decano) = server.user("decano.ing@ug.edu.ec", ROLE_DECANO, "ING").await?;
    server.user("coord.ing@ug.edu.ec", ROLE_COORDINADOR, "ING").await?;
    let (med_user, _) = server.user("coord.med@ug.edu.ec", ROLE_COORDINADOR, "MED").await?;

    let (status, body) = server.get("/usuarios", &decano).await?;
    assert_eq!(status, StatusCode::OK);
    let mut seen = logins(&body);
    seen.sort();
    assert_eq!(seen, vec!["coord.ing@ug.edu.ec", "decano.ing@ug.edu.ec"]);

    let (status, body) = server.get("/usuarios?facultadCod=MED", &decano).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "CROSS_FACULTY");

    let (status, _) = server.get(&format!("/usuarios/{}", med_user.id), &decano).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .get(&format!("/usuarios/{}", med_user.id), &server.admin_token()?)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["facultadCod"], "MED");
    Ok(())
}

#[tokio::test]
async fn pagination_is_clamped_and_totals_are_stable() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;
    for i in 0..5 {
        server
            .user(&format!("user{}@ug.edu.ec", i), ROLE_USUARIO, "EDU")
            .await?;
    }

    let (_, body) = server.get("/usuarios?limit=0&page=-3", &admin).await?;
    assert_eq!(body["data"]["limit"], 1);
    assert_eq!(body["data"]["page"], 0);
    assert_eq!(body["data"]["total"], 6);
    assert_eq!(body["data"]["hasMore"], true);

    let (_, body) = server.get("/usuarios?limit=1000", &admin).await?;
    assert_eq!(body["data"]["limit"], 200);

    let mut seen = 0;
    for page in 0..3 {
        let (_, body) = server
            .get(&format!("/usuarios?facultadCod=EDU&limit=2&page={}", page), &admin)
            .await?;
        assert_eq!(body["data"]["total"], 5);
        seen += logins(&body).len();
    }
    assert_eq!(seen, 5);
    Ok(())
}

#[tokio::test]
async fn page_far_past_the_end_is_empty() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;

    let (status, body) = server
        .get("/usuarios?page=9223372036854775807&limit=20", &admin)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["hasMore"], false);
    assert!(logins(&body).is_empty());
    Ok(())
}

#[tokio::test]
async fn search_wildcards_match_literally() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;
    server.user("ana_paz@ug.edu.ec", ROLE_USUARIO, "MED").await?;
    server.user("bruno@ug.edu.ec", ROLE_USUARIO, "MED").await?;

    let (_, body) = server.get("/usuarios?q=_", &admin).await?;
    assert_eq!(logins(&body), vec!["ana_paz@ug.edu.ec"]);

    let (_, body) = server.get("/usuarios?q=%25", &admin).await?;
    assert!(logins(&body).is_empty());
    Ok(())
}

#[tokio::test]
async fn list_filters_by_search_and_active_flag() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;
    let (user, _) = server.user("ana.medina@ug.edu.ec", ROLE_USUARIO, "MED").await?;
    server.user("bruno@ug.edu.ec", ROLE_USUARIO, "JUR").await?;

    let (_, body) = server.get("/usuarios?q=MEDINA", &admin).await?;
    assert_eq!(logins(&body), vec!["ana.medina@ug.edu.ec"]);

    // Faculty name matches too
    let (_, body) = server.get("/usuarios?q=jurisprudencia", &admin).await?;
    assert_eq!(logins(&body), vec!["bruno@ug.edu.ec"]);

    server
        .put_json(&format!("/usuarios/{}", user.id), &admin, &json!({ "activo": false }))
        .await?;
    let (_, body) = server.get("/usuarios?activo=false", &admin).await?;
    assert_eq!(logins(&body), vec!["ana.medina@ug.edu.ec"]);
    Ok(())
}

#[tokio::test]
async fn update_patches_only_supplied_fields() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;
    let (_, body) = server
        .post_json(
            "/usuarios",
            &admin,
            &json!({ "usuario": "p@ug.edu.ec", "rolId": ROLE_USUARIO, "facultadCod": "ING", "carreraCod": "SIS" }),
        )
        .await?;
    let id = body["data"]["id"].clone();

    let (status, body) = server
        .put_json(&format!("/usuarios/{}", id), &admin, &json!({ "rolId": ROLE_DECANO }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rolNombre"], "decano");
    assert_eq!(body["data"]["carreraCod"], "SIS");

    let (_, body) = server
        .put_json(&format!("/usuarios/{}", id), &admin, &json!({ "carreraCod": null }))
        .await?;
    assert!(body["data"]["carreraCod"].is_null());

    let (status, _) = server
        .put_json(&format!("/usuarios/{}", id), &admin, &json!({}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .put_json("/usuarios/9999", &admin, &json!({ "activo": true }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
