mod common;

use anyhow::{Context, Result};
use reqwest::{header, StatusCode};
use serde_json::Value;

use common::{TestServer, ROLE_COORDINADOR, ROLE_DECANO, ROLE_USUARIO};

fn names(body: &Value) -> Vec<String> {
    body["data"]["archivos"]
        .as_array()
        .map(|files| {
            files
                .iter()
                .filter_map(|f| f["nombre"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn coordinador_uploads_only_to_own_faculty() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, token) = server.user("coord.ing@ug.edu.ec", ROLE_COORDINADOR, "ING").await?;

    let (status, body) = server.upload(&token, Some("MED"), "notas.xlsx", b"med").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "CROSS_FACULTY");
    assert_eq!(body["error"], "cross-faculty access denied");

    let (status, body) = server.upload(&token, Some("ING"), "notas.xlsx", b"ing").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["facultadCod"], "ING");

    let (status, body) = server.get("/files?facultadCod=ING", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["notas.xlsx"]);
    assert_eq!(body["data"]["facultadFiltro"], "ING");
    Ok(())
}

#[tokio::test]
async fn usuario_cannot_upload_even_to_own_faculty() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, token) = server.user("lector@ug.edu.ec", ROLE_USUARIO, "ING").await?;

    let (status, body) = server.upload(&token, Some("ING"), "notas.xlsx", b"x").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INSUFFICIENT_ROLE");
    Ok(())
}

#[tokio::test]
async fn upload_requires_an_existing_faculty() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;

    let (status, body) = server.upload(&admin, None, "notas.xlsx", b"x").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["facultadCod"], "facultadCod is required");

    let (status, body) = server.upload(&admin, Some("XYZ"), "notas.xlsx", b"x").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "RESOURCE_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn faculty_codes_are_case_insensitive() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, token) = server.user("coord.ing@ug.edu.ec", ROLE_COORDINADOR, "ING").await?;

    let (status, body) = server.upload(&token, Some(" ing "), "notas.xlsx", b"x").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["facultadCod"], "ING");

    let (status, body) = server.get("/files?facultadCod=ing", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["notas.xlsx"]);

    let (status, body) = server
        .delete("/delete/by-name/notas.xlsx?facultadCod=ing", &token)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["facultadCod"], "ING");

    let admin = server.admin_token()?;
    let (status, body) = server.get("/usuarios?facultadCod=ing", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn admin_listing_spans_faculties_unless_narrowed() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;

    server.upload(&admin, Some("ING"), "ing.xlsx", b"1").await?;
    server.upload(&admin, Some("MED"), "med.xlsx", b"2").await?;

    let (_, body) = server.get("/files", &admin).await?;
    assert_eq!(body["data"]["total"], 2);
    // Newest first
    assert_eq!(names(&body), vec!["med.xlsx", "ing.xlsx"]);
    assert!(body["data"]["facultadFiltro"].is_null());

    let (_, body) = server.get("/files?facultadCod=ING", &admin).await?;
    assert_eq!(names(&body), vec!["ing.xlsx"]);
    Ok(())
}

#[tokio::test]
async fn non_admin_listing_ignores_no_filter_and_refuses_foreign_filter() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;
    let (_, token) = server.user("decano@ug.edu.ec", ROLE_DECANO, "MED").await?;

    server.upload(&admin, Some("ING"), "ing.xlsx", b"1").await?;
    server.upload(&admin, Some("MED"), "med.xlsx", b"2").await?;

    let (_, body) = server.get("/files", &token).await?;
    assert_eq!(names(&body), vec!["med.xlsx"]);

    let (status, body) = server.get("/files?facultadCod=ING", &token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "CROSS_FACULTY");
    Ok(())
}

#[tokio::test]
async fn reupload_replaces_the_stored_file() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;

    let (_, first) = server.upload(&admin, Some("ING"), "notas.xlsx", b"v1").await?;
    let (_, second) = server.upload(&admin, Some("ING"), "notas.xlsx", b"v2").await?;
    assert_eq!(first["data"]["archivo"]["id"], second["data"]["archivo"]["id"]);

    let (_, body) = server.get("/files?facultadCod=ING", &admin).await?;
    assert_eq!(body["data"]["total"], 1);

    let id = second["data"]["archivo"]["id"].as_i64().context("id missing")?;
    let res = server
        .client
        .get(server.url(&format!("/download/{}", id)))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await?.as_ref(), b"v2");
    Ok(())
}

#[tokio::test]
async fn download_is_an_attachment_scoped_to_the_faculty() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;
    let (_, ing) = server.user("coord.ing@ug.edu.ec", ROLE_COORDINADOR, "ING").await?;
    let (_, med) = server.user("coord.med@ug.edu.ec", ROLE_COORDINADOR, "MED").await?;

    let (_, body) = server.upload(&admin, Some("ING"), "reporte.xlsx", b"data").await?;
    let id = body["data"]["archivo"]["id"].as_i64().context("id missing")?;

    let res = server
        .client
        .get(server.url(&format!("/download/{}", id)))
        .bearer_auth(&ing)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let disposition = res
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(disposition, "attachment; filename=\"reporte.xlsx\"");

    let (status, body) = server.get(&format!("/download/{}", id), &med).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "CROSS_FACULTY");

    let (status, _) = server.get("/download/9999", &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn admin_delete_without_faculty_removes_every_copy() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;

    server.upload(&admin, Some("ING"), "comun.xlsx", b"1").await?;
    server.upload(&admin, Some("MED"), "comun.xlsx", b"2").await?;
    server.upload(&admin, Some("MED"), "otro.xlsx", b"3").await?;

    let (status, body) = server.delete("/delete/by-name/comun.xlsx", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["eliminados"], 2);

    let (_, body) = server.get("/files", &admin).await?;
    assert_eq!(names(&body), vec!["otro.xlsx"]);
    Ok(())
}

#[tokio::test]
async fn scoped_delete_touches_only_the_callers_faculty() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;
    let (_, token) = server.user("coord.ing@ug.edu.ec", ROLE_COORDINADOR, "ING").await?;

    server.upload(&admin, Some("ING"), "comun.xlsx", b"1").await?;
    server.upload(&admin, Some("MED"), "comun.xlsx", b"2").await?;

    let (status, body) = server.delete("/delete/by-name/comun.xlsx", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["facultadCod"], "ING");
    assert_eq!(body["data"]["eliminados"], 1);

    let (status, body) = server.delete("/delete/by-name/comun.xlsx", &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "RESOURCE_NOT_FOUND");

    let (status, _) = server
        .delete("/delete/by-name/comun.xlsx?facultadCod=MED", &token)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = server.get("/files?facultadCod=MED", &admin).await?;
    assert_eq!(body["data"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn storage_inspection_is_admin_only() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token()?;
    let (_, decano) = server.user("decano@ug.edu.ec", ROLE_DECANO, "ING").await?;

    server.upload(&admin, Some("ING"), "a.xlsx", b"12345").await?;

    let (status, body) = server.get("/debug/files", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalBytes"], 5);
    assert_eq!(body["data"]["archivos"][0]["facultadNombre"], "Facultad de Ingeniería");

    let (status, body) = server.get("/debug/files", &decano).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INSUFFICIENT_ROLE");
    Ok(())
}
