use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::policy::Scope;
use crate::services::catalog::{career_in_use, faculty_in_use};
use crate::services::{
    AuthorityConfigStore, Blockers, Career, CareerPatch, Catalog, Faculty, FileMeta, FileStorage,
    FileUsage, NewFile, NewUser, RoleRecord, Store, StoreError, StoredFile, TemplateBodies,
    TemplateKind, TemplateStore, UserDirectory, UserFilter, UserPage, UserPatch, UserRecord,
};

const FILE_COLUMNS: &str = "id, nombre_archivo AS name, fecha_subida AS uploaded_at, \
     facultad_cod AS faculty_code, tipo_mime AS mime_type";

const USER_SELECT: &str = "SELECT u.id, u.usuario AS login, u.estado AS active, u.rol_id AS role_id, \
     r.nombre AS role_name, u.facultad_cod AS faculty_code, f.nombre AS faculty_name, \
     u.carrera_cod AS career_code, c.nombre AS career_name \
     FROM usuarios u \
     JOIN rol r ON r.rol_id = u.rol_id \
     LEFT JOIN facultad f ON f.facultad_cod = u.facultad_cod \
     LEFT JOIN carrera c ON c.carrera_cod = u.carrera_cod";

const USER_COUNT: &str = "SELECT COUNT(*) \
     FROM usuarios u \
     JOIN rol r ON r.rol_id = u.rol_id \
     LEFT JOIN facultad f ON f.facultad_cod = u.facultad_cod";

#[derive(FromRow)]
struct FileRow {
    #[sqlx(flatten)]
    meta: FileMeta,
    data: Vec<u8>,
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map unique and foreign-key violations onto store errors.
fn constraint_error(err: sqlx::Error, duplicate: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => return StoreError::Duplicate(duplicate()),
            Some("23503") => {
                return StoreError::invalid_reference("reference", db.message().to_string())
            }
            _ => {}
        }
    }
    StoreError::from(err)
}

async fn row_exists(
    conn: &mut PgConnection,
    sql: &str,
    key: &str,
) -> Result<bool, StoreError> {
    let found: bool = sqlx::query_scalar(sql).bind(key).fetch_one(&mut *conn).await?;
    Ok(found)
}

async fn check_user_references(
    conn: &mut PgConnection,
    role_id: Option<i32>,
    faculty_code: Option<&str>,
    career_code: Option<&str>,
) -> Result<(), StoreError> {
    if let Some(role_id) = role_id {
        let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rol WHERE rol_id = $1)")
            .bind(role_id)
            .fetch_one(&mut *conn)
            .await?;
        if !found {
            return Err(StoreError::invalid_reference(
                "rolId",
                format!("Role {} does not exist", role_id),
            ));
        }
    }

    if let Some(code) = faculty_code {
        if !row_exists(conn, "SELECT EXISTS(SELECT 1 FROM facultad WHERE facultad_cod = $1)", code).await? {
            return Err(StoreError::invalid_reference(
                "facultadCod",
                format!("Faculty '{}' does not exist", code),
            ));
        }
    }

    if let Some(code) = career_code {
        if !row_exists(conn, "SELECT EXISTS(SELECT 1 FROM carrera WHERE carrera_cod = $1)", code).await? {
            return Err(StoreError::invalid_reference(
                "carreraCod",
                format!("Career '{}' does not exist", code),
            ));
        }
    }

    Ok(())
}

/// Search text as a literal `LIKE` fragment.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    qb.push(" WHERE TRUE");
    if let Some(code) = &filter.faculty_code {
        qb.push(" AND u.facultad_cod = ").push_bind(code.clone());
    }
    if let Some(role_id) = filter.role_id {
        qb.push(" AND u.rol_id = ").push_bind(role_id);
    }
    if let Some(active) = filter.active {
        qb.push(" AND u.estado = ").push_bind(active);
    }
    if let Some(text) = filter.search_text() {
        let pattern = format!("%{}%", escape_like(text));
        qb.push(" AND (u.usuario ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR r.nombre ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR f.nombre ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

#[async_trait]
impl FileStorage for PgStore {
    async fn put_file(&self, file: NewFile) -> Result<FileMeta, StoreError> {
        let sql = format!(
            "INSERT INTO archivos_excel (nombre_archivo, tipo_mime, datos, facultad_cod)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (nombre_archivo, facultad_cod)
             DO UPDATE SET datos = EXCLUDED.datos, tipo_mime = EXCLUDED.tipo_mime, fecha_subida = now()
             RETURNING {}",
            FILE_COLUMNS
        );

        sqlx::query_as::<_, FileMeta>(&sql)
            .bind(&file.name)
            .bind(&file.mime_type)
            .bind(&file.data)
            .bind(&file.faculty_code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| constraint_error(e, || format!("File '{}' already exists", file.name)))
    }

    async fn list_files(&self, scope: &Scope) -> Result<Vec<FileMeta>, StoreError> {
        let sql = format!(
            "SELECT {} FROM archivos_excel
             WHERE ($1::text IS NULL OR facultad_cod = $1)
             ORDER BY fecha_subida DESC, id DESC",
            FILE_COLUMNS
        );

        let files = sqlx::query_as::<_, FileMeta>(&sql)
            .bind(scope.faculty_code())
            .fetch_all(&self.pool)
            .await?;
        Ok(files)
    }

    async fn get_file(&self, id: i64) -> Result<Option<StoredFile>, StoreError> {
        let sql = format!("SELECT {}, datos AS data FROM archivos_excel WHERE id = $1", FILE_COLUMNS);

        let row = sqlx::query_as::<_, FileRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| StoredFile {
            meta: row.meta,
            data: row.data,
        }))
    }

    async fn delete_files_named(
        &self,
        name: &str,
        faculty_code: Option<&str>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM archivos_excel
             WHERE nombre_archivo = $1 AND ($2::text IS NULL OR facultad_cod = $2)",
        )
        .bind(name)
        .bind(faculty_code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn file_usage(&self) -> Result<Vec<FileUsage>, StoreError> {
        let usage = sqlx::query_as::<_, FileUsage>(
            "SELECT a.id, a.nombre_archivo AS name, a.fecha_subida AS uploaded_at,
                    a.facultad_cod AS faculty_code, f.nombre AS faculty_name,
                    a.tipo_mime AS mime_type, octet_length(a.datos)::bigint AS size_bytes
             FROM archivos_excel a
             JOIN facultad f ON f.facultad_cod = a.facultad_cod
             ORDER BY a.fecha_subida DESC, a.id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(usage)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        if row_exists(&mut tx, "SELECT EXISTS(SELECT 1 FROM usuarios WHERE usuario = $1)", &user.login).await? {
            return Err(StoreError::Duplicate(format!("User '{}' already exists", user.login)));
        }
        check_user_references(
            &mut tx,
            Some(user.role_id),
            Some(&user.faculty_code),
            user.career_code.as_deref(),
        )
        .await?;

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO usuarios (usuario, estado, rol_id, facultad_cod, carrera_cod)
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&user.login)
        .bind(user.active)
        .bind(user.role_id)
        .bind(&user.faculty_code)
        .bind(&user.career_code)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, || format!("User '{}' already exists", user.login)))?;

        tx.commit().await?;

        self.get_user(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("User {}", id)))
    }

    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<UserRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        let found: Option<i32> = sqlx::query_scalar("SELECT id FROM usuarios WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() {
            return Err(StoreError::NotFound(format!("User {}", id)));
        }

        if let Some(login) = &patch.login {
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM usuarios WHERE usuario = $1 AND id <> $2)",
            )
            .bind(login)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if taken {
                return Err(StoreError::Duplicate(format!("User '{}' already exists", login)));
            }
        }

        let career = patch.career_code.as_ref().and_then(|c| c.as_deref());
        check_user_references(&mut tx, patch.role_id, patch.faculty_code.as_deref(), career).await?;

        if !patch.is_empty() {
            let mut qb = QueryBuilder::<Postgres>::new("UPDATE usuarios SET ");
            {
                let mut set = qb.separated(", ");
                if let Some(login) = &patch.login {
                    set.push("usuario = ").push_bind_unseparated(login.clone());
                }
                if let Some(role_id) = patch.role_id {
                    set.push("rol_id = ").push_bind_unseparated(role_id);
                }
                if let Some(code) = &patch.faculty_code {
                    set.push("facultad_cod = ").push_bind_unseparated(code.clone());
                }
                if let Some(career) = &patch.career_code {
                    set.push("carrera_cod = ").push_bind_unseparated(career.clone());
                }
                if let Some(active) = patch.active {
                    set.push("estado = ").push_bind_unseparated(active);
                }
            }
            qb.push(" WHERE id = ").push_bind(id);

            qb.build()
                .execute(&mut *tx)
                .await
                .map_err(|e| constraint_error(e, || "Login already exists".to_string()))?;
        }

        tx.commit().await?;

        self.get_user(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("User {}", id)))
    }

    async fn find_user(&self, login: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("{} WHERE u.usuario = $1", USER_SELECT);
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user(&self, id: i32) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("{} WHERE u.id = $1", USER_SELECT);
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<UserPage, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new(USER_COUNT);
        push_user_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(USER_SELECT);
        push_user_filters(&mut select, filter);
        select
            .push(" ORDER BY u.id DESC LIMIT ")
            .push_bind(filter.page.limit)
            .push(" OFFSET ")
            .push_bind(filter.page.offset());
        let data = select
            .build_query_as::<UserRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(UserPage::new(data, total, filter.page))
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        let roles = sqlx::query_as::<_, RoleRecord>("SELECT rol_id AS id, nombre AS name FROM rol ORDER BY nombre")
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn list_faculties(&self) -> Result<Vec<Faculty>, StoreError> {
        let faculties = sqlx::query_as::<_, Faculty>(
            "SELECT facultad_cod AS code, nombre AS name FROM facultad ORDER BY nombre",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(faculties)
    }

    async fn get_faculty(&self, code: &str) -> Result<Option<Faculty>, StoreError> {
        let faculty = sqlx::query_as::<_, Faculty>(
            "SELECT facultad_cod AS code, nombre AS name FROM facultad WHERE facultad_cod = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(faculty)
    }

    async fn create_faculty(&self, faculty: Faculty) -> Result<Faculty, StoreError> {
        sqlx::query_as::<_, Faculty>(
            "INSERT INTO facultad (facultad_cod, nombre) VALUES ($1, $2)
             RETURNING facultad_cod AS code, nombre AS name",
        )
        .bind(&faculty.code)
        .bind(&faculty.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, || format!("Faculty '{}' already exists", faculty.code)))
    }

    async fn rename_faculty(&self, code: &str, name: &str) -> Result<Faculty, StoreError> {
        sqlx::query_as::<_, Faculty>(
            "UPDATE facultad SET nombre = $2 WHERE facultad_cod = $1
             RETURNING facultad_cod AS code, nombre AS name",
        )
        .bind(code)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Faculty '{}'", code)))
    }

    async fn delete_faculty(&self, code: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let found: Option<String> =
            sqlx::query_scalar("SELECT facultad_cod FROM facultad WHERE facultad_cod = $1 FOR UPDATE")
                .bind(code)
                .fetch_optional(&mut *tx)
                .await?;
        if found.is_none() {
            return Err(StoreError::NotFound(format!("Faculty '{}'", code)));
        }

        let (usuarios, carreras, archivos): (i64, i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM usuarios WHERE facultad_cod = $1),
                (SELECT COUNT(*) FROM carrera WHERE facultad_cod = $1),
                (SELECT COUNT(*) FROM archivos_excel WHERE facultad_cod = $1)",
        )
        .bind(code)
        .fetch_one(&mut *tx)
        .await?;

        let blockers = Blockers {
            usuarios,
            carreras,
            archivos,
        };
        if !blockers.is_empty() {
            return Err(faculty_in_use(code, blockers));
        }

        sqlx::query("DELETE FROM facultad WHERE facultad_cod = $1")
            .bind(code)
            .execute(&mut *tx)
            .await
            .map_err(|e| constraint_error(e, || format!("Faculty '{}'", code)))?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_careers(&self, faculty_code: &str) -> Result<Vec<Career>, StoreError> {
        let careers = sqlx::query_as::<_, Career>(
            "SELECT carrera_cod AS code, facultad_cod AS faculty_code, nombre AS name
             FROM carrera WHERE facultad_cod = $1 ORDER BY nombre",
        )
        .bind(faculty_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(careers)
    }

    async fn create_career(&self, career: Career) -> Result<Career, StoreError> {
        let mut tx = self.pool.begin().await?;

        if !row_exists(
            &mut tx,
            "SELECT EXISTS(SELECT 1 FROM facultad WHERE facultad_cod = $1)",
            &career.faculty_code,
        )
        .await?
        {
            return Err(StoreError::invalid_reference(
                "facultadCod",
                format!("Faculty '{}' does not exist", career.faculty_code),
            ));
        }

        let created = sqlx::query_as::<_, Career>(
            "INSERT INTO carrera (carrera_cod, facultad_cod, nombre) VALUES ($1, $2, $3)
             RETURNING carrera_cod AS code, facultad_cod AS faculty_code, nombre AS name",
        )
        .bind(&career.code)
        .bind(&career.faculty_code)
        .bind(&career.name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, || format!("Career '{}' already exists", career.code)))?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update_career(&self, code: &str, patch: CareerPatch) -> Result<Career, StoreError> {
        let mut tx = self.pool.begin().await?;

        if let Some(faculty) = &patch.faculty_code {
            if !row_exists(&mut tx, "SELECT EXISTS(SELECT 1 FROM facultad WHERE facultad_cod = $1)", faculty).await? {
                return Err(StoreError::invalid_reference(
                    "facultadCod",
                    format!("Faculty '{}' does not exist", faculty),
                ));
            }
        }

        let updated = sqlx::query_as::<_, Career>(
            "UPDATE carrera
             SET facultad_cod = COALESCE($2, facultad_cod), nombre = COALESCE($3, nombre)
             WHERE carrera_cod = $1
             RETURNING carrera_cod AS code, facultad_cod AS faculty_code, nombre AS name",
        )
        .bind(code)
        .bind(&patch.faculty_code)
        .bind(&patch.name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, || format!("Career '{}' already exists", code)))?
        .ok_or_else(|| StoreError::NotFound(format!("Career '{}'", code)))?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_career(&self, code: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let found: Option<String> =
            sqlx::query_scalar("SELECT carrera_cod FROM carrera WHERE carrera_cod = $1 FOR UPDATE")
                .bind(code)
                .fetch_optional(&mut *tx)
                .await?;
        if found.is_none() {
            return Err(StoreError::NotFound(format!("Career '{}'", code)));
        }

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usuarios WHERE carrera_cod = $1")
            .bind(code)
            .fetch_one(&mut *tx)
            .await?;
        if users > 0 {
            return Err(career_in_use(code, users));
        }

        sqlx::query("DELETE FROM carrera WHERE carrera_cod = $1")
            .bind(code)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for PgStore {
    async fn get_template(&self, kind: TemplateKind) -> Result<TemplateBodies, StoreError> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT autoridad, docente, estudiante FROM plantillas_correo WHERE tipo = $1",
        )
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|(authority, instructor, student)| TemplateBodies {
                authority,
                instructor,
                student,
            })
            .unwrap_or_default())
    }

    async fn set_template(&self, kind: TemplateKind, bodies: TemplateBodies) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO plantillas_correo (tipo, autoridad, docente, estudiante)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (tipo) DO UPDATE
             SET autoridad = EXCLUDED.autoridad, docente = EXCLUDED.docente, estudiante = EXCLUDED.estudiante",
        )
        .bind(kind.as_str())
        .bind(&bodies.authority)
        .bind(&bodies.instructor)
        .bind(&bodies.student)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthorityConfigStore for PgStore {
    async fn get_authority_email(&self) -> Result<Option<String>, StoreError> {
        let email = sqlx::query_scalar("SELECT decano_correo FROM autoridad_correo ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(email)
    }

    async fn set_authority_email(&self, email: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE autoridad_correo SET decano_correo = $1
             WHERE id = (SELECT MAX(id) FROM autoridad_correo)",
        )
        .bind(email)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query("INSERT INTO autoridad_correo (decano_correo) VALUES ($1)")
                .bind(email)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
