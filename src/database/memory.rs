//! In-process store with the same contracts as the PostgreSQL backend.
//!
//! Used when no `DATABASE_URL` is configured in development, and by tests.
//! A single `RwLock` around the whole state makes every operation atomic.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::seed;
use crate::config::DirectoryConfig;
use crate::policy::Scope;
use crate::services::catalog::{career_in_use, faculty_in_use};
use crate::services::{
    AuthorityConfigStore, Blockers, Career, CareerPatch, Catalog, Faculty, FileMeta, FileStorage,
    FileUsage, NewFile, NewUser, RoleRecord, Store, StoreError, StoredFile, TemplateBodies,
    TemplateKind, TemplateStore, UserDirectory, UserFilter, UserPage, UserPatch, UserRecord,
};

#[derive(Debug, Clone)]
struct UserRow {
    id: i32,
    login: String,
    active: bool,
    role_id: i32,
    faculty_code: String,
    career_code: Option<String>,
}

#[derive(Default)]
struct State {
    roles: BTreeMap<i32, String>,
    faculties: BTreeMap<String, String>,
    careers: BTreeMap<String, Career>,
    users: BTreeMap<i32, UserRow>,
    files: BTreeMap<i64, StoredFile>,
    templates: HashMap<TemplateKind, TemplateBodies>,
    authority_email: Option<String>,
    next_user_id: i32,
    next_file_id: i64,
    last_upload: Option<DateTime<Utc>>,
}

impl State {
    /// Upload timestamps never repeat or go backwards.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_upload {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_upload = Some(stamp);
        stamp
    }

    fn materialize(&self, row: &UserRow) -> UserRecord {
        UserRecord {
            id: row.id,
            login: row.login.clone(),
            active: row.active,
            role_id: row.role_id,
            role_name: self.roles.get(&row.role_id).cloned().unwrap_or_default(),
            faculty_code: row.faculty_code.clone(),
            faculty_name: self.faculties.get(&row.faculty_code).cloned(),
            career_code: row.career_code.clone(),
            career_name: row
                .career_code
                .as_ref()
                .and_then(|code| self.careers.get(code))
                .map(|career| career.name.clone()),
        }
    }

    fn check_user_references(
        &self,
        role_id: Option<i32>,
        faculty_code: Option<&str>,
        career_code: Option<&str>,
    ) -> Result<(), StoreError> {
        if let Some(role_id) = role_id {
            if !self.roles.contains_key(&role_id) {
                return Err(StoreError::invalid_reference(
                    "rolId",
                    format!("Role {} does not exist", role_id),
                ));
            }
        }
        if let Some(code) = faculty_code {
            if !self.faculties.contains_key(code) {
                return Err(StoreError::invalid_reference(
                    "facultadCod",
                    format!("Faculty '{}' does not exist", code),
                ));
            }
        }
        if let Some(code) = career_code {
            if !self.careers.contains_key(code) {
                return Err(StoreError::invalid_reference(
                    "carreraCod",
                    format!("Career '{}' does not exist", code),
                ));
            }
        }
        Ok(())
    }

    fn login_taken(&self, login: &str, except: Option<i32>) -> bool {
        self.users
            .values()
            .any(|user| user.login == login && Some(user.id) != except)
    }

    fn matches(&self, row: &UserRow, filter: &UserFilter) -> bool {
        if let Some(code) = &filter.faculty_code {
            if &row.faculty_code != code {
                return false;
            }
        }
        if let Some(role_id) = filter.role_id {
            if row.role_id != role_id {
                return false;
            }
        }
        if let Some(active) = filter.active {
            if row.active != active {
                return false;
            }
        }
        if let Some(text) = filter.search_text() {
            let needle = text.to_lowercase();
            let role = self.roles.get(&row.role_id).map(String::as_str).unwrap_or("");
            let faculty = self.faculties.get(&row.faculty_code).map(String::as_str).unwrap_or("");
            let hit = [row.login.as_str(), role, faculty]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Store holding the same rows as a freshly initialized database.
    pub fn seeded(directory: &DirectoryConfig) -> Self {
        let mut state = State {
            next_user_id: 1,
            next_file_id: 1,
            ..State::default()
        };

        for (index, role) in seed::ROLES.iter().enumerate() {
            state.roles.insert(index as i32 + 1, role.to_string());
        }
        for (code, name) in seed::FACULTIES {
            state.faculties.insert(code.to_string(), name.to_string());
        }
        for (code, faculty_code, name) in seed::CAREERS {
            state.careers.insert(
                code.to_string(),
                Career {
                    code: code.to_string(),
                    faculty_code: faculty_code.to_string(),
                    name: name.to_string(),
                },
            );
        }
        for kind in TemplateKind::ALL {
            state.templates.insert(kind, TemplateBodies::default());
        }

        state.users.insert(
            1,
            UserRow {
                id: 1,
                login: directory.admin_email.clone(),
                active: true,
                role_id: seed::ADMIN_ROLE_ID,
                faculty_code: seed::ADMIN_FACULTY.to_string(),
                career_code: None,
            },
        );
        state.next_user_id = 2;

        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl FileStorage for MemoryStore {
    async fn put_file(&self, file: NewFile) -> Result<FileMeta, StoreError> {
        let mut state = self.state.write().await;
        if !state.faculties.contains_key(&file.faculty_code) {
            return Err(StoreError::invalid_reference(
                "facultadCod",
                format!("Faculty '{}' does not exist", file.faculty_code),
            ));
        }

        let uploaded_at = state.next_timestamp();
        let existing = state
            .files
            .values()
            .find(|f| f.meta.name == file.name && f.meta.faculty_code == file.faculty_code)
            .map(|f| f.meta.id);

        let id = match existing {
            Some(id) => id,
            None => {
                let id = state.next_file_id;
                state.next_file_id += 1;
                id
            }
        };

        let meta = FileMeta {
            id,
            name: file.name,
            uploaded_at,
            faculty_code: file.faculty_code,
            mime_type: file.mime_type,
        };
        state.files.insert(
            id,
            StoredFile {
                meta: meta.clone(),
                data: file.data,
            },
        );
        Ok(meta)
    }

    async fn list_files(&self, scope: &Scope) -> Result<Vec<FileMeta>, StoreError> {
        let state = self.state.read().await;
        let mut files: Vec<FileMeta> = state
            .files
            .values()
            .filter(|f| scope.permits(&f.meta.faculty_code))
            .map(|f| f.meta.clone())
            .collect();
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
        Ok(files)
    }

    async fn get_file(&self, id: i64) -> Result<Option<StoredFile>, StoreError> {
        Ok(self.state.read().await.files.get(&id).cloned())
    }

    async fn delete_files_named(
        &self,
        name: &str,
        faculty_code: Option<&str>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let before = state.files.len();
        state.files.retain(|_, f| {
            let same_faculty = faculty_code.map_or(true, |code| f.meta.faculty_code == code);
            !(f.meta.name == name && same_faculty)
        });
        Ok((before - state.files.len()) as u64)
    }

    async fn file_usage(&self) -> Result<Vec<FileUsage>, StoreError> {
        let state = self.state.read().await;
        let mut usage: Vec<FileUsage> = state
            .files
            .values()
            .map(|f| FileUsage {
                id: f.meta.id,
                name: f.meta.name.clone(),
                uploaded_at: f.meta.uploaded_at,
                faculty_code: f.meta.faculty_code.clone(),
                faculty_name: state
                    .faculties
                    .get(&f.meta.faculty_code)
                    .cloned()
                    .unwrap_or_default(),
                mime_type: f.meta.mime_type.clone(),
                size_bytes: f.data.len() as i64,
            })
            .collect();
        usage.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
        Ok(usage)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut state = self.state.write().await;
        if state.login_taken(&user.login, None) {
            return Err(StoreError::Duplicate(format!("User '{}' already exists", user.login)));
        }
        state.check_user_references(
            Some(user.role_id),
            Some(&user.faculty_code),
            user.career_code.as_deref(),
        )?;

        let id = state.next_user_id;
        state.next_user_id += 1;
        let row = UserRow {
            id,
            login: user.login,
            active: user.active,
            role_id: user.role_id,
            faculty_code: user.faculty_code,
            career_code: user.career_code,
        };
        let record = state.materialize(&row);
        state.users.insert(id, row);
        Ok(record)
    }

    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<UserRecord, StoreError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(StoreError::NotFound(format!("User {}", id)));
        }
        if let Some(login) = &patch.login {
            if state.login_taken(login, Some(id)) {
                return Err(StoreError::Duplicate(format!("User '{}' already exists", login)));
            }
        }
        let career = patch.career_code.as_ref().and_then(|c| c.as_deref());
        state.check_user_references(patch.role_id, patch.faculty_code.as_deref(), career)?;

        let mut row = match state.users.get(&id) {
            Some(row) => row.clone(),
            None => return Err(StoreError::NotFound(format!("User {}", id))),
        };
        if let Some(login) = patch.login {
            row.login = login;
        }
        if let Some(role_id) = patch.role_id {
            row.role_id = role_id;
        }
        if let Some(code) = patch.faculty_code {
            row.faculty_code = code;
        }
        if let Some(career) = patch.career_code {
            row.career_code = career;
        }
        if let Some(active) = patch.active {
            row.active = active;
        }

        let record = state.materialize(&row);
        state.users.insert(id, row);
        Ok(record)
    }

    async fn find_user(&self, login: &str) -> Result<Option<UserRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.login == login)
            .map(|row| state.materialize(row)))
    }

    async fn get_user(&self, id: i32) -> Result<Option<UserRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).map(|row| state.materialize(row)))
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<UserPage, StoreError> {
        let state = self.state.read().await;
        let matching: Vec<&UserRow> = state
            .users
            .values()
            .rev()
            .filter(|row| state.matches(row, filter))
            .collect();

        let total = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(filter.page.offset() as usize)
            .take(filter.page.limit as usize)
            .map(|row| state.materialize(row))
            .collect();

        Ok(UserPage::new(data, total, filter.page))
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        let state = self.state.read().await;
        let mut roles: Vec<RoleRecord> = state
            .roles
            .iter()
            .map(|(id, name)| RoleRecord {
                id: *id,
                name: name.clone(),
            })
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn list_faculties(&self) -> Result<Vec<Faculty>, StoreError> {
        let state = self.state.read().await;
        let mut faculties: Vec<Faculty> = state
            .faculties
            .iter()
            .map(|(code, name)| Faculty {
                code: code.clone(),
                name: name.clone(),
            })
            .collect();
        faculties.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(faculties)
    }

    async fn get_faculty(&self, code: &str) -> Result<Option<Faculty>, StoreError> {
        let state = self.state.read().await;
        Ok(state.faculties.get(code).map(|name| Faculty {
            code: code.to_string(),
            name: name.clone(),
        }))
    }

    async fn create_faculty(&self, faculty: Faculty) -> Result<Faculty, StoreError> {
        let mut state = self.state.write().await;
        if state.faculties.contains_key(&faculty.code) {
            return Err(StoreError::Duplicate(format!("Faculty '{}' already exists", faculty.code)));
        }
        state.faculties.insert(faculty.code.clone(), faculty.name.clone());
        Ok(faculty)
    }

    async fn rename_faculty(&self, code: &str, name: &str) -> Result<Faculty, StoreError> {
        let mut state = self.state.write().await;
        match state.faculties.get_mut(code) {
            Some(current) => {
                *current = name.to_string();
                Ok(Faculty {
                    code: code.to_string(),
                    name: name.to_string(),
                })
            }
            None => Err(StoreError::NotFound(format!("Faculty '{}'", code))),
        }
    }

    async fn delete_faculty(&self, code: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.faculties.contains_key(code) {
            return Err(StoreError::NotFound(format!("Faculty '{}'", code)));
        }

        let blockers = Blockers {
            usuarios: state.users.values().filter(|u| u.faculty_code == code).count() as i64,
            carreras: state.careers.values().filter(|c| c.faculty_code == code).count() as i64,
            archivos: state.files.values().filter(|f| f.meta.faculty_code == code).count() as i64,
        };
        if !blockers.is_empty() {
            return Err(faculty_in_use(code, blockers));
        }

        state.faculties.remove(code);
        Ok(())
    }

    async fn list_careers(&self, faculty_code: &str) -> Result<Vec<Career>, StoreError> {
        let state = self.state.read().await;
        let mut careers: Vec<Career> = state
            .careers
            .values()
            .filter(|c| c.faculty_code == faculty_code)
            .cloned()
            .collect();
        careers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(careers)
    }

    async fn create_career(&self, career: Career) -> Result<Career, StoreError> {
        let mut state = self.state.write().await;
        if !state.faculties.contains_key(&career.faculty_code) {
            return Err(StoreError::invalid_reference(
                "facultadCod",
                format!("Faculty '{}' does not exist", career.faculty_code),
            ));
        }
        if state.careers.contains_key(&career.code) {
            return Err(StoreError::Duplicate(format!("Career '{}' already exists", career.code)));
        }
        state.careers.insert(career.code.clone(), career.clone());
        Ok(career)
    }

    async fn update_career(&self, code: &str, patch: CareerPatch) -> Result<Career, StoreError> {
        let mut state = self.state.write().await;
        if let Some(faculty) = &patch.faculty_code {
            if !state.faculties.contains_key(faculty) {
                return Err(StoreError::invalid_reference(
                    "facultadCod",
                    format!("Faculty '{}' does not exist", faculty),
                ));
            }
        }

        let career = state
            .careers
            .get_mut(code)
            .ok_or_else(|| StoreError::NotFound(format!("Career '{}'", code)))?;
        if let Some(faculty) = patch.faculty_code {
            career.faculty_code = faculty;
        }
        if let Some(name) = patch.name {
            career.name = name;
        }
        Ok(career.clone())
    }

    async fn delete_career(&self, code: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.careers.contains_key(code) {
            return Err(StoreError::NotFound(format!("Career '{}'", code)));
        }

        let users = state
            .users
            .values()
            .filter(|u| u.career_code.as_deref() == Some(code))
            .count() as i64;
        if users > 0 {
            return Err(career_in_use(code, users));
        }

        state.careers.remove(code);
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn get_template(&self, kind: TemplateKind) -> Result<TemplateBodies, StoreError> {
        let state = self.state.read().await;
        Ok(state.templates.get(&kind).cloned().unwrap_or_default())
    }

    async fn set_template(&self, kind: TemplateKind, bodies: TemplateBodies) -> Result<(), StoreError> {
        self.state.write().await.templates.insert(kind, bodies);
        Ok(())
    }
}

#[async_trait]
impl AuthorityConfigStore for MemoryStore {
    async fn get_authority_email(&self) -> Result<Option<String>, StoreError> {
        Ok(self.state.read().await.authority_email.clone())
    }

    async fn set_authority_email(&self, email: &str) -> Result<(), StoreError> {
        self.state.write().await.authority_email = Some(email.to_string());
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
