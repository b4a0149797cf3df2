use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::StoreError;

/// Notification category; each kind owns one set of bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Seguimiento,
    Nee,
    TerceraMatricula,
    Parcial,
    Final,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 5] = [
        TemplateKind::Seguimiento,
        TemplateKind::Nee,
        TemplateKind::TerceraMatricula,
        TemplateKind::Parcial,
        TemplateKind::Final,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Seguimiento => "seguimiento",
            TemplateKind::Nee => "nee",
            TemplateKind::TerceraMatricula => "tercera_matricula",
            TemplateKind::Parcial => "parcial",
            TemplateKind::Final => "final",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(TemplateKind::as_str).collect()
    }
}

impl Default for TemplateKind {
    fn default() -> Self {
        TemplateKind::Seguimiento
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTemplateKind(pub String);

impl fmt::Display for UnknownTemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown template kind '{}'. Available kinds: {}",
            self.0,
            TemplateKind::names().join(", ")
        )
    }
}

impl FromStr for TemplateKind {
    type Err = UnknownTemplateKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| UnknownTemplateKind(s.to_string()))
    }
}

/// The three audience bodies of a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateBodies {
    #[serde(rename = "autoridad", default)]
    pub authority: String,
    #[serde(rename = "docente", default)]
    pub instructor: String,
    #[serde(rename = "estudiante", default)]
    pub student: String,
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Empty bodies when the kind was never stored.
    async fn get_template(&self, kind: TemplateKind) -> Result<TemplateBodies, StoreError>;

    async fn set_template(&self, kind: TemplateKind, bodies: TemplateBodies) -> Result<(), StoreError>;
}
