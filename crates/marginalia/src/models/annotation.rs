//! Annotation model
//!
//! An annotation is a mark on one page of a document. Its audience is the
//! creator, plus the roles in `visibility` when it is not private, plus Admin.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::security::Role;

/// Annotation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationKind {
    Highlight,
    Comment,
    #[serde(alias = "Draw")]
    Drawing,
}

impl std::fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnotationKind::Highlight => write!(f, "Highlight"),
            AnnotationKind::Comment => write!(f, "Comment"),
            AnnotationKind::Drawing => write!(f, "Drawing"),
        }
    }
}

impl std::str::FromStr for AnnotationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "highlight" => Ok(AnnotationKind::Highlight),
            "comment" => Ok(AnnotationKind::Comment),
            "drawing" | "draw" => Ok(AnnotationKind::Drawing),
            _ => Err(format!("Invalid annotation kind: {}", s)),
        }
    }
}

/// Canonical visibility set: creator removed, sorted, deduplicated
pub fn normalize_visibility(creator: Role, roles: impl IntoIterator<Item = Role>) -> Vec<Role> {
    let mut roles: Vec<Role> = roles.into_iter().filter(|r| *r != creator).collect();
    roles.sort();
    roles.dedup();
    roles
}

/// Whether `role` may read an annotation with the given audience fields
pub fn can_view(role: Role, creator: Role, is_private: bool, visibility: &[Role]) -> bool {
    role == creator || role.is_admin() || (!is_private && visibility.contains(&role))
}

/// Annotation record (stored in the annotations collection)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub document_id: ObjectId,
    pub created_by: Role,
    pub kind: AnnotationKind,
    pub payload: Value,
    pub is_private: bool,
    #[serde(default)]
    pub visibility: Vec<Role>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Annotation {
    pub fn is_visible_to(&self, role: Role) -> bool {
        can_view(role, self.created_by, self.is_private, &self.visibility)
    }

    pub fn id_hex(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

/// Annotation as returned by the API and held in client views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationView {
    pub id: String,
    pub document_id: String,
    pub created_by: Role,
    pub kind: AnnotationKind,
    pub payload: Value,
    pub is_private: bool,
    pub visibility: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnnotationView {
    pub fn is_visible_to(&self, role: Role) -> bool {
        can_view(role, self.created_by, self.is_private, &self.visibility)
    }
}

impl From<Annotation> for AnnotationView {
    fn from(a: Annotation) -> Self {
        Self {
            id: a.id_hex(),
            document_id: a.document_id.to_hex(),
            created_by: a.created_by,
            kind: a.kind,
            payload: a.payload,
            is_private: a.is_private,
            visibility: a.visibility,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

fn default_private() -> bool {
    true
}

/// Create annotation request.
///
/// `kind` and `payload` stay loosely typed so that bad values surface as
/// validation errors from the store rather than as body rejections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnotation {
    pub kind: Option<String>,
    pub payload: Option<Value>,
    #[serde(default = "default_private")]
    pub is_private: bool,
    #[serde(default)]
    pub visibility: Vec<Role>,
}

/// Partial update of an annotation. Identity, creator, document, kind and
/// timestamps are not patchable; unknown fields are refused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnnotationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Vec<Role>>,
}

impl AnnotationPatch {
    pub fn is_empty(&self) -> bool {
        self.payload.is_none() && self.is_private.is_none() && self.visibility.is_none()
    }

    /// Apply to a stored record
    pub fn apply(&self, annotation: &mut Annotation, now: DateTime<Utc>) {
        if let Some(payload) = &self.payload {
            annotation.payload = payload.clone();
        }
        if let Some(is_private) = self.is_private {
            annotation.is_private = is_private;
        }
        if let Some(visibility) = &self.visibility {
            annotation.visibility = normalize_visibility(annotation.created_by, visibility.iter().copied());
        }
        annotation.updated_at = now;
    }

    /// Apply to a client-side view (speculatively, before the server answers)
    pub fn apply_to_view(&self, view: &mut AnnotationView, now: DateTime<Utc>) {
        if let Some(payload) = &self.payload {
            view.payload = payload.clone();
        }
        if let Some(is_private) = self.is_private {
            view.is_private = is_private;
        }
        if let Some(visibility) = &self.visibility {
            view.visibility = normalize_visibility(view.created_by, visibility.iter().copied());
        }
        view.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(created_by: Role, is_private: bool, visibility: Vec<Role>) -> Annotation {
        let now = Utc::now();
        Annotation {
            id: Some(ObjectId::new()),
            document_id: ObjectId::new(),
            created_by,
            kind: AnnotationKind::Comment,
            payload: json!({"page": 1, "text": "note"}),
            is_private,
            visibility,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_private_annotation_audience() {
        let a = sample(Role::DoerA, true, vec![Role::DoerB, Role::Reader]);
        assert!(a.is_visible_to(Role::DoerA));
        assert!(a.is_visible_to(Role::Admin));
        assert!(!a.is_visible_to(Role::DoerB));
        assert!(!a.is_visible_to(Role::Reader));
    }

    #[test]
    fn test_shared_annotation_audience() {
        let a = sample(Role::DoerB, false, vec![Role::Reader]);
        for role in Role::ALL {
            let expected = matches!(role, Role::DoerB | Role::Reader | Role::Admin);
            assert_eq!(a.is_visible_to(role), expected, "role {}", role);
        }
    }

    #[test]
    fn test_normalize_visibility_drops_creator_and_duplicates() {
        let v = normalize_visibility(Role::DoerA, [Role::Reader, Role::DoerA, Role::Admin, Role::Reader]);
        assert_eq!(v, vec![Role::Admin, Role::Reader]);
    }

    #[test]
    fn test_kind_parsing_accepts_legacy_draw() {
        assert_eq!("Draw".parse::<AnnotationKind>(), Ok(AnnotationKind::Drawing));
        assert_eq!("highlight".parse::<AnnotationKind>(), Ok(AnnotationKind::Highlight));
        assert!("Sticker".parse::<AnnotationKind>().is_err());
        let kind: AnnotationKind = serde_json::from_str("\"Draw\"").unwrap();
        assert_eq!(kind, AnnotationKind::Drawing);
    }

    #[test]
    fn test_patch_rejects_immutable_fields() {
        let err = serde_json::from_value::<AnnotationPatch>(json!({"createdBy": "A1"}));
        assert!(err.is_err());
        let patch: AnnotationPatch = serde_json::from_value(json!({"isPrivate": false})).unwrap();
        assert!(!patch.is_empty());
        assert!(AnnotationPatch::default().is_empty());
    }

    #[test]
    fn test_patch_apply_normalizes_visibility() {
        let mut a = sample(Role::DoerA, true, vec![]);
        let created_at = a.created_at;
        let patch = AnnotationPatch {
            payload: None,
            is_private: Some(false),
            visibility: Some(vec![Role::DoerA, Role::Reader]),
        };
        patch.apply(&mut a, Utc::now());
        assert!(!a.is_private);
        assert_eq!(a.visibility, vec![Role::Reader]);
        assert_eq!(a.created_at, created_at);
        assert_eq!(a.created_by, Role::DoerA);
    }

    #[test]
    fn test_new_annotation_defaults_to_private() {
        let req: NewAnnotation =
            serde_json::from_value(json!({"kind": "Comment", "payload": {"page": 2}})).unwrap();
        assert!(req.is_private);
        assert!(req.visibility.is_empty());
    }
}
