use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use crate::types::lenient_datetime;

/// Table names.
pub const USER_TABLE: &str = "user";
pub const FICHE_LAPIN_TABLE: &str = "fiche_lapin";
pub const POST_TABLE: &str = "post";

/// Persisted user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Database identifier (table: `user`); also the token subject.
    pub id: RecordId,
    /// Unique login name.
    pub username: String,
    /// Encoded credential hash, never the plain password.
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    /// Account role (`admin`, `fondateur`, `benevole`, `anonyme`).
    pub role: String,
}

/// Payload used when inserting a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub username: String,
    /// Already-encoded credential hash.
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: String,
}

/// Partial update of a user; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Already-encoded credential hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.role.is_none()
    }
}

/// Optional descriptive fields of a rabbit sheet.
///
/// Clients send these flat next to `nom`; the database keeps them in a
/// nested `details` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FicheLapinDetails {
    #[serde(default, deserialize_with = "lenient_datetime::deserialize", skip_serializing_if = "Option::is_none")]
    pub date_arrivee_association: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,

    // Identité
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numero_identification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statut_vetonac: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize", skip_serializing_if = "Option::is_none")]
    pub date_naissance: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sexe: Option<String>,
    /// Grams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poids_actuel: Option<i64>,
    /// Grams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poids_ideal: Option<i64>,

    // Santé
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nom_veterinaire: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize", skip_serializing_if = "Option::is_none")]
    pub date_sterilisation: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize", skip_serializing_if = "Option::is_none")]
    pub date_dernier_vaccin: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nom_dernier_vaccin: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize", skip_serializing_if = "Option::is_none")]
    pub date_prochain_vaccin: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize", skip_serializing_if = "Option::is_none")]
    pub date_dernier_controle_sante: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize", skip_serializing_if = "Option::is_none")]
    pub date_deparasitage: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nom_deparasitage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problemes_sante_connus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_litiere_actuelle: Option<String>,

    // Alimentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_foin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marque_granules: Option<String>,
    /// Grams per day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantite_granules: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdure_introduite: Option<String>,
    /// Grams per day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantite_verdure: Option<i64>,

    // Comportement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caractere: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sociabilite_autres_lapins: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sociabilite_autres_animaux: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sociabilite_enfants: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proprete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamisme: Option<String>,
}

/// Persisted rabbit sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FicheLapinRecord {
    /// Database identifier (table: `fiche_lapin`).
    pub id: RecordId,
    pub nom: String,
    /// Intake number assigned by the association.
    pub numero_arrivee_association: i64,
    pub date_creation_fiche: DateTime<Utc>,
    /// Owning author; only this user may edit or delete the sheet.
    pub auteur_id: RecordId,
    #[serde(default)]
    pub details: FicheLapinDetails,
}

/// Payload used when inserting a new rabbit sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FicheLapinCreate {
    pub nom: String,
    pub numero_arrivee_association: i64,
    pub date_creation_fiche: DateTime<Utc>,
    pub auteur_id: RecordId,
    pub details: FicheLapinDetails,
}

/// Fields rewritten by an update of a rabbit sheet.
#[derive(Debug, Clone, Serialize)]
pub struct FicheLapinUpdate {
    pub nom: String,
    pub numero_arrivee_association: i64,
    pub details: FicheLapinDetails,
}

/// Partial update of a rabbit sheet, as sent by a client.
///
/// Neither the id nor the author can be changed through an update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FicheLapinChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numero_arrivee_association: Option<i64>,
    #[serde(flatten)]
    pub details: FicheLapinDetails,
}

/// Persisted note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    /// Database identifier (table: `post`).
    pub id: RecordId,
    pub title: String,
    pub content: Option<String>,
    pub date_creation_post: DateTime<Utc>,
    pub author_id: RecordId,
    /// Rabbit sheet this note is attached to, if any.
    pub fiche_lapin_id: Option<RecordId>,
}

/// Payload used when inserting a new note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCreate {
    pub title: String,
    pub content: Option<String>,
    pub date_creation_post: DateTime<Utc>,
    pub author_id: RecordId,
    pub fiche_lapin_id: Option<RecordId>,
}

impl FicheLapinDetails {
    /// Overwrite every field that is set in `changes`.
    pub fn apply(&mut self, changes: FicheLapinDetails) {
        let target = self;
        macro_rules! take_set {
            ($($field:ident),* $(,)?) => {
                $(
                    if changes.$field.is_some() {
                        target.$field = changes.$field;
                    }
                )*
            };
        }

        take_set!(
            date_arrivee_association,
            photo,
            numero_identification,
            statut_vetonac,
            date_naissance,
            sexe,
            poids_actuel,
            poids_ideal,
            nom_veterinaire,
            date_sterilisation,
            date_dernier_vaccin,
            nom_dernier_vaccin,
            date_prochain_vaccin,
            date_dernier_controle_sante,
            date_deparasitage,
            nom_deparasitage,
            problemes_sante_connus,
            type_litiere_actuelle,
            type_foin,
            marque_granules,
            quantite_granules,
            verdure_introduite,
            quantite_verdure,
            caractere,
            sociabilite_autres_lapins,
            sociabilite_autres_animaux,
            sociabilite_enfants,
            proprete,
            dynamisme,
        );
    }
}

impl FicheLapinChanges {
    pub fn is_empty(&self) -> bool {
        self.nom.is_none()
            && self.numero_arrivee_association.is_none()
            && self.details == FicheLapinDetails::default()
    }
}

/// Rabbit sheet as submitted by a client. Author and creation date are set
/// by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFicheLapin {
    pub nom: String,
    pub numero_arrivee_association: i64,
    #[serde(flatten)]
    pub details: FicheLapinDetails,
}

/// Note as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
}
