use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::dao::{
    game_store::couchdb::error::CouchDaoError,
    models::{GameEntity, PlayerSessionEntity},
};

pub const GAME_PREFIX: &str = "game::";
pub const SESSION_PREFIX: &str = "session::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

/// `_all_docs` row; `doc` is only present with `include_docs=true`.
#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Response of a Mango `_find` query.
#[derive(Debug, Deserialize)]
pub struct FindResponse {
    pub docs: Vec<FoundDocument>,
}

#[derive(Debug, Deserialize)]
pub struct FoundDocument {
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: GameEntity,
}

impl From<(GameEntity, Option<String>)> for CouchGameDocument {
    fn from((game, rev): (GameEntity, Option<String>)) -> Self {
        Self {
            id: game_doc_id(game.id),
            rev,
            game,
        }
    }
}

impl TryFrom<CouchGameDocument> for GameEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchGameDocument) -> Result<Self, Self::Error> {
        if extract_uuid(&doc.id)? != doc.game.id {
            return Err(CouchDaoError::InvalidDocId {
                doc_id: doc.id,
                kind: "id does not match body",
            });
        }
        Ok(doc.game)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub session: PlayerSessionEntity,
}

impl From<PlayerSessionEntity> for CouchSessionDocument {
    fn from(session: PlayerSessionEntity) -> Self {
        Self {
            id: session_doc_id(&session.token),
            rev: None,
            session,
        }
    }
}

pub fn game_doc_id(id: Uuid) -> String {
    format!("{GAME_PREFIX}{id}")
}

/// Sessions are keyed by their bearer token so lookups are a single GET.
pub fn session_doc_id(token: &str) -> String {
    format!("{SESSION_PREFIX}{token}")
}

pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    let malformed = |kind| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_owned(),
        kind,
    };
    let (_, id) = doc_id
        .split_once("::")
        .ok_or_else(|| malformed("missing separator"))?;
    Uuid::parse_str(id).map_err(|_| malformed("invalid UUID"))
}

/// Mango selector for the game owning a team with the given join or supervisor token.
pub fn join_token_query(token: &str) -> Value {
    json!({
        "selector": {
            "_id": {"$gt": GAME_PREFIX, "$lt": format!("{GAME_PREFIX}{END_SUFFIX}")},
            "teams": {
                "$elemMatch": {
                    "$or": [
                        {"join_token": token},
                        {"supervisor_token": token},
                    ]
                }
            }
        },
        "fields": ["_id"],
        "limit": 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_game_id_from_document_id() {
        let id = Uuid::new_v4();
        assert_eq!(extract_uuid(&game_doc_id(id)).unwrap(), id);
        assert!(matches!(
            extract_uuid("game-without-separator"),
            Err(CouchDaoError::InvalidDocId {
                kind: "missing separator",
                ..
            })
        ));
    }

    #[test]
    fn join_token_query_checks_both_tokens() {
        let query = join_token_query("incas-2025");
        let alternatives = &query["selector"]["teams"]["$elemMatch"]["$or"];
        assert_eq!(alternatives[0]["join_token"], "incas-2025");
        assert_eq!(alternatives[1]["supervisor_token"], "incas-2025");
    }
}
