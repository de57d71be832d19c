use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, GameListItemEntity, PlayerSessionEntity},
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchGameDocument, CouchSessionDocument, END_SUFFIX, FindResponse,
        GAME_PREFIX, extract_uuid, game_doc_id, join_token_query, session_doc_id,
    },
};

/// [`GameStore`] over the CouchDB HTTP API.
#[derive(Clone)]
pub struct CouchGameStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchGameStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{path}", self.database_url());
        self.with_auth(self.client.request(method, url))
    }

    async fn send(path: &str, builder: RequestBuilder) -> CouchResult<Response> {
        builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_owned(),
                source,
            })
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> CouchResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: path.to_owned(),
                source,
            })
    }

    fn unexpected(path: &str, status: StatusCode) -> CouchDaoError {
        CouchDaoError::RequestStatus {
            path: path.to_owned(),
            status,
        }
    }

    /// Create the database on first use.
    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let probe = self
            .with_auth(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;
        let status = match probe.status() {
            StatusCode::OK => return Ok(()),
            StatusCode::NOT_FOUND => {
                debug!(%database, "creating CouchDB database");
                self.with_auth(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?
                    .status()
            }
            other => other,
        };

        if status.is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::DatabaseStatus { database, status })
        }
    }

    async fn get_document<T: DeserializeOwned>(&self, doc_id: &str) -> CouchResult<Option<T>> {
        let response = Self::send(doc_id, self.request(Method::GET, doc_id)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Self::decode(doc_id, response).await.map(Some),
            other => Err(Self::unexpected(doc_id, other)),
        }
    }

    async fn put_document<T: Serialize>(&self, doc_id: &str, document: &T) -> CouchResult<()> {
        let response = Self::send(doc_id, self.request(Method::PUT, doc_id).json(document)).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                path: doc_id.to_owned(),
            }),
            other => Err(Self::unexpected(doc_id, other)),
        }
    }

    /// Every document whose id starts with `prefix`.
    async fn list_documents<T: DeserializeOwned>(&self, prefix: &str) -> CouchResult<Vec<T>> {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_owned()),
            ("startkey", format!("\"{prefix}\"")),
            ("endkey", format!("\"{prefix}{END_SUFFIX}\"")),
        ];

        let response = Self::send(ALL_DOCS, self.request(Method::GET, ALL_DOCS).query(&query)).await?;
        if !response.status().is_success() {
            return Err(Self::unexpected(ALL_DOCS, response.status()));
        }
        let payload: AllDocsResponse = Self::decode(ALL_DOCS, response).await?;

        payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| {
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_owned(),
                    source,
                })
            })
            .collect()
    }

    /// Mango query on the team tokens; the id index is not enough here.
    async fn find_by_token(&self, token: &str) -> CouchResult<Option<Uuid>> {
        const FIND: &str = "_find";
        let response = Self::send(
            FIND,
            self.request(Method::POST, FIND).json(&join_token_query(token)),
        )
        .await?;
        if !response.status().is_success() {
            return Err(Self::unexpected(FIND, response.status()));
        }
        let payload: FindResponse = Self::decode(FIND, response).await?;

        payload
            .docs
            .first()
            .map(|doc| extract_uuid(&doc.id))
            .transpose()
    }

    async fn replace_game(&self, game: GameEntity, expected_revision: u64) -> CouchResult<()> {
        let game_id = game.id;
        let doc_id = game_doc_id(game_id);
        let conflict = || CouchDaoError::RevisionConflict {
            game_id,
            expected: expected_revision,
        };

        let existing = self
            .get_document::<CouchGameDocument>(&doc_id)
            .await?
            .ok_or_else(conflict)?;
        if existing.game.revision != expected_revision {
            return Err(conflict());
        }

        let document = CouchGameDocument::from((game, existing.rev));
        match self.put_document(&doc_id, &document).await {
            Err(CouchDaoError::Conflict { .. }) => {
                debug!(%game_id, expected_revision, "CouchDB refused stale _rev");
                Err(conflict())
            }
            other => other,
        }
    }
}

impl GameStore for CouchGameStore {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let game_id = game.id;
            let doc_id = game_doc_id(game_id);
            let document = CouchGameDocument::from((game, None));
            match store.put_document(&doc_id, &document).await {
                Err(CouchDaoError::Conflict { .. }) => Err(CouchDaoError::Duplicate {
                    kind: "game",
                    key: game_id.to_string(),
                }
                .into()),
                other => other.map_err(Into::into),
            }
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = game_doc_id(id);
            let maybe_doc = store.get_document::<CouchGameDocument>(&doc_id).await?;
            Ok(maybe_doc.map(GameEntity::try_from).transpose()?)
        })
    }

    fn replace_game(
        &self,
        game: GameEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_game(game, expected_revision)
                .await
                .map_err(Into::into)
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchGameDocument>(GAME_PREFIX)
                .await?;
            let mut games = docs
                .into_iter()
                .map(|doc| GameEntity::try_from(doc).map(|entity| GameListItemEntity::from(&entity)))
                .collect::<CouchResult<Vec<_>>>()?;
            games.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(games)
        })
    }

    fn find_game_by_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<Uuid>>> {
        let store = self.clone();
        Box::pin(async move { store.find_by_token(&token).await.map_err(Into::into) })
    }

    fn insert_session(
        &self,
        session: PlayerSessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let player_id = session.player_id;
            let document = CouchSessionDocument::from(session);
            match store.put_document(&document.id, &document).await {
                Err(CouchDaoError::Conflict { .. }) => Err(CouchDaoError::Duplicate {
                    kind: "session",
                    key: player_id.to_string(),
                }
                .into()),
                other => other.map_err(Into::into),
            }
        })
    }

    fn find_session(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = session_doc_id(&token);
            let maybe_doc = store.get_document::<CouchSessionDocument>(&doc_id).await?;
            Ok(maybe_doc.map(|doc| doc.session))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = Self::send(&url, store.with_auth(store.client.get(&url))).await?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::unexpected(&url, response.status()).into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
