//! CRUD walkthrough against the sample collections

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::Collection;
use tracing::{info, instrument};

use super::models::{sample_podcast_id, Episode, Podcast};
use crate::controller::{metrics, ConnectionHandle, Workload};
use crate::error::Result;

pub const PODCASTS_COLLECTION: &str = "podcasts";
pub const EPISODES_COLLECTION: &str = "episodes";

/// Runs the demonstration sequence once
///
/// With `dry_run` set every read still runs; inserts, updates, replaces,
/// deletes and the collection drop are logged and skipped.
#[derive(Clone, Debug, Default)]
pub struct SampleWorkload {
    pub dry_run: bool,
}

impl SampleWorkload {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Returns `true` when a mutating operation must be skipped
    fn skip(&self, operation: &str) -> bool {
        if self.dry_run {
            info!("Dry-run: skipping {}", operation);
            metrics::inc_demo_operation(operation, "skipped");
        }
        self.dry_run
    }

    #[instrument(skip_all)]
    async fn initialize(&self, admin: &ConnectionHandle) -> Result<()> {
        info!("Initializing database...");
        let names = tracked("list_database_names", admin.client().list_database_names()).await?;
        info!("Databases: {:?}", names);
        Ok(())
    }

    #[instrument(skip_all)]
    async fn create(&self, app: &ConnectionHandle) -> Result<()> {
        if self.skip("insert_one") {
            self.skip("insert_many");
            return Ok(());
        }

        let podcast = tracked(
            "insert_one",
            podcasts(app).insert_one(doc! {
                "title": "The Polyglot Developer Podcast",
                "author": "Nic Raboy",
                "tags": ["development", "programming", "coding"],
            }),
        )
        .await?;

        let episodes = tracked(
            "insert_many",
            episodes(app).insert_many(vec![
                doc! {
                    "podcast": podcast.inserted_id.clone(),
                    "title": "GraphQL for API Development",
                    "description": "Learn about GraphQL from the co-creator of GraphQL, Lee Byron.",
                    "duration": 25,
                },
                doc! {
                    "podcast": podcast.inserted_id,
                    "title": "Progressive Web Application Development",
                    "description": "Learn about PWA development with Tara Manicsic.",
                    "duration": 32,
                },
            ]),
        )
        .await?;

        info!(
            "Inserted {} documents into episode collection",
            episodes.inserted_ids.len()
        );
        Ok(())
    }

    #[instrument(skip_all)]
    async fn structures(&self, app: &ConnectionHandle) -> Result<()> {
        info!("Reading into typed models");
        let cursor = tracked(
            "find",
            app.database()
                .collection::<Episode>(EPISODES_COLLECTION)
                .find(doc! { "duration": { "$gt": 25 } }),
        )
        .await?;
        let long_episodes: Vec<Episode> = cursor.try_collect().await?;
        info!("Episodes longer than 25 minutes: {:?}", long_episodes);

        if self.skip("insert_one") {
            return Ok(());
        }

        info!("Creating from typed models");
        let podcast = Podcast {
            id: None,
            title: "The Polyglot Developer".to_string(),
            author: "Nic Raboy".to_string(),
            tags: vec![
                "development".to_string(),
                "programming".to_string(),
                "coding".to_string(),
            ],
        };
        let inserted = tracked(
            "insert_one",
            app.database()
                .collection::<Podcast>(PODCASTS_COLLECTION)
                .insert_one(podcast),
        )
        .await?;
        info!("Inserted podcast {}", inserted.inserted_id);
        Ok(())
    }

    #[instrument(skip_all)]
    async fn read(&self, app: &ConnectionHandle) -> Result<()> {
        let episodes = episodes(app);

        info!("Getting all episodes");
        let all: Vec<Document> = tracked("find", episodes.find(doc! {}))
            .await?
            .try_collect()
            .await?;
        info!("{} episode(s): {:?}", all.len(), all);

        info!("Iterating over episodes");
        let mut cursor = tracked("find", episodes.find(doc! {})).await?;
        while let Some(episode) = cursor.try_next().await? {
            info!("{}", episode);
        }

        info!("Finding one podcast");
        match tracked("find_one", podcasts(app).find_one(doc! {})).await? {
            Some(podcast) => info!("{}", podcast),
            None => info!("No podcast found"),
        }

        info!("Filtering (duration of 25)");
        let filtered: Vec<Document> = tracked("find", episodes.find(doc! { "duration": 25 }))
            .await?
            .try_collect()
            .await?;
        info!("{:?}", filtered);

        info!("Sorting, descending by duration > 24");
        let sorted: Vec<Document> = tracked(
            "find",
            episodes
                .find(doc! { "duration": { "$gt": 24 } })
                .sort(doc! { "duration": -1 }),
        )
        .await?
        .try_collect()
        .await?;
        info!("{:?}", sorted);
        Ok(())
    }

    #[instrument(skip_all)]
    async fn update(&self, app: &ConnectionHandle) -> Result<()> {
        let podcasts = podcasts(app);
        let id = sample_podcast_id();

        if !self.skip("update_one") {
            info!("Updating by id ({})", id);
            let result = tracked(
                "update_one",
                podcasts.update_one(
                    doc! { "_id": id },
                    doc! { "$set": { "author": "Nic Raboy" } },
                ),
            )
            .await?;
            info!("Updated {} document(s)", result.modified_count);
        }

        if !self.skip("update_many") {
            info!("Updating by filter");
            let result = tracked(
                "update_many",
                podcasts.update_many(
                    doc! { "title": "The Polyglot Developer Podcast" },
                    doc! { "$set": { "author": "Nicolas Raboy" } },
                ),
            )
            .await?;
            info!("Updated {} document(s)", result.modified_count);
        }

        if !self.skip("replace_one") {
            info!("Replacing document by filter");
            let result = tracked(
                "replace_one",
                podcasts.replace_one(
                    doc! { "author": "Nic Raboy" },
                    doc! { "title": "The Nic Raboy Show", "author": "Nicolas Raboy" },
                ),
            )
            .await?;
            info!("Replaced {} document(s)", result.modified_count);
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn delete(&self, app: &ConnectionHandle) -> Result<()> {
        let podcasts = podcasts(app);

        if !self.skip("delete_one") {
            info!("Deleting document by filter");
            let result = tracked(
                "delete_one",
                podcasts.delete_one(doc! { "title": "The Polyglot Developer Podcast" }),
            )
            .await?;
            info!("delete_one removed {} document(s)", result.deleted_count);
        }

        if !self.skip("delete_many") {
            info!("Deleting multiple documents by filter");
            let result = tracked(
                "delete_many",
                episodes(app).delete_many(doc! { "duration": 25 }),
            )
            .await?;
            info!("delete_many removed {} document(s)", result.deleted_count);
        }

        if !self.skip("drop") {
            info!("Dropping entire collection");
            tracked("drop", podcasts.drop()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Workload<ConnectionHandle> for SampleWorkload {
    async fn run_once(&self, app: &ConnectionHandle, admin: &ConnectionHandle) -> Result<()> {
        self.initialize(admin).await?;
        self.create(app).await?;
        self.structures(app).await?;
        self.read(app).await?;
        self.update(app).await?;
        self.delete(app).await?;
        Ok(())
    }
}

fn podcasts(app: &ConnectionHandle) -> Collection<Document> {
    app.database().collection(PODCASTS_COLLECTION)
}

fn episodes(app: &ConnectionHandle) -> Collection<Document> {
    app.database().collection(EPISODES_COLLECTION)
}

/// Await a driver action and count its outcome
async fn tracked<A, T>(operation: &str, action: A) -> Result<T>
where
    A: std::future::IntoFuture<Output = mongodb::error::Result<T>>,
{
    match action.await {
        Ok(value) => {
            metrics::inc_demo_operation(operation, "success");
            Ok(value)
        }
        Err(e) => {
            metrics::inc_demo_operation(operation, "failure");
            Err(e.into())
        }
    }
}
