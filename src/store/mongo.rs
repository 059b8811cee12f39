use std::collections::HashSet;

use futures::TryStreamExt;
use log::{debug, info};
use mongodb::bson::{doc, to_document, Bson, Document};
use mongodb::options::{ClientOptions, FindOptions, IndexOptions, ReplaceOptions};
use mongodb::{Client, Collection, IndexModel};
use url::Url;

use super::BuildSink;
use crate::error::{OELensError, Result};
use crate::record::BuildRecord;

const JOB_FIELD: &str = "jobname";
const NUMBER_FIELD: &str = "buildnumber";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub collection: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl StoreSettings {
    /// Connection string for the store. Credentials authenticate against the
    /// target database.
    pub fn connection_uri(&self) -> Result<Url> {
        let invalid = |what: &str| OELensError::Config(format!("Invalid store {what}"));

        let mut uri = Url::parse(&format!("mongodb://{}:{}/", self.host, self.port))
            .map_err(|e| OELensError::Config(format!("Invalid store address: {e}")))?;

        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            uri.set_username(username).map_err(|()| invalid("username"))?;
            uri.set_password(self.password.as_deref())
                .map_err(|()| invalid("password"))?;
            uri.query_pairs_mut().append_pair("authSource", &self.database);
        }

        Ok(uri)
    }
}

/// Sink writing one document per build into a MongoDB collection.
pub struct MongoSink {
    collection: Collection<Document>,
}

impl MongoSink {
    /// Connects and pings the server so that a bad address or bad
    /// credentials fail before any build is read.
    pub async fn connect(settings: &StoreSettings) -> Result<Self> {
        let uri = settings.connection_uri()?;
        info!(
            "Connecting to {}:{} ({}.{})",
            settings.host, settings.port, settings.database, settings.collection
        );

        let mut options = ClientOptions::parse(uri.as_str()).await?;
        options.app_name = Some("oelens".to_string());
        let client = Client::with_options(options)?;

        let database = client.database(&settings.database);
        database.run_command(doc! { "ping": 1 }, None).await?;
        debug!("Store answered ping");

        Ok(Self {
            collection: database.collection(&settings.collection),
        })
    }
}

fn build_key(job: &str, number: u32) -> Document {
    doc! { JOB_FIELD: job, NUMBER_FIELD: i64::from(number) }
}

fn build_number(value: Option<&Bson>) -> Option<u32> {
    match value? {
        Bson::Int32(n) => u32::try_from(*n).ok(),
        Bson::Int64(n) => u32::try_from(*n).ok(),
        _ => None,
    }
}

impl BuildSink for MongoSink {
    async fn prepare(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { JOB_FIELD: 1, NUMBER_FIELD: 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index, None).await?;
        Ok(())
    }

    async fn existing_builds(&self, job: &str) -> Result<HashSet<u32>> {
        let options = FindOptions::builder()
            .projection(doc! { NUMBER_FIELD: 1, "_id": 0 })
            .build();
        let mut cursor = self.collection.find(doc! { JOB_FIELD: job }, options).await?;

        let mut numbers = HashSet::new();
        while let Some(document) = cursor.try_next().await? {
            if let Some(number) = build_number(document.get(NUMBER_FIELD)) {
                numbers.insert(number);
            }
        }

        debug!("{} builds of {job} already stored", numbers.len());
        Ok(numbers)
    }

    async fn upsert(&self, record: &BuildRecord) -> Result<()> {
        let document = to_document(record)?;
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(
                build_key(&record.job_name, record.build_number),
                document,
                options,
            )
            .await?;
        Ok(())
    }
}
