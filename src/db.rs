use mongodb::{options::ClientOptions, Client, Database};

use crate::error::AppError;

pub struct MongoDB {
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Result<Self, AppError> {
        let client_options = ClientOptions::parse(uri)
            .await
            .map_err(|e| AppError::Config(format!("Failed to parse MongoDB connection string: {}", e)))?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        Ok(MongoDB { db })
    }
}
