//! Food database lookup (Edamam parser API).
//!
//! Stateless and independent from the classification pipeline. Credentials are
//! read from the environment and never compiled in.

use std::env;

use log::info;
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_ENDPOINT: &str = "https://api.edamam.com/api/food-database/v2/parser";
pub const APP_ID_ENV_VAR: &str = "EDAMAM_APP_ID";
pub const APP_KEY_ENV_VAR: &str = "EDAMAM_APP_KEY";

#[derive(Debug, thiserror::Error)]
pub enum NutritionError {
    #[error("Missing credential: set the {0} environment variable")]
    MissingCredentials(&'static str),
    #[error("Food name cannot be empty")]
    EmptyQuery,
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct NutritionCredentials {
    pub app_id: String,
    pub app_key: String,
}

// Keeps the key out of logs.
impl std::fmt::Debug for NutritionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NutritionCredentials")
            .field("app_id", &self.app_id)
            .field("app_key", &"***")
            .finish()
    }
}

impl NutritionCredentials {
    pub fn new(app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_key: app_key.into(),
        }
    }

    pub fn from_env() -> Result<Self, NutritionError> {
        let app_id = env::var(APP_ID_ENV_VAR)
            .map_err(|_| NutritionError::MissingCredentials(APP_ID_ENV_VAR))?;
        let app_key = env::var(APP_KEY_ENV_VAR)
            .map_err(|_| NutritionError::MissingCredentials(APP_KEY_ENV_VAR))?;
        Ok(Self::new(app_id, app_key))
    }
}

#[derive(Debug, Deserialize)]
struct ParserResponse {
    #[serde(default)]
    hints: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct NutritionClient {
    client: reqwest::Client,
    endpoint: String,
    credentials: NutritionCredentials,
}

impl NutritionClient {
    pub fn new(credentials: NutritionCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credentials,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Builds the parser request for `food`. The name is trimmed and URL-encoded.
    pub fn build_request(&self, food: &str) -> Result<reqwest::Request, NutritionError> {
        let food = food.trim();
        if food.is_empty() {
            return Err(NutritionError::EmptyQuery);
        }
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("nutrition-type", "logging"),
                ("ingr", food),
                ("app_id", self.credentials.app_id.as_str()),
                ("app_key", self.credentials.app_key.as_str()),
            ])
            .build()?;
        Ok(request)
    }

    /// Returns the `hints` array of the parser response.
    pub async fn lookup(&self, food: &str) -> Result<Vec<Value>, NutritionError> {
        let request = self.build_request(food)?;
        info!("Looking up nutrition data for '{}'", food.trim());
        let response: ParserResponse = self
            .client
            .execute(request)
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!("Received {} hints", response.hints.len());
        Ok(response.hints)
    }
}
