//! Repository factory for dependency injection.
//!
//! Backend selection, in order of precedence:
//! 1. `REPOSITORY_TYPE` (`local` | `postgres`), or `DATABASE_URL` implying Postgres
//! 2. a `repository.toml` in the working directory
//! 3. an in-memory repository, optionally seeded from `RELIEF_SEED_FILE`

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::repo_config::RepositoryConfig;
use super::repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
use super::repositories::{PostgresConfig, PostgresRepository};
use super::repository::{FullRepository, RepositoryError, RepositoryResult};

/// Environment variable naming a JSON seed for the local repository.
pub const SEED_FILE_ENV: &str = "RELIEF_SEED_FILE";

/// Repository type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// Postgres + Diesel implementation
    Postgres,
    /// In-memory local repository
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "local" | "memory" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

impl RepositoryType {
    /// Backend requested through the environment, if any.
    pub fn from_env() -> Option<Self> {
        if let Ok(val) = std::env::var("REPOSITORY_TYPE") {
            return match val.parse() {
                Ok(t) => Some(t),
                Err(e) => {
                    log::warn!("{}; falling back to local repository", e);
                    Some(Self::Local)
                }
            };
        }

        if std::env::var("DATABASE_URL").is_ok() || std::env::var("PG_DATABASE_URL").is_ok() {
            Some(Self::Postgres)
        } else {
            None
        }
    }
}

/// Repository factory for creating repository instances.
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create an empty in-memory repository.
    pub fn create_local() -> Arc<dyn FullRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Create an in-memory repository pre-loaded from a JSON seed file.
    pub fn create_seeded_local<P: AsRef<Path>>(
        seed_file: P,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        let repo = LocalRepository::new();
        let counts = repo.load_seed_file(seed_file.as_ref())?;
        log::info!(
            "Seeded local repository from {}: {} requests, {} warehouses, {} resources",
            seed_file.as_ref().display(),
            counts.requests,
            counts.warehouses,
            counts.resources
        );
        Ok(Arc::new(repo))
    }

    #[cfg(feature = "postgres-repo")]
    pub async fn create_postgres(
        config: &PostgresConfig,
    ) -> RepositoryResult<Arc<PostgresRepository>> {
        let repo = PostgresRepository::new(config.clone())?;
        Ok(Arc::new(repo))
    }

    /// Create a repository of the given type using environment settings.
    pub async fn create(repo_type: RepositoryType) -> RepositoryResult<Arc<dyn FullRepository>> {
        match repo_type {
            RepositoryType::Postgres => {
                #[cfg(feature = "postgres-repo")]
                {
                    let config =
                        PostgresConfig::from_env().map_err(RepositoryError::configuration)?;
                    let pg = Self::create_postgres(&config).await?;
                    Ok(pg as Arc<dyn FullRepository>)
                }
                #[cfg(not(feature = "postgres-repo"))]
                {
                    Err(RepositoryError::configuration(
                        "Postgres repository feature not enabled",
                    ))
                }
            }
            RepositoryType::Local => match std::env::var(SEED_FILE_ENV) {
                Ok(path) if !path.trim().is_empty() => Self::create_seeded_local(path.trim()),
                _ => Ok(Self::create_local()),
            },
        }
    }

    /// Create a repository from a parsed `repository.toml`.
    pub async fn from_repository_config(
        config: &RepositoryConfig,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        match config.repository_type()? {
            RepositoryType::Postgres => {
                #[cfg(feature = "postgres-repo")]
                {
                    let pg_config = config.to_postgres_config()?.ok_or_else(|| {
                        RepositoryError::configuration(
                            "Postgres repository requires database configuration",
                        )
                    })?;
                    let pg = Self::create_postgres(&pg_config).await?;
                    Ok(pg as Arc<dyn FullRepository>)
                }
                #[cfg(not(feature = "postgres-repo"))]
                {
                    Err(RepositoryError::configuration(
                        "Postgres repository feature not enabled",
                    ))
                }
            }
            RepositoryType::Local => match &config.local.seed_file {
                Some(path) => Self::create_seeded_local(path),
                None => Ok(Self::create_local()),
            },
        }
    }

    pub async fn from_config_file<P: AsRef<Path>>(
        config_path: P,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        let config = RepositoryConfig::from_file(config_path)?;
        Self::from_repository_config(&config).await
    }

    /// Resolve the backend from the environment, then `repository.toml`,
    /// then fall back to the in-memory store.
    pub async fn from_environment() -> RepositoryResult<Arc<dyn FullRepository>> {
        if let Some(repo_type) = RepositoryType::from_env() {
            log::info!("Using {:?} repository (from environment)", repo_type);
            return Self::create(repo_type).await;
        }
        if let Some(path) = RepositoryConfig::find_default() {
            log::info!("Using repository configuration from {}", path.display());
            return Self::from_config_file(path).await;
        }
        log::info!("No repository configured; using in-memory repository");
        Self::create(RepositoryType::Local).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_repository_type_from_str() {
        assert_eq!(
            RepositoryType::from_str("local").unwrap(),
            RepositoryType::Local
        );
        assert_eq!(
            RepositoryType::from_str(" Postgres ").unwrap(),
            RepositoryType::Postgres
        );
        assert_eq!(
            RepositoryType::from_str("pg").unwrap(),
            RepositoryType::Postgres
        );
        assert!(RepositoryType::from_str("mongo").is_err());
    }

    #[tokio::test]
    async fn test_create_local_repository() {
        let repo = RepositoryFactory::create_local();
        assert!(repo.health_check().await.unwrap());
        assert!(repo.list_open_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_config_with_seed_file() {
        let mut seed = tempfile::NamedTempFile::new().unwrap();
        write!(
            seed,
            r#"{{
                "warehouses": [{{
                    "id": 1, "name": "North Hub", "location": "Depot, Northtown", "capacity": 50
                }}],
                "resources": [{{"id": 3, "type": "water", "quantity": 12, "warehouseId": 1}}]
            }}"#
        )
        .unwrap();

        let config = RepositoryConfig::from_toml_str(&format!(
            "[repository]\ntype = \"local\"\n[local]\nseed_file = \"{}\"\n",
            seed.path().display()
        ))
        .unwrap();
        let repo = RepositoryFactory::from_repository_config(&config)
            .await
            .unwrap();

        assert_eq!(repo.list_warehouses().await.unwrap().len(), 1);
        assert_eq!(repo.list_resources().await.unwrap()[0].quantity, 12);
    }
}
