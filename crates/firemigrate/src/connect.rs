//! Resolving the project and credentials into a Firestore client.

use std::fmt;
use std::path::PathBuf;

use firemigrate_store::firestore::{AuthorizedUser, DEFAULT_DATABASE, ServiceAccountKey};
use firemigrate_store::{Credentials, FirestoreClient};
use tracing::debug;

use crate::ConnectError;

/// Project used against the emulator when none is given.
pub const DEFAULT_EMULATOR_PROJECT: &str = "demo-firemigrate";

/// Where `gcloud auth application-default login` writes credentials, relative to home.
const ADC_RELATIVE_PATH: &str = ".config/gcloud/application_default_credentials.json";

/// Inputs for [`connect`]. Earlier sources win: emulator, access token,
/// key file, then application default credentials.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub project: Option<String>,
    pub key_file: Option<PathBuf>,
    /// Database ID; `(default)` when unset.
    pub database: Option<String>,
    pub emulator_host: Option<String>,
    pub access_token: Option<String>,
    /// Overrides the gcloud application default credentials location.
    pub adc_file: Option<PathBuf>,
}

/// Which credential source was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Emulator { host: String },
    AccessToken,
    ServiceAccount { client_email: String },
    ApplicationDefault { path: PathBuf },
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Emulator { host } => write!(f, "emulator at {}", host),
            CredentialSource::AccessToken => write!(f, "access token"),
            CredentialSource::ServiceAccount { client_email } => {
                write!(f, "service account: {}", client_email)
            }
            CredentialSource::ApplicationDefault { path } => {
                write!(f, "application default credentials ({})", path.display())
            }
        }
    }
}

/// A ready client plus how it was authorized.
pub struct Connection {
    pub client: FirestoreClient,
    pub source: CredentialSource,
}

impl Connection {
    pub fn project_id(&self) -> &str {
        self.client.project_id()
    }
}

/// Default location of application default credentials.
pub fn default_adc_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(ADC_RELATIVE_PATH))
}

/// Build a client from the first available credential source.
pub fn connect(options: &ConnectionOptions) -> Result<Connection, ConnectError> {
    let database = options
        .database
        .clone()
        .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

    if let Some(host) = &options.emulator_host {
        let project = options
            .project
            .clone()
            .unwrap_or_else(|| DEFAULT_EMULATOR_PROJECT.to_string());
        debug!(host = %host, project = %project, "using emulator");
        return Ok(Connection {
            client: FirestoreClient::emulator(host, project, database),
            source: CredentialSource::Emulator { host: host.clone() },
        });
    }

    if let Some(token) = &options.access_token {
        let project = options.project.clone().ok_or(ConnectError::MissingProject)?;
        let credentials = Credentials::AccessToken(token.clone());
        return Ok(Connection {
            client: FirestoreClient::new(project, database, credentials),
            source: CredentialSource::AccessToken,
        });
    }

    if let Some(path) = &options.key_file {
        let key = ServiceAccountKey::from_file(path)?;
        let project = options
            .project
            .clone()
            .or_else(|| key.project_id.clone())
            .ok_or(ConnectError::MissingProject)?;
        let source = CredentialSource::ServiceAccount {
            client_email: key.client_email.clone(),
        };
        return Ok(Connection {
            client: FirestoreClient::new(project, database, Credentials::ServiceAccount(key)),
            source,
        });
    }

    let path = options
        .adc_file
        .clone()
        .or_else(default_adc_path)
        .filter(|p| p.exists())
        .ok_or(ConnectError::NoCredentials)?;
    debug!(path = %path.display(), "using application default credentials");

    // gcloud writes user credentials, but a service account key may sit there too.
    let (credentials, fallback_project) = match AuthorizedUser::from_file(&path) {
        Ok(user) => {
            let project = user.quota_project_id.clone();
            (Credentials::AuthorizedUser(user), project)
        }
        Err(user_err) => match ServiceAccountKey::from_file(&path) {
            Ok(key) => {
                let project = key.project_id.clone();
                (Credentials::ServiceAccount(key), project)
            }
            Err(_) => return Err(user_err.into()),
        },
    };

    let project = options
        .project
        .clone()
        .or(fallback_project)
        .ok_or(ConnectError::MissingProject)?;

    Ok(Connection {
        client: FirestoreClient::new(project, database, credentials),
        source: CredentialSource::ApplicationDefault { path },
    })
}
