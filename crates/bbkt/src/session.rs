//! Credential bootstrap.
//!
//! Runs once per invocation, in order:
//! 1. Static credentials from the environment, if any, win outright.
//! 2. Otherwise a stored profile is resolved (override, repository context,
//!    default, any).
//! 3. An expired OAuth profile is refreshed and the store rewritten.
//! 4. The resulting authenticator is attached to a client.

use anyhow::Result;
use bbkt_client::{Authenticator, BitbucketClient, ClientBuilder};
use bbkt_config::{
    CredentialRecord, CredentialStore, EnvCredentials, EnvOverrides, ProfileStore, ResolvedFrom,
    ResolvedProfile, local_repo, resolve_profile,
};
use bbkt_oauth::{OAuthRefresher, TokenEndpoint};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Where the credentials came from, before any network access.
pub enum Credentials {
    /// `BITBUCKET_ACCESS_TOKEN` or `BITBUCKET_USERNAME` + `BITBUCKET_API_TOKEN`.
    Environment(EnvCredentials),
    /// A profile from the credential store.
    Stored {
        file: CredentialStore,
        store: ProfileStore,
        resolved: ResolvedProfile,
    },
}

/// Pick the credentials for this invocation without touching the network.
///
/// The per-user store is not opened when the environment supplies credentials.
pub fn resolve(env: &EnvOverrides, profile_override: Option<&str>) -> Result<Credentials> {
    if let Some(credentials) = from_environment(env) {
        return Ok(credentials);
    }

    let context_workspace = match local_repo() {
        Ok(repo) => Some(repo.workspace),
        Err(e) => {
            debug!("No repository context: {}", e);
            None
        }
    };

    resolve_in(
        env,
        profile_override,
        CredentialStore::open_default()?,
        context_workspace.as_deref(),
    )
}

/// [`resolve`] against an explicit store file and repository workspace.
pub fn resolve_in(
    env: &EnvOverrides,
    profile_override: Option<&str>,
    file: CredentialStore,
    context_workspace: Option<&str>,
) -> Result<Credentials> {
    if let Some(credentials) = from_environment(env) {
        return Ok(credentials);
    }

    let store = file.load_or_default()?;
    let override_name = profile_override.or(env.profile.as_deref());

    let resolved = resolve_profile(&store, override_name, context_workspace)?;
    debug!(
        profile = %resolved.record.profile_name,
        from = %resolved.resolved_from,
        "Resolved credential profile"
    );

    Ok(Credentials::Stored {
        file,
        store,
        resolved,
    })
}

fn from_environment(env: &EnvOverrides) -> Option<Credentials> {
    let creds = env.credentials.as_ref()?;
    debug!(source = creds.source(), "Using credentials from environment");
    Some(Credentials::Environment(creds.clone()))
}

/// An authenticated client plus a description of its credentials.
pub struct Session {
    pub client: BitbucketClient,
    pub origin: Origin,
}

impl Session {
    /// Scopes recorded with the stored credential. Empty for environment credentials.
    pub fn cached_scopes(&self) -> Vec<String> {
        match &self.origin {
            Origin::Environment(_) => Vec::new(),
            Origin::Profile { record, .. } => record.granted_scopes(),
        }
    }
}

/// Display-only summary of where a session's credentials came from.
pub enum Origin {
    Environment(&'static str),
    Profile {
        record: CredentialRecord,
        resolved_from: ResolvedFrom,
    },
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Environment(source) => write!(f, "environment ({})", source),
            Origin::Profile {
                record,
                resolved_from,
            } => write!(f, "profile '{}' ({})", record.profile_name, resolved_from),
        }
    }
}

/// Turn resolved credentials into a Bitbucket Cloud client, refreshing first if needed.
pub async fn connect(credentials: Credentials) -> Result<Session> {
    connect_with(
        credentials,
        &OAuthRefresher::bitbucket(),
        BitbucketClient::builder(),
        Utc::now(),
    )
    .await
}

/// [`connect`] with an explicit refresher, client builder and clock.
pub async fn connect_with<E: TokenEndpoint>(
    credentials: Credentials,
    refresher: &OAuthRefresher<E>,
    builder: ClientBuilder,
    now: DateTime<Utc>,
) -> Result<Session> {
    let (auth, origin) = match credentials {
        Credentials::Environment(creds) => {
            (Authenticator::from_env(&creds), Origin::Environment(creds.source()))
        }
        Credentials::Stored {
            file,
            mut store,
            resolved,
        } => {
            let name = resolved.record.profile_name.clone();
            let record = refresher.ensure_fresh(&file, &mut store, &name, now).await?;
            (
                Authenticator::from_record(&record),
                Origin::Profile {
                    record,
                    resolved_from: resolved.resolved_from,
                },
            )
        }
    };

    let client = builder.authenticator(auth).build()?;
    Ok(Session { client, origin })
}
