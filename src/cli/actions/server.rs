use crate::{
    cli::commands::security::Options,
    config::SecurityConfig,
    gatehouse::{self, SecurityState},
    security::{
        AccessPolicyResolver, AuthDecisionEngine, ConfigStore, CredentialStore,
        Md5DigestVerifier, NullStore, PasswordVault, PolicyTable, Unrestricted,
    },
};
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub web_root: PathBuf,
    pub security: Options,
}

/// Wire the vault, credential store, resolver and engine from the options.
///
/// # Errors
/// Returns an error if the security config cannot be loaded.
pub fn security_state(options: &Options) -> Result<SecurityState> {
    let vault = Arc::new(PasswordVault::new());
    if let Some(password) = &options.password {
        vault.set_password(password.expose_secret());
    }

    let (store, resolver): (Arc<dyn CredentialStore>, Arc<dyn AccessPolicyResolver>) =
        match &options.config_path {
            Some(path) => {
                let config = SecurityConfig::load(path)
                    .with_context(|| format!("Failed to load security config: {}", path.display()))?;
                let table = PolicyTable::from_config(&config);
                info!("{} access limits loaded", table.len());
                let store: Arc<dyn CredentialStore> = Arc::new(ConfigStore::new(&config, vault));
                let resolver: Arc<dyn AccessPolicyResolver> = Arc::new(table);
                (store, resolver)
            }
            None => {
                warn!("No security config, every path is unrestricted");
                let store: Arc<dyn CredentialStore> = Arc::new(NullStore::new(vault));
                let resolver: Arc<dyn AccessPolicyResolver> = Arc::new(Unrestricted);
                (store, resolver)
            }
        };

    let mut engine = AuthDecisionEngine::new(store).with_forced_auth(options.debug_security);
    if options.digest {
        engine = engine.with_digest(Arc::new(Md5DigestVerifier::new(options.realm.clone())));
    }
    debug!("{:?}", engine);

    Ok(
        SecurityState::new(engine, resolver, options.realm.clone())
            .with_trusted_forwarded_proto(options.trust_forwarded_proto),
    )
}

/// Execute the server action.
/// # Errors
/// Returns an error if the security config is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let state = Arc::new(security_state(&args.security)?);

    if !args.security.enabled {
        warn!("Security handler disabled");
    }

    gatehouse::new(args.port, state, &args.web_root, args.security.enabled).await
}
