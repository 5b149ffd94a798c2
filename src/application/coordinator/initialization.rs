//! ProviderInitializationCoordinator - single-flight configure and
//! serialized identity switches for the billing provider.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::time::Instant;

use super::identity::{is_anonymous, AppIdentity};
use super::session::{ConfigurationState, CoordinatorError, ProviderSession};
use crate::config::ProviderConfig;
use crate::ports::{BillingProvider, EntitlementSnapshot};

/// Guards the billing provider's configure and login calls.
///
/// - `configure` runs at most once per session, however many callers race.
/// - At most one login is in flight per process. Concurrent switches to the
///   same identity share one call; switches to different identities run one
///   after another, spaced by `switch_min_interval`.
/// - `reset` starts a new session; results of calls issued before it are
///   discarded with `CoordinatorError::Superseded`.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct ProviderInitializationCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn BillingProvider>,
    config: ProviderConfig,
    session: Mutex<ProviderSession>,
    switch_gate: tokio::sync::Mutex<()>,
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, ProviderSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What a switch has to ask the provider for.
#[derive(Debug, Clone, Copy)]
enum SwitchAction {
    Login,
    Refresh,
}

impl ProviderInitializationCoordinator {
    pub fn new(provider: Arc<dyn BillingProvider>, config: ProviderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                config,
                session: Mutex::new(ProviderSession::default()),
                switch_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn configuration_state(&self) -> ConfigurationState {
        self.inner.session().state
    }

    /// Identity the provider is logged in as, if known.
    pub fn current_user(&self) -> Option<String> {
        self.inner.session().current_user.clone()
    }

    /// Starts a new session. In-flight calls finish but their results are
    /// discarded.
    pub fn reset(&self) {
        let mut session = self.inner.session();
        session.reset();
        tracing::info!(generation = session.generation, "Provider session reset");
    }

    /// Configures the provider once, optionally as `identity`.
    ///
    /// Callers arriving while configuration is in flight wait for it rather
    /// than configuring again. Fails closed: an error here means the
    /// provider must be treated as unavailable.
    pub async fn initialize(&self, identity: Option<&str>) -> Result<(), CoordinatorError> {
        let identity = identity.map(AppIdentity::parse).transpose()?;

        let pending = {
            let mut session = self.inner.session();
            match session.state {
                ConfigurationState::Configured => return Ok(()),
                ConfigurationState::Configuring => None,
                ConfigurationState::Unconfigured => {
                    let api_key = self
                        .inner
                        .config
                        .api_key()
                        .ok_or(CoordinatorError::MissingApiKey)?
                        .to_string();

                    session.state = ConfigurationState::Configuring;
                    let configure = Self::run_configure(
                        Arc::clone(&self.inner),
                        api_key,
                        identity.map(|id| id.as_str().to_string()),
                        session.generation,
                    )
                    .boxed()
                    .shared();
                    session.configure = Some(configure.clone());
                    Some(configure)
                }
            }
        };

        match pending {
            Some(configure) => configure.await,
            None => self.wait_for_configuration().await,
        }
    }

    /// Waits until the provider is configured.
    ///
    /// Joins the in-flight configure call when there is one; otherwise
    /// polls the state a bounded number of times and fails closed.
    pub async fn wait_for_configuration(&self) -> Result<(), CoordinatorError> {
        let in_flight = {
            let session = self.inner.session();
            match session.state {
                ConfigurationState::Configured => return Ok(()),
                ConfigurationState::Unconfigured => return Err(CoordinatorError::NotConfigured),
                ConfigurationState::Configuring => session.configure.clone(),
            }
        };
        if let Some(configure) = in_flight {
            return configure.await;
        }

        let attempts = self.inner.config.configure_poll_attempts;
        let interval = self.inner.config.configure_poll_interval();
        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;
            match self.configuration_state() {
                ConfigurationState::Configured => return Ok(()),
                ConfigurationState::Unconfigured => return Err(CoordinatorError::NotConfigured),
                ConfigurationState::Configuring => {
                    tracing::debug!(attempt, "Waiting for provider configuration");
                }
            }
        }

        tracing::warn!(attempts, "Provider configuration still pending, giving up");
        Err(CoordinatorError::ConfigureTimedOut { attempts })
    }

    /// Switches the provider to `identity` and returns its entitlements.
    pub async fn switch_user(&self, identity: &str) -> Result<EntitlementSnapshot, CoordinatorError> {
        let target = AppIdentity::parse(identity)?;
        self.wait_for_configuration().await?;

        let switch = {
            let mut session = self.inner.session();
            match session.switches.get(target.as_str()).cloned() {
                Some(in_flight) => {
                    tracing::debug!(identity = %target, "Joining in-flight identity switch");
                    in_flight
                }
                None => {
                    let switch = Self::run_switch(
                        Arc::clone(&self.inner),
                        target.clone(),
                        session.generation,
                    )
                    .boxed()
                    .shared();
                    session
                        .switches
                        .insert(target.as_str().to_string(), switch.clone());
                    switch
                }
            }
        };

        switch.await
    }

    /// Entitlements of the identity currently logged in.
    pub async fn current_entitlement(&self) -> Result<EntitlementSnapshot, CoordinatorError> {
        self.wait_for_configuration().await?;
        Ok(self.inner.provider.current_entitlement().await?)
    }

    async fn run_configure(
        inner: Arc<Inner>,
        api_key: String,
        identity: Option<String>,
        generation: u64,
    ) -> Result<(), CoordinatorError> {
        tracing::info!(identity = ?identity, "Configuring billing provider");
        let result = inner
            .provider
            .configure(&api_key, identity.as_deref())
            .await
            .map_err(CoordinatorError::from);

        let mut session = inner.session();
        if session.generation != generation {
            tracing::warn!("Discarding configure result from a previous session");
            return Err(CoordinatorError::Superseded);
        }
        session.configure = None;
        match &result {
            Ok(()) => {
                session.state = ConfigurationState::Configured;
                session.current_user = identity;
                tracing::info!("Billing provider configured");
            }
            Err(e) => {
                session.state = ConfigurationState::Unconfigured;
                tracing::error!(error = %e, "Billing provider configuration failed");
            }
        }
        result
    }

    async fn run_switch(
        inner: Arc<Inner>,
        target: AppIdentity,
        generation: u64,
    ) -> Result<EntitlementSnapshot, CoordinatorError> {
        // One switch at a time, whatever the identity
        let _gate = inner.switch_gate.lock().await;

        let (action, wait) = {
            let session = inner.session();
            if session.generation != generation {
                return Err(CoordinatorError::Superseded);
            }
            let action = Self::plan_switch(session.current_user.as_deref(), &target)?;
            let wait = match action {
                SwitchAction::Login => session.last_switch_at.map(|at| {
                    (at + inner.config.switch_min_interval())
                        .saturating_duration_since(Instant::now())
                }),
                SwitchAction::Refresh => None,
            };
            (action, wait.filter(|w| !w.is_zero()))
        };

        if let Some(wait) = wait {
            tracing::info!(
                identity = %target,
                wait_ms = wait.as_millis() as u64,
                "Rate limiting identity switch"
            );
            tokio::time::sleep(wait).await;
        }

        let result = match action {
            SwitchAction::Login => {
                tracing::info!(identity = %target, "Switching billing identity");
                inner.provider.login(target.as_str()).await
            }
            SwitchAction::Refresh => inner.provider.current_entitlement().await,
        }
        .map_err(CoordinatorError::from);

        let mut session = inner.session();
        if session.generation != generation {
            tracing::warn!(identity = %target, "Discarding identity switch from a previous session");
            return Err(CoordinatorError::Superseded);
        }
        session.switches.remove(target.as_str());
        if let SwitchAction::Login = action {
            session.last_switch_at = Some(Instant::now());
            if result.is_ok() {
                session.current_user = Some(target.as_str().to_string());
            }
        }
        result
    }

    /// Same identity, or anonymous while already anonymous, only needs a
    /// refresh. Moving to an anonymous identity otherwise is a logout and
    /// must go through `reset`.
    fn plan_switch(
        current: Option<&str>,
        target: &AppIdentity,
    ) -> Result<SwitchAction, CoordinatorError> {
        if current == Some(target.as_str()) {
            return Ok(SwitchAction::Refresh);
        }
        if target.is_anonymous() {
            return match current {
                None => Ok(SwitchAction::Refresh),
                Some(current) if is_anonymous(current) => Ok(SwitchAction::Refresh),
                Some(_) => Err(CoordinatorError::InvalidIdentity(format!(
                    "cannot switch from an authenticated user to {}",
                    target
                ))),
            };
        }
        Ok(SwitchAction::Login)
    }
}
