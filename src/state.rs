//! Application state shared across handlers, jobs and the CLI.

use std::sync::Arc;

use sqlx::PgPool;

use crate::billing::{PaymentProcessor, SimulatedProcessor};
use crate::config::AppConfig;
use crate::jobs::JobGuards;
use crate::services::{AdminService, AuthService, PlanService, SubscriptionService};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    processor: Arc<dyn PaymentProcessor>,
    job_guards: JobGuards,
}

impl AppState {
    pub fn new(config: AppConfig, pool: PgPool, processor: Arc<dyn PaymentProcessor>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                processor,
                job_guards: JobGuards::default(),
            }),
        }
    }

    /// State backed by the simulated processor at the configured success rate
    pub fn with_simulator(config: AppConfig, pool: PgPool) -> Self {
        let processor = Arc::new(SimulatedProcessor::new(config.billing.payment_success_rate));
        Self::new(config, pool, processor)
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    pub fn processor(&self) -> Arc<dyn PaymentProcessor> {
        Arc::clone(&self.inner.processor)
    }

    pub fn job_guards(&self) -> &JobGuards {
        &self.inner.job_guards
    }

    pub fn subscriptions(&self) -> SubscriptionService {
        SubscriptionService::new(self.pool().clone(), self.processor(), &self.config().billing)
    }

    pub fn plans(&self) -> PlanService {
        PlanService::new(self.pool().clone(), self.config().billing.currency.clone())
    }

    pub fn admin(&self) -> AdminService {
        AdminService::new(self.pool().clone())
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.pool().clone())
    }
}
