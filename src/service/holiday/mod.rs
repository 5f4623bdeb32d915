//! External public-holiday data sources.
//!
//! The working-day calendar prefers an external source when one is configured,
//! and falls back to its computed holidays whenever the source fails.

pub mod nager;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{Holiday, Res};

// Traits.

/// Generic holiday source trait that clients must implement.
#[async_trait]
pub trait GenericHolidayClient: Send + Sync + 'static {
    /// Fetches the public holidays of the configured region for `year`.
    async fn get_public_holidays(&self, year: i32) -> Res<Vec<Holiday>>;
}

// Structs.

/// Holiday client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct HolidayClient {
    inner: Arc<dyn GenericHolidayClient>,
}

impl Deref for HolidayClient {
    type Target = dyn GenericHolidayClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl HolidayClient {
    pub fn new(inner: Arc<dyn GenericHolidayClient>) -> Self {
        Self { inner }
    }
}
