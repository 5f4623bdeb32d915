//! One-way mirroring of the recorded location into a directory profile.
//!
//! Sync is best effort: it runs as a detached task and its outcome is only logged.

pub mod graph;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use tracing::{Instrument, error, info, warn};

use crate::base::types::{Res, WorkLocation};

// Traits.

/// Generic directory client trait that clients must implement.
#[async_trait]
pub trait GenericDirectoryClient: Send + Sync + 'static {
    /// Writes the location into the profile of the user with `email`.
    ///
    /// Returns whether the profile was updated.
    async fn update_external_profile_location(&self, email: &str, location: WorkLocation) -> Res<bool>;
}

// Structs.

/// Directory client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DirectoryClient {
    inner: Arc<dyn GenericDirectoryClient>,
}

impl Deref for DirectoryClient {
    type Target = dyn GenericDirectoryClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl DirectoryClient {
    pub fn new(inner: Arc<dyn GenericDirectoryClient>) -> Self {
        Self { inner }
    }

    /// Mirrors a location in the background.
    ///
    /// Only remote and office are mirrored; anything else is ignored. Returns the handle
    /// of the spawned task, if one was spawned.
    pub fn sync_in_background(&self, email: &str, location: WorkLocation) -> Option<tokio::task::JoinHandle<()>> {
        if location == WorkLocation::Hybrid {
            return None;
        }

        let client = self.clone();
        let email = email.to_string();

        let handle = tokio::spawn(
            async move {
                match client.update_external_profile_location(&email, location).await {
                    Ok(true) => info!("Directory profile updated to {location}."),
                    Ok(false) => warn!("Directory profile was not updated."),
                    Err(err) => error!("Directory sync failed: {err}"),
                }
            }
            .in_current_span(),
        );

        Some(handle)
    }
}
