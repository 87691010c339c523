//! "Nearly sold out" announcement publisher.

use conference_core::Result;
use conference_core::cache::{ANNOUNCEMENT_KEY, Cache};
use conference_core::store::ConferenceStore;
use conference_core::types::Conference;
use std::sync::Arc;

/// Conferences with this many seats or fewer (but at least one) are announced.
pub const NEARLY_SOLD_OUT_THRESHOLD: u32 = 5;

/// Render the announcement for the given conferences, or `None` if there are
/// none. Names are listed in order.
///
/// ```
/// use conference_runtime::announcements::render_announcement;
///
/// assert_eq!(render_announcement(&["Beta", "Alpha"]).as_deref(), Some(
///     "Last chance to attend! The following conferences are nearly sold out: Alpha, Beta"
/// ));
/// assert_eq!(render_announcement::<&str>(&[]), None);
/// ```
#[must_use]
pub fn render_announcement<S: AsRef<str>>(names: &[S]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let mut names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();
    Some(format!(
        "Last chance to attend! The following conferences are nearly sold out: {}",
        names.join(", ")
    ))
}

/// Publishes the global announcement to [`ANNOUNCEMENT_KEY`].
#[derive(Clone)]
pub struct AnnouncementPublisher {
    store: Arc<dyn ConferenceStore>,
    cache: Arc<dyn Cache>,
    threshold: u32,
}

impl AnnouncementPublisher {
    /// Create a publisher with the default threshold.
    #[must_use]
    pub fn new(store: Arc<dyn ConferenceStore>, cache: Arc<dyn Cache>) -> Self {
        Self {
            store,
            cache,
            threshold: NEARLY_SOLD_OUT_THRESHOLD,
        }
    }

    /// Scan all conferences and publish or clear the announcement.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] or [`ConferenceError::Cache`] if a
    /// backend fails.
    ///
    /// [`ConferenceError::Store`]: conference_core::ConferenceError::Store
    /// [`ConferenceError::Cache`]: conference_core::ConferenceError::Cache
    pub async fn run(&self) -> Result<Option<String>> {
        let conferences = self.store.conferences().await?;
        let nearly_sold_out: Vec<&str> = conferences
            .iter()
            .filter(|conference| conference.is_nearly_sold_out(self.threshold))
            .map(|conference: &Conference| conference.name.as_str())
            .collect();

        match render_announcement(&nearly_sold_out) {
            Some(announcement) => {
                self.cache.set(ANNOUNCEMENT_KEY, announcement.clone()).await?;
                tracing::info!(conferences = nearly_sold_out.len(), "Published announcement");
                Ok(Some(announcement))
            }
            None => {
                self.cache.delete(ANNOUNCEMENT_KEY).await?;
                tracing::debug!("No conferences nearly sold out");
                Ok(None)
            }
        }
    }
}
