//! eBPLS backend client - the sole API boundary between the mobile core
//! and the eBPLS mobile API.
//!
//! The address cascade only ever talks to [`AddressDirectory`]; the edit
//! screen additionally needs [`ApplicationSource`]. [`HttpClient`] is the
//! production implementation, [`InProcessClient`] an in-memory directory
//! for tests and offline demos.

pub mod error;
pub mod http;
pub mod inprocess;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use ebpls_types::{
    AddressDefaults, ApplicationEdit, Barangay, BarangayRecord, Municipality, MunicipalityRecord,
    Province, ProvinceRecord, Region, RegionRecord, User,
};
pub use tokio_util::sync::CancellationToken;

pub use error::ClientError;
pub use http::HttpClient;
pub use inprocess::InProcessClient;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Read-only view of the remote address directory.
///
/// List calls return the children of a parent in backend order. Reverse
/// lookups return `Ok(None)` when the backend has no such record.
#[async_trait]
pub trait AddressDirectory: Send + Sync {
    async fn list_regions(&self) -> Result<Vec<Region>>;

    async fn list_provinces(&self, region_id: i64) -> Result<Vec<Province>>;

    async fn list_municipalities(&self, province_id: i64) -> Result<Vec<Municipality>>;

    async fn list_barangays(&self, municipality_id: i64) -> Result<Vec<Barangay>>;

    async fn get_barangay(&self, barangay_id: i64) -> Result<Option<BarangayRecord>>;

    async fn get_municipality(&self, municipality_id: i64) -> Result<Option<MunicipalityRecord>>;

    async fn get_province(&self, province_id: i64) -> Result<Option<ProvinceRecord>>;

    async fn get_region(&self, region_id: i64) -> Result<Option<RegionRecord>>;

    /// The LGU's default region (used to pre-select on a fresh form).
    async fn address_defaults(&self) -> Result<AddressDefaults>;
}

/// Source of saved applications for the edit screen.
#[async_trait]
pub trait ApplicationSource: Send + Sync {
    async fn fetch_application_for_edit(&self, application_id: &str) -> Result<ApplicationEdit>;
}

/// Login session held by the backend (cookie based).
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Currently logged-in user; `Ok(None)` when not authenticated.
    async fn current_user(&self) -> Result<Option<User>>;

    /// Open a session; the backend answers with a session cookie.
    async fn login(&self, username: &str, password: &str) -> Result<()>;

    async fn logout(&self) -> Result<()>;
}

/// Per-call-type request timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    /// Directory lists and reverse lookups
    pub directory: Duration,
    /// `GET /applications/{id}/edit`
    pub application: Duration,
    /// `GET /me`
    pub session: Duration,
    /// `POST /login`
    pub login: Duration,
    /// `POST /logout`
    pub logout: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            directory: Duration::from_secs(10),
            application: Duration::from_secs(30),
            session: Duration::from_secs(5),
            login: Duration::from_secs(10),
            logout: Duration::from_secs(3),
        }
    }
}

/// Race a request against a cancellation token.
///
/// Dropping the request future aborts the underlying HTTP call, so a
/// cancelled request never yields a value.
pub async fn cancellable<T, F>(token: &CancellationToken, request: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if token.is_cancelled() {
        return Err(ClientError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ClientError::Cancelled),
        result = request => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellable_short_circuits_on_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<u32> = cancellable(&token, async { Ok(7) }).await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn cancellable_interrupts_pending_request() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            child.cancel();
        });
        let result: Result<u32> = cancellable(&token, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        })
        .await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn cancellable_passes_through_result() {
        let token = CancellationToken::new();
        let result = cancellable(&token, async { Ok::<_, ClientError>("ok") }).await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[test]
    fn default_timeouts() {
        let t = ClientTimeouts::default();
        assert_eq!(t.directory, Duration::from_secs(10));
        assert_eq!(t.application, Duration::from_secs(30));
        assert_eq!(t.session, Duration::from_secs(5));
        assert_eq!(t.login, Duration::from_secs(10));
        assert_eq!(t.logout, Duration::from_secs(3));
    }
}
