//! In-memory address directory.
//!
//! Answers the same calls as [`HttpClient`](crate::HttpClient) from tables
//! held in memory. Every call is recorded under its HTTP path so tests can
//! assert on what was (not) fetched, and paths can be slowed down or made
//! to fail to exercise cancellation and error handling.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ebpls_types::{
    AddressDefaults, ApplicationEdit, Barangay, BarangayRecord, Municipality, MunicipalityRecord,
    Province, ProvinceRecord, Region, RegionRecord, User,
};

use crate::{AddressDirectory, ApplicationSource, ClientError, Result, SessionApi};

#[derive(Debug, Default)]
pub struct InProcessClient {
    regions: Vec<Region>,
    /// (region_id, province)
    provinces: Vec<(i64, Province)>,
    /// (province_id, municipality)
    municipalities: Vec<(i64, Municipality)>,
    /// (municipality_id, barangay)
    barangays: Vec<(i64, Barangay)>,
    defaults: AddressDefaults,
    applications: HashMap<String, ApplicationEdit>,
    user: Mutex<Option<User>>,
    /// (username, password, user)
    accounts: Vec<(String, String, User)>,
    latency: HashMap<String, Duration>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl InProcessClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, id: i64, name: &str) -> Self {
        self.regions.push(Region {
            id,
            name: name.to_string(),
            description: String::new(),
        });
        self
    }

    pub fn with_province(mut self, region_id: i64, id: i64, name: &str) -> Self {
        self.provinces.push((
            region_id,
            Province {
                id,
                code: format!("P{id:03}"),
                name: name.to_string(),
            },
        ));
        self
    }

    pub fn with_municipality(mut self, province_id: i64, id: i64, name: &str) -> Self {
        self.municipalities.push((
            province_id,
            Municipality {
                id,
                code: format!("M{id:03}"),
                name: name.to_string(),
            },
        ));
        self
    }

    pub fn with_barangay(mut self, municipality_id: i64, id: i64, name: &str, zipcode: &str) -> Self {
        self.barangays.push((
            municipality_id,
            Barangay {
                id,
                name: name.to_string(),
                zipcode: zipcode.to_string(),
            },
        ));
        self
    }

    pub fn with_default_region(mut self, name: &str) -> Self {
        self.defaults.default_region = Some(name.to_string());
        self
    }

    pub fn with_application(mut self, id: &str, application: ApplicationEdit) -> Self {
        self.applications.insert(id.to_string(), application);
        self
    }

    /// Log `user` in; `/me` answers with it until `/logout`
    pub fn with_user(self, user: User) -> Self {
        *lock(&self.user) = Some(user);
        self
    }

    /// Register an account `/login` accepts
    pub fn with_account(mut self, password: &str, user: User) -> Self {
        self.accounts
            .push((user.username.clone(), password.to_string(), user));
        self
    }

    /// Delay every response for `path` (e.g. `"/provinces/2"`)
    pub fn with_latency(mut self, path: &str, delay: Duration) -> Self {
        self.latency.insert(path.to_string(), delay);
        self
    }

    /// Make `path` answer with HTTP 503 from now on
    pub fn fail_path(&self, path: &str) {
        lock(&self.failing).insert(path.to_string());
    }

    pub fn restore_path(&self, path: &str) {
        lock(&self.failing).remove(path);
    }

    /// Every path requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.as_str() == path).count()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// A small slice of Eastern Visayas, enough to walk every level.
    pub fn sample() -> Self {
        Self::new()
            .with_region(1, "Region VII")
            .with_region(2, "Region VIII")
            .with_province(1, 1, "Cebu")
            .with_province(2, 3, "Leyte")
            .with_province(2, 4, "Samar")
            .with_municipality(1, 1, "Cebu City")
            .with_municipality(3, 7, "Baybay City")
            .with_municipality(3, 8, "Abuyog")
            .with_municipality(4, 9, "Catbalogan City")
            .with_barangay(1, 10, "Lahug", "6000")
            .with_barangay(7, 1042, "Gaas", "6521")
            .with_barangay(7, 1043, "Guadalupe", "6521")
            .with_barangay(8, 1050, "Balinsasayao", "6510")
            .with_barangay(9, 1060, "Mercedes", "6700")
            .with_default_region("Region VIII")
    }

    async fn enter(&self, path: String) -> Result<()> {
        lock(&self.calls).push(path.clone());
        if let Some(delay) = self.latency.get(&path) {
            tokio::time::sleep(*delay).await;
        }
        if lock(&self.failing).contains(&path) {
            return Err(ClientError::Status {
                path,
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // Poisoning is ignored: no lock is held across a partial update.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn children<T: Clone>(rows: &[(i64, T)], parent_id: i64) -> Vec<T> {
    rows.iter()
        .filter(|(parent, _)| *parent == parent_id)
        .map(|(_, row)| row.clone())
        .collect()
}

#[async_trait]
impl AddressDirectory for InProcessClient {
    async fn list_regions(&self) -> Result<Vec<Region>> {
        self.enter("/regions".to_string()).await?;
        Ok(self.regions.clone())
    }

    async fn list_provinces(&self, region_id: i64) -> Result<Vec<Province>> {
        self.enter(format!("/provinces/{region_id}")).await?;
        Ok(children(&self.provinces, region_id))
    }

    async fn list_municipalities(&self, province_id: i64) -> Result<Vec<Municipality>> {
        self.enter(format!("/municipalities/{province_id}")).await?;
        Ok(children(&self.municipalities, province_id))
    }

    async fn list_barangays(&self, municipality_id: i64) -> Result<Vec<Barangay>> {
        self.enter(format!("/barangays/{municipality_id}")).await?;
        Ok(children(&self.barangays, municipality_id))
    }

    async fn get_barangay(&self, barangay_id: i64) -> Result<Option<BarangayRecord>> {
        self.enter(format!("/barangay/{barangay_id}")).await?;
        Ok(self
            .barangays
            .iter()
            .find(|(_, b)| b.id == barangay_id)
            .map(|(municipality_id, b)| BarangayRecord {
                id: b.id,
                name: b.name.clone(),
                zipcode: b.zipcode.clone(),
                municipality_id: *municipality_id,
            }))
    }

    async fn get_municipality(&self, municipality_id: i64) -> Result<Option<MunicipalityRecord>> {
        self.enter(format!("/municipality/{municipality_id}")).await?;
        Ok(self
            .municipalities
            .iter()
            .find(|(_, m)| m.id == municipality_id)
            .map(|(province_id, m)| MunicipalityRecord {
                id: m.id,
                name: m.name.clone(),
                province_id: *province_id,
            }))
    }

    async fn get_province(&self, province_id: i64) -> Result<Option<ProvinceRecord>> {
        self.enter(format!("/province/{province_id}")).await?;
        Ok(self
            .provinces
            .iter()
            .find(|(_, p)| p.id == province_id)
            .map(|(region_id, p)| ProvinceRecord {
                id: p.id,
                name: p.name.clone(),
                region_id: *region_id,
            }))
    }

    async fn get_region(&self, region_id: i64) -> Result<Option<RegionRecord>> {
        self.enter(format!("/region/{region_id}")).await?;
        Ok(self
            .regions
            .iter()
            .find(|r| r.id == region_id)
            .map(|r| RegionRecord {
                id: r.id,
                name: r.name.clone(),
            }))
    }

    async fn address_defaults(&self) -> Result<AddressDefaults> {
        self.enter("/addresses/defaults".to_string()).await?;
        Ok(self.defaults.clone())
    }
}

#[async_trait]
impl ApplicationSource for InProcessClient {
    async fn fetch_application_for_edit(&self, application_id: &str) -> Result<ApplicationEdit> {
        let path = format!("/applications/{application_id}/edit");
        self.enter(path.clone()).await?;
        self.applications
            .get(application_id)
            .cloned()
            .ok_or_else(|| ClientError::Status {
                path,
                status: 404,
                message: "Application not found".to_string(),
            })
    }
}

#[async_trait]
impl SessionApi for InProcessClient {
    async fn current_user(&self) -> Result<Option<User>> {
        self.enter("/me".to_string()).await?;
        Ok(lock(&self.user).clone())
    }

    async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.enter("/login".to_string()).await?;
        let account = self
            .accounts
            .iter()
            .find(|(name, secret, _)| name == username && secret == password);
        match account {
            Some((_, _, user)) => {
                *lock(&self.user) = Some(user.clone());
                Ok(())
            }
            None => Err(ClientError::Status {
                path: "/login".to_string(),
                status: 401,
                message: "Invalid username or password".to_string(),
            }),
        }
    }

    async fn logout(&self) -> Result<()> {
        self.enter("/logout".to_string()).await?;
        lock(&self.user).take();
        Ok(())
    }
}
