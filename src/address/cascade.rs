//! Cascade Controller
//!
//! Owns one address group's selection and option lists and keeps them
//! consistent with the directory. The cascade flows:
//! region → province → municipality → barangay
//!
//! A parent change is split into three steps so a UI loop can stay
//! responsive while the request is out:
//!
//! 1. `on_*_change` - synchronous transition; clears descendants and
//!    returns a [`PendingFetch`] ticket for the next level down
//! 2. [`PendingFetch::run`] - the request itself, racing its token
//! 3. [`CascadeController::apply`] - folds the outcome back in, dropping it
//!    if the ticket was superseded or cancelled in the meantime
//!
//! The `select_*` / `fetch_*` methods run all three in sequence.
//!
//! `suppress` is set only while replaying saved data (see
//! [`preload`](super::preload)): it keeps the transition from clearing
//! descendants that are about to be filled in programmatically.

use ebpls_client::{cancellable, AddressDirectory, CancellationToken, ClientError};
use ebpls_types::{Barangay, Municipality, Province, Region};

use super::selection::{AddressSelection, Choice, DirectoryCache, StreetDetails};
use super::{AddressGroup, AddressLevel};
use crate::error::AddressError;

type Result<T> = std::result::Result<T, AddressError>;

// =============================================================================
// FETCH TICKETS
// =============================================================================

/// A freshly fetched option list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildList {
    Regions(Vec<Region>),
    Provinces(Vec<Province>),
    Municipalities(Vec<Municipality>),
    Barangays(Vec<Barangay>),
}

impl ChildList {
    pub fn len(&self) -> usize {
        match self {
            Self::Regions(v) => v.len(),
            Self::Provinces(v) => v.len(),
            Self::Municipalities(v) => v.len(),
            Self::Barangays(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of running a [`PendingFetch`]
#[derive(Debug)]
pub enum FetchOutcome {
    Loaded(ChildList),
    Cancelled,
    Failed(ClientError),
}

/// An issued, not yet applied, option-list fetch
#[derive(Debug, Clone)]
pub struct PendingFetch {
    pub group: AddressGroup,
    /// Level whose option list is being fetched
    pub level: AddressLevel,
    /// Selected id one level up
    pub parent_id: i64,
    generation: u64,
    token: CancellationToken,
}

impl PendingFetch {
    /// Issue the request. Never touches controller state.
    pub async fn run(&self, directory: &dyn AddressDirectory) -> FetchOutcome {
        tracing::debug!(
            group = %self.group,
            level = %self.level,
            parent_id = self.parent_id,
            "Fetching options"
        );

        let result = match self.level {
            AddressLevel::Region => cancellable(&self.token, directory.list_regions())
                .await
                .map(ChildList::Regions),
            AddressLevel::Province => {
                cancellable(&self.token, directory.list_provinces(self.parent_id))
                    .await
                    .map(ChildList::Provinces)
            }
            AddressLevel::Municipality => {
                cancellable(&self.token, directory.list_municipalities(self.parent_id))
                    .await
                    .map(ChildList::Municipalities)
            }
            AddressLevel::Barangay => {
                cancellable(&self.token, directory.list_barangays(self.parent_id))
                    .await
                    .map(ChildList::Barangays)
            }
        };

        match result {
            Ok(list) => FetchOutcome::Loaded(list),
            Err(ClientError::Cancelled) => FetchOutcome::Cancelled,
            Err(e) => FetchOutcome::Failed(e),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// The fetch currently allowed to write a level's option list
#[derive(Debug)]
struct InFlight {
    generation: u64,
    token: CancellationToken,
}

// =============================================================================
// CONTROLLER
// =============================================================================

#[derive(Debug)]
pub struct CascadeController {
    group: AddressGroup,
    selection: AddressSelection,
    cache: DirectoryCache,
    /// Indexed by level depth
    in_flight: [Option<InFlight>; 4],
    next_generation: u64,
    /// Parent of every fetch token (screen lifetime)
    scope: CancellationToken,
}

impl CascadeController {
    pub fn new(group: AddressGroup, scope: &CancellationToken) -> Self {
        Self {
            group,
            selection: AddressSelection::default(),
            cache: DirectoryCache::default(),
            in_flight: Default::default(),
            next_generation: 0,
            scope: scope.clone(),
        }
    }

    pub fn group(&self) -> AddressGroup {
        self.group
    }

    pub fn selection(&self) -> &AddressSelection {
        &self.selection
    }

    pub fn cache(&self) -> &DirectoryCache {
        &self.cache
    }

    /// Whether a fetch for `level`'s option list is outstanding
    pub fn is_fetching(&self, level: AddressLevel) -> bool {
        self.in_flight[level.depth()].is_some()
    }

    pub fn set_regions(&mut self, regions: Vec<Region>) {
        self.cache.regions = regions;
    }

    pub fn set_details(&mut self, details: StreetDetails) {
        self.selection.details = details;
    }

    pub(crate) fn set_zipcode(&mut self, zipcode: String) {
        self.selection.zipcode = zipcode;
    }

    /// Ticket for (re)loading the region list. Applying it without
    /// `suppress` empties the selection, like any other list arrival.
    pub fn load_regions(&mut self) -> PendingFetch {
        self.cancel_from(AddressLevel::Region);
        self.issue(AddressLevel::Region, 0, None)
    }

    // ── user-driven transitions ──────────────────────────────────

    pub fn on_region_change(
        &mut self,
        region_id: Option<i64>,
        suppress: bool,
    ) -> Result<Option<PendingFetch>> {
        self.on_parent_change(AddressLevel::Region, region_id, suppress)
    }

    pub fn on_province_change(
        &mut self,
        province_id: Option<i64>,
        suppress: bool,
    ) -> Result<Option<PendingFetch>> {
        self.on_parent_change(AddressLevel::Province, province_id, suppress)
    }

    pub fn on_municipality_change(
        &mut self,
        municipality_id: Option<i64>,
        suppress: bool,
    ) -> Result<Option<PendingFetch>> {
        self.on_parent_change(AddressLevel::Municipality, municipality_id, suppress)
    }

    /// Select a barangay from the already-fetched list. No network.
    pub fn on_barangay_change(&mut self, barangay_id: Option<i64>) -> Result<()> {
        let level = AddressLevel::Barangay;
        if self.selection.path.id(level) == barangay_id {
            return Ok(());
        }

        let Some(id) = barangay_id else {
            self.selection.clear_from(level);
            return Ok(());
        };

        let barangay = self
            .cache
            .barangay(id)
            .cloned()
            .ok_or(AddressError::UnknownOption {
                group: self.group,
                level,
                id,
            })?;

        if !self
            .selection
            .path
            .set(level, Choice::new(barangay.id, barangay.name), false)
        {
            return Err(AddressError::UnknownOption {
                group: self.group,
                level,
                id,
            });
        }
        self.selection.zipcode = barangay.zipcode;
        Ok(())
    }

    /// Generic parent-level transition for region, province, municipality.
    /// `level` must have a child.
    fn on_parent_change(
        &mut self,
        level: AddressLevel,
        id: Option<i64>,
        suppress: bool,
    ) -> Result<Option<PendingFetch>> {
        if self.selection.path.id(level) == id {
            return Ok(None);
        }

        let Some(id) = id else {
            // Placeholder selected: clear everything below, nothing to fetch
            self.selection.clear_from(level);
            if let Some(child) = level.child() {
                self.cancel_from(child);
                self.cache.clear_lists_from(child);
            }
            return Ok(None);
        };

        let name = self
            .cache
            .name_of(level, id)
            .map(str::to_string)
            .ok_or(AddressError::UnknownOption {
                group: self.group,
                level,
                id,
            })?;

        self.choose(level, Choice::new(id, name), suppress)?;
        Ok(level.child().map(|child| {
            self.cancel_from(child);
            self.issue(child, id, None)
        }))
    }

    /// Set `choice` at `level`; unless `suppress`, drop everything below it.
    fn choose(&mut self, level: AddressLevel, choice: Choice, suppress: bool) -> Result<()> {
        let id = choice.id;
        if !self.selection.path.set(level, choice, suppress) {
            return Err(AddressError::UnknownOption {
                group: self.group,
                level,
                id,
            });
        }

        if !suppress {
            self.selection.zipcode.clear();
            if let Some(child) = level.child() {
                self.cache.clear_lists_from(child);
            }
        }
        Ok(())
    }

    // ── fetch lifecycle ──────────────────────────────────────────

    /// Register a new fetch for `level`, cancelling the one it supersedes
    fn issue(
        &mut self,
        level: AddressLevel,
        parent_id: i64,
        within: Option<&CancellationToken>,
    ) -> PendingFetch {
        let slot = &mut self.in_flight[level.depth()];
        if let Some(previous) = slot.take() {
            previous.token.cancel();
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let token = within.unwrap_or(&self.scope).child_token();
        *slot = Some(InFlight {
            generation,
            token: token.clone(),
        });

        PendingFetch {
            group: self.group,
            level,
            parent_id,
            generation,
            token,
        }
    }

    /// Cancel outstanding fetches for `level` and every level below
    fn cancel_from(&mut self, level: AddressLevel) {
        for slot in &mut self.in_flight[level.depth()..] {
            if let Some(in_flight) = slot.take() {
                in_flight.token.cancel();
            }
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel_from(AddressLevel::Region);
    }

    /// Fold a fetch outcome back into the controller.
    ///
    /// Cancelled or superseded tickets leave state untouched and yield
    /// [`AddressError::Cancelled`]; failures leave state untouched and
    /// yield [`AddressError::DirectoryFetch`].
    pub fn apply(
        &mut self,
        ticket: &PendingFetch,
        outcome: FetchOutcome,
        suppress: bool,
    ) -> Result<()> {
        let depth = ticket.level.depth();
        let current = self.in_flight[depth]
            .as_ref()
            .is_some_and(|f| f.generation == ticket.generation);
        if !current {
            tracing::debug!(group = %self.group, level = %ticket.level, "Dropping stale fetch");
            return Err(AddressError::Cancelled);
        }
        self.in_flight[depth] = None;
        if ticket.is_cancelled() {
            tracing::debug!(group = %self.group, level = %ticket.level, "Dropping cancelled fetch");
            return Err(AddressError::Cancelled);
        }

        let list = match outcome {
            FetchOutcome::Loaded(list) => list,
            FetchOutcome::Cancelled => return Err(AddressError::Cancelled),
            FetchOutcome::Failed(e) => {
                tracing::warn!(
                    group = %self.group,
                    level = %ticket.level,
                    parent_id = ticket.parent_id,
                    error = %e,
                    "Option fetch failed"
                );
                return Err(AddressError::from_client(self.group, ticket.level, e));
            }
        };

        tracing::debug!(
            group = %self.group,
            level = %ticket.level,
            count = list.len(),
            "Options loaded"
        );

        match list {
            ChildList::Regions(v) => self.cache.regions = v,
            ChildList::Provinces(v) => self.cache.provinces = v,
            ChildList::Municipalities(v) => self.cache.municipalities = v,
            ChildList::Barangays(v) => self.cache.barangays = v,
        }

        if !suppress {
            self.selection.clear_from(ticket.level);
            if let Some(grandchild) = ticket.level.child() {
                self.cache.clear_lists_from(grandchild);
            }
        }
        Ok(())
    }

    // ── sequential conveniences ──────────────────────────────────

    async fn settle(
        &mut self,
        directory: &dyn AddressDirectory,
        ticket: Option<PendingFetch>,
        suppress: bool,
    ) -> Result<()> {
        match ticket {
            Some(ticket) => {
                let outcome = ticket.run(directory).await;
                self.apply(&ticket, outcome, suppress)
            }
            None => Ok(()),
        }
    }

    pub async fn select_region(
        &mut self,
        directory: &dyn AddressDirectory,
        region_id: Option<i64>,
        suppress: bool,
    ) -> Result<()> {
        let ticket = self.on_region_change(region_id, suppress)?;
        self.settle(directory, ticket, suppress).await
    }

    pub async fn select_province(
        &mut self,
        directory: &dyn AddressDirectory,
        province_id: Option<i64>,
        suppress: bool,
    ) -> Result<()> {
        let ticket = self.on_province_change(province_id, suppress)?;
        self.settle(directory, ticket, suppress).await
    }

    pub async fn select_municipality(
        &mut self,
        directory: &dyn AddressDirectory,
        municipality_id: Option<i64>,
        suppress: bool,
    ) -> Result<()> {
        let ticket = self.on_municipality_change(municipality_id, suppress)?;
        self.settle(directory, ticket, suppress).await
    }

    pub async fn fetch_provinces(
        &mut self,
        directory: &dyn AddressDirectory,
        region_id: i64,
        suppress: bool,
    ) -> Result<()> {
        let ticket = self.issue(AddressLevel::Province, region_id, None);
        self.settle(directory, Some(ticket), suppress).await
    }

    pub async fn fetch_municipalities(
        &mut self,
        directory: &dyn AddressDirectory,
        province_id: i64,
        suppress: bool,
    ) -> Result<()> {
        let ticket = self.issue(AddressLevel::Municipality, province_id, None);
        self.settle(directory, Some(ticket), suppress).await
    }

    pub async fn fetch_barangays(
        &mut self,
        directory: &dyn AddressDirectory,
        municipality_id: i64,
        suppress: bool,
    ) -> Result<()> {
        let ticket = self.issue(AddressLevel::Barangay, municipality_id, None);
        self.settle(directory, Some(ticket), suppress).await
    }

    /// Set `choice` at `level` and load the level below under `token`,
    /// without clearing anything. Used to replay saved data.
    pub(crate) async fn replay(
        &mut self,
        directory: &dyn AddressDirectory,
        level: AddressLevel,
        choice: Choice,
        token: &CancellationToken,
    ) -> Result<()> {
        let id = choice.id;
        self.choose(level, choice, true)?;
        match level.child() {
            Some(child) => {
                let ticket = self.issue(child, id, Some(token));
                self.settle(directory, Some(ticket), true).await
            }
            None => Ok(()),
        }
    }

    // ── whole-group operations (mirror, reset) ───────────────────

    /// Drop selection and option lists below the region list
    pub fn reset(&mut self) {
        self.cancel_all();
        self.selection.clear();
        self.cache.clear_lists_from(AddressLevel::Province);
    }

    /// Overwrite selection and child option lists with a copy of `other`'s
    pub(crate) fn copy_from(&mut self, selection: &AddressSelection, cache: &DirectoryCache) {
        self.cancel_all();
        self.selection = selection.clone();
        self.cache.provinces = cache.provinces.clone();
        self.cache.municipalities = cache.municipalities.clone();
        self.cache.barangays = cache.barangays.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebpls_client::InProcessClient;
    use std::time::Duration;

    fn controller(dir_regions: Vec<Region>) -> CascadeController {
        let mut c = CascadeController::new(AddressGroup::Taxpayer, &CancellationToken::new());
        c.set_regions(dir_regions);
        c
    }

    async fn regions(dir: &InProcessClient) -> Vec<Region> {
        dir.list_regions().await.unwrap()
    }

    async fn filled(dir: &InProcessClient) -> CascadeController {
        let mut c = controller(regions(dir).await);
        c.select_region(dir, Some(2), false).await.unwrap();
        c.select_province(dir, Some(3), false).await.unwrap();
        c.select_municipality(dir, Some(7), false).await.unwrap();
        c.on_barangay_change(Some(1042)).unwrap();
        c
    }

    #[tokio::test]
    async fn region_change_fetches_provinces_and_leaves_lower_levels_empty() {
        let dir = InProcessClient::sample();
        let mut c = controller(regions(&dir).await);

        c.select_region(&dir, Some(2), false).await.unwrap();

        let names: Vec<_> = c.cache().provinces.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Leyte", "Samar"]);
        assert_eq!(c.selection().region().unwrap().name, "Region VIII");
        assert!(c.selection().province().is_none());
        assert!(c.cache().municipalities.is_empty());
        assert!(c.cache().barangays.is_empty());
    }

    #[tokio::test]
    async fn province_change_clears_descendants_and_their_lists() {
        let dir = InProcessClient::sample();
        let mut c = filled(&dir).await;
        assert_eq!(c.selection().zipcode, "6521");

        c.select_province(&dir, Some(4), false).await.unwrap();

        assert_eq!(c.selection().province().unwrap().name, "Samar");
        assert!(c.selection().municipality().is_none());
        assert!(c.selection().barangay().is_none());
        assert_eq!(c.selection().zipcode, "");
        let names: Vec<_> = c
            .cache()
            .municipalities
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["Catbalogan City"]);
        assert!(c.cache().barangays.is_empty());
        assert_eq!(dir.call_count("/municipalities/4"), 1);
    }

    #[tokio::test]
    async fn same_value_is_a_no_op() {
        let dir = InProcessClient::sample();
        let mut c = filled(&dir).await;
        dir.clear_calls();

        assert!(c.on_region_change(Some(2), false).unwrap().is_none());
        assert!(c.on_province_change(Some(3), false).unwrap().is_none());
        c.on_barangay_change(Some(1042)).unwrap();

        assert!(dir.calls().is_empty());
        assert!(c.selection().is_complete());
    }

    #[tokio::test]
    async fn placeholder_clears_without_fetching() {
        let dir = InProcessClient::sample();
        let mut c = filled(&dir).await;
        dir.clear_calls();

        let ticket = c.on_province_change(None, false).unwrap();

        assert!(ticket.is_none());
        assert!(dir.calls().is_empty());
        assert_eq!(c.selection().region().unwrap().id, 2);
        assert!(c.selection().province().is_none());
        assert_eq!(c.cache().provinces.len(), 2);
        assert!(c.cache().municipalities.is_empty());
        assert!(c.cache().barangays.is_empty());
    }

    #[tokio::test]
    async fn barangay_change_uses_cached_zipcode() {
        let dir = InProcessClient::sample();
        let mut c = filled(&dir).await;
        dir.clear_calls();

        c.on_barangay_change(Some(1043)).unwrap();

        assert_eq!(c.selection().barangay().unwrap().name, "Guadalupe");
        assert_eq!(c.selection().zipcode, "6521");
        assert!(dir.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_option_is_rejected() {
        let dir = InProcessClient::sample();
        let mut c = controller(regions(&dir).await);
        let err = c.on_region_change(Some(99), false).unwrap_err();
        assert!(matches!(
            err,
            AddressError::UnknownOption {
                level: AddressLevel::Region,
                id: 99,
                ..
            }
        ));
        assert!(c.selection().path.is_empty());
    }

    #[tokio::test]
    async fn newer_change_supersedes_in_flight_fetch() {
        let dir = InProcessClient::sample().with_latency("/provinces/1", Duration::from_millis(200));
        let mut c = controller(regions(&dir).await);

        let slow = c.on_region_change(Some(1), false).unwrap().unwrap();
        let fast = c.on_region_change(Some(2), false).unwrap().unwrap();
        assert!(slow.is_cancelled());

        let (slow_outcome, fast_outcome) = futures::join!(slow.run(&dir), fast.run(&dir));
        assert!(matches!(slow_outcome, FetchOutcome::Cancelled));

        c.apply(&fast, fast_outcome, false).unwrap();
        let err = c.apply(&slow, slow_outcome, false).unwrap_err();
        assert!(err.is_cancelled());

        let names: Vec<_> = c.cache().provinces.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Leyte", "Samar"]);
        assert_eq!(c.selection().region().unwrap().id, 2);
    }

    #[tokio::test]
    async fn stale_loaded_outcome_is_dropped() {
        let dir = InProcessClient::sample();
        let mut c = controller(regions(&dir).await);

        let first = c.on_region_change(Some(1), false).unwrap().unwrap();
        // The response arrived before the cancellation was observed
        let first_outcome = FetchOutcome::Loaded(ChildList::Provinces(
            dir.list_provinces(1).await.unwrap(),
        ));
        let second = c.on_region_change(Some(2), false).unwrap().unwrap();
        let second_outcome = second.run(&dir).await;
        c.apply(&second, second_outcome, false).unwrap();

        let before = c.cache().clone();
        assert!(c.apply(&first, first_outcome, false).unwrap_err().is_cancelled());
        assert_eq!(c.cache(), &before);
    }

    #[tokio::test]
    async fn failed_fetch_preserves_state() {
        let dir = InProcessClient::sample();
        let mut c = filled(&dir).await;
        let before_selection = c.selection().clone();
        let before_cache = c.cache().clone();
        dir.fail_path("/barangays/7");

        let ticket = c.issue(AddressLevel::Barangay, 7, None);
        let outcome = ticket.run(&dir).await;
        let err = c.apply(&ticket, outcome, false).unwrap_err();

        assert!(matches!(
            err,
            AddressError::DirectoryFetch {
                group: AddressGroup::Taxpayer,
                level: AddressLevel::Barangay,
                ..
            }
        ));
        assert_eq!(c.selection(), &before_selection);
        assert_eq!(c.cache(), &before_cache);
    }

    #[tokio::test]
    async fn suppress_keeps_descendants_on_refetch() {
        let dir = InProcessClient::sample();
        let mut c = filled(&dir).await;

        c.fetch_provinces(&dir, 2, true).await.unwrap();
        assert!(c.selection().is_complete());
        assert_eq!(c.cache().municipalities.len(), 2);

        c.fetch_provinces(&dir, 2, false).await.unwrap();
        assert!(c.selection().province().is_none());
        assert!(c.cache().municipalities.is_empty());
        assert_eq!(c.selection().region().unwrap().id, 2);
    }

    #[tokio::test]
    async fn scope_cancellation_reaches_pending_fetches() {
        let scope = CancellationToken::new();
        let dir = InProcessClient::sample().with_latency("/provinces/2", Duration::from_millis(200));
        let mut c = CascadeController::new(AddressGroup::MainOffice, &scope);
        c.set_regions(dir.list_regions().await.unwrap());

        let ticket = c.on_region_change(Some(2), false).unwrap().unwrap();
        scope.cancel();
        let outcome = ticket.run(&dir).await;
        assert!(c.is_fetching(AddressLevel::Province));

        assert!(matches!(outcome, FetchOutcome::Cancelled));
        assert!(c.apply(&ticket, outcome, false).unwrap_err().is_cancelled());
        assert!(c.cache().provinces.is_empty());
        assert!(!c.is_fetching(AddressLevel::Province));
    }

    #[tokio::test]
    async fn cancelled_current_ticket_frees_its_slot() {
        let dir = InProcessClient::sample();
        let mut c = controller(regions(&dir).await);

        let ticket = c.on_region_change(Some(2), false).unwrap().unwrap();
        // Cancelled after the response was already in hand
        let outcome = ticket.run(&dir).await;
        ticket.cancel();

        assert!(c.apply(&ticket, outcome, false).unwrap_err().is_cancelled());
        assert!(!c.is_fetching(AddressLevel::Province));
        assert!(c.cache().provinces.is_empty());
    }

    #[tokio::test]
    async fn region_list_loads_through_a_ticket() {
        let dir = InProcessClient::sample();
        let mut c = controller(Vec::new());

        let ticket = c.load_regions();
        assert_eq!(ticket.level, AddressLevel::Region);
        assert!(c.is_fetching(AddressLevel::Region));
        let outcome = ticket.run(&dir).await;
        c.apply(&ticket, outcome, false).unwrap();

        assert!(!c.is_fetching(AddressLevel::Region));
        assert_eq!(c.cache().regions.len(), 2);
        assert_eq!(dir.call_count("/regions"), 1);

        let first = c.load_regions();
        let second = c.load_regions();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }
}
