//! The three address groups of one application form.
//!
//! [`AddressForm`] owns a [`CascadeController`] per group, the two "same
//! as" flags and the screen-lifetime token every fetch hangs off. User
//! edits go through the form so a mirrored group cannot be changed behind
//! its toggle's back.

use ebpls_client::{cancellable, AddressDirectory, CancellationToken};
use ebpls_types::{ApplicationAddresses, Region};
use serde::{Deserialize, Serialize};

use super::cascade::{CascadeController, FetchOutcome, PendingFetch};
use super::mirror::set_mirror;
use super::preload::{preload_group, reconstruct_mirror_flags};
use super::selection::{AddressSelection, StreetDetails};
use super::{AddressGroup, AddressLevel};
use crate::error::AddressError;

type Result<T> = std::result::Result<T, AddressError>;

/// "Same as" toggles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorFlags {
    /// Main office copies the taxpayer address
    pub same_as_payer: bool,
    /// Business location copies the main office address
    pub same_as_main: bool,
}

impl MirrorFlags {
    /// Whether `group` is currently a mirror target
    pub fn locks(&self, group: AddressGroup) -> bool {
        match group {
            AddressGroup::Taxpayer => false,
            AddressGroup::MainOffice => self.same_as_payer,
            AddressGroup::BusinessLocation => self.same_as_main,
        }
    }
}

#[derive(Debug)]
pub struct AddressForm {
    taxpayer: CascadeController,
    main_office: CascadeController,
    location: CascadeController,
    mirror: MirrorFlags,
    screen: CancellationToken,
    edit: Option<CancellationToken>,
    is_loading: bool,
}

impl Default for AddressForm {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressForm {
    pub fn new() -> Self {
        let screen = CancellationToken::new();
        Self {
            taxpayer: CascadeController::new(AddressGroup::Taxpayer, &screen),
            main_office: CascadeController::new(AddressGroup::MainOffice, &screen),
            location: CascadeController::new(AddressGroup::BusinessLocation, &screen),
            mirror: MirrorFlags::default(),
            screen,
            edit: None,
            is_loading: false,
        }
    }

    pub fn controller(&self, group: AddressGroup) -> &CascadeController {
        match group {
            AddressGroup::Taxpayer => &self.taxpayer,
            AddressGroup::MainOffice => &self.main_office,
            AddressGroup::BusinessLocation => &self.location,
        }
    }

    fn controller_mut(&mut self, group: AddressGroup) -> &mut CascadeController {
        match group {
            AddressGroup::Taxpayer => &mut self.taxpayer,
            AddressGroup::MainOffice => &mut self.main_office,
            AddressGroup::BusinessLocation => &mut self.location,
        }
    }

    pub fn selection(&self, group: AddressGroup) -> &AddressSelection {
        self.controller(group).selection()
    }

    pub fn regions(&self) -> &[Region] {
        &self.taxpayer.cache().regions
    }

    pub fn mirror_flags(&self) -> MirrorFlags {
        self.mirror
    }

    /// True while regions load or a saved application is being replayed.
    /// Stays true after a failed reverse lookup; the screen is read-only
    /// until it is left.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn screen_token(&self) -> &CancellationToken {
        &self.screen
    }

    pub fn is_unmounted(&self) -> bool {
        self.screen.is_cancelled()
    }

    // =========================================================================
    // INITIAL LOAD
    // =========================================================================

    /// Load the region list into every group, then select the LGU's
    /// default region (matched by name) for the taxpayer and main office.
    pub async fn load_initial(&mut self, directory: &dyn AddressDirectory) -> Result<()> {
        self.is_loading = true;
        let result = self.load_initial_inner(directory).await;
        if !self.is_unmounted() {
            self.is_loading = false;
        }
        if let Err(e) = &result {
            if !e.is_cancelled() {
                tracing::warn!(error = %e, "Initial address load failed");
            }
        }
        result
    }

    async fn load_initial_inner(&mut self, directory: &dyn AddressDirectory) -> Result<()> {
        let ticket = self.taxpayer.load_regions();
        let outcome = ticket.run(directory).await;
        self.taxpayer
            .apply(&ticket, outcome, false)
            .map_err(|e| match e {
                AddressError::DirectoryFetch { source, .. } => AddressError::InitialLoad(source),
                other => other,
            })?;
        let regions = self.taxpayer.cache().regions.clone();
        for group in [AddressGroup::MainOffice, AddressGroup::BusinessLocation] {
            self.controller_mut(group).set_regions(regions.clone());
        }

        let defaults = cancellable(&self.screen, directory.address_defaults())
            .await
            .map_err(initial_load_error)?;
        let Some(default_region) = defaults
            .default_region
            .as_deref()
            .and_then(|name| regions.iter().find(|r| r.name == name))
        else {
            tracing::debug!(default = ?defaults.default_region, "No usable default region");
            return Ok(());
        };
        tracing::info!(region = %default_region.name, "Applying default region");

        let payer_ticket = self.taxpayer.on_region_change(Some(default_region.id), false)?;
        let main_ticket = self.main_office.on_region_change(Some(default_region.id), false)?;
        let (payer_outcome, main_outcome) =
            futures::join!(run(&payer_ticket, directory), run(&main_ticket, directory));

        let payer = settle(&mut self.taxpayer, payer_ticket, payer_outcome);
        let main = settle(&mut self.main_office, main_ticket, main_outcome);
        payer.and(main)
    }

    // =========================================================================
    // USER EDITS
    // =========================================================================

    /// Start a user change at `level` of `group`.
    ///
    /// Returns the fetch to run for the level below, if any; feed its
    /// outcome back through [`apply`](Self::apply). Barangay changes never
    /// fetch.
    pub fn change(
        &mut self,
        group: AddressGroup,
        level: AddressLevel,
        id: Option<i64>,
    ) -> Result<Option<PendingFetch>> {
        self.ensure_editable(group)?;
        let controller = self.controller_mut(group);
        match level {
            AddressLevel::Region => controller.on_region_change(id, false),
            AddressLevel::Province => controller.on_province_change(id, false),
            AddressLevel::Municipality => controller.on_municipality_change(id, false),
            AddressLevel::Barangay => controller.on_barangay_change(id).map(|()| None),
        }
    }

    pub fn apply(&mut self, ticket: &PendingFetch, outcome: FetchOutcome) -> Result<()> {
        self.controller_mut(ticket.group).apply(ticket, outcome, false)
    }

    /// [`change`](Self::change), run, [`apply`](Self::apply) in one go
    pub async fn select(
        &mut self,
        group: AddressGroup,
        level: AddressLevel,
        id: Option<i64>,
        directory: &dyn AddressDirectory,
    ) -> Result<()> {
        match self.change(group, level, id)? {
            Some(ticket) => {
                let outcome = ticket.run(directory).await;
                self.apply(&ticket, outcome)
            }
            None => Ok(()),
        }
    }

    pub fn set_details(&mut self, group: AddressGroup, details: StreetDetails) -> Result<()> {
        self.ensure_editable(group)?;
        self.controller_mut(group).set_details(details);
        Ok(())
    }

    fn ensure_editable(&self, group: AddressGroup) -> Result<()> {
        if self.mirror.locks(group) {
            return Err(AddressError::MirrorLocked { group });
        }
        Ok(())
    }

    // =========================================================================
    // MIRRORS
    // =========================================================================

    /// Toggle "Same as Taxpayer Address" on the main office group.
    /// The flag only ends up on if the copy succeeded.
    pub fn set_same_as_payer(&mut self, enabled: bool) -> Result<()> {
        let result = set_mirror(&self.taxpayer, &mut self.main_office, enabled);
        self.mirror.same_as_payer = enabled && result.is_ok();
        result
    }

    /// Toggle "Same as Main Office Address" on the business location group
    pub fn set_same_as_main(&mut self, enabled: bool) -> Result<()> {
        let result = set_mirror(&self.main_office, &mut self.location, enabled);
        self.mirror.same_as_main = enabled && result.is_ok();
        result
    }

    // =========================================================================
    // EDIT MODE
    // =========================================================================

    /// Token for a new edit request, superseding (cancelling) the previous one
    pub fn begin_edit(&mut self) -> CancellationToken {
        if let Some(previous) = self.edit.take() {
            previous.cancel();
        }
        let token = self.screen.child_token();
        self.edit = Some(token.clone());
        token
    }

    /// Replay a saved application's three addresses, then infer the mirror
    /// toggles from them. Groups with no stored address are left empty.
    pub async fn preload_application(
        &mut self,
        directory: &dyn AddressDirectory,
        addresses: &ApplicationAddresses,
        token: &CancellationToken,
    ) -> Result<MirrorFlags> {
        self.is_loading = true;
        self.mirror = MirrorFlags::default();

        let saved = [
            (AddressGroup::Taxpayer, addresses.payer.as_ref()),
            (AddressGroup::MainOffice, addresses.main_office.as_ref()),
            (AddressGroup::BusinessLocation, addresses.business_location.as_ref()),
        ];
        for (group, address) in saved {
            let controller = self.controller_mut(group);
            let Some(address) = address else {
                controller.reset();
                continue;
            };
            if let Err(e) = preload_group(controller, directory, address, token).await {
                // A failed lookup leaves the screen in its loading state
                if !matches!(e, AddressError::PreloadLookup { .. }) {
                    self.is_loading = false;
                }
                return Err(e);
            }
        }

        let flags = reconstruct_mirror_flags(
            addresses.payer.as_ref().map(|_| self.taxpayer.selection()),
            addresses.main_office.as_ref().map(|_| self.main_office.selection()),
            addresses.business_location.as_ref().map(|_| self.location.selection()),
        );
        self.mirror = flags;
        self.is_loading = false;
        tracing::info!(
            same_as_payer = flags.same_as_payer,
            same_as_main = flags.same_as_main,
            "Application addresses loaded"
        );
        Ok(flags)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Screen is going away: cancel everything still in flight
    pub fn unmount(&mut self) {
        self.screen.cancel();
        self.edit = None;
        for group in AddressGroup::ALL {
            self.controller_mut(group).cancel_all();
        }
    }

    /// Empty every group and toggle, keeping the region list
    pub fn clear(&mut self) {
        if let Some(edit) = self.edit.take() {
            edit.cancel();
        }
        for group in AddressGroup::ALL {
            self.controller_mut(group).reset();
        }
        self.mirror = MirrorFlags::default();
        self.is_loading = false;
    }
}

fn initial_load_error(e: ebpls_client::ClientError) -> AddressError {
    if e.is_cancelled() {
        AddressError::Cancelled
    } else {
        AddressError::InitialLoad(e)
    }
}

async fn run(ticket: &Option<PendingFetch>, directory: &dyn AddressDirectory) -> Option<FetchOutcome> {
    match ticket {
        Some(ticket) => Some(ticket.run(directory).await),
        None => None,
    }
}

fn settle(
    controller: &mut CascadeController,
    ticket: Option<PendingFetch>,
    outcome: Option<FetchOutcome>,
) -> Result<()> {
    match (ticket, outcome) {
        (Some(ticket), Some(outcome)) => controller.apply(&ticket, outcome, false),
        _ => Ok(()),
    }
}
