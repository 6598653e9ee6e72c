//! Edit-Mode Preloader
//!
//! A saved address only stores its barangay id. To show it in the form we
//! walk the directory upward (barangay → municipality → province → region)
//! and then replay the cascade downward with `suppress` set, so each level
//! lands with its option list loaded and nothing below it gets wiped.
//!
//! Every step shares one cancellation token. A cancelled token ends the
//! walk with [`AddressError::Cancelled`], which callers treat as silent.
//! A missing record aborts with [`AddressError::PreloadLookup`]; whatever
//! the replay already set stays set.

use ebpls_client::{cancellable, AddressDirectory, CancellationToken};
use ebpls_types::{BarangayRecord, MunicipalityRecord, ProvinceRecord, RegionRecord, SavedAddress};

use super::cascade::CascadeController;
use super::form::MirrorFlags;
use super::mirror::addresses_match;
use super::selection::{AddressSelection, Choice, StreetDetails};
use super::{AddressGroup, AddressLevel};
use crate::error::AddressError;

type Result<T> = std::result::Result<T, AddressError>;

/// The four directory records above (and including) a barangay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChain {
    pub region: RegionRecord,
    pub province: ProvinceRecord,
    pub municipality: MunicipalityRecord,
    pub barangay: BarangayRecord,
}

/// Reverse-lookup the parent chain of `barangay_id`, one request at a time.
pub async fn resolve_chain(
    directory: &dyn AddressDirectory,
    group: AddressGroup,
    barangay_id: i64,
    token: &CancellationToken,
) -> Result<ResolvedChain> {
    let barangay = lookup(
        group,
        AddressLevel::Barangay,
        barangay_id,
        cancellable(token, directory.get_barangay(barangay_id)).await,
    )?;
    let municipality = lookup(
        group,
        AddressLevel::Municipality,
        barangay.municipality_id,
        cancellable(token, directory.get_municipality(barangay.municipality_id)).await,
    )?;
    let province = lookup(
        group,
        AddressLevel::Province,
        municipality.province_id,
        cancellable(token, directory.get_province(municipality.province_id)).await,
    )?;
    let region = lookup(
        group,
        AddressLevel::Region,
        province.region_id,
        cancellable(token, directory.get_region(province.region_id)).await,
    )?;

    Ok(ResolvedChain {
        region,
        province,
        municipality,
        barangay,
    })
}

fn lookup<T>(
    group: AddressGroup,
    level: AddressLevel,
    id: i64,
    result: ebpls_client::Result<Option<T>>,
) -> Result<T> {
    match result {
        Ok(Some(record)) => Ok(record),
        Ok(None) => {
            tracing::warn!(group = %group, level = %level, id, "Preload lookup found no record");
            Err(AddressError::PreloadLookup { group, level, id })
        }
        Err(e) => Err(AddressError::from_client(group, level, e)),
    }
}

/// Rebuild `controller`'s selection from a stored address.
///
/// The group is cleared once the chain resolves, then each level is set
/// and its child list fetched. The free-text lines are applied last, and
/// only if the token is still live.
pub async fn preload_group(
    controller: &mut CascadeController,
    directory: &dyn AddressDirectory,
    saved: &SavedAddress,
    token: &CancellationToken,
) -> Result<()> {
    let group = controller.group();
    let chain = resolve_chain(directory, group, saved.barangay_id, token).await?;

    controller.reset();
    controller
        .replay(
            directory,
            AddressLevel::Region,
            Choice::new(chain.region.id, chain.region.name.clone()),
            token,
        )
        .await?;
    controller
        .replay(
            directory,
            AddressLevel::Province,
            Choice::new(chain.province.id, chain.province.name.clone()),
            token,
        )
        .await?;
    controller
        .replay(
            directory,
            AddressLevel::Municipality,
            Choice::new(chain.municipality.id, chain.municipality.name.clone()),
            token,
        )
        .await?;
    controller
        .replay(
            directory,
            AddressLevel::Barangay,
            Choice::new(chain.barangay.id, chain.barangay.name.clone()),
            token,
        )
        .await?;

    if token.is_cancelled() {
        return Err(AddressError::Cancelled);
    }
    controller.set_zipcode(chain.barangay.zipcode.clone());
    controller.set_details(StreetDetails::from(saved));

    tracing::info!(
        group = %group,
        barangay_id = saved.barangay_id,
        municipality_id = chain.municipality.id,
        province_id = chain.province.id,
        region_id = chain.region.id,
        "Address preloaded"
    );
    Ok(())
}

/// Infer the "same as" toggles from three preloaded selections.
///
/// A group that was not preloaded never matches.
pub fn reconstruct_mirror_flags(
    payer: Option<&AddressSelection>,
    main_office: Option<&AddressSelection>,
    location: Option<&AddressSelection>,
) -> MirrorFlags {
    let same = |a: Option<&AddressSelection>, b: Option<&AddressSelection>| match (a, b) {
        (Some(a), Some(b)) => addresses_match(a, b),
        _ => false,
    };
    MirrorFlags {
        same_as_payer: same(payer, main_office),
        same_as_main: same(main_office, location),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebpls_client::InProcessClient;
    use std::time::Duration;

    fn saved(barangay_id: i64) -> SavedAddress {
        SavedAddress {
            barangay_id,
            street: "Rizal St".into(),
            subdivision: "Villa Azul".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn chain_walks_up_to_the_region() {
        let dir = InProcessClient::sample();
        let chain = resolve_chain(&dir, AddressGroup::Taxpayer, 1042, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(chain.barangay.municipality_id, 7);
        assert_eq!(chain.municipality.province_id, 3);
        assert_eq!(chain.province.region_id, 2);
        assert_eq!(chain.region.name, "Region VIII");
        assert_eq!(
            dir.calls(),
            vec!["/barangay/1042", "/municipality/7", "/province/3", "/region/2"]
        );
    }

    #[tokio::test]
    async fn missing_barangay_is_a_lookup_error() {
        let dir = InProcessClient::sample();
        let err = resolve_chain(&dir, AddressGroup::MainOffice, 9999, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AddressError::PreloadLookup {
                group: AddressGroup::MainOffice,
                level: AddressLevel::Barangay,
                id: 9999
            }
        ));
        assert_eq!(dir.calls(), vec!["/barangay/9999"]);
    }

    #[tokio::test]
    async fn transport_failure_names_the_level() {
        let dir = InProcessClient::sample();
        dir.fail_path("/province/3");
        let err = resolve_chain(&dir, AddressGroup::Taxpayer, 1042, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AddressError::DirectoryFetch {
                level: AddressLevel::Province,
                ..
            }
        ));
        assert!(!dir.calls().contains(&"/region/2".to_string()));
    }

    #[tokio::test]
    async fn preload_fills_all_levels_and_lists() {
        let dir = InProcessClient::sample();
        let scope = CancellationToken::new();
        let mut c = CascadeController::new(AddressGroup::Taxpayer, &scope);
        c.set_regions(dir.list_regions().await.unwrap());

        preload_group(&mut c, &dir, &saved(1042), &scope.child_token())
            .await
            .unwrap();

        let s = c.selection();
        assert_eq!(s.region().unwrap().id, 2);
        assert_eq!(s.province().unwrap().name, "Leyte");
        assert_eq!(s.municipality().unwrap().name, "Baybay City");
        assert_eq!(s.barangay().unwrap().name, "Gaas");
        assert_eq!(s.zipcode, "6521");
        assert_eq!(s.details.street, "Rizal St");
        assert_eq!(s.to_saved().unwrap(), saved(1042));

        assert_eq!(c.cache().provinces.len(), 2);
        assert_eq!(c.cache().municipalities.len(), 2);
        assert_eq!(c.cache().barangays.len(), 2);
        assert_eq!(c.cache().regions.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_preload_is_silent_and_skips_remaining_steps() {
        let dir = InProcessClient::sample().with_latency("/municipality/7", Duration::from_millis(200));
        let scope = CancellationToken::new();
        let mut c = CascadeController::new(AddressGroup::BusinessLocation, &scope);
        let token = scope.child_token();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = preload_group(&mut c, &dir, &saved(1042), &token).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(err.alert().is_none());
        assert!(c.selection().path.is_empty());
        assert_eq!(dir.call_count("/province/3"), 0);
    }

    #[tokio::test]
    async fn lookup_failure_leaves_group_untouched() {
        let dir = InProcessClient::sample();
        let scope = CancellationToken::new();
        let mut c = CascadeController::new(AddressGroup::Taxpayer, &scope);
        c.set_regions(dir.list_regions().await.unwrap());
        c.select_region(&dir, Some(1), false).await.unwrap();

        let err = preload_group(&mut c, &dir, &saved(4242), &scope).await.unwrap_err();

        assert!(matches!(err, AddressError::PreloadLookup { .. }));
        assert_eq!(c.selection().region().unwrap().id, 1);
    }

    #[tokio::test]
    async fn replay_failure_keeps_partial_state() {
        let dir = InProcessClient::sample();
        dir.fail_path("/barangays/7");
        let scope = CancellationToken::new();
        let mut c = CascadeController::new(AddressGroup::Taxpayer, &scope);
        c.set_regions(dir.list_regions().await.unwrap());

        let err = preload_group(&mut c, &dir, &saved(1042), &scope.child_token())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AddressError::DirectoryFetch {
                group: AddressGroup::Taxpayer,
                level: AddressLevel::Barangay,
                ..
            }
        ));
        let s = c.selection();
        assert_eq!(s.path.len(), 3);
        assert_eq!(s.municipality().unwrap().name, "Baybay City");
        assert!(s.barangay().is_none());
        assert_eq!(s.details, StreetDetails::default());
        assert_eq!(c.cache().municipalities.len(), 2);
        assert!(c.cache().barangays.is_empty());
    }

    #[test]
    fn mirror_flags_from_pairwise_matches() {
        let mut payer = AddressSelection::default();
        payer.path.set(AddressLevel::Region, Choice::new(2, "Region VIII"), false);
        payer.path.set(AddressLevel::Province, Choice::new(3, "Leyte"), false);
        payer.path.set(AddressLevel::Municipality, Choice::new(7, "Baybay City"), false);
        payer.path.set(AddressLevel::Barangay, Choice::new(1042, "Gaas"), false);
        payer.details.street = "Rizal St".into();

        let main = payer.clone();
        let mut location = payer.clone();
        location.details.street = "Magsaysay Ave".into();

        let flags = reconstruct_mirror_flags(Some(&payer), Some(&main), Some(&location));
        assert!(flags.same_as_payer);
        assert!(!flags.same_as_main);

        let flags = reconstruct_mirror_flags(Some(&payer), None, Some(&payer));
        assert_eq!(flags, MirrorFlags::default());
    }
}
