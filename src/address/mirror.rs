//! Group Mirror - "Same as Taxpayer" / "Same as Main Office"
//!
//! Enabling a mirror is a one-time value copy: later edits to the source
//! do not propagate. Disabling wipes the target and its option lists
//! without re-fetching them, so its dropdowns stay empty until a region
//! is picked again.

use super::cascade::CascadeController;
use super::selection::AddressSelection;
use crate::error::AddressError;

/// Turn the mirror from `source` into `target` on or off.
///
/// Enabling requires all four levels of `source` to be selected; otherwise
/// `target` is left exactly as it was and [`AddressError::IncompleteSource`]
/// is returned (the caller keeps the flag off).
pub fn set_mirror(
    source: &CascadeController,
    target: &mut CascadeController,
    enabled: bool,
) -> Result<(), AddressError> {
    if !enabled {
        tracing::debug!(target_group = %target.group(), "Mirror disabled, clearing target");
        target.reset();
        return Ok(());
    }

    if !source.selection().is_complete() {
        return Err(AddressError::IncompleteSource {
            source_group: source.group(),
            target: target.group(),
        });
    }

    target.copy_from(source.selection(), source.cache());
    tracing::info!(
        source_group = %source.group(),
        target_group = %target.group(),
        barangay_id = source.selection().barangay_id(),
        "Address copied"
    );
    Ok(())
}

/// Same barangay and same six free-text lines.
///
/// Region/province/municipality are implied by the barangay, and the
/// zipcode hangs off it, so they are not compared.
pub fn addresses_match(a: &AddressSelection, b: &AddressSelection) -> bool {
    a.barangay_id() == b.barangay_id() && a.details == b.details
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::selection::StreetDetails;
    use crate::address::{AddressGroup, AddressLevel};
    use ebpls_client::{AddressDirectory, CancellationToken, InProcessClient};
    use proptest::prelude::*;

    async fn taxpayer(dir: &InProcessClient, scope: &CancellationToken) -> CascadeController {
        let mut c = CascadeController::new(AddressGroup::Taxpayer, scope);
        c.set_regions(dir.list_regions().await.unwrap());
        c.select_region(dir, Some(2), false).await.unwrap();
        c.select_province(dir, Some(3), false).await.unwrap();
        c.select_municipality(dir, Some(7), false).await.unwrap();
        c.on_barangay_change(Some(1042)).unwrap();
        c.set_details(StreetDetails {
            unit_number: "2F".into(),
            building_name: "Rosario Bldg".into(),
            lot_number: "12".into(),
            block_number: "4".into(),
            street: "Rizal St".into(),
            subdivision: "Villa Azul".into(),
        });
        c
    }

    #[tokio::test]
    async fn enable_copies_everything_without_fetching() {
        let dir = InProcessClient::sample();
        let scope = CancellationToken::new();
        let source = taxpayer(&dir, &scope).await;
        let mut target = CascadeController::new(AddressGroup::MainOffice, &scope);
        dir.clear_calls();

        set_mirror(&source, &mut target, true).unwrap();

        assert_eq!(target.selection(), source.selection());
        assert_eq!(target.cache().provinces, source.cache().provinces);
        assert_eq!(target.cache().municipalities, source.cache().municipalities);
        assert_eq!(target.cache().barangays, source.cache().barangays);
        assert!(dir.calls().is_empty());
    }

    #[tokio::test]
    async fn incomplete_source_leaves_target_untouched() {
        let dir = InProcessClient::sample();
        let scope = CancellationToken::new();
        let mut source = taxpayer(&dir, &scope).await;
        source.on_barangay_change(None).unwrap();

        let mut target = CascadeController::new(AddressGroup::MainOffice, &scope);
        target.set_regions(dir.list_regions().await.unwrap());
        target.select_region(&dir, Some(1), false).await.unwrap();
        let before = target.selection().clone();

        let err = set_mirror(&source, &mut target, true).unwrap_err();

        assert!(matches!(
            err,
            AddressError::IncompleteSource {
                source_group: AddressGroup::Taxpayer,
                target: AddressGroup::MainOffice
            }
        ));
        assert_eq!(target.selection(), &before);
        assert_eq!(target.cache().provinces.len(), 1);
    }

    #[tokio::test]
    async fn disable_resets_target_and_lists() {
        let dir = InProcessClient::sample();
        let scope = CancellationToken::new();
        let source = taxpayer(&dir, &scope).await;
        let mut target = CascadeController::new(AddressGroup::BusinessLocation, &scope);
        target.set_regions(dir.list_regions().await.unwrap());
        set_mirror(&source, &mut target, true).unwrap();
        dir.clear_calls();

        set_mirror(&source, &mut target, false).unwrap();

        assert_eq!(target.selection(), &AddressSelection::default());
        for level in [
            AddressLevel::Province,
            AddressLevel::Municipality,
            AddressLevel::Barangay,
        ] {
            assert_eq!(target.cache().len(level), 0);
        }
        assert_eq!(target.cache().regions.len(), 2);
        assert!(dir.calls().is_empty());
    }

    #[tokio::test]
    async fn disable_then_enable_reproduces_target() {
        let dir = InProcessClient::sample();
        let scope = CancellationToken::new();
        let source = taxpayer(&dir, &scope).await;
        let mut target = CascadeController::new(AddressGroup::MainOffice, &scope);

        set_mirror(&source, &mut target, true).unwrap();
        let first = (target.selection().clone(), target.cache().clone());
        set_mirror(&source, &mut target, false).unwrap();
        set_mirror(&source, &mut target, true).unwrap();

        assert_eq!((target.selection().clone(), target.cache().clone()), first);
    }

    #[tokio::test]
    async fn copy_is_not_live() {
        let dir = InProcessClient::sample();
        let scope = CancellationToken::new();
        let mut source = taxpayer(&dir, &scope).await;
        let mut target = CascadeController::new(AddressGroup::MainOffice, &scope);
        set_mirror(&source, &mut target, true).unwrap();

        source.on_barangay_change(Some(1043)).unwrap();

        assert_eq!(target.selection().barangay_id(), Some(1042));
    }

    // ── addresses_match algebra ──────────────────────────────────

    fn selection_with(barangay: Option<i64>, details: StreetDetails) -> AddressSelection {
        let mut s = AddressSelection {
            details,
            ..Default::default()
        };
        if let Some(id) = barangay {
            use crate::address::selection::Choice;
            s.path.set(AddressLevel::Region, Choice::new(1, "R"), false);
            s.path.set(AddressLevel::Province, Choice::new(2, "P"), false);
            s.path.set(AddressLevel::Municipality, Choice::new(3, "M"), false);
            s.path.set(AddressLevel::Barangay, Choice::new(id, "B"), false);
        }
        s
    }

    fn details_strategy() -> impl Strategy<Value = StreetDetails> {
        let field = || prop_oneof![Just(String::new()), "[A-Za-z0-9 ]{1,8}"];
        (field(), field(), field(), field(), field(), field()).prop_map(
            |(unit_number, building_name, lot_number, block_number, street, subdivision)| {
                StreetDetails {
                    unit_number,
                    building_name,
                    lot_number,
                    block_number,
                    street,
                    subdivision,
                }
            },
        )
    }

    proptest! {
        #[test]
        fn match_is_reflexive(id in proptest::option::of(1i64..5), d in details_strategy()) {
            let a = selection_with(id, d);
            prop_assert!(addresses_match(&a, &a));
        }

        #[test]
        fn match_is_symmetric(
            id_a in proptest::option::of(1i64..3),
            id_b in proptest::option::of(1i64..3),
            d_a in details_strategy(),
            d_b in details_strategy(),
        ) {
            let a = selection_with(id_a, d_a);
            let b = selection_with(id_b, d_b);
            prop_assert_eq!(addresses_match(&a, &b), addresses_match(&b, &a));
        }

        #[test]
        fn match_iff_barangay_and_text_equal(
            id_a in proptest::option::of(1i64..3),
            id_b in proptest::option::of(1i64..3),
            d_a in details_strategy(),
            d_b in details_strategy(),
        ) {
            let expected = id_a == id_b && d_a == d_b;
            let a = selection_with(id_a, d_a);
            let b = selection_with(id_b, d_b);
            prop_assert_eq!(addresses_match(&a, &b), expected);
        }
    }

    #[test]
    fn zipcode_and_names_do_not_matter() {
        let mut a = selection_with(Some(1042), StreetDetails::default());
        let b = selection_with(Some(1042), StreetDetails::default());
        a.zipcode = "6521".into();
        assert!(addresses_match(&a, &b));
    }
}
