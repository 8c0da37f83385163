use agencyflow::domain::models::{
    CrossReferenceMap, DuplicatePolicy, ExternalRecord, LocalRecord, ReconciliationPlan,
    SyncContext,
};
use agencyflow::services::reconcile;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

/// External ids from a small alphabet so that matches and duplicates are
/// common, with occasional padding and blanks.
fn external_id() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => "[a-f]".prop_map(String::from),
        1 => "[a-f]".prop_map(|id| format!(" {id} ")),
        1 => Just("  ".to_string()),
    ]
}

fn external_records() -> impl Strategy<Value = Vec<ExternalRecord>> {
    prop::collection::vec((external_id(), 0u8..3, prop::option::of("[0-9]")), 0..12).prop_map(
        |rows| {
            rows.into_iter()
                .map(|(id, name, website)| {
                    let mut record = ExternalRecord::new(id).with_field("name", u64::from(name));
                    if let Some(site) = website {
                        record = record.with_field("website", site);
                    }
                    record
                })
                .collect()
        },
    )
}

fn local_records() -> impl Strategy<Value = Vec<LocalRecord>> {
    prop::collection::vec((prop::option::of("[a-h]"), 0u8..3), 0..10).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (id, name))| {
                LocalRecord::new(format!("local-{i}"), id).with_field("name", u64::from(name))
            })
            .collect()
    })
}

fn policy() -> impl Strategy<Value = DuplicatePolicy> {
    prop_oneof![Just(DuplicatePolicy::KeepFirst), Just(DuplicatePolicy::KeepLast)]
}

fn context(policy: DuplicatePolicy) -> SyncContext {
    let refs = (0..5).fold(CrossReferenceMap::new(), |refs, i| {
        refs.with("websites", i.to_string(), format!("site-{i}"))
    });
    SyncContext::new("tickets")
        .with_cross_refs(refs)
        .with_reference("website", "websites")
        .with_duplicate_policy(policy)
}

/// Apply a plan to an in-memory copy of the local rows the way a store
/// would.
fn apply(current: &[LocalRecord], plan: &ReconciliationPlan) -> Vec<LocalRecord> {
    let deleted: HashSet<&str> = plan.to_delete.iter().map(|l| l.local_id.as_str()).collect();
    let updates: HashMap<&str, &ExternalRecord> = plan
        .to_update
        .iter()
        .map(|(l, d)| (l.local_id.as_str(), d))
        .collect();

    let mut next: Vec<LocalRecord> = current
        .iter()
        .filter(|l| !deleted.contains(l.local_id.as_str()))
        .map(|l| match updates.get(l.local_id.as_str()) {
            Some(desired) => LocalRecord {
                fields: desired.fields.clone(),
                ..l.clone()
            },
            None => l.clone(),
        })
        .collect();

    for (i, record) in plan.to_insert.iter().enumerate() {
        next.push(LocalRecord {
            local_id: format!("inserted-{i}"),
            external_id: Some(record.external_id.clone()),
            fields: record.fields.clone(),
        });
    }
    next
}

proptest! {
    /// Property: every surviving desired record lands in exactly one of
    /// insert, update or unchanged
    #[test]
    fn prop_desired_records_are_partitioned(
        desired in external_records(),
        current in local_records(),
        policy in policy(),
    ) {
        let plan = reconcile(&desired, &current, &context(policy));

        let survivors: HashSet<String> = desired
            .iter()
            .map(|r| r.external_id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        let mut placed: Vec<String> = plan.to_insert.iter().map(|r| r.external_id.clone()).collect();
        placed.extend(plan.to_update.iter().map(|(_, d)| d.external_id.clone()));
        placed.extend(plan.unchanged.iter().map(|(_, d)| d.external_id.clone()));

        let unique: HashSet<String> = placed.iter().cloned().collect();
        prop_assert_eq!(unique.len(), placed.len(), "a record was placed twice");
        prop_assert_eq!(unique, survivors);
        prop_assert_eq!(
            placed.len() + plan.duplicates_dropped.len() + plan.rejected.len(),
            desired.len()
        );
    }

    /// Property: every local row lands in exactly one of update, unchanged,
    /// delete or unmapped
    #[test]
    fn prop_local_records_are_partitioned(
        desired in external_records(),
        current in local_records(),
        policy in policy(),
    ) {
        let plan = reconcile(&desired, &current, &context(policy));

        let mut seen: Vec<&str> = plan.to_update.iter().map(|(l, _)| l.local_id.as_str()).collect();
        seen.extend(plan.unchanged.iter().map(|(l, _)| l.local_id.as_str()));
        seen.extend(plan.to_delete.iter().map(|l| l.local_id.as_str()));
        seen.extend(plan.unmapped.iter().map(|l| l.local_id.as_str()));

        let unique: HashSet<&str> = seen.iter().copied().collect();
        prop_assert_eq!(unique.len(), seen.len());
        prop_assert_eq!(unique.len(), current.len());
        prop_assert!(plan.unmapped.iter().all(|l| l.normalized_id().is_none()));
    }

    /// Property: applying a plan and reconciling again changes nothing
    #[test]
    fn prop_second_pass_is_noop(
        desired in external_records(),
        current in local_records(),
        policy in policy(),
    ) {
        let ctx = context(policy);
        let first = reconcile(&desired, &current, &ctx);
        let after = apply(&current, &first);
        let second = reconcile(&desired, &after, &ctx);

        prop_assert!(second.is_noop(), "second pass planned {} action(s)", second.action_count());
        prop_assert_eq!(second.unchanged.len(), first.action_count() - first.to_delete.len() + first.unchanged.len());
    }

    /// Property: with keep-first, surviving records carry the fields of the
    /// first occurrence of their id
    #[test]
    fn prop_keep_first_wins(desired in external_records()) {
        let plan = reconcile(&desired, &[], &context(DuplicatePolicy::KeepFirst));

        for inserted in &plan.to_insert {
            let first = desired
                .iter()
                .find(|r| r.external_id.trim() == inserted.external_id)
                .unwrap();
            prop_assert_eq!(inserted.fields.get("name"), first.fields.get("name"));
        }
    }

    /// Property: reference fields are either resolved to a local id or null
    #[test]
    fn prop_references_resolved_or_null(desired in external_records()) {
        let plan = reconcile(&desired, &[], &context(DuplicatePolicy::KeepFirst));

        for record in &plan.to_insert {
            if let Some(value) = record.fields.get("website") {
                let resolved = value.as_str().is_some_and(|s| s.starts_with("site-"));
                prop_assert!(resolved || value.is_null(), "unexpected website value {}", value);
            }
        }
        let nulls = plan
            .to_insert
            .iter()
            .filter(|r| r.fields.get("website").is_some_and(serde_json::Value::is_null))
            .count();
        prop_assert_eq!(nulls, plan.unresolved_references.len());
    }
}
