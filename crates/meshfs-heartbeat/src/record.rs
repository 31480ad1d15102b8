//! Merging of a freshly generated service record with the DIR's current one.
//!
//! The write must echo the version the DIR currently holds and carry every
//! DIR-owned `static.` attribute through unchanged. For volume records it
//! additionally grows the MRC replica list instead of overwriting it.

use std::collections::HashMap;

use meshfs_proto::{Service, ServiceDataMap, ServiceStatus, ServiceType};

use crate::{STATIC_ATTR_PREFIX, STATUS_ATTR};

/// Key under which a volume record names its writing MRC. Additional
/// replicas live under `mrc2`, `mrc3`, ...
const MRC_KEY_PREFIX: &str = "mrc";

/// Build the record to write to the DIR from the generator's fresh snapshot
/// and the DIR's current record (if any).
pub fn build_registration(fresh: &Service, previous: Option<&Service>) -> Service {
    let current_version = previous.map(|p| p.version).unwrap_or(0);

    // DIR-owned attributes survive the write verbatim; the status attribute
    // exists in every record, defaulting to "available".
    let mut static_attrs: HashMap<String, String> = previous
        .map(|p| {
            p.data
                .iter()
                .filter(|(k, _)| k.starts_with(STATIC_ATTR_PREFIX))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    static_attrs
        .entry(STATUS_ATTR.to_string())
        .or_insert_with(|| ServiceStatus::Available.attr_value());

    let mut data = ServiceDataMap::new();

    // A volume may already be registered by a different MRC; in that case
    // the replica list has to grow rather than be replaced.
    match previous {
        Some(previous)
            if fresh.service_type == ServiceType::Volume && previous.uuid == fresh.uuid =>
        {
            merge_volume_data(fresh, previous, &mut data);
        }
        _ => {
            data.extend(fresh.data.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    for (key, value) in static_attrs {
        data.insert(key, value);
    }

    Service {
        uuid: fresh.uuid.clone(),
        service_type: fresh.service_type,
        name: fresh.name.clone(),
        version: current_version,
        data,
    }
}

/// Apply the MRC replica rule for a volume record update.
///
/// Every pre-existing `mrc*` entry is preserved. If the writing MRC is not
/// yet among them it is appended under the next vacant `mrcN` key, where
/// the bare `mrc` key counts as N = 1.
fn merge_volume_data(fresh: &Service, previous: &Service, data: &mut ServiceDataMap) {
    let Some(mrc_uuid) = fresh.data.get(MRC_KEY_PREFIX) else {
        // No writing MRC advertised; nothing to reconcile.
        data.extend(fresh.data.iter().map(|(k, v)| (k.clone(), v.clone())));
        return;
    };

    let mut max_mrc_no: u32 = 1;
    let mut contained = false;
    for (key, value) in &previous.data {
        if !key.starts_with(MRC_KEY_PREFIX) {
            continue;
        }
        data.insert(key.clone(), value.clone());
        if value == mrc_uuid {
            contained = true;
        }
        if key != MRC_KEY_PREFIX {
            if let Ok(no) = key[MRC_KEY_PREFIX.len()..].parse::<u32>() {
                max_mrc_no = max_mrc_no.max(no);
            }
        }
    }

    if !contained {
        data.insert(
            format!("{}{}", MRC_KEY_PREFIX, max_mrc_no + 1),
            mrc_uuid.clone(),
        );
    }

    for (key, value) in &fresh.data {
        if !key.starts_with(MRC_KEY_PREFIX) {
            data.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(svc: &'a Service, key: &str) -> Option<&'a str> {
        svc.data.get(key).map(String::as_str)
    }

    #[test]
    fn test_fresh_registration_inserts_status() {
        let fresh = Service::new("osd-1", ServiceType::Osd, "osd01").with_data("free", "1000");
        let out = build_registration(&fresh, None);

        assert_eq!(out.version, 0);
        assert_eq!(get(&out, "free"), Some("1000"));
        assert_eq!(get(&out, STATUS_ATTR), Some("1"));
        assert_eq!(out.data.len(), 2);
    }

    #[test]
    fn test_static_attributes_preserved() {
        let mut previous = Service::new("osd-1", ServiceType::Osd, "osd01")
            .with_data("free", "500")
            .with_data("static.status", "3")
            .with_data("static.do_not_set_last_updated", "true");
        previous.version = 7;

        let fresh = Service::new("osd-1", ServiceType::Osd, "osd01").with_data("free", "1000");
        let out = build_registration(&fresh, Some(&previous));

        assert_eq!(out.version, 7);
        assert_eq!(get(&out, "free"), Some("1000"));
        assert_eq!(get(&out, "static.status"), Some("3"));
        assert_eq!(get(&out, "static.do_not_set_last_updated"), Some("true"));
    }

    #[test]
    fn test_dir_owned_static_attr_wins_over_generator() {
        let previous =
            Service::new("osd-1", ServiceType::Osd, "osd01").with_data("static.zone", "a");
        let fresh = Service::new("osd-1", ServiceType::Osd, "osd01").with_data("static.zone", "b");
        let out = build_registration(&fresh, Some(&previous));
        assert_eq!(get(&out, "static.zone"), Some("a"));
    }

    #[test]
    fn test_second_mrc_joins_volume() {
        let mut previous = Service::new("vol-1", ServiceType::Volume, "volume01")
            .with_data("mrc", "uuid-a")
            .with_data("policy", "RW");
        previous.version = 2;

        let fresh = Service::new("vol-1", ServiceType::Volume, "volume01")
            .with_data("mrc", "uuid-b")
            .with_data("policy", "RW");
        let out = build_registration(&fresh, Some(&previous));

        assert_eq!(out.version, 2);
        assert_eq!(get(&out, "mrc"), Some("uuid-a"));
        assert_eq!(get(&out, "mrc2"), Some("uuid-b"));
        assert_eq!(get(&out, "policy"), Some("RW"));
        assert_eq!(get(&out, STATUS_ATTR), Some("1"));
    }

    #[test]
    fn test_third_mrc_joins_after_gap() {
        let previous = Service::new("vol-1", ServiceType::Volume, "volume01")
            .with_data("mrc", "uuid-a")
            .with_data("mrc2", "uuid-b")
            .with_data("mrc5", "uuid-c");

        let fresh =
            Service::new("vol-1", ServiceType::Volume, "volume01").with_data("mrc", "uuid-d");
        let out = build_registration(&fresh, Some(&previous));

        assert_eq!(get(&out, "mrc"), Some("uuid-a"));
        assert_eq!(get(&out, "mrc2"), Some("uuid-b"));
        assert_eq!(get(&out, "mrc5"), Some("uuid-c"));
        assert_eq!(get(&out, "mrc6"), Some("uuid-d"));
    }

    #[test]
    fn test_known_mrc_is_not_duplicated() {
        let previous = Service::new("vol-1", ServiceType::Volume, "volume01")
            .with_data("mrc", "uuid-a")
            .with_data("mrc2", "uuid-b");

        let fresh =
            Service::new("vol-1", ServiceType::Volume, "volume01").with_data("mrc", "uuid-b");
        let out = build_registration(&fresh, Some(&previous));

        assert_eq!(get(&out, "mrc"), Some("uuid-a"));
        assert_eq!(get(&out, "mrc2"), Some("uuid-b"));
        assert!(!out.data.keys().any(|k| k == "mrc3"));
    }

    #[test]
    fn test_first_volume_registration_copies_verbatim() {
        let fresh = Service::new("vol-1", ServiceType::Volume, "volume01")
            .with_data("mrc", "uuid-a")
            .with_data("policy", "RW");
        let out = build_registration(&fresh, None);

        assert_eq!(out.version, 0);
        assert_eq!(get(&out, "mrc"), Some("uuid-a"));
        assert_eq!(get(&out, "policy"), Some("RW"));
    }

    #[test]
    fn test_unparsable_mrc_suffix_is_preserved_but_ignored_for_numbering() {
        let previous = Service::new("vol-1", ServiceType::Volume, "volume01")
            .with_data("mrc", "uuid-a")
            .with_data("mrcbackup", "uuid-x");

        let fresh =
            Service::new("vol-1", ServiceType::Volume, "volume01").with_data("mrc", "uuid-b");
        let out = build_registration(&fresh, Some(&previous));

        assert_eq!(get(&out, "mrcbackup"), Some("uuid-x"));
        assert_eq!(get(&out, "mrc2"), Some("uuid-b"));
    }

    #[test]
    fn test_volume_without_writing_mrc_copies_payload() {
        let previous = Service::new("vol-1", ServiceType::Volume, "volume01")
            .with_data("mrc", "uuid-a");
        let fresh =
            Service::new("vol-1", ServiceType::Volume, "volume01").with_data("policy", "RO");
        let out = build_registration(&fresh, Some(&previous));

        // Without a writing MRC there is nothing to reconcile; the payload
        // is copied as-is and the old replica list is dropped with it.
        assert_eq!(get(&out, "policy"), Some("RO"));
        assert_eq!(get(&out, STATUS_ATTR), Some("1"));
    }

    #[test]
    fn test_existing_status_not_overwritten_by_default() {
        let previous =
            Service::new("osd-1", ServiceType::Osd, "osd01").with_data(STATUS_ATTR, "2");
        let fresh = Service::new("osd-1", ServiceType::Osd, "osd01");
        let out = build_registration(&fresh, Some(&previous));
        assert_eq!(get(&out, STATUS_ATTR), Some("2"));
    }
}
