//! Master merge: registrations left-joined with monetization.
//!
//! RULE: no registrant is ever dropped. A user with no monetization row
//! gets revenue 0 and the explicit "unknown" group, so the output row
//! count always equals the registration row count.

use crate::{
    model::{MasterRow, MonetizationRecord, RegistrationRecord},
    types::UNKNOWN_GROUP,
};
use std::collections::HashMap;

/// Pure transform. Monetization is at-most-one-per-user upstream;
/// duplicate user ids collapse to the last row seen, so the join never
/// fans out.
pub fn merge_master(
    registrations: &[RegistrationRecord],
    monetization: &[MonetizationRecord],
) -> Vec<MasterRow> {
    let by_user: HashMap<&str, &MonetizationRecord> = monetization
        .iter()
        .map(|m| (m.user_id.as_str(), m))
        .collect();

    registrations
        .iter()
        .map(|reg| match by_user.get(reg.uid.as_str()) {
            Some(m) => MasterRow {
                uid: reg.uid.clone(),
                reg_date: reg.reg_date,
                test_group: m.test_group.clone(),
                revenue: m.revenue,
            },
            None => MasterRow {
                uid: reg.uid.clone(),
                reg_date: reg.reg_date,
                test_group: UNKNOWN_GROUP.to_string(),
                revenue: 0.0,
            },
        })
        .collect()
}
