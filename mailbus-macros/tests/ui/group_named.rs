use mailbus::group;
use mailbus::group::GroupType;

#[group(name = "org.apache.james.mailbox.quota.QuotaUpdaterGroup")]
pub struct QuotaUpdaterGroup;

fn main() {
    assert_eq!(
        QuotaUpdaterGroup::NAME,
        "org.apache.james.mailbox.quota.QuotaUpdaterGroup"
    );
    assert_eq!(
        QuotaUpdaterGroup::group().as_string(),
        "org.apache.james.mailbox.quota.QuotaUpdaterGroup"
    );
}
