use mailbus::group;
use mailbus::group::{Group, GroupRegistry, GroupType};

#[group]
struct SearchIndexerGroup;

#[group]
#[derive(Debug, Clone)]
struct QuotaGroup;

fn main() {
    assert!(SearchIndexerGroup::NAME.ends_with("::SearchIndexerGroup"));
    assert_eq!(SearchIndexerGroup, SearchIndexerGroup::default());

    let registry = GroupRegistry::new()
        .with::<SearchIndexerGroup>()
        .with::<QuotaGroup>();
    let group = SearchIndexerGroup::group();
    assert_eq!(registry.deserialize(&group.as_string()), Ok(group));
    assert_ne!(Group::of::<QuotaGroup>(), Group::of::<SearchIndexerGroup>());
    let _ = format!("{:?}", QuotaGroup); // 已有 derive 与默认派生合并，不应重复
}
