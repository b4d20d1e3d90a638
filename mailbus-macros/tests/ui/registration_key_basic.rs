use mailbus::key::{KeyType, RegistrationKey, RoutingKeyConverter};
use mailbus::registration_key;
use uuid::Uuid;

#[registration_key]
pub struct ThreadKey(Uuid);

#[registration_key(key_type = "Tenant")]
struct TenantKey(String);

fn main() {
    let id = Uuid::new_v4();
    let key = ThreadKey::new(id);
    assert_eq!(key.key_type(), "ThreadKey");
    assert_eq!(ThreadKey::KEY_TYPE, "ThreadKey");
    assert_eq!(key.as_string(), id.to_string());
    assert_eq!(key.value(), &id);

    let mut converter = RoutingKeyConverter::new();
    converter.register::<ThreadKey>().register::<TenantKey>();
    let back = converter
        .to_registration_key(key.routing_key().as_str())
        .unwrap();
    assert_eq!(back.routing_key(), key.routing_key());
    assert!(converter.to_registration_key("ThreadKey:oops").is_err());

    let tenant = TenantKey::new("acme".to_string());
    assert_eq!(tenant.routing_key().as_str(), "Tenant:acme");
    assert_eq!(tenant.clone(), tenant);
    let _factory = ThreadKeyFactory;
}
