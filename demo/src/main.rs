use async_trait::async_trait;
use mailbus::bus::{EventBus, InVmEventBus};
use mailbus::config::EventBusConfig;
use mailbus::dead_letters::{EventDeadLetters, InMemoryDeadLetterStorage, StorageEventDeadLetters};
use mailbus::event::{Added, Event, MailboxAdded, MailboxId, MailboxPath, MessageMetaData, Username};
use mailbus::group;
use mailbus::group::{Group, GroupRegistry, GroupType};
use mailbus::health::{EventDeadLettersHealthCheck, HealthCheck};
use mailbus::key::MailboxIdRegistrationKey;
use mailbus::listener::{EventListener, FnListener, GroupEventListener};
use mailbus::redelivery::EventDeadLettersRedeliverer;
use mailbus::retry::RetryBackoffConfiguration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[group]
struct MessageCounterGroup;

/// 统计新消息数量；`offline` 时模拟下游不可用
#[derive(Default)]
struct MessageCounter {
    offline: AtomicBool,
    messages: AtomicUsize,
}

#[async_trait]
impl EventListener for MessageCounter {
    async fn event(&self, event: &Event) -> anyhow::Result<()> {
        anyhow::ensure!(!self.offline.load(Ordering::SeqCst), "counter backend offline");
        if let Event::Added(added) = event {
            self.messages.fetch_add(added.added.len(), Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_handling(&self, event: &Event) -> bool {
        matches!(event, Event::Added(_))
    }

    fn listener_name(&self) -> &str {
        "message-counter"
    }
}

impl GroupEventListener for MessageCounter {
    fn default_group(&self) -> Group {
        MessageCounterGroup::group()
    }
}

// 第一个参数为可选的 TOML 配置文件路径（见 event-bus.toml），缺省时使用较短的退避
fn load_config() -> anyhow::Result<EventBusConfig> {
    let Some(path) = std::env::args().nth(1) else {
        let retry = RetryBackoffConfiguration::builder()
            .max_retries(3)
            .first_backoff(Duration::from_millis(20))
            .build();
        return Ok(EventBusConfig::builder().retry(retry).build());
    };
    let raw = std::fs::read_to_string(&path)?;
    let config: EventBusConfig = toml::from_str(&raw)?;
    tracing::info!(%path, ?config, "loaded event bus configuration");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let dead_letters = Arc::new(StorageEventDeadLetters::new(
        InMemoryDeadLetterStorage::new(),
        GroupRegistry::new().with::<MessageCounterGroup>(),
    ));
    let bus = InVmEventBus::builder()
        .dead_letters(dead_letters.clone())
        .config(config)
        .build()?;
    let health = EventDeadLettersHealthCheck::new(dead_letters.clone());

    let user = Username::new("demo@example.com");
    let inbox_id = MailboxId::random();
    let inbox = MailboxPath::for_user(user.clone(), "INBOX");
    let inbox_key = MailboxIdRegistrationKey::new(inbox_id);

    // 键监听器：类似 IMAP IDLE 会话，只关心单个邮箱
    let idle = FnListener::new("imap-idle", |event: Event| async move {
        tracing::info!(event_type = event.event_type(), event_id = %event.event_id(), "IDLE notification");
        Ok(())
    })
    .asynchronous();
    let idle_registration = bus.register_key(Arc::new(idle), &inbox_key);

    let counter = Arc::new(MessageCounter::default());
    counter.offline.store(true, Ordering::SeqCst);
    let _counter_registration = bus.register_group_listener(counter.clone())?;

    let created: Event = MailboxAdded::builder()
        .username(user.clone())
        .path(inbox.clone())
        .mailbox_id(inbox_id)
        .build()
        .into();
    bus.dispatch_one(created, &inbox_key).await?;

    let delivered: Event = Added::builder()
        .username(user.clone())
        .path(inbox.clone())
        .mailbox_id(inbox_id)
        .added(vec![MessageMetaData::new(1, 2048), MessageMetaData::new(2, 512)])
        .build()
        .into();
    bus.dispatch_one(delivered, &inbox_key).await?;
    bus.drain().await;

    let report = health.check().await;
    tracing::info!(%report, "health after outage");
    for group in dead_letters.groups_with_failed_events().await? {
        let ids = dead_letters.failed_event_ids(&group).await?;
        tracing::info!(%group, count = ids.len(), "dead letters");
    }

    counter.offline.store(false, Ordering::SeqCst);
    let shared: Arc<dyn EventBus> = Arc::new(bus.clone());
    let redeliverer = EventDeadLettersRedeliverer::new(shared, dead_letters.clone());
    let redelivered = redeliverer.redeliver_all().await?;
    tracing::info!(
        successful = redelivered.successful,
        failed = redelivered.failed,
        messages = counter.messages.load(Ordering::SeqCst),
        "redelivery finished"
    );

    let report = health.check().await;
    tracing::info!(%report, "health after redelivery");

    idle_registration.cancel();
    bus.shutdown().await;
    Ok(())
}
