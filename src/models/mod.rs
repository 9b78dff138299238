mod subscription;

pub use subscription::{
    MetricsUpdate, NewSubscription, Subscription, SubscriptionConfig, SubscriptionInfo,
    DEFAULT_EXPIRE_SECS,
};
