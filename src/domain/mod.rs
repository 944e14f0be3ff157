mod new_subscriber;
mod subscriber_email;
mod subscriber_source;
mod sync_batch_id;
// allow external `use` statements to skip `new_subscriber` etc
pub use new_subscriber::NewSubscriber;
pub use new_subscriber::SubscribeBody;
pub use new_subscriber::INVALID_EMAIL;
pub use subscriber_email::SubscriberEmail;
pub use subscriber_source::SubscriberSource;
pub use sync_batch_id::SyncBatchId;
