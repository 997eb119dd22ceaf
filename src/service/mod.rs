pub mod classifier;
pub mod danger;
pub mod device_auth;
pub mod features;
pub mod mailer;
pub mod model_loader;
pub mod notifier;
pub mod pipeline;
