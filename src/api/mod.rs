pub mod mail_api;

pub use mail_api::WebhookMailer;
