pub mod classification;
pub mod events;
pub mod health;
pub mod message;
pub mod response;
pub mod retry;
pub mod seen;
pub mod status;
pub mod validation;
pub mod view;
