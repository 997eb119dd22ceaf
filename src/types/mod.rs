pub mod alert;
pub mod vitals;
