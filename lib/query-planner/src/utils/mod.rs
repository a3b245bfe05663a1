pub mod cancellation;
pub mod pretty_display;
